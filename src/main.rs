// Licensed under the Apache-2.0 license

#![no_std]
#![no_main]

use cortex_m::interrupt::InterruptNumber;
use cortex_m::peripheral::NVIC;
use cortex_m_rt::{entry, exception};
use embedded_io::Write;
use fugit::HertzU32;
use heapless::spsc::{Producer, Queue};
use panic_halt as _;

use stm32f407_ddk::bsp::ds1307::{self, Ds1307, Time, TimeFormat};
use stm32f407_ddk::common::{NoOpLogger, TransferState};
use stm32f407_ddk::gpio::{GpioPort, OutputType, PinConfig, Port, Pull};
use stm32f407_ddk::i2c::{
    I2cConfig, I2cController, I2cEvent, I2cHardwareCore, I2cInstance, Stm32I2c,
};
use stm32f407_ddk::irq::IsrCell;
use stm32f407_ddk::nvic::Nvic;
use stm32f407_ddk::rcc::Rcc;
use stm32f407_ddk::registers::device::{self, i2c1};
use stm32f407_ddk::tests::functional::ds1307_test::run_ds1307_tests;
use stm32f407_ddk::tests::functional::i2c_test::run_i2c_tests;
use stm32f407_ddk::usart::{UsartConfig, UsartController, UsartInstance};

const CONSOLE: UsartInstance = UsartInstance::Usart2;
const RTC_BUS: I2cInstance = I2cInstance::I2c1;

/// Register pointer for the interrupt-driven clock read.
static SECONDS_POINTER: [u8; 1] = [ds1307::reg::SECONDS];

struct I2cContext {
    i2c: Stm32I2c<'static, &'static i2c1::RegisterBlock>,
    events: Producer<'static, I2cEvent, 8>,
}

static I2C1_CONTEXT: IsrCell<I2cContext> = IsrCell::new();

/// Drops the transfer in progress, releasing the bus, before halting.
fn abort_and_halt() -> ! {
    I2C1_CONTEXT.with(|ctx| ctx.i2c.abort_transfer());
    halt()
}

fn halt() -> ! {
    loop {
        cortex_m::asm::wfi();
    }
}

/// USART2 on PA2/PA3 (AF7), I2C1 on PB6/PB7 (AF4, open-drain, pulled up).
fn configure_pins() {
    // SAFETY: only this function touches GPIOA and GPIOB.
    let gpioa = GpioPort::new(unsafe { Port::A.registers() }, Port::A);
    let gpiob = GpioPort::new(unsafe { Port::B.registers() }, Port::B);

    let uart_pin = PinConfig {
        pull: Pull::Up,
        ..PinConfig::alternate(7)
    };
    let i2c_pin = PinConfig {
        pull: Pull::Up,
        output_type: OutputType::OpenDrain,
        ..PinConfig::alternate(4)
    };
    for (port, pin, config) in [
        (&gpioa, 2, &uart_pin),
        (&gpioa, 3, &uart_pin),
        (&gpiob, 6, &i2c_pin),
        (&gpiob, 7, &i2c_pin),
    ] {
        if port.configure(pin, config).is_err() {
            halt();
        }
    }
}

fn wait_for<W: Write>(
    uart: &mut W,
    events: &mut heapless::spsc::Consumer<'static, I2cEvent, 8>,
    expected: I2cEvent,
) -> bool {
    loop {
        match events.dequeue() {
            Some(event) if event == expected => return true,
            Some(I2cEvent::Error(error)) => {
                let _ = writeln!(uart, "i2c error: {error:?}\r");
                return false;
            }
            Some(_) => {}
            None => cortex_m::asm::nop(),
        }
    }
}

#[entry]
fn main() -> ! {
    // SAFETY: RCC and NVIC are owned by main for the lifetime of the program.
    let rcc = Rcc::new(unsafe { &*device::RCC::ptr() });
    let nvic = Nvic::new(unsafe { &*NVIC::PTR });

    for gate in [
        Port::A.clock_gate(),
        Port::B.clock_gate(),
        CONSOLE.clock_gate(),
        RTC_BUS.clock_gate(),
    ] {
        rcc.enable_clock(gate);
    }
    rcc.reset_peripheral(RTC_BUS.clock_gate());
    configure_pins();

    let Ok(pclk1) = rcc.pclk1() else { halt() };

    // SAFETY: USART2 is driven only through this controller.
    let mut uart = UsartController::new(
        unsafe { CONSOLE.registers() },
        UsartConfig::default(),
        NoOpLogger,
    );
    if uart.init(pclk1).is_err() {
        halt();
    }
    uart.enable();
    let _ = writeln!(uart, "\r\nSTM32F407 DDK demo, PCLK1 {} Hz\r", pclk1.raw());

    // SAFETY: the functional suite and the controllers below use I2C1 one at
    // a time, and interrupts for it are not enabled yet.
    run_i2c_tests(&mut uart, unsafe { RTC_BUS.registers() }, pclk1);

    let mut hardware: Stm32I2c<'static, _> =
        Stm32I2c::new(unsafe { RTC_BUS.registers() }, I2cConfig::default(), NoOpLogger);
    if hardware.init(pclk1).is_err() {
        let _ = writeln!(uart, "I2C1 init failed\r");
        halt();
    }
    let mut rtc = Ds1307::new(I2cController::new(hardware, NoOpLogger));
    run_ds1307_tests(&mut uart, &mut rtc);

    let hardware = rtc.release().hardware;
    interrupt_driven_clock(&mut uart, &nvic, hardware, pclk1)
}

/// Reads the clock once a second with the interrupt-driven state machine.
fn interrupt_driven_clock<W: Write>(
    uart: &mut W,
    nvic: &Nvic<&'static cortex_m::peripheral::nvic::RegisterBlock>,
    i2c: Stm32I2c<'static, &'static i2c1::RegisterBlock>,
    pclk1: HertzU32,
) -> ! {
    let Some(queue) = cortex_m::singleton!(: Queue<I2cEvent, 8> = Queue::new()) else {
        halt()
    };
    let Some(buffer) = cortex_m::singleton!(: [u8; 7] = [0; 7]) else {
        halt()
    };
    let mut rx: Option<&'static mut [u8]> = Some(buffer);
    let (events, mut consumer) = queue.split();

    I2C1_CONTEXT.register(I2cContext { i2c, events });
    nvic.enable(RTC_BUS.event_interrupt());
    nvic.enable(RTC_BUS.error_interrupt());

    let _ = writeln!(uart, "\r\n=== Interrupt-driven clock ===\r");
    loop {
        let Some(buf) = rx.take() else { halt() };

        let armed = I2C1_CONTEXT.with(|ctx| {
            ctx.i2c
                .master_send_it(&SECONDS_POINTER, ds1307::DS1307_ADDRESS, true)
        });
        if armed != Some(TransferState::Ready)
            || !wait_for(uart, &mut consumer, I2cEvent::TxComplete)
        {
            abort_and_halt();
        }

        let armed = I2C1_CONTEXT
            .with(|ctx| ctx.i2c.master_receive_it(buf, ds1307::DS1307_ADDRESS, false));
        if armed != Some(TransferState::Ready)
            || !wait_for(uart, &mut consumer, I2cEvent::RxComplete)
        {
            abort_and_halt();
        }

        rx = I2C1_CONTEXT.with(|ctx| ctx.i2c.take_rx_buffer()).flatten();
        if let Some(&[seconds, minutes, hours, ..]) = rx.as_deref() {
            let now = Time::from_registers([seconds, minutes, hours]);
            let _ = match now.format {
                TimeFormat::Hour24 => writeln!(
                    uart,
                    "{:02}:{:02}:{:02}\r",
                    now.hours, now.minutes, now.seconds
                ),
                TimeFormat::Hour12 => writeln!(
                    uart,
                    "{:02}:{:02}:{:02} {}\r",
                    now.hour12(),
                    now.minutes,
                    now.seconds,
                    if now.is_pm() { "PM" } else { "AM" }
                ),
            };
        }

        cortex_m::asm::delay(pclk1.raw());
    }
}

#[exception]
unsafe fn DefaultHandler(irqn: i16) {
    let event = RTC_BUS.event_interrupt().number() as i16;
    let error = RTC_BUS.error_interrupt().number() as i16;
    if irqn == event {
        I2C1_CONTEXT.with(|ctx| ctx.i2c.on_event_interrupt(&mut ctx.events));
    } else if irqn == error {
        I2C1_CONTEXT.with(|ctx| ctx.i2c.on_error_interrupt(&mut ctx.events));
    }
}
