// Licensed under the Apache-2.0 license

//! On-target I2C checks. Expects a DS1307 on the bus under test and nothing
//! answering at [`ABSENT_ADDRESS`].

use crate::bsp::ds1307::{reg, DS1307_ADDRESS};
use crate::common::{NoOpLogger, TransferState};
use crate::i2c::{
    compute_timing, Error, FmDuty, I2cConfig, I2cEvent, I2cHardwareCore, I2cMaster, I2cSpeed,
    Stm32I2c, TimingConfig,
};
use crate::registers::i2c::I2cRegisters;
use embedded_hal::i2c::NoAcknowledgeSource;
use embedded_io::Write;
use fugit::HertzU32;
use heapless::spsc::Queue;

const ABSENT_ADDRESS: u8 = 0x7E;

/// ISR invocations allowed for one interrupt-driven transfer.
const ISR_BUDGET: u32 = 100_000;

pub fn run_i2c_tests<W: Write, R: I2cRegisters + Copy>(uart: &mut W, regs: R, source_clock: HertzU32) {
    let _ = writeln!(uart, "\r\n=== I2C Master Tests ===\r");

    test_timing(uart, regs, source_clock);
    test_absent_device_nacks(uart, regs, source_clock);
    test_blocking_write_read(uart, regs, source_clock);
    test_interrupt_driven_read(uart, regs, source_clock);

    let _ = writeln!(uart, "\r\n=== I2C Master Tests Done ===\r");
}

fn report<W: Write>(uart: &mut W, passed: bool) {
    let _ = writeln!(uart, "{}\r", if passed { "PASSED" } else { "FAILED" });
}

fn master<'buf, R: I2cRegisters>(
    regs: R,
    source_clock: HertzU32,
) -> Result<Stm32I2c<'buf, R>, Error> {
    let mut i2c = Stm32I2c::new(regs, I2cConfig::default(), NoOpLogger);
    i2c.init(source_clock)?;
    Ok(i2c)
}

fn test_timing<W: Write, R: I2cRegisters>(uart: &mut W, regs: R, source_clock: HertzU32) {
    let _ = write!(uart, "Testing timing programming... ");

    let passed = master(regs, source_clock).is_ok_and(|mut i2c| {
        let fast = TimingConfig {
            source_clock,
            fm_duty: FmDuty::Two,
        };
        let expected = compute_timing(I2cSpeed::Fast, &fast);
        let programmed = i2c.configure_timing(I2cSpeed::Fast, &fast);
        let restored = i2c.init(source_clock);
        expected.is_ok() && programmed.is_ok() && restored.is_ok()
    });

    report(uart, passed);
}

fn test_absent_device_nacks<W: Write, R: I2cRegisters>(
    uart: &mut W,
    regs: R,
    source_clock: HertzU32,
) {
    let _ = write!(uart, "Testing address NACK... ");

    let passed = master(regs, source_clock).is_ok_and(|mut i2c| {
        let nack = i2c.write(ABSENT_ADDRESS, &[0x00]);
        // The bus must be usable again right after the failure.
        let mut seconds = [0u8; 1];
        let next = i2c.write_read(DS1307_ADDRESS, &[reg::SECONDS], &mut seconds);
        nack == Err(Error::NoAcknowledge(NoAcknowledgeSource::Address)) && next.is_ok()
    });

    report(uart, passed);
}

fn test_blocking_write_read<W: Write, R: I2cRegisters>(
    uart: &mut W,
    regs: R,
    source_clock: HertzU32,
) {
    let _ = write!(uart, "Testing blocking write_read... ");

    let passed = master(regs, source_clock).is_ok_and(|mut i2c| {
        let mut control = [0u8; 1];
        let pointer = i2c.write(DS1307_ADDRESS, &[reg::CONTROL]);
        let read = i2c.read(DS1307_ADDRESS, &mut control);
        let mut again = [0u8; 1];
        let combined = i2c.write_read(DS1307_ADDRESS, &[reg::CONTROL], &mut again);
        pointer.is_ok() && read.is_ok() && combined.is_ok() && control == again
    });

    report(uart, passed);
}

fn test_interrupt_driven_read<W: Write, R: I2cRegisters>(
    uart: &mut W,
    regs: R,
    source_clock: HertzU32,
) {
    let _ = write!(uart, "Testing interrupt-driven read... ");

    let pointer = [reg::SECONDS];
    let mut clock = [0u8; 7];
    let mut queue: Queue<I2cEvent, 8> = Queue::new();
    let (mut producer, mut consumer) = queue.split();

    let Ok(mut i2c) = master(regs, source_clock) else {
        report(uart, false);
        return;
    };

    let mut step = |i2c: &mut Stm32I2c<'_, R>, expected: I2cEvent| -> bool {
        for _ in 0..ISR_BUDGET {
            i2c.on_event_interrupt(&mut producer);
            i2c.on_error_interrupt(&mut producer);
            if let Some(event) = consumer.dequeue() {
                return event == expected;
            }
        }
        false
    };

    let armed_tx = i2c.master_send_it(&pointer, DS1307_ADDRESS, true);
    let sent = step(&mut i2c, I2cEvent::TxComplete);
    let armed_rx = i2c.master_receive_it(&mut clock, DS1307_ADDRESS, false);
    let received = step(&mut i2c, I2cEvent::RxComplete);

    let passed = armed_tx == TransferState::Ready
        && sent
        && armed_rx == TransferState::Ready
        && received
        && i2c.state() == TransferState::Ready
        && i2c
            .take_rx_buffer()
            // Day of week is 1..=7 on a running clock.
            .is_some_and(|rx| matches!(rx.get(usize::from(reg::DAY)).copied(), Some(1..=7)));

    report(uart, passed);
}
