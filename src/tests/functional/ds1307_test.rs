// Licensed under the Apache-2.0 license

use crate::bsp::ds1307::{Date, DayOfWeek, Ds1307, Error, Time, TimeFormat};
use embedded_hal::i2c::I2c;
use embedded_io::Write;

pub fn run_ds1307_tests<W: Write, I: I2c>(uart: &mut W, rtc: &mut Ds1307<I>) {
    let _ = writeln!(uart, "\r\n=== DS1307 RTC Tests ===\r");

    test_init(uart, rtc);
    test_time_24h(uart, rtc);
    test_time_12h(uart, rtc);
    test_date(uart, rtc);
    test_rejects_invalid(uart, rtc);
    print_now(uart, rtc);

    let _ = writeln!(uart, "\r\n=== DS1307 RTC Tests Done ===\r");
}

fn report<W: Write>(uart: &mut W, passed: bool) {
    let _ = writeln!(uart, "{}\r", if passed { "PASSED" } else { "FAILED" });
}

fn test_init<W: Write, I: I2c>(uart: &mut W, rtc: &mut Ds1307<I>) {
    let _ = write!(uart, "Testing oscillator start... ");
    report(uart, matches!(rtc.init(), Ok(false)));
}

fn test_time_24h<W: Write, I: I2c>(uart: &mut W, rtc: &mut Ds1307<I>) {
    let _ = write!(uart, "Testing 24h time... ");
    let time = Time::new(23, 59, 30, TimeFormat::Hour24);
    let passed = rtc.set_time(&time).is_ok()
        && rtc
            .get_time()
            .is_ok_and(|now| now.hours == 23 && now.minutes == 59 && now.format == time.format);
    report(uart, passed);
}

fn test_time_12h<W: Write, I: I2c>(uart: &mut W, rtc: &mut Ds1307<I>) {
    let _ = write!(uart, "Testing 12h time... ");
    let time = Time::new(0, 15, 0, TimeFormat::Hour12);
    let passed = rtc.set_time(&time).is_ok()
        && rtc
            .get_time()
            .is_ok_and(|now| now.hour12() == 12 && !now.is_pm() && now.minutes == 15);
    report(uart, passed);
}

fn test_date<W: Write, I: I2c>(uart: &mut W, rtc: &mut Ds1307<I>) {
    let _ = write!(uart, "Testing date... ");
    let date = Date {
        day: DayOfWeek::Friday,
        date: 15,
        month: 1,
        year: 2021,
    };
    let passed = rtc.set_date(&date).is_ok() && rtc.get_date().is_ok_and(|read| read == date);
    report(uart, passed);
}

fn test_rejects_invalid<W: Write, I: I2c>(uart: &mut W, rtc: &mut Ds1307<I>) {
    let _ = write!(uart, "Testing invalid input... ");
    let passed = matches!(
        rtc.set_time(&Time::new(24, 0, 0, TimeFormat::Hour24)),
        Err(Error::InvalidValue)
    );
    report(uart, passed);
}

fn print_now<W: Write, I: I2c>(uart: &mut W, rtc: &mut Ds1307<I>) {
    let (Ok(time), Ok(date)) = (rtc.get_time(), rtc.get_date()) else {
        let _ = writeln!(uart, "RTC read failed\r");
        return;
    };
    match time.format {
        TimeFormat::Hour24 => {
            let _ = write!(
                uart,
                "Current time = {:02}:{:02}:{:02}",
                time.hours, time.minutes, time.seconds
            );
        }
        TimeFormat::Hour12 => {
            let _ = write!(
                uart,
                "Current time = {:02}:{:02}:{:02} {}",
                time.hour12(),
                time.minutes,
                time.seconds,
                if time.is_pm() { "PM" } else { "AM" }
            );
        }
    }
    let _ = writeln!(
        uart,
        "\r\nCurrent date = {:02}/{:02}/{} <{}>\r",
        date.date,
        date.month,
        date.year,
        date.day.name()
    );
}
