// Licensed under the Apache-2.0 license

//! DS1307 real-time clock.
//!
//! The chip exposes its timekeeping registers as BCD bytes behind an
//! auto-incrementing register pointer. A write sets the pointer from its
//! first byte and stores the rest; a read returns bytes from the current
//! pointer. Reads therefore use `write_read` with the register address.
//!
//! ```rust,ignore
//! let mut rtc = Ds1307::new(i2c);
//! if rtc.init()? {
//!     // oscillator was halted, clock content is invalid
//! }
//! rtc.set_time(&Time::new(13, 45, 0, TimeFormat::Hour12))?;
//! let now = rtc.get_time()?;
//! ```

use embedded_hal::i2c::I2c;

/// Fixed 7-bit bus address.
pub const DS1307_ADDRESS: u8 = 0x68;

/// Register addresses.
pub mod reg {
    pub const SECONDS: u8 = 0x00;
    pub const MINUTES: u8 = 0x01;
    pub const HOURS: u8 = 0x02;
    pub const DAY: u8 = 0x03;
    pub const DATE: u8 = 0x04;
    pub const MONTH: u8 = 0x05;
    pub const YEAR: u8 = 0x06;
    pub const CONTROL: u8 = 0x07;
}

/// Clock halt, bit 7 of the seconds register.
const CH: u8 = 1 << 7;
const HOURS_12H: u8 = 1 << 6;
const HOURS_PM: u8 = 1 << 5;

const YEAR_BASE: u16 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<E> {
    I2c(E),
    /// A field is outside the range the chip can hold.
    InvalidValue,
}

impl<E> From<E> for Error<E> {
    fn from(error: E) -> Self {
        Self::I2c(error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFormat {
    Hour24,
    Hour12,
}

/// Wall-clock time. `hours` is always 0..=23; the format only selects how
/// the chip stores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Time {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub format: TimeFormat,
}

impl Time {
    #[must_use]
    pub const fn new(hours: u8, minutes: u8, seconds: u8, format: TimeFormat) -> Self {
        Self {
            hours,
            minutes,
            seconds,
            format,
        }
    }

    /// Hour as shown on a 12 h clock face, 1..=12.
    #[must_use]
    pub const fn hour12(&self) -> u8 {
        match self.hours % 12 {
            0 => 12,
            h => h,
        }
    }

    #[must_use]
    pub const fn is_pm(&self) -> bool {
        self.hours >= 12
    }

    /// Decodes the seconds, minutes and hours registers, in that order.
    #[must_use]
    pub fn from_registers(raw: [u8; 3]) -> Self {
        let [seconds, minutes, hours] = raw;
        let (hours, format) = decode_hours(hours);
        Self {
            hours,
            minutes: bcd_to_bin(minutes & 0x7F),
            seconds: bcd_to_bin(seconds & !CH),
            format,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DayOfWeek {
    Sunday = 1,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl DayOfWeek {
    #[must_use]
    pub const fn from_register(value: u8) -> Option<Self> {
        Some(match value {
            1 => Self::Sunday,
            2 => Self::Monday,
            3 => Self::Tuesday,
            4 => Self::Wednesday,
            5 => Self::Thursday,
            6 => Self::Friday,
            7 => Self::Saturday,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sunday => "Sunday",
            Self::Monday => "Monday",
            Self::Tuesday => "Tuesday",
            Self::Wednesday => "Wednesday",
            Self::Thursday => "Thursday",
            Self::Friday => "Friday",
            Self::Saturday => "Saturday",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Date {
    pub day: DayOfWeek,
    pub date: u8,
    pub month: u8,
    /// Full year, 2000..=2099.
    pub year: u16,
}

#[must_use]
pub const fn bin_to_bcd(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}

#[must_use]
pub const fn bcd_to_bin(value: u8) -> u8 {
    (value >> 4) * 10 + (value & 0x0F)
}

fn encode_hours(time: &Time) -> u8 {
    match time.format {
        TimeFormat::Hour24 => bin_to_bcd(time.hours),
        TimeFormat::Hour12 => {
            let pm = if time.is_pm() { HOURS_PM } else { 0 };
            HOURS_12H | pm | bin_to_bcd(time.hour12())
        }
    }
}

fn decode_hours(value: u8) -> (u8, TimeFormat) {
    if value & HOURS_12H == 0 {
        return (bcd_to_bin(value & 0x3F), TimeFormat::Hour24);
    }
    let hour = bcd_to_bin(value & 0x1F) % 12;
    let offset = if value & HOURS_PM != 0 { 12 } else { 0 };
    (hour + offset, TimeFormat::Hour12)
}

pub struct Ds1307<I> {
    i2c: I,
}

impl<I: I2c> Ds1307<I> {
    pub fn new(i2c: I) -> Self {
        Self { i2c }
    }

    /// Returns the bus, e.g. to share it with another driver.
    pub fn release(self) -> I {
        self.i2c
    }

    /// Starts the oscillator by clearing the seconds register, then reads it
    /// back. Returns `true` when the clock-halt bit is still set, meaning the
    /// chip did not take the write.
    ///
    /// # Errors
    ///
    /// Any bus error.
    pub fn init(&mut self) -> Result<bool, Error<I::Error>> {
        self.write_register(reg::SECONDS, 0x00)?;
        Ok(self.read_register(reg::SECONDS)? & CH != 0)
    }

    /// # Errors
    ///
    /// [`Error::InvalidValue`] for an out-of-range field, otherwise any bus
    /// error.
    pub fn set_time(&mut self, time: &Time) -> Result<(), Error<I::Error>> {
        if time.hours > 23 || time.minutes > 59 || time.seconds > 59 {
            return Err(Error::InvalidValue);
        }
        // CH stays clear so setting the time never stops the clock.
        self.i2c.write(
            DS1307_ADDRESS,
            &[
                reg::SECONDS,
                bin_to_bcd(time.seconds),
                bin_to_bcd(time.minutes),
                encode_hours(time),
            ],
        )?;
        Ok(())
    }

    /// # Errors
    ///
    /// Any bus error.
    pub fn get_time(&mut self) -> Result<Time, Error<I::Error>> {
        let mut raw = [0u8; 3];
        self.i2c.write_read(DS1307_ADDRESS, &[reg::SECONDS], &mut raw)?;
        Ok(Time::from_registers(raw))
    }

    /// # Errors
    ///
    /// [`Error::InvalidValue`] for an out-of-range field, otherwise any bus
    /// error.
    pub fn set_date(&mut self, date: &Date) -> Result<(), Error<I::Error>> {
        let year = date
            .year
            .checked_sub(YEAR_BASE)
            .and_then(|y| u8::try_from(y).ok())
            .filter(|y| *y <= 99)
            .ok_or(Error::InvalidValue)?;
        if !(1..=31).contains(&date.date) || !(1..=12).contains(&date.month) {
            return Err(Error::InvalidValue);
        }
        self.i2c.write(
            DS1307_ADDRESS,
            &[
                reg::DAY,
                date.day as u8,
                bin_to_bcd(date.date),
                bin_to_bcd(date.month),
                bin_to_bcd(year),
            ],
        )?;
        Ok(())
    }

    /// # Errors
    ///
    /// [`Error::InvalidValue`] if the day register holds no valid weekday,
    /// otherwise any bus error.
    pub fn get_date(&mut self) -> Result<Date, Error<I::Error>> {
        let mut raw = [0u8; 4];
        self.i2c.write_read(DS1307_ADDRESS, &[reg::DAY], &mut raw)?;
        let [day, date, month, year] = raw;
        Ok(Date {
            day: DayOfWeek::from_register(day & 0x07).ok_or(Error::InvalidValue)?,
            date: bcd_to_bin(date & 0x3F),
            month: bcd_to_bin(month & 0x1F),
            year: YEAR_BASE + u16::from(bcd_to_bin(year)),
        })
    }

    /// # Errors
    ///
    /// Any bus error.
    pub fn write_register(&mut self, register: u8, value: u8) -> Result<(), Error<I::Error>> {
        self.i2c.write(DS1307_ADDRESS, &[register, value])?;
        Ok(())
    }

    /// # Errors
    ///
    /// Any bus error.
    pub fn read_register(&mut self, register: u8) -> Result<u8, Error<I::Error>> {
        let mut value = [0u8; 1];
        self.i2c.write_read(DS1307_ADDRESS, &[register], &mut value)?;
        let [value] = value;
        Ok(value)
    }
}
