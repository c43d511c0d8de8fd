//! BCD register conversion for the DS1307 timekeeping registers.
//!
//! The DS1307 stores date and time in 7 consecutive registers (Seconds,
//! Minutes, Hours, Day, Date, Month, Year). This module converts between that
//! register image and the calendar [`DateTime`].
//!
//! The device's Day register is written as `day_of_week + 1` but ignored on
//! read: the day of week is always recomputed from the date.
//!
//! # Error Handling
//!
//! Conversion errors are reported via [`DS1307DateTimeError`].

use crate::calendar::{days_in_month, DateTime};
use crate::{Date, Day, Hours, Minutes, Month, Seconds, TimeRepresentation, Year};

/// Last year the two-digit Year register can hold.
pub const DEVICE_MAX_YEAR: u16 = 2099;

/// Internal representation of the DS1307 date and time registers.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) struct DS1307DateTime {
    seconds: Seconds,
    minutes: Minutes,
    hours: Hours,
    day: Day,
    date: Date,
    month: Month,
    year: Year,
}

impl DS1307DateTime {
    /// Helper function to convert a number to BCD format with validation
    fn make_bcd(value: u32, max_value: u32) -> Result<(u8, u8), DS1307DateTimeError> {
        if value > max_value {
            return Err(DS1307DateTimeError::InvalidDateTime);
        }
        let ones = u8::try_from(value % 10).map_err(|_| DS1307DateTimeError::InvalidDateTime)?;
        let tens = u8::try_from(value / 10).map_err(|_| DS1307DateTimeError::InvalidDateTime)?;
        Ok((ones, tens))
    }

    /// Helper function to read a BCD pair, rejecting nibbles above 9
    fn decode_bcd(tens: u8, ones: u8) -> Result<u8, DS1307DateTimeError> {
        if tens > 9 || ones > 9 {
            return Err(DS1307DateTimeError::InvalidDateTime);
        }
        Ok(10 * tens + ones)
    }

    fn convert_seconds(seconds: u8) -> Result<Seconds, DS1307DateTimeError> {
        let (ones, tens) = Self::make_bcd(u32::from(seconds), 59)?;
        let mut value = Seconds::default();
        value.set_seconds(ones);
        value.set_ten_seconds(tens);
        Ok(value)
    }

    fn convert_minutes(minutes: u8) -> Result<Minutes, DS1307DateTimeError> {
        let (ones, tens) = Self::make_bcd(u32::from(minutes), 59)?;
        let mut value = Minutes::default();
        value.set_minutes(ones);
        value.set_ten_minutes(tens);
        Ok(value)
    }

    fn convert_hours(
        hour: u8,
        time_representation: TimeRepresentation,
    ) -> Result<Hours, DS1307DateTimeError> {
        if hour > 23 {
            return Err(DS1307DateTimeError::InvalidDateTime);
        }
        let mut value = Hours::default();
        value.set_time_representation(time_representation);

        match time_representation {
            TimeRepresentation::TwentyFourHour => {
                value.set_hours(hour % 10);
                value.set_ten_hours(u8::from((10..20).contains(&hour)));
                value.set_pm_or_twenty_hours(u8::from(hour >= 20));
            }
            TimeRepresentation::TwelveHour => {
                let (hour12, is_pm) = match hour {
                    0 => (12, false),
                    1..=11 => (hour, false),
                    12 => (12, true),
                    _ => (hour - 12, true),
                };
                value.set_hours(hour12 % 10);
                value.set_ten_hours(hour12 / 10);
                value.set_pm_or_twenty_hours(u8::from(is_pm));
            }
        }
        Ok(value)
    }

    fn convert_day(day_of_week: u8) -> Result<Day, DS1307DateTimeError> {
        if day_of_week > 6 {
            return Err(DS1307DateTimeError::InvalidDateTime);
        }
        let mut value = Day::default();
        value.set_day(day_of_week + 1);
        Ok(value)
    }

    fn convert_date(date: u8) -> Result<Date, DS1307DateTimeError> {
        let (ones, tens) = Self::make_bcd(u32::from(date), 31)?;
        let mut value = Date::default();
        value.set_date(ones);
        value.set_ten_date(tens);
        Ok(value)
    }

    fn convert_month(month: u8) -> Result<Month, DS1307DateTimeError> {
        let (ones, tens) = Self::make_bcd(u32::from(month), 12)?;
        let mut value = Month::default();
        value.set_month(ones);
        value.set_ten_month(tens);
        Ok(value)
    }

    fn convert_year(year: u16) -> Result<Year, DS1307DateTimeError> {
        if !(2000..=DEVICE_MAX_YEAR).contains(&year) {
            error!("year {} does not fit the DS1307 year register", year);
            return Err(DS1307DateTimeError::YearOutOfRange(year));
        }
        let (ones, tens) = Self::make_bcd(u32::from(year - 2000), 99)?;
        let mut value = Year::default();
        value.set_year(ones);
        value.set_ten_year(tens);
        Ok(value)
    }

    pub(crate) fn from_datetime(
        datetime: &DateTime,
        time_representation: TimeRepresentation,
    ) -> Result<Self, DS1307DateTimeError> {
        let (month, day) = (datetime.month(), datetime.day());
        if day == 0 || day > days_in_month(datetime.year(), month) {
            error!("{}-{} is not a calendar date", month, day);
            return Err(DS1307DateTimeError::InvalidDateTime);
        }
        let raw = DS1307DateTime {
            seconds: Self::convert_seconds(datetime.second())?,
            minutes: Self::convert_minutes(datetime.minute())?,
            hours: Self::convert_hours(datetime.hour(), time_representation)?,
            day: Self::convert_day(datetime.day_of_week())?,
            date: Self::convert_date(datetime.day())?,
            month: Self::convert_month(datetime.month())?,
            year: Self::convert_year(datetime.year())?,
        };
        debug!("raw={:?}", raw);
        Ok(raw)
    }

    pub(crate) fn into_datetime(self) -> Result<DateTime, DS1307DateTimeError> {
        let seconds = Self::decode_bcd(self.seconds.ten_seconds(), self.seconds.seconds())?;
        let minutes = Self::decode_bcd(self.minutes.ten_minutes(), self.minutes.minutes())?;
        let hours = Self::decode_bcd(self.hours.ten_hours(), self.hours.hours())?;
        let hours = match self.hours.time_representation() {
            TimeRepresentation::TwentyFourHour => hours + 20 * self.hours.pm_or_twenty_hours(),
            TimeRepresentation::TwelveHour => {
                let is_pm = self.hours.pm_or_twenty_hours() != 0;
                match (hours, is_pm) {
                    (12, false) => 0,
                    (12, true) => 12,
                    (h @ 1..=11, false) => h,
                    (h @ 1..=11, true) => h + 12,
                    _ => return Err(DS1307DateTimeError::InvalidDateTime),
                }
            }
        };
        debug!(
            "raw_hour={:?} h={} m={} s={}",
            self.hours, hours, minutes, seconds
        );

        let year = 2000 + u16::from(Self::decode_bcd(self.year.ten_year(), self.year.year())?);
        let month = Self::decode_bcd(self.month.ten_month(), self.month.month())?;
        let date = Self::decode_bcd(self.date.ten_date(), self.date.date())?;

        DateTime::from_ymd_hms(year, month, date, hours, minutes, seconds)
            .map_err(|_| DS1307DateTimeError::InvalidDateTime)
    }
}

impl From<[u8; 7]> for DS1307DateTime {
    fn from(data: [u8; 7]) -> Self {
        DS1307DateTime {
            seconds: Seconds(data[0]),
            minutes: Minutes(data[1]),
            hours: Hours(data[2]),
            day: Day(data[3]),
            date: Date(data[4]),
            month: Month(data[5]),
            year: Year(data[6]),
        }
    }
}

impl From<&DS1307DateTime> for [u8; 7] {
    fn from(dt: &DS1307DateTime) -> [u8; 7] {
        [
            dt.seconds.0,
            dt.minutes.0,
            dt.hours.0,
            dt.day.0,
            dt.date.0,
            dt.month.0,
            dt.year.0,
        ]
    }
}

/// Errors that can occur during date/time conversion or validation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DS1307DateTimeError {
    /// The provided or decoded date/time is invalid (e.g., out of range, not representable)
    InvalidDateTime,
    /// The year cannot be represented (by the calendar engine or by the device register)
    YearOutOfRange(u16),
    /// A compiler-style date or time string could not be parsed
    InvalidBuildString,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_bcd_valid() {
        assert_eq!(DS1307DateTime::make_bcd(0, 59).unwrap(), (0, 0));
        assert_eq!(DS1307DateTime::make_bcd(10, 59).unwrap(), (0, 1));
        assert_eq!(DS1307DateTime::make_bcd(45, 59).unwrap(), (5, 4));
    }

    #[test]
    fn test_make_bcd_invalid() {
        assert!(matches!(
            DS1307DateTime::make_bcd(60, 59),
            Err(DS1307DateTimeError::InvalidDateTime)
        ));
        assert!(matches!(
            DS1307DateTime::make_bcd(13, 12),
            Err(DS1307DateTimeError::InvalidDateTime)
        ));
    }

    #[test]
    fn test_from_datetime_register_image() {
        let dt = DateTime::from_ymd_hms(2024, 3, 14, 15, 30, 0).unwrap();
        let raw = DS1307DateTime::from_datetime(&dt, TimeRepresentation::TwentyFourHour).unwrap();
        let arr: [u8; 7] = (&raw).into();
        // Thursday is day 4 internally, 5 on the device
        assert_eq!(arr, [0x00, 0x30, 0x15, 0x05, 0x14, 0x03, 0x24]);
    }

    #[test]
    fn test_into_datetime_recomputes_day_of_week() {
        // Day register deliberately wrong
        let raw = DS1307DateTime::from([0x00, 0x30, 0x15, 0x01, 0x14, 0x03, 0x24]);
        let dt = raw.into_datetime().unwrap();
        assert_eq!(dt.day_of_week(), 4);
        assert_eq!(dt.epoch_seconds(), 763_745_400);
    }

    #[test]
    fn test_twelve_hour_conversion() {
        for hour in 0..24 {
            let dt = DateTime::from_ymd_hms(2024, 1, 1, hour, 5, 6).unwrap();
            let raw = DS1307DateTime::from_datetime(&dt, TimeRepresentation::TwelveHour).unwrap();
            assert_eq!(
                raw.hours.time_representation(),
                TimeRepresentation::TwelveHour
            );
            assert_eq!(raw.into_datetime().unwrap(), dt);
        }
        // 0x72 is 12 PM in 12-hour mode
        let raw = DS1307DateTime::from([0x00, 0x00, 0x72, 0x01, 0x01, 0x01, 0x24]);
        assert_eq!(raw.into_datetime().unwrap().hour(), 12);
        // 0x52 is 12 AM
        let raw = DS1307DateTime::from([0x00, 0x00, 0x52, 0x01, 0x01, 0x01, 0x24]);
        assert_eq!(raw.into_datetime().unwrap().hour(), 0);
    }

    #[test]
    fn test_from_datetime_year_beyond_register() {
        let dt = DateTime::from_ymd_hms(2100, 1, 1, 0, 0, 0).unwrap();
        let err = DS1307DateTime::from_datetime(&dt, TimeRepresentation::TwentyFourHour)
            .unwrap_err();
        assert_eq!(err, DS1307DateTimeError::YearOutOfRange(2100));
    }

    #[test]
    fn test_invalid_bcd_to_datetime() {
        // month 0x13 is not a month
        let raw = DS1307DateTime::from([0x00, 0x00, 0x00, 0x01, 0x01, 0x13, 0x24]);
        assert_eq!(
            raw.into_datetime().unwrap_err(),
            DS1307DateTimeError::InvalidDateTime
        );
    }

    #[test]
    fn test_from_datetime_rejects_impossible_date() {
        let mut dt = DateTime::default();
        for (year, month, day) in [(2024, 2, 31), (2023, 2, 29), (2024, 0, 1), (2024, 13, 1), (2024, 4, 0)] {
            dt.fill_by_ymd(year, month, day);
            assert_eq!(
                DS1307DateTime::from_datetime(&dt, TimeRepresentation::TwentyFourHour),
                Err(DS1307DateTimeError::InvalidDateTime),
                "{}-{}-{}",
                year,
                month,
                day
            );
        }
        dt.fill_by_ymd(2024, 2, 29);
        assert!(DS1307DateTime::from_datetime(&dt, TimeRepresentation::TwentyFourHour).is_ok());
    }

    #[test]
    fn test_into_datetime_rejects_invalid_bcd() {
        // minutes 0x1A, seconds 0x0F, year 0xA4
        for data in [
            [0x00, 0x1A, 0x10, 0x01, 0x01, 0x01, 0x24],
            [0x0F, 0x00, 0x10, 0x01, 0x01, 0x01, 0x24],
            [0x00, 0x00, 0x10, 0x01, 0x01, 0x01, 0xA4],
            [0x00, 0x00, 0x10, 0x01, 0x1C, 0x01, 0x24],
            // 24-hour mode with both tens bits set reads as 30h
            [0x00, 0x00, 0x30, 0x01, 0x01, 0x01, 0x24],
        ] {
            assert_eq!(
                DS1307DateTime::from(data).into_datetime(),
                Err(DS1307DateTimeError::InvalidDateTime)
            );
        }
    }

    #[test]
    fn test_into_datetime_rejects_twelve_hour_out_of_range() {
        // 12-hour AM 13, AM 0, PM 19
        for hours in [0x53, 0x40, 0x79] {
            let raw = DS1307DateTime::from([0x00, 0x00, hours, 0x01, 0x01, 0x01, 0x24]);
            assert_eq!(raw.into_datetime(), Err(DS1307DateTimeError::InvalidDateTime));
        }
        let raw = DS1307DateTime::from([0x00, 0x00, 0x71, 0x01, 0x01, 0x01, 0x24]);
        assert_eq!(raw.into_datetime().unwrap().hour(), 23);
    }

    #[test]
    fn test_clock_halt_bit_kept_out_of_seconds() {
        let mut raw = DS1307DateTime::from([0x80 | 0x42, 0x00, 0x00, 0x01, 0x01, 0x01, 0x24]);
        raw.seconds.set_clock_halt(false);
        assert_eq!(raw.into_datetime().unwrap().second(), 42);
    }
}
