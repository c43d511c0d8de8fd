//! Century-day calendar engine.
//!
//! A [`DateTime`] carries the civil fields of a moment between 2000-01-01 and
//! early 2136 together with three derived representations:
//!
//! - the year day number (1 = January 1st),
//! - the century day number (days since 2000-01-01, 0-based),
//! - the epoch seconds (seconds since 2000-01-01 00:00:00).
//!
//! Every `fill_by_*` operation takes one representation as the source of truth
//! and recomputes all the others, so the fields always agree with each other.
//!
//! Month/day to year-day conversion uses the Robertson scheme, which shifts the
//! year so that it starts in March and February's length stops mattering.
//!
//! The `fill_by_*` operations never validate and never panic: out of range input
//! gives a deterministic result computed with wrapping arithmetic. Use
//! [`DateTime::from_ymd_hms`] when input comes from outside.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike, Weekday};

use crate::datetime::DS1307DateTimeError;

/// First year representable by the engine.
pub const EPOCH_YEAR: u16 = 2000;

/// Last year whose every second fits in the epoch counter.
pub const MAX_YEAR: u16 = 2135;

const SECONDS_PER_DAY: u32 = 86_400;

/// Returns true if `year` is a Gregorian leap year.
pub fn is_leap_year(year: u16) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Number of days in `year`.
pub fn days_in_year(year: u16) -> u16 {
    365 + u16::from(is_leap_year(year))
}

/// Number of days in `month` (1-12) of `year`, or 0 for an invalid month.
pub fn days_in_month(year: u16, month: u8) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => 28 + u8::from(is_leap_year(year)),
        _ => 0,
    }
}

/// Day of year (1 = January 1st) for the given civil date.
pub fn year_day_number(year: u16, month: u8, day: u8) -> u16 {
    let after_february = u32::from(month >= 3);
    let ydn = u32::from(day)
        .wrapping_add((u32::from(month) + 2) * 611 / 20)
        .wrapping_sub(91)
        .wrapping_sub(2 * after_february)
        .wrapping_add(after_february * u32::from(is_leap_year(year)));
    ydn as u16
}

// Shifts the year day number so that March 1st lines up with the Robertson
// month table in every year.
fn corrected_year_day_number(year: u16, ydn: u16) -> u32 {
    let leap = u32::from(is_leap_year(year));
    let mut corrected = u32::from(ydn);
    if corrected > 59 + leap {
        corrected = corrected + 2 - leap;
    }
    corrected + 91
}

/// Inverse of [`year_day_number`]: returns `(month, day)`.
pub fn month_and_day(year: u16, ydn: u16) -> (u8, u8) {
    let corrected = corrected_year_day_number(year, ydn);
    let month = corrected * 20 / 611 - 2;
    let day = corrected - (month + 2) * 611 / 20;
    (month as u8, day as u8)
}

/// Day of week for a century day number, 0 = Sunday.
///
/// 2000-01-01 (century day 0) was a Saturday.
pub fn day_of_week(cdn: u16) -> u8 {
    ((u32::from(cdn) + 6) % 7) as u8
}

fn century_day_number(year: u16, ydn: u16) -> u16 {
    let mut cdn = ydn.wrapping_sub(1);
    let mut y = year;
    while y > EPOCH_YEAR {
        y -= 1;
        cdn = cdn.wrapping_add(days_in_year(y));
    }
    cdn
}

/// Central European summer time window of `year` as epoch seconds.
///
/// Returns `(summer_start, winter_start)`. Summer time starts on the Sunday on
/// or before March 30th at 02:00. Winter time starts on the Sunday on or before
/// October 31st at 03:00.
pub fn summer_time_window(year: u16) -> (u32, u32) {
    let mut scratch = DateTime::default();

    scratch.fill_by_ymd(year, 3, 30);
    scratch.fill_by_hms(2, 0, 0);
    scratch.fill_by_cdn(scratch.cdn.wrapping_sub(u16::from(scratch.dow)));
    let summer_start = scratch.time2000;

    scratch.fill_by_ymd(year, 10, 31);
    scratch.fill_by_hms(3, 0, 0);
    scratch.fill_by_cdn(scratch.cdn.wrapping_sub(u16::from(scratch.dow)));
    let winter_start = scratch.time2000;

    (summer_start, winter_start)
}

/// Wall-clock date and time with its derived day and second counters.
///
/// Not meant to be shared between threads of control: one owner mutates it
/// through the `fill_by_*` operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DateTime {
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
    dow: u8,
    ydn: u16,
    cdn: u16,
    time2000: u32,
}

impl Default for DateTime {
    /// 2000-01-01 00:00:00, a Saturday.
    fn default() -> Self {
        Self {
            year: EPOCH_YEAR,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
            dow: 6,
            ydn: 1,
            cdn: 0,
            time2000: 0,
        }
    }
}

impl DateTime {
    /// Creates a validated date and time.
    ///
    /// # Errors
    ///
    /// Returns [`DS1307DateTimeError::YearOutOfRange`] if the year is outside
    /// 2000..=2135 and [`DS1307DateTimeError::InvalidDateTime`] for any other
    /// field out of range.
    pub fn from_ymd_hms(
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    ) -> Result<Self, DS1307DateTimeError> {
        if !(EPOCH_YEAR..=MAX_YEAR).contains(&year) {
            error!("year {} outside {}..={}", year, EPOCH_YEAR, MAX_YEAR);
            return Err(DS1307DateTimeError::YearOutOfRange(year));
        }
        if day == 0 || day > days_in_month(year, month) {
            return Err(DS1307DateTimeError::InvalidDateTime);
        }
        if hour > 23 || minute > 59 || second > 59 {
            return Err(DS1307DateTimeError::InvalidDateTime);
        }
        let mut datetime = Self::default();
        datetime.fill_by_ymd(year, month, day);
        datetime.fill_by_hms(hour, minute, second);
        Ok(datetime)
    }

    /// Creates a date and time from seconds since 2000-01-01 00:00:00.
    pub fn from_epoch_seconds(time2000: u32) -> Self {
        let mut datetime = Self::default();
        datetime.fill_by_epoch_seconds(time2000);
        datetime
    }

    /// Creates midnight of the given century day number.
    pub fn from_cdn(cdn: u16) -> Self {
        let mut datetime = Self::default();
        datetime.fill_by_cdn(cdn);
        datetime
    }

    /// Parses compiler-style build strings such as `"Dec 26 2009"` and `"12:34:56"`.
    ///
    /// The day may be padded with a space (`"Jan  5 2024"`).
    ///
    /// # Errors
    ///
    /// Returns [`DS1307DateTimeError::InvalidBuildString`] if either string is
    /// malformed, or the errors of [`DateTime::from_ymd_hms`].
    pub fn from_build_strings(date: &str, time: &str) -> Result<Self, DS1307DateTimeError> {
        let mut date_parts = date.split_whitespace();
        let month = date_parts
            .next()
            .and_then(month_from_abbreviation)
            .ok_or(DS1307DateTimeError::InvalidBuildString)?;
        let day = parse_field::<u8>(date_parts.next())?;
        let year = parse_field::<u16>(date_parts.next())?;
        if date_parts.next().is_some() {
            return Err(DS1307DateTimeError::InvalidBuildString);
        }

        let mut time_parts = time.trim().split(':');
        let hour = parse_field::<u8>(time_parts.next())?;
        let minute = parse_field::<u8>(time_parts.next())?;
        let second = parse_field::<u8>(time_parts.next())?;
        if time_parts.next().is_some() {
            return Err(DS1307DateTimeError::InvalidBuildString);
        }

        Self::from_ymd_hms(year, month, day, hour, minute, second)
    }

    /// Sets the civil date and recomputes every derived field.
    ///
    /// Hour, minute and second are kept.
    pub fn fill_by_ymd(&mut self, year: u16, month: u8, day: u8) {
        self.year = year;
        self.month = month;
        self.day = day;
        self.ydn = year_day_number(year, month, day);
        self.cdn = century_day_number(year, self.ydn);
        self.dow = day_of_week(self.cdn);
        self.calculate_time2000();
    }

    /// Sets the time of day and recomputes the epoch seconds.
    pub fn fill_by_hms(&mut self, hour: u8, minute: u8, second: u8) {
        self.hour = hour;
        self.minute = minute;
        self.second = second;
        self.calculate_time2000();
    }

    /// Sets the date from a century day number, keeping the time of day.
    pub fn fill_by_cdn(&mut self, cdn: u16) {
        let mut remaining = cdn;
        let mut year = EPOCH_YEAR;
        while remaining >= days_in_year(year) {
            remaining -= days_in_year(year);
            year += 1;
        }
        self.cdn = cdn;
        self.year = year;
        self.ydn = remaining + 1;
        self.dow = day_of_week(cdn);
        let (month, day) = month_and_day(year, self.ydn);
        self.month = month;
        self.day = day;
        self.calculate_time2000();
    }

    /// Sets every field from seconds since 2000-01-01 00:00:00.
    pub fn fill_by_epoch_seconds(&mut self, time2000: u32) {
        let mut rest = time2000;
        self.second = (rest % 60) as u8;
        rest /= 60;
        self.minute = (rest % 60) as u8;
        rest /= 60;
        self.hour = (rest % 24) as u8;
        rest /= 24;
        // u32::MAX / 86400 is 49710, always within u16
        self.fill_by_cdn(rest as u16);
    }

    fn calculate_time2000(&mut self) {
        self.time2000 = u32::from(self.cdn)
            .wrapping_mul(SECONDS_PER_DAY)
            .wrapping_add(u32::from(self.hour) * 3600)
            .wrapping_add(u32::from(self.minute) * 60)
            .wrapping_add(u32::from(self.second));
    }

    /// Whether Central European summer time is in effect at this moment.
    ///
    /// Pure query: the transition instants are computed on a scratch value.
    pub fn is_daylight_saving_active(&self) -> bool {
        let (summer_start, winter_start) = summer_time_window(self.year);
        (summer_start..winter_start).contains(&self.time2000)
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    pub fn day(&self) -> u8 {
        self.day
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    pub fn second(&self) -> u8 {
        self.second
    }

    /// Day of week, 0 = Sunday .. 6 = Saturday.
    pub fn day_of_week(&self) -> u8 {
        self.dow
    }

    /// Day of week as a chrono [`Weekday`].
    pub fn weekday(&self) -> Weekday {
        match self.dow {
            0 => Weekday::Sun,
            1 => Weekday::Mon,
            2 => Weekday::Tue,
            3 => Weekday::Wed,
            4 => Weekday::Thu,
            5 => Weekday::Fri,
            _ => Weekday::Sat,
        }
    }

    /// Day of year, 1 = January 1st.
    pub fn year_day_number(&self) -> u16 {
        self.ydn
    }

    /// Days since 2000-01-01.
    pub fn century_day_number(&self) -> u16 {
        self.cdn
    }

    /// Seconds since 2000-01-01 00:00:00.
    pub fn epoch_seconds(&self) -> u32 {
        self.time2000
    }

    /// Converts to a chrono [`NaiveDateTime`], or `None` if the civil fields
    /// do not form a valid date (only possible after unvalidated `fill_by_*`).
    pub fn to_naive_datetime(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(
            i32::from(self.year),
            u32::from(self.month),
            u32::from(self.day),
        )?
        .and_hms_opt(
            u32::from(self.hour),
            u32::from(self.minute),
            u32::from(self.second),
        )
    }
}

impl TryFrom<&NaiveDateTime> for DateTime {
    type Error = DS1307DateTimeError;

    fn try_from(datetime: &NaiveDateTime) -> Result<Self, Self::Error> {
        let year = u16::try_from(datetime.year())
            .map_err(|_| DS1307DateTimeError::InvalidDateTime)?;
        // chrono already validated every field, so the narrowing casts are exact
        Self::from_ymd_hms(
            year,
            datetime.month() as u8,
            datetime.day() as u8,
            datetime.hour() as u8,
            datetime.minute() as u8,
            datetime.second() as u8,
        )
    }
}

fn month_from_abbreviation(name: &str) -> Option<u8> {
    const MONTHS: [&str; 12] = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];
    MONTHS
        .iter()
        .position(|m| *m == name)
        .and_then(|i| u8::try_from(i + 1).ok())
}

fn parse_field<T: core::str::FromStr>(field: Option<&str>) -> Result<T, DS1307DateTimeError> {
    field
        .and_then(|f| f.trim().parse().ok())
        .ok_or(DS1307DateTimeError::InvalidBuildString)
}
