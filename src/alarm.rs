//! Weekly wake-up alarms kept in the DS1307 NV-RAM.
//!
//! Up to seven alarms, one per weekday, are packed into a 9-byte record at a
//! caller-chosen base inside the NV-RAM:
//!
//! | Offset | Content                                                |
//! |--------|--------------------------------------------------------|
//! | 0      | clock-set token (`0xA5` = set, anything else = not set) |
//! | 1      | active days bitmask, bit 0 = Sunday .. bit 6 = Saturday |
//! | 2..=8  | alarm code per weekday, Sunday first, `0xFF` = unset    |
//!
//! An alarm code stores a wake time between 04:00 and 11:55 in 5-minute
//! steps: `code = (hour - 4) * 12 + minute / 5`.
//!
//! [`AlarmTrigger`] turns the stored schedule into a once-per-day "alarm is
//! due" signal. The debounce state is stamped with a monotonic clock reading
//! and re-armed when the wall clock shows 00:00. A device that sleeps through
//! 00:00 stays disarmed until it next observes midnight.

use bitfield::bitfield;

use crate::calendar::DateTime;

/// Length of the persisted alarm record in bytes.
pub const ALARM_RECORD_LEN: usize = 9;

/// Token value marking the clock as deliberately set.
pub const CLOCK_SET_TOKEN: u8 = 0xA5;

/// Token value of erased NV-RAM, read as "clock not set".
pub const CLOCK_NOT_SET_TOKEN: u8 = 0xFF;

/// Code byte stored for a weekday without alarm.
pub const UNSET_ALARM_CODE: u8 = 0xFF;

pub(crate) const TOKEN_OFFSET: u8 = 0;
pub(crate) const ACTIVE_DAYS_OFFSET: u8 = 1;

/// Error type for alarm configuration operations.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlarmError {
    /// Weekday must be 0 (Sunday) to 6 (Saturday)
    InvalidWeekday(u8),
    /// Alarm code must be 0-95
    InvalidCode(u8),
    /// Invalid time component value
    InvalidTime(&'static str),
}

/// Source of monotonically increasing timestamps, e.g. microseconds since boot.
pub trait Monotonic {
    fn now(&self) -> u64;
}

impl<F: Fn() -> u64> Monotonic for F {
    fn now(&self) -> u64 {
        self()
    }
}

pub(crate) fn check_weekday(weekday: u8) -> Result<usize, AlarmError> {
    if weekday > 6 {
        error!("invalid weekday {}", weekday);
        return Err(AlarmError::InvalidWeekday(weekday));
    }
    Ok(usize::from(weekday))
}

/// A wake time between 04:00 and 11:55 in 5-minute steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AlarmCode(u8);

impl AlarmCode {
    /// Largest valid code (11:55).
    pub const MAX: u8 = (Self::END_HOUR - Self::FIRST_HOUR) * 12 - 1;
    /// Earliest hour an alarm can be set for.
    pub const FIRST_HOUR: u8 = 4;
    /// First hour past the alarm window.
    pub const END_HOUR: u8 = 12;

    /// Wraps a raw code.
    ///
    /// # Errors
    ///
    /// Returns [`AlarmError::InvalidCode`] if `code` is above [`AlarmCode::MAX`].
    pub fn new(code: u8) -> Result<Self, AlarmError> {
        if code > Self::MAX {
            return Err(AlarmError::InvalidCode(code));
        }
        Ok(Self(code))
    }

    /// Encodes a wake time. Minutes are truncated to the 5-minute step.
    ///
    /// # Errors
    ///
    /// Returns [`AlarmError::InvalidTime`] unless `4 <= hour < 12` and `minute < 60`.
    pub fn from_time(hour: u8, minute: u8) -> Result<Self, AlarmError> {
        if !(Self::FIRST_HOUR..Self::END_HOUR).contains(&hour) {
            error!("alarm hour {} outside 4..12", hour);
            return Err(AlarmError::InvalidTime("hour must be 4-11"));
        }
        if minute > 59 {
            return Err(AlarmError::InvalidTime("minutes must be 0-59"));
        }
        Self::new((hour - Self::FIRST_HOUR) * 12 + minute / 5)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn hour(self) -> u8 {
        self.0 / 12 + Self::FIRST_HOUR
    }

    pub fn minute(self) -> u8 {
        (self.0 % 12) * 5
    }
}

impl TryFrom<u8> for AlarmCode {
    type Error = AlarmError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::new(code)
    }
}

impl From<AlarmCode> for u8 {
    fn from(code: AlarmCode) -> Self {
        code.0
    }
}

bitfield! {
    /// Weekdays with a configured alarm.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct ActiveDays(u8);
    impl Debug;
    pub sunday, set_sunday: 0;
    pub monday, set_monday: 1;
    pub tuesday, set_tuesday: 2;
    pub wednesday, set_wednesday: 3;
    pub thursday, set_thursday: 4;
    pub friday, set_friday: 5;
    pub saturday, set_saturday: 6;
}

impl ActiveDays {
    /// Whether `weekday` (0 = Sunday) has its bit set.
    pub fn contains(&self, weekday: u8) -> bool {
        weekday < 7 && self.0 & (1 << weekday) != 0
    }

    fn set(&mut self, weekday: u8, active: bool) {
        if active {
            self.0 |= 1 << weekday;
        } else {
            self.0 &= !(1 << weekday);
        }
    }
}

impl From<u8> for ActiveDays {
    fn from(v: u8) -> Self {
        ActiveDays(v)
    }
}

impl From<ActiveDays> for u8 {
    fn from(v: ActiveDays) -> Self {
        v.0
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ActiveDays {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "ActiveDays({=u8:b})", self.0);
    }
}

/// In-memory image of the 9-byte alarm record.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AlarmSchedule {
    clock_token: u8,
    active_days: ActiveDays,
    codes: [u8; 7],
}

impl Default for AlarmSchedule {
    /// No alarms, clock not set.
    fn default() -> Self {
        Self {
            clock_token: CLOCK_NOT_SET_TOKEN,
            active_days: ActiveDays::default(),
            codes: [UNSET_ALARM_CODE; 7],
        }
    }
}

impl AlarmSchedule {
    /// Decodes the record exactly as stored, including erased or corrupt bytes.
    pub fn from_bytes(bytes: [u8; ALARM_RECORD_LEN]) -> Self {
        let mut codes = [UNSET_ALARM_CODE; 7];
        codes.copy_from_slice(&bytes[2..]);
        Self {
            clock_token: bytes[0],
            active_days: ActiveDays(bytes[1]),
            codes,
        }
    }

    pub fn to_bytes(&self) -> [u8; ALARM_RECORD_LEN] {
        let mut bytes = [0; ALARM_RECORD_LEN];
        bytes[0] = self.clock_token;
        bytes[1] = self.active_days.0;
        bytes[2..].copy_from_slice(&self.codes);
        bytes
    }

    /// Whether the clock-set token is present.
    pub fn is_clock_set(&self) -> bool {
        self.clock_token == CLOCK_SET_TOKEN
    }

    pub fn mark_clock_set(&mut self) {
        self.clock_token = CLOCK_SET_TOKEN;
    }

    pub fn active_days(&self) -> ActiveDays {
        self.active_days
    }

    /// Raw stored code byte for `weekday`, `0xFF` when unset.
    pub fn raw_code(&self, weekday: u8) -> Option<u8> {
        self.codes.get(usize::from(weekday)).copied()
    }

    /// The alarm for `weekday`, if its bit is set and the stored code is valid.
    pub fn alarm(&self, weekday: u8) -> Option<AlarmCode> {
        if !self.active_days.contains(weekday) {
            return None;
        }
        let raw = self.codes[usize::from(weekday)];
        match AlarmCode::new(raw) {
            Ok(code) => Some(code),
            Err(_) => {
                warn!("weekday {} active with corrupt code {}", weekday, raw);
                None
            }
        }
    }

    /// Iterates over `(weekday, code)` for every configured alarm.
    pub fn alarms(&self) -> impl Iterator<Item = (u8, AlarmCode)> + '_ {
        (0..7u8).filter_map(move |weekday| self.alarm(weekday).map(|code| (weekday, code)))
    }

    /// Sets the alarm of `weekday`.
    ///
    /// # Errors
    ///
    /// Returns [`AlarmError::InvalidWeekday`] for a weekday above 6.
    pub fn set_alarm(&mut self, weekday: u8, code: AlarmCode) -> Result<(), AlarmError> {
        let index = check_weekday(weekday)?;
        self.active_days.set(weekday, true);
        self.codes[index] = code.value();
        Ok(())
    }

    /// Clears the alarm of `weekday`: the bit is cleared and the code reset to `0xFF`.
    ///
    /// # Errors
    ///
    /// Returns [`AlarmError::InvalidWeekday`] for a weekday above 6.
    pub fn clear_alarm(&mut self, weekday: u8) -> Result<(), AlarmError> {
        let index = check_weekday(weekday)?;
        self.active_days.set(weekday, false);
        self.codes[index] = UNSET_ALARM_CODE;
        Ok(())
    }

    /// Clears every alarm, leaving the clock-set token untouched.
    pub fn clear_all(&mut self) {
        self.active_days = ActiveDays::default();
        self.codes = [UNSET_ALARM_CODE; 7];
    }

    /// Bitmask byte followed by the seven code bytes, as written to the device.
    pub(crate) fn alarm_bytes(&self) -> [u8; ALARM_RECORD_LEN - 1] {
        let mut bytes = [0; ALARM_RECORD_LEN - 1];
        bytes.copy_from_slice(&self.to_bytes()[1..]);
        bytes
    }
}

/// Once-per-day alarm trigger.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AlarmTrigger {
    last_triggered: Option<u64>,
}

impl AlarmTrigger {
    pub const fn new() -> Self {
        Self {
            last_triggered: None,
        }
    }

    /// Monotonic timestamp of the last trigger since the last re-arm.
    pub fn last_triggered(&self) -> Option<u64> {
        self.last_triggered
    }

    /// Forgets the last trigger so today's alarm can fire again.
    pub fn rearm(&mut self) {
        self.last_triggered = None;
    }

    /// Re-arms the trigger if `now` reads 00:00.
    pub fn rearm_at_midnight(&mut self, now: &DateTime) {
        if now.hour() == 0 && now.minute() == 0 {
            self.rearm();
        }
    }

    /// Returns true exactly once per day when today's alarm time has been reached.
    ///
    /// The trigger re-arms when `now` reads 00:00.
    pub fn poll<M: Monotonic>(
        &mut self,
        schedule: &AlarmSchedule,
        now: &DateTime,
        clock: &M,
    ) -> bool {
        self.rearm_at_midnight(now);
        let Some(code) = schedule.alarm(now.day_of_week()) else {
            return false;
        };
        debug!(
            "alarm at {}:{} now {}:{} last_triggered={:?}",
            code.hour(),
            code.minute(),
            now.hour(),
            now.minute(),
            self.last_triggered
        );
        if self.last_triggered.is_some() {
            return false;
        }
        if (now.hour(), now.minute()) < (code.hour(), code.minute()) {
            return false;
        }
        self.last_triggered = Some(clock.now());
        true
    }
}
