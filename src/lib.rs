//! # DS1307 Real-Time Clock Driver with NV-RAM Weekly Alarms
//!
//! A platform-agnostic driver for the DS1307 battery-backed real-time clock
//! built on the `embedded-hal` I2C traits, together with:
//!
//! - a calendar engine ([`calendar`]) that converts between civil date/time,
//!   a day count since 2000-01-01 and a seconds-since-2000 counter, and detects
//!   Central European summer time;
//! - a weekly alarm store ([`alarm`]) that packs one wake-up time per weekday
//!   into 9 bytes of the DS1307's 56-byte NV-RAM.
//!
//! ## Features
//!
//! - `async`: async driver in [`asynch`] using `embedded-hal-async`
//! - `log`: log messages through the `log` crate
//! - `defmt`: log messages and `Format` impls through `defmt`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ds1307_alarm::{DateTime, DS1307, DEFAULT_ADDRESS};
//!
//! let mut rtc = DS1307::new(i2c, DEFAULT_ADDRESS);
//! if !rtc.is_clock_set()? {
//!     let build_time = DateTime::from_build_strings("Mar 14 2024", "15:30:00")?;
//!     rtc.initialize_clock(&build_time)?;
//! }
//! rtc.set_alarm_at(1, 6, 30)?; // Mondays at 06:30
//!
//! loop {
//!     let now = rtc.datetime()?;
//!     if rtc.is_alarm_due(&now, &|| micros())? {
//!         ring();
//!     }
//! }
//! ```
//!
//! Neither the driver nor [`DateTime`] is meant to be shared between threads
//! of control; keep both owned by a single control loop.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod alarm;
#[cfg(feature = "async")]
pub mod asynch;
pub mod calendar;
pub mod datetime;
mod registers;

use embedded_hal::i2c::I2c;
use paste::paste;

pub use alarm::{
    ActiveDays, AlarmCode, AlarmError, AlarmSchedule, AlarmTrigger, Monotonic, ALARM_RECORD_LEN,
    CLOCK_NOT_SET_TOKEN, CLOCK_SET_TOKEN, UNSET_ALARM_CODE,
};
pub use calendar::DateTime;
pub use datetime::DS1307DateTimeError;
pub use registers::*;

use alarm::{check_weekday, ACTIVE_DAYS_OFFSET, TOKEN_OFFSET};
use datetime::DS1307DateTime;

/// Fixed I2C address of the DS1307.
pub const DEFAULT_ADDRESS: u8 = 0x68;

/// Configuration for the DS1307 device.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Time representation format (12/24 hour)
    pub time_representation: TimeRepresentation,
    /// Drive the SQW/OUT pin with a square wave
    pub square_wave_enable: bool,
    /// Square wave output frequency
    pub square_wave_frequency: SquareWaveFrequency,
    /// SQW/OUT level while the square wave is disabled
    pub output_level: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            time_representation: TimeRepresentation::TwentyFourHour,
            square_wave_enable: false,
            square_wave_frequency: SquareWaveFrequency::Hz1,
            output_level: false,
        }
    }
}

/// Error type for DS1307 operations.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DS1307Error<I2CE> {
    /// I2C bus error
    I2c(I2CE),
    /// `DateTime` conversion error
    DateTime(DS1307DateTimeError),
    /// Rejected alarm input
    Alarm(AlarmError),
    /// Access outside the 56-byte NV-RAM
    NvramOutOfRange {
        /// Offset from the start of NV-RAM
        offset: u8,
        /// Number of bytes requested
        len: usize,
    },
}

impl<I2CE> From<I2CE> for DS1307Error<I2CE> {
    fn from(e: I2CE) -> Self {
        DS1307Error::I2c(e)
    }
}

/// Maps an NV-RAM offset to its register address after a bounds check.
pub(crate) fn nvram_register<E>(offset: u8, len: usize) -> Result<u8, DS1307Error<E>> {
    if usize::from(offset) + len > NVRAM_SIZE {
        error!("NV-RAM access offset={} len={} out of range", offset, len);
        return Err(DS1307Error::NvramOutOfRange { offset, len });
    }
    Ok(NVRAM_START + offset)
}

pub(crate) fn check_alarm_base<E>(base: u8) -> Result<(), DS1307Error<E>> {
    nvram_register(base, ALARM_RECORD_LEN).map(|_| ())
}

// Image of the register block written by `set_datetime`, with the clock halted.
pub(crate) fn halted_datetime_frame(raw: &DS1307DateTime) -> [u8; 8] {
    let data: [u8; 7] = raw.into();
    let mut seconds = Seconds(data[0]);
    seconds.set_clock_halt(true);
    [
        RegAddr::Seconds as u8,
        seconds.into(),
        data[1],
        data[2],
        data[3],
        data[4],
        data[5],
        data[6],
    ]
}

/// DS1307 Real-Time Clock driver.
pub struct DS1307<I2C: I2c> {
    i2c: I2C,
    address: u8,
    alarm_base: u8,
    time_representation: TimeRepresentation,
    trigger: AlarmTrigger,
}

impl<I2C: I2c> DS1307<I2C> {
    /// Creates a new DS1307 driver instance with the alarm record at NV-RAM offset 0.
    ///
    /// # Arguments
    /// * `i2c` - The I2C bus implementation
    /// * `address` - The I2C address of the device (typically 0x68)
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self {
            i2c,
            address,
            alarm_base: 0,
            time_representation: TimeRepresentation::TwentyFourHour,
            trigger: AlarmTrigger::new(),
        }
    }

    /// Creates a driver whose alarm record starts at NV-RAM offset `base`.
    ///
    /// # Errors
    ///
    /// Returns [`DS1307Error::NvramOutOfRange`] if the 9-byte record does not fit.
    pub fn with_alarm_base(
        i2c: I2C,
        address: u8,
        base: u8,
    ) -> Result<Self, DS1307Error<I2C::Error>> {
        check_alarm_base(base)?;
        let mut dev = Self::new(i2c, address);
        dev.alarm_base = base;
        Ok(dev)
    }

    /// Gives back the I2C bus.
    pub fn release(self) -> I2C {
        self.i2c
    }

    /// Returns true if the device acknowledges its address.
    pub fn is_present(&mut self) -> bool {
        self.i2c
            .write(self.address, &[RegAddr::Seconds as u8])
            .is_ok()
    }

    /// Configures the device according to the provided configuration.
    ///
    /// # Errors
    /// Returns `DS1307Error::I2c` if the I2C bus fails.
    pub fn configure(&mut self, config: &Config) -> Result<(), DS1307Error<I2C::Error>> {
        let mut control = Control::default();
        control.set_output_level(config.output_level);
        control.set_square_wave_enable(config.square_wave_enable);
        control.set_square_wave_frequency(config.square_wave_frequency);
        debug!("DS1307: writing control: {:?}", control);
        self.set_control(control)?;

        // Re-encode the current hour in the requested representation.
        let now = self.datetime()?;
        let converted = DS1307DateTime::from_datetime(&now, config.time_representation)
            .map_err(DS1307Error::DateTime)?;
        let hours = Hours(<[u8; 7]>::from(&converted)[RegAddr::Hours as usize]);
        debug!("DS1307: writing hours: {:?}", hours);
        self.set_hour(hours)?;
        self.time_representation = config.time_representation;
        Ok(())
    }

    fn read_raw_datetime(&mut self) -> Result<DS1307DateTime, DS1307Error<I2C::Error>> {
        let mut data = [0; 7];
        self.i2c
            .write_read(self.address, &[RegAddr::Seconds as u8], &mut data)?;
        Ok(data.into())
    }

    /// Gets the current date and time from the device.
    ///
    /// The day of week is recomputed from the date.
    ///
    /// # Errors
    /// Returns `DS1307Error::I2c` on bus failure and `DS1307Error::DateTime` if the
    /// registers do not hold a valid date.
    pub fn datetime(&mut self) -> Result<DateTime, DS1307Error<I2C::Error>> {
        let raw = self.read_raw_datetime()?;
        raw.into_datetime().map_err(DS1307Error::DateTime)
    }

    /// Sets the date and time and starts the oscillator.
    ///
    /// The registers are written with the clock halted, then the halt bit is cleared.
    ///
    /// # Errors
    /// Returns `DS1307Error::DateTime` if the year does not fit the device
    /// (2000-2099) and `DS1307Error::I2c` on bus failure.
    pub fn set_datetime(&mut self, datetime: &DateTime) -> Result<(), DS1307Error<I2C::Error>> {
        let raw = DS1307DateTime::from_datetime(datetime, self.time_representation)
            .map_err(DS1307Error::DateTime)?;
        self.i2c.write(self.address, &halted_datetime_frame(&raw))?;
        self.start_clock()
    }

    /// Sets the date and time, then records the clock-set token.
    ///
    /// # Errors
    /// See [`DS1307::set_datetime`]. The token is not written if setting the time fails.
    pub fn initialize_clock(&mut self, datetime: &DateTime) -> Result<(), DS1307Error<I2C::Error>> {
        self.set_datetime(datetime)?;
        self.mark_clock_set()?;
        debug!("DS1307: time set and token registered");
        Ok(())
    }

    /// Halts the oscillator by setting the CH bit.
    pub fn stop_clock(&mut self) -> Result<(), DS1307Error<I2C::Error>> {
        let mut seconds = self.second()?;
        seconds.set_clock_halt(true);
        self.set_second(seconds)
    }

    /// Starts the oscillator by clearing the CH bit.
    pub fn start_clock(&mut self) -> Result<(), DS1307Error<I2C::Error>> {
        let mut seconds = self.second()?;
        seconds.set_clock_halt(false);
        self.set_second(seconds)
    }

    /// Reads NV-RAM starting at `offset` (0 = register 0x08) into `buf`.
    ///
    /// # Errors
    /// Returns `DS1307Error::NvramOutOfRange` if the range leaves the 56-byte window.
    pub fn read_nvram(&mut self, offset: u8, buf: &mut [u8]) -> Result<(), DS1307Error<I2C::Error>> {
        let reg = nvram_register(offset, buf.len())?;
        self.i2c.write_read(self.address, &[reg], buf)?;
        Ok(())
    }

    /// Writes `data` to NV-RAM starting at `offset` in a single transaction.
    ///
    /// # Errors
    /// Returns `DS1307Error::NvramOutOfRange` if the range leaves the 56-byte window.
    pub fn write_nvram(&mut self, offset: u8, data: &[u8]) -> Result<(), DS1307Error<I2C::Error>> {
        let reg = nvram_register(offset, data.len())?;
        let mut frame = [0u8; NVRAM_SIZE + 1];
        frame[0] = reg;
        frame[1..=data.len()].copy_from_slice(data);
        self.i2c.write(self.address, &frame[..=data.len()])?;
        Ok(())
    }

    /// Reads the whole 9-byte alarm record.
    pub fn alarm_schedule(&mut self) -> Result<AlarmSchedule, DS1307Error<I2C::Error>> {
        let mut bytes = [0; ALARM_RECORD_LEN];
        self.read_nvram(self.alarm_base, &mut bytes)?;
        Ok(AlarmSchedule::from_bytes(bytes))
    }

    // Bitmask and codes go out in one transaction so a failed write leaves the
    // previous record in place.
    fn write_alarms(&mut self, schedule: &AlarmSchedule) -> Result<(), DS1307Error<I2C::Error>> {
        self.write_nvram(self.alarm_base + ACTIVE_DAYS_OFFSET, &schedule.alarm_bytes())
    }

    /// Sets the alarm of `weekday` (0 = Sunday) to a raw alarm code (0-95).
    ///
    /// # Errors
    /// Returns `DS1307Error::Alarm` for an invalid weekday or code; nothing is written.
    pub fn set_alarm(&mut self, weekday: u8, code: u8) -> Result<(), DS1307Error<I2C::Error>> {
        let code = AlarmCode::new(code).map_err(DS1307Error::Alarm)?;
        self.set_alarm_code(weekday, code)
    }

    /// Sets the alarm of `weekday` to `hour:minute`, 04:00 to 11:55.
    ///
    /// # Errors
    /// Returns `DS1307Error::Alarm` if the time is outside the alarm window; nothing is written.
    pub fn set_alarm_at(
        &mut self,
        weekday: u8,
        hour: u8,
        minute: u8,
    ) -> Result<(), DS1307Error<I2C::Error>> {
        let code = AlarmCode::from_time(hour, minute).map_err(DS1307Error::Alarm)?;
        self.set_alarm_code(weekday, code)
    }

    fn set_alarm_code(&mut self, weekday: u8, code: AlarmCode) -> Result<(), DS1307Error<I2C::Error>> {
        check_weekday(weekday).map_err(DS1307Error::Alarm)?;
        let mut schedule = self.alarm_schedule()?;
        schedule
            .set_alarm(weekday, code)
            .map_err(DS1307Error::Alarm)?;
        debug!(
            "DS1307: alarm set for day {} at {}:{} code={}",
            weekday,
            code.hour(),
            code.minute(),
            code.value()
        );
        self.write_alarms(&schedule)
    }

    /// Clears the alarm of `weekday`.
    pub fn clear_alarm(&mut self, weekday: u8) -> Result<(), DS1307Error<I2C::Error>> {
        check_weekday(weekday).map_err(DS1307Error::Alarm)?;
        let mut schedule = self.alarm_schedule()?;
        schedule.clear_alarm(weekday).map_err(DS1307Error::Alarm)?;
        self.write_alarms(&schedule)
    }

    /// Clears every alarm. The clock-set token is kept.
    pub fn clear_all_alarms(&mut self) -> Result<(), DS1307Error<I2C::Error>> {
        self.write_alarms(&AlarmSchedule::default())?;
        debug!("DS1307: alarm memory cleared");
        Ok(())
    }

    /// Returns true exactly once per day when today's alarm time has been reached.
    ///
    /// `clock` stamps the trigger; the check re-arms when `now` reads 00:00.
    pub fn is_alarm_due<M: Monotonic>(
        &mut self,
        now: &DateTime,
        clock: &M,
    ) -> Result<bool, DS1307Error<I2C::Error>> {
        // Re-arm before the read so a failed midnight poll still counts.
        self.trigger.rearm_at_midnight(now);
        let schedule = self.alarm_schedule()?;
        Ok(self.trigger.poll(&schedule, now, clock))
    }

    /// Whether the clock-set token is present.
    pub fn is_clock_set(&mut self) -> Result<bool, DS1307Error<I2C::Error>> {
        let mut token = [0];
        self.read_nvram(self.alarm_base + TOKEN_OFFSET, &mut token)?;
        Ok(token[0] == CLOCK_SET_TOKEN)
    }

    /// Records that the time has been deliberately set.
    pub fn mark_clock_set(&mut self) -> Result<(), DS1307Error<I2C::Error>> {
        self.write_nvram(self.alarm_base + TOKEN_OFFSET, &[CLOCK_SET_TOKEN])
    }

    /// Reads the alarm record and logs every byte.
    pub fn dump_alarm_record(&mut self) -> Result<[u8; ALARM_RECORD_LEN], DS1307Error<I2C::Error>> {
        let mut bytes = [0; ALARM_RECORD_LEN];
        self.read_nvram(self.alarm_base, &mut bytes)?;
        debug!("DS1307 alarm record at NV-RAM offset {}", self.alarm_base);
        for (i, byte) in bytes.iter().enumerate() {
            debug!("mem[{}]={:?}", usize::from(self.alarm_base) + i, byte);
        }
        Ok(bytes)
    }
}

macro_rules! set_and_get_register {
    ($(($name:ident, $regaddr:expr, $typ:ty)),+) => {
        impl<I2C: I2c> DS1307<I2C> {
            $(
                paste! {
                    #[doc = concat!("Gets the value of the ", stringify!($name), " register.")]
                    pub fn $name(&mut self) -> Result<$typ, DS1307Error<I2C::Error>> {
                        let mut data = [0];
                        self.i2c
                            .write_read(self.address, &[$regaddr as u8], &mut data)?;
                        Ok($typ(data[0]))
                    }

                    #[doc = concat!("Sets the value of the ", stringify!($name), " register.")]
                    pub fn [<set_ $name>](&mut self, value: $typ) -> Result<(), DS1307Error<I2C::Error>> {
                        self.i2c.write(
                            self.address,
                            &[$regaddr as u8, value.into()],
                        )?;
                        Ok(())
                    }
                }
            )+
        }
    }
}

set_and_get_register!(
    (second, RegAddr::Seconds, Seconds),
    (minute, RegAddr::Minutes, Minutes),
    (hour, RegAddr::Hours, Hours),
    (day, RegAddr::Day, Day),
    (date, RegAddr::Date, Date),
    (month, RegAddr::Month, Month),
    (year, RegAddr::Year, Year),
    (control, RegAddr::Control, Control)
);

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTrans};

    const DEVICE_ADDRESS: u8 = 0x68;

    fn setup_mock(expectations: &[I2cTrans]) -> I2cMock {
        I2cMock::new(expectations)
    }

    fn read_record(record: [u8; ALARM_RECORD_LEN]) -> I2cTrans {
        I2cTrans::write_read(DEVICE_ADDRESS, vec![NVRAM_START], record.to_vec())
    }

    fn write_alarms(bytes: [u8; ALARM_RECORD_LEN - 1]) -> I2cTrans {
        let mut frame = vec![NVRAM_START + 1];
        frame.extend_from_slice(&bytes);
        I2cTrans::write(DEVICE_ADDRESS, frame)
    }

    const EMPTY_RECORD: [u8; ALARM_RECORD_LEN] = [0xA5, 0, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];

    #[test]
    fn test_is_present() {
        let mut dev = DS1307::new(
            setup_mock(&[
                I2cTrans::write(DEVICE_ADDRESS, vec![0x00]),
                I2cTrans::write(DEVICE_ADDRESS, vec![0x00]).with_error(ErrorKind::Other),
            ]),
            DEVICE_ADDRESS,
        );
        assert!(dev.is_present());
        assert!(!dev.is_present());
        dev.i2c.done();
    }

    #[test]
    fn test_read_datetime() {
        // 2024-03-14 15:30:00, day register wrong on purpose
        let mut dev = DS1307::new(
            setup_mock(&[I2cTrans::write_read(
                DEVICE_ADDRESS,
                vec![RegAddr::Seconds as u8],
                vec![0x00, 0x30, 0x15, 0x01, 0x14, 0x03, 0x24],
            )]),
            DEVICE_ADDRESS,
        );
        let dt = dev.datetime().unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 3, 14));
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (15, 30, 0));
        assert_eq!(dt.day_of_week(), 4);
        assert_eq!(dt.epoch_seconds(), 763_745_400);
        dev.i2c.done();
    }

    #[test]
    fn test_read_datetime_while_halted() {
        let mut dev = DS1307::new(
            setup_mock(&[I2cTrans::write_read(
                DEVICE_ADDRESS,
                vec![RegAddr::Seconds as u8],
                vec![0x80 | 0x45, 0x30, 0x15, 0x05, 0x14, 0x03, 0x24],
            )]),
            DEVICE_ADDRESS,
        );
        assert_eq!(dev.datetime().unwrap().second(), 45);
        dev.i2c.done();
    }

    #[test]
    fn test_read_invalid_datetime() {
        let mut dev = DS1307::new(
            setup_mock(&[I2cTrans::write_read(
                DEVICE_ADDRESS,
                vec![RegAddr::Seconds as u8],
                vec![0x00, 0x00, 0x00, 0x01, 0x31, 0x02, 0x24],
            )]),
            DEVICE_ADDRESS,
        );
        assert!(matches!(
            dev.datetime(),
            Err(DS1307Error::DateTime(DS1307DateTimeError::InvalidDateTime))
        ));
        dev.i2c.done();
    }

    #[test]
    fn test_set_datetime() {
        let dt = DateTime::from_ymd_hms(2024, 3, 14, 15, 30, 5).unwrap();
        let mut dev = DS1307::new(
            setup_mock(&[
                I2cTrans::write(
                    DEVICE_ADDRESS,
                    vec![
                        RegAddr::Seconds as u8,
                        0x85, // seconds with CH set
                        0x30,
                        0x15,
                        0x05, // Thursday
                        0x14,
                        0x03,
                        0x24,
                    ],
                ),
                I2cTrans::write_read(DEVICE_ADDRESS, vec![RegAddr::Seconds as u8], vec![0x85]),
                I2cTrans::write(DEVICE_ADDRESS, vec![RegAddr::Seconds as u8, 0x05]),
            ]),
            DEVICE_ADDRESS,
        );
        dev.set_datetime(&dt).unwrap();
        dev.i2c.done();
    }

    #[test]
    fn test_set_datetime_rejects_year_beyond_register() {
        let dt = DateTime::from_ymd_hms(2100, 1, 1, 0, 0, 0).unwrap();
        let mut dev = DS1307::new(setup_mock(&[]), DEVICE_ADDRESS);
        assert!(matches!(
            dev.set_datetime(&dt),
            Err(DS1307Error::DateTime(DS1307DateTimeError::YearOutOfRange(2100)))
        ));
        dev.i2c.done();
    }

    #[test]
    fn test_initialize_clock_writes_token() {
        let dt = DateTime::from_build_strings("Dec 26 2009", "12:34:56").unwrap();
        let mut dev = DS1307::new(
            setup_mock(&[
                I2cTrans::write(
                    DEVICE_ADDRESS,
                    vec![0x00, 0xD6, 0x34, 0x12, 0x07, 0x26, 0x12, 0x09],
                ),
                I2cTrans::write_read(DEVICE_ADDRESS, vec![0x00], vec![0xD6]),
                I2cTrans::write(DEVICE_ADDRESS, vec![0x00, 0x56]),
                I2cTrans::write(DEVICE_ADDRESS, vec![NVRAM_START, CLOCK_SET_TOKEN]),
            ]),
            DEVICE_ADDRESS,
        );
        dev.initialize_clock(&dt).unwrap();
        dev.i2c.done();
    }

    #[test]
    fn test_initialize_clock_skips_token_on_failure() {
        let dt = DateTime::from_ymd_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut dev = DS1307::new(
            setup_mock(&[I2cTrans::write(
                DEVICE_ADDRESS,
                vec![0x00, 0x80, 0x00, 0x00, 0x02, 0x01, 0x01, 0x24],
            )
            .with_error(ErrorKind::Other)]),
            DEVICE_ADDRESS,
        );
        assert!(matches!(
            dev.initialize_clock(&dt),
            Err(DS1307Error::I2c(ErrorKind::Other))
        ));
        dev.i2c.done();
    }

    #[test]
    fn test_stop_and_start_clock() {
        let mut dev = DS1307::new(
            setup_mock(&[
                I2cTrans::write_read(DEVICE_ADDRESS, vec![0x00], vec![0x42]),
                I2cTrans::write(DEVICE_ADDRESS, vec![0x00, 0xC2]),
                I2cTrans::write_read(DEVICE_ADDRESS, vec![0x00], vec![0xC2]),
                I2cTrans::write(DEVICE_ADDRESS, vec![0x00, 0x42]),
            ]),
            DEVICE_ADDRESS,
        );
        dev.stop_clock().unwrap();
        dev.start_clock().unwrap();
        dev.i2c.done();
    }

    #[test]
    fn test_configure() {
        let config = Config {
            time_representation: TimeRepresentation::TwelveHour,
            square_wave_enable: true,
            square_wave_frequency: SquareWaveFrequency::Hz1,
            output_level: false,
        };
        let mut dev = DS1307::new(
            setup_mock(&[
                I2cTrans::write(DEVICE_ADDRESS, vec![RegAddr::Control as u8, 0b0001_0000]),
                I2cTrans::write_read(
                    DEVICE_ADDRESS,
                    vec![RegAddr::Seconds as u8],
                    vec![0x00, 0x30, 0x15, 0x05, 0x14, 0x03, 0x24],
                ),
                // 15h is 3 PM in 12-hour mode
                I2cTrans::write(DEVICE_ADDRESS, vec![RegAddr::Hours as u8, 0x63]),
            ]),
            DEVICE_ADDRESS,
        );
        dev.configure(&config).unwrap();
        assert_eq!(dev.time_representation, TimeRepresentation::TwelveHour);
        dev.i2c.done();
    }

    #[test]
    fn test_nvram_bounds() {
        let mut dev = DS1307::new(
            setup_mock(&[
                I2cTrans::write_read(DEVICE_ADDRESS, vec![0x3F], vec![0x11]),
                I2cTrans::write(DEVICE_ADDRESS, vec![0x08, 1, 2, 3]),
            ]),
            DEVICE_ADDRESS,
        );
        let mut last = [0];
        dev.read_nvram(55, &mut last).unwrap();
        assert_eq!(last, [0x11]);
        dev.write_nvram(0, &[1, 2, 3]).unwrap();
        assert!(matches!(
            dev.read_nvram(55, &mut [0, 0]),
            Err(DS1307Error::NvramOutOfRange { offset: 55, len: 2 })
        ));
        assert!(matches!(
            dev.write_nvram(56, &[0]),
            Err(DS1307Error::NvramOutOfRange { offset: 56, len: 1 })
        ));
        dev.i2c.done();
    }

    #[test]
    fn test_with_alarm_base() {
        let mut dev = DS1307::with_alarm_base(
            setup_mock(&[I2cTrans::write_read(DEVICE_ADDRESS, vec![0x08 + 47], vec![0xA5])]),
            DEVICE_ADDRESS,
            47,
        )
        .unwrap();
        assert!(dev.is_clock_set().unwrap());
        dev.i2c.done();

        let mut mock = setup_mock(&[]);
        assert!(matches!(
            DS1307::with_alarm_base(mock.clone(), DEVICE_ADDRESS, 48),
            Err(DS1307Error::NvramOutOfRange { offset: 48, len: 9 })
        ));
        mock.done();
    }

    #[test]
    fn test_clock_set_token() {
        let mut dev = DS1307::new(
            setup_mock(&[
                I2cTrans::write_read(DEVICE_ADDRESS, vec![NVRAM_START], vec![0xFF]),
                I2cTrans::write_read(DEVICE_ADDRESS, vec![NVRAM_START], vec![0x00]),
                I2cTrans::write(DEVICE_ADDRESS, vec![NVRAM_START, 0xA5]),
                I2cTrans::write_read(DEVICE_ADDRESS, vec![NVRAM_START], vec![0xA5]),
            ]),
            DEVICE_ADDRESS,
        );
        assert!(!dev.is_clock_set().unwrap());
        assert!(!dev.is_clock_set().unwrap());
        dev.mark_clock_set().unwrap();
        assert!(dev.is_clock_set().unwrap());
        dev.i2c.done();
    }

    #[test]
    fn test_set_alarm_at_writes_record_in_one_transaction() {
        let mut dev = DS1307::new(
            setup_mock(&[
                read_record(EMPTY_RECORD),
                write_alarms([0b0000_1000, 0xFF, 0xFF, 0xFF, 30, 0xFF, 0xFF, 0xFF]),
            ]),
            DEVICE_ADDRESS,
        );
        dev.set_alarm_at(3, 6, 30).unwrap();
        dev.i2c.done();
    }

    #[test]
    fn test_set_alarm_keeps_other_days() {
        let mut record = EMPTY_RECORD;
        record[1] = 0b0000_0010;
        record[3] = 12;
        let mut dev = DS1307::new(
            setup_mock(&[
                read_record(record),
                write_alarms([0b0100_0010, 0xFF, 12, 0xFF, 0xFF, 0xFF, 0xFF, 95]),
            ]),
            DEVICE_ADDRESS,
        );
        dev.set_alarm(6, 95).unwrap();
        dev.i2c.done();
    }

    #[test]
    fn test_set_alarm_rejects_invalid_input_without_io() {
        let mut dev = DS1307::new(setup_mock(&[]), DEVICE_ADDRESS);
        assert!(matches!(
            dev.set_alarm(7, 10),
            Err(DS1307Error::Alarm(AlarmError::InvalidWeekday(7)))
        ));
        assert!(matches!(
            dev.set_alarm(1, 96),
            Err(DS1307Error::Alarm(AlarmError::InvalidCode(96)))
        ));
        assert!(matches!(
            dev.set_alarm_at(1, 3, 0),
            Err(DS1307Error::Alarm(AlarmError::InvalidTime(_)))
        ));
        assert!(matches!(
            dev.set_alarm_at(1, 20, 0),
            Err(DS1307Error::Alarm(AlarmError::InvalidTime(_)))
        ));
        assert!(matches!(
            dev.clear_alarm(7),
            Err(DS1307Error::Alarm(AlarmError::InvalidWeekday(7)))
        ));
        dev.i2c.done();
    }

    #[test]
    fn test_set_alarm_read_failure_writes_nothing() {
        let mut dev = DS1307::new(
            setup_mock(&[I2cTrans::write_read(
                DEVICE_ADDRESS,
                vec![NVRAM_START],
                EMPTY_RECORD.to_vec(),
            )
            .with_error(ErrorKind::Other)]),
            DEVICE_ADDRESS,
        );
        assert!(matches!(
            dev.set_alarm_at(3, 6, 30),
            Err(DS1307Error::I2c(ErrorKind::Other))
        ));
        dev.i2c.done();
    }

    #[test]
    fn test_late_morning_alarm_fires() {
        let mut stored = EMPTY_RECORD;
        stored[1] = 0b0000_1000;
        stored[5] = 72;
        let mut dev = DS1307::new(
            setup_mock(&[
                read_record(EMPTY_RECORD),
                write_alarms([0b0000_1000, 0xFF, 0xFF, 0xFF, 72, 0xFF, 0xFF, 0xFF]),
                read_record(stored),
                read_record(stored),
            ]),
            DEVICE_ADDRESS,
        );
        dev.set_alarm_at(3, 10, 0).unwrap();
        // 2024-03-13 is a Wednesday
        let before = DateTime::from_ymd_hms(2024, 3, 13, 9, 55, 0).unwrap();
        let after = DateTime::from_ymd_hms(2024, 3, 13, 11, 0, 0).unwrap();
        assert!(!dev.is_alarm_due(&before, &|| 1u64).unwrap());
        assert!(dev.is_alarm_due(&after, &|| 2u64).unwrap());
        dev.i2c.done();
    }

    #[test]
    fn test_midnight_rearm_survives_read_failure() {
        let mut record = EMPTY_RECORD;
        record[1] = 0b0000_1000;
        record[5] = 30;
        let mut dev = DS1307::new(
            setup_mock(&[
                read_record(record),
                I2cTrans::write_read(DEVICE_ADDRESS, vec![NVRAM_START], record.to_vec())
                    .with_error(ErrorKind::Other),
            ]),
            DEVICE_ADDRESS,
        );
        let wed = DateTime::from_ymd_hms(2024, 3, 13, 6, 35, 0).unwrap();
        let midnight = DateTime::from_ymd_hms(2024, 3, 14, 0, 0, 0).unwrap();
        assert!(dev.is_alarm_due(&wed, &|| 5u64).unwrap());
        assert_eq!(dev.trigger.last_triggered(), Some(5));
        assert!(matches!(
            dev.is_alarm_due(&midnight, &|| 6u64),
            Err(DS1307Error::I2c(ErrorKind::Other))
        ));
        assert_eq!(dev.trigger.last_triggered(), None);
        dev.i2c.done();
    }

    #[test]
    fn test_set_datetime_rejects_impossible_date_without_io() {
        let mut dev = DS1307::new(setup_mock(&[]), DEVICE_ADDRESS);
        let mut dt = DateTime::default();
        dt.fill_by_ymd(2024, 2, 31);
        assert!(matches!(
            dev.set_datetime(&dt),
            Err(DS1307Error::DateTime(DS1307DateTimeError::InvalidDateTime))
        ));
        dt.fill_by_ymd(2024, 0, 10);
        assert!(matches!(
            dev.set_datetime(&dt),
            Err(DS1307Error::DateTime(DS1307DateTimeError::InvalidDateTime))
        ));
        dt.fill_by_ymd(2024, 5, 0);
        assert!(matches!(
            dev.initialize_clock(&dt),
            Err(DS1307Error::DateTime(DS1307DateTimeError::InvalidDateTime))
        ));
        dev.i2c.done();
    }

    #[test]
    fn test_alarm_due_sequence() {
        let mut record = EMPTY_RECORD;
        record[1] = 0b0000_1000;
        record[5] = 30;
        let mut cleared = EMPTY_RECORD;
        cleared[1] = 0;
        let mut expectations = vec![];
        // 06:25, 06:35, 06:35 again, 00:00 next day, 06:35 a week later
        for _ in 0..5 {
            expectations.push(read_record(record));
        }
        // clear_alarm(3)
        expectations.push(read_record(record));
        expectations.push(write_alarms([0, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]));
        expectations.push(read_record(cleared));
        expectations.push(read_record(cleared));

        let mut dev = DS1307::new(setup_mock(&expectations), DEVICE_ADDRESS);
        let clock = || 42u64;
        // 2024-03-13 is a Wednesday
        let wed = |hour, minute| DateTime::from_ymd_hms(2024, 3, 13, hour, minute, 0).unwrap();
        let thu = DateTime::from_ymd_hms(2024, 3, 14, 0, 0, 0).unwrap();

        assert!(!dev.is_alarm_due(&wed(6, 25), &clock).unwrap());
        assert!(dev.is_alarm_due(&wed(6, 35), &clock).unwrap());
        assert!(!dev.is_alarm_due(&wed(6, 35), &clock).unwrap());
        assert!(!dev.is_alarm_due(&thu, &clock).unwrap());
        assert!(dev.is_alarm_due(&wed(6, 35), &clock).unwrap());

        dev.clear_alarm(3).unwrap();
        dev.trigger.rearm();
        assert!(!dev.is_alarm_due(&wed(6, 35), &clock).unwrap());
        assert!(!dev.is_alarm_due(&wed(11, 0), &clock).unwrap());
        dev.i2c.done();
    }

    #[test]
    fn test_clear_all_alarms() {
        let mut dev = DS1307::new(
            setup_mock(&[write_alarms([0, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF])]),
            DEVICE_ADDRESS,
        );
        dev.clear_all_alarms().unwrap();
        dev.i2c.done();
    }

    #[test]
    fn test_alarm_schedule_and_dump() {
        let record = [0xA5, 0b0000_0011, 0, 95, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        let mut dev = DS1307::new(
            setup_mock(&[read_record(record), read_record(record)]),
            DEVICE_ADDRESS,
        );
        let schedule = dev.alarm_schedule().unwrap();
        assert!(schedule.is_clock_set());
        assert_eq!(schedule.alarm(0), Some(AlarmCode::new(0).unwrap()));
        assert_eq!(schedule.alarm(1).map(|c| (c.hour(), c.minute())), Some((11, 55)));
        assert_eq!(schedule.alarm(2), None);
        assert_eq!(dev.dump_alarm_record().unwrap(), record);
        dev.i2c.done();
    }

    #[test]
    fn test_register_accessors() {
        let mut dev = DS1307::new(
            setup_mock(&[
                I2cTrans::write_read(DEVICE_ADDRESS, vec![RegAddr::Control as u8], vec![0x93]),
                I2cTrans::write(DEVICE_ADDRESS, vec![RegAddr::Control as u8, 0x80]),
                I2cTrans::write_read(DEVICE_ADDRESS, vec![RegAddr::Year as u8], vec![0x24]),
            ]),
            DEVICE_ADDRESS,
        );
        let control = dev.control().unwrap();
        assert!(control.square_wave_enable());
        assert_eq!(
            control.square_wave_frequency(),
            SquareWaveFrequency::Hz32768
        );
        dev.set_control(Control(0x80)).unwrap();
        let year = dev.year().unwrap();
        assert_eq!((year.ten_year(), year.year()), (2, 4));
        let mut i2c = dev.release();
        i2c.done();
    }
}
