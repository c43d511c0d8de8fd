//! Async implementation of the DS1307 driver.
//!
//! This module provides an async interface to the DS1307 RTC and its NV-RAM
//! alarm record using `embedded-hal-async` traits. It is only available when
//! the `async` feature is enabled.
//!
//! # Example
//!
//! ```rust,ignore
//! use ds1307_alarm::asynch::DS1307;
//!
//! let mut rtc = DS1307::new(i2c, 0x68);
//! let now = rtc.datetime().await?;
//! if rtc.is_alarm_due(&now, &|| ticks()).await? {
//!     ring().await;
//! }
//! ```

use embedded_hal_async::i2c::I2c;
use paste::paste;

use crate::alarm::{check_weekday, ACTIVE_DAYS_OFFSET, TOKEN_OFFSET};
use crate::datetime::DS1307DateTime;
use crate::{
    check_alarm_base, halted_datetime_frame, nvram_register, AlarmCode, AlarmSchedule,
    AlarmTrigger, Config, Control, DS1307Error, Date, DateTime, Day, Hours, Minutes, Monotonic,
    Month, RegAddr, Seconds, TimeRepresentation, Year, ALARM_RECORD_LEN, CLOCK_SET_TOKEN,
    NVRAM_SIZE,
};

/// DS1307 Real-Time Clock async driver.
///
/// Same operations as [`crate::DS1307`], driven through `embedded-hal-async`.
pub struct DS1307<I2C: I2c> {
    i2c: I2C,
    address: u8,
    alarm_base: u8,
    time_representation: TimeRepresentation,
    trigger: AlarmTrigger,
}

impl<I2C: I2c> DS1307<I2C> {
    /// Creates a new DS1307 async driver instance with the alarm record at NV-RAM offset 0.
    ///
    /// # Arguments
    /// * `i2c` - The async I2C bus implementation
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
    pub async fn is_present(&mut self) -> bool {
        self.i2c
            .write(self.address, &[RegAddr::Seconds as u8])
            .await
            .is_ok()
    }

    /// Configures the device according to the provided configuration.
    pub async fn configure(&mut self, config: &Config) -> Result<(), DS1307Error<I2C::Error>> {
        let mut control = Control::default();
        control.set_output_level(config.output_level);
        control.set_square_wave_enable(config.square_wave_enable);
        control.set_square_wave_frequency(config.square_wave_frequency);
        debug!("DS1307: writing control: {:?}", control);
        self.set_control(control).await?;

        let now = self.datetime().await?;
        let converted = DS1307DateTime::from_datetime(&now, config.time_representation)
            .map_err(DS1307Error::DateTime)?;
        let hours = Hours(<[u8; 7]>::from(&converted)[RegAddr::Hours as usize]);
        debug!("DS1307: writing hours: {:?}", hours);
        self.set_hour(hours).await?;
        self.time_representation = config.time_representation;
        Ok(())
    }

    async fn read_raw_datetime(&mut self) -> Result<DS1307DateTime, DS1307Error<I2C::Error>> {
        let mut data = [0; 7];
        self.i2c
            .write_read(self.address, &[RegAddr::Seconds as u8], &mut data)
            .await?;
        Ok(data.into())
    }

    /// Gets the current date and time from the device.
    pub async fn datetime(&mut self) -> Result<DateTime, DS1307Error<I2C::Error>> {
        let raw = self.read_raw_datetime().await?;
        raw.into_datetime().map_err(DS1307Error::DateTime)
    }

    /// Sets the date and time and starts the oscillator.
    pub async fn set_datetime(
        &mut self,
        datetime: &DateTime,
    ) -> Result<(), DS1307Error<I2C::Error>> {
        let raw = DS1307DateTime::from_datetime(datetime, self.time_representation)
            .map_err(DS1307Error::DateTime)?;
        self.i2c
            .write(self.address, &halted_datetime_frame(&raw))
            .await?;
        self.start_clock().await
    }

    /// Sets the date and time, then records the clock-set token.
    pub async fn initialize_clock(
        &mut self,
        datetime: &DateTime,
    ) -> Result<(), DS1307Error<I2C::Error>> {
        self.set_datetime(datetime).await?;
        self.mark_clock_set().await?;
        debug!("DS1307: time set and token registered");
        Ok(())
    }

    /// Halts the oscillator by setting the CH bit.
    pub async fn stop_clock(&mut self) -> Result<(), DS1307Error<I2C::Error>> {
        let mut seconds = self.second().await?;
        seconds.set_clock_halt(true);
        self.set_second(seconds).await
    }

    /// Starts the oscillator by clearing the CH bit.
    pub async fn start_clock(&mut self) -> Result<(), DS1307Error<I2C::Error>> {
        let mut seconds = self.second().await?;
        seconds.set_clock_halt(false);
        self.set_second(seconds).await
    }

    /// Reads NV-RAM starting at `offset` into `buf`.
    pub async fn read_nvram(
        &mut self,
        offset: u8,
        buf: &mut [u8],
    ) -> Result<(), DS1307Error<I2C::Error>> {
        let reg = nvram_register(offset, buf.len())?;
        self.i2c.write_read(self.address, &[reg], buf).await?;
        Ok(())
    }

    /// Writes `data` to NV-RAM starting at `offset` in a single transaction.
    pub async fn write_nvram(
        &mut self,
        offset: u8,
        data: &[u8],
    ) -> Result<(), DS1307Error<I2C::Error>> {
        let reg = nvram_register(offset, data.len())?;
        let mut frame = [0u8; NVRAM_SIZE + 1];
        frame[0] = reg;
        frame[1..=data.len()].copy_from_slice(data);
        self.i2c.write(self.address, &frame[..=data.len()]).await?;
        Ok(())
    }

    /// Reads the whole 9-byte alarm record.
    pub async fn alarm_schedule(&mut self) -> Result<AlarmSchedule, DS1307Error<I2C::Error>> {
        let mut bytes = [0; ALARM_RECORD_LEN];
        self.read_nvram(self.alarm_base, &mut bytes).await?;
        Ok(AlarmSchedule::from_bytes(bytes))
    }

    async fn write_alarms(
        &mut self,
        schedule: &AlarmSchedule,
    ) -> Result<(), DS1307Error<I2C::Error>> {
        self.write_nvram(self.alarm_base + ACTIVE_DAYS_OFFSET, &schedule.alarm_bytes())
            .await
    }

    /// Sets the alarm of `weekday` (0 = Sunday) to a raw alarm code (0-95).
    pub async fn set_alarm(&mut self, weekday: u8, code: u8) -> Result<(), DS1307Error<I2C::Error>> {
        let code = AlarmCode::new(code).map_err(DS1307Error::Alarm)?;
        self.set_alarm_code(weekday, code).await
    }

    /// Sets the alarm of `weekday` to `hour:minute`, 04:00 to 11:55.
    pub async fn set_alarm_at(
        &mut self,
        weekday: u8,
        hour: u8,
        minute: u8,
    ) -> Result<(), DS1307Error<I2C::Error>> {
        let code = AlarmCode::from_time(hour, minute).map_err(DS1307Error::Alarm)?;
        self.set_alarm_code(weekday, code).await
    }

    async fn set_alarm_code(
        &mut self,
        weekday: u8,
        code: AlarmCode,
    ) -> Result<(), DS1307Error<I2C::Error>> {
        check_weekday(weekday).map_err(DS1307Error::Alarm)?;
        let mut schedule = self.alarm_schedule().await?;
        schedule
            .set_alarm(weekday, code)
            .map_err(DS1307Error::Alarm)?;
        debug!(
            "DS1307: alarm set for day {} code={}",
            weekday,
            code.value()
        );
        self.write_alarms(&schedule).await
    }

    /// Clears the alarm of `weekday`.
    pub async fn clear_alarm(&mut self, weekday: u8) -> Result<(), DS1307Error<I2C::Error>> {
        check_weekday(weekday).map_err(DS1307Error::Alarm)?;
        let mut schedule = self.alarm_schedule().await?;
        schedule.clear_alarm(weekday).map_err(DS1307Error::Alarm)?;
        self.write_alarms(&schedule).await
    }

    /// Clears every alarm. The clock-set token is kept.
    pub async fn clear_all_alarms(&mut self) -> Result<(), DS1307Error<I2C::Error>> {
        self.write_alarms(&AlarmSchedule::default()).await
    }

    /// Returns true exactly once per day when today's alarm time has been reached.
    pub async fn is_alarm_due<M: Monotonic>(
        &mut self,
        now: &DateTime,
        clock: &M,
    ) -> Result<bool, DS1307Error<I2C::Error>> {
        // Re-arm before the read so a failed midnight poll still counts.
        self.trigger.rearm_at_midnight(now);
        let schedule = self.alarm_schedule().await?;
        Ok(self.trigger.poll(&schedule, now, clock))
    }

    /// Whether the clock-set token is present.
    pub async fn is_clock_set(&mut self) -> Result<bool, DS1307Error<I2C::Error>> {
        let mut token = [0];
        self.read_nvram(self.alarm_base + TOKEN_OFFSET, &mut token)
            .await?;
        Ok(token[0] == CLOCK_SET_TOKEN)
    }

    /// Records that the time has been deliberately set.
    pub async fn mark_clock_set(&mut self) -> Result<(), DS1307Error<I2C::Error>> {
        self.write_nvram(self.alarm_base + TOKEN_OFFSET, &[CLOCK_SET_TOKEN])
            .await
    }

    /// Reads the alarm record and logs every byte.
    pub async fn dump_alarm_record(
        &mut self,
    ) -> Result<[u8; ALARM_RECORD_LEN], DS1307Error<I2C::Error>> {
        let mut bytes = [0; ALARM_RECORD_LEN];
        self.read_nvram(self.alarm_base, &mut bytes).await?;
        for (i, byte) in bytes.iter().enumerate() {
            debug!("mem[{}]={:?}", usize::from(self.alarm_base) + i, byte);
        }
        Ok(bytes)
    }
}

// Register access implementations
macro_rules! impl_register_access {
    ($(($name:ident, $regaddr:expr, $typ:ty)),+) => {
        impl<I2C: I2c> DS1307<I2C> {
            $(
                paste! {
                    #[doc = concat!("Gets the value of the ", stringify!($name), " register.")]
                    pub async fn $name(&mut self) -> Result<$typ, DS1307Error<I2C::Error>> {
                        let mut data = [0];
                        self.i2c
                            .write_read(self.address, &[$regaddr as u8], &mut data)
                            .await?;
                        Ok($typ(data[0]))
                    }

                    #[doc = concat!("Sets the value of the ", stringify!($name), " register.")]
                    pub async fn [<set_ $name>](&mut self, value: $typ) -> Result<(), DS1307Error<I2C::Error>> {
                        self.i2c.write(
                            self.address,
                            &[$regaddr as u8, value.into()],
                        ).await?;
                        Ok(())
                    }
                }
            )+
        }
    }
}

impl_register_access!(
    (second, RegAddr::Seconds, Seconds),
    (minute, RegAddr::Minutes, Minutes),
    (hour, RegAddr::Hours, Hours),
    (day, RegAddr::Day, Day),
    (date, RegAddr::Date, Date),
    (month, RegAddr::Month, Month),
    (year, RegAddr::Year, Year),
    (control, RegAddr::Control, Control)
);
