// Copyright (C) 2025 Paul Hampson
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License version 3 as  published by the
// Free Software Foundation.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <https://www.gnu.org/licenses/>.

use crate::application::config::ScaleConfig;
use crate::command::dispatcher::CommandDispatcher;
use crate::storage::records::{load_record, record_exists, save_record, ScaleUnitRecord, TareRecord};
use crate::storage::{RecordStore, StorageError};
use crate::weight::{WeighingError, WeighingSystem, WeightReading};
use core::fmt::Write as _;
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_io::ReadReady;
use embedded_io_async::{Read, Write};
use heapless::String;

/// Largest inbound chunk handled as one command
pub const COMMAND_BUFFER_SIZE: usize = 64;
pub const REPORT_CAPACITY: usize = 48;

pub type Report = String<REPORT_CAPACITY>;

/// `"<grams>;<controller id>"`
pub fn format_report(reading: WeightReading, controller_id: &str) -> Option<Report> {
    let mut report = Report::new();
    write!(report, "{};{}", reading, controller_id).ok()?;
    Some(report)
}

/// Owns the weighing system, record store, serial link and indicator, and runs the scale's
/// poll, weigh, report and blink cycle.
pub struct ScaleController<WS, S, SER, LED, D> {
    weighing: WS,
    store: S,
    serial: SER,
    led: LED,
    delay: D,
    config: ScaleConfig,
    dispatcher: CommandDispatcher,
    last_reading: WeightReading,
}

impl<WS, S, SER, LED, D> ScaleController<WS, S, SER, LED, D>
where
    WS: WeighingSystem<Error = WeighingError>,
    S: RecordStore,
    SER: ReadReady + Read + Write,
    LED: OutputPin,
    D: DelayNs,
{
    /// Restores the calibration from the store, taking and saving a fresh tare when there is
    /// none. Fails only when the fresh tare cannot be sampled.
    pub async fn initialize(
        weighing: WS,
        store: S,
        serial: SER,
        led: LED,
        delay: D,
        config: ScaleConfig,
    ) -> Result<Self, WeighingError> {
        let dispatcher = CommandDispatcher::new(config.tare_samples, config.scale_samples);
        let mut controller = Self {
            weighing,
            store,
            serial,
            led,
            delay,
            config,
            dispatcher,
            last_reading: WeightReading::ZERO,
        };

        controller.restore_tare().await?;
        controller.restore_scale().await?;

        let calibration = controller.weighing.calibration();
        info!(
            "Scale {} ready: offset {}, scale {}, unit {}",
            controller.config.controller_id.as_str(),
            calibration.offset,
            calibration.scale,
            calibration.unit
        );
        Ok(controller)
    }

    pub fn weighing(&self) -> &WS {
        &self.weighing
    }

    pub fn weighing_mut(&mut self) -> &mut WS {
        &mut self.weighing
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn serial(&self) -> &SER {
        &self.serial
    }

    pub fn serial_mut(&mut self) -> &mut SER {
        &mut self.serial
    }

    pub fn led(&self) -> &LED {
        &self.led
    }

    pub fn delay(&self) -> &D {
        &self.delay
    }

    pub fn config(&self) -> &ScaleConfig {
        &self.config
    }

    /// Last reading that was taken successfully
    pub fn last_reading(&self) -> WeightReading {
        self.last_reading
    }

    async fn restore_tare(&mut self) -> Result<(), WeighingError> {
        // a record that could not be read may still be valid and is left in place
        let mut persist = true;
        let stored = match record_exists::<TareRecord, _>(&mut self.store).await {
            Ok(true) => match load_record::<TareRecord, _>(&mut self.store).await {
                Ok(record) => Some(record),
                Err(StorageError::MalformedRecord) => None,
                Err(e) => {
                    warn!("Unable to read tare record: {}", e);
                    persist = false;
                    None
                }
            },
            Ok(false) => None,
            Err(e) => {
                warn!("Unable to look up tare record: {}", e);
                persist = false;
                None
            }
        };

        if let Some(record) = stored {
            self.weighing
                .tare(self.config.tare_samples, Some(record.offset))
                .await?;
            return Ok(());
        }

        info!("No usable tare record, taring the empty platform");
        let offset = self.weighing.tare(self.config.tare_samples, None).await?;
        if persist {
            if let Err(e) = save_record(&mut self.store, &TareRecord { offset }).await {
                warn!("Tare not saved: {}", e);
            }
        }
        self.delay.delay_ms(self.config.tare_settle_ms).await;
        Ok(())
    }

    async fn restore_scale(&mut self) -> Result<(), WeighingError> {
        let defaults = ScaleUnitRecord {
            scale: self.config.default_scale,
            unit: self.config.default_unit,
        };

        match record_exists::<ScaleUnitRecord, _>(&mut self.store).await {
            Ok(true) => {}
            Ok(false) => {
                info!("No scale_unit record, saving defaults");
                self.save_scale_unit(&defaults).await;
            }
            Err(e) => warn!("Unable to look up scale_unit record: {}", e),
        }

        let stored = match load_record::<ScaleUnitRecord, _>(&mut self.store).await {
            Ok(record) => Some(record),
            Err(StorageError::MalformedRecord) => {
                self.save_scale_unit(&defaults).await;
                None
            }
            Err(_) => None,
        };

        if let Some(record) = stored {
            let applied = self
                .weighing
                .scale(self.config.scale_samples, Some(record.scale), Some(record.unit))
                .await;
            match applied {
                Ok(_) => return Ok(()),
                Err(WeighingError::InvalidCalibration) => {
                    warn!("Stored scale factor {} unusable, restoring defaults", record.scale);
                    self.save_scale_unit(&defaults).await;
                }
                Err(e) => return Err(e),
            }
        }

        self.weighing
            .scale(self.config.scale_samples, Some(defaults.scale), Some(defaults.unit))
            .await?;
        Ok(())
    }

    async fn save_scale_unit(&mut self, record: &ScaleUnitRecord) {
        if let Err(e) = save_record(&mut self.store, record).await {
            warn!("scale_unit not saved: {}", e);
        }
    }

    /// One pass of the main loop: handle a pending command, wait, weigh, report and blink.
    pub async fn step(&mut self) {
        self.poll_commands().await;
        self.delay.delay_ms(self.config.sample_delay_ms).await;
        let reading = self.take_reading().await;
        self.report(reading).await;
        self.blink().await;
    }

    pub async fn run(mut self) -> ! {
        info!("Entering main loop");
        loop {
            self.step().await;
        }
    }

    async fn poll_commands(&mut self) {
        match self.serial.read_ready() {
            Ok(true) => {}
            Ok(false) => return,
            Err(_) => {
                warn!("Serial status unavailable");
                return;
            }
        }

        let mut buffer = [0u8; COMMAND_BUFFER_SIZE];
        let received = match self.serial.read(&mut buffer).await {
            Ok(0) => return,
            Ok(received) => received,
            Err(_) => {
                warn!("Serial read failed");
                return;
            }
        };

        let handled = self
            .dispatcher
            .handle(&buffer[..received], &mut self.weighing, &mut self.store)
            .await;
        match handled {
            Ok(None) => return,
            Ok(Some(_)) => {}
            Err(e) => warn!("Command failed: {}", e),
        }
        self.delay.delay_ms(self.config.command_settle_ms).await;
    }

    /// Retries a failed reading a bounded number of times, then repeats the last good one.
    async fn take_reading(&mut self) -> WeightReading {
        for attempt in 0..=self.config.read_retries {
            match self.weighing.get_reading().await {
                Ok(reading) => {
                    self.last_reading = reading;
                    return reading;
                }
                Err(e) => warn!("Reading attempt {} failed: {}", attempt, e),
            }
        }
        warn!("Reporting last known weight {}", self.last_reading);
        self.last_reading
    }

    async fn report(&mut self, reading: WeightReading) {
        let Some(report) = format_report(reading, self.config.controller_id.as_str()) else {
            warn!("Report does not fit");
            return;
        };
        if self.serial.write_all(report.as_bytes()).await.is_err() {
            warn!("Report not sent");
        }
    }

    async fn blink(&mut self) {
        if self.led.set_high().is_err() {
            warn!("Indicator unavailable");
        }
        self.delay.delay_ms(self.config.blink_on_ms).await;
        let _ = self.led.set_low();
        self.delay.delay_ms(self.config.blink_off_ms).await;
    }
}
