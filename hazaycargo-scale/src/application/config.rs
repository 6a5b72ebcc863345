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

use crate::weight::calibration::DEFAULT_CALIBRATION_SAMPLES;
use core::fmt::Write;
use heapless::String;

pub const CONTROLLER_ID_CAPACITY: usize = 32;
pub const CONTROLLER_ID_PREFIX: &str = "hazay_";
pub const DEFAULT_ID_VERSION: &str = "001";

pub const DEFAULT_SCALE: f32 = 33150.0;
pub const DEFAULT_UNIT: i32 = 1556;

pub type ControllerId = String<CONTROLLER_ID_CAPACITY>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    ControllerIdTooLong,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScaleConfig {
    /// Appended to every weight report and used as the radio name
    pub controller_id: ControllerId,
    pub tare_samples: usize,
    pub scale_samples: usize,
    /// Used when no scale_unit record exists or the stored one is unusable
    pub default_scale: f32,
    pub default_unit: i32,
    pub sample_delay_ms: u32,
    pub blink_on_ms: u32,
    pub blink_off_ms: u32,
    pub command_settle_ms: u32,
    pub tare_settle_ms: u32,
    /// Extra attempts at a reading before the last good one is reported again
    pub read_retries: u8,
}

impl ScaleConfig {
    /// Configuration with the id `hazay_<id_version>`.
    pub fn new(id_version: &str) -> Result<Self, ConfigError> {
        let mut controller_id = ControllerId::new();
        write!(controller_id, "{}{}", CONTROLLER_ID_PREFIX, id_version)
            .map_err(|_| ConfigError::ControllerIdTooLong)?;
        Ok(Self::with_controller_id(controller_id))
    }

    fn with_controller_id(controller_id: ControllerId) -> Self {
        Self {
            controller_id,
            tare_samples: DEFAULT_CALIBRATION_SAMPLES,
            scale_samples: DEFAULT_CALIBRATION_SAMPLES,
            default_scale: DEFAULT_SCALE,
            default_unit: DEFAULT_UNIT,
            sample_delay_ms: 100,
            blink_on_ms: 200,
            blink_off_ms: 200,
            command_settle_ms: 500,
            tare_settle_ms: 500,
            read_retries: 2,
        }
    }
}

impl Default for ScaleConfig {
    fn default() -> Self {
        let mut controller_id = ControllerId::new();
        // prefix and default version always fit
        let _ = write!(controller_id, "{}{}", CONTROLLER_ID_PREFIX, DEFAULT_ID_VERSION);
        Self::with_controller_id(controller_id)
    }
}
