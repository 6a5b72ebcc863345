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

use core::fmt;

pub mod calibration;
pub mod interface;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WeighingError {
    /// The converter never signalled a finished conversion
    DeviceNotReady,
    /// A GPIO used to talk to the converter failed
    StrainGaugeFault,
    /// The scale factor is zero, readings cannot be converted
    InvalidCalibration,
}

/// Calibration values that turn raw counts into weight.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationState {
    /// Raw count at zero load
    pub offset: f32,
    /// Raw counts per calibration unit, never zero once accepted
    pub scale: f32,
    /// Mass of the reference the scale factor was taken with, in grams
    pub unit: i32,
}

impl Default for CalibrationState {
    fn default() -> Self {
        Self {
            offset: 0.0,
            scale: 1.0,
            unit: 1,
        }
    }
}

/// A weight in whole grams. Loads below the tare reference read as zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WeightReading(u32);

impl WeightReading {
    pub const ZERO: WeightReading = WeightReading(0);
    /// Heavier loads saturate here
    pub const MAX: WeightReading = WeightReading(i32::MAX as u32);

    pub fn from_grams(grams: f32) -> Self {
        if grams.is_nan() || grams <= 0.0 {
            return Self::ZERO;
        }
        // micromath on every build, std's inherent round would shadow it in host tests
        let rounded = micromath::F32Ext::round(grams);
        Self(rounded as i32 as u32)
    }

    pub fn grams(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for WeightReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub trait WeighingSystem {
    type Error;

    /// Sets the zero-load offset. With `known_offset` no samples are taken.
    async fn tare(&mut self, samples: usize, known_offset: Option<f32>) -> Result<f32, Self::Error>;

    /// Sets the scale factor and reference unit. Without `known_scale` the factor is sampled
    /// from the load currently on the platform.
    async fn scale(
        &mut self,
        samples: usize,
        known_scale: Option<f32>,
        known_unit: Option<i32>,
    ) -> Result<(f32, i32), Self::Error>;

    async fn get_reading(&mut self) -> Result<WeightReading, Self::Error>;

    fn calibration(&self) -> CalibrationState;
}
