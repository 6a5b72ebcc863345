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

use crate::weight::interface::AsyncStrainGaugeInterface;
use crate::weight::{CalibrationState, WeighingError, WeighingSystem, WeightReading};

pub const DEFAULT_CALIBRATION_SAMPLES: usize = 15;
pub const READING_SAMPLES: usize = 3;

/// Turns raw strain gauge conversions into grams using a tare offset, a scale factor and
/// the reference unit the factor was taken against.
pub struct Calibration<StrainGauge> {
    strain_gauge: StrainGauge,
    state: CalibrationState,
}

impl<StrainGauge, StrainGaugeE> Calibration<StrainGauge>
where
    StrainGauge: AsyncStrainGaugeInterface<Error = StrainGaugeE>,
    StrainGaugeE: Into<WeighingError>,
{
    pub async fn new(mut strain_gauge: StrainGauge) -> Result<Self, WeighingError> {
        strain_gauge.initialize().await.map_err(Into::into)?;
        Ok(Self {
            strain_gauge,
            state: CalibrationState::default(),
        })
    }

    pub fn strain_gauge(&self) -> &StrainGauge {
        &self.strain_gauge
    }

    pub fn strain_gauge_mut(&mut self) -> &mut StrainGauge {
        &mut self.strain_gauge
    }

    pub fn state(&self) -> CalibrationState {
        self.state
    }

    pub fn offset(&self) -> f32 {
        self.state.offset
    }

    pub fn scale_factor(&self) -> f32 {
        self.state.scale
    }

    pub fn unit(&self) -> i32 {
        self.state.unit
    }

    /// Mean of `samples` consecutive conversions. A sample count of zero is taken as one.
    pub async fn read_average(&mut self, samples: usize) -> Result<f32, WeighingError> {
        let samples = samples.max(1);
        // 24 bit samples, an i64 sum cannot overflow and keeps the mean exact
        let mut sum: i64 = 0;
        for _ in 0..samples {
            let reading = self
                .strain_gauge
                .get_next_reading()
                .await
                .map_err(Into::into)?;
            sum += reading as i64;
        }
        Ok((sum as f64 / samples as f64) as f32)
    }

    pub async fn tare(
        &mut self,
        samples: usize,
        known_offset: Option<f32>,
    ) -> Result<f32, WeighingError> {
        let offset = match known_offset {
            Some(offset) => offset,
            None => self.read_average(samples).await?,
        };
        self.state.offset = offset;
        debug!("Tare offset = {}", offset);
        Ok(offset)
    }

    /// Without `known_scale` the load on the platform is sampled and the tare offset removed.
    /// A zero scale factor is refused and leaves the previous calibration untouched.
    pub async fn scale(
        &mut self,
        samples: usize,
        known_scale: Option<f32>,
        known_unit: Option<i32>,
    ) -> Result<(f32, i32), WeighingError> {
        let scale = match known_scale {
            Some(scale) => scale,
            None => self.read_average(samples).await? - self.state.offset,
        };

        if scale == 0.0 || !scale.is_finite() {
            warn!("Refusing scale factor {}", scale);
            return Err(WeighingError::InvalidCalibration);
        }

        self.state.scale = scale;
        if let Some(unit) = known_unit {
            self.state.unit = unit;
        }
        debug!("Scale factor = {}, unit = {}", self.state.scale, self.state.unit);
        Ok((self.state.scale, self.state.unit))
    }

    pub async fn get_value(&mut self) -> Result<f32, WeighingError> {
        Ok(self.read_average(READING_SAMPLES).await? - self.state.offset)
    }

    pub async fn get_units(&mut self) -> Result<f32, WeighingError> {
        if self.state.scale == 0.0 {
            return Err(WeighingError::InvalidCalibration);
        }
        Ok(self.get_value().await? / self.state.scale)
    }

    pub async fn get_reading(&mut self) -> Result<WeightReading, WeighingError> {
        let grams = self.get_units().await? * self.state.unit as f32;
        trace!("Weight = {} g", grams);
        Ok(WeightReading::from_grams(grams))
    }
}

impl<StrainGauge, StrainGaugeE> WeighingSystem for Calibration<StrainGauge>
where
    StrainGauge: AsyncStrainGaugeInterface<Error = StrainGaugeE>,
    StrainGaugeE: Into<WeighingError>,
{
    type Error = WeighingError;

    async fn tare(&mut self, samples: usize, known_offset: Option<f32>) -> Result<f32, Self::Error> {
        Calibration::tare(self, samples, known_offset).await
    }

    async fn scale(
        &mut self,
        samples: usize,
        known_scale: Option<f32>,
        known_unit: Option<i32>,
    ) -> Result<(f32, i32), Self::Error> {
        Calibration::scale(self, samples, known_scale, known_unit).await
    }

    async fn get_reading(&mut self) -> Result<WeightReading, Self::Error> {
        Calibration::get_reading(self).await
    }

    fn calibration(&self) -> CalibrationState {
        self.state
    }
}
