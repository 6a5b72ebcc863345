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

use crate::command::Command;
use crate::storage::records::{save_record, ScaleUnitRecord, TareRecord};
use crate::storage::{RecordStore, StorageError};
use crate::weight::calibration::DEFAULT_CALIBRATION_SAMPLES;
use crate::weight::{WeighingError, WeighingSystem};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DispatchError {
    Weighing(WeighingError),
    Storage(StorageError),
}

impl From<WeighingError> for DispatchError {
    fn from(value: WeighingError) -> Self {
        DispatchError::Weighing(value)
    }
}

impl From<StorageError> for DispatchError {
    fn from(value: StorageError) -> Self {
        DispatchError::Storage(value)
    }
}

/// Runs serial commands against the weighing system and persists every calibration change
/// straight away.
pub struct CommandDispatcher {
    tare_samples: usize,
    scale_samples: usize,
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_CALIBRATION_SAMPLES, DEFAULT_CALIBRATION_SAMPLES)
    }
}

impl CommandDispatcher {
    pub fn new(tare_samples: usize, scale_samples: usize) -> Self {
        Self {
            tare_samples,
            scale_samples,
        }
    }

    /// Parses `buffer` and runs the command it holds. Returns the command that ran, `None`
    /// when the buffer was not a command.
    pub async fn handle<WS, S>(
        &self,
        buffer: &[u8],
        weighing: &mut WS,
        store: &mut S,
    ) -> Result<Option<Command>, DispatchError>
    where
        WS: WeighingSystem<Error = WeighingError>,
        S: RecordStore,
    {
        let Some(command) = Command::parse(buffer) else {
            trace!("Ignoring {} inbound bytes", buffer.len());
            return Ok(None);
        };
        self.dispatch(command, weighing, store).await?;
        Ok(Some(command))
    }

    pub async fn dispatch<WS, S>(
        &self,
        command: Command,
        weighing: &mut WS,
        store: &mut S,
    ) -> Result<(), DispatchError>
    where
        WS: WeighingSystem<Error = WeighingError>,
        S: RecordStore,
    {
        info!("Running command {}", command);
        match command {
            Command::Tare => {
                let offset = weighing.tare(self.tare_samples, None).await?;
                save_record(store, &TareRecord { offset }).await?;
            }
            Command::SetScaleWithReference(reference_grams) => {
                let (scale, unit) = weighing
                    .scale(self.scale_samples, None, Some(reference_grams))
                    .await?;
                save_record(store, &ScaleUnitRecord { scale, unit }).await?;
            }
        }
        Ok(())
    }
}
