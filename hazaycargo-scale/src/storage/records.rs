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

use crate::storage::{RecordId, RecordStore, RecordText, StorageError};
use core::fmt::Write;

/// A calibration value with a fixed record name and a text encoding.
pub trait CalibrationRecord: Sized {
    const ID: RecordId;

    fn to_text(&self) -> Result<RecordText, StorageError>;

    fn parse(text: &str) -> Result<Self, StorageError>;
}

/// Zero-load raw count, stored as `"<offset>"`
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TareRecord {
    pub offset: f32,
}

/// Scale factor and reference mass, stored as `"<scale>:<unit>"`
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScaleUnitRecord {
    pub scale: f32,
    pub unit: i32,
}

impl CalibrationRecord for TareRecord {
    const ID: RecordId = RecordId::Tare;

    fn to_text(&self) -> Result<RecordText, StorageError> {
        let mut text = RecordText::new();
        write!(text, "{}", self.offset).map_err(|_| StorageError::RecordTooLong)?;
        Ok(text)
    }

    fn parse(text: &str) -> Result<Self, StorageError> {
        Ok(Self {
            offset: parse_finite(text)?,
        })
    }
}

impl CalibrationRecord for ScaleUnitRecord {
    const ID: RecordId = RecordId::ScaleUnit;

    fn to_text(&self) -> Result<RecordText, StorageError> {
        let mut text = RecordText::new();
        write!(text, "{}:{}", self.scale, self.unit).map_err(|_| StorageError::RecordTooLong)?;
        Ok(text)
    }

    fn parse(text: &str) -> Result<Self, StorageError> {
        let (scale, unit) = text.split_once(':').ok_or(StorageError::MalformedRecord)?;
        Ok(Self {
            scale: parse_finite(scale)?,
            unit: unit
                .trim()
                .parse::<i32>()
                .map_err(|_| StorageError::MalformedRecord)?,
        })
    }
}

fn parse_finite(text: &str) -> Result<f32, StorageError> {
    match text.trim().parse::<f32>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(StorageError::MalformedRecord),
    }
}

pub async fn record_exists<R, S>(store: &mut S) -> Result<bool, StorageError>
where
    R: CalibrationRecord,
    S: RecordStore,
{
    store.exists(R::ID).await
}

pub async fn load_record<R, S>(store: &mut S) -> Result<R, StorageError>
where
    R: CalibrationRecord,
    S: RecordStore,
{
    let text = store.load(R::ID).await?;
    R::parse(&text).inspect_err(|_| {
        warn!("Record {} holds malformed text {}", R::ID.name(), text.as_str());
    })
}

pub async fn save_record<R, S>(store: &mut S, record: &R) -> Result<(), StorageError>
where
    R: CalibrationRecord,
    S: RecordStore,
{
    let text = record.to_text()?;
    store.save(R::ID, &text).await?;
    debug!("Saved {} = {}", R::ID.name(), text.as_str());
    Ok(())
}
