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

use heapless::String;

pub mod flash_store;
pub mod records;

pub const RECORD_TEXT_CAPACITY: usize = 32;

/// Text form of a persisted record.
pub type RecordText = String<RECORD_TEXT_CAPACITY>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    MissingRecord,
    MalformedRecord,
    RecordTooLong,
    SaveError,
    RetrieveError,
}

#[repr(u16)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecordId {
    Tare = 0,
    ScaleUnit = 1,
}

impl RecordId {
    pub const fn key(&self) -> u16 {
        *self as u16
    }

    pub const fn name(&self) -> &'static str {
        match self {
            RecordId::Tare => "tare",
            RecordId::ScaleUnit => "scale_unit",
        }
    }
}

/// Durable named text records.
pub trait RecordStore {
    async fn exists(&mut self, record: RecordId) -> Result<bool, StorageError>;

    /// Fails with `MissingRecord` when nothing was saved under `record`
    async fn load(&mut self, record: RecordId) -> Result<RecordText, StorageError>;

    async fn save(&mut self, record: RecordId, text: &str) -> Result<(), StorageError>;
}
