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

use crate::storage::{RecordId, RecordStore, RecordText, StorageError, RECORD_TEXT_CAPACITY};
use core::ops::Range;
use embedded_storage_async::nor_flash::NorFlash;
use sequential_storage::cache::NoCache;
use sequential_storage::map;
use sequential_storage::map::{SerializationError, Value};

/// Work buffer for the map. Must hold the largest item (header, key and record text)
/// rounded up to the flash word size.
const DATA_BUFFER_SIZE: usize = 128;

/// Record text as stored in flash: the raw UTF-8 bytes, no terminator.
#[derive(Clone, Debug, PartialEq)]
struct StoredText(RecordText);

impl Value<'_> for StoredText {
    fn serialize_into(&self, buffer: &mut [u8]) -> Result<usize, SerializationError> {
        let bytes = self.0.as_bytes();
        if bytes.len() > buffer.len() {
            return Err(SerializationError::BufferTooSmall);
        }
        buffer[..bytes.len()].copy_from_slice(bytes);
        Ok(bytes.len())
    }

    fn deserialize_from(buffer: &[u8]) -> Result<Self, SerializationError>
    where
        Self: Sized,
    {
        if buffer.len() > RECORD_TEXT_CAPACITY {
            return Err(SerializationError::InvalidFormat);
        }
        let text = core::str::from_utf8(buffer).map_err(|_| SerializationError::InvalidFormat)?;
        let text = RecordText::try_from(text).map_err(|_| SerializationError::InvalidFormat)?;
        Ok(StoredText(text))
    }
}

/// Record store on NOR flash using a sequential-storage key/value map. Keys are the
/// record ids.
pub struct FlashRecordStore<F>
where
    F: NorFlash,
{
    flash: F,
    key_value_range: Range<u32>,
    flash_cache: NoCache,
}

impl<F> FlashRecordStore<F>
where
    F: NorFlash,
{
    /// `key_value_range` must be aligned to the flash erase size and span at least two pages.
    pub fn new(flash: F, key_value_range: Range<u32>) -> Self {
        debug!(
            "Record storage at 0x{:x} to 0x{:x}, flash size: {}",
            key_value_range.start,
            key_value_range.end,
            flash.capacity(),
        );
        Self {
            flash,
            key_value_range,
            flash_cache: NoCache::new(),
        }
    }

    async fn fetch(&mut self, record: RecordId) -> Result<Option<StoredText>, StorageError> {
        let mut data_buffer = [0; DATA_BUFFER_SIZE];

        let value: Option<StoredText> = map::fetch_item(
            &mut self.flash,
            self.key_value_range.clone(),
            &mut self.flash_cache,
            &mut data_buffer,
            &record.key(),
        )
        .await
        .map_err(|_| {
            warn!("Unable to read record {}", record.name());
            StorageError::RetrieveError
        })?;
        Ok(value)
    }
}

impl<F> RecordStore for FlashRecordStore<F>
where
    F: NorFlash,
{
    async fn exists(&mut self, record: RecordId) -> Result<bool, StorageError> {
        Ok(self.fetch(record).await?.is_some())
    }

    async fn load(&mut self, record: RecordId) -> Result<RecordText, StorageError> {
        match self.fetch(record).await? {
            Some(StoredText(text)) => {
                trace!("Loaded {} = {}", record.name(), text.as_str());
                Ok(text)
            }
            None => Err(StorageError::MissingRecord),
        }
    }

    async fn save(&mut self, record: RecordId, text: &str) -> Result<(), StorageError> {
        let value = StoredText(RecordText::try_from(text).map_err(|_| StorageError::RecordTooLong)?);
        let mut data_buffer = [0; DATA_BUFFER_SIZE];

        map::store_item(
            &mut self.flash,
            self.key_value_range.clone(),
            &mut self.flash_cache,
            &mut data_buffer,
            &record.key(),
            &value,
        )
        .await
        .map_err(|_| {
            warn!("Unable to save record {}", record.name());
            StorageError::SaveError
        })?;
        Ok(())
    }
}
