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

//! Fakes shared by the unit tests.

use crate::storage::{RecordId, RecordStore, RecordText, StorageError};
use crate::weight::interface::hx711::{encode_twos_complement, Hx711, Hx711Gain};
use crate::weight::interface::AsyncStrainGaugeInterface;
use crate::weight::WeighingError;
use core::cell::RefCell;
use core::convert::Infallible;
use embedded_hal::digital::{ErrorType as PinErrorType, InputPin, OutputPin};
use embedded_hal_async::delay::DelayNs;
use embedded_io::ErrorKind;
use embedded_storage_async::nor_flash::{
    ErrorType as FlashErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;
use std::string::{String, ToString};
use std::vec::Vec;

/// Holding PD_SCK high for longer than this powers the chip down
const POWER_DOWN_THRESHOLD_NS: u64 = 60_000;

/// Simulated HX711: a queue of pending conversions shifted out MSB first, with the gain for
/// the next conversion latched from the pulse count after each frame.
#[derive(Debug, Default)]
pub struct FakeChip {
    conversions: VecDeque<u32>,
    current: Option<u32>,
    pulses: u32,
    clock_high: bool,
    high_ns: u64,
    elapsed_ns: u64,
    powered_down: bool,
    busy_polls: u32,
    active_gain: u8,
    frames_read: usize,
    trailing_pulse_log: Vec<u8>,
    conversion_gains: Vec<u8>,
}

pub type SharedChip = Rc<RefCell<FakeChip>>;

impl FakeChip {
    pub fn shared(conversions: &[i32]) -> SharedChip {
        Rc::new(RefCell::new(FakeChip {
            conversions: conversions.iter().map(|v| encode_twos_complement(*v)).collect(),
            active_gain: 1,
            ..Default::default()
        }))
    }

    pub fn frames_read(&self) -> usize {
        self.frames_read
    }

    /// Pulses after the 24 data bits for each completed frame
    pub fn trailing_pulse_log(&self) -> &[u8] {
        &self.trailing_pulse_log
    }

    /// Gain pulse count that was latched when each conversion was taken
    pub fn conversion_gains(&self) -> &[u8] {
        &self.conversion_gains
    }

    pub fn elapsed_ns(&self) -> u64 {
        self.elapsed_ns
    }

    pub fn is_powered_down(&self) -> bool {
        self.powered_down
    }

    /// DOUT stays high for the next `polls` idle reads even with conversions queued
    pub fn hold_busy_for_polls(&mut self, polls: u32) {
        self.busy_polls = polls;
    }

    /// Closes a frame whose trailing pulses have been sent but not yet observed.
    pub fn settle(&mut self) {
        if self.pulses > 24 {
            self.finish_frame();
        }
    }

    pub fn data_line_high(&mut self) -> bool {
        if self.pulses > 24 {
            self.finish_frame();
        }

        if self.pulses == 0 {
            if self.powered_down || self.conversions.is_empty() {
                return true;
            }
            if self.busy_polls > 0 {
                self.busy_polls -= 1;
                return true;
            }
            return false;
        }

        if self.pulses == 1 && self.current.is_none() {
            self.current = self.conversions.pop_front();
            if self.current.is_some() {
                self.frames_read += 1;
                self.conversion_gains.push(self.active_gain);
            }
        }
        match self.current {
            Some(word) => (word >> (24 - self.pulses)) & 1 == 1,
            None => true,
        }
    }

    fn finish_frame(&mut self) {
        let trailing = (self.pulses - 24) as u8;
        self.trailing_pulse_log.push(trailing);
        self.active_gain = trailing;
        self.pulses = 0;
        self.current = None;
    }

    fn clock(&mut self, high: bool) {
        if high && !self.clock_high {
            self.high_ns = 0;
            if !self.powered_down {
                self.pulses += 1;
            }
        }
        if !high && self.powered_down {
            // leaving power down resets the chip to channel A gain 128
            self.powered_down = false;
            self.active_gain = 1;
            self.pulses = 0;
            self.current = None;
        }
        self.clock_high = high;
    }

    fn advance(&mut self, ns: u64) {
        self.elapsed_ns += ns;
        if self.clock_high {
            self.high_ns += ns;
            if self.high_ns >= POWER_DOWN_THRESHOLD_NS && !self.powered_down {
                self.powered_down = true;
                self.pulses = 0;
                self.current = None;
            }
        }
    }
}

pub struct FakeClockPin(SharedChip);
pub struct FakeDataPin(SharedChip);
pub struct FakeDelay(SharedChip);

impl PinErrorType for FakeClockPin {
    type Error = Infallible;
}

impl OutputPin for FakeClockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().clock(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().clock(true);
        Ok(())
    }
}

impl PinErrorType for FakeDataPin {
    type Error = Infallible;
}

impl InputPin for FakeDataPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.0.borrow_mut().data_line_high())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.0.borrow_mut().data_line_high())
    }
}

impl DelayNs for FakeDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.0.borrow_mut().advance(ns as u64);
    }
}

pub type FakeHx711 = Hx711<FakeClockPin, FakeDataPin, FakeDelay>;

/// Driver at gain 128 wired to a simulated chip holding `conversions`.
pub fn fake_hx711(conversions: &[i32]) -> (FakeHx711, SharedChip) {
    let chip = FakeChip::shared(conversions);
    let hx711 = Hx711::new(
        FakeClockPin(chip.clone()),
        FakeDataPin(chip.clone()),
        FakeDelay(chip.clone()),
        Hx711Gain::ChannelAGain128,
    );
    (hx711, chip)
}

/// Strain gauge that replays scripted results and fails with `DeviceNotReady` once empty.
#[derive(Debug, Default)]
pub struct FakeStrainGauge {
    script: VecDeque<Result<i32, WeighingError>>,
    reads: usize,
    initialized: bool,
}

impl FakeStrainGauge {
    pub fn with_readings(readings: &[i32]) -> Self {
        let mut gauge = Self::default();
        gauge.push_readings(readings);
        gauge
    }

    pub fn push_readings(&mut self, readings: &[i32]) {
        self.script.extend(readings.iter().map(|r| Ok(*r)));
    }

    pub fn push_failure(&mut self, error: WeighingError) {
        self.script.push_back(Err(error));
    }

    /// Successful reads so far
    pub fn reads(&self) -> usize {
        self.reads
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

impl AsyncStrainGaugeInterface for FakeStrainGauge {
    type Error = WeighingError;

    async fn initialize(&mut self) -> Result<(), Self::Error> {
        self.initialized = true;
        Ok(())
    }

    async fn get_next_reading(&mut self) -> Result<i32, Self::Error> {
        let reading = self
            .script
            .pop_front()
            .unwrap_or(Err(WeighingError::DeviceNotReady))?;
        self.reads += 1;
        Ok(reading)
    }

    async fn power_down(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    async fn power_up(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: BTreeMap<RecordId, String>,
    saves: usize,
    fail_saves: bool,
    fail_loads: bool,
    fail_record_reads: bool,
}

impl MemoryRecordStore {
    pub fn with_record(mut self, record: RecordId, text: &str) -> Self {
        self.records.insert(record, text.to_string());
        self
    }

    pub fn text(&self, record: RecordId) -> Option<String> {
        self.records.get(&record).cloned()
    }

    pub fn save_count(&self) -> usize {
        self.saves
    }

    pub fn fail_saves(&mut self, fail: bool) {
        self.fail_saves = fail;
    }

    pub fn fail_loads(&mut self, fail: bool) {
        self.fail_loads = fail;
    }

    /// `load` fails while `exists` keeps answering
    pub fn fail_record_reads(&mut self, fail: bool) {
        self.fail_record_reads = fail;
    }
}

impl RecordStore for MemoryRecordStore {
    async fn exists(&mut self, record: RecordId) -> Result<bool, StorageError> {
        if self.fail_loads {
            return Err(StorageError::RetrieveError);
        }
        Ok(self.records.contains_key(&record))
    }

    async fn load(&mut self, record: RecordId) -> Result<RecordText, StorageError> {
        if self.fail_loads || self.fail_record_reads {
            return Err(StorageError::RetrieveError);
        }
        let text = self.records.get(&record).ok_or(StorageError::MissingRecord)?;
        RecordText::try_from(text.as_str()).map_err(|_| StorageError::RecordTooLong)
    }

    async fn save(&mut self, record: RecordId, text: &str) -> Result<(), StorageError> {
        if self.fail_saves {
            return Err(StorageError::SaveError);
        }
        self.records.insert(record, text.to_string());
        self.saves += 1;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockFlashError(NorFlashErrorKind);

impl NorFlashError for MockFlashError {
    fn kind(&self) -> NorFlashErrorKind {
        self.0
    }
}

/// NOR flash in RAM. Erased bytes read 0xFF and writes can only clear bits.
pub struct MockFlash {
    memory: Vec<u8>,
}

impl MockFlash {
    pub const PAGE_SIZE: usize = 4096;
    pub const PAGES: usize = 4;
    pub const CAPACITY: usize = Self::PAGE_SIZE * Self::PAGES;

    pub fn new() -> Self {
        Self {
            memory: std::vec![0xFF; Self::CAPACITY],
        }
    }

    fn check(&self, offset: u32, length: usize, align: usize) -> Result<(), MockFlashError> {
        let offset = offset as usize;
        if offset % align != 0 || length % align != 0 {
            return Err(MockFlashError(NorFlashErrorKind::NotAligned));
        }
        if offset + length > self.memory.len() {
            return Err(MockFlashError(NorFlashErrorKind::OutOfBounds));
        }
        Ok(())
    }
}

impl FlashErrorType for MockFlash {
    type Error = MockFlashError;
}

impl ReadNorFlash for MockFlash {
    const READ_SIZE: usize = 1;

    async fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        self.check(offset, bytes.len(), Self::READ_SIZE)?;
        let start = offset as usize;
        bytes.copy_from_slice(&self.memory[start..start + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        Self::CAPACITY
    }
}

impl NorFlash for MockFlash {
    const WRITE_SIZE: usize = 4;
    const ERASE_SIZE: usize = Self::PAGE_SIZE;

    async fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        if to < from {
            return Err(MockFlashError(NorFlashErrorKind::OutOfBounds));
        }
        self.check(from, (to - from) as usize, Self::ERASE_SIZE)?;
        self.memory[from as usize..to as usize].fill(0xFF);
        Ok(())
    }

    async fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        self.check(offset, bytes.len(), Self::WRITE_SIZE)?;
        let start = offset as usize;
        for (cell, byte) in self.memory[start..start + bytes.len()].iter_mut().zip(bytes) {
            *cell &= *byte;
        }
        Ok(())
    }
}

/// Serial port with scripted inbound chunks. Every write is captured as one record.
#[derive(Debug, Default)]
pub struct FakeSerial {
    inbound: VecDeque<Vec<u8>>,
    outbound: Vec<Vec<u8>>,
    fail_writes: bool,
}

impl FakeSerial {
    pub fn queue_inbound(&mut self, bytes: &[u8]) {
        self.inbound.push_back(bytes.to_vec());
    }

    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Everything written, one entry per `write` call, lossily decoded.
    pub fn written(&self) -> Vec<String> {
        self.outbound
            .iter()
            .map(|record| String::from_utf8_lossy(record).into_owned())
            .collect()
    }
}

impl embedded_io::ErrorType for FakeSerial {
    type Error = ErrorKind;
}

impl embedded_io::ReadReady for FakeSerial {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.inbound.is_empty())
    }
}

impl embedded_io_async::Read for FakeSerial {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let Some(mut chunk) = self.inbound.pop_front() else {
            return Ok(0);
        };
        let count = chunk.len().min(buf.len());
        buf[..count].copy_from_slice(&chunk[..count]);
        if count < chunk.len() {
            self.inbound.push_front(chunk.split_off(count));
        }
        Ok(count)
    }
}

impl embedded_io_async::Write for FakeSerial {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if self.fail_writes {
            return Err(ErrorKind::BrokenPipe);
        }
        self.outbound.push(buf.to_vec());
        Ok(buf.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedEvent {
    On,
    Off,
}

/// Indicator pin that records every level change.
#[derive(Debug, Default)]
pub struct FakeLed {
    events: Vec<LedEvent>,
}

impl FakeLed {
    pub fn events(&self) -> &[LedEvent] {
        &self.events
    }
}

impl PinErrorType for FakeLed {
    type Error = Infallible;
}

impl OutputPin for FakeLed {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.events.push(LedEvent::Off);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.events.push(LedEvent::On);
        Ok(())
    }
}

/// Input pin that returns scripted levels, repeating the last one.
#[derive(Debug)]
pub struct ScriptedInput {
    levels: VecDeque<bool>,
    last: bool,
    reads: usize,
}

impl ScriptedInput {
    pub fn new(levels: &[bool]) -> Self {
        Self {
            levels: levels.iter().copied().collect(),
            last: false,
            reads: 0,
        }
    }

    pub fn reads(&self) -> usize {
        self.reads
    }

    fn next_level(&mut self) -> bool {
        self.reads += 1;
        if let Some(level) = self.levels.pop_front() {
            self.last = level;
        }
        self.last
    }
}

impl PinErrorType for ScriptedInput {
    type Error = Infallible;
}

impl InputPin for ScriptedInput {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.next_level())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.next_level())
    }
}

/// Delay that completes at once and logs the millisecond delays requested.
#[derive(Debug, Default)]
pub struct RecordingDelay {
    log_ms: Vec<u32>,
}

impl RecordingDelay {
    /// Millisecond delays in request order
    pub fn log_ms(&self) -> &[u32] {
        &self.log_ms
    }
}

impl DelayNs for RecordingDelay {
    async fn delay_ns(&mut self, _ns: u32) {}

    async fn delay_ms(&mut self, ms: u32) {
        self.log_ms.push(ms);
    }
}
