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

#![no_std]
#![allow(async_fn_in_trait)]

//! Weighing core for the HazayCargo scale: the HX711 bit-bang driver, tare/scale
//! calibration, persisted calibration records, the serial command set and the
//! control loop that ties them together.

#[cfg(test)]
extern crate std;

// must stay first so the logging macros are visible to every module below
#[macro_use]
mod fmt;

pub mod application;
pub mod command;
pub mod link;
pub mod storage;
pub mod weight;

#[cfg(test)]
pub(crate) mod test_support;
