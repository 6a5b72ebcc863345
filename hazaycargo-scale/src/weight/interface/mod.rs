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

pub mod hx711;

/// A load-cell converter delivering raw signed conversions.
pub trait AsyncStrainGaugeInterface {
    type Error;

    /// Brings the converter out of reset with its configured channel and gain latched.
    async fn initialize(&mut self) -> Result<(), Self::Error>;

    /// Next raw conversion. Wakes the converter first when it was powered down.
    async fn get_next_reading(&mut self) -> Result<i32, Self::Error>;

    async fn power_down(&mut self) -> Result<(), Self::Error>;

    /// Leaves power down. Any pending channel or gain choice is applied again.
    async fn power_up(&mut self) -> Result<(), Self::Error>;
}
