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
use crate::weight::WeighingError;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal_async::delay::DelayNs;

pub const VALID_DATA_BITS: usize = 24;
pub const DEFAULT_READY_TIMEOUT_MS: u32 = 5_000;

const SIGN_BIT: u32 = 1 << (VALID_DATA_BITS - 1);
const DATA_MASK: u32 = (1 << VALID_DATA_BITS) - 1;

/// PD_SCK high time must stay well under 50us or the chip starts to power down
const CLK_HALF_PERIOD_US: u32 = 1;
/// Must exceed the 60us PD_SCK high time that puts the chip to sleep
const POWER_DOWN_HOLD_US: u32 = 80;
const READY_POLL_INTERVAL_US: u32 = 100;

/// Input channel and amplifier gain. The chip latches the selection from the number of
/// clock pulses that follow the 24 data bits, so it applies to the conversion after the
/// one being read out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Hx711Gain {
    ChannelAGain128,
    ChannelAGain64,
    ChannelBGain32,
}

impl Hx711Gain {
    /// Clock pulses sent after the data frame to select this gain for the next conversion
    pub const fn trailing_pulses(&self) -> u8 {
        match self {
            Hx711Gain::ChannelAGain128 => 1,
            Hx711Gain::ChannelAGain64 => 3,
            Hx711Gain::ChannelBGain32 => 2,
        }
    }

    pub const fn channel(&self) -> char {
        match self {
            Hx711Gain::ChannelAGain128 | Hx711Gain::ChannelAGain64 => 'A',
            Hx711Gain::ChannelBGain32 => 'B',
        }
    }

    pub const fn amplifier_gain(&self) -> u8 {
        match self {
            Hx711Gain::ChannelAGain128 => 128,
            Hx711Gain::ChannelAGain64 => 64,
            Hx711Gain::ChannelBGain32 => 32,
        }
    }
}

/// Raised when a gain the chip cannot provide is requested. Carries the requested gain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidChannelSelect(pub u8);

impl TryFrom<u8> for Hx711Gain {
    type Error = InvalidChannelSelect;

    fn try_from(amplifier_gain: u8) -> Result<Self, Self::Error> {
        match amplifier_gain {
            128 => Ok(Hx711Gain::ChannelAGain128),
            64 => Ok(Hx711Gain::ChannelAGain64),
            32 => Ok(Hx711Gain::ChannelBGain32),
            other => Err(InvalidChannelSelect(other)),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<OutPinE, InPinE> {
    OutPin(OutPinE),
    InPin(InPinE),
    /// DOUT did not go low within the ready timeout
    DeviceNotReady,
}

impl<OutPinE, InPinE> From<Error<OutPinE, InPinE>> for WeighingError {
    fn from(value: Error<OutPinE, InPinE>) -> Self {
        match value {
            Error::DeviceNotReady => WeighingError::DeviceNotReady,
            Error::OutPin(_) | Error::InPin(_) => WeighingError::StrainGaugeFault,
        }
    }
}

/// Sign extend a 24 bit two's complement conversion result.
pub const fn decode_twos_complement(raw: u32) -> i32 {
    let raw = raw & DATA_MASK;
    if raw & SIGN_BIT != 0 {
        raw as i32 - (1 << VALID_DATA_BITS)
    } else {
        raw as i32
    }
}

/// The 24 bit pattern the chip would shift out for `value`.
pub const fn encode_twos_complement(value: i32) -> u32 {
    (value as u32) & DATA_MASK
}

pub struct Hx711<CLK, DATA, D> {
    clock_pin: CLK,
    data_pin: DATA,
    delay: D,
    gain: Hx711Gain,
    ready_timeout_us: u32,
    powered_up: bool,
}

impl<CLK, DATA, D, ClkE, DataE> Hx711<CLK, DATA, D>
where
    CLK: OutputPin<Error = ClkE>,
    DATA: InputPin<Error = DataE>,
    D: DelayNs,
{
    pub fn new(clock_pin: CLK, data_pin: DATA, delay: D, gain: Hx711Gain) -> Self {
        Self {
            clock_pin,
            data_pin,
            delay,
            gain,
            ready_timeout_us: DEFAULT_READY_TIMEOUT_MS * 1_000,
            powered_up: false,
        }
    }

    pub fn with_ready_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.ready_timeout_us = timeout_ms.saturating_mul(1_000);
        self
    }

    pub fn gain(&self) -> Hx711Gain {
        self.gain
    }

    /// Changes the trailing pulse count. The conversion read next still uses the previous
    /// gain; the one after it uses `gain`.
    pub fn set_gain(&mut self, gain: Hx711Gain) {
        self.gain = gain;
    }

    /// Sets `gain` and clocks out one conversion so the next `read_raw` already uses it.
    pub async fn select_gain(&mut self, gain: Hx711Gain) -> Result<(), Error<ClkE, DataE>> {
        self.gain = gain;
        let _ = self.read_frame().await?;
        debug!("HX711 channel {} gain {} selected", gain.channel(), gain.amplifier_gain());
        Ok(())
    }

    /// DOUT is held low by the chip while a finished conversion is waiting
    pub fn is_ready(&mut self) -> Result<bool, Error<ClkE, DataE>> {
        self.data_pin.is_low().map_err(Error::InPin)
    }

    pub async fn wait_ready(&mut self) -> Result<(), Error<ClkE, DataE>> {
        let mut waited_us: u32 = 0;
        while !self.is_ready()? {
            if waited_us >= self.ready_timeout_us {
                warn!("HX711 not ready after {} us", waited_us);
                return Err(Error::DeviceNotReady);
            }
            self.delay.delay_us(READY_POLL_INTERVAL_US).await;
            waited_us = waited_us.saturating_add(READY_POLL_INTERVAL_US);
        }
        Ok(())
    }

    pub async fn read_raw(&mut self) -> Result<i32, Error<ClkE, DataE>> {
        let raw = self.read_raw_unsigned().await?;
        let value = decode_twos_complement(raw);
        trace!("HX711 raw = {}", value);
        Ok(value)
    }

    /// The conversion as shifted out, without sign extension.
    pub async fn read_raw_unsigned(&mut self) -> Result<u32, Error<ClkE, DataE>> {
        if !self.powered_up {
            self.power_up().await?;
        }
        self.read_frame().await
    }

    async fn read_frame(&mut self) -> Result<u32, Error<ClkE, DataE>> {
        if !self.is_ready()? {
            self.wait_ready().await?;
        }

        let mut data: u32 = 0;
        for _ in 0..VALID_DATA_BITS {
            let bit = self.shift_in_bit().await?;
            data = (data << 1) | bit as u32;
        }

        for _ in 0..self.gain.trailing_pulses() {
            self.pulse_clock().await?;
        }

        Ok(data & DATA_MASK)
    }

    /// DOUT is sampled while PD_SCK is high, after the rising edge has shifted the bit out.
    async fn shift_in_bit(&mut self) -> Result<bool, Error<ClkE, DataE>> {
        self.clock_pin.set_high().map_err(Error::OutPin)?;
        self.delay.delay_us(CLK_HALF_PERIOD_US).await;
        let bit = self.data_pin.is_high().map_err(Error::InPin)?;
        self.clock_pin.set_low().map_err(Error::OutPin)?;
        self.delay.delay_us(CLK_HALF_PERIOD_US).await;
        Ok(bit)
    }

    async fn pulse_clock(&mut self) -> Result<(), Error<ClkE, DataE>> {
        self.clock_pin.set_high().map_err(Error::OutPin)?;
        self.delay.delay_us(CLK_HALF_PERIOD_US).await;
        self.clock_pin.set_low().map_err(Error::OutPin)?;
        self.delay.delay_us(CLK_HALF_PERIOD_US).await;
        Ok(())
    }
}

impl<CLK, DATA, D, ClkE, DataE> AsyncStrainGaugeInterface for Hx711<CLK, DATA, D>
where
    CLK: OutputPin<Error = ClkE>,
    DATA: InputPin<Error = DataE>,
    D: DelayNs,
{
    type Error = Error<ClkE, DataE>;

    async fn initialize(&mut self) -> Result<(), Self::Error> {
        self.power_up().await
    }

    async fn get_next_reading(&mut self) -> Result<i32, Self::Error> {
        self.read_raw().await
    }

    async fn power_down(&mut self) -> Result<(), Self::Error> {
        self.clock_pin.set_low().map_err(Error::OutPin)?;
        self.clock_pin.set_high().map_err(Error::OutPin)?;
        self.delay.delay_us(POWER_DOWN_HOLD_US).await;
        self.powered_up = false;
        debug!("HX711 powered down");
        Ok(())
    }

    /// Leaving power down resets the chip to channel A gain 128, so the configured gain is
    /// reapplied with a throwaway conversion.
    /// Stays marked powered down until the gain is latched, so a failed wake is retried by
    /// the next read.
    async fn power_up(&mut self) -> Result<(), Self::Error> {
        self.powered_up = false;
        self.clock_pin.set_low().map_err(Error::OutPin)?;
        self.select_gain(self.gain).await?;
        self.powered_up = true;
        Ok(())
    }
}
