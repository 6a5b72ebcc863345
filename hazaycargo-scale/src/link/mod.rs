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

//! Setup of the wireless serial bridge. The bridge takes AT commands while its mode pin is
//! high; replies are not checked.

use core::fmt::Write as _;
use embedded_hal::digital::InputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_io_async::Write;
use heapless::String;

pub const MODE_POLL_INTERVAL_MS: u32 = 50;
pub const COMMAND_SPACING_MS: u32 = 100;

const AT_COMMAND_CAPACITY: usize = 48;

/// `AT+CT` code for 115200 baud
pub const BAUD_115200: &str = "05";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError {
    ModePin,
    Serial,
    NameTooLong,
}

pub enum AtCommand<'a> {
    QueryName,
    SetName(&'a str),
    QueryBaud,
    /// Takes the bridge's baud rate code
    SetBaud(&'a str),
}

impl AtCommand<'_> {
    pub fn encode(&self) -> Result<String<AT_COMMAND_CAPACITY>, LinkError> {
        let mut text = String::new();
        let written = match self {
            AtCommand::QueryName => write!(text, "AT+TM\r\n"),
            AtCommand::SetName(name) => write!(text, "AT+BM{}\r\n", name),
            AtCommand::QueryBaud => write!(text, "AT+QT\r\n"),
            AtCommand::SetBaud(code) => write!(text, "AT+CT{}\r\n", code),
        };
        written.map_err(|_| LinkError::NameTooLong)?;
        Ok(text)
    }
}

pub struct RadioLink<SER, MODE, D> {
    serial: SER,
    mode_pin: MODE,
    delay: D,
}

impl<SER, MODE, D> RadioLink<SER, MODE, D>
where
    SER: Write,
    MODE: InputPin,
    D: DelayNs,
{
    pub fn new(serial: SER, mode_pin: MODE, delay: D) -> Self {
        Self {
            serial,
            mode_pin,
            delay,
        }
    }

    /// Blocks until the bridge signals command mode.
    pub async fn wait_for_command_mode(&mut self) -> Result<(), LinkError> {
        while !self.mode_pin.is_high().map_err(|_| LinkError::ModePin)? {
            self.delay.delay_ms(MODE_POLL_INTERVAL_MS).await;
        }
        debug!("Radio bridge in command mode");
        Ok(())
    }

    /// Names the bridge after the controller and moves it to 115200 baud.
    pub async fn configure(&mut self, name: &str) -> Result<(), LinkError> {
        self.wait_for_command_mode().await?;
        for command in [
            AtCommand::QueryName,
            AtCommand::SetName(name),
            AtCommand::QueryBaud,
            AtCommand::SetBaud(BAUD_115200),
        ] {
            self.send(&command).await?;
        }
        info!("Radio bridge named {}", name);
        Ok(())
    }

    async fn send(&mut self, command: &AtCommand<'_>) -> Result<(), LinkError> {
        let text = command.encode()?;
        self.serial
            .write_all(text.as_bytes())
            .await
            .map_err(|_| LinkError::Serial)?;
        self.delay.delay_ms(COMMAND_SPACING_MS).await;
        Ok(())
    }

    /// Hands the serial port and delay back for normal traffic.
    pub fn release(self) -> (SER, MODE, D) {
        (self.serial, self.mode_pin, self.delay)
    }
}
