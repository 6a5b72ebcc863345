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

pub mod dispatcher;

pub const TARE_COMMAND: &[u8] = b"HazayCargo-Cmnd: Tare";
pub const SCALE_COMMAND: &[u8] = b"HazayCargo-Cmnd: Scale";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Zero the scale against the current load
    Tare,
    /// Recalibrate against a reference mass in grams that is on the platform
    SetScaleWithReference(i32),
}

impl Command {
    /// Parses one buffer received from the serial link. The tare command must be the whole
    /// buffer (surrounding whitespace aside). The scale command may appear anywhere and is
    /// followed by a `;<key>:<grams>` field. Anything else yields `None`.
    pub fn parse(buffer: &[u8]) -> Option<Command> {
        if buffer.trim_ascii() == TARE_COMMAND {
            return Some(Command::Tare);
        }

        let position = find(buffer, SCALE_COMMAND)?;
        let payload = &buffer[position + SCALE_COMMAND.len()..];
        parse_reference_mass(payload).map(Command::SetScaleWithReference)
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// `...;<key>:<grams>...`: the value of the first field after a `;`. Only positive
/// integers are accepted.
fn parse_reference_mass(payload: &[u8]) -> Option<i32> {
    let text = core::str::from_utf8(payload).ok()?;
    let field = text.split(';').nth(1)?;
    let (_key, value) = field.split_once(':')?;
    value.trim().parse::<i32>().ok().filter(|grams| *grams > 0)
}
