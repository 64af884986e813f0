// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{fmt, str::FromStr};

use crate::error::Error;

/// A case-insensitive note name identifying one sample of an instrument, e.g. `c5` or `bb0`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SampleKey(String);

impl SampleKey {
    /// Parses and normalizes a note name.
    pub fn parse(note: &str) -> Result<SampleKey, Error> {
        let note = note.trim();
        if note.is_empty()
            || !note
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '#')
        {
            return Err(Error::InvalidNote(note.to_string()));
        }
        Ok(SampleKey(note.to_ascii_lowercase()))
    }

    /// Parses a list of note names, failing on the first invalid one.
    pub fn parse_all<S: AsRef<str>>(notes: &[S]) -> Result<Vec<SampleKey>, Error> {
        if notes.is_empty() {
            return Err(Error::EmptyRequest);
        }
        notes.iter().map(|note| Self::parse(note.as_ref())).collect()
    }

    /// The normalized note name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The resource name the backend knows this sample by.
    pub fn resource(&self, instrument: &str) -> String {
        format!("{}_{}", instrument, self.0)
    }
}

impl FromStr for SampleKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SampleKey::parse(s)
    }
}

impl fmt::Display for SampleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
