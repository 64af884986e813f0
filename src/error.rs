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
use crate::backend::BackendError;
use crate::samples::SampleKey;

/// Errors surfaced by the loader, playback gate and player.
///
/// Validation variants are returned synchronously before the backend is touched. Load
/// failures arrive through a batch's completion. Playback failures are not errors at all:
/// they surface as a `None` stream group.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("request must contain at least one note")]
    EmptyRequest,

    #[error("invalid note name {0:?}")]
    InvalidNote(String),

    #[error("invalid instrument name {0:?}")]
    InvalidInstrument(String),

    #[error("invalid value for {name}: {value}")]
    InvalidParameter { name: &'static str, value: f32 },

    #[error("instrument has been released")]
    Released,

    #[error("failed to load notes: {}", format_keys(.keys))]
    LoadFailed { keys: Vec<SampleKey> },

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}

impl Error {
    /// Returns true if this error was caused by malformed input rather than by the backend.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::EmptyRequest
                | Error::InvalidNote(_)
                | Error::InvalidInstrument(_)
                | Error::InvalidParameter { .. }
        )
    }

    /// The keys that failed to load, if this is a load failure.
    pub fn failed_keys(&self) -> Option<&[SampleKey]> {
        match self {
            Error::LoadFailed { keys } => Some(keys),
            _ => None,
        }
    }
}

fn format_keys(keys: &[SampleKey]) -> String {
    keys.iter()
        .map(|key| key.as_str())
        .collect::<Vec<&str>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_split() {
        assert!(Error::EmptyRequest.is_validation());
        assert!(Error::InvalidNote("".to_string()).is_validation());
        assert!(Error::InvalidParameter {
            name: "speed",
            value: f32::NAN
        }
        .is_validation());
        assert!(!Error::Released.is_validation());
        assert!(!Error::LoadFailed { keys: vec![] }.is_validation());
    }

    #[test]
    fn test_load_failed_message() {
        let keys = vec![
            SampleKey::parse("C5").unwrap(),
            SampleKey::parse("x9").unwrap(),
        ];
        let err = Error::LoadFailed { keys };
        assert_eq!(err.to_string(), "failed to load notes: c5, x9");
        assert_eq!(err.failed_keys().map(|k| k.len()), Some(2));
    }
}
