// Copyright (C) 2024 Michael Wilson <mike@mdwn.dev>
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
use std::time::Duration;

use duration_string::DurationString;
use serde::Deserialize;

use super::error::ConfigError;
use crate::player::OptionsUpdate;

/// A YAML representation of the player options. Unset fields keep their current value.
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Player {
    /// How long each note sounds, e.g. `3s`.
    duration: Option<String>,

    /// Time reserved for fading a note out, e.g. `300ms`.
    release: Option<String>,

    /// The playback speed. Clamped to 0.5 through 2.0.
    speed: Option<f32>,

    /// The playback gain. Clamped to 0.0 through 1.0.
    gain: Option<f32>,
}

impl Player {
    /// Creates a new player configuration.
    pub fn new(
        duration: Option<String>,
        release: Option<String>,
        speed: Option<f32>,
        gain: Option<f32>,
    ) -> Player {
        Player {
            duration,
            release,
            speed,
            gain,
        }
    }

    /// Gets the note duration, if set.
    pub fn duration(&self) -> Result<Option<Duration>, ConfigError> {
        parse_duration("duration", &self.duration)
    }

    /// Gets the release time, if set.
    pub fn release(&self) -> Result<Option<Duration>, ConfigError> {
        parse_duration("release", &self.release)
    }

    /// Converts the configuration into an options update.
    pub fn options(&self) -> Result<OptionsUpdate, ConfigError> {
        Ok(OptionsUpdate {
            duration: self.duration()?,
            release: self.release()?,
            speed: self.speed,
            gain: self.gain,
        })
    }
}

fn parse_duration(
    field: &'static str,
    value: &Option<String>,
) -> Result<Option<Duration>, ConfigError> {
    value
        .as_ref()
        .map(|duration| {
            DurationString::from_string(duration.clone())
                .map(Duration::from)
                .map_err(|source| ConfigError::Duration { field, source })
        })
        .transpose()
}
