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
use std::path::Path;

use config::{Config as ConfigBuilder, File};
use serde::Deserialize;

pub use self::error::ConfigError;
pub use self::player::Player as PlayerConfig;

mod error;
mod player;

/// The backend used when none is configured.
pub const DEFAULT_BACKEND: &str = "mock";

/// The instrument used when none is configured.
pub const DEFAULT_INSTRUMENT: &str = "acoustic_grand_piano";

/// The top level configuration.
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Config {
    /// The backend to play samples through.
    backend: Option<String>,

    /// The instrument whose samples are loaded.
    instrument: Option<String>,

    /// The number of streams the backend may play at once.
    max_streams: Option<u32>,

    /// The player options.
    player: Option<PlayerConfig>,
}

impl Config {
    /// Creates a new configuration.
    pub fn new(
        backend: Option<String>,
        instrument: Option<String>,
        max_streams: Option<u32>,
        player: Option<PlayerConfig>,
    ) -> Config {
        Config {
            backend,
            instrument,
            max_streams,
            player,
        }
    }

    /// Parse a configuration from a YAML file.
    pub fn deserialize(path: &Path) -> Result<Config, ConfigError> {
        Ok(ConfigBuilder::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Config>()?)
    }

    /// Gets the backend name.
    pub fn backend(&self) -> &str {
        self.backend.as_deref().unwrap_or(DEFAULT_BACKEND)
    }

    /// Gets the instrument name.
    pub fn instrument(&self) -> &str {
        self.instrument.as_deref().unwrap_or(DEFAULT_INSTRUMENT)
    }

    /// Gets the maximum number of streams. `None` means the loader default.
    pub fn max_streams(&self) -> Option<u32> {
        self.max_streams
    }

    /// Gets the player configuration.
    pub fn player(&self) -> PlayerConfig {
        self.player.clone().unwrap_or_default()
    }
}
