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

//! Sample management for instruments.
//!
//! This module provides:
//! - Note name normalization into sample keys
//! - On-demand sample loading with request deduplication and failure memoization
//! - Validated, synchronized playback of prepared samples

mod gate;
mod key;
mod loader;

pub use gate::{clamp_gain, clamp_speed, PlaybackGate, GAIN_RANGE, SPEED_RANGE};
pub use key::SampleKey;
pub use loader::{Loader, PendingBatch, SampleState, DEFAULT_MAX_STREAMS, MAX_STREAMS_LIMIT};
