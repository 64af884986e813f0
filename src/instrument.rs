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
use std::{fmt, sync::Arc};

use crate::backend::Backend;
use crate::error::Error;
use crate::samples::{Loader, PlaybackGate};

/// A named set of samples and the backend stream pool used to play them. Any number of
/// players may share one instrument.
pub struct Instrument {
    loader: Arc<Loader>,
    gate: PlaybackGate,
}

impl Instrument {
    /// Creates a new instrument, allocating a backend pool of `max_streams` streams.
    pub fn new(
        name: &str,
        backend: Arc<dyn Backend>,
        max_streams: Option<u32>,
    ) -> Result<Instrument, Error> {
        let loader = Arc::new(Loader::new(name, backend, max_streams)?);
        Ok(Instrument {
            gate: PlaybackGate::new(loader.clone()),
            loader,
        })
    }

    pub fn name(&self) -> &str {
        self.loader.instrument()
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    pub fn gate(&self) -> &PlaybackGate {
        &self.gate
    }

    /// Releases every sample and the backend pool. The instrument can't be used afterwards.
    pub fn release(&self) {
        self.loader.release();
    }
}

impl fmt::Debug for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrument")
            .field("loader", &self.loader)
            .finish()
    }
}
