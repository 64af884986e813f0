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

//! Validates playback requests and issues them to the backend.

use std::{ops::RangeInclusive, sync::Arc};

use tracing::{debug, error, warn};

use super::key::SampleKey;
use super::loader::{Loader, SampleState};
use crate::backend::{Backend, StreamId};
use crate::error::Error;

/// Valid playback rate multipliers.
pub const SPEED_RANGE: RangeInclusive<f32> = 0.5..=2.0;

/// Valid volume multipliers.
pub const GAIN_RANGE: RangeInclusive<f32> = 0.0..=1.0;

/// Pulls a value into `range`. NaN is rejected rather than clamped.
fn clamp(name: &'static str, value: f32, range: &RangeInclusive<f32>) -> Result<f32, Error> {
    if value.is_nan() {
        return Err(Error::InvalidParameter { name, value });
    }
    Ok(value.clamp(*range.start(), *range.end()))
}

/// Clamps a playback speed to [`SPEED_RANGE`].
pub fn clamp_speed(speed: f32) -> Result<f32, Error> {
    clamp("speed", speed, &SPEED_RANGE)
}

/// Clamps a gain to [`GAIN_RANGE`].
pub fn clamp_gain(gain: f32) -> Result<f32, Error> {
    clamp("gain", gain, &GAIN_RANGE)
}

/// Issues play, stop, pause and resume calls for the samples of one loader.
pub struct PlaybackGate {
    loader: Arc<Loader>,
}

impl PlaybackGate {
    pub fn new(loader: Arc<Loader>) -> PlaybackGate {
        PlaybackGate { loader }
    }

    /// Plays all of the given samples in sync. Resolves to `None` without playing anything if
    /// any sample isn't loaded or the backend rejects the request.
    pub async fn play(
        &self,
        keys: &[SampleKey],
        speed: f32,
        gain: f32,
    ) -> Result<Option<Vec<StreamId>>, Error> {
        if keys.is_empty() {
            return Err(Error::EmptyRequest);
        }
        let speed = clamp_speed(speed)?;
        let gain = clamp_gain(gain)?;

        let sounds = match self.loader.resolve(keys)? {
            Some(sounds) => sounds,
            None => {
                let missing: Vec<&str> = keys
                    .iter()
                    .filter(|key| !matches!(self.loader.state(key), SampleState::Loaded(_)))
                    .map(|key| key.as_str())
                    .collect();
                warn!(
                    instrument = self.loader.instrument(),
                    missing = ?missing,
                    "Notes are not prepared, nothing played."
                );
                return Ok(None);
            }
        };

        let backend = self.loader.backend().clone();
        let result =
            tokio::task::spawn_blocking(move || backend.play_sync(&sounds, 0, speed, gain)).await;

        let notes: Vec<&str> = keys.iter().map(|key| key.as_str()).collect();
        match result {
            Ok(Ok(streams)) => {
                debug!(
                    instrument = self.loader.instrument(),
                    notes = ?notes,
                    streams = streams.len(),
                    speed,
                    gain,
                    "Notes playing."
                );
                Ok(Some(streams))
            }
            Ok(Err(e)) => {
                error!(instrument = self.loader.instrument(), notes = ?notes, "Failed to play.");
                debug!(err = %e, "Play failure detail.");
                Ok(None)
            }
            Err(e) => {
                error!(instrument = self.loader.instrument(), notes = ?notes, "Failed to play.");
                debug!(err = %e, "Play task failed.");
                Ok(None)
            }
        }
    }

    /// Immediately stops the given streams.
    pub fn stop(&self, streams: &[StreamId]) -> Result<(), Error> {
        self.for_each(streams, |backend, stream| backend.stop(stream))
    }

    pub fn pause(&self, streams: &[StreamId]) -> Result<(), Error> {
        self.for_each(streams, |backend, stream| backend.pause(stream))
    }

    pub fn resume(&self, streams: &[StreamId]) -> Result<(), Error> {
        self.for_each(streams, |backend, stream| backend.resume(stream))
    }

    /// Pauses every stream of the instrument, including those started by other players.
    pub fn pause_all(&self) -> Result<(), Error> {
        self.ensure_live()?;
        self.loader.backend().auto_pause();
        Ok(())
    }

    /// Resumes every stream paused by [`PlaybackGate::pause_all`].
    pub fn resume_all(&self) -> Result<(), Error> {
        self.ensure_live()?;
        self.loader.backend().auto_resume();
        Ok(())
    }

    fn for_each<F>(&self, streams: &[StreamId], f: F) -> Result<(), Error>
    where
        F: Fn(&dyn Backend, StreamId),
    {
        self.ensure_live()?;
        let backend = self.loader.backend();
        for stream in streams {
            f(backend.as_ref(), *stream);
        }
        Ok(())
    }

    fn ensure_live(&self) -> Result<(), Error> {
        if self.loader.is_released() {
            return Err(Error::Released);
        }
        Ok(())
    }
}
