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

//! The capability interface to the native sound pool.
//!
//! Everything that actually decodes or mixes audio lives behind [`Backend`]. `load` and
//! `play_sync` may block; callers run them on tokio's blocking pool.

use std::{fmt, sync::Arc};

pub mod mock;

/// Opaque handle to a sound loaded into the backend pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SoundId(pub u32);

/// Opaque handle to one playing instance of a sound.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StreamId(pub u32);

impl fmt::Display for SoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sound#{}", self.0)
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream#{}", self.0)
    }
}

/// Errors reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("sound pool has not been created")]
    NotCreated,

    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("sound not loaded: {0}")]
    NotLoaded(SoundId),

    #[error("playback rejected: {0}")]
    Rejected(String),

    #[error("unknown backend: {0}")]
    Unknown(String),
}

/// A sound pool capable of loading named resources and playing them back.
pub trait Backend: fmt::Display + Send + Sync + 'static {
    /// Allocates the pool with room for `max_streams` concurrent streams.
    fn create(&self, max_streams: u32) -> Result<(), BackendError>;

    /// Tears down the pool and every sound loaded into it.
    fn release(&self);

    /// Loads the named resource into the pool. May block until decoding finishes.
    fn load(&self, resource: &str) -> Result<SoundId, BackendError>;

    /// Starts every sound at once, returning one stream per sound in the same order.
    fn play_sync(
        &self,
        sounds: &[SoundId],
        loops: i32,
        speed: f32,
        gain: f32,
    ) -> Result<Vec<StreamId>, BackendError>;

    fn stop(&self, stream: StreamId);

    fn pause(&self, stream: StreamId);

    fn resume(&self, stream: StreamId);

    /// Pauses every stream in the pool.
    fn auto_pause(&self);

    /// Resumes every stream paused by [`Backend::auto_pause`].
    fn auto_resume(&self);
}

/// Gets a backend with the given name.
pub fn get_backend(name: &str) -> Result<Arc<dyn Backend>, BackendError> {
    if name.starts_with("mock") {
        return Ok(Arc::new(mock::Backend::get(name)));
    }

    Err(BackendError::Unknown(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_backend() {
        let backend = get_backend("mock-pool").unwrap();
        assert_eq!(backend.to_string(), "mock-pool (Mock)");

        assert_eq!(
            get_backend("soundpool").err(),
            Some(BackendError::Unknown("soundpool".to_string()))
        );
    }
}
