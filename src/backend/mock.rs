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
use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::Arc,
    thread,
    time::Duration,
};

use parking_lot::Mutex;
use tracing::{debug, info};

use super::{BackendError, SoundId, StreamId};

/// The playback status of a mock stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamStatus {
    Playing,
    Paused,
    /// Paused by `auto_pause`; only `auto_resume` brings it back.
    AutoPaused,
    Stopped,
}

/// A record of one call made against the mock.
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Create(u32),
    Release,
    Load(String),
    PlaySync {
        sounds: Vec<SoundId>,
        speed: f32,
        gain: f32,
    },
    Stop(StreamId),
    Pause(StreamId),
    Resume(StreamId),
    AutoPause,
    AutoResume,
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Call::Create(max_streams) => write!(f, "create(max_streams={})", max_streams),
            Call::Release => write!(f, "release()"),
            Call::Load(resource) => write!(f, "load({})", resource),
            Call::PlaySync {
                sounds,
                speed,
                gain,
            } => {
                let sounds: Vec<String> = sounds.iter().map(|s| s.to_string()).collect();
                write!(
                    f,
                    "play_sync([{}], speed={}, gain={})",
                    sounds.join(", "),
                    speed,
                    gain
                )
            }
            Call::Stop(stream) => write!(f, "stop({})", stream),
            Call::Pause(stream) => write!(f, "pause({})", stream),
            Call::Resume(stream) => write!(f, "resume({})", stream),
            Call::AutoPause => write!(f, "auto_pause()"),
            Call::AutoResume => write!(f, "auto_resume()"),
        }
    }
}

#[derive(Default)]
struct State {
    max_streams: Option<u32>,
    sounds: HashMap<String, SoundId>,
    streams: HashMap<StreamId, StreamStatus>,
    next_sound: u32,
    next_stream: u32,
    calls: Vec<Call>,
}

/// A mock backend. Doesn't actually play anything, but tracks loads and stream state.
#[derive(Clone)]
pub struct Backend {
    name: String,
    state: Arc<Mutex<State>>,
    missing: Arc<Mutex<HashSet<String>>>,
    load_delay: Arc<Mutex<Duration>>,
    reject_play: Arc<Mutex<bool>>,
}

impl Backend {
    /// Gets the given mock backend.
    pub fn get(name: &str) -> Backend {
        Backend {
            name: name.to_string(),
            state: Arc::new(Mutex::new(State::default())),
            missing: Arc::new(Mutex::new(HashSet::new())),
            load_delay: Arc::new(Mutex::new(Duration::ZERO)),
            reject_play: Arc::new(Mutex::new(false)),
        }
    }

    /// Makes loads of the given resource fail as if it weren't packaged.
    pub fn set_missing(&self, resource: &str) {
        self.missing.lock().insert(resource.to_string());
    }

    /// Makes the given resource loadable again.
    pub fn clear_missing(&self, resource: &str) {
        self.missing.lock().remove(resource);
    }

    /// Blocks every load for the given duration before it completes.
    pub fn set_load_delay(&self, delay: Duration) {
        *self.load_delay.lock() = delay;
    }

    /// Makes every subsequent play_sync call fail.
    pub fn set_reject_play(&self, reject: bool) {
        *self.reject_play.lock() = reject;
    }

    /// The number of load calls made for the given resource.
    pub fn load_count(&self, resource: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| matches!(call, Call::Load(r) if r == resource))
            .count()
    }

    /// The total number of load calls made.
    pub fn total_loads(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| matches!(call, Call::Load(_)))
            .count()
    }

    /// The number of play_sync calls made.
    pub fn play_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| matches!(call, Call::PlaySync { .. }))
            .count()
    }

    /// The status of the given stream, if it was ever started.
    pub fn stream_status(&self, stream: StreamId) -> Option<StreamStatus> {
        self.state.lock().streams.get(&stream).copied()
    }

    /// The number of streams that have been started and not yet stopped.
    pub fn live_streams(&self) -> usize {
        self.state
            .lock()
            .streams
            .values()
            .filter(|status| **status != StreamStatus::Stopped)
            .count()
    }

    /// The pool size passed to the most recent create, if the pool is live.
    pub fn max_streams(&self) -> Option<u32> {
        self.state.lock().max_streams
    }

    /// Every call made against this backend, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    fn set_status(&self, stream: StreamId, from: &[StreamStatus], to: StreamStatus) {
        let mut state = self.state.lock();
        if let Some(status) = state.streams.get_mut(&stream) {
            if from.contains(status) {
                *status = to;
            }
        }
    }
}

impl super::Backend for Backend {
    fn create(&self, max_streams: u32) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        // Only one pool can exist at a time.
        if state.max_streams.is_some() {
            state.sounds.clear();
            state.streams.clear();
        }
        state.max_streams = Some(max_streams);
        state.calls.push(Call::Create(max_streams));
        info!(backend = self.name, max_streams, "Created sound pool.");
        Ok(())
    }

    fn release(&self) {
        let mut state = self.state.lock();
        state.max_streams = None;
        state.sounds.clear();
        state.streams.clear();
        state.calls.push(Call::Release);
        info!(backend = self.name, "Released sound pool.");
    }

    fn load(&self, resource: &str) -> Result<SoundId, BackendError> {
        {
            let mut state = self.state.lock();
            state.calls.push(Call::Load(resource.to_string()));
            if state.max_streams.is_none() {
                return Err(BackendError::NotCreated);
            }
            if let Some(sound) = state.sounds.get(resource) {
                return Ok(*sound);
            }
        }

        let delay = *self.load_delay.lock();
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        if self.missing.lock().contains(resource) {
            return Err(BackendError::ResourceNotFound(resource.to_string()));
        }

        let mut state = self.state.lock();
        state.next_sound += 1;
        let sound = SoundId(state.next_sound);
        state.sounds.insert(resource.to_string(), sound);
        debug!(backend = self.name, resource, %sound, "Loaded sound.");
        Ok(sound)
    }

    fn play_sync(
        &self,
        sounds: &[SoundId],
        _loops: i32,
        speed: f32,
        gain: f32,
    ) -> Result<Vec<StreamId>, BackendError> {
        let mut state = self.state.lock();
        state.calls.push(Call::PlaySync {
            sounds: sounds.to_vec(),
            speed,
            gain,
        });

        if state.max_streams.is_none() {
            return Err(BackendError::NotCreated);
        }
        for sound in sounds {
            if !state.sounds.values().any(|loaded| loaded == sound) {
                return Err(BackendError::NotLoaded(*sound));
            }
        }
        if *self.reject_play.lock() {
            return Err(BackendError::Rejected("Internal error".to_string()));
        }

        let mut streams = Vec::with_capacity(sounds.len());
        for _ in sounds {
            state.next_stream += 1;
            let stream = StreamId(state.next_stream);
            state.streams.insert(stream, StreamStatus::Playing);
            streams.push(stream);
        }
        Ok(streams)
    }

    fn stop(&self, stream: StreamId) {
        self.state.lock().calls.push(Call::Stop(stream));
        self.set_status(
            stream,
            &[
                StreamStatus::Playing,
                StreamStatus::Paused,
                StreamStatus::AutoPaused,
            ],
            StreamStatus::Stopped,
        );
    }

    fn pause(&self, stream: StreamId) {
        self.state.lock().calls.push(Call::Pause(stream));
        self.set_status(stream, &[StreamStatus::Playing], StreamStatus::Paused);
    }

    fn resume(&self, stream: StreamId) {
        self.state.lock().calls.push(Call::Resume(stream));
        self.set_status(stream, &[StreamStatus::Paused], StreamStatus::Playing);
    }

    fn auto_pause(&self) {
        let mut state = self.state.lock();
        state.calls.push(Call::AutoPause);
        for status in state.streams.values_mut() {
            if *status == StreamStatus::Playing {
                *status = StreamStatus::AutoPaused;
            }
        }
    }

    fn auto_resume(&self) {
        let mut state = self.state.lock();
        state.calls.push(Call::AutoResume);
        for status in state.streams.values_mut() {
            if *status == StreamStatus::AutoPaused {
                *status = StreamStatus::Playing;
            }
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
