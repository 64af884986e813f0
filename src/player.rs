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
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, span, warn, Level, Span};

use crate::{
    backend::StreamId,
    error::Error,
    instrument::Instrument,
    samples::{clamp_gain, clamp_speed, SampleKey},
    sequencer::{ScheduledStop, Sequencer},
};

/// How long a note sounds before it is stopped.
pub const DEFAULT_DURATION: Duration = Duration::from_millis(3000);

/// Time reserved for fading a note out.
pub const DEFAULT_RELEASE: Duration = Duration::from_millis(300);

/// Envelope and playback settings of a player.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlayerOptions {
    duration: Duration,
    release: Duration,
    speed: f32,
    gain: f32,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        PlayerOptions {
            duration: DEFAULT_DURATION,
            release: DEFAULT_RELEASE,
            speed: 1.0,
            gain: 1.0,
        }
    }
}

impl PlayerOptions {
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Reserved for a release envelope. Notes are currently cut at `duration`.
    pub fn release(&self) -> Duration {
        self.release
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Returns these options with every field set in `update` replaced. Speed and gain are
    /// clamped into their valid ranges.
    pub fn merged(&self, update: &OptionsUpdate) -> Result<PlayerOptions, Error> {
        Ok(PlayerOptions {
            duration: update.duration.unwrap_or(self.duration),
            release: update.release.unwrap_or(self.release),
            speed: update.speed.map(clamp_speed).transpose()?.unwrap_or(self.speed),
            gain: update.gain.map(clamp_gain).transpose()?.unwrap_or(self.gain),
        })
    }
}

/// A partial set of options to merge into a player's current options.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OptionsUpdate {
    pub duration: Option<Duration>,
    pub release: Option<Duration>,
    pub speed: Option<f32>,
    pub gain: Option<f32>,
}

impl OptionsUpdate {
    pub fn new() -> OptionsUpdate {
        OptionsUpdate::default()
    }

    pub fn duration(mut self, duration: Duration) -> OptionsUpdate {
        self.duration = Some(duration);
        self
    }

    pub fn release(mut self, release: Duration) -> OptionsUpdate {
        self.release = Some(release);
        self
    }

    pub fn speed(mut self, speed: f32) -> OptionsUpdate {
        self.speed = Some(speed);
        self
    }

    pub fn gain(mut self, gain: f32) -> OptionsUpdate {
        self.gain = Some(gain);
        self
    }
}

/// Identifies a group as it starts. `generation` is the player's stop count when the start
/// fired; a group whose generation is stale was stopped before its streams came back.
#[derive(Clone, Copy)]
struct GroupTicket {
    id: u64,
    generation: u64,
}

/// Streams started by one `play` call, along with the stop that will retire them.
struct ActiveGroup {
    id: u64,
    streams: Vec<StreamId>,
    auto_stop: ScheduledStop,
}

/// Plays notes of an instrument along the player's own timeline.
pub struct Player {
    /// The instrument to play from. May be shared with other players.
    instrument: Arc<Instrument>,
    options: Arc<RwLock<PlayerOptions>>,
    sequencer: Sequencer,
    /// Stream groups that have started and not been stopped yet.
    active: Arc<Mutex<Vec<ActiveGroup>>>,
    next_group: AtomicU64,
    /// Bumped by every explicit stop, under the `active` lock.
    generation: Arc<AtomicU64>,
    /// The logging span.
    span: Span,
}

impl Player {
    /// Creates a new player with the default options merged with `options`.
    pub fn new(instrument: Arc<Instrument>, options: OptionsUpdate) -> Result<Player, Error> {
        let options = PlayerOptions::default().merged(&options)?;
        let span = span!(Level::INFO, "player", instrument = instrument.name());
        Ok(Player {
            instrument,
            options: Arc::new(RwLock::new(options)),
            sequencer: Sequencer::new(),
            active: Arc::new(Mutex::new(Vec::new())),
            next_group: AtomicU64::new(1),
            generation: Arc::new(AtomicU64::new(0)),
            span,
        })
    }

    /// Merges `update` into the current options.
    pub fn configure(&self, update: OptionsUpdate) -> Result<&Self, Error> {
        let mut options = self.options.write();
        *options = options.merged(&update)?;
        Ok(self)
    }

    /// The current options.
    pub fn options(&self) -> PlayerOptions {
        *self.options.read()
    }

    /// The instrument this player plays from.
    pub fn shared_instrument(&self) -> &Arc<Instrument> {
        &self.instrument
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    /// Loads the given notes. Fails with `Error::LoadFailed` listing the notes that couldn't be
    /// loaded.
    pub async fn prepare<S: AsRef<str>>(&self, notes: &[S]) -> Result<&Self, Error> {
        let keys = SampleKey::parse_all(notes)?;
        let pending = self.instrument.loader().prepare(&keys)?;
        let prepared = async {
            pending.await?;
            debug!(notes = keys.len(), "Finished preparing.");
            Ok::<(), Error>(())
        };
        tracing::Instrument::instrument(prepared, self.span.clone()).await?;
        Ok(self)
    }

    /// Plays the given notes together at `when` on the player's timeline. The timeline starts
    /// with the first `play` and ends once every note has been stopped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn play<S: AsRef<str>>(&self, notes: &[S], when: Duration) -> Result<&Self, Error> {
        let _enter = self.span.enter();

        let keys = SampleKey::parse_all(notes)?;
        if self.instrument.loader().is_released() {
            return Err(Error::Released);
        }

        let id = self.next_group.fetch_add(1, Ordering::Relaxed);
        let instrument = self.instrument.clone();
        let options = self.options.clone();
        let sequencer = self.sequencer.clone();
        let active = self.active.clone();
        let generation = self.generation.clone();
        let span = self.span.clone();
        self.sequencer.start(
            move || {
                let ticket = GroupTicket {
                    id,
                    generation: generation.load(Ordering::SeqCst),
                };
                let group = Player::start_group(
                    instrument, options, sequencer, active, generation, keys, ticket,
                );
                tokio::spawn(tracing::Instrument::instrument(group, span));
            },
            when,
        );

        Ok(self)
    }

    async fn start_group(
        instrument: Arc<Instrument>,
        options: Arc<RwLock<PlayerOptions>>,
        sequencer: Sequencer,
        active: Arc<Mutex<Vec<ActiveGroup>>>,
        generation: Arc<AtomicU64>,
        keys: Vec<SampleKey>,
        ticket: GroupTicket,
    ) {
        let id = ticket.id;
        let options = *options.read();
        let streams = match instrument
            .gate()
            .play(&keys, options.speed(), options.gain())
            .await
        {
            Ok(Some(streams)) => streams,
            Ok(None) => {
                sequencer.retire();
                return;
            }
            Err(e) => {
                error!(err = %e, "Error while playing notes.");
                sequencer.retire();
                return;
            }
        };

        let mut active_groups = active.lock();
        if generation.load(Ordering::SeqCst) != ticket.generation {
            drop(active_groups);
            debug!(group = id, "Player stopped while notes were starting.");
            if let Err(e) = instrument.gate().stop(&streams) {
                warn!(err = %e, group = id, "Error stopping notes.");
            }
            sequencer.retire();
            return;
        }

        let auto_stop = {
            let instrument = instrument.clone();
            let active = active.clone();
            sequencer.stop(
                move || Player::auto_stop(&instrument, &active, id),
                options.duration(),
            )
        };
        debug!(group = id, streams = streams.len(), "Notes started.");
        active_groups.push(ActiveGroup {
            id,
            streams,
            auto_stop,
        });
    }

    /// Stops one group once its duration has elapsed, unless it was already stopped.
    fn auto_stop(instrument: &Instrument, active: &Mutex<Vec<ActiveGroup>>, id: u64) {
        let group = {
            let mut active = active.lock();
            active
                .iter()
                .position(|group| group.id == id)
                .map(|index| active.remove(index))
        };

        if let Some(group) = group {
            if let Err(e) = instrument.gate().stop(&group.streams) {
                warn!(err = %e, group = id, "Error stopping notes.");
            }
            debug!(group = id, "Notes stopped.");
        }
    }

    /// Stops every note this player has started, including notes whose start has fired but
    /// whose streams haven't come back from the backend yet. Notes of other players are not
    /// affected.
    pub fn stop(&self) -> Result<&Self, Error> {
        let _enter = self.span.enter();

        let groups = {
            let mut active = self.active.lock();
            self.generation.fetch_add(1, Ordering::SeqCst);
            std::mem::take(&mut *active)
        };
        if groups.is_empty() {
            info!("Player is not active, nothing to stop.");
            return Ok(self);
        }

        for group in &groups {
            group.auto_stop.cancel();
        }
        let streams: Vec<StreamId> = groups
            .iter()
            .flat_map(|group| group.streams.iter().copied())
            .collect();
        info!(streams = streams.len(), "Stopping playback.");
        self.instrument.gate().stop(&streams)?;
        Ok(self)
    }

    /// Pauses every note this player has started.
    pub fn pause(&self) -> Result<&Self, Error> {
        // pause_all would pause the other players of this instrument too.
        self.instrument.gate().pause(&self.active_streams())?;
        Ok(self)
    }

    /// Resumes every note paused by [`Player::pause`].
    pub fn resume(&self) -> Result<&Self, Error> {
        self.instrument.gate().resume(&self.active_streams())?;
        Ok(self)
    }

    /// The streams currently started by this player.
    pub fn active_streams(&self) -> Vec<StreamId> {
        self.active
            .lock()
            .iter()
            .flat_map(|group| group.streams.iter().copied())
            .collect()
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use tokio::time;

    use super::*;
    use crate::backend::mock::{self, Call, StreamStatus};
    use crate::testutil::eventually_async;

    fn player(options: OptionsUpdate) -> (Player, mock::Backend) {
        let backend = mock::Backend::get("mock");
        let instrument =
            Arc::new(Instrument::new("piano", Arc::new(backend.clone()), None).unwrap());
        (Player::new(instrument, options).unwrap(), backend)
    }

    async fn wait_for_streams(player: &Player, count: usize) {
        eventually_async(
            move || async move { player.active_streams().len() == count },
            "Streams never started",
        )
        .await;
    }

    fn stop_calls(backend: &mock::Backend, stream: StreamId) -> usize {
        backend
            .calls()
            .iter()
            .filter(|call| **call == Call::Stop(stream))
            .count()
    }

    #[test]
    fn test_configure_clamps() {
        let (player, _backend) = player(OptionsUpdate::new());
        assert_eq!(player.options(), PlayerOptions::default());

        player.configure(OptionsUpdate::new().speed(5.0)).unwrap();
        assert_eq!(player.options().speed(), 2.0);

        player.configure(OptionsUpdate::new().gain(-1.0)).unwrap();
        assert_eq!(player.options().gain(), 0.0);
        // Earlier settings are kept by later merges.
        assert_eq!(player.options().speed(), 2.0);

        assert!(player
            .configure(OptionsUpdate::new().speed(f32::NAN))
            .is_err());
        assert_eq!(player.options().speed(), 2.0);

        player
            .configure(
                OptionsUpdate::new()
                    .duration(Duration::from_millis(1000))
                    .release(Duration::from_millis(50)),
            )
            .unwrap();
        assert_eq!(player.options().duration(), Duration::from_millis(1000));
        assert_eq!(player.options().release(), Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_and_auto_stop() -> Result<(), Error> {
        let (player, backend) = player(OptionsUpdate::new().duration(Duration::from_millis(1000)));
        player.prepare(&["c5", "e5", "g5"]).await?;

        player.play(&["c5", "E5", "g5"], Duration::ZERO)?;
        wait_for_streams(&player, 3).await;
        assert_eq!(backend.play_count(), 1);
        assert_eq!(backend.live_streams(), 3);

        let streams = player.active_streams();
        let origin = player.sequencer().origin().expect("timeline started");
        let started = time::Instant::now();

        time::sleep_until(origin + Duration::from_millis(990)).await;
        assert_eq!(player.active_streams().len(), 3);
        assert_eq!(backend.live_streams(), 3);

        time::sleep_until(started + Duration::from_millis(1001)).await;
        assert!(player.active_streams().is_empty());
        for stream in streams {
            assert_eq!(backend.stream_status(stream), Some(StreamStatus::Stopped));
            assert_eq!(stop_calls(&backend, stream), 1);
        }
        assert!(player.sequencer().is_idle());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_unprepared_note_plays_nothing() -> Result<(), Error> {
        let (player, backend) = player(OptionsUpdate::new());
        player.prepare(&["c5"]).await?;

        player.play(&["c5", "x9"], Duration::ZERO)?;
        let sequencer = player.sequencer().clone();
        eventually_async(
            move || {
                let sequencer = sequencer.clone();
                async move { sequencer.is_idle() }
            },
            "Failed play never retired",
        )
        .await;

        assert!(player.active_streams().is_empty());
        assert_eq!(backend.play_count(), 0);
        assert_eq!(backend.live_streams(), 0);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_stop_supersedes_auto_stop() -> Result<(), Error> {
        let (player, backend) = player(OptionsUpdate::new().duration(Duration::from_millis(1000)));
        player.prepare(&["c5", "e5"]).await?;

        player.play(&["c5", "e5"], Duration::ZERO)?;
        wait_for_streams(&player, 2).await;
        let streams = player.active_streams();

        player.stop()?;
        assert!(player.active_streams().is_empty());
        time::sleep(Duration::from_millis(1)).await;
        assert!(player.sequencer().is_idle());

        time::sleep(Duration::from_millis(2000)).await;
        for stream in streams {
            assert_eq!(stop_calls(&backend, stream), 1);
        }
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_catches_starting_notes() -> Result<(), Error> {
        let (player, backend) = player(OptionsUpdate::new().duration(Duration::from_millis(1000)));
        player.prepare(&["c5"]).await?;

        // The start fires right away, but its streams are still on their way back.
        player.play(&["c5"], Duration::ZERO)?;
        player.stop()?;

        let sequencer = player.sequencer().clone();
        eventually_async(
            move || {
                let sequencer = sequencer.clone();
                async move { sequencer.is_idle() }
            },
            "Stopped notes never settled",
        )
        .await;

        assert!(player.active_streams().is_empty());
        assert_eq!(backend.play_count(), 1);
        assert_eq!(backend.live_streams(), 0);

        // Later plays are unaffected by the earlier stop.
        player.play(&["c5"], Duration::ZERO)?;
        wait_for_streams(&player, 1).await;
        assert_eq!(backend.live_streams(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_deferred_play() -> Result<(), Error> {
        let (player, backend) = player(OptionsUpdate::new());
        player.prepare(&["c5", "g5"]).await?;

        player.play(&["c5"], Duration::ZERO)?;
        player.play(&["g5"], Duration::from_millis(500))?;
        assert_eq!(player.sequencer().in_flight(), 2);
        wait_for_streams(&player, 1).await;

        time::sleep(Duration::from_millis(400)).await;
        assert_eq!(backend.play_count(), 1);

        time::sleep(Duration::from_millis(200)).await;
        wait_for_streams(&player, 2).await;
        assert_eq!(backend.play_count(), 2);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_players_are_isolated() -> Result<(), Error> {
        let backend = mock::Backend::get("mock");
        let instrument = Arc::new(Instrument::new("piano", Arc::new(backend.clone()), None)?);
        let first = Player::new(instrument.clone(), OptionsUpdate::new())?;
        let second = Player::new(instrument.clone(), OptionsUpdate::new())?;
        first.prepare(&["c5", "e5"]).await?;

        first.play(&["c5"], Duration::ZERO)?;
        second.play(&["e5"], Duration::ZERO)?;
        wait_for_streams(&first, 1).await;
        wait_for_streams(&second, 1).await;
        let first_stream = first.active_streams()[0];
        let second_stream = second.active_streams()[0];

        first.pause()?;
        assert_eq!(
            backend.stream_status(first_stream),
            Some(StreamStatus::Paused)
        );
        assert_eq!(
            backend.stream_status(second_stream),
            Some(StreamStatus::Playing)
        );

        first.resume()?;
        assert_eq!(
            backend.stream_status(first_stream),
            Some(StreamStatus::Playing)
        );

        second.stop()?;
        assert_eq!(
            backend.stream_status(first_stream),
            Some(StreamStatus::Playing)
        );
        assert_eq!(
            backend.stream_status(second_stream),
            Some(StreamStatus::Stopped)
        );
        assert!(!first.sequencer().is_idle());
        Ok(())
    }

    #[tokio::test]
    async fn test_prepare_failure() {
        let (player, backend) = player(OptionsUpdate::new());
        backend.set_missing("piano_x9");

        let err = player.prepare(&["c5", "x9"]).await.err().expect("error");
        assert_eq!(
            err.failed_keys(),
            Some(&[SampleKey::parse("x9").unwrap()][..])
        );
    }

    #[tokio::test]
    async fn test_play_validation() {
        let (player, _backend) = player(OptionsUpdate::new());
        let empty: [&str; 0] = [];

        assert!(matches!(
            player.play(&empty, Duration::ZERO),
            Err(Error::EmptyRequest)
        ));
        assert!(matches!(
            player.play(&["c 5"], Duration::ZERO),
            Err(Error::InvalidNote(_))
        ));
        assert!(player.sequencer().is_idle());

        player.shared_instrument().release();
        assert!(matches!(
            player.play(&["c5"], Duration::ZERO),
            Err(Error::Released)
        ));
        assert!(matches!(player.stop(), Ok(_)));
    }
}
