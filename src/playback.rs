//! Playback session manager
//!
//! A [`PlaybackSession`] binds one player to one channel and runs the
//! autoplay, stall-timeout and audio-advisory policy as an explicit state
//! machine. Player callbacks arrive as [`PlayerEvent`]s and only trigger
//! transitions. [`PlaybackManager`] guarantees that at most one session
//! exists and that the previous player is disposed before a new one is built.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::config::AppConfig;
use crate::models::ChannelInfo;
use crate::stream::{detect_stream, StreamHints, StreamSource};

pub const CANNOT_PLAY: &str = "This stream cannot be played in this client. Use an external player.";
pub const LOAD_TIMEOUT: &str = "The stream did not load in time. Use an external player to watch it.";
pub const LOADED_NOT_PLAYING: &str = "The stream loaded but cannot be played. Use an external player.";
pub const NO_AUDIO: &str = "This stream has no audio track this client can play. Use an external player for sound.";
pub const SOURCE_UNSUPPORTED: &str = "Could not load the stream. The channel may be down or unsupported.";

/// Media error code for an unsupported or unreachable source
pub const MEDIA_ERR_SRC_NOT_SUPPORTED: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Loading,
    Playing,
    Stalled,
    Failed,
}

/// Notifications raised by a player
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Ready,
    MetadataLoaded,
    Playing,
    Stalled,
    Error { code: Option<u32>, message: String },
}

/// `play()` refused by the player or the runtime's autoplay policy
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("playback rejected: {0}")]
pub struct PlayRejected(pub String);

/// Decoded RGB24 frame
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// What is shown in the overlay's banner
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackIssue {
    /// Terminal; the overlay stays open and suggests an external player
    Error(String),
    /// Non-fatal; playback continues
    Advisory(String),
}

impl PlaybackIssue {
    pub fn message(&self) -> &str {
        match self {
            PlaybackIssue::Error(m) | PlaybackIssue::Advisory(m) => m,
        }
    }
}

/// User interaction that may unlock audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interaction {
    Click,
    Key,
    Touch,
}

/// Narrow interface to a media player
pub trait PlayerBackend {
    fn load(&mut self, url: &str, hints: &StreamHints);
    fn play(&mut self) -> Result<(), PlayRejected>;
    fn set_muted(&mut self, muted: bool);
    fn is_muted(&self) -> bool;
    fn set_volume(&mut self, volume: f32);
    /// Enough data buffered to start playback
    fn has_playable_data(&self) -> bool;
    /// `None` until the player knows
    fn audio_track_count(&self) -> Option<usize>;
    fn request_fullscreen(&mut self) -> Result<(), String>;
    fn poll_events(&mut self) -> Vec<PlayerEvent>;
    fn take_frame(&mut self) -> Option<VideoFrame> {
        None
    }
    fn position_secs(&self) -> f64 {
        0.0
    }
    /// `None` for live streams and until the container is probed
    fn duration_secs(&self) -> Option<f64> {
        None
    }
    /// Must be safe to call more than once
    fn dispose(&mut self);
}

#[derive(Debug, Clone)]
pub struct SessionPolicy {
    pub load_timeout: Duration,
    pub advisory_delay: Duration,
    pub fullscreen_on_play: bool,
    pub unmute_on_interaction: bool,
    pub broadcasters: Vec<String>,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl SessionPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            load_timeout: config.load_timeout(),
            advisory_delay: config.audio_advisory_delay(),
            fullscreen_on_play: config.fullscreen_on_play,
            unmute_on_interaction: config.unmute_on_interaction,
            broadcasters: config.audio_broadcasters.clone(),
        }
    }
}

pub struct PlaybackSession {
    channel: ChannelInfo,
    source: StreamSource,
    player: Box<dyn PlayerBackend>,
    policy: SessionPolicy,
    state: PlaybackState,
    issue: Option<PlaybackIssue>,
    muted: bool,
    loaded_at: Option<Instant>,
    playing_since: Option<Instant>,
    autoplay_attempted: bool,
    stall_checked: bool,
    no_audio: bool,
    advisory_shown: bool,
    fullscreen_requested: bool,
    consumed_interactions: HashSet<Interaction>,
    disposed: bool,
}

impl PlaybackSession {
    pub fn new(channel: ChannelInfo, player: Box<dyn PlayerBackend>, policy: SessionPolicy) -> Self {
        let source = detect_stream(&channel.url, &policy.broadcasters);
        Self {
            channel,
            source,
            player,
            policy,
            state: PlaybackState::Idle,
            issue: None,
            muted: false,
            loaded_at: None,
            playing_since: None,
            autoplay_attempted: false,
            stall_checked: false,
            no_audio: false,
            advisory_shown: false,
            fullscreen_requested: false,
            consumed_interactions: HashSet::new(),
            disposed: false,
        }
    }

    /// Assign the source; the stall timer starts now
    pub fn start(&mut self, now: Instant) {
        if self.disposed || self.state != PlaybackState::Idle {
            return;
        }
        log::info!(
            "Playing '{}' from {} ({})",
            self.channel.title,
            self.source.url,
            self.source.hints.kind.mime_type()
        );
        self.player.load(&self.source.url, &self.source.hints);
        self.state = PlaybackState::Loading;
        self.loaded_at = Some(now);
    }

    pub fn handle_event(&mut self, event: PlayerEvent, now: Instant) {
        if self.disposed {
            return;
        }
        match event {
            PlayerEvent::Ready => self.on_ready(now),
            PlayerEvent::MetadataLoaded => self.on_metadata(),
            PlayerEvent::Playing => self.on_playing(now),
            PlayerEvent::Stalled => self.on_stalled(),
            PlayerEvent::Error { code, message } => self.on_error(code, &message),
        }
    }

    /// Drain player events, then run timers
    pub fn pump(&mut self, now: Instant) {
        if self.disposed {
            return;
        }
        for event in self.player.poll_events() {
            self.handle_event(event, now);
        }
        self.tick(now);
    }

    pub fn tick(&mut self, now: Instant) {
        if self.disposed {
            return;
        }
        self.check_stall(now);
        self.check_audio_advisory(now);
    }

    fn on_ready(&mut self, now: Instant) {
        if self.state != PlaybackState::Loading || self.autoplay_attempted {
            return;
        }
        self.autoplay_attempted = true;

        self.player.set_muted(false);
        self.player.set_volume(1.0);
        match self.player.play() {
            Ok(()) => self.enter_playing(now, false),
            Err(first) => {
                log::info!("Unmuted autoplay rejected ({}), retrying muted", first);
                self.player.set_muted(true);
                match self.player.play() {
                    Ok(()) => self.enter_playing(now, true),
                    Err(second) => {
                        log::warn!("Muted autoplay rejected too: {}", second);
                        self.fail(CANNOT_PLAY);
                    }
                }
            }
        }
    }

    fn on_metadata(&mut self) {
        if self.player.audio_track_count() == Some(0) {
            log::info!("'{}' reports no audio tracks", self.channel.title);
            self.no_audio = true;
        }
    }

    fn on_playing(&mut self, now: Instant) {
        if matches!(self.state, PlaybackState::Loading | PlaybackState::Stalled) {
            let muted = self.player.is_muted();
            self.enter_playing(now, muted);
        }
    }

    fn on_stalled(&mut self) {
        if self.state == PlaybackState::Playing {
            log::debug!("Stream stalled");
            self.state = PlaybackState::Stalled;
        }
    }

    fn on_error(&mut self, code: Option<u32>, message: &str) {
        log::error!("Player error {:?} for {}: {}", code, self.source.url, message);
        let text = match code {
            Some(MEDIA_ERR_SRC_NOT_SUPPORTED) => SOURCE_UNSUPPORTED.to_string(),
            Some(code) => format!("Playback error: {} (code {})", non_empty(message), code),
            None => format!("Playback error: {}", non_empty(message)),
        };
        self.fail(&text);
    }

    fn check_stall(&mut self, now: Instant) {
        if self.state != PlaybackState::Loading || self.stall_checked {
            return;
        }
        let Some(loaded_at) = self.loaded_at else { return };
        if now.duration_since(loaded_at) < self.policy.load_timeout {
            return;
        }
        self.stall_checked = true;

        if !self.player.has_playable_data() {
            log::warn!("No playable data after {:?}", self.policy.load_timeout);
            self.fail(LOAD_TIMEOUT);
            return;
        }
        log::info!("Data buffered but not playing, retrying play once");
        match self.player.play() {
            Ok(()) => {
                let muted = self.player.is_muted();
                self.enter_playing(now, muted);
            }
            Err(e) => {
                log::warn!("Retry failed: {}", e);
                self.fail(LOADED_NOT_PLAYING);
            }
        }
    }

    fn check_audio_advisory(&mut self, now: Instant) {
        if !self.no_audio || self.advisory_shown || self.state != PlaybackState::Playing {
            return;
        }
        let Some(since) = self.playing_since else { return };
        if now.duration_since(since) >= self.policy.advisory_delay && self.issue.is_none() {
            self.issue = Some(PlaybackIssue::Advisory(NO_AUDIO.to_string()));
            self.advisory_shown = true;
        }
    }

    fn enter_playing(&mut self, now: Instant, muted: bool) {
        self.state = PlaybackState::Playing;
        self.muted = muted;
        self.playing_since.get_or_insert(now);

        if self.policy.fullscreen_on_play && !self.fullscreen_requested {
            self.fullscreen_requested = true;
            if let Err(e) = self.player.request_fullscreen() {
                log::debug!("Fullscreen request ignored: {}", e);
            }
        }
    }

    fn fail(&mut self, message: &str) {
        self.state = PlaybackState::Failed;
        self.issue = Some(PlaybackIssue::Error(message.to_string()));
    }

    /// First click/key/touch of each kind unmutes a muted player
    pub fn on_interaction(&mut self, kind: Interaction) -> bool {
        if self.disposed || !self.policy.unmute_on_interaction {
            return false;
        }
        if !self.consumed_interactions.insert(kind) {
            return false;
        }
        if !self.muted {
            return false;
        }
        log::info!("User interaction ({:?}), enabling audio", kind);
        self.unmute();
        true
    }

    pub fn unmute(&mut self) {
        self.set_muted(false);
        self.player.set_volume(1.0);
    }

    pub fn set_muted(&mut self, muted: bool) {
        if self.disposed {
            return;
        }
        self.player.set_muted(muted);
        self.muted = muted;
    }

    pub fn request_fullscreen(&mut self) {
        if let Err(e) = self.player.request_fullscreen() {
            log::debug!("Fullscreen request ignored: {}", e);
        }
    }

    /// Release the player; idempotent
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        log::debug!("Disposing player for '{}'", self.channel.title);
        self.player.dispose();
        self.disposed = true;
        self.state = PlaybackState::Idle;
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn issue(&self) -> Option<&PlaybackIssue> {
        self.issue.as_ref()
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn channel(&self) -> &ChannelInfo {
        &self.channel
    }

    pub fn source(&self) -> &StreamSource {
        &self.source
    }

    pub fn position_secs(&self) -> f64 {
        self.player.position_secs()
    }

    pub fn duration_secs(&self) -> Option<f64> {
        self.player.duration_secs()
    }

    pub fn take_frame(&mut self) -> Option<VideoFrame> {
        if self.disposed {
            return None;
        }
        self.player.take_frame()
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn non_empty(message: &str) -> &str {
    if message.trim().is_empty() { "unknown error" } else { message }
}

pub type PlayerFactory = Box<dyn Fn() -> Box<dyn PlayerBackend>>;

/// Owns the single active session
pub struct PlaybackManager {
    factory: PlayerFactory,
    policy: SessionPolicy,
    session: Option<PlaybackSession>,
}

/// What was playing when a session closed
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedSession {
    pub channel: ChannelInfo,
    pub position_secs: f64,
    pub duration_secs: Option<f64>,
}

/// Share of the running time after which a title counts as watched
const SEEN_FRACTION: f64 = 0.9;

impl ClosedSession {
    /// Played into the last stretch of a title with a known length
    pub fn watched_to_end(&self) -> bool {
        match self.duration_secs {
            Some(total) if total > 0.0 => self.position_secs >= total * SEEN_FRACTION,
            _ => false,
        }
    }
}

impl PlaybackManager {
    pub fn new(factory: PlayerFactory, policy: SessionPolicy) -> Self {
        Self { factory, policy, session: None }
    }

    /// Dispose the current session, then start one for `channel`
    pub fn open(&mut self, channel: ChannelInfo, now: Instant) -> Option<ClosedSession> {
        let previous = self.close();
        let player = (self.factory)();
        let mut session = PlaybackSession::new(channel, player, self.policy.clone());
        session.start(now);
        self.session = Some(session);
        previous
    }

    pub fn close(&mut self) -> Option<ClosedSession> {
        let mut session = self.session.take()?;
        let closed = ClosedSession {
            channel: session.channel().clone(),
            position_secs: session.position_secs(),
            duration_secs: session.duration_secs(),
        };
        session.dispose();
        Some(closed)
    }

    pub fn pump(&mut self, now: Instant) {
        if let Some(session) = self.session.as_mut() {
            session.pump(now);
        }
    }

    pub fn on_interaction(&mut self, kind: Interaction) -> bool {
        self.session.as_mut().map(|s| s.on_interaction(kind)).unwrap_or(false)
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut PlaybackSession> {
        self.session.as_mut()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }
}

#[cfg(test)]
#[path = "playback_tests.rs"]
mod tests;
