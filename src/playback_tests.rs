//! Tests for the playback session state machine

#[cfg(test)]
mod tests {
    use crate::models::*;
    use crate::playback::*;
    use crate::stream::{StreamHints, StreamKind};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct FakeState {
        id: usize,
        loaded: Option<(String, StreamHints)>,
        play_results: VecDeque<Result<(), PlayRejected>>,
        play_calls: Vec<bool>, // muted flag at each play()
        muted: bool,
        volume: f32,
        has_data: bool,
        audio_tracks: Option<usize>,
        fullscreen_requests: usize,
        events: Vec<PlayerEvent>,
        dispose_calls: usize,
        position: f64,
        duration: Option<f64>,
    }

    struct FakePlayer {
        state: Rc<RefCell<FakeState>>,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl PlayerBackend for FakePlayer {
        fn load(&mut self, url: &str, hints: &StreamHints) {
            self.state.borrow_mut().loaded = Some((url.to_string(), *hints));
        }

        fn play(&mut self) -> Result<(), PlayRejected> {
            let mut state = self.state.borrow_mut();
            let muted = state.muted;
            state.play_calls.push(muted);
            state.play_results.pop_front().unwrap_or(Ok(()))
        }

        fn set_muted(&mut self, muted: bool) {
            self.state.borrow_mut().muted = muted;
        }

        fn is_muted(&self) -> bool {
            self.state.borrow().muted
        }

        fn set_volume(&mut self, volume: f32) {
            self.state.borrow_mut().volume = volume;
        }

        fn has_playable_data(&self) -> bool {
            self.state.borrow().has_data
        }

        fn audio_track_count(&self) -> Option<usize> {
            self.state.borrow().audio_tracks
        }

        fn request_fullscreen(&mut self) -> Result<(), String> {
            self.state.borrow_mut().fullscreen_requests += 1;
            Err("not allowed".to_string())
        }

        fn poll_events(&mut self) -> Vec<PlayerEvent> {
            std::mem::take(&mut self.state.borrow_mut().events)
        }

        fn position_secs(&self) -> f64 {
            self.state.borrow().position
        }

        fn duration_secs(&self) -> Option<f64> {
            self.state.borrow().duration
        }

        fn dispose(&mut self) {
            let mut state = self.state.borrow_mut();
            state.dispose_calls += 1;
            self.log.borrow_mut().push(format!("dispose {}", state.id));
        }
    }

    fn channel(url: &str) -> ChannelInfo {
        ChannelInfo {
            title: "Test".to_string(),
            group: "News".to_string(),
            logo: String::new(),
            url: url.to_string(),
            ch_number: 1,
            channel_type: ChannelType::Live,
        }
    }

    fn session_with(url: &str) -> (PlaybackSession, Rc<RefCell<FakeState>>, Instant) {
        let state = Rc::new(RefCell::new(FakeState::default()));
        let player = FakePlayer { state: state.clone(), log: Rc::new(RefCell::new(Vec::new())) };
        let mut session = PlaybackSession::new(channel(url), Box::new(player), SessionPolicy::default());
        let start = Instant::now();
        session.start(start);
        (session, state, start)
    }

    #[test]
    fn test_transport_stream_url_handed_to_player_as_hls() {
        let (session, state, _) = session_with("http://x/live/1.ts");
        let (url, hints) = state.borrow().loaded.clone().unwrap();
        assert_eq!(url, "http://x/live/1.m3u8");
        assert_eq!(hints.kind, StreamKind::Adaptive);
        assert_eq!(session.state(), PlaybackState::Loading);
    }

    #[test]
    fn test_unmuted_autoplay_succeeds() {
        let (mut session, state, start) = session_with("http://x/a.m3u8");
        session.handle_event(PlayerEvent::Ready, start);

        assert_eq!(session.state(), PlaybackState::Playing);
        assert!(!session.is_muted());
        assert_eq!(state.borrow().play_calls, vec![false]);
        assert_eq!(state.borrow().volume, 1.0);
        // Fullscreen is requested once; its failure is ignored
        assert_eq!(state.borrow().fullscreen_requests, 1);
        assert!(session.issue().is_none());
    }

    #[test]
    fn test_muted_retry_after_rejection() {
        let (mut session, state, start) = session_with("http://x/a.m3u8");
        state.borrow_mut().play_results.push_back(Err(PlayRejected("autoplay".to_string())));
        session.handle_event(PlayerEvent::Ready, start);

        assert_eq!(session.state(), PlaybackState::Playing);
        assert!(session.is_muted());
        assert_eq!(state.borrow().play_calls, vec![false, true]);
        assert!(session.issue().is_none());
    }

    #[test]
    fn test_both_attempts_fail_is_terminal() {
        let (mut session, state, start) = session_with("http://x/a.m3u8");
        state.borrow_mut().play_results.extend([
            Err(PlayRejected("autoplay".to_string())),
            Err(PlayRejected("decode".to_string())),
        ]);
        session.handle_event(PlayerEvent::Ready, start);

        assert_eq!(session.state(), PlaybackState::Failed);
        assert_eq!(session.issue(), Some(&PlaybackIssue::Error(CANNOT_PLAY.to_string())));
        assert_eq!(state.borrow().play_calls.len(), 2);

        // A second Ready does not trigger more attempts
        session.handle_event(PlayerEvent::Ready, start);
        assert_eq!(state.borrow().play_calls.len(), 2);
        assert_eq!(state.borrow().fullscreen_requests, 0);
    }

    #[test]
    fn test_stall_timeout_without_data_fails() {
        let (mut session, _state, start) = session_with("http://x/a.m3u8");
        session.tick(start + Duration::from_secs(7));
        assert_eq!(session.state(), PlaybackState::Loading);

        session.tick(start + Duration::from_secs(8));
        assert_eq!(session.state(), PlaybackState::Failed);
        assert_eq!(session.issue(), Some(&PlaybackIssue::Error(LOAD_TIMEOUT.to_string())));
    }

    #[test]
    fn test_stall_timeout_with_data_retries_once() {
        let (mut session, state, start) = session_with("http://x/a.m3u8");
        state.borrow_mut().has_data = true;
        session.tick(start + Duration::from_secs(8));

        assert_eq!(session.state(), PlaybackState::Playing);
        assert_eq!(state.borrow().play_calls.len(), 1);
    }

    #[test]
    fn test_stall_retry_rejected_fails() {
        let (mut session, state, start) = session_with("http://x/a.m3u8");
        {
            let mut s = state.borrow_mut();
            s.has_data = true;
            s.play_results.push_back(Err(PlayRejected("nope".to_string())));
        }
        session.tick(start + Duration::from_secs(9));
        session.tick(start + Duration::from_secs(20));

        assert_eq!(session.state(), PlaybackState::Failed);
        assert_eq!(session.issue(), Some(&PlaybackIssue::Error(LOADED_NOT_PLAYING.to_string())));
        assert_eq!(state.borrow().play_calls.len(), 1);
    }

    #[test]
    fn test_playing_session_ignores_stall_timer() {
        let (mut session, _state, start) = session_with("http://x/a.m3u8");
        session.handle_event(PlayerEvent::Ready, start);
        session.tick(start + Duration::from_secs(30));
        assert_eq!(session.state(), PlaybackState::Playing);
        assert!(session.issue().is_none());
    }

    #[test]
    fn test_no_audio_advisory_after_three_seconds() {
        let (mut session, state, start) = session_with("http://x/a.m3u8");
        state.borrow_mut().audio_tracks = Some(0);
        session.handle_event(PlayerEvent::Ready, start);
        session.handle_event(PlayerEvent::MetadataLoaded, start);

        session.tick(start + Duration::from_secs(2));
        assert!(session.issue().is_none());

        session.tick(start + Duration::from_secs(3));
        assert_eq!(session.issue(), Some(&PlaybackIssue::Advisory(NO_AUDIO.to_string())));
        assert_eq!(session.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_audio_tracks_present_no_advisory() {
        let (mut session, state, start) = session_with("http://x/a.m3u8");
        state.borrow_mut().audio_tracks = Some(2);
        session.handle_event(PlayerEvent::Ready, start);
        session.handle_event(PlayerEvent::MetadataLoaded, start);
        session.tick(start + Duration::from_secs(10));
        assert!(session.issue().is_none());
    }

    #[test]
    fn test_error_code_4_message() {
        let (mut session, _state, start) = session_with("http://x/a.m3u8");
        session.handle_event(
            PlayerEvent::Error { code: Some(MEDIA_ERR_SRC_NOT_SUPPORTED), message: String::new() },
            start,
        );
        assert_eq!(session.state(), PlaybackState::Failed);
        assert_eq!(session.issue(), Some(&PlaybackIssue::Error(SOURCE_UNSUPPORTED.to_string())));
    }

    #[test]
    fn test_other_error_message() {
        let (mut session, _state, start) = session_with("http://x/a.m3u8");
        session.handle_event(PlayerEvent::Error { code: Some(3), message: "decode".to_string() }, start);
        assert_eq!(
            session.issue(),
            Some(&PlaybackIssue::Error("Playback error: decode (code 3)".to_string()))
        );
    }

    #[test]
    fn test_stalled_then_playing_recovers() {
        let (mut session, state, start) = session_with("http://x/a.m3u8");
        session.handle_event(PlayerEvent::Ready, start);
        state.borrow_mut().events.push(PlayerEvent::Stalled);
        session.pump(start + Duration::from_secs(1));
        assert_eq!(session.state(), PlaybackState::Stalled);

        state.borrow_mut().events.push(PlayerEvent::Playing);
        session.pump(start + Duration::from_secs(2));
        assert_eq!(session.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_interaction_unmutes_once_per_kind() {
        let (mut session, state, start) = session_with("http://x/a.m3u8");
        state.borrow_mut().play_results.push_back(Err(PlayRejected("autoplay".to_string())));
        session.handle_event(PlayerEvent::Ready, start);
        assert!(session.is_muted());

        assert!(session.on_interaction(Interaction::Click));
        assert!(!session.is_muted());
        assert!(!state.borrow().muted);
        assert_eq!(state.borrow().volume, 1.0);

        // Muted again by the user; a second click no longer unmutes
        session.set_muted(true);
        assert!(!session.on_interaction(Interaction::Click));
        assert!(session.is_muted());

        // A different interaction kind still fires once
        assert!(session.on_interaction(Interaction::Key));
        assert!(!session.is_muted());
    }

    #[test]
    fn test_interaction_consumed_even_when_unmuted() {
        let (mut session, _state, start) = session_with("http://x/a.m3u8");
        session.handle_event(PlayerEvent::Ready, start);
        assert!(!session.on_interaction(Interaction::Touch));
        session.set_muted(true);
        assert!(!session.on_interaction(Interaction::Touch));
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let (mut session, state, _) = session_with("http://x/a.m3u8");
        session.dispose();
        session.dispose();
        drop(session);
        assert_eq!(state.borrow().dispose_calls, 1);
    }

    fn manager() -> (PlaybackManager, Rc<RefCell<Vec<String>>>, Rc<RefCell<Vec<Rc<RefCell<FakeState>>>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let states = Rc::new(RefCell::new(Vec::new()));
        let factory_log = log.clone();
        let factory_states = states.clone();
        let factory: PlayerFactory = Box::new(move || {
            let id = factory_states.borrow().len() + 1;
            let state = Rc::new(RefCell::new(FakeState { id, ..FakeState::default() }));
            factory_states.borrow_mut().push(state.clone());
            factory_log.borrow_mut().push(format!("create {}", id));
            Box::new(FakePlayer { state, log: factory_log.clone() }) as Box<dyn PlayerBackend>
        });
        (PlaybackManager::new(factory, SessionPolicy::default()), log, states)
    }

    #[test]
    fn test_switching_channel_disposes_before_creating() {
        let (mut manager, log, _) = manager();
        let now = Instant::now();
        assert!(manager.open(channel("http://x/one.m3u8"), now).is_none());
        let closed = manager.open(channel("http://x/two.m3u8"), now).unwrap();
        assert_eq!(closed.channel.url, "http://x/one.m3u8");

        assert_eq!(*log.borrow(), vec!["create 1", "dispose 1", "create 2"]);
        assert_eq!(manager.session().unwrap().channel().url, "http://x/two.m3u8");
    }

    #[test]
    fn test_close_leaves_no_active_player() {
        let (mut manager, log, states) = manager();
        manager.open(channel("http://x/one.m3u8"), Instant::now());
        assert!(manager.close().is_some());
        assert!(manager.close().is_none());
        assert!(!manager.is_active());
        assert_eq!(*log.borrow(), vec!["create 1", "dispose 1"]);
        assert_eq!(states.borrow()[0].borrow().dispose_calls, 1);
    }

    #[test]
    fn test_manager_interaction_without_session() {
        let (mut manager, _, _) = manager();
        assert!(!manager.on_interaction(Interaction::Click));
    }

    #[test]
    fn test_closed_session_reports_position_and_length() {
        let (mut manager, _, states) = manager();
        manager.open(channel("http://x/film.mp4"), Instant::now());
        let state = states.borrow()[0].clone();
        state.borrow_mut().position = 5300.0;
        state.borrow_mut().duration = Some(5400.0);
        let closed = manager.close().unwrap();
        assert_eq!(closed.position_secs, 5300.0);
        assert_eq!(closed.duration_secs, Some(5400.0));
        assert!(closed.watched_to_end());
    }

    #[test]
    fn test_watched_to_end_needs_known_length() {
        let closed = |position_secs, duration_secs| ClosedSession { channel: channel("http://x/a.mp4"), position_secs, duration_secs };
        assert!(!closed(30.0, Some(5400.0)).watched_to_end());
        assert!(closed(4860.0, Some(5400.0)).watched_to_end());
        assert!(!closed(4000.0, None).watched_to_end());
        assert!(!closed(10.0, Some(0.0)).watched_to_end());
    }
}
