//! Tests for the application state controller

#[cfg(test)]
mod tests {
    use crate::api::Backend;
    use crate::controller::*;
    use crate::error::{ClientError, Result};
    use crate::models::*;
    use crate::playback::ClosedSession;
    use crate::storage::{Favorites, MemoryStore};
    use crate::tasks::manual::ManualSpawner;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct FakeBackend {
        calls: Mutex<Vec<String>>,
        fail_initialize: Mutex<Option<ClientError>>,
        fail_channels: Mutex<bool>,
        items_per_page: Mutex<usize>,
        total_pages: Mutex<u32>,
        status: Mutex<ParserStatus>,
        saved: Mutex<Vec<SavedPlaylist>>,
    }

    impl FakeBackend {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                fail_initialize: Mutex::new(None),
                fail_channels: Mutex::new(false),
                items_per_page: Mutex::new(3),
                total_pages: Mutex::new(3),
                status: Mutex::new(ParserStatus::Initialized),
                saved: Mutex::new(vec![playlist("sports"), playlist("movies"), playlist("kids")]),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    fn playlist(name: &str) -> SavedPlaylist {
        SavedPlaylist { name: name.to_string(), last_modified: String::new(), size: 1024 }
    }

    fn channel(ch_number: i64, channel_type: ChannelType) -> ChannelInfo {
        ChannelInfo {
            title: format!("Channel {}", ch_number),
            group: "News".to_string(),
            logo: String::new(),
            url: format!("http://x/{}.ts", ch_number),
            ch_number,
            channel_type,
        }
    }

    impl Backend for FakeBackend {
        fn initialize(&self, request: &InitializeRequest) -> Result<()> {
            self.record(format!("initialize {} {} {}", request.playlist_url, request.name, request.load_cache));
            match self.fail_initialize.lock().unwrap().clone() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }

        fn process(&self) -> Result<()> {
            self.record("process".to_string());
            Ok(())
        }

        fn status(&self) -> Result<ParserStatus> {
            self.record("status".to_string());
            Ok(*self.status.lock().unwrap())
        }

        fn channels(&self, query: &ChannelQuery) -> Result<Page<ChannelInfo>> {
            self.record(format!(
                "channels {:?} page={} search={} group={}",
                query.filter, query.page, query.search, query.group
            ));
            if *self.fail_channels.lock().unwrap() {
                return Err(ClientError::Network("connection reset".to_string()));
            }
            let count = *self.items_per_page.lock().unwrap();
            let items = (0..count)
                .map(|i| channel(query.page as i64 * 100 + i as i64, ChannelType::Live))
                .collect();
            Ok(Page {
                items,
                total: 9,
                page: query.page,
                page_size: query.page_size,
                total_pages: *self.total_pages.lock().unwrap(),
            })
        }

        fn channel(&self, ch_number: i64) -> Result<ChannelInfo> {
            self.record(format!("channel {}", ch_number));
            if ch_number == 404 {
                return Err(ClientError::Backend { status: 404, message: "Channel not found".to_string() });
            }
            Ok(channel(ch_number, ChannelType::Movie))
        }

        fn update_progress(&self, ch_number: i64, seen: bool, position: f64) -> Result<()> {
            self.record(format!("progress {} {} {}", ch_number, seen, position));
            Ok(())
        }

        fn groups(&self) -> Result<Vec<String>> {
            self.record("groups".to_string());
            Ok(vec!["News".to_string(), "Sports".to_string()])
        }

        fn group_channels(&self, name: &str) -> Result<Vec<ChannelInfo>> {
            self.record(format!("group_channels {}", name));
            Ok(Vec::new())
        }

        fn history(&self) -> Result<Vec<HistoryEntry>> {
            self.record("history".to_string());
            Ok(vec![HistoryEntry {
                title: "Film".to_string(),
                position: 60.0,
                total_duration: 5400.0,
                seen: false,
                date: "2024-05-01".to_string(),
            }])
        }

        fn saved_playlists(&self) -> Result<Vec<SavedPlaylist>> {
            self.record("saved_playlists".to_string());
            Ok(self.saved.lock().unwrap().clone())
        }

        fn load_playlist(&self, name: &str) -> Result<()> {
            self.record(format!("load_playlist {}", name));
            Ok(())
        }

        fn delete_playlist(&self, name: &str) -> Result<()> {
            self.record(format!("delete_playlist {}", name));
            let mut saved = self.saved.lock().unwrap();
            match saved.iter().position(|p| p.name == name) {
                Some(idx) => {
                    saved.remove(idx);
                    Ok(())
                }
                None => Err(ClientError::Backend {
                    status: 404,
                    message: format!("Playlist '{}' not found", name),
                }),
            }
        }
    }

    fn timing() -> LoadTiming {
        LoadTiming { settle: Duration::ZERO, saved_settle: Duration::ZERO }
    }

    fn setup() -> (AppController, Arc<FakeBackend>, ManualSpawner) {
        let backend = FakeBackend::new();
        let spawner = ManualSpawner::new();
        let controller = AppController::new(
            backend.clone(),
            Box::new(spawner.clone()),
            Favorites::load(Box::new(MemoryStore::new())),
            timing(),
            50,
        );
        (controller, backend, spawner)
    }

    fn settle(controller: &mut AppController, spawner: &ManualSpawner) {
        // Results can queue follow-up work (entering Browsing fetches a page)
        for _ in 0..4 {
            spawner.run_all();
            controller.poll();
        }
    }

    fn browsing() -> (AppController, Arc<FakeBackend>, ManualSpawner) {
        let (mut controller, backend, spawner) = setup();
        controller.submit_playlist_url("https://x/list.m3u").unwrap();
        settle(&mut controller, &spawner);
        assert_eq!(controller.phase(), Phase::Browsing);
        backend.calls.lock().unwrap().clear();
        (controller, backend, spawner)
    }

    #[test]
    fn test_load_playlist_enters_browsing() {
        let (mut controller, backend, spawner) = setup();
        controller.submit_playlist_url("https://x/list.m3u").unwrap();
        assert_eq!(controller.phase(), Phase::Loading);

        settle(&mut controller, &spawner);

        assert_eq!(controller.phase(), Phase::Browsing);
        assert_eq!(controller.page(), 1);
        assert_eq!(controller.query().filter, ChannelFilter::All);
        assert_eq!(controller.query().group, ALL_GROUPS);
        assert_eq!(controller.channels().len(), 3);
        assert_eq!(controller.total_pages(), 3);
        assert_eq!(controller.groups(), ["News".to_string(), "Sports".to_string()]);
        let calls = backend.calls();
        assert_eq!(calls[0], "initialize https://x/list.m3u default false");
        assert_eq!(calls[1], "process");
        assert!(calls.contains(&"channels All page=1 search= group=all".to_string()));
        assert!(controller.error().is_none());
    }

    #[test]
    fn test_blank_url_never_hits_network() {
        let (mut controller, backend, spawner) = setup();
        for url in ["", "   ", "\t\n"] {
            let err = controller.submit_playlist_url(url).unwrap_err();
            assert!(matches!(err, ClientError::Validation(_)));
        }
        assert_eq!(spawner.pending(), 0);
        assert!(backend.calls().is_empty());
        assert_eq!(controller.phase(), Phase::Uninitialized);
        assert!(controller.error().is_some());
    }

    #[test]
    fn test_backend_failure_keeps_load_screen() {
        let (mut controller, backend, spawner) = setup();
        *backend.fail_initialize.lock().unwrap() = Some(ClientError::Backend {
            status: 400,
            message: "Invalid playlist URL".to_string(),
        });
        controller.submit_playlist_url("https://x/bad.m3u").unwrap();
        settle(&mut controller, &spawner);

        assert_eq!(controller.phase(), Phase::Uninitialized);
        assert_eq!(controller.error(), Some("Invalid playlist URL"));
        assert!(!backend.calls().contains(&"process".to_string()));
    }

    #[test]
    fn test_parser_timeout_fails_load() {
        let backend = FakeBackend::new();
        *backend.status.lock().unwrap() = ParserStatus::Timeout;
        let spawner = ManualSpawner::new();
        let mut controller = AppController::new(
            backend.clone(),
            Box::new(spawner.clone()),
            Favorites::load(Box::new(MemoryStore::new())),
            LoadTiming { settle: Duration::from_millis(200), saved_settle: Duration::ZERO },
            50,
        );
        controller.submit_playlist_url("https://x/list.m3u").unwrap();
        settle(&mut controller, &spawner);

        assert_eq!(controller.phase(), Phase::Uninitialized);
        assert!(controller.error().unwrap().contains("timed out"));
    }

    #[test]
    fn test_submit_rejected_while_browsing() {
        let (mut controller, _, _) = browsing();
        let err = controller.submit_playlist_url("https://x/other.m3u").unwrap_err();
        assert!(matches!(err, ClientError::InvalidPhase { .. }));
    }

    #[test]
    fn test_load_saved_playlist_skips_processing() {
        let (mut controller, backend, spawner) = setup();
        controller.load_saved_playlist("sports").unwrap();
        settle(&mut controller, &spawner);

        assert_eq!(controller.phase(), Phase::Browsing);
        let calls = backend.calls();
        assert_eq!(calls[0], "load_playlist sports");
        assert!(!calls.contains(&"process".to_string()));
        assert!(!calls.iter().any(|c| c.starts_with("initialize")));
    }

    #[test]
    fn test_query_changes_reset_page() {
        let (mut controller, backend, spawner) = browsing();
        controller.change_page(3).unwrap();
        settle(&mut controller, &spawner);
        assert_eq!(controller.page(), 3);

        controller.change_filter(ChannelFilter::Live).unwrap();
        assert_eq!(controller.page(), 1);
        settle(&mut controller, &spawner);
        controller.change_page(2).unwrap();
        controller.change_group("Sports").unwrap();
        assert_eq!(controller.page(), 1);
        settle(&mut controller, &spawner);
        controller.change_page(2).unwrap();
        controller.change_search("news").unwrap();
        assert_eq!(controller.page(), 1);
        settle(&mut controller, &spawner);

        let calls = backend.calls();
        assert!(calls.contains(&"channels Live page=1 search= group=all".to_string()));
        assert!(calls.contains(&"channels Live page=1 search= group=Sports".to_string()));
        assert_eq!(calls.last().unwrap(), "channels Live page=1 search=news group=Sports");
    }

    #[test]
    fn test_empty_page_is_not_an_error() {
        let (mut controller, backend, spawner) = browsing();
        controller.change_search("news").unwrap();
        settle(&mut controller, &spawner);
        *backend.items_per_page.lock().unwrap() = 0;
        controller.change_page(2).unwrap();
        settle(&mut controller, &spawner);

        assert_eq!(controller.page(), 2);
        assert!(controller.channels().is_empty());
        assert!(controller.error().is_none());
    }

    #[test]
    fn test_page_out_of_range_rejected() {
        let (mut controller, backend, _) = browsing();
        assert!(matches!(controller.change_page(0), Err(ClientError::Validation(_))));
        assert!(matches!(controller.change_page(4), Err(ClientError::Validation(_))));
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_prev_next_clamp() {
        let (mut controller, _, spawner) = browsing();
        controller.prev_page().unwrap();
        assert_eq!(controller.page(), 1);
        controller.next_page().unwrap();
        controller.next_page().unwrap();
        controller.next_page().unwrap();
        settle(&mut controller, &spawner);
        assert_eq!(controller.page(), 3);
    }

    #[test]
    fn test_stale_page_response_discarded() {
        let (mut controller, _, spawner) = browsing();
        controller.change_page(2).unwrap();
        controller.change_page(3).unwrap();
        assert_eq!(spawner.pending(), 2);

        // Newest request answers first, the superseded one arrives late
        spawner.run_at(1);
        controller.poll();
        spawner.run_at(0);
        controller.poll();

        assert_eq!(controller.page(), 3);
        assert_eq!(controller.channels()[0].ch_number, 300);
        assert!(!controller.is_fetching());
    }

    #[test]
    fn test_failed_fetch_keeps_previous_page() {
        let (mut controller, backend, spawner) = browsing();
        let before = controller.channels().to_vec();
        *backend.fail_channels.lock().unwrap() = true;
        controller.change_page(2).unwrap();
        settle(&mut controller, &spawner);

        assert_eq!(controller.channels(), before.as_slice());
        assert_eq!(controller.page(), 1);
        assert!(controller.error().unwrap().contains("connection reset"));

        // Paging resumes from the rows still on screen
        *backend.fail_channels.lock().unwrap() = false;
        controller.next_page().unwrap();
        settle(&mut controller, &spawner);
        assert_eq!(controller.page(), 2);
        assert_eq!(controller.channels()[0].ch_number, 200);
        assert!(controller.error().is_none());
    }

    #[test]
    fn test_failed_filter_change_restores_filter() {
        let (mut controller, backend, spawner) = browsing();
        controller.change_group("Sports").unwrap();
        settle(&mut controller, &spawner);
        *backend.fail_channels.lock().unwrap() = true;
        controller.change_filter(ChannelFilter::Movies).unwrap();
        settle(&mut controller, &spawner);

        assert_eq!(controller.query().filter, ChannelFilter::All);
        assert_eq!(controller.query().group, "Sports");
        assert!(controller.error().is_some());
    }

    #[test]
    fn test_query_change_forgets_old_page_count() {
        let (mut controller, backend, spawner) = browsing();
        assert_eq!(controller.total_pages(), 3);
        *backend.total_pages.lock().unwrap() = 1;

        controller.change_filter(ChannelFilter::Live).unwrap();
        assert_eq!(controller.total_pages(), 1);
        assert!(matches!(controller.change_page(3), Err(ClientError::Validation(_))));
        controller.next_page().unwrap();
        settle(&mut controller, &spawner);

        assert_eq!(controller.page(), 1);
        assert_eq!(controller.total_pages(), 1);
        assert!(!backend.calls().iter().any(|c| c.contains("page=3")));
    }

    #[test]
    fn test_shrunken_result_clamps_page() {
        let (mut controller, backend, spawner) = browsing();
        controller.change_page(3).unwrap();
        settle(&mut controller, &spawner);
        *backend.total_pages.lock().unwrap() = 2;

        controller.refresh().unwrap();
        settle(&mut controller, &spawner);

        assert_eq!(controller.total_pages(), 2);
        assert_eq!(controller.page(), 2);
        assert_eq!(controller.channels()[0].ch_number, 200);
        assert!(!controller.is_fetching());
        controller.next_page().unwrap();
        assert_eq!(controller.page(), 2);
    }

    #[test]
    fn test_reset_discards_in_flight_responses() {
        let (mut controller, _, spawner) = browsing();
        controller.change_page(2).unwrap();
        controller.reset().unwrap();
        settle(&mut controller, &spawner);

        assert_eq!(controller.phase(), Phase::Uninitialized);
        assert!(controller.channels().is_empty());
        assert!(controller.groups().is_empty());
        assert_eq!(controller.page(), 1);
        assert_eq!(controller.saved_playlists().len(), 3);
    }

    #[test]
    fn test_browse_actions_rejected_before_loading() {
        let (mut controller, _, spawner) = setup();
        assert!(matches!(controller.change_filter(ChannelFilter::Movies), Err(ClientError::InvalidPhase { .. })));
        assert!(matches!(controller.change_search("x"), Err(ClientError::InvalidPhase { .. })));
        assert!(matches!(controller.reset(), Err(ClientError::InvalidPhase { .. })));
        assert_eq!(spawner.pending(), 0);
    }

    #[test]
    fn test_delete_requires_confirmation() {
        let (mut controller, backend, spawner) = setup();
        controller.refresh_saved_playlists();
        settle(&mut controller, &spawner);

        controller.request_delete("movies");
        spawner.run_all();
        assert!(!backend.calls().iter().any(|c| c.starts_with("delete_playlist")));

        controller.cancel_delete();
        assert!(controller.confirm_delete().is_err());

        controller.request_delete("movies");
        controller.confirm_delete().unwrap();
        settle(&mut controller, &spawner);

        let names: Vec<_> = controller.saved_playlists().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["sports", "kids"]);
    }

    #[test]
    fn test_listing_from_before_delete_is_discarded() {
        let (mut controller, _, spawner) = setup();
        controller.refresh_saved_playlists();
        settle(&mut controller, &spawner);

        // A listing taken before the delete lands after it
        controller.refresh_saved_playlists();
        spawner.run_at(0);
        controller.request_delete("movies");
        controller.confirm_delete().unwrap();
        spawner.run_all();
        controller.poll();

        let names: Vec<_> = controller.saved_playlists().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["sports", "kids"]);

        controller.refresh_saved_playlists();
        settle(&mut controller, &spawner);
        assert_eq!(controller.saved_playlists().len(), 2);
    }

    #[test]
    fn test_delete_unknown_playlist_keeps_list() {
        let (mut controller, _, spawner) = setup();
        controller.refresh_saved_playlists();
        settle(&mut controller, &spawner);

        controller.request_delete("ghost");
        controller.confirm_delete().unwrap();
        settle(&mut controller, &spawner);

        assert_eq!(controller.saved_playlists().len(), 3);
        assert_eq!(controller.error(), Some("Playlist 'ghost' not found"));
    }

    #[test]
    fn test_favorite_double_toggle() {
        let (mut controller, _, _) = setup();
        controller.toggle_favorite(5);
        let before = controller.favorites().numbers().clone();

        assert!(controller.toggle_favorite(8));
        assert!(controller.is_favorite(8));
        assert!(!controller.toggle_favorite(8));
        assert_eq!(controller.favorites().numbers(), &before);
    }

    #[test]
    fn test_jump_to_channel_opens_it() {
        let (mut controller, _, spawner) = browsing();
        controller.jump_to_channel(42).unwrap();
        settle(&mut controller, &spawner);

        let opened = controller.take_open_request().unwrap();
        assert_eq!(opened.ch_number, 42);
        assert_eq!(controller.selected().unwrap().ch_number, 42);
        assert!(controller.take_open_request().is_none());

        controller.jump_to_channel(404).unwrap();
        settle(&mut controller, &spawner);
        assert!(controller.take_open_request().is_none());
        assert!(controller.error().unwrap().contains("Channel not found"));
    }

    #[test]
    fn test_progress_only_for_movies_and_shows() {
        let (mut controller, backend, spawner) = setup();
        let closed = |ch_number, channel_type, position_secs, duration_secs| ClosedSession {
            channel: channel(ch_number, channel_type),
            position_secs,
            duration_secs,
        };
        controller.report_progress(&closed(1, ChannelType::Live, 10.0, None));
        controller.report_progress(&closed(2, ChannelType::Movie, 90.0, Some(5400.0)));
        controller.report_progress(&closed(3, ChannelType::Show, 1700.0, Some(1800.0)));
        controller.report_progress(&closed(4, ChannelType::Movie, 600.0, None));
        settle(&mut controller, &spawner);
        assert_eq!(
            backend.calls(),
            vec!["progress 2 false 90", "progress 3 true 1700", "progress 4 false 600"]
        );
    }

    #[test]
    fn test_history_loaded() {
        let (mut controller, _, spawner) = setup();
        controller.refresh_history();
        settle(&mut controller, &spawner);
        assert_eq!(controller.history().len(), 1);
        assert_eq!(controller.history()[0].title, "Film");
    }
}
