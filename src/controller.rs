//! Application state controller
//!
//! Owns the playlist lifecycle (`Uninitialized → Loading → Browsing`), the
//! channel query, favorites and saved playlists. Backend calls are queued on a
//! [`Spawner`]; their results come back as [`TaskResult`]s and are applied by
//! [`AppController::poll`] on the UI thread. Each channel query and each
//! playlist load carries a token so late responses for superseded requests
//! are dropped. A failed channel fetch puts the query back to the last one
//! that succeeded, so the page number always matches the visible rows.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::api::Backend;
use crate::error::{ClientError, Result};
use crate::models::{
    ChannelFilter, ChannelInfo, ChannelQuery, HistoryEntry, InitializeRequest, Page, ParserStatus,
    Phase, SavedPlaylist,
};
use crate::playback::ClosedSession;
use crate::storage::Favorites;
use crate::tasks::Spawner;

const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(500);
const DEFAULT_PLAYLIST_NAME: &str = "default";

/// Results posted by background tasks
pub enum TaskResult {
    PlaylistReady { load: u64 },
    PlaylistFailed { load: u64, error: ClientError },
    ChannelsLoaded { generation: u64, result: Result<Page<ChannelInfo>> },
    GroupsLoaded { load: u64, result: Result<Vec<String>> },
    SavedPlaylistsLoaded { generation: u64, result: Result<Vec<SavedPlaylist>> },
    PlaylistDeleted { name: String, result: Result<()> },
    HistoryLoaded(Result<Vec<HistoryEntry>>),
    ChannelFound { load: u64, result: Result<ChannelInfo> },
    ProgressReported { ch_number: i64, result: Result<()> },
}

/// Timing knobs for playlist loading
#[derive(Debug, Clone, Copy)]
pub struct LoadTiming {
    /// Upper bound on waiting for the parser after `/parser/process`
    pub settle: Duration,
    /// Pause after loading a cached playlist
    pub saved_settle: Duration,
}

pub struct AppController {
    backend: Arc<dyn Backend>,
    spawner: Box<dyn Spawner>,
    task_sender: Sender<TaskResult>,
    task_receiver: Receiver<TaskResult>,
    timing: LoadTiming,
    page_size: u32,

    phase: Phase,
    load_token: u64,
    query: ChannelQuery,
    /// Query behind the rows currently shown
    shown_query: ChannelQuery,
    query_token: u64,
    fetching: bool,

    channels: Vec<ChannelInfo>,
    total: u64,
    total_pages: u32,
    groups: Vec<String>,

    favorites: Favorites,
    saved_playlists: Vec<SavedPlaylist>,
    saved_token: u64,
    pending_delete: Option<String>,
    history: Vec<HistoryEntry>,

    selected: Option<ChannelInfo>,
    open_request: Option<ChannelInfo>,
    error: Option<String>,
    status_message: String,
}

impl AppController {
    pub fn new(
        backend: Arc<dyn Backend>,
        spawner: Box<dyn Spawner>,
        favorites: Favorites,
        timing: LoadTiming,
        page_size: u32,
    ) -> Self {
        let (task_sender, task_receiver) = channel();
        let page_size = page_size.max(1);
        Self {
            backend,
            spawner,
            task_sender,
            task_receiver,
            timing,
            page_size,
            phase: Phase::Uninitialized,
            load_token: 0,
            query: ChannelQuery::first_page(page_size),
            shown_query: ChannelQuery::first_page(page_size),
            query_token: 0,
            fetching: false,
            channels: Vec::new(),
            total: 0,
            total_pages: 1,
            groups: Vec::new(),
            favorites,
            saved_playlists: Vec::new(),
            saved_token: 0,
            pending_delete: None,
            history: Vec::new(),
            selected: None,
            open_request: None,
            error: None,
            status_message: String::new(),
        }
    }

    /// Run `work` on the spawner and post its result
    fn run<F>(&self, work: F)
    where
        F: FnOnce(&dyn Backend) -> TaskResult + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        let sender = self.task_sender.clone();
        self.spawner.spawn(Box::new(move || {
            let _ = sender.send(work(backend.as_ref()));
        }));
    }

    fn require_phase(&self, expected: Phase, action: &'static str) -> Result<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(ClientError::InvalidPhase { action, phase: self.phase.label() })
        }
    }

    // ---------------------------------------------------------------
    // Playlist lifecycle
    // ---------------------------------------------------------------

    /// Initialize and process a playlist on the backend, then start browsing
    pub fn submit_playlist_url(&mut self, url: &str) -> Result<()> {
        self.require_phase(Phase::Uninitialized, "load a playlist")?;
        let url = url.trim();
        if url.is_empty() {
            let err = ClientError::validation("Please enter a valid playlist URL");
            self.error = Some(err.to_string());
            return Err(err);
        }

        let load = self.begin_loading(format!("Processing playlist {}...", url));
        let request = InitializeRequest {
            playlist_url: url.to_string(),
            name: DEFAULT_PLAYLIST_NAME.to_string(),
            load_cache: false,
        };
        let settle = self.timing.settle;

        self.run(move |backend| {
            let outcome = backend
                .initialize(&request)
                .and_then(|_| backend.process())
                .and_then(|_| wait_for_parser(backend, settle));
            match outcome {
                Ok(()) => TaskResult::PlaylistReady { load },
                Err(error) => TaskResult::PlaylistFailed { load, error },
            }
        });
        Ok(())
    }

    /// Load a playlist the backend already cached; no processing step
    pub fn load_saved_playlist(&mut self, name: &str) -> Result<()> {
        self.require_phase(Phase::Uninitialized, "load a saved playlist")?;
        let name = name.trim().to_string();
        if name.is_empty() {
            let err = ClientError::validation("No playlist selected");
            self.error = Some(err.to_string());
            return Err(err);
        }

        let load = self.begin_loading(format!("Loading saved playlist '{}'...", name));
        let settle = self.timing.saved_settle;

        self.run(move |backend| match backend.load_playlist(&name) {
            Ok(()) => {
                if !settle.is_zero() {
                    thread::sleep(settle);
                }
                TaskResult::PlaylistReady { load }
            }
            Err(error) => TaskResult::PlaylistFailed { load, error },
        });
        Ok(())
    }

    fn begin_loading(&mut self, status: String) -> u64 {
        self.phase = Phase::Loading;
        self.error = None;
        self.status_message = status;
        self.load_token += 1;
        self.load_token
    }

    /// Drop the loaded playlist and go back to the load screen
    pub fn reset(&mut self) -> Result<()> {
        self.require_phase(Phase::Browsing, "reset")?;
        log::info!("Resetting playlist state");

        self.phase = Phase::Uninitialized;
        self.load_token += 1;
        self.query_token += 1;
        self.query = ChannelQuery::first_page(self.page_size);
        self.shown_query = self.query.clone();
        self.fetching = false;
        self.channels.clear();
        self.total = 0;
        self.total_pages = 1;
        self.groups.clear();
        self.selected = None;
        self.open_request = None;
        self.error = None;
        self.status_message.clear();

        self.refresh_saved_playlists();
        Ok(())
    }

    fn enter_browsing(&mut self) {
        log::info!("Playlist ready, browsing");
        self.phase = Phase::Browsing;
        self.status_message.clear();
        self.query = ChannelQuery::first_page(self.page_size);
        self.shown_query = self.query.clone();
        self.channels.clear();
        self.total = 0;
        self.total_pages = 1;
        self.fetch_page();
        self.fetch_groups();
    }

    // ---------------------------------------------------------------
    // Channel query
    // ---------------------------------------------------------------

    pub fn change_filter(&mut self, filter: ChannelFilter) -> Result<()> {
        self.require_phase(Phase::Browsing, "change the filter")?;
        if self.query.filter != filter {
            self.query.filter = filter;
            self.restart_query();
        }
        Ok(())
    }

    pub fn change_group(&mut self, group: &str) -> Result<()> {
        self.require_phase(Phase::Browsing, "change the group")?;
        if self.query.group != group {
            self.query.group = group.to_string();
            self.restart_query();
        }
        Ok(())
    }

    pub fn change_search(&mut self, search: &str) -> Result<()> {
        self.require_phase(Phase::Browsing, "search")?;
        if self.query.search != search {
            self.query.search = search.to_string();
            self.restart_query();
        }
        Ok(())
    }

    /// Back to page 1 of a changed query. The old page count no longer
    /// applies, so paging stays on page 1 until the new count arrives.
    fn restart_query(&mut self) {
        self.query.page = 1;
        self.total_pages = 1;
        self.fetch_page();
    }

    pub fn change_page(&mut self, page: u32) -> Result<()> {
        self.require_phase(Phase::Browsing, "change the page")?;
        if page < 1 || page > self.total_pages {
            return Err(ClientError::validation(format!(
                "Page {} is out of range (1-{})",
                page, self.total_pages
            )));
        }
        if self.query.page != page {
            self.query.page = page;
            self.fetch_page();
        }
        Ok(())
    }

    pub fn next_page(&mut self) -> Result<()> {
        let page = (self.query.page + 1).min(self.total_pages);
        self.change_page(page)
    }

    pub fn prev_page(&mut self) -> Result<()> {
        let page = self.query.page.saturating_sub(1).max(1);
        self.change_page(page)
    }

    /// Re-issue the current query
    pub fn refresh(&mut self) -> Result<()> {
        self.require_phase(Phase::Browsing, "refresh")?;
        self.fetch_page();
        Ok(())
    }

    fn fetch_page(&mut self) {
        self.query_token += 1;
        self.fetching = true;
        let generation = self.query_token;
        let query = self.query.clone();
        log::debug!("Fetching channels: {:?}", query);

        self.run(move |backend| TaskResult::ChannelsLoaded {
            generation,
            result: backend.channels(&query),
        });
    }

    fn fetch_groups(&mut self) {
        let load = self.load_token;
        self.run(move |backend| TaskResult::GroupsLoaded { load, result: backend.groups() });
    }

    // ---------------------------------------------------------------
    // Saved playlists
    // ---------------------------------------------------------------

    pub fn refresh_saved_playlists(&mut self) {
        self.saved_token += 1;
        let generation = self.saved_token;
        self.run(move |backend| TaskResult::SavedPlaylistsLoaded {
            generation,
            result: backend.saved_playlists(),
        });
    }

    /// Ask for confirmation before deleting `name`
    pub fn request_delete(&mut self, name: &str) {
        self.pending_delete = Some(name.to_string());
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    /// Delete the playlist awaiting confirmation
    pub fn confirm_delete(&mut self) -> Result<()> {
        let name = self
            .pending_delete
            .take()
            .ok_or_else(|| ClientError::validation("No playlist awaiting deletion"))?;
        // Listings requested before the delete would bring the entry back
        self.saved_token += 1;
        self.run(move |backend| {
            let result = backend.delete_playlist(&name);
            TaskResult::PlaylistDeleted { name, result }
        });
        Ok(())
    }

    // ---------------------------------------------------------------
    // Channels, favorites, history
    // ---------------------------------------------------------------

    pub fn toggle_favorite(&mut self, ch_number: i64) -> bool {
        let added = self.favorites.toggle(ch_number);
        self.status_message = if added {
            format!("Added channel {} to favorites", ch_number)
        } else {
            format!("Removed channel {} from favorites", ch_number)
        };
        added
    }

    pub fn is_favorite(&self, ch_number: i64) -> bool {
        self.favorites.contains(ch_number)
    }

    pub fn select_channel(&mut self, channel: ChannelInfo) {
        log::info!("Opening channel {} '{}'", channel.ch_number, channel.title);
        self.selected = Some(channel);
    }

    pub fn close_channel(&mut self) {
        self.selected = None;
    }

    /// Look a channel up by number and open it when found
    pub fn jump_to_channel(&mut self, ch_number: i64) -> Result<()> {
        self.require_phase(Phase::Browsing, "open a channel by number")?;
        if ch_number < 0 {
            return Err(ClientError::validation("Channel numbers are not negative"));
        }
        let load = self.load_token;
        self.run(move |backend| TaskResult::ChannelFound { load, result: backend.channel(ch_number) });
        Ok(())
    }

    /// Channel the UI should start playing, set by asynchronous lookups
    pub fn take_open_request(&mut self) -> Option<ChannelInfo> {
        self.open_request.take()
    }

    pub fn refresh_history(&mut self) {
        self.run(|backend| TaskResult::HistoryLoaded(backend.history()));
    }

    /// Store the resume position of a movie or show that was closed
    pub fn report_progress(&mut self, closed: &ClosedSession) {
        if !closed.channel.channel_type.tracks_progress() {
            return;
        }
        let ch_number = closed.channel.ch_number;
        let position = closed.position_secs;
        let seen = closed.watched_to_end();
        self.run(move |backend| TaskResult::ProgressReported {
            ch_number,
            result: backend.update_progress(ch_number, seen, position),
        });
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    // ---------------------------------------------------------------
    // Task results
    // ---------------------------------------------------------------

    /// Apply finished background work; returns true if anything arrived
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(result) = self.task_receiver.try_recv() {
            self.apply(result);
            changed = true;
        }
        changed
    }

    fn apply(&mut self, result: TaskResult) {
        match result {
            TaskResult::PlaylistReady { load } => {
                if load == self.load_token && self.phase == Phase::Loading {
                    self.enter_browsing();
                } else {
                    log::debug!("Discarding stale playlist load {}", load);
                }
            }
            TaskResult::PlaylistFailed { load, error } => {
                if load == self.load_token && self.phase == Phase::Loading {
                    log::error!("Error loading playlist: {}", error);
                    self.phase = Phase::Uninitialized;
                    self.status_message.clear();
                    self.error = Some(error.to_string());
                }
            }
            TaskResult::ChannelsLoaded { generation, result } => {
                if generation != self.query_token || self.phase != Phase::Browsing {
                    log::debug!("Discarding stale channel page (request {})", generation);
                    return;
                }
                self.fetching = false;
                match result {
                    Ok(page) => {
                        self.channels = page.items;
                        self.total = page.total;
                        self.total_pages = page.total_pages.max(1);
                        self.error = None;
                        // The result set shrank under the current page
                        let shrank = self.query.page > self.total_pages;
                        if shrank {
                            self.query.page = self.total_pages;
                        }
                        self.shown_query = self.query.clone();
                        if shrank {
                            self.fetch_page();
                        }
                    }
                    Err(e) => {
                        // Previous page stays visible, with the query that produced it
                        log::error!("Error loading channels: {}", e);
                        self.query = self.shown_query.clone();
                        self.error = Some(format!("Error loading channels: {}", e));
                    }
                }
            }
            TaskResult::GroupsLoaded { load, result } => {
                if load != self.load_token || self.phase != Phase::Browsing {
                    return;
                }
                match result {
                    Ok(groups) => self.groups = groups,
                    Err(e) => log::warn!("Error loading groups: {}", e),
                }
            }
            TaskResult::SavedPlaylistsLoaded { generation, result } => {
                if generation != self.saved_token {
                    log::debug!("Discarding stale playlist listing (request {})", generation);
                    return;
                }
                match result {
                    Ok(list) => self.saved_playlists = list,
                    Err(e) => log::warn!("Error loading saved playlists: {}", e),
                }
            }
            TaskResult::PlaylistDeleted { name, result } => match result {
                Ok(()) => {
                    self.saved_playlists.retain(|p| p.name != name);
                    self.status_message = format!("Deleted playlist '{}'", name);
                }
                Err(e) => {
                    log::error!("Error deleting playlist '{}': {}", name, e);
                    self.error = Some(e.to_string());
                }
            },
            TaskResult::HistoryLoaded(result) => match result {
                Ok(history) => self.history = history,
                Err(e) => log::warn!("Error loading history: {}", e),
            },
            TaskResult::ChannelFound { load, result } => {
                if load != self.load_token || self.phase != Phase::Browsing {
                    return;
                }
                match result {
                    Ok(channel) => {
                        self.select_channel(channel.clone());
                        self.open_request = Some(channel);
                    }
                    Err(e) => self.error = Some(format!("Channel not found: {}", e)),
                }
            }
            TaskResult::ProgressReported { ch_number, result } => {
                if let Err(e) = result {
                    log::warn!("Could not save progress for channel {}: {}", ch_number, e);
                }
            }
        }
    }

    // ---------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn query(&self) -> &ChannelQuery {
        &self.query
    }

    pub fn page(&self) -> u32 {
        self.query.page
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn is_fetching(&self) -> bool {
        self.fetching
    }

    pub fn channels(&self) -> &[ChannelInfo] {
        &self.channels
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn favorites(&self) -> &Favorites {
        &self.favorites
    }

    pub fn saved_playlists(&self) -> &[SavedPlaylist] {
        &self.saved_playlists
    }

    pub fn pending_delete(&self) -> Option<&str> {
        self.pending_delete.as_deref()
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn selected(&self) -> Option<&ChannelInfo> {
        self.selected.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }
}

/// Poll the parser until it reports ready or `settle` elapses
fn wait_for_parser(backend: &dyn Backend, settle: Duration) -> Result<()> {
    let deadline = Instant::now() + settle;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(());
        }
        match backend.status() {
            Ok(ParserStatus::Initialized) => return Ok(()),
            Ok(ParserStatus::Timeout) => {
                return Err(ClientError::Backend {
                    status: 0,
                    message: "The backend timed out processing the playlist".to_string(),
                })
            }
            Ok(status) => log::debug!("Parser not ready yet: {:?}", status),
            Err(e) => log::debug!("Parser status unavailable: {}", e),
        }
        thread::sleep(STATUS_POLL_INTERVAL.min(remaining));
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
