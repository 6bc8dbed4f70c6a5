//! Data models for the AmiIPTV viewer

use serde::{Deserialize, Serialize};

/// Kind of content a channel entry points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ChannelType {
    #[default]
    Live,
    Movie,
    Show,
}

impl ChannelType {
    /// Map the backend's numeric code; unknown codes are treated as live
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => ChannelType::Movie,
            2 => ChannelType::Show,
            _ => ChannelType::Live,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChannelType::Live => "Live",
            ChannelType::Movie => "Movie",
            ChannelType::Show => "Series",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            ChannelType::Live => "📺",
            ChannelType::Movie => "🎬",
            ChannelType::Show => "📃",
        }
    }

    /// Movies and shows have a resume position worth reporting
    pub fn tracks_progress(&self) -> bool {
        !matches!(self, ChannelType::Live)
    }
}

/// Channel entry as served by the parser backend (normalized)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub title: String,
    pub group: String,
    pub logo: String,
    pub url: String,
    pub ch_number: i64,
    pub channel_type: ChannelType,
}

/// One page of a paginated collection
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

/// Playlist previously processed and cached by the backend
#[derive(Debug, Clone, PartialEq)]
pub struct SavedPlaylist {
    pub name: String,
    pub last_modified: String,
    pub size: u64,
}

impl SavedPlaylist {
    /// Date part of `last_modified`, or the raw value if it isn't RFC 3339
    pub fn modified_label(&self) -> String {
        match chrono::DateTime::parse_from_rfc3339(&self.last_modified) {
            Ok(dt) => dt.format("%Y-%m-%d").to_string(),
            Err(_) => match chrono::NaiveDateTime::parse_from_str(&self.last_modified, "%Y-%m-%dT%H:%M:%S%.f") {
                Ok(dt) => dt.format("%Y-%m-%d").to_string(),
                Err(_) => self.last_modified.clone(),
            },
        }
    }

    pub fn size_label(&self) -> String {
        format!("{} KB", self.size / 1024)
    }
}

/// Watch history entry
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub title: String,
    pub position: f64,
    pub total_duration: f64,
    pub seen: bool,
    pub date: String,
}

/// Parser lifecycle as reported by `/parser/status`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserStatus {
    NotInit,
    Initializing,
    Initialized,
    Timeout,
    Unknown,
}

impl ParserStatus {
    /// Accepts the numeric code or the status name, case-insensitively
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim().trim_matches('"');
        match raw.parse::<i64>() {
            Ok(code) => Self::from_code(code),
            Err(_) => match raw.to_ascii_lowercase().as_str() {
                "notinit" | "not_init" => ParserStatus::NotInit,
                "initializing" => ParserStatus::Initializing,
                "initialize" | "initialized" | "ready" => ParserStatus::Initialized,
                "timeout" => ParserStatus::Timeout,
                _ => ParserStatus::Unknown,
            },
        }
    }

    pub fn from_code(code: i64) -> Self {
        match code {
            0 => ParserStatus::NotInit,
            1 => ParserStatus::Initializing,
            2 => ParserStatus::Initialized,
            3 => ParserStatus::Timeout,
            _ => ParserStatus::Unknown,
        }
    }
}

/// Body of `POST /parser/initialize`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequest {
    pub playlist_url: String,
    pub name: String,
    pub load_cache: bool,
}

/// Which channel listing endpoint to query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelFilter {
    #[default]
    All,
    Live,
    Vod,
    Movies,
}

impl ChannelFilter {
    pub const ALL: [ChannelFilter; 4] = [
        ChannelFilter::All,
        ChannelFilter::Live,
        ChannelFilter::Vod,
        ChannelFilter::Movies,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ChannelFilter::All => "All",
            ChannelFilter::Live => "Live",
            ChannelFilter::Vod => "VOD",
            ChannelFilter::Movies => "Movies",
        }
    }

    /// Path under the API base
    pub fn path(&self) -> &'static str {
        match self {
            ChannelFilter::All => "/channels",
            ChannelFilter::Live => "/channels/live",
            ChannelFilter::Vod => "/channels/vod",
            ChannelFilter::Movies => "/channels/movies",
        }
    }
}

/// Sentinel group value meaning "no group filter"
pub const ALL_GROUPS: &str = "all";

/// Parameters of a paginated channel listing
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelQuery {
    pub filter: ChannelFilter,
    pub page: u32,
    pub page_size: u32,
    pub search: String,
    pub group: String,
}

impl ChannelQuery {
    pub fn first_page(page_size: u32) -> Self {
        Self {
            filter: ChannelFilter::All,
            page: 1,
            page_size,
            search: String::new(),
            group: ALL_GROUPS.to_string(),
        }
    }

    /// Group to send to the backend, if any
    pub fn group_param(&self) -> Option<&str> {
        if self.filter != ChannelFilter::All {
            return None;
        }
        let group = self.group.trim();
        if group.is_empty() || group == ALL_GROUPS {
            None
        } else {
            Some(group)
        }
    }

    pub fn search_param(&self) -> Option<&str> {
        let search = self.search.trim();
        if search.is_empty() { None } else { Some(search) }
    }
}

/// Application phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Uninitialized,
    Loading,
    Browsing,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Uninitialized => "no playlist is loaded",
            Phase::Loading => "a playlist is loading",
            Phase::Browsing => "a playlist is loaded",
        }
    }
}

/// Channel list layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ViewMode {
    #[default]
    Grid,
    List,
}

impl ViewMode {
    pub fn toggled(self) -> Self {
        match self {
            ViewMode::Grid => ViewMode::List,
            ViewMode::List => ViewMode::Grid,
        }
    }
}
