//! Configuration management

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::models::ViewMode;

pub const DEFAULT_API_URL: &str = "http://localhost:5199/api";
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Environment variable overriding `api_base_url`
pub const API_URL_ENV: &str = "AMIIPTV_API_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_api_url")]
    pub api_base_url: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    // Wait after /parser/process before browsing (status is polled meanwhile)
    #[serde(default = "default_settle_ms")]
    pub settle_delay_ms: u64,
    // Wait after loading a cached playlist
    #[serde(default = "default_saved_settle_ms")]
    pub saved_settle_delay_ms: u64,
    // Player
    #[serde(default = "default_load_timeout")]
    pub load_timeout_secs: u64,
    #[serde(default = "default_advisory_delay")]
    pub audio_advisory_delay_secs: u64,
    #[serde(default = "default_broadcasters")]
    pub audio_broadcasters: Vec<String>,
    #[serde(default = "default_true")]
    pub fullscreen_on_play: bool,
    #[serde(default = "default_true")]
    pub unmute_on_interaction: bool,
    #[serde(default)]
    pub external_player: String,
    // UI
    #[serde(default = "default_true")]
    pub dark_mode: bool,
    #[serde(default)]
    pub view_mode: ViewMode,
    // Session-only, never written back to disk
    #[serde(skip)]
    api_url_override: Option<String>,
}

fn default_api_url() -> String { DEFAULT_API_URL.to_string() }
fn default_page_size() -> u32 { DEFAULT_PAGE_SIZE }
fn default_request_timeout() -> u64 { 30 }
fn default_settle_ms() -> u64 { 3000 }
fn default_saved_settle_ms() -> u64 { 500 }
fn default_load_timeout() -> u64 { 8 }
fn default_advisory_delay() -> u64 { 3 }
fn default_broadcasters() -> Vec<String> { vec!["rtve.es".to_string()] }
fn default_true() -> bool { true }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_url(),
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout_secs: 30,
            settle_delay_ms: 3000,
            saved_settle_delay_ms: 500,
            load_timeout_secs: 8,
            audio_advisory_delay_secs: 3,
            audio_broadcasters: default_broadcasters(),
            fullscreen_on_play: true,
            unmute_on_interaction: true,
            external_player: String::new(),
            dark_mode: true,
            view_mode: ViewMode::Grid,
            api_url_override: None,
        }
    }
}

/// Directory holding config and durable client storage
pub fn config_dir() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("amiiptv");
    fs::create_dir_all(&path).ok();
    path
}

impl AppConfig {
    fn config_path() -> PathBuf {
        config_dir().join("config.json")
    }

    pub fn load() -> Self {
        let path = Self::config_path();
        let mut config = Self::default();

        if path.exists() {
            match fs::read_to_string(&path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(loaded) => config = loaded,
                    Err(e) => log::warn!("Ignoring malformed config {}: {}", path.display(), e),
                },
                Err(e) => log::warn!("Cannot read config {}: {}", path.display(), e),
            }
        }

        if let Ok(url) = std::env::var(API_URL_ENV) {
            config.apply_api_url_override(&url);
        }
        config.sanitize();
        config
    }

    pub fn save(&self) {
        let path = Self::config_path();
        match serde_json::to_string_pretty(self) {
            Ok(content) => {
                if let Err(e) = fs::write(&path, content) {
                    log::warn!("Failed to save config {}: {}", path.display(), e);
                }
            }
            Err(e) => log::warn!("Failed to serialize config: {}", e),
        }
    }

    pub fn apply_api_url_override(&mut self, url: &str) {
        let url = url.trim().trim_end_matches('/');
        if !url.is_empty() {
            self.api_url_override = Some(url.to_string());
        }
    }

    /// Backend URL in effect for this run
    pub fn api_url(&self) -> &str {
        self.api_url_override.as_deref().unwrap_or(&self.api_base_url)
    }

    /// Replace unusable values with defaults
    pub fn sanitize(&mut self) {
        self.api_base_url = self.api_base_url.trim().trim_end_matches('/').to_string();
        if self.api_base_url.is_empty() {
            self.api_base_url = default_api_url();
        }
        if self.page_size == 0 {
            self.page_size = DEFAULT_PAGE_SIZE;
        }
        if self.request_timeout_secs == 0 {
            self.request_timeout_secs = default_request_timeout();
        }
        if self.load_timeout_secs == 0 {
            self.load_timeout_secs = default_load_timeout();
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn saved_settle_delay(&self) -> Duration {
        Duration::from_millis(self.saved_settle_delay_ms)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }

    pub fn audio_advisory_delay(&self) -> Duration {
        Duration::from_secs(self.audio_advisory_delay_secs)
    }
}
