//! REST client for the AmiIPTV parser backend

use std::time::Duration;

use serde_json::{json, Value};

use crate::error::{ClientError, Result};
use crate::models::{
    ChannelInfo, ChannelQuery, HistoryEntry, InitializeRequest, Page, ParserStatus, SavedPlaylist,
};
use crate::normalize::{
    error_message, normalize_channel, normalize_group, normalize_history_entry, normalize_list,
    normalize_page, normalize_saved_playlist, normalize_status,
};

/// Operations the viewer needs from the parser backend
///
/// Implementations return normalized values only; callers never see the raw
/// backend shape.
pub trait Backend: Send + Sync {
    fn initialize(&self, request: &InitializeRequest) -> Result<()>;
    fn process(&self) -> Result<()>;
    fn status(&self) -> Result<ParserStatus>;
    fn channels(&self, query: &ChannelQuery) -> Result<Page<ChannelInfo>>;
    fn channel(&self, ch_number: i64) -> Result<ChannelInfo>;
    fn update_progress(&self, ch_number: i64, seen: bool, position: f64) -> Result<()>;
    fn groups(&self) -> Result<Vec<String>>;
    fn group_channels(&self, name: &str) -> Result<Vec<ChannelInfo>>;
    fn history(&self) -> Result<Vec<HistoryEntry>>;
    fn saved_playlists(&self) -> Result<Vec<SavedPlaylist>>;
    fn load_playlist(&self, name: &str) -> Result<()>;
    fn delete_playlist(&self, name: &str) -> Result<()>;
}

/// Reject queries the backend would answer with an out-of-range page
pub fn validate_query(query: &ChannelQuery) -> Result<()> {
    if query.page < 1 {
        return Err(ClientError::validation("page must be 1 or greater"));
    }
    if query.page_size == 0 {
        return Err(ClientError::validation("page size must be greater than 0"));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        Err(ClientError::validation("playlist name is empty"))
    } else {
        Ok(name)
    }
}

type Response = ureq::http::Response<ureq::Body>;

pub struct ApiClient {
    base_url: String,
    agent: ureq::Agent,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            // Error bodies carry the backend's message
            .http_status_as_error(false)
            .build()
            .new_agent();

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get(&self, path: &str) -> Result<Value> {
        log::debug!("GET {}", path);
        let response = self
            .agent
            .get(&self.url(path))
            .header("Accept", "application/json")
            .call()?;
        read_json(response)
    }

    fn post(&self, path: &str, body: Option<&Value>) -> Result<Value> {
        log::debug!("POST {}", path);
        let request = self
            .agent
            .post(&self.url(path))
            .header("Accept", "application/json");
        let response = match body {
            Some(body) => request
                .header("Content-Type", "application/json")
                .send(body.to_string().as_str())?,
            None => request.send_empty()?,
        };
        read_lenient(response)
    }

    fn put(&self, path: &str, body: &Value) -> Result<Value> {
        log::debug!("PUT {}", path);
        let response = self
            .agent
            .put(&self.url(path))
            .header("Content-Type", "application/json")
            .send(body.to_string().as_str())?;
        read_lenient(response)
    }

    fn delete(&self, path: &str) -> Result<Value> {
        log::debug!("DELETE {}", path);
        let response = self.agent.delete(&self.url(path)).call()?;
        read_lenient(response)
    }
}

/// Body of a successful response, or the backend's error
fn read_body(mut response: Response) -> Result<String> {
    let status = response.status().as_u16();
    let body = response.body_mut().read_to_string()?;

    if !(200..300).contains(&status) {
        let message = error_message(&body).unwrap_or_else(|| format!("HTTP error: {}", status));
        log::warn!("Backend returned {}: {}", status, message);
        return Err(ClientError::Backend { status, message });
    }
    Ok(body)
}

fn read_json(response: Response) -> Result<Value> {
    let body = read_body(response)?;
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&body)?)
}

/// Like `read_json`, but plain-text acknowledgements are kept as strings
fn read_lenient(response: Response) -> Result<Value> {
    let body = read_body(response)?;
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
}

/// Listing path and query string for a channel query
pub fn channels_path(query: &ChannelQuery) -> String {
    let mut params = vec![
        format!("page={}", query.page),
        format!("pageSize={}", query.page_size),
    ];
    if let Some(search) = query.search_param() {
        params.push(format!("search={}", urlencoding::encode(search)));
    }
    if let Some(group) = query.group_param() {
        params.push(format!("group={}", urlencoding::encode(group)));
    }
    format!("{}?{}", query.filter.path(), params.join("&"))
}

pub fn playlist_path(name: &str, suffix: &str) -> String {
    format!("/playlists/{}{}", urlencoding::encode(name), suffix)
}

pub fn group_channels_path(name: &str) -> String {
    format!("/groups/{}/channels", urlencoding::encode(name))
}

impl Backend for ApiClient {
    fn initialize(&self, request: &InitializeRequest) -> Result<()> {
        if request.playlist_url.trim().is_empty() {
            return Err(ClientError::validation("playlist URL is empty"));
        }
        log::info!("Initializing parser with {}", request.playlist_url);
        let body = serde_json::to_value(request)?;
        self.post("/parser/initialize", Some(&body))?;
        Ok(())
    }

    fn process(&self) -> Result<()> {
        log::info!("Processing playlist");
        self.post("/parser/process", None)?;
        Ok(())
    }

    fn status(&self) -> Result<ParserStatus> {
        let response = self
            .agent
            .get(&self.url("/parser/status"))
            .header("Accept", "application/json")
            .call()?;
        let status = normalize_status(&read_lenient(response)?);
        log::debug!("Parser status: {:?}", status);
        Ok(status)
    }

    fn channels(&self, query: &ChannelQuery) -> Result<Page<ChannelInfo>> {
        validate_query(query)?;
        let value = self.get(&channels_path(query))?;
        let page = normalize_page(&value, normalize_channel)?;
        log::debug!(
            "Fetched {} channels (page {} of {})",
            page.items.len(),
            page.page,
            page.total_pages
        );
        Ok(page)
    }

    fn channel(&self, ch_number: i64) -> Result<ChannelInfo> {
        normalize_channel(&self.get(&format!("/channels/{}", ch_number))?)
    }

    fn update_progress(&self, ch_number: i64, seen: bool, position: f64) -> Result<()> {
        let body = json!({ "seen": seen, "currentPosition": position });
        self.put(&format!("/channels/{}/progress", ch_number), &body)?;
        Ok(())
    }

    fn groups(&self) -> Result<Vec<String>> {
        normalize_list(&self.get("/groups")?, normalize_group)
    }

    fn group_channels(&self, name: &str) -> Result<Vec<ChannelInfo>> {
        let name = validate_name(name)?;
        normalize_list(&self.get(&group_channels_path(name))?, normalize_channel)
    }

    fn history(&self) -> Result<Vec<HistoryEntry>> {
        normalize_list(&self.get("/history")?, normalize_history_entry)
    }

    fn saved_playlists(&self) -> Result<Vec<SavedPlaylist>> {
        normalize_list(&self.get("/playlists")?, normalize_saved_playlist)
    }

    fn load_playlist(&self, name: &str) -> Result<()> {
        let name = validate_name(name)?;
        log::info!("Loading saved playlist '{}'", name);
        self.post(&playlist_path(name, "/load"), None)?;
        Ok(())
    }

    fn delete_playlist(&self, name: &str) -> Result<()> {
        let name = validate_name(name)?;
        log::info!("Deleting saved playlist '{}'", name);
        self.delete(&playlist_path(name, ""))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
