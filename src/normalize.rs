//! Backend field-name normalization
//!
//! The parser backend may emit English or Spanish field names for the same
//! logical field. Each table below maps a canonical field to the source keys
//! accepted for it, in order of preference; one lookup function consumes them.

use serde_json::{Map, Value};

use crate::config::DEFAULT_PAGE_SIZE;
use crate::error::{ClientError, Result};
use crate::models::{ChannelInfo, ChannelType, HistoryEntry, Page, ParserStatus, SavedPlaylist};

/// Canonical field → accepted source keys
pub type FieldTable = &'static [(&'static str, &'static [&'static str])];

pub const CHANNEL_FIELDS: FieldTable = &[
    ("title", &["title", "titulo"]),
    ("group", &["group", "grupo"]),
    ("logo", &["logo", "logotipo"]),
    ("url", &["url"]),
    ("chNumber", &["chNumber", "número de canal"]),
    ("channelType", &["channelType", "tipo de canal"]),
];

pub const PAGE_FIELDS: FieldTable = &[
    ("items", &["items", "elementos"]),
    ("total", &["total"]),
    ("page", &["page", "pagina", "página"]),
    ("pageSize", &["pageSize", "tamañoPagina", "tamaño de página"]),
    ("totalPages", &["totalPages", "totalPaginas", "total de páginas"]),
];

pub const PLAYLIST_FIELDS: FieldTable = &[
    ("name", &["name", "nombre"]),
    ("lastModified", &["lastModified", "ultimaModificacion", "última modificación"]),
    ("size", &["size", "tamaño"]),
];

pub const HISTORY_FIELDS: FieldTable = &[
    ("title", &["title", "titulo"]),
    ("position", &["position", "posicion", "posición"]),
    ("totalDuration", &["totalDuration", "duración total"]),
    ("seen", &["seen", "visto"]),
    ("date", &["date", "fecha"]),
];

/// Group assigned to channels the backend left ungrouped
pub const NO_GROUP: &str = "Sin grupo";

/// First present value for `canonical`; null and empty strings count as absent
pub fn lookup<'a>(obj: &'a Map<String, Value>, table: FieldTable, canonical: &str) -> Option<&'a Value> {
    let keys = table
        .iter()
        .find(|(name, _)| *name == canonical)
        .map(|(_, keys)| *keys)
        .unwrap_or(&[]);

    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find(|value| match value {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            _ => true,
        })
}

fn string_field(obj: &Map<String, Value>, table: FieldTable, canonical: &str, default: &str) -> String {
    match lookup(obj, table, canonical) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => default.to_string(),
    }
}

fn float_field(obj: &Map<String, Value>, table: FieldTable, canonical: &str) -> Option<f64> {
    match lookup(obj, table, canonical)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn int_field(obj: &Map<String, Value>, table: FieldTable, canonical: &str) -> Option<i64> {
    match lookup(obj, table, canonical)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn bool_field(obj: &Map<String, Value>, table: FieldTable, canonical: &str) -> bool {
    match lookup(obj, table, canonical) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0) != 0,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn as_object<'a>(value: &'a Value, what: &str) -> Result<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| ClientError::Decode(format!("expected {} object", what)))
}

pub fn normalize_channel(value: &Value) -> Result<ChannelInfo> {
    let obj = as_object(value, "channel")?;
    Ok(ChannelInfo {
        title: string_field(obj, CHANNEL_FIELDS, "title", ""),
        group: string_field(obj, CHANNEL_FIELDS, "group", NO_GROUP),
        logo: string_field(obj, CHANNEL_FIELDS, "logo", ""),
        url: string_field(obj, CHANNEL_FIELDS, "url", ""),
        ch_number: int_field(obj, CHANNEL_FIELDS, "chNumber").unwrap_or(0),
        channel_type: ChannelType::from_code(int_field(obj, CHANNEL_FIELDS, "channelType").unwrap_or(0)),
    })
}

pub fn normalize_list<T>(value: &Value, normalizer: impl Fn(&Value) -> Result<T>) -> Result<Vec<T>> {
    match value {
        Value::Array(items) => items.iter().map(normalizer).collect(),
        Value::Null => Ok(Vec::new()),
        _ => Err(ClientError::Decode("expected a JSON array".to_string())),
    }
}

/// Normalize a paginated envelope, enforcing the page invariants
pub fn normalize_page<T>(value: &Value, normalizer: impl Fn(&Value) -> Result<T>) -> Result<Page<T>> {
    let obj = as_object(value, "paginated")?;

    let mut items = match lookup(obj, PAGE_FIELDS, "items") {
        Some(items) => normalize_list(items, normalizer)?,
        None => Vec::new(),
    };

    let page_size = int_field(obj, PAGE_FIELDS, "pageSize")
        .filter(|n| *n > 0)
        .map(|n| n.min(u32::MAX as i64) as u32)
        .unwrap_or(DEFAULT_PAGE_SIZE);
    let total_pages = int_field(obj, PAGE_FIELDS, "totalPages")
        .filter(|n| *n > 0)
        .map(|n| n.min(u32::MAX as i64) as u32)
        .unwrap_or(1);
    let page = int_field(obj, PAGE_FIELDS, "page")
        .unwrap_or(1)
        .clamp(1, total_pages as i64) as u32;
    let total = int_field(obj, PAGE_FIELDS, "total").unwrap_or(0).max(0) as u64;

    items.truncate(page_size as usize);

    Ok(Page { items, total, page, page_size, total_pages })
}

pub fn normalize_saved_playlist(value: &Value) -> Result<SavedPlaylist> {
    let obj = as_object(value, "playlist")?;
    let name = string_field(obj, PLAYLIST_FIELDS, "name", "");
    if name.is_empty() {
        return Err(ClientError::Decode("saved playlist without a name".to_string()));
    }
    Ok(SavedPlaylist {
        name,
        last_modified: string_field(obj, PLAYLIST_FIELDS, "lastModified", ""),
        size: int_field(obj, PLAYLIST_FIELDS, "size").unwrap_or(0).max(0) as u64,
    })
}

pub fn normalize_history_entry(value: &Value) -> Result<HistoryEntry> {
    let obj = as_object(value, "history")?;
    Ok(HistoryEntry {
        title: string_field(obj, HISTORY_FIELDS, "title", ""),
        position: float_field(obj, HISTORY_FIELDS, "position").unwrap_or(0.0),
        total_duration: float_field(obj, HISTORY_FIELDS, "totalDuration").unwrap_or(0.0),
        seen: bool_field(obj, HISTORY_FIELDS, "seen"),
        date: string_field(obj, HISTORY_FIELDS, "date", ""),
    })
}

/// `/parser/status` may answer `{"status": ..}`, a bare string or a bare code
pub fn normalize_status(value: &Value) -> ParserStatus {
    let raw = match value {
        Value::Object(obj) => obj.get("status").or_else(|| obj.get("estado")),
        other => Some(other),
    };
    match raw {
        Some(Value::String(s)) => ParserStatus::parse(s),
        Some(Value::Number(n)) => ParserStatus::from_code(n.as_i64().unwrap_or(-1)),
        _ => ParserStatus::Unknown,
    }
}

/// Groups may arrive as plain strings or as objects carrying a name
pub fn normalize_group(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Object(obj) => obj
            .get("name")
            .or_else(|| obj.get("nombre"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ClientError::Decode("group without a name".to_string())),
        _ => Err(ClientError::Decode("unexpected group entry".to_string())),
    }
}

/// Backend error message from an error body, if it carries one
pub fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match &value {
        Value::Object(obj) => ["error", "message", "mensaje"]
            .iter()
            .filter_map(|key| obj.get(*key))
            .find_map(|v| v.as_str().filter(|s| !s.trim().is_empty()))
            .map(str::to_string),
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

#[cfg(test)]
#[path = "normalize_tests.rs"]
mod tests;
