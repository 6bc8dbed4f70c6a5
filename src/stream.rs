//! Stream-type detection for channel URLs

/// How the player should fetch the media
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// HLS playlist (`.m3u8`)
    Adaptive,
    /// Single media file downloaded progressively
    Progressive,
}

impl StreamKind {
    pub fn mime_type(&self) -> &'static str {
        match self {
            StreamKind::Adaptive => "application/x-mpegURL",
            StreamKind::Progressive => "video/mp4",
        }
    }
}

/// Hints handed to the player along with the final URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHints {
    pub kind: StreamKind,
    pub expects_audio: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSource {
    pub url: String,
    pub hints: StreamHints,
}

const TRANSPORT_STREAM_EXT: &str = ".ts";
const ADAPTIVE_EXT: &str = ".m3u8";
const ADAPTIVE_MARKERS: &[&str] = &[".m3u8", "get.php"];
const DIRECT_VIDEO_EXTS: &[&str] = &[".mp4", ".avi", ".mkv"];

/// Classify `url`; the first matching rule wins
///
/// `broadcasters` lists URL fragments of providers known to serve HLS with a
/// browser-playable audio track.
pub fn detect_stream(url: &str, broadcasters: &[String]) -> StreamSource {
    let url = url.trim();
    let lower = url.to_ascii_lowercase();

    if lower.ends_with(TRANSPORT_STREAM_EXT) {
        let base = &url[..url.len() - TRANSPORT_STREAM_EXT.len()];
        return StreamSource {
            url: format!("{}{}", base, ADAPTIVE_EXT),
            hints: StreamHints { kind: StreamKind::Adaptive, expects_audio: false },
        };
    }

    if ADAPTIVE_MARKERS.iter().any(|marker| lower.contains(marker)) {
        let expects_audio = broadcasters
            .iter()
            .filter(|b| !b.trim().is_empty())
            .any(|b| lower.contains(&b.trim().to_ascii_lowercase()));
        return StreamSource {
            url: url.to_string(),
            hints: StreamHints { kind: StreamKind::Adaptive, expects_audio },
        };
    }

    if DIRECT_VIDEO_EXTS.iter().any(|ext| lower.contains(ext)) {
        return StreamSource {
            url: url.to_string(),
            hints: StreamHints { kind: StreamKind::Progressive, expects_audio: true },
        };
    }

    StreamSource {
        url: url.to_string(),
        hints: StreamHints { kind: StreamKind::Adaptive, expects_audio: false },
    }
}
