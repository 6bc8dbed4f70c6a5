//! Launching channels in a desktop media player
//!
//! Streams the built-in player cannot handle (or that need audio) are handed
//! to ffplay, mpv or VLC. Only one external player runs at a time.

use std::io;
use std::process::{Child, Command, Stdio};

use crate::models::ChannelInfo;

pub const DEFAULT_PLAYER: &str = "ffplay";

/// Player binary to run for the configured name
pub fn resolve_player(configured: &str) -> String {
    let player = configured.trim();
    let player = if player.is_empty() { DEFAULT_PLAYER } else { player };

    // Common install locations on Windows
    #[cfg(target_os = "windows")]
    {
        let candidates: &[&str] = match player.to_lowercase().as_str() {
            "vlc" | "vlc.exe" => &[
                r"C:\Program Files\VideoLAN\VLC\vlc.exe",
                r"C:\Program Files (x86)\VideoLAN\VLC\vlc.exe",
            ],
            "mpv" | "mpv.exe" => &[
                r"C:\Program Files\mpv\mpv.exe",
                r"C:\Program Files (x86)\mpv\mpv.exe",
                r"C:\mpv\mpv.exe",
            ],
            "ffplay" | "ffplay.exe" => &[r"C:\ffmpeg\bin\ffplay.exe", r"C:\Program Files\ffmpeg\bin\ffplay.exe"],
            _ => &[],
        };
        if let Some(path) = candidates.iter().find(|p| std::path::Path::new(p).exists()) {
            return path.to_string();
        }
    }

    player.to_string()
}

/// Command-line arguments for `player` to open `url`
pub fn player_args(player: &str, url: &str, title: &str) -> Vec<String> {
    let player = player.to_lowercase();
    let is_http = url.starts_with("http");

    if player.contains("ffplay") {
        // ffplay takes the input directly, no -i
        let mut args = vec![
            url.to_string(),
            "-autoexit".to_string(),
            "-sync".to_string(),
            "audio".to_string(),
            "-framedrop".to_string(),
            "-window_title".to_string(),
            title.to_string(),
        ];
        if is_http {
            args.extend(["-reconnect", "1", "-reconnect_streamed", "1", "-reconnect_delay_max", "10"].map(String::from));
        }
        args
    } else if player.contains("mpv") {
        vec![
            url.to_string(),
            format!("--title={}", title),
            "--cache=yes".to_string(),
            "--stream-lavf-o=reconnect=1".to_string(),
            "--stream-lavf-o=reconnect_streamed=1".to_string(),
            "--ytdl=no".to_string(),
        ]
    } else if player.contains("vlc") {
        vec![url.to_string(), format!("--meta-title={}", title), "--network-caching=3000".to_string()]
    } else {
        vec![url.to_string()]
    }
}

/// Keeps track of the running external player
#[derive(Default)]
pub struct ExternalPlayer {
    current: Option<Child>,
}

impl ExternalPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close any running player, then start `configured` on the channel
    pub fn launch(&mut self, configured: &str, channel: &ChannelInfo) -> io::Result<()> {
        self.stop();

        let player = resolve_player(configured);
        let title = format!("{} - {}", channel.title, channel.ch_number);
        log::info!("[PLAY] {} | Player: {}", channel.title, player);
        log::info!("[PLAY] URL: {}", channel.url);

        let mut cmd = Command::new(&player);
        cmd.args(player_args(&player, &channel.url, &title))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // Hide the console window for ffplay
        #[cfg(target_os = "windows")]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            if player.to_lowercase().contains("ffplay") {
                cmd.creation_flags(CREATE_NO_WINDOW);
            }
        }

        let child = cmd.spawn().map_err(|e| {
            log::error!("Failed to start {}: {}", player, e);
            io::Error::new(e.kind(), format!("Failed to start {}: {}", player, e))
        })?;
        self.current = Some(child);
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(mut child) = self.current.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    pub fn is_running(&mut self) -> bool {
        match &mut self.current {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }
}

impl Drop for ExternalPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}
