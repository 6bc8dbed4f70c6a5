// Built-in video player using ffmpeg-next
// Requires FFmpeg libraries: libavcodec, libavformat, libavutil, libswscale
//
// To install FFmpeg development libraries:
// - Ubuntu/Debian: sudo apt install libavcodec-dev libavformat-dev libavutil-dev libswscale-dev libavdevice-dev
// - Fedora: sudo dnf install ffmpeg-devel
// - macOS: brew install ffmpeg
// - Windows: Download from https://ffmpeg.org and set FFMPEG_DIR environment variable
//
// Video only: audio tracks are counted for the no-audio advisory but not
// rendered. Use the external player for sound.

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::playback::{Interaction, PlaybackIssue, PlaybackSession, PlaybackState, VideoFrame};

/// Set by the player when it wants the window to go fullscreen
pub type FullscreenSignal = Arc<AtomicBool>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State written by the decode thread and read by the UI thread
#[derive(Default)]
struct Shared {
    frame: Mutex<Option<VideoFrame>>,
    buffered: AtomicBool,
    audio_tracks: Mutex<Option<usize>>,
    position_secs: Mutex<f64>,
    duration_secs: Mutex<Option<f64>>,
}

#[cfg(feature = "internal-player")]
mod player_impl {
    use super::{lock, FullscreenSignal, Shared};
    use crate::playback::{PlayerBackend, PlayerEvent, PlayRejected, VideoFrame, MEDIA_ERR_SRC_NOT_SUPPORTED};
    use crate::stream::StreamHints;
    use std::sync::atomic::Ordering;
    use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    extern crate ffmpeg_next as ffmpeg;
    use ffmpeg::format::Pixel;
    use ffmpeg::media::Type;
    use ffmpeg::software::scaling::{context::Context as ScalingContext, flag::Flags};
    use ffmpeg::util::frame::video::Video as DecodedVideo;

    const MAX_WIDTH: u32 = 1280;
    const MAX_HEIGHT: u32 = 720;
    /// Container durations are in microseconds
    const AV_TIME_BASE: f64 = 1_000_000.0;

    enum Command {
        Play,
        Stop,
    }

    pub struct InternalPlayer {
        command_sender: Option<Sender<Command>>,
        event_receiver: Option<Receiver<PlayerEvent>>,
        shared: Arc<Shared>,
        fullscreen: FullscreenSignal,
        muted: bool,
        volume: f32,
    }

    impl InternalPlayer {
        pub fn new(fullscreen: FullscreenSignal) -> Self {
            if let Err(e) = ffmpeg::init() {
                log::error!("FFmpeg initialization failed: {}", e);
            }
            Self {
                command_sender: None,
                event_receiver: None,
                shared: Arc::new(Shared::default()),
                fullscreen,
                muted: false,
                volume: 1.0,
            }
        }

        fn decode_thread(url: String, shared: Arc<Shared>, commands: Receiver<Command>, events: Sender<PlayerEvent>) {
            let fail = |code: Option<u32>, message: String| {
                log::error!("{}", message);
                let _ = events.send(PlayerEvent::Error { code, message });
            };

            let mut options = ffmpeg::Dictionary::new();
            options.set("reconnect", "1");
            options.set("reconnect_streamed", "1");
            options.set("reconnect_delay_max", "5");
            options.set("timeout", "5000000");

            let mut ictx = match ffmpeg::format::input_with_dictionary(&url, options) {
                Ok(ctx) => ctx,
                Err(e) => {
                    return fail(Some(MEDIA_ERR_SRC_NOT_SUPPORTED), format!("Failed to open stream: {}", e));
                }
            };

            // Live streams report no duration
            let duration = ictx.duration();
            if duration > 0 {
                *lock(&shared.duration_secs) = Some(duration as f64 / AV_TIME_BASE);
            }

            let audio_tracks = ictx.streams().filter(|s| s.parameters().medium() == Type::Audio).count();
            *lock(&shared.audio_tracks) = Some(audio_tracks);
            let _ = events.send(PlayerEvent::MetadataLoaded);

            let (video_index, time_base, parameters) = match ictx.streams().best(Type::Video) {
                Some(stream) => (stream.index(), f64::from(stream.time_base()), stream.parameters()),
                None => return fail(Some(MEDIA_ERR_SRC_NOT_SUPPORTED), "No video stream found".to_string()),
            };

            let mut decoder = match ffmpeg::codec::context::Context::from_parameters(parameters)
                .and_then(|context| context.decoder().video())
            {
                Ok(d) => d,
                Err(e) => return fail(None, format!("Failed to create decoder: {}", e)),
            };

            let (width, height) = (decoder.width(), decoder.height());
            let (target_width, target_height) = if width > MAX_WIDTH || height > MAX_HEIGHT {
                let scale = f64::min(MAX_WIDTH as f64 / width as f64, MAX_HEIGHT as f64 / height as f64);
                ((width as f64 * scale) as u32, (height as f64 * scale) as u32)
            } else {
                (width, height)
            };

            let mut scaler = match ScalingContext::get(
                decoder.format(),
                width,
                height,
                Pixel::RGB24,
                target_width,
                target_height,
                Flags::BILINEAR,
            ) {
                Ok(s) => s,
                Err(e) => return fail(None, format!("Failed to create scaler: {}", e)),
            };

            let _ = events.send(PlayerEvent::Ready);

            // Decoding starts once the session asks for playback
            loop {
                match commands.recv() {
                    Ok(Command::Play) => break,
                    Ok(Command::Stop) | Err(_) => return,
                }
            }

            let frame_duration = Duration::from_secs_f64(1.0 / 30.0);
            let mut last_frame_time = Instant::now();
            let mut announced = false;

            for (stream, packet) in ictx.packets() {
                match commands.try_recv() {
                    Ok(Command::Stop) | Err(TryRecvError::Disconnected) => return,
                    Ok(Command::Play) | Err(TryRecvError::Empty) => {}
                }
                shared.buffered.store(true, Ordering::Relaxed);

                if stream.index() != video_index || decoder.send_packet(&packet).is_err() {
                    continue;
                }

                let mut decoded = DecodedVideo::empty();
                while decoder.receive_frame(&mut decoded).is_ok() {
                    let mut rgb = DecodedVideo::empty();
                    if scaler.run(&decoded, &mut rgb).is_err() {
                        continue;
                    }

                    let data = rgb.data(0);
                    let stride = rgb.stride(0);
                    let row_len = target_width as usize * 3;
                    let mut frame_data = Vec::with_capacity(row_len * target_height as usize);
                    for y in 0..target_height as usize {
                        let start = y * stride;
                        frame_data.extend_from_slice(&data[start..start + row_len]);
                    }

                    if let Some(pts) = decoded.pts() {
                        *lock(&shared.position_secs) = pts as f64 * time_base;
                    }
                    *lock(&shared.frame) = Some(VideoFrame {
                        width: target_width,
                        height: target_height,
                        data: frame_data,
                    });
                    if !announced {
                        announced = true;
                        let _ = events.send(PlayerEvent::Playing);
                    }

                    // Keep the UI from being flooded
                    let elapsed = last_frame_time.elapsed();
                    if elapsed < frame_duration {
                        thread::sleep(frame_duration - elapsed);
                    }
                    last_frame_time = Instant::now();
                }
            }

            log::info!("Stream ended: {}", url);
            let _ = events.send(PlayerEvent::Stalled);
        }
    }

    impl PlayerBackend for InternalPlayer {
        fn load(&mut self, url: &str, hints: &StreamHints) {
            self.dispose();
            self.shared = Arc::new(Shared::default());
            log::debug!("Opening {} as {}", url, hints.kind.mime_type());

            let (cmd_tx, cmd_rx) = channel();
            let (event_tx, event_rx) = channel();
            self.command_sender = Some(cmd_tx);
            self.event_receiver = Some(event_rx);

            let url = url.to_string();
            let shared = Arc::clone(&self.shared);
            thread::spawn(move || Self::decode_thread(url, shared, cmd_rx, event_tx));
        }

        fn play(&mut self) -> Result<(), PlayRejected> {
            match &self.command_sender {
                Some(sender) => sender
                    .send(Command::Play)
                    .map_err(|_| PlayRejected("decoder has stopped".to_string())),
                None => Err(PlayRejected("nothing loaded".to_string())),
            }
        }

        fn set_muted(&mut self, muted: bool) {
            self.muted = muted;
        }

        fn is_muted(&self) -> bool {
            self.muted
        }

        fn set_volume(&mut self, volume: f32) {
            self.volume = volume.clamp(0.0, 1.0);
        }

        fn has_playable_data(&self) -> bool {
            self.shared.buffered.load(Ordering::Relaxed)
        }

        fn audio_track_count(&self) -> Option<usize> {
            *lock(&self.shared.audio_tracks)
        }

        fn request_fullscreen(&mut self) -> Result<(), String> {
            self.fullscreen.store(true, Ordering::Relaxed);
            Ok(())
        }

        fn poll_events(&mut self) -> Vec<PlayerEvent> {
            let mut events = Vec::new();
            if let Some(receiver) = &self.event_receiver {
                loop {
                    match receiver.try_recv() {
                        Ok(event) => events.push(event),
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Disconnected) => {
                            self.event_receiver = None;
                            break;
                        }
                    }
                }
            }
            events
        }

        fn take_frame(&mut self) -> Option<VideoFrame> {
            lock(&self.shared.frame).take()
        }

        fn position_secs(&self) -> f64 {
            *lock(&self.shared.position_secs)
        }

        fn duration_secs(&self) -> Option<f64> {
            *lock(&self.shared.duration_secs)
        }

        fn dispose(&mut self) {
            if let Some(sender) = self.command_sender.take() {
                let _ = sender.send(Command::Stop);
            }
            self.event_receiver = None;
            *lock(&self.shared.frame) = None;
        }
    }

    impl Drop for InternalPlayer {
        fn drop(&mut self) {
            self.dispose();
        }
    }
}

// Stub implementation when internal-player feature is disabled
#[cfg(not(feature = "internal-player"))]
mod player_impl {
    use super::FullscreenSignal;
    use crate::playback::{PlayerBackend, PlayerEvent, PlayRejected};
    use crate::stream::StreamHints;
    use std::sync::atomic::Ordering;

    pub const NOT_ENABLED: &str = "Internal player not enabled. Build with --features internal-player";

    pub struct InternalPlayer {
        pending: Vec<PlayerEvent>,
        fullscreen: FullscreenSignal,
        muted: bool,
    }

    impl InternalPlayer {
        pub fn new(fullscreen: FullscreenSignal) -> Self {
            Self { pending: Vec::new(), fullscreen, muted: false }
        }
    }

    impl PlayerBackend for InternalPlayer {
        fn load(&mut self, url: &str, _hints: &StreamHints) {
            log::warn!("Cannot play {}: {}", url, NOT_ENABLED);
            self.pending.push(PlayerEvent::Error { code: None, message: NOT_ENABLED.to_string() });
        }

        fn play(&mut self) -> Result<(), PlayRejected> {
            Err(PlayRejected(NOT_ENABLED.to_string()))
        }

        fn set_muted(&mut self, muted: bool) {
            self.muted = muted;
        }

        fn is_muted(&self) -> bool {
            self.muted
        }

        fn set_volume(&mut self, _volume: f32) {}

        fn has_playable_data(&self) -> bool {
            false
        }

        fn audio_track_count(&self) -> Option<usize> {
            None
        }

        fn request_fullscreen(&mut self) -> Result<(), String> {
            self.fullscreen.store(true, Ordering::Relaxed);
            Ok(())
        }

        fn poll_events(&mut self) -> Vec<PlayerEvent> {
            std::mem::take(&mut self.pending)
        }

        fn dispose(&mut self) {
            self.pending.clear();
        }
    }
}

pub use player_impl::*;

/// Buttons pressed in the overlay that the app has to act on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayAction {
    Close,
    OpenExternal,
    CopyUrl,
}

/// Largest size with the frame's aspect ratio that fits `available`
pub fn fit_size(frame: egui::Vec2, available: egui::Vec2) -> egui::Vec2 {
    if frame.x <= 0.0 || frame.y <= 0.0 || available.y <= 0.0 {
        return egui::Vec2::ZERO;
    }
    let aspect = frame.x / frame.y;
    if available.x / available.y > aspect {
        egui::vec2(available.y * aspect, available.y)
    } else {
        egui::vec2(available.x, available.x / aspect)
    }
}

/// Map this frame's input to the interactions that may unlock audio
pub fn interactions(ctx: &egui::Context) -> Vec<Interaction> {
    ctx.input(|i| {
        let mut found = Vec::new();
        for event in &i.events {
            let kind = match event {
                egui::Event::PointerButton { pressed: true, .. } => Interaction::Click,
                egui::Event::Key { pressed: true, .. } => Interaction::Key,
                egui::Event::Touch { phase: egui::TouchPhase::Start, .. } => Interaction::Touch,
                _ => continue,
            };
            if !found.contains(&kind) {
                found.push(kind);
            }
        }
        found
    })
}

/// Video overlay for the active playback session
pub struct PlayerView {
    texture: Option<egui::TextureHandle>,
}

impl PlayerView {
    pub fn new() -> Self {
        Self { texture: None }
    }

    /// Forget the last frame; call when the session changes
    pub fn clear(&mut self) {
        self.texture = None;
    }

    pub fn show(&mut self, ctx: &egui::Context, ui: &mut egui::Ui, session: &mut PlaybackSession) -> Option<OverlayAction> {
        let mut action = None;

        if let Some(frame) = session.take_frame() {
            let image = egui::ColorImage::from_rgb([frame.width as usize, frame.height as usize], &frame.data);
            match &mut self.texture {
                Some(texture) => texture.set(image, egui::TextureOptions::LINEAR),
                None => {
                    self.texture = Some(ctx.load_texture("video_frame", image, egui::TextureOptions::LINEAR));
                }
            }
        }

        ui.horizontal(|ui| {
            let channel = session.channel();
            ui.heading(format!("{} {}", channel.channel_type.icon(), channel.title));
            ui.label(egui::RichText::new(format!("#{}", channel.ch_number)).weak());

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("✖ Close").clicked() {
                    action = Some(OverlayAction::Close);
                }
                if ui.button("📋 Copy URL").clicked() {
                    action = Some(OverlayAction::CopyUrl);
                }
                if ui.button("▶ External player").clicked() {
                    action = Some(OverlayAction::OpenExternal);
                }
                if ui.button("⛶ Fullscreen").clicked() {
                    session.request_fullscreen();
                }
                let mute_label = if session.is_muted() { "🔇 Unmute" } else { "🔊 Mute" };
                if ui.button(mute_label).clicked() {
                    if session.is_muted() {
                        session.unmute();
                    } else {
                        session.set_muted(true);
                    }
                }
            });
        });

        match session.issue() {
            Some(PlaybackIssue::Error(message)) => {
                ui.colored_label(egui::Color32::RED, format!("⚠ {}", message));
            }
            Some(PlaybackIssue::Advisory(message)) => {
                ui.colored_label(egui::Color32::YELLOW, format!("🔈 {}", message));
            }
            None if session.is_muted() && session.state() == PlaybackState::Playing => {
                ui.label(egui::RichText::new("Muted. Click or press any key to enable audio.").weak());
            }
            None => {}
        }
        ui.separator();

        ui.vertical_centered(|ui| match &self.texture {
            Some(texture) => {
                let size = fit_size(texture.size_vec2(), ui.available_size() * 0.95);
                ui.image((texture.id(), size));
            }
            None => {
                ui.add_space(50.0);
                match session.state() {
                    PlaybackState::Idle | PlaybackState::Loading => {
                        ui.spinner();
                        ui.label("Connecting to stream...");
                    }
                    PlaybackState::Stalled => {
                        ui.spinner();
                        ui.label("Buffering...");
                    }
                    PlaybackState::Playing => {
                        ui.spinner();
                    }
                    PlaybackState::Failed => {
                        ui.label("Try the external player or copy the stream URL.");
                    }
                }
            }
        });

        action
    }
}
