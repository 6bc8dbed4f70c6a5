//! AmiIPTV - desktop IPTV playlist viewer
//! Browses playlists parsed by the AmiIPTV backend and plays their channels

// Hide console window on Windows release builds
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

// Use mimalloc for faster memory allocation (Linux, macOS)
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use eframe::egui;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

mod api;
mod config;
mod controller;
mod error;
mod external_player;
mod ffmpeg_player;
mod models;
mod normalize;
mod playback;
mod storage;
mod stream;
mod tasks;

use api::ApiClient;
use config::AppConfig;
use controller::{AppController, LoadTiming};
use external_player::ExternalPlayer;
use ffmpeg_player::{interactions, FullscreenSignal, InternalPlayer, OverlayAction, PlayerView};
use models::*;
use playback::{PlaybackManager, PlayerBackend, PlayerFactory, SessionPolicy};
use storage::{Favorites, JsonFileStore};
use tasks::ThreadSpawner;

/// Public HLS stream for checking that playback works at all
const TEST_STREAM_URL: &str = "https://test-streams.mux.dev/x36xhzz/x36xhzz.m3u8";
const SEARCH_DEBOUNCE: Duration = Duration::from_millis(350);
const CARD_WIDTH: f32 = 190.0;

/// Application icon: play button on a blue gradient
fn load_icon() -> egui::IconData {
    let size: usize = 64;
    let mut rgba = vec![0u8; size * size * 4];

    for y in 0..size {
        for x in 0..size {
            let idx = (y * size + x) * 4;
            let nx = x as f32 / size as f32;
            let ny = y as f32 / size as f32;

            // Rounded corners stay transparent
            let r = 0.14;
            let dx = (r - nx).max(nx - (1.0 - r)).max(0.0);
            let dy = (r - ny).max(ny - (1.0 - r)).max(0.0);
            if dx * dx + dy * dy > r * r {
                continue;
            }

            let px = nx - 0.36;
            let py = ny - 0.5;
            let in_play = px >= 0.0 && px <= 0.34 && py.abs() <= (0.34 - px) * 0.6;

            let pixel = if in_play {
                [255, 255, 255]
            } else {
                let t = (nx + ny) * 0.5;
                [(30.0 + 20.0 * t) as u8, (90.0 + 40.0 * t) as u8, (200.0 - 40.0 * t) as u8]
            };
            rgba[idx..idx + 3].copy_from_slice(&pixel);
            rgba[idx + 3] = 255;
        }
    }

    egui::IconData {
        rgba,
        width: size as u32,
        height: size as u32,
    }
}

/// Add a system emoji font so channel type icons render
fn install_emoji_fonts(ctx: &egui::Context) {
    #[cfg(target_os = "windows")]
    let candidates = ["C:\\Windows\\Fonts\\seguiemj.ttf"];
    #[cfg(target_os = "macos")]
    let candidates = ["/System/Library/Fonts/Apple Color Emoji.ttc"];
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    let candidates = [
        "/usr/share/fonts/truetype/noto/NotoColorEmoji.ttf",
        "/usr/share/fonts/noto-emoji/NotoColorEmoji.ttf",
        "/usr/share/fonts/google-noto-emoji/NotoColorEmoji.ttf",
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    ];

    let Some(font_data) = candidates.iter().find_map(|path| std::fs::read(path).ok()) else {
        log::debug!("No emoji font found");
        return;
    };
    let mut fonts = egui::FontDefinitions::default();
    fonts
        .font_data
        .insert("emoji".to_owned(), egui::FontData::from_owned(font_data).into());
    fonts
        .families
        .entry(egui::FontFamily::Proportional)
        .or_default()
        .push("emoji".to_owned());
    ctx.set_fonts(fonts);
}

/// Channel number typed into the jump box
fn parse_channel_number(input: &str) -> Option<i64> {
    input.trim().parse::<i64>().ok().filter(|n| *n >= 0)
}

fn test_channel() -> ChannelInfo {
    ChannelInfo {
        title: "Test stream".to_string(),
        group: "Test".to_string(),
        logo: String::new(),
        url: TEST_STREAM_URL.to_string(),
        ch_number: 0,
        channel_type: ChannelType::Live,
    }
}

fn main() -> Result<(), eframe::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::load();
    log::info!("Using backend at {}", config.api_url());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1250.0, 760.0])
            .with_min_inner_size([900.0, 550.0])
            .with_icon(load_icon()),
        vsync: true,
        hardware_acceleration: eframe::HardwareAcceleration::Preferred,
        ..Default::default()
    };

    eframe::run_native(
        "AmiIPTV",
        options,
        Box::new(move |cc| {
            install_emoji_fonts(&cc.egui_ctx);
            Ok(Box::new(IPTVApp::new(config)))
        }),
    )
}

enum CardAction {
    Open,
    ToggleFavorite,
}

struct IPTVApp {
    config: AppConfig,
    controller: AppController,
    playback: PlaybackManager,
    player_view: PlayerView,
    external: ExternalPlayer,
    fullscreen_signal: FullscreenSignal,
    fullscreen: bool,

    // Inputs
    url_input: String,
    search_input: String,
    search_edited_at: Option<Instant>,
    jump_input: String,

    favorites_only: bool,
    show_history: bool,
    notice: Option<String>,
}

impl IPTVApp {
    fn new(config: AppConfig) -> Self {
        let backend = Arc::new(ApiClient::new(config.api_url(), config.request_timeout()));
        let favorites = Favorites::load(Box::new(JsonFileStore::open_default()));
        let timing = LoadTiming {
            settle: config.settle_delay(),
            saved_settle: config.saved_settle_delay(),
        };
        let mut controller = AppController::new(backend, Box::new(ThreadSpawner), favorites, timing, config.page_size);
        controller.refresh_saved_playlists();

        let fullscreen_signal = FullscreenSignal::default();
        let signal = fullscreen_signal.clone();
        let factory: PlayerFactory =
            Box::new(move || Box::new(InternalPlayer::new(signal.clone())) as Box<dyn PlayerBackend>);
        let playback = PlaybackManager::new(factory, SessionPolicy::from_config(&config));

        Self {
            config,
            controller,
            playback,
            player_view: PlayerView::new(),
            external: ExternalPlayer::new(),
            fullscreen_signal,
            fullscreen: false,
            url_input: String::new(),
            search_input: String::new(),
            search_edited_at: None,
            jump_input: String::new(),
            favorites_only: false,
            show_history: false,
            notice: None,
        }
    }

    /// Surface a rejected action in the status bar
    fn report(&mut self, result: error::Result<()>) {
        match result {
            Ok(()) => self.notice = None,
            Err(e) => {
                log::warn!("{}", e);
                self.notice = Some(e.to_string());
            }
        }
    }

    fn submit_url(&mut self) {
        let result = self.controller.submit_playlist_url(&self.url_input);
        self.report(result);
    }

    /// Start playing `channel`, closing whatever was playing
    fn play(&mut self, channel: ChannelInfo) {
        self.player_view.clear();
        if let Some(closed) = self.playback.open(channel, Instant::now()) {
            self.controller.report_progress(&closed);
        }
    }

    fn close_player(&mut self, ctx: &egui::Context) {
        if let Some(closed) = self.playback.close() {
            self.controller.report_progress(&closed);
        }
        self.controller.close_channel();
        self.player_view.clear();
        self.set_fullscreen(ctx, false);
    }

    fn set_fullscreen(&mut self, ctx: &egui::Context, fullscreen: bool) {
        if self.fullscreen != fullscreen {
            self.fullscreen = fullscreen;
            ctx.send_viewport_cmd(egui::ViewportCommand::Fullscreen(fullscreen));
        }
    }

    fn apply_search(&mut self) {
        self.search_edited_at = None;
        let search = self.search_input.clone();
        let result = self.controller.change_search(&search);
        self.report(result);
    }

    fn reset_playlist(&mut self, ctx: &egui::Context) {
        self.close_player(ctx);
        let result = self.controller.reset();
        self.report(result);
        self.search_input.clear();
        self.search_edited_at = None;
        self.jump_input.clear();
        self.favorites_only = false;
    }

    fn show_load_screen(&mut self, ui: &mut egui::Ui) {
        let loading = self.controller.phase() == Phase::Loading;
        let mut load_saved: Option<String> = None;
        let mut delete: Option<String> = None;
        let mut test = false;

        ui.vertical_centered(|ui| {
            ui.add_space(60.0);
            ui.heading("📺 AmiIPTV");
            ui.add_space(10.0);
            ui.label("Enter the URL of an M3U playlist to get started");
            ui.add_space(10.0);

            let response = ui.add_enabled(
                !loading,
                egui::TextEdit::singleline(&mut self.url_input)
                    .hint_text("https://example.com/playlist.m3u")
                    .desired_width(480.0),
            );
            let entered = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));

            ui.add_space(5.0);
            let clicked = ui.add_enabled(!loading, egui::Button::new("▶ Load playlist")).clicked();
            if (entered || clicked) && !loading {
                self.submit_url();
            }
            if ui
                .button("🧪 Test stream")
                .on_hover_text("Play a public HLS stream to check that playback works")
                .clicked()
            {
                test = true;
            }

            if loading {
                ui.add_space(10.0);
                ui.spinner();
                ui.label(self.controller.status_message());
            }

            ui.add_space(30.0);
            ui.heading("Saved playlists");
            ui.add_space(5.0);
            if self.controller.saved_playlists().is_empty() {
                ui.label(egui::RichText::new("No saved playlists").weak());
            }
            egui::Grid::new("saved_playlists")
                .striped(true)
                .num_columns(5)
                .show(ui, |ui| {
                    for playlist in self.controller.saved_playlists() {
                        ui.label(egui::RichText::new(&playlist.name).strong());
                        ui.label(playlist.modified_label());
                        ui.label(playlist.size_label());
                        if ui.add_enabled(!loading, egui::Button::new("📂 Load")).clicked() {
                            load_saved = Some(playlist.name.clone());
                        }
                        if ui.button("🗑").on_hover_text("Delete playlist").clicked() {
                            delete = Some(playlist.name.clone());
                        }
                        ui.end_row();
                    }
                });
        });

        if let Some(name) = load_saved {
            let result = self.controller.load_saved_playlist(&name);
            self.report(result);
        }
        if let Some(name) = delete {
            self.controller.request_delete(&name);
        }
        if test {
            self.play(test_channel());
        }
    }

    fn show_toolbar(&mut self, ui: &mut egui::Ui) {
        let query = self.controller.query().clone();
        let mut filter = query.filter;
        let mut group = query.group.clone();
        let mut search_now = false;
        let mut jump = false;

        ui.horizontal_wrapped(|ui| {
            ui.label("🔍");
            let response = ui.add(
                egui::TextEdit::singleline(&mut self.search_input)
                    .hint_text("Search channels")
                    .desired_width(220.0),
            );
            if response.changed() {
                self.search_edited_at = Some(Instant::now());
            }
            if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                search_now = true;
            }

            egui::ComboBox::from_id_salt("channel_filter")
                .selected_text(filter.label())
                .show_ui(ui, |ui| {
                    for option in ChannelFilter::ALL {
                        ui.selectable_value(&mut filter, option, option.label());
                    }
                });

            // The backend only filters the full listing by group
            if filter == ChannelFilter::All {
                let label = if group == ALL_GROUPS { "All groups".to_string() } else { group.clone() };
                egui::ComboBox::from_id_salt("channel_group")
                    .selected_text(label)
                    .width(180.0)
                    .show_ui(ui, |ui| {
                        ui.selectable_value(&mut group, ALL_GROUPS.to_string(), "All groups");
                        for name in self.controller.groups() {
                            ui.selectable_value(&mut group, name.clone(), name);
                        }
                    });
            }

            ui.separator();
            ui.checkbox(&mut self.favorites_only, "⭐ Favorites only");

            let view_label = match self.config.view_mode {
                ViewMode::Grid => "☰ List",
                ViewMode::List => "▦ Grid",
            };
            if ui.button(view_label).clicked() {
                self.config.view_mode = self.config.view_mode.toggled();
                self.config.save();
            }

            ui.separator();
            ui.label("#");
            let response = ui.add(egui::TextEdit::singleline(&mut self.jump_input).hint_text("No.").desired_width(60.0));
            let entered = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            if ui.button("Go").clicked() || entered {
                jump = true;
            }
        });

        if filter != query.filter {
            let result = self.controller.change_filter(filter);
            self.report(result);
        } else if group != query.group {
            let result = self.controller.change_group(&group);
            self.report(result);
        }
        if search_now {
            self.apply_search();
        }
        if jump {
            match parse_channel_number(&self.jump_input) {
                Some(number) => {
                    let result = self.controller.jump_to_channel(number);
                    self.report(result);
                }
                None => self.notice = Some(format!("'{}' is not a channel number", self.jump_input.trim())),
            }
        }
    }

    fn show_channels(&mut self, ui: &mut egui::Ui) {
        let selected = self.controller.selected().map(|c| c.ch_number);
        let channels: Vec<ChannelInfo> = self
            .controller
            .channels()
            .iter()
            .filter(|c| !self.favorites_only || self.controller.is_favorite(c.ch_number))
            .cloned()
            .collect();

        if channels.is_empty() {
            ui.add_space(40.0);
            ui.vertical_centered(|ui| {
                if self.controller.is_fetching() {
                    ui.spinner();
                } else if self.favorites_only {
                    ui.label("No favorites on this page");
                } else {
                    ui.label("No channels found");
                }
            });
            return;
        }

        let mut action: Option<(CardAction, ChannelInfo)> = None;
        let view_mode = self.config.view_mode;
        let controller = &self.controller;

        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .max_height((ui.available_height() - 36.0).max(120.0))
            .show(ui, |ui| match view_mode {
                ViewMode::Grid => {
                    ui.horizontal_wrapped(|ui| {
                        for channel in &channels {
                            let favorite = controller.is_favorite(channel.ch_number);
                            if let Some(a) = channel_card(ui, channel, favorite, selected == Some(channel.ch_number)) {
                                action = Some((a, channel.clone()));
                            }
                        }
                    });
                }
                ViewMode::List => {
                    for channel in &channels {
                        let favorite = controller.is_favorite(channel.ch_number);
                        if let Some(a) = channel_row(ui, channel, favorite, selected == Some(channel.ch_number)) {
                            action = Some((a, channel.clone()));
                        }
                    }
                }
            });

        match action {
            Some((CardAction::Open, channel)) => {
                self.controller.select_channel(channel.clone());
                self.play(channel);
            }
            Some((CardAction::ToggleFavorite, channel)) => {
                self.controller.toggle_favorite(channel.ch_number);
            }
            None => {}
        }
    }

    fn show_pagination(&mut self, ui: &mut egui::Ui) {
        let page = self.controller.page();
        let total_pages = self.controller.total_pages();
        let mut target: Option<u32> = None;
        let mut step: Option<bool> = None; // true = forward

        ui.horizontal(|ui| {
            if ui.add_enabled(page > 1, egui::Button::new("⏮")).clicked() {
                target = Some(1);
            }
            if ui.add_enabled(page > 1, egui::Button::new("◀ Prev")).clicked() {
                step = Some(false);
            }
            ui.label(format!(
                "Page {} of {} ({} channels)",
                page,
                total_pages,
                self.controller.total()
            ));
            if ui.add_enabled(page < total_pages, egui::Button::new("Next ▶")).clicked() {
                step = Some(true);
            }
            if ui.add_enabled(page < total_pages, egui::Button::new("⏭")).clicked() {
                target = Some(total_pages);
            }
            if self.controller.is_fetching() {
                ui.spinner();
            }
        });

        if let Some(forward) = step {
            let result = if forward { self.controller.next_page() } else { self.controller.prev_page() };
            self.report(result);
        }
        if let Some(page) = target {
            let result = self.controller.change_page(page);
            self.report(result);
        }
    }

    fn show_history_panel(&mut self, ctx: &egui::Context) {
        let mut refresh = false;
        egui::SidePanel::right("history_panel")
            .resizable(true)
            .default_width(260.0)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("🕘 History");
                    if ui.small_button("🔄").on_hover_text("Refresh").clicked() {
                        refresh = true;
                    }
                });
                ui.separator();
                if self.controller.history().is_empty() {
                    ui.label(egui::RichText::new("Nothing watched yet").weak());
                }
                egui::ScrollArea::vertical().show(ui, |ui| {
                    for entry in self.controller.history() {
                        ui.label(egui::RichText::new(&entry.title).strong());
                        ui.horizontal(|ui| {
                            ui.label(egui::RichText::new(&entry.date).small().weak());
                            if entry.seen {
                                ui.label(egui::RichText::new("✔ seen").small());
                            }
                        });
                        if entry.total_duration > 0.0 {
                            let fraction = (entry.position / entry.total_duration).clamp(0.0, 1.0) as f32;
                            ui.add(
                                egui::ProgressBar::new(fraction)
                                    .desired_height(6.0)
                                    .text(format!("{} / {} min", (entry.position / 60.0) as u64, (entry.total_duration / 60.0) as u64)),
                            );
                        }
                        ui.add_space(6.0);
                    }
                });
            });
        if refresh {
            self.controller.refresh_history();
        }
    }

    fn show_delete_confirm(&mut self, ctx: &egui::Context) {
        let Some(name) = self.controller.pending_delete().map(str::to_string) else {
            return;
        };
        let mut confirm = false;
        let mut cancel = false;

        egui::Window::new("⚠ Delete Playlist")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.add_space(10.0);
                ui.label(egui::RichText::new(format!("Delete the saved playlist '{}'?", name)).strong());
                ui.label("The backend's cached copy will be removed.");
                ui.add_space(10.0);
                ui.horizontal(|ui| {
                    if ui.button("Cancel").clicked() {
                        cancel = true;
                    }
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui
                            .button(egui::RichText::new("Delete").color(egui::Color32::from_rgb(200, 80, 80)))
                            .clicked()
                        {
                            confirm = true;
                        }
                    });
                });
            });

        if cancel {
            self.controller.cancel_delete();
        } else if confirm {
            let result = self.controller.confirm_delete();
            self.report(result);
        }
    }

    fn show_player(&mut self, ctx: &egui::Context) {
        let Some(session) = self.playback.session_mut() else {
            return;
        };
        let mut open = true;
        let mut action = None;
        let player_view = &mut self.player_view;

        let window = egui::Window::new("🎬 Player")
            .id(egui::Id::new("player_window"))
            .open(&mut open)
            .resizable(true)
            .collapsible(false);
        let window = if self.fullscreen {
            window.fixed_rect(ctx.screen_rect()).title_bar(false)
        } else {
            window.default_size([900.0, 560.0])
        };
        window.show(ctx, |ui| {
            action = player_view.show(ctx, ui, session);
        });

        match action {
            Some(OverlayAction::Close) => open = false,
            Some(OverlayAction::OpenExternal) => {
                if let Some(channel) = self.playback.session().map(|s| s.channel().clone()) {
                    match self.external.launch(&self.config.external_player, &channel) {
                        Ok(()) => self.notice = Some(format!("Opened '{}' in external player", channel.title)),
                        Err(e) => self.notice = Some(e.to_string()),
                    }
                }
            }
            Some(OverlayAction::CopyUrl) => {
                if let Some(session) = self.playback.session() {
                    ctx.copy_text(session.source().url.clone());
                    self.notice = Some("Stream URL copied to clipboard".to_string());
                }
            }
            None => {}
        }

        if !open {
            self.close_player(ctx);
        }
    }
}

fn favorite_button(ui: &mut egui::Ui, favorite: bool) -> bool {
    let (text, hover) = if favorite {
        (egui::RichText::new("★").color(egui::Color32::GOLD), "Remove from favorites")
    } else {
        (egui::RichText::new("☆"), "Add to favorites")
    };
    ui.add(egui::Button::new(text).frame(false)).on_hover_text(hover).clicked()
}

fn channel_card(ui: &mut egui::Ui, channel: &ChannelInfo, favorite: bool, selected: bool) -> Option<CardAction> {
    let mut action = None;
    let mut frame = egui::Frame::group(ui.style());
    if selected {
        frame = frame.stroke(egui::Stroke::new(2.0, ui.visuals().selection.bg_fill));
    }
    frame.show(ui, |ui| {
        ui.set_width(CARD_WIDTH);
        ui.horizontal(|ui| {
            ui.label(egui::RichText::new(format!("#{}", channel.ch_number)).weak());
            ui.label(egui::RichText::new(channel.channel_type.label()).small().weak());
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if favorite_button(ui, favorite) {
                    action = Some(CardAction::ToggleFavorite);
                }
            });
        });
        let title = ui
            .add(
                egui::Label::new(egui::RichText::new(format!("{} {}", channel.channel_type.icon(), channel.title)).strong())
                    .truncate()
                    .sense(egui::Sense::click()),
            )
            .on_hover_text(&channel.title);
        ui.add(egui::Label::new(egui::RichText::new(&channel.group).small().weak()).truncate());
        if title.clicked() && action.is_none() {
            action = Some(CardAction::Open);
        }
    });
    action
}

fn channel_row(ui: &mut egui::Ui, channel: &ChannelInfo, favorite: bool, selected: bool) -> Option<CardAction> {
    let mut action = None;
    ui.horizontal(|ui| {
        if favorite_button(ui, favorite) {
            action = Some(CardAction::ToggleFavorite);
        }
        ui.label(egui::RichText::new(format!("{:>5}", channel.ch_number)).monospace().weak());
        let text = format!("{} {}", channel.channel_type.icon(), channel.title);
        if ui.selectable_label(selected, text).clicked() {
            action = Some(CardAction::Open);
        }
        ui.label(egui::RichText::new(&channel.group).small().weak());
    });
    action
}

impl eframe::App for IPTVApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();

        // Process background task results (non-blocking)
        self.controller.poll();
        if let Some(channel) = self.controller.take_open_request() {
            self.play(channel);
        }

        // Player events and timers
        if self.playback.is_active() {
            for kind in interactions(ctx) {
                self.playback.on_interaction(kind);
            }
        }
        self.playback.pump(now);
        if self.fullscreen_signal.swap(false, Ordering::Relaxed) && self.playback.is_active() {
            self.set_fullscreen(ctx, true);
        }
        if self.fullscreen && ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            self.set_fullscreen(ctx, false);
        }

        if let Some(edited) = self.search_edited_at {
            if now.duration_since(edited) >= SEARCH_DEBOUNCE && self.controller.phase() == Phase::Browsing {
                self.apply_search();
            }
        }

        // Apply theme
        if self.config.dark_mode {
            ctx.set_visuals(egui::Visuals::dark());
        } else {
            ctx.set_visuals(egui::Visuals::light());
        }

        let browsing = self.controller.phase() == Phase::Browsing;

        // Top panel - Controls
        let mut reset = false;
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.add_space(5.0);
            ui.horizontal(|ui| {
                ui.heading("📺 AmiIPTV");
                ui.separator();
                if browsing {
                    if ui.button("📂 Change playlist").clicked() {
                        reset = true;
                    }
                    if ui.button("🔄 Refresh").clicked() {
                        let result = self.controller.refresh();
                        self.report(result);
                    }
                    if ui.selectable_label(self.show_history, "🕘 History").clicked() {
                        self.show_history = !self.show_history;
                        if self.show_history {
                            self.controller.refresh_history();
                        }
                    }
                    ui.label(format!("⭐ {}", self.controller.favorites().len()));
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let theme = if self.config.dark_mode { "☀ Light" } else { "🌙 Dark" };
                    if ui.button(theme).clicked() {
                        self.config.dark_mode = !self.config.dark_mode;
                        self.config.save();
                    }
                });
            });
            ui.add_space(5.0);
        });
        if reset {
            self.reset_playlist(ctx);
        }

        // Bottom panel - Status
        let mut dismiss = false;
        egui::TopBottomPanel::bottom("bottom_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if self.controller.phase() == Phase::Loading || self.controller.is_fetching() {
                    ui.spinner();
                }
                if let Some(error) = self.controller.error() {
                    ui.colored_label(egui::Color32::from_rgb(220, 80, 80), format!("⚠ {}", error));
                    if ui.small_button("✖").clicked() {
                        dismiss = true;
                    }
                } else if let Some(notice) = &self.notice {
                    ui.label(notice);
                } else {
                    ui.label(self.controller.status_message());
                }
            });
        });
        if dismiss {
            self.controller.clear_error();
        }

        if browsing && self.show_history {
            self.show_history_panel(ctx);
        }

        // Main content
        egui::CentralPanel::default().show(ctx, |ui| {
            if browsing {
                self.show_toolbar(ui);
                ui.separator();
                self.show_channels(ui);
                ui.separator();
                self.show_pagination(ui);
            } else {
                self.show_load_screen(ui);
            }
        });

        self.show_delete_confirm(ctx);
        self.show_player(ctx);

        // Keep polling while work is in flight or a video is playing
        let busy = self.controller.phase() == Phase::Loading
            || self.controller.is_fetching()
            || self.search_edited_at.is_some();
        if busy || self.playback.is_active() {
            ctx.request_repaint();
        } else {
            ctx.request_repaint_after(Duration::from_millis(500));
        }
    }
}
