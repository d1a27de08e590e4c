#![warn(clippy::pedantic, clippy::nursery, clippy::cargo)]
#![deny(clippy::use_self, rust_2018_idioms)]
#![allow(clippy::multiple_crate_versions, clippy::module_name_repetitions)]

use std::{path::Path, time::Instant};

use communication::AlarmWorker;
use config::{AlarmStrategy, Config};
use countdown::{Countdown, Tick};
use eframe::egui::{self, Button, CentralPanel, ComboBox, Layout, TextEdit, TopBottomPanel, Window};

pub mod alarm;
pub mod communication;
pub mod config;
pub mod countdown;

pub struct FocusTimer {
    config: Config,
    countdown: Countdown,
    duration_text: String,
    volume: u8,
    /// message of the error window, if it is open
    error: Option<String>,
    in_config: bool,
    alarm: AlarmWorker,
}

impl FocusTimer {
    #[must_use]
    pub fn new(config: Config, alarm: AlarmWorker) -> Self {
        let (duration, error) = countdown::duration_or_default(&config.duration.to_string());
        if let Some(error) = error {
            log::warn!("configured duration {} is invalid: {error}", config.duration);
        }
        Self {
            countdown: Countdown::new(duration),
            duration_text: duration.to_string(),
            volume: config.volume,
            error: None,
            in_config: false,
            alarm,
            config,
        }
    }

    /// replaces the text of the duration entry, the label follows if it is valid
    pub fn set_duration_text(&mut self, text: String) {
        if let Ok(seconds) = countdown::validate_duration(&text) {
            if !self.countdown.is_running() {
                self.countdown = Countdown::new(seconds);
            }
        }
        self.duration_text = text;
    }

    fn show_error(&mut self, error: &impl std::fmt::Display) {
        log::warn!("{error}");
        self.error = Some(error.to_string());
    }

    /// runs whatever ticks are due, ringing at most once per frame
    ///
    /// returns whether the alarm was rung
    fn handle_ticks(&mut self, now: Instant) -> bool {
        let mut ring = false;
        for tick in self.countdown.poll(now, &self.duration_text) {
            match tick {
                Tick::Alarm { error } => {
                    ring = true;
                    if let Some(error) = error {
                        self.show_error(&error);
                    }
                }
                Tick::Decremented | Tick::Idle => {}
            }
        }
        if ring {
            self.alarm.ring(self.volume);
        }
        ring
    }

    fn toggle(&mut self, now: Instant) {
        if let Err(error) = self.countdown.toggle(&self.duration_text, now) {
            self.show_error(&error);
        }
        if !self.countdown.is_running() {
            self.alarm.silence();
        }
    }

    fn save(&mut self) {
        self.config.volume = self.volume;
        match Config::config_path() {
            Ok(path) => self.save_to(&path),
            Err(e) => self.show_error(&e),
        }
    }

    fn save_to(&mut self, path: &Path) {
        match self.config.save(path) {
            Ok(()) => log::info!("saved config to {}", path.display()),
            Err(e) => self.show_error(&e),
        }
    }

    fn render_header(&mut self, ctx: &egui::Context, now: Instant) {
        TopBottomPanel::top("header").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let theme_btn = ui.add(Button::new({
                    if self.config.theme == config::Theme::Dark {
                        "🌞"
                    } else {
                        "🌙"
                    }
                }));
                if theme_btn.clicked() {
                    self.config.theme = !self.config.theme;
                }
                if let Some(finish) = self.countdown.finishes_at(now, chrono::Local::now()) {
                    ui.label(format!(
                        "Rings at {}",
                        finish.format(&self.config.time_format)
                    ));
                }
                ui.with_layout(Layout::right_to_left(egui::Align::Min), |ui| {
                    if ui.button("⚙").on_hover_text("settings").clicked() {
                        self.in_config = true;
                    }
                });
            });
        });
    }

    fn render_timer(&mut self, ctx: &egui::Context) {
        CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered_justified(|ui| {
                ui.spacing_mut().item_spacing.y = 10.0;
                ui.add(
                    TextEdit::singleline(&mut self.duration_text)
                        .hint_text("Enter duration in seconds"),
                );
                ui.label(self.countdown.label());
                ui.add(
                    egui::Slider::new(&mut self.volume, 0..=100)
                        .suffix("%")
                        .text("volume"),
                );
                let label = if self.countdown.is_running() {
                    "Stop"
                } else {
                    "Start"
                };
                if ui.button(label).clicked() {
                    self.toggle(Instant::now());
                }
            });
        });
    }

    fn render_error(&mut self, ctx: &egui::Context) {
        let Some(message) = &self.error else {
            return;
        };
        let mut close = false;
        Window::new("Error")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(format!("Error: {message}"));
                close = ui.button("Close").clicked();
            });
        if close {
            self.error = None;
        }
    }

    fn render_settings(&mut self, ctx: &egui::Context) {
        let mut open = self.in_config;
        Window::new("settings ⚙").open(&mut open).show(ctx, |ui| {
            let alarm = &mut self.config.alarm;
            ComboBox::from_label("alarm")
                .selected_text(alarm.strategy.to_string())
                .show_ui(ui, |ui| {
                    for strategy in AlarmStrategy::ALL {
                        ui.selectable_value(&mut alarm.strategy, strategy, strategy.to_string());
                    }
                });
            match alarm.strategy {
                AlarmStrategy::External => {
                    ui.horizontal(|ui| {
                        ui.label("player");
                        ui.text_edit_singleline(&mut alarm.player);
                    });
                    render_sound_picker(ui, &mut alarm.sound);
                }
                AlarmStrategy::SoundFile => render_sound_picker(ui, &mut alarm.sound),
                AlarmStrategy::Tone => {
                    ui.add(
                        egui::Slider::new(&mut alarm.frequency, 100.0..=4000.0)
                            .integer()
                            .suffix(" Hz")
                            .text("pitch"),
                    );
                    ui.add(
                        egui::Slider::new(&mut alarm.duration_ms, 50..=2000)
                            .suffix(" ms")
                            .text("length"),
                    );
                }
            }
            ui.horizontal(|ui| {
                if ui.button("test alarm").clicked() {
                    self.alarm.configure(self.config.alarm.clone());
                    self.alarm.ring(self.volume);
                }
                if ui.button("save").clicked() {
                    self.alarm.configure(self.config.alarm.clone());
                    self.save();
                }
            });
        });
        self.in_config = open;
    }
}

fn render_sound_picker(ui: &mut egui::Ui, sound: &mut std::path::PathBuf) {
    ui.horizontal(|ui| {
        ui.label(sound.display().to_string());
        if ui.button("pick").clicked() {
            let file_dialog = rfd::FileDialog::new()
                .set_title("Pick alarm sound")
                .add_filter("audio", &["mp3", "wav", "ogg", "flac"]);
            let file_dialog = match directories::UserDirs::new()
                .and_then(|u| u.audio_dir().map(Path::to_path_buf))
            {
                Some(audio_path) => file_dialog.set_directory(audio_path),
                None => file_dialog,
            };
            if let Some(path) = file_dialog.pick_file() {
                log::info!("alarm sound set to {}", path.display());
                *sound = path;
            }
        }
    });
}

impl eframe::App for FocusTimer {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        self.handle_ticks(now);

        ctx.set_visuals(self.config.theme.into());
        if self.in_config {
            self.render_settings(ctx);
        }
        self.render_error(ctx);
        self.render_header(ctx, now);
        self.render_timer(ctx);

        // wake up for the next tick even if nothing else happens
        if let Some(wait) = self.countdown.until_next_tick(now) {
            ctx.request_repaint_after(wait);
        }
    }
}
