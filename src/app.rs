//! egui rendering of the [`Shell`].
//!
//! Widgets read shell state and forward clicks; they never touch the worker.

use std::time::Duration;

use eframe::egui;
use tracing::debug;

use crate::{
    backend::Backend,
    shell::{NoticeKind, Phase, Shell},
};

pub const WINDOW_TITLE: &str = "Kokoro TTS";

/// Fallback repaint interval while a run is active.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct KokoroApp<B: Backend> {
    shell: Shell<B>,
}

impl<B: Backend> KokoroApp<B> {
    /// Hook the shell's waker to this window's repaint.
    pub fn new(cc: &eframe::CreationContext<'_>, shell: Shell<B>) -> Self {
        let ctx = cc.egui_ctx.clone();
        Self { shell: shell.with_waker(move || ctx.request_repaint()) }
    }

    fn voice_selector(&mut self, ui: &mut egui::Ui) {
        let names: Vec<String> = self.shell.catalog().display_names().map(String::from).collect();
        let idle = self.shell.phase() == Phase::Idle;
        ui.add_enabled_ui(idle, |ui| {
            egui::ComboBox::from_id_salt("voice")
                .selected_text(self.shell.selected_voice.as_str())
                .width(240.0)
                .show_ui(ui, |ui| {
                    for name in &names {
                        ui.selectable_value(&mut self.shell.selected_voice, name.clone(), name);
                    }
                });
        });
    }

    fn text_input(&mut self, ui: &mut egui::Ui) {
        let idle = self.shell.phase() == Phase::Idle;
        let height = (ui.available_height() - 110.0).max(120.0);
        egui::ScrollArea::vertical().max_height(height).show(ui, |ui| {
            ui.add_enabled(
                idle,
                egui::TextEdit::multiline(&mut self.shell.text)
                    .desired_rows(10)
                    .desired_width(f32::INFINITY),
            );
        });
    }

    fn status_and_controls(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if self.shell.is_finishing() {
                ui.spinner();
            }
            ui.label(self.shell.status());
        });
        if self.shell.phase() == Phase::Generating {
            let text = match self.shell.progress() {
                Some((current, total)) if total > 0 => format!("{current} / {total}"),
                _ => String::new(),
            };
            ui.add(egui::ProgressBar::new(self.shell.progress_fraction()).text(text));
        } else {
            ui.add_space(ui.spacing().interact_size.y);
        }

        ui.add_space(10.0);
        ui.horizontal(|ui| {
            ui.strong(format!("Characters: {}", self.shell.char_count()));
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let enabled = !self.shell.is_finishing();
                let button = ui.add_enabled(enabled, egui::Button::new(self.shell.button_label()));
                if button.clicked() {
                    // Rejections are surfaced through the shell's notice or status.
                    if let Err(e) = self.shell.toggle() {
                        debug!("start rejected: {e}");
                    }
                }
            });
        });
    }

    fn notice_window(&mut self, ctx: &egui::Context) {
        let Some(notice) = self.shell.notice().cloned() else {
            return;
        };
        let mut dismissed = false;
        egui::Window::new(notice.title.as_str())
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                match notice.kind {
                    NoticeKind::Info => ui.label(notice.message.as_str()),
                    NoticeKind::Error => {
                        ui.colored_label(ui.visuals().error_fg_color, notice.message.as_str())
                    }
                };
                ui.add_space(8.0);
                if ui.button("OK").clicked() {
                    dismissed = true;
                }
            });
        if dismissed {
            self.shell.dismiss_notice();
        }
    }
}

impl<B: Backend> eframe::App for KokoroApp<B> {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.shell.poll();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| ui.heading("Kokoro Text-to-Speech"));
            ui.add_space(20.0);

            ui.group(|ui| {
                ui.strong("Voice Selection");
                self.voice_selector(ui);
            });
            ui.add_space(10.0);

            ui.group(|ui| {
                ui.strong("Input Text");
                self.text_input(ui);
            });
            ui.add_space(10.0);

            self.status_and_controls(ui);
        });

        self.notice_window(ctx);

        if self.shell.is_busy() {
            ctx.request_repaint_after(POLL_INTERVAL);
        }
    }
}
