//! Desktop front end built on eframe/egui.
//!
//! Detection runs on a tokio runtime owned by the app. Workers never touch
//! widget state: they send a [`WorkerMessage`] back over a channel and the
//! UI thread applies it on the next frame.

mod settings;

pub use settings::{SettingsAction, SettingsDraft};

use crate::models::{BatchReport, DetectionResult};
use crate::services::config_store::{AppConfig, ConfigStore, UiConfig};
use crate::services::detection::{detect_directory, Detector};
use crate::services::providers::build_classifier;
use crate::LoggingOptions;
use eframe::egui::{self, Color32, RichText, TextStyle};
use std::fmt;
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    Text,
    File,
    Batch,
}

impl Tab {
    const ALL: [Tab; 3] = [Tab::Text, Tab::File, Tab::Batch];

    fn title(self) -> &'static str {
        match self {
            Tab::Text => "Text Input",
            Tab::File => "File Input",
            Tab::Batch => "Batch Processing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Ready,
    Analyzing,
    Complete,
    Failed,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Ready => "Ready",
            Status::Analyzing => "Analyzing...",
            Status::Complete => "Analysis complete",
            Status::Failed => "Error occurred",
        })
    }
}

enum WorkerMessage {
    Single {
        tab: Tab,
        outcome: Result<DetectionResult, String>,
    },
    Batch(Result<BatchReport, String>),
}

struct Dialog {
    title: &'static str,
    message: String,
}

pub struct DetectorApp {
    store: ConfigStore,
    config: AppConfig,
    detector: Arc<Detector>,
    runtime: tokio::runtime::Runtime,
    tx: Sender<WorkerMessage>,
    rx: Receiver<WorkerMessage>,

    tab: Tab,
    status: Status,
    pending: usize,
    dialog: Option<Dialog>,
    settings: Option<SettingsDraft>,

    text_input: String,
    text_result: String,
    file_path: Option<PathBuf>,
    file_result: String,
    batch_dir: Option<PathBuf>,
    batch_lines: Vec<String>,
}

/// Open the main window; blocks until it is closed
pub fn run() -> eframe::Result {
    let store = ConfigStore::from_env();
    crate::init_logging(&LoggingOptions::default());
    let config = store.load_or_default();
    crate::schedule_log_cleanup(config.security.log_retention_days);

    let ui = &config.ui;
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("AI Text Detector")
            .with_inner_size([ui.window_size.width as f32, ui.window_size.height as f32])
            .with_min_inner_size([ui.min_window_size.width as f32, ui.min_window_size.height as f32]),
        ..Default::default()
    };

    eframe::run_native(
        "AI Text Detector",
        options,
        Box::new(|cc| {
            apply_style(&cc.egui_ctx, &config.ui);
            Ok(Box::new(DetectorApp::new(store, config)?))
        }),
    )
}

/// Theme and font size from the `ui` config section
fn apply_style(ctx: &egui::Context, ui: &UiConfig) {
    ctx.set_visuals(if ui.theme == "dark" {
        egui::Visuals::dark()
    } else {
        egui::Visuals::light()
    });

    let base = ui.font_size as f32;
    ctx.style_mut(|style| {
        for (text_style, font) in style.text_styles.iter_mut() {
            font.size = match text_style {
                TextStyle::Heading => base * 1.5,
                TextStyle::Small => base * 0.8,
                _ => base,
            };
        }
    });
}

fn single_result_text(result: &DetectionResult) -> String {
    let mut text = format!("Result: {}", result.summary());
    if result.uncertain {
        text.push_str(" (low confidence)");
    }
    text
}

fn batch_result_lines(report: &BatchReport) -> Vec<String> {
    let mut lines: Vec<String> = report.files.iter().map(|f| f.summary_line()).collect();
    if report.files.is_empty() {
        lines.push("No matching files found".to_string());
    }
    lines.push(String::new());
    lines.push(format!(
        "Summary: {} AI, {} Human, {} errors",
        report.ai_count, report.human_count, report.error_count
    ));
    lines
}

impl DetectorApp {
    fn new(store: ConfigStore, config: AppConfig) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("detector-worker")
            .enable_all()
            .build()?;
        let detector = Arc::new(Detector::new(config.clone(), build_classifier(&config)?));
        info!(backend = detector.classifier_name(), "gui.ready");
        let (tx, rx) = channel();

        Ok(Self {
            store,
            config,
            detector,
            runtime,
            tx,
            rx,
            tab: Tab::Text,
            status: Status::Ready,
            pending: 0,
            dialog: None,
            settings: None,
            text_input: String::new(),
            text_result: String::new(),
            file_path: None,
            file_result: String::new(),
            batch_dir: None,
            batch_lines: Vec::new(),
        })
    }

    fn warn_user(&mut self, message: impl Into<String>) {
        self.dialog = Some(Dialog {
            title: "Warning",
            message: message.into(),
        });
    }

    fn start(&mut self) {
        self.pending += 1;
        self.status = Status::Analyzing;
    }

    fn analyze_text(&mut self, ctx: &egui::Context) {
        let text = self.text_input.trim().to_string();
        if text.is_empty() {
            self.warn_user("Please enter some text to analyze.");
            return;
        }
        self.start();
        self.text_result = "Analyzing...".to_string();

        let (detector, tx, ctx) = (Arc::clone(&self.detector), self.tx.clone(), ctx.clone());
        self.runtime.spawn(async move {
            let outcome = detector.detect(&text).await.map_err(|e| e.to_string());
            let _ = tx.send(WorkerMessage::Single { tab: Tab::Text, outcome });
            ctx.request_repaint();
        });
    }

    fn analyze_file(&mut self, ctx: &egui::Context) {
        let Some(path) = self.file_path.clone() else {
            self.warn_user("Please select a file first.");
            return;
        };
        self.start();
        self.file_result = "Analyzing...".to_string();

        let (detector, tx, ctx) = (Arc::clone(&self.detector), self.tx.clone(), ctx.clone());
        self.runtime.spawn(async move {
            let outcome = detector.detect_file(&path).await.map_err(|e| e.to_string());
            let _ = tx.send(WorkerMessage::Single { tab: Tab::File, outcome });
            ctx.request_repaint();
        });
    }

    fn analyze_directory(&mut self, ctx: &egui::Context) {
        let Some(dir) = self.batch_dir.clone() else {
            self.warn_user("Please select a directory first.");
            return;
        };
        self.start();
        self.batch_lines = vec!["Analyzing...".to_string()];

        let (detector, tx, ctx) = (Arc::clone(&self.detector), self.tx.clone(), ctx.clone());
        self.runtime.spawn(async move {
            let outcome = detect_directory(detector, &dir).await.map_err(|e| e.to_string());
            let _ = tx.send(WorkerMessage::Batch(outcome));
            ctx.request_repaint();
        });
    }

    /// Apply finished worker results on the UI thread
    fn drain_results(&mut self) {
        while let Ok(message) = self.rx.try_recv() {
            self.pending = self.pending.saturating_sub(1);
            let failed = match message {
                WorkerMessage::Single { tab, outcome } => {
                    let (text, failed) = match outcome {
                        Ok(result) => (single_result_text(&result), false),
                        Err(e) => (format!("Error: {}", e), true),
                    };
                    match tab {
                        Tab::File => self.file_result = text,
                        _ => self.text_result = text,
                    }
                    failed
                }
                WorkerMessage::Batch(Ok(report)) => {
                    self.batch_lines = batch_result_lines(&report);
                    false
                }
                WorkerMessage::Batch(Err(e)) => {
                    self.batch_lines = vec![format!("Error: {}", e)];
                    true
                }
            };

            if failed {
                self.status = Status::Failed;
            } else if self.pending == 0 {
                self.status = Status::Complete;
            }
        }
    }

    fn pick_file(&mut self) {
        let extensions: Vec<String> = self
            .config
            .security
            .allowed_file_types
            .iter()
            .map(|e| e.trim_start_matches('.').to_string())
            .collect();
        if let Some(path) = rfd::FileDialog::new()
            .set_title("Select File")
            .add_filter("Allowed files", extensions.as_slice())
            .pick_file()
        {
            self.file_path = Some(path);
            self.file_result.clear();
        }
    }

    fn pick_directory(&mut self) {
        if let Some(dir) = rfd::FileDialog::new().set_title("Select Directory").pick_folder() {
            self.batch_dir = Some(dir);
            self.batch_lines.clear();
        }
    }

    fn handle_settings(&mut self, ctx: &egui::Context, action: SettingsAction) {
        match action {
            SettingsAction::Cancel => self.settings = None,
            SettingsAction::Reset => self.settings = Some(SettingsDraft::from_config(&AppConfig::default())),
            SettingsAction::Save => {
                let Some(draft) = &self.settings else {
                    return;
                };
                let updated = match draft.apply_to(&self.config) {
                    Ok(updated) => updated,
                    Err(errors) => {
                        self.warn_user(format!("Invalid settings:\n{}", errors.join("\n")));
                        return;
                    }
                };
                if let Err(e) = self.store.save(&updated) {
                    error!(error = %e, "settings.save_failed");
                    self.warn_user(format!("Failed to save settings: {}", e));
                    return;
                }
                match build_classifier(&updated) {
                    Ok(classifier) => {
                        self.detector = Arc::new(Detector::new(updated.clone(), classifier));
                    }
                    Err(e) => {
                        error!(error = %e, "settings.detector_rebuild_failed");
                        self.warn_user(format!("Settings saved but the detector could not be rebuilt: {}", e));
                    }
                }
                apply_style(ctx, &updated.ui);
                info!(path = %self.store.config_file().display(), "settings.saved");
                self.config = updated;
                self.settings = None;
            }
        }
    }

    fn text_tab(&mut self, ui: &mut egui::Ui) {
        ui.label("Enter text to analyze:");
        egui::ScrollArea::vertical().max_height((ui.available_height() - 80.0).max(120.0)).show(ui, |ui| {
            ui.add(
                egui::TextEdit::multiline(&mut self.text_input)
                    .desired_rows(12)
                    .desired_width(f32::INFINITY),
            );
        });
        ui.add_space(6.0);
        if ui.button("Analyze").clicked() {
            self.analyze_text(ui.ctx());
        }
        ui.label(RichText::new(&self.text_result).strong());
    }

    fn file_tab(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if ui.button("Select File").clicked() {
                self.pick_file();
            }
            let mut shown = self
                .file_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            ui.add_enabled(false, egui::TextEdit::singleline(&mut shown).desired_width(f32::INFINITY));
        });
        ui.add_space(6.0);
        if ui.button("Analyze").clicked() {
            self.analyze_file(ui.ctx());
        }
        ui.label(RichText::new(&self.file_result).strong());
    }

    fn batch_tab(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if ui.button("Select Directory").clicked() {
                self.pick_directory();
            }
            let mut shown = self
                .batch_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            ui.add_enabled(false, egui::TextEdit::singleline(&mut shown).desired_width(f32::INFINITY));
        });
        ui.add_space(6.0);
        if ui.button("Analyze").clicked() {
            self.analyze_directory(ui.ctx());
        }
        ui.separator();
        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for line in &self.batch_lines {
                    let text = if line.contains(": Error - ") || line.starts_with("Error:") {
                        RichText::new(line).color(Color32::RED)
                    } else {
                        RichText::new(line)
                    };
                    ui.label(text);
                }
            });
    }

    fn show_dialog(&mut self, ctx: &egui::Context) {
        let Some(dialog) = &self.dialog else {
            return;
        };
        let mut close = false;
        egui::Window::new(dialog.title)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(&dialog.message);
                ui.add_space(6.0);
                if ui.button("OK").clicked() {
                    close = true;
                }
            });
        if close {
            self.dialog = None;
        }
    }
}

impl eframe::App for DetectorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_results();

        egui::TopBottomPanel::top("tabs").show(ctx, |ui| {
            ui.horizontal(|ui| {
                for tab in Tab::ALL {
                    ui.selectable_value(&mut self.tab, tab, tab.title());
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("Settings").clicked() && self.settings.is_none() {
                        self.settings = Some(SettingsDraft::from_config(&self.config));
                    }
                });
            });
        });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            let color = match self.status {
                Status::Failed => Color32::RED,
                _ => ui.visuals().text_color(),
            };
            ui.label(RichText::new(self.status.to_string()).color(color));
        });

        egui::CentralPanel::default().show(ctx, |ui| match self.tab {
            Tab::Text => self.text_tab(ui),
            Tab::File => self.file_tab(ui),
            Tab::Batch => self.batch_tab(ui),
        });

        if let Some(action) = self.settings.as_mut().and_then(|draft| draft.show(ctx)) {
            self.handle_settings(ctx, action);
        }
        self.show_dialog(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FileDetection, Label, ModelScores, TextStatistics};

    fn result(label: Label, confidence: f64, uncertain: bool) -> DetectionResult {
        DetectionResult {
            request_id: "r".to_string(),
            label,
            confidence,
            ai_probability: if label == Label::Ai { confidence } else { 1.0 - confidence },
            uncertain,
            scores: ModelScores {
                primary: 0.5,
                secondary: None,
            },
            statistics: TextStatistics::default(),
            adjustments: Vec::new(),
            latency_ms: 1,
        }
    }

    #[test]
    fn test_status_texts() {
        let texts: Vec<String> = [Status::Ready, Status::Analyzing, Status::Complete, Status::Failed]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(texts, vec!["Ready", "Analyzing...", "Analysis complete", "Error occurred"]);
    }

    #[test]
    fn test_result_texts() {
        assert_eq!(single_result_text(&result(Label::Ai, 0.87, false)), "Result: AI (Confidence: 87.00%)");
        assert_eq!(
            single_result_text(&result(Label::Human, 0.6, true)),
            "Result: Human (Confidence: 60.00%) (low confidence)"
        );

        let report = BatchReport::summarize(vec![
            FileDetection {
                path: PathBuf::from("a.txt"),
                file_name: "a.txt".to_string(),
                result: Some(result(Label::Ai, 0.87, false)),
                error: None,
            },
            FileDetection {
                path: PathBuf::from("b.txt"),
                file_name: "b.txt".to_string(),
                result: None,
                error: Some("boom".to_string()),
            },
        ]);
        assert_eq!(
            batch_result_lines(&report),
            vec![
                "a.txt: AI (Confidence: 87.00%)",
                "b.txt: Error - boom",
                "",
                "Summary: 1 AI, 0 Human, 1 errors"
            ]
        );
    }
}
