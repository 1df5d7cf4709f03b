// Settings Window
// Editable copy of the configuration; nothing touches the live config until Save

use crate::models::ModelRole;
use crate::services::config_store::{AppConfig, ModelConfig};
use eframe::egui::{self, Ui};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsAction {
    Save,
    Cancel,
    Reset,
}

#[derive(Debug, Clone, PartialEq)]
struct ModelDraft {
    model_name: String,
    max_length: usize,
    truncation: bool,
}

impl ModelDraft {
    fn from_config(model: &ModelConfig) -> Self {
        Self {
            model_name: model.model_name.clone(),
            max_length: model.max_length,
            truncation: model.truncation,
        }
    }

    fn apply(&self, model: &mut ModelConfig) {
        model.model_name = self.model_name.trim().to_string();
        model.max_length = self.max_length;
        model.truncation = self.truncation;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SettingsDraft {
    max_text_length: usize,
    /// Shown in MB, stored in bytes
    max_file_size_mb: f64,
    rate_limit: u32,
    /// Comma separated, e.g. `.txt, .md`
    allowed_file_types: String,
    log_retention_days: u32,
    gpt2: ModelDraft,
    roberta: ModelDraft,
    theme: String,
    font_size: u32,
    confidence_threshold: f64,
    min_text_length: usize,
    batch_size: usize,
}

impl SettingsDraft {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_text_length: config.security.max_text_length,
            max_file_size_mb: config.security.max_file_size as f64 / BYTES_PER_MB,
            rate_limit: config.security.rate_limit,
            allowed_file_types: config.security.allowed_file_types.join(", "),
            log_retention_days: config.security.log_retention_days,
            gpt2: ModelDraft::from_config(&config.models.gpt2),
            roberta: ModelDraft::from_config(&config.models.roberta),
            theme: config.ui.theme.clone(),
            font_size: config.ui.font_size,
            confidence_threshold: config.analysis.confidence_threshold,
            min_text_length: config.analysis.min_text_length,
            batch_size: config.analysis.batch_size,
        }
    }

    /// Overlay the draft on `base` and validate the result. Keys the window
    /// does not edit (window sizes, inference) are carried over from `base`.
    pub fn apply_to(&self, base: &AppConfig) -> Result<AppConfig, Vec<String>> {
        let mut config = base.clone();

        config.security.max_text_length = self.max_text_length;
        config.security.max_file_size = (self.max_file_size_mb * BYTES_PER_MB).round().max(0.0) as u64;
        config.security.rate_limit = self.rate_limit;
        config.security.allowed_file_types = parse_file_types(&self.allowed_file_types);
        config.security.log_retention_days = self.log_retention_days;

        self.gpt2.apply(&mut config.models.gpt2);
        self.roberta.apply(&mut config.models.roberta);

        config.ui.theme = self.theme.clone();
        config.ui.font_size = self.font_size;

        config.analysis.confidence_threshold = self.confidence_threshold;
        config.analysis.min_text_length = self.min_text_length;
        config.analysis.batch_size = self.batch_size;

        config.validate()?;
        Ok(config)
    }

    /// Draw the window. Returns the button the user pressed this frame.
    pub fn show(&mut self, ctx: &egui::Context) -> Option<SettingsAction> {
        let mut action = None;
        let mut open = true;

        egui::Window::new("Settings")
            .open(&mut open)
            .collapsible(false)
            .resizable(true)
            .default_width(420.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().max_height(420.0).show(ui, |ui| {
                    self.security_section(ui);
                    self.models_section(ui);
                    self.ui_section(ui);
                    self.analysis_section(ui);
                });

                ui.separator();
                ui.horizontal(|ui| {
                    if ui.button("Save").clicked() {
                        action = Some(SettingsAction::Save);
                    }
                    if ui.button("Cancel").clicked() {
                        action = Some(SettingsAction::Cancel);
                    }
                    if ui.button("Reset to Defaults").clicked() {
                        action = Some(SettingsAction::Reset);
                    }
                });
            });

        if !open {
            action = Some(SettingsAction::Cancel);
        }
        action
    }

    fn security_section(&mut self, ui: &mut Ui) {
        egui::CollapsingHeader::new("Security")
            .default_open(true)
            .show(ui, |ui| {
                egui::Grid::new("security_grid").num_columns(2).show(ui, |ui| {
                    ui.label("Max text length");
                    ui.add(egui::DragValue::new(&mut self.max_text_length).range(1..=1_000_000));
                    ui.end_row();

                    ui.label("Max file size (MB)");
                    ui.add(
                        egui::DragValue::new(&mut self.max_file_size_mb)
                            .range(0.1..=100.0)
                            .speed(0.1)
                            .max_decimals(2),
                    );
                    ui.end_row();

                    ui.label("Requests per minute");
                    ui.add(egui::DragValue::new(&mut self.rate_limit).range(1..=10_000));
                    ui.end_row();

                    ui.label("Allowed file types");
                    ui.text_edit_singleline(&mut self.allowed_file_types);
                    ui.end_row();

                    ui.label("Log retention (days)");
                    ui.add(egui::DragValue::new(&mut self.log_retention_days).range(1..=3650));
                    ui.end_row();
                });
            });
    }

    fn models_section(&mut self, ui: &mut Ui) {
        egui::CollapsingHeader::new("Models")
            .default_open(false)
            .show(ui, |ui| {
                for (role, model) in [
                    (ModelRole::Primary, &mut self.roberta),
                    (ModelRole::Secondary, &mut self.gpt2),
                ] {
                    ui.strong(model_heading(role));
                    egui::Grid::new(("model_grid", role)).num_columns(2).show(ui, |ui| {
                        ui.label("Model name");
                        ui.text_edit_singleline(&mut model.model_name);
                        ui.end_row();

                        ui.label("Max length (tokens)");
                        ui.add(egui::DragValue::new(&mut model.max_length).range(1..=4096));
                        ui.end_row();

                        ui.label("Truncation");
                        ui.checkbox(&mut model.truncation, "");
                        ui.end_row();
                    });
                    ui.add_space(4.0);
                }
            });
    }

    fn ui_section(&mut self, ui: &mut Ui) {
        egui::CollapsingHeader::new("UI")
            .default_open(false)
            .show(ui, |ui| {
                egui::Grid::new("ui_grid").num_columns(2).show(ui, |ui| {
                    ui.label("Theme");
                    egui::ComboBox::from_id_salt("theme")
                        .selected_text(&self.theme)
                        .show_ui(ui, |ui| {
                            ui.selectable_value(&mut self.theme, "light".to_string(), "light");
                            ui.selectable_value(&mut self.theme, "dark".to_string(), "dark");
                        });
                    ui.end_row();

                    ui.label("Font size");
                    ui.add(egui::DragValue::new(&mut self.font_size).range(8..=32));
                    ui.end_row();
                });
            });
    }

    fn analysis_section(&mut self, ui: &mut Ui) {
        egui::CollapsingHeader::new("Analysis")
            .default_open(false)
            .show(ui, |ui| {
                egui::Grid::new("analysis_grid").num_columns(2).show(ui, |ui| {
                    ui.label("Confidence threshold");
                    ui.add(egui::Slider::new(&mut self.confidence_threshold, 0.0..=1.0));
                    ui.end_row();

                    ui.label("Min text length");
                    ui.add(egui::DragValue::new(&mut self.min_text_length).range(1..=10_000));
                    ui.end_row();

                    ui.label("Batch size");
                    ui.add(egui::DragValue::new(&mut self.batch_size).range(1..=100));
                    ui.end_row();
                });
            });
    }
}

/// Detection reads `models.roberta` as the primary model and
/// `models.gpt2` as the secondary one
fn model_heading(role: ModelRole) -> &'static str {
    match role {
        ModelRole::Primary => "Primary detector (roberta)",
        ModelRole::Secondary => "Secondary ranker (gpt2)",
    }
}

/// `".txt, md ,"` -> `[".txt", ".md"]`
fn parse_file_types(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            let ext = s.trim_start_matches('.').to_lowercase();
            format!(".{}", ext)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untouched_draft_reproduces_config() {
        let config = AppConfig::default();
        let draft = SettingsDraft::from_config(&config);
        assert_eq!(draft.max_file_size_mb, 1.0);
        assert_eq!(draft.allowed_file_types, ".txt");
        assert_eq!(draft.apply_to(&config).unwrap(), config);
    }

    #[test]
    fn test_model_headings_follow_detection_roles() {
        assert!(model_heading(ModelRole::Primary).contains("roberta"));
        assert!(model_heading(ModelRole::Secondary).contains("gpt2"));
    }

    #[test]
    fn test_edits_are_converted_and_validated() {
        let base = AppConfig::default();
        let mut draft = SettingsDraft::from_config(&base);
        draft.max_file_size_mb = 2.5;
        draft.allowed_file_types = "txt, .PDF ,".to_string();
        draft.theme = "dark".to_string();
        draft.log_retention_days = 7;

        let updated = draft.apply_to(&base).unwrap();
        assert_eq!(updated.security.max_file_size, 2_621_440);
        assert_eq!(updated.security.allowed_file_types, vec![".txt", ".pdf"]);
        assert_eq!(updated.ui.theme, "dark");
        assert_eq!(updated.security.log_retention_days, 7);
        assert_eq!(updated.ui.window_size, base.ui.window_size);

        draft.allowed_file_types = " , ".to_string();
        draft.gpt2.model_name = "  ".to_string();
        draft.log_retention_days = 0;
        let errors = draft.apply_to(&base).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
