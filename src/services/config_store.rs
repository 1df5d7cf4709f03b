// Configuration Storage Service
// Handles config file read/write, dotted-key access and version backup

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub security: SecurityConfig,
    pub models: ModelsConfig,
    pub ui: UiConfig,
    pub analysis: AnalysisConfig,
    pub inference: InferenceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SecurityConfig {
    #[serde(default = "default_max_text_length")]
    pub max_text_length: usize,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,
    #[serde(default = "default_allowed_file_types")]
    pub allowed_file_types: Vec<String>,
    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_text_length: 10_000,
            max_file_size: 1024 * 1024,
            rate_limit: 100,
            allowed_file_types: default_allowed_file_types(),
            log_retention_days: 30,
        }
    }
}

impl SecurityConfig {
    /// Case-insensitive check against `allowed_file_types`.
    pub fn allows_extension(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().map(|e| e.to_string_lossy().to_lowercase()) else {
            return false;
        };
        self.allowed_file_types
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(&ext))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    pub model_name: String,
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    #[serde(default = "default_true")]
    pub truncation: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelsConfig {
    #[serde(default = "default_gpt2_model")]
    pub gpt2: ModelConfig,
    #[serde(default = "default_roberta_model")]
    pub roberta: ModelConfig,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            gpt2: default_gpt2_model(),
            roberta: default_roberta_model(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UiConfig {
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    #[serde(default = "default_window_size")]
    pub window_size: WindowSize,
    #[serde(default = "default_min_window_size")]
    pub min_window_size: WindowSize,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            theme: default_theme(),
            font_size: 12,
            window_size: default_window_size(),
            min_window_size: default_min_window_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisConfig {
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    #[serde(default = "default_min_text_length")]
    pub min_text_length: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            min_text_length: 10,
            batch_size: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum InferenceBackend {
    /// Hosted inference API
    #[default]
    Remote,
    /// Offline stylometric scorer
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InferenceConfig {
    #[serde(default)]
    pub backend: InferenceBackend,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            backend: InferenceBackend::Remote,
            base_url: default_base_url(),
            api_token: None,
            timeout_secs: 60,
        }
    }
}

fn default_max_text_length() -> usize { 10_000 }
fn default_max_file_size() -> u64 { 1024 * 1024 }
fn default_rate_limit() -> u32 { 100 }
fn default_allowed_file_types() -> Vec<String> { vec![".txt".to_string()] }
fn default_log_retention_days() -> u32 { 30 }
fn default_max_length() -> usize { 512 }
fn default_true() -> bool { true }
fn default_theme() -> String { "light".to_string() }
fn default_font_size() -> u32 { 12 }
fn default_window_size() -> WindowSize { WindowSize { width: 800, height: 600 } }
fn default_min_window_size() -> WindowSize { WindowSize { width: 600, height: 400 } }
fn default_confidence_threshold() -> f64 { 0.7 }
fn default_min_text_length() -> usize { 10 }
fn default_batch_size() -> usize { 10 }
fn default_base_url() -> String { "https://router.huggingface.co/hf-inference/models".to_string() }
fn default_timeout_secs() -> u64 { 60 }

fn default_gpt2_model() -> ModelConfig {
    ModelConfig {
        model_name: "microsoft/DialogRPT-human-vs-rand".to_string(),
        max_length: 512,
        truncation: true,
    }
}

fn default_roberta_model() -> ModelConfig {
    ModelConfig {
        model_name: "roberta-base-openai-detector".to_string(),
        max_length: 512,
        truncation: true,
    }
}

impl AppConfig {
    /// Look up a value by dotted key, e.g. `security.rate_limit`
    pub fn get(&self, key: &str) -> Option<Value> {
        let root = serde_json::to_value(self).ok()?;
        key.split('.')
            .try_fold(&root, |node, part| node.get(part))
            .cloned()
    }

    /// Update a value by dotted key. The config is left untouched when the
    /// key is unknown or the new value does not type-check or validate.
    pub fn set(&mut self, key: &str, value: Value) -> Result<(), String> {
        let mut root = serde_json::to_value(&*self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        let mut node = &mut root;
        for part in key.split('.') {
            node = node
                .get_mut(part)
                .ok_or_else(|| format!("Unknown config key: {}", key))?;
        }
        *node = value;

        let updated: AppConfig = serde_json::from_value(root)
            .map_err(|e| format!("Invalid value for {}: {}", key, e))?;
        updated.validate().map_err(|errors| errors.join("; "))?;

        *self = updated;
        Ok(())
    }

    /// Range checks; returns every violation found
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        let security = &self.security;
        if security.max_text_length == 0 {
            errors.push("security.max_text_length must be > 0".to_string());
        }
        if security.max_file_size == 0 {
            errors.push("security.max_file_size must be > 0".to_string());
        }
        if security.rate_limit == 0 {
            errors.push("security.rate_limit must be > 0".to_string());
        }
        if security.allowed_file_types.is_empty() {
            errors.push("security.allowed_file_types must not be empty".to_string());
        }
        for ext in &security.allowed_file_types {
            if !ext.starts_with('.') || ext.len() < 2 {
                errors.push(format!("security.allowed_file_types: invalid extension {:?}", ext));
            }
        }
        if security.log_retention_days == 0 {
            errors.push("security.log_retention_days must be > 0".to_string());
        }

        for (name, model) in [("gpt2", &self.models.gpt2), ("roberta", &self.models.roberta)] {
            if model.model_name.trim().is_empty() {
                errors.push(format!("models.{}.model_name must not be empty", name));
            }
            if model.max_length == 0 {
                errors.push(format!("models.{}.max_length must be > 0", name));
            }
        }

        let ui = &self.ui;
        if ui.theme != "light" && ui.theme != "dark" {
            errors.push(format!("ui.theme must be \"light\" or \"dark\", got {:?}", ui.theme));
        }
        if ui.font_size == 0 {
            errors.push("ui.font_size must be > 0".to_string());
        }
        if ui.window_size.width == 0 || ui.window_size.height == 0 {
            errors.push("ui.window_size must be positive".to_string());
        }
        if ui.min_window_size.width == 0 || ui.min_window_size.height == 0 {
            errors.push("ui.min_window_size must be positive".to_string());
        }

        let analysis = &self.analysis;
        if !(0.0..=1.0).contains(&analysis.confidence_threshold) {
            errors.push("analysis.confidence_threshold must be within [0, 1]".to_string());
        }
        if analysis.min_text_length == 0 {
            errors.push("analysis.min_text_length must be > 0".to_string());
        }
        if analysis.min_text_length > security.max_text_length {
            errors.push("analysis.min_text_length must not exceed security.max_text_length".to_string());
        }
        if analysis.batch_size == 0 {
            errors.push("analysis.batch_size must be > 0".to_string());
        }

        if self.inference.base_url.trim().is_empty() {
            errors.push("inference.base_url must not be empty".to_string());
        }
        if self.inference.timeout_secs == 0 {
            errors.push("inference.timeout_secs must be > 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Recursively overlay `overlay` onto `base`. Objects merge key by key;
/// any other value replaces what was there.
fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Pretty JSON with 4-space indentation
fn to_pretty_json(config: &AppConfig) -> Result<String, String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    config
        .serialize(&mut ser)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    String::from_utf8(buf).map_err(|e| format!("Failed to serialize config: {}", e))
}

/// Parse a `--set` value: JSON literal when it parses, bare string otherwise
pub fn parse_value_literal(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

pub struct ConfigStore {
    config_dir: PathBuf,
    config_file: PathBuf,
}

impl ConfigStore {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_file = config_dir.join("config.json");
        Self { config_dir, config_file }
    }

    /// Store backed by an explicit file path
    pub fn at(config_file: PathBuf) -> Self {
        let config_dir = config_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self { config_dir, config_file }
    }

    /// Get default config directory
    pub fn default_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("ai-detector"))
    }

    /// `AI_DETECTOR_CONFIG`, then the platform config dir, then `./config.json`
    pub fn from_env() -> Self {
        match std::env::var("AI_DETECTOR_CONFIG") {
            Ok(p) if !p.trim().is_empty() => Self::at(PathBuf::from(p)),
            _ => match Self::default_config_dir() {
                Some(dir) => Self::new(dir),
                None => Self::at(PathBuf::from("config.json")),
            },
        }
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Ensure config directory exists
    pub fn ensure_dir(&self) -> Result<(), String> {
        fs::create_dir_all(&self.config_dir)
            .map_err(|e| format!("Failed to create config dir: {}", e))
    }

    /// Load configuration from file; missing keys take their defaults
    pub fn load(&self) -> Result<AppConfig, String> {
        if !self.config_file.exists() {
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.config_file)
            .map_err(|e| format!("Failed to read config: {}", e))?;
        let user: Value = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config: {}", e))?;

        let mut merged = serde_json::to_value(AppConfig::default())
            .map_err(|e| format!("Failed to serialize defaults: {}", e))?;
        merge_json(&mut merged, user);

        serde_json::from_value(merged)
            .map_err(|e| format!("Failed to parse config: {}", e))
    }

    /// Load configuration, falling back to defaults on any error
    pub fn load_or_default(&self) -> AppConfig {
        match self.load() {
            Ok(config) => {
                debug!(path = %self.config_file.display(), "config.loaded");
                config
            }
            Err(e) => {
                warn!(path = %self.config_file.display(), error = %e, "config.load_failed_using_defaults");
                AppConfig::default()
            }
        }
    }

    /// Save configuration to file
    pub fn save(&self, config: &AppConfig) -> Result<(), String> {
        self.ensure_dir()?;

        // Create backup if file exists
        if self.config_file.exists() {
            self.create_backup()?;
        }

        let content = to_pretty_json(config)?;

        fs::write(&self.config_file, content)
            .map_err(|e| format!("Failed to write config: {}", e))
    }

    /// Set a dotted key and persist
    pub fn set(&self, key: &str, value: Value) -> Result<AppConfig, String> {
        let mut config = self.load()?;
        config.set(key, value)?;
        self.save(&config)?;
        Ok(config)
    }

    /// Create a backup of current config
    fn create_backup(&self) -> Result<(), String> {
        let backup_dir = self.config_dir.join("backups");
        fs::create_dir_all(&backup_dir)
            .map_err(|e| format!("Failed to create backup dir: {}", e))?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S%3f").to_string();
        let mut backup_file = backup_dir.join(format!("config_{}.json", timestamp));
        // Saves within the same millisecond get a sortable suffix
        let mut n = 1;
        while backup_file.exists() {
            backup_file = backup_dir.join(format!("config_{}_{:03}.json", timestamp, n));
            n += 1;
        }

        fs::copy(&self.config_file, &backup_file)
            .map_err(|e| format!("Failed to create backup: {}", e))?;

        // Keep only last 10 backups
        self.cleanup_old_backups(&backup_dir, 10)?;

        Ok(())
    }

    /// Remove old backups, keeping only the most recent N
    fn cleanup_old_backups(&self, backup_dir: &Path, keep: usize) -> Result<(), String> {
        let mut entries: Vec<_> = fs::read_dir(backup_dir)
            .map_err(|e| format!("Failed to read backup dir: {}", e))?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map_or(false, |ext| ext == "json"))
            .collect();

        if entries.len() <= keep {
            return Ok(());
        }

        // Oldest first; names embed the timestamp so they break mtime ties
        entries.sort_by_key(|e| {
            (
                e.metadata()
                    .and_then(|m| m.modified())
                    .unwrap_or(std::time::SystemTime::UNIX_EPOCH),
                e.file_name(),
            )
        });

        for entry in entries.iter().take(entries.len() - keep) {
            let _ = fs::remove_file(entry.path());
        }

        Ok(())
    }
}
