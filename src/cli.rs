//! Command-line front end: argument parsing, dispatch and output rendering.

use crate::models::{BatchReport, DetectionResult};
use crate::services::config_store::{parse_value_literal, ConfigStore, InferenceBackend};
use crate::services::detection::{detect_batch, detect_directory, Detector};
use crate::services::providers::build_classifier;
use crate::LoggingOptions;
use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgGroup, Parser, ValueEnum};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Classify text as AI-generated or human-written
#[derive(Parser, Debug)]
#[command(name = "ai-detector", version, about, long_about = None)]
#[command(group(ArgGroup::new("input").args(["text", "file", "dir", "batch", "interactive"])))]
pub struct Cli {
    /// Text to analyze
    #[arg(long)]
    pub text: Option<String>,

    /// File to analyze
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Analyze every allowed file in a directory (non-recursive)
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Analyze a list of files
    #[arg(long, num_args = 1..)]
    pub batch: Vec<PathBuf>,

    /// Read one text per line from stdin until `quit`
    #[arg(short, long)]
    pub interactive: bool,

    /// Output format for results
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Path to configuration file (JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Use the local stylometric scorer instead of the inference service
    #[arg(long)]
    pub offline: bool,

    /// Print the effective configuration
    #[arg(long)]
    pub show_config: bool,

    /// Update a configuration value and save it, e.g. `security.rate_limit=50`
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub set: Vec<(String, String)>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    fn has_input(&self) -> bool {
        self.text.is_some() || self.file.is_some() || self.dir.is_some() || !self.batch.is_empty() || self.interactive
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {:?}", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err("empty configuration key".to_string());
    }
    Ok((key.to_string(), value.trim().to_string()))
}

/// Entry point used by the `ai-detector` binary
pub async fn run(cli: Cli) -> Result<()> {
    let store = match &cli.config {
        Some(path) => ConfigStore::at(path.clone()),
        None => ConfigStore::from_env(),
    };

    crate::init_logging(&LoggingOptions { verbose: cli.verbose });
    let mut config = store.load_or_default();
    crate::schedule_log_cleanup(config.security.log_retention_days);

    let mut stdout = std::io::stdout().lock();

    for (key, value) in &cli.set {
        config = store
            .set(key, parse_value_literal(value))
            .map_err(|e| anyhow!(e))
            .with_context(|| format!("failed to set {}", key))?;
        info!(key = %key, path = %store.config_file().display(), "config.updated");
        writeln!(stdout, "Updated {} = {}", key, value)?;
    }

    if cli.show_config {
        writeln!(stdout, "{}", serde_json::to_string_pretty(&config)?)?;
    }

    if !cli.has_input() {
        if cli.show_config || !cli.set.is_empty() {
            return Ok(());
        }
        bail!("no input given; use --text, --file, --dir, --batch or --interactive (see --help)");
    }

    if let Err(errors) = config.validate() {
        bail!("invalid configuration in {}:\n  {}", store.config_file().display(), errors.join("\n  "));
    }

    if cli.offline {
        config.inference.backend = InferenceBackend::Local;
    }
    let classifier = build_classifier(&config).context("failed to initialize classifier")?;
    let detector = Arc::new(Detector::new(config, classifier));
    info!(backend = detector.classifier_name(), "detector.ready");

    if let Some(text) = &cli.text {
        let result = detector.detect(text).await?;
        writeln!(stdout, "{}", render_result(&result, cli.format)?)?;
    } else if let Some(path) = &cli.file {
        let result = detector
            .detect_file(path)
            .await
            .with_context(|| format!("failed to analyze {}", path.display()))?;
        writeln!(stdout, "{}", render_result(&result, cli.format)?)?;
    } else if let Some(dir) = &cli.dir {
        let report = detect_directory(Arc::clone(&detector), dir).await?;
        writeln!(stdout, "{}", render_report(&report, cli.format)?)?;
    } else if !cli.batch.is_empty() {
        let report = detect_batch(Arc::clone(&detector), cli.batch.clone()).await;
        writeln!(stdout, "{}", render_report(&report, cli.format)?)?;
    } else if cli.interactive {
        drop(stdout);
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        run_interactive(&detector, cli.format, stdin, std::io::stdout()).await?;
    }

    Ok(())
}

/// One text per line; `quit`, `exit` or EOF ends the session. Errors are
/// reported and the loop continues.
pub async fn run_interactive<R, W>(detector: &Detector, format: OutputFormat, reader: R, mut out: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = reader.lines();
    if format == OutputFormat::Text {
        writeln!(out, "Enter text to analyze (type 'quit' to exit).")?;
    }

    loop {
        if format == OutputFormat::Text {
            write!(out, "> ")?;
            out.flush()?;
        }

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            break;
        }

        match detector.detect(line).await {
            Ok(result) => writeln!(out, "{}", render_result(&result, format)?)?,
            Err(e) => match format {
                OutputFormat::Text => writeln!(out, "Error: {}", e)?,
                OutputFormat::Json => writeln!(out, "{}", serde_json::json!({ "error": e.to_string() }))?,
            },
        }
    }

    Ok(())
}

pub fn render_result(result: &DetectionResult, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(result)?,
        OutputFormat::Text => {
            let mut out = format!("Result: {}", result.summary());
            if result.uncertain {
                out.push_str(" [low confidence]");
            }
            out.push_str(&format!(
                "\n  Readability: {:.1} | Avg token probability: {:.4} | Words: {}",
                result.statistics.readability, result.statistics.avg_token_probability, result.statistics.word_count
            ));
            for note in &result.adjustments {
                out.push_str(&format!("\n  Adjustment: {}", note));
            }
            out
        }
    })
}

pub fn render_report(report: &BatchReport, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(report)?,
        OutputFormat::Text => {
            let mut lines: Vec<String> = report.files.iter().map(|f| f.summary_line()).collect();
            if report.files.is_empty() {
                lines.push("No matching files found".to_string());
            }
            lines.push(format!(
                "\nSummary: {} AI, {} Human, {} errors",
                report.ai_count, report.human_count, report.error_count
            ));
            lines.join("\n")
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::config_store::AppConfig;
    use crate::services::detection::ensemble::tests::StubClassifier;
    use clap::CommandFactory;

    const TEXT: &str = "The city council met on Tuesday to discuss the annual budget for regional parks.";

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_modes_and_format() {
        let cli = Cli::try_parse_from(["ai-detector", "--text", "hello", "--format", "json"]).unwrap();
        assert_eq!(cli.text.as_deref(), Some("hello"));
        assert_eq!(cli.format, OutputFormat::Json);

        let cli = Cli::try_parse_from(["ai-detector", "--batch", "a.txt", "b.txt"]).unwrap();
        assert_eq!(cli.batch, vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")]);
        assert_eq!(cli.format, OutputFormat::Text);
    }

    #[test]
    fn test_input_modes_conflict() {
        assert!(Cli::try_parse_from(["ai-detector", "--text", "x", "--file", "y.txt"]).is_err());
        assert!(Cli::try_parse_from(["ai-detector", "--dir", ".", "--interactive"]).is_err());
        assert!(Cli::try_parse_from(["ai-detector", "--format", "xml", "--text", "x"]).is_err());
    }

    #[test]
    fn test_parse_set_pairs() {
        let cli = Cli::try_parse_from(["ai-detector", "--set", "ui.theme=dark", "--set", "security.rate_limit = 5"]).unwrap();
        assert_eq!(
            cli.set,
            vec![
                ("ui.theme".to_string(), "dark".to_string()),
                ("security.rate_limit".to_string(), "5".to_string())
            ]
        );
        assert!(!cli.has_input());
        assert!(Cli::try_parse_from(["ai-detector", "--set", "novalue"]).is_err());
    }

    #[tokio::test]
    async fn test_interactive_session() {
        let detector = Detector::new(AppConfig::default(), Arc::new(StubClassifier::new(0.9, 0.1)));
        let input = format!("{}\n\n tiny \nquit\n{}\n", TEXT, TEXT);
        let mut out = Vec::new();

        run_interactive(&detector, OutputFormat::Text, input.as_bytes(), &mut out)
            .await
            .unwrap();

        let out = String::from_utf8(out).unwrap();
        assert_eq!(out.matches("Result: AI").count(), 1);
        assert_eq!(out.matches("Error: Input text too short").count(), 1);
    }

    #[tokio::test]
    async fn test_render_outputs() {
        let detector = Detector::new(AppConfig::default(), Arc::new(StubClassifier::new(0.1, 0.9)));
        let result = detector.detect(TEXT).await.unwrap();

        let text = render_result(&result, OutputFormat::Text).unwrap();
        assert!(text.starts_with("Result: Human (Confidence: "));

        let json: serde_json::Value = serde_json::from_str(&render_result(&result, OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json["label"], "Human");
        assert!(json["statistics"]["readability"].is_number());

        let report = BatchReport::summarize(vec![]);
        let text = render_report(&report, OutputFormat::Text).unwrap();
        assert!(text.contains("No matching files found"));
        assert!(text.ends_with("Summary: 0 AI, 0 Human, 0 errors"));
    }
}
