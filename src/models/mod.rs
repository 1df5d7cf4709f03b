// Detector Data Models
// Result types shared by the CLI, the GUI and the detection services

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

// ============ Labels ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Label {
    #[serde(rename = "AI")]
    Ai,
    Human,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Ai => write!(f, "AI"),
            Label::Human => write!(f, "Human"),
        }
    }
}

/// Which configured model a classifier call is made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelRole {
    /// `models.roberta`: an AI-text detector.
    Primary,
    /// `models.gpt2`: a human-likeness ranker.
    Secondary,
}

impl fmt::Display for ModelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelRole::Primary => write!(f, "primary"),
            ModelRole::Secondary => write!(f, "secondary"),
        }
    }
}

/// One `{label, score}` pair as returned by a text-classification pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassLabel {
    pub label: String,
    pub score: f64,
}

impl ClassLabel {
    pub fn new(label: &str, score: f64) -> Self {
        Self {
            label: label.to_string(),
            score,
        }
    }
}

// ============ Signals ============

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextStatistics {
    pub word_count: usize,
    pub sentence_count: usize,
    pub avg_sentence_len: f64,
    /// Flesch reading ease, 0 (hard) to 100 (easy).
    pub readability: f64,
    pub avg_token_probability: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ModelScores {
    pub primary: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary: Option<f64>,
}

// ============ Detection Result ============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    pub request_id: String,
    pub label: Label,
    pub confidence: f64,
    pub ai_probability: f64,
    /// Confidence fell below `analysis.confidence_threshold`.
    pub uncertain: bool,
    pub scores: ModelScores,
    pub statistics: TextStatistics,
    pub adjustments: Vec<String>,
    pub latency_ms: i64,
}

impl DetectionResult {
    /// `AI (Confidence: 87.00%)`
    pub fn summary(&self) -> String {
        format!("{} (Confidence: {:.2}%)", self.label, self.confidence * 100.0)
    }
}

// ============ Batch ============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDetection {
    pub path: PathBuf,
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<DetectionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileDetection {
    pub fn summary_line(&self) -> String {
        match (&self.result, &self.error) {
            (Some(result), _) => format!("{}: {}", self.file_name, result.summary()),
            (None, Some(err)) => format!("{}: Error - {}", self.file_name, err),
            (None, None) => format!("{}: Error - no result", self.file_name),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub files: Vec<FileDetection>,
    pub ai_count: usize,
    pub human_count: usize,
    pub error_count: usize,
}

impl BatchReport {
    pub fn summarize(files: Vec<FileDetection>) -> Self {
        let mut report = BatchReport::default();
        for file in &files {
            match &file.result {
                Some(r) if r.label == Label::Ai => report.ai_count += 1,
                Some(_) => report.human_count += 1,
                None => report.error_count += 1,
            }
        }
        report.files = files;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(label: Label, confidence: f64) -> DetectionResult {
        DetectionResult {
            request_id: "r".to_string(),
            label,
            confidence,
            ai_probability: if label == Label::Ai { confidence } else { 1.0 - confidence },
            uncertain: false,
            scores: ModelScores::default(),
            statistics: TextStatistics::default(),
            adjustments: vec![],
            latency_ms: 0,
        }
    }

    #[test]
    fn test_summary_formats_percentage() {
        assert_eq!(result(Label::Ai, 0.87).summary(), "AI (Confidence: 87.00%)");
        assert_eq!(result(Label::Human, 0.5).summary(), "Human (Confidence: 50.00%)");
    }

    #[test]
    fn test_label_serializes_as_display_name() {
        assert_eq!(serde_json::to_string(&Label::Ai).unwrap(), "\"AI\"");
        assert_eq!(serde_json::to_string(&Label::Human).unwrap(), "\"Human\"");
    }

    #[test]
    fn test_batch_report_counts() {
        let files = vec![
            FileDetection {
                path: "a.txt".into(),
                file_name: "a.txt".into(),
                result: Some(result(Label::Ai, 0.9)),
                error: None,
            },
            FileDetection {
                path: "b.txt".into(),
                file_name: "b.txt".into(),
                result: None,
                error: Some("boom".into()),
            },
            FileDetection {
                path: "c.txt".into(),
                file_name: "c.txt".into(),
                result: Some(result(Label::Human, 0.8)),
                error: None,
            },
        ];
        let report = BatchReport::summarize(files);
        assert_eq!((report.ai_count, report.human_count, report.error_count), (1, 1, 1));
        assert_eq!(report.files[1].summary_line(), "b.txt: Error - boom");
    }
}
