// Batch Detection
// File, directory and explicit-list processing with per-file catch-and-continue

use super::ensemble::{Detector, DetectorError};
use crate::models::{BatchReport, DetectionResult, FileDetection};
use crate::services::config_store::SecurityConfig;
use crate::services::security::validate_file;
use crate::services::text_processor::normalize_text;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Read a validated input file as normalized text; `.pdf` goes through
/// text extraction
pub async fn read_input_file(path: &Path, security: &SecurityConfig) -> Result<String, DetectorError> {
    validate_file(path, security)?;

    let display = path.display().to_string();
    let bytes = tokio::fs::read(path).await.map_err(|source| DetectorError::Io {
        path: display.clone(),
        source,
    })?;

    let is_pdf = path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("pdf"));
    let raw = if is_pdf {
        pdf_extract::extract_text_from_mem(&bytes).map_err(|e| DetectorError::Extraction {
            path: display,
            message: e.to_string(),
        })?
    } else {
        String::from_utf8(bytes)
            .map_err(|_| DetectorError::InvalidInput(format!("{} is not valid UTF-8 text", display)))?
    };

    Ok(normalize_text(&raw))
}

/// Candidate files in `dir` (non-recursive), sorted by file name
pub fn list_directory(dir: &Path, security: &SecurityConfig) -> Result<Vec<PathBuf>, DetectorError> {
    let entries = std::fs::read_dir(dir).map_err(|source| DetectorError::Io {
        path: dir.display().to_string(),
        source,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && security.allows_extension(p))
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

impl Detector {
    /// Validate, read and classify a single file
    pub async fn detect_file(&self, path: &Path) -> Result<DetectionResult, DetectorError> {
        let text = read_input_file(path, &self.config().security).await?;
        self.detect(&text).await
    }
}

/// Classify every allowed file in `dir`
pub async fn detect_directory(detector: Arc<Detector>, dir: &Path) -> Result<BatchReport, DetectorError> {
    let files = list_directory(dir, &detector.config().security)?;
    info!(dir = %dir.display(), files = files.len(), "batch.directory_listed");
    Ok(detect_batch(detector, files).await)
}

/// Classify an explicit list of files, keeping input order. At most
/// `analysis.batch_size` detections run at once.
pub async fn detect_batch(detector: Arc<Detector>, paths: Vec<PathBuf>) -> BatchReport {
    let concurrency = detector.config().analysis.batch_size.max(1);
    let mut slots: Vec<Option<FileDetection>> = vec![None; paths.len()];
    let mut tasks = JoinSet::new();

    for (idx, path) in paths.iter().cloned().enumerate() {
        if tasks.len() >= concurrency {
            collect_next(&mut tasks, &mut slots).await;
        }
        let detector = Arc::clone(&detector);
        tasks.spawn(async move {
            let outcome = detector.detect_file(&path).await;
            (idx, file_detection(path, outcome))
        });
    }
    while !tasks.is_empty() {
        collect_next(&mut tasks, &mut slots).await;
    }

    let files: Vec<FileDetection> = slots
        .into_iter()
        .zip(paths)
        .map(|(slot, path)| {
            slot.unwrap_or_else(|| file_detection(path, Err(DetectorError::InvalidInput("worker task failed".to_string()))))
        })
        .collect();

    let report = BatchReport::summarize(files);
    info!(
        files = report.files.len(),
        ai = report.ai_count,
        human = report.human_count,
        errors = report.error_count,
        "batch.completed"
    );
    report
}

async fn collect_next(
    tasks: &mut JoinSet<(usize, FileDetection)>,
    slots: &mut [Option<FileDetection>],
) {
    match tasks.join_next().await {
        Some(Ok((idx, detection))) => slots[idx] = Some(detection),
        Some(Err(e)) => error!(error = %e, "batch.task_failed"),
        None => {}
    }
}

fn file_detection(path: PathBuf, outcome: Result<DetectionResult, DetectorError>) -> FileDetection {
    let file_name = file_name_of(&path);
    match outcome {
        Ok(result) => FileDetection {
            path,
            file_name,
            result: Some(result),
            error: None,
        },
        Err(e) => {
            warn!(file = %file_name, error = %e, "batch.file_failed");
            FileDetection {
                path,
                file_name,
                result: None,
                error: Some(e.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::config_store::AppConfig;
    use crate::services::detection::ensemble::tests::StubClassifier;
    use crate::services::security::SecurityError;

    const TEXT: &str = "The city council met on Tuesday to discuss the annual budget for regional parks.";

    fn detector_with(config: AppConfig) -> Arc<Detector> {
        Arc::new(Detector::new(config, Arc::new(StubClassifier::new(0.9, 0.1))))
    }

    #[tokio::test]
    async fn test_detect_file_reads_and_classifies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("essay.txt");
        std::fs::write(&path, TEXT).unwrap();

        let result = detector_with(AppConfig::default()).detect_file(&path).await.unwrap();
        assert_eq!(result.label, crate::models::Label::Ai);
    }

    #[tokio::test]
    async fn test_detect_file_rejects_disallowed_and_binary() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("tool.exe");
        let bin = dir.path().join("blob.txt");
        std::fs::write(&exe, TEXT).unwrap();
        std::fs::write(&bin, [0xff_u8, 0xfe, 0x00, 0x41]).unwrap();

        let d = detector_with(AppConfig::default());
        assert!(matches!(
            d.detect_file(&exe).await,
            Err(DetectorError::Security(SecurityError::DisallowedFileType(_)))
        ));
        assert!(matches!(d.detect_file(&bin).await, Err(DetectorError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_read_input_file_normalizes_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quoted.txt");
        std::fs::write(&path, "  \u{201c}Hi\u{201d}  there\r\nsecond\t line  ").unwrap();

        let text = read_input_file(&path, &SecurityConfig::default()).await.unwrap();
        assert_eq!(text, "\"Hi\" there\nsecond line");
    }

    #[test]
    fn test_list_directory_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.txt", "a.txt", "c.md", "D.TXT"] {
            std::fs::write(dir.path().join(name), TEXT).unwrap();
        }
        std::fs::create_dir(dir.path().join("sub.txt")).unwrap();

        let files = list_directory(dir.path(), &SecurityConfig::default()).unwrap();
        let names: Vec<String> = files.iter().map(|p| file_name_of(p)).collect();
        assert_eq!(names, vec!["D.TXT", "a.txt", "b.txt"]);
    }

    #[tokio::test]
    async fn test_directory_continues_past_failures() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("1-good.txt"), TEXT).unwrap();
        std::fs::write(dir.path().join("2-empty.txt"), "   ").unwrap();
        std::fs::write(dir.path().join("3-good.txt"), TEXT).unwrap();

        let mut config = AppConfig::default();
        config.analysis.batch_size = 2;
        let report = detect_directory(detector_with(config), dir.path()).await.unwrap();

        assert_eq!(report.files.len(), 3);
        assert_eq!(report.ai_count, 2);
        assert_eq!(report.error_count, 1);
        assert_eq!(report.files[1].file_name, "2-empty.txt");
        assert_eq!(report.files[1].summary_line(), "2-empty.txt: Error - Input text cannot be empty");
    }

    #[tokio::test]
    async fn test_batch_keeps_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for i in 0..5 {
            let p = dir.path().join(format!("f{}.txt", i));
            std::fs::write(&p, TEXT).unwrap();
            paths.push(p);
        }
        paths.reverse();
        paths.insert(2, dir.path().join("missing.txt"));

        let mut config = AppConfig::default();
        config.analysis.batch_size = 2;
        let report = detect_batch(detector_with(config), paths.clone()).await;

        let got: Vec<&PathBuf> = report.files.iter().map(|f| &f.path).collect();
        assert_eq!(got, paths.iter().collect::<Vec<_>>());
        assert_eq!(report.error_count, 1);
        assert!(report.files[2].error.is_some());
    }

    #[tokio::test]
    async fn test_missing_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = detect_directory(detector_with(AppConfig::default()), &dir.path().join("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, DetectorError::Io { .. }));
    }
}
