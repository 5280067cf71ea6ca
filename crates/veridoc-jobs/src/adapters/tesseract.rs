//! TesseractEngine — local OCR via pdftoppm + tesseract.
//!
//! Pipeline: PDF → pdftoppm (render pages to PNG) → tesseract TSV per page;
//! plain images skip the render step. The TSV output carries per-word
//! confidences, which drive line confidences and the per-field scores.
//! Fields are lifted from the text by template-label anchoring: a line
//! starting with an expected field's label yields that field's value.

use std::io::Write;

use async_trait::async_trait;
use tempfile::{NamedTempFile, TempDir};
use tokio::process::Command;
use tracing::{debug, warn};

use veridoc_core::defaults::OCR_CMD_TIMEOUT_SECS;
use veridoc_core::{
    classify_text, template_for, DocumentType, Error, ExtractedField, OcrEngine, OcrOutput,
    OcrStatus, Result,
};

/// Run a command that may output to files rather than stdout.
async fn run_cmd_status(cmd: &mut Command, timeout_secs: u64) -> Result<()> {
    let output = tokio::time::timeout(std::time::Duration::from_secs(timeout_secs), cmd.output())
        .await
        .map_err(|_| Error::Ocr(format!("External command timed out after {}s", timeout_secs)))?
        .map_err(|e| Error::Ocr(format!("Failed to execute command: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Ocr(format!(
            "Command failed (exit {}): {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(())
}

/// Run a command and capture stdout as a string.
async fn run_cmd_stdout(cmd: &mut Command, timeout_secs: u64) -> Result<String> {
    let output = tokio::time::timeout(std::time::Duration::from_secs(timeout_secs), cmd.output())
        .await
        .map_err(|_| Error::Ocr(format!("External command timed out after {}s", timeout_secs)))?
        .map_err(|e| Error::Ocr(format!("Failed to execute command: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Ocr(format!(
            "Command failed (exit {}): {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// One OCR'd line with its mean word confidence (0.0-1.0).
#[derive(Debug, Clone)]
struct OcrLine {
    text: String,
    confidence: f64,
}

/// Local tesseract-backed OCR engine.
pub struct TesseractEngine {
    language: String,
    dpi: u32,
}

impl TesseractEngine {
    pub fn new() -> Self {
        Self {
            language: "eng".to_string(),
            dpi: 300,
        }
    }

    /// Set the tesseract language pack (default `eng`).
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Set the render DPI for PDF pages (default 300).
    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }

    /// OCR one image file into lines via tesseract's TSV output.
    async fn ocr_image(&self, image_path: &str) -> Result<Vec<OcrLine>> {
        let tsv = run_cmd_stdout(
            Command::new("tesseract")
                .arg(image_path)
                .arg("stdout")
                .arg("-l")
                .arg(&self.language)
                .arg("tsv"),
            OCR_CMD_TIMEOUT_SECS,
        )
        .await?;
        Ok(parse_tsv_lines(&tsv))
    }

    /// Render a PDF to page images, OCR each, and concatenate.
    async fn ocr_pdf(&self, data: &[u8]) -> Result<Vec<OcrLine>> {
        let mut tmpfile = NamedTempFile::new()
            .map_err(|e| Error::Ocr(format!("Failed to create temp file: {}", e)))?;
        tmpfile
            .write_all(data)
            .map_err(|e| Error::Ocr(format!("Failed to write temp file: {}", e)))?;
        let pdf_path = tmpfile.path().to_string_lossy().to_string();

        let img_dir = TempDir::new()
            .map_err(|e| Error::Ocr(format!("Failed to create temp dir: {}", e)))?;
        let img_prefix = img_dir.path().join("page").to_string_lossy().to_string();

        debug!(dpi = self.dpi, language = %self.language, "Rendering PDF pages for OCR");

        run_cmd_status(
            Command::new("pdftoppm")
                .arg("-png")
                .arg("-r")
                .arg(self.dpi.to_string())
                .arg(&pdf_path)
                .arg(&img_prefix),
            OCR_CMD_TIMEOUT_SECS * 3, // Allow more time for rendering
        )
        .await?;

        let mut page_images: Vec<String> = Vec::new();
        let entries = std::fs::read_dir(img_dir.path())
            .map_err(|e| Error::Ocr(format!("Failed to read temp dir: {}", e)))?;
        for entry in entries {
            let entry = entry.map_err(|e| Error::Ocr(format!("Failed to read dir entry: {}", e)))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("png") {
                page_images.push(path.to_string_lossy().to_string());
            }
        }
        page_images.sort();

        let mut lines = Vec::new();
        for img_path in &page_images {
            match self.ocr_image(img_path).await {
                Ok(mut page_lines) => lines.append(&mut page_lines),
                Err(e) => {
                    warn!(page = %img_path, error = %e, "Page OCR failed, skipping");
                }
            }
        }
        Ok(lines)
    }
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    async fn extract(&self, data: &[u8], expected_type: DocumentType) -> Result<OcrOutput> {
        if data.is_empty() {
            return Err(Error::InvalidInput("Cannot OCR empty data".to_string()));
        }

        let lines = if data.len() >= 4 && &data[0..4] == b"%PDF" {
            self.ocr_pdf(data).await?
        } else {
            // Assume an image format tesseract can read directly.
            let mut tmpfile = NamedTempFile::new()
                .map_err(|e| Error::Ocr(format!("Failed to create temp file: {}", e)))?;
            tmpfile
                .write_all(data)
                .map_err(|e| Error::Ocr(format!("Failed to write temp file: {}", e)))?;
            self.ocr_image(&tmpfile.path().to_string_lossy()).await?
        };

        let raw_text = lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        if raw_text.trim().is_empty() {
            // Reachable engine, unreadable document.
            return Ok(OcrOutput {
                raw_text,
                fields: Vec::new(),
                classified_type: DocumentType::Unknown,
                status: OcrStatus::Failed,
            });
        }

        let (classified_type, _) = classify_text(&raw_text);
        let template_type = if expected_type == DocumentType::Unknown {
            classified_type
        } else {
            expected_type
        };
        let fields = lift_fields(&lines, template_type);

        debug!(
            doc_type = %template_type,
            field_count = fields.len(),
            line_count = lines.len(),
            "tesseract extraction complete"
        );

        Ok(OcrOutput {
            raw_text,
            fields,
            classified_type,
            status: OcrStatus::Completed,
        })
    }

    fn name(&self) -> &'static str {
        "tesseract"
    }
}

/// Parse tesseract TSV output into lines with mean word confidences.
///
/// TSV columns: level, page, block, par, line, word, left, top, width,
/// height, conf, text. Word rows are level 5; conf is -1 for non-words.
fn parse_tsv_lines(tsv: &str) -> Vec<OcrLine> {
    let mut lines: Vec<OcrLine> = Vec::new();
    let mut current_key: Option<(u32, u32, u32, u32)> = None;
    let mut words: Vec<(String, f64)> = Vec::new();

    let flush = |words: &mut Vec<(String, f64)>, lines: &mut Vec<OcrLine>| {
        if words.is_empty() {
            return;
        }
        let text = words
            .iter()
            .map(|(w, _)| w.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let confidence =
            words.iter().map(|(_, c)| c).sum::<f64>() / words.len() as f64 / 100.0;
        lines.push(OcrLine { text, confidence });
        words.clear();
    };

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 {
            continue;
        }
        let level: u32 = cols[0].parse().unwrap_or(0);
        if level != 5 {
            continue;
        }
        let key = (
            cols[1].parse().unwrap_or(0),
            cols[2].parse().unwrap_or(0),
            cols[3].parse().unwrap_or(0),
            cols[4].parse().unwrap_or(0),
        );
        let conf: f64 = cols[10].parse().unwrap_or(-1.0);
        let text = cols[11].trim();
        if conf < 0.0 || text.is_empty() {
            continue;
        }

        if current_key != Some(key) {
            flush(&mut words, &mut lines);
            current_key = Some(key);
        }
        words.push((text.to_string(), conf));
    }
    flush(&mut words, &mut lines);
    lines
}

/// Lift template fields out of OCR'd lines by label anchoring.
///
/// A line whose text starts with a field's label (the template name with
/// underscores as spaces, case-insensitive, optional `:`) yields that
/// field's value: the remainder of the line, at the line's confidence.
fn lift_fields(lines: &[OcrLine], doc_type: DocumentType) -> Vec<ExtractedField> {
    let Some(template) = template_for(doc_type) else {
        return Vec::new();
    };

    let mut fields = Vec::new();
    for tf in template.expected_fields {
        let label = tf.name.replace('_', " ");
        for line in lines {
            let Some(head) = line.text.get(..label.len()) else {
                continue;
            };
            if !head.eq_ignore_ascii_case(&label) {
                continue;
            }
            let value = line.text[label.len()..]
                .trim_start_matches([':', ' ', '\t'])
                .trim();
            if value.is_empty() {
                continue;
            }
            fields.push(
                ExtractedField::new(tf.name, value, tf.kind).with_confidence(line.confidence),
            );
            break;
        }
    }
    fields
}
