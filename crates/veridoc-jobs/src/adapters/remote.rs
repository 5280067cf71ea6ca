//! RemoteOcrEngine — vendor-neutral HTTP OCR backend.
//!
//! POSTs the raw bytes to `{base_url}/v1/extract` with the expected type
//! as a query parameter and maps the JSON response onto [`OcrOutput`].
//! Any HTTP-capable OCR service can sit behind this adapter; nothing here
//! is specific to one vendor.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use veridoc_core::defaults::OCR_HTTP_TIMEOUT_SECS;
use veridoc_core::{
    DocumentType, Error, ExtractedField, FieldKind, OcrEngine, OcrOutput, OcrStatus, Result,
};

/// Wire format of one extracted field.
#[derive(Debug, Deserialize)]
struct WireField {
    name: String,
    value: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    data_type: FieldKind,
}

/// Wire format of the extraction response.
#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    raw_text: String,
    #[serde(default)]
    fields: Vec<WireField>,
    #[serde(default)]
    classified_type: DocumentType,
    status: OcrStatus,
}

/// OCR engine adapter for a remote HTTP extraction service.
pub struct RemoteOcrEngine {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteOcrEngine {
    /// Create an adapter for the service at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(OCR_HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl OcrEngine for RemoteOcrEngine {
    async fn extract(&self, data: &[u8], expected_type: DocumentType) -> Result<OcrOutput> {
        let url = format!("{}/v1/extract", self.base_url);

        let response = self
            .client
            .post(&url)
            .query(&[("expected_type", expected_type.as_str())])
            .header("content-type", "application/octet-stream")
            .body(data.to_vec())
            .send()
            .await
            .map_err(|e| Error::Request(format!("OCR service unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Ocr(format!(
                "OCR service returned HTTP {}",
                response.status()
            )));
        }

        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| Error::Ocr(format!("malformed OCR response: {}", e)))?;

        debug!(
            subsystem = "ocr",
            component = "remote",
            field_count = wire.fields.len(),
            status = ?wire.status,
            "remote extraction response"
        );

        let fields = wire
            .fields
            .into_iter()
            .map(|f| ExtractedField {
                name: f.name,
                value: f.value,
                kind: f.data_type,
                confidence: f.confidence,
                requires_validation: false,
            })
            .collect();

        Ok(OcrOutput {
            raw_text: wire.raw_text,
            fields,
            classified_type: wire.classified_type,
            status: wire.status,
        })
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_response_parses_full_payload() {
        let json = r#"{
            "raw_text": "Form W-2",
            "fields": [
                {"name": "wages", "value": "52000.00", "confidence": 0.93, "data_type": "currency"},
                {"name": "memo", "value": "n/a", "data_type": "free_form"}
            ],
            "classified_type": "w2",
            "status": "completed"
        }"#;
        let wire: WireResponse = serde_json::from_str(json).unwrap();
        assert_eq!(wire.classified_type, DocumentType::W2);
        assert_eq!(wire.status, OcrStatus::Completed);
        assert_eq!(wire.fields.len(), 2);
        assert_eq!(wire.fields[0].data_type, FieldKind::Currency);
        // Unrecognized data types degrade to text rather than failing.
        assert_eq!(wire.fields[1].data_type, FieldKind::Text);
        assert_eq!(wire.fields[1].confidence, None);
    }

    #[test]
    fn test_wire_response_defaults() {
        let wire: WireResponse = serde_json::from_str(r#"{"status": "failed"}"#).unwrap();
        assert_eq!(wire.status, OcrStatus::Failed);
        assert_eq!(wire.classified_type, DocumentType::Unknown);
        assert!(wire.fields.is_empty());
        assert!(wire.raw_text.is_empty());
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let engine = RemoteOcrEngine::new("http://ocr.internal:9000/").unwrap();
        assert_eq!(engine.base_url, "http://ocr.internal:9000");
    }
}
