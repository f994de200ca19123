use crate::error::IngestError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use lopdf::Document;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
struct OcrRequest {
    pdf_base64: String,
    document_name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OcrResponse {
    pages: Option<Vec<OcrPage>>,
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OcrPage {
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    text: Option<String>,
}

/// Remote OCR endpoint used when a PDF has no extractable text layer.
#[derive(Debug, Clone)]
pub struct OcrEndpointConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
}

/// Turns an uploaded PDF byte stream into one concatenated text string,
/// pages in reading order. Never touches the filesystem.
#[async_trait]
pub trait PdfExtractor {
    async fn extract_text(&self, pdf: &[u8], document_name: &str) -> Result<String, IngestError>;
}

pub struct LopdfExtractor {
    client: reqwest::Client,
    ocr: Option<OcrEndpointConfig>,
}

impl Default for LopdfExtractor {
    fn default() -> Self {
        Self::new(None)
    }
}

impl LopdfExtractor {
    pub fn new(ocr: Option<OcrEndpointConfig>) -> Self {
        Self {
            client: reqwest::Client::new(),
            ocr,
        }
    }

    fn extract_pages(&self, pdf: &[u8]) -> Result<Vec<PageText>, IngestError> {
        let document =
            Document::load_mem(pdf).map_err(|error| IngestError::Extraction(error.to_string()))?;

        let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
        if page_numbers.is_empty() {
            return Err(IngestError::Extraction("pdf has no pages".to_string()));
        }

        let mut pages = Vec::new();
        for page_no in page_numbers {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| IngestError::Extraction(error.to_string()))?;

            if !text.trim().is_empty() {
                pages.push(PageText {
                    number: page_no,
                    text,
                });
            }
        }

        if pages.is_empty() {
            return Err(IngestError::Extraction(
                "pdf had no readable page text".to_string(),
            ));
        }

        Ok(pages)
    }

    async fn extract_with_ocr(
        &self,
        pdf: &[u8],
        document_name: &str,
    ) -> Result<Option<Vec<PageText>>, IngestError> {
        let cfg = match &self.ocr {
            Some(cfg) => cfg,
            None => return Ok(None),
        };

        let payload = OcrRequest {
            pdf_base64: STANDARD.encode(pdf),
            document_name: document_name.to_string(),
        };

        let mut request = self
            .client
            .post(&cfg.endpoint)
            .header("content-type", "application/json")
            .json(&payload);

        if let Some(api_key) = &cfg.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|error| IngestError::Extraction(format!("ocr request failed: {error}")))?;

        if !response.status().is_success() {
            return Err(IngestError::Extraction(format!(
                "ocr request to {} returned {}",
                cfg.endpoint,
                response.status()
            )));
        }

        let payload: OcrResponse = response
            .json()
            .await
            .map_err(|error| IngestError::Extraction(format!("ocr response unreadable: {error}")))?;
        let pages = payload_to_pages(&payload, document_name)?;

        Ok(Some(pages))
    }
}

#[async_trait]
impl PdfExtractor for LopdfExtractor {
    async fn extract_text(&self, pdf: &[u8], document_name: &str) -> Result<String, IngestError> {
        let pages = match self.extract_pages(pdf) {
            Ok(pages) => pages,
            Err(IngestError::Extraction(parse_error)) => {
                match self.extract_with_ocr(pdf, document_name).await {
                    Ok(Some(pages)) => pages,
                    Ok(None) => return Err(IngestError::Extraction(parse_error)),
                    Err(ocr_error) => {
                        return Err(IngestError::Extraction(format!(
                            "{parse_error}; ocr fallback failed: {ocr_error}"
                        )))
                    }
                }
            }
            Err(error) => return Err(error),
        };

        Ok(pages
            .iter()
            .map(|page| page.text.as_str())
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

fn payload_to_pages(payload: &OcrResponse, document_name: &str) -> Result<Vec<PageText>, IngestError> {
    if let Some(listed) = &payload.pages {
        let listed = listed
            .iter()
            .filter_map(|page| {
                let text = page.text.as_ref().map(|value| value.trim().to_string());
                text.and_then(|normalized| {
                    if normalized.is_empty() {
                        None
                    } else {
                        Some(PageText {
                            number: page.page.unwrap_or(1),
                            text: normalized,
                        })
                    }
                })
            })
            .collect::<Vec<_>>();

        if !listed.is_empty() {
            return Ok(listed);
        }
    }

    if let Some(raw_text) = &payload.text {
        let pages = raw_text
            .split('\u{000c}')
            .enumerate()
            .filter_map(|(index, chunk)| {
                let normalized = chunk.trim().to_string();
                if normalized.is_empty() {
                    None
                } else {
                    Some(PageText {
                        number: (index + 1) as u32,
                        text: normalized,
                    })
                }
            })
            .collect::<Vec<_>>();

        if !pages.is_empty() {
            return Ok(pages);
        }
    }

    Err(IngestError::Extraction(format!(
        "ocr response was empty for {document_name}"
    )))
}

#[cfg(test)]
mod tests {
    use super::{payload_to_pages, LopdfExtractor, OcrPage, OcrResponse, PdfExtractor};

    #[tokio::test]
    async fn garbage_bytes_fail_extraction() {
        let extractor = LopdfExtractor::default();
        let result = extractor.extract_text(b"%PDF-1.4\n%broken", "broken.pdf").await;
        assert!(result.is_err());
    }

    #[test]
    fn ocr_payload_with_pages_converts_only_nonempty_text() {
        let response = OcrResponse {
            pages: Some(vec![
                OcrPage {
                    page: Some(2),
                    text: Some("  ".to_string()),
                },
                OcrPage {
                    page: Some(3),
                    text: Some("Page 3".to_string()),
                },
            ]),
            text: None,
        };

        let pages = payload_to_pages(&response, "x.pdf").expect("ocr response should be parsed");

        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].number, 3);
        assert_eq!(pages[0].text, "Page 3");
    }

    #[test]
    fn ocr_payload_fallback_text_split_by_form_feed() {
        let response = OcrResponse {
            pages: None,
            text: Some("First\u{000C}Second\n".to_string()),
        };

        let pages = payload_to_pages(&response, "x.pdf").expect("ocr response should be parsed");

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].number, 1);
        assert_eq!(pages[0].text, "First");
        assert_eq!(pages[1].number, 2);
        assert_eq!(pages[1].text, "Second");
    }
}
