use thiserror::Error;

use crate::session::Mode;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("text request failed: {0}")]
    Request(String),
    #[error("generator returned no text for mode {0}")]
    Empty(Mode),
}

/// Supplies target texts, keyed by mode.
pub trait TextSource {
    fn generate(&mut self, mode: Mode) -> Result<String, GenerationError>;
}

/// `GET {base_url}/generate/{mode}` → `{ "text": ... }`.
pub struct HttpTextSource {
    base_url: String,
    #[cfg(feature = "network")]
    client: reqwest::blocking::Client,
}

#[cfg_attr(not(feature = "network"), allow(dead_code))]
#[derive(serde::Deserialize)]
struct GenerateResponse {
    text: String,
}

impl HttpTextSource {
    #[cfg(feature = "network")]
    pub fn new(base_url: &str, timeout: std::time::Duration) -> Result<Self, GenerationError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Request(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    #[cfg(not(feature = "network"))]
    pub fn new(base_url: &str, _timeout: std::time::Duration) -> Result<Self, GenerationError> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url_for(&self, mode: Mode) -> String {
        format!("{}/generate/{}", self.base_url, mode.as_str())
    }
}

impl TextSource for HttpTextSource {
    #[cfg(feature = "network")]
    fn generate(&mut self, mode: Mode) -> Result<String, GenerationError> {
        let response = self
            .client
            .get(self.url_for(mode))
            .send()
            .map_err(|e| GenerationError::Request(e.to_string()))?;
        if !response.status().is_success() {
            return Err(GenerationError::Request(format!(
                "status {}",
                response.status()
            )));
        }
        let body: GenerateResponse = response
            .json()
            .map_err(|e| GenerationError::Request(e.to_string()))?;
        if body.text.is_empty() {
            return Err(GenerationError::Empty(mode));
        }
        Ok(body.text)
    }

    #[cfg(not(feature = "network"))]
    fn generate(&mut self, _mode: Mode) -> Result<String, GenerationError> {
        Err(GenerationError::Request(
            "built without the network feature".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn url_uses_mode_wire_name() {
        let source = HttpTextSource::new("http://localhost:8000/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            source.url_for(Mode::TrigraphTest),
            "http://localhost:8000/generate/trigraph_test"
        );
    }

    #[test]
    fn generate_response_parses() {
        let body: GenerateResponse =
            serde_json::from_str(r#"{"text":"the cat","mode":"top200"}"#).unwrap();
        assert_eq!(body.text, "the cat");
    }
}
