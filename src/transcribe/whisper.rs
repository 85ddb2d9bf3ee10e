use std::path::Path;

use async_trait::async_trait;
use reqwest::multipart;

use crate::extractors::SpeechToText;
use crate::TranscribeError;

/// Client for the OpenAI `/audio/transcriptions` endpoint.
pub struct WhisperClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl WhisperClient {
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        }
    }
}

#[async_trait]
impl SpeechToText for WhisperClient {
    async fn transcribe<'a>(
        &self,
        file_path: &Path,
        file_name: &str,
        language_hint: Option<&'a str>,
    ) -> Result<String, TranscribeError> {
        let bytes = tokio::fs::read(file_path).await.map_err(|e| {
            TranscribeError::TranscriptionFailed(format!("failed to read audio file: {e}"))
        })?;

        let file_part = multipart::Part::bytes(bytes).file_name(file_name.to_string());

        let mut form = multipart::Form::new()
            .text("model", self.model.clone())
            .text("response_format", "text")
            .part("file", file_part);

        // Omitting the hint lets the API auto-detect the spoken language.
        if let Some(lang) = language_hint {
            form = form.text("language", lang.to_string());
        }

        tracing::debug!(model = %self.model, file = %file_name, "Submitting audio to speech API");

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TranscribeError::TranscriptionFailed(format!("request: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(TranscribeError::TranscriptionFailed(format!(
                "status {status}: {body}"
            )));
        }

        let transcript = response
            .text()
            .await
            .map_err(|e| TranscribeError::TranscriptionFailed(format!("body: {e}")))?;

        let transcript = transcript.trim();
        if transcript.is_empty() {
            return Err(TranscribeError::EmptyTranscript);
        }

        tracing::info!(chars = transcript.len(), "Speech API transcription completed");

        Ok(transcript.to_string())
    }
}
