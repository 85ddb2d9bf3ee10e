use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use tempfile::TempDir;

pub mod whisper;

use crate::captions;
use crate::config::Config;
use crate::extractors::youtube::YoutubeClient;
use crate::extractors::{AudioDownloader, CaptionSource, SpeechToText, VideoId};
use crate::scratch::ScratchFile;
use crate::session::Session;
use crate::TranscribeError;

use whisper::WhisperClient;

/// Where a successful transcript came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptSource {
    Captions,
    OpenAi,
}

impl TranscriptSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptSource::Captions => "captions",
            TranscriptSource::OpenAi => "openai",
        }
    }
}

/// Final outcome of a transcription workflow. Transcript text is never empty.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptionOutcome {
    pub source: TranscriptSource,
    pub transcript: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Deployment variants of the URL workflow.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceOptions {
    /// Never download media server-side; answer caption-unavailable instead.
    pub captions_only: bool,

    /// Fetch captions anonymously even when a cookie blob is configured.
    pub anonymous_captions: bool,
}

const FALLBACK_NOTE: &str =
    "No usable caption track was found; the transcript was produced by the speech API.";

/// Sequences caption retrieval, audio extraction, and speech-to-text into the
/// two supported workflows, and owns scratch-file lifecycle.
pub struct TranscriptionService {
    captions: Arc<dyn CaptionSource>,
    audio: Arc<dyn AudioDownloader>,
    speech: Option<Arc<dyn SpeechToText>>,
    options: ServiceOptions,
    cookie_blob: Option<String>,
    scratch_dir: TempDir,
}

impl TranscriptionService {
    pub fn new(
        captions: Arc<dyn CaptionSource>,
        audio: Arc<dyn AudioDownloader>,
        speech: Option<Arc<dyn SpeechToText>>,
        options: ServiceOptions,
        cookie_blob: Option<String>,
    ) -> crate::Result<Self> {
        let scratch_dir = TempDir::new().context("failed to create scratch directory")?;
        Ok(Self {
            captions,
            audio,
            speech,
            options,
            cookie_blob,
            scratch_dir,
        })
    }

    /// Wire up the production service: Innertube for captions and audio,
    /// OpenAI Whisper for speech-to-text when a key is configured.
    pub fn from_config(config: &Config) -> crate::Result<Self> {
        let youtube = Arc::new(YoutubeClient::new());
        let speech = config.openai_api_key.as_ref().map(|key| {
            Arc::new(WhisperClient::new(
                key.clone(),
                config.openai_base_url.clone(),
                config.whisper_model.clone(),
            )) as Arc<dyn SpeechToText>
        });

        Self::new(
            youtube.clone(),
            youtube,
            speech,
            ServiceOptions {
                captions_only: config.captions_only,
                anonymous_captions: config.anonymous_captions,
            },
            config.cookie_blob.clone(),
        )
    }

    /// Directory scratch files are created in. Exposed for tests that assert
    /// cleanup.
    pub fn scratch_dir(&self) -> &Path {
        self.scratch_dir.path()
    }

    /// URL workflow: caption attempt first, speech-API fallback second.
    pub async fn transcribe_url(
        &self,
        url: &str,
        prefer_language: Option<&str>,
        force_openai: bool,
    ) -> Result<TranscriptionOutcome, TranscribeError> {
        let reference = url.trim();
        if reference.is_empty() {
            return Err(TranscribeError::MissingUrl);
        }
        let video = VideoId::parse(reference)?;
        let language = prefer_language.and_then(captions::normalize_language);

        let session = if self.options.anonymous_captions {
            Session::anonymous()
        } else {
            Session::with_cookie_blob(self.cookie_blob.as_deref())
        };

        if force_openai {
            tracing::info!(video = %video, "Caption attempt skipped by request");
        } else {
            // Failures here are recovered locally: absence and errors alike
            // escalate to the speech-API stage.
            match captions::fetch(
                self.captions.as_ref(),
                &session,
                &video,
                language.as_deref(),
            )
            .await
            {
                Ok(Some(transcript)) => {
                    tracing::info!(video = %video, chars = transcript.len(), "Transcript served from captions");
                    return Ok(TranscriptionOutcome {
                        source: TranscriptSource::Captions,
                        transcript,
                        note: None,
                    });
                }
                Ok(None) => {
                    tracing::info!(video = %video, "No usable caption text, falling back");
                }
                Err(e) => {
                    tracing::warn!(video = %video, error = %format!("{e:#}"), "Caption fetch failed, falling back");
                }
            }
        }

        if self.options.captions_only {
            return Err(TranscribeError::CaptionUnavailable {
                details: "no caption track with usable text was found".to_string(),
            });
        }

        let speech = self.speech.as_ref().ok_or(TranscribeError::MissingApiKey)?;

        let scratch = self
            .audio
            .download_audio(&session, &video, self.scratch_dir.path())
            .await?;
        tracing::info!(video = %video, bytes = scratch.len(), "Audio downloaded, submitting to speech API");

        let file_name = scratch.file_name();
        let result = speech
            .transcribe(scratch.path(), &file_name, language.as_deref())
            .await;
        scratch.remove().await;

        let transcript = result?;
        Ok(TranscriptionOutcome {
            source: TranscriptSource::OpenAi,
            transcript,
            note: Some(FALLBACK_NOTE.to_string()),
        })
    }

    /// Upload workflow: persist the uploaded bytes and transcribe them.
    pub async fn transcribe_upload(
        &self,
        file_name: Option<&str>,
        bytes: &[u8],
        prefer_language: Option<&str>,
    ) -> Result<TranscriptionOutcome, TranscribeError> {
        if bytes.is_empty() {
            return Err(TranscribeError::MissingFile);
        }
        let speech = self.speech.as_ref().ok_or(TranscribeError::MissingApiKey)?;
        let language = prefer_language.and_then(captions::normalize_language);

        let extension = upload_extension(file_name);
        let scratch = ScratchFile::from_bytes(self.scratch_dir.path(), &extension, bytes)
            .await
            .map_err(|e| {
                TranscribeError::TranscriptionFailed(format!("failed to persist upload: {e:#}"))
            })?;
        tracing::info!(bytes = scratch.len(), "Upload persisted, submitting to speech API");

        let scratch_name = scratch.file_name();
        let submitted_name = file_name.unwrap_or(&scratch_name);
        let result = speech
            .transcribe(scratch.path(), submitted_name, language.as_deref())
            .await;
        scratch.remove().await;

        let transcript = result?;
        Ok(TranscriptionOutcome {
            source: TranscriptSource::OpenAi,
            transcript,
            note: None,
        })
    }
}

/// Extension for an uploaded file's scratch copy: the original extension when
/// it is a short alphanumeric one, `bin` otherwise.
fn upload_extension(file_name: Option<&str>) -> String {
    file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|ext| ext.to_lowercase())
        .unwrap_or_else(|| "bin".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::extractors::{
        CaptionManifest, CaptionTrack, MockAudioDownloader, MockCaptionSource, MockSpeechToText,
    };

    fn track(lang: &str, auto: bool) -> CaptionTrack {
        CaptionTrack {
            language_code: lang.to_string(),
            auto_generated: auto,
            base_url: "https://example.com/timedtext".to_string(),
            name: None,
        }
    }

    fn service_with(
        captions: MockCaptionSource,
        audio: MockAudioDownloader,
        speech: Option<MockSpeechToText>,
        options: ServiceOptions,
    ) -> TranscriptionService {
        TranscriptionService::new(
            Arc::new(captions),
            Arc::new(audio),
            speech.map(|s| Arc::new(s) as Arc<dyn SpeechToText>),
            options,
            None,
        )
        .unwrap()
    }

    fn scratch_file_count(service: &TranscriptionService) -> usize {
        std::fs::read_dir(service.scratch_dir()).unwrap().count()
    }

    const VIDEO_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

    #[tokio::test]
    async fn test_url_workflow_serves_captions() {
        let mut captions = MockCaptionSource::new();
        captions
            .expect_caption_manifest()
            .returning(|_, _| {
                Ok(CaptionManifest {
                    tracks: vec![track("en", false)],
                })
            });
        captions
            .expect_caption_segments()
            .returning(|_, _| Ok(vec!["this is".to_string(), "a test".to_string()]));

        let service = service_with(
            captions,
            MockAudioDownloader::new(),
            None,
            ServiceOptions::default(),
        );

        let outcome = service
            .transcribe_url(VIDEO_URL, Some("en"), false)
            .await
            .unwrap();
        assert_eq!(outcome.source, TranscriptSource::Captions);
        assert_eq!(outcome.transcript, "this is a test");
        assert!(outcome.note.is_none());
    }

    #[tokio::test]
    async fn test_url_workflow_falls_back_to_speech_api() {
        let mut captions = MockCaptionSource::new();
        captions
            .expect_caption_manifest()
            .returning(|_, _| Ok(CaptionManifest::default()));

        let mut audio = MockAudioDownloader::new();
        audio.expect_download_audio().returning(|_, _, dir| {
            let mut scratch = ScratchFile::allocate(dir, "m4a");
            std::fs::write(scratch.path(), b"audio bytes").unwrap();
            scratch.set_len(11);
            Ok(scratch)
        });

        let mut speech = MockSpeechToText::new();
        speech
            .expect_transcribe()
            .returning(|_, _, _| Ok("transcribed text".to_string()));

        let service = service_with(captions, audio, Some(speech), ServiceOptions::default());

        let outcome = service.transcribe_url(VIDEO_URL, None, false).await.unwrap();
        assert_eq!(outcome.source, TranscriptSource::OpenAi);
        assert_eq!(outcome.transcript, "transcribed text");
        assert!(outcome.note.is_some());
        assert_eq!(scratch_file_count(&service), 0);
    }

    #[tokio::test]
    async fn test_caption_fetch_error_is_recovered() {
        let mut captions = MockCaptionSource::new();
        captions
            .expect_caption_manifest()
            .returning(|_, _| Err(anyhow::anyhow!("upstream 403")));

        let mut audio = MockAudioDownloader::new();
        audio.expect_download_audio().returning(|_, _, dir| {
            let mut scratch = ScratchFile::allocate(dir, "webm");
            std::fs::write(scratch.path(), b"x").unwrap();
            scratch.set_len(1);
            Ok(scratch)
        });

        let mut speech = MockSpeechToText::new();
        speech
            .expect_transcribe()
            .returning(|_, _, _| Ok("recovered".to_string()));

        let service = service_with(captions, audio, Some(speech), ServiceOptions::default());

        let outcome = service.transcribe_url(VIDEO_URL, None, false).await.unwrap();
        assert_eq!(outcome.source, TranscriptSource::OpenAi);
        assert_eq!(outcome.transcript, "recovered");
    }

    #[tokio::test]
    async fn test_force_openai_never_touches_caption_source() {
        // No expectations set: any caption call would panic the mock.
        let captions = MockCaptionSource::new();

        let mut audio = MockAudioDownloader::new();
        audio.expect_download_audio().returning(|_, _, dir| {
            let mut scratch = ScratchFile::allocate(dir, "m4a");
            std::fs::write(scratch.path(), b"x").unwrap();
            scratch.set_len(1);
            Ok(scratch)
        });

        let mut speech = MockSpeechToText::new();
        speech
            .expect_transcribe()
            .returning(|_, _, _| Ok("forced".to_string()));

        let service = service_with(captions, audio, Some(speech), ServiceOptions::default());

        let outcome = service.transcribe_url(VIDEO_URL, None, true).await.unwrap();
        assert_eq!(outcome.source, TranscriptSource::OpenAi);
    }

    #[tokio::test]
    async fn test_scratch_file_removed_after_transcription_failure() {
        let mut captions = MockCaptionSource::new();
        captions
            .expect_caption_manifest()
            .returning(|_, _| Ok(CaptionManifest::default()));

        let mut audio = MockAudioDownloader::new();
        audio.expect_download_audio().returning(|_, _, dir| {
            let mut scratch = ScratchFile::allocate(dir, "m4a");
            std::fs::write(scratch.path(), b"partial").unwrap();
            scratch.set_len(7);
            Ok(scratch)
        });

        let mut speech = MockSpeechToText::new();
        speech.expect_transcribe().returning(|_, _, _| {
            Err(TranscribeError::TranscriptionFailed("api outage".to_string()))
        });

        let service = service_with(captions, audio, Some(speech), ServiceOptions::default());

        let err = service
            .transcribe_url(VIDEO_URL, None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, TranscribeError::TranscriptionFailed(_)));
        assert_eq!(scratch_file_count(&service), 0);
    }

    #[tokio::test]
    async fn test_captions_only_terminates_with_caption_unavailable() {
        let mut captions = MockCaptionSource::new();
        captions
            .expect_caption_manifest()
            .returning(|_, _| Ok(CaptionManifest::default()));

        let service = service_with(
            captions,
            MockAudioDownloader::new(),
            None,
            ServiceOptions {
                captions_only: true,
                anonymous_captions: false,
            },
        );

        let err = service
            .transcribe_url(VIDEO_URL, Some("en"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, TranscribeError::CaptionUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_missing_api_key_is_a_config_error() {
        let mut captions = MockCaptionSource::new();
        captions
            .expect_caption_manifest()
            .returning(|_, _| Ok(CaptionManifest::default()));

        let service = service_with(
            captions,
            MockAudioDownloader::new(),
            None,
            ServiceOptions::default(),
        );

        let err = service
            .transcribe_url(VIDEO_URL, None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, TranscribeError::MissingApiKey));
    }

    #[tokio::test]
    async fn test_empty_url_is_a_validation_error() {
        let service = service_with(
            MockCaptionSource::new(),
            MockAudioDownloader::new(),
            None,
            ServiceOptions::default(),
        );

        let err = service.transcribe_url("   ", None, false).await.unwrap_err();
        assert!(matches!(err, TranscribeError::MissingUrl));
    }

    #[tokio::test]
    async fn test_upload_workflow_cleans_up_on_every_path() {
        let mut speech = MockSpeechToText::new();
        speech
            .expect_transcribe()
            .returning(|_, name, _| {
                assert_eq!(name, "talk.m4a");
                Ok("uploaded transcript".to_string())
            });

        let service = service_with(
            MockCaptionSource::new(),
            MockAudioDownloader::new(),
            Some(speech),
            ServiceOptions::default(),
        );

        let outcome = service
            .transcribe_upload(Some("talk.m4a"), b"media bytes", None)
            .await
            .unwrap();
        assert_eq!(outcome.source, TranscriptSource::OpenAi);
        assert_eq!(outcome.transcript, "uploaded transcript");
        assert_eq!(scratch_file_count(&service), 0);

        // Failure path cleans up too.
        let mut speech = MockSpeechToText::new();
        speech
            .expect_transcribe()
            .returning(|_, _, _| Err(TranscribeError::EmptyTranscript));
        let service = service_with(
            MockCaptionSource::new(),
            MockAudioDownloader::new(),
            Some(speech),
            ServiceOptions::default(),
        );
        let err = service
            .transcribe_upload(Some("talk.m4a"), b"media bytes", None)
            .await
            .unwrap_err();
        assert!(matches!(err, TranscribeError::EmptyTranscript));
        assert_eq!(scratch_file_count(&service), 0);
    }

    #[tokio::test]
    async fn test_empty_upload_is_a_validation_error() {
        let service = service_with(
            MockCaptionSource::new(),
            MockAudioDownloader::new(),
            Some(MockSpeechToText::new()),
            ServiceOptions::default(),
        );

        let err = service
            .transcribe_upload(Some("talk.m4a"), &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, TranscribeError::MissingFile));
    }

    #[test]
    fn test_upload_extension() {
        assert_eq!(upload_extension(Some("talk.M4A")), "m4a");
        assert_eq!(upload_extension(Some("recording.webm")), "webm");
        assert_eq!(upload_extension(Some("no_extension")), "bin");
        assert_eq!(upload_extension(Some("weird.tar.gz!")), "bin");
        assert_eq!(upload_extension(None), "bin");
    }

    #[test]
    fn test_source_tags() {
        assert_eq!(TranscriptSource::Captions.as_str(), "captions");
        assert_eq!(TranscriptSource::OpenAi.as_str(), "openai");
        assert_eq!(
            serde_json::to_string(&TranscriptSource::OpenAi).unwrap(),
            "\"openai\""
        );
    }
}
