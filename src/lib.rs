//! vidscribe - HTTP service that turns YouTube videos into transcript text
//!
//! The service tries pre-existing caption tracks first and falls back to the
//! OpenAI Whisper speech-to-text API when captions are missing, unusable, or
//! explicitly skipped. A direct-upload endpoint bypasses video-hosting
//! restrictions entirely.

pub mod captions;
pub mod config;
pub mod extractors;
pub mod scratch;
pub mod server;
pub mod session;
pub mod transcribe;

pub use config::Config;
pub use extractors::{AudioDownloader, CaptionSource, SpeechToText, VideoId};
pub use session::Session;
pub use transcribe::{ServiceOptions, TranscriptSource, TranscriptionOutcome, TranscriptionService};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Terminal error kinds of the transcription workflows.
///
/// Each variant maps to exactly one HTTP status and error code in the server
/// layer; the orchestrator pattern-matches on these instead of suppressing
/// exceptions between stages.
#[derive(thiserror::Error, Debug)]
pub enum TranscribeError {
    #[error("missing or empty video url")]
    MissingUrl,

    #[error("missing or empty upload")]
    MissingFile,

    #[error("unrecognized video reference: {0}")]
    InvalidVideoRef(String),

    #[error("no caption text available: {details}")]
    CaptionUnavailable { details: String },

    #[error("no audio-only stream found for this video")]
    NoAudioStream,

    #[error("audio download failed: {0}")]
    DownloadFailed(String),

    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("speech API returned an empty transcript")]
    EmptyTranscript,

    #[error("OPENAI_API_KEY is not configured")]
    MissingApiKey,
}
