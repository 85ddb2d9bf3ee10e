use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

pub mod youtube;

use crate::scratch::ScratchFile;
use crate::session::Session;
use crate::TranscribeError;

/// Validated YouTube video identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoId(String);

impl VideoId {
    /// Parse a video reference: full watch/short/embed URL or a bare id.
    pub fn parse(reference: &str) -> Result<Self, TranscribeError> {
        let reference = reference.trim();

        if is_plain_id(reference) {
            return Ok(Self(reference.to_string()));
        }

        let url = Url::parse(reference)
            .map_err(|_| TranscribeError::InvalidVideoRef(reference.to_string()))?;

        let host = url.host_str().unwrap_or("").trim_start_matches("www.");
        let candidate = match host {
            "youtube.com" | "m.youtube.com" | "music.youtube.com" => {
                if url.path() == "/watch" {
                    url.query_pairs()
                        .find(|(k, _)| k == "v")
                        .map(|(_, v)| v.into_owned())
                } else {
                    // /embed/<id>, /shorts/<id>, /v/<id>, /live/<id>
                    url.path_segments()
                        .and_then(|mut segments| match segments.next() {
                            Some("embed" | "shorts" | "v" | "live") => {
                                segments.next().map(str::to_string)
                            }
                            _ => None,
                        })
                }
            }
            "youtu.be" => url
                .path_segments()
                .and_then(|mut segments| segments.next().map(str::to_string)),
            _ => None,
        };

        match candidate {
            Some(id) if is_plain_id(&id) => Ok(Self(id)),
            _ => Err(TranscribeError::InvalidVideoRef(reference.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_plain_id(s: &str) -> bool {
    s.len() == 11
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// One caption stream offered by the source video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionTrack {
    /// BCP-47 language code as reported by the platform
    pub language_code: String,

    /// True for machine-generated ("asr") tracks
    pub auto_generated: bool,

    /// Endpoint the caption content is served from
    pub base_url: String,

    /// Human-readable track label, when the platform provides one
    pub name: Option<String>,
}

/// All caption tracks available for a video.
#[derive(Debug, Clone, Default)]
pub struct CaptionManifest {
    pub tracks: Vec<CaptionTrack>,
}

/// A selectable audio-only rendition of a video.
#[derive(Debug, Clone)]
pub struct AudioStreamDescriptor {
    pub url: String,
    pub container: AudioContainer,
    pub bitrate: u64,
    pub content_length: Option<u64>,
}

/// Container formats the platform serves audio-only streams in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioContainer {
    M4a,
    Webm,
    Mp3,
    Ogg,
}

impl AudioContainer {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioContainer::M4a => "m4a",
            AudioContainer::Webm => "webm",
            AudioContainer::Mp3 => "mp3",
            AudioContainer::Ogg => "ogg",
        }
    }

    /// Map a stream `mimeType` (e.g. `audio/mp4; codecs="mp4a.40.2"`) to a
    /// container.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim();
        match essence {
            "audio/mp4" => Some(AudioContainer::M4a),
            "audio/webm" => Some(AudioContainer::Webm),
            "audio/mpeg" => Some(AudioContainer::Mp3),
            "audio/ogg" => Some(AudioContainer::Ogg),
            _ => None,
        }
    }
}

/// Pick the best audio rendition: highest bitrate among audio-only streams.
pub fn best_audio_stream(streams: &[AudioStreamDescriptor]) -> Option<&AudioStreamDescriptor> {
    streams.iter().max_by_key(|s| s.bitrate)
}

/// Source of caption manifests and caption content for a video.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CaptionSource: Send + Sync {
    /// Fetch the caption manifest for a video.
    async fn caption_manifest(
        &self,
        session: &Session,
        video: &VideoId,
    ) -> crate::Result<CaptionManifest>;

    /// Fetch the ordered segment texts of one caption track.
    async fn caption_segments(
        &self,
        session: &Session,
        track: &CaptionTrack,
    ) -> crate::Result<Vec<String>>;
}

/// Resolves the best audio stream of a video and downloads it to a scratch
/// file. The caller owns deletion of the returned file.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioDownloader: Send + Sync {
    async fn download_audio(
        &self,
        session: &Session,
        video: &VideoId,
        scratch_dir: &Path,
    ) -> Result<ScratchFile, TranscribeError>;
}

/// Speech-to-text API boundary.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe a local audio file, optionally hinting the spoken language.
    /// Returns trimmed, non-empty text.
    async fn transcribe<'a>(
        &self,
        file_path: &Path,
        file_name: &str,
        language_hint: Option<&'a str>,
    ) -> Result<String, TranscribeError>;
}
