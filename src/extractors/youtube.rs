use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use url::Url;

use super::{
    best_audio_stream, AudioContainer, AudioDownloader, AudioStreamDescriptor, CaptionManifest,
    CaptionSource, CaptionTrack, VideoId,
};
use crate::scratch::ScratchFile;
use crate::session::Session;
use crate::TranscribeError;

const PLAYER_ENDPOINT: &str = "https://www.youtube.com/youtubei/v1/player";

// The Android client gets plain stream URLs without signature deciphering.
const CLIENT_NAME: &str = "ANDROID";
const CLIENT_VERSION: &str = "19.09.37";

/// Caption and audio-stream source speaking the Innertube player API.
///
/// All outbound calls go through the per-request [`Session`] so an imported
/// cookie jar authenticates caption and stream fetches alike.
#[derive(Debug, Default, Clone)]
pub struct YoutubeClient;

impl YoutubeClient {
    pub fn new() -> Self {
        Self
    }

    /// Query the player endpoint for a video's metadata.
    async fn player(&self, session: &Session, video: &VideoId) -> crate::Result<PlayerResponse> {
        let body = PlayerRequest {
            video_id: video.as_str(),
            context: ClientContext {
                client: ClientInfo {
                    client_name: CLIENT_NAME,
                    client_version: CLIENT_VERSION,
                    android_sdk_version: 30,
                    hl: "en",
                },
            },
        };

        let response = session
            .client
            .post(PLAYER_ENDPOINT)
            .json(&body)
            .send()
            .await
            .context("player request failed")?
            .error_for_status()
            .context("player request rejected")?;

        response
            .json::<PlayerResponse>()
            .await
            .context("failed to parse player response")
    }
}

#[async_trait]
impl CaptionSource for YoutubeClient {
    async fn caption_manifest(
        &self,
        session: &Session,
        video: &VideoId,
    ) -> crate::Result<CaptionManifest> {
        let player = self.player(session, video).await?;

        let tracks = player
            .captions
            .and_then(|c| c.player_captions_tracklist_renderer)
            .and_then(|r| r.caption_tracks)
            .unwrap_or_default()
            .into_iter()
            .map(|raw| CaptionTrack {
                language_code: raw.language_code,
                auto_generated: raw.kind.as_deref() == Some("asr"),
                base_url: raw.base_url,
                name: raw.name.and_then(RawTrackName::into_text),
            })
            .collect();

        Ok(CaptionManifest { tracks })
    }

    async fn caption_segments(
        &self,
        session: &Session,
        track: &CaptionTrack,
    ) -> crate::Result<Vec<String>> {
        let mut url = Url::parse(&track.base_url).context("invalid caption track url")?;
        url.query_pairs_mut().append_pair("fmt", "json3");

        let payload: CaptionPayload = session
            .client
            .get(url)
            .send()
            .await
            .context("caption request failed")?
            .error_for_status()
            .context("caption request rejected")?
            .json()
            .await
            .context("failed to parse caption payload")?;

        let segments = payload
            .events
            .unwrap_or_default()
            .into_iter()
            .filter_map(|event| event.segs)
            .map(|segs| {
                segs.into_iter()
                    .filter_map(|seg| seg.utf8)
                    .collect::<String>()
                    .replace('\n', " ")
            })
            .collect();

        Ok(segments)
    }
}

#[async_trait]
impl AudioDownloader for YoutubeClient {
    async fn download_audio(
        &self,
        session: &Session,
        video: &VideoId,
        scratch_dir: &Path,
    ) -> Result<ScratchFile, TranscribeError> {
        let player = self
            .player(session, video)
            .await
            .map_err(|e| TranscribeError::DownloadFailed(format!("{e:#}")))?;

        let streams: Vec<AudioStreamDescriptor> = player
            .streaming_data
            .and_then(|d| d.adaptive_formats)
            .unwrap_or_default()
            .into_iter()
            .filter_map(raw_format_to_descriptor)
            .collect();

        let best = best_audio_stream(&streams).ok_or(TranscribeError::NoAudioStream)?;

        tracing::info!(
            video = %video,
            container = best.container.as_str(),
            bitrate = best.bitrate,
            "Downloading audio stream"
        );

        let mut scratch = ScratchFile::allocate(scratch_dir, best.container.as_str());
        let written = stream_to_file(session, &best.url, scratch.path())
            .await
            .map_err(|e| TranscribeError::DownloadFailed(format!("{e:#}")))?;
        scratch.set_len(written);

        Ok(scratch)
    }
}

/// Stream a remote payload straight into a local file, chunk by chunk.
async fn stream_to_file(session: &Session, url: &str, path: &Path) -> crate::Result<u64> {
    let response = session
        .client
        .get(url)
        .send()
        .await
        .context("audio request failed")?
        .error_for_status()
        .context("audio request rejected")?;

    let mut file = tokio::fs::File::create(path)
        .await
        .context("failed to create scratch file")?;
    let mut written = 0u64;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("audio stream interrupted")?;
        file.write_all(&chunk)
            .await
            .context("failed to write scratch file")?;
        written += chunk.len() as u64;
    }

    file.flush().await.context("failed to flush scratch file")?;
    Ok(written)
}

fn raw_format_to_descriptor(raw: RawFormat) -> Option<AudioStreamDescriptor> {
    let container = AudioContainer::from_mime_type(&raw.mime_type)?;
    Some(AudioStreamDescriptor {
        url: raw.url?,
        container,
        bitrate: raw.bitrate.or(raw.average_bitrate)?,
        content_length: raw.content_length.and_then(|l| l.parse().ok()),
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlayerRequest<'a> {
    video_id: &'a str,
    context: ClientContext<'a>,
}

#[derive(Serialize)]
struct ClientContext<'a> {
    client: ClientInfo<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClientInfo<'a> {
    client_name: &'a str,
    client_version: &'a str,
    android_sdk_version: u32,
    hl: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerResponse {
    captions: Option<RawCaptions>,
    streaming_data: Option<RawStreamingData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCaptions {
    player_captions_tracklist_renderer: Option<RawTracklistRenderer>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTracklistRenderer {
    caption_tracks: Option<Vec<RawCaptionTrack>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCaptionTrack {
    base_url: String,
    language_code: String,
    kind: Option<String>,
    name: Option<RawTrackName>,
}

#[derive(Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
struct RawTrackName {
    simple_text: Option<String>,
    runs: Option<Vec<RawTextRun>>,
}

impl RawTrackName {
    fn into_text(self) -> Option<String> {
        self.simple_text.or_else(|| {
            self.runs
                .map(|runs| runs.into_iter().filter_map(|r| r.text).collect())
        })
    }
}

#[derive(Deserialize, Clone)]
struct RawTextRun {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStreamingData {
    adaptive_formats: Option<Vec<RawFormat>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFormat {
    url: Option<String>,
    mime_type: String,
    bitrate: Option<u64>,
    average_bitrate: Option<u64>,
    content_length: Option<String>,
}

#[derive(Deserialize)]
struct CaptionPayload {
    events: Option<Vec<CaptionEvent>>,
}

#[derive(Deserialize)]
struct CaptionEvent {
    segs: Option<Vec<CaptionSeg>>,
}

#[derive(Deserialize)]
struct CaptionSeg {
    utf8: Option<String>,
}
