use crate::extractors::{CaptionSource, CaptionTrack, VideoId};
use crate::session::Session;

/// Fetch the best matching caption text for a video.
///
/// Returns `Ok(None)` when the video offers no usable track or the selected
/// track has no text; errors from the caption source bubble up for the
/// orchestrator to recover from.
pub async fn fetch(
    source: &dyn CaptionSource,
    session: &Session,
    video: &VideoId,
    preferred_language: Option<&str>,
) -> crate::Result<Option<String>> {
    let manifest = source.caption_manifest(session, video).await?;
    if manifest.tracks.is_empty() {
        tracing::info!(video = %video, "Video offers no caption tracks");
        return Ok(None);
    }

    let Some(track) = select_track(&manifest.tracks, preferred_language) else {
        return Ok(None);
    };

    tracing::info!(
        video = %video,
        language = %track.language_code,
        auto_generated = track.auto_generated,
        "Selected caption track"
    );

    let segments = source.caption_segments(session, track).await?;
    let text = concatenate_segments(&segments);

    if text.is_empty() {
        tracing::info!(video = %video, "Selected caption track is blank");
        Ok(None)
    } else {
        Ok(Some(text))
    }
}

/// Track selection policy: a case-insensitive preferred-language match wins,
/// manually-created tracks rank above auto-generated ones, and ties keep the
/// manifest order.
pub fn select_track<'a>(
    tracks: &'a [CaptionTrack],
    preferred_language: Option<&str>,
) -> Option<&'a CaptionTrack> {
    if let Some(lang) = preferred_language {
        let mut matches: Vec<&CaptionTrack> = tracks
            .iter()
            .filter(|t| t.language_code.eq_ignore_ascii_case(lang))
            .collect();
        matches.sort_by_key(|t| t.auto_generated);
        if let Some(track) = matches.first() {
            return Some(track);
        }
    }

    let mut all: Vec<&CaptionTrack> = tracks.iter().collect();
    all.sort_by_key(|t| t.auto_generated);
    all.first().copied()
}

/// Join non-blank caption segments with single spaces, preserving order.
pub fn concatenate_segments(segments: &[String]) -> String {
    segments
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize a caller-supplied language preference to a caption language
/// code.
///
/// Common names are mapped explicitly, any other two-character code passes
/// through lowercased, and everything else means no preference.
pub fn normalize_language(lang: &str) -> Option<String> {
    let lowered = lang.trim().to_lowercase();
    match lowered.as_str() {
        "tr" | "turkish" | "türkçe" => Some("tr".to_string()),
        "en" | "english" | "ingilizce" => Some("en".to_string()),
        _ if lowered.chars().count() == 2 => Some(lowered),
        _ => None,
    }
}
