use std::net::SocketAddr;

use clap::Parser;

const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024 * 1024; // 1 GiB

/// Runtime configuration, populated from flags or environment variables.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "vidscribe",
    about = "Transcription service: YouTube captions first, OpenAI Whisper as fallback",
    version
)]
pub struct Config {
    /// Address the HTTP server binds to
    #[arg(long, env = "VIDSCRIBE_BIND", default_value = "0.0.0.0:8080")]
    pub bind: SocketAddr,

    /// OpenAI API key for the Whisper fallback (requests that need it fail
    /// with a configuration error when absent)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Base URL of the OpenAI-compatible speech API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub openai_base_url: String,

    /// Speech-to-text model submitted with every transcription request
    #[arg(long, env = "WHISPER_MODEL", default_value = "whisper-1")]
    pub whisper_model: String,

    /// Base64-encoded Netscape cookies.txt blob used to authenticate caption
    /// and audio fetches as a real browsing session
    #[arg(long, env = "YOUTUBE_COOKIES_B64", hide_env_values = true)]
    pub cookie_blob: Option<String>,

    /// Serve caption tracks only: when no caption text is found, answer with
    /// a caption-unavailable error instead of downloading audio server-side
    #[arg(long, env = "VIDSCRIBE_CAPTIONS_ONLY")]
    pub captions_only: bool,

    /// Fetch captions with an anonymous session even when a cookie blob is
    /// configured
    #[arg(long, env = "VIDSCRIBE_ANONYMOUS_CAPTIONS")]
    pub anonymous_captions: bool,

    /// Maximum accepted request body size in bytes
    #[arg(long, env = "VIDSCRIBE_MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,
}

impl Config {
    /// Load configuration from command line and environment.
    pub fn load() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::parse_from(["vidscribe"]);
        assert_eq!(config.bind.port(), 8080);
        assert_eq!(config.openai_base_url, "https://api.openai.com/v1");
        assert_eq!(config.whisper_model, "whisper-1");
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
        assert!(!config.captions_only);
        assert!(!config.anonymous_captions);
    }

    #[test]
    fn test_flags() {
        let config = Config::parse_from([
            "vidscribe",
            "--captions-only",
            "--bind",
            "127.0.0.1:9000",
            "--max-body-bytes",
            "1048576",
        ]);
        assert!(config.captions_only);
        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.max_body_bytes, 1_048_576);
    }
}
