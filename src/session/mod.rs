use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::cookie::Jar;
use url::Url;

/// Fixed user-agent attached to every outbound session so caption and audio
/// fetches look like a real browser.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Netscape `#HttpOnly_` domain prefix; not a comment, despite the `#`.
const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

/// One imported session cookie in the Netscape cookies.txt layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieRecord {
    pub domain: String,
    pub include_subdomains: bool,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    pub name: String,
    pub value: String,
}

impl CookieRecord {
    /// Render the record as a `Set-Cookie` header value for the jar.
    fn set_cookie_header(&self) -> String {
        let mut header = format!(
            "{}={}; Domain={}; Path={}",
            self.name, self.value, self.domain, self.path
        );
        if self.secure {
            header.push_str("; Secure");
        }
        if self.http_only {
            header.push_str("; HttpOnly");
        }
        header
    }

    /// Origin URL the cookie is registered under.
    fn origin_url(&self) -> Option<Url> {
        Url::parse(&format!("https://{}/", self.domain.trim_start_matches('.'))).ok()
    }
}

/// Aggregate outcome of a cookie jar import.
#[derive(Debug, Default, Clone, Copy)]
pub struct CookieImportReport {
    pub imported: usize,
    pub skipped: usize,
}

/// Configured network client for caption and audio fetches.
///
/// Built once per request; `authenticated` records whether a cookie jar was
/// actually imported.
#[derive(Debug, Clone)]
pub struct Session {
    pub client: reqwest::Client,
    pub authenticated: bool,
}

impl Session {
    /// Build an anonymous session carrying only the browser user-agent.
    pub fn anonymous() -> Self {
        Self {
            client: build_client(None),
            authenticated: false,
        }
    }

    /// Build a session from an optional base64-encoded cookies.txt blob.
    ///
    /// Cookie import failure is never surfaced: any decode or parse problem
    /// degrades to an anonymous session with a warning in the logs.
    pub fn with_cookie_blob(blob: Option<&str>) -> Self {
        let Some(blob) = blob.filter(|b| !b.trim().is_empty()) else {
            return Self::anonymous();
        };

        let text = match BASE64
            .decode(blob.trim())
            .map_err(anyhow::Error::from)
            .and_then(|bytes| String::from_utf8(bytes).map_err(anyhow::Error::from))
        {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to decode cookie blob, using anonymous session");
                return Self::anonymous();
            }
        };

        let (records, report) = parse_cookie_jar(&text);
        let jar = Arc::new(Jar::default());
        let mut imported = 0usize;
        for record in &records {
            match record.origin_url() {
                Some(origin) => {
                    jar.add_cookie_str(&record.set_cookie_header(), &origin);
                    imported += 1;
                }
                None => {
                    tracing::debug!(domain = %record.domain, "Skipping cookie with unusable domain");
                }
            }
        }

        tracing::info!(
            imported,
            skipped = report.skipped + (records.len() - imported),
            "Imported session cookies"
        );

        Self {
            client: build_client(Some(jar)),
            authenticated: imported > 0,
        }
    }
}

fn build_client(jar: Option<Arc<Jar>>) -> reqwest::Client {
    let mut builder = reqwest::Client::builder().user_agent(BROWSER_USER_AGENT);
    if let Some(jar) = jar {
        builder = builder.cookie_provider(jar);
    }
    builder.build().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to build configured HTTP client, using default");
        reqwest::Client::new()
    })
}

/// Parse a Netscape cookies.txt document into validated records.
///
/// Tolerant by design: blank lines, comments, and lines with fewer than seven
/// tab-separated fields are skipped without aborting the rest of the parse.
pub fn parse_cookie_jar(text: &str) -> (Vec<CookieRecord>, CookieImportReport) {
    let mut records = Vec::new();
    let mut report = CookieImportReport::default();

    for line in text.lines() {
        match parse_cookie_line(line) {
            Some(record) => {
                report.imported += 1;
                records.push(record);
            }
            None => {
                if !line.trim().is_empty() {
                    report.skipped += 1;
                }
            }
        }
    }

    (records, report)
}

/// Parse one cookies.txt line: `domain, includeSubdomains, path, secure,
/// expiry, name, value`, tab-separated.
fn parse_cookie_line(line: &str) -> Option<CookieRecord> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    // A leading # is a comment unless it is the HttpOnly domain marker.
    let (line, http_only) = if let Some(rest) = trimmed.strip_prefix(HTTP_ONLY_PREFIX) {
        (rest.to_string(), true)
    } else if trimmed.starts_with('#') {
        return None;
    } else {
        (trimmed.to_string(), false)
    };

    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 7 {
        return None;
    }

    let raw_domain = fields[0].trim();
    if raw_domain.is_empty() || fields[5].trim().is_empty() {
        return None;
    }

    // Mark every imported cookie domain-wide.
    let domain = if raw_domain.starts_with('.') {
        raw_domain.to_string()
    } else {
        format!(".{raw_domain}")
    };

    let path = if fields[2].trim().is_empty() {
        "/".to_string()
    } else {
        fields[2].trim().to_string()
    };

    Some(CookieRecord {
        domain,
        include_subdomains: fields[1].trim().eq_ignore_ascii_case("TRUE"),
        path,
        secure: fields[3].trim().eq_ignore_ascii_case("TRUE"),
        http_only,
        name: fields[5].trim().to_string(),
        value: fields[6].trim().to_string(),
    })
}
