//! Local filename resolution for fetched artifacts
//!
//! Precedence, first usable candidate wins:
//! 1. `Content-Disposition` `filename`
//! 2. `Content-Disposition` `filename*` (RFC 5987, percent-decoded)
//! 3. the caller-suggested filename
//! 4. the last path segment of the source URL
//! 5. `download_<unix millis><ext>` with `<ext>` guessed from the declared MIME
//!
//! Every candidate is reduced to its base component. A candidate that reduces
//! to `.`, `..` or nothing falls through to the next rule.

use reqwest::header::{CONTENT_DISPOSITION, HeaderMap};
use tracing::debug;

/// A sanitized base name, safe to join onto a storage directory
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedFilename {
    name: String,
    source: NameSource,
}

impl ResolvedFilename {
    /// The file name
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Which rule produced the name
    pub fn source(&self) -> NameSource {
        self.source
    }

    /// Consume into the plain string
    pub fn into_string(self) -> String {
        self.name
    }
}

impl std::fmt::Display for ResolvedFilename {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Rule that produced a [`ResolvedFilename`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NameSource {
    /// `filename=` parameter
    DispositionFilename,
    /// `filename*=` parameter
    DispositionFilenameStar,
    /// Caller-suggested name
    Suggested,
    /// Last URL path segment
    UrlPath,
    /// `download_<millis><ext>`
    Generated,
}

/// Resolve the local filename for a response
///
/// # Examples
///
/// ```
/// use download_gate::naming::resolve_filename;
/// use reqwest::header::HeaderMap;
///
/// let name = resolve_filename(
///     &HeaderMap::new(),
///     "",
///     "",
///     "https://host/dir/report.pdf",
/// );
/// assert_eq!(name.as_str(), "report.pdf");
/// ```
pub fn resolve_filename(
    headers: &HeaderMap,
    suggested: &str,
    declared_mime: &str,
    source_url: &str,
) -> ResolvedFilename {
    let disposition = headers
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_content_disposition)
        .unwrap_or_default();

    let candidates = [
        (disposition.filename, NameSource::DispositionFilename),
        (
            disposition.filename_star.map(|v| decode_rfc5987(&v)),
            NameSource::DispositionFilenameStar,
        ),
        (Some(suggested.to_string()), NameSource::Suggested),
        (last_url_segment(source_url), NameSource::UrlPath),
    ];

    for (candidate, source) in candidates {
        if let Some(name) = candidate.as_deref().and_then(sanitize_filename) {
            debug!(filename = %name, ?source, "resolved filename");
            return ResolvedFilename { name, source };
        }
    }

    let name = format!(
        "download_{}{}",
        chrono::Utc::now().timestamp_millis(),
        guess_extension(declared_mime)
    );
    debug!(filename = %name, "no usable name, generated one");
    ResolvedFilename {
        name,
        source: NameSource::Generated,
    }
}

/// Reduce a name to its base component, or None if nothing safe remains
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let base = raw
        .trim()
        .trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .trim();

    if base.is_empty() || base == "." || base == ".." {
        return None;
    }

    Some(
        base.chars()
            .map(|c| if c.is_control() { '_' } else { c })
            .collect(),
    )
}

/// Best-effort extension for a MIME type when no name is known
pub fn guess_extension(mime: &str) -> &'static str {
    let mime = mime
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    match mime.as_str() {
        "application/pdf" => ".pdf",
        "image/jpeg" => ".jpg",
        "text/plain" => ".txt",
        "application/zip" => ".zip",
        "video/mp4" => ".mp4",
        "audio/mpeg" => ".mp3",
        m if m.starts_with("audio/") => ".mp3",
        _ => ".bin",
    }
}

/// Parsed `Content-Disposition` parameters we care about
#[derive(Debug, Default, PartialEq, Eq)]
struct ContentDisposition {
    filename: Option<String>,
    filename_star: Option<String>,
}

/// Parse an `attachment`/`inline` disposition header
///
/// Other disposition types and malformed headers yield None.
fn parse_content_disposition(value: &str) -> Option<ContentDisposition> {
    let mut parts = split_params(value).into_iter();
    let kind = parts.next()?;
    let kind = kind.trim();
    if !kind.eq_ignore_ascii_case("attachment") && !kind.eq_ignore_ascii_case("inline") {
        return None;
    }

    let mut disposition = ContentDisposition::default();
    for part in parts {
        let Some((key, raw)) = part.split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = unquote(raw.trim());
        if value.trim().is_empty() {
            continue;
        }
        match key.as_str() {
            "filename" => disposition.filename = Some(value),
            "filename*" => disposition.filename_star = Some(value),
            _ => {}
        }
    }
    Some(disposition)
}

/// Split on `;` outside of double quotes
fn split_params(value: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for c in value.chars() {
        match c {
            _ if escaped => {
                current.push(c);
                escaped = false;
            }
            '\\' if in_quotes => {
                current.push(c);
                escaped = true;
            }
            '"' => {
                current.push(c);
                in_quotes = !in_quotes;
            }
            ';' if !in_quotes => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);
    parts
}

/// Strip surrounding quotes and resolve backslash escapes
fn unquote(value: &str) -> String {
    match value
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
    {
        Some(inner) => {
            let mut out = String::with_capacity(inner.len());
            let mut chars = inner.chars();
            while let Some(c) = chars.next() {
                if c == '\\' {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                } else {
                    out.push(c);
                }
            }
            out
        }
        None => value.to_string(),
    }
}

/// Decode an RFC 5987 `charset'lang'value`, or plain percent-decode otherwise
fn decode_rfc5987(value: &str) -> String {
    let encoded = match value.splitn(3, '\'').collect::<Vec<_>>().as_slice() {
        [_charset, _lang, encoded] => *encoded,
        _ => value,
    };
    match urlencoding::decode(encoded) {
        Ok(decoded) if !decoded.is_empty() => decoded.into_owned(),
        _ => value.to_string(),
    }
}

/// Last non-empty path segment of a URL, percent-decoded
fn last_url_segment(source_url: &str) -> Option<String> {
    let parsed = url::Url::parse(source_url).ok()?;
    let segment = parsed.path_segments()?.rev().find(|s| !s.is_empty())?;
    Some(
        urlencoding::decode(segment)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| segment.to_string()),
    )
}
