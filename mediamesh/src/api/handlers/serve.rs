//! `GET /serve?path=...`: stream a local file, honoring a single byte range.
//!
//! The requested path is resolved against the media root and canonicalized;
//! anything that resolves outside the root is refused. Supported ranges:
//!
//! ```text
//! bytes=500-999   bytes 500..=999
//! bytes=500-      from 500 to the end
//! bytes=-500      the last 500 bytes
//! ```

use std::io::SeekFrom;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use serde::Deserialize;
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use crate::api::{ApiError, ApiState};

const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Debug, Deserialize)]
pub struct ServeQuery {
    pub path: String,
}

/// An inclusive byte range within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered; never zero.
    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Why a `Range` header could not be honored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeError {
    /// Not a single `bytes=` range; the header is ignored.
    Malformed,
    /// Syntactically valid but outside the file.
    Unsatisfiable,
}

/// Parse a single-range `Range` header against a file of `len` bytes.
pub fn parse_range(header: &str, len: u64) -> Result<ByteRange, RangeError> {
    let spec = header
        .trim()
        .strip_prefix("bytes=")
        .ok_or(RangeError::Malformed)?;
    if spec.contains(',') {
        return Err(RangeError::Malformed);
    }
    let (start, end) = spec.split_once('-').ok_or(RangeError::Malformed)?;
    let (start, end) = (start.trim(), end.trim());

    let parse = |s: &str| s.parse::<u64>().map_err(|_| RangeError::Malformed);

    if start.is_empty() {
        let suffix = parse(end)?;
        if suffix == 0 || len == 0 {
            return Err(RangeError::Unsatisfiable);
        }
        return Ok(ByteRange {
            start: len.saturating_sub(suffix),
            end: len - 1,
        });
    }

    let start = parse(start)?;
    let end = if end.is_empty() {
        None
    } else {
        Some(parse(end)?)
    };
    if let Some(end) = end {
        if end < start {
            return Err(RangeError::Malformed);
        }
    }
    if start >= len {
        return Err(RangeError::Unsatisfiable);
    }
    Ok(ByteRange {
        start,
        end: end.map_or(len - 1, |e| e.min(len - 1)),
    })
}

pub async fn serve_file(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<ServeQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let root = fs::canonicalize(&state.media_root)
        .await
        .map_err(|e| ApiError::Internal(format!("media root unavailable: {}", e)))?;

    let relative = query.path.trim_start_matches(['/', '\\']);
    let resolved = fs::canonicalize(root.join(relative))
        .await
        .map_err(|_| ApiError::NotFound(format!("no such file: {}", query.path)))?;
    if !resolved.starts_with(&root) {
        warn!(path = %query.path, "Refused path outside the media root");
        return Err(ApiError::Forbidden("path is outside the media root".to_string()));
    }

    let metadata = fs::metadata(&resolved)
        .await
        .map_err(|_| ApiError::NotFound(format!("no such file: {}", query.path)))?;
    if !metadata.is_file() {
        return Err(ApiError::NotFound(format!("not a file: {}", query.path)));
    }
    let len = metadata.len();

    let requested = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .filter(|_| len > 0);
    let range = match requested.map(|r| parse_range(r, len)) {
        Some(Ok(range)) => Some(range),
        Some(Err(RangeError::Unsatisfiable)) => {
            return Response::builder()
                .status(StatusCode::RANGE_NOT_SATISFIABLE)
                .header(header::CONTENT_RANGE, format!("bytes */{}", len))
                .header(header::ACCEPT_RANGES, "bytes")
                .body(Body::empty())
                .map_err(|e| ApiError::Internal(e.to_string()));
        }
        Some(Err(RangeError::Malformed)) | None => None,
    };

    let mut file = File::open(&resolved)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to open file: {}", e)))?;

    let builder = Response::builder()
        .header(header::CONTENT_TYPE, OCTET_STREAM)
        .header(header::ACCEPT_RANGES, "bytes");

    let response = match range {
        Some(range) => {
            file.seek(SeekFrom::Start(range.start))
                .await
                .map_err(|e| ApiError::Internal(format!("failed to seek: {}", e)))?;
            debug!(path = %query.path, start = range.start, end = range.end, "Serving range");
            builder
                .status(StatusCode::PARTIAL_CONTENT)
                .header(
                    header::CONTENT_RANGE,
                    format!("bytes {}-{}/{}", range.start, range.end, len),
                )
                .header(header::CONTENT_LENGTH, range.length())
                .body(Body::from_stream(ReaderStream::new(file.take(range.length()))))
        }
        None => {
            debug!(path = %query.path, bytes = len, "Serving file");
            builder
                .status(StatusCode::OK)
                .header(header::CONTENT_LENGTH, len)
                .body(Body::from_stream(ReaderStream::new(file)))
        }
    };
    response.map_err(|e| ApiError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_closed_range() {
        assert_eq!(
            parse_range("bytes=10-19", 100),
            Ok(ByteRange { start: 10, end: 19 })
        );
    }

    #[test]
    fn test_parse_open_range() {
        assert_eq!(
            parse_range("bytes=90-", 100),
            Ok(ByteRange { start: 90, end: 99 })
        );
    }

    #[test]
    fn test_parse_suffix_range() {
        assert_eq!(
            parse_range("bytes=-10", 100),
            Ok(ByteRange { start: 90, end: 99 })
        );
        assert_eq!(
            parse_range("bytes=-500", 100),
            Ok(ByteRange { start: 0, end: 99 })
        );
    }

    #[test]
    fn test_end_is_clamped() {
        let range = parse_range("bytes=50-5000", 100).unwrap();
        assert_eq!(range, ByteRange { start: 50, end: 99 });
        assert_eq!(range.length(), 50);
    }

    #[test]
    fn test_unsatisfiable_ranges() {
        assert_eq!(parse_range("bytes=100-", 100), Err(RangeError::Unsatisfiable));
        assert_eq!(parse_range("bytes=-0", 100), Err(RangeError::Unsatisfiable));
    }

    #[test]
    fn test_malformed_ranges() {
        assert_eq!(parse_range("items=0-1", 100), Err(RangeError::Malformed));
        assert_eq!(parse_range("bytes=0-1,5-6", 100), Err(RangeError::Malformed));
        assert_eq!(parse_range("bytes=9-3", 100), Err(RangeError::Malformed));
        assert_eq!(parse_range("bytes=a-", 100), Err(RangeError::Malformed));
    }
}
