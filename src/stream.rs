//! Byte-range aware streaming of finished videos.
//!
//! The body is produced incrementally from a file handle positioned at the
//! requested offset and limited to the requested length, so memory use does
//! not depend on the file size and every request gets its own cursor.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use axum::body::Body;
use axum::http::{HeaderValue, Response, StatusCode, header};
use bytes::BytesMut;
use futures::stream;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt};
use tracing::debug;

use crate::error::{Result, SubcastError};

pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Inclusive byte range within an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for the `Content-Range` header
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, size)
    }

    /// Parse a `Range` header value against an artifact of `size` bytes.
    ///
    /// Only a single `bytes=start-end` range is accepted, `end` defaulting to
    /// the last byte. Anything else, or a range outside the artifact, is
    /// `RangeNotSatisfiable`.
    pub fn parse(header: &str, size: u64) -> Result<Self> {
        let unsatisfiable = || SubcastError::RangeNotSatisfiable {
            range: header.to_string(),
            size,
        };

        let ranges = header.trim().strip_prefix("bytes=").ok_or_else(unsatisfiable)?;
        if ranges.contains(',') {
            return Err(unsatisfiable());
        }
        let (start, end) = ranges.split_once('-').ok_or_else(unsatisfiable)?;
        let (start, end) = (start.trim(), end.trim());

        let start: u64 = start.parse().map_err(|_| unsatisfiable())?;
        let end: u64 = if end.is_empty() {
            size.checked_sub(1).ok_or_else(unsatisfiable)?
        } else {
            end.parse().map_err(|_| unsatisfiable())?
        };

        if start > end || end >= size {
            return Err(unsatisfiable());
        }

        Ok(Self { start, end })
    }
}

/// A request for a finished artifact, optionally limited to a byte range
#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub path: PathBuf,
    /// Raw `Range` header value
    pub range: Option<String>,
}

impl StreamRequest {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            range: None,
        }
    }

    pub fn with_range<S: Into<String>>(mut self, range: S) -> Self {
        self.range = Some(range.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct RangeStreamer {
    chunk_size: usize,
}

impl Default for RangeStreamer {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl RangeStreamer {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Build the HTTP response for `request`.
    ///
    /// 200 with the whole file when no range is given, 206 with
    /// `Content-Range` otherwise.
    pub async fn respond(&self, request: &StreamRequest) -> Result<Response<Body>> {
        let mut file = open_artifact(&request.path).await?;
        let size = file.metadata().await?.len();

        let (status, range) = match &request.range {
            Some(header) => (StatusCode::PARTIAL_CONTENT, Some(ByteRange::parse(header, size)?)),
            None => (StatusCode::OK, None),
        };

        let (offset, length) = match range {
            Some(range) => (range.start, range.len()),
            None => (0, size),
        };
        if offset > 0 {
            file.seek(SeekFrom::Start(offset)).await?;
        }
        debug!("Streaming {} bytes of {} from offset {}", length, request.path.display(), offset);

        let mut builder = Response::builder()
            .status(status)
            .header(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"))
            .header(header::CONTENT_LENGTH, length)
            .header(header::CONTENT_TYPE, content_type(&request.path));
        if let Some(range) = range {
            builder = builder.header(header::CONTENT_RANGE, range.content_range(size));
        }

        let body = Body::from_stream(chunked(file.take(length), self.chunk_size));
        builder
            .body(body)
            .map_err(|e| SubcastError::Io(std::io::Error::other(e)))
    }
}

async fn open_artifact(path: &Path) -> Result<File> {
    match File::open(path).await {
        Ok(file) => Ok(file),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(SubcastError::ArtifactNotFound(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

fn chunked<R>(reader: R, chunk_size: usize) -> impl futures::Stream<Item = std::io::Result<bytes::Bytes>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    stream::try_unfold(reader, move |mut reader| async move {
        let mut buf = BytesMut::zeroed(chunk_size);
        let read = reader.read(&mut buf).await?;
        if read == 0 {
            return Ok(None);
        }
        buf.truncate(read);
        Ok(Some((buf.freeze(), reader)))
    })
}

fn content_type(path: &Path) -> &'static str {
    match path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .as_deref()
    {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("mov") => "video/quicktime",
        _ => "application/octet-stream",
    }
}
