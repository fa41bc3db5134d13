//! Upload sources with a known length

use bytes::Bytes;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};
use crate::fingerprint;
use crate::{ClientError, Result};

/// Seekable async byte stream
pub trait SourceReader: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T: AsyncRead + AsyncSeek + Send + Unpin + ?Sized> SourceReader for T {}

/// Where upload bytes come from. Every variant has a length known up front;
/// streams without one are not supported.
pub enum UploadSource {
    Path(PathBuf),
    Bytes(Bytes),
    Reader(Box<dyn SourceReader>),
}

impl UploadSource {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        UploadSource::Path(path.into())
    }

    pub fn bytes(bytes: impl Into<Bytes>) -> Self {
        UploadSource::Bytes(bytes.into())
    }

    pub fn reader(reader: impl SourceReader + 'static) -> Self {
        UploadSource::Reader(Box::new(reader))
    }

    /// Resolve the length and open the underlying file or stream
    pub async fn open(self) -> Result<OpenedSource> {
        match self {
            UploadSource::Path(path) => OpenedSource::open_path(path).await,
            UploadSource::Bytes(bytes) => Ok(OpenedSource {
                len: bytes.len() as u64,
                inner: Inner::Memory(bytes),
            }),
            UploadSource::Reader(mut reader) => {
                let len = reader.seek(SeekFrom::End(0)).await?;
                reader.seek(SeekFrom::Start(0)).await?;
                Ok(OpenedSource {
                    len,
                    inner: Inner::Reader(reader),
                })
            }
        }
    }
}

impl std::fmt::Debug for UploadSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            UploadSource::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            UploadSource::Reader(_) => f.write_str("Reader"),
        }
    }
}

impl From<PathBuf> for UploadSource {
    fn from(path: PathBuf) -> Self {
        UploadSource::Path(path)
    }
}

impl From<&Path> for UploadSource {
    fn from(path: &Path) -> Self {
        UploadSource::Path(path.to_path_buf())
    }
}

impl From<Vec<u8>> for UploadSource {
    fn from(bytes: Vec<u8>) -> Self {
        UploadSource::Bytes(bytes.into())
    }
}

impl From<Bytes> for UploadSource {
    fn from(bytes: Bytes) -> Self {
        UploadSource::Bytes(bytes)
    }
}

enum Inner {
    File {
        file: tokio::fs::File,
        path: PathBuf,
        modified: Option<SystemTime>,
    },
    Memory(Bytes),
    Reader(Box<dyn SourceReader>),
}

/// An opened source, read chunk by chunk at arbitrary offsets
pub struct OpenedSource {
    inner: Inner,
    len: u64,
}

impl OpenedSource {
    async fn open_path(path: PathBuf) -> Result<Self> {
        let path = tokio::fs::canonicalize(&path)
            .await
            .map_err(|e| ClientError::InvalidSource(format!("{}: {}", path.display(), e)))?;

        let meta = tokio::fs::metadata(&path).await?;
        if !meta.is_file() {
            return Err(ClientError::InvalidSource(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        let file = tokio::fs::File::open(&path).await?;
        Ok(OpenedSource {
            len: meta.len(),
            inner: Inner::File {
                file,
                path,
                modified: meta.modified().ok(),
            },
        })
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// File name for the `filename` metadata key, path sources only
    pub fn filename(&self) -> Option<String> {
        match &self.inner {
            Inner::File { path, .. } => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
            _ => None,
        }
    }

    /// Identity used to find an earlier upload of the same source
    pub async fn fingerprint(&mut self) -> Result<String> {
        match &self.inner {
            Inner::File { path, modified, .. } => Ok(fingerprint::for_path(path, self.len, *modified)),
            Inner::Memory(bytes) => Ok(fingerprint::for_content(bytes, self.len)),
            Inner::Reader(_) => {
                let head_len = self.len.min(fingerprint::PREFIX_BLOCK as u64);
                let head = self.read_chunk(0, head_len).await?;
                Ok(fingerprint::for_content(&head, self.len))
            }
        }
    }

    /// Exactly `len` bytes starting at `offset`
    pub async fn read_chunk(&mut self, offset: u64, len: u64) -> Result<Bytes> {
        let end = offset
            .checked_add(len)
            .filter(|end| *end <= self.len)
            .ok_or_else(|| {
                ClientError::InvalidSource(format!(
                    "range {}+{} is outside a {} byte source",
                    offset, len, self.len
                ))
            })?;

        match &mut self.inner {
            Inner::Memory(bytes) => Ok(bytes.slice(offset as usize..end as usize)),
            Inner::File { file, .. } => read_exact_at(file, offset, len).await,
            Inner::Reader(reader) => read_exact_at(reader, offset, len).await,
        }
    }
}

async fn read_exact_at<R: AsyncRead + AsyncSeek + Unpin + ?Sized>(
    reader: &mut R,
    offset: u64,
    len: u64,
) -> Result<Bytes> {
    reader.seek(SeekFrom::Start(offset)).await?;

    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ClientError::InvalidSource(format!("source ended before offset {}", offset + len))
        } else {
            ClientError::Io(e)
        }
    })?;

    Ok(buf.into())
}
