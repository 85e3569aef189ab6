use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use log::{debug, trace, warn};
use object_store::{ObjectStore, PutPayload, WriteMultipart};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::{Error, ErrorCode};
use crate::{params, types::BlobRef};

pub type BlobStoreRef = Arc<dyn BlobStore>;

/// Maximum number of multipart chunks uploading at the same time.
const MAX_IN_FLIGHT_PARTS: usize = 4;

/// Events emitted while a transfer is running.
///
/// A transfer emits any number of [`TransferEvent::Progress`] events followed by
/// a single terminal event, either [`TransferEvent::Success`] or
/// [`TransferEvent::Failure`].
#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    Progress { completed: u64, total: u64 },
    Success { full_path: String },
    Failure(Error),
}

pub type TransferObserver = Box<dyn FnMut(TransferEvent) + Send + 'static>;

/// Capabilities required from an object storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Starts the upload of a local file to `dest`.
    ///
    /// The call returns immediately, transfer state is reported to the `observer`.
    fn put_file(&self, local: &Path, dest: &BlobRef, observer: TransferObserver);

    /// Downloads a blob into a local file, returning the number of written bytes.
    async fn get_to_file(&self, src: &BlobRef, local: &Path) -> Result<u64, Error>;

    /// Loads a blob in memory, failing if the blob is larger than `max_size` bytes.
    async fn get_bytes(&self, src: &BlobRef, max_size: u64) -> Result<Bytes, Error>;

    async fn delete(&self, src: &BlobRef) -> Result<(), Error>;
}

/// [`BlobStore`] implementation backed by an [`ObjectStore`].
///
/// Uploads run on a background tokio task, so [`BlobStore::put_file`] must be
/// called from inside a tokio runtime.
#[derive(Clone)]
pub struct ObjectBlobStore {
    inner: Arc<dyn ObjectStore>,
    chunk_size: usize,
}

impl ObjectBlobStore {
    pub fn new(inner: Arc<dyn ObjectStore>) -> Self {
        Self {
            inner,
            chunk_size: params::configurables().upload_chunk_bytes,
        }
    }

    /// Builds a store from an URL (e.g. `file:///data/blobs`, `s3://bucket/prefix`,
    /// `memory:///`), returning the store and the reference to the URL path.
    pub fn from_url(url: &str) -> Result<(Self, BlobRef), Error> {
        let url = url::Url::parse(url)
            .map_err(|e| Error::new(ErrorCode::InvalidArgument, format!("bad url `{url}`: {e}")))?;
        let (store, path) = object_store::parse_url(&url)?;

        debug!("object store at `{}` (root: `{}`)", url, path);

        Ok((Self::new(Arc::from(store)), BlobRef::from(path)))
    }

    /// Size of the parts sent by multipart uploads; files up to this size are
    /// uploaded with a single request.
    ///
    /// The value is not clamped: S3 rejects non final parts below 5 MiB, smaller
    /// sizes only suit stores without that limit (memory, local filesystem).
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn into_ref(self) -> BlobStoreRef {
        Arc::new(self)
    }
}

#[async_trait]
impl BlobStore for ObjectBlobStore {
    fn put_file(&self, local: &Path, dest: &BlobRef, mut observer: TransferObserver) {
        let store = self.inner.clone();
        let chunk_size = self.chunk_size;
        let local = local.to_path_buf();
        let dest = dest.clone();

        tokio::spawn(async move {
            match upload(store, &local, &dest, chunk_size, &mut observer).await {
                Ok(()) => {
                    trace!("uploaded `{}` to `{}`", local.display(), dest);
                    observer(TransferEvent::Success {
                        full_path: dest.full_path(),
                    });
                }
                Err(e) => {
                    warn!("upload of `{}` failed: {}", local.display(), e);
                    observer(TransferEvent::Failure(e));
                }
            }
        });
    }

    async fn get_to_file(&self, src: &BlobRef, local: &Path) -> Result<u64, Error> {
        let result = self.inner.get(src.as_path()).await?;
        let mut stream = result.into_stream();
        let mut file = tokio::fs::File::create(local).await?;

        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        trace!("downloaded {} bytes from `{}`", written, src);
        Ok(written)
    }

    async fn get_bytes(&self, src: &BlobRef, max_size: u64) -> Result<Bytes, Error> {
        let meta = self.inner.head(src.as_path()).await?;
        let size = meta.size as u64;
        if size > max_size {
            return Err(Error::new(
                ErrorCode::ResourceExhausted,
                format!("`{src}` is {size} bytes, above the {max_size} bytes limit"),
            ));
        }

        Ok(self.inner.get(src.as_path()).await?.bytes().await?)
    }

    async fn delete(&self, src: &BlobRef) -> Result<(), Error> {
        self.inner.delete(src.as_path()).await?;
        Ok(())
    }
}

async fn upload(
    store: Arc<dyn ObjectStore>,
    local: &Path,
    dest: &BlobRef,
    chunk_size: usize,
    observer: &mut TransferObserver,
) -> Result<(), Error> {
    let mut file = tokio::fs::File::open(local).await?;
    let total = file.metadata().await?.len();

    observer(TransferEvent::Progress {
        completed: 0,
        total,
    });

    // small files go with a single request
    if total <= chunk_size as u64 {
        let mut buf = Vec::with_capacity(total as usize);
        file.read_to_end(&mut buf).await?;
        store.put(dest.as_path(), PutPayload::from(buf)).await?;
        observer(TransferEvent::Progress {
            completed: total,
            total,
        });
        return Ok(());
    }

    let mut writer = WriteMultipart::new_with_chunk_size(
        store.put_multipart(dest.as_path()).await?,
        chunk_size,
    );

    let mut buf = vec![0u8; chunk_size];
    let mut completed = 0u64;

    loop {
        let n = match file.read(&mut buf).await {
            Ok(n) => n,
            Err(e) => {
                writer.abort().await.ok();
                return Err(e.into());
            }
        };
        if n == 0 {
            break;
        }

        if let Err(e) = writer.wait_for_capacity(MAX_IN_FLIGHT_PARTS).await {
            writer.abort().await.ok();
            return Err(e.into());
        }
        writer.write(&buf[..n]);

        completed += n as u64;
        observer(TransferEvent::Progress { completed, total });
    }

    writer.finish().await?;
    Ok(())
}
