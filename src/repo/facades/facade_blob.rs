use super::StorageError;
use crate::store::{self, TransferEvent};
use crate::{params, types, utils::completion};
use bytes::Bytes;
use log::{debug, info, trace};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Facade used to transfer files between the local filesystem and the blob store.
///
/// Every blob path is resolved relative to `root`.
pub struct FacadeBlob {
    store: store::BlobStoreRef,
    root: types::BlobRef,
}

impl FacadeBlob {
    pub fn new(store: store::BlobStoreRef, root: types::BlobRef) -> Self {
        Self { store, root }
    }

    pub fn root(&self) -> &types::BlobRef {
        &self.root
    }

    /// Uploads `files` one after the other into `folder`, each file keeps its name.
    ///
    /// `on_progress` receives the overall batch progress in `[0, 1]`, each file
    /// contributing `1/N` of it. The first failing file aborts the batch, files
    /// already uploaded are left in place. Returns the full path of each uploaded
    /// blob, in input order.
    pub async fn upload_batch<P>(
        &self,
        files: &[PathBuf],
        folder: &str,
        mut on_progress: P,
    ) -> Result<Vec<String>, StorageError>
    where
        P: FnMut(f64),
    {
        if files.is_empty() {
            return Ok(Vec::new());
        }

        let total = files.len() as f64;
        let destination = self.root.child(folder);
        let mut uploaded = Vec::with_capacity(files.len());

        for (index, file) in files.iter().enumerate() {
            let name = file
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| {
                    StorageError::Unknown(format!("`{}` has no file name", file.display()))
                })?;
            let dest = destination.child(name);

            trace!("uploading file {}/{} to `{}`", index + 1, files.len(), dest);

            let full_path = self
                .upload(file, &dest, |ratio| {
                    on_progress((index as f64 + ratio) / total);
                })
                .await?;

            uploaded.push(full_path);
        }

        info!("uploaded {} files to `{}`", uploaded.len(), destination);

        Ok(uploaded)
    }

    /// Uploads `files` into `folder` without progress reporting.
    pub async fn upload_files(
        &self,
        files: &[PathBuf],
        folder: &str,
    ) -> Result<Vec<String>, StorageError> {
        self.upload_batch(files, folder, |_| {}).await
    }

    /// Uploads a single file, `on_progress` receives the ratio of sent bytes.
    pub async fn upload<P>(
        &self,
        local: &Path,
        dest: &types::BlobRef,
        mut on_progress: P,
    ) -> Result<String, StorageError>
    where
        P: FnMut(f64),
    {
        let (done, mut pending) = completion::channel::<Result<String, store::Error>>();
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<f64>();

        self.store.put_file(
            local,
            dest,
            Box::new(move |event| match event {
                TransferEvent::Progress { completed, total } => {
                    let ratio = if total == 0 {
                        1.0
                    } else {
                        completed as f64 / total as f64
                    };
                    // the receiver is dropped once the transfer is resolved
                    progress_tx.send(ratio).ok();
                }
                TransferEvent::Success { full_path } => {
                    done.resolve(Ok(full_path));
                }
                TransferEvent::Failure(e) => {
                    done.resolve(Err(e));
                }
            }),
        );

        let result = loop {
            tokio::select! {
                biased;
                Some(ratio) = progress_rx.recv() => on_progress(ratio),
                result = &mut pending => break result,
            }
        };

        // progress events emitted right before the terminal event
        while let Ok(ratio) = progress_rx.try_recv() {
            on_progress(ratio);
        }

        match result {
            Some(Ok(full_path)) => {
                debug!("`{}` uploaded to `{}`", local.display(), full_path);
                Ok(full_path)
            }
            Some(Err(e)) => Err(e.into()),
            None => Err(StorageError::Unknown(format!(
                "upload of `{}` ended without a result",
                local.display()
            ))),
        }
    }

    /// Downloads the blob at `path` (relative to the root) into `local`.
    pub async fn download(&self, path: &str, local: &Path) -> Result<u64, StorageError> {
        let src = self.root.child(path);
        let written = self.store.get_to_file(&src, local).await?;
        debug!("`{}` downloaded to `{}`", src, local.display());
        Ok(written)
    }

    /// Loads the blob `id` in memory.
    ///
    /// Blobs larger than the configured download limit are refused.
    pub async fn fetch(&self, id: &str) -> Result<Bytes, StorageError> {
        let src = self.root.child(id);
        let max_size = params::configurables().max_download_bytes;
        Ok(self.store.get_bytes(&src, max_size).await?)
    }

    /// Deletes the blob at `path` (relative to the root).
    pub async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let src = self.root.child(path);
        self.store.delete(&src).await?;
        debug!("`{}` deleted", src);
        Ok(())
    }
}
