//! A backend that stores objects as files below a root directory.
//!
//! Uploads are written to a hidden temporary file first and renamed into place once complete,
//! so that listings never show partial objects.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::pin::pin;

use futures_util::StreamExt;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::io::{ReaderStream, StreamReader};

use super::common::{Backend, Listing, ObjectInfo};
use crate::PayloadStream;
use crate::error::Result;

/// Prefix of in-progress uploads. Such files are invisible to listings.
const TEMP_PREFIX: &str = ".tmp-";

/// A [`Backend`] storing objects as files below a root directory.
#[derive(Debug)]
pub struct LocalFs {
    path: PathBuf,
}

impl LocalFs {
    /// Creates a backend rooted at `path`. The directory is created lazily on first write.
    pub fn new(path: &Path) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl Backend for LocalFs {
    fn name(&self) -> &'static str {
        "local-fs"
    }

    async fn list_folder(&self, folder: &str) -> Result<Listing> {
        let dir = self.path.join(folder);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Listing::default()),
            Err(err) => return Err(err.into()),
        };

        let mut listing = Listing::default();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(TEMP_PREFIX) {
                continue;
            }

            let metadata = entry.metadata().await?;
            if metadata.is_dir() {
                listing.subfolders.push(name);
            } else {
                listing.objects.push(ObjectInfo {
                    name,
                    size: metadata.len(),
                    last_modified: metadata.modified()?,
                });
            }
        }

        listing.objects.sort_by(|a, b| a.name.cmp(&b.name));
        listing.subfolders.sort();
        tracing::debug!(
            folder,
            objects = listing.objects.len(),
            subfolders = listing.subfolders.len(),
            "Listed local folder"
        );
        Ok(listing)
    }

    async fn get_object(&self, path: &str) -> Result<Option<PayloadStream>> {
        let path = self.path.join(path);
        let file = match OpenOptions::new().read(true).open(path).await {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        let stream = ReaderStream::new(file);
        Ok(Some(stream.boxed()))
    }

    async fn put_object(&self, path: &str, stream: PayloadStream) -> Result<()> {
        let path = self.path.join(path);
        let (Some(parent), Some(file_name)) = (path.parent(), path.file_name()) else {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("invalid object path {}", path.display()),
            )
            .into());
        };
        tokio::fs::create_dir_all(parent).await?;

        let temp_path = parent.join(format!("{TEMP_PREFIX}{}", file_name.to_string_lossy()));
        if let Err(err) = write_file(&temp_path, stream).await {
            if let Err(cleanup) = tokio::fs::remove_file(&temp_path).await {
                tracing::warn!(
                    path = %temp_path.display(),
                    error = &cleanup as &dyn std::error::Error,
                    "Failed to remove partial upload"
                );
            }
            return Err(err.into());
        }

        tokio::fs::rename(&temp_path, &path).await?;
        Ok(())
    }

    async fn delete_objects(&self, paths: &[String]) -> Result<()> {
        for path in paths {
            match tokio::fs::remove_file(self.path.join(path)).await {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }
}

/// Writes `stream` to a fresh file at `path` and syncs it to disk.
async fn write_file(path: &Path, stream: PayloadStream) -> std::io::Result<()> {
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .await?;

    let mut reader = pin!(StreamReader::new(stream));
    let mut writer = BufWriter::new(file);

    tokio::io::copy(&mut reader, &mut writer).await?;
    writer.flush().await?;
    writer.into_inner().sync_data().await
}
