//! In-memory backend for tests.
//!
//! This provides a [`Backend`] backed by a `BTreeMap`, removing the need for filesystem tempdir
//! management in tests. The backend is [`Clone`] so tests can hold a handle for direct
//! manipulation while the storage owns a boxed copy.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use bytes::{Bytes, BytesMut};
use futures_util::TryStreamExt;

use super::common::{Backend, Listing, ObjectInfo};
use crate::PayloadStream;
use crate::error::Result;
use crate::stream::make_stream;

type Store = BTreeMap<String, (SystemTime, Bytes)>;

/// A [`Backend`] keeping all objects in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    store: Arc<Mutex<Store>>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an object directly, bypassing the `Backend` trait.
    pub fn insert(&self, path: impl Into<String>, contents: impl Into<Bytes>) {
        self.store
            .lock()
            .unwrap()
            .insert(path.into(), (SystemTime::now(), contents.into()));
    }

    /// Returns a clone of the stored bytes, if present.
    pub fn get_stored(&self, path: &str) -> Option<Bytes> {
        self.store
            .lock()
            .unwrap()
            .get(path)
            .map(|(_, bytes)| bytes.clone())
    }

    /// Returns `true` if the backend contains an object at the given path.
    pub fn contains(&self, path: &str) -> bool {
        self.store.lock().unwrap().contains_key(path)
    }

    /// Returns `true` if the backend has no stored objects.
    pub fn is_empty(&self) -> bool {
        self.store.lock().unwrap().is_empty()
    }
}

#[async_trait::async_trait]
impl Backend for InMemoryBackend {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn list_folder(&self, folder: &str) -> Result<Listing> {
        let store = self.store.lock().unwrap();
        let mut listing = Listing::default();

        for (path, (last_modified, bytes)) in store.range(folder.to_owned()..) {
            let Some(rest) = path.strip_prefix(folder) else {
                break;
            };
            match rest.split_once('/') {
                Some((subfolder, _)) => {
                    if listing.subfolders.last().map(String::as_str) != Some(subfolder) {
                        listing.subfolders.push(subfolder.to_owned());
                    }
                }
                None => listing.objects.push(ObjectInfo {
                    name: rest.to_owned(),
                    size: bytes.len() as u64,
                    last_modified: *last_modified,
                }),
            }
        }

        Ok(listing)
    }

    async fn get_object(&self, path: &str) -> Result<Option<PayloadStream>> {
        let entry = self.get_stored(path);
        Ok(entry.map(make_stream))
    }

    async fn put_object(&self, path: &str, stream: PayloadStream) -> Result<()> {
        let bytes: BytesMut = stream.try_collect().await?;
        self.insert(path, bytes.freeze());
        Ok(())
    }

    async fn delete_objects(&self, paths: &[String]) -> Result<()> {
        let mut store = self.store.lock().unwrap();
        for path in paths {
            store.remove(path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::read_to_vec;

    #[tokio::test]
    async fn lists_direct_children_only() {
        let backend = InMemoryBackend::new();
        backend.insert("wal_005/a", "1");
        backend.insert("wal_005/b", "22");
        backend.insert("wal_005/sub/c", "3");
        backend.insert("wal_005/sub/d", "4");
        backend.insert("wal_006/e", "5");
        backend.insert("top", "6");

        let listing = backend.list_folder("wal_005/").await.unwrap();
        let names: Vec<_> = listing.objects.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(listing.objects[1].size, 2);
        assert_eq!(listing.subfolders, ["sub"]);

        let root = backend.list_folder("").await.unwrap();
        assert_eq!(root.objects.len(), 1);
        assert_eq!(root.subfolders, ["wal_005", "wal_006"]);
    }

    #[tokio::test]
    async fn round_trips_and_deletes() {
        let backend = InMemoryBackend::new();
        backend
            .put_object("x/y", make_stream("payload"))
            .await
            .unwrap();

        let stream = backend.get_object("x/y").await.unwrap().unwrap();
        assert_eq!(read_to_vec(stream).await.unwrap(), b"payload");

        backend.delete_objects(&["x/y".to_owned()]).await.unwrap();
        assert!(backend.is_empty());
        assert!(backend.get_object("x/y").await.unwrap().is_none());
    }
}
