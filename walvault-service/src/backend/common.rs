//! The [`Backend`] trait and the types shared by its implementations.

use std::fmt::Debug;
use std::time::SystemTime;

use crate::PayloadStream;
use crate::error::Result;

/// A type-erased [`Backend`] instance.
pub type BoxedBackend = Box<dyn Backend>;

/// An object found while listing a folder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectInfo {
    /// The object name relative to the listed folder.
    pub name: String,
    /// Size of the stored payload in bytes.
    pub size: u64,
    /// Time of the last write.
    pub last_modified: SystemTime,
}

/// The direct contents of a folder.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Listing {
    /// Objects directly inside the folder.
    pub objects: Vec<ObjectInfo>,
    /// Names of direct subfolders, without trailing `/`.
    pub subfolders: Vec<String>,
}

/// A flat object store addressed by `/`-separated paths.
///
/// Folders are implicit: a folder exists as long as an object path has it as a prefix. Listing a
/// folder that does not exist yields an empty [`Listing`].
#[async_trait::async_trait]
pub trait Backend: Debug + Send + Sync + 'static {
    /// The backend name, used for diagnostics.
    fn name(&self) -> &'static str;

    /// Lists the objects and subfolders directly below `folder`.
    ///
    /// `folder` is either empty (the root) or ends with `/`.
    async fn list_folder(&self, folder: &str) -> Result<Listing>;

    /// Retrieves the object at the given path as a stream of bytes.
    async fn get_object(&self, path: &str) -> Result<Option<PayloadStream>>;

    /// Stores an object at the given path, replacing any previous object.
    async fn put_object(&self, path: &str, stream: PayloadStream) -> Result<()>;

    /// Deletes the objects at the given paths. Missing objects are skipped.
    async fn delete_objects(&self, paths: &[String]) -> Result<()>;
}
