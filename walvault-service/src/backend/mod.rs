//! Object storage backends holding the archive.
//!
//! Every backend implements [`Backend`]. The archive layout on top of it is handled by
//! [`WalStorage`](crate::storage::WalStorage).

pub mod common;
pub mod in_memory;
pub mod local_fs;

pub use common::{Backend, BoxedBackend, Listing, ObjectInfo};
pub use in_memory::InMemoryBackend;
pub use local_fs::LocalFs;
