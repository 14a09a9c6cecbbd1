//! IO modules - side effects (network, filesystem)

pub mod archive;
pub mod store;

pub use archive::{ArchiveError, native_libraries};
pub use store::{ArtifactStore, ArtifactoryClient, StoreError, UploadReceipt};
