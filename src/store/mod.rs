//! # External Backend Seams
//!
//! Traits describing the capabilities the facades need from the backend, along with
//! the implementations shipped with the crate:
//!
//! * [`DocumentStore`]: collection/document addressing, reads, writes and query
//!   execution. [`MemoryDocumentStore`] keeps documents in process.
//! * [`BlobStore`]: event based uploads, downloads and deletions of blobs.
//!   [`ObjectBlobStore`] is backed by any [`object_store::ObjectStore`].
//! * [`FlagSource`]: remote configuration flags. [`MemoryFlagSource`] and
//!   [`FileFlagSource`] are provided.
//!
//! Every backend failure is reported as an [`Error`] carrying an [`ErrorCode`], each
//! facade translates those codes into its own error taxonomy.

mod error;
pub use error::*;

mod document;
pub use document::*;

mod blob;
pub use blob::*;

mod flags;
pub use flags::*;
