//! # Facade Module
//!
//! This module implements the **Facade** pattern, serving as an intermediate logic layer
//! between the application's public interface and the backend seams of [`crate::store`].
//!
//! * **Backend Abstraction:** facades talk to traits, so callers never know which document
//!   database, object storage or flag service sits behind them.
//! * **Typed Access:** documents are exchanged as `serde` types, blobs as local files.
//! * **Error Translation:** each facade reports its own closed error taxonomy
//!   ([`DocumentError`], [`StorageError`], [`FlagError`]) instead of backend errors.

mod facade_error;
pub use facade_error::*;

mod facade_document;
pub use facade_document::*;

mod facade_query;
pub use facade_query::*;

mod facade_blob;
pub use facade_blob::*;

mod facade_flags;
pub use facade_flags::*;
