mod document;
pub use document::*;

mod blob;
pub use blob::*;

mod geo;
pub use geo::*;

mod version;
pub use version::*;
