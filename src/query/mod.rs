mod filter;
pub use filter::*;

mod builder;
pub use builder::*;

mod pagination;
pub use pagination::*;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    #[error("bad field `{field}`")]
    BadField { field: String },
    #[error("operation error :: {0}")]
    Op(#[from] OpError),
    #[error("unable to compute the day boundaries of {0}")]
    BadDate(chrono::NaiveDate),
}
