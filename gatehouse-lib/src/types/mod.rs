#![allow(unreachable_pub)]

mod body;
mod error;
mod request;

pub use body::Body;
pub use error::ErrorKind;
pub use request::FetchRequest;

/// The gatehouse `Result` type
pub type Result<T> = std::result::Result<T, crate::ErrorKind>;
