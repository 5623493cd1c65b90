//! Desktop implementations of the platform bridge traits.
//!
//! - [`ReqwestHttpClient`]: HTTP transport over reqwest with the transport
//!   error mapping the core expects, plus observed, cancellable file
//!   downloads.
//! - [`TokioFileSystem`]: file system access over tokio's fs.
//! - [`JsonFileArchive`]: key-value archive persisted as one file per key.
//!
//! No desktop media engine ships here; hosts provide their own
//! [`bridge_traits::MediaEngine`] implementation.

pub mod archive;
pub mod filesystem;
pub mod http;

pub use archive::JsonFileArchive;
pub use filesystem::TokioFileSystem;
pub use http::ReqwestHttpClient;
