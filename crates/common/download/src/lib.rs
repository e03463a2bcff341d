//! Downloading snapshots of a remote document.
//!
//! This crate fetches a single document over HTTP and keeps a copy of it in a
//! timestamped file:
//!
//! - the request is authenticated with HTTP Basic credentials
//! - transient failures are retried a bounded number of times, with an
//!   exponential backoff or the delay requested by the server
//! - the body is streamed to disk, so memory use does not depend on its size
//! - a snapshot only appears under its final name once it is complete
//!
//! # Usage
//!
//! A [`FetchRequest`] describes what to download and where to put it. A
//! [`Fetcher`] performs the download, returning either the plain result with
//! [`Fetcher::download`] or a [`FetchOutcome`] that tells whether a failure has
//! to abort the caller with [`Fetcher::fetch`].
//!
//! ```no_run
//! use download::Auth;
//! use download::FailureMode;
//! use download::FetchOutcome;
//! use download::FetchRequest;
//! use download::Fetcher;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), download::FetchError> {
//!     let request = FetchRequest::new("https://cloud.example.com/webdav/upload.xml", "data")
//!         .with_auth(Auth::new_basic("user", "secret"));
//!
//!     match Fetcher::new().fetch(&request, FailureMode::Soft).await {
//!         FetchOutcome::Success(snapshot) => println!("Saved {:?}", snapshot.path),
//!         FetchOutcome::SoftFailure(err) => eprintln!("Skipped: {err}"),
//!         FetchOutcome::HardFailure(err) => return Err(err),
//!     }
//!
//!     Ok(())
//! }
//! ```

mod clock;
mod download;
mod error;
mod outcome;
mod request;
mod retry;
mod snapshot;

pub use crate::clock::Clock;
pub use crate::clock::Timestamp;
pub use crate::clock::WallClock;
pub use crate::download::Fetcher;
pub use crate::download::DEFAULT_USER_AGENT;
pub use crate::error::FetchError;
pub use crate::outcome::FailureMode;
pub use crate::outcome::FetchOutcome;
pub use crate::outcome::SnapshotFile;
pub use crate::request::Auth;
pub use crate::request::FetchRequest;
pub use crate::request::DEFAULT_CONNECT_TIMEOUT;
pub use crate::request::DEFAULT_FILE_PREFIX;
pub use crate::request::DEFAULT_READ_TIMEOUT;
pub use crate::retry::parse_retry_after;
pub use crate::retry::RetryPolicy;
pub use crate::retry::DEFAULT_BACKOFF_BASE;
pub use crate::retry::DEFAULT_MAX_ATTEMPTS;
pub use crate::retry::DEFAULT_MAX_BACKOFF;
pub use crate::retry::DEFAULT_RETRY_STATUSES;
pub use crate::snapshot::SnapshotName;
pub use crate::snapshot::CHUNK_SIZE;
pub use reqwest::StatusCode;
