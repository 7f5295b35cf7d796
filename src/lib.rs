//! # chk-fetch
//!
//! The content-addressed fetch pipeline of a peer-to-peer data store node.
//!
//! Blocks are identified by content-hash keys (CHKs). Fetching one goes
//! through three stages:
//!
//! - **Keys** ([`keys`]): the immutable [`ContentKey`] with its 34-byte
//!   full-key wire form and tolerant decoding of legacy encodings.
//! - **Dispatch** ([`fetch`]): one blocking, cancellable attempt against a
//!   [`BlockSource`], reported through exactly one callback with a typed
//!   [`FetchFailure`].
//! - **Post-processing** ([`postprocess`]): multi-algorithm hash
//!   verification and optional content filtering on a worker thread, with a
//!   [`WorkerHandle`] that blocks until completion and re-raises errors.
//!
//! ## Architecture
//!
//! ```text
//! FetchRequest ──▶ LowLevelFetchDispatcher ──▶ BlockSource
//!                        │
//!            on_success(bytes) / on_failure(kind)
//!                        │
//!                        ▼
//!               PostProcessWorker ──▶ output
//!                        │
//!                  WorkerHandle::wait_until_finished()
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use chk_fetch::{PostProcessOptions, PostProcessWorker};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let input = std::io::Cursor::new(b"block data".to_vec());
//!     let handle =
//!         PostProcessWorker::new(input, std::io::sink(), PostProcessOptions::default()).spawn()?;
//!     handle.wait_until_finished()?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod fetch;
pub mod keys;
pub mod postprocess;
mod util;

pub use config::{KeyConfig, PipelineConfig, WorkerConfig};
pub use error::{Error, Result};
pub use fetch::{BlockSource, FetchFailure, FetchRequest, LowLevelFetchDispatcher, StoreError, StorePolicy};
pub use keys::{routing_key_from_full_key, ContentKey, KeyDecodeAnomaly, KeyError, RoutingKey};
pub use postprocess::{
    ContentFilter, ContentMetadata, FilterRequest, HashResult, HashSpec, HashType,
    PostProcessError, PostProcessOptions, PostProcessWorker, WorkerHandle, WorkerOutcome,
};
