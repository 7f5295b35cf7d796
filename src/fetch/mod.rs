//! Low-level fetch dispatch.
//!
//! The scheduler hands the dispatcher one [`FetchRequest`] at a time on a
//! worker thread. The dispatcher reads the cancellation flag once, performs a
//! single blocking store/network access through a [`BlockSource`], and
//! reports the result through exactly one callback.

mod dispatcher;
mod request;

pub use dispatcher::{BlockSource, LowLevelFetchDispatcher, StoreError};
pub use request::{FetchFailure, FetchRequest, StorePolicy};
