//! Blocking dispatch of one low-level fetch.
//!
//! ```text
//!  FetchRequest ──▶ dispatch()
//!                      │
//!          key None ───┼──▶ return false (no callback)
//!         cancelled ───┼──▶ on_failure(Cancelled), return false
//!                      ▼
//!              BlockSource::fetch   (blocking, not re-polled for cancel)
//!                      │
//!          Ok(bytes) ──┼──▶ on_success(bytes), return true
//!   Failure(kind) ─────┼──▶ on_failure(kind), return true
//!   Other / panic ─────┴──▶ on_failure(InternalError), return true
//! ```

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, error, info_span, trace, Span};

use crate::fetch::request::{FetchFailure, FetchRequest, StorePolicy};
use crate::keys::ContentKey;
use crate::util::panic_message;

/// Error raised by a [`BlockSource`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// A classified low-level failure, passed through to the caller as is.
    #[error("{0}")]
    Failure(#[from] FetchFailure),

    /// Anything the store could not classify.
    #[error("unclassified store error: {0}")]
    Other(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Local store or network accessor that retrieves raw block bytes.
pub trait BlockSource: Send + Sync {
    /// Fetch the block for `key`, blocking until it arrives or fails.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Failure`] for classified failures and
    /// [`StoreError::Other`] for anything else.
    fn fetch(&self, key: &ContentKey, policy: StorePolicy) -> Result<Bytes, StoreError>;
}

/// Runs single fetch attempts against a [`BlockSource`].
///
/// Holds nothing across calls except the shared source and a logging span.
pub struct LowLevelFetchDispatcher {
    source: Arc<dyn BlockSource>,
    span: Span,
}

impl LowLevelFetchDispatcher {
    /// Create a dispatcher over `source`.
    #[must_use]
    pub fn new(source: Arc<dyn BlockSource>) -> Self {
        Self {
            source,
            span: info_span!("fetch_dispatcher"),
        }
    }

    /// Log under `span` instead of the default one.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Perform one blocking fetch for `request`.
    ///
    /// Exactly one of `on_success` / `on_failure` is called, except when the
    /// request has no key, in which case neither is.
    ///
    /// Returns `true` if an attempt was made, `false` if the scheduler should
    /// drop this request and pick another one.
    pub fn dispatch<S, F>(&self, request: FetchRequest, on_success: S, on_failure: F) -> bool
    where
        S: FnOnce(Bytes),
        F: FnOnce(FetchFailure),
    {
        let _entered = self.span.enter();
        let token = request.token;

        let Some(key) = request.key else {
            error!("Key is missing in dispatch(): token={token}");
            return false;
        };

        trace!("Sending get for key {key} (token={token})");

        if request.cancelled {
            debug!("Cancelled before dispatch: {key} (token={token})");
            on_failure(FetchFailure::Cancelled);
            return false;
        }

        let source = &self.source;
        let outcome = catch_unwind(AssertUnwindSafe(|| source.fetch(&key, request.policy)));

        match outcome {
            Ok(Ok(data)) => {
                debug!("Fetched {key} ({} bytes, token={token})", data.len());
                on_success(data);
            }
            Ok(Err(StoreError::Failure(kind))) => {
                debug!("Fetch of {key} failed: {kind} (token={token})");
                on_failure(kind);
            }
            Ok(Err(StoreError::Other(e))) => {
                error!("Caught unclassified store error fetching {key} (token={token}): {e:?}");
                on_failure(FetchFailure::InternalError);
            }
            Err(payload) => {
                error!(
                    "Store panicked fetching {key} (token={token}): {}",
                    panic_message(&*payload)
                );
                on_failure(FetchFailure::InternalError);
            }
        }
        true
    }
}
