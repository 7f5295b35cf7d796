//! Fetch request and the low-level failure taxonomy.

use thiserror::Error;

use crate::keys::ContentKey;

/// Reasons a single low-level fetch attempt can fail.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchFailure {
    /// The block was found but could not be decoded.
    #[error("decode failed")]
    DecodeFailed,
    /// No node on the route had the data.
    #[error("data not found")]
    DataNotFound,
    /// The request could not be routed far enough.
    #[error("route not found")]
    RouteNotFound,
    /// A downstream node rejected the request because it is overloaded.
    #[error("rejected: overload")]
    RejectedOverload,
    /// The data was found but the transfer failed.
    #[error("transfer failed")]
    TransferFailed,
    /// The data did not verify against its key.
    #[error("verify failed")]
    VerifyFailed,
    /// The request was cancelled before it was sent.
    #[error("request cancelled")]
    Cancelled,
    /// The key failed recently and the request was not retried.
    #[error("recently failed")]
    RecentlyFailed,
    /// Routing failed without reaching any node.
    #[error("route really not found")]
    RouteReallyNotFound,
    /// An unclassified failure inside the node.
    #[error("internal error")]
    InternalError,
}

/// Store-access policy carried by a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StorePolicy {
    /// Only look in the local datastore; never go to the network.
    pub local_only: bool,
    /// Cache a block fetched from the network in the local store.
    pub cache_locally: bool,
    /// Skip the local datastore and go straight to the network.
    pub ignore_store: bool,
}

/// A single low-level fetch chosen by the scheduler.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Opaque correlation id for logging and callbacks.
    pub token: u64,
    /// Key to fetch. `None` means the request is broken and should be
    /// dropped by the scheduler.
    pub key: Option<ContentKey>,
    /// Whether the request was cancelled before dispatch.
    pub cancelled: bool,
    /// How the store may be used.
    pub policy: StorePolicy,
}

impl FetchRequest {
    /// Create a request for `key` with a random token and default policy.
    #[must_use]
    pub fn new(key: ContentKey) -> Self {
        Self {
            token: rand::random(),
            key: Some(key),
            cancelled: false,
            policy: StorePolicy::default(),
        }
    }

    /// Use an explicit correlation token.
    #[must_use]
    pub fn with_token(mut self, token: u64) -> Self {
        self.token = token;
        self
    }

    /// Use an explicit store policy.
    #[must_use]
    pub fn with_policy(mut self, policy: StorePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Mark the request as cancelled.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }
}
