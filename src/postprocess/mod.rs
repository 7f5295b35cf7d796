//! Post-processing of fetched data.
//!
//! Once a block (or a whole decompressed file) has been fetched, a
//! [`PostProcessWorker`] streams it to its destination on a dedicated thread:
//!
//! 1. optionally hashing it with several algorithms at once
//!    ([`MultiHashReader`]) and comparing against a [`HashSpec`];
//! 2. optionally rewriting it through a [`ContentFilter`];
//! 3. publishing the outcome through a [`WorkerHandle`].
//!
//! Errors are deferred: they surface only when the caller waits on the
//! handle, and every wait sees the same outcome.

mod filter;
mod hash;
mod worker;

pub use filter::{
    normalize_mime_type, ContentFilter, ContentMetadata, FilterError, FilterHooks, FilterRequest,
    FilterStatus, FoundUriCallback, TagReplacer, HTML_MIME_TYPE, XHTML_MIME_TYPE,
};
pub use hash::{hash_all, HashResult, HashSpec, HashSpecError, HashType, MultiHashReader};
pub use worker::{
    PostProcessError, PostProcessOptions, PostProcessWorker, WorkerHandle, WorkerOutcome,
};
