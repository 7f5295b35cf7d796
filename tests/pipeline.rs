//! End-to-end tests: dispatch a fetch against an in-memory store and stream
//! the result through a post-processing worker.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use bytes::Bytes;
use chk_fetch::keys::ALGO_AES_CTR_256_SHA256;
use chk_fetch::{
    BlockSource, ContentKey, FetchFailure, FetchRequest, HashResult, HashSpec, HashType,
    LowLevelFetchDispatcher, PostProcessError, PostProcessOptions, PostProcessWorker, StoreError,
    StorePolicy,
};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::Arc;

/// Block store backed by a map.
#[derive(Default)]
struct MemoryStore {
    blocks: Mutex<HashMap<ContentKey, Bytes>>,
}

impl MemoryStore {
    fn put(&self, key: ContentKey, data: &[u8]) {
        self.blocks
            .lock()
            .insert(key, Bytes::copy_from_slice(data));
    }
}

impl BlockSource for MemoryStore {
    fn fetch(&self, key: &ContentKey, policy: StorePolicy) -> Result<Bytes, StoreError> {
        if let Some(data) = self.blocks.lock().get(key) {
            return Ok(data.clone());
        }
        if policy.local_only {
            Err(FetchFailure::DataNotFound.into())
        } else {
            Err(FetchFailure::RouteNotFound.into())
        }
    }
}

/// Cloneable writer so the test can read what the worker wrote.
#[derive(Clone, Default)]
struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn key(byte: u8) -> ContentKey {
    ContentKey::from_routing_key([byte; 32], ALGO_AES_CTR_256_SHA256)
}

/// Run one dispatch and collect whichever callback fired.
fn fetch(
    dispatcher: &LowLevelFetchDispatcher,
    request: FetchRequest,
) -> (bool, Option<Result<Bytes, FetchFailure>>) {
    let slot = Mutex::new(None);
    let attempted = dispatcher.dispatch(
        request,
        |data| *slot.lock() = Some(Ok(data)),
        |kind| *slot.lock() = Some(Err(kind)),
    );
    (attempted, slot.into_inner())
}

#[test]
fn fetched_block_is_verified_and_delivered() {
    let store = Arc::new(MemoryStore::default());
    let payload = b"a block of fetched content".repeat(100);
    store.put(key(1), &payload);
    let dispatcher = LowLevelFetchDispatcher::new(store);

    let (attempted, result) = fetch(&dispatcher, FetchRequest::new(key(1)));
    assert!(attempted);
    let data = result.expect("callback fired").expect("fetch succeeded");
    assert_eq!(&data[..], &payload[..]);

    let digest = Sha256::digest(&payload).to_vec();
    let hashes = HashSpec::new(vec![HashResult::new(HashType::Sha256, digest)]).unwrap();
    let sink = SharedSink::default();
    let handle = PostProcessWorker::new(
        Cursor::new(data),
        sink.clone(),
        PostProcessOptions {
            hashes: Some(hashes),
            filter: None,
        },
    )
    .spawn()
    .unwrap();

    handle.wait_until_finished().unwrap();
    assert_eq!(*sink.0.lock(), payload);
}

#[test]
fn corrupted_block_fails_hash_verification() {
    let store = Arc::new(MemoryStore::default());
    store.put(key(2), b"tampered bytes");
    let dispatcher = LowLevelFetchDispatcher::new(store);

    let (_, result) = fetch(&dispatcher, FetchRequest::new(key(2)));
    let data = result.unwrap().unwrap();

    let expected = Sha256::digest(b"untampered bytes").to_vec();
    let hashes = HashSpec::new(vec![HashResult::new(HashType::Sha256, expected)]).unwrap();
    let handle = PostProcessWorker::new(
        Cursor::new(data),
        std::io::sink(),
        PostProcessOptions {
            hashes: Some(hashes),
            filter: None,
        },
    )
    .spawn()
    .unwrap();

    let err = handle.wait_until_finished().unwrap_err();
    assert!(matches!(err, PostProcessError::ContentHashFailed { .. }));
    // A second wait sees the same failure.
    assert!(matches!(
        handle.wait_until_finished(),
        Err(PostProcessError::ContentHashFailed { .. })
    ));
}

#[test]
fn missing_block_reports_store_policy_failure() {
    let store = Arc::new(MemoryStore::default());
    let dispatcher = LowLevelFetchDispatcher::new(store);
    let failures = Mutex::new(Vec::new());

    let local = StorePolicy {
        local_only: true,
        ..StorePolicy::default()
    };
    for (request, expected) in [
        (FetchRequest::new(key(3)).with_policy(local), FetchFailure::DataNotFound),
        (FetchRequest::new(key(3)), FetchFailure::RouteNotFound),
    ] {
        let attempted = dispatcher.dispatch(
            request,
            |_| panic!("no data expected"),
            |kind| failures.lock().push(kind),
        );
        assert!(attempted);
        assert_eq!(failures.lock().pop(), Some(expected));
    }
}

#[test]
fn cancelled_request_never_reaches_the_store() {
    let store = Arc::new(MemoryStore::default());
    store.put(key(4), b"present");
    let dispatcher = LowLevelFetchDispatcher::new(store);

    let mut request = FetchRequest::new(key(4));
    request.cancel();

    let failure = Mutex::new(None);
    let attempted = dispatcher.dispatch(
        request,
        |_| panic!("cancelled request must not succeed"),
        |kind| *failure.lock() = Some(kind),
    );

    assert!(!attempted);
    assert_eq!(*failure.lock(), Some(FetchFailure::Cancelled));
}
