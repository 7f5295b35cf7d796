//! Post-processing worker and its completion handle.
//!
//! ```text
//!  input ──▶ BufReader ──▶ MultiHashReader ──▶ filter / copy ──▶ output
//!                               │
//!                               └──▶ digests ──▶ compare with HashSpec
//!
//!  Running ──▶ Succeeded(metadata)
//!     └─────▶ Failed(error)          first terminal write wins
//! ```

use std::io::{self, BufReader, Read, Write};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;
use tracing::{debug, error, info_span, trace, Span};

use crate::config::WorkerConfig;
use crate::postprocess::filter::{
    normalize_mime_type, ContentMetadata, FilterError, FilterRequest,
};
use crate::postprocess::hash::{describe, HashResult, HashSpec, MultiHashReader};
use crate::util::panic_message;

/// Errors recorded by a worker and re-raised from its handle.
///
/// Cloneable so every waiter observes the same error.
#[derive(Error, Debug, Clone)]
pub enum PostProcessError {
    /// Filtering was requested without the inputs it needs.
    #[error("insufficient arguments to worker: {0}")]
    InsufficientArguments(String),

    /// Computed digests did not match the expected set.
    #[error(
        "content hash failed: expected {}, computed {}",
        describe(.expected),
        describe(.actual)
    )]
    ContentHashFailed {
        /// Expected digests.
        expected: Vec<HashResult>,
        /// Digests computed from the stream.
        actual: Vec<HashResult>,
    },

    /// The content filter failed.
    #[error("content filter failed: {0}")]
    Filter(String),

    /// Reading the input or writing the output failed.
    #[error("I/O error: {0}")]
    Io(Arc<io::Error>),

    /// The worker panicked.
    #[error("worker panicked: {0}")]
    Panicked(String),
}

impl From<io::Error> for PostProcessError {
    fn from(e: io::Error) -> Self {
        Self::Io(Arc::new(e))
    }
}

impl From<FilterError> for PostProcessError {
    fn from(e: FilterError) -> Self {
        match e {
            FilterError::Io(io) => Self::Io(Arc::new(io)),
            other => Self::Filter(other.to_string()),
        }
    }
}

/// State of a worker.
#[derive(Debug, Clone)]
pub enum WorkerOutcome {
    /// Still processing.
    Running,
    /// Finished; metadata is present when filtering was requested.
    Succeeded(Option<ContentMetadata>),
    /// Finished with an error.
    Failed(PostProcessError),
}

impl WorkerOutcome {
    /// Whether a terminal state has been reached.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        !matches!(self, Self::Running)
    }

    fn result(&self) -> Option<Result<(), PostProcessError>> {
        match self {
            Self::Running => None,
            Self::Succeeded(_) => Some(Ok(())),
            Self::Failed(e) => Some(Err(e.clone())),
        }
    }
}

/// Monitor holding the outcome; only the worker thread writes it.
#[derive(Debug)]
struct Completion {
    state: Mutex<WorkerOutcome>,
    finished: Condvar,
}

impl Completion {
    fn new() -> Self {
        Self {
            state: Mutex::new(WorkerOutcome::Running),
            finished: Condvar::new(),
        }
    }

    /// Record the terminal state and wake waiters. Returns `false` (and
    /// changes nothing) if a terminal state was already recorded.
    fn finish(&self, result: Result<Option<ContentMetadata>, PostProcessError>) -> bool {
        let mut state = self.state.lock();
        if state.is_finished() {
            debug!("Ignoring second terminal state: {:?}", result.as_ref().err());
            return false;
        }
        *state = match result {
            Ok(metadata) => WorkerOutcome::Succeeded(metadata),
            Err(e) => WorkerOutcome::Failed(e),
        };
        self.finished.notify_all();
        true
    }
}

/// Handle to a running worker.
///
/// Cloneable; every clone observes the same frozen terminal state.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    completion: Arc<Completion>,
}

impl WorkerHandle {
    /// Block until the worker finishes, then re-raise its error if any.
    ///
    /// Can be called any number of times, from any number of threads; each
    /// call returns the same outcome.
    ///
    /// # Errors
    ///
    /// Returns the error the worker recorded.
    pub fn wait_until_finished(&self) -> Result<(), PostProcessError> {
        let mut state = self.completion.state.lock();
        loop {
            if let Some(result) = state.result() {
                return result;
            }
            self.completion.finished.wait(&mut state);
        }
    }

    /// Like [`wait_until_finished`](Self::wait_until_finished) but gives up
    /// after `timeout`, returning `None` if the worker is still running.
    ///
    /// A timeout too large to represent as a deadline waits without limit.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<(), PostProcessError>> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return Some(self.wait_until_finished());
        };
        let mut state = self.completion.state.lock();
        loop {
            if let Some(result) = state.result() {
                return Some(result);
            }
            if self
                .completion
                .finished
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return state.result();
            }
        }
    }

    /// Await completion from async code without blocking the runtime.
    ///
    /// # Errors
    ///
    /// Returns the error the worker recorded.
    pub async fn finished(&self) -> Result<(), PostProcessError> {
        let handle = self.clone();
        match tokio::task::spawn_blocking(move || handle.wait_until_finished()).await {
            Ok(result) => result,
            Err(e) => Err(PostProcessError::Panicked(e.to_string())),
        }
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn outcome(&self) -> WorkerOutcome {
        self.completion.state.lock().clone()
    }

    /// Whether the worker has reached a terminal state.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.completion.state.lock().is_finished()
    }

    /// Metadata detected by the content filter.
    ///
    /// `None` while running, on failure, and when no filtering was requested.
    #[must_use]
    pub fn metadata(&self) -> Option<ContentMetadata> {
        match &*self.completion.state.lock() {
            WorkerOutcome::Succeeded(metadata) => metadata.clone(),
            WorkerOutcome::Running | WorkerOutcome::Failed(_) => None,
        }
    }
}

/// What to do with the stream besides copying it.
#[derive(Debug, Clone, Default)]
pub struct PostProcessOptions {
    /// Expected digests of the input.
    pub hashes: Option<HashSpec>,
    /// Filter the content instead of copying it verbatim.
    pub filter: Option<FilterRequest>,
}

/// Streams fetched, decompressed data to its final destination, verifying
/// hashes and filtering on the way.
///
/// The worker owns both streams; they are released on every exit path
/// before the terminal state is published.
pub struct PostProcessWorker {
    input: Box<dyn Read + Send>,
    output: Box<dyn Write + Send>,
    options: PostProcessOptions,
    config: WorkerConfig,
    span: Span,
}

impl PostProcessWorker {
    /// Create a worker over `input` and `output`.
    pub fn new<R, W>(input: R, output: W, options: PostProcessOptions) -> Self
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        Self {
            input: Box::new(input),
            output: Box::new(output),
            options,
            config: WorkerConfig::default(),
            span: info_span!("postprocess"),
        }
    }

    /// Use `config` for thread naming and buffering.
    #[must_use]
    pub fn with_config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    /// Log under `span` instead of the default one.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Start the worker on its own thread.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Spawn`] if the thread cannot be created.
    pub fn spawn(self) -> crate::Result<WorkerHandle> {
        let completion = Arc::new(Completion::new());
        let handle = WorkerHandle {
            completion: Arc::clone(&completion),
        };
        let name = self.config.thread_name.clone();

        thread::Builder::new()
            .name(name)
            .spawn(move || {
                let span = self.span.clone();
                let _entered = span.enter();
                let result = match catch_unwind(AssertUnwindSafe(|| self.execute())) {
                    Ok(result) => result,
                    Err(payload) => Err(PostProcessError::Panicked(panic_message(&*payload))),
                };
                if let Err(e) = &result {
                    error!("Error caught while post-processing fetch: {e}");
                }
                completion.finish(result);
            })
            .map_err(|e| crate::Error::Spawn(e.to_string()))?;

        Ok(handle)
    }

    /// Run to completion on the calling thread.
    ///
    /// # Errors
    ///
    /// Returns the same errors a spawned worker would record.
    pub fn run(self) -> Result<Option<ContentMetadata>, PostProcessError> {
        let span = self.span.clone();
        let _entered = span.enter();
        let result = self.execute();
        if let Err(e) = &result {
            error!("Error caught while post-processing fetch: {e}");
        }
        result
    }

    fn execute(self) -> Result<Option<ContentMetadata>, PostProcessError> {
        let Self {
            input,
            mut output,
            options: PostProcessOptions { hashes, filter },
            config,
            ..
        } = self;

        let mask = hashes.as_ref().map_or(0, HashSpec::bitmask);
        let mut input =
            MultiHashReader::new(BufReader::with_capacity(config.copy_buffer_size, input), mask);

        let step = match &filter {
            Some(request) => apply_filter(request, &mut input, &mut output).map(Some),
            None => {
                trace!("No content filter requested, copying data unmodified");
                io::copy(&mut input, &mut output)
                    .map(|n| {
                        debug!("Copied {n} bytes");
                        None
                    })
                    .map_err(PostProcessError::from)
            }
        }
        .and_then(|metadata| -> Result<_, PostProcessError> {
            output.flush()?;
            Ok(metadata)
        });

        // Both streams are released before the outcome is decided.
        let computed = input.finish();
        drop(output);
        let metadata = step?;

        if let Some(expected) = &hashes {
            if !expected.matches(&computed) {
                return Err(PostProcessError::ContentHashFailed {
                    expected: expected.results().to_vec(),
                    actual: computed,
                });
            }
            debug!("Content hashes verified: {}", describe(&computed));
        }

        Ok(metadata)
    }
}

fn apply_filter(
    request: &FilterRequest,
    input: &mut dyn Read,
    output: &mut dyn Write,
) -> Result<ContentMetadata, PostProcessError> {
    let (Some(mime_type), Some(source_uri)) =
        (request.mime_type.as_deref(), request.source_uri.as_deref())
    else {
        return Err(PostProcessError::InsufficientArguments(format!(
            "filtering needs a MIME type and a source URI (mime_type={:?}, source_uri={:?})",
            request.mime_type, request.source_uri
        )));
    };
    let mime_type = normalize_mime_type(mime_type);

    debug!(
        "Running content filter for {source_uri} as {mime_type} (prefetch hook: {}, tag replacer: {})",
        request.prefetch_hook.is_some(),
        request.tag_replacer.is_some()
    );

    let status = request.filter.filter(
        input,
        output,
        mime_type,
        source_uri,
        request.charset.as_deref(),
        request.hooks(),
    )?;

    Ok(ContentMetadata::from_status(&status))
}
