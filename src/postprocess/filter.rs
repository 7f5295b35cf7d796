//! Content-filter capability consumed by the post-processing worker.
//!
//! The filter itself (HTML/CSS sanitisers and so on) lives outside this
//! crate; the worker only needs the [`ContentFilter`] trait and the hooks it
//! forwards.

use std::fmt;
use std::io::{self, Read, Write};
use std::sync::Arc;

use thiserror::Error;

/// MIME type of XHTML documents.
pub const XHTML_MIME_TYPE: &str = "application/xhtml+xml";

/// MIME type XHTML is filtered as.
pub const HTML_MIME_TYPE: &str = "text/html";

/// Map XHTML to HTML; other types are returned unchanged.
///
/// XHTML cannot be rewritten with tag replacement further down the
/// pipeline, so it is always filtered as HTML.
#[must_use]
pub fn normalize_mime_type(mime_type: &str) -> &str {
    if mime_type == XHTML_MIME_TYPE {
        HTML_MIME_TYPE
    } else {
        mime_type
    }
}

/// Called for every URI the filter finds, so linked content can be prefetched.
pub trait FoundUriCallback: Send + Sync {
    /// `inline` is true for resources embedded in the page (images, styles).
    fn found_uri(&self, uri: &str, inline: bool);
}

/// Lets the caller replace whole tags while the filter rewrites a page.
pub trait TagReplacer: Send + Sync {
    /// Return replacement markup for `tag`, or `None` to keep it.
    fn replace_tag(&self, tag: &str, attributes: &[(String, String)]) -> Option<String>;
}

/// Optional callbacks handed to the filter.
#[derive(Clone, Copy, Default)]
pub struct FilterHooks<'a> {
    /// Prefetch hook.
    pub prefetch_hook: Option<&'a dyn FoundUriCallback>,
    /// Tag replacer.
    pub tag_replacer: Option<&'a dyn TagReplacer>,
}

impl fmt::Debug for FilterHooks<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterHooks")
            .field("prefetch_hook", &self.prefetch_hook.is_some())
            .field("tag_replacer", &self.tag_replacer.is_some())
            .finish()
    }
}

/// What the filter detected about the content it wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterStatus {
    /// Detected MIME type.
    pub mime_type: String,
    /// Detected charset, if any.
    pub charset: Option<String>,
}

/// Errors raised by a content filter.
#[derive(Error, Debug)]
pub enum FilterError {
    /// The filter does not handle this MIME type.
    #[error("unsupported MIME type: {0}")]
    UnsupportedType(String),

    /// The content could not be parsed or is unsafe.
    #[error("content rejected by filter: {0}")]
    Rejected(String),

    /// Reading or writing failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Rewrites content from `input` into `output`.
pub trait ContentFilter: Send + Sync {
    /// Filter the whole of `input` into `output`.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] if the content cannot be filtered.
    fn filter(
        &self,
        input: &mut dyn Read,
        output: &mut dyn Write,
        mime_type: &str,
        source_uri: &str,
        charset: Option<&str>,
        hooks: FilterHooks<'_>,
    ) -> Result<FilterStatus, FilterError>;
}

/// Metadata of filtered content, available once a worker succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentMetadata {
    mime_type: String,
}

impl ContentMetadata {
    /// Build from a full MIME type string (may carry a charset parameter).
    #[must_use]
    pub fn new(mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
        }
    }

    /// Combine a filter's detected type and charset.
    #[must_use]
    pub fn from_status(status: &FilterStatus) -> Self {
        match &status.charset {
            Some(charset) => Self::new(format!("{}; charset={charset}", status.mime_type)),
            None => Self::new(status.mime_type.clone()),
        }
    }

    /// Full MIME type, e.g. `text/html; charset=utf-8`.
    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// MIME type without parameters.
    #[must_use]
    pub fn base_type(&self) -> &str {
        self.mime_type
            .split(';')
            .next()
            .map_or("", str::trim)
    }

    /// Value of the `charset` parameter, if present.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.mime_type.split(';').skip(1).find_map(|param| {
            let (name, value) = param.split_once('=')?;
            name.trim()
                .eq_ignore_ascii_case("charset")
                .then(|| value.trim())
        })
    }
}

/// A request to filter content, with the capability that does it.
#[derive(Clone)]
pub struct FilterRequest {
    /// Filter implementation.
    pub filter: Arc<dyn ContentFilter>,
    /// Best guess of the content's MIME type. Required.
    pub mime_type: Option<String>,
    /// URI the content was fetched from, for resolving relative links. Required.
    pub source_uri: Option<String>,
    /// Charset hint.
    pub charset: Option<String>,
    /// Prefetch hook.
    pub prefetch_hook: Option<Arc<dyn FoundUriCallback>>,
    /// Tag replacer.
    pub tag_replacer: Option<Arc<dyn TagReplacer>>,
}

impl FilterRequest {
    /// Start a request for `filter` with nothing else set.
    #[must_use]
    pub fn new(filter: Arc<dyn ContentFilter>) -> Self {
        Self {
            filter,
            mime_type: None,
            source_uri: None,
            charset: None,
            prefetch_hook: None,
            tag_replacer: None,
        }
    }

    /// Set the MIME type.
    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Set the source URI.
    #[must_use]
    pub fn with_source_uri(mut self, source_uri: impl Into<String>) -> Self {
        self.source_uri = Some(source_uri.into());
        self
    }

    /// Set the charset hint.
    #[must_use]
    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    /// Set the prefetch hook.
    #[must_use]
    pub fn with_prefetch_hook(mut self, hook: Arc<dyn FoundUriCallback>) -> Self {
        self.prefetch_hook = Some(hook);
        self
    }

    /// Set the tag replacer.
    #[must_use]
    pub fn with_tag_replacer(mut self, replacer: Arc<dyn TagReplacer>) -> Self {
        self.tag_replacer = Some(replacer);
        self
    }

    /// Hooks borrowed from this request.
    #[must_use]
    pub fn hooks(&self) -> FilterHooks<'_> {
        FilterHooks {
            prefetch_hook: self.prefetch_hook.as_deref(),
            tag_replacer: self.tag_replacer.as_deref(),
        }
    }
}

impl fmt::Debug for FilterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterRequest")
            .field("mime_type", &self.mime_type)
            .field("source_uri", &self.source_uri)
            .field("charset", &self.charset)
            .field("prefetch_hook", &self.prefetch_hook.is_some())
            .field("tag_replacer", &self.tag_replacer.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_mime_type() {
        assert_eq!(normalize_mime_type("application/xhtml+xml"), "text/html");
        assert_eq!(normalize_mime_type("text/html"), "text/html");
        assert_eq!(normalize_mime_type("image/png"), "image/png");
    }

    #[test]
    fn test_metadata_from_status() {
        let with_charset = ContentMetadata::from_status(&FilterStatus {
            mime_type: "text/html".to_string(),
            charset: Some("utf-8".to_string()),
        });
        assert_eq!(with_charset.mime_type(), "text/html; charset=utf-8");
        assert_eq!(with_charset.base_type(), "text/html");
        assert_eq!(with_charset.charset(), Some("utf-8"));

        let plain = ContentMetadata::from_status(&FilterStatus {
            mime_type: "image/png".to_string(),
            charset: None,
        });
        assert_eq!(plain.mime_type(), "image/png");
        assert_eq!(plain.charset(), None);
    }
}
