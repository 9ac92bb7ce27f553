//! Cursor Pagination
//!
//! Drives a paged endpoint by feeding the server-issued bookmark of each page
//! into the request for the next one. The bookmark is never interpreted.

use futures::Stream;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::core::HttpRequest;
use crate::error::{CarrierError, ProtocolError};
use crate::resilience::{ApiResponse, ResilientExecutor};
use crate::types::{Grant, RequestContext};

/// Default JSON pointer of the bookmark in a page body.
pub const DEFAULT_BOOKMARK_POINTER: &str = "/bookmark";

/// Where a page carries the bookmark of the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookmarkLocation {
    /// JSON pointer into the response body (RFC 6901).
    JsonPointer(String),
    /// Response header.
    Header(String),
}

impl Default for BookmarkLocation {
    fn default() -> Self {
        Self::JsonPointer(DEFAULT_BOOKMARK_POINTER.to_string())
    }
}

impl BookmarkLocation {
    /// Pull the bookmark out of `response`; absent or empty means last page.
    pub fn extract(&self, response: &ApiResponse) -> Result<Option<String>, CarrierError> {
        let found = match self {
            Self::Header(name) => response.header(name).map(str::to_string),
            Self::JsonPointer(pointer) => {
                let body: serde_json::Value = response.json()?;
                match body.pointer(pointer) {
                    None | Some(serde_json::Value::Null) => None,
                    Some(serde_json::Value::String(s)) => Some(s.clone()),
                    Some(serde_json::Value::Number(n)) => Some(n.to_string()),
                    Some(other) => {
                        return Err(CarrierError::Protocol(ProtocolError::InvalidResponse {
                            message: format!("bookmark at `{}` is not a scalar: {}", pointer, other),
                        }))
                    }
                }
            }
        };
        Ok(found.filter(|b| !b.is_empty()))
    }
}

/// One fetched page.
#[derive(Debug, Clone)]
pub struct Page {
    /// Zero-based position in the sequence.
    pub index: usize,
    pub response: ApiResponse,
    /// Bookmark for the following page, `None` on the last one.
    pub bookmark: Option<String>,
}

impl Page {
    pub fn has_next(&self) -> bool {
        self.bookmark.is_some()
    }

    /// Deserialize the page body.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, CarrierError> {
        self.response.json()
    }
}

/// Lazy, finite sequence of pages.
///
/// `build` turns the previous page's bookmark (`None` for the first page)
/// into the next request. All pages are fetched under one request context.
/// A failed page ends the sequence; [`CursorPaginator::resume_from`] restarts
/// it from the last bookmark the caller saw.
pub struct CursorPaginator<B>
where
    B: Fn(Option<&str>) -> HttpRequest,
{
    executor: Arc<ResilientExecutor>,
    grant: Grant,
    context: RequestContext,
    build: B,
    location: BookmarkLocation,
    bookmark: Option<String>,
    fetched: usize,
    done: bool,
}

impl<B> CursorPaginator<B>
where
    B: Fn(Option<&str>) -> HttpRequest,
{
    pub fn new(executor: Arc<ResilientExecutor>, grant: Grant, context: RequestContext, build: B) -> Self {
        Self {
            executor,
            grant,
            context,
            build,
            location: BookmarkLocation::default(),
            bookmark: None,
            fetched: 0,
            done: false,
        }
    }

    /// Read bookmarks from `location` instead of `/bookmark`.
    pub fn bookmark_location(mut self, location: BookmarkLocation) -> Self {
        self.location = location;
        self
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// Bookmark the next request will carry.
    pub fn last_bookmark(&self) -> Option<&str> {
        self.bookmark.as_deref()
    }

    pub fn has_next(&self) -> bool {
        !self.done
    }

    /// Restart from `bookmark` after a failure (or to skip ahead).
    pub fn resume_from(&mut self, bookmark: impl Into<String>) {
        self.bookmark = Some(bookmark.into());
        self.done = false;
    }

    /// Fetch the next page, `Ok(None)` once the sequence is over.
    pub async fn next_page(&mut self) -> Result<Option<Page>, CarrierError> {
        if self.done {
            return Ok(None);
        }

        let request = (self.build)(self.bookmark.as_deref());
        let fetched = self.executor.send(&self.grant, &self.context, request).await;
        let page = fetched.and_then(|response| {
            let bookmark = self.location.extract(&response)?;
            Ok((response, bookmark))
        });

        let (response, bookmark) = match page {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(
                    page = self.fetched,
                    correlation_id = %self.context.correlation_id(),
                    error = %e,
                    "page fetch failed, stopping"
                );
                self.done = true;
                return Err(e);
            }
        };

        let index = self.fetched;
        self.fetched += 1;
        match &bookmark {
            Some(next) => self.bookmark = Some(next.clone()),
            None => self.done = true,
        }
        tracing::debug!(page = index, has_next = !self.done, "page fetched");

        Ok(Some(Page {
            index,
            response,
            bookmark,
        }))
    }

    /// Fetch every remaining page.
    pub async fn collect_all(&mut self) -> Result<Vec<Page>, CarrierError> {
        let mut pages = Vec::new();
        while let Some(page) = self.next_page().await? {
            pages.push(page);
        }
        Ok(pages)
    }

    /// Pages as a stream; the stream ends after the last page or the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Page, CarrierError>> {
        futures::stream::unfold(self, |mut paginator| async move {
            match paginator.next_page().await {
                Ok(Some(page)) => Some((Ok(page), paginator)),
                Ok(None) => None,
                Err(e) => Some((Err(e), paginator)),
            }
        })
    }
}

/// Copy of `body` with `field` set to the bookmark (or left out without one).
pub fn with_json_bookmark(body: &serde_json::Value, field: &str, bookmark: Option<&str>) -> serde_json::Value {
    let mut body = body.clone();
    if let (Some(bookmark), Some(object)) = (bookmark, body.as_object_mut()) {
        object.insert(field.to_string(), serde_json::Value::String(bookmark.to_string()));
    }
    body
}

/// `url` with query parameter `param` set to the bookmark.
pub fn with_query_bookmark(url: &str, param: &str, bookmark: Option<&str>) -> Result<String, CarrierError> {
    let mut parsed = url::Url::parse(url).map_err(|e| {
        CarrierError::Protocol(ProtocolError::InvalidResponse {
            message: format!("invalid page URL `{}`: {}", url, e),
        })
    })?;
    if let Some(bookmark) = bookmark {
        parsed.query_pairs_mut().append_pair(param, bookmark);
    }
    Ok(parsed.into())
}
