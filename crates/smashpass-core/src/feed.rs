// Paginated item feed: the loaded items, page bookkeeping, and the prefetch
// decision.
//
// Fetching itself happens elsewhere. The feed hands out `PageRequest`s and is
// told about results through `complete_page` / `fail_page`, so it stays
// synchronous and the single in-flight guard lives in one place.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::protocol::{Item, Page, PageRequest};

/// Default lookahead: request the next page when the cursor is this close to
/// the end of the loaded items.
pub const DEFAULT_PREFETCH_MARGIN: usize = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeedError {
    #[error("feed already initialized (current page {current_page})")]
    AlreadyInitialized { current_page: u32 },
}

/// Result of looking up the item at a cursor position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeedSlot<'a> {
    Ready(&'a Item),
    /// Not loaded yet; the caller should show a loading state.
    Pending,
}

impl<'a> FeedSlot<'a> {
    pub fn item(self) -> Option<&'a Item> {
        match self {
            FeedSlot::Ready(item) => Some(item),
            FeedSlot::Pending => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ItemFeed {
    session: u64,
    page_size: u32,
    prefetch_margin: usize,
    loaded: Vec<Item>,
    /// Last page applied to `loaded`; 0 before the first page.
    current_page: u32,
    total: usize,
    initialized: bool,
    in_flight: Option<u32>,
    /// Pages that arrived ahead of their predecessors.
    buffered: BTreeMap<u32, Page>,
    last_error: Option<String>,
}

impl ItemFeed {
    pub fn new(session: u64, page_size: u32, prefetch_margin: usize) -> Self {
        ItemFeed {
            session,
            page_size,
            prefetch_margin,
            loaded: Vec::new(),
            current_page: 0,
            total: 0,
            initialized: false,
            in_flight: None,
            buffered: BTreeMap::new(),
            last_error: None,
        }
    }

    /// Seed the feed with its first page. Must be called once per session.
    pub fn initialize(&mut self, first: Page) -> Result<(), FeedError> {
        if self.initialized {
            return Err(FeedError::AlreadyInitialized {
                current_page: self.current_page,
            });
        }
        self.apply_first_page(first);
        Ok(())
    }

    /// Whether a fetch for the next page should start now.
    pub fn needs_prefetch(&self, cursor: usize) -> bool {
        cursor + self.prefetch_margin >= self.loaded.len()
            && self.in_flight.is_none()
            && self.has_more()
    }

    /// Claim the next page for fetching.
    ///
    /// Returns `None` while another fetch is outstanding, so overlapping
    /// triggers produce a single request.
    pub fn request_next_page(&mut self) -> Option<PageRequest> {
        if let Some(page) = self.in_flight {
            debug!("Page {} already in flight, not requesting again", page);
            return None;
        }
        let page = self.current_page + 1;
        self.in_flight = Some(page);
        self.last_error = None;
        debug!("Requesting page {} (session {})", page, self.session);
        Some(PageRequest {
            session: self.session,
            page,
            page_size: self.page_size,
        })
    }

    /// Apply the response to a request for page `requested`. Pages are
    /// applied strictly in page order; a page that arrives early waits in a
    /// buffer until its predecessors land.
    ///
    /// The in-flight guard for `requested` is always released. A body that
    /// reports a different page number is treated as a failed fetch so the
    /// caller can retry it.
    ///
    /// Returns the number of items appended by this call.
    pub fn complete_page(&mut self, requested: u32, page: Page) -> usize {
        if self.in_flight == Some(requested) {
            self.in_flight = None;
        }

        if page.page != requested {
            self.fail_page(
                requested,
                format!("server returned page {} for page {}", page.page, requested),
            );
            return 0;
        }
        self.last_error = None;

        if !self.initialized {
            if page.page != 1 {
                debug!("Buffering page {} until page 1 arrives", page.page);
                self.buffered.insert(page.page, page);
                return 0;
            }
            let count = page.items.len();
            self.apply_first_page(page);
            return count + self.drain_buffered();
        }

        if page.page <= self.current_page {
            debug!(
                "Dropping duplicate page {} (already at page {})",
                page.page, self.current_page
            );
            return 0;
        }

        if page.total != self.total {
            debug!(
                "Page {} reports total {} but session total is {}, keeping {}",
                page.page, page.total, self.total, self.total
            );
        }

        self.buffered.insert(page.page, page);
        self.drain_buffered()
    }

    /// Record a failed fetch. The in-flight guard is released so the caller
    /// can retry; nothing is retried automatically.
    pub fn fail_page(&mut self, page: u32, message: impl Into<String>) {
        let message = message.into();
        warn!("Fetching page {} failed: {}", page, message);
        if self.in_flight == Some(page) {
            self.in_flight = None;
        }
        self.last_error = Some(message);
    }

    pub fn item_at(&self, cursor: usize) -> FeedSlot<'_> {
        match self.loaded.get(cursor) {
            Some(item) => FeedSlot::Ready(item),
            None => FeedSlot::Pending,
        }
    }

    pub fn loaded(&self) -> &[Item] {
        &self.loaded
    }

    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn in_flight(&self) -> Option<u32> {
        self.in_flight
    }

    /// The last fetch error, if the feed is currently unavailable.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn has_more(&self) -> bool {
        !self.initialized || self.loaded.len() < self.total
    }

    fn apply_first_page(&mut self, first: Page) {
        info!(
            "Feed initialized from page {}: {} items, {} total",
            first.page,
            first.items.len(),
            first.total
        );
        self.current_page = first.page;
        self.total = first.total;
        self.loaded = first.items;
        self.initialized = true;
    }

    fn drain_buffered(&mut self) -> usize {
        let mut appended = 0;
        while let Some(page) = self.buffered.remove(&(self.current_page + 1)) {
            appended += page.items.len();
            info!(
                "Applied page {}: +{} items ({} loaded of {})",
                page.page,
                page.items.len(),
                self.loaded.len() + page.items.len(),
                self.total
            );
            self.current_page = page.page;
            self.loaded.extend(page.items);
        }
        if !self.buffered.is_empty() {
            debug!(
                "{} page(s) waiting for page {}",
                self.buffered.len(),
                self.current_page + 1
            );
        }
        appended
    }
}
