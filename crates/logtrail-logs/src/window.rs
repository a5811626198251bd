/// Records per page in paginated delivery
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Result-set size above which virtualized delivery takes over
pub const VIRTUALIZE_THRESHOLD: usize = 100;

/// Extra rows materialized on each side of the visible range
pub const DEFAULT_OVERSCAN: usize = 5;

/// How a filtered result set is delivered for rendering
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryMode {
    Paged,
    Virtualized,
}

impl DeliveryMode {
    /// Pick a strategy for a result set of the given size
    pub fn for_len(len: usize) -> Self {
        if len > VIRTUALIZE_THRESHOLD {
            Self::Virtualized
        } else {
            Self::Paged
        }
    }
}

/// Fixed-size page slicing over an already-filtered, already-sorted set.
///
/// The pager never reorders records. `reset` returns to the first page and
/// is called whenever the filter is re-applied.
#[derive(Clone, Debug)]
pub struct Pager {
    page_size: usize,
    page: usize,
}

impl Pager {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            page: 0,
        }
    }

    /// Current zero-based page index
    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of pages for a set of the given length (at least one)
    pub fn total_pages(&self, len: usize) -> usize {
        len.div_ceil(self.page_size).max(1)
    }

    /// Back to the first page (filter re-applied)
    pub fn reset(&mut self) {
        self.page = 0;
    }

    pub fn next(&mut self, len: usize) {
        if self.page + 1 < self.total_pages(len) {
            self.page += 1;
        }
    }

    pub fn prev(&mut self) {
        self.page = self.page.saturating_sub(1);
    }

    /// Jump to a page, clamped into range
    pub fn set_page(&mut self, page: usize, len: usize) {
        self.page = page.min(self.total_pages(len) - 1);
    }

    /// The slice of the set visible on the current page
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = (self.page * self.page_size).min(items.len());
        let end = (start + self.page_size).min(items.len());
        &items[start..end]
    }
}

impl Default for Pager {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

/// Scroll-position-derived window over a large result set.
///
/// Only the visible sub-range plus an overscan margin on each side is
/// materialized, so fast scrolling does not show pop-in.
#[derive(Clone, Debug)]
pub struct VirtualWindow {
    viewport: usize,
    overscan: usize,
    scroll: usize,
}

impl VirtualWindow {
    pub fn new(viewport: usize) -> Self {
        Self {
            viewport: viewport.max(1),
            overscan: DEFAULT_OVERSCAN,
            scroll: 0,
        }
    }

    pub fn with_overscan(mut self, overscan: usize) -> Self {
        self.overscan = overscan;
        self
    }

    /// Index of the first visible row
    pub fn scroll(&self) -> usize {
        self.scroll
    }

    /// Move the window to an absolute scroll position, clamped to the set
    pub fn set_scroll(&mut self, scroll: usize, len: usize) {
        self.scroll = scroll.min(len.saturating_sub(1));
    }

    pub fn scroll_down(&mut self, rows: usize, len: usize) {
        self.set_scroll(self.scroll.saturating_add(rows), len);
    }

    pub fn scroll_up(&mut self, rows: usize) {
        self.scroll = self.scroll.saturating_sub(rows);
    }

    /// The materialized range (start, end) including overscan
    pub fn visible_range(&self, len: usize) -> (usize, usize) {
        let start = self.scroll.saturating_sub(self.overscan);
        let end = (self.scroll + self.viewport + self.overscan).min(len);
        (start.min(end), end)
    }

    /// The slice of the set materialized for rendering
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let (start, end) = self.visible_range(items.len());
        &items[start..end]
    }
}
