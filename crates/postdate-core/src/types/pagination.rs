//! Cursor pagination for owner-scoped listings.

use serde::{Deserialize, Serialize};

use super::id::JobId;

/// Default page size.
pub const DEFAULT_PAGE_SIZE: u32 = 50;
/// Maximum page size.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Request parameters for a cursor-paginated query.
///
/// The cursor is inclusive: it names the first item of the requested page,
/// exactly as returned in [`CursorPage::next_cursor`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CursorRequest {
    /// Number of items per page.
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// First item of the page, `None` for the first page.
    #[serde(default)]
    pub cursor: Option<JobId>,
}

impl CursorRequest {
    /// Create a new request with the limit clamped to `1..=MAX_PAGE_SIZE`.
    pub fn new(limit: u32, cursor: Option<JobId>) -> Self {
        Self {
            limit: limit.clamp(1, MAX_PAGE_SIZE),
            cursor,
        }
    }

    /// Rows to fetch so that the presence of a next page can be detected.
    pub fn fetch_limit(&self) -> u32 {
        self.limit.clamp(1, MAX_PAGE_SIZE) + 1
    }
}

impl Default for CursorRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            cursor: None,
        }
    }
}

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CursorPage<T> {
    /// The items on this page.
    pub items: Vec<T>,
    /// Cursor for the following page, `None` on the last page.
    pub next_cursor: Option<JobId>,
}

impl<T> CursorPage<T> {
    /// Split an over-fetched row set into a page and the next cursor.
    ///
    /// `rows` must hold at most `request.fetch_limit()` items in listing
    /// order; `id_of` extracts the cursor key of an item.
    pub fn from_overfetch(
        mut rows: Vec<T>,
        request: &CursorRequest,
        id_of: impl Fn(&T) -> JobId,
    ) -> Self {
        let limit = request.fetch_limit() as usize - 1;
        let next_cursor = if rows.len() > limit {
            rows.truncate(limit + 1);
            rows.pop().map(|next| id_of(&next))
        } else {
            None
        };
        Self {
            items: rows,
            next_cursor,
        }
    }

    /// Create an empty page.
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
        }
    }
}

fn default_limit() -> u32 {
    DEFAULT_PAGE_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_is_clamped() {
        assert_eq!(CursorRequest::new(0, None).limit, 1);
        assert_eq!(CursorRequest::new(500, None).limit, MAX_PAGE_SIZE);
        assert_eq!(CursorRequest::default().fetch_limit(), DEFAULT_PAGE_SIZE + 1);
    }

    #[test]
    fn test_overfetch_yields_next_cursor() {
        let ids: Vec<JobId> = (0..4).map(|_| JobId::new()).collect();
        let request = CursorRequest::new(3, None);
        let page = CursorPage::from_overfetch(ids.clone(), &request, |id| *id);
        assert_eq!(page.items, ids[..3]);
        assert_eq!(page.next_cursor, Some(ids[3]));
    }

    #[test]
    fn test_short_page_has_no_cursor() {
        let ids: Vec<JobId> = (0..2).map(|_| JobId::new()).collect();
        let request = CursorRequest::new(3, None);
        let page = CursorPage::from_overfetch(ids, &request, |id| *id);
        assert_eq!(page.items.len(), 2);
        assert!(page.next_cursor.is_none());
    }
}
