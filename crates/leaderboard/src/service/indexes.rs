//! Index arithmetic for paginated and centered views.
//!
//! Windows are inclusive 0-based store indexes.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Window {
    pub start: i64,
    pub stop: i64,
}

/// Window of `page_size` members centered on the 1-based `rank`, shifted to
/// stay inside `0..total`. `None` when there is nothing to show.
pub(crate) fn around_rank(rank: i64, page_size: i64, total: i64) -> Option<Window> {
    if total <= 0 || page_size <= 0 {
        return None;
    }

    let mut start = (rank - page_size / 2).max(0);
    let mut stop = start + page_size - 1;
    if stop >= total {
        stop = total - 1;
        start = (stop - page_size + 1).max(0);
    }

    Some(Window { start, stop })
}

/// Window of the 1-based `page`.
pub(crate) fn page(page: i64, page_size: i64) -> Window {
    Window {
        start: (page - 1) * page_size,
        stop: page * page_size - 1,
    }
}

pub(crate) fn total_pages(total: i64, page_size: i64) -> i64 {
    let page_size = page_size.max(1);
    (total.max(0) + page_size - 1) / page_size
}

/// Number of members making up the top `percentage` of `total`, at least one
/// and at most `max_members`.
pub(crate) fn top_count(total: i64, percentage: i64, max_members: i64) -> i64 {
    (total * percentage / 100).max(1).min(max_members.max(1))
}
