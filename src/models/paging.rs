//! Shared pagination normalization.
//!
//! Every vendor reports a total-hit count that can exceed what it will
//! actually serve (the max-accessible-results ceiling), and each adapter
//! receives page requests computed by callers that only know the reported
//! total. [`compute_paging`] is the one contract all three adapters use to
//! guarantee the caller is never handed a page number that would resolve to
//! a silently-empty or error page.

use serde::{Deserialize, Serialize};

/// Normalized paging state attached to every [`Response`](crate::models::Response)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    /// 1-based current page, clamped to `total_pages`
    pub current_page: u32,

    /// Results per page
    pub per_page: u32,

    /// Number of retrievable pages (reported total capped at the
    /// provider's ceiling)
    pub total_pages: u32,
}

impl Paging {
    /// Paging state for an empty response
    pub fn empty(per_page: u32) -> Self {
        Self {
            current_page: 1,
            per_page: per_page.max(1),
            total_pages: 0,
        }
    }

    /// 0-based offset of the first result on the current page
    pub fn start_index(&self) -> u64 {
        u64::from(self.current_page - 1) * u64::from(self.per_page)
    }
}

/// Compute clamped paging state from a vendor-reported total.
///
/// `requested_start` is the 0-based offset the caller asked for. The
/// retrievable total is `min(total, max_accessible)`; the returned current
/// page is derived from the requested offset and clamped into
/// `1..=total_pages` so requests past the ceiling land on the last
/// retrievable page instead of erroring.
pub fn compute_paging(total: u64, per_page: u32, requested_start: u64, max_accessible: u64) -> Paging {
    let per_page = per_page.max(1);
    let retrievable = total.min(max_accessible);

    let total_pages = retrievable.div_ceil(u64::from(per_page));
    if total_pages == 0 {
        return Paging::empty(per_page);
    }

    let requested_page = requested_start / u64::from(per_page) + 1;
    let current_page = requested_page.min(total_pages);

    Paging {
        current_page: current_page as u32,
        per_page,
        // Ceilings are small (<= a few thousand results) so this cast holds
        total_pages: total_pages as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_paging() {
        let p = compute_paging(95, 10, 0, 2000);
        assert_eq!(p.current_page, 1);
        assert_eq!(p.total_pages, 10);
        assert_eq!(p.per_page, 10);

        let p = compute_paging(95, 10, 40, 2000);
        assert_eq!(p.current_page, 5);
        assert_eq!(p.start_index(), 40);
    }

    #[test]
    fn test_clamp_to_ceiling() {
        // Vendor reports 5000 hits but only serves 2000: page 300 of 10
        // must clamp to the last retrievable page, never error.
        let p = compute_paging(5000, 10, 2990, 2000);
        assert_eq!(p.total_pages, 200);
        assert_eq!(p.current_page, 200);
    }

    #[test]
    fn test_clamp_past_reported_total() {
        let p = compute_paging(42, 20, 500, 1000);
        assert_eq!(p.total_pages, 3);
        assert_eq!(p.current_page, 3);
    }

    #[test]
    fn test_zero_total() {
        let p = compute_paging(0, 10, 0, 2000);
        assert_eq!(p.total_pages, 0);
        assert_eq!(p.current_page, 1);
    }

    #[test]
    fn test_per_page_never_zero() {
        let p = compute_paging(10, 0, 0, 2000);
        assert_eq!(p.per_page, 1);
        assert_eq!(p.total_pages, 10);
    }

    #[test]
    fn test_partial_last_page() {
        let p = compute_paging(101, 25, 100, 2000);
        assert_eq!(p.total_pages, 5);
        assert_eq!(p.current_page, 5);
    }
}
