//! Page / per-page query parameters shared by the list endpoints.

pub const MAX_PER_PAGE: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub per_page: u32,
    pub offset: u64,
}

impl Page {
    /// `page` is 1-based and `per_page` is clamped to `1..=MAX_PER_PAGE`.
    /// Returns `None` when `page` is too large to address.
    pub fn resolve(
        page: Option<u64>,
        per_page: Option<u64>,
        default_per_page: u64,
    ) -> Option<Self> {
        let per_page = per_page.unwrap_or(default_per_page).clamp(1, MAX_PER_PAGE) as u32;
        let page = u32::try_from(page.unwrap_or(1).max(1)).ok()?;

        Some(Self {
            page,
            per_page,
            offset: u64::from(page - 1) * u64::from(per_page),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_the_first_page() {
        assert_eq!(
            Page::resolve(None, None, 20),
            Some(Page { page: 1, per_page: 20, offset: 0 })
        );
    }

    #[test]
    fn offset_skips_earlier_pages() {
        let page = Page::resolve(Some(3), Some(25), 20).unwrap();
        assert_eq!(page.offset, 50);
    }

    #[test]
    fn per_page_and_page_are_clamped() {
        let page = Page::resolve(Some(0), Some(10_000), 20).unwrap();
        assert_eq!((page.page, page.per_page), (1, 100));
        assert_eq!(Page::resolve(None, Some(0), 20).unwrap().per_page, 1);
    }

    #[test]
    fn unaddressable_page_is_refused() {
        assert_eq!(Page::resolve(Some(u64::MAX), Some(100), 20), None);
        assert_eq!(Page::resolve(Some(u64::from(u32::MAX) + 1), None, 20), None);

        let last = Page::resolve(Some(u64::from(u32::MAX)), Some(100), 20).unwrap();
        assert_eq!(last.offset, (u64::from(u32::MAX) - 1) * 100);
    }
}
