//! Postgres access. Each submodule owns the queries for one group of tables.

pub mod cart;
pub mod content;
pub mod customers;
pub mod orders;
pub mod points;
pub mod products;
pub mod promo_codes;

pub use orders::{StockPolicy, TransitionOutcome};
pub use points::PointsReason;

/// Page/size query parameters turned into `LIMIT`/`OFFSET`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page { pub page: u32, pub per_page: u32 }

impl Page {
    pub const MAX_PER_PAGE: u32 = 100;

    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self { page: page.unwrap_or(1).max(1), per_page: per_page.unwrap_or(20).clamp(1, Self::MAX_PER_PAGE) }
    }
    pub fn limit(&self) -> i64 { i64::from(self.per_page) }
    pub fn offset(&self) -> i64 { i64::from(self.page - 1) * i64::from(self.per_page) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_bounds() {
        let p = Page::new(None, None);
        assert_eq!((p.limit(), p.offset()), (20, 0));
        let p = Page::new(Some(0), Some(500));
        assert_eq!((p.page, p.per_page), (1, 100));
        let p = Page::new(Some(3), Some(10));
        assert_eq!(p.offset(), 20);
    }
}
