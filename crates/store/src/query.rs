use common::CategoryId;

use crate::model::{Category, MenuItem};

/// Largest page size a menu query may request.
pub const MAX_PER_PAGE: usize = 100;

/// Default page size when none is given.
pub const DEFAULT_PER_PAGE: usize = 20;

/// Sort order for menu listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuOrdering {
    PriceAsc,
    PriceDesc,
    InventoryAsc,
    InventoryDesc,
}

impl MenuOrdering {
    /// Parses `price`, `-price`, `inventory` or `-inventory`.
    pub fn parse(field: &str) -> Option<Self> {
        match field.trim() {
            "price" => Some(MenuOrdering::PriceAsc),
            "-price" => Some(MenuOrdering::PriceDesc),
            "inventory" => Some(MenuOrdering::InventoryAsc),
            "-inventory" => Some(MenuOrdering::InventoryDesc),
            _ => None,
        }
    }

    pub(crate) fn sql(&self) -> &'static str {
        match self {
            MenuOrdering::PriceAsc => "m.price_cents ASC, m.title ASC",
            MenuOrdering::PriceDesc => "m.price_cents DESC, m.title ASC",
            MenuOrdering::InventoryAsc => "m.inventory ASC, m.title ASC",
            MenuOrdering::InventoryDesc => "m.inventory DESC, m.title ASC",
        }
    }
}

/// Builder for filtering and paginating menu items.
#[derive(Debug, Clone)]
pub struct MenuQuery {
    /// Filter by category.
    pub category_id: Option<CategoryId>,

    /// Filter by the featured flag.
    pub featured: Option<bool>,

    /// Case-insensitive match against item title or category title.
    pub search: Option<String>,

    /// Sort order; defaults to title.
    pub ordering: Option<MenuOrdering>,

    /// 1-based page number.
    pub page: usize,

    /// Items per page, clamped to `1..=MAX_PER_PAGE`.
    pub per_page: usize,
}

impl Default for MenuQuery {
    fn default() -> Self {
        Self {
            category_id: None,
            featured: None,
            search: None,
            ordering: None,
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl MenuQuery {
    /// Creates a new query returning the first page of all items.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters by category.
    pub fn category(mut self, category_id: CategoryId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    /// Filters by the featured flag.
    pub fn featured(mut self, featured: bool) -> Self {
        self.featured = Some(featured);
        self
    }

    /// Searches item and category titles.
    pub fn search(mut self, term: impl Into<String>) -> Self {
        let term = term.into();
        self.search = if term.trim().is_empty() {
            None
        } else {
            Some(term.trim().to_string())
        };
        self
    }

    /// Sets the sort order.
    pub fn ordering(mut self, ordering: MenuOrdering) -> Self {
        self.ordering = Some(ordering);
        self
    }

    /// Selects a page; page 0 is treated as page 1.
    pub fn page(mut self, page: usize, per_page: usize) -> Self {
        self.page = page.max(1);
        self.per_page = per_page.clamp(1, MAX_PER_PAGE);
        self
    }

    /// Number of items to skip. Saturates for pages past the end.
    pub fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.per_page)
    }

    /// Returns true if the item (with its category) satisfies the filters.
    pub(crate) fn matches(&self, item: &MenuItem, category: Option<&Category>) -> bool {
        if self.category_id.is_some_and(|id| item.category_id != id) {
            return false;
        }
        if self.featured.is_some_and(|featured| item.featured != featured) {
            return false;
        }
        if let Some(ref term) = self.search {
            let term = term.to_lowercase();
            let in_title = item.title.to_lowercase().contains(&term);
            let in_category = category.is_some_and(|c| c.title.to_lowercase().contains(&term));
            if !in_title && !in_category {
                return false;
            }
        }
        true
    }

    /// Sorts items in place according to the ordering.
    pub(crate) fn sort(&self, items: &mut [MenuItem]) {
        match self.ordering {
            Some(MenuOrdering::PriceAsc) => {
                items.sort_by(|a, b| a.price.cmp(&b.price).then(a.title.cmp(&b.title)));
            }
            Some(MenuOrdering::PriceDesc) => {
                items.sort_by(|a, b| b.price.cmp(&a.price).then(a.title.cmp(&b.title)));
            }
            Some(MenuOrdering::InventoryAsc) => {
                items.sort_by(|a, b| a.inventory.cmp(&b.inventory).then(a.title.cmp(&b.title)));
            }
            Some(MenuOrdering::InventoryDesc) => {
                items.sort_by(|a, b| b.inventory.cmp(&a.inventory).then(a.title.cmp(&b.title)));
            }
            None => items.sort_by(|a, b| a.title.cmp(&b.title)),
        }
    }
}
