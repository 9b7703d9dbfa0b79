//! Page-number pagination shared by the public listings.

use std::num::NonZeroU32;

use thiserror::Error;

pub const DEFAULT_PAGE_SIZE: u32 = 4;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PaginationError {
    #[error("`{0}` is not a valid page number")]
    InvalidNumber(String),
    #[error("page {requested} is out of range (last page is {last})")]
    OutOfRange { requested: u32, last: u32 },
}

/// Which page a caller asked for, before the result size is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSelector {
    Number(u32),
    Last,
}

impl Default for PageSelector {
    fn default() -> Self {
        Self::Number(1)
    }
}

impl PageSelector {
    /// Parse the raw `page` query value. Missing or blank means the first page.
    pub fn parse(raw: Option<&str>) -> Result<Self, PaginationError> {
        let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
            return Ok(Self::default());
        };

        if raw == "last" {
            return Ok(Self::Last);
        }

        match raw.parse::<u32>() {
            Ok(number) if number >= 1 => Ok(Self::Number(number)),
            _ => Err(PaginationError::InvalidNumber(raw.to_string())),
        }
    }
}

/// Offset/limit window handed to repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: u64,
    pub limit: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: u32,
    pub num_pages: u32,
    pub request: PageRequest,
}

#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    page_size: NonZeroU32,
}

impl Default for Paginator {
    fn default() -> Self {
        Self {
            page_size: NonZeroU32::new(DEFAULT_PAGE_SIZE).unwrap_or(NonZeroU32::MIN),
        }
    }
}

impl Paginator {
    pub fn new(page_size: NonZeroU32) -> Self {
        Self { page_size }
    }

    /// Number of pages for `total` items. An empty listing still has one page.
    pub fn num_pages(&self, total: u64) -> u32 {
        let size = u64::from(self.page_size.get());
        let pages = total.div_ceil(size).max(1);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    pub fn resolve(&self, selector: PageSelector, total: u64) -> Result<PageWindow, PaginationError> {
        let num_pages = self.num_pages(total);
        let number = match selector {
            PageSelector::Number(number) => number,
            PageSelector::Last => num_pages,
        };

        if number == 0 {
            return Err(PaginationError::InvalidNumber(number.to_string()));
        }
        if number > num_pages {
            return Err(PaginationError::OutOfRange {
                requested: number,
                last: num_pages,
            });
        }

        let limit = self.page_size.get();
        Ok(PageWindow {
            number,
            num_pages,
            request: PageRequest {
                offset: u64::from(number - 1) * u64::from(limit),
                limit,
            },
        })
    }
}

/// One page of an ordered listing.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u32,
    pub num_pages: u32,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn new(window: PageWindow, items: Vec<T>, total: u64) -> Self {
        Self {
            items,
            number: window.number,
            num_pages: window.num_pages,
            total,
        }
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn previous_number(&self) -> Option<u32> {
        self.has_previous().then(|| self.number - 1)
    }

    pub fn next_number(&self) -> Option<u32> {
        self.has_next().then(|| self.number + 1)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            total: self.total,
        }
    }
}
