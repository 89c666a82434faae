//! Page-number pagination over lazily evaluated sources.

use std::num::NonZeroU32;

use async_trait::async_trait;

use crate::application::repos::RepoError;

pub const DEFAULT_PAGE_SIZE: NonZeroU32 = match NonZeroU32::new(10) {
    Some(size) => size,
    None => unreachable!(),
};

/// Offset and limit for a single page fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub offset: u64,
    pub limit: u32,
}

/// A source that can be counted and sliced without materialising everything.
#[async_trait]
pub trait PagedSource: Send + Sync {
    type Item: Send;

    async fn count(&self) -> Result<u64, RepoError>;

    async fn fetch(&self, window: PageWindow) -> Result<Vec<Self::Item>, RepoError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based page number actually served.
    pub number: u32,
    pub num_pages: u32,
    pub total: u64,
}

impl<T> Page<T> {
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

#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    per_page: NonZeroU32,
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl Paginator {
    pub const fn new(per_page: NonZeroU32) -> Self {
        Self { per_page }
    }

    pub fn per_page(&self) -> u32 {
        self.per_page.get()
    }

    /// Number of pages for `total` items; an empty listing still has one page.
    pub fn num_pages(&self, total: u64) -> u32 {
        let per_page = u64::from(self.per_page.get());
        let pages = total.div_ceil(per_page).max(1);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    /// Resolve the raw `page` query value against the page count.
    ///
    /// Missing or non-numeric input serves the first page; numbers outside
    /// `1..=num_pages` serve the last page.
    pub fn resolve_number(&self, raw: Option<&str>, num_pages: u32) -> u32 {
        let Some(requested) = raw.and_then(|value| value.trim().parse::<i64>().ok()) else {
            return 1;
        };

        if requested < 1 || requested > i64::from(num_pages) {
            num_pages
        } else {
            // Bounded by `num_pages` above.
            requested as u32
        }
    }

    pub fn window(&self, number: u32) -> PageWindow {
        let per_page = self.per_page.get();
        PageWindow {
            offset: u64::from(number.saturating_sub(1)) * u64::from(per_page),
            limit: per_page,
        }
    }

    pub async fn paginate<S>(
        &self,
        source: &S,
        raw: Option<&str>,
    ) -> Result<Page<S::Item>, RepoError>
    where
        S: PagedSource + ?Sized,
    {
        let total = source.count().await?;
        let num_pages = self.num_pages(total);
        let number = self.resolve_number(raw, num_pages);

        let items = if total == 0 {
            Vec::new()
        } else {
            source.fetch(self.window(number)).await?
        };

        Ok(Page {
            items,
            number,
            num_pages,
            total,
        })
    }
}
