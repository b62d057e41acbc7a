use parley_types::api::{Page, PageQuery};

/// Upper bound on any requested page size.
pub const MAX_LIMIT: u32 = 100;

/// A (limit, offset) pair applied to an ordered result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub limit: u32,
    pub offset: u32,
}

impl Window {
    pub fn new(limit: u32, offset: u32) -> Self {
        Self {
            limit: limit.min(MAX_LIMIT),
            offset,
        }
    }

    /// Build a window from query parameters. A missing or zero limit means
    /// `default_limit`.
    pub fn from_query(query: &PageQuery, default_limit: u32) -> Self {
        let limit = match query.limit {
            Some(0) | None => default_limit,
            Some(limit) => limit,
        };
        Self::new(limit, query.offset.unwrap_or(0))
    }

    pub fn page<T>(&self, count: u64, results: Vec<T>) -> Page<T> {
        Page {
            count,
            limit: self.limit,
            offset: self.offset,
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_clamping() {
        let empty = PageQuery::default();
        assert_eq!(Window::from_query(&empty, 5), Window { limit: 5, offset: 0 });

        let zero = PageQuery { limit: Some(0), offset: Some(3) };
        assert_eq!(Window::from_query(&zero, 10), Window { limit: 10, offset: 3 });

        let huge = PageQuery { limit: Some(10_000), offset: None };
        assert_eq!(Window::from_query(&huge, 10).limit, MAX_LIMIT);
    }
}
