//! Forward cursor pagination
//!
//! A cursor is the time-ordered id of the last item on the previous page.
//! Pages are fetched with `id > cursor ORDER BY id ASC LIMIT limit + 1`;
//! the extra row only signals that another page exists. Ids never change
//! after creation, so appends between fetches cannot shift earlier pages.

use serde::Serialize;
use uuid::Uuid;

use crate::ids::is_time_ordered;
use crate::models::ValidationError;
use crate::{Error, Result};

/// Maximum items per page
pub const MAX_LIMIT: u32 = 100;

/// Items per page when the caller does not say
pub const DEFAULT_LIMIT: u32 = 20;

/// Validated page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    limit: u32,
    cursor: Option<Uuid>,
}

impl PageRequest {
    /// Validate a numeric limit and an optional cursor string.
    ///
    /// `None` limit means [`DEFAULT_LIMIT`]; a blank cursor means the first
    /// page.
    pub fn new(limit: Option<i64>, cursor: Option<&str>) -> Result<Self> {
        let limit = match limit {
            None => DEFAULT_LIMIT,
            Some(n) => u32::try_from(n)
                .ok()
                .filter(|n| (1..=MAX_LIMIT).contains(n))
                .ok_or_else(limit_out_of_range)?,
        };

        let cursor = match cursor.map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(parse_cursor(raw)?),
        };

        Ok(Self { limit, cursor })
    }

    /// Validate raw query-string values, as received by the transport.
    pub fn parse(limit: Option<&str>, cursor: Option<&str>) -> Result<Self> {
        let limit = match limit.map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<i64>().map_err(|_| limit_out_of_range())?),
        };
        Self::new(limit, cursor)
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn cursor(&self) -> Option<Uuid> {
        self.cursor
    }

    /// Rows to ask the store for: one more than the page size.
    pub fn fetch_limit(&self) -> i64 {
        i64::from(self.limit) + 1
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            cursor: None,
        }
    }
}

fn limit_out_of_range() -> Error {
    ValidationError::OutOfRange {
        field: "limit",
        min: 1,
        max: i64::from(MAX_LIMIT),
    }
    .into()
}

fn parse_cursor(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw)
        .ok()
        .filter(is_time_ordered)
        .ok_or_else(|| {
            ValidationError::InvalidFormat {
                field: "cursor",
                reason: "must be a time-ordered identifier",
            }
            .into()
        })
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CursorPage<T> {
    pub items: Vec<T>,
    /// Id of the last item, present only when more items follow.
    pub next_cursor: Option<Uuid>,
}

impl<T> CursorPage<T> {
    /// Build a page from up to `limit + 1` rows fetched in id order.
    pub fn from_overfetch(mut rows: Vec<T>, request: &PageRequest, id: impl Fn(&T) -> Uuid) -> Self {
        let limit = request.limit as usize;
        let next_cursor = if rows.len() > limit {
            rows.truncate(limit);
            rows.last().map(id)
        } else {
            None
        };

        Self {
            items: rows,
            next_cursor,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> CursorPage<U> {
        CursorPage {
            items: self.items.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
        }
    }
}
