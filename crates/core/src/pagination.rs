//! Forward cursor pagination shared by every list operation.
//!
//! Rows are ordered by `(created_at DESC, id DESC)`, which is a total order
//! even when several rows share a timestamp. A cursor is the id of the last
//! row of the previous page; the next page starts strictly after that row's
//! key.
//!
//! One extra row is fetched beyond the page size so `has_more` is known
//! without a count query. Re-reading the same cursor with no writes in the
//! already-seen window returns the same page. Rows deleted after being
//! returned are not accounted for: a cursor pointing at a deleted row fails
//! with [`InvalidCursor`].

use std::fmt;

use async_trait::async_trait;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Timestamp;

/// Largest page any list operation will return.
pub const MAX_PAGE_SIZE: i64 = 50;

/// Clamp a requested page size into `1..=MAX_PAGE_SIZE`.
///
/// Out-of-range values are replaced by [`MAX_PAGE_SIZE`], never rejected.
pub fn clamp_page_size(limit: i64) -> i64 {
    if limit <= 0 || limit > MAX_PAGE_SIZE {
        MAX_PAGE_SIZE
    } else {
        limit
    }
}

/// Position of a row in `(created_at DESC, id DESC)` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorKey {
    pub created_at: Timestamp,
    pub id: Uuid,
}

impl CursorKey {
    /// `true` if `self` sorts strictly after `other` in descending order.
    pub fn is_after(&self, other: &CursorKey) -> bool {
        (self.created_at, self.id) < (other.created_at, other.id)
    }
}

/// Rows that can be paged over.
pub trait HasCursorKey {
    fn cursor_key(&self) -> CursorKey;
}

/// The cursor does not name a row the source can resolve.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid cursor: {0}")]
pub struct InvalidCursor(pub String);

/// Query parameters for one page (`?cursor=&limit=`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageRequest {
    pub cursor: Option<String>,
    /// Never fails to deserialize: anything that is not an `i64` becomes
    /// [`MAX_PAGE_SIZE`], and an empty value is treated as absent.
    #[serde(default, deserialize_with = "lenient_limit")]
    pub limit: Option<i64>,
}

fn lenient_limit<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_option(LimitVisitor)
}

struct LimitVisitor;

impl<'de> Visitor<'de> for LimitVisitor {
    type Value = Option<i64>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a page size")
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_any(self)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Some(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Some(i64::try_from(v).unwrap_or(MAX_PAGE_SIZE)))
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<Self::Value, E> {
        Ok(Some(MAX_PAGE_SIZE))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        let v = v.trim();
        if v.is_empty() {
            return Ok(None);
        }
        Ok(Some(v.parse().unwrap_or(MAX_PAGE_SIZE)))
    }
}

impl PageRequest {
    pub fn new(cursor: impl Into<String>, limit: i64) -> Self {
        Self {
            cursor: Some(cursor.into()),
            limit: Some(limit),
        }
    }

    pub fn first(limit: i64) -> Self {
        Self {
            cursor: None,
            limit: Some(limit),
        }
    }

    /// The effective page size after clamping.
    pub fn limit(&self) -> i64 {
        clamp_page_size(self.limit.unwrap_or(0))
    }

    /// The cursor, with the empty string treated as "first page".
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref().filter(|c| !c.is_empty())
    }
}

/// One page of results.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Id of the last item when `has_more`, otherwise empty.
    pub next_cursor: String,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
            has_more: self.has_more,
        }
    }
}

/// A table (or any ordered collection) that [`paginate`] can read from.
#[async_trait]
pub trait CursorSource: Send + Sync {
    type Item: HasCursorKey + Send;
    type Error: From<InvalidCursor> + Send;

    /// Look up the ordering key of the row with the given id.
    async fn resolve_cursor(&self, id: Uuid) -> Result<Option<CursorKey>, Self::Error>;

    /// Up to `count` rows in `(created_at DESC, id DESC)` order, strictly
    /// after `after` when given.
    async fn fetch_after(
        &self,
        after: Option<CursorKey>,
        count: i64,
    ) -> Result<Vec<Self::Item>, Self::Error>;
}

/// Read one page from `source`.
pub async fn paginate<S>(source: &S, request: &PageRequest) -> Result<Page<S::Item>, S::Error>
where
    S: CursorSource + ?Sized,
{
    let limit = request.limit();

    let after = match request.cursor() {
        None => None,
        Some(raw) => {
            let id = Uuid::parse_str(raw).map_err(|_| InvalidCursor(raw.to_string()))?;
            let key = source
                .resolve_cursor(id)
                .await?
                .ok_or_else(|| InvalidCursor(raw.to_string()))?;
            Some(key)
        }
    };

    let mut items = source.fetch_after(after, limit + 1).await?;

    let has_more = items.len() as i64 > limit;
    if has_more {
        items.truncate(limit as usize);
    }

    let next_cursor = match (has_more, items.last()) {
        (true, Some(last)) => last.cursor_key().id.to_string(),
        _ => String::new(),
    };

    Ok(Page {
        items,
        next_cursor,
        has_more,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
