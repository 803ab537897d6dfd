//! Scoring, filtering, sorting and cursor pagination over a snapshot.
//!
//! Everything here is stateless: callers hand in the materialized item list
//! and get a page back. No I/O, no clocks other than the `now` argument.

use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};

use crate::error::FeedzError;
use crate::model::{ItemStatus, ItemView};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortMode {
    #[default]
    Hot,
    New,
    Top,
}

impl FromStr for SortMode {
    type Err = FeedzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hot" => Ok(SortMode::Hot),
            "new" => Ok(SortMode::New),
            "top" => Ok(SortMode::Top),
            other => Err(FeedzError::Store(format!("unknown sort: {}", other))),
        }
    }
}

/// Recency window filter over `created_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeWindow {
    #[default]
    All,
    Day,
    Week,
    Month,
}

impl TimeWindow {
    /// The inclusive lower bound implied by this window, or `None` for all.
    pub fn since(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            TimeWindow::All => None,
            TimeWindow::Day => Some(now - Duration::hours(24)),
            TimeWindow::Week => Some(now - Duration::days(7)),
            TimeWindow::Month => Some(now - Duration::days(30)),
        }
    }
}

impl FromStr for TimeWindow {
    type Err = FeedzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(TimeWindow::All),
            "24h" => Ok(TimeWindow::Day),
            "7d" => Ok(TimeWindow::Week),
            "30d" => Ok(TimeWindow::Month),
            other => Err(FeedzError::Store(format!("unknown window: {}", other))),
        }
    }
}

/// Opaque pagination cursor: the `(created_at, id)` of the last item of the
/// previous page, rendered as `<rfc3339>_<id>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub created_at: DateTime<Utc>,
    pub id: u64,
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.created_at.to_rfc3339(), self.id)
    }
}

impl FromStr for Cursor {
    type Err = FeedzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ts, id) = s
            .split_once('_')
            .ok_or_else(|| FeedzError::Store(format!("malformed cursor: {}", s)))?;
        let created_at = DateTime::parse_from_rfc3339(ts)
            .map_err(|e| FeedzError::Store(format!("malformed cursor timestamp: {}", e)))?
            .with_timezone(&Utc);
        let id = id
            .parse()
            .map_err(|e| FeedzError::Store(format!("malformed cursor id: {}", e)))?;
        Ok(Cursor { created_at, id })
    }
}

#[derive(Debug, Clone)]
pub struct SelectQuery {
    pub sort: SortMode,
    pub window: TimeWindow,
    pub tag: Option<String>,
    pub query: Option<String>,
    pub cursor: Option<Cursor>,
    pub limit: usize,
}

impl Default for SelectQuery {
    fn default() -> Self {
        Self {
            sort: SortMode::default(),
            window: TimeWindow::default(),
            tag: None,
            query: None,
            cursor: None,
            limit: 20,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Page {
    pub items: Vec<ItemView>,
    pub next_cursor: Option<Cursor>,
}

/// Time-decayed popularity: `log10(max(|score|, 1)) + epoch_seconds / 45000`.
///
/// The time term grows continuously while the vote term grows only
/// logarithmically, so recency wins among comparably scored items.
pub fn hot(score: i64, created_at: DateTime<Utc>) -> f64 {
    let magnitude = score.abs().max(1) as f64;
    magnitude.log10() + created_at.timestamp() as f64 / 45_000.0
}

/// Lower bound of the Wilson score confidence interval (z = 1.96) for the
/// approval proportion `love / (love + meh)`. Zero with no votes; penalizes
/// small samples against large ones at the same ratio.
pub fn wilson(love: u64, meh: u64) -> f64 {
    const Z: f64 = 1.96;
    let n = (love + meh) as f64;
    if n == 0.0 {
        return 0.0;
    }
    let p = love as f64 / n;
    let numerator = p + Z * Z / (2.0 * n) - Z * ((p * (1.0 - p) + Z * Z / (4.0 * n)) / n).sqrt();
    numerator / (1.0 + Z * Z / n)
}

/// Filter, sort and paginate a snapshot's items.
///
/// The cursor always cuts under `(created_at desc, id desc)` ordering,
/// independent of the active sort mode.
pub fn select(items: &[ItemView], query: &SelectQuery, now: DateTime<Utc>) -> Page {
    let since = query.window.since(now);

    let mut matched: Vec<&ItemView> = items
        .iter()
        .filter(|it| it.status == ItemStatus::Published)
        .filter(|it| since.is_none_or(|s| it.created_at >= s))
        .collect();

    if let Some(tag) = &query.tag {
        let tag = tag.trim().to_lowercase();
        matched.retain(|it| it.tags.iter().any(|t| t == &tag));
    }

    if let Some(q) = &query.query {
        let needle = q.trim().to_lowercase();
        if !needle.is_empty() {
            matched.retain(|it| {
                format!("{} {}", it.title, it.content)
                    .to_lowercase()
                    .contains(&needle)
            });
        }
    }

    match query.sort {
        SortMode::New => {
            matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)))
        }
        SortMode::Top => matched.sort_by(|a, b| {
            wilson(b.love_count, b.meh_count)
                .partial_cmp(&wilson(a.love_count, a.meh_count))
                .unwrap_or(Ordering::Equal)
        }),
        SortMode::Hot => matched.sort_by(|a, b| {
            hot(b.score(), b.created_at)
                .partial_cmp(&hot(a.score(), a.created_at))
                .unwrap_or(Ordering::Equal)
        }),
    }

    if let Some(cursor) = query.cursor {
        matched.retain(|it| {
            it.created_at < cursor.created_at
                || (it.created_at == cursor.created_at && it.id < cursor.id)
        });
    }

    let page: Vec<ItemView> = matched
        .iter()
        .take(query.limit)
        .map(|it| (*it).clone())
        .collect();

    let next_cursor = if page.len() < matched.len() {
        page.last().map(|it| Cursor {
            created_at: it.created_at,
            id: it.id,
        })
    } else {
        None
    };

    Page { items: page, next_cursor }
}
