//! Revenue ingestion.
//!
//! A [`RevenueFeed`] returns one page of raw points for one source. The
//! pagination driver [`collect_source_points`] walks pages until the feed is
//! exhausted or the source profile's point cap is reached.

pub mod subgraph;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, info, instrument};

use crate::config::{SourceConfig, SourceKind, SourceProfile};

pub use crate::revenue::RawPoint;

const SECONDS_PER_DAY: i64 = 86_400;
/// Used when a windowed entity's profile leaves the lookback unset.
const DEFAULT_LOOKBACK_DAYS: i64 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    fn as_graphql(&self) -> &'static str {
        match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
        }
    }
}

/// How one kind of remote entity is queried: which collection, which fields
/// carry the timestamp and the value, in which order, and whether the query
/// is bounded by a time window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryShape {
    pub collection: String,
    pub timestamp_field: &'static str,
    pub value_field: &'static str,
    pub order: SortOrder,
    pub windowed: bool,
}

impl QueryShape {
    pub fn for_source(kind: SourceKind, entity: Option<&str>) -> Self {
        match kind {
            SourceKind::LendingSnapshots => Self {
                collection: entity.unwrap_or("financialsDailySnapshots").to_string(),
                timestamp_field: "timestamp",
                value_field: "dailyTotalRevenueUSD",
                order: SortOrder::Ascending,
                windowed: true,
            },
            SourceKind::DexDayData => Self {
                collection: entity.unwrap_or("uniswapDayDatas").to_string(),
                timestamp_field: "date",
                value_field: "feesUSD",
                order: SortOrder::Descending,
                windowed: false,
            },
        }
    }

    /// GraphQL document for one page of this entity.
    pub fn document(&self) -> String {
        let ts = self.timestamp_field;
        if self.windowed {
            format!(
                "query Revenue($first: Int!, $skip: Int!, $start: Int!, $end: Int!) {{ \
                 {collection}(first: $first, skip: $skip, \
                 where: {{ {ts}_gte: $start, {ts}_lt: $end }}, \
                 orderBy: {ts}, orderDirection: {dir}) {{ {ts} {value} }} }}",
                collection = self.collection,
                dir = self.order.as_graphql(),
                value = self.value_field,
            )
        } else {
            format!(
                "query Revenue($first: Int!, $skip: Int!) {{ \
                 {collection}(first: $first, skip: $skip, \
                 orderBy: {ts}, orderDirection: {dir}) {{ {ts} {value} }} }}",
                collection = self.collection,
                dir = self.order.as_graphql(),
                value = self.value_field,
            )
        }
    }

    pub fn variables(&self, request: &PageRequest) -> serde_json::Value {
        match (&request.window, self.windowed) {
            (Some(window), true) => json!({
                "first": request.first,
                "skip": request.skip,
                "start": window.start,
                "end": window.end,
            }),
            _ => json!({
                "first": request.first,
                "skip": request.skip,
            }),
        }
    }
}

/// Half-open `[start, end)` range in epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: i64,
    pub end: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub skip: usize,
    pub first: usize,
    pub window: Option<TimeWindow>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevenuePage {
    pub points: Vec<RawPoint>,
    /// Records the source returned, including any that failed to decode.
    pub received: usize,
    pub has_more: bool,
}

/// Trait for remote revenue sources.
#[async_trait]
pub trait RevenueFeed: Send + Sync {
    /// Fetch one page of raw points for `source`.
    async fn fetch_page(&self, source: &SourceConfig, request: &PageRequest) -> Result<RevenuePage>;

    /// Human-readable name of this feed.
    fn name(&self) -> &str;
}

/// Query window ending at `now` for windowed entities, never starting before
/// the source's launch date.
pub fn source_window(
    source: &SourceConfig,
    profile: &SourceProfile,
    now: DateTime<Utc>,
) -> Option<TimeWindow> {
    if !source.query_shape().windowed {
        return None;
    }

    let end = now.timestamp();
    let lookback = profile.lookback_days.unwrap_or(DEFAULT_LOOKBACK_DAYS);
    let mut start = end - lookback * SECONDS_PER_DAY;

    if let Some(launch) = source.launch_date.and_then(|d| d.and_hms_opt(0, 0, 0)) {
        start = start.max(launch.and_utc().timestamp());
    }

    Some(TimeWindow { start, end })
}

/// Pull every page of one source, up to the profile's point cap.
///
/// Stops when the feed reports no further pages, returns no records, or the
/// cap is reached. A page whose records were all quarantined still advances. Points are kept in the order the feed delivered them and
/// truncated to the cap.
#[instrument(skip(feed, source, profile), fields(source = %source.id, feed = feed.name()))]
pub async fn collect_source_points(
    feed: &dyn RevenueFeed,
    source: &SourceConfig,
    profile: &SourceProfile,
    page_size: usize,
    now: DateTime<Utc>,
) -> Result<Vec<RawPoint>> {
    let cap = profile.max_points;
    let window = source_window(source, profile, now);
    let mut points: Vec<RawPoint> = Vec::new();
    let mut skip = 0usize;

    while points.len() < cap {
        let request = PageRequest {
            skip,
            first: page_size.min(cap - points.len()),
            window,
        };
        let page = feed.fetch_page(source, &request).await?;

        debug!(
            skip,
            first = request.first,
            received = page.received,
            kept = page.points.len(),
            has_more = page.has_more,
            "Page fetched"
        );

        if page.received == 0 {
            break;
        }

        skip += request.first;
        points.extend(page.points);

        if !page.has_more {
            break;
        }
    }

    points.truncate(cap);

    info!(points = points.len(), cap, "Source points collected");
    Ok(points)
}
