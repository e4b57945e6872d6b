use forecast_core::NewsItem;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Headlines kept after merging all sources
pub const MAX_MERGED_NEWS: usize = 15;
/// Below this many items from the extra sources, the provider's own feed is added
pub const MIN_PRIMARY_NEWS: usize = 5;

/// Merge news batches in priority order.
///
/// Titles are compared case-insensitively and the first occurrence wins. The
/// result is ordered most recent first, undated items last, and capped at
/// `MAX_MERGED_NEWS`.
pub fn merge_news<I>(batches: I) -> Vec<NewsItem>
where
    I: IntoIterator<Item = Vec<NewsItem>>,
{
    let mut seen = HashSet::new();
    let mut merged: Vec<NewsItem> = batches
        .into_iter()
        .flatten()
        .filter(|item| seen.insert(item.title.trim().to_lowercase()))
        .collect();

    merged.sort_by(|a, b| match (a.published_at, b.published_at) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    merged.truncate(MAX_MERGED_NEWS);
    merged
}
