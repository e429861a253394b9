//! Collapse raw events into per-(user, item) interaction counts.

use data_loader::RawEvent;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Number of raw events for one (user, item) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Interaction {
    pub user_id: String,
    pub item_id: String,
    pub count: u32,
}

/// Count events per (user, item) and keep pairs with `count > min_count`
///
/// The comparison is strict: a pair seen exactly `min_count` times is
/// dropped. Output is sorted by (user_id, item_id).
#[instrument(skip(events), fields(events = events.len()))]
pub fn aggregate(events: &[RawEvent], min_count: u32) -> Vec<Interaction> {
    let counts: HashMap<(&str, &str), u32> = events
        .par_iter()
        .fold(HashMap::new, |mut acc, event| {
            *acc.entry((event.user_id.as_str(), event.item_id.as_str()))
                .or_insert(0) += 1;
            acc
        })
        .reduce(HashMap::new, |mut left, right| {
            for (pair, count) in right {
                *left.entry(pair).or_insert(0) += count;
            }
            left
        });

    let total_pairs = counts.len();
    let mut interactions: Vec<Interaction> = counts
        .into_iter()
        .filter(|&(_, count)| count > min_count)
        .map(|((user_id, item_id), count)| Interaction {
            user_id: user_id.to_string(),
            item_id: item_id.to_string(),
            count,
        })
        .collect();
    interactions.sort_by(|a, b| (&a.user_id, &a.item_id).cmp(&(&b.user_id, &b.item_id)));

    debug!(
        total_pairs,
        retained = interactions.len(),
        "Aggregated events with min_count {}",
        min_count
    );
    interactions
}
