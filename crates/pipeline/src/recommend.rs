//! Per-user top-N extraction.
//!
//! Items are ranked by score descending, ties broken by ascending item index,
//! so the result is fully determined by the model. Users are ranked in
//! parallel; each worker only scores the row it is ranking.

use crate::error::{PipelineError, Result};
use crate::identity::{ItemIndex, UserIndex};
use crate::prediction::PredictionMatrix;
use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredItem {
    pub item: ItemIndex,
    pub score: f32,
}

/// Ranking order: higher score first, then lower item index
fn ranking(a: &ScoredItem, b: &ScoredItem) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.item.cmp(&b.item))
}

/// The best `n` of `scores`, in ranking order
pub fn rank_items(scores: Vec<(ItemIndex, f32)>, n: usize) -> Vec<ScoredItem> {
    let mut items: Vec<ScoredItem> = scores
        .into_iter()
        .map(|(item, score)| ScoredItem { item, score })
        .collect();

    if n == 0 {
        return Vec::new();
    }
    if items.len() > n {
        items.select_nth_unstable_by(n - 1, ranking);
        items.truncate(n);
    }
    items.sort_by(ranking);
    items
}

/// Top-N lists for every user with a factor vector
#[derive(Debug, Clone, Default, Serialize)]
pub struct TopNRecommendations {
    n: usize,
    lists: BTreeMap<UserIndex, Vec<ScoredItem>>,
}

impl TopNRecommendations {
    pub fn n(&self) -> usize {
        self.n
    }

    pub fn get(&self, user: UserIndex) -> Option<&[ScoredItem]> {
        self.lists.get(&user).map(Vec::as_slice)
    }

    /// Item indices only, best first
    pub fn items(&self, user: UserIndex) -> Option<Vec<ItemIndex>> {
        self.get(user).map(|list| list.iter().map(|s| s.item).collect())
    }

    pub fn contains_user(&self, user: UserIndex) -> bool {
        self.lists.contains_key(&user)
    }

    /// Whether `item` is anywhere in `user`'s list
    pub fn contains(&self, user: UserIndex, item: ItemIndex) -> bool {
        self.get(user)
            .is_some_and(|list| list.iter().any(|s| s.item == item))
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (UserIndex, &[ScoredItem])> {
        self.lists.iter().map(|(&u, list)| (u, list.as_slice()))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TopNRecommender {
    n: usize,
}

impl TopNRecommender {
    pub fn new(n: usize) -> Result<Self> {
        if n == 0 {
            return Err(PipelineError::Config("top_n must be positive".to_string()));
        }
        Ok(Self { n })
    }

    /// Rank every user in the matrix
    #[instrument(skip_all, fields(n = self.n))]
    pub fn recommend(&self, matrix: &PredictionMatrix<'_>) -> TopNRecommendations {
        let users: Vec<UserIndex> = matrix.users().collect();
        let lists: BTreeMap<UserIndex, Vec<ScoredItem>> = users
            .par_iter()
            .filter_map(|&user| {
                let row = matrix.row(user)?;
                Some((user, rank_items(row, self.n)))
            })
            .collect();

        debug!(users = lists.len(), "Extracted top-{} lists", self.n);
        TopNRecommendations { n: self.n, lists }
    }

    /// Rank a single user; `None` if the user has no factor vector
    pub fn recommend_user(
        &self,
        matrix: &PredictionMatrix<'_>,
        user: UserIndex,
    ) -> Option<Vec<ScoredItem>> {
        matrix.row(user).map(|row| rank_items(row, self.n))
    }
}
