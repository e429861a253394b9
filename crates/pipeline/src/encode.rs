//! Turn interaction counts into the two rating signals.
//!
//! - **explicit**: quantile bucket of the count. Records are ranked by
//!   (count, user, item) and record `r` of `N` goes to bucket
//!   `floor(r * B / N)`, which puts `floor(N/B)` or `ceil(N/B)` records in
//!   every bucket. When `N < B` some buckets stay empty.
//! - **implicit**: `ln(count)`.

use crate::aggregate::Interaction;
use crate::error::{PipelineError, Result};
use crate::identity::{IdentityRegistry, ItemIndex, UserIndex};
use crate::trainer::FeedbackMode;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, instrument};

/// One interaction with both rating signals attached
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingRecord {
    pub user: UserIndex,
    pub item: ItemIndex,
    pub count: u32,
    /// Quantile bucket in `[0, num_buckets - 1]`
    pub explicit_rating: u32,
    /// `ln(count)`
    pub implicit_rating: f64,
}

impl RatingRecord {
    /// The rating column a given feedback mode trains on
    pub fn rating(&self, mode: FeedbackMode) -> f32 {
        match mode {
            FeedbackMode::Explicit => self.explicit_rating as f32,
            FeedbackMode::Implicit => self.implicit_rating as f32,
        }
    }
}

/// Derives [`RatingRecord`]s from interactions
#[derive(Debug, Clone, Copy)]
pub struct RatingEncoder {
    num_buckets: usize,
}

impl RatingEncoder {
    pub fn new(num_buckets: usize) -> Result<Self> {
        if num_buckets == 0 {
            return Err(PipelineError::Domain(
                "number of rating buckets must be positive".to_string(),
            ));
        }
        Ok(Self { num_buckets })
    }

    pub fn num_buckets(&self) -> usize {
        self.num_buckets
    }

    /// Encode `interactions`, resolving identifiers through the registries
    ///
    /// Output order matches input order.
    #[instrument(skip_all, fields(interactions = interactions.len(), buckets = self.num_buckets))]
    pub fn encode(
        &self,
        interactions: &[Interaction],
        users: &IdentityRegistry,
        items: &IdentityRegistry,
    ) -> Result<Vec<RatingRecord>> {
        let mut records: Vec<RatingRecord> = interactions
            .par_iter()
            .map(|interaction| {
                let user = users.index_of(&interaction.user_id).ok_or_else(|| {
                    PipelineError::Data(format!("unknown user id {:?}", interaction.user_id))
                })?;
                let item = items.index_of(&interaction.item_id).ok_or_else(|| {
                    PipelineError::Data(format!("unknown item id {:?}", interaction.item_id))
                })?;
                Ok(RatingRecord {
                    user,
                    item,
                    count: interaction.count,
                    explicit_rating: 0,
                    implicit_rating: log_rating(interaction.count)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut order: Vec<usize> = (0..records.len()).collect();
        order.sort_by_key(|&pos| {
            let r = &records[pos];
            (r.count, r.user, r.item)
        });

        let total = records.len();
        for (rank, pos) in order.into_iter().enumerate() {
            records[pos].explicit_rating = bucket_of(rank, total, self.num_buckets);
        }

        debug!(
            populations = ?bucket_populations(&records, self.num_buckets),
            "Encoded {} rating records",
            records.len()
        );
        Ok(records)
    }
}

/// Natural log of a positive count
pub fn log_rating(count: u32) -> Result<f64> {
    if count == 0 {
        return Err(PipelineError::Domain(
            "cannot take the log of a zero interaction count".to_string(),
        ));
    }
    Ok((count as f64).ln())
}

/// Bucket of the record ranked `rank` among `total`
fn bucket_of(rank: usize, total: usize, num_buckets: usize) -> u32 {
    let bucket = (rank * num_buckets) / total.max(1);
    bucket.min(num_buckets - 1) as u32
}

/// Number of records in each explicit bucket
pub fn bucket_populations(records: &[RatingRecord], num_buckets: usize) -> Vec<usize> {
    let mut populations = vec![0; num_buckets];
    for record in records {
        if let Some(slot) = populations.get_mut(record.explicit_rating as usize) {
            *slot += 1;
        }
    }
    populations
}
