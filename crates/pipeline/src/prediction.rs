//! Predicted affinity `score(u, i) = U[u] · I[i]`.
//!
//! [`PredictionMatrix`] is a lazy view over a [`FactorModel`]: rows are
//! computed on demand, so top-N extraction never holds more than one user's
//! scores per worker. [`PredictionMatrix::to_dense`] materializes the whole
//! thing for small models and tests.

use crate::identity::{ItemIndex, UserIndex};
use crate::trainer::FactorModel;

pub(crate) fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[derive(Debug, Clone, Copy)]
pub struct PredictionMatrix<'m> {
    model: &'m FactorModel,
}

impl<'m> PredictionMatrix<'m> {
    pub fn build(model: &'m FactorModel) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &'m FactorModel {
        self.model
    }

    /// `None` when either side is absent from the model
    pub fn score(&self, user: UserIndex, item: ItemIndex) -> Option<f32> {
        let u = self.model.user_vector(user)?;
        let i = self.model.item_vector(item)?;
        Some(dot(u, i))
    }

    /// Scores of every item for one user, in ascending item order
    pub fn row(&self, user: UserIndex) -> Option<Vec<(ItemIndex, f32)>> {
        let u = self.model.user_vector(user)?;
        Some(self.model.items().map(|(item, v)| (item, dot(u, v))).collect())
    }

    pub fn users(&self) -> impl Iterator<Item = UserIndex> + 'm {
        self.model.users()
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.model.num_users(), self.model.num_items())
    }

    /// Materialize every score
    pub fn to_dense(&self) -> DenseScores {
        let users: Vec<UserIndex> = self.model.users().collect();
        let items: Vec<ItemIndex> = self.model.items().map(|(i, _)| i).collect();
        let scores = users
            .iter()
            .flat_map(|&u| self.row(u).unwrap_or_default().into_iter().map(|(_, s)| s))
            .collect();
        DenseScores {
            users,
            items,
            scores,
        }
    }
}

/// Row-major users × items score matrix
#[derive(Debug, Clone, PartialEq)]
pub struct DenseScores {
    pub users: Vec<UserIndex>,
    pub items: Vec<ItemIndex>,
    pub scores: Vec<f32>,
}

impl DenseScores {
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row >= self.users.len() || col >= self.items.len() {
            return None;
        }
        self.scores.get(row * self.items.len() + col).copied()
    }
}
