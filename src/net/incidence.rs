//! 输入/输出弧权重矩阵 (`Pre`, `Post`), 行为库所, 列为迁移.
use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::net::ids::{PlaceId, TransitionId};
use crate::net::index_vec::{Idx, IndexVec};

type SmallRow<T> = SmallVec<[T; 4]>;

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Incidence<T> {
    rows: IndexVec<PlaceId, SmallRow<T>>,
    cols: usize,
}

impl<T: Clone> Incidence<T> {
    pub fn new(places: usize, transitions: usize, default: T) -> Self {
        let rows = (0..places)
            .map(|_| SmallRow::from_elem(default.clone(), transitions))
            .collect();
        Self {
            rows,
            cols: transitions,
        }
    }

    /// Builds a matrix from dense rows. Returns `None` when the rows are ragged.
    pub fn from_dense(rows: Vec<Vec<T>>, transitions: usize) -> Option<Self> {
        if rows.iter().any(|row| row.len() != transitions) {
            return None;
        }
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().collect::<SmallRow<_>>())
            .collect();
        Some(Self {
            rows,
            cols: transitions,
        })
    }

    pub fn push_place_with_default(&mut self, default: T) -> PlaceId {
        self.rows.push(SmallRow::from_elem(default, self.cols))
    }

    pub fn push_transition_with_default(&mut self, default: T) -> TransitionId {
        let next = self.cols;
        for row in self.rows.iter_mut() {
            row.push(default.clone());
        }
        self.cols += 1;
        TransitionId::from_usize(next)
    }

    pub fn places(&self) -> usize {
        self.rows.len()
    }

    pub fn transitions(&self) -> usize {
        self.cols
    }

    /// True when every row has exactly `transitions()` entries.
    pub fn is_rectangular(&self) -> bool {
        self.rows.iter().all(|row| row.len() == self.cols)
    }

    pub fn get(&self, place: PlaceId, transition: TransitionId) -> &T {
        &self.rows[place][transition.index()]
    }

    pub fn get_mut(&mut self, place: PlaceId, transition: TransitionId) -> &mut T {
        &mut self.rows[place][transition.index()]
    }

    pub fn set(&mut self, place: PlaceId, transition: TransitionId, value: T) {
        self.rows[place][transition.index()] = value;
    }

    pub fn rows(&self) -> &IndexVec<PlaceId, SmallRow<T>> {
        &self.rows
    }

    /// Column of `transition`, one entry per place in declaration order.
    pub fn column(&self, transition: TransitionId) -> impl Iterator<Item = (PlaceId, &T)> {
        self.rows
            .iter_enumerated()
            .map(move |(place, row)| (place, &row[transition.index()]))
    }
}

impl<T: fmt::Debug> fmt::Debug for Incidence<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Incidence")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growing_keeps_shape() {
        let mut matrix = Incidence::new(1, 0, 0u64);
        let t = matrix.push_transition_with_default(0);
        let p = matrix.push_place_with_default(0);
        matrix.set(p, t, 3);

        assert_eq!(matrix.places(), 2);
        assert_eq!(matrix.transitions(), 1);
        assert!(matrix.is_rectangular());
        assert_eq!(*matrix.get(p, t), 3);
        let column: Vec<_> = matrix.column(t).map(|(_, w)| *w).collect();
        assert_eq!(column, vec![0, 3]);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        assert!(Incidence::from_dense(vec![vec![1u64, 0], vec![1]], 2).is_none());
        let matrix = Incidence::from_dense(vec![vec![1u64, 0], vec![0, 2]], 2).unwrap();
        assert_eq!(*matrix.get(PlaceId::new(1), TransitionId::new(1)), 2);
    }
}
