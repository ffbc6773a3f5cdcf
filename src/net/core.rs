//! 运行时: 网结构校验、可发生判定与发生语义.
use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

use crate::net::ids::{PlaceId, TransitionId};
use crate::net::incidence::Incidence;
use crate::net::index_vec::{Idx, IndexVec};
use crate::net::structure::{Arc, Marking, Place, Tokens, Transition, Weight};

/// 对未使能迁移调用 [`Net::fire`] 等违背调用约定的情况.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FireError {
    #[error("transition {0:?} is out of bounds")]
    OutOfBounds(TransitionId),
    #[error("transition {0:?} is not enabled under the supplied marking")]
    NotEnabled(TransitionId),
    #[error("marking has {found} places, net has {expected}")]
    MarkingShape { expected: usize, found: usize },
    #[error("token count overflow at place {0:?}")]
    Overflow(PlaceId),
    #[error("capacity exceeded at place {place:?}: {after} > {capacity}")]
    Capacity {
        place: PlaceId,
        after: Weight,
        capacity: Weight,
    },
}

/// 结构非法的网. 在探索开始前报告, 不做恢复.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidNetError {
    #[error("{matrix} matrix is {places}x{transitions}, expected {expected_places}x{expected_transitions}")]
    IncidenceShape {
        matrix: &'static str,
        places: usize,
        transitions: usize,
        expected_places: usize,
        expected_transitions: usize,
    },
    #[error("arc references unknown place {0}")]
    UnknownPlace(String),
    #[error("arc references unknown transition {0}")]
    UnknownTransition(String),
    #[error("arc between {place} and {transition} has weight 0")]
    ZeroWeight { place: String, transition: String },
    #[error("place {place} starts with {tokens} tokens, capacity is {capacity}")]
    CapacityExceeded {
        place: String,
        tokens: Weight,
        capacity: Weight,
    },
    #[error("duplicate place name {0}")]
    DuplicatePlace(String),
    #[error("duplicate transition name {0}")]
    DuplicateTransition(String),
    #[error("initial marking has {found} entries, net has {expected} places")]
    MarkingLength { expected: usize, found: usize },
}

#[derive(Clone, serde::Serialize, serde::Deserialize)]
pub struct Net {
    pub places: IndexVec<PlaceId, Place>,
    pub transitions: IndexVec<TransitionId, Transition>,
    pub pre: Incidence<Weight>,
    pub post: Incidence<Weight>,
}

impl fmt::Debug for Net {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Net")
            .field("places", &self.places)
            .field("transitions", &self.transitions)
            .field("pre", &self.pre)
            .field("post", &self.post)
            .finish()
    }
}

impl Net {
    pub fn empty() -> Self {
        Self {
            places: IndexVec::new(),
            transitions: IndexVec::new(),
            pre: Incidence::new(0, 0, 0),
            post: Incidence::new(0, 0, 0),
        }
    }

    pub fn add_place(&mut self, place: Place) -> PlaceId {
        let place_id = self.places.push(place);
        self.pre.push_place_with_default(0);
        self.post.push_place_with_default(0);
        place_id
    }

    pub fn add_transition(&mut self, transition: Transition) -> TransitionId {
        let transition_id = self.transitions.push(transition);
        self.pre.push_transition_with_default(0);
        self.post.push_transition_with_default(0);
        transition_id
    }

    /// 输入弧: place -> transition. 重复添加时权重累加.
    pub fn add_input_arc(
        &mut self,
        place: PlaceId,
        transition: TransitionId,
        weight: Weight,
    ) -> Result<(), InvalidNetError> {
        self.check_arc(place, transition, weight)?;
        *self.pre.get_mut(place, transition) += weight;
        Ok(())
    }

    /// 输出弧: transition -> place.
    pub fn add_output_arc(
        &mut self,
        place: PlaceId,
        transition: TransitionId,
        weight: Weight,
    ) -> Result<(), InvalidNetError> {
        self.check_arc(place, transition, weight)?;
        *self.post.get_mut(place, transition) += weight;
        Ok(())
    }

    fn check_arc(
        &self,
        place: PlaceId,
        transition: TransitionId,
        weight: Weight,
    ) -> Result<(), InvalidNetError> {
        let Some(place_ref) = self.places.get(place) else {
            return Err(InvalidNetError::UnknownPlace(format!("{:?}", place)));
        };
        let Some(transition_ref) = self.transitions.get(transition) else {
            return Err(InvalidNetError::UnknownTransition(format!(
                "{:?}",
                transition
            )));
        };
        if weight == 0 {
            return Err(InvalidNetError::ZeroWeight {
                place: place_ref.name.clone(),
                transition: transition_ref.name.clone(),
            });
        }
        Ok(())
    }

    pub fn places_len(&self) -> usize {
        self.places.len()
    }

    pub fn transitions_len(&self) -> usize {
        self.transitions.len()
    }

    pub fn place_names(&self) -> Vec<String> {
        self.places.iter().map(|place| place.name.clone()).collect()
    }

    pub fn transition_name(&self, transition: TransitionId) -> &str {
        &self.transitions[transition].name
    }

    pub fn place_id(&self, name: &str) -> Option<PlaceId> {
        self.places
            .iter_enumerated()
            .find(|(_, place)| place.name == name)
            .map(|(id, _)| id)
    }

    pub fn transition_id(&self, name: &str) -> Option<TransitionId> {
        self.transitions
            .iter_enumerated()
            .find(|(_, transition)| transition.name == name)
            .map(|(id, _)| id)
    }

    pub fn initial_marking(&self) -> Marking {
        Marking::from_counts(self.places.iter().map(|place| place.tokens))
    }

    /// 输入弧, 按库所声明顺序.
    pub fn input_arcs(&self, transition: TransitionId) -> Vec<Arc> {
        self.pre
            .column(transition)
            .filter(|(_, weight)| **weight > 0)
            .map(|(place, weight)| Arc::input(place, transition, *weight))
            .collect()
    }

    pub fn output_arcs(&self, transition: TransitionId) -> Vec<Arc> {
        self.post
            .column(transition)
            .filter(|(_, weight)| **weight > 0)
            .map(|(place, weight)| Arc::output(place, transition, *weight))
            .collect()
    }

    /// 检查矩阵形状、容量、名称唯一性. 反序列化得到的网必须先经过这里.
    pub fn validate(&self) -> Result<(), InvalidNetError> {
        let places = self.places_len();
        let transitions = self.transitions_len();
        for (matrix, incidence) in [("pre", &self.pre), ("post", &self.post)] {
            if incidence.places() != places
                || incidence.transitions() != transitions
                || !incidence.is_rectangular()
            {
                return Err(InvalidNetError::IncidenceShape {
                    matrix,
                    places: incidence.places(),
                    transitions: incidence.transitions(),
                    expected_places: places,
                    expected_transitions: transitions,
                });
            }
        }

        let mut seen = HashSet::new();
        for place in self.places.iter() {
            if !seen.insert(place.name.as_str()) {
                return Err(InvalidNetError::DuplicatePlace(place.name.clone()));
            }
            if let Some(capacity) = place.capacity {
                if place.tokens > capacity {
                    return Err(InvalidNetError::CapacityExceeded {
                        place: place.name.clone(),
                        tokens: place.tokens,
                        capacity,
                    });
                }
            }
        }

        let mut seen = HashSet::new();
        for transition in self.transitions.iter() {
            if !seen.insert(transition.name.as_str()) {
                return Err(InvalidNetError::DuplicateTransition(
                    transition.name.clone(),
                ));
            }
        }
        Ok(())
    }

    pub fn enabled_transitions(&self, marking: &Marking) -> Vec<TransitionId> {
        self.transitions
            .indices()
            .filter(|&transition| self.is_enabled(transition, marking))
            .collect()
    }

    /// `∀p: M[p] ≥ Pre[p, t]`. `ω` 满足任何需求.
    pub fn is_enabled(&self, transition: TransitionId, marking: &Marking) -> bool {
        if transition.index() >= self.transitions_len() || marking.len() != self.places_len() {
            return false;
        }
        self.pre
            .column(transition)
            .all(|(place, weight)| marking.tokens(place).covers(*weight))
    }

    /// `M' = M - Pre[:, t] + Post[:, t]`. `ω` 分量保持 `ω`.
    pub fn fire(&self, transition: TransitionId, marking: &Marking) -> Result<Marking, FireError> {
        if transition.index() >= self.transitions_len() {
            return Err(FireError::OutOfBounds(transition));
        }
        if marking.len() != self.places_len() {
            return Err(FireError::MarkingShape {
                expected: self.places_len(),
                found: marking.len(),
            });
        }
        if !self.is_enabled(transition, marking) {
            return Err(FireError::NotEnabled(transition));
        }

        let mut next = marking.clone();
        for (place, weight) in self.pre.column(transition) {
            if *weight > 0 {
                let tokens = next.tokens_mut(place);
                *tokens = tokens
                    .checked_sub(*weight)
                    .ok_or(FireError::NotEnabled(transition))?;
            }
        }
        for (place, weight) in self.post.column(transition) {
            if *weight > 0 {
                let tokens = next.tokens_mut(place);
                *tokens = tokens
                    .checked_add(*weight)
                    .ok_or(FireError::Overflow(place))?;
            }
        }
        Ok(next)
    }

    /// 有限分量不超过库所容量. `ω` 分量不检查.
    pub fn check_capacity(&self, marking: &Marking) -> Result<(), FireError> {
        for (place, tokens) in marking.iter() {
            let (Some(capacity), Tokens::Finite(after)) = (self.places[place].capacity, tokens)
            else {
                continue;
            };
            if after > capacity {
                return Err(FireError::Capacity {
                    place,
                    after,
                    capacity,
                });
            }
        }
        Ok(())
    }

    pub fn is_capacity_bounded(&self, place: PlaceId) -> bool {
        self.places[place].capacity.is_some()
    }
}

impl Default for Net {
    fn default() -> Self {
        Self::empty()
    }
}
