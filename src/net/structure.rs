//! P/T 网静态结构元素：库所、迁移、弧与标识。
//!
//! 标识的每个分量是 [`Tokens`]：有限计数或 `ω`（沿某条发生序列可无限增长）。
//! `ω` 大于任何有限值且只等于自身，因此单个分量上的序是全序，
//! 标识上的支配关系则是逐分量的偏序。
use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::net::ids::{PlaceId, TransitionId};
use crate::net::index_vec::IndexVec;

pub type Weight = u64;

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Debug)]
pub struct Place {
    pub name: String,
    pub tokens: Weight,
    /// `None` 表示无容量限制.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<Weight>,
}

impl Place {
    pub fn new(name: impl Into<String>, tokens: Weight) -> Self {
        Self {
            name: name.into(),
            tokens,
            capacity: None,
        }
    }

    pub fn new_with_tokens_and_capacity(
        name: impl Into<String>,
        tokens: Weight,
        capacity: Weight,
    ) -> Self {
        Self {
            name: name.into(),
            tokens,
            capacity: Some(capacity),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Transition {
    pub name: String,
}

impl Transition {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Transition").field(&self.name).finish()
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Arc {
    pub place: PlaceId,
    pub transition: TransitionId,
    pub weight: Weight,
    pub direction: ArcDirection,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ArcDirection {
    PlaceToTransition,
    TransitionToPlace,
}

impl Arc {
    pub fn new(
        place: PlaceId,
        transition: TransitionId,
        weight: Weight,
        direction: ArcDirection,
    ) -> Self {
        Self {
            place,
            transition,
            weight,
            direction,
        }
    }

    pub fn input(place: PlaceId, transition: TransitionId, weight: Weight) -> Self {
        Self::new(place, transition, weight, ArcDirection::PlaceToTransition)
    }

    pub fn output(place: PlaceId, transition: TransitionId, weight: Weight) -> Self {
        Self::new(place, transition, weight, ArcDirection::TransitionToPlace)
    }
}

impl fmt::Debug for Arc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            ArcDirection::PlaceToTransition => {
                write!(f, "{:?} -{}-> {:?}", self.place, self.weight, self.transition)
            }
            ArcDirection::TransitionToPlace => {
                write!(f, "{:?} -{}-> {:?}", self.transition, self.weight, self.place)
            }
        }
    }
}

/// 单个库所上的 token 数.
///
/// 变体顺序决定了派生的 `Ord`：任何 `Finite` 都小于 `Omega`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tokens {
    Finite(Weight),
    Omega,
}

impl Tokens {
    pub const ZERO: Tokens = Tokens::Finite(0);

    pub fn is_omega(self) -> bool {
        matches!(self, Tokens::Omega)
    }

    pub fn finite(self) -> Option<Weight> {
        match self {
            Tokens::Finite(count) => Some(count),
            Tokens::Omega => None,
        }
    }

    /// 是否至少有 `weight` 个 token.
    pub fn covers(self, weight: Weight) -> bool {
        match self {
            Tokens::Finite(count) => count >= weight,
            Tokens::Omega => true,
        }
    }

    pub fn checked_sub(self, weight: Weight) -> Option<Tokens> {
        match self {
            Tokens::Finite(count) => count.checked_sub(weight).map(Tokens::Finite),
            Tokens::Omega => Some(Tokens::Omega),
        }
    }

    pub fn checked_add(self, weight: Weight) -> Option<Tokens> {
        match self {
            Tokens::Finite(count) => count.checked_add(weight).map(Tokens::Finite),
            Tokens::Omega => Some(Tokens::Omega),
        }
    }
}

impl From<Weight> for Tokens {
    fn from(value: Weight) -> Self {
        Tokens::Finite(value)
    }
}

impl fmt::Debug for Tokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Tokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tokens::Finite(count) => write!(f, "{}", count),
            Tokens::Omega => f.write_str("ω"),
        }
    }
}

impl Serialize for Tokens {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Tokens::Finite(count) => serializer.serialize_u64(*count),
            Tokens::Omega => serializer.serialize_str("ω"),
        }
    }
}

impl<'de> Deserialize<'de> for Tokens {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Count(Weight),
            Symbol(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Count(count) => Ok(Tokens::Finite(count)),
            Repr::Symbol(symbol) if is_omega_symbol(&symbol) => Ok(Tokens::Omega),
            Repr::Symbol(other) => Err(serde::de::Error::invalid_value(
                serde::de::Unexpected::Str(&other),
                &"a token count or ω",
            )),
        }
    }
}

/// TINA 打印 `w`, 我们自己打印 `ω`.
pub fn is_omega_symbol(symbol: &str) -> bool {
    matches!(symbol, "ω" | "w" | "omega" | "inf")
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Marking(pub IndexVec<PlaceId, Tokens>);

impl Marking {
    pub fn new(tokens: IndexVec<PlaceId, Tokens>) -> Self {
        Self(tokens)
    }

    pub fn from_counts(counts: impl IntoIterator<Item = Weight>) -> Self {
        Self(counts.into_iter().map(Tokens::Finite).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PlaceId, Tokens)> {
        self.0.iter_enumerated().map(|(place, tokens)| (place, *tokens))
    }

    pub fn tokens(&self, place: PlaceId) -> Tokens {
        self.0[place]
    }

    pub fn tokens_mut(&mut self, place: PlaceId) -> &mut Tokens {
        &mut self.0[place]
    }

    pub fn has_omega(&self) -> bool {
        self.0.iter().any(|tokens| tokens.is_omega())
    }

    pub fn omega_places(&self) -> impl Iterator<Item = PlaceId> {
        self.iter()
            .filter(|(_, tokens)| tokens.is_omega())
            .map(|(place, _)| place)
    }

    /// `self ≥ other` 逐分量成立且两者不等.
    pub fn dominates(&self, other: &Marking) -> bool {
        self.partial_cmp(other) == Some(Ordering::Greater)
    }

    pub fn into_inner(self) -> IndexVec<PlaceId, Tokens> {
        self.0
    }
}

impl fmt::Debug for Marking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (place, tokens) in self.iter() {
            map.entry(&place, &tokens);
        }
        map.finish()
    }
}

/// `[1, 0, ω]`, the label format used in DOT output.
impl fmt::Display for Marking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (idx, tokens) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", tokens)?;
        }
        f.write_str("]")
    }
}

/// 逐分量比较；长度不同或存在相反方向的分量时不可比.
impl PartialOrd for Marking {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.len() != other.len() {
            return None;
        }
        let mut less = false;
        let mut greater = false;
        for (left, right) in self.0.iter().zip(other.0.iter()) {
            match left.cmp(right) {
                Ordering::Less => less = true,
                Ordering::Greater => greater = true,
                Ordering::Equal => {}
            }
        }
        match (less, greater) {
            (true, true) => None,
            (true, false) => Some(Ordering::Less),
            (false, true) => Some(Ordering::Greater),
            (false, false) => Some(Ordering::Equal),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marking(values: &[Tokens]) -> Marking {
        Marking::new(values.iter().copied().collect())
    }

    #[test]
    fn omega_is_above_every_count() {
        assert!(Tokens::Omega > Tokens::Finite(u64::MAX));
        assert_eq!(Tokens::Omega, Tokens::Omega);
        assert_eq!(Tokens::Omega.checked_sub(5), Some(Tokens::Omega));
        assert_eq!(Tokens::Finite(1).checked_sub(2), None);
        assert!(Tokens::Omega.covers(1_000));
    }

    #[test]
    fn dominance_is_strict_componentwise() {
        use Tokens::*;
        let low = marking(&[Finite(1), Finite(0)]);
        let high = marking(&[Finite(1), Finite(2)]);
        let crossed = marking(&[Finite(0), Finite(3)]);
        let omega = marking(&[Omega, Finite(0)]);

        assert!(high.dominates(&low));
        assert!(!low.dominates(&high));
        assert!(!low.dominates(&low));
        assert!(!crossed.dominates(&low));
        assert!(!low.dominates(&crossed));
        assert!(omega.dominates(&low));
        assert_eq!(omega.omega_places().collect::<Vec<_>>(), vec![PlaceId::new(0)]);
    }

    #[test]
    fn display_matches_dot_labels() {
        let m = marking(&[Tokens::Finite(1), Tokens::Omega, Tokens::Finite(0)]);
        assert_eq!(m.to_string(), "[1, ω, 0]");
    }

    #[test]
    fn tokens_serialize_as_numbers_or_omega() {
        let m = marking(&[Tokens::Finite(2), Tokens::Omega]);
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, r#"[2,"ω"]"#);
        let back: Marking = serde_json::from_str(r#"[2,"w"]"#).unwrap();
        assert_eq!(back, m);
        assert!(serde_json::from_str::<Marking>(r#"["x"]"#).is_err());
    }
}
