pub mod boundness;
pub mod compare;
pub mod dot;
pub mod explorer;
pub mod reachability;

#[cfg(test)]
pub(crate) mod fixtures;

pub use compare::{Comparison, Divergence, DivergenceReason, compare, compare_marking_sets};
pub use explorer::{
    Exploration, ExplorationLimits, ExplorationStatus, ExploreError, Explorer, ExplorerConfig,
    explore,
};
pub use reachability::{GraphStats, MarkingNode, ReachabilityEdge, ReachabilityGraph};
