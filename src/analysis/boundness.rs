//! Petri网有界性分析
//!
//! 基于覆盖图判断: 某个库所在任一节点上为 `ω` 即无界. 探索被上限截断且未出现
//! `ω` 时无法下结论.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::analysis::explorer::{ExploreError, Explorer, ExplorerConfig};
use crate::analysis::reachability::ReachabilityGraph;
use crate::net::{Idx, Net, PlaceId, Tokens};

/// 有界性结论
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Bounded,
    Unbounded,
    /// 探索未完成, 且已探索部分中没有 `ω`.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceBound {
    pub place: String,
    /// 覆盖图中出现过的最大值, 无界时为 `ω`.
    pub bound: Tokens,
    /// 出现过的最大有限值.
    pub max_finite: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundnessReport {
    pub verdict: Verdict,
    pub unbounded_places: Vec<String>,
    pub bounds: Vec<PlaceBound>,
    /// 到达第一个含 `ω` 节点的发生序列.
    pub witness: Option<Vec<String>>,
}

impl BoundnessReport {
    pub fn from_graph(graph: &ReachabilityGraph, complete: bool) -> Self {
        let width = graph.marking(graph.root).len();
        let mut bounds: Vec<PlaceBound> = (0..width)
            .map(|idx| PlaceBound {
                place: graph
                    .places
                    .get(idx)
                    .cloned()
                    .unwrap_or_else(|| format!("p{}", idx)),
                bound: Tokens::ZERO,
                max_finite: 0,
            })
            .collect();

        for node in graph.node_indices() {
            for (place, tokens) in graph.marking(node).iter() {
                // 宽于根的标识只统计根所覆盖的库所.
                let Some(entry) = bounds.get_mut(place.index()) else {
                    continue;
                };
                entry.bound = entry.bound.max(tokens);
                if let Some(count) = tokens.finite() {
                    entry.max_finite = entry.max_finite.max(count);
                }
            }
        }

        let unbounded_places: Vec<String> = bounds
            .iter()
            .filter(|bound| bound.bound.is_omega())
            .map(|bound| bound.place.clone())
            .collect();
        // 节点按发现顺序编号, 第一个含 ω 的节点深度最小.
        let witness = graph
            .node_indices()
            .find(|&node| graph.node(node).has_omega())
            .map(|node| graph.path_to(node));

        let verdict = if !unbounded_places.is_empty() {
            Verdict::Unbounded
        } else if complete {
            Verdict::Bounded
        } else {
            Verdict::Unknown
        };

        Self {
            verdict,
            unbounded_places,
            bounds,
            witness,
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.verdict == Verdict::Bounded
    }

    /// 单个库所的界, `ω` 表示无界.
    pub fn bound_of(&self, place: PlaceId) -> Option<Tokens> {
        self.bounds.get(place.index()).map(|bound| bound.bound)
    }
}

impl fmt::Display for BoundnessReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.verdict {
            Verdict::Bounded => writeln!(f, "Petri网是有界的")?,
            Verdict::Unbounded => writeln!(
                f,
                "Petri网是无界的，无界库所: {}",
                self.unbounded_places.join(", ")
            )?,
            Verdict::Unknown => writeln!(f, "无法确定有界性: 探索达到上限")?,
        }
        if let Some(witness) = &self.witness {
            writeln!(f, "见证序列: [{}]", witness.join(", "))?;
        }
        for bound in &self.bounds {
            writeln!(
                f,
                "  {}: bound {}, max finite {}",
                bound.place, bound.bound, bound.max_finite
            )?;
        }
        Ok(())
    }
}

pub struct BoundnessAnalyzer {
    config: ExplorerConfig,
}

impl Default for BoundnessAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl BoundnessAnalyzer {
    pub fn new() -> Self {
        Self {
            config: ExplorerConfig::default(),
        }
    }

    pub fn with_config(config: ExplorerConfig) -> Self {
        Self { config }
    }

    pub fn check(&self, net: &Net) -> Result<BoundnessReport, ExploreError> {
        let exploration = Explorer::with_config(net, self.config.clone()).explore()?;
        Ok(BoundnessReport::from_graph(
            &exploration.graph,
            exploration.status.is_complete(),
        ))
    }
}

pub fn check_boundness(net: &Net) -> Result<BoundnessReport, ExploreError> {
    BoundnessAnalyzer::new().check(net)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::explorer::ExplorationLimits;
    use crate::analysis::fixtures::*;

    #[test]
    fn test_bounded_net() {
        let report = check_boundness(&ring_net()).unwrap();
        assert!(report.is_bounded());
        assert!(report.witness.is_none());
        assert_eq!(report.bound_of(PlaceId::new(0)), Some(Tokens::Finite(2)));
        assert!(report.bounds.iter().all(|bound| bound.max_finite == 2));
    }

    #[test]
    fn test_unbounded_net() {
        let report = check_boundness(&producer_consumer_net()).unwrap();
        assert_eq!(report.verdict, Verdict::Unbounded);
        assert_eq!(report.unbounded_places, vec!["buffer", "done"]);
        assert_eq!(report.witness, Some(vec!["produce".to_string()]));
        assert_eq!(report.bound_of(PlaceId::new(0)), Some(Tokens::Finite(1)));
        assert_eq!(report.bound_of(PlaceId::new(1)), Some(Tokens::Omega));
        assert!(report.to_string().contains("buffer, done"));
    }

    #[test]
    fn test_truncated_exploration_is_unknown() {
        let analyzer = BoundnessAnalyzer::with_config(ExplorerConfig {
            limits: ExplorationLimits {
                max_nodes: Some(2),
                max_depth: None,
            },
            ..Default::default()
        });
        let report = analyzer.check(&ring_net()).unwrap();
        assert_eq!(report.verdict, Verdict::Unknown);
    }

    #[test]
    fn test_wider_marking_is_clipped() {
        use crate::analysis::reachability::ReachabilityEdge;
        use crate::net::Marking;

        let mut graph =
            ReachabilityGraph::new(vec!["a".into(), "b".into()], Marking::from_counts([1, 0]));
        let wide = Marking::new(vec![Tokens::Finite(3), Tokens::ZERO, Tokens::Omega].into());
        let node = graph.add_node(wide, Some(graph.root));
        graph.add_edge(graph.root, node, ReachabilityEdge::labelled("t"));

        let report = BoundnessReport::from_graph(&graph, true);
        assert_eq!(report.bounds.len(), 2);
        assert_eq!(report.bound_of(PlaceId::new(0)), Some(Tokens::Finite(3)));
        assert!(report.unbounded_places.is_empty());
        assert_eq!(report.verdict, Verdict::Bounded);
    }
}
