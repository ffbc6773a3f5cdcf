//! Karp–Miller 覆盖图构造.
//!
//! 从初始标识出发做广度优先搜索. 新标识若严格支配其发现链上的某个祖先,
//! 则所有严格增长的分量被加速为 `ω`. 已存在的标识只加边不再入队,
//! 因此对任意有限网都会终止.
use std::collections::VecDeque;
use std::fmt;

use log::{debug, info, warn};
use petgraph::graph::NodeIndex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analysis::reachability::{ReachabilityEdge, ReachabilityGraph};
use crate::net::{FireError, InvalidNetError, Marking, Net, Tokens, TransitionId};

#[derive(Debug, Error)]
pub enum ExploreError {
    #[error("invalid net: {0}")]
    InvalidNet(#[from] InvalidNetError),
    #[error("firing failed during exploration: {0}")]
    Fire(#[from] FireError),
}

/// 探索上限. `None` 表示不设上限.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorationLimits {
    pub max_nodes: Option<usize>,
    pub max_depth: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Limit {
    Nodes(usize),
    Depth(usize),
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limit::Nodes(max) => write!(f, "node limit {}", max),
            Limit::Depth(max) => write!(f, "depth limit {}", max),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExplorationStatus {
    Complete,
    /// 图只包含截止前插入的部分. `frontier` 为尚未展开完的节点数.
    LimitExceeded { limit: Limit, frontier: usize },
}

impl ExplorationStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, ExplorationStatus::Complete)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExplorerConfig {
    pub limits: ExplorationLimits,
    /// 按层并行计算后继, 串行合并. 结果与串行探索相同.
    pub parallel: bool,
    /// 超出容量的发生视为未使能, 有容量的库所不会被加速为 `ω`.
    pub enforce_capacity: bool,
}

#[derive(Debug, Clone)]
pub struct Exploration {
    pub graph: ReachabilityGraph,
    pub status: ExplorationStatus,
}

pub struct Explorer<'a> {
    net: &'a Net,
    config: ExplorerConfig,
}

/// 使用默认配置探索整个网.
pub fn explore(net: &Net) -> Result<Exploration, ExploreError> {
    Explorer::new(net).explore()
}

impl<'a> Explorer<'a> {
    pub fn new(net: &'a Net) -> Self {
        Self::with_config(net, ExplorerConfig::default())
    }

    pub fn with_config(net: &'a Net, config: ExplorerConfig) -> Self {
        Self { net, config }
    }

    pub fn explore(&self) -> Result<Exploration, ExploreError> {
        self.net.validate()?;
        let mut graph =
            ReachabilityGraph::new(self.net.place_names(), self.net.initial_marking());

        let status = if self.config.parallel {
            self.explore_layers(&mut graph)?
        } else {
            self.explore_queue(&mut graph)?
        };

        let stats = graph.stats();
        info!(
            "Exploration finished: {} nodes, {} edges, {} deadlocks, {} omega nodes",
            stats.nodes, stats.edges, stats.deadlocks, stats.omega_nodes
        );
        if let ExplorationStatus::LimitExceeded { limit, frontier } = status {
            warn!(
                "Exploration stopped at {}; {} nodes left unexpanded",
                limit, frontier
            );
        }
        Ok(Exploration { graph, status })
    }

    fn explore_queue(&self, graph: &mut ReachabilityGraph) -> Result<ExplorationStatus, ExploreError> {
        let mut queue = VecDeque::from([graph.root]);
        while let Some(source) = queue.pop_front() {
            let successors = self.successors(graph, source)?;
            let mut discovered = Vec::new();
            let stopped = self.merge(graph, source, successors, &mut discovered);
            queue.extend(discovered);
            if let Some(limit) = stopped {
                return Ok(ExplorationStatus::LimitExceeded {
                    limit,
                    frontier: queue.len() + 1,
                });
            }
        }
        Ok(ExplorationStatus::Complete)
    }

    fn explore_layers(
        &self,
        graph: &mut ReachabilityGraph,
    ) -> Result<ExplorationStatus, ExploreError> {
        let mut frontier = vec![graph.root];
        while !frontier.is_empty() {
            let shared: &ReachabilityGraph = graph;
            let expanded = frontier
                .par_iter()
                .map(|&source| self.successors(shared, source))
                .collect::<Result<Vec<_>, _>>()?;

            let mut next = Vec::new();
            for (position, (source, successors)) in
                frontier.iter().copied().zip(expanded).enumerate()
            {
                if let Some(limit) = self.merge(graph, source, successors, &mut next) {
                    return Ok(ExplorationStatus::LimitExceeded {
                        limit,
                        frontier: frontier.len() - position + next.len(),
                    });
                }
            }
            frontier = next;
        }
        Ok(ExplorationStatus::Complete)
    }

    /// 计算 `source` 的全部后继 (已加速), 按迁移声明顺序. 只读.
    fn successors(
        &self,
        graph: &ReachabilityGraph,
        source: NodeIndex,
    ) -> Result<Vec<(TransitionId, Marking)>, ExploreError> {
        let marking = graph.marking(source);
        let enabled = self.net.enabled_transitions(marking);
        debug!(
            "Expanding {} at depth {}: {} enabled",
            marking,
            graph.node(source).depth,
            enabled.len()
        );

        let mut successors = Vec::with_capacity(enabled.len());
        for transition in enabled {
            let fired = self.net.fire(transition, marking)?;
            if self.config.enforce_capacity && self.net.check_capacity(&fired).is_err() {
                debug!(
                    "{} would exceed a capacity at {}",
                    self.net.transition_name(transition),
                    marking
                );
                continue;
            }
            successors.push((transition, self.accelerate(graph, source, fired)));
        }
        Ok(successors)
    }

    /// 沿发现链从 `source` 上溯到根, 对每个被严格支配的祖先把增长的分量置为 `ω`.
    fn accelerate(&self, graph: &ReachabilityGraph, source: NodeIndex, mut next: Marking) -> Marking {
        let mut ancestor = Some(source);
        while let Some(node) = ancestor {
            let previous = graph.marking(node);
            if next.dominates(previous) {
                for (place, tokens) in previous.iter() {
                    if next.tokens(place) > tokens
                        && !(self.config.enforce_capacity && self.net.is_capacity_bounded(place))
                    {
                        *next.tokens_mut(place) = Tokens::Omega;
                    }
                }
            }
            ancestor = graph.node(node).parent;
        }
        next
    }

    /// 将后继写入图. 新节点追加到 `discovered`. 超限时返回触发的上限.
    fn merge(
        &self,
        graph: &mut ReachabilityGraph,
        source: NodeIndex,
        successors: Vec<(TransitionId, Marking)>,
        discovered: &mut Vec<NodeIndex>,
    ) -> Option<Limit> {
        let depth = graph.node(source).depth + 1;
        for (transition, marking) in successors {
            let edge = ReachabilityEdge::new(transition, self.net.transition_name(transition));
            if let Some(existing) = graph.node_for(&marking) {
                graph.mark_revisited(existing);
                graph.add_edge(source, existing, edge);
                continue;
            }
            let limits = self.config.limits;
            if let Some(max) = limits.max_nodes.filter(|&max| graph.node_count() >= max) {
                return Some(Limit::Nodes(max));
            }
            if let Some(max) = limits.max_depth.filter(|&max| depth > max) {
                return Some(Limit::Depth(max));
            }
            let target = graph.add_node(marking, Some(source));
            graph.add_edge(source, target, edge);
            discovered.push(target);
        }
        None
    }
}
