//! 可达图: 节点为 (可能含 ω 的) 标识, 边以迁移名标注.
//!
//! 由 [`crate::analysis::explorer`] 构造, 也可以由外部工具的输出解析得到
//! (TINA, DOT, JSON). 比较器只依赖这里的抽象形状, 不关心来源.
use std::collections::VecDeque;

use petgraph::Direction;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::net::{FireError, Marking, Net, TransitionId};

#[derive(Debug, Clone)]
pub struct MarkingNode {
    pub marking: Marking,
    /// 发现该节点的父节点 (广度优先生成树).
    pub parent: Option<NodeIndex>,
    pub depth: usize,
    /// 某次发生得到了已存在的这个标识.
    pub revisited: bool,
}

impl MarkingNode {
    pub fn has_omega(&self) -> bool {
        self.marking.has_omega()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReachabilityEdge {
    /// 外部来源的图没有迁移编号, 只有名字.
    pub transition: Option<TransitionId>,
    pub label: String,
}

impl ReachabilityEdge {
    pub fn new(transition: TransitionId, label: impl Into<String>) -> Self {
        Self {
            transition: Some(transition),
            label: label.into(),
        }
    }

    pub fn labelled(label: impl Into<String>) -> Self {
        Self {
            transition: None,
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub deadlocks: usize,
    pub omega_nodes: usize,
}

#[derive(Debug, Clone)]
pub struct ReachabilityGraph {
    /// 标识分量对应的库所名, 按声明顺序.
    pub places: Vec<String>,
    pub graph: DiGraph<MarkingNode, ReachabilityEdge>,
    pub root: NodeIndex,
    markings: FxHashMap<Marking, NodeIndex>,
}

impl ReachabilityGraph {
    pub fn new(places: Vec<String>, root: Marking) -> Self {
        let mut graph = DiGraph::new();
        let root_index = graph.add_node(MarkingNode {
            marking: root.clone(),
            parent: None,
            depth: 0,
            revisited: false,
        });
        let mut markings = FxHashMap::default();
        markings.insert(root, root_index);
        Self {
            places,
            graph,
            root: root_index,
            markings,
        }
    }

    /// 追加节点. 重复的标识也会得到新节点, 查找时返回最早的那个.
    pub fn add_node(&mut self, marking: Marking, parent: Option<NodeIndex>) -> NodeIndex {
        let depth = parent.map_or(0, |p| self.graph[p].depth + 1);
        let index = self.graph.add_node(MarkingNode {
            marking: marking.clone(),
            parent,
            depth,
            revisited: false,
        });
        self.markings.entry(marking).or_insert(index);
        index
    }

    pub fn add_edge(
        &mut self,
        source: NodeIndex,
        target: NodeIndex,
        edge: ReachabilityEdge,
    ) -> EdgeIndex {
        self.graph.add_edge(source, target, edge)
    }

    pub fn mark_revisited(&mut self, node: NodeIndex) {
        self.graph[node].revisited = true;
    }

    pub fn node_for(&self, marking: &Marking) -> Option<NodeIndex> {
        self.markings.get(marking).copied()
    }

    pub fn contains_marking(&self, marking: &Marking) -> bool {
        self.markings.contains_key(marking)
    }

    pub fn node(&self, index: NodeIndex) -> &MarkingNode {
        &self.graph[index]
    }

    pub fn marking(&self, index: NodeIndex) -> &Marking {
        &self.graph[index].marking
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn node_indices(&self) -> impl Iterator<Item = NodeIndex> {
        self.graph.node_indices()
    }

    /// 出边 `(label, target)`, 按插入顺序.
    pub fn outgoing(&self, node: NodeIndex) -> Vec<(&str, NodeIndex)> {
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(node, Direction::Outgoing)
            .map(|edge| (edge.id(), edge.weight().label.as_str(), edge.target()))
            .collect();
        edges.sort_by_key(|(id, _, _)| *id);
        edges
            .into_iter()
            .map(|(_, label, target)| (label, target))
            .collect()
    }

    /// 没有出边的节点.
    pub fn deadlocks(&self) -> Vec<NodeIndex> {
        self.graph
            .node_indices()
            .filter(|&node| {
                self.graph
                    .edges_directed(node, Direction::Outgoing)
                    .next()
                    .is_none()
            })
            .collect()
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            nodes: self.node_count(),
            edges: self.edge_count(),
            deadlocks: self.deadlocks().len(),
            omega_nodes: self
                .graph
                .node_weights()
                .filter(|node| node.has_omega())
                .count(),
        }
    }

    /// 按插入顺序做广度优先遍历, 重写每个节点的 `parent` 与 `depth`.
    /// 解析得到的图在全部边加入后调用一次.
    pub fn rebuild_discovery(&mut self) {
        for node in self.graph.node_weights_mut() {
            node.parent = None;
            node.depth = 0;
        }
        let mut seen = vec![false; self.node_count()];
        let mut queue = VecDeque::from([self.root]);
        seen[self.root.index()] = true;
        while let Some(node) = queue.pop_front() {
            let depth = self.graph[node].depth;
            let targets: Vec<NodeIndex> = self
                .outgoing(node)
                .into_iter()
                .map(|(_, target)| target)
                .collect();
            for target in targets {
                if !seen[target.index()] {
                    seen[target.index()] = true;
                    let child = &mut self.graph[target];
                    child.parent = Some(node);
                    child.depth = depth + 1;
                    queue.push_back(target);
                }
            }
        }
    }

    /// 父节点到 `node` 的第一条边的标签.
    fn discovery_label(&self, node: NodeIndex) -> Option<&str> {
        let parent = self.graph[node].parent?;
        self.outgoing(parent)
            .into_iter()
            .find(|(_, target)| *target == node)
            .map(|(label, _)| label)
    }

    /// 从根到 `node` 的一条最短发生序列.
    pub fn path_to(&self, node: NodeIndex) -> Vec<String> {
        let mut path = Vec::new();
        let mut current = node;
        while let Some(parent) = self.graph[current].parent {
            if let Some(label) = self.discovery_label(current) {
                path.push(label.to_string());
            }
            current = parent;
        }
        path.reverse();
        path
    }

    /// 只保留生成树边的可达树. 节点编号与原图相同.
    pub fn spanning_tree(&self) -> ReachabilityGraph {
        let mut tree = ReachabilityGraph {
            places: self.places.clone(),
            graph: self.graph.filter_map(|_, node| Some(node.clone()), |_, _| None),
            root: self.root,
            markings: self.markings.clone(),
        };
        for node in self.graph.node_indices() {
            let Some(parent) = self.graph[node].parent else {
                continue;
            };
            let edge = self
                .graph
                .edges_connecting(parent, node)
                .min_by_key(|edge| edge.id())
                .map(|edge| edge.weight().clone());
            if let Some(edge) = edge {
                tree.add_edge(parent, node, edge);
            }
        }
        tree
    }

    /// 校验图的结构不变量: 根是初始标识, 非根节点有入边,
    /// 每条边在 ω 加速意义下符合发生规则.
    pub fn check_firing_relation(&self, net: &Net) -> Result<(), GraphDefect> {
        if self.graph[self.root].marking != net.initial_marking() {
            return Err(GraphDefect::RootMismatch);
        }
        for node in self.graph.node_indices() {
            if node != self.root
                && self
                    .graph
                    .edges_directed(node, Direction::Incoming)
                    .next()
                    .is_none()
            {
                return Err(GraphDefect::Orphan(self.marking(node).clone()));
            }
        }
        for edge in self.graph.edge_references() {
            let label = &edge.weight().label;
            let transition = edge
                .weight()
                .transition
                .or_else(|| net.transition_id(label))
                .ok_or_else(|| GraphDefect::UnknownTransition(label.clone()))?;
            let source = self.marking(edge.source());
            let target = self.marking(edge.target());
            let fired = net
                .fire(transition, source)
                .map_err(|err| GraphDefect::Fire(label.clone(), err))?;
            let consistent = fired
                .iter()
                .zip(target.iter())
                .all(|((_, produced), (_, recorded))| {
                    recorded == produced || recorded.is_omega()
                });
            if !consistent {
                return Err(GraphDefect::FiringMismatch {
                    label: label.clone(),
                    from: source.clone(),
                    target: target.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn to_serialized(&self) -> SerializedGraph {
        SerializedGraph {
            places: self.places.clone(),
            root: self.root.index(),
            nodes: self
                .graph
                .node_weights()
                .map(|node| node.marking.clone())
                .collect(),
            edges: self
                .graph
                .edge_references()
                .map(|edge| SerializedEdge {
                    source: edge.source().index(),
                    target: edge.target().index(),
                    label: edge.weight().label.clone(),
                })
                .collect(),
        }
    }

    pub fn from_serialized(data: SerializedGraph) -> Result<Self, GraphDefect> {
        let root_marking = data
            .nodes
            .get(data.root)
            .cloned()
            .ok_or(GraphDefect::MissingNode(data.root))?;
        let width = data.places.len();
        if let Some((node, marking)) = data
            .nodes
            .iter()
            .enumerate()
            .find(|(_, marking)| marking.len() != width)
        {
            return Err(GraphDefect::Width {
                node,
                expected: width,
                found: marking.len(),
            });
        }
        let mut graph = ReachabilityGraph::new(data.places, root_marking);
        let mut indices = vec![NodeIndex::end(); data.nodes.len()];
        indices[data.root] = graph.root;
        for (idx, marking) in data.nodes.into_iter().enumerate() {
            if idx != data.root {
                indices[idx] = graph.add_node(marking, None);
            }
        }
        for edge in data.edges {
            let source = *indices
                .get(edge.source)
                .ok_or(GraphDefect::MissingNode(edge.source))?;
            let target = *indices
                .get(edge.target)
                .ok_or(GraphDefect::MissingNode(edge.target))?;
            graph.add_edge(source, target, ReachabilityEdge::labelled(edge.label));
        }
        graph.rebuild_discovery();
        Ok(graph)
    }
}

#[derive(Debug, Error)]
pub enum GraphDefect {
    #[error("root marking differs from the initial marking")]
    RootMismatch,
    #[error("node {0} has no incoming edge")]
    Orphan(Marking),
    #[error("edge label {0} names no transition of the net")]
    UnknownTransition(String),
    #[error("edge {0} cannot fire: {1}")]
    Fire(String, FireError),
    #[error("edge {label} leads from {from} to {target}, which firing does not produce")]
    FiringMismatch {
        label: String,
        from: Marking,
        target: Marking,
    },
    #[error("edge refers to missing node {0}")]
    MissingNode(usize),
    #[error("node {node} has {found} places, expected {expected}")]
    Width {
        node: usize,
        expected: usize,
        found: usize,
    },
}

/// JSON 形式的可达图, 节点以下标引用.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedGraph {
    pub places: Vec<String>,
    #[serde(default)]
    pub root: usize,
    pub nodes: Vec<Marking>,
    pub edges: Vec<SerializedEdge>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedEdge {
    pub source: usize,
    pub target: usize,
    pub label: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{Place, Tokens, Transition};

    fn cycle_net() -> Net {
        let mut net = Net::empty();
        let p0 = net.add_place(Place::new("p0", 1));
        let p1 = net.add_place(Place::new("p1", 0));
        let t0 = net.add_transition(Transition::new("t0"));
        let t1 = net.add_transition(Transition::new("t1"));
        net.add_input_arc(p0, t0, 1).unwrap();
        net.add_output_arc(p1, t0, 1).unwrap();
        net.add_input_arc(p1, t1, 1).unwrap();
        net.add_output_arc(p0, t1, 1).unwrap();
        net
    }

    fn cycle_graph() -> ReachabilityGraph {
        let mut graph =
            ReachabilityGraph::new(vec!["p0".into(), "p1".into()], Marking::from_counts([1, 0]));
        let next = graph.add_node(Marking::from_counts([0, 1]), Some(graph.root));
        graph.add_edge(graph.root, next, ReachabilityEdge::labelled("t0"));
        graph.add_edge(next, graph.root, ReachabilityEdge::labelled("t1"));
        graph
    }

    #[test]
    fn stats_and_paths() {
        let graph = cycle_graph();
        let next = graph.node_for(&Marking::from_counts([0, 1])).unwrap();
        assert_eq!(
            graph.stats(),
            GraphStats {
                nodes: 2,
                edges: 2,
                deadlocks: 0,
                omega_nodes: 0
            }
        );
        assert_eq!(graph.path_to(next), vec!["t0".to_string()]);
        assert_eq!(graph.node(next).depth, 1);
        assert_eq!(graph.outgoing(next), vec![("t1", graph.root)]);
    }

    #[test]
    fn spanning_tree_drops_back_edges() {
        let tree = cycle_graph().spanning_tree();
        assert_eq!(tree.node_count(), 2);
        assert_eq!(tree.edge_count(), 1);
        assert_eq!(tree.deadlocks().len(), 1);
    }

    #[test]
    fn firing_relation_is_checked() {
        let net = cycle_net();
        assert!(cycle_graph().check_firing_relation(&net).is_ok());

        let mut broken = cycle_graph();
        let bogus = broken.add_node(Marking::from_counts([5, 5]), Some(broken.root));
        broken.add_edge(broken.root, bogus, ReachabilityEdge::labelled("t0"));
        match broken.check_firing_relation(&net) {
            Err(GraphDefect::FiringMismatch { from, target, .. }) => {
                assert_eq!(from, Marking::from_counts([1, 0]));
                assert_eq!(target, Marking::from_counts([5, 5]));
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let mut orphan = cycle_graph();
        orphan.add_node(Marking::from_counts([2, 2]), None);
        assert!(matches!(
            orphan.check_firing_relation(&net),
            Err(GraphDefect::Orphan(_))
        ));
    }

    #[test]
    fn serialized_form_keeps_structure() {
        let mut graph = cycle_graph();
        let omega = Marking::new(vec![Tokens::Omega, Tokens::Finite(0)].into());
        let node = graph.add_node(omega.clone(), Some(graph.root));
        graph.add_edge(graph.root, node, ReachabilityEdge::labelled("t2"));

        let json = serde_json::to_string(&graph.to_serialized()).unwrap();
        let back: SerializedGraph = serde_json::from_str(&json).unwrap();
        let back = ReachabilityGraph::from_serialized(back).unwrap();

        assert_eq!(back.stats(), graph.stats());
        assert!(back.contains_marking(&omega));
        assert_eq!(back.path_to(back.node_for(&omega).unwrap()), vec!["t2"]);
    }

    #[test]
    fn serialized_nodes_must_match_place_count() {
        let data: SerializedGraph = serde_json::from_str(
            r#"{"places":["p2","p1"],"nodes":[[0,1],[1]],"edges":[{"source":0,"target":1,"label":"t"}]}"#,
        )
        .unwrap();
        assert!(matches!(
            ReachabilityGraph::from_serialized(data),
            Err(GraphDefect::Width {
                node: 1,
                expected: 2,
                found: 1
            })
        ));
    }
}
