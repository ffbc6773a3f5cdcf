//! 可达图比较: 以根为锚点的带标签有根同构.
//!
//! 两个图同步做广度优先遍历. 每对对应节点先比较标识, 再比较出边标签的多重集,
//! 然后按标签为后继建立对应. 同一标签有多个后继时需要回溯. 报告的路径是
//! 从根到首个不一致处的最短发生序列.
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::rc::Rc;

use itertools::Itertools;
use log::{debug, info, warn};
use petgraph::graph::NodeIndex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::analysis::reachability::ReachabilityGraph;
use crate::net::{Idx, Marking, PlaceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Computed,
    Reference,
}

/// `expected` 总是来自参考图 (B), `found` 来自计算得到的图 (A).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DivergenceReason {
    /// 参考图有而计算图没有的出边.
    MissingEdge { label: String },
    /// 计算图有而参考图没有的出边.
    ExtraEdge { label: String },
    MarkingMismatch { expected: Marking, found: Marking },
    OmegaMismatch { expected: Marking, found: Marking },
    /// 遍历结束后仍未被对应的节点.
    UnmatchedNode { side: Side, marking: Marking },
}

impl fmt::Display for DivergenceReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DivergenceReason::MissingEdge { label } => write!(f, "missing edge {}", label),
            DivergenceReason::ExtraEdge { label } => write!(f, "extra edge {}", label),
            DivergenceReason::MarkingMismatch { expected, found } => {
                write!(f, "marking mismatch: expected {}, found {}", expected, found)
            }
            DivergenceReason::OmegaMismatch { expected, found } => {
                write!(f, "omega mismatch: expected {}, found {}", expected, found)
            }
            DivergenceReason::UnmatchedNode { side, marking } => {
                let side = match side {
                    Side::Computed => "computed",
                    Side::Reference => "reference",
                };
                write!(f, "unmatched {} node {}", side, marking)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Divergence {
    pub path: Vec<String>,
    pub reason: DivergenceReason,
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "after [{}]: {}", self.path.join(", "), self.reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparison {
    Equivalent,
    Divergent(Divergence),
}

impl Comparison {
    pub fn is_equivalent(&self) -> bool {
        matches!(self, Comparison::Equivalent)
    }

    pub fn divergence(&self) -> Option<&Divergence> {
        match self {
            Comparison::Equivalent => None,
            Comparison::Divergent(divergence) => Some(divergence),
        }
    }
}

pub fn compare(computed: &ReachabilityGraph, reference: &ReachabilityGraph) -> Comparison {
    let result = Comparator::new(computed, reference).run();
    match &result {
        Comparison::Equivalent => info!(
            "Graphs are equivalent ({} nodes, {} edges)",
            computed.node_count(),
            computed.edge_count()
        ),
        Comparison::Divergent(divergence) => warn!("Graphs diverge {}", divergence),
    }
    result
}

/// 只比较两图的标识集合, 忽略边.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkingSetDiff {
    pub only_computed: Vec<Marking>,
    pub only_reference: Vec<Marking>,
}

impl MarkingSetDiff {
    pub fn is_equal(&self) -> bool {
        self.only_computed.is_empty() && self.only_reference.is_empty()
    }
}

pub fn compare_marking_sets(
    computed: &ReachabilityGraph,
    reference: &ReachabilityGraph,
) -> MarkingSetDiff {
    let alignment = PlaceAlignment::new(computed, reference);
    let left: FxHashSet<Marking> = computed
        .node_indices()
        .map(|node| computed.marking(node).clone())
        .collect();
    let right: FxHashSet<Marking> = reference
        .node_indices()
        .map(|node| match &alignment {
            Some(alignment) => alignment.apply(reference.marking(node)),
            None => reference.marking(node).clone(),
        })
        .collect();

    let sorted = |set: Vec<&Marking>| -> Vec<Marking> {
        set.into_iter()
            .cloned()
            .sorted_by_key(|marking| marking.to_string())
            .collect()
    };
    MarkingSetDiff {
        only_computed: sorted(left.difference(&right).collect()),
        only_reference: sorted(right.difference(&left).collect()),
    }
}

/// 参考图库所顺序到计算图顺序的重排. 库所集合不同时不存在.
enum PlaceAlignment {
    Identity,
    /// 第 i 项为计算图第 i 个库所在参考图中的位置.
    Permuted(Vec<PlaceId>),
}

impl PlaceAlignment {
    fn new(computed: &ReachabilityGraph, reference: &ReachabilityGraph) -> Option<Self> {
        let width = computed.marking(computed.root).len();
        if width != reference.marking(reference.root).len() {
            return None;
        }
        if computed.places == reference.places
            || computed.places.is_empty()
            || reference.places.is_empty()
        {
            return Some(PlaceAlignment::Identity);
        }
        let positions: FxHashMap<&str, usize> = reference
            .places
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.as_str(), idx))
            .collect();
        if positions.len() != reference.places.len() || computed.places.len() != width {
            return None;
        }
        computed
            .places
            .iter()
            .map(|name| positions.get(name.as_str()).map(|&idx| PlaceId::from_usize(idx)))
            .collect::<Option<Vec<_>>>()
            .map(PlaceAlignment::Permuted)
    }

    /// 宽度与根不同的标识原样返回, 由比较报告为 `MarkingMismatch`.
    fn apply(&self, marking: &Marking) -> Marking {
        match self {
            PlaceAlignment::Identity => marking.clone(),
            PlaceAlignment::Permuted(order) if marking.len() != order.len() => marking.clone(),
            PlaceAlignment::Permuted(order) => Marking::new(
                order
                    .iter()
                    .map(|&place| marking.tokens(place))
                    .collect(),
            ),
        }
    }
}

/// 某个节点对在一个标签下的后继.
struct Group {
    label: String,
    computed: Vec<NodeIndex>,
    reference: Vec<NodeIndex>,
}

/// 一个节点对的标签组尚未全部处理完, 从 `next` 继续.
struct Resume {
    computed: NodeIndex,
    path: Vec<String>,
    groups: Rc<Vec<Group>>,
    next: usize,
}

#[derive(Clone)]
struct State {
    forward: Vec<Option<NodeIndex>>,
    backward: Vec<Option<NodeIndex>>,
    queue: VecDeque<(NodeIndex, NodeIndex, Vec<String>)>,
}

impl State {
    fn link(&mut self, computed: NodeIndex, reference: NodeIndex, path: Vec<String>) {
        if self.forward[computed.index()].is_none() {
            self.forward[computed.index()] = Some(reference);
            self.backward[reference.index()] = Some(computed);
            self.queue.push_back((computed, reference, path));
        }
    }
}

struct Comparator<'g> {
    computed: &'g ReachabilityGraph,
    reference: &'g ReachabilityGraph,
    /// 参考图标识按计算图的库所顺序重排后的结果.
    aligned: Vec<Marking>,
    local: RefCell<FxHashMap<(NodeIndex, NodeIndex), Option<DivergenceReason>>>,
}

impl<'g> Comparator<'g> {
    fn new(computed: &'g ReachabilityGraph, reference: &'g ReachabilityGraph) -> Self {
        let aligned = match PlaceAlignment::new(computed, reference) {
            Some(alignment) => reference
                .node_indices()
                .map(|node| alignment.apply(reference.marking(node)))
                .collect(),
            None => Vec::new(),
        };
        Self {
            computed,
            reference,
            aligned,
            local: RefCell::new(FxHashMap::default()),
        }
    }

    fn run(&self) -> Comparison {
        if self.aligned.is_empty() {
            return Comparison::Divergent(Divergence {
                path: Vec::new(),
                reason: DivergenceReason::MarkingMismatch {
                    expected: self.reference.marking(self.reference.root).clone(),
                    found: self.computed.marking(self.computed.root).clone(),
                },
            });
        }

        let mut state = State {
            forward: vec![None; self.computed.node_count()],
            backward: vec![None; self.reference.node_count()],
            queue: VecDeque::new(),
        };
        state.link(self.computed.root, self.reference.root, Vec::new());
        match self.search(state, None) {
            Ok(()) => Comparison::Equivalent,
            Err(divergence) => Comparison::Divergent(divergence),
        }
    }

    fn search(&self, mut state: State, mut resume: Option<Resume>) -> Result<(), Divergence> {
        loop {
            let current = match resume.take() {
                Some(current) => current,
                None => {
                    let Some((computed, reference, path)) = state.queue.pop_front() else {
                        return self.check_unmatched(&state);
                    };
                    if let Some(reason) = self.check_pair(computed, reference) {
                        return Err(Divergence { path, reason });
                    }
                    Resume {
                        computed,
                        path,
                        groups: Rc::new(self.groups(computed, reference)),
                        next: 0,
                    }
                }
            };

            for index in current.next..current.groups.len() {
                let group = &current.groups[index];
                let options = self.assignments(&state, group).map_err(|reason| Divergence {
                    path: current.path.clone(),
                    reason,
                })?;
                let [first, rest @ ..] = options.as_slice() else {
                    return Err(Divergence {
                        path: current.path.clone(),
                        reason: DivergenceReason::ExtraEdge {
                            label: group.label.clone(),
                        },
                    });
                };
                if rest.is_empty() {
                    self.apply(&mut state, &current, group, first);
                    continue;
                }

                debug!(
                    "Branching on {} successors of {} ({} options)",
                    group.label,
                    self.computed.marking(current.computed),
                    options.len()
                );
                let mut best: Option<Divergence> = None;
                for option in &options {
                    let mut branch = state.clone();
                    self.apply(&mut branch, &current, group, option);
                    let next = Resume {
                        computed: current.computed,
                        path: current.path.clone(),
                        groups: current.groups.clone(),
                        next: index + 1,
                    };
                    match self.search(branch, Some(next)) {
                        Ok(()) => return Ok(()),
                        Err(divergence) => {
                            if best
                                .as_ref()
                                .is_none_or(|best| divergence.path.len() > best.path.len())
                            {
                                best = Some(divergence);
                            }
                        }
                    }
                }
                return Err(best.unwrap_or_else(|| Divergence {
                    path: current.path.clone(),
                    reason: DivergenceReason::ExtraEdge {
                        label: group.label.clone(),
                    },
                }));
            }
        }
    }

    fn apply(&self, state: &mut State, current: &Resume, group: &Group, assignment: &[usize]) {
        for (&computed, &slot) in group.computed.iter().zip(assignment) {
            let mut path = current.path.clone();
            path.push(group.label.clone());
            state.link(computed, group.reference[slot], path);
        }
    }

    /// 标识与出边标签多重集的比较, 与遍历状态无关, 因此跨分支缓存.
    fn check_pair(&self, computed: NodeIndex, reference: NodeIndex) -> Option<DivergenceReason> {
        if let Some(cached) = self.local.borrow().get(&(computed, reference)) {
            return cached.clone();
        }
        let result = self.compare_pair(computed, reference);
        self.local
            .borrow_mut()
            .insert((computed, reference), result.clone());
        result
    }

    fn compare_pair(&self, computed: NodeIndex, reference: NodeIndex) -> Option<DivergenceReason> {
        let found = self.computed.marking(computed);
        let expected = &self.aligned[reference.index()];
        if found.len() != expected.len() {
            return Some(DivergenceReason::MarkingMismatch {
                expected: expected.clone(),
                found: found.clone(),
            });
        }
        let omega_differs = found
            .iter()
            .zip(expected.iter())
            .any(|((_, left), (_, right))| left.is_omega() != right.is_omega());
        if omega_differs {
            return Some(DivergenceReason::OmegaMismatch {
                expected: expected.clone(),
                found: found.clone(),
            });
        }
        if found != expected {
            return Some(DivergenceReason::MarkingMismatch {
                expected: expected.clone(),
                found: found.clone(),
            });
        }

        let left = label_counts(self.computed, computed);
        let right = label_counts(self.reference, reference);
        for label in left.keys().chain(right.keys()).sorted().dedup() {
            let have = left.get(label).copied().unwrap_or(0);
            let want = right.get(label).copied().unwrap_or(0);
            if have > want {
                return Some(DivergenceReason::ExtraEdge {
                    label: label.to_string(),
                });
            }
            if have < want {
                return Some(DivergenceReason::MissingEdge {
                    label: label.to_string(),
                });
            }
        }
        None
    }

    fn groups(&self, computed: NodeIndex, reference: NodeIndex) -> Vec<Group> {
        let mut groups: BTreeMap<&str, Group> = BTreeMap::new();
        for (label, target) in self.computed.outgoing(computed) {
            groups
                .entry(label)
                .or_insert_with(|| Group {
                    label: label.to_string(),
                    computed: Vec::new(),
                    reference: Vec::new(),
                })
                .computed
                .push(target);
        }
        for (label, target) in self.reference.outgoing(reference) {
            if let Some(group) = groups.get_mut(label) {
                group.reference.push(target);
            }
        }
        groups.into_values().collect()
    }

    /// 枚举一个标签组内与当前映射相容的全部双射. 每项给出计算图第 i 个后继
    /// 对应的参考图后继下标.
    fn assignments(&self, state: &State, group: &Group) -> Result<Vec<Vec<usize>>, DivergenceReason> {
        let mut candidates = Vec::with_capacity(group.computed.len());
        for &computed in &group.computed {
            if let Some(mapped) = state.forward[computed.index()] {
                let slots: Vec<usize> = group
                    .reference
                    .iter()
                    .positions(|&reference| reference == mapped)
                    .collect();
                if slots.is_empty() {
                    return Err(DivergenceReason::ExtraEdge {
                        label: group.label.clone(),
                    });
                }
                candidates.push(slots);
                continue;
            }
            let free: Vec<usize> = group
                .reference
                .iter()
                .positions(|reference| state.backward[reference.index()].is_none())
                .collect();
            let marking = self.computed.marking(computed);
            let equal: Vec<usize> = free
                .iter()
                .copied()
                .filter(|&slot| &self.aligned[group.reference[slot].index()] == marking)
                .collect();
            candidates.push(if equal.is_empty() { free } else { equal });
        }

        let mut options = Vec::new();
        let mut current = Vec::with_capacity(candidates.len());
        let mut used = vec![false; group.reference.len()];
        self.enumerate(group, &candidates, &mut current, &mut used, &mut options);
        Ok(options)
    }

    fn enumerate(
        &self,
        group: &Group,
        candidates: &[Vec<usize>],
        current: &mut Vec<usize>,
        used: &mut [bool],
        options: &mut Vec<Vec<usize>>,
    ) {
        let position = current.len();
        if position == candidates.len() {
            options.push(current.clone());
            return;
        }
        for &slot in &candidates[position] {
            if used[slot] || !self.consistent(group, current, position, slot) {
                continue;
            }
            used[slot] = true;
            current.push(slot);
            self.enumerate(group, candidates, current, used, options);
            current.pop();
            used[slot] = false;
        }
    }

    /// 同一组内重复出现的节点必须映射到同一个节点, 反之亦然.
    fn consistent(&self, group: &Group, current: &[usize], position: usize, slot: usize) -> bool {
        let computed = group.computed[position];
        let reference = group.reference[slot];
        current.iter().enumerate().all(|(earlier, &other)| {
            let same_computed = group.computed[earlier] == computed;
            let same_reference = group.reference[other] == reference;
            same_computed == same_reference
        })
    }

    fn check_unmatched(&self, state: &State) -> Result<(), Divergence> {
        if let Some(node) = self
            .computed
            .node_indices()
            .find(|node| state.forward[node.index()].is_none())
        {
            return Err(Divergence {
                path: self.computed.path_to(node),
                reason: DivergenceReason::UnmatchedNode {
                    side: Side::Computed,
                    marking: self.computed.marking(node).clone(),
                },
            });
        }
        if let Some(node) = self
            .reference
            .node_indices()
            .find(|node| state.backward[node.index()].is_none())
        {
            return Err(Divergence {
                path: self.reference.path_to(node),
                reason: DivergenceReason::UnmatchedNode {
                    side: Side::Reference,
                    marking: self.aligned[node.index()].clone(),
                },
            });
        }
        Ok(())
    }
}

fn label_counts(graph: &ReachabilityGraph, node: NodeIndex) -> BTreeMap<String, usize> {
    graph
        .outgoing(node)
        .into_iter()
        .map(|(label, _)| label.to_string())
        .counts()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::explorer::explore;
    use crate::analysis::fixtures::*;
    use crate::analysis::reachability::ReachabilityEdge;
    use petgraph::visit::EdgeRef;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;

    fn graph_of(net: &crate::net::Net) -> ReachabilityGraph {
        explore(net).unwrap().graph
    }

    /// 打乱节点编号与边的插入顺序, 根保持为根.
    fn relabel(graph: &ReachabilityGraph, rng: &mut StdRng) -> ReachabilityGraph {
        let mut order: Vec<NodeIndex> = graph
            .node_indices()
            .filter(|&node| node != graph.root)
            .collect();
        order.shuffle(rng);

        let mut copy = ReachabilityGraph::new(graph.places.clone(), graph.marking(graph.root).clone());
        let mut mapping = FxHashMap::default();
        mapping.insert(graph.root, copy.root);
        for node in order {
            mapping.insert(node, copy.add_node(graph.marking(node).clone(), None));
        }
        let mut edges: Vec<_> = graph
            .node_indices()
            .flat_map(|node| {
                graph
                    .outgoing(node)
                    .into_iter()
                    .map(move |(label, target)| (node, label.to_string(), target))
            })
            .collect();
        edges.shuffle(rng);
        for (source, label, target) in edges {
            copy.add_edge(mapping[&source], mapping[&target], ReachabilityEdge::labelled(label));
        }
        copy.rebuild_discovery();
        copy
    }

    /// 按给定顺序手工建图. `nodes[0]` 为根.
    fn manual(places: &[&str], nodes: &[&[u64]], edges: &[(usize, &str, usize)]) -> ReachabilityGraph {
        let mut graph = ReachabilityGraph::new(
            places.iter().map(|p| p.to_string()).collect(),
            Marking::from_counts(nodes[0].iter().copied()),
        );
        let mut indices = vec![graph.root];
        for counts in &nodes[1..] {
            indices.push(graph.add_node(Marking::from_counts(counts.iter().copied()), None));
        }
        for (source, label, target) in edges {
            graph.add_edge(
                indices[*source],
                indices[*target],
                ReachabilityEdge::labelled(*label),
            );
        }
        graph.rebuild_discovery();
        graph
    }

    #[test]
    fn relabeled_copies_are_equivalent() {
        let mut rng = StdRng::seed_from_u64(7);
        for net in [ring_net(), producer_consumer_net(), doubling_net(), transfer_net()] {
            let graph = graph_of(&net);
            for _ in 0..5 {
                let copy = relabel(&graph, &mut rng);
                assert_eq!(compare(&graph, &copy), Comparison::Equivalent);
                assert_eq!(compare(&copy, &graph), Comparison::Equivalent);
            }
        }
    }

    #[test]
    fn reversed_node_order_is_equivalent() {
        let computed = graph_of(&transfer_net());
        let reference = manual(&["p1", "p2"], &[&[1, 0], &[0, 1]], &[(0, "t1", 1)]);
        assert!(compare(&computed, &reference).is_equivalent());

        // 根固定, 其余节点逆序插入.
        let mut reversed = ReachabilityGraph::new(
            computed.places.clone(),
            computed.marking(computed.root).clone(),
        );
        let leaf = reversed.add_node(Marking::from_counts([0, 1]), None);
        reversed.add_edge(reversed.root, leaf, ReachabilityEdge::labelled("t1"));
        reversed.rebuild_discovery();
        assert!(compare(&computed, &reversed).is_equivalent());
    }

    #[test]
    fn permuted_places_are_aligned_by_name() {
        let computed = graph_of(&transfer_net());
        let reference = manual(&["p2", "p1"], &[&[0, 1], &[1, 0]], &[(0, "t1", 1)]);
        assert!(compare(&computed, &reference).is_equivalent());
        assert!(compare_marking_sets(&computed, &reference).is_equal());
    }

    #[test]
    fn short_reference_marking_is_a_mismatch() {
        let computed = graph_of(&transfer_net());
        let reference = manual(&["p2", "p1"], &[&[0, 1], &[1]], &[(0, "t1", 1)]);
        let divergence = compare(&computed, &reference).divergence().cloned().unwrap();
        assert_eq!(divergence.path, vec!["t1"]);
        assert_eq!(
            divergence.reason,
            DivergenceReason::MarkingMismatch {
                expected: Marking::from_counts([1]),
                found: Marking::from_counts([0, 1]),
            }
        );
        let sets = compare_marking_sets(&computed, &reference);
        assert_eq!(sets.only_reference, vec![Marking::from_counts([1])]);
    }

    #[test]
    fn different_place_sets_diverge_at_root() {
        let computed = graph_of(&transfer_net());
        let reference = manual(&["p1", "p3"], &[&[1, 0], &[0, 1]], &[(0, "t1", 1)]);
        let Comparison::Divergent(divergence) = compare(&computed, &reference) else {
            panic!("expected a divergence");
        };
        assert!(divergence.path.is_empty());
        assert!(matches!(
            divergence.reason,
            DivergenceReason::MarkingMismatch { .. }
        ));
    }

    #[test]
    fn extra_edge_is_reported_at_its_source() {
        let computed = graph_of(&ring_net());
        let mut reference = computed.clone();
        // 删掉参考图中某个深度为 2 的节点的一条出边, 计算图因此多出一条边.
        let node = reference
            .node_indices()
            .find(|&node| reference.node(node).depth == 2)
            .unwrap();
        let edge = reference.graph.edges(node).next().unwrap();
        let label = edge.weight().label.clone();
        let id = edge.id();
        reference.graph.remove_edge(id);

        let Comparison::Divergent(divergence) = compare(&computed, &reference) else {
            panic!("expected a divergence");
        };
        assert_eq!(divergence.reason, DivergenceReason::ExtraEdge { label });
        assert_eq!(divergence.path.len(), 2);
        assert_eq!(divergence.path, computed.path_to(node));
    }

    #[test]
    fn missing_edge_is_reported_at_its_source() {
        let computed = graph_of(&transfer_net());
        let mut reference = computed.clone();
        let leaf = reference
            .node_indices()
            .find(|&node| node != reference.root)
            .unwrap();
        let root = reference.root;
        reference.add_edge(leaf, root, ReachabilityEdge::labelled("back"));

        let Comparison::Divergent(divergence) = compare(&computed, &reference) else {
            panic!("expected a divergence");
        };
        assert_eq!(
            divergence.reason,
            DivergenceReason::MissingEdge {
                label: "back".into()
            }
        );
        assert_eq!(divergence.path, vec!["t1".to_string()]);
    }

    #[test]
    fn altered_marking_reports_shortest_path() {
        let computed = graph_of(&ring_net());
        let mut rng = StdRng::seed_from_u64(11);
        let mut reference = relabel(&computed, &mut rng);
        let target = reference
            .node_indices()
            .max_by_key(|&node| reference.node(node).depth)
            .unwrap();
        let depth = reference.node(target).depth;
        let altered = Marking::from_counts([9, 9, 9]);
        reference.graph[target].marking = altered.clone();

        let Comparison::Divergent(divergence) = compare(&computed, &reference) else {
            panic!("expected a divergence");
        };
        assert_eq!(divergence.path.len(), depth);
        assert!(matches!(
            &divergence.reason,
            DivergenceReason::MarkingMismatch { expected, .. } if *expected == altered
        ));
    }

    #[test]
    fn omega_positions_are_checked_first() {
        let computed = graph_of(&doubling_net());
        let reference = manual(&["p"], &[&[1], &[2]], &[(0, "t", 1), (1, "t", 1)]);
        let Comparison::Divergent(divergence) = compare(&computed, &reference) else {
            panic!("expected a divergence");
        };
        assert_eq!(divergence.path, vec!["t".to_string()]);
        assert!(matches!(
            divergence.reason,
            DivergenceReason::OmegaMismatch { .. }
        ));
    }

    #[test]
    fn ambiguous_labels_backtrack() {
        // 同一标签 a 通向两个标识相同但后续不同的节点.
        let left = manual(
            &["p"],
            &[&[0], &[1], &[1], &[2], &[3]],
            &[(0, "a", 1), (0, "a", 2), (1, "b", 3), (2, "c", 4)],
        );
        let right = manual(
            &["p"],
            &[&[0], &[1], &[1], &[3], &[2]],
            &[(0, "a", 1), (0, "a", 2), (1, "c", 3), (2, "b", 4)],
        );
        assert!(compare(&left, &right).is_equivalent());

        let broken = manual(
            &["p"],
            &[&[0], &[1], &[1], &[3], &[2]],
            &[(0, "a", 1), (0, "a", 2), (1, "c", 3), (2, "c", 4)],
        );
        let Comparison::Divergent(divergence) = compare(&left, &broken) else {
            panic!("expected a divergence");
        };
        assert_eq!(divergence.path, vec!["a".to_string()]);
    }

    #[test]
    fn unreachable_nodes_are_unmatched() {
        let computed = graph_of(&transfer_net());
        let mut reference = computed.clone();
        reference.add_node(Marking::from_counts([5, 5]), None);
        let Comparison::Divergent(divergence) = compare(&computed, &reference) else {
            panic!("expected a divergence");
        };
        assert!(matches!(
            divergence.reason,
            DivergenceReason::UnmatchedNode {
                side: Side::Reference,
                ..
            }
        ));
    }

    #[test]
    fn marking_sets_ignore_edges() {
        let computed = graph_of(&transfer_net());
        let reference = manual(&["p1", "p2"], &[&[1, 0], &[0, 1]], &[]);
        assert!(compare_marking_sets(&computed, &reference).is_equal());
        let other = manual(&["p1", "p2"], &[&[1, 0], &[0, 2]], &[]);
        let diff = compare_marking_sets(&computed, &other);
        assert_eq!(diff.only_computed, vec![Marking::from_counts([0, 1])]);
        assert_eq!(diff.only_reference, vec![Marking::from_counts([0, 2])]);
    }
}
