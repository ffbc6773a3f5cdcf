//! 可达图的 DOT 读写.
//!
//! 节点标签是标识 `"[1, 0, ω]"`, 边标签是迁移名. 库所顺序写在图级
//! `comment` 属性中, 读入时据此恢复. 第一个声明的节点是根.
use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use petgraph::dot::{Config, Dot};
use petgraph::graph::NodeIndex;
use regex::Regex;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::analysis::reachability::{MarkingNode, ReachabilityEdge, ReachabilityGraph};
use crate::net::io::create_parent;
use crate::net::structure::is_omega_symbol;
use crate::net::{Marking, Tokens};

#[derive(Debug, Error)]
pub enum DotError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("graph declares no node")]
    Empty,
    #[error("line {line}: cannot read marking {label:?}")]
    BadMarking { line: usize, label: String },
    #[error("line {line}: edge refers to undeclared node {id}")]
    UnknownNode { line: usize, id: String },
    #[error("line {line}: marking has {found} places, expected {expected}")]
    Width {
        line: usize,
        expected: usize,
        found: usize,
    },
}

static PLACES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*comment\s*=\s*"places:\s*([^"]*)""#).unwrap());
static EDGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*"?([^"\s\[]+)"?\s*->\s*"?([^"\s\[]+)"?\s*\[[^\]]*label\s*=\s*"([^"]*)""#)
        .unwrap()
});
static NODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*"?([^"\s\[]+)"?\s*\[[^\]]*label\s*=\s*"([^"]*)""#).unwrap()
});

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

impl ReachabilityGraph {
    pub fn to_dot(&self) -> String {
        let mut edge_attr = |_, edge: petgraph::graph::EdgeReference<ReachabilityEdge>| -> String {
            format!("label=\"{}\"", escape(&edge.weight().label))
        };
        let mut node_attr = |_, (_idx, node): (NodeIndex, &MarkingNode)| -> String {
            let shape = if node.has_omega() { ", shape=box" } else { "" };
            format!("label=\"{}\"{}", node.marking, shape)
        };
        let body = format!(
            "{:?}",
            Dot::with_attr_getters(
                &self.graph,
                &[Config::EdgeNoLabel, Config::NodeNoLabel],
                &mut edge_attr,
                &mut node_attr
            )
        );
        let places = format!(
            "    comment=\"places: {}\"\n",
            escape(&self.places.join(", "))
        );
        match body.split_once('\n') {
            Some((head, rest)) => format!("{}\n{}{}", head, places, rest),
            None => body,
        }
    }

    pub fn write_dot<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        create_parent(path.as_ref())?;
        fs::write(path, self.to_dot())
    }
}

fn parse_marking(label: &str) -> Option<Marking> {
    let inner = label.trim().strip_prefix('[')?.strip_suffix(']')?;
    if inner.trim().is_empty() {
        return Some(Marking::new(Vec::new().into()));
    }
    inner
        .split(',')
        .map(|item| {
            let item = item.trim();
            if is_omega_symbol(item) {
                Some(Tokens::Omega)
            } else {
                item.parse().ok().map(Tokens::Finite)
            }
        })
        .collect::<Option<Vec<_>>>()
        .map(|tokens| Marking::new(tokens.into()))
}

/// 解析 DOT 文本. 文件未记录库所时使用 `places`, 都没有则命名为 `p0, p1, ...`.
pub fn parse_dot(text: &str, places: Option<&[String]>) -> Result<ReachabilityGraph, DotError> {
    let mut declared: Option<Vec<String>> = None;
    let mut nodes: Vec<(String, Marking)> = Vec::new();
    let mut edges: Vec<(usize, String, String, String)> = Vec::new();

    for (number, line) in text.lines().enumerate() {
        let line_no = number + 1;
        if let Some(caps) = PLACES_RE.captures(line) {
            declared = Some(
                caps[1]
                    .split(',')
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty())
                    .collect(),
            );
        } else if let Some(caps) = EDGE_RE.captures(line) {
            edges.push((
                line_no,
                caps[1].to_string(),
                caps[2].to_string(),
                caps[3].to_string(),
            ));
        } else if let Some(caps) = NODE_RE.captures(line) {
            let marking = parse_marking(&caps[2]).ok_or_else(|| DotError::BadMarking {
                line: line_no,
                label: caps[2].to_string(),
            })?;
            if let Some((_, first)) = nodes.first() {
                if first.len() != marking.len() {
                    return Err(DotError::Width {
                        line: line_no,
                        expected: first.len(),
                        found: marking.len(),
                    });
                }
            }
            nodes.push((caps[1].to_string(), marking));
        }
    }

    let mut nodes = nodes.into_iter();
    let (root_id, root_marking) = nodes.next().ok_or(DotError::Empty)?;
    let width = root_marking.len();
    let places = declared
        .or_else(|| places.map(|p| p.to_vec()))
        .filter(|names| names.len() == width)
        .unwrap_or_else(|| (0..width).map(|idx| format!("p{}", idx)).collect());

    let mut graph = ReachabilityGraph::new(places, root_marking);
    let mut ids: FxHashMap<String, NodeIndex> = FxHashMap::default();
    ids.insert(root_id, graph.root);
    for (id, marking) in nodes {
        let index = graph.add_node(marking, None);
        ids.entry(id).or_insert(index);
    }
    for (line, source, target, label) in edges {
        let lookup = |id: &str| {
            ids.get(id).copied().ok_or_else(|| DotError::UnknownNode {
                line,
                id: id.to_string(),
            })
        };
        let (source, target) = (lookup(&source)?, lookup(&target)?);
        graph.add_edge(source, target, ReachabilityEdge::labelled(label));
    }
    graph.rebuild_discovery();
    Ok(graph)
}

pub fn read_dot<P: AsRef<Path>>(
    path: P,
    places: Option<&[String]>,
) -> Result<ReachabilityGraph, DotError> {
    let text = fs::read_to_string(path)?;
    parse_dot(&text, places)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::compare::compare;
    use crate::analysis::explorer::explore;
    use crate::analysis::fixtures::*;

    #[test]
    fn dot_output_uses_marking_labels() {
        let graph = explore(&doubling_net()).unwrap().graph;
        let dot = graph.to_dot();
        assert!(dot.starts_with("digraph {\n    comment=\"places: p\"\n"));
        assert!(dot.contains("label=\"[1]\""));
        assert!(dot.contains("label=\"[ω]\", shape=box"));
        assert!(dot.contains("0 -> 1 [ label=\"t\""));
        assert!(dot.contains("1 -> 1 [ label=\"t\""));
    }

    #[test]
    fn written_graph_reads_back_equivalent() {
        let graph = explore(&producer_consumer_net()).unwrap().graph;
        let parsed = parse_dot(&graph.to_dot(), None).unwrap();
        assert_eq!(parsed.places, graph.places);
        assert_eq!(parsed.stats(), graph.stats());
        assert!(compare(&graph, &parsed).is_equivalent());
    }

    #[test]
    fn reads_quoted_tree_format() {
        let text = r#"digraph ReachabilityTree {
    "0" [label="[1, 0]"];
    "1" [label="[0, w]"];
    "0" -> "1" [label="T1"];
}"#;
        let names = vec!["P1".to_string(), "P2".to_string()];
        let graph = parse_dot(text, Some(&names)).unwrap();
        assert_eq!(graph.places, names);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.stats().omega_nodes, 1);
        assert_eq!(graph.outgoing(graph.root)[0].0, "T1");
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert!(matches!(parse_dot("digraph {}", None), Err(DotError::Empty)));
        assert!(matches!(
            parse_dot("digraph {\n 0 [label=\"[x]\"]\n}", None),
            Err(DotError::BadMarking { line: 2, .. })
        ));
        assert!(matches!(
            parse_dot("digraph {\n 0 [label=\"[1]\"]\n 0 -> 7 [label=\"t\"]\n}", None),
            Err(DotError::UnknownNode { .. })
        ));
    }
}
