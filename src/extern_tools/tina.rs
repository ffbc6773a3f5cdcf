//! TINA 桥接: 导出 `.net`, 调用 `tina`, 解析其可达图输出.
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use indexmap::IndexSet;
use log::{debug, info};
use once_cell::sync::Lazy;
use petgraph::graph::NodeIndex;
use regex::Regex;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::analysis::reachability::{ReachabilityEdge, ReachabilityGraph};
use crate::net::structure::is_omega_symbol;
use crate::net::{Idx, IndexVec, Marking, Net, PlaceId, Tokens, Weight};

use super::unique_tina_names;

#[derive(Debug, Error)]
pub enum TinaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("tina exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("output has no {0} section")]
    MissingSection(&'static str),
    #[error("cannot parse {0:?}")]
    BadLine(String),
    #[error("marking mentions unknown place {0}")]
    UnknownPlace(String),
    #[error("graph mentions undeclared marking {0}")]
    UnknownMarking(String),
}

static MARKING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)\s*:\s*(.*)$").unwrap());
static SUCCESSORS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)\s*->\s*(.*)$").unwrap());
static COUNT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)([KMGTPE]?)$").unwrap());

#[derive(Debug)]
pub struct TinaAnalyzer {
    tina_path: String,
    args: Vec<String>,
    pub output_directory: PathBuf,
}

/// 网元素名与 TINA 名之间的对应.
#[derive(Debug, Clone)]
pub struct TinaNames {
    pub places: Vec<String>,
    pub transitions: Vec<String>,
}

impl TinaNames {
    pub fn for_net(net: &Net) -> Self {
        let transitions: Vec<String> = net.transitions.iter().map(|t| t.name.clone()).collect();
        Self {
            places: unique_tina_names(&net.place_names(), "p"),
            transitions: unique_tina_names(&transitions, "t"),
        }
    }
}

impl TinaAnalyzer {
    pub fn new(tina_path: String, args: Vec<String>, output_directory: PathBuf) -> Self {
        Self {
            tina_path,
            args,
            output_directory,
        }
    }

    // .net        ::= (<trdesc>|<pldesc>|<netdesc>)*
    // netdesc     ::= ’net’ <net>
    // trdesc      ::= ’tr’ <transition> {<tinput> -> <toutput>}
    // pldesc      ::= ’pl’ <place> {(<marking>)}
    // tinput      ::= <place>{<normal_arc>}
    // toutput     ::= <place>{<normal_arc>}
    // normal_arc  ::= ’*’<weight>
    // weight, marking ::= INT{’K’|’M’|’G’|’T’|’P’|’E’}
    pub fn convert_to_tina(&self, net: &Net) -> String {
        let names = TinaNames::for_net(net);
        let mut output = String::new();
        output.push_str("net PetriNet\n");

        for (place, data) in net.places.iter_enumerated() {
            output.push_str(&format!(
                "pl {} ({})\n",
                names.places[place.index()],
                data.tokens
            ));
        }

        for transition in net.transitions.indices() {
            let arcs = |arcs: Vec<crate::net::Arc>| -> String {
                arcs.iter()
                    .map(|arc| format!("{}*{}", names.places[arc.place.index()], arc.weight))
                    .collect::<Vec<_>>()
                    .join(" ")
            };
            output.push_str(&format!(
                "tr {} {} -> {}\n",
                names.transitions[transition.index()],
                arcs(net.input_arcs(transition)),
                arcs(net.output_arcs(transition))
            ));
        }

        output
    }

    /// 检查 Tina 是否可用
    pub fn check_tina_available(&self) -> bool {
        Command::new(&self.tina_path).arg("-h").output().is_ok()
    }

    /// 写出 `tina.net` 并运行 tina, 返回其文本输出.
    pub fn run(&self, net: &Net) -> Result<String, TinaError> {
        fs::create_dir_all(&self.output_directory)?;
        let net_file = self.output_directory.join("tina.net");
        fs::write(&net_file, self.convert_to_tina(net))?;
        info!("Running {} {:?} on {}", self.tina_path, self.args, net_file.display());

        let output = Command::new(&self.tina_path)
            .args(&self.args)
            .arg(&net_file)
            .output()?;
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if !output.status.success() {
            return Err(TinaError::Failed {
                status: output.status.to_string(),
                stderr,
            });
        }

        let output_file = self.output_directory.join("tina_reachability.txt");
        fs::write(&output_file, stdout.as_bytes())?;
        debug!("tina output saved to {}", output_file.display());
        Ok(stdout)
    }

    /// 运行 tina 并把结果转换为以网中原名标注的可达图.
    pub fn reachability_graph(&self, net: &Net) -> Result<ReachabilityGraph, TinaError> {
        let output = self.run(net)?;
        let names = TinaNames::for_net(net);
        let mut graph = parse_reachability(&output, &names.places)?;
        rename_to_net(&mut graph, net, &names);
        Ok(graph)
    }
}

/// 将 TINA 名换回网中原名.
pub fn rename_to_net(graph: &mut ReachabilityGraph, net: &Net, names: &TinaNames) {
    graph.places = net.place_names();
    let transitions: FxHashMap<&str, usize> = names
        .transitions
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.as_str(), idx))
        .collect();
    for edge in graph.graph.edge_weights_mut() {
        if let Some(&idx) = transitions.get(edge.label.as_str()) {
            let id = crate::net::TransitionId::from_usize(idx);
            edge.transition = Some(id);
            edge.label = net.transition_name(id).to_string();
        }
    }
}

fn parse_count(text: &str) -> Option<Tokens> {
    if is_omega_symbol(text) {
        return Some(Tokens::Omega);
    }
    let caps = COUNT_RE.captures(text)?;
    let base: Weight = caps[1].parse().ok()?;
    let scale: Weight = match &caps[2] {
        "" => 1,
        "K" => 1_000,
        "M" => 1_000_000,
        "G" => 1_000_000_000,
        "T" => 1_000_000_000_000,
        "P" => 1_000_000_000_000_000,
        _ => 1_000_000_000_000_000_000,
    };
    base.checked_mul(scale).map(Tokens::Finite)
}

/// `P1 P4*2 P5*w` 形式的标识. 未出现的库所为 0.
fn parse_marking(text: &str, places: &FxHashMap<&str, PlaceId>) -> Result<Marking, TinaError> {
    let mut tokens = IndexVec::from_elem(Tokens::ZERO, places.len());
    for item in text.split_whitespace() {
        let (name, count) = match item.split_once('*') {
            Some((name, count)) => (
                name,
                parse_count(count).ok_or_else(|| TinaError::BadLine(item.to_string()))?,
            ),
            None => (item, Tokens::Finite(1)),
        };
        let place = places
            .get(name)
            .ok_or_else(|| TinaError::UnknownPlace(name.to_string()))?;
        tokens[*place] = count;
    }
    Ok(Marking::new(tokens))
}

/// 未给出库所名时, 从 `INPUT NET` 的 `pl` 行与标识中收集, 排序方式为 `P2 < P10`.
/// `-R` 输出 `REACHABILITY GRAPH:`, `-C` 输出 `COVERABILITY GRAPH:`.
fn is_graph_header(line: &str) -> bool {
    line.starts_with("REACHABILITY GRAPH:") || line.starts_with("COVERABILITY GRAPH:")
}

fn collect_places(lines: &[&str]) -> Vec<String> {
    let mut found: IndexSet<String> = IndexSet::new();
    let mut push = |name: &str| {
        found.insert(name.to_string());
    };
    let mut in_markings = false;
    for line in lines {
        if line.starts_with("MARKINGS:") {
            in_markings = true;
        } else if is_graph_header(line) {
            in_markings = false;
        } else if let Some(rest) = line.strip_prefix("pl ") {
            if let Some(name) = rest.split_whitespace().next() {
                push(name);
            }
        } else if in_markings {
            if let Some(caps) = MARKING_RE.captures(line) {
                for item in caps[2].split_whitespace() {
                    push(item.split('*').next().unwrap_or(item));
                }
            }
        }
    }
    found.sort_by_cached_key(|name| {
        let digits: String = name.chars().skip_while(|c| !c.is_ascii_digit()).collect();
        let prefix: String = name.chars().take_while(|c| !c.is_ascii_digit()).collect();
        (prefix, digits.parse::<u64>().unwrap_or(u64::MAX), name.clone())
    });
    found.into_iter().collect()
}

/// 解析 `tina -R` 的 `MARKINGS:` 与 `REACHABILITY GRAPH:` 两节.
/// 编号为 0 的标识是根. `places` 为空时自动收集库所名.
pub fn parse_reachability(output: &str, places: &[String]) -> Result<ReachabilityGraph, TinaError> {
    let lines: Vec<&str> = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let markings_at = lines
        .iter()
        .position(|line| line.starts_with("MARKINGS:"))
        .ok_or(TinaError::MissingSection("MARKINGS"))?;
    let graph_at = lines
        .iter()
        .position(|line| is_graph_header(line))
        .ok_or(TinaError::MissingSection("REACHABILITY GRAPH"))?;

    let places = if places.is_empty() {
        collect_places(&lines)
    } else {
        places.to_vec()
    };
    let by_name: FxHashMap<&str, PlaceId> = places
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.as_str(), PlaceId::from_usize(idx)))
        .collect();

    let mut markings: BTreeMap<u64, Marking> = BTreeMap::new();
    for line in &lines[markings_at + 1..] {
        if is_graph_header(line) {
            break;
        }
        // 统计行等其他内容直接跳过.
        let Some(caps) = MARKING_RE.captures(line) else {
            continue;
        };
        let id: u64 = caps[1]
            .parse()
            .map_err(|_| TinaError::BadLine(line.to_string()))?;
        markings.insert(id, parse_marking(&caps[2], &by_name)?);
    }

    let root = markings
        .remove(&0)
        .ok_or_else(|| TinaError::UnknownMarking("0".to_string()))?;
    let mut graph = ReachabilityGraph::new(places.clone(), root);
    let mut nodes: FxHashMap<u64, NodeIndex> = FxHashMap::default();
    nodes.insert(0, graph.root);
    for (id, marking) in markings {
        nodes.insert(id, graph.add_node(marking, None));
    }

    let lookup = |id: &str| -> Result<NodeIndex, TinaError> {
        id.trim()
            .parse::<u64>()
            .ok()
            .and_then(|id| nodes.get(&id).copied())
            .ok_or_else(|| TinaError::UnknownMarking(id.trim().to_string()))
    };
    for line in &lines[graph_at + 1..] {
        let Some(caps) = SUCCESSORS_RE.captures(line) else {
            continue;
        };
        let source = lookup(&caps[1])?;
        for successor in caps[2].split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (label, target) = successor
                .rsplit_once('/')
                .ok_or_else(|| TinaError::BadLine(successor.to_string()))?;
            let target = lookup(target)?;
            graph.add_edge(source, target, ReachabilityEdge::labelled(label.trim()));
        }
    }
    graph.rebuild_discovery();
    info!(
        "Parsed TINA graph: {} markings, {} edges",
        graph.node_count(),
        graph.edge_count()
    );
    Ok(graph)
}

pub fn read_reachability<P: AsRef<Path>>(
    path: P,
    places: &[String],
) -> Result<ReachabilityGraph, TinaError> {
    parse_reachability(&fs::read_to_string(path)?, places)
}
