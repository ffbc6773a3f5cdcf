use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::analysis::compare::{Comparison, DivergenceReason, MarkingSetDiff};
use crate::analysis::explorer::ExplorationStatus;
use crate::analysis::reachability::ReachabilityGraph;
use crate::net::{Idx, Marking};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSummary {
    pub source: String,
    pub nodes: usize,
    pub edges: usize,
    pub deadlocks: usize,
    pub omega_nodes: usize,
}

impl GraphSummary {
    pub fn new(source: impl Into<String>, graph: &ReachabilityGraph) -> Self {
        let stats = graph.stats();
        Self {
            source: source.into(),
            nodes: stats.nodes,
            edges: stats.edges,
            deadlocks: stats.deadlocks,
            omega_nodes: stats.omega_nodes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DivergenceTrace {
    pub path: Vec<String>,
    pub reason: DivergenceReason,
    /// 标识不一致时取值不同的库所.
    pub differing_places: Vec<String>,
}

impl DivergenceTrace {
    fn new(path: Vec<String>, reason: DivergenceReason, places: &[String]) -> Self {
        let differing_places = match &reason {
            DivergenceReason::MarkingMismatch { expected, found }
            | DivergenceReason::OmegaMismatch { expected, found } => {
                differing_places(expected, found, places)
            }
            _ => Vec::new(),
        };
        Self {
            path,
            reason,
            differing_places,
        }
    }
}

fn differing_places(expected: &Marking, found: &Marking, places: &[String]) -> Vec<String> {
    expected
        .iter()
        .zip(found.iter())
        .filter(|((_, left), (_, right))| left != right)
        .map(|((place, _), _)| {
            places
                .get(place.index())
                .cloned()
                .unwrap_or_else(|| place.to_string())
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub tool_name: String,
    pub equivalent: bool,
    pub computed: GraphSummary,
    pub reference: GraphSummary,
    pub exploration: Option<ExplorationStatus>,
    pub divergence: Option<DivergenceTrace>,
    pub marking_sets: Option<MarkingSetDiff>,
    pub analysis_time: Duration,
    pub error: Option<String>,
}

impl fmt::Display for ComparisonReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "可达图比较报告")?;
        writeln!(f, "参考工具: {}", self.tool_name)?;
        writeln!(f, "分析时间: {:?}", self.analysis_time)?;
        writeln!(f, "结果: {}", if self.equivalent { "PASS" } else { "FAIL" })?;

        for summary in [&self.computed, &self.reference] {
            writeln!(
                f,
                "{}: {} 个节点, {} 条边, {} 个死锁, {} 个 ω 节点",
                summary.source, summary.nodes, summary.edges, summary.deadlocks, summary.omega_nodes
            )?;
        }

        if let Some(trace) = &self.divergence {
            writeln!(f, "\n不一致:")?;
            writeln!(f, "路径: [{}]", trace.path.join(", "))?;
            writeln!(f, "原因: {}", trace.reason)?;
            if !trace.differing_places.is_empty() {
                writeln!(f, "不同的库所: {}", trace.differing_places.join(", "))?;
            }
        }

        if let Some(diff) = &self.marking_sets {
            if !diff.is_equal() {
                writeln!(f, "\n标识集合差异:")?;
                for marking in &diff.only_computed {
                    writeln!(f, "  仅计算图: {}", marking)?;
                }
                for marking in &diff.only_reference {
                    writeln!(f, "  仅参考图: {}", marking)?;
                }
            }
        }

        if let Some(error) = &self.error {
            writeln!(f, "\n错误信息: {}", error)?;
        }

        Ok(())
    }
}

impl ComparisonReport {
    pub fn new(
        tool_name: impl Into<String>,
        computed: &ReachabilityGraph,
        reference: &ReachabilityGraph,
        comparison: &Comparison,
    ) -> Self {
        let divergence = comparison.divergence().map(|divergence| {
            DivergenceTrace::new(
                divergence.path.clone(),
                divergence.reason.clone(),
                &computed.places,
            )
        });
        Self {
            tool_name: tool_name.into(),
            equivalent: comparison.is_equivalent(),
            computed: GraphSummary::new("computed", computed),
            reference: GraphSummary::new("reference", reference),
            exploration: None,
            divergence,
            marking_sets: None,
            analysis_time: Duration::default(),
            error: None,
        }
    }

    /// 探索被截止时, 计算图不完整, 记入 `error`.
    pub fn with_exploration(mut self, status: ExplorationStatus) -> Self {
        if let ExplorationStatus::LimitExceeded { limit, frontier } = status {
            self.error = Some(format!(
                "探索在 {} 处截止, 剩余 {} 个未展开节点, 计算图不完整",
                limit, frontier
            ));
        }
        self.exploration = Some(status);
        self
    }

    pub fn with_marking_sets(mut self, diff: MarkingSetDiff) -> Self {
        self.marking_sets = Some(diff);
        self
    }

    pub fn with_analysis_time(mut self, elapsed: Duration) -> Self {
        self.analysis_time = elapsed;
        self
    }

    /// 写入文本报告, 并在 `<path>.json` 旁写一份 JSON.
    pub fn save_to_file(&self, path: &str) -> std::io::Result<()> {
        use std::fs::File;
        use std::io::Write;

        crate::net::io::create_parent(std::path::Path::new(path))?;
        let mut file = File::create(path)?;
        writeln!(file, "{}", self)?;

        let json_path = format!("{}.json", path);
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(json_path, json.as_bytes())?;

        Ok(())
    }
}
