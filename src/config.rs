use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::analysis::explorer::{ExplorationLimits, ExplorerConfig};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ReachConfig {
    #[serde(default)]
    pub explorer: ExplorerSection,
    #[serde(default)]
    pub tina: TinaSection,
    #[serde(default)]
    pub report: ReportSection,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ExplorerSection {
    #[serde(default)]
    pub max_nodes: Option<usize>,
    #[serde(default)]
    pub max_depth: Option<usize>,
    #[serde(default)]
    pub parallel: bool,
    #[serde(default)]
    pub enforce_capacity: bool,
}

impl ExplorerSection {
    pub fn to_explorer_config(&self) -> ExplorerConfig {
        ExplorerConfig {
            limits: ExplorationLimits {
                max_nodes: self.max_nodes,
                max_depth: self.max_depth,
            },
            parallel: self.parallel,
            enforce_capacity: self.enforce_capacity,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TinaSection {
    #[serde(default = "default_tina_path")]
    pub path: String,
    #[serde(default = "default_tina_args")]
    pub args: Vec<String>,
    #[serde(default = "default_output_directory")]
    pub output_directory: PathBuf,
}

impl Default for TinaSection {
    fn default() -> Self {
        Self {
            path: default_tina_path(),
            args: default_tina_args(),
            output_directory: default_output_directory(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ReportSection {
    #[serde(default = "default_report_output")]
    pub output: String,
}

impl Default for ReportSection {
    fn default() -> Self {
        Self {
            output: default_report_output(),
        }
    }
}

impl ReachConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: ReachConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }
}

fn default_tina_path() -> String {
    "/usr/local/tina/bin/tina".to_string()
}

// 无界网需要改成 -C 才能得到覆盖图.
fn default_tina_args() -> Vec<String> {
    vec!["-R".to_string()]
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("tina_output")
}

fn default_report_output() -> String {
    "comparison_report.txt".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let config = ReachConfig::load_from_file("does/not/exist.toml").unwrap();
        assert_eq!(config.tina.path, "/usr/local/tina/bin/tina");
        assert_eq!(config.tina.args, vec!["-R"]);
        assert_eq!(config.report.output, "comparison_report.txt");
        assert!(!config.explorer.parallel);
        assert_eq!(config.explorer.max_nodes, None);
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let config: ReachConfig = toml::from_str(
            r#"
            [explorer]
            max_nodes = 500
            parallel = true

            [tina]
            args = ["-C"]
            "#,
        )
        .unwrap();
        let explorer = config.explorer.to_explorer_config();
        assert_eq!(explorer.limits.max_nodes, Some(500));
        assert_eq!(explorer.limits.max_depth, None);
        assert!(explorer.parallel);
        assert_eq!(config.tina.args, vec!["-C"]);
        assert_eq!(config.tina.output_directory, PathBuf::from("tina_output"));
    }

    #[test]
    fn malformed_file_reports_context() {
        let path = std::env::temp_dir().join(format!("pn-reach-config-{}.toml", std::process::id()));
        fs::write(&path, "[explorer]\nmax_nodes = \"many\"\n").unwrap();
        let err = ReachConfig::load_from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
        fs::remove_file(path).unwrap();
    }
}
