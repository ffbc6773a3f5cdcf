//! Parsing Options.
//! `pn-reach <command> <net> [flags]`, commands: explore, compare, export-tina, verify, bounds.

use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::{Path, PathBuf};

use crate::config::ReachConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceFormat {
    Dot,
    Json,
    Tina,
}

impl ReferenceFormat {
    /// `.dot`/`.gv` 为 DOT, `.json` 为 JSON, 其余视为 TINA 输出.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("dot") | Some("gv") => ReferenceFormat::Dot,
            Some("json") => ReferenceFormat::Json,
            _ => ReferenceFormat::Tina,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Explore {
        dot: Option<PathBuf>,
        json: Option<PathBuf>,
        tree: bool,
    },
    Compare {
        reference: PathBuf,
        format: ReferenceFormat,
    },
    ExportTina {
        output: Option<PathBuf>,
    },
    Verify,
    Bounds,
}

fn net_arg() -> Arg {
    Arg::new("net")
        .required(true)
        .value_name("NET")
        .help("Net file (.json or .ron)")
}

fn make_options_parser() -> Command {
    Command::new("pn-reach")
        .no_binary_name(true)
        .version("v0.1.0")
        .about("Petri net reachability explorer and graph comparator")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .global(true)
                .default_value("pn-reach.toml"),
        )
        .arg(
            Arg::new("max-nodes")
                .long("max-nodes")
                .value_name("N")
                .global(true)
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("max-depth")
                .long("max-depth")
                .value_name("N")
                .global(true)
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("parallel")
                .long("parallel")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Expand each BFS layer in parallel"),
        )
        .arg(
            Arg::new("enforce-capacity")
                .long("enforce-capacity")
                .global(true)
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("report")
                .short('o')
                .long("report")
                .value_name("FILE")
                .global(true)
                .help("Path to file where the comparison report will be stored"),
        )
        .subcommand(
            Command::new("explore")
                .about("Build the coverability graph of a net")
                .arg(net_arg())
                .arg(Arg::new("dot").long("dot").value_name("FILE"))
                .arg(Arg::new("json").long("json").value_name("FILE"))
                .arg(
                    Arg::new("tree")
                        .long("tree")
                        .action(ArgAction::SetTrue)
                        .help("Write the spanning tree instead of the full graph"),
                ),
        )
        .subcommand(
            Command::new("compare")
                .about("Compare the explored graph with a reference graph")
                .arg(net_arg())
                .arg(
                    Arg::new("reference")
                        .required(true)
                        .value_name("REFERENCE"),
                )
                .arg(
                    Arg::new("format")
                        .long("format")
                        .value_parser(["dot", "json", "tina"]),
                ),
        )
        .subcommand(
            Command::new("export-tina")
                .about("Write the net in TINA .net syntax")
                .arg(net_arg())
                .arg(Arg::new("output").long("output").value_name("FILE")),
        )
        .subcommand(
            Command::new("verify")
                .about("Explore, run tina and compare the two graphs")
                .arg(net_arg()),
        )
        .subcommand(
            Command::new("bounds")
                .about("Report unbounded places")
                .arg(net_arg()),
        )
}

#[derive(Debug, Clone)]
pub struct Options {
    pub net: PathBuf,
    pub config: PathBuf,
    pub max_nodes: Option<usize>,
    pub max_depth: Option<usize>,
    pub parallel: bool,
    pub enforce_capacity: bool,
    pub report: Option<String>,
    pub action: Action,
}

fn path_of(matches: &ArgMatches, id: &str) -> Option<PathBuf> {
    matches.get_one::<String>(id).map(PathBuf::from)
}

impl Options {
    pub fn parse_from_args(flags: &[String]) -> Result<Self, clap::Error> {
        let app = make_options_parser();
        let matches = app.try_get_matches_from(flags.iter())?;
        let (name, sub) = matches
            .subcommand()
            .ok_or_else(|| clap::Error::new(clap::error::ErrorKind::MissingSubcommand))?;

        let action = match name {
            "explore" => Action::Explore {
                dot: path_of(sub, "dot"),
                json: path_of(sub, "json"),
                tree: sub.get_flag("tree"),
            },
            "compare" => {
                let reference = path_of(sub, "reference").unwrap_or_default();
                let format = match sub.get_one::<String>("format").map(String::as_str) {
                    Some("dot") => ReferenceFormat::Dot,
                    Some("json") => ReferenceFormat::Json,
                    Some("tina") => ReferenceFormat::Tina,
                    _ => ReferenceFormat::from_path(&reference),
                };
                Action::Compare { reference, format }
            }
            "export-tina" => Action::ExportTina {
                output: path_of(sub, "output"),
            },
            "verify" => Action::Verify,
            "bounds" => Action::Bounds,
            _ => return Err(clap::Error::new(clap::error::ErrorKind::InvalidSubcommand)),
        };

        Ok(Options {
            net: path_of(sub, "net").unwrap_or_default(),
            config: path_of(sub, "config").unwrap_or_else(|| PathBuf::from("pn-reach.toml")),
            max_nodes: sub.get_one::<usize>("max-nodes").copied(),
            max_depth: sub.get_one::<usize>("max-depth").copied(),
            parallel: sub.get_flag("parallel"),
            enforce_capacity: sub.get_flag("enforce-capacity"),
            report: sub.get_one::<String>("report").cloned(),
            action,
        })
    }

    /// 命令行参数覆盖配置文件中的值.
    pub fn apply(&self, config: &mut ReachConfig) {
        if self.max_nodes.is_some() {
            config.explorer.max_nodes = self.max_nodes;
        }
        if self.max_depth.is_some() {
            config.explorer.max_depth = self.max_depth;
        }
        config.explorer.parallel |= self.parallel;
        config.explorer.enforce_capacity |= self.enforce_capacity;
        if let Some(report) = &self.report {
            config.report.output = report.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_owned).collect()
    }

    #[test]
    fn test_parse_from_args_err() {
        assert!(Options::parse_from_args(&args("frobnicate net.json")).is_err());
        assert!(Options::parse_from_args(&args("explore")).is_err());
        assert!(Options::parse_from_args(&args("explore net.json --max-nodes many")).is_err());
    }

    #[test]
    fn test_parse_explore() {
        let options =
            Options::parse_from_args(&args("explore net.json --dot out.dot --tree --parallel"))
                .unwrap();
        assert_eq!(options.net, PathBuf::from("net.json"));
        assert!(options.parallel);
        assert_eq!(
            options.action,
            Action::Explore {
                dot: Some(PathBuf::from("out.dot")),
                json: None,
                tree: true
            }
        );
    }

    #[test]
    fn test_reference_format_and_overrides() {
        let options = Options::parse_from_args(&args(
            "compare net.json truth.dot --max-nodes 10 -o report.txt",
        ))
        .unwrap();
        assert_eq!(
            options.action,
            Action::Compare {
                reference: PathBuf::from("truth.dot"),
                format: ReferenceFormat::Dot
            }
        );

        let mut config = ReachConfig::default();
        config.explorer.max_depth = Some(4);
        options.apply(&mut config);
        assert_eq!(config.explorer.max_nodes, Some(10));
        assert_eq!(config.explorer.max_depth, Some(4));
        assert_eq!(config.report.output, "report.txt");
    }

    #[test]
    fn test_format_flag_wins() {
        let options =
            Options::parse_from_args(&args("compare net.json truth.txt --format json")).unwrap();
        assert!(matches!(
            options.action,
            Action::Compare {
                format: ReferenceFormat::Json,
                ..
            }
        ));
        assert_eq!(
            ReferenceFormat::from_path(Path::new("out.txt")),
            ReferenceFormat::Tina
        );
    }
}
