use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use log::{debug, info};

use pn_reach::analysis::boundness::BoundnessAnalyzer;
use pn_reach::analysis::dot::read_dot;
use pn_reach::analysis::reachability::{ReachabilityGraph, SerializedGraph};
use pn_reach::analysis::{Exploration, Explorer, compare, compare_marking_sets};
use pn_reach::config::ReachConfig;
use pn_reach::extern_tools::tina::{TinaAnalyzer, TinaNames, read_reachability, rename_to_net};
use pn_reach::net::Net;
use pn_reach::net::io::{load_net, read_json, write_json};
use pn_reach::options::{Action, Options, ReferenceFormat};
use pn_reach::report::ComparisonReport;

fn main() -> Result<()> {
    if std::env::var("PN_LOG").is_ok() {
        let e = env_logger::Env::new()
            .filter("PN_LOG")
            .write_style("PN_LOG_STYLE");
        env_logger::init_from_env(e);
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = match Options::parse_from_args(&args) {
        Ok(options) => options,
        Err(err) => err.exit(),
    };
    debug!("PN options: {:?}", options);

    let mut config = ReachConfig::load_from_file(&options.config)?;
    options.apply(&mut config);

    let net = load_net(&options.net)
        .with_context(|| format!("Failed to load net: {:?}", options.net))?;

    match &options.action {
        Action::Explore { dot, json, tree } => {
            let exploration = explore(&net, &config)?;
            let graph = if *tree {
                exploration.graph.spanning_tree()
            } else {
                exploration.graph
            };
            match dot {
                Some(path) => graph
                    .write_dot(path)
                    .with_context(|| format!("Failed to write DOT file: {:?}", path))?,
                None if json.is_none() => print!("{}", graph.to_dot()),
                None => {}
            }
            if let Some(path) = json {
                write_json(path, &graph.to_serialized())
                    .with_context(|| format!("Failed to write JSON file: {:?}", path))?;
            }
            println!("{:?}", exploration.status);
        }
        Action::Compare { reference, format } => {
            let started = Instant::now();
            let exploration = explore(&net, &config)?;
            let reference_graph = load_reference(&net, reference, *format)?;
            finish_comparison(
                &reference.display().to_string(),
                exploration,
                &reference_graph,
                started,
                &config,
            )?;
        }
        Action::ExportTina { output } => {
            let analyzer = tina_analyzer(&config);
            let text = analyzer.convert_to_tina(&net);
            match output {
                Some(path) => std::fs::write(path, text)
                    .with_context(|| format!("Failed to write TINA net: {:?}", path))?,
                None => print!("{}", text),
            }
        }
        Action::Verify => {
            let started = Instant::now();
            let exploration = explore(&net, &config)?;
            let analyzer = tina_analyzer(&config);
            let reference_graph = analyzer
                .reachability_graph(&net)
                .context("Failed to obtain the TINA reachability graph")?;
            finish_comparison("tina", exploration, &reference_graph, started, &config)?;
        }
        Action::Bounds => {
            let analyzer = BoundnessAnalyzer::with_config(config.explorer.to_explorer_config());
            let report = analyzer.check(&net)?;
            print!("{}", report);
        }
    }

    Ok(())
}

fn explore(net: &Net, config: &ReachConfig) -> Result<Exploration> {
    let exploration = Explorer::with_config(net, config.explorer.to_explorer_config())
        .explore()
        .context("Exploration failed")?;
    Ok(exploration)
}

fn tina_analyzer(config: &ReachConfig) -> TinaAnalyzer {
    TinaAnalyzer::new(
        config.tina.path.clone(),
        config.tina.args.clone(),
        config.tina.output_directory.clone(),
    )
}

fn load_reference(net: &Net, path: &Path, format: ReferenceFormat) -> Result<ReachabilityGraph> {
    let graph = match format {
        ReferenceFormat::Dot => read_dot(path, Some(&net.place_names()))
            .with_context(|| format!("Failed to read DOT reference: {:?}", path))?,
        ReferenceFormat::Json => {
            let data: SerializedGraph = read_json(path)
                .with_context(|| format!("Failed to read JSON reference: {:?}", path))?;
            ReachabilityGraph::from_serialized(data)?
        }
        ReferenceFormat::Tina => {
            let names = TinaNames::for_net(net);
            let mut graph = read_reachability(path, &names.places)
                .with_context(|| format!("Failed to read TINA output: {:?}", path))?;
            rename_to_net(&mut graph, net, &names);
            graph
        }
    };
    info!(
        "Loaded reference graph with {} nodes and {} edges",
        graph.node_count(),
        graph.edge_count()
    );
    Ok(graph)
}

fn finish_comparison(
    tool_name: &str,
    exploration: Exploration,
    reference: &ReachabilityGraph,
    started: Instant,
    config: &ReachConfig,
) -> Result<()> {
    let comparison = compare(&exploration.graph, reference);
    let report = ComparisonReport::new(tool_name, &exploration.graph, reference, &comparison)
        .with_exploration(exploration.status)
        .with_marking_sets(compare_marking_sets(&exploration.graph, reference))
        .with_analysis_time(started.elapsed());
    report
        .save_to_file(&config.report.output)
        .with_context(|| format!("Failed to save report: {}", config.report.output))?;
    print!("{}", report);
    if !report.equivalent {
        std::process::exit(1);
    }
    Ok(())
}
