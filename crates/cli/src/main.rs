use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use ancestry_graph_core as core;
use core::analysis::{
    age_gaps, influence_table, overview, project_ancestry, score, summarize, GapClass,
    ModelKind, ScoringConfig,
};
use core::export::{save_influence_csv, write_age_gap_csv, write_influence_csv, write_summary_csv};
use core::graph::{GraphStore, MergedAncestryGraph, NodeId};
use core::pedigree::{flatten, FlattenedPedigree, PedigreeCache, PedigreeTree};

#[derive(Parser)]
#[command(name = "ancestry")]
#[command(version)]
#[command(about = "Merge pedigrees into one ancestry graph and score ancestor influence")]
struct Cli {
    /// Path to the persisted merged graph
    #[arg(long, global = true, default_value = ".cache/merged_pedigree_graph.json")]
    graph: PathBuf,

    /// Directory holding one cached pedigree per subject
    #[arg(long, global = true, default_value = ".cache/pedigrees")]
    cache_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge pedigree JSON files (nested tree or flattened) into the graph
    Merge {
        /// Pedigree files to merge, in order
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Unique and appearance counts per generation
    Summary {
        /// Root node id (e.g. "ext:42462" or a bare external id) or name
        #[arg(short, long)]
        root: String,

        #[arg(short = 'd', long, default_value = "6")]
        max_depth: u32,

        /// Output format: "text" (default), "json" or "csv"
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Influence scores of the root's ancestors
    Score {
        #[arg(short, long)]
        root: String,

        #[arg(short = 'd', long, default_value = "6")]
        max_depth: u32,

        /// Model to rank by: linear, exponential, slow-exponential or power-law.
        /// Without it every model is reported.
        #[arg(short, long)]
        model: Option<String>,

        /// Decay factor for the exponential models
        #[arg(long)]
        decay: Option<f64>,

        /// Exponent for the power-law model
        #[arg(long)]
        power: Option<f64>,

        /// Only report these ancestors (repeatable)
        #[arg(long)]
        focus: Vec<String>,

        /// Maximum number of rows in text output
        #[arg(long, default_value = "25")]
        top: usize,

        /// Also write the full table as CSV to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format: "text" (default), "json" or "csv"
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Print the root's ancestry cut at a fixed depth
    Project {
        #[arg(short, long)]
        root: String,

        #[arg(short = 'd', long, default_value = "4")]
        max_depth: u32,

        /// Output format: "text" (default) or "json"
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Check parent/offspring birth-year gaps
    AgeGaps {
        #[arg(short, long)]
        root: String,

        #[arg(short = 'd', long, default_value = "4")]
        max_depth: u32,

        /// Also list gaps classified as normal
        #[arg(long)]
        all: bool,

        /// Output format: "text" (default), "json" or "csv"
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Node and edge counts, merge log and unresolved nodes
    Inspect,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let store = GraphStore::new(&cli.graph);

    match cli.command {
        Commands::Merge { files } => cmd_merge(&store, &cli.cache_dir, &files),
        Commands::Summary {
            root,
            max_depth,
            format,
        } => cmd_summary(&store, &root, max_depth, &format),
        Commands::Score {
            root,
            max_depth,
            model,
            decay,
            power,
            focus,
            top,
            output,
            format,
        } => cmd_score(
            &store,
            &root,
            max_depth,
            model.as_deref(),
            decay,
            power,
            &focus,
            top,
            output.as_deref(),
            &format,
        ),
        Commands::Project {
            root,
            max_depth,
            format,
        } => cmd_project(&store, &root, max_depth, &format),
        Commands::AgeGaps {
            root,
            max_depth,
            all,
            format,
        } => cmd_age_gaps(&store, &root, max_depth, all, &format),
        Commands::Inspect => cmd_inspect(&store),
    }
}

fn load_graph(store: &GraphStore) -> Result<MergedAncestryGraph> {
    store
        .load()
        .with_context(|| format!("Failed to load merged graph from '{}'", store.path().display()))
}

/// Read a pedigree file, either a flattened pedigree (has "slots") or a
/// nested sire/dam tree.
fn read_pedigree_file(path: &Path) -> Result<FlattenedPedigree> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read '{}'", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("'{}' is not valid JSON", path.display()))?;

    if value.get("slots").is_some() {
        serde_json::from_value(value)
            .with_context(|| format!("'{}' is not a flattened pedigree", path.display()))
    } else {
        let tree: PedigreeTree = serde_json::from_value(value)
            .with_context(|| format!("'{}' is not a pedigree tree", path.display()))?;
        Ok(flatten(&tree))
    }
}

/// Resolve a user-supplied root: a node id first, then a unique name match.
fn resolve_root(graph: &MergedAncestryGraph, root: &str) -> Result<NodeId> {
    let id = NodeId::parse(root);
    if graph.contains(&id) {
        return Ok(id);
    }
    match graph.find_by_name(root).as_slice() {
        [node] => Ok(node.id.clone()),
        [] => anyhow::bail!("No node '{}' in the merged graph", root),
        many => {
            let ids: Vec<String> = many.iter().map(|n| n.id.to_string()).collect();
            anyhow::bail!(
                "Name '{}' matches {} nodes, pass an id instead: {}",
                root,
                many.len(),
                ids.join(", ")
            )
        }
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    let json_str = serde_json::to_string_pretty(value)?;
    println!("{}", json_str);
    Ok(())
}

fn cmd_merge(store: &GraphStore, cache_dir: &Path, files: &[PathBuf]) -> Result<()> {
    let mut graph = load_graph(store)?;
    let mut cache = PedigreeCache::open(cache_dir);

    eprintln!(
        "Loaded merged graph with {} nodes, {} edges from '{}'",
        graph.node_count(),
        graph.edge_count(),
        store.path().display()
    );
    if let Some(dir) = cache.dir() {
        eprintln!("Pedigree cache: '{}'", dir.display());
    }

    let mut merged = 0;
    for path in files {
        let pedigree = read_pedigree_file(path)?;
        let key = pedigree.subject_key();
        // A subject already in the cache is served from there, not the file.
        let pedigree = cache
            .get_or_fetch(&key, |_| Ok(pedigree))
            .with_context(|| format!("Failed to cache pedigree for {}", key))?;

        if let Err(e) = pedigree.check() {
            eprintln!("Warning: skipping {} from '{}': {}", key, path.display(), e);
            continue;
        }

        let report = graph
            .merge(&pedigree)
            .with_context(|| format!("Failed to merge pedigree for {}", key))?;
        println!("{}", report);
        for conflict in &report.conflicts {
            eprintln!("Warning: edge conflict: {}", conflict);
        }
        merged += 1;
    }

    store.save(&graph).with_context(|| {
        format!("Failed to save merged graph to '{}'", store.path().display())
    })?;
    eprintln!(
        "Merged {} of {} pedigrees; graph now has {} nodes, {} edges",
        merged,
        files.len(),
        graph.node_count(),
        graph.edge_count()
    );
    Ok(())
}

fn cmd_summary(store: &GraphStore, root: &str, max_depth: u32, format: &str) -> Result<()> {
    let graph = load_graph(store)?;
    let root = resolve_root(&graph, root)?;
    let summaries = summarize(&graph, &root, max_depth)
        .with_context(|| format!("Failed to summarize ancestry of {}", root))?;

    match format.to_lowercase().as_str() {
        "text" => {
            let label = graph.require(&root)?.label();
            println!("Ancestry of {} [{}]", label, root);
            println!(
                "{:>5} {:>8} {:>10} {:>9} {:>12} {:>8}",
                "depth", "unique", "cumulative", "distinct", "appearances", "repeats"
            );
            for s in &summaries {
                println!(
                    "{:>5} {:>8} {:>10} {:>9} {:>12} {:>7.1}%",
                    s.depth,
                    s.unique_count,
                    s.cumulative_unique,
                    s.distinct_count,
                    s.appearance_count,
                    100.0 * s.repeat_ratio()
                );
            }
            let lineage = overview(&graph, &root, None)?;
            println!(
                "\n{} nodes over {} generations ({} open, {} closed)",
                lineage.total_nodes,
                lineage.max_generation,
                lineage.open_nodes,
                lineage.closed_nodes
            );
        }
        "json" => print_json(&summaries)?,
        "csv" => write_summary_csv(std::io::stdout().lock(), &summaries)?,
        other => anyhow::bail!("Unknown format '{}'. Use 'text', 'json' or 'csv'.", other),
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_score(
    store: &GraphStore,
    root: &str,
    max_depth: u32,
    model: Option<&str>,
    decay: Option<f64>,
    power: Option<f64>,
    focus: &[String],
    top: usize,
    output: Option<&Path>,
    format: &str,
) -> Result<()> {
    let graph = load_graph(store)?;
    let root = resolve_root(&graph, root)?;

    let mut config = ScoringConfig::default();
    if let Some(decay) = decay {
        config.exponential_decay = decay;
        config.slow_decay = decay;
    }
    if let Some(power) = power {
        config.power_exponent = power;
    }
    let kind: ModelKind = match model {
        Some(m) => m.parse()?,
        None => ModelKind::Exponential,
    };

    let focus: Option<BTreeSet<NodeId>> = if focus.is_empty() {
        None
    } else {
        Some(
            focus
                .iter()
                .map(|f| resolve_root(&graph, f))
                .collect::<Result<_>>()?,
        )
    };

    let mut rows = influence_table(&graph, &root, max_depth, &config, focus.as_ref())
        .with_context(|| format!("Failed to score ancestry of {}", root))?;
    if kind != ModelKind::Exponential {
        let by = |r: &core::analysis::InfluenceRow| match kind {
            ModelKind::Linear => r.linear,
            ModelKind::Exponential => r.exponential,
            ModelKind::SlowExponential => r.slow_exponential,
            ModelKind::PowerLaw => r.power_law,
        };
        rows.sort_by(|a, b| by(b).total_cmp(&by(a)).then_with(|| a.id.cmp(&b.id)));
    }

    if let Some(path) = output {
        save_influence_csv(path, &rows)
            .with_context(|| format!("Failed to write '{}'", path.display()))?;
        eprintln!("Wrote {} rows to '{}'", rows.len(), path.display());
    }

    match format.to_lowercase().as_str() {
        "text" => {
            if model.is_some() {
                let scores = score(&graph, &root, max_depth, &config.model(kind))?;
                println!(
                    "{} ancestors of {} scored by {} to depth {}",
                    scores.len(),
                    root,
                    kind,
                    max_depth
                );
            }
            println!(
                "{:<28} {:<24} {:>5} {:>4} {:>8} {:>8} {:>8} {:>8}",
                "id", "name", "count", "min", "linear", "exp", "slow", "power"
            );
            for row in rows.iter().take(top) {
                println!(
                    "{:<28} {:<24} {:>5} {:>4} {:>8.4} {:>8.4} {:>8.4} {:>8.4}",
                    row.id.as_str(),
                    row.name,
                    row.count,
                    row.min_depth.map_or("-".to_string(), |d| d.to_string()),
                    row.linear,
                    row.exponential,
                    row.slow_exponential,
                    row.power_law
                );
            }
            if rows.len() > top {
                println!("... {} more", rows.len() - top);
            }
        }
        "json" => print_json(&rows)?,
        "csv" => write_influence_csv(std::io::stdout().lock(), &rows)?,
        other => anyhow::bail!("Unknown format '{}'. Use 'text', 'json' or 'csv'.", other),
    }
    Ok(())
}

fn cmd_project(store: &GraphStore, root: &str, max_depth: u32, format: &str) -> Result<()> {
    let graph = load_graph(store)?;
    let root = resolve_root(&graph, root)?;
    let projection = project_ancestry(&graph, &root, max_depth)
        .with_context(|| format!("Failed to project ancestry of {}", root))?;

    match format.to_lowercase().as_str() {
        "text" => {
            for (id, depth) in &projection.nodes {
                let node = graph.require(id)?;
                let more = if projection.has_more.contains(id) { " +" } else { "" };
                println!(
                    "{}{} [{}]{}",
                    "  ".repeat(*depth as usize),
                    node.label(),
                    id,
                    more
                );
            }
            eprintln!(
                "{} nodes, {} edges within depth {}",
                projection.len(),
                projection.edges(&graph).count(),
                max_depth
            );
        }
        "json" => {
            let nodes: Vec<serde_json::Value> = projection
                .nodes
                .iter()
                .map(|(id, depth)| {
                    serde_json::json!({
                        "id": id,
                        "name": graph.node(id).map(|n| n.name.as_str()),
                        "depth": depth,
                        "has_more": projection.has_more.contains(id),
                    })
                })
                .collect();
            let edges: Vec<serde_json::Value> = projection
                .edges(&graph)
                .map(|(child, role, parent)| {
                    serde_json::json!({ "child": child, "role": role, "parent": parent })
                })
                .collect();
            print_json(&serde_json::json!({
                "root": projection.root,
                "max_depth": projection.max_depth,
                "nodes": nodes,
                "edges": edges,
            }))?;
        }
        other => anyhow::bail!("Unknown format '{}'. Use 'text' or 'json'.", other),
    }
    Ok(())
}

fn cmd_age_gaps(
    store: &GraphStore,
    root: &str,
    max_depth: u32,
    all: bool,
    format: &str,
) -> Result<()> {
    let graph = load_graph(store)?;
    let root = resolve_root(&graph, root)?;
    let mut gaps = age_gaps(&graph, &root, max_depth)
        .with_context(|| format!("Failed to check age gaps of {}", root))?;
    if !all {
        gaps.retain(|g| g.class != GapClass::Normal);
    }

    match format.to_lowercase().as_str() {
        "text" => {
            for gap in &gaps {
                println!(
                    "{:<12} {} ({}) -> {}: {} {}",
                    format!("{:?}", gap.class),
                    gap.child_name,
                    gap.child_birth_year.map_or("?".to_string(), |y| y.to_string()),
                    gap.role,
                    gap.parent_name.as_deref().unwrap_or("?"),
                    gap.gap.map_or(String::new(), |g| format!("({} years)", g))
                );
            }
            eprintln!("{} gaps reported", gaps.len());
        }
        "json" => print_json(&gaps)?,
        "csv" => write_age_gap_csv(std::io::stdout().lock(), &gaps)?,
        other => anyhow::bail!("Unknown format '{}'. Use 'text', 'json' or 'csv'.", other),
    }
    Ok(())
}

fn cmd_inspect(store: &GraphStore) -> Result<()> {
    let graph = load_graph(store)?;

    println!("Graph: {}", store.path().display());
    println!("Nodes: {}", graph.node_count());
    println!("Edges: {}", graph.edge_count());

    println!("\nMerge log:");
    for record in graph.merge_log() {
        println!(
            "  {}  {:<24} {:>4} slots, {:>4} new nodes, {} conflicts",
            record.merged_at.format("%Y-%m-%d %H:%M:%S"),
            record.source_id,
            record.slots_merged,
            record.nodes_created,
            record.conflicts
        );
    }

    let unresolved: Vec<_> = graph.unresolved_nodes().collect();
    println!("\nUnresolved nodes: {}", unresolved.len());
    for node in unresolved.iter().take(20) {
        println!("  {} [{}]", node.label(), node.id);
    }
    Ok(())
}
