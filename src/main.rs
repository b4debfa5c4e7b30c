use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, Subcommand};

use repograph::graph::{GraphGateway, PersistSummary, SqliteGraphStore};
use repograph::observability::{init_logging, BuildMetrics};
use repograph::{BuildConfig, BuildResult, GraphBuilder, Result};

/// Build a repository knowledge graph and persist it to SQLite.
#[derive(Parser, Debug)]
#[command(name = "repograph", version, about, long_about = None, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Walk a checkout, build its graph and upsert it (nodes, then edges).
    Index {
        /// Repository checkout root.
        root: PathBuf,

        #[arg(long)]
        repo_id: String,

        /// Commit the checkout corresponds to.
        #[arg(long)]
        commit: String,

        /// YAML build config; `--repo-id`, `--commit` and ROOT override it.
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, default_value = "repograph.db")]
        db: PathBuf,

        /// Print the build summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Build only the given repo-relative files and print the summary.
    ///
    /// Node ids are local to one build, so the partial graph is reported
    /// rather than upserted over a full build.
    Update {
        root: PathBuf,

        #[arg(long)]
        repo_id: String,

        #[arg(long)]
        commit: String,

        #[arg(required = true)]
        paths: Vec<String>,

        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },

    /// Delete nodes not refreshed within the TTL, with their edges.
    Prune {
        #[arg(long)]
        repo_id: String,

        #[arg(long)]
        ttl_days: u32,

        #[arg(long, default_value = "repograph.db")]
        db: PathBuf,
    },

    /// Print stored node and edge counts for one repository.
    Stats {
        #[arg(long)]
        repo_id: String,

        #[arg(long, default_value = "repograph.db")]
        db: PathBuf,
    },
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Index {
            root,
            repo_id,
            commit,
            config,
            db,
            json,
        } => {
            let builder = builder(config.as_deref(), repo_id, commit, root)?;
            let started = Instant::now();
            let result = builder.build()?;
            let metrics = BuildMetrics::from_result(&result, Some(started.elapsed()));
            let store = open_store(&db)?;
            let summary = store.persist(&builder.config().repo_id, &result)?;
            report(&metrics, &result, Some((summary, db.as_path())), json)
        }
        Commands::Update {
            root,
            repo_id,
            commit,
            paths,
            config,
            json,
        } => {
            let builder = builder(config.as_deref(), repo_id, commit, root)?;
            let started = Instant::now();
            let result = builder.build_for_paths(paths.as_slice())?;
            let metrics = BuildMetrics::from_result(&result, Some(started.elapsed()));
            report(&metrics, &result, None, json)
        }
        Commands::Prune {
            repo_id,
            ttl_days,
            db,
        } => {
            let store = open_store(&db)?;
            let deleted = store.delete_stale(&repo_id, ttl_days)?;
            println!("Deleted {deleted} stale node(s) from {repo_id}.");
            Ok(())
        }
        Commands::Stats { repo_id, db } => {
            let store = open_store(&db)?;
            let stats = store.get_stats(&repo_id)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
    }
}

fn builder(
    config_path: Option<&Path>,
    repo_id: String,
    commit: String,
    root: PathBuf,
) -> Result<GraphBuilder> {
    let mut config = match config_path {
        Some(path) => BuildConfig::read(path)?,
        None => BuildConfig::default(),
    };
    config.repo_id = repo_id;
    config.commit_sha = commit;
    config.repo_root = root;
    GraphBuilder::new(config)
}

fn open_store(db: &Path) -> Result<SqliteGraphStore> {
    if let Some(parent) = db.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    SqliteGraphStore::new(&db.to_string_lossy())
}

fn report(
    metrics: &BuildMetrics,
    result: &BuildResult,
    persisted: Option<(PersistSummary, &Path)>,
    json: bool,
) -> Result<()> {
    if json {
        let mut value = metrics.to_json();
        if let Some((summary, _)) = persisted {
            value["nodes_written"] = summary.nodes_written.into();
            value["edges_written"] = summary.edges_written.into();
        }
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!(
        "Indexed {} of {} file(s) ({} skipped, {} failed) in {}ms.",
        metrics.indexed_files,
        metrics.total_files,
        metrics.skipped_files,
        metrics.failed_files,
        metrics.duration_ms.unwrap_or(0),
    );
    match persisted {
        Some((summary, db)) => println!(
            "Wrote {} node(s) and {} edge(s) to {}.",
            summary.nodes_written,
            summary.edges_written,
            db.display()
        ),
        None => println!("Built {} node(s) and {} edge(s).", metrics.nodes, metrics.edges),
    }
    for (kind, count) in &metrics.edges_by_kind {
        println!("  {kind:<16} {count}");
    }
    for err in &result.stats.errors {
        println!("  [{}] {}: {}", err.kind, err.path, err.message);
    }
    Ok(())
}
