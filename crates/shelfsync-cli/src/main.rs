mod config_file;
mod input;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use shelfsync_core::BookRecord;
use shelfsync_reconcile::{ConflictDetectionEngine, ConflictRecord, DetectorKind, DetectorSet};

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "shelfsync",
    about = "Stable book identities and conflict detection for synced reading lists",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file. Defaults to $SHELFSYNC_CONFIG or the user config directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output in JSON format.
    /// Also enabled by setting SHELFSYNC_JSON=1.
    #[arg(long, global = true)]
    json: bool,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the stable identity of a record.
    Identity {
        #[arg(long)]
        reader_link_id: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        cover_url: Option<String>,
        /// Resolve every record in a JSON file instead.
        #[arg(long, conflicts_with_all = ["reader_link_id", "title", "cover_url"])]
        input: Option<PathBuf>,
    },

    /// Compare two records with every detector.
    Compare {
        left: PathBuf,
        right: PathBuf,
        #[arg(long = "detector", value_enum)]
        detectors: Vec<DetectorArg>,
    },

    /// Compare two record lists index by index.
    Batch {
        left: PathBuf,
        right: PathBuf,
        #[arg(long)]
        batch_size: Option<usize>,
        #[arg(long = "detector", value_enum)]
        detectors: Vec<DetectorArg>,
    },

    /// Group records by identity and compare members with each group's
    /// most complete record.
    Group {
        records: PathBuf,
        /// Only list the groups.
        #[arg(long)]
        no_detect: bool,
    },

    /// Config management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration.
    Show,
    /// Print the config file location.
    Path,
    /// Write the default configuration to the config file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DetectorArg {
    Progress,
    Tags,
    Title,
}

impl From<DetectorArg> for DetectorKind {
    fn from(arg: DetectorArg) -> Self {
        match arg {
            DetectorArg::Progress => DetectorKind::Progress,
            DetectorArg::Tags => DetectorKind::Tags,
            DetectorArg::Title => DetectorKind::Title,
        }
    }
}

fn detector_set(args: &[DetectorArg]) -> DetectorSet {
    if args.is_empty() {
        return DetectorSet::all();
    }
    let kinds: Vec<DetectorKind> = args.iter().copied().map(DetectorKind::from).collect();
    DetectorSet::only(&kinds)
}

// ─── Main ────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let start = Instant::now();
    let cli = Cli::parse();

    init_tracing(&cli.log_level);

    let json_output = cli.json || std::env::var("SHELFSYNC_JSON").as_deref() == Ok("1");
    let config_path = config_file::config_path(cli.config.as_deref());

    match cli.command {
        // ── Config ─────────────────────────────────────────────────────────
        Commands::Config { action } => {
            let dur = start.elapsed().as_millis();
            match action {
                ConfigAction::Show => {
                    let config = config_file::load_from(&config_path)?;
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":config,"meta":{"duration_ms":dur}}))?;
                    } else {
                        print!("{}", config.to_toml_string()?);
                    }
                }
                ConfigAction::Path => {
                    let exists = config_path.exists();
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":{"path":config_path,"exists":exists},"meta":{"duration_ms":dur}}))?;
                    } else if exists {
                        println!("{}", config_path.display());
                    } else {
                        println!("{} (not found, using defaults)", config_path.display());
                    }
                }
                ConfigAction::Init { force } => {
                    let written = config_file::init_at(&config_path, force)?;
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":{"path":config_path,"written":written},"meta":{"duration_ms":dur}}))?;
                    } else if written {
                        println!("Wrote default config to {}", config_path.display());
                    } else {
                        eprintln!(
                            "Config already exists at {}. Add --force to overwrite.",
                            config_path.display()
                        );
                        std::process::exit(1);
                    }
                }
            }
        }

        // ── Identity ───────────────────────────────────────────────────────
        Commands::Identity {
            reader_link_id,
            title,
            cover_url,
            input,
        } => {
            let engine = load_engine(&config_path)?;
            let records = match input {
                Some(path) => input::read_records(&path)?,
                None => vec![BookRecord {
                    reader_link_id,
                    title,
                    cover_url,
                    ..BookRecord::default()
                }],
            };
            let identities: Vec<_> = records.iter().map(|r| engine.resolve(r)).collect();
            let dur = start.elapsed().as_millis();
            if json_output {
                let items: Vec<serde_json::Value> = identities
                    .iter()
                    .map(|id| serde_json::json!({"identity":id,"source":id.source(),"stable":id.is_stable()}))
                    .collect();
                print_json(&serde_json::json!({"status":"ok","data":items,"meta":{"duration_ms":dur}}))?;
            } else {
                for id in &identities {
                    if id.is_stable() {
                        println!("{id}");
                    } else {
                        println!("{id}  (unstable)");
                    }
                }
            }
        }

        // ── Compare ────────────────────────────────────────────────────────
        Commands::Compare {
            left,
            right,
            detectors,
        } => {
            let engine = load_engine(&config_path)?;
            let left = input::read_record(&left)?;
            let right = input::read_record(&right)?;
            let conflicts = engine.detect_pair_with(&left, &right, &detector_set(&detectors));
            let dur = start.elapsed().as_millis();
            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": {
                        "identities": [engine.resolve(&left), engine.resolve(&right)],
                        "conflicts": conflicts,
                    },
                    "meta": {"duration_ms": dur}
                }))?;
            } else if conflicts.is_empty() {
                println!("No conflicts.");
            } else {
                for conflict in &conflicts {
                    println!("{}", describe(conflict));
                }
            }
        }

        // ── Batch ──────────────────────────────────────────────────────────
        Commands::Batch {
            left,
            right,
            batch_size,
            detectors,
        } => {
            let engine = load_engine(&config_path)?;
            let left = input::read_records(&left)?;
            let right = input::read_records(&right)?;
            let mut options = engine
                .batch_options()
                .with_detectors(detector_set(&detectors));
            if let Some(size) = batch_size {
                options = options.with_batch_size(size);
            }
            let conflicts = engine.detect_batch(&left, &right, &options).await;
            let dur = start.elapsed().as_millis();
            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": conflicts,
                    "meta": {"duration_ms": dur, "pairs": left.len().min(right.len())}
                }))?;
            } else if conflicts.is_empty() {
                println!("No conflicts in {} pair(s).", left.len().min(right.len()));
            } else {
                for conflict in &conflicts {
                    println!("{}", describe(conflict));
                }
                println!("{} conflict(s).", conflicts.len());
            }
        }

        // ── Group ──────────────────────────────────────────────────────────
        Commands::Group { records, no_detect } => {
            let engine = load_engine(&config_path)?;
            let records = input::read_records(&records)?;
            let groups = engine.group_by_identity(&records);
            let conflicts = if no_detect {
                Vec::new()
            } else {
                engine
                    .detect_grouped(&records, &engine.batch_options())
                    .await
            };
            let dur = start.elapsed().as_millis();
            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": {"groups": groups, "conflicts": conflicts},
                    "meta": {"duration_ms": dur, "records": records.len()}
                }))?;
            } else {
                for group in &groups {
                    println!(
                        "{}  canonical #{}  members {:?}",
                        group.identity, group.canonical, group.members
                    );
                }
                for conflict in &conflicts {
                    println!(
                        "#{} vs #{}: {}",
                        conflict.canonical,
                        conflict.member,
                        describe(&conflict.conflict)
                    );
                }
            }
        }
    }

    Ok(())
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn init_tracing(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_engine(config_path: &std::path::Path) -> Result<ConflictDetectionEngine> {
    let config = config_file::load_from(config_path)?;
    tracing::debug!(path = %config_path.display(), "configuration loaded");
    ConflictDetectionEngine::from_config(&config)
        .with_context(|| format!("invalid configuration in {}", config_path.display()))
}

fn describe(conflict: &ConflictRecord) -> String {
    let pair = conflict
        .metadata
        .pair_index
        .map(|i| format!("[pair {i}] "))
        .unwrap_or_default();
    let kind = match conflict.detector() {
        DetectorKind::Progress => "progress",
        DetectorKind::Tags => "tags",
        DetectorKind::Title => "title",
    };
    format!(
        "{pair}{:?} {kind} conflict (confidence {:.2})",
        conflict.severity,
        conflict.confidence()
    )
}

fn print_json(val: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_batch_flags() {
        let cli = Cli::parse_from([
            "shelfsync",
            "--json",
            "batch",
            "a.json",
            "b.json",
            "--batch-size",
            "0",
            "--detector",
            "title",
        ]);
        assert!(cli.json);
        let Commands::Batch {
            batch_size,
            detectors,
            ..
        } = cli.command
        else {
            panic!("expected batch");
        };
        assert_eq!(batch_size, Some(0));
        assert_eq!(detectors, vec![DetectorArg::Title]);
    }

    #[test]
    fn identity_input_conflicts_with_fields() {
        let result = Cli::try_parse_from([
            "shelfsync",
            "identity",
            "--title",
            "Dune",
            "--input",
            "x.json",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn detector_set_defaults_to_all() {
        assert_eq!(detector_set(&[]), DetectorSet::all());
        let only = detector_set(&[DetectorArg::Tags]);
        assert!(only.tags && !only.progress && !only.title);
    }
}
