//! Schema Lens CLI
//!
//! Browse subjects, build changelogs, and manage compatibility on a schema registry.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use schema_lens::{ClusterConfig, LensConfig, SchemaCatalog, SchemaChange, VersionSelector};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-lens")]
#[command(about = "Inspect and manage a schema registry")]
struct Cli {
    /// Path to a config file (defaults to ./schema-lens.toml and the user config dir)
    #[arg(short, long)]
    config: Option<String>,

    /// Cluster to talk to (defaults to the first configured one)
    #[arg(long)]
    cluster: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter config file with the local cluster
    Init {
        #[arg(default_value = "schema-lens.toml")]
        path: String,
    },

    /// List configured clusters
    Clusters,

    /// List subjects
    Subjects {
        /// Fuzzy filter on subject names
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// List the versions of a subject
    Versions { subject: String },

    /// Show a subject at a version
    Get {
        subject: String,
        /// Version number or "latest"
        #[arg(default_value = "latest")]
        version: String,
        /// Print the parsed schema only
        #[arg(long)]
        raw: bool,
    },

    /// Show a subject's changelog, newest first
    History {
        subject: String,
        /// Write the changelog as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Register a new schema version
    Register {
        subject: String,
        /// Schema file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Check whether a schema is already registered under a subject
    Check {
        subject: String,
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Test a schema against the subject's latest version
    Compat {
        subject: String,
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Read or change compatibility levels
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Delete one version of a subject
    Delete { subject: String, version: u32 },

    /// Re-fetch every subject at its latest version
    Refresh,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the global level, or a subject's level
    Get {
        #[arg(short, long)]
        subject: Option<String>,
    },
    /// Set the global level, or a subject's level
    Set {
        /// NONE, FULL, FORWARD, BACKWARD or a *_TRANSITIVE variant
        level: String,
        #[arg(short, long)]
        subject: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Commands::Init { path } = &cli.command {
        let starter = LensConfig {
            clusters: vec![ClusterConfig::local()],
            ..LensConfig::default()
        };
        starter
            .save(path)
            .with_context(|| format!("Failed to write {}", path))?;
        println!("✅ Wrote {}", path);
        return Ok(());
    }

    let config = LensConfig::load_from(cli.config.as_deref()).context("Failed to load configuration")?;

    if let Commands::Clusters = cli.command {
        if config.clusters.is_empty() {
            println!("No clusters configured, using local at {}", ClusterConfig::local().url);
        }
        for cluster in &config.clusters {
            let mode = if cluster.readonly_mode { " (read-only)" } else { "" };
            println!("  {} - {}{}", cluster.name, cluster.url, mode);
        }
        return Ok(());
    }

    let catalog = SchemaCatalog::connect(&config, cli.cluster.as_deref())?;

    match cli.command {
        Commands::Init { .. } | Commands::Clusters => Ok(()),

        Commands::Subjects { filter } => {
            let subjects = catalog.list_subjects().await?;
            let subjects = match filter {
                Some(pattern) => fuzzy_filter(subjects, &pattern),
                None => subjects,
            };
            for subject in &subjects {
                println!("{}", subject);
            }
            println!("\n{} subjects", subjects.len());
            Ok(())
        }

        Commands::Versions { subject } => {
            let versions = catalog.list_versions(&subject).await?;
            let listed: Vec<String> = versions.iter().map(|v| v.to_string()).collect();
            println!("{}: {}", subject, listed.join(", "));
            Ok(())
        }

        Commands::Get { subject, version, raw } => {
            let selector: VersionSelector = version
                .parse()
                .with_context(|| format!("Invalid version '{}' for {}", version, subject))?;
            let snapshot = catalog.resolve(&subject, selector).await?;
            let parsed = snapshot.parsed()?;

            if raw {
                println!("{}", serde_json::to_string_pretty(&parsed)?);
                return Ok(());
            }

            println!("📄 {} v{} (id {}, {:?})", snapshot.subject_name, snapshot.version, snapshot.id, snapshot.schema_type);
            println!("   fingerprint: {}", snapshot.fingerprint()?.short());
            if !snapshot.other_versions.is_empty() {
                let others: Vec<String> = snapshot.other_versions.iter().map(|v| v.to_string()).collect();
                println!("   other versions: {}", others.join(", "));
            }
            println!();
            println!("{}", serde_json::to_string_pretty(&parsed)?);
            Ok(())
        }

        Commands::History { subject, output } => {
            let changelog = catalog.build_changelog(&subject).await?;

            if let Some(path) = output {
                std::fs::write(&path, serde_json::to_string_pretty(&changelog)?)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("✅ Changelog written to {}", path.display());
                return Ok(());
            }

            if changelog.is_empty() {
                println!("{} has a single version, nothing to compare", subject);
                return Ok(());
            }

            for entry in &changelog {
                let marker = if entry.is_breaking() { "❌" } else { "✅" };
                println!("{} v{} -> v{} (id {})", marker, entry.previous_version, entry.version, entry.id);
                if entry.is_unchanged() {
                    println!("   └─ no structural change");
                }
                for change in &entry.changes {
                    print_change(change);
                }
            }
            println!();
            println!(
                "Original version: v{} (id {})",
                changelog[0].original_subject_version, changelog[0].original_subject_id
            );
            Ok(())
        }

        Commands::Register { subject, file } => {
            let schema = read_schema(&file)?;
            let id = catalog.register(&subject, &schema).await?;
            println!("✅ Registered {} with schema id {}", subject, id);
            Ok(())
        }

        Commands::Check { subject, file } => {
            let schema = read_schema(&file)?;
            let found = catalog.check_exists(&subject, &schema).await?;
            println!("✅ Registered under {} as version {} (id {})", subject, found.version, found.id);
            Ok(())
        }

        Commands::Compat { subject, file } => {
            let schema = read_schema(&file)?;
            let verdict = catalog.test_compatibility(&subject, &schema).await?;
            if verdict.is_acceptable() {
                println!("✅ {}: {}", subject, verdict);
            } else {
                println!("❌ {}: {}", subject, verdict);
                std::process::exit(1);
            }
            Ok(())
        }

        Commands::Config { action } => {
            match action {
                ConfigAction::Get { subject: Some(subject) } => {
                    println!("{}: {}", subject, catalog.subject_config(&subject).await?);
                }
                ConfigAction::Get { subject: None } => {
                    println!("global: {}", catalog.global_config().await?);
                }
                ConfigAction::Set { level, subject } => match subject {
                    Some(subject) => {
                        let applied = catalog.set_subject_config(&subject, &level).await?;
                        println!("✅ {} compatibility set to {}", subject, applied);
                    }
                    None => {
                        let applied = catalog.set_global_config(&level).await?;
                        println!("✅ Global compatibility set to {}", applied);
                    }
                },
            }
            Ok(())
        }

        Commands::Delete { subject, version } => {
            let deleted = catalog.delete_version(&subject, version).await?;
            println!("🗑️  Deleted {} version {}", subject, deleted);
            Ok(())
        }

        Commands::Refresh => {
            println!("🔄 Refreshing all subjects...");
            let refreshed = catalog
                .refresh_all_latest_with_progress(|progress| {
                    println!("  [{}/{}] {}", progress.completed, progress.total, progress.subject);
                })
                .await?;
            println!("✅ {} subjects cached", refreshed.len());
            Ok(())
        }
    }
}

/// Keep subjects matching `pattern`, best match first
fn fuzzy_filter(subjects: Vec<String>, pattern: &str) -> Vec<String> {
    let matcher = SkimMatcherV2::default();
    let mut scored: Vec<(i64, String)> = subjects
        .into_iter()
        .filter_map(|subject| matcher.fuzzy_match(&subject, pattern).map(|score| (score, subject)))
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    scored.into_iter().map(|(_, subject)| subject).collect()
}

fn read_schema(path: &PathBuf) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read schema file {}", path.display()))
}

fn print_change(change: &SchemaChange) {
    let tag = if change.is_breaking { "breaking" } else { "compatible" };
    println!("   └─ [{}] {} at {}", tag, change.description, change.path);
}
