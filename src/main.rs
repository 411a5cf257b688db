//! corpus-ingest CLI: load RDF corpora into the repository.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::Result;

use corpus_ingest::config::IngestConfig;
use corpus_ingest::ingest::{IngestOutcome, Pipeline};
use corpus_ingest::manifest::{self, FileEntry};
use corpus_ingest::objects::{Document, User, UserRole};
use corpus_ingest::paths::IngestPaths;

#[derive(Parser)]
#[command(name = "corpus-ingest", version, about = "Ingest RDF corpora into a digital collection repository")]
struct Cli {
    /// Config file (defaults to the XDG config location).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Root directory for config and stored data.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file.
    Init,

    /// Ingest a single metadata file.
    Ingest {
        /// Corpus directory holding the metadata files.
        corpus_dir: PathBuf,
        /// The `*-metadata.rdf` file to ingest.
        rdf_file: PathBuf,
        /// Pid for a newly created item.
        #[arg(long)]
        pid: Option<String>,
    },

    /// Ingest every metadata file in a corpus directory.
    IngestDir {
        corpus_dir: PathBuf,
    },

    /// Build, show or invalidate a directory's manifest.
    Manifest {
        #[command(subcommand)]
        action: ManifestAction,
    },

    /// Manage users that can own collections.
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Show an item and its documents.
    Inspect {
        /// Item handle (`collection:identifier`).
        handle: String,
    },
}

#[derive(Subcommand)]
enum ManifestAction {
    /// Rebuild the manifest, replacing any existing one.
    Build { corpus_dir: PathBuf },
    /// Print the manifest, building it if absent.
    Show { corpus_dir: PathBuf },
    /// Remove the manifest so the next ingest rebuilds it.
    Invalidate { corpus_dir: PathBuf },
}

#[derive(Subcommand)]
enum UserAction {
    /// Register or update a user.
    Add {
        email: String,
        /// admin, data-owner or researcher.
        #[arg(long, default_value = "data-owner")]
        role: UserRole,
    },
    /// List registered users.
    List,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let paths = match &cli.data_dir {
        Some(dir) => IngestPaths::rooted_at(dir),
        None => IngestPaths::resolve()?,
    };
    let config_path = cli.config.clone().unwrap_or_else(|| paths.config_file());
    let config = IngestConfig::load_or_default(&config_path)?;

    match cli.command {
        Commands::Init => {
            paths.ensure_dirs()?;
            config.save(&config_path)?;
            println!("Wrote {}", config_path.display());
            println!("Data directory: {}", paths.data_dir.display());
        }

        Commands::Ingest {
            corpus_dir,
            rdf_file,
            pid,
        } => {
            let pipeline = open_pipeline(config, &paths)?;
            let outcome = pipeline.ingest_one(&corpus_dir, &rdf_file, pid.as_deref())?;
            print_outcome(&outcome);
        }

        Commands::IngestDir { corpus_dir } => {
            let pipeline = open_pipeline(config, &paths)?;
            let report = pipeline.ingest_directory(&corpus_dir)?;
            for warning in &report.warnings {
                println!("warning: {warning}");
            }
            for outcome in &report.ingested {
                print_outcome(outcome);
            }
            for (file, error) in &report.failed {
                println!("FAILED {}: {error}", file.display());
            }
            println!(
                "{} ingested, {} failed",
                report.ingested.len(),
                report.failed.len()
            );
        }

        Commands::Manifest { action } => match action {
            ManifestAction::Build { corpus_dir } => {
                let manifest = manifest::create_collection_manifest(&corpus_dir, &config)?;
                println!(
                    "Manifest for collection \"{}\": {} files, {} failed",
                    manifest.collection_name,
                    manifest.files.len(),
                    manifest.failures().len()
                );
            }
            ManifestAction::Show { corpus_dir } => {
                let manifest = manifest::ensure_manifest(&corpus_dir, &config)?;
                println!("collection: {}", manifest.collection_name);
                for (file, entry) in &manifest.files {
                    match entry {
                        FileEntry::Parsed(item) => {
                            println!("  {file}: {} ({} documents)", item.id, item.docs.len())
                        }
                        FileEntry::Failed { error } => println!("  {file}: ERROR {error}"),
                    }
                }
            }
            ManifestAction::Invalidate { corpus_dir } => {
                if manifest::invalidate_manifest(&corpus_dir)? {
                    println!("Removed {}", manifest::manifest_path(&corpus_dir).display());
                } else {
                    println!("No manifest in {}", corpus_dir.display());
                }
            }
        },

        Commands::User { action } => {
            let pipeline = open_pipeline(config, &paths)?;
            match action {
                UserAction::Add { email, role } => {
                    pipeline.objects().put_user(&User::new(&email, role))?;
                    println!("User {email} registered as {role:?}");
                }
                UserAction::List => {
                    for user in pipeline.objects().users()? {
                        println!("{}\t{:?}", user.email, user.role);
                    }
                }
            }
        }

        Commands::Inspect { handle } => {
            let pipeline = open_pipeline(config, &paths)?;
            let objects = pipeline.objects();
            let Some(item) = objects.item_by_handle(&handle)? else {
                miette::bail!("no item with handle \"{handle}\"");
            };
            println!("Item {} ({})", item.pid(), item.handle);
            println!("  uri:        {}", item.uri);
            println!("  collection: {}", item.collection);
            println!("  modified:   {}", item.meta.modified_date);
            for stream in item.datastreams.values() {
                println!("  stream {} [{}]", stream.dsid, stream.mime_type);
            }
            let documents: Vec<Document> = objects.documents_of(item.pid())?;
            for doc in documents {
                println!("  document {} {} {} ({})", doc.pid(), doc.doc_type, doc.file_name, doc.mime_type);
            }
        }
    }

    Ok(())
}

fn open_pipeline(config: IngestConfig, paths: &IngestPaths) -> Result<Pipeline> {
    paths.ensure_dirs()?;
    Ok(Pipeline::open(config, paths)?)
}

fn print_outcome(outcome: &IngestOutcome) {
    println!(
        "{} {} [{:?}] {} document(s)",
        outcome.handle,
        outcome.pid,
        outcome.state,
        outcome.documents.len()
    );
    for warning in &outcome.warnings {
        println!("  warning: {warning}");
    }
}
