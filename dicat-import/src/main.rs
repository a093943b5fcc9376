//! dicat - DICOM catalog command line front end
//!
//! Thin presentation layer over the import engine: resolves the database
//! directory, opens the two stores, runs the requested operation, and
//! renders the returned summary. The engine itself never reads ambient
//! configuration; everything it needs is handed over here.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use dicat_common::models::StorageMode;
use dicat_import::db::catalog;
use dicat_import::services::import_coordinator::{ConfirmPolicy, ImportCoordinator};
use dicat_import::ImportSummary;
use std::io::Write;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dicat", version, about = "DICOM import and indexing catalog")]
struct Cli {
    /// Directory holding the catalog and tag cache databases
    #[arg(long, env = "DICAT_DATABASE_DIR", default_value = "./dicat-db")]
    database_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import DICOM files and/or directory trees into the catalog
    Import {
        /// Files and directories to import
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Storage mode for every instance added by this operation
        #[arg(long, value_enum, default_value_t = ModeArg::Link)]
        mode: ModeArg,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the catalog hierarchy
    List,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Reference the source file in place
    Link,
    /// Duplicate the bytes into the managed store
    Copy,
}

impl From<ModeArg> for StorageMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Link => StorageMode::Linked,
            ModeArg::Copy => StorageMode::Copied,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    info!("Database directory: {}", cli.database_dir.display());
    let (db, tag_db) = dicat_common::db::init::open_stores(&cli.database_dir).await?;

    match cli.command {
        Command::Import {
            paths,
            mode,
            yes,
            json,
        } => {
            let coordinator =
                ImportCoordinator::new(db, tag_db, cli.database_dir.join("storage"));

            let confirm = if yes {
                ConfirmPolicy::Proceed
            } else {
                ConfirmPolicy::Prompt(Box::new(prompt_confirm))
            };

            // Cooperative cancellation on Ctrl-C: the current file finishes,
            // everything committed so far stays in the catalog.
            let cancel = CancellationToken::new();
            {
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        info!("Interrupt received, stopping after the current file");
                        cancel.cancel();
                    }
                });
            }

            let (dirs, files): (Vec<PathBuf>, Vec<PathBuf>) =
                paths.into_iter().partition(|p| p.is_dir());

            let mut summary = ImportSummary::new();
            if !dirs.is_empty() {
                summary.merge(
                    coordinator
                        .import_directories(&dirs, mode.into(), &confirm, &cancel)
                        .await?,
                );
            }
            if !files.is_empty() {
                summary.merge(
                    coordinator
                        .import_files(files, mode.into(), &confirm, &cancel)
                        .await?,
                );
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }
        }

        Command::List => {
            print_catalog(&db).await?;
        }
    }

    Ok(())
}

fn prompt_confirm(file_count: usize) -> bool {
    eprint!("Import {} file(s) into the catalog? [y/N] ", file_count);
    let _ = std::io::stderr().flush();

    let mut answer = String::new();
    if std::io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

fn print_summary(summary: &ImportSummary) {
    println!(
        "Added {} instances ({} patients, {} studies, {} series new)",
        summary.instances_added,
        summary.patients_added,
        summary.studies_added,
        summary.series_added
    );
    println!(
        "Processed {} file(s), skipped {}",
        summary.files_processed, summary.files_skipped
    );
    for error in &summary.errors {
        println!(
            "  skipped {} [{}]: {}",
            error.file_path, error.error_code, error.error_message
        );
    }
}

async fn print_catalog(db: &sqlx::SqlitePool) -> Result<()> {
    for patient_id in catalog::patients(db).await? {
        let name = catalog::patient(db, &patient_id)
            .await?
            .and_then(|p| p.patient_name)
            .unwrap_or_else(|| "(unnamed)".to_string());
        println!("Patient {} {}", patient_id, name);

        for study_uid in catalog::studies_for_patient(db, &patient_id).await? {
            let description = catalog::study(db, &study_uid)
                .await?
                .and_then(|s| s.description)
                .unwrap_or_default();
            println!("  Study {} {}", study_uid, description);

            for series_uid in catalog::series_for_study(db, &study_uid).await? {
                let modality = catalog::series(db, &series_uid)
                    .await?
                    .and_then(|s| s.modality)
                    .unwrap_or_default();
                let instances = catalog::instances_for_series(db, &series_uid).await?;
                println!(
                    "    Series {} {} ({} instances)",
                    series_uid,
                    modality,
                    instances.len()
                );
            }
        }
    }

    let totals = catalog::counts(db).await?;
    println!(
        "Total: {} patients, {} studies, {} series, {} instances",
        totals.patients, totals.studies, totals.series, totals.instances
    );

    Ok(())
}
