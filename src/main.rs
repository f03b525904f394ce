// src/main.rs
mod extractors;
mod oracle;
mod pdf;
mod pipeline;
mod storage;
mod utils;

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use extractors::content::DocumentIdentity;
use oracle::GeminiClient;
use pdf::MupdfDocument;
use pipeline::ManualParser;
use storage::{LocalStore, ObjectStore, RemoteStore};
use utils::AppError;

/// Command Line Interface for the manual section extractor
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding manuals in per-brand subfolders (<dir>/<BRAND>/*.pdf)
    #[arg(short, long, default_value = "./data/manuals")]
    data_dir: String,

    /// Only process this brand subfolder (default: all)
    #[arg(short, long)]
    brand: Option<String>,

    /// Appliance type the manuals describe
    #[arg(long, default_value = "Dishwasher")]
    device: String,

    /// Model number recorded on extracted sections (default: the file stem)
    #[arg(short, long)]
    model_number: Option<String>,

    /// Where artifacts are written
    #[arg(short, long, value_enum, default_value_t = StorageEnvironment::Local)]
    environment: StorageEnvironment,

    /// Output directory for local-mode artifacts
    #[arg(short, long, default_value = "./output")]
    output_dir: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StorageEnvironment {
    Local,
    Remote,
}

/// One discovered manual file.
#[derive(Debug, Clone)]
struct ManualFile {
    path: PathBuf,
    brand: String,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Setup Logging (reads RUST_LOG env var)
    utils::logging::setup_logging();

    // 2. Parse CLI Arguments
    let args = Args::parse();
    tracing::info!("Starting processing for args: {:?}", args);

    // 3. Build collaborators. Missing credentials or bucket configuration
    //    abort here, before any document is opened.
    let oracle = GeminiClient::from_env()?;

    match args.environment {
        StorageEnvironment::Local => {
            let store = LocalStore::new(&args.output_dir)?;
            run(&args, &oracle, &store).await
        }
        StorageEnvironment::Remote => {
            let store = RemoteStore::from_env()?;
            run(&args, &oracle, &store).await
        }
    }
}

async fn run<S: ObjectStore>(
    args: &Args,
    oracle: &GeminiClient,
    store: &S,
) -> Result<(), AppError> {
    // 4. Discover manuals under the brand subfolders
    let manuals = discover_manuals(&args.data_dir, args.brand.as_deref())?;
    if manuals.is_empty() {
        return Err(AppError::Config(format!(
            "No manuals found under {} for the selected brand",
            args.data_dir
        )));
    }
    tracing::info!("Found {} manual(s) to process", manuals.len());

    // 5. Process each manual sequentially, isolating failures
    let mut success_count = 0;
    let mut failure_count = 0;

    for manual in &manuals {
        tracing::info!(
            "Processing manual: {} (brand {})",
            manual.path.display(),
            manual.brand
        );
        match process_manual(args, oracle, store, manual).await {
            Ok(extracted) => {
                tracing::info!(
                    "Finished {}: {} section(s) extracted",
                    manual.path.display(),
                    extracted
                );
                success_count += 1;
            }
            Err(e) => {
                tracing::error!("Failed to process {}: {}", manual.path.display(), e);
                failure_count += 1;
            }
        }
    }

    tracing::info!(
        "Processing finished. Success: {}, Failures: {}",
        success_count,
        failure_count
    );

    if success_count == 0 && failure_count > 0 {
        return Err(AppError::Processing(format!(
            "Failed to process all {} manual(s)",
            failure_count
        )));
    }
    Ok(())
}

/// Walks `<data_dir>/<BRAND>/*.pdf`, optionally restricted to one brand.
/// Results are sorted for a deterministic processing order.
fn discover_manuals(data_dir: &str, brand: Option<&str>) -> Result<Vec<ManualFile>, AppError> {
    let mut manuals = Vec::new();

    for entry in std::fs::read_dir(data_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let dir_brand = entry.file_name().to_string_lossy().to_string();
        if let Some(wanted) = brand {
            if !dir_brand.eq_ignore_ascii_case(wanted) {
                continue;
            }
        }

        for file in std::fs::read_dir(entry.path())? {
            let path = file?.path();
            let is_pdf = path
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("pdf"))
                .unwrap_or(false);
            if is_pdf {
                manuals.push(ManualFile {
                    path,
                    brand: dir_brand.clone(),
                });
            }
        }
    }

    manuals.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(manuals)
}

/// Runs the full pipeline over one manual. Returns the number of sections
/// successfully extracted.
async fn process_manual<S: ObjectStore>(
    args: &Args,
    oracle: &GeminiClient,
    store: &S,
    manual: &ManualFile,
) -> Result<usize, AppError> {
    let document = MupdfDocument::open(&manual.path)?;
    let document_hash = utils::hash::file_sha256(&manual.path)?;
    let file_stem = manual
        .path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "manual".to_string());
    let model_number = args
        .model_number
        .clone()
        .unwrap_or_else(|| file_stem.clone());

    let identity = DocumentIdentity {
        document_hash,
        model_number,
        brand: manual.brand.clone(),
        device: args.device.clone(),
    };
    let parser = ManualParser::new(document, identity, &file_stem, oracle, store);

    let Some(toc) = parser.extract_toc().await? else {
        tracing::warn!("No TOC in {}, nothing to extract", manual.path.display());
        return Ok(0);
    };
    tracing::info!("{} ({} section(s))", toc, toc.mapping.len());

    let results = parser.extract_sections(&toc).await;
    let extracted = results.iter().filter(|r| r.is_ok()).count();
    let failed = results.len() - extracted;
    if failed > 0 {
        tracing::warn!("{} section(s) failed to extract", failed);
    }

    // Estimate which subsections cover troubleshooting; advisory only.
    if let Some(estimate) = parser.estimate_subject_sections(&toc, "troubleshooting").await {
        tracing::info!(
            "Estimated {} troubleshooting-related subsection(s)",
            estimate.len()
        );
    }

    Ok(extracted)
}
