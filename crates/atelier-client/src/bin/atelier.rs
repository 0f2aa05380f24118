//! atelier command-line client.
//!
//! Usage:
//!   atelier schemas
//!   atelier schema works
//!   atelier fetch works acme-rebrand
//!   atelier validate works ./acme.json
//!   atelier upload ./cover.png
//!   atelier save works acme-rebrand ./acme.json
//!
//! Environment: `ATELIER_API_URL`, `ATELIER_API_TOKEN`, `ATELIER_TIMEOUT_SECS`,
//! `ATELIER_UPLOAD_MAX_BYTES`, `LOG_FORMAT` (`text`/`json`), `RUST_LOG`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atelier_client::{ClientConfig, HttpBackend};
use atelier_core::{
    validate_media_file, ContentRecord, DocumentRef, EntitySource, MediaFile, PersistenceAdapter,
    SchemaCatalog, SchemaRegistry,
};
use atelier_editor::{extract_location, validate, EditSession, SessionConfig};

#[derive(Debug, Parser)]
#[command(name = "atelier", version, about = "Edit structured site content from the terminal")]
struct Cli {
    /// Extra schema files (YAML) to register next to the built-in ones.
    #[arg(long = "schemas", value_name = "FILE", global = true)]
    schema_files: Vec<PathBuf>,

    /// Content API base URL (overrides ATELIER_API_URL).
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List known document types.
    Schemas,
    /// Print one schema as JSON.
    Schema { doc_type: String },
    /// Load a document and print its fields with resolved values.
    Fetch { doc_type: String, id: String },
    /// Check a JSON record file against a schema.
    Validate { doc_type: String, file: PathBuf },
    /// Upload a media file and print its stored location.
    Upload { file: PathBuf },
    /// Validate a JSON record file and save it as a document.
    Save {
        doc_type: String,
        id: String,
        file: PathBuf,
    },
}

fn init_logging() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "atelier=info,atelier_editor=info,atelier_client=info".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    // stdout carries command output; logs go to stderr.
    if log_format == "json" {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn load_catalog(files: &[PathBuf]) -> anyhow::Result<SchemaCatalog> {
    let mut catalog = SchemaCatalog::builtin();
    for file in files {
        let names = catalog
            .load_file(file)
            .with_context(|| format!("loading schemas from {}", file.display()))?;
        info!(file = %file.display(), schemas = ?names, "Schemas registered");
    }
    Ok(catalog)
}

fn backend(api_url: Option<String>) -> anyhow::Result<Arc<HttpBackend>> {
    let mut config = ClientConfig::from_env();
    if let Some(url) = api_url {
        config.base_url = url;
    }
    Ok(Arc::new(HttpBackend::new(config)?))
}

fn read_record(path: &Path) -> anyhow::Result<ContentRecord> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    Ok(ContentRecord::from_value(value)?)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn check_record(catalog: &SchemaCatalog, doc_type: &str, record: &ContentRecord) -> anyhow::Result<()> {
    let schema = catalog.get_schema(doc_type)?;
    let errors = validate(&schema, record);
    if !errors.is_empty() {
        for error in &errors {
            eprintln!("  {}: {}", error.key, error.message);
        }
        bail!("{} field(s) need attention", errors.len());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    let catalog = load_catalog(&cli.schema_files)?;

    match cli.command {
        Command::Schemas => {
            for name in catalog.document_types() {
                println!("{}", name);
            }
        }
        Command::Schema { doc_type } => {
            let schema = catalog.get_schema(&doc_type)?;
            print_json(&*schema)?;
        }
        Command::Fetch { doc_type, id } => {
            let backend = backend(cli.api_url)?;
            let session = EditSession::open(
                &catalog,
                backend.clone(),
                Some(&*backend as &dyn EntitySource),
                DocumentRef::new(doc_type, id),
                SessionConfig::from_env(),
            )
            .await?;
            if let Some(outcome) = session.load_outcome() {
                eprintln!("load: {}", outcome);
                if let Some(message) = outcome.message() {
                    eprintln!("  {}", message);
                }
            }
            print_json(&session.fields())?;
        }
        Command::Validate { doc_type, file } => {
            let record = read_record(&file)?;
            check_record(&catalog, &doc_type, &record)?;
            println!("ok");
        }
        Command::Upload { file } => {
            let bytes = std::fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
            let filename = file
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("upload")
                .to_string();
            let media = MediaFile::new(filename, bytes);
            let check = validate_media_file(&media, SessionConfig::from_env().max_upload_bytes);
            if !check.allowed {
                bail!(check.block_reason.unwrap_or_else(|| "file rejected".to_string()));
            }
            let response = backend(cli.api_url)?.upload_media(media).await?;
            match extract_location(&response) {
                Some(location) => println!("{}", location),
                None => bail!(atelier_core::defaults::UPLOAD_NO_LOCATION_MESSAGE),
            }
        }
        Command::Save { doc_type, id, file } => {
            let record = read_record(&file)?;
            check_record(&catalog, &doc_type, &record)?;
            let doc = DocumentRef::new(doc_type, id);
            backend(cli.api_url)?.save_document(&doc, &record).await?;
            println!("saved {}", doc);
        }
    }

    Ok(())
}
