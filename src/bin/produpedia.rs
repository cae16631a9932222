//! Produpedia CLI: catalog enrichment and product search.
//!
//! Usage:
//!   produpedia ingest <stubs.jsonl> [--endpoint url] [--batch-size n] [--workers n]
//!   produpedia search --type city [--shown a,b] [--sort a:-1] [--filter a:gt:5] [--count 8]
//!   produpedia registry import <registry.json>
//!   produpedia registry list
//!
//! Global options: `--db path`, `--config settings.yaml`.

use clap::{Parser, Subcommand};
use produpedia::{
    import_registry, CancellationToken, CatalogApi, EnrichmentPipeline, OpenStore, ProductStore, RawQuery,
    RegistryDocument, Settings, SparqlEndpoint, SqliteStore,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Exit code for a run that aborted part-way
const EXIT_ABORTED: i32 = 2;

#[derive(Parser)]
#[command(name = "produpedia", version, about = "Product catalog with knowledge-graph enrichment")]
struct Cli {
    /// Path to SQLite database file
    #[arg(long, global = true, env = "PRODUPEDIA_DB")]
    db: Option<PathBuf>,
    /// Path to YAML settings file
    #[arg(long, global = true, env = "PRODUPEDIA_CONFIG")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the product collection from a stub stream
    Ingest {
        /// Line-delimited JSON stubs
        stubs: PathBuf,
        /// SPARQL endpoint URL
        #[arg(long)]
        endpoint: Option<String>,
        /// Stubs per knowledge-service query
        #[arg(long)]
        batch_size: Option<usize>,
        /// Batches queried concurrently
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Search products of one type
    Search {
        /// Category to search
        #[arg(long = "type", short = 't')]
        category: String,
        /// Comma-separated attribute ids to show
        #[arg(long, default_value = "")]
        shown: String,
        /// Comma-separated id:direction sort keys (1 or -1)
        #[arg(long, default_value = "")]
        sort: String,
        /// Comma-separated id:condition:value filters
        #[arg(long, default_value = "")]
        filter: String,
        /// Desired number of columns
        #[arg(long, default_value = "")]
        count: String,
    },
    /// Manage attribute and category definitions
    Registry {
        #[command(subcommand)]
        action: RegistryAction,
    },
}

#[derive(Subcommand)]
enum RegistryAction {
    /// Import definitions from a JSON document {attributes: [...], categories: [...]}
    Import {
        /// Path to the registry document
        file: PathBuf,
    },
    /// List attribute definitions
    List,
}

/// Get the default database path (~/.local/share/produpedia/catalog.db)
fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir().unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    let app_dir = data_dir.join("produpedia");
    std::fs::create_dir_all(&app_dir).ok();
    app_dir.join("catalog.db")
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_settings(path: Option<&Path>) -> Result<Settings, String> {
    match path {
        Some(path) => Settings::load(path).map_err(|e| e.to_string()),
        None => Ok(Settings::default()),
    }
}

fn open_store(db: Option<PathBuf>, settings: &Settings) -> Result<Arc<SqliteStore>, String> {
    let path = db.or_else(|| settings.database.clone()).unwrap_or_else(default_db_path);
    let store = SqliteStore::open(&path).map_err(|e| format!("Failed to open database {}: {}", path.display(), e))?;
    Ok(Arc::new(store))
}

async fn cmd_ingest(
    store: Arc<SqliteStore>,
    mut settings: Settings,
    stubs: &Path,
    endpoint: Option<String>,
    batch_size: Option<usize>,
    workers: Option<usize>,
) -> i32 {
    if let Some(endpoint) = endpoint {
        settings.sparql.endpoint = endpoint;
    }
    if let Some(batch_size) = batch_size {
        settings.pipeline.batch_size = batch_size;
    }
    if let Some(workers) = workers {
        settings.pipeline.workers = workers;
    }
    if let Err(e) = settings.validate() {
        eprintln!("Error: {}", e);
        return 1;
    }

    let registry = match store.load_registry() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: failed to load registry: {}", e);
            return 1;
        }
    };
    if registry.attribute_count() == 0 {
        warn!("registry has no attributes; every admitted predicate will abort the run");
    }

    let resource_base = settings.sparql.resource_base.clone();
    let source = match SparqlEndpoint::new(settings.sparql) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let file = match tokio::fs::File::open(stubs).await {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error: cannot open '{}': {}", stubs.display(), e);
            return 1;
        }
    };

    let token = CancellationToken::new();
    let on_signal = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current line");
            on_signal.cancel();
        }
    });

    let pipeline = EnrichmentPipeline::new(store, Arc::new(source), Arc::new(registry))
        .with_config(settings.pipeline)
        .with_resource_base(resource_base)
        .with_cancellation(token);

    match pipeline.run(BufReader::new(file)).await {
        Ok(report) => {
            println!(
                "Persisted {} products from {} lines ({} malformed, {} without label, {} warnings)",
                report.products_persisted,
                report.lines_read,
                report.malformed_lines,
                report.dropped_without_label,
                report.warnings
            );
            0
        }
        Err(aborted) => {
            eprintln!("Error: {}", aborted.error);
            eprintln!("Last committed line: {}", aborted.last_committed_line);
            EXIT_ABORTED
        }
    }
}

fn cmd_search(store: Arc<SqliteStore>, raw: RawQuery) -> i32 {
    let api = match CatalogApi::from_store(store) {
        Ok(api) => api,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    match api.search(&raw) {
        Ok(response) => match serde_json::to_string_pretty(&response) {
            Ok(json) => {
                println!("{}", json);
                0
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        },
        Err(e) if e.is_client_error() => {
            eprintln!("Bad request: {}", e);
            1
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_registry_import(store: &dyn ProductStore, file: &Path) -> i32 {
    let text = match std::fs::read_to_string(file) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Error: cannot read '{}': {}", file.display(), e);
            return 1;
        }
    };
    let document: RegistryDocument = match serde_json::from_str(&text) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: invalid registry document: {}", e);
            return 1;
        }
    };
    match import_registry(store, &document) {
        Ok((attributes, categories)) => {
            println!("Imported {} attributes and {} categories", attributes, categories);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_registry_list(store: &dyn ProductStore) -> i32 {
    let registry = match store.load_registry() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if registry.attribute_count() == 0 {
        println!("No attributes defined.");
        return 0;
    }
    println!("{:<24}  {:<28}  {:<9}  {:<16}  {:>8}", "ID", "NAME", "TYPE", "CATEGORY", "INTEREST");
    println!("{}", "-".repeat(93));
    for attr in registry.attributes() {
        println!(
            "{:<24}  {:<28}  {:<9}  {:<16}  {:>8}",
            attr.id.as_str(),
            attr.name,
            attr.value_type.as_str(),
            attr.category,
            attr.interest
        );
    }
    0
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing();

    let settings = match load_settings(cli.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let store = match open_store(cli.db, &settings) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    info!(version = produpedia::VERSION, "produpedia starting");

    let code = match cli.command {
        Commands::Ingest {
            stubs,
            endpoint,
            batch_size,
            workers,
        } => cmd_ingest(store, settings, &stubs, endpoint, batch_size, workers).await,
        Commands::Search {
            category,
            shown,
            sort,
            filter,
            count,
        } => cmd_search(
            store,
            RawQuery {
                category,
                shown,
                sorters: sort,
                filters: filter,
                count,
            },
        ),
        Commands::Registry { action } => match action {
            RegistryAction::Import { file } => cmd_registry_import(store.as_ref(), &file),
            RegistryAction::List => cmd_registry_list(store.as_ref()),
        },
    };
    std::process::exit(code);
}
