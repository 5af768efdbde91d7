use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use repair_leads::app::LeadSourcingUseCase;
use repair_leads::config::Config;
use repair_leads::constants;
use repair_leads::domain::PipelineRequest;
use repair_leads::error::PipelineError;
use repair_leads::infra::http_client::build_client;
use repair_leads::infra::sqlite_store::SqliteRecordStore;
use repair_leads::infra::supabase_store::SupabaseRecordStore;
use repair_leads::observability::{self, metrics};
use repair_leads::pipeline::{Pipeline, Providers};
use repair_leads::server;
use repair_leads::storage::{InMemoryRecordStore, RecordStore};

#[derive(Parser)]
#[command(name = "repair_leads")]
#[command(about = "Source and enrich phone-repair business leads")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the pipeline over HTTP
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
        #[arg(long, value_enum, default_value_t = StoreKind::Memory)]
        store: StoreKind,
        /// TOML settings file; defaults apply when it does not exist
        #[arg(long, default_value = "repair_leads.toml")]
        config: PathBuf,
    },
    /// Run the pipeline once and print the JSON response
    Run {
        #[arg(long)]
        search_term: String,
        #[arg(long)]
        location: String,
        /// Skip persistence
        #[arg(long)]
        test_mode: bool,
        #[arg(long, value_enum, default_value_t = StoreKind::Memory)]
        store: StoreKind,
        /// Also write the JSON response to this file
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long, default_value = "repair_leads.toml")]
        config: PathBuf,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum StoreKind {
    Memory,
    Sqlite,
    Supabase,
}

fn open_store(kind: StoreKind, config: &Config) -> Result<Arc<dyn RecordStore>> {
    let store: Arc<dyn RecordStore> = match kind {
        StoreKind::Memory => Arc::new(InMemoryRecordStore::new()),
        StoreKind::Sqlite => {
            let path = &config.settings.store.sqlite_path;
            info!("Opening SQLite store at {}", path);
            Arc::new(SqliteRecordStore::open(path)?)
        }
        StoreKind::Supabase => {
            let url = config
                .keys
                .supabase_url
                .as_deref()
                .ok_or(PipelineError::MissingCredential(constants::SUPABASE_URL_ENV))?;
            let key = config
                .keys
                .supabase_key
                .clone()
                .ok_or(PipelineError::MissingCredential(constants::SUPABASE_KEY_ENV))?;
            let client = build_client(&config.settings.http)?;
            Arc::new(SupabaseRecordStore::new(
                client,
                url,
                key,
                config.settings.store.table.clone(),
            ))
        }
    };
    Ok(store)
}

fn build_use_case(config: &Config, store: StoreKind) -> Result<LeadSourcingUseCase> {
    let providers = Providers::from_config(config)?;
    let apis = providers.ai_apis_used();
    info!(
        serper = apis.serper,
        deepseek = apis.deepseek,
        mistral = apis.mistral,
        perplexity = apis.perplexity,
        "Configured providers"
    );
    let pipeline = Pipeline::new(providers, &config.settings.pipeline);
    Ok(LeadSourcingUseCase::new(pipeline, open_store(store, config)?))
}

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = observability::init_logging();
    metrics::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, store, config } => {
            let config = Config::load(&config)
                .with_context(|| format!("loading settings from {}", config.display()))?;
            let use_case = build_use_case(&config, store)?;
            server::start_server(Arc::new(use_case), port).await?;
        }
        Commands::Run {
            search_term,
            location,
            test_mode,
            store,
            output,
            config,
        } => {
            let config = Config::load(&config)
                .with_context(|| format!("loading settings from {}", config.display()))?;
            let use_case = build_use_case(&config, store)?;

            println!("🔄 Sourcing '{}' in '{}'...", search_term, location);
            let response = use_case
                .execute(PipelineRequest {
                    search_term,
                    location,
                    test_mode,
                })
                .await?;

            let json = serde_json::to_string_pretty(&response)?;
            println!("{}", json);
            if let Some(path) = output {
                std::fs::write(&path, &json)
                    .with_context(|| format!("writing {}", path.display()))?;
                println!("💾 Response written to {}", path.display());
            }
        }
    }

    Ok(())
}
