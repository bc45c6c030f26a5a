//! Demo server: one in-memory `posts` resource and a site settings form.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use apikit_server::cache::CacheManager;
use apikit_server::config::KitConfig;
use apikit_server::controller::{CollectionResource, ConfigForm, SimpleForm, SimpleFormRegistry};
use apikit_server::form::ValidateConfig;
use apikit_server::network::{AppState, NetworkConfig, NetworkModule};
use apikit_server::search::{FilterSpec, SortSpec};
use apikit_server::storage::{CollectionDef, MemoryDatabase, Relation};
use apikit_server::sysconfig::ConfigStore;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Plain,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "demo-server", version, about = "In-memory apikit demo server")]
struct Cli {
    /// Bind address
    #[arg(long, env = "APIKIT_HOST", default_value = "127.0.0.1")]
    host: String,
    /// Listen port (0 picks a free one)
    #[arg(long, env = "APIKIT_PORT", default_value_t = 8080)]
    port: u16,
    /// Log output format
    #[arg(long, env = "APIKIT_LOG_FORMAT", value_enum, default_value_t = LogFormat::Plain)]
    log_format: LogFormat,
    /// Request timeout in seconds
    #[arg(long, env = "APIKIT_REQUEST_TIMEOUT", default_value_t = 30)]
    request_timeout: u64,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Plain => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn build_state(kit: &KitConfig) -> anyhow::Result<AppState> {
    let db = MemoryDatabase::new();
    let posts = db.define(CollectionDef::new("posts"));
    let _users = db.define(CollectionDef::new("users"));
    db.relate("posts", "author", Relation::belongs_to("users", "user_id"));

    let rules = ValidateConfig::parse([
        ("title", "required|string|max:120"),
        ("body", "nullable|string"),
        ("status", "integer|in:0,1"),
        ("user_id", "nullable|integer"),
    ])
    .context("post rules")?;
    let filters = FilterSpec::parse([
        ("title", "like"),
        ("status", "="),
        ("created_at", "between"),
        ("author.name", "like"),
    ])
    .context("post filters")?;
    let posts = CollectionResource::new(posts, Arc::new(db.clone()))
        .configured(kit)
        .with_rules(rules)
        .with_inline(["status"])
        .with_filters(filters)
        .with_sorts(SortSpec::new().fields(["id", "title", "created_at"]));

    let table = db.define(ConfigStore::collection_def(&kit.sys_config));
    let config = Arc::new(ConfigStore::new(
        table,
        &CacheManager::local(),
        kit.sys_config.clone(),
    ));
    let site_rules = ValidateConfig::parse([
        ("site_name", "required|string|max:60"),
        ("page_size", "integer|min:1|max:1000"),
    ])
    .context("site form rules")?;
    let forms = SimpleFormRegistry::new(Arc::new(db)).register("settings", "site", move || {
        Box::new(ConfigForm::new(Arc::clone(&config), site_rules.clone())) as Box<dyn SimpleForm>
    });

    Ok(AppState::new(Arc::new(posts), forms))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
    }
    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let kit = KitConfig::default();
    let network = NetworkConfig {
        host: cli.host,
        port: cli.port,
        request_timeout: Duration::from_secs(cli.request_timeout),
        ..NetworkConfig::default()
    };
    let prefix = network.resource_prefix.clone();

    let mut module = NetworkModule::new(network, build_state(&kit)?);
    let port = module.start().await?;
    tracing::info!(port, resource = %prefix, "demo server listening");
    module.serve(shutdown_signal()).await
}
