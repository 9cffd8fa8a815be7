//! Mortgage Router - Main Entry Point

use clap::{Parser, Subcommand};
use mortgage_router::agent::pipeline::LlmSummarizer;
use mortgage_router::agent::{
    CapabilityRegistry, PipelineEngine, ResultAggregator, RouteLabel, WorkerClient,
};
use mortgage_router::config::RouterConfig;
use mortgage_router::llm::create_provider;
use mortgage_router::observability::init_default_logging;
use mortgage_router::report::MarkdownReportRenderer;
use mortgage_router::routing::Classifier;
use mortgage_router::server::{router_card, spawn_refresh, RouterServer};
use mortgage_router::workers::{FsDocumentLoader, LocalFallbackExecutor};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Multi-agent router for mortgage application analysis
#[derive(Parser)]
#[command(name = "mortgage-router")]
#[command(about = "Routes mortgage requests to document, credit risk and compliance agents")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "ROUTER_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover workers and serve the router over HTTP
    Serve,
    /// Run one task through the pipeline and print the final result
    Process {
        /// Task text
        text: String,
        /// Skip classification and use this route label
        #[arg(long, value_name = "LABEL")]
        route: Option<String>,
    },
    /// Probe the configured endpoints and print what answered
    Discover,
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging(cli.verbose);

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Serve => serve(config).await,
        Commands::Process { text, route } => process_task(config, &text, route.as_deref()).await,
        Commands::Discover => discover(config).await,
        Commands::Config { show } => handle_config_command(config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

fn load_configuration(
    config_path: &Option<PathBuf>,
) -> Result<RouterConfig, Box<dyn std::error::Error>> {
    if let Some(path) = config_path {
        info!("Loading configuration from: {}", path.display());
        return Ok(RouterConfig::load_from_file(path)?);
    }

    for path_str in ["router.toml", "config/router.toml"] {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            return Ok(RouterConfig::load_from_file(&path)?);
        }
    }

    Err("No configuration file found. Provide one with -c/--config or create router.toml".into())
}

fn build_registry(config: &RouterConfig, http: reqwest::Client) -> Arc<CapabilityRegistry> {
    Arc::new(CapabilityRegistry::new(
        config.discovery.endpoints.clone(),
        http,
        config.probe_timeout(),
        config.discovery.card_path.clone(),
    ))
}

/// Wire the engine from configuration and run initial discovery
async fn build_engine(config: &RouterConfig) -> Result<PipelineEngine, Box<dyn std::error::Error>> {
    let api_key = config.get_llm_api_key()?;
    let provider = create_provider(&config.llm, api_key, config.worker_timeout())?;
    if let Err(e) = provider.health_check().await {
        warn!(provider = provider.name(), error = %e, "LLM provider health check failed");
    }
    let http = reqwest::Client::builder().build()?;

    let registry = build_registry(config, http.clone());
    let snapshot = registry.refresh().await;
    info!(
        registered_agents = snapshot.len(),
        agents = ?snapshot.names(),
        "Initial discovery complete"
    );

    let classifier = Classifier::new(provider.clone(), config.llm.model.clone())
        .with_temperature(config.llm.temperature);
    let summarizer = LlmSummarizer::new(provider, config.llm.model.clone())
        .with_temperature(config.llm.temperature)
        .with_max_tokens(config.llm.max_tokens);

    let mut aggregator = ResultAggregator::new().with_summarizer(Arc::new(summarizer));
    if config.report.enabled {
        aggregator = aggregator.with_renderer(Arc::new(MarkdownReportRenderer::new(
            config.report.output_dir.clone(),
        )));
    }

    let loader = match &config.worker.documents_dir {
        Some(dir) => FsDocumentLoader::with_base_dir(dir),
        None => FsDocumentLoader::new(),
    };

    Ok(PipelineEngine::new(
        registry,
        WorkerClient::new(http, config.worker_timeout()),
        LocalFallbackExecutor::new(Arc::new(loader)),
        classifier,
        aggregator,
    ))
}

async fn serve(config: RouterConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        "Starting {} v{} on {}:{}",
        config.router.name,
        env!("CARGO_PKG_VERSION"),
        config.router.host,
        config.router.port
    );

    let addr: SocketAddr = format!("{}:{}", config.router.host, config.router.port).parse()?;
    let engine = Arc::new(build_engine(&config).await?);

    let refresher = config
        .discovery
        .refresh_interval_secs
        .map(|secs| spawn_refresh(engine.registry().clone(), Duration::from_secs(secs)));

    let server = Arc::new(RouterServer::new(
        engine,
        router_card(&config),
        &config.discovery.card_path,
    ));
    let result = server.run(addr).await;

    if let Some(handle) = refresher {
        handle.abort();
    }
    result?;

    info!("Application shutdown complete");
    Ok(())
}

async fn process_task(
    config: RouterConfig,
    text: &str,
    route: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let route = match route {
        Some(label) => Some(
            RouteLabel::from_label(label)
                .ok_or_else(|| format!("Unknown route label '{label}'"))?,
        ),
        None => None,
    };

    let engine = build_engine(&config).await?;
    let state = engine.run(text, route).await;

    println!("{}", serde_json::to_string_pretty(&state.final_result)?);
    Ok(())
}

async fn discover(config: RouterConfig) -> Result<(), Box<dyn std::error::Error>> {
    let registry = build_registry(&config, reqwest::Client::builder().build()?);
    let snapshot = registry.refresh().await;

    let descriptors: Vec<_> = snapshot.descriptors().collect();
    println!("{}", serde_json::to_string_pretty(&descriptors)?);
    Ok(())
}

fn handle_config_command(config: RouterConfig, show: bool) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(&config)?);
    }

    info!("Configuration validation complete");
    Ok(())
}
