//! Microblog server
//!
//! Serves the custom domain API and keeps the reverse proxy in sync with the
//! configured custom domain.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use microblog_api::{ApiServer, ApiServerConfig};
use microblog_domain::{
    enable_instance_hostname, spawn_revalidation, spawn_startup_sync, DomainConfig,
    DomainManager, HickoryDnsLookup, SeaOrmDomainStore,
};
use microblog_proxy::{CaddyAdminClient, CaddyAdminConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::prelude::*;

/// Microblog - self-hosted micro-blogging with custom domain support
#[derive(Parser, Debug)]
#[command(name = "microblog")]
#[command(about = "Microblog - self-hosted micro-blogging with custom domain support")]
#[command(version = env!("GIT_TAG"))]
#[command(long_version = concat!(env!("GIT_TAG"), "\nCommit: ", env!("GIT_HASH"), "\nBuilt: ", env!("BUILD_TIME")))]
struct Cli {
    /// Address the HTTP server binds to
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
    bind_addr: SocketAddr,

    /// Database URL (sqlite:// or postgres://)
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite://./microblog.db?mode=rwc",
        global = true
    )]
    database_url: String,

    /// Bearer token protecting the admin API
    #[arg(long, env = "ADMIN_TOKEN", hide_env_values = true)]
    admin_token: Option<String>,

    /// Reverse proxy admin API base URL
    #[arg(long, env = "PROXY_API_URL", default_value = "http://caddy:2019")]
    proxy_api_url: String,

    /// Address the reverse proxy forwards custom domain traffic to
    #[arg(long, env = "UPSTREAM_DIAL", default_value = "blog:8080")]
    upstream_dial: String,

    /// Parent domain of managed instances (repeatable)
    #[arg(
        long = "managed-domain",
        env = "MANAGED_DOMAINS",
        value_delimiter = ',',
        default_value = "microblog.host",
        global = true
    )]
    managed_domains: Vec<String>,

    /// Brand used in the verification TXT record name
    #[arg(long, env = "BRAND", default_value = "microblog")]
    brand: String,

    /// Seconds between DNS re-checks of the active custom domain
    #[arg(long, env = "REVALIDATE_INTERVAL_SECS", default_value = "604800")]
    revalidate_interval_secs: u64,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Set the instance hostname custom domains point to, then exit
    EnableCustomDomain {
        /// Hostname of this instance, e.g. alice.microblog.host
        hostname: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    if let Some(Commands::EnableCustomDomain { hostname }) = &cli.command {
        return enable_custom_domain(&cli.database_url, &cli.managed_domains, hostname).await;
    }

    serve(cli).await
}

fn init_logging(log_level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(log_level))
        .context("Failed to initialize logging filter")?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

async fn open_store(database_url: &str) -> Result<SeaOrmDomainStore> {
    info!("Connecting to database");
    let db = microblog_db::connect(database_url)
        .await
        .context("Failed to connect to database")?;
    microblog_db::migrate(&db)
        .await
        .context("Failed to run database migrations")?;
    Ok(SeaOrmDomainStore::new(db))
}

/// Set the instance hostname without going through the HTTP API
///
/// Refuses to replace an existing hostname.
async fn enable_custom_domain(
    database_url: &str,
    managed_domains: &[String],
    hostname: &str,
) -> Result<()> {
    let store = open_store(database_url).await?;
    let hostname = enable_instance_hostname(&store, managed_domains, hostname)
        .await
        .context("Failed to enable custom domains")?;

    println!("Custom domains enabled for: {}", hostname);
    Ok(())
}

async fn serve(cli: Cli) -> Result<()> {
    let admin_token = cli
        .admin_token
        .filter(|token| !token.trim().is_empty())
        .context("An admin token is required (--admin-token or ADMIN_TOKEN)")?;

    info!("Microblog {} ({}) starting...", env!("GIT_TAG"), env!("GIT_HASH"));

    let store = Arc::new(open_store(&cli.database_url).await?);

    let proxy = Arc::new(CaddyAdminClient::new(CaddyAdminConfig {
        api_url: cli.proxy_api_url.clone(),
        upstream_dial: cli.upstream_dial.clone(),
        ..CaddyAdminConfig::default()
    }));
    info!("Reverse proxy admin API: {}", cli.proxy_api_url);

    let domain_config = DomainConfig {
        brand: cli.brand,
        managed_domains: cli.managed_domains,
        revalidation_interval: Duration::from_secs(cli.revalidate_interval_secs),
        ..DomainConfig::default()
    };
    let revalidation_interval = domain_config.revalidation_interval;

    let manager = Arc::new(DomainManager::new(
        domain_config,
        store,
        Arc::new(HickoryDnsLookup::from_system_conf()),
        proxy,
    ));

    let sync_handle = spawn_startup_sync(manager.clone());
    let revalidation_handle = spawn_revalidation(manager.clone(), revalidation_interval);
    info!(
        "Custom domain re-validation every {}s",
        revalidation_interval.as_secs()
    );

    let server = ApiServer::new(
        ApiServerConfig {
            bind_addr: cli.bind_addr,
            admin_token,
        },
        manager,
    );
    let server_task = tokio::spawn(server.start());

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        result = server_task => {
            match result {
                Ok(Ok(())) => info!("API server stopped"),
                Ok(Err(e)) => {
                    error!("API server error: {:#}", e);
                    return Err(e);
                }
                Err(e) => {
                    error!("API server task panicked: {}", e);
                    return Err(e.into());
                }
            }
        }
    }

    sync_handle.abort();
    revalidation_handle.abort();

    info!("Microblog stopped");
    Ok(())
}
