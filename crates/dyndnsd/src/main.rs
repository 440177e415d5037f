// # dyndnsd - Dynamic DNS Daemon
//
// Thin integration layer: reads configuration from the environment, builds
// the store and the core services, and runs the HTTP API and the DNS
// responder until a shutdown signal arrives. Record semantics live in
// dyndns-core.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Listeners
// - `DYNDNS_HTTP_LISTEN`: HTTP API address (default `0.0.0.0:8080`)
// - `DYNDNS_DNS_LISTEN`: DNS UDP address (default `0.0.0.0:5353`)
//
// ### Record Store
// - `DYNDNS_STORE_TYPE`: Type of record store (file, memory)
// - `DYNDNS_STORE_PATH`: Path to the store file (for file store)
// - `DYNDNS_STORE_TIMEOUT_MS`: Budget for one store operation
// - `DYNDNS_LOOKUP_TIMEOUT_MS`: Budget for one responder lookup
//
// ### App Record
// - `DYNDNS_APP_RECORD_NAME`: Name the responder serves (`*` for any)
// - `DYNDNS_APP_RECORD_TTL`: TTL of authoritative answers
// - `DYNDNS_APP_RECORD_DATA`: JSON, e.g. `{"allowedNetworks":["10.0.0.0/8"]}`
// - `DYNDNS_CACHE_TTL_SECS`: TTL of entries pushed into the answer cache
//
// ### Plans
// - `DYNDNS_DEFAULT_PLAN`: Plan of owners with no explicit tier (free, basic, pro)
// - `DYNDNS_FREE_TIER_ENABLED`: Whether the free plan may create records
//
// ## Example
//
// ```bash
// export DYNDNS_STORE_TYPE=file
// export DYNDNS_STORE_PATH=/var/lib/dyndns/records.json
// export DYNDNS_APP_RECORD_NAME='*.dyn.example.com'
// export DYNDNS_LOG_LEVEL=debug
//
// dyndnsd
// ```

use anyhow::{Context, Result};
use dyndns_core::config::{AppRecord, AppRecordData, StoreConfig};
use dyndns_core::entitlement::{PlanTier, StaticAccountDirectory};
use dyndns_core::{
    QueryResponder, RecordService, RecordStore, ServiceConfig, StoreRegistry, UpdateResolver,
};
use dyndns_dns::{AnswerCache, DnsServer};
use dyndns_http::AppState;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::oneshot;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// How often expired answer cache entries are dropped
const CACHE_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DyndnsExitCode {
    CleanShutdown = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<DyndnsExitCode> for ExitCode {
    fn from(code: DyndnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Daemon configuration
struct Config {
    service: ServiceConfig,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut service = ServiceConfig::new();

        if let Some(listen) = lookup("DYNDNS_HTTP_LISTEN") {
            service.http.listen = listen;
        }
        if let Some(listen) = lookup("DYNDNS_DNS_LISTEN") {
            service.dns.listen = listen;
        }

        let store_type = lookup("DYNDNS_STORE_TYPE").unwrap_or_else(|| "file".to_string());
        service.store = match store_type.as_str() {
            "file" => StoreConfig::File {
                path: lookup("DYNDNS_STORE_PATH").unwrap_or_else(|| "dynamicdns.json".to_string()),
            },
            "memory" => StoreConfig::Memory,
            other => anyhow::bail!(
                "DYNDNS_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                other
            ),
        };

        if let Some(ms) = parse_var(&lookup, "DYNDNS_STORE_TIMEOUT_MS")? {
            service.update.store_timeout_ms = ms;
        }
        if let Some(ms) = parse_var(&lookup, "DYNDNS_LOOKUP_TIMEOUT_MS")? {
            service.update.lookup_timeout_ms = ms;
        }
        if let Some(secs) = parse_var(&lookup, "DYNDNS_CACHE_TTL_SECS")? {
            service.update.cache_ttl_secs = secs;
        }

        let mut app_record = AppRecord::default();
        if let Some(name) = lookup("DYNDNS_APP_RECORD_NAME") {
            app_record.name = name;
        }
        if let Some(ttl) = parse_var(&lookup, "DYNDNS_APP_RECORD_TTL")? {
            app_record.ttl = ttl;
        }
        if let Some(raw) = lookup("DYNDNS_APP_RECORD_DATA") {
            app_record.data = AppRecordData::parse(&raw);
        }
        service.app_record = app_record;

        if let Some(plan) = lookup("DYNDNS_DEFAULT_PLAN") {
            service.http.default_plan = plan
                .parse::<PlanTier>()
                .with_context(|| "DYNDNS_DEFAULT_PLAN must be one of: free, basic, pro")?;
        }
        if let Some(enabled) = parse_var(&lookup, "DYNDNS_FREE_TIER_ENABLED")? {
            service.plans.free_tier_enabled = enabled;
        }

        Ok(Self {
            service,
            log_level: lookup("DYNDNS_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        self.service.validate()?;

        let store_timeout = self.service.update.store_timeout_ms;
        if !(10..=60_000).contains(&store_timeout) {
            anyhow::bail!(
                "DYNDNS_STORE_TIMEOUT_MS must be between 10 and 60000. Got: {}",
                store_timeout
            );
        }

        // Parent directory must exist for the file store
        if let StoreConfig::File { path } = &self.service.store
            && let Some(parent) = std::path::Path::new(path).parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            anyhow::bail!(
                "DYNDNS_STORE_PATH parent directory does not exist: {}. \
                Create it first: mkdir -p {}",
                parent.display(),
                parent.display()
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "DYNDNS_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }
}

/// Parse an optional variable, failing on a value that does not parse
fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", key, raw, e)),
        None => Ok(None),
    }
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DyndnsExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return DyndnsExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DyndnsExitCode::ConfigError.into();
    }

    info!("Starting dyndnsd daemon");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DyndnsExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        match run_daemon(config.service).await {
            Ok(()) => DyndnsExitCode::CleanShutdown,
            Err(DaemonError::Startup(e)) => {
                error!("Startup failed: {:#}", e);
                DyndnsExitCode::ConfigError
            }
            Err(DaemonError::Runtime(e)) => {
                error!("Daemon error: {:#}", e);
                DyndnsExitCode::RuntimeError
            }
        }
    })
    .into()
}

/// Failure phase, mapped onto the exit code
enum DaemonError {
    Startup(anyhow::Error),
    Runtime(anyhow::Error),
}

/// Run the daemon
async fn run_daemon(config: ServiceConfig) -> std::result::Result<(), DaemonError> {
    let registry = StoreRegistry::with_builtin();
    info!("Record store type: {}", config.store.type_name());

    let store = registry
        .create_store(&config.store)
        .await
        .context("Failed to open record store")
        .map_err(DaemonError::Startup)?;

    let http_listener = TcpListener::bind(&config.http.listen)
        .await
        .with_context(|| format!("Failed to bind HTTP listener on {}", config.http.listen))
        .map_err(DaemonError::Startup)?;
    let dns_socket = UdpSocket::bind(&config.dns.listen)
        .await
        .with_context(|| format!("Failed to bind DNS socket on {}", config.dns.listen))
        .map_err(DaemonError::Startup)?;

    let answer_cache = Arc::new(AnswerCache::new());
    let resolver = UpdateResolver::new(store.clone(), answer_cache.clone(), &config.update);
    let service = RecordService::new(store.clone(), &config.update);
    let responder = QueryResponder::new(store.clone(), config.update.lookup_timeout());
    let accounts = Arc::new(StaticAccountDirectory::new(
        config.plans.clone(),
        config.http.default_plan,
    ));

    info!(
        name = %config.app_record.name,
        ttl = config.app_record.ttl,
        "App record registered"
    );

    let state = AppState::new(resolver, service, accounts);
    let dns_server = Arc::new(DnsServer::new(
        responder,
        answer_cache.clone(),
        config.app_record.clone(),
    ));

    let (http_tx, http_rx) = oneshot::channel();
    let (dns_tx, dns_rx) = oneshot::channel();

    let mut http_task = tokio::spawn(dyndns_http::serve(http_listener, state, http_rx));
    let mut dns_task = tokio::spawn(dns_server.run_with_shutdown(Arc::new(dns_socket), dns_rx));
    let purge_task = tokio::spawn(purge_cache_periodically(answer_cache));

    info!("Daemon initialized successfully");

    let mut failure = None;
    tokio::select! {
        signal = wait_for_shutdown() => match signal {
            Ok(signal) => info!("Received shutdown signal: {}", signal),
            Err(e) => failure = Some(e),
        },
        result = &mut http_task => {
            failure = Some(task_failure("HTTP server", result));
        }
        result = &mut dns_task => {
            failure = Some(task_failure("DNS server", result));
        }
    }

    info!("Shutting down daemon");
    let _ = http_tx.send(());
    let _ = dns_tx.send(());
    purge_task.abort();

    if !http_task.is_finished()
        && let Err(e) = http_task.await
    {
        warn!("HTTP server task ended abnormally: {}", e);
    }
    if !dns_task.is_finished()
        && let Err(e) = dns_task.await
    {
        warn!("DNS server task ended abnormally: {}", e);
    }

    flush_store(store.as_ref()).await;

    match failure {
        Some(e) => Err(DaemonError::Runtime(e)),
        None => Ok(()),
    }
}

/// Describe why a server task stopped before shutdown was requested
fn task_failure(
    name: &str,
    result: std::result::Result<std::result::Result<(), dyndns_core::Error>, tokio::task::JoinError>,
) -> anyhow::Error {
    match result {
        Ok(Ok(())) => anyhow::anyhow!("{} stopped unexpectedly", name),
        Ok(Err(e)) => anyhow::Error::new(e).context(format!("{} failed", name)),
        Err(e) => anyhow::Error::new(e).context(format!("{} task panicked", name)),
    }
}

async fn purge_cache_periodically(cache: Arc<AnswerCache>) {
    let mut ticker = tokio::time::interval(CACHE_PURGE_INTERVAL);
    loop {
        ticker.tick().await;
        let purged = cache.purge_expired().await;
        if purged > 0 {
            debug!("Purged {} expired cache entries", purged);
        }
    }
}

async fn flush_store(store: &dyn RecordStore) {
    match store.flush().await {
        Ok(()) => info!("Record store flushed"),
        Err(e) => error!("Failed to flush record store: {}", e),
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for CTRL-C")?;
    Ok("SIGINT")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.service.http.listen, "0.0.0.0:8080");
        assert_eq!(config.service.dns.listen, "0.0.0.0:5353");
        assert_eq!(config.service.app_record.name, "*");
        assert_eq!(config.log_level, "info");
        assert!(matches!(
            config.service.store,
            StoreConfig::File { ref path } if path == "dynamicdns.json"
        ));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("DYNDNS_STORE_TYPE", "memory"),
            ("DYNDNS_STORE_TIMEOUT_MS", "500"),
            ("DYNDNS_APP_RECORD_NAME", "*.dyn.example.com"),
            ("DYNDNS_APP_RECORD_TTL", "30"),
            ("DYNDNS_APP_RECORD_DATA", r#"{"allowedNetworks":["10.0.0.0/8"]}"#),
            ("DYNDNS_DEFAULT_PLAN", "pro"),
            ("DYNDNS_FREE_TIER_ENABLED", "false"),
        ])
        .unwrap();

        assert!(config.validate().is_ok());
        assert!(matches!(config.service.store, StoreConfig::Memory));
        assert_eq!(config.service.update.store_timeout_ms, 500);
        assert_eq!(config.service.app_record.ttl, 30);
        assert_eq!(
            config.service.app_record.data.allowed_networks,
            vec!["10.0.0.0/8".to_string()]
        );
        assert_eq!(config.service.http.default_plan, PlanTier::Pro);
        assert!(!config.service.plans.free_tier_enabled);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(config_from(&[("DYNDNS_STORE_TYPE", "redis")]).is_err());
        assert!(config_from(&[("DYNDNS_STORE_TIMEOUT_MS", "soon")]).is_err());
        assert!(config_from(&[("DYNDNS_DEFAULT_PLAN", "gold")]).is_err());

        let too_short = config_from(&[("DYNDNS_STORE_TIMEOUT_MS", "5")]).unwrap();
        assert!(too_short.validate().is_err());

        let bad_level = config_from(&[("DYNDNS_LOG_LEVEL", "loud")]).unwrap();
        assert!(bad_level.validate().is_err());

        let missing_dir =
            config_from(&[("DYNDNS_STORE_PATH", "/nonexistent-dir/records.json")]).unwrap();
        assert!(missing_dir.validate().is_err());
    }
}
