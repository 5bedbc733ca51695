// # dnssyncd - DNS Sync Daemon
//
// Thin integration layer: parses flags, installs logging, builds the
// Protos, Namecheap and resolver clients and hands them to
// `dnssync_core::SyncEngine`. All reconciliation logic lives in
// dnssync-core.
//
// ## Configuration
//
// Every flag can also be set through its environment variable.
//
// ### Required
// - `--username` / `DNSSYNC_USERNAME`: Namecheap account
// - `--apiuser` / `DNSSYNC_APIUSER`: Namecheap API user
// - `--token` / `DNSSYNC_TOKEN`: Namecheap API key
// - `--domain` / `DNSSYNC_DOMAIN`: Managed domain
// - `--appid` / `DNSSYNC_APPID`: Protos application id
//
// ### Optional
// - `--interval` / `DNSSYNC_INTERVAL`: Seconds between cycles (default 30)
// - `--loglevel` / `DNSSYNC_LOGLEVEL`: trace, debug, info, warn, error (default info)
// - `--protosurl` / `DNSSYNC_PROTOSURL`: Protos API (default http://protos:8080/)
// - `--client-ip` / `DNSSYNC_CLIENT_IP`: Whitelisted Namecheap client IP
// - `--resolver` / `DNSSYNC_RESOLVER`: Verification upstream (default 8.8.8.8:53)
// - `--verify-max-attempts` / `DNSSYNC_VERIFY_MAX_ATTEMPTS`: Bound on failed checks
// - `--verify-delay` / `DNSSYNC_VERIFY_DELAY`: Seconds between checks
// - `--sandbox` / `DNSSYNC_SANDBOX`: Use the Namecheap sandbox API
//
// ## Example
//
// ```bash
// export DNSSYNC_TOKEN=your_api_key
// export DNSSYNC_APPID=your_app_id
// dnssyncd start --username alice --apiuser alice --domain example.com
// ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use dnssync_core::{SyncConfig, SyncEngine, SyncEvent};
use dnssync_namecheap::NamecheapClient;
use dnssync_protos::ProtosClient;
use dnssync_resolver::HickoryResolver;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Level, debug, error, info};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
///
/// - 0: Clean shutdown
/// - 1: Configuration error or fatal startup failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or fatal failure
    Fatal = 1,
}

impl From<SyncExitCode> for ExitCode {
    fn from(code: SyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

#[derive(Parser, Debug)]
#[command(name = "dnssyncd")]
#[command(about = "Keeps Namecheap host records in sync with Protos DNS resources", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the Namecheap DNS service
    Start(StartArgs),
}

#[derive(clap::Args, Debug)]
struct StartArgs {
    /// Namecheap username
    #[arg(long, env = "DNSSYNC_USERNAME")]
    username: String,

    /// Namecheap API user
    #[arg(long, env = "DNSSYNC_APIUSER")]
    apiuser: String,

    /// Namecheap API token
    #[arg(long, env = "DNSSYNC_TOKEN", hide_env_values = true)]
    token: String,

    /// Namecheap hosted domain
    #[arg(long, env = "DNSSYNC_DOMAIN")]
    domain: String,

    /// Protos application id
    #[arg(long, env = "DNSSYNC_APPID", hide_env_values = true)]
    appid: String,

    /// Check interval in seconds
    #[arg(long, env = "DNSSYNC_INTERVAL", default_value_t = 30)]
    interval: u64,

    /// Log level: trace, debug, info, warn, error
    #[arg(long, env = "DNSSYNC_LOGLEVEL", default_value = "info")]
    loglevel: String,

    /// URL used to connect to the Protos API
    #[arg(long, env = "DNSSYNC_PROTOSURL", default_value = dnssync_protos::DEFAULT_BASE_URL)]
    protosurl: String,

    /// Client IP whitelisted for the Namecheap API
    #[arg(long, env = "DNSSYNC_CLIENT_IP", default_value = dnssync_namecheap::DEFAULT_CLIENT_IP)]
    client_ip: String,

    /// DNS server (ip:port) used to verify propagation
    #[arg(long, env = "DNSSYNC_RESOLVER", default_value = dnssync_resolver::DEFAULT_UPSTREAM)]
    resolver: String,

    /// Give up on propagation after this many failed checks (default: never)
    #[arg(long, env = "DNSSYNC_VERIFY_MAX_ATTEMPTS")]
    verify_max_attempts: Option<usize>,

    /// Seconds between propagation checks (default: 10, capped at the interval)
    #[arg(long, env = "DNSSYNC_VERIFY_DELAY")]
    verify_delay: Option<u64>,

    /// Use the Namecheap sandbox API
    #[arg(long, env = "DNSSYNC_SANDBOX")]
    sandbox: bool,
}

impl StartArgs {
    /// Validate the arguments
    fn validate(&self) -> Result<()> {
        for (flag, value) in [
            ("--username", &self.username),
            ("--apiuser", &self.apiuser),
            ("--token", &self.token),
            ("--domain", &self.domain),
            ("--appid", &self.appid),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!("username, apiuser, token, domain and appid are required ({} is empty)", flag);
            }
        }

        validate_domain_name(&self.domain)?;

        if !(1..=86400).contains(&self.interval) {
            anyhow::bail!(
                "--interval must be between 1 and 86400 seconds. Got: {}",
                self.interval
            );
        }

        if self.verify_max_attempts == Some(0) {
            anyhow::bail!("--verify-max-attempts must be at least 1 (omit it to wait indefinitely)");
        }

        if !self.protosurl.starts_with("http://") && !self.protosurl.starts_with("https://") {
            anyhow::bail!(
                "--protosurl must use HTTP or HTTPS scheme. Got: {}",
                self.protosurl
            );
        }

        if self.client_ip.parse::<std::net::IpAddr>().is_err() {
            anyhow::bail!("--client-ip is not an IP address: {}", self.client_ip);
        }

        parse_log_level(&self.loglevel)?;

        Ok(())
    }

    /// Build the engine configuration
    fn sync_config(&self) -> SyncConfig {
        let mut config = SyncConfig::new(self.domain.trim_end_matches('.').to_lowercase());
        config.poll_interval_secs = self.interval;
        config.verify.max_attempts = self.verify_max_attempts;

        // The check delay never exceeds the cycle interval
        let delay = self
            .verify_delay
            .unwrap_or(config.verify.delay_secs)
            .min(self.interval);
        config.verify.delay_secs = delay;
        config.verify.max_delay_secs = config.verify.max_delay_secs.max(delay);

        config
    }
}

fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "--loglevel '{}' is not valid. Valid levels: trace, debug, info, warn, error",
            level
        ),
    }
}

/// Validate that a string is a valid domain name
///
/// Basic RFC 1035 checks; a trailing dot is accepted.
fn validate_domain_name(domain: &str) -> Result<()> {
    let domain = domain.trim_end_matches('.');
    if domain.is_empty() {
        anyhow::bail!("Domain name cannot be empty");
    }

    if domain.len() > 253 {
        anyhow::bail!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        );
    }

    if !domain.contains('.') {
        anyhow::bail!("Domain name needs a top-level domain: '{}'", domain);
    }

    for label in domain.split('.') {
        if label.is_empty() {
            anyhow::bail!("Domain name has empty label: '{}'", domain);
        }

        if label.len() > 63 {
            anyhow::bail!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            );
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            anyhow::bail!(
                "Domain label contains invalid characters. Label: '{}'. \
                Valid: alphanumeric and hyphen only.",
                label
            );
        }

        if label.starts_with('-') || label.ends_with('-') {
            anyhow::bail!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            );
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                SyncExitCode::Fatal.into()
            } else {
                SyncExitCode::CleanShutdown.into()
            };
        }
    };

    let Commands::Start(args) = cli.command;

    if let Err(e) = args.validate() {
        eprintln!("Configuration validation error: {}", e);
        return SyncExitCode::Fatal.into();
    }

    let log_level = parse_log_level(&args.loglevel).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return SyncExitCode::Fatal.into();
    }

    info!("Starting dnssyncd for {}", args.domain);

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return SyncExitCode::Fatal.into();
        }
    };

    let code = rt.block_on(async {
        match run_daemon(args).await {
            Ok(()) => SyncExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                SyncExitCode::Fatal
            }
        }
    });

    code.into()
}

/// Build the clients and run the engine until a shutdown signal
async fn run_daemon(args: StartArgs) -> Result<()> {
    let config = args.sync_config();

    let orchestrator = Arc::new(ProtosClient::new(args.protosurl.clone(), args.appid.clone())?);
    let registrar = Arc::new(
        NamecheapClient::new(args.apiuser.clone(), args.token.clone(), args.username.clone())?
            .with_client_ip(args.client_ip.clone())
            .with_sandbox(args.sandbox),
    );
    let resolver = Arc::new(HickoryResolver::from_addr(&args.resolver)?);

    info!(
        "Protos: {}, resolver: {}, interval: {}s{}",
        args.protosurl,
        args.resolver,
        config.poll_interval_secs,
        if args.sandbox { ", sandbox" } else { "" }
    );

    let (engine, events) = SyncEngine::new(orchestrator, registrar, resolver, config)?;
    tokio::spawn(log_events(events));

    engine.run().await?;

    info!("Shut down cleanly");
    Ok(())
}

/// Drain engine events into the debug log
async fn log_events(mut events: mpsc::Receiver<SyncEvent>) {
    while let Some(event) = events.recv().await {
        debug!(?event, "engine event");
    }
}
