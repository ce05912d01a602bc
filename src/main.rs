//! campusctl - administrative client for the campus platform
//!
//! A CLI that aggregates statistics from the platform microservices and drives
//! long-running server jobs such as the enrollment calculation.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (connection, config, authentication, etc.)
//!   2 - Partial outcome (a service failed with --strict, or the job ended in error)

use anyhow::{bail, Context, Result};
use campusctl::api::ApiClient;
use campusctl::cli::{Args, Command, OutputFormat};
use campusctl::config::{Config, DEFAULT_CONFIG_FILE};
use campusctl::error::ApiError;
use campusctl::session::SessionStore;
use campusctl::task::{EnrollmentJob, PollOutcome, PollerConfig, TaskPoller, TaskStatus};
use campusctl::{report, stats};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("campusctl v{}", env!("CARGO_PKG_VERSION"));

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .campusctl.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to set the API host, service overrides and polling interval.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// Logs go to stderr so that dashboards printed to stdout stay parseable.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Dispatch the selected command. Returns the exit code.
async fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let client = build_client(&config, &args)?;

    let Some(command) = args.command.clone() else {
        bail!("No command given");
    };

    match command {
        Command::Login { username, password } => login(&client, &username, &password).await,
        Command::Logout => {
            client.session().clear();
            println!("👋 Logged out.");
            Ok(0)
        }
        Command::Stats { output, strict, .. } => {
            run_stats(&client, &config, output.as_deref(), strict).await
        }
        Command::Health { strict } => run_health(&client, strict).await,
        Command::Enroll {
            download,
            dest,
            no_progress,
            ..
        } => {
            let show_progress = !no_progress && !args.quiet;
            run_enroll(client, &config, download.then_some(dest), show_progress).await
        }
        Command::Download { artifact, dest } => {
            let path = EnrollmentJob::new(client)
                .download(&artifact, &dest)
                .await
                .context("Download failed")?;
            println!("📄 Saved {}", path.display());
            Ok(0)
        }
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}

/// Open the session store and build the shared API client.
fn build_client(config: &Config, args: &Args) -> Result<ApiClient> {
    let token_path = config.session.token_path();
    let session = SessionStore::load(&token_path)?;

    if let Some(ref token) = args.token {
        debug!("Using token from command line or environment");
        session.override_token(token.clone());
    }

    let client = ApiClient::new(config.endpoints(), Arc::new(session), config.timeout())
        .context("Failed to build HTTP client")?;
    Ok(client)
}

async fn login(client: &ApiClient, username: &str, password: &str) -> Result<i32> {
    let response = client
        .login(username, password)
        .await
        .context("Login failed")?;

    client.session().set_token(response.access_token)?;

    let shown = response
        .user
        .as_ref()
        .map(|user| user.username.as_str())
        .filter(|name| !name.is_empty())
        .unwrap_or(username);
    println!("✅ Logged in as {}", shown);
    if response.expires_in > 0 {
        println!("   Session valid for {} minutes", response.expires_in / 60);
    }
    Ok(0)
}

fn warn_if_anonymous(client: &ApiClient) {
    if !client.session().is_authenticated() {
        warn!("No session token; run `campusctl login` first");
    }
}

async fn run_stats(
    client: &ApiClient,
    config: &Config,
    output: Option<&Path>,
    strict: bool,
) -> Result<i32> {
    warn_if_anonymous(client);

    let statistics = stats::collect_statistics(client).await;
    let has_failures = statistics.has_failures();
    let dashboard = report::Dashboard::new(config.api.base_url.clone(), statistics);

    let content = match config.output.format {
        OutputFormat::Json => report::generate_json_dashboard(&dashboard)?,
        OutputFormat::Markdown => report::generate_markdown_dashboard(&dashboard),
    };

    match output {
        Some(path) => {
            report::write_output(&content, path)?;
            println!("📊 Dashboard saved to: {}", path.display());
        }
        None => println!("{}", content),
    }

    for (source, message) in dashboard.statistics.failures() {
        eprintln!("⚠️  {}: {}", source, message);
    }

    if strict && has_failures {
        eprintln!("\n⛔ Some services did not answer. Failing (exit code 2).");
        return Ok(2);
    }
    Ok(0)
}

async fn run_health(client: &ApiClient, strict: bool) -> Result<i32> {
    let health = stats::check_health(client).await;

    println!("{}", report::generate_health_table(&health));

    let down = health.failures().count();
    if down > 0 {
        eprintln!("⚠️  {} of {} services are down", down, health.len());
        if strict {
            return Ok(2);
        }
    }
    Ok(0)
}

/// Start the enrollment calculation and follow it until it settles or the
/// user presses Ctrl-C. `download_to` is set when the artifact should be
/// fetched after completion.
async fn run_enroll(
    client: ApiClient,
    config: &Config,
    download_to: Option<PathBuf>,
    show_progress: bool,
) -> Result<i32> {
    let poller = TaskPoller::new(
        EnrollmentJob::new(client),
        PollerConfig {
            interval: config.poll_interval(),
        },
    );

    let mut updates = poller.subscribe();

    println!("🚀 Starting enrollment calculation...");
    let task = poller.start().await?;
    println!(
        "   Task: {} (started {})",
        task.id(),
        task.created_at().format("%H:%M:%S UTC")
    );

    let progress = show_progress.then(progress_bar);
    let mut last_printed: Option<TaskStatus> = None;

    let outcome = {
        let wait = poller.wait();
        let interrupt = tokio::signal::ctrl_c();
        tokio::pin!(wait, interrupt);
        let mut interrupted = false;

        loop {
            tokio::select! {
                outcome = &mut wait => break outcome,
                changed = updates.changed() => {
                    if changed.is_err() {
                        break (&mut wait).await;
                    }
                    let latest = updates.borrow_and_update().clone();
                    if let Some(status) = latest {
                        show_status(progress.as_ref(), &mut last_printed, status);
                    }
                }
                result = &mut interrupt, if !interrupted => {
                    interrupted = true;
                    match result {
                        Ok(()) => {
                            info!("Interrupted; stopping observation of task {}", task.id());
                            poller.cancel();
                        }
                        Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
                    }
                }
            }
        }
    };

    match outcome {
        PollOutcome::Finished(status) => {
            if let Some(ref pb) = progress {
                pb.set_position(u64::from(status.progress()));
                pb.finish_with_message(status.message().to_string());
            }
            finish_enroll(poller.backend(), status, download_to).await
        }
        PollOutcome::Stopped => {
            if let Some(ref pb) = progress {
                pb.abandon_with_message("stopped");
            }
            println!(
                "\n⏹  Stopped following task {}. The calculation continues on the server.",
                task.id()
            );
            Ok(0)
        }
        PollOutcome::SessionExpired => {
            if let Some(ref pb) = progress {
                pb.abandon_with_message("session expired");
            }
            Err(ApiError::SessionExpired).with_context(|| {
                format!("Stopped following task {}", task.id())
            })
        }
        PollOutcome::NotStarted => bail!("Enrollment calculation did not start"),
    }
}

async fn finish_enroll(
    job: &EnrollmentJob,
    status: TaskStatus,
    download_to: Option<PathBuf>,
) -> Result<i32> {
    match status {
        TaskStatus::Completed { message, artifact } => {
            println!("\n✅ {}", message);
            match (artifact, download_to) {
                (Some(artifact), Some(dest)) => {
                    let path = job
                        .download(&artifact, &dest)
                        .await
                        .context("Download failed")?;
                    println!("📄 Saved {}", path.display());
                }
                (Some(artifact), None) => {
                    println!("   Result: {}", artifact);
                    println!("   Fetch it with: campusctl download {}", artifact);
                }
                (None, Some(_)) => warn!("Job completed without a result file"),
                (None, None) => {}
            }
            Ok(0)
        }
        TaskStatus::Error { error, .. } => {
            eprintln!("\n⛔ Enrollment calculation failed: {}", error);
            Ok(2)
        }
        other => bail!("Polling ended on a non-terminal status: {}", other),
    }
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Reflect a status update on the progress bar, or print it as a line when
/// it differs from the last one printed.
fn show_status(progress: Option<&ProgressBar>, last_printed: &mut Option<TaskStatus>, status: TaskStatus) {
    match progress {
        Some(pb) => {
            pb.set_position(u64::from(status.progress()));
            pb.set_message(status.message().to_string());
        }
        None => {
            if last_printed.as_ref() != Some(&status) {
                println!("   {}", status);
                *last_printed = Some(status);
            }
        }
    }
}
