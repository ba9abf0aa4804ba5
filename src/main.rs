#![forbid(unsafe_code)]

//! `launchport` — run one instrumented subprocess from the command line.
//!
//! Bootstraps configuration and logging, starts a session, prints the
//! negotiated ports for external tooling, streams the child's output,
//! and exits with the child's exit code. Ctrl-C triggers a graceful
//! termination with a bounded kill escalation.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use launchport::launcher::filter::FilterPipeline;
use launchport::launcher::output::OutputStream;
use launchport::launcher::ports::PortAllocator;
use launchport::launcher::registry::SessionRegistry;
use launchport::launcher::session::ProcessSession;
use launchport::models::params::{ExecutorKind, LaunchParameters};
use launchport::models::session::SessionStatus;
use launchport::{AppError, LauncherConfig, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "launchport", about = "Instrumented subprocess launcher", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Runtime executable; overrides the configured one.
    #[arg(long)]
    exe: Option<PathBuf>,

    /// Open a debugger-attach port and break at isolate spawn.
    #[arg(long)]
    debug: bool,

    /// Enable the runtime's checked/strict mode.
    #[arg(long)]
    checked: bool,

    /// Extra VM options, tokenized shell-style.
    #[arg(long, default_value = "")]
    vm_options: String,

    /// Working directory for the child process.
    #[arg(long)]
    cwd: Option<PathBuf>,

    /// Target file handed to the runtime.
    target: PathBuf,

    /// Program arguments passed after the target file.
    #[arg(trailing_var_arg = true)]
    args: Vec<String>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let config = match &args.config {
        Some(path) => LauncherConfig::load_from_path(path)?,
        None => LauncherConfig::default(),
    };

    let executable = args
        .exe
        .or_else(|| config.runtime_exe.clone())
        .ok_or_else(|| {
            AppError::SdkNotConfigured("pass --exe or set runtime_exe in the config".into())
        })?;

    let vm_options = if args.vm_options.is_empty() {
        config.vm_options.clone()
    } else if config.vm_options.is_empty() {
        args.vm_options.clone()
    } else {
        format!("{} {}", config.vm_options, args.vm_options)
    };

    let mut params = LaunchParameters::new(executable, &args.target)
        .with_vm_options(vm_options)
        .with_program_args(args.args.join(" "))
        .with_checked_mode(args.checked || config.checked_mode)
        .with_include_parent_env(config.include_parent_env)
        .with_executor(if args.debug {
            ExecutorKind::Debug
        } else {
            ExecutorKind::Run
        });
    for (key, value) in &config.env {
        params = params.with_env(key, value);
    }
    if let Some(cwd) = args.cwd {
        params = params.with_working_dir(cwd);
    }

    let registry = Arc::new(SessionRegistry::new(PortAllocator::new(
        config.port_probe_attempts,
    )));
    let session = Arc::new(
        ProcessSession::new(params, Arc::clone(&registry))
            .with_graceful_timeout(config.graceful_timeout()),
    );

    session.start().await?;

    let ports = session.ports();
    // Machine-readable endpoint lines for external tooling.
    if ports.debug_port() >= 0 {
        println!("debug-port: {}", ports.debug_port());
    }
    println!("service-port: {}", ports.service_port());

    let ct = CancellationToken::new();
    let signal_ct = ct.clone();
    let signal_session = Arc::clone(&session);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, terminating session");
            if let Err(err) = signal_session.terminate(true).await {
                warn!(%err, "graceful termination failed");
            }
            signal_ct.cancel();
        }
    });

    // Stream output until the pipes drain; the cancellation token cuts
    // the loop short if descendants keep the pipes open after Ctrl-C.
    // Every line passes through the console filter pipeline; the default
    // pipeline is passthrough, filters are injected collaborators.
    let filters = FilterPipeline::new();
    if let Some(mut output) = session.subscribe_output() {
        loop {
            tokio::select! {
                () = ct.cancelled() => break,
                line = output.recv() => {
                    let Some(line) = line else { break };
                    let annotated = filters.apply(&line.text);
                    match line.stream {
                        OutputStream::Stdout => println!("{}", annotated.text),
                        OutputStream::Stderr => eprintln!("{}", annotated.text),
                    }
                }
            }
        }
    }

    let status = session.wait_for_exit().await;
    info!(session_id = %session.id(), ?status, "session finished");

    let code = match status {
        SessionStatus::Terminated { exit_code } => exit_code.unwrap_or(1),
        _ => 1,
    };
    std::process::exit(code);
}

fn init_tracing(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let result = match format {
        LogFormat::Text => fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
    };
    result.map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))
}
