mod commands;

use berth_core::config::DEFAULT_CONFIG_FILE;
use berth_core::{install_signal_handler, CancelToken, LifecycleOperation, ThreadSleeper};
use berth_host::{ContainerEngine, SystemIdentity, SystemRunner};
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{admin_user_or_default, exit_code_for, with_session, ConfigSource, Host};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "berth",
    version,
    about = "Provision a container engine and drive a compose deployment on this host"
)]
struct Cli {
    /// Path to the deploy configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Container engine to use (overrides the config file).
    #[arg(long, global = true)]
    engine: Option<ContainerEngine>,

    /// Compose file to operate on (overrides the config file).
    #[arg(long, global = true)]
    compose_file: Option<PathBuf>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Identify the Linux distribution and CPU architecture.
    Detect {
        /// Read this file instead of /etc/os-release.
        #[arg(long)]
        os_release: Option<PathBuf>,
        /// Use this machine name instead of asking `uname -m`.
        #[arg(long)]
        arch: Option<String>,
    },
    /// Print the Docker install plan for this host without running it.
    Plan {
        /// Read this file instead of /etc/os-release.
        #[arg(long)]
        os_release: Option<PathBuf>,
        /// Use this machine name instead of asking `uname -m`.
        #[arg(long)]
        arch: Option<String>,
        /// User added to the docker group on Amazon Linux (default: $SUDO_USER, then ec2-user).
        #[arg(long)]
        admin_user: Option<String>,
    },
    /// Install Docker if it is missing and start its service.
    Install {
        /// User added to the docker group on Amazon Linux (default: $SUDO_USER, then ec2-user).
        #[arg(long)]
        admin_user: Option<String>,
    },
    /// Run diagnostic checks on the container engine.
    Doctor,
    /// Pull the images referenced by the compose file.
    Pull,
    /// Create or recreate the compose services in the background.
    Start {
        /// Return as soon as compose exits.
        #[arg(long, default_value_t = false)]
        no_wait: bool,
    },
    /// Stop and remove the compose services.
    Stop,
    /// Restart one service, or every service when none is named.
    Restart {
        /// Service to restart (Docker only; Podman restarts the project).
        container: Option<String>,
        /// Return as soon as compose exits.
        #[arg(long, default_value_t = false)]
        no_wait: bool,
    },
    /// Check the engine, pull images, start services, and wait until they run.
    Up,
    /// Block until a container reports running.
    Wait {
        /// Container name.
        container: String,
        /// Maximum number of inspections.
        #[arg(long)]
        attempts: Option<u32>,
        /// Seconds between inspections.
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("BERTH_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let cancel = CancelToken::new();
    install_signal_handler(cancel.clone());

    let runner = SystemRunner::new();
    let identity = SystemIdentity;
    let sleeper = ThreadSleeper::cancellable(cancel.clone());
    let host = Host {
        runner: &runner,
        identity: &identity,
        sleeper: &sleeper,
        cancel,
    };
    let source = ConfigSource {
        explicit: cli.config.is_some(),
        path: cli
            .config
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE)),
        engine: cli.engine,
        compose_file: cli.compose_file,
    };
    let json = cli.json;

    let result = match cli.command {
        Commands::Detect { os_release, arch } => {
            commands::detect::run(&runner, os_release.as_deref(), arch.as_deref(), json)
        }
        Commands::Plan {
            os_release,
            arch,
            admin_user,
        } => commands::plan::run(
            &runner,
            &source,
            os_release.as_deref(),
            arch.as_deref(),
            admin_user_or_default(admin_user),
            json,
        ),
        Commands::Install { admin_user } => with_session(&source, &host, |session, _| {
            commands::install::run(session, admin_user_or_default(admin_user), json)
        }),
        Commands::Doctor => with_session(&source, &host, |session, _| {
            commands::doctor::run(session, &source, json)
        }),
        Commands::Pull => with_session(&source, &host, |session, _| {
            commands::lifecycle::run(session, &LifecycleOperation::Pull, false, json)
        }),
        Commands::Start { no_wait } => with_session(&source, &host, |session, _| {
            commands::lifecycle::run(session, &LifecycleOperation::Start, !no_wait, json)
        }),
        Commands::Stop => with_session(&source, &host, |session, _| {
            commands::lifecycle::run(session, &LifecycleOperation::Stop, false, json)
        }),
        Commands::Restart { container, no_wait } => {
            with_session(&source, &host, |session, _| {
                commands::lifecycle::run(
                    session,
                    &LifecycleOperation::Restart(container),
                    !no_wait,
                    json,
                )
            })
        }
        Commands::Up => with_session(&source, &host, |session, config| {
            commands::lifecycle::up(session, config, json)
        }),
        Commands::Wait {
            container,
            attempts,
            interval,
        } => with_session(&source, &host, |session, _| {
            commands::wait::run(session, &container, attempts, interval, json)
        }),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(exit_code_for(&msg))
        }
    }
}
