//! hostpush CLI
//!
//! Push local files to many hosts over SSH at once

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use hostpush_core::{HostStatus, Task, TaskKind};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod factory;
mod report;

use config::Config;
use factory::DefaultConnector;

#[derive(Parser, Debug)]
#[command(name = "hostpush", version)]
#[command(about = "Run file operations on many hosts over SSH", long_about = None)]
struct Cli {
    /// Config file (default: $HOSTPUSH_CONFIG, ./hostpush.toml, /etc/hostpush/hostpush.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Push local files to remote hosts
    #[command(after_help = "\
Examples:
  # Push a local file to host1:/tmp/.
  $ hostpush push host1 -f ./foo.txt

  # Specify dest dir by '-d' flag.
  $ hostpush push host1 -f ./foo.txt -d /home/user

  # Push local files to remote hosts.
  $ hostpush push host1 host2 -f ./foo.txt -f ./bar.txt
    or
  $ hostpush push host1 host2 -f ./foo.txt,./bar.txt")]
    Push(PushArgs),
}

#[derive(clap::Args, Debug)]
struct PushArgs {
    /// Target hosts ([user@]host[:port])
    #[arg(required = true)]
    hosts: Vec<String>,

    /// Files to be copied to remote hosts
    #[arg(short, long = "files", required = true, value_delimiter = ',')]
    files: Vec<PathBuf>,

    /// Path of remote hosts where files will be copied to
    #[arg(short, long = "dest-path", default_value = "/tmp")]
    dest_path: String,

    /// Allow overwrite files if they already exist on remote hosts
    #[arg(short = 'F', long)]
    force: bool,

    /// Number of hosts handled at the same time
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// SSH user
    #[arg(short, long)]
    user: Option<String>,

    /// SSH port
    #[arg(short = 'P', long)]
    port: Option<u16>,

    /// SSH private key
    #[arg(short = 'i', long)]
    identity_file: Option<String>,

    /// Write to localhost through the local filesystem instead of SSH
    #[arg(long)]
    local: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Print a line per finished host to stderr
    #[arg(long)]
    progress: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let mut config = Config::load_default(cli.config.as_deref())?;

    init_tracing(&config, cli.verbose);

    match cli.command {
        Commands::Push(args) => push(&mut config, args).await,
    }
}

fn init_tracing(config: &Config, verbose: u8) {
    let level = match verbose {
        0 => config.log.level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.log.json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn push(config: &mut Config, args: PushArgs) -> Result<ExitCode> {
    for file in &args.files {
        if !file.is_file() {
            eyre::bail!("file '{}' not found", file.display());
        }
    }

    if let Some(user) = args.user {
        config.auth.user = user;
    }
    if let Some(port) = args.port {
        config.hosts.port = port;
    }
    if let Some(identity_file) = args.identity_file {
        config.auth.identity_file = Some(identity_file);
    }
    if args.local {
        config.hosts.local = true;
    }
    if args.concurrency.is_some() {
        config.run.concurrency = args.concurrency;
    }
    let json = args.json || config.output.json;

    let connector = DefaultConnector::new(config, &args.hosts)?.into_shared();

    let mut task = Task::new(TaskKind::Push, config.task_config(), connector);
    task.set_hosts(args.hosts);
    task.set_copy_files(args.files);
    task.set_file_options(args.dest_path, args.force);

    let cancel = task.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, finishing hosts in flight");
            cancel.cancel();
        }
    });

    if args.progress {
        let events = task.subscribe();
        tokio::spawn(async move {
            report::write_progress(events, &mut std::io::stderr()).await;
        });
    }

    let report = task.start().await?;

    let mut stdout = std::io::stdout().lock();
    if json {
        report::write_json(&report, &mut stdout)?;
    } else {
        report::write_text(&report, &mut stdout)?;
    }

    info!(
        success = report.is_success(),
        failed_hosts = report.hosts.iter().filter(|h| h.status != HostStatus::Success).count(),
        "push finished"
    );

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
