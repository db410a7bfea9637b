use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use argh::FromArgs;
use walvault_service::WalInspector;
use walvault_service::wal::{CheckStatus, CheckType};
use walvault_types::{Lsn, TimelineId};

use crate::commands;
use crate::config::Config;
use crate::observability;
use crate::output::OutputFormat;

/// Inspect, verify and transfer a WAL archive.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    pub config: Option<PathBuf>,

    #[argh(subcommand)]
    pub command: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    WalShow(WalShowCommand),
    WalVerify(WalVerifyCommand),
    DeltaPlan(DeltaPlanCommand),
    WalPush(WalPushCommand),
    WalFetch(WalFetchCommand),
    Version(VersionCommand),
}

/// show the timelines in the archive and the health of their segments
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "wal-show")]
struct WalShowCommand {
    /// print JSON instead of a table
    #[argh(switch)]
    json: bool,

    /// do not read backup sentinels
    #[argh(switch)]
    without_backups: bool,
}

/// verify that the archive can restore up to the current segment
///
/// Runs the given checks, `integrity` and `timeline`, or both if none are given. Exits with a
/// non-zero status if any check fails.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "wal-verify")]
struct WalVerifyCommand {
    /// print JSON instead of tables
    #[argh(switch)]
    json: bool,

    /// name of the segment the database is currently writing
    #[argh(option)]
    current_segment: Option<String>,

    /// current write position of the database, requires --timeline
    #[argh(option)]
    current_lsn: Option<Lsn>,

    /// timeline the database is currently writing
    #[argh(option)]
    timeline: Option<TimelineId>,

    /// checks to run
    #[argh(positional)]
    checks: Vec<CheckType>,
}

/// list the delta files and segments needed to replay an LSN interval
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "delta-plan")]
struct DeltaPlanCommand {
    /// timeline to replay
    #[argh(option)]
    timeline: TimelineId,

    /// first LSN to replay
    #[argh(option)]
    from: Lsn,

    /// first LSN not to replay
    #[argh(option)]
    to: Lsn,

    /// print JSON instead of a table
    #[argh(switch)]
    json: bool,
}

/// compress a WAL segment or history file and store it in the archive
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "wal-push")]
struct WalPushCommand {
    /// path of the file to upload
    #[argh(positional)]
    path: PathBuf,
}

/// download a WAL segment or history file from the archive
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "wal-fetch")]
struct WalFetchCommand {
    /// name of the file, without compression extension
    #[argh(positional)]
    name: String,

    /// where to write the decoded file
    #[argh(positional)]
    dest: PathBuf,
}

/// print the walvault version
#[derive(Default, Debug, FromArgs)]
#[argh(subcommand, name = "version")]
struct VersionCommand {}

/// Bootstrap the runtime and execute the CLI command.
pub fn execute() -> Result<ExitCode> {
    let args: Args = argh::from_env();

    // Special switch to just print the version and exit.
    if let Command::Version(_) = args.command {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(ExitCode::SUCCESS);
    }

    let config = Config::load(args.config.as_deref())?;

    // Sentry should be initialized before creating the async runtime.
    let _sentry_guard = observability::init_sentry(&config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("main-rt")
        .enable_all()
        .worker_threads(config.runtime.worker_threads)
        .build()?;
    let _runtime_guard = runtime.enter();

    observability::init_tracing(&config);
    tracing::debug!(?config);

    runtime.block_on(run(config, args.command))
}

async fn run(config: Config, command: Command) -> Result<ExitCode> {
    let storage = commands::open_storage(&config);
    let size = storage.segment_size();
    let inspector = WalInspector::new(storage.clone(), config.upload_concurrency);
    let mut stdout = std::io::stdout().lock();

    match command {
        Command::WalShow(WalShowCommand {
            json,
            without_backups,
        }) => {
            let format = OutputFormat::from_json_flag(json);
            commands::wal_show(&inspector, !without_backups, format, &mut stdout).await?;
        }
        Command::WalVerify(cmd) => {
            let current = commands::resolve_current_segment(
                size,
                cmd.current_segment.as_deref(),
                cmd.current_lsn,
                cmd.timeline,
            )?;
            let format = OutputFormat::from_json_flag(cmd.json);
            let status =
                commands::wal_verify(&inspector, current, &cmd.checks, format, &mut stdout).await?;
            if status == CheckStatus::Failure {
                stdout.flush()?;
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::DeltaPlan(DeltaPlanCommand {
            timeline,
            from,
            to,
            json,
        }) => {
            let format = OutputFormat::from_json_flag(json);
            commands::delta_plan(size, timeline, from, to, format, &mut stdout)?;
        }
        Command::WalPush(WalPushCommand { path }) => {
            let stored = commands::wal_push(&storage, &path, config.compression_level).await?;
            writeln!(stdout, "{stored}")?;
        }
        Command::WalFetch(WalFetchCommand { name, dest }) => {
            commands::wal_fetch(&storage, &name, &dest).await?;
        }
        Command::Version(VersionCommand {}) => unreachable!(),
    }

    stdout.flush()?;
    Ok(ExitCode::SUCCESS)
}
