//! perfrate - kernel counter rate sampler.
//!
//! Periodically reads selected counters from /proc and /sys, derives their
//! average rate of change over a sliding window, and prints or publishes
//! each rate. Bounded runs can also export every rate as CSV.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::{Arg, ArgAction, ArgMatches, Command, Parser};
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(target_os = "linux")]
use perfrate_core::collector::RealFs;
use perfrate_core::collector::DEFAULT_ENERGY_PATH;
#[cfg(not(target_os = "linux"))]
use perfrate_core::collector::MockFs;
use perfrate_core::rates::DEFAULT_AROC_PERIOD;
use perfrate_core::registry::{OPTION_GROUPS, SourcePaths, all_options, build_commands};
use perfrate_core::sampler::{ConfigError, LoopConfig, Sampler};
use perfrate_core::sink::{PrintSink, PublishSink, Sink};

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("PERFRATE_GIT_SHA"), ")");

/// Kernel counter rate sampler.
#[derive(Parser, Debug)]
#[command(name = "perfrate", about = "Kernel counter rate sampler", version = VERSION)]
struct Args {
    /// Sampling interval in milliseconds. Negative values mean no delay.
    #[arg(long, default_value_t = 1000, env = "PERFRATE_INTERVAL", allow_negative_numbers = true)]
    interval: i64,

    /// Total run time in seconds. Negative values run until interrupted.
    #[arg(long, default_value_t = 60, allow_negative_numbers = true)]
    duration: i64,

    /// Exact number of rounds. Overrides --duration.
    #[arg(long, value_name = "N")]
    rounds: Option<u64>,

    /// Print `topic: value` lines instead of publishing.
    #[arg(long, visible_alias = "print-mode", conflicts_with = "publish_to")]
    debug: bool,

    /// Number of samples in the rate window.
    #[arg(long, default_value_t = DEFAULT_AROC_PERIOD, env = "PERFRATE_AROC_PERIOD")]
    aroc_period: usize,

    /// Write every rate to this CSV file when the run completes.
    #[arg(long, value_name = "PATH")]
    csv: Option<PathBuf>,

    /// Publish to this file instead of stdout.
    #[arg(long, value_name = "PATH")]
    publish_to: Option<PathBuf>,

    /// Path to /proc filesystem (for testing/mocking).
    #[arg(long, default_value = "/proc")]
    proc_path: PathBuf,

    /// Path to the power monitor attribute read by sys:bus:energy.
    #[arg(long, default_value = DEFAULT_ENERGY_PATH)]
    energy_path: PathBuf,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,

    #[command(flatten)]
    metrics: MetricFlags,
}

/// One `--group:subgroup:key` switch per catalogued metric.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct MetricFlags {
    selected: Vec<String>,
}

impl clap::FromArgMatches for MetricFlags {
    fn from_arg_matches(matches: &ArgMatches) -> Result<Self, clap::Error> {
        let selected = all_options()
            .filter(|option| matches.get_flag(option))
            .map(String::from)
            .collect();
        Ok(Self { selected })
    }

    fn update_from_arg_matches(&mut self, matches: &ArgMatches) -> Result<(), clap::Error> {
        *self = Self::from_arg_matches(matches)?;
        Ok(())
    }
}

impl clap::Args for MetricFlags {
    fn augment_args(cmd: Command) -> Command {
        OPTION_GROUPS.iter().fold(cmd, |cmd, group| {
            group.options.iter().fold(cmd, |cmd, &option| {
                cmd.arg(
                    Arg::new(option)
                        .long(option)
                        .action(ArgAction::SetTrue)
                        .help_heading(group.heading)
                        .help(format!("Sample {}", option)),
                )
            })
        })
    }

    fn augment_args_for_update(cmd: Command) -> Command {
        Self::augment_args(cmd)
    }
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Logs go to stderr; stdout belongs to the sink.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("perfrate={level},perfrate_core={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Interval and round limit from the command line. Negative intervals clamp
/// to zero; a negative duration is unbounded; `--rounds` wins over both.
fn loop_config(args: &Args) -> Result<LoopConfig, ConfigError> {
    let interval = Duration::from_millis(u64::try_from(args.interval).unwrap_or(0));
    if let Some(rounds) = args.rounds {
        return Ok(LoopConfig::new(interval, Some(rounds)));
    }
    let duration = u64::try_from(args.duration).ok().map(Duration::from_secs);
    LoopConfig::for_duration(interval, duration)
}

fn open_sink(args: &Args) -> std::io::Result<Box<dyn Sink>> {
    if args.debug {
        return Ok(Box::new(PrintSink::stdout()));
    }
    match &args.publish_to {
        Some(path) => {
            info!("Publishing to {}", path.display());
            Ok(Box::new(PublishSink::create(path)?))
        }
        None => Ok(Box::new(PublishSink::stdout())),
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = loop_config(&args)?;
    info!(
        "Config: interval={:?}, rounds={}, aroc_period={}, proc={}",
        config.interval,
        config
            .rounds
            .map_or_else(|| "unbounded".to_string(), |r| r.to_string()),
        args.aroc_period,
        args.proc_path.display()
    );

    let paths = SourcePaths {
        proc_root: args.proc_path.clone(),
        energy: args.energy_path.clone(),
    };

    #[cfg(target_os = "linux")]
    let fs = RealFs::new();
    #[cfg(not(target_os = "linux"))]
    let fs = {
        warn!("Not running on Linux, sampling a simulated system");
        MockFs::typical_system()
    };

    let commands = build_commands(&fs, &paths, &args.metrics.selected)?;
    if commands.is_empty() {
        warn!("No metrics selected; pass one or more flags such as --proc:stat:user");
    }

    let mut sampler = Sampler::new(commands, open_sink(&args)?, args.aroc_period);
    if let Some(path) = &args.csv {
        if config.rounds.is_none() {
            warn!("Unbounded run, {} will not be written", path.display());
        }
        sampler = sampler.with_export(path);
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    let summary = sampler.run(&config, &running)?;
    info!(
        "Done: {} rounds, {} rates{}",
        summary.rounds,
        summary.samples,
        if summary.stopped { " (stopped)" } else { "" }
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);
    info!("perfrate {} starting", VERSION);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("perfrate").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]);
        assert_eq!(args.aroc_period, 3);
        assert!(!args.debug);
        assert!(args.metrics.selected.is_empty());
        assert_eq!(args.energy_path, PathBuf::from(DEFAULT_ENERGY_PATH));

        let config = loop_config(&args).unwrap();
        assert_eq!(config.interval, Duration::from_secs(1));
        assert_eq!(config.rounds, Some(60));
    }

    #[test]
    fn test_metric_flags_in_catalog_order() {
        let args = parse(&["--sys:bus:energy", "--proc:stat:nice", "--proc:memstat:free", "--proc:stat:user"]);
        assert_eq!(
            args.metrics.selected,
            vec!["proc:stat:user", "proc:stat:nice", "sys:bus:energy", "proc:memstat:free"]
        );
    }

    #[test]
    fn test_unknown_metric_flag_rejected() {
        let argv = ["perfrate", "--proc:stat:guest"];
        assert!(Args::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_negative_interval_clamps_to_zero() {
        let args = parse(&["--interval", "-5", "--rounds", "7"]);
        let config = loop_config(&args).unwrap();
        assert_eq!(config.interval, Duration::ZERO);
        assert_eq!(config.rounds, Some(7));
    }

    #[test]
    fn test_negative_duration_is_unbounded() {
        let args = parse(&["--duration", "-1", "--interval", "0"]);
        assert_eq!(loop_config(&args).unwrap().rounds, None);
    }

    #[test]
    fn test_zero_interval_with_duration_is_error() {
        let args = parse(&["--interval", "0", "--duration", "10"]);
        assert!(loop_config(&args).is_err());
    }

    #[test]
    fn test_rounds_from_duration() {
        let args = parse(&["--interval", "250", "--duration", "3"]);
        assert_eq!(loop_config(&args).unwrap().rounds, Some(12));
    }

    #[test]
    fn test_print_mode_alias() {
        assert!(parse(&["--print-mode"]).debug);
        let argv = ["perfrate", "--debug", "--publish-to", "out.jsonl"];
        assert!(Args::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_publish_to_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        let args = parse(&["--publish-to", path.to_str().unwrap()]);

        let mut sink = open_sink(&args).unwrap();
        sink.emit("perf.proc.stat.ctxt", 1.5, None).unwrap();
        sink.flush().unwrap();
        drop(sink);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"name\":\"perf.proc.stat.ctxt\""));
    }
}
