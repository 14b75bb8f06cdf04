use clap::Parser;
use colored::*;
use damon_record::constants::defaults;
use damon_record::core::{SessionConfig, SessionController};
use damon_record::signals;
use damon_record::surface;
use damon_record::{logging, prepare, AttrRequest, CancelToken, Prepared, RecordError, Target};
use std::path::PathBuf;
use std::process::exit;
use std::time::Duration;

/// Record data access patterns of the target process
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// The target command or the pid to record
    #[clap(value_name = "TARGET")]
    target: String,

    /// Sampling interval in microseconds
    #[clap(short, long, value_name = "INTERVAL", default_value_t = defaults::SAMPLE_INTERVAL_US)]
    sample: u64,

    /// Aggregate interval in microseconds
    #[clap(short, long, value_name = "INTERVAL", default_value_t = defaults::AGGR_INTERVAL_US)]
    aggr: u64,

    /// Regions update interval in microseconds
    #[clap(short, long, value_name = "INTERVAL", default_value_t = defaults::REGIONS_UPDATE_INTERVAL_US)]
    updr: u64,

    /// Minimal number of regions
    #[clap(short = 'n', long, value_name = "# REGIONS", default_value_t = defaults::MIN_NR_REGIONS)]
    minr: u64,

    /// Maximum number of regions
    #[clap(short, long, value_name = "# REGIONS", default_value_t = defaults::MAX_NR_REGIONS)]
    maxr: u64,

    /// Length of record result buffer
    #[clap(short = 'l', long, value_name = "LEN", default_value_t = defaults::RBUF_LEN)]
    rbuf: u32,

    /// Output file path
    #[clap(short, long, value_name = "FILE", default_value = defaults::OUTPUT_PATH)]
    out: PathBuf,

    /// Debugfs mounted path
    #[clap(short, long, value_name = "DEBUGFS", default_value = defaults::DEBUGFS_MOUNT)]
    debugfs: PathBuf,

    /// Print the session report as JSON when done
    #[clap(long)]
    json: bool,

    /// Milliseconds between monitor status checks
    #[clap(long, value_name = "MS", default_value = "1000")]
    poll_interval: u64,

    /// Enable debug logging
    #[clap(short, long)]
    verbose: bool,
}

fn fail(err: RecordError) -> ! {
    eprintln!("{} {}", "Error:".red().bold(), err);
    exit(err.exit_code());
}

fn main() {
    let args = Args::parse();
    logging::init(args.verbose);

    if let Err(err) = surface::ensure_root() {
        fail(err);
    }

    let request = AttrRequest {
        sample_interval_us: args.sample,
        aggr_interval_us: args.aggr,
        regions_update_interval_us: args.updr,
        min_nr_regions: args.minr,
        max_nr_regions: args.maxr,
        rbuf_len: args.rbuf,
        output_path: args.out.clone(),
    };
    let Prepared {
        target,
        requested,
        surface,
    } = prepare(&args.target, &request, &args.debugfs).unwrap_or_else(|err| fail(err));

    let cancel = CancelToken::new();
    if let Err(err) = signals::install(&cancel) {
        fail(RecordError::Io(err));
    }

    let config = SessionConfig {
        poll_interval: Duration::from_millis(args.poll_interval.max(1)),
    };
    let controller =
        SessionController::start(surface, cancel, config).unwrap_or_else(|err| fail(err));

    if !args.json {
        match &target {
            Target::Command(cmd) => println!("Recording command: {}", cmd.cyan()),
            Target::Pid(pid) => {
                println!("Recording existing process with PID: {}", pid.to_string().cyan())
            }
        }
    }

    let report = controller.run(&requested, &target);

    if args.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(err) => eprintln!("{} cannot serialize report: {}", "Error:".red().bold(), err),
        }
    } else {
        if report.exit_code == 0 {
            println!(
                "\nRecording complete after {:.1} seconds",
                report.elapsed_secs
            );
            println!(
                "Results written to {}",
                requested.output_path().display().to_string().green()
            );
        }
        if let Some(old) = &report.previous_output {
            println!("Previous recording kept at {}", old.display());
        }
    }
    if !report.restored {
        eprintln!(
            "{} damon attributes could not be restored to: {}",
            "Warning:".yellow().bold(),
            report.snapshot
        );
    }

    exit(report.exit_code);
}
