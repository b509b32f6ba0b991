//! Segmented, Paged Memory Simulator - Main Entry Point
//!
//! Drives the translation engine in one of three modes:
//!   --batch FILE   replay requests from a file (four integers per record)
//!   --stress N     generate N randomized requests with a valid/invalid mix
//!   (default)      interactive prompt; a segment id of -1 quits
//!
//! Every run prints the configuration banner, the memory map before and
//! after, and the metrics report. Faults are appended to the log file.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;

use segpage_sim::config::SimConfig;
use segpage_sim::io::{generate_stress, read_requests, AccessRequest, RequestError, RequestReader};
use segpage_sim::memory::Policy;
use segpage_sim::translation::SegmentTable;

#[derive(Parser)]
#[command(name = "segpage-sim", version)]
#[command(about = "Segmented, paged virtual memory simulator with pluggable frame replacement")]
struct Cli {
    /// Number of physical frames in the pool
    #[arg(long, default_value_t = 16)]
    frames: usize,

    /// Page size in words
    #[arg(long, default_value_t = 1000)]
    page_size: u64,

    /// Number of segments
    #[arg(long, default_value_t = 3)]
    segments: usize,

    /// Directory fan-out (entries per second-level table)
    #[arg(long, default_value_t = 4)]
    dir_size: usize,

    /// Frame replacement policy (fifo or lru)
    #[arg(long, default_value = "fifo", value_parser = Policy::from_str)]
    policy: Policy,

    /// RNG seed; drawn from entropy when omitted
    #[arg(long)]
    seed: Option<u64>,

    /// Replay requests from a batch file instead of prompting
    #[arg(long, value_name = "FILE")]
    batch: Option<PathBuf>,

    /// Generate N random requests instead of prompting
    #[arg(long, value_name = "N")]
    stress: Option<usize>,

    /// Fraction of stress requests kept within valid bounds
    #[arg(long, default_value_t = 0.7)]
    valid: f64,

    /// Fault log destination
    #[arg(long, default_value = "results.txt")]
    log_file: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let seed = cli.seed.unwrap_or_else(rand::random);
    let cfg = SimConfig {
        frames: cli.frames,
        page_size: cli.page_size,
        segments: cli.segments,
        dir_size: cli.dir_size,
        policy: cli.policy,
        seed,
    };

    let mut engine = SegmentTable::new(&cfg);
    let log = File::create(&cli.log_file)
        .with_context(|| format!("failed to create log file {}", cli.log_file.display()))?;
    engine.set_log_sink(Box::new(log));

    println!("=== Segmented, Paged Memory Simulator ===");
    println!(
        "Frames={} PageSize={} Segments={} DirSize={} Policy={} Seed={}",
        cfg.frames, cfg.page_size, cfg.segments, cfg.dir_size, cfg.policy, cfg.seed
    );
    println!();
    print!("{}", engine.memory_map());

    if let Some(path) = cli.batch.as_deref() {
        run_batch(&mut engine, path)?;
    } else if let Some(n) = cli.stress {
        run_stress(&mut engine, n, cli.valid, seed);
    } else {
        run_interactive(&mut engine)?;
    }

    print_metrics(&engine);
    print!("{}", engine.memory_map());
    println!();
    println!("(Faults logged to {})", cli.log_file.display());
    Ok(())
}

/// Replay a batch file: one OK/FAIL line per request. A trailing partial
/// record is skipped with a warning; end of file ends the run.
fn run_batch(engine: &mut SegmentTable, path: &Path) -> Result<()> {
    let batch = read_requests(path)
        .with_context(|| format!("failed to load batch file {}", path.display()))?;
    if batch.trailing_fields != 0 {
        eprintln!(
            "warning: ignoring trailing record with {} of 4 fields",
            batch.trailing_fields
        );
    }
    println!("Batch: {} ({} requests)", path.display(), batch.requests.len());
    for request in batch.requests {
        report(engine, request);
    }
    Ok(())
}

/// Fire `n` generated requests at the engine. The generator runs off its
/// own RNG so the request stream and the engine's internal randomness stay
/// independently reproducible.
fn run_stress(engine: &mut SegmentTable, n: usize, valid_ratio: f64, seed: u64) {
    println!("Stress: N={} valid={}", n, valid_ratio);
    let mut rng = StdRng::seed_from_u64(seed);
    let requests = generate_stress(n, valid_ratio, engine.page_size(), engine.segments(), &mut rng);
    for request in requests {
        report(engine, request);
    }
}

/// Prompt for `seg page offset access` quadruples until EOF or a -1
/// segment. Fields are read as a token stream, so a record may continue on
/// the next line.
fn run_interactive(engine: &mut SegmentTable) -> Result<()> {
    println!("Interactive. Enter: seg page offset access(0=read,1=write); -1 quits.");
    let stdin = io::stdin();
    let mut reader = RequestReader::new(stdin.lock());
    loop {
        print!("> ");
        io::stdout().flush().context("failed to flush stdout")?;

        match reader.next_request() {
            Ok(Some(request)) => report(engine, request),
            Ok(None) => break,
            Err(RequestError::Io(err)) => {
                return Err(err).context("failed to read stdin");
            }
            // Malformed tokens fail only their own record.
            Err(err) => eprintln!("{}", err),
        }
    }
    Ok(())
}

fn report(engine: &mut SegmentTable, request: AccessRequest) {
    match engine.translate(request.segment, request.page, request.offset, request.access) {
        Ok(t) => println!("OK   -> Phys={} Lat={}", t.physical, t.latency),
        Err(fault) => println!(
            "FAIL ({},{},{},{}) {}",
            request.segment,
            request.page,
            request.offset,
            request.access.as_str(),
            fault
        ),
    }
}

fn print_metrics(engine: &SegmentTable) {
    let m = engine.metrics();
    println!();
    println!("--- Metrics ---");
    println!("Translations: {}", m.translations);
    println!("Page Faults:  {}", m.faults);
    println!("Replacements: {}", m.replacements);
    println!("Prot Viol:    {} (writes denied {})", m.prot_viol, m.writes_denied);
    println!("Seg Faults:   {}  Offset Faults: {}", m.seg_faults, m.offset_faults);
    println!("Utilization:  {:.2}%", engine.pool().utilization());
    println!("Avg Latency:  {:.2}", m.avg_latency());
    println!("--------------");
}
