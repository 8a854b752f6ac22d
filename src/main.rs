use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};
use deltarec::io_utils::{archive_cli_error, io_cli_error, simple_cli_error};
use deltarec::{Archive, Config, FrameRetention, Record, Stream};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use sysinfo::{ProcessExt, System, SystemExt};

/// Inspect, replay and grow delta-compressed snapshot archives.
#[derive(Parser)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print frame counts and the recorded time span.
    Info {
        /// Archive file
        file: PathBuf,
        /// Frame field holding the capture time
        #[arg(long, default_value = deltarec::config::DEFAULT_TIMESTAMP_FIELD)]
        time_field: String,
        /// Emit a JSON summary on stdout
        #[arg(long)]
        json: bool,
    },
    /// Walk every frame of one stream in order.
    Replay {
        /// Archive file
        file: PathBuf,
        /// Stream to replay: session or events
        #[arg(long, default_value = "session")]
        stream: Stream,
        /// Frame index to start from
        #[arg(long, default_value_t = 0)]
        from: usize,
        /// Write each frame to stdout instead of its size
        #[arg(long)]
        raw: bool,
        /// Release frames as soon as they have been replayed
        #[arg(long)]
        drop_consumed: bool,
        /// Report process memory before and after the replay
        #[arg(long)]
        mem_stats: bool,
    },
    /// Append one session/events state pair, creating the archive if needed.
    Append {
        /// Archive file
        file: PathBuf,
        /// Session snapshot (JSON)
        session: PathBuf,
        /// Events snapshot (JSON)
        events: PathBuf,
    },
}

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse().command {
        Command::Info { file, time_field, json } => info_cmd(&file, time_field, json),
        Command::Replay { file, stream, from, raw, drop_consumed, mem_stats } => {
            let retention = if drop_consumed { FrameRetention::DropConsumed } else { FrameRetention::KeepAll };
            replay_cmd(&file, stream, from, raw, retention, mem_stats)
        }
        Command::Append { file, session, events } => append_cmd(&file, &session, &events),
    }
}

fn load_with_bar(file: &Path, config: Config) -> Result<Archive, Box<dyn std::error::Error>> {
    let bar = ProgressBar::new(0);
    bar.set_style(ProgressStyle::with_template(
        "loading {bar:40} {pos}/{len} frames ({percent}%)",
    )?);
    let cb_bar = bar.clone();
    let archive = Archive::load_with_config(
        file,
        config,
        Some(Box::new(move |_perc, done, total| {
            cb_bar.set_length(total as u64);
            cb_bar.set_position(done as u64);
        })),
    )
    .map_err(|e| archive_cli_error("loading archive", e))?;
    bar.finish_and_clear();
    Ok(archive)
}

fn describe_span(record: &Record) -> String {
    match (record.started_at(), record.stopped_at(), record.duration()) {
        (Ok(start), Ok(stop), Ok(duration)) => format!("started at {start}, stopped at {stop} ({duration})"),
        (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => format!("time span unavailable: {e}"),
    }
}

fn info_cmd(file: &Path, time_field: String, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config { timestamp_field: time_field, ..Config::default() };
    let start = Instant::now();
    let archive = load_with_bar(file, config)?;
    let elapsed = start.elapsed();

    if json {
        let summary = |r: &Record| {
            serde_json::json!({
                "frames": r.frame_count(),
                "started_at": r.started_at().ok().map(|t| t.to_rfc3339()),
                "stopped_at": r.stopped_at().ok().map(|t| t.to_rfc3339()),
                "duration_ms": r.duration().ok().map(|d| d.num_milliseconds()),
            })
        };
        let out = serde_json::json!({
            "file": file.display().to_string(),
            "session": summary(archive.session()),
            "events": summary(archive.events()),
            "load_ms": elapsed.as_millis(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{}: loaded in {:.2?}", file.display(), elapsed);
        for stream in [Stream::Session, Stream::Events] {
            let record = archive.record(stream);
            println!("  {stream}: {} frames, {}", record.frame_count(), describe_span(record));
        }
    }
    Ok(())
}

fn resident_memory(sys: &mut System) -> u64 {
    match sysinfo::get_current_pid() {
        Ok(pid) => {
            sys.refresh_process(pid);
            sys.process(pid).map(|p| p.memory()).unwrap_or(0)
        }
        Err(_) => 0,
    }
}

fn replay_cmd(
    file: &Path,
    stream: Stream,
    from: usize,
    raw: bool,
    retention: FrameRetention,
    mem_stats: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut sys = System::new();
    let before = resident_memory(&mut sys);

    let archive = load_with_bar(file, Config { retention, ..Config::default() })?;
    let record = archive.record(stream);
    record.seek(from).map_err(|e| archive_cli_error("seeking", e))?;

    let mut frames = 0usize;
    let mut bytes = 0usize;
    while !record.is_exhausted() {
        let index = record.current_index();
        let frame = record.next().map_err(|e| archive_cli_error("replaying", e))?;
        if raw {
            println!("{}", String::from_utf8_lossy(&frame));
        } else {
            println!("frame {index}: {} bytes", frame.len());
        }
        frames += 1;
        bytes += frame.len();
    }
    info!("replayed {frames} {stream} frames ({bytes} bytes)");

    if mem_stats {
        let after = resident_memory(&mut sys);
        eprintln!("memory: {} KiB before load, {} KiB after replay", before / 1024, after / 1024);
    }
    Ok(())
}

fn append_cmd(file: &Path, session: &Path, events: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let session_bytes = fs::read(session).map_err(|e| io_cli_error("reading session snapshot", session, e))?;
    let events_bytes = fs::read(events).map_err(|e| io_cli_error("reading events snapshot", events, e))?;
    for (path, bytes) in [(session, &session_bytes), (events, &events_bytes)] {
        if serde_json::from_slice::<serde_json::Value>(bytes).is_err() {
            return Err(simple_cli_error(&format!("{} is not valid JSON", path.display())).into());
        }
    }

    let archive = if file.exists() {
        Archive::load(file, |_, _, _| {}).map_err(|e| archive_cli_error("loading archive", e))?
    } else {
        Archive::new(file)
    };
    archive
        .append_state(&session_bytes, &events_bytes)
        .map_err(|e| archive_cli_error("appending state", e))?;
    eprintln!(
        "{}: {} session frames, {} event frames",
        file.display(),
        archive.session().frame_count(),
        archive.events().frame_count()
    );
    Ok(())
}
