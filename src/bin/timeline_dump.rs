use clap::Parser;
use deltarec::io_utils::{archive_cli_error, io_cli_error, simple_cli_error};
use deltarec::{Archive, ArchiveError, Config, Stream};
use serde::Serialize;
use std::fs::File;
use std::path::PathBuf;

/// Export the per-frame timeline of one archive stream.
#[derive(Parser)]
struct Args {
    /// Archive file to read
    input: PathBuf,
    /// Stream to export: session or events
    #[arg(long, default_value = "session")]
    stream: Stream,
    /// Frame field holding the capture time
    #[arg(long, default_value = deltarec::config::DEFAULT_TIMESTAMP_FIELD)]
    time_field: String,
    /// Optional CSV output path
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Optional JSON output path
    #[arg(long)]
    json: Option<PathBuf>,
}

#[derive(Serialize)]
struct Row {
    index: usize,
    bytes: usize,
    patch_bytes: usize,
    timestamp: Option<String>,
}

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    if args.csv.is_none() && args.json.is_none() {
        return Err(simple_cli_error("nothing to do: pass --csv and/or --json").into());
    }

    let config = Config { timestamp_field: args.time_field.clone(), ..Config::default() };
    let archive = Archive::load_with_config(&args.input, config, None)
        .map_err(|e| archive_cli_error("loading archive", e))?;
    let record = archive.record(args.stream);
    let patches = record.patches();

    let mut rows = Vec::with_capacity(record.frame_count());
    for index in 0..record.frame_count() {
        let frame = record.frame(index).map_err(|e| archive_cli_error("reading frame", e))?;
        let timestamp = match record.time_of(index) {
            Ok(ts) => Some(ts.to_rfc3339()),
            Err(ArchiveError::Timestamp { .. }) => None,
            Err(e) => return Err(archive_cli_error("reading timestamp", e).into()),
        };
        // frame 0 is stored raw, every later frame as the patch leading to it
        let patch_bytes = if index == 0 { frame.len() } else { patches[index - 1].len() };
        rows.push(Row { index, bytes: frame.len(), patch_bytes, timestamp });
    }

    if let Some(path) = &args.csv {
        let f = File::create(path).map_err(|e| io_cli_error("creating csv", path, e))?;
        let mut wtr = csv::Writer::from_writer(f);
        for row in &rows {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
    }
    if let Some(path) = &args.json {
        let f = File::create(path).map_err(|e| io_cli_error("creating json", path, e))?;
        serde_json::to_writer_pretty(f, &rows)?;
    }
    println!("{} {} frames exported", rows.len(), args.stream);
    Ok(())
}
