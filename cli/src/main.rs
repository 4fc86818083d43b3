//! `templog` — encode, decode, and query templated log archives.
//!
//! Thin front end over the `templog` library: argument parsing, file I/O,
//! and exit-code mapping live here; every encoding/decoding/query decision
//! is made by the library (spec.md §6's external CLI contract).

use std::fs;
use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use templog::config::{EncodeMode, EncodeOptions, QueryOptions};
use templog::{Error, Index};

#[derive(Parser, Debug)]
#[command(name = "templog", version, about = "Templated, packet-framed log archive codec")]
struct Opt {
    #[command(subcommand)]
    command: Command,

    /// Increase log verbosity; repeat for more (-v, -vv, -vvv).
    #[arg(short = 'v', long = "verbose", global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mine templates out of a log file and build a blob.
    Encode {
        /// Which container variant to build.
        #[arg(long, value_enum, default_value_t = ModeArg::Query)]
        mode: ModeArg,
        /// Path to the raw log file, one line per record.
        #[arg(long)]
        log: PathBuf,
        /// Path to write the encoded blob to.
        #[arg(long)]
        out: PathBuf,
        /// Only read the first N lines of `--log`.
        #[arg(long)]
        lines: Option<usize>,
        /// Path to a template bank CSV (`EventId,EventTemplate`); omit for
        /// an empty bank, where every line is carried as unknown.
        #[arg(long)]
        tpl: Option<PathBuf>,
        /// zstd compressor level, 1-22.
        #[arg(long)]
        zstd: Option<i32>,
        /// Maximum rows per packet.
        #[arg(long = "packet-events")]
        packet_events: Option<u32>,
    },
    /// Decode every line out of a blob, one per output line.
    Decode {
        /// Path to the encoded blob.
        #[arg(long)]
        input: PathBuf,
        /// Path to write the decoded lines to.
        #[arg(long)]
        out: PathBuf,
    },
    /// Search a blob by keyword without fully decompressing it.
    Query {
        /// Path to the encoded blob.
        #[arg(long)]
        input: PathBuf,
        /// Query terms.
        #[arg(long = "q")]
        q: String,
        /// Stop after this many hits.
        #[arg(long)]
        limit: Option<usize>,
        /// Match any query term instead of requiring all of them.
        #[arg(long)]
        any: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    /// Large packets, optimized for compression ratio.
    Archival,
    /// Small packets, optimized for selective decode.
    Query,
    /// Carries a trained shared compression dictionary.
    Dict,
}

impl From<ModeArg> for EncodeMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Archival => EncodeMode::Archival,
            ModeArg::Query => EncodeMode::Query,
            ModeArg::Dict => EncodeMode::Dict,
        }
    }
}

fn main() -> ExitCode {
    let opt = Opt::parse();
    stderrlog::new()
        .module(module_path!())
        .module("templog")
        .quiet(false)
        .verbosity(usize::from(opt.verbose) + 1)
        .timestamp(stderrlog::Timestamp::Second)
        .init()
        .expect("logger can only be initialized once");

    match run(opt.command) {
        Ok(code) => code,
        Err(e) => {
            report_error(&e);
            exit_code_for(&e)
        }
    }
}

fn run(command: Command) -> Result<ExitCode, Error> {
    match command {
        Command::Encode { mode, log, out, lines, tpl, zstd, packet_events } => {
            run_encode(mode, &log, &out, lines, tpl.as_deref(), zstd, packet_events)
        }
        Command::Decode { input, out } => run_decode(&input, &out),
        Command::Query { input, q, limit, any } => run_query(&input, &q, limit, any),
    }
}

fn run_encode(
    mode: ModeArg,
    log_path: &std::path::Path,
    out_path: &std::path::Path,
    lines_limit: Option<usize>,
    tpl_path: Option<&std::path::Path>,
    zstd: Option<i32>,
    packet_events: Option<u32>,
) -> Result<ExitCode, Error> {
    let log_text = fs::read_to_string(log_path)?;
    let mut lines: Vec<String> = log_text.lines().map(str::to_string).collect();
    if let Some(n) = lines_limit {
        lines.truncate(n);
    }

    let tpl_text = match tpl_path {
        Some(p) => fs::read_to_string(p)?,
        None => "EventId,EventTemplate\n".to_string(),
    };

    let mut opts = EncodeOptions::for_mode(mode.into());
    if let Some(level) = zstd {
        opts.zstd_level = level;
    }
    if let Some(pe) = packet_events {
        opts.packet_events = pe;
    }

    let blob = templog::encode(&lines, &tpl_text, &opts)?;
    log::debug!("encoded {} lines into {} bytes", lines.len(), blob.len());
    fs::write(out_path, blob)?;
    Ok(ExitCode::from(0))
}

fn run_decode(input_path: &std::path::Path, out_path: &std::path::Path) -> Result<ExitCode, Error> {
    let blob = fs::read(input_path)?;
    let index = Index::build(&blob)?;
    let lines = templog::decode_all(&index, &blob)?;

    let mut out = fs::File::create(out_path)?;
    for line in &lines {
        writeln!(out, "{line}")?;
    }
    Ok(ExitCode::from(0))
}

fn run_query(input_path: &std::path::Path, q: &str, limit: Option<usize>, any: bool) -> Result<ExitCode, Error> {
    let blob = fs::read(input_path)?;
    let index = Index::build(&blob)?;

    let opts = QueryOptions {
        limit: limit.unwrap_or(usize::MAX),
        require_all_terms: !any,
    };
    let hits = templog::query(&index, &blob, q, &opts)?;
    for line in &hits {
        println!("{line}");
    }
    Ok(ExitCode::from(if hits.is_empty() { 1 } else { 0 }))
}

fn report_error(e: &Error) {
    match e {
        Error::Malformed { what, offset } => {
            eprintln!("error: malformed {what} at offset {offset}");
        }
        Error::Truncated { needed, available } => {
            eprintln!("error: truncated: needed {needed} bytes, only {available} available");
        }
        Error::Corrupt { reason } => {
            eprintln!("error: corrupt blob: {reason}");
        }
        other => eprintln!("error: {other}"),
    }
}

fn exit_code_for(e: &Error) -> ExitCode {
    match e {
        Error::BadArgument(_) => ExitCode::from(2),
        Error::Malformed { .. } | Error::Truncated { .. } | Error::Corrupt { .. } => ExitCode::from(3),
        Error::Io(_) | Error::Compressor(_) | Error::InvalidTemplateBank(_) => ExitCode::from(2),
    }
}
