//! Wordlist feed CLI.
//!
//! Drives the feed lifecycle the same way the compute engine does, which
//! makes it useful for warming the seek index cache and for checking how a
//! keyspace splits across devices.
//!
//! # Usage
//!
//! ```text
//! wordfeed keyspace <wordlist> [FLAGS]
//! wordfeed stream   <wordlist> [--skip=N] [--limit=N] [--devices=N] [FLAGS]
//! ```
//!
//! Candidates go to stdout, one per line, in device order. Cache events go
//! to stderr as JSONL.
//!
//! # Exit Codes
//!
//! - `0`: Success
//! - `1`: Feed error (I/O, range)
//! - `2`: Invalid arguments or configuration error

use std::env;
use std::ffi::OsString;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use wordfeed::{
    plugin_by_name, EventSink, FeedConfig, FeedError, FeedErrorKind, FeedHost, JsonlEventSink,
    PW_MAX,
};

enum Command {
    Keyspace,
    Stream,
}

struct Args {
    command: Command,
    wordlist: String,
    feed: String,
    skip: u64,
    limit: Option<u64>,
    devices: usize,
    cache_dir: Option<PathBuf>,
    step: Option<u64>,
    no_cache: bool,
    quiet: bool,
}

fn print_usage(exe: &std::ffi::OsStr) {
    eprintln!(
        "usage: {0} keyspace <wordlist> [FLAGS]
       {0} stream <wordlist> [--skip=N] [--limit=N] [--devices=N] [FLAGS]

FLAGS:
    --feed=<NAME>           Feed plugin: wordlist (default) or null
    --cache-dir=<DIR>       Seek index cache directory
    --step=<N>              Seek index sampling interval in lines
    --no-cache              Do not load or persist the seek index
    --quiet                 Suppress cache events
    --help, -h              Show this help message",
        exe.to_string_lossy()
    );
}

fn parse_num<T: std::str::FromStr>(flag: &str, value: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("invalid {flag} value: {value}"))
}

fn parse_args(args: impl Iterator<Item = OsString>) -> Result<Option<Args>, String> {
    let mut command = None;
    let mut wordlist = None;
    let mut parsed = Args {
        command: Command::Keyspace,
        wordlist: String::new(),
        feed: "wordlist".to_string(),
        skip: 0,
        limit: None,
        devices: 1,
        cache_dir: None,
        step: None,
        no_cache: false,
        quiet: false,
    };

    for arg in args {
        let arg = arg
            .into_string()
            .map_err(|arg| format!("argument is not valid UTF-8: {}", arg.to_string_lossy()))?;
        if let Some(value) = arg.strip_prefix("--skip=") {
            parsed.skip = parse_num("--skip", value)?;
        } else if let Some(value) = arg.strip_prefix("--limit=") {
            parsed.limit = Some(parse_num("--limit", value)?);
        } else if let Some(value) = arg.strip_prefix("--devices=") {
            let n: usize = parse_num("--devices", value)?;
            if n == 0 {
                return Err("--devices must be >= 1".to_string());
            }
            parsed.devices = n;
        } else if let Some(value) = arg.strip_prefix("--step=") {
            parsed.step = Some(parse_num("--step", value)?);
        } else if let Some(value) = arg.strip_prefix("--cache-dir=") {
            parsed.cache_dir = Some(PathBuf::from(value));
        } else if let Some(value) = arg.strip_prefix("--feed=") {
            parsed.feed = value.to_string();
        } else {
            match arg.as_str() {
                "--no-cache" => parsed.no_cache = true,
                "--quiet" => parsed.quiet = true,
                "--help" | "-h" => return Ok(None),
                flag if flag.starts_with("--") => return Err(format!("unknown flag: {flag}")),
                "keyspace" if command.is_none() => command = Some(Command::Keyspace),
                "stream" if command.is_none() => command = Some(Command::Stream),
                _ if command.is_none() => return Err(format!("unknown command: {arg}")),
                _ if wordlist.is_none() => wordlist = Some(arg),
                _ => return Err(format!("unexpected argument: {arg}")),
            }
        }
    }

    parsed.command = command.ok_or("missing command")?;
    match (wordlist, parsed.feed.as_str()) {
        (Some(path), _) => parsed.wordlist = path,
        (None, "null") => {}
        (None, _) => return Err("missing <wordlist>".to_string()),
    }
    Ok(Some(parsed))
}

fn feed_config(args: &Args) -> FeedConfig {
    let mut workv = vec![args.feed.clone()];
    if !args.wordlist.is_empty() {
        workv.push(args.wordlist.clone());
    }
    let mut config = FeedConfig::from_env(workv).quiet(args.quiet);
    if let Some(dir) = &args.cache_dir {
        config = config.with_cache_dir(dir);
    }
    if let Some(step) = args.step {
        config = config.with_seek_step(step);
    }
    if args.no_cache {
        config = config.without_cache();
    }
    config
}

/// Splits `[start, end)` into `parts` contiguous slices, front-loading the
/// remainder.
fn partition(start: u64, end: u64, parts: usize) -> Vec<(u64, u64)> {
    let total = end.saturating_sub(start);
    let parts = parts as u64;
    let base = total / parts;
    let extra = total % parts;
    let mut next = start;
    (0..parts)
        .map(|i| {
            let count = base + u64::from(i < extra);
            let slice = (next, count);
            next += count;
            slice
        })
        .collect()
}

/// Streams one device's slice into a buffer, one candidate per line.
fn drain_device(
    host: &FeedHost,
    device: usize,
    start: u64,
    count: u64,
) -> Result<Vec<u8>, FeedError> {
    let mut out = Vec::new();
    if count == 0 {
        return Ok(out);
    }
    let mut feed = host.thread_init(device)?;
    feed.seek(start)?;
    let mut buf = [0u8; PW_MAX];
    for _ in 0..count {
        match feed.next(&mut buf) {
            Ok(len) => {
                out.extend_from_slice(&buf[..len]);
                out.push(b'\n');
            }
            Err(err) if err.is_end_of_input() => break,
            Err(err) => return Err(err),
        }
    }
    feed.term();
    Ok(out)
}

/// Writes per-device output in device order and flushes.
///
/// A closed pipe ends output quietly; any other write or flush failure is
/// an I/O error.
fn write_outputs<W: Write>(
    out: &mut W,
    outputs: Vec<Result<Vec<u8>, FeedError>>,
) -> Result<(), FeedError> {
    let stdout_err = |err: io::Error| FeedError::io(Path::new("<stdout>"), err);
    for output in outputs {
        let bytes = output?;
        match out.write_all(&bytes) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::BrokenPipe => return Ok(()),
            Err(err) => return Err(stdout_err(err)),
        }
    }
    match out.flush() {
        Err(err) if err.kind() != io::ErrorKind::BrokenPipe => Err(stdout_err(err)),
        _ => Ok(()),
    }
}

fn run(args: &Args, events: Arc<dyn EventSink>) -> Result<(), FeedError> {
    let plugin = plugin_by_name(&args.feed)
        .ok_or_else(|| FeedError::config(format!("unknown feed: {}", args.feed)))?;
    let mut host = FeedHost::global_init(plugin, feed_config(args), events)?;
    let keyspace = host.global_keyspace()?;

    match args.command {
        Command::Keyspace => {
            println!("{keyspace}");
        }
        Command::Stream => {
            if keyspace == u64::MAX && args.limit.is_none() {
                return Err(FeedError::config("unbounded keyspace requires --limit"));
            }
            let end = match args.limit {
                Some(limit) => args.skip.saturating_add(limit).min(keyspace),
                None => keyspace,
            };
            let slices = partition(args.skip, end, args.devices);

            let host_ref = &host;
            let outputs: Vec<Result<Vec<u8>, FeedError>> = std::thread::scope(|scope| {
                let handles: Vec<_> = slices
                    .iter()
                    .enumerate()
                    .map(|(device, &(start, count))| {
                        scope.spawn(move || drain_device(host_ref, device, start, count))
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|handle| {
                        handle
                            .join()
                            .unwrap_or_else(|_| Err(FeedError::range("device thread panicked")))
                    })
                    .collect()
            });

            write_outputs(&mut io::stdout().lock(), outputs)?;
        }
    }

    host.global_term();
    Ok(())
}

fn main() -> ExitCode {
    let mut args = env::args_os();
    let exe = args.next().unwrap_or_else(|| "wordfeed".into());

    let parsed = match parse_args(args) {
        Ok(Some(parsed)) => parsed,
        Ok(None) => {
            print_usage(&exe);
            return ExitCode::SUCCESS;
        }
        Err(msg) => {
            eprintln!("error: {msg}");
            eprintln!();
            print_usage(&exe);
            return ExitCode::from(2);
        }
    };

    let events: Arc<dyn EventSink> = Arc::new(JsonlEventSink::new(io::stderr()));
    match run(&parsed, Arc::clone(&events)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            events.flush();
            eprintln!("error: {err}");
            if err.kind() == FeedErrorKind::Config {
                ExitCode::from(2)
            } else {
                ExitCode::from(1)
            }
        }
    }
}
