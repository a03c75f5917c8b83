// Command-line front end.
//
// `unpack` is the batch driver: it expands directories, feeds every file
// through one `Unpacker`, reports failures and keeps going. When no argument
// file succeeded (or with `--multi`) it falls back to an interactive prompt
// that accepts paths typed or dropped into the terminal.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;

use bitflags::bitflags;
use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};

use crate::asset::{self, AssetDescriptor};
use crate::container::{self, DEFAULT_CAPACITY, HEADER_LEN};
use crate::engine::{RunSummary, UnpackOptions, Unpacker};
use crate::error::Error;
use crate::extract::{DDS_SIGNATURE, DEFAULT_MAP_EXTENSION, find_signature};
use crate::io::{DUMP_FILE_NAME, hex_digest};
use crate::report::{ERROR_LOG_NAME, ErrorReporter};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Line that ends the interactive prompt.
const DONE_COMMAND: &str = "--done";

/// Interactive lines this short cannot name an asset and are ignored.
const MIN_PROMPT_LEN: usize = 5;

const EXIT_OK: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_FILES_FAILED: i32 = 2;

// ---------------------------------------------------------------------------
// Byte size parsing (supports K, M, G suffixes)
// ---------------------------------------------------------------------------

fn parse_byte_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".into());
    }
    let (num_part, multiplier) = match s.as_bytes().last() {
        Some(b'k' | b'K') => (&s[..s.len() - 1], 1024u64),
        Some(b'm' | b'M') => (&s[..s.len() - 1], 1024 * 1024),
        Some(b'g' | b'G') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s, 1u64),
    };
    let num: u64 = num_part
        .trim()
        .parse()
        .map_err(|e| format!("invalid size '{s}': {e}"))?;
    let size = num
        .checked_mul(multiplier)
        .ok_or_else(|| format!("size overflow: '{s}'"))?;
    if size < HEADER_LEN as u64 {
        return Err(format!("capacity must be at least {HEADER_LEN} bytes"));
    }
    Ok(size)
}

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Game asset container decoder.
#[derive(Parser, Debug)]
#[command(
    name = "bagunpack",
    version,
    about = "Decompress game asset containers and extract DDS textures",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Quiet mode (suppress progress output and stderr failure lines).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Decompress files and directories of containers.
    Unpack(UnpackArgs),
    /// Print the header and block table of one container.
    Inspect(InspectArgs),
    /// Print build/configuration details.
    Config,
}

#[derive(Args, Debug)]
struct UnpackArgs {
    /// Container files, or directories whose four-letter-extension files
    /// are all processed.
    #[arg(value_hint = ValueHint::AnyPath)]
    paths: Vec<PathBuf>,

    /// Append every decoded container to one dump file instead of extracting.
    #[arg(long)]
    dump: bool,

    /// Keep prompting for more paths after the arguments are processed.
    #[arg(long)]
    multi: bool,

    /// Directory for extracted files, the dump file and the error log.
    #[arg(long, short = 'o', value_hint = ValueHint::DirPath)]
    out: Option<PathBuf>,

    /// Arena capacity: largest compressed or decoded file (supports K/M/G suffix).
    #[arg(long, value_parser = parse_byte_size, default_value_t = DEFAULT_CAPACITY as u64)]
    capacity: u64,

    /// Extension treated as a map asset with an embedded DDS texture
    /// (repeatable; default: bmap).
    #[arg(long = "map-ext", value_name = "EXT", action = ArgAction::Append)]
    map_extensions: Vec<String>,

    /// Append failure lines to this file instead of <out>/error.txt.
    #[arg(long = "error-log", value_hint = ValueHint::FilePath, conflicts_with = "no_error_log")]
    error_log: Option<PathBuf>,

    /// Do not write an error log file.
    #[arg(long = "no-error-log")]
    no_error_log: bool,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Container file.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Arena capacity used to trial-decode the container.
    #[arg(long, value_parser = parse_byte_size, default_value_t = DEFAULT_CAPACITY as u64)]
    capacity: u64,
}

// ---------------------------------------------------------------------------
// Resolved command + options (flattened from Cli)
// ---------------------------------------------------------------------------

bitflags! {
    /// Run-wide unpack behaviour.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    struct RunMode: u8 {
        /// Aggregate everything into the dump file.
        const DUMP = 1 << 0;
        /// Prompt for more paths even after processing arguments.
        const MULTI = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Unpack,
    Inspect,
    Config,
}

struct Options {
    command: Command,
    quiet: bool,
    verbose: u8,
    json_output: bool,
    mode: RunMode,
    paths: Vec<PathBuf>,
    out_dir: Option<PathBuf>,
    capacity: u64,
    map_extensions: Vec<String>,
    error_log: Option<PathBuf>,
}

fn normalize_extensions(exts: Vec<String>) -> Vec<String> {
    let exts: Vec<String> = exts
        .into_iter()
        .map(|e| e.trim().trim_start_matches('.').to_string())
        .filter(|e| !e.is_empty())
        .collect();
    if exts.is_empty() {
        vec![DEFAULT_MAP_EXTENSION.to_string()]
    } else {
        exts
    }
}

fn resolve_options(cli: Cli) -> Options {
    let quiet = cli.quiet;
    let verbose = cli.verbose.min(2);
    let json_output = cli.json_output;

    match cli.command {
        Cmd::Unpack(args) => {
            let mut mode = RunMode::empty();
            mode.set(RunMode::DUMP, args.dump);
            mode.set(RunMode::MULTI, args.multi);

            let error_log = if args.no_error_log {
                None
            } else {
                Some(args.error_log.unwrap_or_else(|| {
                    args.out
                        .as_deref()
                        .unwrap_or(Path::new("."))
                        .join(ERROR_LOG_NAME)
                }))
            };

            Options {
                command: Command::Unpack,
                quiet,
                verbose,
                json_output,
                mode,
                paths: args.paths,
                out_dir: args.out,
                capacity: args.capacity,
                map_extensions: normalize_extensions(args.map_extensions),
                error_log,
            }
        }
        Cmd::Inspect(args) => Options {
            command: Command::Inspect,
            quiet,
            verbose,
            json_output,
            mode: RunMode::empty(),
            paths: vec![args.input],
            out_dir: None,
            capacity: args.capacity,
            map_extensions: normalize_extensions(Vec::new()),
            error_log: None,
        },
        Cmd::Config => Options {
            command: Command::Config,
            quiet,
            verbose,
            json_output,
            mode: RunMode::empty(),
            paths: Vec::new(),
            out_dir: None,
            capacity: DEFAULT_CAPACITY as u64,
            map_extensions: normalize_extensions(Vec::new()),
            error_log: None,
        },
    }
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("bagunpack".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let _ = resolve_options(cli);
    }
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config() -> i32 {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("bagunpack version {version}");

    let file_io = cfg!(feature = "file-io") as u8;
    let ptr_size = std::mem::size_of::<*const ()>();

    eprintln!("FILE_IO={file_io}");
    eprintln!("DEFAULT_CAPACITY={DEFAULT_CAPACITY}");
    eprintln!("HEADER_LEN={HEADER_LEN}");
    eprintln!("MAP_EXTENSION={DEFAULT_MAP_EXTENSION}");
    eprintln!("DUMP_FILE_NAME={DUMP_FILE_NAME}");
    eprintln!("ERROR_LOG_NAME={ERROR_LOG_NAME}");
    eprintln!("sizeof(usize)={ptr_size}");

    EXIT_OK
}

// ---------------------------------------------------------------------------
// Inspect command
// ---------------------------------------------------------------------------

fn cmd_inspect(opts: &Options) -> i32 {
    let Some(path) = opts.paths.first() else {
        eprintln!("bagunpack: inspect requires an input file");
        return EXIT_ERROR;
    };
    let Ok(capacity) = usize::try_from(opts.capacity) else {
        eprintln!("bagunpack: capacity {} too large", opts.capacity);
        return EXIT_ERROR;
    };

    let input = match fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("bagunpack: {}: {e}", path.display());
            return EXIT_ERROR;
        }
    };

    let (header, blocks) = match container::scan_blocks(&input) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("bagunpack: {}: {e}", path.display());
            return EXIT_ERROR;
        }
    };

    let header_hex: Vec<String> = header.raw.iter().map(|b| format!("{b:02x}")).collect();
    println!(
        "Container version:        {} (0x{:02x})",
        header.version.name(),
        header.version.tag()
    );
    println!("Header bytes:             {}", header_hex.join(" "));
    println!(
        "Block length field:       {} bytes",
        header.version.length_field_width()
    );
    println!("Compressed size:          {}", input.len());
    println!("Blocks:                   {}", blocks.len());
    for (i, block) in blocks.iter().enumerate() {
        println!(
            "  block {i:<5} offset {:<10} length {}",
            block.offset, block.declared_len
        );
    }

    let decoded = match container::decode_to_vec(&input, capacity) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("bagunpack: {}: decode: {e}", path.display());
            return EXIT_ERROR;
        }
    };
    let signature = find_signature(&decoded, &DDS_SIGNATURE);
    println!("Decoded size:             {}", decoded.len());
    match signature {
        Some(offset) => println!("DDS signature offset:     {offset}"),
        None => println!("DDS signature offset:     none"),
    }

    if opts.json_output {
        let json = serde_json::json!({
            "command": "inspect",
            "version": header.version.name(),
            "compressed_size": input.len(),
            "decoded_size": decoded.len(),
            "blocks": blocks.len(),
            "dds_offset": signature,
        });
        match serde_json::to_string_pretty(&json) {
            Ok(s) => eprintln!("{s}"),
            Err(e) => log::warn!("cannot render JSON stats: {e}"),
        }
    }

    EXIT_OK
}

// ---------------------------------------------------------------------------
// Unpack command (batch driver)
// ---------------------------------------------------------------------------

struct Batch {
    unpacker: Unpacker,
    reporter: ErrorReporter,
    quiet: bool,
    verbose: u8,
}

impl Batch {
    /// Process one path argument: a directory expands to its assets.
    fn process_arg(&mut self, raw: &str) {
        let path = asset::sanitize_path(raw);
        if !path.is_dir() {
            self.process_file(raw);
            return;
        }

        match asset::list_assets(&path) {
            Ok(files) => {
                log::info!("{}: {} assets", path.display(), files.len());
                for file in files {
                    self.process_file(&file.to_string_lossy());
                }
            }
            Err(e) => {
                let name = path.display().to_string();
                self.reporter.report(&name, &Error::Io(e));
            }
        }
    }

    fn process_file(&mut self, raw: &str) {
        match self.unpacker.unpack_path(raw) {
            Ok(report) => {
                if !self.quiet {
                    println!("done");
                    if self.verbose > 0 {
                        println!(
                            "  {} -> {} ({} bytes)",
                            report.asset.file_name,
                            report.output.path.display(),
                            report.output.bytes
                        );
                        if let Some(digest) = &report.output.sha256 {
                            println!("  sha256 {}", hex_digest(digest));
                        }
                    }
                    let _ = io::stdout().flush();
                }
            }
            Err(e) => {
                let name = AssetDescriptor::from_path(asset::sanitize_path(raw)).file_name;
                self.reporter.report(&name, &e);
            }
        }
    }

    /// Read paths from `input` until `--done` or end of input.
    fn prompt<R: BufRead, W: Write>(&mut self, mut input: R, mut out: W) -> io::Result<()> {
        writeln!(
            out,
            "Enter a file path to decompress, or drag and drop a file into the console."
        )?;
        writeln!(out, "Enter {DONE_COMMAND} to exit.")?;

        let mut line = String::new();
        loop {
            writeln!(out, "path?")?;
            out.flush()?;

            line.clear();
            if input.read_line(&mut line)? == 0 {
                return Ok(());
            }
            let entry = line.trim_end_matches(['\r', '\n']);
            if entry.len() <= MIN_PROMPT_LEN {
                continue;
            }
            if entry.trim() == DONE_COMMAND {
                return Ok(());
            }
            self.process_arg(entry);
        }
    }
}

/// Prompt for more paths when nothing from the arguments succeeded, or
/// when `--multi` asks for it.
fn wants_prompt(summary: &RunSummary, mode: RunMode) -> bool {
    summary.succeeded == 0 || mode.contains(RunMode::MULTI)
}

fn cmd_unpack(opts: &Options) -> i32 {
    let Ok(capacity) = usize::try_from(opts.capacity) else {
        eprintln!("bagunpack: capacity {} too large", opts.capacity);
        return EXIT_ERROR;
    };

    if let Some(dir) = &opts.out_dir
        && let Err(e) = fs::create_dir_all(dir)
    {
        eprintln!("bagunpack: output directory {}: {e}", dir.display());
        return EXIT_ERROR;
    }

    let reporter = match &opts.error_log {
        Some(path) => ErrorReporter::with_log(path),
        None => ErrorReporter::default(),
    }
    .quiet(opts.quiet);

    let mut batch = Batch {
        unpacker: Unpacker::new(UnpackOptions {
            capacity,
            dump: opts.mode.contains(RunMode::DUMP),
            out_dir: opts.out_dir.clone(),
            map_extensions: opts.map_extensions.clone(),
        }),
        reporter,
        quiet: opts.quiet,
        verbose: opts.verbose,
    };

    for path in &opts.paths {
        batch.process_arg(&path.to_string_lossy());
    }

    if wants_prompt(batch.unpacker.summary(), opts.mode) {
        let stdin = io::stdin();
        if let Err(e) = batch.prompt(stdin.lock(), io::stdout().lock()) {
            eprintln!("bagunpack: prompt: {e}");
        }
    }

    let summary = match batch.unpacker.finish() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("bagunpack: closing dump file: {e}");
            return EXIT_ERROR;
        }
    };

    print_summary(opts, &summary);

    if summary.failed > 0 {
        EXIT_FILES_FAILED
    } else {
        EXIT_OK
    }
}

fn print_summary(opts: &Options, summary: &RunSummary) {
    if !opts.quiet {
        eprintln!(
            "bagunpack: {} of {} files unpacked",
            summary.succeeded, summary.processed
        );
        if let Some(dump) = &summary.dump_file {
            eprintln!("bagunpack: dump written to {}", dump.display());
        }
    }

    if opts.json_output {
        let json = serde_json::json!({
            "command": "unpack",
            "processed": summary.processed,
            "succeeded": summary.succeeded,
            "failed": summary.failed,
            "bytes_read": summary.bytes_read,
            "bytes_inflated": summary.bytes_inflated,
            "bytes_written": summary.bytes_written,
            "dump_file": summary.dump_file.as_ref().map(|p| p.display().to_string()),
        });
        match serde_json::to_string_pretty(&json) {
            Ok(s) => eprintln!("{s}"),
            Err(e) => log::warn!("cannot render JSON stats: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn init_logging(quiet: bool, verbose: u8) {
    let default_filter = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    let cli = Cli::parse();
    let opts = resolve_options(cli);
    init_logging(opts.quiet, opts.verbose);

    let exit_code = match opts.command {
        Command::Unpack => cmd_unpack(&opts),
        Command::Inspect => cmd_inspect(&opts),
        Command::Config => cmd_config(),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_opts(args: &[&str]) -> Options {
        let argv: Vec<String> = std::iter::once("bagunpack".to_string())
            .chain(args.iter().map(|s| s.to_string()))
            .collect();
        let cli = Cli::try_parse_from(argv).expect("cli parse failed");
        resolve_options(cli)
    }

    fn test_batch(out: &Path) -> Batch {
        Batch {
            unpacker: Unpacker::new(UnpackOptions {
                out_dir: Some(out.to_path_buf()),
                ..Default::default()
            }),
            reporter: ErrorReporter::default().quiet(true),
            quiet: true,
            verbose: 0,
        }
    }

    #[test]
    fn parse_byte_size_suffixes() {
        assert_eq!(parse_byte_size("64").unwrap(), 64);
        assert_eq!(parse_byte_size("2K").unwrap(), 2 * 1024);
        assert_eq!(parse_byte_size("3m").unwrap(), 3 * 1024 * 1024);
        assert_eq!(parse_byte_size("4G").unwrap(), 4 * 1024 * 1024 * 1024);
        assert!(parse_byte_size("").is_err());
        assert!(parse_byte_size("8").is_err());
    }

    #[test]
    fn unpack_flags_map_to_run_mode() {
        let opts = parse_opts(&["unpack", "--dump", "--multi", "a.bmap", "dir"]);
        assert_eq!(opts.command, Command::Unpack);
        assert!(opts.mode.contains(RunMode::DUMP | RunMode::MULTI));
        assert_eq!(
            opts.paths,
            vec![PathBuf::from("a.bmap"), PathBuf::from("dir")]
        );

        let plain = parse_opts(&["unpack", "a.bmap"]);
        assert!(plain.mode.is_empty());
    }

    #[test]
    fn error_log_defaults_to_out_dir() {
        let opts = parse_opts(&["unpack", "--out", "/tmp/extracted", "a.bmap"]);
        assert_eq!(
            opts.error_log,
            Some(PathBuf::from("/tmp/extracted").join(ERROR_LOG_NAME))
        );

        let opts = parse_opts(&["unpack", "--no-error-log", "a.bmap"]);
        assert!(opts.error_log.is_none());

        let opts = parse_opts(&["unpack", "--error-log", "log.txt", "a.bmap"]);
        assert_eq!(opts.error_log, Some(PathBuf::from("log.txt")));
    }

    #[test]
    fn map_extensions_are_normalized() {
        let opts = parse_opts(&["unpack", "--map-ext", ".BMAP", "--map-ext", "tmap"]);
        assert_eq!(opts.map_extensions, vec!["BMAP", "tmap"]);
        assert_eq!(
            parse_opts(&["unpack"]).map_extensions,
            vec![DEFAULT_MAP_EXTENSION]
        );
    }

    #[test]
    fn capacity_flag() {
        let opts = parse_opts(&["unpack", "--capacity", "1M"]);
        assert_eq!(opts.capacity, 1024 * 1024);
        assert_eq!(
            parse_opts(&["unpack"]).capacity,
            DEFAULT_CAPACITY as u64
        );
    }

    #[test]
    fn verbose_is_capped() {
        let opts = parse_opts(&["-v", "-v", "-v", "unpack"]);
        assert_eq!(opts.verbose, 2);
    }

    #[test]
    fn inspect_and_config_map() {
        let opts = parse_opts(&["inspect", "x.bmap"]);
        assert_eq!(opts.command, Command::Inspect);
        assert_eq!(opts.paths, vec![PathBuf::from("x.bmap")]);
        assert_eq!(parse_opts(&["config"]).command, Command::Config);
    }

    #[test]
    fn prompt_stops_at_done_and_skips_short_lines() {
        let out_dir = tempfile::tempdir().unwrap();
        let mut batch = test_batch(out_dir.path());
        let input = b"abc\n\n--done\n/not/processed.bmap\n";
        let mut out = Vec::new();
        batch.prompt(&input[..], &mut out).unwrap();

        assert_eq!(batch.unpacker.summary().processed, 0);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("path?").count(), 3);
    }

    #[test]
    fn prompt_processes_paths_until_eof() {
        let out_dir = tempfile::tempdir().unwrap();
        let mut batch = test_batch(out_dir.path());
        let input = b"'/missing/one.bmap'\r\n/missing/two.bmsh\n";
        batch.prompt(&input[..], io::sink()).unwrap();

        let summary = batch.unpacker.summary();
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.failed, 2);
    }

    #[test]
    fn prompt_follows_failed_arguments() {
        let failed = RunSummary {
            processed: 2,
            failed: 2,
            ..Default::default()
        };
        assert!(wants_prompt(&failed, RunMode::empty()));

        let ok = RunSummary {
            processed: 2,
            succeeded: 1,
            failed: 1,
            ..Default::default()
        };
        assert!(!wants_prompt(&ok, RunMode::empty()));
        assert!(wants_prompt(&ok, RunMode::MULTI));
        assert!(wants_prompt(&RunSummary::default(), RunMode::DUMP));
    }

    #[test]
    fn fuzz_hook_tolerates_garbage() {
        fuzz_try_parse_args(&["--bogus".to_string(), "\u{0}".to_string()]);
        fuzz_try_parse_args(&[]);
    }
}
