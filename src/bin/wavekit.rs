use clap::{Args, Parser, Subcommand};
use log::{info, LevelFilter};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;

use wavekit::fix::check as fix_check;
use wavekit::hash::format_hash_line;
use wavekit::report::len_banner;
use wavekit::{
    cat_file, cmp_files, fix_files, generate_cue_sheet, generate_silence, generate_split_points, hash_composite, hash_file,
    info_report, join_files, len_line, pad_file, reorder_files, run_batch, run_each, split_file, strip_file,
    trim_file, CatParts, CmpOptions, Config, Error, FileOpener, FileOrder, FixOptions, FixShift, HashAlgorithm, LenOptions,
    LenTotals, OutputNaming, PadMode, Result, RunSummary, SizeUnit, SplitOptions, SplitPoints, StripOptions,
    TrimEnds, WaveDescriptor,
};

#[derive(Parser)]
#[command(name = "wavekit")]
#[command(about = "Lossless toolkit for RIFF/WAVE PCM files")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// More log output (repeat for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Directory for output files
    #[arg(short = 'd', long, global = true)]
    output_dir: Option<PathBuf>,

    /// Overwrite existing output files
    #[arg(short = 'O', long, global = true)]
    clobber: bool,

    /// Prefix for output file names
    #[arg(long, global = true)]
    prefix: Option<String>,

    /// Postfix for output file names
    #[arg(long, global = true)]
    postfix: Option<String>,

    /// Input file ordering for multi-file modes: none, ascii, natural
    #[arg(long, global = true)]
    order: Option<String>,

    /// Show lengths as h:mm:ss
    #[arg(long, global = true)]
    hmmss: bool,

    /// Save the given options as defaults for later runs
    #[arg(long, global = true)]
    save_defaults: bool,

    /// Print the saved defaults and exit
    #[arg(long, global = true)]
    show_saved_defaults: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show length, size and problems of each file
    Len {
        files: Vec<PathBuf>,
        /// Unit for per-file sizes: b, kb, mb, gb, tb
        #[arg(short, long, default_value = "b")]
        unit: String,
        /// Unit for the totals line
        #[arg(short = 'U', long, default_value = "b")]
        total_unit: String,
        /// Omit the column names
        #[arg(short = 'c', long)]
        no_column_names: bool,
        /// Omit the totals line
        #[arg(short = 't', long)]
        no_totals: bool,
    },
    /// Print detailed header information
    Info { files: Vec<PathBuf> },
    /// Write WAVE headers, data and extra chunks to stdout
    Cat {
        files: Vec<PathBuf>,
        /// Suppress WAVE headers
        #[arg(short = 'e', long)]
        no_header: bool,
        /// Suppress WAVE data
        #[arg(short = 'D', long)]
        no_data: bool,
        /// Suppress the NULL pad byte after odd-sized data
        #[arg(short = 'n', long)]
        no_pad: bool,
        /// Suppress extra RIFF chunks
        #[arg(short = 'c', long)]
        no_chunks: bool,
    },
    /// Move track boundaries onto CD sector boundaries
    Fix {
        files: Vec<PathBuf>,
        /// Only report whether the files need fixing
        #[arg(short, long)]
        check: bool,
        /// Also write leading files that would not change
        #[arg(short, long)]
        keep: bool,
        /// Do not pad the last file
        #[arg(short, long)]
        no_pad: bool,
        /// Boundary shift: backward, forward, round
        #[arg(short, long)]
        shift: Option<String>,
    },
    /// Join files into one, padding to a sector boundary
    Join {
        files: Vec<PathBuf>,
        /// prepad, postpad or nopad
        #[arg(short, long)]
        pad: Option<String>,
    },
    /// Split a file at the given points
    Split {
        file: PathBuf,
        /// Read split points from this file instead of stdin
        #[arg(short, long)]
        points: Option<PathBuf>,
        /// Split every LENGTH instead of reading points
        #[arg(short = 'l', long)]
        repeat: Option<String>,
        /// Only write these pieces, e.g. "1,3-5,8-"
        #[arg(short = 'x', long)]
        tracks: Option<String>,
        /// Name template using %a %p %t %n (CUE input only)
        #[arg(short = 't', long)]
        template: Option<String>,
        /// Character pairs replaced in templated names
        #[arg(short = 'm', long)]
        remap: Option<String>,
        /// Width of track numbers in names
        #[arg(short = 'n', long)]
        width: Option<usize>,
        /// Number of the first piece
        #[arg(short = 'c', long, default_value_t = 1)]
        offset: i64,
        /// Lead-in taken from the previous piece
        #[arg(short = 'i', long)]
        leadin: Option<String>,
        /// Lead-out taken from the next piece
        #[arg(short = 'o', long)]
        leadout: Option<String>,
    },
    /// Pad CD-quality files to a sector boundary
    Pad {
        files: Vec<PathBuf>,
        /// prepad or postpad
        #[arg(short, long)]
        pad: Option<String>,
    },
    /// Trim silence from the ends of each file
    Trim {
        files: Vec<PathBuf>,
        /// Only trim the beginning
        #[arg(short, long, conflicts_with = "end")]
        beginning: bool,
        /// Only trim the end
        #[arg(short, long)]
        end: bool,
    },
    /// Compare the audio data of two files
    Cmp {
        first: PathBuf,
        second: PathBuf,
        /// Look for a byte shift between the files first
        #[arg(short, long)]
        shift: bool,
        /// List every differing byte
        #[arg(short, long)]
        list: bool,
        /// Allowed mismatches while searching for a shift
        #[arg(short, long, default_value_t = 0)]
        fuzz: usize,
        /// Seconds searched for a shift
        #[arg(short = 'c', long)]
        shift_secs: Option<u64>,
    },
    /// Fingerprint the audio data
    Hash {
        files: Vec<PathBuf>,
        /// One fingerprint over all files
        #[arg(short, long)]
        composite: bool,
        /// md5 or sha1
        #[arg(short, long)]
        algorithm: Option<String>,
    },
    /// Remove non-canonical headers and trailing chunks
    Strip {
        files: Vec<PathBuf>,
        /// Keep the original header
        #[arg(short = 'k', long)]
        keep_header: bool,
        /// Keep chunks after the data chunk
        #[arg(short = 'e', long)]
        keep_chunks: bool,
    },
    /// Generate CD-quality silence
    Gen {
        /// Length of the silence
        #[arg(short, long)]
        length: String,
    },
    /// Print a CUE sheet for the files
    Cue {
        files: Vec<PathBuf>,
        /// Print split points instead
        #[arg(short, long)]
        split_points: bool,
    },
}

fn init_logging(global: &GlobalArgs) {
    let level = if global.quiet {
        LevelFilter::Warn
    } else {
        match global.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_env("RUST_LOG")
        .format_timestamp(None)
        .format_target(false)
        .init();
}

/// Options given on this command line that can be saved as defaults.
fn cmdline_config(cli: &Cli) -> Config {
    let g = &cli.global;
    let mut config = Config {
        output_dir: g.output_dir.clone(),
        clobber: g.clobber.then_some(true),
        show_hmmss: g.hmmss.then_some(true),
        order: g.order.clone(),
        ..Config::new()
    };
    match &cli.command {
        Commands::Fix { shift, .. } => config.fix_shift = shift.clone(),
        Commands::Join { pad, .. } | Commands::Pad { pad, .. } => config.pad = pad.clone(),
        Commands::Split { template, remap, width, .. } => {
            config.name_template = template.clone();
            config.remap = remap.clone();
            config.number_format_width = *width;
        }
        Commands::Cmp { shift_secs, .. } => config.shift_secs = *shift_secs,
        Commands::Hash { algorithm, .. } => config.hash = algorithm.clone(),
        _ => {}
    }
    config
}

fn builtin_defaults() -> Config {
    Config {
        clobber: Some(false),
        show_hmmss: Some(false),
        order: Some("natural".to_string()),
        pad: Some(PadMode::default().as_str().to_string()),
        fix_shift: Some(FixShift::default().as_str().to_string()),
        hash: Some(HashAlgorithm::default().as_str().to_string()),
        number_format_width: Some(2),
        shift_secs: Some(3),
        ..Config::new()
    }
}

struct Context {
    config: Config,
    opener: FileOpener,
    naming: OutputNaming,
    order: FileOrder,
}

impl Context {
    fn new(config: Config, global: &GlobalArgs) -> Result<Self> {
        let order = config.order.as_deref().unwrap_or("natural").parse()?;
        let opener = FileOpener::new(config.clobber.unwrap_or(false));
        let naming = OutputNaming {
            dir: config.output_dir.clone(),
            prefix: global.prefix.clone(),
            postfix: global.postfix.clone(),
            ..Default::default()
        };
        Ok(Context { config, opener, naming, order })
    }

    fn hmmss(&self) -> bool {
        self.config.show_hmmss.unwrap_or(false)
    }

    fn open(&self, path: &Path) -> Result<WaveDescriptor> {
        WaveDescriptor::open(&self.opener, path)
    }

    /// Open every file for a mode that needs all of them at once.
    fn open_all(&self, paths: &[PathBuf]) -> Result<Vec<WaveDescriptor>> {
        let mut files = paths.iter().map(|p| self.open(p)).collect::<Result<Vec<_>>>()?;
        reorder_files(&mut files, self.order);
        Ok(files)
    }
}

/// Leading unchanged files are skipped unless `keep` is given.
fn fix_options(config: &Config, keep: bool, no_pad: bool, naming: &OutputNaming) -> Result<FixOptions> {
    Ok(FixOptions {
        shift: config.fix_shift.as_deref().unwrap_or("backward").parse()?,
        pad: !no_pad,
        skip_unchanged: !keep,
        naming: naming.clone(),
    })
}

fn require_files(paths: &[PathBuf]) -> Result<()> {
    if paths.is_empty() {
        return Err(Error::user_input("need one or more files to process"));
    }
    Ok(())
}

fn read_split_points(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) => std::fs::read_to_string(p)
            .map_err(|e| Error::io(format!("could not open split point file [{}]", p.display()), e)),
        None => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .map_err(|e| Error::io("could not read split points from stdin", e))?;
            Ok(text)
        }
    }
}

fn summary_ok(summary: RunSummary) -> bool {
    if !summary.success() {
        info!("{} of {} files could not be processed", summary.failed, summary.processed);
    }
    summary.success()
}

fn run(ctx: &Context, command: Commands) -> Result<bool> {
    match command {
        Commands::Len {
            files,
            unit,
            total_unit,
            no_column_names,
            no_totals,
        } => {
            require_files(&files)?;
            let opts = LenOptions {
                file_unit: unit.parse::<SizeUnit>()?,
                total_unit: total_unit.parse::<SizeUnit>()?,
                suppress_column_names: no_column_names,
                suppress_totals: no_totals,
                show_hmmss: ctx.hmmss(),
            };
            if !opts.suppress_column_names {
                println!("{}", len_banner());
            }
            let mut totals = LenTotals::default();
            let summary = run_each(&files, |path| {
                let desc = ctx.open(path)?;
                println!("{}", len_line(&desc, &opts));
                totals.add(&desc);
                Ok(())
            })?;
            if !opts.suppress_totals && totals.count() > 0 {
                println!("{}", totals.line(&opts));
            }
            Ok(summary_ok(summary))
        }
        Commands::Info { files } => {
            require_files(&files)?;
            let summary = run_each(&files, |path| {
                let desc = ctx.open(path)?;
                print!("{}", info_report(&desc, ctx.hmmss()));
                Ok(())
            })?;
            Ok(summary_ok(summary))
        }
        Commands::Cat {
            files,
            no_header,
            no_data,
            no_pad,
            no_chunks,
        } => {
            require_files(&files)?;
            let parts = CatParts {
                header: !no_header,
                data: !no_data,
                pad: !no_pad,
                extra: !no_chunks,
            };
            parts.validate()?;
            let stdout = io::stdout();
            let mut out = stdout.lock();
            let summary = run_each(&files, |path| {
                let desc = ctx.open(path)?;
                cat_file(&ctx.opener, &desc, parts, &mut out)?;
                Ok(())
            })?;
            Ok(summary_ok(summary))
        }
        Commands::Fix {
            files,
            check,
            keep,
            no_pad,
            ..
        } => {
            let descs = ctx.open_all(&files)?;
            if check {
                let needs_fixing = fix_check(&descs)?;
                println!(
                    "{}",
                    if needs_fixing { "files need fixing" } else { "everything seems fine" }
                );
                return Ok(true);
            }
            let opts = fix_options(&ctx.config, keep, no_pad, &ctx.naming)?;
            let report = fix_files(&ctx.opener, descs, &opts)?;
            info!("wrote {} files", report.outputs.len());
            Ok(true)
        }
        Commands::Join { files, .. } => {
            let descs = ctx.open_all(&files)?;
            let pad = ctx.config.pad.as_deref().unwrap_or("postpad").parse::<PadMode>()?;
            join_files(&ctx.opener, &descs, pad, &ctx.naming)?;
            Ok(true)
        }
        Commands::Split {
            file,
            points,
            repeat,
            tracks,
            offset,
            leadin,
            leadout,
            ..
        } => {
            let desc = ctx.open(&file)?;
            let text;
            let points = match &repeat {
                Some(len) => SplitPoints::Repeat(len),
                None => {
                    text = read_split_points(points.as_deref())?;
                    SplitPoints::Text(&text)
                }
            };
            let opts = SplitOptions {
                leadin,
                leadout,
                tracks,
                template: ctx.config.name_template.clone(),
                remap: ctx.config.remap.clone(),
                number_width: ctx.config.number_format_width.unwrap_or(2),
                offset,
                naming: ctx.naming.clone(),
            };
            let report = split_file(&ctx.opener, &desc, points, &opts)?;
            info!("wrote {} of {} pieces", report.outputs.len(), report.pieces.len());
            Ok(true)
        }
        Commands::Pad { files, .. } => {
            require_files(&files)?;
            let mode = ctx.config.pad.as_deref().unwrap_or("postpad").parse::<PadMode>()?;
            let summary = run_each(&files, |path| {
                let desc = ctx.open(path)?;
                pad_file(&ctx.opener, &desc, mode, &ctx.naming)?;
                Ok(())
            })?;
            Ok(summary_ok(summary))
        }
        Commands::Trim { files, beginning, end } => {
            require_files(&files)?;
            let ends = match (beginning, end) {
                (true, false) => TrimEnds { beginning: true, end: false },
                (false, true) => TrimEnds { beginning: false, end: true },
                _ => TrimEnds::default(),
            };
            let summary = run_each(&files, |path| {
                let desc = ctx.open(path)?;
                trim_file(&ctx.opener, &desc, ends, &ctx.naming)?;
                Ok(())
            })?;
            Ok(summary_ok(summary))
        }
        Commands::Cmp {
            first,
            second,
            shift,
            list,
            fuzz,
            ..
        } => {
            let a = ctx.open(&first)?;
            let b = ctx.open(&second)?;
            let opts = CmpOptions {
                shift,
                list,
                fuzz,
                shift_secs: ctx.config.shift_secs.unwrap_or(3),
            };
            let comparison = cmp_files(&ctx.opener, &a, &b, &opts)?;
            if list {
                for d in &comparison.differences {
                    println!("{:10} {:3} {:3}", d.offset, d.first, d.second);
                }
            }
            println!("{}", comparison.summary());
            Ok(comparison.identical())
        }
        Commands::Hash { files, composite, .. } => {
            require_files(&files)?;
            let algorithm = ctx.config.hash.as_deref().unwrap_or("md5").parse::<HashAlgorithm>()?;
            if composite {
                let descs = ctx.open_all(&files)?;
                let hex = hash_composite(&ctx.opener, &descs, algorithm)?;
                println!("{}", format_hash_line(&hex, wavekit::hash::COMPOSITE));
                return Ok(true);
            }
            let summary = run_each(&files, |path| {
                let desc = ctx.open(path)?;
                let hex = hash_file(&ctx.opener, &desc, algorithm)?;
                println!("{}", format_hash_line(&hex, &desc.name()));
                Ok(())
            })?;
            Ok(summary_ok(summary))
        }
        Commands::Strip {
            files,
            keep_header,
            keep_chunks,
        } => {
            require_files(&files)?;
            let opts = StripOptions {
                header: !keep_header,
                chunks: !keep_chunks,
            };
            let summary = run_each(&files, |path| {
                let desc = ctx.open(path)?;
                strip_file(&ctx.opener, &desc, opts, &ctx.naming)?;
                Ok(())
            })?;
            Ok(summary_ok(summary))
        }
        Commands::Gen { length } => {
            generate_silence(&ctx.opener, &length, &ctx.naming)?;
            Ok(true)
        }
        Commands::Cue { files, split_points } => {
            let descs = ctx.open_all(&files)?;
            let text = if split_points {
                generate_split_points(&descs)?
            } else {
                generate_cue_sheet(&descs)?
            };
            print!("{}", text);
            Ok(true)
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.global);

    let saved_config = Config::load().unwrap_or_else(|e| {
        log::warn!("could not load saved defaults: {}", e);
        Config::new()
    });

    if cli.global.show_saved_defaults {
        saved_config.print("Saved defaults");
        return;
    }

    let cmdline = cmdline_config(&cli);
    if let Err(e) = cmdline.validate() {
        log::error!("{}", e);
        process::exit(1);
    }

    if cli.global.save_defaults {
        let mut to_save = saved_config.clone();
        to_save.merge(&cmdline);
        match to_save.save() {
            Ok(()) => info!("saved defaults"),
            Err(e) => {
                log::error!("could not save defaults: {}", e);
                process::exit(1);
            }
        }
    }

    let mut effective = builtin_defaults();
    effective.merge(&saved_config);
    effective.merge(&cmdline);

    let ctx = match Context::new(effective, &cli.global) {
        Ok(ctx) => ctx,
        Err(e) => {
            log::error!("{}", e);
            process::exit(1);
        }
    };

    match run_batch(|| run(&ctx, cli.command)) {
        Ok(true) => process::exit(0),
        Ok(false) | Err(_) => process::exit(1),
    }
}
