use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use console::{style, Emoji};
use indicatif::{ProgressBar, ProgressStyle};
use sfxarc::{
    default_provider,
    sfxformat::{Archive, CommandConfig, WriteEvent},
    Packer, StubProvider,
};
use tracing_subscriber::EnvFilter;

mod args;
use args::*;

#[derive(Parser)]
#[command(about, version, arg_required_else_help = true)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(ClapArgs, Clone, Copy)]
#[group(multiple = false)]
struct Compression {
    /// Fastest compression
    #[arg(long)]
    fastest: bool,
    /// Balanced compression [default]
    #[arg(long)]
    #[allow(dead_code)]
    normal:  bool,
    /// Smallest output
    #[arg(long)]
    best:    bool,
}

#[derive(Subcommand)]
enum Command {
    /// Create an archive from files and directories, replacing an existing one
    Create {
        /// Path to the archive
        archive:     PathBuf,
        /// Files and directories to store
        #[arg(required = true)]
        inputs:      Vec<PathBuf>,
        #[command(flatten)]
        compression: Compression,
    },
    /// Append files and directories to an archive
    Add {
        /// Path to the archive
        archive:     PathBuf,
        /// Files and directories to append
        #[arg(required = true)]
        inputs:      Vec<PathBuf>,
        #[command(flatten)]
        compression: Compression,
    },
    /// Extract every entry of an archive
    Extract {
        /// Path to the archive
        archive: PathBuf,
        /// Directory to extract into
        #[arg(default_value = ".")]
        output:  PathBuf,
    },
    /// List the entries of an archive
    List {
        /// Path to the archive
        archive: PathBuf,
    },
    /// Create a self-extracting executable
    Selfext {
        /// Path to the output executable
        output:      PathBuf,
        /// Files and directories to embed
        #[arg(required = true)]
        inputs:      Vec<PathBuf>,
        #[command(flatten)]
        compression: Compression,
        /// Extractor stub to use [default: embedded or next to sfxarc]
        #[arg(long, env = "SFXARC_STUB")]
        stub:        Option<PathBuf>,
        /// Target of the embedded stub
        #[arg(long, conflicts_with = "stub")]
        target:      Option<String>,
        /// Command to run after extraction
        #[arg(long)]
        exec:        Option<String>,
        /// Arguments passed to the command
        #[arg(long, allow_hyphen_values = true, requires = "exec")]
        args:        Option<String>,
        /// Hide the console window of the command
        #[arg(long, requires = "exec")]
        silent:      bool,
        /// Return without waiting for the command to finish
        #[arg(long, requires = "exec")]
        no_wait:     bool,
        /// Working directory of the command [default: extraction directory]
        #[arg(long, requires = "exec")]
        workdir:     Option<String>,
    },
    /// Show version information
    Version,
}

fn progress_bar(count: u64) -> Result<ProgressBar> {
    let bar = ProgressBar::new(count).with_style(ProgressStyle::default_bar().template(
        "{spinner:.green} {elapsed_precise} [{wide_bar:.green}] {pos}/{len}\n{spinner:.green} {wide_msg}",
    )?);
    bar.enable_steady_tick(Duration::from_millis(100));
    Ok(bar)
}

fn report_event(bar: &ProgressBar, event: WriteEvent<'_>) {
    match event {
        WriteEvent::Compressing(name) => bar.set_message(style(name).blue().to_string()),
        WriteEvent::Added(_) => bar.inc(1),
        WriteEvent::Skipped(path) => {
            bar.inc(1);
            bar.println(format!(
                "      {}{}",
                Emoji("⚠ ", ""),
                style(format!("skipped {}", path.display())).red()
            ));
        }
    }
}

fn collect_step(step: &str, inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    println!(
        "{} {}collecting {} inputs…",
        style(step).bold().black(),
        Emoji("🔍 ", ""),
        style(inputs.len()).magenta()
    );
    get_inputs(inputs)
}

fn compress_step(step: &str, count: usize, target: &str) {
    println!(
        "{} {}compressing {} files into {}…",
        style(step).bold().black(),
        Emoji("🚚 ", ""),
        style(count).magenta(),
        style(target).blue()
    );
}

fn done(count: usize) {
    println!(
        "      {}{} {} {}",
        Emoji("✨ ", ""),
        style("successfully stored").green(),
        style(count).magenta(),
        style("files").green(),
    );
}

fn create(archive: PathBuf, inputs: Vec<PathBuf>, compression: Compression, append: bool) -> Result<()> {
    let archive_path = get_output(&archive)?;
    let files = collect_step("[1/2]", &inputs)?;
    compress_step("[2/2]", files.len(), &display_path(&archive_path));

    let mut archive = Archive::open(&archive_path)?;
    let level = get_compression_level(compression.fastest, compression.best);
    let bar = progress_bar(files.len() as u64)?;
    let stored = if append {
        archive.add_with(&files, level, |event| report_event(&bar, event))
    } else {
        archive
            .create_with(&files, level, |event| report_event(&bar, event))
            .map(|_| archive.len())
    };
    bar.finish_and_clear();
    done(stored?);
    Ok(())
}

fn extract(archive: PathBuf, output: PathBuf) -> Result<()> {
    let archive = Archive::open(&archive)?;
    if !archive.path().is_file() {
        anyhow::bail!("archive does not exist: {}", archive.path().display());
    }
    println!(
        "{} {}extracting {} entries to {}…",
        style("[1/1]").bold().black(),
        Emoji("📦 ", ""),
        style(archive.len()).magenta(),
        style(output.display()).blue()
    );
    let summary = archive.extract(&output)?;
    println!(
        "      {}{} {} {}",
        Emoji("✨ ", ""),
        style("successfully extracted").green(),
        style(summary.extracted).magenta(),
        style("files").green(),
    );
    if summary.truncated {
        println!("      {}{}", Emoji("⚠ ", ""), style("archive ends inside an entry").red());
    }
    Ok(())
}

fn list(archive: PathBuf) -> Result<()> {
    let archive = Archive::open(&archive)?;
    if !archive.path().is_file() {
        anyhow::bail!("archive does not exist: {}", archive.path().display());
    }
    println!(
        "{} {}",
        style(archive.len()).magenta(),
        style(format!("entries in {}", display_path(archive.path()))).blue().bright()
    );
    let width = archive
        .entries()
        .iter()
        .map(|entry| entry.name.chars().count())
        .max()
        .unwrap_or(0)
        .max(4);
    println!(
        "  {:<width$}  {:>12}  {:>12}",
        style("Name").bold(),
        style("Size").bold(),
        style("Compressed").bold(),
        width = width
    );
    for entry in archive.entries() {
        println!(
            "  {:<width$}  {:>12}  {:>12}",
            entry.name,
            entry.original_size,
            entry.compressed_size,
            width = width
        );
    }
    Ok(())
}

struct SelfextOptions {
    output:      PathBuf,
    inputs:      Vec<PathBuf>,
    compression: Compression,
    stub:        Box<dyn StubProvider>,
    config:      CommandConfig,
}

fn selfext(options: SelfextOptions) -> Result<()> {
    let output = get_output(&options.output)?;
    let files = collect_step("[1/3]", &options.inputs)?;

    println!(
        "{} {}using stub {}…",
        style("[2/3]").bold().black(),
        Emoji("📃 ", ""),
        style(options.stub.describe()).blue()
    );

    compress_step("[3/3]", files.len(), &display_path(&output));
    let count = files.len();
    let packer = Packer::new(files)
        .with_level(get_compression_level(options.compression.fastest, options.compression.best))
        .with_config(options.config);
    let bar = progress_bar(count as u64)?;
    let packed = packer.pack_with(options.stub.as_ref(), &output, |event| report_event(&bar, event));
    bar.finish_and_clear();
    let packed = packed.with_context(|| format!("couldn't create {}", output.display()))?;

    done(packed.entries.len());
    println!(
        "      {}{} {} {}",
        Emoji("✨ ", ""),
        style("wrote").green(),
        style(packed.total_size).magenta(),
        style(format!(
            "bytes (stub {}, payload {})",
            packed.stub_size, packed.payload_size
        ))
        .green(),
    );
    if packer.config().has_command() {
        println!(
            "      {}{} {}",
            Emoji("🚀 ", ""),
            style("runs").green(),
            style(packer.config().command_line()).blue()
        );
    }
    Ok(())
}

fn version() {
    match option_env!("GIT_HASH") {
        Some(hash) => println!("{} {} ({})", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"), hash),
        None => println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
    }
    println!("{}", env!("CARGO_PKG_DESCRIPTION"));
    #[cfg(feature = "embedded-stub")]
    println!(
        "{}: {}",
        style("embedded stubs").blue().bright(),
        sfxarc::EmbeddedStub::targets().join(", ")
    );
}

#[cfg(feature = "embedded-stub")]
fn get_stub(stub: Option<PathBuf>, target: Option<String>) -> Result<Box<dyn StubProvider>> {
    Ok(match target {
        Some(target) => Box::new(sfxarc::EmbeddedStub {
            target: Some(target),
        }),
        None => default_provider(stub),
    })
}

#[cfg(not(feature = "embedded-stub"))]
fn get_stub(stub: Option<PathBuf>, target: Option<String>) -> Result<Box<dyn StubProvider>> {
    if let Some(target) = target {
        anyhow::bail!("no embedded stubs in this build, can't select target {}", target);
    }
    Ok(default_provider(stub))
}

fn run(args: Args) -> Result<()> {
    match args.command {
        Command::Create {
            archive,
            inputs,
            compression,
        } => create(archive, inputs, compression, false),
        Command::Add {
            archive,
            inputs,
            compression,
        } => create(archive, inputs, compression, true),
        Command::Extract { archive, output } => extract(archive, output),
        Command::List { archive } => list(archive),
        Command::Selfext {
            output,
            inputs,
            compression,
            stub,
            target,
            exec,
            args,
            silent,
            no_wait,
            workdir,
        } => {
            let stub = get_stub(stub, target)?;
            let config = CommandConfig {
                command: exec.unwrap_or_default(),
                arguments: args.unwrap_or_default(),
                silent,
                wait_for_completion: !no_wait,
                working_dir: workdir.unwrap_or_default(),
            };
            selfext(SelfextOptions {
                output,
                inputs,
                compression,
                stub,
                config,
            })
        }
        Command::Version => {
            version();
            Ok(())
        }
    }
}

fn main() {
    color_backtrace::install();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sfxarc=warn,sfxformat=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("{}: {:#}", style("error").red().bold(), e);
        std::process::exit(1);
    }
}
