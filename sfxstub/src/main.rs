use std::{
    env::{args, current_exe},
    fs::{read_link, File},
    path::PathBuf,
    process::ExitCode,
};

use memmap2::Mmap;
use sfxformat::Error;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod decompress;
use decompress::*;

mod command;
use command::*;

struct Options {
    output_dir: PathBuf,
    silent:     bool,
    skip_exec:  bool,
}

fn usage() {
    println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    println!("usage: <executable> [output_dir] [--silent|-s] [--skip-exec|-n] [--help|-h]");
    println!("  output_dir       directory to extract into (default: current directory)");
    println!("  --silent, -s     only print errors");
    println!("  --skip-exec, -n  do not run the embedded command");
}

/// Unknown flags are ignored so they never end up as the output directory.
fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Option<Options> {
    let mut options = Options {
        output_dir: PathBuf::from("."),
        silent:     false,
        skip_exec:  false,
    };
    for arg in args {
        match arg.as_str() {
            "--help" | "-h" => return None,
            "--silent" | "-s" => options.silent = true,
            "--skip-exec" | "-n" => options.skip_exec = true,
            flag if flag.starts_with('-') => eprintln!("ignoring unknown option {}", flag),
            _ => options.output_dir = PathBuf::from(arg),
        }
    }
    Some(options)
}

fn map_self() -> Result<Mmap, Error> {
    let mut exe = current_exe().map_err(Error::location("locate", "current executable"))?;
    while let Ok(link) = read_link(&exe) {
        exe = link;
    }
    let file = File::open(&exe).map_err(Error::location("open", &exe))?;
    // the image is not modified while the stub runs
    unsafe { Mmap::map(&file) }.map_err(Error::location("map", &exe))
}

fn run(options: &Options) -> Result<(), Error> {
    let image = map_self()?;
    let unpacked = unpack(&image, &options.output_dir)?;
    if !options.silent {
        println!(
            "extracted {} files to {}",
            unpacked.summary.extracted,
            options.output_dir.display()
        );
        if unpacked.summary.failed > 0 {
            println!("skipped {} files that failed to extract", unpacked.summary.failed);
        }
    }

    if !unpacked.config.has_command() {
        return Ok(());
    }
    if options.skip_exec {
        if !options.silent {
            println!("not running: {}", unpacked.config.command_line());
        }
        return Ok(());
    }
    if !options.silent {
        println!("running: {}", unpacked.config.command_line());
    }
    match run_command(&unpacked.config, &options.output_dir)? {
        Launched::Exited(Some(code)) if !options.silent => println!("command exited with code {}", code),
        Launched::Exited(None) if !options.silent => println!("command was terminated"),
        Launched::Detached(pid) if !options.silent => println!("command started with process id {}", pid),
        _ => {}
    }
    Ok(())
}

fn main() -> ExitCode {
    let Some(options) = parse_args(args().skip(1)) else {
        usage();
        return ExitCode::SUCCESS;
    };

    let default_filter = if options.silent {
        "sfxstub=warn,sfxformat=warn"
    } else {
        "sfxstub=info,sfxformat=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(&options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
