use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::exit;

use anyhow::{bail, Result};
use clap::Parser;
use log::{error, info};
use simplelog::{ColorChoice, Config as LogConfig, LevelFilter, TermLogger, TerminalMode};

mod lang;

use lang::runtime::Runtime;

#[derive(Parser)]
#[command(version, about)]
struct Opt {
    /// Dump tokens and the parsed program before evaluating
    #[arg(short, long)]
    debug: bool,

    /// Program to run
    file: PathBuf,
}

fn init_logging(debug: bool) -> Result<()> {
    let filter = if debug {
        LevelFilter::Info
    } else {
        LevelFilter::Error
    };

    // stdout carries program output, so every log level goes to stderr
    match TermLogger::init(
        filter,
        LogConfig::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    ) {
        Ok(_) => Ok(()),
        Err(e) => bail!("Failed to init logger: {}", e),
    }
}

fn main() -> Result<()> {
    let opts = Opt::parse();
    init_logging(opts.debug)?;

    let source = match fs::read_to_string(&opts.file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", opts.file.display(), e);
            exit(1);
        }
    };
    info!("read {}", opts.file.display());

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let mut runtime = Runtime::new(&mut handle, opts.debug);
    if let Err(e) = runtime.run(&source) {
        error!("{}", e);
        exit(1);
    }

    println!("finished");

    Ok(())
}
