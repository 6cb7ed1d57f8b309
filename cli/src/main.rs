use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use lazarus_core::DiskImage;
use lazarus_fat32::{parse_sha1_hex, report, BootSector, RecoveryEngine};

const USAGE: &str = "Usage: lazarus disk <options>
  -i                     Print the file system information.
  -l                     List the root directory.
  -r filename [-s sha1]  Recover a contiguous file.
  -R filename -s sha1    Recover a possibly non-contiguous file.
";

#[derive(Parser)]
#[command(name = "lazarus")]
#[command(about = "FAT32 volume inspection and undelete tool", long_about = None)]
#[command(disable_help_flag = true, disable_version_flag = true)]
struct Cli {
    /// Path to the raw FAT32 volume image
    disk: PathBuf,

    /// Print the file system information
    #[arg(short = 'i')]
    info: bool,

    /// List the root directory
    #[arg(short = 'l')]
    list: bool,

    /// Recover a contiguous file
    #[arg(short = 'r', value_name = "FILENAME")]
    recover: Option<String>,

    /// Recover a possibly non-contiguous file
    #[arg(short = 'R', value_name = "FILENAME")]
    recover_scattered: Option<String>,

    /// Expected SHA-1 of the file contents, as 40 hex characters
    #[arg(short = 's', value_name = "SHA1")]
    sha1: Option<String>,
}

fn usage_error() -> ExitCode {
    print!("{}", USAGE);
    ExitCode::FAILURE
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(_) => return usage_error(),
    };
    if !cli.disk.exists() {
        return usage_error();
    }

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("lazarus: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    let stdout = io::stdout();

    if cli.info {
        let image = DiskImage::open(&cli.disk)?;
        let boot = BootSector::parse(&image)?;
        report::volume_info(&mut stdout.lock(), &boot)?;
        return Ok(ExitCode::SUCCESS);
    }

    if cli.list {
        let image = DiskImage::open(&cli.disk)?;
        let boot = BootSector::parse(&image)?;
        report::list_root(&mut stdout.lock(), &image, &boot)?;
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(filename) = &cli.recover {
        let digest = match &cli.sha1 {
            Some(hex) => match parse_sha1_hex(hex) {
                Ok(digest) => Some(digest),
                Err(_) => return Ok(usage_error()),
            },
            None => None,
        };

        let mut image = DiskImage::open(&cli.disk)?;
        let mut engine = RecoveryEngine::new(&mut image)?;
        let outcome = match digest {
            Some(digest) => engine.undelete_with_hash(filename, &digest)?,
            None => engine.undelete(filename)?,
        };
        writeln!(stdout.lock(), "{}", outcome.message(filename))?;
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(filename) = &cli.recover_scattered {
        // -R is only meaningful with a content hash to search for
        let Some(hex) = &cli.sha1 else {
            return Ok(usage_error());
        };
        let Ok(digest) = parse_sha1_hex(hex) else {
            return Ok(usage_error());
        };

        let mut image = DiskImage::open(&cli.disk)?;
        let mut engine = RecoveryEngine::new(&mut image)?;
        let outcome = engine.undelete_scattered(filename, &digest)?;
        writeln!(stdout.lock(), "{}", outcome.message(filename))?;
        return Ok(ExitCode::SUCCESS);
    }

    Ok(usage_error())
}
