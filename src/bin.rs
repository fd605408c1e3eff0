use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result};
use clap::Parser;
use walkdir::WalkDir;

use tarpipe::{ArchiveError, ArchiveOptions, TarWriter};

/// Stream files and directories as a POSIX tar archive.
#[derive(Parser)]
#[command(name = "tarpipe", version, about)]
struct Args {
    /// Paths to archive
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Write the archive to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Place every entry under this root directory
    #[arg(long)]
    root: Option<String>,

    /// Fail on declared-size mismatches instead of emitting a malformed
    /// archive
    #[arg(long)]
    strict: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let mut opt = ArchiveOptions::default();
    if let Some(root) = args.root {
        opt.use_container_dir = true;
        opt.container_dir_name = root;
    }
    opt.enforce_declared_sizes = args.strict;

    let sink: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("creating '{}'", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };

    let mut tar = TarWriter::with_options(sink, opt);
    for path in &args.paths {
        archive_path(&mut tar, path)?;
    }
    tar.finalize().context("finalizing the archive")?;
    Ok(())
}

/// Walks `root` and adds every directory and regular file it contains.
/// Unreadable entries are pushed to the archive error log instead of
/// aborting the stream.
fn archive_path<W: Write>(tar: &mut TarWriter<W>, root: &Path) -> Result<()> {
    let base = root.parent().unwrap_or_else(|| Path::new(""));
    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tar.push_error(format!(
                    "could not read a directory entry under '{}': {}",
                    root.display(),
                    err
                ));
                continue;
            }
        };
        let name = match entry.path().strip_prefix(base) {
            Ok(rel) => rel.to_string_lossy().into_owned(),
            Err(_) => entry.path().to_string_lossy().into_owned(),
        };

        if entry.file_type().is_dir() {
            let mtime = entry.metadata().map(|meta| mtime_of(&meta)).unwrap_or(0);
            tar.add_directory(&name, mtime)?;
        } else if entry.file_type().is_file() {
            let (mut file, size, mtime) = match open_for_archive(entry.path()) {
                Ok(opened) => opened,
                Err(err) => {
                    tar.push_error(format!("could not read '{}': {}", entry.path().display(), err));
                    continue;
                }
            };
            match tar.add_file_from_reader(&name, &mut file, size, mtime) {
                // too large for a ustar size field; skip it and keep going
                Err(err @ ArchiveError::UnsupportedSize { .. }) => {
                    tar.push_error(err.to_string());
                }
                other => other?,
            }
        }
        // sockets, fifos and symlinks are not archived
    }
    Ok(())
}

fn open_for_archive(path: &Path) -> io::Result<(File, u64, u64)> {
    let file = File::open(path)?;
    let metadata = file.metadata()?;
    Ok((file, metadata.len(), mtime_of(&metadata)))
}

fn mtime_of(metadata: &std::fs::Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
