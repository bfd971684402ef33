//! Command-line front end for the dupesift scanning engine.
//!
//! Walks the given directories, builds file descriptors, runs one scan and
//! prints the resulting duplicate groups. Nothing is ever deleted or moved;
//! acting on the groups is left to the user.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use ignore::WalkBuilder;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use dupesift_core::{
    Error, FileEntry, FingerprintProvider, Progress, ScanOptions, ScanResult, ScanType, Scanner,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ScanKind {
    /// Similar file names.
    Filename,
    /// File name fields compared in order.
    Fields,
    /// File name fields, order ignored.
    FieldsNoOrder,
    /// Folders with the same aggregate size.
    Folders,
    /// Files with the same size.
    Contents,
    /// Files whose first block hashes identically.
    FuzzyBlock,
}

impl From<ScanKind> for ScanType {
    fn from(kind: ScanKind) -> Self {
        match kind {
            ScanKind::Filename => ScanType::Filename,
            ScanKind::Fields => ScanType::Fields,
            ScanKind::FieldsNoOrder => ScanType::FieldsNoOrder,
            ScanKind::Folders => ScanType::Folders,
            ScanKind::Contents => ScanType::Contents,
            ScanKind::FuzzyBlock => ScanType::FuzzyBlock,
        }
    }
}

/// Find duplicate files and report them as prioritized groups.
///
/// Each group designates one reference file to keep; the remaining members
/// are the candidates for removal. Reference directories contribute files
/// that are only ever kept.
#[derive(Parser, Debug)]
#[command(name = "dupesift", version)]
struct Args {
    /// Directories to scan. Defaults to the current directory.
    roots: Vec<PathBuf>,

    /// Directories whose files anchor groups but are never duplicates.
    #[arg(long = "reference", value_name = "DIR")]
    reference_roots: Vec<PathBuf>,

    /// How files are compared.
    #[arg(long, value_enum, default_value_t = ScanKind::Contents)]
    scan: ScanKind,

    /// Minimum similarity percentage for word scans.
    #[arg(long, default_value_t = 80)]
    min_match: u32,

    /// Skip files smaller than this many bytes.
    #[arg(long, default_value_t = 0, value_name = "BYTES")]
    min_size: u64,

    /// Treat words one typo apart as the same word.
    #[arg(long)]
    match_similar_words: bool,

    /// Weight words by length: longer shared words count for more.
    #[arg(long)]
    weight_words: bool,

    /// Only match files that share an extension.
    #[arg(long)]
    same_kind: bool,

    /// Only keep groups anchored to a reference file.
    #[arg(long)]
    require_reference: bool,

    /// Never match this pair of paths. May be repeated.
    #[arg(long = "ignore", num_args = 2, value_names = ["PATH", "PATH"])]
    ignored_pairs: Vec<PathBuf>,

    /// Print groups as JSON instead of text.
    #[arg(long)]
    json: bool,

    /// Chattier logging on stderr.
    #[arg(short, long)]
    verbose: bool,
}

/// Hash of the first 64 KiB of a file. Cheap enough to run over a whole
/// collection, strong enough to key the fuzzy block scan.
struct PrehashProvider;

const PREHASH_BYTES: u64 = 64 * 1024;

impl FingerprintProvider for PrehashProvider {
    fn fingerprint(&self, file: &FileEntry) -> Option<u64> {
        let handle = std::fs::File::open(file.path()).ok()?;
        let mut head = Vec::with_capacity(PREHASH_BYTES as usize);
        handle.take(PREHASH_BYTES).read_to_end(&mut head).ok()?;
        let hash = blake3::hash(&head);
        let first_eight: [u8; 8] = hash.as_bytes()[..8].try_into().ok()?;
        Some(u64::from_le_bytes(first_eight))
    }
}

/// Progress line on stderr, overwritten in place. `update` may be called
/// from several matcher threads; interleaved lines are harmless.
struct ConsoleProgress {
    aborted: Arc<AtomicBool>,
}

impl Progress for ConsoleProgress {
    fn update(&self, percent: u32, message: &str) {
        eprint!("\r\x1b[2K[{percent:>3}%] {message}");
        let _ = std::io::stderr().flush();
    }

    fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Relaxed)
    }
}

fn walker(root: &Path) -> ignore::Walk {
    WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .follow_links(false)
        .build()
}

fn collect_file_entries(roots: &[PathBuf], reference_roots: &[PathBuf]) -> Vec<FileEntry> {
    let mut entries = Vec::new();
    let tagged = roots
        .iter()
        .map(|r| (r, false))
        .chain(reference_roots.iter().map(|r| (r, true)));
    for (root, is_ref) in tagged {
        for entry in walker(root).flatten() {
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            let file = FileEntry::new(entry.path()).with_size(size);
            entries.push(if is_ref { file.as_reference() } else { file });
        }
    }
    entries
}

/// Folder scans compare directories by aggregate content size, so every
/// directory below a root becomes a descriptor carrying the summed size of
/// all files underneath it.
fn collect_folder_entries(roots: &[PathBuf], reference_roots: &[PathBuf]) -> Vec<FileEntry> {
    let mut sizes: BTreeMap<PathBuf, u64> = BTreeMap::new();
    for root in roots.iter().chain(reference_roots.iter()) {
        for entry in walker(root).flatten() {
            let path = entry.path();
            if entry.file_type().is_some_and(|t| t.is_dir()) {
                if path != root.as_path() {
                    sizes.entry(path.to_path_buf()).or_insert(0);
                }
            } else if entry.file_type().is_some_and(|t| t.is_file()) {
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                let mut dir = path.parent();
                while let Some(current) = dir {
                    if current == root.as_path() || !current.starts_with(root) {
                        break;
                    }
                    *sizes.entry(current.to_path_buf()).or_insert(0) += size;
                    dir = current.parent();
                }
            }
        }
    }
    sizes
        .into_iter()
        .map(|(path, size)| {
            let is_ref = reference_roots.iter().any(|r| path.starts_with(r));
            let entry = FileEntry::new(path).with_size(size);
            if is_ref { entry.as_reference() } else { entry }
        })
        .collect()
}

#[derive(Serialize)]
struct Report {
    scan_type: ScanType,
    group_count: usize,
    duplicate_file_count: usize,
    discarded_file_count: usize,
    groups: Vec<GroupReport>,
}

#[derive(Serialize)]
struct GroupReport {
    percentage: u32,
    reference: PathBuf,
    duplicates: Vec<PathBuf>,
}

fn build_report(scan_type: ScanType, result: &ScanResult) -> Report {
    let groups: Vec<GroupReport> = result
        .groups
        .iter()
        .map(|group| GroupReport {
            percentage: group.percentage(),
            reference: result.group_ref(group).path().to_path_buf(),
            duplicates: group
                .dupes()
                .map(|member| result.file(member).path().to_path_buf())
                .collect(),
        })
        .collect();
    let duplicate_file_count = groups.iter().map(|g| g.duplicates.len()).sum();
    Report {
        scan_type,
        group_count: groups.len(),
        duplicate_file_count,
        discarded_file_count: result.discarded_file_count,
        groups,
    }
}

fn print_text_report(report: &Report) {
    for (index, group) in report.groups.iter().enumerate() {
        println!(
            "Group {} - {} files, {}% match",
            index + 1,
            group.duplicates.len() + 1,
            group.percentage
        );
        println!("  => {}", group.reference.display());
        for dupe in &group.duplicates {
            println!("     {}", dupe.display());
        }
    }
    if !report.groups.is_empty() {
        println!();
    }
    println!(
        "{} duplicate groups, {} duplicate files, {} files discarded",
        report.group_count, report.duplicate_file_count, report.discarded_file_count
    );
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let aborted = Arc::new(AtomicBool::new(false));
    {
        let aborted = Arc::clone(&aborted);
        ctrlc::set_handler(move || aborted.store(true, Ordering::Relaxed))
            .context("failed to install the interrupt handler")?;
    }

    let roots = if args.roots.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        args.roots.clone()
    };
    for root in roots.iter().chain(args.reference_roots.iter()) {
        if !root.is_dir() {
            bail!("{} is not a directory", root.display());
        }
    }

    let scan_type = ScanType::from(args.scan);
    let options = ScanOptions {
        scan_type,
        min_match_percentage: args.min_match,
        match_similar_words: args.match_similar_words,
        word_weighting: args.weight_words,
        mix_file_kind: !args.same_kind,
        require_reference: args.require_reference,
        size_threshold: args.min_size,
        ..Default::default()
    };

    let files = if scan_type == ScanType::Folders {
        collect_folder_entries(&roots, &args.reference_roots)
    } else {
        collect_file_entries(&roots, &args.reference_roots)
    };
    info!(entries = files.len(), ?scan_type, "Collection walked");

    let mut scanner = Scanner::new(options);
    if scan_type.requires_provider() {
        scanner = scanner.with_provider(Box::new(PrehashProvider));
    }
    for pair in args.ignored_pairs.chunks(2) {
        if let [a, b] = pair {
            scanner.ignore_list.ignore(a, b);
        }
    }

    let progress = ConsoleProgress { aborted };
    let result = match scanner.get_dupe_groups(files, &progress) {
        Ok(result) => result,
        Err(Error::Aborted) => {
            eprintln!();
            bail!("scan aborted");
        }
        Err(other) => return Err(other.into()),
    };
    eprintln!();

    let report = build_report(scan_type, &result);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_text_report(&report);
    }

    Ok(())
}
