//! dupesift-core - duplicate file scanning engine
//!
//! This crate turns a flat list of file descriptors into prioritized
//! duplicate groups: disjoint sets of similar files in which one member is
//! the *reference* to keep and the rest are duplicates to act upon.
//!
//! The engine never walks the filesystem and never deletes anything.
//! Callers build [`FileEntry`] descriptors however they like (a directory
//! walker, a library database, a playlist), configure a [`Scanner`], and get
//! back a [`ScanResult`] whose groups index into the descriptor arena.
//!
//! Matching is either exact (size, audio size, or an opaque fingerprint from
//! a [`FingerprintProvider`]) or word-based (token-bag similarity over names
//! or tags). Progress and cancellation flow through the caller's
//! [`Progress`] sink.

mod dedupe;
mod error;
mod filters;
mod grouping;
mod matching;
mod prioritize;
mod progress;
mod scanner;
mod types;
mod words;

pub use dedupe::remove_duplicate_paths;
pub use error::{Error, Result};
pub use filters::IgnoreList;
pub use grouping::DupeGroup;
pub use matching::FingerprintProvider;
pub use prioritize::{default_key, is_same_with_digit};
pub use progress::{NullProgress, Progress};
pub use scanner::{ScanResult, Scanner};
pub use types::{FileEntry, Match, ScanOptions, ScanType, ScannedTag, TagSet};
