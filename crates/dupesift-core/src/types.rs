use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

/// Tag attributes a tag scan can compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScannedTag {
    Track,
    Artist,
    Album,
    Title,
    Genre,
    Year,
}

impl ScannedTag {
    /// All tags, in the order they are concatenated into a token bag.
    pub const ALL: [ScannedTag; 6] = [
        ScannedTag::Track,
        ScannedTag::Artist,
        ScannedTag::Album,
        ScannedTag::Title,
        ScannedTag::Genre,
        ScannedTag::Year,
    ];
}

/// Tag metadata attached to a file by the caller. The engine never reads
/// media formats itself; whatever extracted these is upstream.
#[derive(Debug, Clone, Default)]
pub struct TagSet {
    pub track: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub title: Option<String>,
    pub genre: Option<String>,
    pub year: Option<String>,
}

impl TagSet {
    pub fn get(&self, tag: ScannedTag) -> Option<&str> {
        match tag {
            ScannedTag::Track => self.track.as_deref(),
            ScannedTag::Artist => self.artist.as_deref(),
            ScannedTag::Album => self.album.as_deref(),
            ScannedTag::Title => self.title.as_deref(),
            ScannedTag::Genre => self.genre.as_deref(),
            ScannedTag::Year => self.year.as_deref(),
        }
    }
}

/// A file (or folder) descriptor as the scanner sees it.
///
/// Descriptors are built upstream; the engine only reads them, except for the
/// lazily materialized size. Reading the size can mean I/O (bundle paths are
/// slow to stat), so it is cached after the first access.
#[derive(Debug, Clone)]
pub struct FileEntry {
    path: PathBuf,
    name: String,
    size: OnceCell<u64>,
    audiosize: Option<u64>,
    pub tags: TagSet,
    /// Reference files anchor their group and are never acted upon.
    pub is_ref: bool,
}

impl FileEntry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned();
        Self {
            path,
            name,
            size: OnceCell::new(),
            audiosize: None,
            tags: TagSet::default(),
            is_ref: false,
        }
    }

    /// Pre-populate the size so the scanner never stats this entry.
    pub fn with_size(self, size: u64) -> Self {
        self.size.set(size).ok();
        self
    }

    pub fn with_audiosize(mut self, audiosize: u64) -> Self {
        self.audiosize = Some(audiosize);
        self
    }

    pub fn with_tags(mut self, tags: TagSet) -> Self {
        self.tags = tags;
        self
    }

    pub fn as_reference(mut self) -> Self {
        self.is_ref = true;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Basename with extension.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// File size in bytes, read from disk at most once. A vanished file
    /// counts as zero bytes.
    pub fn size(&self) -> u64 {
        *self
            .size
            .get_or_init(|| std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0))
    }

    /// Decoded audio stream size, when the caller provided one.
    pub fn audiosize(&self) -> Option<u64> {
        self.audiosize
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

/// What to compare to decide two files are duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanType {
    /// Word similarity over tokenized basenames.
    Filename,
    /// Per-field word similarity over basenames, fields compared in order.
    Fields,
    /// Same as `Fields` but field order is irrelevant.
    FieldsNoOrder,
    /// Word similarity over the enabled tag attributes.
    Tag,
    /// Folder descriptors bucketed by aggregate size.
    Folders,
    /// Exact size equality.
    Contents,
    /// Exact audio stream size equality; matches bypass byte verification.
    ContentsAudio,
    /// Exact equality of an opaque block fingerprint from the provider.
    FuzzyBlock,
    /// Exact equality of an opaque timestamp fingerprint from the provider.
    ExifTimestamp,
}

impl ScanType {
    /// Word scans tokenize names or tags and score pairs by similarity.
    /// Everything else buckets on an exact key.
    pub fn is_word_scan(self) -> bool {
        matches!(
            self,
            ScanType::Filename | ScanType::Fields | ScanType::FieldsNoOrder | ScanType::Tag
        )
    }

    pub fn requires_provider(self) -> bool {
        matches!(self, ScanType::FuzzyBlock | ScanType::ExifTimestamp)
    }
}

/// Scan configuration. Taken as an immutable snapshot when a scan starts;
/// out-of-range values are clamped rather than rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    pub scan_type: ScanType,
    /// Tags compared by [`ScanType::Tag`].
    pub scanned_tags: Vec<ScannedTag>,
    /// Minimum similarity (0-100) a pair needs to count as a match.
    pub min_match_percentage: u32,
    /// Merge near-identical words (one edit apart) before scoring.
    pub match_similar_words: bool,
    /// Weight words by their length instead of counting them.
    pub word_weighting: bool,
    /// Allow matches between files with different extensions.
    pub mix_file_kind: bool,
    /// Drop matches that cannot be tied to a reference file.
    pub require_reference: bool,
    /// Files smaller than this never enter matching. Zero disables.
    pub size_threshold: u64,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            scan_type: ScanType::Filename,
            scanned_tags: vec![ScannedTag::Artist, ScannedTag::Title],
            min_match_percentage: 80,
            match_similar_words: false,
            word_weighting: false,
            mix_file_kind: true,
            require_reference: false,
            size_threshold: 0,
        }
    }
}

/// An unordered pair of similar files, by index into the scan's file arena.
///
/// `first < second` always holds, which is what keeps the match set free of
/// mirrored duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub first: usize,
    pub second: usize,
    /// Similarity in percent; exact-key matches report 100.
    pub percentage: u32,
    /// Audio content matches skip byte-exact verification downstream.
    pub partial: bool,
}

impl Match {
    pub fn new(a: usize, b: usize, percentage: u32) -> Self {
        debug_assert_ne!(a, b);
        let (first, second) = if a < b { (a, b) } else { (b, a) };
        Self {
            first,
            second,
            percentage,
            partial: false,
        }
    }

    pub(crate) fn partial(a: usize, b: usize, percentage: u32) -> Self {
        let mut m = Self::new(a, b, percentage);
        m.partial = true;
        m
    }
}
