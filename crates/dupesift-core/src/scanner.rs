//! Scan orchestration: descriptors in, prioritized duplicate groups out.

use tracing::{debug, info};

use crate::dedupe::remove_duplicate_paths;
use crate::error::Result;
use crate::filters::{
    IgnoreList, discard_both_reference, discard_nested_folder_matches, matched_paths,
    retain_existing, retain_reference_linked, retain_same_kind,
};
use crate::grouping::{DupeGroup, get_groups};
use crate::matching::{ContentAttr, ContentMatcher, FingerprintProvider, Matcher, WordMatcher};
use crate::prioritize::default_key;
use crate::progress::{Job, Progress};
use crate::types::{FileEntry, Match, ScanOptions, ScanType, ScannedTag};
use crate::words::{WordBag, tokenize};

/// Everything a finished scan produced. Groups refer to `files` by index;
/// the arena owns the descriptors for as long as the caller needs the
/// result.
#[derive(Debug)]
pub struct ScanResult {
    pub files: Vec<FileEntry>,
    pub groups: Vec<DupeGroup>,
    /// Files that matched something but fit in no group. Only meaningful for
    /// word scans; exact scans skip reference-to-reference comparisons, which
    /// would make this number a lie, so they report zero.
    pub discarded_file_count: usize,
}

impl ScanResult {
    pub fn file(&self, index: usize) -> &FileEntry {
        &self.files[index]
    }

    pub fn group_members<'a>(
        &'a self,
        group: &'a DupeGroup,
    ) -> impl Iterator<Item = &'a FileEntry> + 'a {
        group.members().iter().map(move |&m| &self.files[m])
    }

    pub fn group_ref(&self, group: &DupeGroup) -> &FileEntry {
        &self.files[group.ref_index()]
    }
}

/// Configuration resolved once at scan start. `FieldsNoOrder` collapses into
/// `Fields` plus a flag here so nothing downstream ever switches on it.
struct EffectiveScan {
    scan_type: ScanType,
    no_field_order: bool,
    min_match_percentage: u32,
}

impl EffectiveScan {
    fn from_options(options: &ScanOptions) -> Self {
        let (scan_type, no_field_order) = match options.scan_type {
            ScanType::FieldsNoOrder => (ScanType::Fields, true),
            other => (other, false),
        };
        Self {
            scan_type,
            no_field_order,
            min_match_percentage: options.min_match_percentage.min(100),
        }
    }
}

/// The scanning engine. Holds the configuration snapshot source, the user's
/// ignore list and, for fingerprint scans, the opaque key provider.
#[derive(Default)]
pub struct Scanner {
    pub options: ScanOptions,
    pub ignore_list: IgnoreList,
    provider: Option<Box<dyn FingerprintProvider>>,
}

impl Scanner {
    pub fn new(options: ScanOptions) -> Self {
        Self {
            options,
            ignore_list: IgnoreList::new(),
            provider: None,
        }
    }

    pub fn with_provider(mut self, provider: Box<dyn FingerprintProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Run one scan over the given descriptors.
    ///
    /// Returns the surviving descriptors and their groups, or
    /// [`crate::Error::Aborted`] when the progress sink asked to stop. An
    /// aborted scan yields no partial results.
    pub fn get_dupe_groups(
        &self,
        files: Vec<FileEntry>,
        progress: &dyn Progress,
    ) -> Result<ScanResult> {
        let options = EffectiveScan::from_options(&self.options);
        let job = Job::new(progress);
        let [match_job, post_job] = job.split([8, 2]);

        let any_reference_files = files.iter().any(|f| f.is_ref);
        let files = remove_duplicate_paths(files);

        info!(scan_type = ?options.scan_type, files = files.len(), "Getting matches");
        let (files, mut matches) = self.get_matches(files, &options, &match_job)?;
        info!("Found {} matches", matches.len());

        post_job.check_aborted()?;
        let [filter_job, group_job, prioritize_job] = post_job.split([5, 3, 2]);
        filter_job.set_progress(0, "Removing false matches");
        if options.scan_type == ScanType::Folders {
            matches = discard_nested_folder_matches(matches, &files);
        }
        if !self.options.mix_file_kind {
            matches = retain_same_kind(matches, &files);
        }
        matches = retain_existing(matches, &files);
        matches = discard_both_reference(matches, &files);
        if self.options.require_reference && any_reference_files {
            matches = retain_reference_linked(matches, &files);
        }
        if !self.ignore_list.is_empty() {
            let total = matches.len().max(1);
            let mut kept = Vec::with_capacity(matches.len());
            for (done, m) in matches.into_iter().enumerate() {
                filter_job.check_aborted()?;
                if !self
                    .ignore_list
                    .is_ignored(files[m.first].path(), files[m.second].path())
                {
                    kept.push(m);
                }
                filter_job.set_progress(
                    ((done + 1) * 100 / total) as u32,
                    &format!(
                        "Processed {}/{} matches against the ignore list",
                        done + 1,
                        total
                    ),
                );
            }
            matches = kept;
        }

        info!("Grouping matches");
        group_job.check_aborted()?;
        let mut groups = get_groups(&matches, &files);
        let discarded_file_count = if options.scan_type.is_word_scan() {
            let matched = matched_paths(&matches, &files).len();
            let grouped: usize = groups.iter().map(DupeGroup::len).sum();
            matched.saturating_sub(grouped)
        } else {
            0
        };
        groups.retain(|g| g.members().iter().any(|&m| !files[m].is_ref));
        info!("Created {} groups", groups.len());

        prioritize_job.set_progress(100, "Doing group prioritization");
        for group in &mut groups {
            group.prioritize(&files, default_key);
        }

        Ok(ScanResult {
            files,
            groups,
            discarded_file_count,
        })
    }

    /// Produce the raw match set, consuming the size pre-filter along the
    /// way so below-threshold files are never fingerprinted at all.
    fn get_matches(
        &self,
        mut files: Vec<FileEntry>,
        options: &EffectiveScan,
        job: &Job<'_>,
    ) -> Result<(Vec<FileEntry>, Vec<Match>)> {
        let mut match_job = *job;
        if self.options.size_threshold > 0 {
            let [size_job, rest] = job.split([2, 8]);
            let total = files.len().max(1);
            for (done, file) in files.iter().enumerate() {
                size_job.check_aborted()?;
                // Reading sizes up front keeps the progress smooth; bundle
                // paths can take a while to stat.
                file.size();
                size_job.set_progress(
                    ((done + 1) * 100 / total) as u32,
                    &format!("Read size of {}/{} files", done + 1, total),
                );
            }
            files.retain(|f| f.size() >= self.options.size_threshold);
            match_job = rest;
        }

        let matches = match options.scan_type {
            ScanType::Contents | ScanType::Folders => ContentMatcher {
                attr: ContentAttr::Size,
                partial: false,
                provider: None,
            }
            .get_matches(&files, &match_job)?,
            ScanType::ContentsAudio => ContentMatcher {
                attr: ContentAttr::AudioSize,
                partial: true,
                provider: None,
            }
            .get_matches(&files, &match_job)?,
            ScanType::FuzzyBlock | ScanType::ExifTimestamp => ContentMatcher {
                attr: ContentAttr::Fingerprint(options.scan_type),
                partial: false,
                provider: self.provider.as_deref(),
            }
            .get_matches(&files, &match_job)?,
            ScanType::Filename | ScanType::Fields | ScanType::Tag => {
                let [metadata_job, score_job] = match_job.split([2, 8]);
                let total = files.len().max(1);
                let mut bags = Vec::with_capacity(files.len());
                for (done, file) in files.iter().enumerate() {
                    metadata_job.check_aborted()?;
                    debug!(path = %file.path().display(), "Reading metadata");
                    bags.push(self.word_bag(file, options.scan_type));
                    metadata_job.set_progress(
                        ((done + 1) * 100 / total) as u32,
                        &format!("Read metadata of {}/{} files", done + 1, total),
                    );
                }
                WordMatcher {
                    bags,
                    match_similar_words: self.options.match_similar_words,
                    weight_words: self.options.word_weighting,
                    min_match_percentage: options.min_match_percentage,
                    no_field_order: options.no_field_order,
                }
                .get_matches(&files, &score_job)?
            }
            ScanType::FieldsNoOrder => unreachable!("folded into Fields at snapshot time"),
        };
        Ok((files, matches))
    }

    fn word_bag(&self, file: &FileEntry, scan_type: ScanType) -> WordBag {
        match scan_type {
            ScanType::Fields => WordBag::fields_from_name(file.name()),
            ScanType::Tag => {
                let mut words = Vec::new();
                for tag in ScannedTag::ALL {
                    if !self.options.scanned_tags.contains(&tag) {
                        continue;
                    }
                    if let Some(value) = file.tags.get(tag) {
                        words.extend(tokenize(value));
                    }
                }
                words.sort_unstable();
                WordBag::Flat(words)
            }
            _ => WordBag::from_name(file.name()),
        }
    }
}
