//! Match production: the two strategies that turn a file list into
//! similar pairs.
//!
//! Content scans bucket files on an exact key (size, audio size, or an
//! opaque provider fingerprint) and emit every pair inside a bucket at 100%.
//! Word scans build an inverted token index and score only pairs that share
//! at least one token; that bound is part of the contract, not a shortcut —
//! pairs with no token in common are never examined and can never match.

use ahash::AHashMap;
use parking_lot::Mutex;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::progress::Job;
use crate::types::{FileEntry, Match, ScanType};
use crate::words::{WordBag, merge_similar_words, similarity};

/// Pairs scored per unit of work when the word matcher fans out.
const SCORE_CHUNK: usize = 1024;

/// Source of opaque content fingerprints for scans the engine cannot key
/// itself (fuzzy block hashes, EXIF timestamps). Returning `None` excludes
/// the file from matching; the scan itself continues.
pub trait FingerprintProvider: Sync {
    fn fingerprint(&self, file: &FileEntry) -> Option<u64>;
}

/// A matching strategy. Implementations take the whole (already filtered)
/// file arena and return a deduplicated match set in canonical order.
pub(crate) trait Matcher {
    fn get_matches(&mut self, files: &[FileEntry], job: &Job<'_>) -> Result<Vec<Match>>;
}

/// Canonical order: by endpoint paths, so grouping sees the same sequence no
/// matter how many threads produced the matches.
pub(crate) fn sort_matches(matches: &mut [Match], files: &[FileEntry]) {
    matches.sort_unstable_by(|a, b| {
        files[a.first]
            .path()
            .cmp(files[b.first].path())
            .then_with(|| files[a.second].path().cmp(files[b.second].path()))
    });
}

/// Which attribute a content scan buckets on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ContentAttr {
    Size,
    AudioSize,
    Fingerprint(ScanType),
}

pub(crate) struct ContentMatcher<'a> {
    pub attr: ContentAttr,
    /// Audio matches skip byte verification downstream; flagged through.
    pub partial: bool,
    pub provider: Option<&'a dyn FingerprintProvider>,
}

impl Matcher for ContentMatcher<'_> {
    fn get_matches(&mut self, files: &[FileEntry], job: &Job<'_>) -> Result<Vec<Match>> {
        let mut buckets: AHashMap<u64, Vec<usize>> = AHashMap::new();
        for (index, file) in files.iter().enumerate() {
            let key = match self.attr {
                ContentAttr::Size => file.size(),
                ContentAttr::AudioSize => file.audiosize().unwrap_or(0),
                ContentAttr::Fingerprint(scan_type) => {
                    let provider = self
                        .provider
                        .ok_or(Error::FingerprintProviderMissing(scan_type))?;
                    match provider.fingerprint(file) {
                        Some(key) => key,
                        None => {
                            warn!(path = %file.path().display(), "No fingerprint, excluding file");
                            continue;
                        }
                    }
                }
            };
            buckets.entry(key).or_default().push(index);
        }

        let bucket_count = buckets.len().max(1);
        let mut matches = Vec::new();
        for (done, bucket) in buckets.values().enumerate() {
            job.check_aborted()?;
            for (pos, &a) in bucket.iter().enumerate() {
                for &b in &bucket[pos + 1..] {
                    // Two reference files can never be acted upon together,
                    // so comparing them is wasted work.
                    if files[a].is_ref && files[b].is_ref {
                        continue;
                    }
                    matches.push(if self.partial {
                        Match::partial(a, b, 100)
                    } else {
                        Match::new(a, b, 100)
                    });
                }
            }
            job.set_progress(
                ((done + 1) * 100 / bucket_count) as u32,
                &format!("{} matches found", matches.len()),
            );
        }

        sort_matches(&mut matches, files);
        Ok(matches)
    }
}

pub(crate) struct WordMatcher {
    pub bags: Vec<WordBag>,
    pub match_similar_words: bool,
    pub weight_words: bool,
    pub min_match_percentage: u32,
    pub no_field_order: bool,
}

impl WordMatcher {
    /// Candidate pairs: every unordered pair sharing at least one token.
    fn candidate_pairs(&self, job: &Job<'_>) -> Result<Vec<(u32, u32)>> {
        let mut index: AHashMap<&str, Vec<u32>> = AHashMap::new();
        for (file_index, bag) in self.bags.iter().enumerate() {
            let mut previous = None;
            for token in bag.tokens() {
                // Bags are sorted, so repeats are adjacent; one posting per
                // distinct token per file.
                if previous == Some(token) {
                    continue;
                }
                previous = Some(token);
                index.entry(token).or_default().push(file_index as u32);
            }
        }
        debug!(tokens = index.len(), "Built word index");

        let mut pairs = Vec::new();
        for posting in index.values() {
            job.check_aborted()?;
            for (pos, &a) in posting.iter().enumerate() {
                for &b in &posting[pos + 1..] {
                    pairs.push((a, b));
                }
            }
        }
        pairs.par_sort_unstable();
        pairs.dedup();
        Ok(pairs)
    }
}

impl Matcher for WordMatcher {
    fn get_matches(&mut self, files: &[FileEntry], job: &Job<'_>) -> Result<Vec<Match>> {
        if self.match_similar_words {
            merge_similar_words(&mut self.bags);
        }
        let pairs = self.candidate_pairs(job)?;
        debug!(candidates = pairs.len(), "Scoring candidate pairs");

        // The index above is frozen; scoring only reads it. Workers drain
        // into one locked sink and the final sort restores canonical order.
        let bags = &self.bags;
        let weighted = self.weight_words;
        let no_field_order = self.no_field_order;
        let min_match_percentage = self.min_match_percentage;
        let total = pairs.len().max(1);
        let scored = AtomicUsize::new(0);
        let sink: Mutex<Vec<Match>> = Mutex::new(Vec::new());
        pairs.par_chunks(SCORE_CHUNK).try_for_each(|chunk| {
            job.check_aborted()?;
            let mut local = Vec::new();
            for &(a, b) in chunk {
                let percentage =
                    similarity(&bags[a as usize], &bags[b as usize], weighted, no_field_order);
                if percentage >= min_match_percentage {
                    local.push(Match::new(a as usize, b as usize, percentage));
                }
            }
            sink.lock().extend(local);
            let done = scored.fetch_add(chunk.len(), Ordering::Relaxed) + chunk.len();
            job.set_progress(
                (done * 100 / total) as u32,
                &format!("Performed {done}/{total} comparisons"),
            );
            Ok(())
        })?;

        let mut matches = sink.into_inner();
        sort_matches(&mut matches, files);
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{Job, NullProgress, Progress};
    use crate::types::FileEntry;

    fn entry(path: &str, size: u64) -> FileEntry {
        FileEntry::new(path).with_size(size)
    }

    fn null_job_matches(matcher: &mut dyn Matcher, files: &[FileEntry]) -> Vec<Match> {
        let progress = NullProgress;
        matcher.get_matches(files, &Job::new(&progress)).unwrap()
    }

    #[test]
    fn content_matcher_pairs_equal_sizes() {
        let files = vec![
            entry("/a.txt", 100),
            entry("/b.txt", 100),
            entry("/c.txt", 200),
        ];
        let mut matcher = ContentMatcher {
            attr: ContentAttr::Size,
            partial: false,
            provider: None,
        };
        let matches = null_job_matches(&mut matcher, &files);
        assert_eq!(matches.len(), 1);
        assert_eq!((matches[0].first, matches[0].second), (0, 1));
        assert_eq!(matches[0].percentage, 100);
        assert!(!matches[0].partial);
    }

    #[test]
    fn content_matcher_skips_reference_pairs() {
        let files = vec![
            entry("/a.txt", 100).as_reference(),
            entry("/b.txt", 100).as_reference(),
            entry("/c.txt", 100),
        ];
        let mut matcher = ContentMatcher {
            attr: ContentAttr::Size,
            partial: false,
            provider: None,
        };
        let matches = null_job_matches(&mut matcher, &files);
        // a-b is ref-vs-ref and skipped; a-c and b-c survive.
        assert_eq!(matches.len(), 2);
        assert!(matches.iter().all(|m| !files[m.first].is_ref || !files[m.second].is_ref));
    }

    #[test]
    fn audio_matches_are_partial() {
        let files = vec![
            entry("/a.mp3", 5000).with_audiosize(4000),
            entry("/b.mp3", 6000).with_audiosize(4000),
        ];
        let mut matcher = ContentMatcher {
            attr: ContentAttr::AudioSize,
            partial: true,
            provider: None,
        };
        let matches = null_job_matches(&mut matcher, &files);
        assert_eq!(matches.len(), 1);
        assert!(matches[0].partial);
        assert_eq!(matches[0].percentage, 100);
    }

    #[test]
    fn provider_failure_excludes_only_that_file() {
        struct EvenOnly;
        impl FingerprintProvider for EvenOnly {
            fn fingerprint(&self, file: &FileEntry) -> Option<u64> {
                (file.size() % 2 == 0).then_some(42)
            }
        }
        let files = vec![entry("/a", 2), entry("/b", 4), entry("/c", 3)];
        let mut matcher = ContentMatcher {
            attr: ContentAttr::Fingerprint(ScanType::FuzzyBlock),
            partial: false,
            provider: Some(&EvenOnly),
        };
        let matches = null_job_matches(&mut matcher, &files);
        assert_eq!(matches.len(), 1);
        assert_eq!((matches[0].first, matches[0].second), (0, 1));
    }

    #[test]
    fn missing_provider_is_an_error() {
        let files = vec![entry("/a", 1)];
        let mut matcher = ContentMatcher {
            attr: ContentAttr::Fingerprint(ScanType::FuzzyBlock),
            partial: false,
            provider: None,
        };
        let progress = NullProgress;
        let result = matcher.get_matches(&files, &Job::new(&progress));
        assert!(matches!(result, Err(Error::FingerprintProviderMissing(_))));
    }

    #[test]
    fn word_matcher_only_examines_pairs_sharing_a_token() {
        let files = vec![
            entry("/one/red apple.txt", 1),
            entry("/two/red apple.txt", 1),
            entry("/three/blue pear.txt", 1),
        ];
        let mut matcher = WordMatcher {
            bags: files.iter().map(|f| WordBag::from_name(f.name())).collect(),
            match_similar_words: false,
            weight_words: false,
            min_match_percentage: 0,
            no_field_order: false,
        };
        let matches = null_job_matches(&mut matcher, &files);
        // Even at 0%, the blue/pear file shares no token with the others and
        // is never paired.
        assert_eq!(matches.len(), 1);
        assert_eq!((matches[0].first, matches[0].second), (0, 1));
    }

    #[test]
    fn word_matcher_enforces_the_threshold() {
        let files = vec![
            entry("/song - artist.mp3", 1),
            entry("/song - artist copy.mp3", 1),
        ];
        let bags = files.iter().map(|f| WordBag::from_name(f.name())).collect();
        let mut matcher = WordMatcher {
            bags,
            match_similar_words: false,
            weight_words: false,
            min_match_percentage: 81,
            no_field_order: false,
        };
        assert!(null_job_matches(&mut matcher, &files).is_empty());

        let bags = files.iter().map(|f| WordBag::from_name(f.name())).collect();
        let mut matcher = WordMatcher {
            bags,
            match_similar_words: false,
            weight_words: false,
            min_match_percentage: 80,
            no_field_order: false,
        };
        let matches = null_job_matches(&mut matcher, &files);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].percentage, 80);
    }

    #[test]
    fn abort_stops_the_matcher() {
        struct Abort;
        impl Progress for Abort {
            fn update(&self, _: u32, _: &str) {}
            fn is_aborted(&self) -> bool {
                true
            }
        }
        let files = vec![entry("/a.txt", 1), entry("/b.txt", 1)];
        let mut matcher = ContentMatcher {
            attr: ContentAttr::Size,
            partial: false,
            provider: None,
        };
        let result = matcher.get_matches(&files, &Job::new(&Abort));
        assert!(matches!(result, Err(Error::Aborted)));
    }
}
