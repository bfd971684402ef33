//! Post-filters that weed false matches out of the raw match set.
//!
//! Applied in a fixed order by the scanner: nested-folder redundancy, file
//! kind, existence, reference rules, then the user's ignore list.

use ahash::AHashSet;
use std::path::{Path, PathBuf};

use crate::types::{FileEntry, Match};
use crate::words::file_ext;

/// Unordered path pairs the user never wants matched again. Lookup is
/// symmetric; persistence is the caller's concern.
#[derive(Debug, Default, Clone)]
pub struct IgnoreList {
    pairs: AHashSet<(String, String)>,
}

impl IgnoreList {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(a: &Path, b: &Path) -> (String, String) {
        let a = a.to_string_lossy().into_owned();
        let b = b.to_string_lossy().into_owned();
        if a <= b { (a, b) } else { (b, a) }
    }

    pub fn ignore(&mut self, a: &Path, b: &Path) {
        self.pairs.insert(Self::key(a, b));
    }

    pub fn is_ignored(&self, a: &Path, b: &Path) -> bool {
        self.pairs.contains(&Self::key(a, b))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn clear(&mut self) {
        self.pairs.clear();
    }
}

/// Folder scans match parents and children alike; a match between two
/// folders that both live inside already-matched folders says nothing new.
///
/// Endpoint paths are sorted and walked once: a path with an already-seen
/// ancestor (by path segments, not string prefix) is redundant. Only matches
/// with *both* endpoints redundant are dropped; the parent match subsumes
/// them.
pub(crate) fn discard_nested_folder_matches(
    mut matches: Vec<Match>,
    files: &[FileEntry],
) -> Vec<Match> {
    if matches.is_empty() {
        return matches;
    }
    let mut endpoints: Vec<&Path> = matches
        .iter()
        .flat_map(|m| [files[m.first].path(), files[m.second].path()])
        .collect();
    endpoints.sort_unstable();
    endpoints.dedup();

    let mut redundant: AHashSet<&Path> = AHashSet::new();
    let mut ancestor = endpoints[0];
    for &path in &endpoints[1..] {
        if path.starts_with(ancestor) {
            redundant.insert(path);
        } else {
            ancestor = path;
        }
    }

    matches.retain(|m| {
        !(redundant.contains(files[m.first].path()) && redundant.contains(files[m.second].path()))
    });
    matches
}

/// Matches between different file kinds, by extension.
pub(crate) fn retain_same_kind(mut matches: Vec<Match>, files: &[FileEntry]) -> Vec<Match> {
    matches.retain(|m| {
        file_ext(files[m.first].name()).eq_ignore_ascii_case(file_ext(files[m.second].name()))
    });
    matches
}

/// Matches whose endpoints are both still on disk. A file deleted mid-scan
/// silently takes its matches with it.
pub(crate) fn retain_existing(mut matches: Vec<Match>, files: &[FileEntry]) -> Vec<Match> {
    let mut exists_cache: Vec<Option<bool>> = vec![None; files.len()];
    let mut exists = |index: usize| -> bool {
        *exists_cache[index].get_or_insert_with(|| files[index].exists())
    };
    matches.retain(|m| exists(m.first) && exists(m.second));
    matches
}

/// Matches with two reference endpoints cannot be acted upon at all.
pub(crate) fn discard_both_reference(mut matches: Vec<Match>, files: &[FileEntry]) -> Vec<Match> {
    matches.retain(|m| !(files[m.first].is_ref && files[m.second].is_ref));
    matches
}

/// When the user only wants groups anchored to a reference file, keep a
/// non-reference pair only if one of its endpoints also matches a reference
/// file somewhere else — dropping it would break the transitive chain that
/// pulls the pair into a reference-anchored group.
pub(crate) fn retain_reference_linked(matches: Vec<Match>, files: &[FileEntry]) -> Vec<Match> {
    let mut ref_linked: AHashSet<usize> = AHashSet::new();
    for m in &matches {
        if files[m.first].is_ref {
            ref_linked.insert(m.second);
        }
        if files[m.second].is_ref {
            ref_linked.insert(m.first);
        }
    }
    matches
        .into_iter()
        .filter(|m| {
            files[m.first].is_ref
                || files[m.second].is_ref
                || ref_linked.contains(&m.first)
                || ref_linked.contains(&m.second)
        })
        .collect()
}

/// Paths of every distinct file referenced by the match set, in match order.
pub(crate) fn matched_paths(matches: &[Match], files: &[FileEntry]) -> Vec<PathBuf> {
    let mut seen = AHashSet::new();
    let mut paths = Vec::new();
    for m in matches {
        for index in [m.first, m.second] {
            if seen.insert(index) {
                paths.push(files[index].path().to_path_buf());
            }
        }
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FileEntry;

    fn entries(paths: &[&str]) -> Vec<FileEntry> {
        paths.iter().map(|p| FileEntry::new(*p).with_size(1)).collect()
    }

    #[test]
    fn ignore_list_is_symmetric() {
        let mut list = IgnoreList::new();
        list.ignore(Path::new("/a"), Path::new("/b"));
        assert!(list.is_ignored(Path::new("/a"), Path::new("/b")));
        assert!(list.is_ignored(Path::new("/b"), Path::new("/a")));
        assert!(!list.is_ignored(Path::new("/a"), Path::new("/c")));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn nested_folder_matches_are_absorbed_by_their_parents() {
        let files = entries(&["/a", "/a/b", "/c", "/c/d"]);
        let all_pairs: Vec<Match> = (0..4)
            .flat_map(|i| ((i + 1)..4).map(move |j| Match::new(i, j, 100)))
            .collect();
        let kept = discard_nested_folder_matches(all_pairs, &files);
        // /a/b and /c/d are both redundant; only their mutual match goes.
        assert_eq!(kept.len(), 5);
        assert!(!kept.iter().any(|m| (m.first, m.second) == (1, 3)));
    }

    #[test]
    fn segment_containment_does_not_fall_for_name_prefixes() {
        // "/ab" is not inside "/a" even though the string starts with it.
        let files = entries(&["/a", "/ab"]);
        let kept = discard_nested_folder_matches(vec![Match::new(0, 1, 100)], &files);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn mixed_kinds_are_dropped_when_requested() {
        let files = entries(&["/x.jpg", "/x.png", "/y.JPG"]);
        let matches = vec![Match::new(0, 1, 100), Match::new(0, 2, 100)];
        let kept = retain_same_kind(matches, &files);
        // jpg/png goes, jpg/JPG stays.
        assert_eq!(kept.len(), 1);
        assert_eq!((kept[0].first, kept[0].second), (0, 2));
    }

    #[test]
    fn both_reference_matches_are_useless() {
        let mut files = entries(&["/a", "/b", "/c"]);
        files[0].is_ref = true;
        files[1].is_ref = true;
        let matches = vec![Match::new(0, 1, 100), Match::new(0, 2, 100)];
        let kept = discard_both_reference(matches, &files);
        assert_eq!(kept.len(), 1);
        assert_eq!((kept[0].first, kept[0].second), (0, 2));
    }

    #[test]
    fn reference_rescue_keeps_transitively_anchored_pairs() {
        let mut files = entries(&["/ref", "/a", "/b", "/c", "/d"]);
        files[0].is_ref = true;
        // ref-a, a-b (anchored through a), c-d (orphan).
        let matches = vec![
            Match::new(0, 1, 100),
            Match::new(1, 2, 100),
            Match::new(3, 4, 100),
        ];
        let kept = retain_reference_linked(matches, &files);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|m| m.first != 3));
    }

    #[test]
    fn matched_paths_lists_each_file_once_in_match_order() {
        let files = entries(&["/a", "/b", "/c"]);
        let matches = vec![Match::new(0, 1, 100), Match::new(1, 2, 100)];
        let paths = matched_paths(&matches, &files);
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/a"),
                PathBuf::from("/b"),
                PathBuf::from("/c")
            ]
        );
    }
}
