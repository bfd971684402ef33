//! Choosing which member of a group is the reference.
//!
//! The reference is the file the user keeps; everything else in the group is
//! up for deletion. Ranking is by a key (largest file by default) and ties
//! fall through a naming heuristic: files named like copies ("foo copy",
//! "foo (2)") should not win over the original they were copied from.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::grouping::DupeGroup;
use crate::types::FileEntry;
use crate::words::rem_file_ext;

static DIGIT_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\d+|\(\d+\)|\[\d+\]|\{\d+\})").expect("digit suffix pattern is valid")
});

/// True when `name` is `refname` with a digit marker after it — bare digits
/// or digits wrapped in (), [] or {}. Only the start of the remainder
/// matters; "foo 2nd" still reads as a numbered variant of "foo".
pub fn is_same_with_digit(name: &str, refname: &str) -> bool {
    let Some(end) = name.strip_prefix(refname) else {
        return false;
    };
    DIGIT_SUFFIX.is_match(end.trim())
}

/// Should `dupe` take the reference slot from `current`? Called only when
/// the ranking key ties.
pub(crate) fn tie_breaker(current: &FileEntry, dupe: &FileEntry) -> bool {
    let refname = rem_file_ext(current.name()).to_lowercase();
    let dupename = rem_file_ext(dupe.name()).to_lowercase();
    if dupename.contains("copy") {
        return false;
    }
    if refname.contains("copy") {
        return true;
    }
    if is_same_with_digit(&dupename, &refname) {
        return false;
    }
    if is_same_with_digit(&refname, &dupename) {
        return true;
    }
    dupe.path().as_os_str().len() > current.path().as_os_str().len()
}

impl DupeGroup {
    /// Pick the reference member: smallest key wins, ties go through the
    /// naming tie-breaker, and files flagged as reference win over anything
    /// that is not.
    pub fn prioritize<K: Ord>(&mut self, files: &[FileEntry], key: impl Fn(&FileEntry) -> K) {
        let members = self.members().to_vec();
        let mut best = members[0];
        for &challenger in &members[1..] {
            let current_entry = &files[best];
            let challenger_entry = &files[challenger];
            let usurps = if challenger_entry.is_ref != current_entry.is_ref {
                challenger_entry.is_ref
            } else {
                match key(challenger_entry).cmp(&key(current_entry)) {
                    std::cmp::Ordering::Less => true,
                    std::cmp::Ordering::Greater => false,
                    std::cmp::Ordering::Equal => tie_breaker(current_entry, challenger_entry),
                }
            };
            if usurps {
                best = challenger;
            }
        }
        self.set_ref_index(best);
    }
}

/// Default ranking: the largest file is the one worth keeping.
pub fn default_key(file: &FileEntry) -> std::cmp::Reverse<u64> {
    std::cmp::Reverse(file.size())
}
