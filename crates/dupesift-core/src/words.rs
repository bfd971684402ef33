//! Token extraction and word-bag similarity.
//!
//! Word scans reduce a name (or tag values) to a multiset of lowercase
//! alphanumeric tokens and score pairs by how much of the combined bag both
//! sides share. Bags are kept as sorted vectors so intersection and total
//! measures fall out of a single merge walk.

use ahash::AHashMap;
use smallvec::SmallVec;

/// Tokens shorter than this carry no signal (articles, single letters,
/// track-number digits) and are dropped.
const MIN_TOKEN_CHARS: usize = 3;

/// Basename without its extension. No dot means no extension.
pub(crate) fn rem_file_ext(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => name,
    }
}

/// Extension after the last dot, empty when there is none. Compared
/// case-insensitively by the kind filter.
pub(crate) fn file_ext(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((_, ext)) => ext,
        None => "",
    }
}

/// Split on non-alphanumeric boundaries, lowercase, drop short tokens.
/// The returned multiset is sorted.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    let mut words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= MIN_TOKEN_CHARS)
        .map(|w| w.to_lowercase())
        .collect();
    words.sort_unstable();
    words
}

/// The fingerprint a word scan computes for one file.
#[derive(Debug, Clone)]
pub enum WordBag {
    /// One multiset for the whole name or tag concatenation.
    Flat(Vec<String>),
    /// One multiset per whitespace-separated field, order preserved.
    Fields(SmallVec<[Vec<String>; 4]>),
}

impl WordBag {
    pub(crate) fn from_name(name: &str) -> Self {
        WordBag::Flat(tokenize(rem_file_ext(name)))
    }

    pub(crate) fn fields_from_name(name: &str) -> Self {
        let fields: SmallVec<[Vec<String>; 4]> = rem_file_ext(name)
            .split_whitespace()
            .map(tokenize)
            .filter(|field| !field.is_empty())
            .collect();
        WordBag::Fields(fields)
    }

    /// Every token in the bag, fields flattened.
    pub(crate) fn tokens(&self) -> impl Iterator<Item = &str> {
        let (flat, fields) = match self {
            WordBag::Flat(words) => (Some(words), None),
            WordBag::Fields(fields) => (None, Some(fields)),
        };
        flat.into_iter()
            .flatten()
            .chain(fields.into_iter().flatten().flatten())
            .map(String::as_str)
    }

    fn flattened(&self) -> Vec<String> {
        let mut all: Vec<String> = self.tokens().map(str::to_owned).collect();
        all.sort_unstable();
        all
    }

    fn rewrite(&mut self, canonical: &AHashMap<String, String>) {
        let rewrite_one = |words: &mut Vec<String>| {
            for word in words.iter_mut() {
                if let Some(canon) = canonical.get(word.as_str()) {
                    *word = canon.clone();
                }
            }
            words.sort_unstable();
        };
        match self {
            WordBag::Flat(words) => rewrite_one(words),
            WordBag::Fields(fields) => fields.iter_mut().for_each(rewrite_one),
        }
    }
}

/// Measure of one token: 1 per occurrence, or its length when weighting.
#[inline]
fn measure(token: &str, weighted: bool) -> u64 {
    if weighted {
        token.chars().count() as u64
    } else {
        1
    }
}

/// Score two sorted multisets: the shared measure counted on both sides,
/// over the total measure of both bags, floored to a percent.
fn compare_flat(a: &[String], b: &[String], weighted: bool) -> u32 {
    let mut shared = 0u64;
    let mut total = 0u64;
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => {
                total += measure(&a[i], weighted);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                total += measure(&b[j], weighted);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                shared += measure(&a[i], weighted);
                total += 2 * measure(&a[i], weighted);
                i += 1;
                j += 1;
            }
        }
    }
    total += a[i..].iter().map(|w| measure(w, weighted)).sum::<u64>();
    total += b[j..].iter().map(|w| measure(w, weighted)).sum::<u64>();
    if total == 0 {
        return 0;
    }
    (200 * shared / total) as u32
}

/// Similarity of two bags in percent.
///
/// Field bags compare index-by-index and take the worst field; differing
/// field counts score zero because the extra field has nothing to match.
/// With `no_field_order` both sides collapse to flat bags first.
pub(crate) fn similarity(a: &WordBag, b: &WordBag, weighted: bool, no_field_order: bool) -> u32 {
    match (a, b) {
        (WordBag::Flat(wa), WordBag::Flat(wb)) => compare_flat(wa, wb, weighted),
        (WordBag::Fields(fa), WordBag::Fields(fb)) if !no_field_order => {
            if fa.len() != fb.len() || fa.is_empty() {
                return 0;
            }
            fa.iter()
                .zip(fb.iter())
                .map(|(x, y)| compare_flat(x, y, weighted))
                .min()
                .unwrap_or(0)
        }
        _ => compare_flat(&a.flattened(), &b.flattened(), weighted),
    }
}

/// True when `a` turns into `b` with at most one insertion, deletion or
/// substitution. Callers guarantee the length gap is at most one.
fn within_one_edit(a: &str, b: &str) -> bool {
    let la = a.chars().count();
    let lb = b.chars().count();
    match la.abs_diff(lb) {
        0 => a.chars().zip(b.chars()).filter(|(x, y)| x != y).count() <= 1,
        1 => {
            let (short, long) = if la < lb { (a, b) } else { (b, a) };
            let mut rest = short.chars().peekable();
            let mut skipped = false;
            for c in long.chars() {
                if rest.peek() == Some(&c) {
                    rest.next();
                } else if skipped {
                    return false;
                } else {
                    skipped = true;
                }
            }
            true
        }
        _ => false,
    }
}

/// Merge near-identical words across all bags before scoring.
///
/// Builds equivalence classes of distinct tokens one edit apart (only
/// same-length and off-by-one-length tokens can qualify) and rewrites every
/// bag to the lexicographically smallest member of its class. Computed once
/// per scan, so "mountain" and "montain" score as the same word everywhere.
pub(crate) fn merge_similar_words(bags: &mut [WordBag]) {
    let tokens: Vec<String> = {
        let mut set: Vec<&str> = bags.iter().flat_map(WordBag::tokens).collect();
        set.sort_unstable();
        set.dedup();
        set.into_iter().map(str::to_owned).collect()
    };

    let mut parent: Vec<usize> = (0..tokens.len()).collect();
    fn find(parent: &mut [usize], i: usize) -> usize {
        let mut root = i;
        while parent[root] != root {
            root = parent[root];
        }
        let mut cur = i;
        while parent[cur] != root {
            let next = parent[cur];
            parent[cur] = root;
            cur = next;
        }
        root
    }

    let mut by_len: AHashMap<usize, Vec<usize>> = AHashMap::new();
    for (idx, token) in tokens.iter().enumerate() {
        by_len.entry(token.chars().count()).or_default().push(idx);
    }

    let union = |a: usize, b: usize, parent: &mut Vec<usize>| {
        let (ra, rb) = (find(parent, a), find(parent, b));
        if ra != rb {
            // Root at the smaller index so the class representative is the
            // lexicographically smallest token.
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            parent[hi] = lo;
        }
    };

    for (&len, bucket) in &by_len {
        for (pos, &a) in bucket.iter().enumerate() {
            for &b in &bucket[pos + 1..] {
                if within_one_edit(&tokens[a], &tokens[b]) {
                    union(a, b, &mut parent);
                }
            }
            if let Some(longer) = by_len.get(&(len + 1)) {
                for &b in longer {
                    if within_one_edit(&tokens[a], &tokens[b]) {
                        union(a, b, &mut parent);
                    }
                }
            }
        }
    }

    let mut canonical: AHashMap<String, String> = AHashMap::new();
    for i in 0..tokens.len() {
        let root = find(&mut parent, i);
        if root != i {
            canonical.insert(tokens[i].clone(), tokens[root].clone());
        }
    }
    if canonical.is_empty() {
        return;
    }
    for bag in bags.iter_mut() {
        bag.rewrite(&canonical);
    }
}
