//! Folding the match set into duplicate groups.
//!
//! Plain connected components over a fuzzy match graph produce sprawling
//! groups where nothing actually resembles everything else. Groups here are
//! built around the best-connected file instead: seed on the file with the
//! most live matches, then admit its neighbors only while they stay matched
//! with every member already in. The result is tight groups in which every
//! pair is a real match, and every file belongs to at most one group.

use ahash::{AHashMap, AHashSet};

use crate::types::{FileEntry, Match};

/// A set of mutually matched files with one designated reference member.
/// Indices point into the scan's file arena.
#[derive(Debug, Clone)]
pub struct DupeGroup {
    members: Vec<usize>,
    ref_index: usize,
    percentage: u32,
}

impl DupeGroup {
    /// Every member, the seed first, in admission order.
    pub fn members(&self) -> &[usize] {
        &self.members
    }

    /// Arena index of the reference member.
    pub fn ref_index(&self) -> usize {
        self.ref_index
    }

    pub(crate) fn set_ref_index(&mut self, index: usize) {
        debug_assert!(self.members.contains(&index));
        self.ref_index = index;
    }

    /// Members that are not the reference, i.e. the actionable files.
    pub fn dupes(&self) -> impl Iterator<Item = usize> + '_ {
        let ref_index = self.ref_index;
        self.members.iter().copied().filter(move |&m| m != ref_index)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Mean similarity over the matches between members.
    pub fn percentage(&self) -> u32 {
        self.percentage
    }
}

fn pair_key(a: usize, b: usize) -> (usize, usize) {
    if a < b { (a, b) } else { (b, a) }
}

/// Build groups out of a deduplicated match set.
///
/// Deterministic for a fixed match order: seeds are chosen by live
/// connection count, ties by summed percentage then path, and neighbors are
/// admitted best edge first.
pub(crate) fn get_groups(matches: &[Match], files: &[FileEntry]) -> Vec<DupeGroup> {
    let mut adjacency: AHashMap<usize, Vec<(usize, u32)>> = AHashMap::new();
    let mut edges: AHashMap<(usize, usize), u32> = AHashMap::new();
    for m in matches {
        adjacency.entry(m.first).or_default().push((m.second, m.percentage));
        adjacency.entry(m.second).or_default().push((m.first, m.percentage));
        edges.insert(pair_key(m.first, m.second), m.percentage);
    }
    for neighbors in adjacency.values_mut() {
        neighbors.sort_unstable_by(|a, b| {
            b.1.cmp(&a.1)
                .then_with(|| files[a.0].path().cmp(files[b.0].path()))
        });
    }

    let mut pool: AHashSet<usize> = adjacency.keys().copied().collect();
    let mut live_connections: AHashMap<usize, usize> = AHashMap::new();
    let mut live_percentage: AHashMap<usize, u64> = AHashMap::new();
    for (&file, neighbors) in &adjacency {
        live_connections.insert(file, neighbors.len());
        live_percentage.insert(file, neighbors.iter().map(|&(_, p)| p as u64).sum());
    }

    let mut groups = Vec::new();
    while !pool.is_empty() {
        // The file with the most live matches makes the most coherent seed.
        let mut seed = None;
        for &candidate in &pool {
            let rank = (live_connections[&candidate], live_percentage[&candidate]);
            seed = match seed {
                None => Some((candidate, rank)),
                Some((best, best_rank)) => {
                    let replace = rank > best_rank
                        || (rank == best_rank && files[candidate].path() < files[best].path());
                    if replace {
                        Some((candidate, rank))
                    } else {
                        Some((best, best_rank))
                    }
                }
            };
        }
        let Some((seed, (seed_connections, _))) = seed else {
            break;
        };

        let remove_from_pool = |file: usize,
                                pool: &mut AHashSet<usize>,
                                connections: &mut AHashMap<usize, usize>,
                                percentages: &mut AHashMap<usize, u64>| {
            pool.remove(&file);
            for &(neighbor, pct) in &adjacency[&file] {
                if let Some(count) = connections.get_mut(&neighbor) {
                    *count = count.saturating_sub(1);
                }
                if let Some(sum) = percentages.get_mut(&neighbor) {
                    *sum = sum.saturating_sub(pct as u64);
                }
            }
        };

        if seed_connections == 0 {
            remove_from_pool(seed, &mut pool, &mut live_connections, &mut live_percentage);
            continue;
        }

        let mut members = vec![seed];
        for &(neighbor, _) in &adjacency[&seed] {
            if !pool.contains(&neighbor) || neighbor == seed {
                continue;
            }
            let fits = members
                .iter()
                .all(|&member| edges.contains_key(&pair_key(member, neighbor)));
            if fits {
                members.push(neighbor);
            }
        }

        if members.len() < 2 {
            remove_from_pool(seed, &mut pool, &mut live_connections, &mut live_percentage);
            continue;
        }

        for &member in &members {
            remove_from_pool(member, &mut pool, &mut live_connections, &mut live_percentage);
        }

        let mut pct_sum = 0u64;
        let mut pct_count = 0u64;
        for (pos, &a) in members.iter().enumerate() {
            for &b in &members[pos + 1..] {
                if let Some(&pct) = edges.get(&pair_key(a, b)) {
                    pct_sum += pct as u64;
                    pct_count += 1;
                }
            }
        }
        let percentage = if pct_count == 0 {
            0
        } else {
            (pct_sum / pct_count) as u32
        };

        groups.push(DupeGroup {
            ref_index: members[0],
            members,
            percentage,
        });
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(paths: &[&str]) -> Vec<FileEntry> {
        paths.iter().map(|p| FileEntry::new(*p).with_size(1)).collect()
    }

    #[test]
    fn connected_triple_forms_one_group() {
        let files = entries(&["/a", "/b", "/c"]);
        let matches = vec![
            Match::new(0, 1, 100),
            Match::new(0, 2, 90),
            Match::new(1, 2, 90),
        ];
        let groups = get_groups(&matches, &files);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 3);
        assert_eq!(groups[0].percentage(), 93);
    }

    #[test]
    fn membership_is_exclusive() {
        // b matches both a and c, but a and c do not match each other.
        let files = entries(&["/a", "/b", "/c"]);
        let matches = vec![Match::new(0, 1, 100), Match::new(1, 2, 100)];
        let groups = get_groups(&matches, &files);
        // b seeds and admits a; c is rejected because it has no edge to a,
        // and with b claimed its only connection is spent, so no second
        // group forms.
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
        let total: usize = groups.iter().map(DupeGroup::len).sum();
        assert_eq!(total, 2);
        assert!(!groups[0].members().contains(&2));
    }

    #[test]
    fn unmatched_neighbor_pairs_split_into_separate_groups() {
        // Two pairs bridged by one weak edge: a-b and c-d are solid, b-c is
        // the bridge. The seed's group absorbs what stays mutually matched.
        let files = entries(&["/a", "/b", "/c", "/d"]);
        let matches = vec![
            Match::new(0, 1, 100),
            Match::new(1, 2, 80),
            Match::new(2, 3, 100),
        ];
        let groups = get_groups(&matches, &files);
        assert_eq!(groups.len(), 2);
        let sizes: Vec<usize> = groups.iter().map(DupeGroup::len).collect();
        assert_eq!(sizes, vec![2, 2]);
        // Every file lands in exactly one group.
        let mut all: Vec<usize> = groups.iter().flat_map(|g| g.members().to_vec()).collect();
        all.sort_unstable();
        assert_eq!(all, vec![0, 1, 2, 3]);
    }

    #[test]
    fn groups_need_at_least_two_members() {
        let files = entries(&["/a", "/b", "/c"]);
        // a-b pair; c only matches a, but a will be claimed first by the
        // bigger cluster... with a two-file pool c's match to a dies with it.
        let matches = vec![Match::new(0, 1, 100)];
        let groups = get_groups(&matches, &files);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
    }

    #[test]
    fn grouping_is_deterministic() {
        let files = entries(&["/a", "/b", "/c", "/d", "/e"]);
        let matches = vec![
            Match::new(0, 1, 90),
            Match::new(0, 2, 90),
            Match::new(1, 2, 90),
            Match::new(2, 3, 90),
            Match::new(3, 4, 90),
        ];
        let first = get_groups(&matches, &files);
        for _ in 0..10 {
            let again = get_groups(&matches, &files);
            let a: Vec<Vec<usize>> = first.iter().map(|g| g.members().to_vec()).collect();
            let b: Vec<Vec<usize>> = again.iter().map(|g| g.members().to_vec()).collect();
            assert_eq!(a, b);
        }
    }
}
