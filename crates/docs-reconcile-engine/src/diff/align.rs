//! Two-tier sequence alignment.
//!
//! Tier 1 pairs items whose equality keys match, as a longest common
//! subsequence. Tier 2 then walks each gap between those anchors and pairs
//! the remaining items by score, keeping the pairing monotone. Whatever is
//! still unpaired is deleted or added.

use similar::{Algorithm, DiffTag, TextDiff, capture_diff_slices};

/// One step of an alignment, in document order. Deletions come before the
/// additions that share their gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pairing {
    Equal(usize, usize),
    Modified(usize, usize),
    Deleted(usize),
    Added(usize),
}

/// Character similarity of two strings in `[0, 1]`.
pub fn similarity(a: &str, b: &str) -> f32 {
    if a == b {
        return 1.0;
    }
    TextDiff::from_chars(a, b).ratio()
}

/// Aligns `pristine` against `current`.
///
/// `score` returns `None` for pairs that may never be matched. Among
/// candidates, the highest score wins and ties go to the earliest pristine
/// item. A trailing pair left unmatched by both tiers is forced together
/// when `keep_last` accepts it.
pub fn align<T>(
    pristine: &[T],
    current: &[T],
    key: impl Fn(&T) -> String,
    score: impl Fn(&T, &T) -> Option<f32>,
    keep_last: Option<fn(&T, &T) -> bool>,
) -> Vec<Pairing> {
    let old_keys: Vec<String> = pristine.iter().map(&key).collect();
    let new_keys: Vec<String> = current.iter().map(&key).collect();

    let mut old_match: Vec<Option<(usize, bool)>> = vec![None; pristine.len()];
    let mut new_match: Vec<Option<usize>> = vec![None; current.len()];
    let mut anchors = Vec::new();
    for op in capture_diff_slices(Algorithm::Myers, &old_keys, &new_keys) {
        let (tag, old, new) = op.as_tag_tuple();
        if tag != DiffTag::Equal {
            continue;
        }
        for (i, j) in old.zip(new) {
            old_match[i] = Some((j, true));
            new_match[j] = Some(i);
            anchors.push((i, j));
        }
    }

    // gaps between consecutive anchors, plus the tail
    let mut gap_old = 0;
    let mut gap_new = 0;
    anchors.push((pristine.len(), current.len()));
    for &(anchor_old, anchor_new) in &anchors {
        let mut floor = gap_old;
        for j in gap_new..anchor_new {
            let mut best: Option<(usize, f32)> = None;
            for i in floor..anchor_old {
                if old_match[i].is_some() {
                    continue;
                }
                let Some(s) = score(&pristine[i], &current[j]) else {
                    continue;
                };
                if best.is_none_or(|(_, b)| s > b) {
                    best = Some((i, s));
                }
            }
            if let Some((i, _)) = best {
                old_match[i] = Some((j, false));
                new_match[j] = Some(i);
                floor = i + 1;
            }
        }
        gap_old = anchor_old + 1;
        gap_new = anchor_new + 1;
    }

    if let Some(compatible) = keep_last
        && let (Some(i), Some(j)) = (pristine.len().checked_sub(1), current.len().checked_sub(1))
        && old_match[i].is_none()
        && new_match[j].is_none()
        && compatible(&pristine[i], &current[j])
    {
        old_match[i] = Some((j, false));
        new_match[j] = Some(i);
    }

    merge(&old_match, &new_match)
}

fn merge(old_match: &[Option<(usize, bool)>], new_match: &[Option<usize>]) -> Vec<Pairing> {
    let mut out = Vec::with_capacity(old_match.len().max(new_match.len()));
    let mut j = 0;
    for (i, matched) in old_match.iter().enumerate() {
        let Some((partner, exact)) = *matched else {
            out.push(Pairing::Deleted(i));
            continue;
        };
        while j < partner {
            if new_match[j].is_none() {
                out.push(Pairing::Added(j));
            }
            j += 1;
        }
        out.push(if exact {
            Pairing::Equal(i, partner)
        } else {
            Pairing::Modified(i, partner)
        });
        j = partner + 1;
    }
    while j < new_match.len() {
        if new_match[j].is_none() {
            out.push(Pairing::Added(j));
        }
        j += 1;
    }
    out
}

/// Turns a gap holding exactly one deletion and one addition into a
/// modification when `compatible` accepts the pair, whatever its score.
pub fn pair_lone_gaps(
    pairings: Vec<Pairing>,
    compatible: impl Fn(usize, usize) -> bool,
) -> Vec<Pairing> {
    let mut out = Vec::with_capacity(pairings.len());
    let mut gap: Vec<Pairing> = Vec::new();
    let flush = |gap: &mut Vec<Pairing>, out: &mut Vec<Pairing>| {
        match gap.as_slice() {
            [Pairing::Deleted(i), Pairing::Added(j)] if compatible(*i, *j) => {
                out.push(Pairing::Modified(*i, *j));
            }
            _ => out.extend_from_slice(gap.as_slice()),
        }
        gap.clear();
    };
    for pairing in pairings {
        match pairing {
            Pairing::Deleted(_) | Pairing::Added(_) => gap.push(pairing),
            matched => {
                flush(&mut gap, &mut out);
                out.push(matched);
            }
        }
    }
    flush(&mut gap, &mut out);
    out
}

/// For each `Added(j)`, the pristine index it is inserted in front of: the
/// next matched pristine item, or the pristine length.
pub fn slots(pairings: &[Pairing], pristine_len: usize) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut pending = Vec::new();
    for pairing in pairings {
        match *pairing {
            Pairing::Added(j) => pending.push(j),
            Pairing::Equal(i, _) | Pairing::Modified(i, _) => {
                out.extend(pending.drain(..).map(|j| (j, i)));
            }
            Pairing::Deleted(_) => {}
        }
    }
    out.extend(pending.drain(..).map(|j| (j, pristine_len)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn anything(_: &&str, _: &&str) -> bool {
        true
    }

    fn words(
        pristine: &[&str],
        current: &[&str],
        threshold: f32,
        keep_last: bool,
    ) -> Vec<Pairing> {
        align(
            pristine,
            current,
            |s| s.to_string(),
            |a, b| Some(similarity(a, b)).filter(|s| *s >= threshold),
            keep_last.then_some(anything as fn(&&str, &&str) -> bool),
        )
    }

    #[test]
    fn exact_matches_anchor_the_alignment() {
        assert_eq!(
            words(&["a", "b", "c"], &["a", "c"], 0.5, false),
            vec![Pairing::Equal(0, 0), Pairing::Deleted(1), Pairing::Equal(2, 1)]
        );
    }

    #[test]
    fn similar_items_are_modified() {
        assert_eq!(
            words(&["Hello World", "x"], &["Hello, World!", "x"], 0.5, false),
            vec![Pairing::Modified(0, 0), Pairing::Equal(1, 1)]
        );
    }

    #[test]
    fn dissimilar_items_are_replaced_and_deletes_come_first() {
        assert_eq!(
            words(&["keep", "aaaa"], &["keep", "zzzz"], 0.5, false),
            vec![Pairing::Equal(0, 0), Pairing::Deleted(1), Pairing::Added(1)]
        );
    }

    #[test]
    fn trailing_items_can_be_forced_together() {
        assert_eq!(
            words(&["keep", "aaaa"], &["keep", "zzzz"], 0.5, true),
            vec![Pairing::Equal(0, 0), Pairing::Modified(1, 1)]
        );
    }

    #[test]
    fn ties_go_to_the_earliest_candidate() {
        assert_eq!(
            words(&["abc!", "abc!"], &["abc?"], 0.0, false),
            vec![Pairing::Modified(0, 0), Pairing::Deleted(1)]
        );
    }

    #[test]
    fn lone_replacement_becomes_a_modification() {
        let pairings = words(&["keep", "Two", "end"], &["keep", "Two and a half", "end"], 0.5, false);
        assert_eq!(
            pairings,
            vec![
                Pairing::Equal(0, 0),
                Pairing::Deleted(1),
                Pairing::Added(1),
                Pairing::Equal(2, 2)
            ]
        );
        assert_eq!(
            pair_lone_gaps(pairings.clone(), |_, _| true),
            vec![Pairing::Equal(0, 0), Pairing::Modified(1, 1), Pairing::Equal(2, 2)]
        );
        assert_eq!(pair_lone_gaps(pairings.clone(), |_, _| false), pairings);
    }

    #[test]
    fn crowded_gaps_keep_their_deletions_and_additions() {
        let pairings = vec![
            Pairing::Deleted(0),
            Pairing::Deleted(1),
            Pairing::Added(0),
            Pairing::Equal(2, 1),
            Pairing::Added(2),
        ];
        assert_eq!(pair_lone_gaps(pairings.clone(), |_, _| true), pairings);
    }

    #[test]
    fn slots_point_at_the_next_matched_item() {
        let pairings = vec![
            Pairing::Equal(0, 0),
            Pairing::Deleted(1),
            Pairing::Added(1),
            Pairing::Added(2),
            Pairing::Equal(2, 3),
            Pairing::Added(4),
        ];
        assert_eq!(slots(&pairings, 3), vec![(1, 2), (2, 2), (4, 3)]);
    }
}
