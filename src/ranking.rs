//! Fuzzy ranking shared by catalog search and guard suggestions.
//!
//! Ranking order: prefix matches, then substring matches, then word matches;
//! within a tier the earliest match wins, then label, then id.
use serde::Serialize;
use std::cmp::Ordering;

/// Minimum query word length for word-level matches.
const MIN_WORD_LEN: usize = 3;

/// How a candidate matched the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Prefix,
    Substring,
    Word,
}

/// A candidate that matched, with its ranking keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedMatch {
    pub id: String,
    pub label: String,
    pub tier: MatchTier,
    pub position: usize,
}

impl RankedMatch {
    fn rank_cmp(&self, other: &Self) -> Ordering {
        self.tier
            .cmp(&other.tier)
            .then(self.position.cmp(&other.position))
            .then_with(|| self.label.cmp(&other.label))
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Rank `(id, label)` candidates against `query`, keeping at most `limit`.
pub fn rank_candidates<'a, I>(query: &str, candidates: I, limit: usize) -> Vec<RankedMatch>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let needle = query.trim().to_lowercase();
    if needle.is_empty() || limit == 0 {
        return Vec::new();
    }
    let words: Vec<&str> = needle
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|word| word.chars().count() >= MIN_WORD_LEN)
        .collect();

    let mut matches: Vec<RankedMatch> = candidates
        .into_iter()
        .filter_map(|(id, label)| {
            let (tier, position) = match_candidate(&needle, &words, id, label)?;
            Some(RankedMatch {
                id: id.to_string(),
                label: label.to_string(),
                tier,
                position,
            })
        })
        .collect();
    matches.sort_by(RankedMatch::rank_cmp);
    matches.truncate(limit);
    matches
}

fn match_candidate(
    needle: &str,
    words: &[&str],
    id: &str,
    label: &str,
) -> Option<(MatchTier, usize)> {
    let label = label.to_lowercase();
    let id = id.to_lowercase();

    if label.starts_with(needle) || id.starts_with(needle) {
        return Some((MatchTier::Prefix, 0));
    }
    let substring = [label.find(needle), id.find(needle)]
        .into_iter()
        .flatten()
        .min();
    if let Some(position) = substring {
        return Some((MatchTier::Substring, position));
    }
    words
        .iter()
        .flat_map(|word| [label.find(word), id.find(word)])
        .flatten()
        .min()
        .map(|position| (MatchTier::Word, position))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANDIDATES: [(&str, &str); 5] = [
        ("ACT.CAR_PETROL", "Petrol car travel"),
        ("ACT.BUS", "Bus travel"),
        ("ACT.CAR_EV", "Electric car travel"),
        ("ACT.FLIGHT_SHORT", "Short-haul flight"),
        ("ACT.BEEF", "Beef consumption"),
    ];

    fn ids(matches: &[RankedMatch]) -> Vec<&str> {
        matches.iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn prefix_matches_rank_above_substring_matches() {
        let matches = rank_candidates("car", CANDIDATES, 10);
        assert!(matches.iter().all(|m| m.tier == MatchTier::Substring));
        assert_eq!(ids(&matches), vec!["ACT.CAR_EV", "ACT.CAR_PETROL"]);

        let matches = rank_candidates("bus", CANDIDATES, 10);
        assert_eq!(matches[0].tier, MatchTier::Prefix);
        assert_eq!(ids(&matches), vec!["ACT.BUS"]);
    }

    #[test]
    fn word_matches_rank_last() {
        let matches = rank_candidates("long flight by bus", CANDIDATES, 10);
        assert_eq!(ids(&matches), vec!["ACT.BUS", "ACT.FLIGHT_SHORT"]);
        assert!(matches.iter().all(|m| m.tier == MatchTier::Word));
        assert_eq!(matches[0].position, 0);
    }

    #[test]
    fn ties_break_by_label_then_id() {
        let candidates = [("B", "same"), ("A", "same"), ("C", "other same")];
        let matches = rank_candidates("same", candidates, 10);
        assert_eq!(ids(&matches), vec!["A", "B", "C"]);
    }

    #[test]
    fn matching_is_case_insensitive_and_limited() {
        let matches = rank_candidates("  TRAVEL ", CANDIDATES, 2);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, "ACT.BUS");
    }

    #[test]
    fn empty_query_matches_nothing() {
        assert!(rank_candidates("   ", CANDIDATES, 5).is_empty());
        assert!(rank_candidates("beef", CANDIDATES, 0).is_empty());
    }
}
