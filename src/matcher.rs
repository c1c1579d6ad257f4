use std::collections::BTreeSet;

use crate::formats::{CatalogWork, MatchKind, MatchedWork};
use crate::normalize::normalize_fragment;

pub const DEFAULT_MIN_SUBSTRING_LEN: usize = 4;

#[derive(Debug, Clone)]
struct IndexedWork {
    work: CatalogWork,
    title: String,
    alt_title: Option<String>,
}

/// The catalog as loaded for one run, with titles pre-normalized.
#[derive(Debug, Clone)]
pub struct Catalog {
    works: Vec<IndexedWork>,
    min_substring_len: usize,
}

impl Catalog {
    pub fn new(works: Vec<CatalogWork>, min_substring_len: usize) -> Self {
        let works = works
            .into_iter()
            .map(|work| IndexedWork {
                title: normalize_fragment(&work.title),
                alt_title: work
                    .alt_title
                    .as_deref()
                    .map(normalize_fragment)
                    .filter(|alt| !alt.is_empty()),
                work,
            })
            .collect();
        Self {
            works,
            min_substring_len,
        }
    }

    pub fn len(&self) -> usize {
        self.works.len()
    }

    pub fn is_empty(&self) -> bool {
        self.works.is_empty()
    }

    /// Picks the best-ranked work for a candidate set.
    ///
    /// Ranking is exact title, then exact alternate title, then the longest
    /// candidate contained in either title. Equal ranks resolve to the work
    /// that comes first in the catalog.
    pub fn best_match(&self, candidates: &BTreeSet<String>) -> Option<MatchedWork> {
        let mut best: Option<(MatchKind, &IndexedWork)> = None;

        for indexed in &self.works {
            let Some(kind) = self.rank(indexed, candidates) else {
                continue;
            };
            if best.is_none_or(|(current, _)| kind > current) {
                best = Some((kind, indexed));
            }
        }

        best.map(|(kind, indexed)| MatchedWork {
            id: indexed.work.id.clone(),
            title: indexed.work.title.clone(),
            kind,
        })
    }

    fn rank(&self, indexed: &IndexedWork, candidates: &BTreeSet<String>) -> Option<MatchKind> {
        let mut best: Option<MatchKind> = None;

        for candidate in candidates {
            let kind = if *candidate == indexed.title {
                Some(MatchKind::ExactTitle)
            } else if indexed.alt_title.as_deref() == Some(candidate.as_str()) {
                Some(MatchKind::ExactAlt)
            } else {
                let len = candidate.chars().count();
                let contained = indexed.title.contains(candidate.as_str())
                    || indexed
                        .alt_title
                        .as_deref()
                        .is_some_and(|alt| alt.contains(candidate.as_str()));
                (len >= self.min_substring_len && contained).then_some(MatchKind::Contains { len })
            };

            if let Some(kind) = kind
                && best.is_none_or(|current| kind > current)
            {
                best = Some(kind);
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::WorkId;
    use crate::normalize::normalize;

    fn work(id: &str, title: &str, alt: Option<&str>) -> CatalogWork {
        CatalogWork {
            id: WorkId::from(id),
            title: title.to_owned(),
            alt_title: alt.map(str::to_owned),
        }
    }

    fn candidates(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn matches_alternate_title() {
        let catalog = Catalog::new(
            vec![work("1", "Omniscient Reader", Some("ORV"))],
            DEFAULT_MIN_SUBSTRING_LEN,
        );
        let matched = catalog.best_match(&candidates(&["orv"])).unwrap();
        assert_eq!(matched.id, WorkId::from("1"));
        assert_eq!(matched.kind, MatchKind::ExactAlt);

        assert!(catalog.best_match(&candidates(&["xyz"])).is_none());
    }

    #[test]
    fn exact_match_beats_earlier_substring_match() {
        let catalog = Catalog::new(
            vec![
                work("1", "The Return of the Disaster-Class Hero", None),
                work("2", "Hero", None),
            ],
            DEFAULT_MIN_SUBSTRING_LEN,
        );
        let matched = catalog.best_match(&candidates(&["hero"])).unwrap();
        assert_eq!(matched.id, WorkId::from("2"));
        assert_eq!(matched.kind, MatchKind::ExactTitle);
    }

    #[test]
    fn longer_contained_candidate_wins() {
        let catalog = Catalog::new(
            vec![
                work("1", "Reincarnated Sword Master", None),
                work("2", "The Reincarnated Sword Master of the Academy", None),
            ],
            DEFAULT_MIN_SUBSTRING_LEN,
        );
        let matched = catalog
            .best_match(&normalize("Sword Master / Sword Master of the Academy"))
            .unwrap();
        assert_eq!(matched.id, WorkId::from("2"));
        assert_eq!(
            matched.kind,
            MatchKind::Contains {
                len: "sword master of the academy".len()
            }
        );
    }

    #[test]
    fn equal_rank_keeps_catalog_order() {
        let catalog = Catalog::new(
            vec![
                work("1", "Martial Peak Chronicles", None),
                work("2", "Martial Peak Legends", None),
            ],
            DEFAULT_MIN_SUBSTRING_LEN,
        );
        let matched = catalog.best_match(&candidates(&["martial peak"])).unwrap();
        assert_eq!(matched.id, WorkId::from("1"));
    }

    #[test]
    fn short_candidates_do_not_substring_match() {
        let catalog = Catalog::new(
            vec![work("1", "Overgeared", Some("Overgeared (Novel)"))],
            DEFAULT_MIN_SUBSTRING_LEN,
        );
        assert!(catalog.best_match(&candidates(&["gea"])).is_none());
        assert!(catalog.best_match(&candidates(&["geared"])).is_some());
    }

    #[test]
    fn catalog_titles_are_compared_case_and_space_insensitively() {
        let catalog = Catalog::new(
            vec![work("9", "  Lord   of the MYSTERIES ", None)],
            DEFAULT_MIN_SUBSTRING_LEN,
        );
        let matched = catalog
            .best_match(&normalize("[WN] Lord of the Mysteries"))
            .unwrap();
        assert_eq!(matched.kind, MatchKind::ExactTitle);
        assert_eq!(matched.title, "  Lord   of the MYSTERIES ");
    }
}
