use regex::RegexBuilder;

use crate::contact::Author;

/// Why a candidate looked conflicted with a paper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchReason {
    Name,
    Affiliation,
    Collaborator,
}

/// One advisory match. `author_index` is the position in the paper's
/// author list, or `None` for a hit in the collaborators text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PotentialConflict {
    pub author_index: Option<usize>,
    pub reason: MatchReason,
    pub matched: String,
}

fn word_matcher(term: &str) -> Option<regex::Regex> {
    let term = term.trim();
    if term.len() < 2 {
        return None;
    }
    RegexBuilder::new(&format!(r"\b{}\b", regex::escape(term)))
        .case_insensitive(true)
        .build()
        .ok()
}

fn normalize_affiliation(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if c.is_whitespace() && !out.ends_with(' ') {
            out.push(' ');
        }
    }
    // drop legal suffixes that defeat exact comparison
    let out = out.trim().to_string();
    for suffix in [" inc", " llc", " ltd", " corp", " corporation", " gmbh"] {
        if let Some(stripped) = out.strip_suffix(suffix) {
            return stripped.trim().to_string();
        }
    }
    out
}

fn affiliations_match(a: &str, b: &str) -> bool {
    let (a, b) = (normalize_affiliation(a), normalize_affiliation(b));
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a == b || a.contains(&b) || b.contains(&a)
}

/// Advisory conflict-of-interest scan: does this candidate's name or
/// affiliation show up in the paper's author list or collaborators text?
///
/// Surfaces conflicts the author-entered conflict rows may have missed.
/// Purely advisory: the caller renders the matches, and nothing here ever
/// creates a conflict row. The affiliation reason is reported at most
/// once per candidate even when several authors share the affiliation.
pub fn potential_conflict(
    candidate_name: &str,
    candidate_affiliation: &str,
    authors: &[Author],
    collaborators: &str,
) -> Vec<PotentialConflict> {
    let mut out = Vec::new();
    let name_re = word_matcher(candidate_name.split_whitespace().next_back().unwrap_or(""));
    let mut affiliation_seen = false;

    for (idx, author) in authors.iter().enumerate() {
        if let Some(re) = &name_re {
            let author_name = author.name();
            if !author_name.is_empty() && re.is_match(&author_name) {
                out.push(PotentialConflict {
                    author_index: Some(idx),
                    reason: MatchReason::Name,
                    matched: author_name,
                });
                continue;
            }
        }
        if !affiliation_seen && affiliations_match(candidate_affiliation, &author.affiliation) {
            affiliation_seen = true;
            out.push(PotentialConflict {
                author_index: Some(idx),
                reason: MatchReason::Affiliation,
                matched: author.affiliation.clone(),
            });
        }
    }

    if let Some(re) = &name_re {
        for line in collaborators.lines() {
            let line = line.trim();
            if !line.is_empty() && re.is_match(line) {
                out.push(PotentialConflict {
                    author_index: None,
                    reason: MatchReason::Collaborator,
                    matched: line.to_string(),
                });
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn author(name: &str, affiliation: &str) -> Author {
        let (first, last) = crate::contact::split_name(name);
        Author {
            first,
            last,
            email: String::new(),
            affiliation: affiliation.to_string(),
            contact: false,
        }
    }

    #[test]
    fn name_match_is_word_bounded_and_case_insensitive() {
        let authors = vec![author("Jo LEE", "Somewhere"), author("Ann Leeson", "Elsewhere")];
        let hits = potential_conflict("Mara Lee", "", &authors, "");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].author_index, Some(0));
        assert_eq!(hits[0].reason, MatchReason::Name);
    }

    #[test]
    fn affiliation_reported_once_per_candidate() {
        let authors = vec![
            author("A One", "Example University"),
            author("B Two", "Example University"),
            author("C Three", "Other Place"),
        ];
        let hits = potential_conflict("X Nobody", "example university", &authors, "");
        let aff: Vec<_> = hits
            .iter()
            .filter(|h| h.reason == MatchReason::Affiliation)
            .collect();
        assert_eq!(aff.len(), 1);
        assert_eq!(aff[0].author_index, Some(0));
    }

    #[test]
    fn affiliation_ignores_punctuation_and_suffixes() {
        assert!(affiliations_match("Example, Inc.", "example"));
        assert!(affiliations_match("MIT CSAIL", "csail"));
        assert!(!affiliations_match("", "anything"));
    }

    #[test]
    fn collaborator_lines_are_scanned() {
        let hits = potential_conflict(
            "Jo Lee",
            "",
            &[],
            "Sam Park (Somewhere)\nJo Lee (Example University)\n",
        );
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].author_index, None);
        assert_eq!(hits[0].reason, MatchReason::Collaborator);
    }

    #[test]
    fn advisory_only_no_rows_touched() {
        // a candidate matching nothing yields an empty advisory list
        let authors = vec![author("A One", "Example University")];
        assert!(potential_conflict("Zed Zed", "Nowhere", &authors, "").is_empty());
    }
}
