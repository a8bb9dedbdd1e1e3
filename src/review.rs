/// Review authority levels, ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i32)]
pub enum ReviewType {
    External = 1,
    Pc = 2,
    Secondary = 3,
    Primary = 4,
    Meta = 5,
}

impl ReviewType {
    pub fn from_raw(value: i32) -> Option<Self> {
        match value {
            1 => Some(ReviewType::External),
            2 => Some(ReviewType::Pc),
            3 => Some(ReviewType::Secondary),
            4 => Some(ReviewType::Primary),
            5 => Some(ReviewType::Meta),
            _ => None,
        }
    }

    pub fn as_raw(self) -> i32 {
        self as i32
    }
}

/// `review_needs_submit` tri-state.
pub const NEEDS_SUBMIT: i32 = 1;
pub const NEEDS_SUBMIT_DONE: i32 = 0;
pub const NEEDS_SUBMIT_DECLINED: i32 = -1;

/// One review row. Loaded at signature fidelity first (no text); the text
/// arrives with the full load.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewInfo {
    pub review_id: i64,
    pub paper_id: i64,
    pub contact_id: i64,
    /// Nonzero for token-held reviews; the holder is matched by token, not
    /// by contact id.
    pub review_token: i64,
    pub review_type: ReviewType,
    pub review_round: i32,
    /// Human-facing sequence number, assigned once author-visible; 0 until
    /// then.
    pub review_ordinal: i32,
    pub review_blind: bool,
    pub requested_by: i64,
    pub time_requested: i64,
    pub time_approval_requested: i64,
    pub review_submitted: Option<i64>,
    pub review_needs_submit: i32,
    /// First moment this review became visible; 0 when not yet displayed.
    pub time_displayed: i64,
    pub text: Option<String>,
    /// False while only the signature columns are loaded.
    pub full_loaded: bool,
}

impl ReviewInfo {
    pub fn is_submitted(&self) -> bool {
        self.review_submitted.is_some() || self.review_needs_submit == NEEDS_SUBMIT_DONE
    }

    /// A review belongs to a viewer if the contact id matches or the
    /// viewer holds its token.
    pub fn belongs_to(&self, contact_id: i64, tokens: &[i64]) -> bool {
        (self.contact_id != 0 && self.contact_id == contact_id)
            || (self.review_token != 0 && tokens.contains(&self.review_token))
    }
}

/// Derived review standing of one viewer on one paper, folded over every
/// review row that viewer holds. Ordered so that combining entries can
/// only raise it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ReviewStatus {
    #[default]
    None,
    /// Discussion lead treated as if reviewed, without a review row.
    Proxied,
    Unsubmitted,
    Submitted,
}

/// One entry of the denormalized review signature column:
/// `reviewType reviewSubmittedFlag reviewNeedsSubmit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewSignature {
    pub review_type: ReviewType,
    pub submitted: bool,
    pub needs_submit: i32,
}

impl ReviewSignature {
    fn status(&self) -> ReviewStatus {
        if self.submitted || self.needs_submit == NEEDS_SUBMIT_DONE {
            ReviewStatus::Submitted
        } else {
            ReviewStatus::Unsubmitted
        }
    }
}

/// Parse a comma-joined signature string. Malformed entries are skipped;
/// the string form stops here.
pub fn parse_review_signature(sig: &str) -> Vec<ReviewSignature> {
    sig.split(',')
        .filter_map(|entry| {
            let mut w = entry.split_whitespace();
            let review_type = ReviewType::from_raw(w.next()?.parse().ok()?)?;
            let submitted: i64 = w.next()?.parse().ok()?;
            let needs_submit: i32 = w.next()?.parse().ok()?;
            Some(ReviewSignature {
                review_type,
                submitted: submitted > 0,
                needs_submit,
            })
        })
        .collect()
}

/// Fold a viewer's signature entries into (max review type, max status).
/// Ordinarily there is at most one entry, but token reviews can yield
/// more; the fold is a monotone max so entry order never matters.
pub fn fold_review_signatures(
    entries: &[ReviewSignature],
    is_lead: bool,
    lead_sees_reviews_without_review: bool,
) -> (Option<ReviewType>, ReviewStatus) {
    let mut max_type: Option<ReviewType> = None;
    let mut status = ReviewStatus::None;
    for e in entries {
        max_type = Some(max_type.map_or(e.review_type, |t| t.max(e.review_type)));
        status = status.max(e.status());
    }
    if status == ReviewStatus::None && is_lead && !lead_sees_reviews_without_review {
        status = ReviewStatus::Proxied;
    }
    (max_type, status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_parses_triples() {
        let sig = parse_review_signature("4 1 0, 1 0 1");
        assert_eq!(sig.len(), 2);
        assert_eq!(sig[0].review_type, ReviewType::Primary);
        assert!(sig[0].submitted);
        assert_eq!(sig[1].review_type, ReviewType::External);
        assert!(!sig[1].submitted);
        assert_eq!(sig[1].needs_submit, NEEDS_SUBMIT);
    }

    #[test]
    fn fold_takes_max_type_and_status() {
        let entries = parse_review_signature("1 0 1, 3 1 0");
        let (ty, st) = fold_review_signatures(&entries, false, false);
        assert_eq!(ty, Some(ReviewType::Secondary));
        assert_eq!(st, ReviewStatus::Submitted);
    }

    #[test]
    fn fold_is_order_independent_and_monotone() {
        let entries = parse_review_signature("4 0 1, 1 1 0, 2 0 1");
        let (_, folded) = fold_review_signatures(&entries, false, false);
        for e in &entries {
            let (_, single) = fold_review_signatures(&[*e], false, false);
            assert!(folded >= single);
        }
        let mut rev: Vec<_> = entries.iter().copied().rev().collect();
        let (ty_f, st_f) = fold_review_signatures(&entries, false, false);
        let (ty_r, st_r) = fold_review_signatures(&rev, false, false);
        assert_eq!((ty_f, st_f), (ty_r, st_r));
        rev.rotate_left(1);
        assert_eq!(fold_review_signatures(&rev, false, false), (ty_f, st_f));
    }

    #[test]
    fn lead_without_review_is_proxied() {
        let (_, st) = fold_review_signatures(&[], true, false);
        assert_eq!(st, ReviewStatus::Proxied);
        // setting grants the lead real visibility, so no proxy marker
        let (_, st) = fold_review_signatures(&[], true, true);
        assert_eq!(st, ReviewStatus::None);
        // a real review row wins over the proxy
        let entries = parse_review_signature("2 0 1");
        let (_, st) = fold_review_signatures(&entries, true, false);
        assert_eq!(st, ReviewStatus::Unsubmitted);
    }

    #[test]
    fn delegated_complete_counts_as_submitted() {
        let entries = parse_review_signature("3 0 0");
        let (_, st) = fold_review_signatures(&entries, false, false);
        assert_eq!(st, ReviewStatus::Submitted);
    }
}
