use crate::comment::CommentInfo;
use crate::review::{ReviewInfo, ReviewType};

/// One entry in the merged review/comment timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimelineItem<'a> {
    Review(&'a ReviewInfo),
    Comment(&'a CommentInfo),
}

impl TimelineItem<'_> {
    pub fn time_displayed(&self) -> i64 {
        match self {
            TimelineItem::Review(r) => r.time_displayed,
            TimelineItem::Comment(c) => c.time_displayed,
        }
    }
}

/// Order reviews for display.
///
/// Submitted reviews (and any review that already has an ordinal) sort by
/// `(time_displayed, review_ordinal, review_id)`. Unsubmitted non-external
/// reviews follow at the end. Each unsubmitted external review is then
/// spliced in directly after the review chain of its requester, so a
/// delegated review stays grouped with its parent in listings.
pub fn reviews_by_display<'a>(reviews: &'a [ReviewInfo]) -> Vec<&'a ReviewInfo> {
    let mut ordered: Vec<&ReviewInfo> = reviews
        .iter()
        .filter(|r| r.is_submitted() || r.review_ordinal > 0)
        .collect();
    ordered.sort_by_key(|r| (r.time_displayed, r.review_ordinal, r.review_id));

    for r in reviews {
        if !r.is_submitted() && r.review_ordinal == 0 && r.review_type > ReviewType::External {
            ordered.push(r);
        }
    }

    for r in reviews {
        if r.is_submitted() || r.review_ordinal > 0 || r.review_type > ReviewType::External {
            continue;
        }
        // last matching parent wins
        let parent = ordered.iter().rposition(|cand| {
            cand.contact_id == r.requested_by
                || (cand.review_type < ReviewType::Pc
                    && cand.requested_by == r.requested_by
                    && cand.time_approval_requested != 0
                    && (r.time_approval_requested == 0
                        || cand.time_approval_requested <= r.time_approval_requested))
        });
        match parent {
            Some(i) => ordered.insert(i + 1, r),
            None => ordered.push(r),
        }
    }

    ordered
}

/// Merge two already-time-sorted sequences into one timeline.
///
/// Walks both with two pointers taking whichever front has the smaller
/// `time_displayed`, reviews first on ties. A front with
/// `time_displayed == 0` (not yet displayed) stops the merge; the
/// remainder of both lists is appended in original order. Taking a review
/// also pulls in any immediately-following reviews that are not yet
/// displayed, so they stay glued to their predecessor.
pub fn merge_reviews_and_comments<'a>(
    reviews: &[&'a ReviewInfo],
    comments: &[&'a CommentInfo],
) -> Vec<TimelineItem<'a>> {
    let mut out = Vec::with_capacity(reviews.len() + comments.len());
    let mut ri = 0;
    let mut ci = 0;

    while ri < reviews.len() && ci < comments.len() {
        let rt = reviews[ri].time_displayed;
        let ct = comments[ci].time_displayed;
        if rt == 0 || ct == 0 {
            break;
        }
        if rt <= ct {
            out.push(TimelineItem::Review(reviews[ri]));
            ri += 1;
            while ri < reviews.len() && reviews[ri].time_displayed == 0 {
                out.push(TimelineItem::Review(reviews[ri]));
                ri += 1;
            }
        } else {
            out.push(TimelineItem::Comment(comments[ci]));
            ci += 1;
        }
    }

    out.extend(reviews[ri..].iter().map(|r| TimelineItem::Review(r)));
    out.extend(comments[ci..].iter().map(|c| TimelineItem::Comment(c)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comment::CT_RESPONSE;
    use crate::review::NEEDS_SUBMIT;

    fn review(id: i64, ty: ReviewType, submitted: Option<i64>, ordinal: i32, td: i64) -> ReviewInfo {
        ReviewInfo {
            review_id: id,
            paper_id: 1,
            contact_id: 100 + id,
            review_token: 0,
            review_type: ty,
            review_round: 0,
            review_ordinal: ordinal,
            review_blind: true,
            requested_by: 0,
            time_requested: 0,
            time_approval_requested: 0,
            review_submitted: submitted,
            review_needs_submit: if submitted.is_some() { 0 } else { NEEDS_SUBMIT },
            time_displayed: td,
            text: None,
            full_loaded: false,
        }
    }

    fn comment(id: i64, td: i64) -> CommentInfo {
        CommentInfo {
            comment_id: id,
            paper_id: 1,
            contact_id: 7,
            comment_type: 2 | CT_RESPONSE,
            comment_round: 0,
            time_modified: td,
            time_displayed: td,
            text: None,
        }
    }

    fn ids(order: &[&ReviewInfo]) -> Vec<i64> {
        order.iter().map(|r| r.review_id).collect()
    }

    #[test]
    fn submitted_reviews_sort_by_display_time() {
        let reviews = vec![
            review(1, ReviewType::Primary, Some(50), 2, 500),
            review(2, ReviewType::Pc, Some(40), 1, 400),
            review(3, ReviewType::Secondary, Some(60), 3, 500),
        ];
        // id breaks the tie at time 500
        assert_eq!(ids(&reviews_by_display(&reviews)), vec![2, 1, 3]);
    }

    #[test]
    fn unsubmitted_pc_reviews_go_last() {
        let reviews = vec![
            review(1, ReviewType::Primary, None, 0, 0),
            review(2, ReviewType::Pc, Some(40), 1, 400),
        ];
        assert_eq!(ids(&reviews_by_display(&reviews)), vec![2, 1]);
    }

    #[test]
    fn delegated_external_review_follows_its_requester() {
        let mut parent = review(1, ReviewType::Secondary, Some(40), 1, 400);
        parent.contact_id = 500;
        let other = review(2, ReviewType::Primary, Some(50), 2, 500);
        let mut delegate = review(3, ReviewType::External, None, 0, 0);
        delegate.requested_by = 500;
        let reviews = vec![parent, other, delegate];
        assert_eq!(ids(&reviews_by_display(&reviews)), vec![1, 3, 2]);
    }

    #[test]
    fn last_matching_parent_wins() {
        let mut p1 = review(1, ReviewType::Secondary, Some(40), 1, 400);
        p1.contact_id = 500;
        let mut p2 = review(2, ReviewType::Secondary, Some(50), 2, 500);
        p2.contact_id = 500;
        let mut delegate = review(3, ReviewType::External, None, 0, 0);
        delegate.requested_by = 500;
        let reviews = vec![p1, p2, delegate];
        assert_eq!(ids(&reviews_by_display(&reviews)), vec![1, 2, 3]);
    }

    #[test]
    fn orphan_external_review_goes_last() {
        let parent = review(1, ReviewType::Primary, Some(40), 1, 400);
        let mut delegate = review(2, ReviewType::External, None, 0, 0);
        delegate.requested_by = 999;
        let reviews = vec![parent, delegate];
        assert_eq!(ids(&reviews_by_display(&reviews)), vec![1, 2]);
    }

    #[test]
    fn merge_is_time_sorted_with_reviews_first_on_ties() {
        let reviews = vec![
            review(1, ReviewType::Pc, Some(10), 1, 100),
            review(2, ReviewType::Pc, Some(30), 2, 300),
        ];
        let comments = vec![comment(10, 100), comment(11, 200)];
        let rrefs: Vec<&ReviewInfo> = reviews.iter().collect();
        let crefs: Vec<&CommentInfo> = comments.iter().collect();
        let merged = merge_reviews_and_comments(&rrefs, &crefs);
        let times: Vec<i64> = merged.iter().map(|i| i.time_displayed()).collect();
        assert_eq!(times, vec![100, 100, 200, 300]);
        assert!(matches!(merged[0], TimelineItem::Review(r) if r.review_id == 1));
        assert!(matches!(merged[1], TimelineItem::Comment(c) if c.comment_id == 10));
    }

    #[test]
    fn undisplayed_front_stops_the_merge() {
        let reviews = vec![review(1, ReviewType::Pc, Some(10), 1, 100)];
        let comments = vec![comment(10, 0), comment(11, 50)];
        let rrefs: Vec<&ReviewInfo> = reviews.iter().collect();
        let crefs: Vec<&CommentInfo> = comments.iter().collect();
        let merged = merge_reviews_and_comments(&rrefs, &crefs);
        // comment front is undisplayed: everything appended in original order
        assert!(matches!(merged[0], TimelineItem::Review(_)));
        assert!(matches!(merged[1], TimelineItem::Comment(c) if c.comment_id == 10));
        assert!(matches!(merged[2], TimelineItem::Comment(c) if c.comment_id == 11));
    }

    #[test]
    fn undisplayed_reviews_stay_glued_to_predecessor() {
        let reviews = vec![
            review(1, ReviewType::Pc, Some(10), 1, 100),
            review(2, ReviewType::Pc, None, 0, 0),
            review(3, ReviewType::Pc, Some(30), 3, 300),
        ];
        let comments = vec![comment(10, 200)];
        let rrefs: Vec<&ReviewInfo> = reviews.iter().collect();
        let crefs: Vec<&CommentInfo> = comments.iter().collect();
        let merged = merge_reviews_and_comments(&rrefs, &crefs);
        assert!(matches!(merged[0], TimelineItem::Review(r) if r.review_id == 1));
        assert!(matches!(merged[1], TimelineItem::Review(r) if r.review_id == 2));
        assert!(matches!(merged[2], TimelineItem::Comment(_)));
        assert!(matches!(merged[3], TimelineItem::Review(r) if r.review_id == 3));
    }
}
