pub mod potential;

pub use potential::{potential_conflict, MatchReason, PotentialConflict};

use crate::comment::{CommentInfo, CommentVisibility};
use crate::config::{BlindMode, Settings};
use crate::paper::PaperInfo;
use crate::review::ReviewInfo;
use crate::rights::{PaperContactInfo, Viewer};
use crate::tags::{format_tag_string, Tag};

/// Whether the viewer may see the paper's author identities.
///
/// Authors and administrators always may. Everyone else goes through the
/// blind policy: `deblinded` is an explicitly granted view-authors state
/// (e.g. after a chair lifts anonymity), and under until-review the gate
/// also opens once the viewer has a submitted review on this paper.
pub fn can_view_authors(
    paper: &PaperInfo,
    rights: &PaperContactInfo,
    settings: &Settings,
    deblinded: bool,
) -> bool {
    if rights.can_administer || rights.act_author_view {
        return true;
    }
    match settings.blind_mode {
        BlindMode::Never => true,
        BlindMode::Always => deblinded,
        BlindMode::Optional => !paper.blind || deblinded,
        BlindMode::UntilReview => deblinded || rights.has_submitted_review(),
    }
}

/// Whether the viewer may read the review's content. Independent of
/// identity visibility.
pub fn can_view_review(
    paper: &PaperInfo,
    review: &ReviewInfo,
    rights: &PaperContactInfo,
    viewer: &Viewer,
) -> bool {
    if rights.can_administer {
        return true;
    }
    if review.belongs_to(viewer.contact_id, &viewer.review_tokens) {
        return true;
    }
    if rights.is_conflicted() && !rights.act_author_view {
        return false;
    }
    if rights.act_author_view {
        // authors see a review once it has been made author-visible
        return review.review_ordinal > 0 && review.time_displayed > 0;
    }
    if !review.is_submitted() {
        return false;
    }
    if rights.allow_pc {
        return true;
    }
    // external reviewers see other reviews only after submitting theirs
    rights.has_review() && rights.has_submitted_review() && paper.paper_id == review.paper_id
}

/// Whether the viewer may learn who wrote the review. Administrators and
/// the review's own author always pass.
pub fn can_view_review_identity(
    _paper: &PaperInfo,
    review: &ReviewInfo,
    rights: &PaperContactInfo,
    viewer: &Viewer,
) -> bool {
    if rights.can_administer {
        return true;
    }
    if review.belongs_to(viewer.contact_id, &viewer.review_tokens) {
        return true;
    }
    if rights.act_author_view {
        return !review.review_blind;
    }
    if rights.allow_pc {
        return true;
    }
    rights.has_submitted_review() && !review.review_blind
}

pub fn can_view_comment(
    _paper: &PaperInfo,
    comment: &CommentInfo,
    rights: &PaperContactInfo,
    viewer: &Viewer,
) -> bool {
    if rights.can_administer {
        return true;
    }
    if comment.is_draft() {
        return comment.contact_id == viewer.contact_id;
    }
    if comment.contact_id == viewer.contact_id {
        return true;
    }
    match comment.visibility() {
        CommentVisibility::AdminOnly => false,
        CommentVisibility::PcOnly => rights.allow_pc,
        CommentVisibility::Reviewer => rights.allow_pc || rights.allow_review,
        CommentVisibility::Author => {
            rights.act_author_view || rights.allow_pc || rights.allow_review
        }
    }
}

/// Whether the viewer may learn who wrote the comment.
pub fn can_view_comment_identity(
    paper: &PaperInfo,
    comment: &CommentInfo,
    rights: &PaperContactInfo,
    viewer: &Viewer,
) -> bool {
    if !can_view_comment(paper, comment, rights, viewer) {
        return false;
    }
    if rights.can_administer || comment.contact_id == viewer.contact_id {
        return true;
    }
    if rights.act_author_view {
        return !comment.is_blind();
    }
    true
}

fn tag_visible(tag: &Tag, rights: &PaperContactInfo, viewer: &Viewer) -> bool {
    if !rights.allow_pc && !rights.can_administer {
        return false;
    }
    if tag.is_chair_tag() {
        return rights.allow_administer;
    }
    if let Some(owner) = tag.twiddle_owner() {
        return owner == viewer.contact_id || rights.can_administer;
    }
    true
}

/// Censored tag string for display, memoized on the rights snapshot. The
/// memo dies with the snapshot (rights-epoch bump) or when tags reload.
pub fn viewable_tags<'a>(
    paper: &'a PaperInfo,
    rights: &'a PaperContactInfo,
    viewer: &Viewer,
) -> &'a str {
    rights.viewable_tags.get_or_init(|| {
        let visible: Vec<Tag> = paper
            .tags()
            .iter()
            .filter(|t| tag_visible(t, rights, viewer))
            .cloned()
            .collect();
        format_tag_string(&visible)
    })
}

/// Subset of the viewable tags usable in search: other people's private
/// twiddle tags stay out even for administrators.
pub fn searchable_tags<'a>(
    paper: &'a PaperInfo,
    rights: &'a PaperContactInfo,
    viewer: &Viewer,
) -> &'a str {
    rights.searchable_tags.get_or_init(|| {
        let visible: Vec<Tag> = paper
            .tags()
            .iter()
            .filter(|t| {
                tag_visible(t, rights, viewer)
                    && t.twiddle_owner().map_or(true, |o| o == viewer.contact_id)
            })
            .cloned()
            .collect();
        format_tag_string(&visible)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comment::{CT_BLIND, CT_DRAFT, CT_RESPONSE};
    use crate::config::Settings;
    use crate::conflict::{ConflictType, PaperConflict};
    use crate::review::{parse_review_signature, ReviewType, NEEDS_SUBMIT};
    use crate::rights::RightsClock;
    use crate::tags::parse_tag_string;

    fn paper() -> PaperInfo {
        let mut p = PaperInfo::new(1);
        p.load_conflicts(vec![]);
        p.load_review_signatures(vec![]);
        p.blind = true;
        p
    }

    fn rights_of(viewer: &Viewer, paper: &mut PaperInfo, settings: &Settings) -> PaperContactInfo {
        let clock = RightsClock::new();
        paper.contact_info(viewer, settings, &clock).clone()
    }

    fn review(id: i64, contact: i64, submitted: Option<i64>, blind: bool) -> ReviewInfo {
        ReviewInfo {
            review_id: id,
            paper_id: 1,
            contact_id: contact,
            review_token: 0,
            review_type: ReviewType::Pc,
            review_round: 0,
            review_ordinal: if submitted.is_some() { id as i32 } else { 0 },
            review_blind: blind,
            requested_by: 0,
            time_requested: 0,
            time_approval_requested: 0,
            review_submitted: submitted,
            review_needs_submit: if submitted.is_some() { 0 } else { NEEDS_SUBMIT },
            time_displayed: submitted.unwrap_or(0),
            text: None,
            full_loaded: false,
        }
    }

    #[test]
    fn always_blind_hides_authors_from_plain_pc() {
        // ordinary PC member, no conflict, no submitted review
        let mut p = paper();
        let settings = Settings::default();
        let viewer = Viewer::pc(8);
        let rights = rights_of(&viewer, &mut p, &settings);
        assert!(!can_view_authors(&p, &rights, &settings, false));
        assert!(can_view_authors(&p, &rights, &settings, true));
    }

    #[test]
    fn until_review_opens_after_submission() {
        let mut p = paper();
        let settings = Settings {
            blind_mode: BlindMode::UntilReview,
            ..Settings::default()
        };
        let viewer = Viewer::pc(8);
        let rights = rights_of(&viewer, &mut p, &settings);
        assert!(!can_view_authors(&p, &rights, &settings, false));

        p.load_full_reviews(vec![review(1, 8, Some(100), true)]);
        let rights = rights_of(&viewer, &mut p, &settings);
        assert!(can_view_authors(&p, &rights, &settings, false));
    }

    #[test]
    fn optional_blind_respects_paper_flag() {
        let mut p = paper();
        let settings = Settings {
            blind_mode: BlindMode::Optional,
            ..Settings::default()
        };
        let viewer = Viewer::pc(8);
        let rights = rights_of(&viewer, &mut p, &settings);
        assert!(!can_view_authors(&p, &rights, &settings, false));
        p.blind = false;
        assert!(can_view_authors(&p, &rights, &settings, false));
    }

    #[test]
    fn authors_and_admins_bypass_blinding() {
        let mut p = paper();
        let settings = Settings::default();

        p.load_conflicts(vec![PaperConflict {
            contact_id: 3,
            conflict_type: ConflictType::Author,
        }]);
        let author = Viewer {
            contact_id: 3,
            ..Viewer::default()
        };
        let rights = rights_of(&author, &mut p, &settings);
        assert!(can_view_authors(&p, &rights, &settings, false));

        let chair = Viewer::chair(9);
        let rights = rights_of(&chair, &mut p, &settings);
        assert!(can_view_authors(&p, &rights, &settings, false));
    }

    #[test]
    fn conflicted_pc_member_sees_nothing() {
        let mut p = paper();
        let settings = Settings::default();
        p.load_conflicts(vec![PaperConflict {
            contact_id: 8,
            conflict_type: ConflictType::Marked,
        }]);
        p.load_full_reviews(vec![review(1, 20, Some(100), true)]);
        let viewer = Viewer::pc(8);
        let rights = rights_of(&viewer, &mut p, &settings);
        let r = p.review_by_id(1).unwrap();
        assert!(!can_view_review(&p, r, &rights, &viewer));
        assert!(!can_view_authors(&p, &rights, &settings, false));
    }

    #[test]
    fn review_content_rules() {
        let mut p = paper();
        let settings = Settings::default();
        p.load_full_reviews(vec![
            review(1, 20, Some(100), true),
            review(2, 21, None, true),
        ]);

        // unconflicted PC: submitted yes, unsubmitted no
        let pc = Viewer::pc(8);
        let rights = rights_of(&pc, &mut p, &settings);
        assert!(can_view_review(&p, p.review_by_id(1).unwrap(), &rights, &pc));
        assert!(!can_view_review(&p, p.review_by_id(2).unwrap(), &rights, &pc));

        // the unsubmitted review's own author still sees it
        let owner = Viewer {
            contact_id: 21,
            ..Viewer::default()
        };
        let rights = rights_of(&owner, &mut p, &settings);
        assert!(can_view_review(&p, p.review_by_id(2).unwrap(), &rights, &owner));
    }

    #[test]
    fn author_sees_identity_only_when_review_not_blind() {
        let mut p = paper();
        let settings = Settings::default();
        p.load_conflicts(vec![PaperConflict {
            contact_id: 3,
            conflict_type: ConflictType::ContactAuthor,
        }]);
        p.load_full_reviews(vec![review(1, 20, Some(100), true), review(2, 21, Some(110), false)]);
        let author = Viewer {
            contact_id: 3,
            ..Viewer::default()
        };
        let rights = rights_of(&author, &mut p, &settings);
        assert!(!can_view_review_identity(&p, p.review_by_id(1).unwrap(), &rights, &author));
        assert!(can_view_review_identity(&p, p.review_by_id(2).unwrap(), &rights, &author));
    }

    #[test]
    fn comment_visibility_classes() {
        let mut p = paper();
        let settings = Settings::default();
        let mk = |id, ctype| CommentInfo {
            comment_id: id,
            paper_id: 1,
            contact_id: 50,
            comment_type: ctype,
            comment_round: 0,
            time_modified: 10,
            time_displayed: 10,
            text: None,
        };
        let admin_note = mk(1, 0);
        let pc_note = mk(2, 1);
        let response = mk(3, 3 | CT_RESPONSE | CT_BLIND);
        let draft = mk(4, 3 | CT_RESPONSE | CT_DRAFT);

        let pc = Viewer::pc(8);
        let rights = rights_of(&pc, &mut p, &settings);
        assert!(!can_view_comment(&p, &admin_note, &rights, &pc));
        assert!(can_view_comment(&p, &pc_note, &rights, &pc));
        assert!(can_view_comment(&p, &response, &rights, &pc));
        assert!(!can_view_comment(&p, &draft, &rights, &pc));

        let chair = Viewer::chair(9);
        let rights = rights_of(&chair, &mut p, &settings);
        assert!(can_view_comment(&p, &admin_note, &rights, &chair));
        assert!(can_view_comment(&p, &draft, &rights, &chair));

        // blind response hides its author's identity from paper authors
        p.load_conflicts(vec![PaperConflict {
            contact_id: 3,
            conflict_type: ConflictType::Author,
        }]);
        let author = Viewer {
            contact_id: 3,
            ..Viewer::default()
        };
        let rights = rights_of(&author, &mut p, &settings);
        assert!(can_view_comment(&p, &response, &rights, &author));
        assert!(!can_view_comment_identity(&p, &response, &rights, &author));
    }

    #[test]
    fn tag_censoring_and_memoization() {
        let mut p = paper();
        let settings = Settings::default();
        p.load_tags(parse_tag_string("accept#2 8~vote#1 9~vote#2 ~~confidential"));

        let pc = Viewer::pc(8);
        let rights = rights_of(&pc, &mut p, &settings);
        assert_eq!(viewable_tags(&p, &rights, &pc), "accept#2 8~vote#1");
        assert_eq!(searchable_tags(&p, &rights, &pc), "accept#2 8~vote#1");
        // memoized: same answer without recomputation
        assert_eq!(viewable_tags(&p, &rights, &pc), "accept#2 8~vote#1");

        let chair = Viewer::chair(2);
        let rights = rights_of(&chair, &mut p, &settings);
        assert_eq!(
            viewable_tags(&p, &rights, &chair),
            "accept#2 8~vote#1 9~vote#2 ~~confidential"
        );
        assert_eq!(searchable_tags(&p, &rights, &chair), "accept#2 ~~confidential");

        let outsider = Viewer::default();
        let rights = rights_of(&outsider, &mut p, &settings);
        assert_eq!(viewable_tags(&p, &rights, &outsider), "");
    }
}
