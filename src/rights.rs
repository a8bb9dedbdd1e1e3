use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use crate::config::Settings;
use crate::conflict::ConflictType;
use crate::review::{fold_review_signatures, ReviewSignature, ReviewStatus, ReviewType};

/// Process-wide invalidation counter for rights snapshots. Any code that
/// changes a role, a conflict row, or a permission-affecting setting must
/// bump it; readers compare their snapshot's stamp against `now()`.
/// Injected rather than global so tests drive invalidation directly.
#[derive(Debug, Default)]
pub struct RightsClock {
    epoch: AtomicU64,
}

impl RightsClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn now(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    pub fn bump(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }
}

/// `contact_info.roles` bits.
pub const ROLE_PC: i32 = 1;
pub const ROLE_CHAIR: i32 = 4;

/// Who is asking. Registered users only; token reviews are attached via
/// `review_tokens`.
#[derive(Debug, Clone, Default)]
pub struct Viewer {
    pub contact_id: i64,
    pub email: String,
    pub is_pc: bool,
    pub is_chair: bool,
    pub review_tokens: Vec<i64>,
}

impl Viewer {
    pub fn pc(contact_id: i64) -> Self {
        Viewer {
            contact_id,
            is_pc: true,
            ..Default::default()
        }
    }

    pub fn chair(contact_id: i64) -> Self {
        Viewer {
            contact_id,
            is_pc: true,
            is_chair: true,
            ..Default::default()
        }
    }
}

/// Memoized per-(paper, viewer) rights snapshot. Not persisted; owned by
/// the paper aggregate, one per distinct viewer seen, discarded when its
/// epoch stamp falls behind the rights clock.
#[derive(Debug, Clone)]
pub struct PaperContactInfo {
    pub contact_id: i64,
    pub conflict_type: ConflictType,
    pub review_type: Option<ReviewType>,
    pub review_status: ReviewStatus,
    /// Chair or paper manager, regardless of conflict.
    pub allow_administer: bool,
    /// `allow_administer` minus conflicted-and-not-overriding.
    pub can_administer: bool,
    /// Unconflicted PC standing (or administering).
    pub allow_pc: bool,
    /// Viewer works on this paper as an author.
    pub act_author_view: bool,
    pub allow_review: bool,
    pub epoch: u64,
    /// Censored-tag memos, filled by the authorization layer. Sync memos
    /// keep the snapshot `Send`, so a working set can be held across
    /// await points.
    pub viewable_tags: OnceLock<String>,
    pub searchable_tags: OnceLock<String>,
}

impl PaperContactInfo {
    /// Empty snapshot: no conflict, no review, no special standing.
    pub fn empty(viewer: &Viewer, epoch: u64) -> Self {
        Self::derive(viewer, ConflictType::None, &[], 0, 0, &Settings::default(), epoch)
    }

    /// Fold the viewer's conflict row and review signature entries into
    /// one snapshot. `lead_contact_id`/`manager_contact_id` come from the
    /// paper row.
    pub fn derive(
        viewer: &Viewer,
        conflict_type: ConflictType,
        review_signatures: &[ReviewSignature],
        lead_contact_id: i64,
        manager_contact_id: i64,
        settings: &Settings,
        epoch: u64,
    ) -> Self {
        let is_lead = lead_contact_id != 0 && lead_contact_id == viewer.contact_id;
        let (review_type, review_status) = fold_review_signatures(
            review_signatures,
            is_lead,
            settings.lead_sees_reviews_without_review,
        );

        let allow_administer = viewer.is_chair
            || (manager_contact_id != 0 && manager_contact_id == viewer.contact_id);
        let conflicted = conflict_type.is_conflicted();
        let can_administer = allow_administer && !conflicted;
        let allow_pc = can_administer || (viewer.is_pc && !conflicted);

        PaperContactInfo {
            contact_id: viewer.contact_id,
            conflict_type,
            review_type,
            review_status,
            allow_administer,
            can_administer,
            allow_pc,
            act_author_view: conflict_type.is_author(),
            allow_review: allow_pc || review_type.is_some(),
            epoch,
            viewable_tags: OnceLock::new(),
            searchable_tags: OnceLock::new(),
        }
    }

    pub fn is_conflicted(&self) -> bool {
        self.conflict_type.is_conflicted()
    }

    pub fn has_review(&self) -> bool {
        self.review_type.is_some()
    }

    pub fn has_submitted_review(&self) -> bool {
        self.review_status == ReviewStatus::Submitted
    }

    /// Variant for "view as if unconflicted" administration. Fresh
    /// censor memos: the forced view must not share cache state with the
    /// normal one.
    pub fn forced(&self) -> Self {
        let mut forced = self.clone();
        forced.viewable_tags = OnceLock::new();
        forced.searchable_tags = OnceLock::new();
        if forced.allow_administer {
            forced.can_administer = true;
            forced.allow_pc = true;
            forced.allow_review = true;
        }
        forced
    }

    pub fn is_stale(&self, clock: &RightsClock) -> bool {
        self.epoch != clock.now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::parse_review_signature;

    #[test]
    fn clock_bump_staleness() {
        let clock = RightsClock::new();
        let viewer = Viewer::pc(3);
        let snap = PaperContactInfo::empty(&viewer, clock.now());
        assert!(!snap.is_stale(&clock));
        clock.bump();
        assert!(snap.is_stale(&clock));
    }

    #[test]
    fn conflicted_chair_cannot_administer_without_override() {
        let viewer = Viewer::chair(5);
        let snap = PaperContactInfo::derive(
            &viewer,
            ConflictType::Marked,
            &[],
            0,
            0,
            &Settings::default(),
            0,
        );
        assert!(snap.allow_administer);
        assert!(!snap.can_administer);
        assert!(!snap.allow_pc);

        let forced = snap.forced();
        assert!(forced.can_administer);
        assert!(forced.allow_pc);
    }

    #[test]
    fn manager_administers_without_chair_role() {
        let viewer = Viewer::pc(9);
        let snap = PaperContactInfo::derive(
            &viewer,
            ConflictType::None,
            &[],
            0,
            9,
            &Settings::default(),
            0,
        );
        assert!(snap.can_administer);
    }

    #[test]
    fn reviewer_standing_from_signature() {
        let viewer = Viewer::pc(4);
        let sig = parse_review_signature("4 0 1");
        let snap =
            PaperContactInfo::derive(&viewer, ConflictType::None, &sig, 0, 0, &Settings::default(), 0);
        assert_eq!(snap.review_type, Some(ReviewType::Primary));
        assert_eq!(snap.review_status, ReviewStatus::Unsubmitted);
        assert!(snap.allow_review);
    }

    #[test]
    fn author_conflict_grants_author_view() {
        let viewer = Viewer::default();
        let snap = PaperContactInfo::derive(
            &Viewer {
                contact_id: 2,
                ..viewer
            },
            ConflictType::ContactAuthor,
            &[],
            0,
            0,
            &Settings::default(),
            0,
        );
        assert!(snap.act_author_view);
        assert!(snap.is_conflicted());
        assert!(!snap.allow_pc);
    }

    #[test]
    fn snapshots_move_between_threads() {
        fn assert_send<T: Send + Sync>() {}
        assert_send::<PaperContactInfo>();
    }

    #[test]
    fn forced_clone_does_not_share_memos() {
        let viewer = Viewer::chair(5);
        let snap = PaperContactInfo::empty(&viewer, 0);
        snap.viewable_tags.set("secret#1".to_string()).unwrap();
        let forced = snap.forced();
        assert!(forced.viewable_tags.get().is_none());
        assert_eq!(snap.viewable_tags.get().map(String::as_str), Some("secret#1"));
    }
}
