pub mod lifecycle;
pub mod set;

pub use lifecycle::SubmissionStatus;
pub use set::PaperInfoSet;

use std::collections::HashMap;

use crate::comment::CommentInfo;
use crate::config::Settings;
use crate::conflict::{ConflictType, PaperConflict};
use crate::contact::{Author, Contact};
use crate::db::{PaperRow, ReviewRequestRow, ReviewRefusalRow, RightsRow};
use crate::docs::DocumentInfo;
use crate::prefs::ReviewPreference;
use crate::review::{ReviewInfo, ReviewSignature, ReviewType};
use crate::rights::{PaperContactInfo, RightsClock, Viewer};
use crate::tags::Tag;
use crate::timeline::{self, TimelineItem};

/// A sparse custom-option value on a paper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperOptionValue {
    pub option_id: i64,
    pub value: i64,
    pub data: Option<String>,
}

/// An outstanding external-review request on a paper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRequest {
    pub email: String,
    pub first: String,
    pub last: String,
    pub affiliation: String,
    pub requested_by: i64,
    pub time_requested: i64,
}

impl ReviewRequest {
    /// Requests target people who may not hold an account yet.
    pub fn contact(&self) -> Contact {
        Contact::Unregistered {
            first: self.first.clone(),
            last: self.last.clone(),
            email: self.email.clone(),
            affiliation: self.affiliation.clone(),
        }
    }
}

/// A declined review request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRefusal {
    pub email: String,
    pub contact_id: i64,
    pub refused_by: i64,
    pub reason: Option<String>,
}

impl ReviewRefusal {
    /// Refusals keep the account link when one exists; a refusal recorded
    /// before registration carries only the email.
    pub fn contact(&self) -> Contact {
        if self.contact_id != 0 {
            Contact::Registered {
                contact_id: self.contact_id,
            }
        } else {
            Contact::Unregistered {
                first: String::new(),
                last: String::new(),
                email: self.email.clone(),
                affiliation: String::new(),
            }
        }
    }
}

/// One paper with its lazily loaded relationships.
///
/// Relationship slots are tri-state: `None` means unloaded, `Some(vec)`
/// loaded (possibly empty, so a paper with no rows is not re-queried).
/// Sync accessors require the slot to be loaded and panic otherwise:
/// loading is the job of the owning [`PaperInfoSet`]'s `ensure_*`
/// operations, and an unensured access is a caller bug, not a user error.
#[derive(Debug, Clone, Default)]
pub struct PaperInfo {
    pub paper_id: i64,
    pub title: String,
    pub abstract_text: String,
    pub authors: Vec<Author>,
    pub collaborators: String,
    pub status: SubmissionStatus,
    pub withdraw_reason: Option<String>,
    pub outcome: i32,
    pub lead_contact_id: i64,
    pub manager_contact_id: i64,
    pub submission_doc_id: i64,
    pub final_doc_id: i64,
    /// Per-paper blind flag, meaningful under `BlindMode::Optional`.
    pub blind: bool,

    conflicts: Option<Vec<PaperConflict>>,
    reviews: Option<Vec<ReviewInfo>>,
    reviews_full: bool,
    comments: Option<Vec<CommentInfo>>,
    tags: Option<Vec<Tag>>,
    topics: Option<Vec<i64>>,
    preferences: Option<Vec<ReviewPreference>>,
    options: Option<Vec<PaperOptionValue>>,
    documents: Option<Vec<DocumentInfo>>,
    review_requests: Option<Vec<ReviewRequest>>,
    review_refusals: Option<Vec<ReviewRefusal>>,

    /// One rights snapshot per distinct viewer seen, keyed by contact id.
    /// Anonymous token holders all carry contact id 0 and cannot be told
    /// apart by this key, so their snapshots are never treated as fresh.
    rights: HashMap<i64, PaperContactInfo>,
}

impl PaperInfo {
    pub fn new(paper_id: i64) -> Self {
        PaperInfo {
            paper_id,
            blind: true,
            ..Default::default()
        }
    }

    pub fn from_row(row: PaperRow) -> Self {
        let authors = row
            .author_information
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(Author::from_line)
            .collect();
        PaperInfo {
            paper_id: row.paper_id,
            title: row.title,
            abstract_text: row.abstract_text,
            authors,
            collaborators: row.collaborators,
            status: SubmissionStatus::decode(row.time_submitted, row.time_withdrawn),
            withdraw_reason: row.withdraw_reason,
            outcome: row.outcome,
            lead_contact_id: row.lead_contact_id,
            manager_contact_id: row.manager_contact_id,
            submission_doc_id: row.submission_doc_id,
            final_doc_id: row.final_doc_id,
            blind: row.blind,
            ..Self::new(0)
        }
    }

    // ---- load state -------------------------------------------------

    pub fn conflicts_loaded(&self) -> bool {
        self.conflicts.is_some()
    }

    pub fn reviews_loaded(&self) -> bool {
        self.reviews.is_some()
    }

    pub fn reviews_fully_loaded(&self) -> bool {
        self.reviews_full && self.reviews.is_some()
    }

    pub fn comments_loaded(&self) -> bool {
        self.comments.is_some()
    }

    pub fn tags_loaded(&self) -> bool {
        self.tags.is_some()
    }

    pub fn topics_loaded(&self) -> bool {
        self.topics.is_some()
    }

    pub fn preferences_loaded(&self) -> bool {
        self.preferences.is_some()
    }

    pub fn options_loaded(&self) -> bool {
        self.options.is_some()
    }

    pub fn documents_loaded(&self) -> bool {
        self.documents.is_some()
    }

    pub fn review_requests_loaded(&self) -> bool {
        self.review_requests.is_some()
    }

    pub fn review_refusals_loaded(&self) -> bool {
        self.review_refusals.is_some()
    }

    // ---- loaders (called by the set and by tests) -------------------

    pub fn load_conflicts(&mut self, conflicts: Vec<PaperConflict>) {
        self.conflicts = Some(conflicts);
        self.invalidate_rights();
    }

    /// Signature-fidelity load; keeps a full load if one already happened.
    pub fn load_review_signatures(&mut self, reviews: Vec<ReviewInfo>) {
        if !self.reviews_full {
            self.reviews = Some(reviews);
            self.invalidate_rights();
        }
    }

    pub fn load_full_reviews(&mut self, reviews: Vec<ReviewInfo>) {
        self.reviews = Some(reviews);
        self.reviews_full = true;
        self.invalidate_rights();
    }

    pub fn load_comments(&mut self, comments: Vec<CommentInfo>) {
        self.comments = Some(comments);
    }

    pub fn load_tags(&mut self, tags: Vec<Tag>) {
        self.tags = Some(tags);
        self.invalidate_tag_memos();
    }

    pub fn load_topics(&mut self, topics: Vec<i64>) {
        self.topics = Some(topics);
    }

    pub fn load_preferences(&mut self, preferences: Vec<ReviewPreference>) {
        self.preferences = Some(preferences);
    }

    pub fn load_options(&mut self, options: Vec<PaperOptionValue>) {
        self.options = Some(options);
    }

    pub fn load_documents(&mut self, documents: Vec<DocumentInfo>) {
        self.documents = Some(documents);
    }

    pub fn load_review_requests(&mut self, rows: Vec<ReviewRequestRow>) {
        self.review_requests = Some(
            rows.into_iter()
                .map(|r| ReviewRequest {
                    email: r.email,
                    first: r.first_name,
                    last: r.last_name,
                    affiliation: r.affiliation,
                    requested_by: r.requested_by,
                    time_requested: r.time_requested,
                })
                .collect(),
        );
    }

    pub fn load_review_refusals(&mut self, rows: Vec<ReviewRefusalRow>) {
        self.review_refusals = Some(
            rows.into_iter()
                .map(|r| ReviewRefusal {
                    email: r.email,
                    contact_id: r.contact_id,
                    refused_by: r.refused_by,
                    reason: r.reason,
                })
                .collect(),
        );
    }

    // ---- invalidation -----------------------------------------------

    /// Any mutation of conflict rows must call this (and bump the rights
    /// clock if the mutation is visible process-wide).
    pub fn invalidate_conflicts(&mut self) {
        self.conflicts = None;
        self.invalidate_rights();
    }

    pub fn invalidate_reviews(&mut self) {
        self.reviews = None;
        self.reviews_full = false;
        self.invalidate_rights();
    }

    pub fn invalidate_comments(&mut self) {
        self.comments = None;
    }

    pub fn invalidate_tags(&mut self) {
        self.tags = None;
        self.invalidate_tag_memos();
    }

    pub fn invalidate_topics(&mut self) {
        self.topics = None;
    }

    pub fn invalidate_preferences(&mut self) {
        self.preferences = None;
    }

    pub fn invalidate_options(&mut self) {
        self.options = None;
    }

    pub fn invalidate_documents(&mut self) {
        self.documents = None;
    }

    pub fn invalidate_rights(&mut self) {
        self.rights.clear();
    }

    fn invalidate_tag_memos(&mut self) {
        for snap in self.rights.values_mut() {
            snap.viewable_tags = Default::default();
            snap.searchable_tags = Default::default();
        }
    }

    // ---- accessors --------------------------------------------------

    fn loaded<'a, T>(&self, slot: &'a Option<Vec<T>>, what: &str) -> &'a [T] {
        match slot {
            Some(v) => v,
            None => panic!("paper #{}: {} accessed before load", self.paper_id, what),
        }
    }

    pub fn conflicts(&self) -> &[PaperConflict] {
        self.loaded(&self.conflicts, "conflicts")
    }

    pub fn reviews(&self) -> &[ReviewInfo] {
        self.loaded(&self.reviews, "reviews")
    }

    pub fn comments(&self) -> &[CommentInfo] {
        self.loaded(&self.comments, "comments")
    }

    pub fn tags(&self) -> &[Tag] {
        self.loaded(&self.tags, "tags")
    }

    pub fn topics(&self) -> &[i64] {
        self.loaded(&self.topics, "topics")
    }

    pub fn preferences(&self) -> &[ReviewPreference] {
        self.loaded(&self.preferences, "preferences")
    }

    pub fn options(&self) -> &[PaperOptionValue] {
        self.loaded(&self.options, "options")
    }

    pub fn documents(&self) -> &[DocumentInfo] {
        self.loaded(&self.documents, "documents")
    }

    pub fn review_requests(&self) -> &[ReviewRequest] {
        self.loaded(&self.review_requests, "review requests")
    }

    pub fn review_refusals(&self) -> &[ReviewRefusal] {
        self.loaded(&self.review_refusals, "review refusals")
    }

    pub fn conflict_type(&self, contact_id: i64) -> ConflictType {
        self.conflicts()
            .iter()
            .find(|c| c.contact_id == contact_id)
            .map(|c| c.conflict_type)
            .unwrap_or(ConflictType::None)
    }

    pub fn has_author(&self, contact_id: i64) -> bool {
        self.conflict_type(contact_id).is_author()
    }

    pub fn author_by_email(&self, email: &str) -> Option<&Author> {
        self.authors
            .iter()
            .find(|a| a.email.eq_ignore_ascii_case(email))
    }

    pub fn tag_value(&self, tag: &str) -> Option<f64> {
        self.tags()
            .iter()
            .find(|t| t.tag.eq_ignore_ascii_case(tag))
            .map(|t| t.value)
    }

    pub fn option_value(&self, option_id: i64) -> Option<&PaperOptionValue> {
        self.options().iter().find(|o| o.option_id == option_id)
    }

    pub fn document(&self, doc_id: i64) -> Option<&DocumentInfo> {
        self.documents()
            .iter()
            .find(|d| d.paper_storage_id == doc_id)
    }

    pub fn preference(&self, contact_id: i64) -> Option<ReviewPreference> {
        self.preferences()
            .iter()
            .find(|p| p.contact_id == contact_id)
            .copied()
    }

    /// Sum of the viewer's per-topic interest over this paper's topics.
    pub fn topic_interest_score(&self, interests: &HashMap<i64, i32>) -> i64 {
        self.topics()
            .iter()
            .filter_map(|t| interests.get(t))
            .map(|&i| i as i64)
            .sum()
    }

    // ---- review selection & ordering --------------------------------

    pub fn review_by_id(&self, review_id: i64) -> Option<&ReviewInfo> {
        self.reviews().iter().find(|r| r.review_id == review_id)
    }

    pub fn reviews_of<'a>(&'a self, viewer: &'a Viewer) -> impl Iterator<Item = &'a ReviewInfo> {
        self.reviews()
            .iter()
            .filter(move |r| r.belongs_to(viewer.contact_id, &viewer.review_tokens))
    }

    /// The viewer's own review: the submitted one if any, otherwise the
    /// highest-authority row they hold.
    pub fn review_of<'a>(&'a self, viewer: &'a Viewer) -> Option<&'a ReviewInfo> {
        self.reviews_of(viewer)
            .max_by_key(|r| (r.is_submitted(), r.review_type, r.review_id))
    }

    pub fn review_type(&self, viewer: &Viewer) -> Option<ReviewType> {
        self.reviews_of(viewer).map(|r| r.review_type).max()
    }

    /// Delegated external reviews waiting for this viewer's approval.
    pub fn approvable_reviews<'a>(
        &'a self,
        viewer: &'a Viewer,
    ) -> impl Iterator<Item = &'a ReviewInfo> {
        self.reviews().iter().filter(move |r| {
            r.review_type == ReviewType::External
                && !r.is_submitted()
                && r.time_approval_requested != 0
                && r.requested_by == viewer.contact_id
        })
    }

    pub fn reviews_by_display(&self) -> Vec<&ReviewInfo> {
        timeline::reviews_by_display(self.reviews())
    }

    /// Reviews and comments interleaved in display order.
    pub fn timeline(&self) -> Vec<TimelineItem<'_>> {
        let reviews = self.reviews_by_display();
        let comments: Vec<&CommentInfo> = self.comments().iter().collect();
        timeline::merge_reviews_and_comments(&reviews, &comments)
    }

    pub fn review_signatures_of(&self, viewer: &Viewer) -> Vec<ReviewSignature> {
        self.reviews_of(viewer)
            .map(|r| ReviewSignature {
                review_type: r.review_type,
                submitted: r.review_submitted.is_some(),
                needs_submit: r.review_needs_submit,
            })
            .collect()
    }

    // ---- rights -----------------------------------------------------

    /// The viewer's cached rights snapshot, deriving one from the loaded
    /// conflict and review data when missing or stale. Conflicts and
    /// reviews must be ensured first; the batched path is
    /// [`PaperInfoSet::ensure_rights`].
    pub fn contact_info(
        &mut self,
        viewer: &Viewer,
        settings: &Settings,
        clock: &RightsClock,
    ) -> &PaperContactInfo {
        let epoch = clock.now();
        let fresh = viewer.contact_id != 0
            && self
                .rights
                .get(&viewer.contact_id)
                .map_or(false, |s| s.epoch == epoch);
        if !fresh {
            let conflict_type = self.conflict_type(viewer.contact_id);
            let sigs = self.review_signatures_of(viewer);
            let snap = PaperContactInfo::derive(
                viewer,
                conflict_type,
                &sigs,
                self.lead_contact_id,
                self.manager_contact_id,
                settings,
                epoch,
            );
            self.rights.insert(viewer.contact_id, snap);
        }
        &self.rights[&viewer.contact_id]
    }

    /// Snapshot already cached for this viewer, if fresh. Anonymous
    /// viewers never report one: two token holders sharing contact id 0
    /// must not see each other's snapshot.
    pub fn cached_contact_info(&self, viewer: &Viewer, clock: &RightsClock) -> Option<&PaperContactInfo> {
        if viewer.contact_id == 0 {
            return None;
        }
        self.rights
            .get(&viewer.contact_id)
            .filter(|s| s.epoch == clock.now())
    }

    /// Rights for "view as if unconflicted" administration; an owned
    /// clone so its cleared censor memos never leak into the normal path.
    pub fn forced_contact_info(
        &mut self,
        viewer: &Viewer,
        settings: &Settings,
        clock: &RightsClock,
    ) -> PaperContactInfo {
        self.contact_info(viewer, settings, clock).forced()
    }

    /// Install a snapshot computed by the batched rights join.
    pub fn apply_rights_row(
        &mut self,
        viewer: &Viewer,
        row: &RightsRow,
        settings: &Settings,
        clock: &RightsClock,
    ) {
        let conflict_type = row
            .conflict_type
            .map(ConflictType::from_raw)
            .unwrap_or(ConflictType::None);
        let sigs = row
            .review_signature
            .as_deref()
            .map(crate::review::parse_review_signature)
            .unwrap_or_default();
        let snap = PaperContactInfo::derive(
            viewer,
            conflict_type,
            &sigs,
            self.lead_contact_id,
            self.manager_contact_id,
            settings,
            clock.now(),
        );
        self.rights.insert(viewer.contact_id, snap);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::NEEDS_SUBMIT;

    fn review(id: i64, contact: i64, ty: ReviewType, submitted: Option<i64>) -> ReviewInfo {
        ReviewInfo {
            review_id: id,
            paper_id: 1,
            contact_id: contact,
            review_token: 0,
            review_type: ty,
            review_round: 0,
            review_ordinal: 0,
            review_blind: true,
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
    #[should_panic(expected = "accessed before load")]
    fn unloaded_access_is_a_contract_violation() {
        let p = PaperInfo::new(1);
        let _ = p.conflicts();
    }

    #[test]
    fn loaded_empty_is_not_unloaded() {
        let mut p = PaperInfo::new(1);
        p.load_conflicts(vec![]);
        assert!(p.conflicts_loaded());
        assert_eq!(p.conflict_type(99), ConflictType::None);
    }

    #[test]
    fn review_of_prefers_submitted_then_type() {
        let mut p = PaperInfo::new(1);
        p.load_review_signatures(vec![
            review(1, 7, ReviewType::Primary, None),
            review(2, 7, ReviewType::External, Some(100)),
        ]);
        let viewer = Viewer::pc(7);
        assert_eq!(p.review_of(&viewer).unwrap().review_id, 2);
        assert_eq!(p.review_type(&viewer), Some(ReviewType::Primary));
    }

    #[test]
    fn token_reviews_belong_to_the_holder() {
        let mut p = PaperInfo::new(1);
        let mut r = review(1, 0, ReviewType::External, None);
        r.review_token = 4242;
        p.load_review_signatures(vec![r]);
        let mut viewer = Viewer::default();
        viewer.contact_id = 33;
        viewer.review_tokens = vec![4242];
        assert_eq!(p.reviews_of(&viewer).count(), 1);
        viewer.review_tokens.clear();
        assert_eq!(p.reviews_of(&viewer).count(), 0);
    }

    #[test]
    fn token_holder_rights_reflect_the_token_review() {
        let clock = RightsClock::new();
        let settings = Settings::default();
        let mut p = PaperInfo::new(1);
        p.load_conflicts(vec![]);
        let mut r = review(1, 0, ReviewType::External, Some(100));
        r.review_token = 4242;
        p.load_review_signatures(vec![r]);

        let mut holder = Viewer::default();
        holder.contact_id = 33;
        holder.review_tokens = vec![4242];
        let snap = p.contact_info(&holder, &settings, &clock);
        assert_eq!(snap.review_type, Some(ReviewType::External));
        assert!(snap.has_submitted_review());
    }

    #[test]
    fn anonymous_token_holders_do_not_share_snapshots() {
        let clock = RightsClock::new();
        let settings = Settings::default();
        let mut p = PaperInfo::new(1);
        p.load_conflicts(vec![]);
        let mut r = review(1, 0, ReviewType::External, Some(100));
        r.review_token = 4242;
        p.load_review_signatures(vec![r]);

        let mut holder = Viewer::default();
        holder.review_tokens = vec![4242];
        assert!(p.contact_info(&holder, &settings, &clock).has_submitted_review());

        // a different bearer without the token rederives, never reuses
        let stranger = Viewer::default();
        assert!(p.cached_contact_info(&stranger, &clock).is_none());
        assert!(!p.contact_info(&stranger, &settings, &clock).has_submitted_review());
    }

    #[test]
    fn rights_cache_invalidated_by_clock_bump() {
        let clock = RightsClock::new();
        let settings = Settings::default();
        let mut p = PaperInfo::new(1);
        p.load_conflicts(vec![]);
        p.load_review_signatures(vec![]);
        let viewer = Viewer::pc(5);

        let snap = p.contact_info(&viewer, &settings, &clock);
        assert_eq!(snap.epoch, 0);
        assert!(p.cached_contact_info(&viewer, &clock).is_some());

        clock.bump();
        assert!(p.cached_contact_info(&viewer, &clock).is_none());
        let snap = p.contact_info(&viewer, &settings, &clock);
        assert_eq!(snap.epoch, 1);
    }

    #[test]
    fn conflict_reload_drops_rights() {
        let clock = RightsClock::new();
        let settings = Settings::default();
        let mut p = PaperInfo::new(1);
        p.load_conflicts(vec![]);
        p.load_review_signatures(vec![]);
        let viewer = Viewer::pc(5);
        let _ = p.contact_info(&viewer, &settings, &clock);

        p.load_conflicts(vec![PaperConflict {
            contact_id: 5,
            conflict_type: ConflictType::Marked,
        }]);
        assert!(p.cached_contact_info(&viewer, &clock).is_none());
        let snap = p.contact_info(&viewer, &settings, &clock);
        assert!(snap.is_conflicted());
    }

    #[test]
    fn signature_load_does_not_downgrade_full_load() {
        let mut p = PaperInfo::new(1);
        let mut full = review(1, 7, ReviewType::Pc, Some(100));
        full.text = Some("looks solid".into());
        full.full_loaded = true;
        p.load_full_reviews(vec![full]);
        p.load_review_signatures(vec![review(1, 7, ReviewType::Pc, Some(100))]);
        assert!(p.reviews_fully_loaded());
        assert_eq!(p.review_by_id(1).unwrap().text.as_deref(), Some("looks solid"));
    }

    #[test]
    fn refusal_contact_keeps_account_link_when_present() {
        let registered = ReviewRefusal {
            email: "ext@example.org".into(),
            contact_id: 44,
            refused_by: 7,
            reason: Some("overloaded".into()),
        };
        assert_eq!(registered.contact().contact_id(), Some(44));

        let unregistered = ReviewRefusal {
            contact_id: 0,
            ..registered
        };
        assert_eq!(unregistered.contact().contact_id(), None);
    }

    #[test]
    fn topic_interest_score_sums_matches() {
        let mut p = PaperInfo::new(1);
        p.load_topics(vec![2, 5, 9]);
        let interests = HashMap::from([(2, 4), (5, -2), (7, 10)]);
        assert_eq!(p.topic_interest_score(&interests), 2);
    }
}
