use std::collections::HashMap;

use sqlx::PgPool;

use crate::comment::CommentInfo;
use crate::config::Settings;
use crate::conflict::PaperConflict;
use crate::db;
use crate::docs::DocumentInfo;
use crate::error::Result;
use crate::paper::{PaperInfo, PaperOptionValue};
use crate::prefs::parse_preference_signature;
use crate::review::ReviewInfo;
use crate::rights::{RightsClock, Viewer, ROLE_CHAIR, ROLE_PC};
use crate::tags::Tag;

/// An ordered working set of papers sharing one batch-load context:
/// loading a relationship for the whole set is one `paper_id = ANY(...)`
/// query instead of one per paper.
///
/// The set owns its papers outright, so a paper can never belong to two
/// sets; inserting a second aggregate for the same paper id is a caller
/// bug and panics before any query is issued.
#[derive(Debug, Default)]
pub struct PaperInfoSet {
    papers: Vec<PaperInfo>,
    by_id: HashMap<i64, usize>,
}

impl PaperInfoSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the papers with the given ids. Missing ids are simply absent
    /// from the set.
    pub async fn load(pool: &PgPool, paper_ids: &[i64]) -> Result<Self> {
        let mut set = Self::new();
        for row in db::fetch_papers(pool, paper_ids).await? {
            set.add(PaperInfo::from_row(row));
        }
        Ok(set)
    }

    pub async fn load_one(pool: &PgPool, paper_id: i64) -> Result<Option<Self>> {
        match db::fetch_paper(pool, paper_id).await? {
            Some(row) => {
                let mut set = Self::new();
                set.add(PaperInfo::from_row(row));
                Ok(Some(set))
            }
            None => Ok(None),
        }
    }

    pub fn add(&mut self, paper: PaperInfo) {
        assert!(
            !self.by_id.contains_key(&paper.paper_id),
            "paper #{} already in working set",
            paper.paper_id
        );
        self.by_id.insert(paper.paper_id, self.papers.len());
        self.papers.push(paper);
    }

    /// Move every paper out of `other` into this set.
    pub fn take_all(&mut self, other: &mut PaperInfoSet) {
        for paper in other.papers.drain(..) {
            self.by_id.insert(paper.paper_id, self.papers.len());
            self.papers.push(paper);
        }
        other.by_id.clear();
    }

    pub fn len(&self) -> usize {
        self.papers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.papers.is_empty()
    }

    pub fn paper_ids(&self) -> Vec<i64> {
        self.papers.iter().map(|p| p.paper_id).collect()
    }

    pub fn contains(&self, paper_id: i64) -> bool {
        self.by_id.contains_key(&paper_id)
    }

    pub fn get(&self, paper_id: i64) -> Option<&PaperInfo> {
        self.by_id.get(&paper_id).map(|&i| &self.papers[i])
    }

    pub fn get_mut(&mut self, paper_id: i64) -> Option<&mut PaperInfo> {
        match self.by_id.get(&paper_id) {
            Some(&i) => Some(&mut self.papers[i]),
            None => None,
        }
    }

    /// Lookup that treats absence as a caller bug.
    pub fn checked(&self, paper_id: i64) -> &PaperInfo {
        self.get(paper_id)
            .unwrap_or_else(|| panic!("paper #{paper_id} not in working set"))
    }

    pub fn checked_mut(&mut self, paper_id: i64) -> &mut PaperInfo {
        match self.by_id.get(&paper_id) {
            Some(&i) => &mut self.papers[i],
            None => panic!("paper #{paper_id} not in working set"),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PaperInfo> {
        self.papers.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PaperInfo> {
        self.papers.iter_mut()
    }

    fn unloaded_ids(&self, loaded: impl Fn(&PaperInfo) -> bool) -> Vec<i64> {
        self.papers
            .iter()
            .filter(|p| !loaded(p))
            .map(|p| p.paper_id)
            .collect()
    }

    // ---- batched relationship loads ---------------------------------
    //
    // Each ensure issues at most one query covering every member whose
    // slot is still unloaded; members with no matching rows get the
    // loaded-empty marker so they are not queried again.

    pub async fn ensure_conflicts(&mut self, pool: &PgPool) -> Result<()> {
        let pids = self.unloaded_ids(PaperInfo::conflicts_loaded);
        if pids.is_empty() {
            return Ok(());
        }
        let mut by_pid: HashMap<i64, Vec<PaperConflict>> = HashMap::new();
        for row in db::fetch_conflicts(pool, &pids).await? {
            by_pid
                .entry(row.paper_id)
                .or_default()
                .push(row.into_conflict());
        }
        for pid in pids {
            let conflicts = by_pid.remove(&pid).unwrap_or_default();
            self.checked_mut(pid).load_conflicts(conflicts);
        }
        Ok(())
    }

    pub async fn ensure_reviews(&mut self, pool: &PgPool) -> Result<()> {
        let pids = self.unloaded_ids(PaperInfo::reviews_loaded);
        if pids.is_empty() {
            return Ok(());
        }
        let mut by_pid: HashMap<i64, Vec<ReviewInfo>> = HashMap::new();
        for row in db::fetch_review_signatures(pool, &pids).await? {
            if let Some(r) = row.into_review(false) {
                by_pid.entry(r.paper_id).or_default().push(r);
            }
        }
        for pid in pids {
            let reviews = by_pid.remove(&pid).unwrap_or_default();
            self.checked_mut(pid).load_review_signatures(reviews);
        }
        Ok(())
    }

    /// Upgrade to full review rows, skipping papers already fully loaded.
    pub async fn ensure_full_reviews(&mut self, pool: &PgPool) -> Result<()> {
        let pids = self.unloaded_ids(PaperInfo::reviews_fully_loaded);
        if pids.is_empty() {
            return Ok(());
        }
        let mut by_pid: HashMap<i64, Vec<ReviewInfo>> = HashMap::new();
        for row in db::fetch_full_reviews(pool, &pids).await? {
            if let Some(r) = row.into_review(true) {
                by_pid.entry(r.paper_id).or_default().push(r);
            }
        }
        for pid in pids {
            let reviews = by_pid.remove(&pid).unwrap_or_default();
            self.checked_mut(pid).load_full_reviews(reviews);
        }
        Ok(())
    }

    pub async fn ensure_comments(&mut self, pool: &PgPool) -> Result<()> {
        let pids = self.unloaded_ids(PaperInfo::comments_loaded);
        if pids.is_empty() {
            return Ok(());
        }
        let mut by_pid: HashMap<i64, Vec<CommentInfo>> = HashMap::new();
        for row in db::fetch_comments(pool, &pids).await? {
            let c = row.into_comment();
            by_pid.entry(c.paper_id).or_default().push(c);
        }
        for pid in pids {
            let comments = by_pid.remove(&pid).unwrap_or_default();
            self.checked_mut(pid).load_comments(comments);
        }
        Ok(())
    }

    pub async fn ensure_tags(&mut self, pool: &PgPool) -> Result<()> {
        let pids = self.unloaded_ids(PaperInfo::tags_loaded);
        if pids.is_empty() {
            return Ok(());
        }
        let mut by_pid: HashMap<i64, Vec<Tag>> = HashMap::new();
        for row in db::fetch_tags(pool, &pids).await? {
            let pid = row.paper_id;
            by_pid.entry(pid).or_default().push(row.into_tag());
        }
        for pid in pids {
            let tags = by_pid.remove(&pid).unwrap_or_default();
            self.checked_mut(pid).load_tags(tags);
        }
        Ok(())
    }

    pub async fn ensure_topics(&mut self, pool: &PgPool) -> Result<()> {
        let pids = self.unloaded_ids(PaperInfo::topics_loaded);
        if pids.is_empty() {
            return Ok(());
        }
        let mut by_pid: HashMap<i64, Vec<i64>> = HashMap::new();
        for row in db::fetch_topics(pool, &pids).await? {
            by_pid.entry(row.paper_id).or_default().push(row.topic_id);
        }
        for pid in pids {
            let topics = by_pid.remove(&pid).unwrap_or_default();
            self.checked_mut(pid).load_topics(topics);
        }
        Ok(())
    }

    /// Preferences load through the aggregated signature column, one row
    /// per paper, parsed into typed entries at the boundary.
    pub async fn ensure_preferences(&mut self, pool: &PgPool) -> Result<()> {
        let pids = self.unloaded_ids(PaperInfo::preferences_loaded);
        if pids.is_empty() {
            return Ok(());
        }
        let mut by_pid: HashMap<i64, Option<String>> = HashMap::new();
        for (pid, sig) in db::fetch_preference_signatures(pool, &pids).await? {
            by_pid.insert(pid, sig);
        }
        for pid in pids {
            let prefs = by_pid
                .remove(&pid)
                .flatten()
                .map(|sig| parse_preference_signature(&sig))
                .unwrap_or_default();
            self.checked_mut(pid).load_preferences(prefs);
        }
        Ok(())
    }

    pub async fn ensure_options(&mut self, pool: &PgPool) -> Result<()> {
        let pids = self.unloaded_ids(PaperInfo::options_loaded);
        if pids.is_empty() {
            return Ok(());
        }
        let mut by_pid: HashMap<i64, Vec<PaperOptionValue>> = HashMap::new();
        for row in db::fetch_options(pool, &pids).await? {
            by_pid.entry(row.paper_id).or_default().push(PaperOptionValue {
                option_id: row.option_id,
                value: row.value,
                data: row.data,
            });
        }
        for pid in pids {
            let options = by_pid.remove(&pid).unwrap_or_default();
            self.checked_mut(pid).load_options(options);
        }
        Ok(())
    }

    pub async fn ensure_documents(&mut self, pool: &PgPool) -> Result<()> {
        let pids = self.unloaded_ids(PaperInfo::documents_loaded);
        if pids.is_empty() {
            return Ok(());
        }
        let mut by_pid: HashMap<i64, Vec<DocumentInfo>> = HashMap::new();
        for row in db::fetch_documents(pool, &pids).await? {
            let pid = row.paper_id;
            by_pid.entry(pid).or_default().push(row.into_document());
        }
        for pid in pids {
            let docs = by_pid.remove(&pid).unwrap_or_default();
            self.checked_mut(pid).load_documents(docs);
        }
        Ok(())
    }

    pub async fn ensure_review_requests(&mut self, pool: &PgPool) -> Result<()> {
        let pids = self.unloaded_ids(PaperInfo::review_requests_loaded);
        if pids.is_empty() {
            return Ok(());
        }
        let mut by_pid: HashMap<i64, Vec<db::ReviewRequestRow>> = HashMap::new();
        for row in db::fetch_review_requests(pool, &pids).await? {
            by_pid.entry(row.paper_id).or_default().push(row);
        }
        for pid in pids {
            let rows = by_pid.remove(&pid).unwrap_or_default();
            self.checked_mut(pid).load_review_requests(rows);
        }
        Ok(())
    }

    pub async fn ensure_review_refusals(&mut self, pool: &PgPool) -> Result<()> {
        let pids = self.unloaded_ids(PaperInfo::review_refusals_loaded);
        if pids.is_empty() {
            return Ok(());
        }
        let mut by_pid: HashMap<i64, Vec<db::ReviewRefusalRow>> = HashMap::new();
        for row in db::fetch_review_refusals(pool, &pids).await? {
            by_pid.entry(row.paper_id).or_default().push(row);
        }
        for pid in pids {
            let rows = by_pid.remove(&pid).unwrap_or_default();
            self.checked_mut(pid).load_review_refusals(rows);
        }
        Ok(())
    }

    /// Derive snapshots for members whose conflict and review slots are
    /// already in memory; returns the ids that still need the batched
    /// join.
    fn derive_loaded_rights(
        &mut self,
        viewer: &Viewer,
        settings: &Settings,
        clock: &RightsClock,
    ) -> Vec<i64> {
        let mut pending = Vec::new();
        for p in &mut self.papers {
            if p.cached_contact_info(viewer, clock).is_some() {
                continue;
            }
            if p.conflicts_loaded() && p.reviews_loaded() {
                p.contact_info(viewer, settings, clock);
            } else {
                pending.push(p.paper_id);
            }
        }
        pending
    }

    /// Populate rights snapshots for one viewer across every member that
    /// lacks a fresh one. Members with conflicts and reviews already in
    /// memory derive without touching the database; the rest share a
    /// single batched join. Pairs the join returns no rows for come back
    /// with null conflict and signature and derive to the explicit empty
    /// snapshot.
    pub async fn ensure_rights(
        &mut self,
        pool: &PgPool,
        viewer: &Viewer,
        settings: &Settings,
        clock: &RightsClock,
    ) -> Result<()> {
        let pids = self.derive_loaded_rights(viewer, settings, clock);
        if pids.is_empty() {
            return Ok(());
        }
        let rows = db::fetch_rights(
            pool,
            db::RightsScope::PapersForViewer {
                paper_ids: &pids,
                contact_id: viewer.contact_id,
                review_tokens: &viewer.review_tokens,
            },
        )
        .await?;
        let by_pid: HashMap<i64, db::RightsRow> =
            rows.into_iter().map(|r| (r.paper_id, r)).collect();
        let empty = db::RightsRow {
            paper_id: 0,
            contact_id: viewer.contact_id,
            conflict_type: None,
            review_signature: None,
        };
        for pid in pids {
            let row = by_pid.get(&pid).unwrap_or(&empty);
            self.checked_mut(pid)
                .apply_rights_row(viewer, row, settings, clock);
        }
        Ok(())
    }

    /// Rights for every PC member on one paper with one join, for
    /// paper-centric screens like the assignment page. The per-viewer
    /// scope stays cheaper when one person browses many papers. Returns
    /// the viewers the snapshots were derived for.
    pub async fn ensure_rights_all_pc(
        &mut self,
        pool: &PgPool,
        paper_id: i64,
        settings: &Settings,
        clock: &RightsClock,
    ) -> Result<Vec<Viewer>> {
        let members = db::fetch_pc_members(pool).await?;
        let rows =
            db::fetch_rights(pool, db::RightsScope::ViewersForPaper { paper_id }).await?;
        let by_cid: HashMap<i64, db::RightsRow> =
            rows.into_iter().map(|r| (r.contact_id, r)).collect();
        let paper = self.checked_mut(paper_id);
        let mut viewers = Vec::with_capacity(members.len());
        for member in &members {
            let viewer = pc_viewer(member);
            let empty = db::RightsRow {
                paper_id,
                contact_id: viewer.contact_id,
                conflict_type: None,
                review_signature: None,
            };
            let row = by_cid.get(&viewer.contact_id).unwrap_or(&empty);
            paper.apply_rights_row(&viewer, row, settings, clock);
            viewers.push(viewer);
        }
        Ok(viewers)
    }
}

fn pc_viewer(row: &db::ContactRow) -> Viewer {
    Viewer {
        contact_id: row.contact_id,
        email: row.email.clone(),
        is_pc: row.roles & ROLE_PC != 0,
        is_chair: row.roles & ROLE_CHAIR != 0,
        review_tokens: Vec::new(),
    }
}
