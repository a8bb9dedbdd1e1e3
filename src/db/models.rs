use sqlx::FromRow;

use crate::comment::CommentInfo;
use crate::conflict::{ConflictType, PaperConflict};
use crate::docs::DocumentInfo;
use crate::review::{ReviewInfo, ReviewType};
use crate::tags::Tag;

/// Raw paper row. Column decodings (legacy status encoding, author block
/// parsing) happen when this is turned into a `PaperInfo`; no dynamic
/// field bags leave this module.
#[derive(Debug, FromRow)]
pub struct PaperRow {
    pub paper_id: i64,
    pub title: String,
    #[sqlx(rename = "abstract")]
    pub abstract_text: String,
    pub author_information: String,
    pub collaborators: String,
    pub time_submitted: i64,
    pub time_withdrawn: i64,
    pub withdraw_reason: Option<String>,
    pub outcome: i32,
    pub lead_contact_id: i64,
    pub manager_contact_id: i64,
    pub submission_doc_id: i64,
    pub final_doc_id: i64,
    pub blind: bool,
}

#[derive(Debug, FromRow)]
pub struct ConflictRow {
    pub paper_id: i64,
    pub contact_id: i64,
    pub conflict_type: i32,
}

impl ConflictRow {
    pub fn into_conflict(self) -> PaperConflict {
        PaperConflict {
            contact_id: self.contact_id,
            conflict_type: ConflictType::from_raw(self.conflict_type),
        }
    }
}

/// Review row at either fidelity; `review_text` is only selected by the
/// full load.
#[derive(Debug, FromRow)]
pub struct ReviewRow {
    pub review_id: i64,
    pub paper_id: i64,
    pub contact_id: i64,
    pub review_token: i64,
    pub review_type: i32,
    pub review_round: i32,
    pub review_ordinal: i32,
    pub review_blind: bool,
    pub requested_by: i64,
    pub time_requested: i64,
    pub time_approval_requested: i64,
    pub review_submitted: Option<i64>,
    pub review_needs_submit: i32,
    pub time_displayed: i64,
    #[sqlx(default)]
    pub review_text: Option<String>,
}

impl ReviewRow {
    pub fn into_review(self, full_loaded: bool) -> Option<ReviewInfo> {
        Some(ReviewInfo {
            review_id: self.review_id,
            paper_id: self.paper_id,
            contact_id: self.contact_id,
            review_token: self.review_token,
            review_type: ReviewType::from_raw(self.review_type)?,
            review_round: self.review_round,
            review_ordinal: self.review_ordinal,
            review_blind: self.review_blind,
            requested_by: self.requested_by,
            time_requested: self.time_requested,
            time_approval_requested: self.time_approval_requested,
            review_submitted: self.review_submitted,
            review_needs_submit: self.review_needs_submit,
            time_displayed: self.time_displayed,
            text: self.review_text,
            full_loaded,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct CommentRow {
    pub comment_id: i64,
    pub paper_id: i64,
    pub contact_id: i64,
    pub comment_type: i32,
    pub comment_round: i32,
    pub time_modified: i64,
    pub time_displayed: i64,
    pub comment_text: Option<String>,
}

impl CommentRow {
    pub fn into_comment(self) -> CommentInfo {
        CommentInfo {
            comment_id: self.comment_id,
            paper_id: self.paper_id,
            contact_id: self.contact_id,
            comment_type: self.comment_type,
            comment_round: self.comment_round,
            time_modified: self.time_modified,
            time_displayed: self.time_displayed,
            text: self.comment_text,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct TagRow {
    pub paper_id: i64,
    pub tag: String,
    pub tag_value: f64,
}

impl TagRow {
    pub fn into_tag(self) -> Tag {
        Tag {
            tag: self.tag,
            value: self.tag_value,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct TopicRow {
    pub paper_id: i64,
    pub topic_id: i64,
}

#[derive(Debug, FromRow)]
pub struct OptionRow {
    pub paper_id: i64,
    pub option_id: i64,
    pub value: i64,
    pub data: Option<String>,
}

#[derive(Debug, FromRow)]
pub struct DocumentRow {
    pub paper_storage_id: i64,
    pub paper_id: i64,
    pub document_type: i64,
    pub sha256: String,
    pub mimetype: String,
    pub filename: Option<String>,
    pub size: i64,
    pub timestamp: i64,
}

impl DocumentRow {
    pub fn into_document(self) -> DocumentInfo {
        DocumentInfo {
            paper_storage_id: self.paper_storage_id,
            paper_id: self.paper_id,
            document_type: self.document_type,
            hash: self.sha256,
            mimetype: self.mimetype,
            filename: self.filename,
            size: self.size,
            timestamp: self.timestamp,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct ReviewRequestRow {
    pub paper_id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub affiliation: String,
    pub requested_by: i64,
    pub time_requested: i64,
}

#[derive(Debug, FromRow)]
pub struct ReviewRefusalRow {
    pub paper_id: i64,
    pub email: String,
    pub contact_id: i64,
    pub refused_by: i64,
    pub reason: Option<String>,
}

#[derive(Debug, FromRow)]
pub struct ContactRow {
    pub contact_id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub affiliation: String,
    pub collaborators: String,
    pub roles: i32,
    pub disabled: bool,
}

/// One row of the batched rights join: the viewer's conflict plus a
/// comma-joined review signature, one triple per review row they hold.
#[derive(Debug, FromRow)]
pub struct RightsRow {
    pub paper_id: i64,
    pub contact_id: i64,
    pub conflict_type: Option<i32>,
    pub review_signature: Option<String>,
}
