//! JSON paper-status import and export.
//!
//! The pipeline is normalize -> validate -> diff -> persist. The first
//! three steps are pure: they see only the incoming document, the
//! catalogs, and a normalized snapshot of the stored paper, which keeps
//! them testable without a database. Persistence writes only what the
//! diff names, so re-importing an export is a no-op.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::conflict::ConflictType;
use crate::db;
use crate::docs::{DOCTYPE_FINAL, DOCTYPE_SUBMISSION};
use crate::error::{Error, MessageSet, Result};
use crate::paper::{PaperInfo, PaperInfoSet, SubmissionStatus};
use crate::rights::Viewer;
use crate::state::Conference;

mod diff;
mod normalize;

pub use diff::{diff, PaperDiff};
pub use normalize::{normalize, ImportContext, NormalizedPaper};

/// One author entry: either a formatted line ("First Last <email>
/// (affiliation)") or a structured object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuthorJson {
    Text(String),
    Entry {
        #[serde(skip_serializing_if = "Option::is_none")]
        email: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        first: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        last: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        affiliation: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        contact: Option<bool>,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactJson {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<String>,
}

/// A document slot: a reference to stored content (docid/hash) or inline
/// base64 content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentJson {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docid: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_base64: Option<String>,
}

/// The wire form of a paper. Every field is optional on input; an absent
/// field means "keep the stored value".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperJson {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "abstract", skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub withdrawn_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub withdraw_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<AuthorJson>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contacts: Option<Vec<ContactJson>>,
    /// Map of topic name to truthy value, or an array of names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topics: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<serde_json::Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pc_conflicts: Option<serde_json::Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission: Option<DocumentJson>,
    #[serde(rename = "final", skip_serializing_if = "Option::is_none")]
    pub final_doc: Option<DocumentJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonblind: Option<bool>,
}

/// Export a paper's status document. Requires the paper's conflicts,
/// topics, options, and documents to be loaded; `emails` maps conflict
/// contact ids to addresses.
pub fn export_paper(
    paper: &PaperInfo,
    ctx: &ImportContext<'_>,
    emails: &HashMap<i64, String>,
) -> PaperJson {
    let mut pj = PaperJson {
        pid: Some(paper.paper_id),
        title: Some(paper.title.clone()),
        abstract_text: Some(paper.abstract_text.clone()),
        nonblind: Some(!paper.blind),
        ..Default::default()
    };

    match paper.status {
        SubmissionStatus::Draft => pj.status = Some("inprogress".to_string()),
        SubmissionStatus::Submitted { at } => {
            pj.submitted_at = Some(at);
            pj.status = Some(match ctx.decisions.get(&paper.outcome) {
                Some(name) if paper.outcome != 0 => name.clone(),
                _ => "submitted".to_string(),
            });
        }
        SubmissionStatus::WithdrawnFromDraft { at } => {
            pj.status = Some("withdrawn".to_string());
            pj.withdrawn_at = Some(at);
            pj.withdraw_reason = paper.withdraw_reason.clone();
        }
        SubmissionStatus::WithdrawnFromSubmitted { submitted_at, at } => {
            pj.status = Some("withdrawn".to_string());
            pj.submitted_at = Some(submitted_at);
            pj.withdrawn_at = Some(at);
            pj.withdraw_reason = paper.withdraw_reason.clone();
        }
    }

    let mut contact_emails: Vec<String> = Vec::new();
    let mut pcc = serde_json::Map::new();
    for c in paper.conflicts() {
        let Some(email) = emails.get(&c.contact_id) else {
            continue;
        };
        match c.conflict_type {
            ConflictType::ContactAuthor => contact_emails.push(email.to_lowercase()),
            ConflictType::Marked | ConflictType::PinnedNonConflict => {
                pcc.insert(
                    email.to_lowercase(),
                    Value::String(c.conflict_type.json_name().to_string()),
                );
            }
            _ => {}
        }
    }

    pj.authors = Some(
        paper
            .authors
            .iter()
            .map(|a| AuthorJson::Entry {
                email: (!a.email.is_empty()).then(|| a.email.clone()),
                first: (!a.first.is_empty()).then(|| a.first.clone()),
                last: (!a.last.is_empty()).then(|| a.last.clone()),
                affiliation: (!a.affiliation.is_empty()).then(|| a.affiliation.clone()),
                contact: contact_emails
                    .iter()
                    .any(|e| e.eq_ignore_ascii_case(&a.email))
                    .then_some(true),
            })
            .collect(),
    );
    let standalone: Vec<ContactJson> = contact_emails
        .iter()
        .filter(|e| !paper.authors.iter().any(|a| a.email.eq_ignore_ascii_case(e)))
        .map(|e| ContactJson {
            email: e.clone(),
            ..Default::default()
        })
        .collect();
    pj.contacts = Some(standalone);
    pj.pc_conflicts = Some(pcc);

    let mut topics = serde_json::Map::new();
    for tid in paper.topics() {
        if let Some(name) = ctx.topics.get(tid) {
            topics.insert(name.clone(), Value::Bool(true));
        }
    }
    pj.topics = Some(Value::Object(topics));

    let mut options = serde_json::Map::new();
    for ov in paper.options() {
        let Some(key) = ctx.options.get(&ov.option_id) else {
            continue;
        };
        let value = match (&ov.data, ov.value) {
            (Some(data), 1) => Value::String(data.clone()),
            (Some(data), v) => serde_json::json!({ "value": v, "data": data }),
            (None, 1) => Value::Bool(true),
            (None, v) => Value::from(v),
        };
        options.insert(key.clone(), value);
    }
    pj.options = Some(options);

    pj.submission = document_json(paper, paper.submission_doc_id);
    pj.final_doc = document_json(paper, paper.final_doc_id);
    pj
}

fn document_json(paper: &PaperInfo, doc_id: i64) -> Option<DocumentJson> {
    if doc_id <= 0 {
        return None;
    }
    paper.document(doc_id).map(|d| DocumentJson {
        docid: Some(d.paper_storage_id),
        hash: Some(d.hash.clone()),
        filename: d.filename.clone(),
        mimetype: Some(d.mimetype.clone()),
        size: Some(d.size),
        content_base64: None,
    })
}

/// Outcome of one import run. `changed` is false both when validation
/// blocked the save and when the document matched the stored state.
#[derive(Debug)]
pub struct SaveOutcome {
    pub paper_id: i64,
    pub messages: MessageSet,
    pub changed: bool,
}

/// Import one paper-status document: normalize against the stored
/// revision, stop on error-severity messages, then write exactly the
/// fields that differ.
pub async fn save_paper(
    conf: &Conference,
    actor: &Viewer,
    pj: &PaperJson,
) -> Result<SaveOutcome> {
    let now = Utc::now().timestamp();
    let ctx = ImportContext {
        settings: &conf.settings,
        topics: &conf.topics,
        options: &conf.options,
        decisions: &conf.decisions,
        now,
        actor_is_admin: actor.is_chair,
    };

    let pid = pj.pid.unwrap_or(0);
    let old = if pid > 0 {
        let mut set = PaperInfoSet::load(&conf.pool, &[pid]).await?;
        if !set.contains(pid) {
            return Err(Error::NotFound(format!("paper #{pid}")));
        }
        set.ensure_conflicts(&conf.pool).await?;
        set.ensure_topics(&conf.pool).await?;
        set.ensure_options(&conf.pool).await?;
        set.ensure_documents(&conf.pool).await?;
        let paper = set.checked(pid);
        let contact_ids: Vec<i64> = paper.conflicts().iter().map(|c| c.contact_id).collect();
        let emails = db::fetch_contact_emails(&conf.pool, &contact_ids).await?;
        let snapshot = export_paper(paper, &ctx, &emails);
        Some(normalize(&ctx, &snapshot, None).0)
    } else {
        None
    };

    let (new, messages) = normalize(&ctx, pj, old.as_ref());
    if messages.has_error() {
        return Ok(SaveOutcome {
            paper_id: pid,
            messages,
            changed: false,
        });
    }

    let (paper_id, old) = match old {
        Some(o) => (pid, o),
        None => {
            let paper_id = db::create_paper(&conf.pool, actor.contact_id).await?;
            (paper_id, NormalizedPaper::default())
        }
    };

    let mut d = diff(&old, &new);

    // document side effects run before the transaction; a failed save
    // leaves only reusable content-addressed blobs behind
    for (upload, doctype, slot) in [
        (d.submission.take(), DOCTYPE_SUBMISSION, &mut d.update.submission_doc_id),
        (d.final_doc.take(), DOCTYPE_FINAL, &mut d.update.final_doc_id),
    ] {
        let Some(upload) = upload else { continue };
        if let Some(content) = &upload.content {
            let hash = upload.content_hash().unwrap_or_default();
            tokio::fs::create_dir_all(&conf.config.document_folder).await?;
            tokio::fs::write(conf.config.document_folder.join(&hash), content).await?;
            let id = db::insert_document(
                &conf.pool,
                paper_id,
                doctype,
                &hash,
                &upload.effective_mimetype(),
                upload.filename.as_deref(),
                content.len() as i64,
                now,
            )
            .await?;
            *slot = Some(id);
        } else if let Some(docid) = upload.docid {
            *slot = Some(docid);
        }
    }

    if d.is_empty() {
        return Ok(SaveOutcome {
            paper_id,
            messages,
            changed: false,
        });
    }

    let mut txn = conf.pool.begin().await?;
    db::update_paper(&mut txn, paper_id, &d.update).await?;
    if let Some(topics) = &d.topics {
        db::replace_topics(&mut txn, paper_id, topics).await?;
    }
    if let Some(options) = &d.options {
        db::replace_options(&mut txn, paper_id, options).await?;
    }
    let conflicts_changed = d.conflicts.is_some();
    if let Some(conflicts) = &d.conflicts {
        let mut rows: Vec<(i64, i32)> = Vec::with_capacity(conflicts.len());
        for (email, ct) in conflicts {
            let identity = new
                .contacts
                .iter()
                .chain(new.authors.iter())
                .find(|a| a.email.eq_ignore_ascii_case(email));
            let (first, last, affiliation) = identity
                .map(|a| (a.first.as_str(), a.last.as_str(), a.affiliation.as_str()))
                .unwrap_or(("", "", ""));
            let cid = db::ensure_contact(&mut txn, email, first, last, affiliation).await?;
            rows.push((cid, ct.as_raw()));
        }
        db::replace_conflicts(&mut txn, paper_id, &rows).await?;
    }
    txn.commit().await?;

    if conflicts_changed {
        conf.clock.bump();
    }
    info!(paper_id, conflicts_changed, "paper status saved");

    Ok(SaveOutcome {
        paper_id,
        messages,
        changed: true,
    })
}
