mod models;

pub use models::*;

use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{BlindMode, Settings};
use crate::error::Result;

pub type DbPool = Arc<PgPool>;

pub async fn create_pool(database_url: &str) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(Arc::new(pool))
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| crate::error::Error::Internal(format!("migration failed: {e}")))?;
    Ok(())
}

pub async fn load_settings(pool: &PgPool) -> Result<Settings> {
    let rows: Vec<(String, i64)> = sqlx::query_as("SELECT name, value FROM settings")
        .fetch_all(pool)
        .await?;
    let map: HashMap<String, i64> = rows.into_iter().collect();

    let mut settings = Settings::default();
    if let Some(v) = map.get("sub_blind") {
        settings.blind_mode = BlindMode::from_setting(*v);
    }
    if let Some(v) = map.get("lead_noseerev") {
        // stored inverted: 1 means the lead must hold a review
        settings.lead_sees_reviews_without_review = *v == 0;
    }
    if let Some(v) = map.get("sub_noabstract") {
        settings.abstract_required = *v == 0;
    }
    if let Some(v) = map.get("sub_max_authors") {
        settings.max_authors = (*v).max(0) as usize;
    }
    if let Some(v) = map.get("resp_rounds") {
        settings.response_rounds = (*v).max(0) as u32;
    }
    Ok(settings)
}

/// topic id -> name
pub async fn load_topic_catalog(pool: &PgPool) -> Result<HashMap<i64, String>> {
    let rows: Vec<(i64, String)> =
        sqlx::query_as("SELECT topic_id, topic_name FROM topic_area ORDER BY topic_id")
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().collect())
}

/// option id -> key
pub async fn load_option_catalog(pool: &PgPool) -> Result<HashMap<i64, String>> {
    let rows: Vec<(i64, String)> =
        sqlx::query_as("SELECT option_id, option_key FROM submission_option ORDER BY option_id")
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().collect())
}

/// outcome code -> decision name
pub async fn load_decision_catalog(pool: &PgPool) -> Result<HashMap<i32, String>> {
    let rows: Vec<(i32, String)> =
        sqlx::query_as("SELECT outcome, decision_name FROM decision")
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().collect())
}

pub async fn fetch_paper(pool: &PgPool, paper_id: i64) -> Result<Option<PaperRow>> {
    let row = sqlx::query_as::<_, PaperRow>("SELECT * FROM paper WHERE paper_id = $1")
        .bind(paper_id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn fetch_papers(pool: &PgPool, paper_ids: &[i64]) -> Result<Vec<PaperRow>> {
    let rows = sqlx::query_as::<_, PaperRow>(
        "SELECT * FROM paper WHERE paper_id = ANY($1) ORDER BY paper_id",
    )
    .bind(paper_ids)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn fetch_conflicts(pool: &PgPool, paper_ids: &[i64]) -> Result<Vec<ConflictRow>> {
    let rows = sqlx::query_as::<_, ConflictRow>(
        "SELECT paper_id, contact_id, conflict_type
         FROM paper_conflict WHERE paper_id = ANY($1)",
    )
    .bind(paper_ids)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

const REVIEW_SIGNATURE_COLUMNS: &str = "review_id, paper_id, contact_id, review_token, \
     review_type, review_round, review_ordinal, review_blind, requested_by, time_requested, \
     time_approval_requested, review_submitted, review_needs_submit, time_displayed";

/// Signature-fidelity review load: every column except the text.
pub async fn fetch_review_signatures(pool: &PgPool, paper_ids: &[i64]) -> Result<Vec<ReviewRow>> {
    let sql = format!(
        "SELECT {REVIEW_SIGNATURE_COLUMNS} FROM paper_review
         WHERE paper_id = ANY($1) ORDER BY paper_id, review_id"
    );
    let rows = sqlx::query_as::<_, ReviewRow>(&sql)
        .bind(paper_ids)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn fetch_full_reviews(pool: &PgPool, paper_ids: &[i64]) -> Result<Vec<ReviewRow>> {
    let sql = format!(
        "SELECT {REVIEW_SIGNATURE_COLUMNS}, review_text FROM paper_review
         WHERE paper_id = ANY($1) ORDER BY paper_id, review_id"
    );
    let rows = sqlx::query_as::<_, ReviewRow>(&sql)
        .bind(paper_ids)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn fetch_comments(pool: &PgPool, paper_ids: &[i64]) -> Result<Vec<CommentRow>> {
    let rows = sqlx::query_as::<_, CommentRow>(
        "SELECT * FROM paper_comment WHERE paper_id = ANY($1)
         ORDER BY paper_id, time_displayed, comment_id",
    )
    .bind(paper_ids)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn fetch_tags(pool: &PgPool, paper_ids: &[i64]) -> Result<Vec<TagRow>> {
    let rows = sqlx::query_as::<_, TagRow>(
        "SELECT paper_id, tag, tag_value FROM paper_tag
         WHERE paper_id = ANY($1) ORDER BY paper_id, tag",
    )
    .bind(paper_ids)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn fetch_topics(pool: &PgPool, paper_ids: &[i64]) -> Result<Vec<TopicRow>> {
    let rows = sqlx::query_as::<_, TopicRow>(
        "SELECT paper_id, topic_id FROM paper_topic
         WHERE paper_id = ANY($1) ORDER BY paper_id, topic_id",
    )
    .bind(paper_ids)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn fetch_options(pool: &PgPool, paper_ids: &[i64]) -> Result<Vec<OptionRow>> {
    let rows = sqlx::query_as::<_, OptionRow>(
        "SELECT paper_id, option_id, value, data FROM paper_option
         WHERE paper_id = ANY($1) ORDER BY paper_id, option_id",
    )
    .bind(paper_ids)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Batched preference summary: one comma-joined `contact pref expertise`
/// signature per paper, expertise `.` when unset. Papers without rows do
/// not appear.
pub async fn fetch_preference_signatures(
    pool: &PgPool,
    paper_ids: &[i64],
) -> Result<Vec<(i64, Option<String>)>> {
    let rows: Vec<(i64, Option<String>)> = sqlx::query_as(
        "SELECT paper_id,
                string_agg(contact_id::text || ' ' || preference::text || ' ' ||
                           COALESCE(expertise::text, '.'), ',')
         FROM paper_review_preference
         WHERE paper_id = ANY($1) GROUP BY paper_id",
    )
    .bind(paper_ids)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn fetch_documents(pool: &PgPool, paper_ids: &[i64]) -> Result<Vec<DocumentRow>> {
    let rows = sqlx::query_as::<_, DocumentRow>(
        "SELECT * FROM paper_storage WHERE paper_id = ANY($1)
         ORDER BY paper_id, paper_storage_id",
    )
    .bind(paper_ids)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn fetch_review_requests(pool: &PgPool, paper_ids: &[i64]) -> Result<Vec<ReviewRequestRow>> {
    let rows = sqlx::query_as::<_, ReviewRequestRow>(
        "SELECT * FROM review_request WHERE paper_id = ANY($1) ORDER BY paper_id, email",
    )
    .bind(paper_ids)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn fetch_review_refusals(pool: &PgPool, paper_ids: &[i64]) -> Result<Vec<ReviewRefusalRow>> {
    let rows = sqlx::query_as::<_, ReviewRefusalRow>(
        "SELECT * FROM paper_review_refused WHERE paper_id = ANY($1) ORDER BY paper_id, email",
    )
    .bind(paper_ids)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn fetch_pc_members(pool: &PgPool) -> Result<Vec<ContactRow>> {
    let rows = sqlx::query_as::<_, ContactRow>(
        "SELECT * FROM contact_info WHERE (roles & 1) <> 0 AND NOT disabled ORDER BY contact_id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// How to scope the batched rights join: either one viewer across a set
/// of papers, or every PC member on one paper, whichever side is smaller.
pub enum RightsScope<'a> {
    PapersForViewer {
        paper_ids: &'a [i64],
        contact_id: i64,
        /// Bearer tokens the viewer presented; reviews carrying one of
        /// these count as the viewer's own even when their contact_id is 0.
        review_tokens: &'a [i64],
    },
    ViewersForPaper {
        paper_id: i64,
    },
}

/// One three-way join producing conflict type plus a comma-joined review
/// signature per (paper, viewer) pair in scope. Pairs without rows simply
/// do not appear; the caller marks those explicitly empty.
///
/// Review tokens apply only to the per-viewer scope: they are presented by
/// the bearer at request time and are not stored per PC member, so the
/// per-paper scope matches reviews by contact id alone.
pub async fn fetch_rights(pool: &PgPool, scope: RightsScope<'_>) -> Result<Vec<RightsRow>> {
    let rows = match scope {
        RightsScope::PapersForViewer {
            paper_ids,
            contact_id,
            review_tokens,
        } => {
            sqlx::query_as::<_, RightsRow>(
                "SELECT p.paper_id, $2::bigint AS contact_id, c.conflict_type,
                        (SELECT string_agg(r.review_type::text || ' ' ||
                                           COALESCE(r.review_submitted, 0)::text || ' ' ||
                                           r.review_needs_submit::text, ',')
                         FROM paper_review r
                         WHERE r.paper_id = p.paper_id
                           AND ((r.contact_id <> 0 AND r.contact_id = $2)
                                OR (r.review_token <> 0 AND r.review_token = ANY($3))))
                            AS review_signature
                 FROM paper p
                 LEFT JOIN paper_conflict c ON c.paper_id = p.paper_id AND c.contact_id = $2
                 WHERE p.paper_id = ANY($1)",
            )
            .bind(paper_ids)
            .bind(contact_id)
            .bind(review_tokens)
            .fetch_all(pool)
            .await?
        }
        RightsScope::ViewersForPaper { paper_id } => {
            sqlx::query_as::<_, RightsRow>(
                "SELECT $1::bigint AS paper_id, u.contact_id, c.conflict_type,
                        (SELECT string_agg(r.review_type::text || ' ' ||
                                           COALESCE(r.review_submitted, 0)::text || ' ' ||
                                           r.review_needs_submit::text, ',')
                         FROM paper_review r
                         WHERE r.paper_id = $1 AND r.contact_id = u.contact_id)
                            AS review_signature
                 FROM contact_info u
                 LEFT JOIN paper_conflict c ON c.paper_id = $1 AND c.contact_id = u.contact_id
                 WHERE (u.roles & 1) <> 0 AND NOT u.disabled",
            )
            .bind(paper_id)
            .fetch_all(pool)
            .await?
        }
    };
    Ok(rows)
}

/// Create an empty paper shell with its creator marked contact author.
/// The conflict insert upserts so a concurrent re-run cannot duplicate or
/// downgrade the row.
pub async fn create_paper(pool: &PgPool, creator_contact_id: i64) -> Result<i64> {
    let mut txn = pool.begin().await?;
    let (paper_id,): (i64,) =
        sqlx::query_as("INSERT INTO paper DEFAULT VALUES RETURNING paper_id")
            .fetch_one(&mut *txn)
            .await?;
    sqlx::query(
        "INSERT INTO paper_conflict (paper_id, contact_id, conflict_type)
         VALUES ($1, $2, $3)
         ON CONFLICT (paper_id, contact_id)
         DO UPDATE SET conflict_type = GREATEST(paper_conflict.conflict_type, EXCLUDED.conflict_type)",
    )
    .bind(paper_id)
    .bind(creator_contact_id)
    .bind(crate::conflict::ConflictType::ContactAuthor.as_raw())
    .execute(&mut *txn)
    .await?;
    txn.commit().await?;
    Ok(paper_id)
}

pub async fn delete_paper(pool: &PgPool, paper_id: i64) -> Result<bool> {
    let res = sqlx::query("DELETE FROM paper WHERE paper_id = $1")
        .bind(paper_id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

/// Column updates for one paper, applied only for fields the diff found
/// changed.
#[derive(Debug, Default, Clone)]
pub struct PaperUpdate {
    pub title: Option<String>,
    pub abstract_text: Option<String>,
    pub author_information: Option<String>,
    pub collaborators: Option<String>,
    pub time_submitted: Option<i64>,
    pub time_withdrawn: Option<i64>,
    pub withdraw_reason: Option<Option<String>>,
    pub outcome: Option<i32>,
    pub blind: Option<bool>,
    pub submission_doc_id: Option<i64>,
    pub final_doc_id: Option<i64>,
}

impl PaperUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.abstract_text.is_none()
            && self.author_information.is_none()
            && self.collaborators.is_none()
            && self.time_submitted.is_none()
            && self.time_withdrawn.is_none()
            && self.withdraw_reason.is_none()
            && self.outcome.is_none()
            && self.blind.is_none()
            && self.submission_doc_id.is_none()
            && self.final_doc_id.is_none()
    }
}

pub async fn update_paper(
    txn: &mut Transaction<'_, Postgres>,
    paper_id: i64,
    update: &PaperUpdate,
) -> Result<()> {
    if update.is_empty() {
        return Ok(());
    }
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE paper SET ");
    let mut sep = qb.separated(", ");
    if let Some(v) = &update.title {
        sep.push("title = ").push_bind_unseparated(v.clone());
    }
    if let Some(v) = &update.abstract_text {
        sep.push("abstract = ").push_bind_unseparated(v.clone());
    }
    if let Some(v) = &update.author_information {
        sep.push("author_information = ")
            .push_bind_unseparated(v.clone());
    }
    if let Some(v) = &update.collaborators {
        sep.push("collaborators = ").push_bind_unseparated(v.clone());
    }
    if let Some(v) = update.time_submitted {
        sep.push("time_submitted = ").push_bind_unseparated(v);
    }
    if let Some(v) = update.time_withdrawn {
        sep.push("time_withdrawn = ").push_bind_unseparated(v);
    }
    if let Some(v) = &update.withdraw_reason {
        sep.push("withdraw_reason = ").push_bind_unseparated(v.clone());
    }
    if let Some(v) = update.outcome {
        sep.push("outcome = ").push_bind_unseparated(v);
    }
    if let Some(v) = update.blind {
        sep.push("blind = ").push_bind_unseparated(v);
    }
    if let Some(v) = update.submission_doc_id {
        sep.push("submission_doc_id = ").push_bind_unseparated(v);
    }
    if let Some(v) = update.final_doc_id {
        sep.push("final_doc_id = ").push_bind_unseparated(v);
    }
    qb.push(" WHERE paper_id = ").push_bind(paper_id);
    qb.build().execute(&mut **txn).await?;
    Ok(())
}

pub async fn replace_topics(
    txn: &mut Transaction<'_, Postgres>,
    paper_id: i64,
    topic_ids: &[i64],
) -> Result<()> {
    sqlx::query("DELETE FROM paper_topic WHERE paper_id = $1")
        .bind(paper_id)
        .execute(&mut **txn)
        .await?;
    if !topic_ids.is_empty() {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO paper_topic (paper_id, topic_id) ");
        qb.push_values(topic_ids, |mut b, tid| {
            b.push_bind(paper_id).push_bind(*tid);
        });
        qb.build().execute(&mut **txn).await?;
    }
    Ok(())
}

pub async fn replace_options(
    txn: &mut Transaction<'_, Postgres>,
    paper_id: i64,
    options: &[(i64, i64, Option<String>)],
) -> Result<()> {
    sqlx::query("DELETE FROM paper_option WHERE paper_id = $1")
        .bind(paper_id)
        .execute(&mut **txn)
        .await?;
    if !options.is_empty() {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO paper_option (paper_id, option_id, value, data) ");
        qb.push_values(options, |mut b, (oid, value, data)| {
            b.push_bind(paper_id)
                .push_bind(*oid)
                .push_bind(*value)
                .push_bind(data.clone());
        });
        qb.build().execute(&mut **txn).await?;
    }
    Ok(())
}

pub async fn replace_conflicts(
    txn: &mut Transaction<'_, Postgres>,
    paper_id: i64,
    conflicts: &[(i64, i32)],
) -> Result<()> {
    sqlx::query("DELETE FROM paper_conflict WHERE paper_id = $1")
        .bind(paper_id)
        .execute(&mut **txn)
        .await?;
    if !conflicts.is_empty() {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO paper_conflict (paper_id, contact_id, conflict_type) ");
        qb.push_values(conflicts, |mut b, (cid, ct)| {
            b.push_bind(paper_id).push_bind(*cid).push_bind(*ct);
        });
        qb.build().execute(&mut **txn).await?;
    }
    Ok(())
}

/// Store a content blob, reusing an existing row with the same hash for
/// this paper. Orphans from failed saves are harmless: content addressing
/// lets a later save pick them up.
pub async fn insert_document(
    pool: &PgPool,
    paper_id: i64,
    document_type: i64,
    hash: &str,
    mimetype: &str,
    filename: Option<&str>,
    size: i64,
    timestamp: i64,
) -> Result<i64> {
    let existing: Option<(i64,)> = sqlx::query_as(
        "SELECT paper_storage_id FROM paper_storage
         WHERE paper_id = $1 AND document_type = $2 AND sha256 = $3
         ORDER BY paper_storage_id DESC LIMIT 1",
    )
    .bind(paper_id)
    .bind(document_type)
    .bind(hash)
    .fetch_optional(pool)
    .await?;
    if let Some((id,)) = existing {
        return Ok(id);
    }

    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO paper_storage
            (paper_id, document_type, sha256, mimetype, filename, size, timestamp)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING paper_storage_id",
    )
    .bind(paper_id)
    .bind(document_type)
    .bind(hash)
    .bind(mimetype)
    .bind(filename)
    .bind(size)
    .bind(timestamp)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

/// Find or create the account row for an email, e.g. when an author is
/// promoted to a contact. The upsert keeps a concurrent save from
/// creating duplicates.
pub async fn ensure_contact(
    txn: &mut Transaction<'_, Postgres>,
    email: &str,
    first_name: &str,
    last_name: &str,
    affiliation: &str,
) -> Result<i64> {
    let (contact_id,): (i64,) = sqlx::query_as(
        "INSERT INTO contact_info (email, first_name, last_name, affiliation)
         VALUES (lower($1), $2, $3, $4)
         ON CONFLICT (email) DO UPDATE SET email = contact_info.email
         RETURNING contact_id",
    )
    .bind(email)
    .bind(first_name)
    .bind(last_name)
    .bind(affiliation)
    .fetch_one(&mut **txn)
    .await?;
    Ok(contact_id)
}

/// Emails for a set of contact ids, used when exporting conflicts.
pub async fn fetch_contact_emails(
    pool: &PgPool,
    contact_ids: &[i64],
) -> Result<HashMap<i64, String>> {
    let rows: Vec<(i64, String)> = sqlx::query_as(
        "SELECT contact_id, email FROM contact_info WHERE contact_id = ANY($1)",
    )
    .bind(contact_ids)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().collect())
}
