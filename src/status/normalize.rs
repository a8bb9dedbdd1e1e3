use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::config::Settings;
use crate::conflict::ConflictType;
use crate::contact::{is_valid_email, Author};
use crate::docs::DocumentUpload;
use crate::error::MessageSet;
use crate::paper::SubmissionStatus;

use super::{AuthorJson, DocumentJson, PaperJson};

/// Catalog and policy context for one import run. `now` is injected so
/// normalization is deterministic under test.
pub struct ImportContext<'a> {
    pub settings: &'a Settings,
    /// topic id -> name
    pub topics: &'a HashMap<i64, String>,
    /// option id -> key
    pub options: &'a HashMap<i64, String>,
    /// outcome code -> decision name
    pub decisions: &'a HashMap<i32, String>,
    pub now: i64,
    /// Administrative override: may clear chair-marked conflicts.
    pub actor_is_admin: bool,
}

impl<'a> ImportContext<'a> {
    fn topic_by_name(&self, name: &str) -> Option<i64> {
        self.topics
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name))
            .map(|(&id, _)| id)
    }

    fn option_by_key(&self, key: &str) -> Option<i64> {
        self.options
            .iter()
            .find(|(_, k)| k.eq_ignore_ascii_case(key))
            .map(|(&id, _)| id)
    }

    fn decision_by_name(&self, name: &str) -> Option<i32> {
        self.decisions
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name))
            .map(|(&code, _)| code)
    }
}

/// Fully normalized, diffable paper state. Two equal values mean a save
/// would write nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedPaper {
    /// 0 = create new.
    pub pid: i64,
    pub title: String,
    pub abstract_text: String,
    pub status: SubmissionStatus,
    pub withdraw_reason: Option<String>,
    pub outcome: i32,
    pub blind: bool,
    /// Ordered; order is author-visible.
    pub authors: Vec<Author>,
    /// Contacts (author-flagged or standalone), sorted by email.
    pub contacts: Vec<Author>,
    /// Sorted topic ids.
    pub topics: Vec<i64>,
    /// Sorted (option id, value, data).
    pub options: Vec<(i64, i64, Option<String>)>,
    /// Sorted (lowercased email, severity).
    pub conflicts: Vec<(String, ConflictType)>,
    pub submission: Option<DocumentUpload>,
    pub final_doc: Option<DocumentUpload>,
}

/// The normalize step of the import pipeline: resolve the loose JSON
/// against the catalogs and the previous revision, accumulating
/// field-addressable messages. An error-severity message blocks the
/// later persist step; warnings do not.
pub fn normalize(
    ctx: &ImportContext<'_>,
    pj: &PaperJson,
    old: Option<&NormalizedPaper>,
) -> (NormalizedPaper, MessageSet) {
    let mut ms = MessageSet::new();
    let mut np = NormalizedPaper {
        blind: old.map_or(true, |o| o.blind),
        ..Default::default()
    };

    np.pid = pj.pid.unwrap_or_else(|| old.map_or(0, |o| o.pid));
    if let (Some(pid), Some(o)) = (pj.pid, old) {
        if pid != 0 && o.pid != 0 && pid != o.pid {
            ms.error(
                "pid",
                format!("document names paper #{pid} but paper #{} is being updated", o.pid),
            );
        }
    }

    np.title = match &pj.title {
        Some(t) => t.trim().to_string(),
        None => old.map_or(String::new(), |o| o.title.clone()),
    };
    np.abstract_text = match &pj.abstract_text {
        Some(a) => a.trim().to_string(),
        None => old.map_or(String::new(), |o| o.abstract_text.clone()),
    };
    if let Some(nonblind) = pj.nonblind {
        np.blind = !nonblind;
    }

    normalize_authors(ctx, pj, old, &mut np, &mut ms);
    normalize_status(ctx, pj, old, &mut np, &mut ms);
    normalize_topics(ctx, pj, old, &mut np, &mut ms);
    normalize_options(ctx, pj, old, &mut np, &mut ms);
    normalize_conflicts(ctx, pj, old, &mut np, &mut ms);

    np.submission = normalize_document(pj.submission.as_ref(), old.and_then(|o| o.submission.as_ref()), "submission", &mut ms);
    np.final_doc = normalize_document(pj.final_doc.as_ref(), old.and_then(|o| o.final_doc.as_ref()), "final", &mut ms);

    validate(ctx, &np, old, &mut ms);
    (np, ms)
}

fn normalize_authors(
    _ctx: &ImportContext<'_>,
    pj: &PaperJson,
    old: Option<&NormalizedPaper>,
    np: &mut NormalizedPaper,
    ms: &mut MessageSet,
) {
    match &pj.authors {
        None => np.authors = old.map_or(Vec::new(), |o| o.authors.clone()),
        Some(entries) => {
            for (i, entry) in entries.iter().enumerate() {
                let mut author = match entry {
                    AuthorJson::Text(line) => Author::from_line(line),
                    AuthorJson::Entry {
                        email,
                        first,
                        last,
                        affiliation,
                        contact,
                    } => Author {
                        first: first.as_deref().unwrap_or("").trim().to_string(),
                        last: last.as_deref().unwrap_or("").trim().to_string(),
                        email: email.as_deref().unwrap_or("").trim().to_string(),
                        affiliation: affiliation.as_deref().unwrap_or("").trim().to_string(),
                        contact: contact.unwrap_or(false),
                    },
                };
                if author.is_empty() {
                    // bad author: excluded, but never silently
                    ms.warning("authors", format!("author entry {} is empty and was ignored", i + 1));
                    continue;
                }
                // a bare email borrows the previous revision's identity
                if !author.email.is_empty() {
                    if let Some(prev) = old.and_then(|o| {
                        o.authors
                            .iter()
                            .find(|a| a.email.eq_ignore_ascii_case(&author.email))
                    }) {
                        if author.first.is_empty() && author.last.is_empty() {
                            author.first = prev.first.clone();
                            author.last = prev.last.clone();
                        }
                        if author.affiliation.is_empty() {
                            author.affiliation = prev.affiliation.clone();
                        }
                    }
                }
                np.authors.push(author);
            }
        }
    }

    // contacts[] merges with author data, never replaces it
    let mut contacts: BTreeMap<String, Author> = BTreeMap::new();
    for a in &np.authors {
        if a.contact && !a.email.is_empty() {
            contacts.insert(a.email.to_lowercase(), a.clone());
        }
    }
    match &pj.contacts {
        None => {
            for c in old.map_or(&[][..], |o| o.contacts.as_slice()) {
                contacts
                    .entry(c.email.to_lowercase())
                    .or_insert_with(|| c.clone());
            }
        }
        Some(entries) => {
            for entry in entries {
                let email = entry.email.trim();
                if email.is_empty() {
                    ms.warning("contacts", "contact entry without an email was ignored");
                    continue;
                }
                if let Some(author) = np
                    .authors
                    .iter_mut()
                    .find(|a| a.email.eq_ignore_ascii_case(email))
                {
                    author.contact = true;
                    if author.first.is_empty() && author.last.is_empty() {
                        author.first = entry.first.clone().unwrap_or_default();
                        author.last = entry.last.clone().unwrap_or_default();
                    }
                    if author.affiliation.is_empty() {
                        author.affiliation = entry.affiliation.clone().unwrap_or_default();
                    }
                    contacts.insert(email.to_lowercase(), author.clone());
                } else {
                    contacts.insert(
                        email.to_lowercase(),
                        Author {
                            first: entry.first.clone().unwrap_or_default(),
                            last: entry.last.clone().unwrap_or_default(),
                            email: email.to_string(),
                            affiliation: entry.affiliation.clone().unwrap_or_default(),
                            contact: true,
                        },
                    );
                }
            }
        }
    }

    // a bad contact email blocks the save, except for grandfathered
    // previously-stored contacts
    for (lower, contact) in &contacts {
        if !is_valid_email(&contact.email) {
            let grandfathered = old.map_or(false, |o| {
                o.contacts.iter().any(|c| c.email.to_lowercase() == *lower)
            });
            if !grandfathered {
                ms.error("contacts", format!("invalid contact email \"{}\"", contact.email));
            }
        }
    }

    np.contacts = contacts.into_values().collect();
}

fn normalize_status(
    ctx: &ImportContext<'_>,
    pj: &PaperJson,
    old: Option<&NormalizedPaper>,
    np: &mut NormalizedPaper,
    ms: &mut MessageSet,
) {
    let base = old.map_or(SubmissionStatus::Draft, |o| o.status);
    np.outcome = old.map_or(0, |o| o.outcome);
    np.withdraw_reason = old.and_then(|o| o.withdraw_reason.clone());

    let status = match pj.status.as_deref().map(str::trim) {
        None | Some("") => base,
        Some(s) if s.eq_ignore_ascii_case("submitted") => {
            base.submit(pj.submitted_at.unwrap_or(ctx.now))
        }
        Some(s) if s.eq_ignore_ascii_case("withdrawn") => {
            if let Some(reason) = &pj.withdraw_reason {
                np.withdraw_reason = Some(reason.clone());
            }
            // keep the submission instant so revival can restore it
            let base = match pj.submitted_at {
                Some(ts) if base == SubmissionStatus::Draft => base.submit(ts),
                _ => base,
            };
            base.withdraw(pj.withdrawn_at.unwrap_or(ctx.now))
        }
        Some(s) if s.eq_ignore_ascii_case("inprogress") || s.eq_ignore_ascii_case("draft") => {
            SubmissionStatus::Draft
        }
        Some(s) => match ctx.decision_by_name(s) {
            Some(code) => {
                np.outcome = code;
                base.submit(pj.submitted_at.unwrap_or(ctx.now))
            }
            None => {
                ms.error("status", format!("unknown status \"{s}\""));
                base
            }
        },
    };
    if !status.is_withdrawn() {
        np.withdraw_reason = None;
    }
    np.status = status;
}

fn normalize_topics(
    ctx: &ImportContext<'_>,
    pj: &PaperJson,
    old: Option<&NormalizedPaper>,
    np: &mut NormalizedPaper,
    ms: &mut MessageSet,
) {
    let value = match &pj.topics {
        None => {
            np.topics = old.map_or(Vec::new(), |o| o.topics.clone());
            return;
        }
        Some(v) => v,
    };

    let mut resolve = |ms: &mut MessageSet, key: &str, enabled: bool| {
        if !enabled {
            return;
        }
        let id = ctx
            .topic_by_name(key)
            .or_else(|| key.parse::<i64>().ok().filter(|id| ctx.topics.contains_key(id)));
        match id {
            Some(id) => np.topics.push(id),
            None => ms.warning("topics", format!("unknown topic \"{key}\" ignored")),
        }
    };

    match value {
        Value::Object(map) => {
            for (key, v) in map {
                resolve(ms, key, truthy(v));
            }
        }
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::String(s) => resolve(ms, s, true),
                    Value::Number(n) => resolve(ms, &n.to_string(), true),
                    _ => ms.warning("topics", "malformed topic entry ignored"),
                }
            }
        }
        _ => ms.warning("topics", "malformed topics value ignored"),
    }
    np.topics.sort_unstable();
    np.topics.dedup();
}

fn normalize_options(
    ctx: &ImportContext<'_>,
    pj: &PaperJson,
    old: Option<&NormalizedPaper>,
    np: &mut NormalizedPaper,
    ms: &mut MessageSet,
) {
    let map = match &pj.options {
        None => {
            np.options = old.map_or(Vec::new(), |o| o.options.clone());
            return;
        }
        Some(m) => m,
    };

    for (key, v) in map {
        let id = ctx
            .option_by_key(key)
            .or_else(|| key.parse::<i64>().ok().filter(|id| ctx.options.contains_key(id)));
        let Some(id) = id else {
            ms.warning("options", format!("unknown option \"{key}\" ignored"));
            continue;
        };
        let entry = match v {
            Value::Bool(true) => Some((id, 1, None)),
            Value::Bool(false) | Value::Null => None,
            Value::Number(n) => n.as_i64().map(|n| (id, n, None)),
            Value::String(s) => Some((id, 1, Some(s.clone()))),
            Value::Object(obj) => {
                let value = obj.get("value").and_then(Value::as_i64).unwrap_or(1);
                let data = obj.get("data").and_then(Value::as_str).map(str::to_string);
                Some((id, value, data))
            }
            _ => {
                ms.warning("options", format!("malformed value for option \"{key}\" ignored"));
                None
            }
        };
        if let Some(e) = entry {
            np.options.push(e);
        }
    }
    np.options.sort_unstable_by_key(|(id, _, _)| *id);
    np.options.dedup_by_key(|(id, _, _)| *id);
}

fn normalize_conflicts(
    ctx: &ImportContext<'_>,
    pj: &PaperJson,
    old: Option<&NormalizedPaper>,
    np: &mut NormalizedPaper,
    ms: &mut MessageSet,
) {
    let mut map: BTreeMap<String, ConflictType> = BTreeMap::new();
    let mut mentioned: Vec<String> = Vec::new();

    // explicit overrides first
    if let Some(pcc) = &pj.pc_conflicts {
        for (email, v) in pcc {
            let lower = email.trim().to_lowercase();
            if lower.is_empty() {
                continue;
            }
            mentioned.push(lower.clone());
            match ConflictType::from_json_value(v) {
                Some(ConflictType::None) => {}
                Some(ct) => {
                    map.insert(lower, ct);
                }
                None => ms.warning(
                    "pc_conflicts",
                    format!("unknown conflict value for \"{email}\" ignored"),
                ),
            }
        }
    }

    // author and contact emails raise, never lower
    let mut raise = |email: &str, ct: ConflictType, mentioned: &mut Vec<String>| {
        let lower = email.trim().to_lowercase();
        if lower.is_empty() {
            return;
        }
        mentioned.push(lower.clone());
        let entry = map.entry(lower).or_insert(ConflictType::None);
        *entry = (*entry).max(ct);
    };
    for a in &np.authors {
        raise(&a.email, ConflictType::Author, &mut mentioned);
    }
    for c in &np.contacts {
        raise(&c.email, ConflictType::ContactAuthor, &mut mentioned);
    }

    // a chair-marked conflict survives a non-admin edit that simply
    // stops mentioning the email
    if let Some(o) = old {
        if !ctx.actor_is_admin {
            for (email, ct) in &o.conflicts {
                if *ct == ConflictType::Marked && !mentioned.contains(email) {
                    let entry = map.entry(email.clone()).or_insert(ConflictType::None);
                    *entry = (*entry).max(ConflictType::Marked);
                }
            }
        }
    }

    map.retain(|_, ct| *ct != ConflictType::None);
    np.conflicts = map.into_iter().collect();
}

fn normalize_document(
    dj: Option<&DocumentJson>,
    old: Option<&DocumentUpload>,
    field: &str,
    ms: &mut MessageSet,
) -> Option<DocumentUpload> {
    let dj = match dj {
        None => return old.cloned(),
        Some(d) => d,
    };
    let content = match &dj.content_base64 {
        Some(b64) => match DocumentUpload::decode_content(b64) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                ms.error(field, e.to_string());
                None
            }
        },
        None => None,
    };
    let size = content.as_ref().map(|c| c.len() as i64).or(dj.size);
    Some(DocumentUpload {
        docid: dj.docid,
        hash: dj.hash.clone(),
        filename: dj.filename.clone(),
        mimetype: dj.mimetype.clone(),
        size,
        content,
    })
}

fn validate(
    ctx: &ImportContext<'_>,
    np: &NormalizedPaper,
    old: Option<&NormalizedPaper>,
    ms: &mut MessageSet,
) {
    if np.title.is_empty() && !old.map_or(false, |o| o.title.is_empty()) {
        ms.error("title", "title is required");
    }
    if ctx.settings.abstract_required
        && np.abstract_text.is_empty()
        && !old.map_or(false, |o| o.abstract_text.is_empty())
    {
        ms.error("abstract", "abstract is required");
    }
    if np.authors.is_empty() {
        ms.error("authors", "at least one author is required");
    }
    if ctx.settings.max_authors > 0 && np.authors.len() > ctx.settings.max_authors {
        ms.error(
            "authors",
            format!("at most {} authors allowed", ctx.settings.max_authors),
        );
    }
    if np.contacts.is_empty() && !old.map_or(false, |o| o.contacts.is_empty()) {
        ms.error("contacts", "at least one contact is required");
    }
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "0" && !s.eq_ignore_ascii_case("false"),
        _ => true,
    }
}
