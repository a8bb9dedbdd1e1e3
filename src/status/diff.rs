use crate::conflict::ConflictType;
use crate::contact::Author;
use crate::db::PaperUpdate;
use crate::docs::DocumentUpload;

use super::normalize::NormalizedPaper;

/// Minimal set of writes that turns `old` into `new`. An unchanged
/// re-import produces an empty diff and therefore no statements at all.
#[derive(Debug, Default)]
pub struct PaperDiff {
    pub update: PaperUpdate,
    pub topics: Option<Vec<i64>>,
    pub options: Option<Vec<(i64, i64, Option<String>)>>,
    /// (lowercased email, severity), to be resolved to contact ids at
    /// write time.
    pub conflicts: Option<Vec<(String, ConflictType)>>,
    pub submission: Option<DocumentUpload>,
    pub final_doc: Option<DocumentUpload>,
}

impl PaperDiff {
    pub fn is_empty(&self) -> bool {
        self.update.is_empty()
            && self.topics.is_none()
            && self.options.is_none()
            && self.conflicts.is_none()
            && self.submission.is_none()
            && self.final_doc.is_none()
    }
}

fn author_lines(authors: &[Author]) -> String {
    authors.iter().map(Author::to_line).collect::<Vec<_>>().join("\n")
}

fn document_changed(old: Option<&DocumentUpload>, new: Option<&DocumentUpload>) -> bool {
    match (old, new) {
        (None, None) => false,
        (Some(o), Some(n)) => {
            if let (Some(a), Some(b)) = (o.content_hash(), n.content_hash()) {
                a != b
            } else if n.docid.is_some() {
                n.docid != o.docid
            } else {
                o != n
            }
        }
        _ => true,
    }
}

pub fn diff(old: &NormalizedPaper, new: &NormalizedPaper) -> PaperDiff {
    let mut d = PaperDiff::default();

    if new.title != old.title {
        d.update.title = Some(new.title.clone());
    }
    if new.abstract_text != old.abstract_text {
        d.update.abstract_text = Some(new.abstract_text.clone());
    }
    if new.authors != old.authors {
        d.update.author_information = Some(author_lines(&new.authors));
    }
    let (old_ts, old_tw) = old.status.encode();
    let (new_ts, new_tw) = new.status.encode();
    if new_ts != old_ts {
        d.update.time_submitted = Some(new_ts);
    }
    if new_tw != old_tw {
        d.update.time_withdrawn = Some(new_tw);
    }
    if new.withdraw_reason != old.withdraw_reason {
        d.update.withdraw_reason = Some(new.withdraw_reason.clone());
    }
    if new.outcome != old.outcome {
        d.update.outcome = Some(new.outcome);
    }
    if new.blind != old.blind {
        d.update.blind = Some(new.blind);
    }
    if new.topics != old.topics {
        d.topics = Some(new.topics.clone());
    }
    if new.options != old.options {
        d.options = Some(new.options.clone());
    }
    if new.conflicts != old.conflicts {
        d.conflicts = Some(new.conflicts.clone());
    }
    if document_changed(old.submission.as_ref(), new.submission.as_ref()) {
        d.submission = new.submission.clone();
    }
    if document_changed(old.final_doc.as_ref(), new.final_doc.as_ref()) {
        d.final_doc = new.final_doc.clone();
    }
    d
}
