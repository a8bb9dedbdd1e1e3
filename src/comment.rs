/// Visibility class of a comment, stored in the low bits of the
/// `comment_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CommentVisibility {
    AdminOnly,
    PcOnly,
    Reviewer,
    Author,
}

pub const CT_VISIBILITY_MASK: i32 = 0x0f;
pub const CT_BLIND: i32 = 0x10;
pub const CT_RESPONSE: i32 = 0x20;
pub const CT_DRAFT: i32 = 0x40;

#[derive(Debug, Clone, PartialEq)]
pub struct CommentInfo {
    pub comment_id: i64,
    pub paper_id: i64,
    pub contact_id: i64,
    pub comment_type: i32,
    /// Response round, meaningful only for responses.
    pub comment_round: i32,
    pub time_modified: i64,
    /// 0 while not yet displayed (drafts).
    pub time_displayed: i64,
    pub text: Option<String>,
}

impl CommentInfo {
    pub fn visibility(&self) -> CommentVisibility {
        match self.comment_type & CT_VISIBILITY_MASK {
            0 => CommentVisibility::AdminOnly,
            1 => CommentVisibility::PcOnly,
            2 => CommentVisibility::Reviewer,
            _ => CommentVisibility::Author,
        }
    }

    pub fn is_blind(&self) -> bool {
        self.comment_type & CT_BLIND != 0
    }

    pub fn is_response(&self) -> bool {
        self.comment_type & CT_RESPONSE != 0
    }

    pub fn is_draft(&self) -> bool {
        self.comment_type & CT_DRAFT != 0
    }
}

/// At most one published response may exist per (paper, response round).
/// The storage layer enforces this with a partial unique index; this check
/// lets the comment-save path report the collision before issuing the
/// insert.
pub fn response_round_conflict(existing: &[CommentInfo], candidate: &CommentInfo) -> bool {
    candidate.is_response()
        && !candidate.is_draft()
        && existing.iter().any(|c| {
            c.comment_id != candidate.comment_id
                && c.is_response()
                && !c.is_draft()
                && c.comment_round == candidate.comment_round
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(id: i64, ctype: i32, round: i32) -> CommentInfo {
        CommentInfo {
            comment_id: id,
            paper_id: 1,
            contact_id: 10,
            comment_type: ctype,
            comment_round: round,
            time_modified: 100,
            time_displayed: 100,
            text: None,
        }
    }

    #[test]
    fn type_bits_decode() {
        let c = comment(1, 3 | CT_BLIND | CT_RESPONSE | CT_DRAFT, 0);
        assert_eq!(c.visibility(), CommentVisibility::Author);
        assert!(c.is_blind());
        assert!(c.is_response());
        assert!(c.is_draft());
    }

    #[test]
    fn one_published_response_per_round() {
        let existing = vec![comment(1, 3 | CT_RESPONSE, 0)];
        let published = comment(2, 3 | CT_RESPONSE, 0);
        let draft = comment(3, 3 | CT_RESPONSE | CT_DRAFT, 0);
        let other_round = comment(4, 3 | CT_RESPONSE, 1);
        assert!(response_round_conflict(&existing, &published));
        assert!(!response_round_conflict(&existing, &draft));
        assert!(!response_round_conflict(&existing, &other_round));
        // editing the existing response is not a conflict with itself
        let edit = comment(1, 3 | CT_RESPONSE, 0);
        assert!(!response_round_conflict(&existing, &edit));
    }
}
