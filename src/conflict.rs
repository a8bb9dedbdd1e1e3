/// Severity of a contact's conflict with a paper. Ordered: later sources
/// of conflict information may raise a severity, never lower it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(i32)]
pub enum ConflictType {
    #[default]
    None = 0,
    /// Chair-confirmed absence of conflict; survives recomputation.
    PinnedNonConflict = 1,
    /// Generic conflict marked by a chair or PC member.
    Marked = 2,
    Author = 4,
    /// Author who also receives correspondence about the paper.
    ContactAuthor = 5,
}

impl ConflictType {
    /// Threshold between "no effective conflict" and a real one.
    pub fn is_conflicted(self) -> bool {
        self > ConflictType::PinnedNonConflict
    }

    pub fn is_author(self) -> bool {
        self >= ConflictType::Author
    }

    pub fn from_raw(value: i32) -> Self {
        match value {
            1 => ConflictType::PinnedNonConflict,
            2 | 3 => ConflictType::Marked,
            4 => ConflictType::Author,
            v if v >= 5 => ConflictType::ContactAuthor,
            _ => ConflictType::None,
        }
    }

    pub fn as_raw(self) -> i32 {
        self as i32
    }

    /// Parse a JSON `pc_conflicts` value: a conflict name, or a boolean
    /// meaning marked/none.
    pub fn from_json_value(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(true) => Some(ConflictType::Marked),
            serde_json::Value::Bool(false) => Some(ConflictType::None),
            serde_json::Value::String(s) => match s.as_str() {
                "none" | "no" => Some(ConflictType::None),
                "pinned-none" => Some(ConflictType::PinnedNonConflict),
                "conflict" | "yes" | "marked" => Some(ConflictType::Marked),
                "author" => Some(ConflictType::Author),
                "contact" | "contact-author" => Some(ConflictType::ContactAuthor),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn json_name(self) -> &'static str {
        match self {
            ConflictType::None => "none",
            ConflictType::PinnedNonConflict => "pinned-none",
            ConflictType::Marked => "conflict",
            ConflictType::Author => "author",
            ConflictType::ContactAuthor => "contact-author",
        }
    }
}

/// One (paper, contact) conflict edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaperConflict {
    pub contact_id: i64,
    pub conflict_type: ConflictType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_is_ordered() {
        assert!(ConflictType::ContactAuthor > ConflictType::Author);
        assert!(ConflictType::Author > ConflictType::Marked);
        assert!(ConflictType::Marked > ConflictType::PinnedNonConflict);
        assert!(!ConflictType::PinnedNonConflict.is_conflicted());
        assert!(ConflictType::Marked.is_conflicted());
    }

    #[test]
    fn json_names_round_trip() {
        for ct in [
            ConflictType::None,
            ConflictType::PinnedNonConflict,
            ConflictType::Marked,
            ConflictType::Author,
            ConflictType::ContactAuthor,
        ] {
            let v = serde_json::Value::String(ct.json_name().to_string());
            assert_eq!(ConflictType::from_json_value(&v), Some(ct));
        }
    }
}
