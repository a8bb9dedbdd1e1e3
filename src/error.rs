use thiserror::Error;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Structurally invalid input that cannot be reported field by field,
    /// e.g. a JSON paper id naming a different paper than the one being
    /// updated.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Severity of one validation message. `Error` blocks persistence,
/// `Warning` and `Info` only annotate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// One field-addressable validation message, so a caller can point at the
/// exact input control that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub field: String,
    pub severity: Severity,
    pub text: String,
}

/// Accumulator for validation output. An importer run produces one of
/// these; persistence proceeds only while `has_error()` is false.
#[derive(Debug, Default, Clone)]
pub struct MessageSet {
    messages: Vec<Message>,
}

impl MessageSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn msg(&mut self, field: &str, severity: Severity, text: impl Into<String>) {
        self.messages.push(Message {
            field: field.to_string(),
            severity,
            text: text.into(),
        });
    }

    pub fn error(&mut self, field: &str, text: impl Into<String>) {
        self.msg(field, Severity::Error, text);
    }

    pub fn warning(&mut self, field: &str, text: impl Into<String>) {
        self.msg(field, Severity::Warning, text);
    }

    pub fn info(&mut self, field: &str, text: impl Into<String>) {
        self.msg(field, Severity::Info, text);
    }

    pub fn has_error(&self) -> bool {
        self.messages.iter().any(|m| m.severity == Severity::Error)
    }

    pub fn has_problem(&self) -> bool {
        self.messages.iter().any(|m| m.severity >= Severity::Warning)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn messages_for<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a Message> + 'a {
        self.messages.iter().filter(move |m| m.field == field)
    }

    pub fn extend(&mut self, other: MessageSet) {
        self.messages.extend(other.messages);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_do_not_block() {
        let mut ms = MessageSet::new();
        ms.warning("topics", "unknown topic ignored");
        ms.info("authors", "author completed from previous revision");
        assert!(!ms.has_error());
        assert!(ms.has_problem());
    }

    #[test]
    fn messages_are_field_addressable() {
        let mut ms = MessageSet::new();
        ms.error("title", "title required");
        ms.error("authors", "at least one author required");
        assert!(ms.has_error());
        assert_eq!(ms.messages_for("title").count(), 1);
        assert_eq!(ms.messages_for("abstract").count(), 0);
    }
}
