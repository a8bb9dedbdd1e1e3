use regex::Regex;
use std::sync::OnceLock;

/// One entry in a paper's author list. Authors are ordered; any field may
/// be empty, but an author with every field empty is rejected during
/// normalization rather than silently dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Author {
    pub first: String,
    pub last: String,
    pub email: String,
    pub affiliation: String,
    /// Marked as a contact in the submission form.
    pub contact: bool,
}

impl Author {
    pub fn is_empty(&self) -> bool {
        self.first.is_empty()
            && self.last.is_empty()
            && self.email.is_empty()
            && self.affiliation.is_empty()
    }

    pub fn name(&self) -> String {
        match (self.first.is_empty(), self.last.is_empty()) {
            (true, true) => String::new(),
            (true, false) => self.last.clone(),
            (false, true) => self.first.clone(),
            (false, false) => format!("{} {}", self.first, self.last),
        }
    }

    /// Parse one line of the stored author block. The storage format is
    /// tab-separated `first \t last \t email \t affiliation`; older rows
    /// may hold a plain `Name <email> (affiliation)` line instead.
    pub fn from_line(line: &str) -> Self {
        if line.contains('\t') {
            let mut parts = line.split('\t');
            return Author {
                first: parts.next().unwrap_or("").trim().to_string(),
                last: parts.next().unwrap_or("").trim().to_string(),
                email: parts.next().unwrap_or("").trim().to_string(),
                affiliation: parts.next().unwrap_or("").trim().to_string(),
                contact: false,
            };
        }

        let mut rest = line.trim().to_string();
        let mut email = String::new();
        let mut affiliation = String::new();

        if let (Some(open), Some(close)) = (rest.find('('), rest.rfind(')')) {
            if open < close {
                affiliation = rest[open + 1..close].trim().to_string();
                rest = format!("{} {}", &rest[..open], &rest[close + 1..])
                    .trim()
                    .to_string();
            }
        }
        if let (Some(open), Some(close)) = (rest.find('<'), rest.rfind('>')) {
            if open < close {
                email = rest[open + 1..close].trim().to_string();
                rest = format!("{} {}", &rest[..open], &rest[close + 1..])
                    .trim()
                    .to_string();
            }
        } else if rest.contains('@') && !rest.contains(' ') {
            email = std::mem::take(&mut rest);
        }

        let (first, last) = split_name(&rest);
        Author {
            first,
            last,
            email,
            affiliation,
            contact: false,
        }
    }

    /// Serialize back to the stored tab-separated form.
    pub fn to_line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}",
            self.first, self.last, self.email, self.affiliation
        )
    }
}

/// Split a display name into (first, last). The last whitespace-separated
/// word becomes the last name; "Last, First" input is honored.
pub fn split_name(name: &str) -> (String, String) {
    let name = name.trim();
    if name.is_empty() {
        return (String::new(), String::new());
    }
    if let Some((last, first)) = name.split_once(',') {
        return (first.trim().to_string(), last.trim().to_string());
    }
    match name.rsplit_once(char::is_whitespace) {
        Some((first, last)) => (first.trim().to_string(), last.trim().to_string()),
        None => (String::new(), name.to_string()),
    }
}

/// A person the system can attribute actions to. Registered users have an
/// account row; token reviewers and authors promoted to contacts may not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Contact {
    Registered { contact_id: i64 },
    Unregistered {
        first: String,
        last: String,
        email: String,
        affiliation: String,
    },
}

impl Contact {
    pub fn contact_id(&self) -> Option<i64> {
        match self {
            Contact::Registered { contact_id } => Some(*contact_id),
            Contact::Unregistered { .. } => None,
        }
    }
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~.-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)+$")
            .unwrap()
    })
}

/// Syntactic email validation. Deliberately permissive about the local
/// part; requires a dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    !email.contains("..") && email_regex().is_match(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tabbed_author_line() {
        let a = Author::from_line("Jo\tLee\tjo@example.edu\tExample University");
        assert_eq!(a.first, "Jo");
        assert_eq!(a.last, "Lee");
        assert_eq!(a.email, "jo@example.edu");
        assert_eq!(a.affiliation, "Example University");
    }

    #[test]
    fn parses_free_text_author_line() {
        let a = Author::from_line("Jo Lee <jo@example.edu> (Example University)");
        assert_eq!(a.first, "Jo");
        assert_eq!(a.last, "Lee");
        assert_eq!(a.email, "jo@example.edu");
        assert_eq!(a.affiliation, "Example University");
    }

    #[test]
    fn splits_comma_names() {
        assert_eq!(split_name("Lee, Jo"), ("Jo".into(), "Lee".into()));
        assert_eq!(split_name("Ana Maria Silva"), ("Ana Maria".into(), "Silva".into()));
        assert_eq!(split_name("Plato"), ("".into(), "Plato".into()));
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("jo.lee+tag@sub.example.edu"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a..b@x.com"));
        assert!(!is_valid_email("a b@x.com"));
    }
}
