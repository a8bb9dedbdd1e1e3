/// One `tag#value` token from a paper's tag string.
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub tag: String,
    pub value: f64,
}

impl Tag {
    /// Private "twiddle" tags are prefixed with their owner's contact id,
    /// e.g. `17~novote`. Returns the owner if so.
    pub fn twiddle_owner(&self) -> Option<i64> {
        let idx = self.tag.find('~')?;
        if idx == 0 {
            return None;
        }
        self.tag[..idx].parse().ok()
    }

    /// Chair tags use a bare `~~` prefix.
    pub fn is_chair_tag(&self) -> bool {
        self.tag.starts_with("~~")
    }
}

/// Parse a full tag string: space-joined `tag#value` tokens, value
/// defaulting to 0 when the `#` part is absent or malformed.
pub fn parse_tag_string(s: &str) -> Vec<Tag> {
    s.split_whitespace()
        .filter_map(|tok| {
            let (tag, value) = match tok.split_once('#') {
                Some((t, v)) => (t, v.parse().unwrap_or(0.0)),
                None => (tok, 0.0),
            };
            if tag.is_empty() {
                None
            } else {
                Some(Tag {
                    tag: tag.to_string(),
                    value,
                })
            }
        })
        .collect()
}

/// Join tags back into the canonical string form.
pub fn format_tag_string(tags: &[Tag]) -> String {
    let mut out = String::new();
    for t in tags {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&t.tag);
        if t.value != 0.0 {
            out.push('#');
            let v = t.value;
            if v.fract() == 0.0 {
                out.push_str(&format!("{}", v as i64));
            } else {
                out.push_str(&format!("{}", v));
            }
        }
    }
    out
}
