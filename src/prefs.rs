/// One PC member's review preference on one paper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewPreference {
    pub contact_id: i64,
    pub preference: i32,
    pub expertise: Option<i32>,
}

/// Parse the denormalized preference signature: comma-joined
/// `contact pref expertise` triples, expertise `.` when unset. The string
/// form never leaves this boundary.
pub fn parse_preference_signature(sig: &str) -> Vec<ReviewPreference> {
    sig.split(',')
        .filter_map(|entry| {
            let mut w = entry.split_whitespace();
            let contact_id: i64 = w.next()?.parse().ok()?;
            let preference: i32 = w.next()?.parse().ok()?;
            let expertise = match w.next() {
                Some(".") | None => None,
                Some(e) => e.parse().ok(),
            };
            Some(ReviewPreference {
                contact_id,
                preference,
                expertise,
            })
        })
        .collect()
}
