/// Submission lifecycle of a paper.
///
/// The storage layer keeps the historical two-column encoding
/// (`time_submitted`, `time_withdrawn`): a positive `time_submitted` is
/// the submission instant, zero means draft, and a withdrawn paper that
/// had been submitted stores the old instant negated so revival can
/// restore it. That encoding exists only at this boundary; everything
/// above works with the enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmissionStatus {
    #[default]
    Draft,
    Submitted { at: i64 },
    WithdrawnFromDraft { at: i64 },
    WithdrawnFromSubmitted { submitted_at: i64, at: i64 },
}

impl SubmissionStatus {
    pub fn decode(time_submitted: i64, time_withdrawn: i64) -> Self {
        if time_withdrawn > 0 {
            if time_submitted < 0 {
                SubmissionStatus::WithdrawnFromSubmitted {
                    submitted_at: -time_submitted,
                    at: time_withdrawn,
                }
            } else {
                SubmissionStatus::WithdrawnFromDraft { at: time_withdrawn }
            }
        } else if time_submitted > 0 {
            SubmissionStatus::Submitted { at: time_submitted }
        } else {
            SubmissionStatus::Draft
        }
    }

    /// (time_submitted, time_withdrawn) column pair.
    pub fn encode(self) -> (i64, i64) {
        match self {
            SubmissionStatus::Draft => (0, 0),
            SubmissionStatus::Submitted { at } => (at, 0),
            SubmissionStatus::WithdrawnFromDraft { at } => (0, at),
            SubmissionStatus::WithdrawnFromSubmitted { submitted_at, at } => (-submitted_at, at),
        }
    }

    pub fn is_submitted(self) -> bool {
        matches!(self, SubmissionStatus::Submitted { .. })
    }

    pub fn is_withdrawn(self) -> bool {
        matches!(
            self,
            SubmissionStatus::WithdrawnFromDraft { .. }
                | SubmissionStatus::WithdrawnFromSubmitted { .. }
        )
    }

    pub fn submitted_at(self) -> Option<i64> {
        match self {
            SubmissionStatus::Submitted { at } => Some(at),
            SubmissionStatus::WithdrawnFromSubmitted { submitted_at, .. } => Some(submitted_at),
            _ => None,
        }
    }

    pub fn withdrawn_at(self) -> Option<i64> {
        match self {
            SubmissionStatus::WithdrawnFromDraft { at }
            | SubmissionStatus::WithdrawnFromSubmitted { at, .. } => Some(at),
            _ => None,
        }
    }

    /// Submit at `now`. Submitting an already-submitted paper keeps the
    /// original instant; submitting a withdrawn paper revives it first.
    pub fn submit(self, now: i64) -> Self {
        match self {
            SubmissionStatus::Submitted { at } => SubmissionStatus::Submitted { at },
            SubmissionStatus::WithdrawnFromSubmitted { submitted_at, .. } => {
                SubmissionStatus::Submitted { at: submitted_at }
            }
            _ => SubmissionStatus::Submitted { at: now },
        }
    }

    pub fn withdraw(self, now: i64) -> Self {
        match self {
            SubmissionStatus::Submitted { at } => SubmissionStatus::WithdrawnFromSubmitted {
                submitted_at: at,
                at: now,
            },
            SubmissionStatus::Draft => SubmissionStatus::WithdrawnFromDraft { at: now },
            withdrawn => withdrawn,
        }
    }

    /// Un-withdraw, restoring the pre-withdrawal state.
    pub fn revive(self) -> Self {
        match self {
            SubmissionStatus::WithdrawnFromDraft { .. } => SubmissionStatus::Draft,
            SubmissionStatus::WithdrawnFromSubmitted { submitted_at, .. } => {
                SubmissionStatus::Submitted { at: submitted_at }
            }
            other => other,
        }
    }
}
