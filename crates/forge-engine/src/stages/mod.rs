//! One module per pipeline stage. Every stage is total: failures are
//! absorbed into a fallback value and recorded on the [`StageOutcome`].

use forge_contracts::FailureKind;
use tracing::warn;

use crate::transport::{classify_failure, error_chain_text};

pub mod analysis;
pub mod evolution;
pub mod flavor;
pub mod skill;
pub mod synthesis;

pub use analysis::analyze;
pub use evolution::evolve;
pub use flavor::flavor_text;
pub use skill::match_skill;
pub use synthesis::synthesize;

const REASON_MAX_CHARS: usize = 400;

/// A stage's value, plus why it is a fallback when it is one.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutcome<T> {
    pub value: T,
    pub failure: Option<FailureKind>,
    pub fallback_reason: Option<String>,
}

impl<T> StageOutcome<T> {
    pub fn ok(value: T) -> Self {
        Self {
            value,
            failure: None,
            fallback_reason: None,
        }
    }

    pub fn fallback(stage: &str, value: T, failure: FailureKind, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        warn!(stage, failure = failure.as_str(), %reason, "stage fell back");
        Self {
            value,
            failure: Some(failure),
            fallback_reason: Some(reason),
        }
    }

    pub fn from_error(stage: &str, value: T, err: &anyhow::Error) -> Self {
        Self::fallback(
            stage,
            value,
            classify_failure(err),
            error_chain_text(err, REASON_MAX_CHARS),
        )
    }

    pub fn is_fallback(&self) -> bool {
        self.failure.is_some()
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use forge_contracts::ForgeError;

    use super::*;

    #[test]
    fn from_error_classifies_and_keeps_value() {
        let err = anyhow::Error::new(ForgeError::malformed("Gemini", "no parts"))
            .context("analysis call failed");
        let outcome = StageOutcome::from_error("analysis", 7, &err);
        assert_eq!(outcome.value, 7);
        assert!(outcome.is_fallback());
        assert_eq!(outcome.failure, Some(FailureKind::UpstreamMalformed));
        assert!(outcome
            .fallback_reason
            .as_deref()
            .unwrap_or("")
            .contains("no parts"));
    }

    #[test]
    fn ok_outcome_has_no_reason() {
        let outcome = StageOutcome::ok("value");
        assert!(!outcome.is_fallback());
        assert_eq!(outcome.into_value(), "value");
    }
}
