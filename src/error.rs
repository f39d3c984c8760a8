//! Prediction failure types.
//!
//! A prediction failure means no configuration survives to explain the
//! current lookahead; it is reported to the caller, never retried
//! internally — an error-recovery collaborator decides what happens next.
//! Internal ATN consistency violations are not represented here: a corrupt
//! automaton is a fatal condition and panics.

use thiserror::Error;

use crate::config::ConfigSet;
use crate::{DecisionId, RuleId};

/// Result type for prediction operations.
pub type PredictionResult<T> = Result<T, RecognitionError>;

/// Errors raised by the prediction engine.
#[derive(Error, Debug, Clone)]
pub enum RecognitionError {
    /// No alternative of a parser decision can match the lookahead.
    #[error("no viable alternative at input position {offending_index} (decision {decision})")]
    NoViableAlt {
        decision: DecisionId,
        /// Input index where prediction began.
        start_index: usize,
        /// Input index of the offending token.
        offending_index: usize,
        /// The configurations that were live just before the death state,
        /// for diagnostics.
        dead_end_configs: ConfigSet,
    },

    /// No lexer rule can extend or accept the current character sequence.
    #[error("no viable token at character position {start_index}")]
    LexerNoViableAlt {
        /// Index of the first character of the failed match.
        start_index: usize,
        dead_end_configs: ConfigSet,
    },

    /// A semantic predicate rejected the otherwise-viable path.
    /// Distinguishes a predicate-caused rejection from a symbol mismatch.
    ///
    /// Prediction never raises this: predicates encountered during
    /// simulation prune configurations and end in [`NoViableAlt`] when
    /// nothing survives. The host's rule-body matcher constructs it when a
    /// predicate inside an already-chosen alternative fails at match time;
    /// it lives here so hosts report every recognition failure through one
    /// type.
    ///
    /// [`NoViableAlt`]: RecognitionError::NoViableAlt
    #[error("predicate {pred_index} of rule {rule_index} failed")]
    FailedPredicate {
        rule_index: RuleId,
        pred_index: u32,
        input_index: usize,
    },
}

impl RecognitionError {
    /// The configurations live at the point of failure, when available.
    pub fn dead_end_configs(&self) -> Option<&ConfigSet> {
        match self {
            RecognitionError::NoViableAlt { dead_end_configs, .. }
            | RecognitionError::LexerNoViableAlt { dead_end_configs, .. } => {
                Some(dead_end_configs)
            }
            RecognitionError::FailedPredicate { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_predicate_carries_the_failure_site() {
        // Constructed by the host once an alternative is committed, so it
        // has no dead-end configurations to offer.
        let err = RecognitionError::FailedPredicate {
            rule_index: 3,
            pred_index: 1,
            input_index: 12,
        };
        assert_eq!(err.to_string(), "predicate 1 of rule 3 failed");
        assert!(err.dead_end_configs().is_none());
    }
}
