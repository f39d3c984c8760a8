//! # llstar — adaptive LL(*) prediction engine
//!
//! Runtime engine that decides, at each grammar decision point, which
//! alternative production (parser) or lexical rule (lexer) matches upcoming
//! input, by simulating a precomputed augmented transition network (ATN).
//!
//! ## Architecture
//!
//! ```text
//!   ATN (given, read-only)
//!        │
//!        ▼
//!  ┌──────────────────────────────────────────────┐
//!  │  1. Closure engine:                          │
//!  │     ATN configs → epsilon closure →          │
//!  │     deduplicated config sets                 │
//!  │                                              │
//!  │  2. Call-stack sharing:                      │
//!  │     PredictionContext DAG, interned,         │
//!  │     structurally merged                      │
//!  │                                              │
//!  │  3. Decision caching:                        │
//!  │     config sets → interned DFA states →      │
//!  │     per-decision lazy DFA                    │
//!  └──────────────────────────────────────────────┘
//!        │
//!        ▼
//!   ParserAtnSimulator (SLL → full-context LL)
//!   LexerAtnSimulator  (maximal munch)
//! ```
//!
//! Prediction starts in SLL mode with an approximate (local) call-stack
//! context; on a detected conflict it falls back to full-context LL using
//! the true rule-invocation stack. Lexing is maximal munch: the engine keeps
//! extending the match past accept states and commits to the furthest
//! checkpoint when no transition remains.
//!
//! The ATN itself is consumed read-only; building it from a grammar is an
//! external concern.

pub mod actions;
pub mod atn;
pub mod config;
pub mod context;
pub mod dfa;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod prediction_mode;
pub mod semantic;
pub mod stream;

#[cfg(test)]
mod tests;

use std::sync::Arc;

/// Identifier for an ATN state.
pub type StateId = u32;

/// Index of a grammar rule within the ATN.
pub type RuleId = u32;

/// Index of a decision point within the ATN.
pub type DecisionId = usize;

/// A sentinel value representing a non-existent state.
pub const NO_STATE: StateId = u32::MAX;

/// Alternative numbers are 1-based; 0 means "no alternative predicted yet".
pub const INVALID_ALT: u16 = 0;

/// Symbol value reported by streams at end of input.
pub const EOF: i32 = -1;

/// A node in the live rule-invocation stack of a parse in progress.
///
/// The simulator only reads the chain of invoking states; hosts embed this
/// (or wrap it) in whatever parse-tree node they maintain. `invoking_state`
/// is the ATN state holding the rule transition that entered the current
/// rule, or a negative value at the stack bottom.
#[derive(Debug, Clone)]
pub struct RuleCallStack {
    pub parent: Option<Arc<RuleCallStack>>,
    pub invoking_state: i64,
}

impl RuleCallStack {
    /// Stack bottom: no rule has been invoked.
    pub fn empty() -> Arc<RuleCallStack> {
        Arc::new(RuleCallStack { parent: None, invoking_state: -1 })
    }

    /// Push a rule invocation made from `invoking_state`.
    pub fn push(parent: Arc<RuleCallStack>, invoking_state: StateId) -> Arc<RuleCallStack> {
        Arc::new(RuleCallStack { parent: Some(parent), invoking_state: invoking_state as i64 })
    }
}

/// Host-side collaborator for parser prediction.
///
/// The engine never interprets predicates itself; it calls back into the
/// recognizer, which evaluates grammar-attached semantic predicates
/// (`sempred`) and precedence predicates (`precpred`) against its own state.
pub trait Recognizer {
    /// Evaluate semantic predicate `pred_index` of rule `rule_index`.
    fn sempred(&mut self, rule_index: RuleId, pred_index: u32) -> bool;

    /// Evaluate a precedence predicate: "is `precedence` allowed here?"
    /// The conventional implementation is `precedence >= current_precedence`.
    fn precpred(&mut self, precedence: i32) -> bool;

    /// Current precedence level of the enclosing left-recursive rule
    /// invocation (0 when not inside one). Selects the precedence-indexed
    /// DFA start state.
    fn current_precedence(&self) -> i32 {
        0
    }
}

/// Host-side collaborator for lexer matching.
///
/// Receives replayed lexer actions at commit time and evaluates lexer
/// predicates during matching.
pub trait LexerHost {
    /// Evaluate lexical predicate `pred_index` of rule `rule_index`.
    fn sempred(&mut self, rule_index: RuleId, pred_index: u32) -> bool;

    /// Drop the current token and continue scanning.
    fn skip(&mut self);

    /// Fold the current match into the next token.
    fn more(&mut self);

    /// Override the matched token's type.
    fn set_type(&mut self, token_type: i32);

    /// Route the matched token to a channel.
    fn set_channel(&mut self, channel: i32);

    /// Switch to lexer mode `mode`.
    fn set_mode(&mut self, mode: usize);

    /// Push the current mode and switch to `mode`.
    fn push_mode(&mut self, mode: usize);

    /// Pop back to the previously pushed mode.
    fn pop_mode(&mut self);

    /// Run a custom embedded action.
    fn action(&mut self, rule_index: RuleId, action_index: u32);
}

/// Diagnostic side channel for prediction events.
///
/// Ambiguity is not an error: by default it is silently resolved to the
/// minimum alternative. Hosts that want grammar diagnostics install a
/// listener; the no-op defaults make every method optional.
pub trait PredictionListener {
    /// The input interval `start..=stop` is ambiguous between `alts`.
    /// `exact` is true when every conflicting configuration pair agrees on
    /// the full ambiguous alternative set.
    fn report_ambiguity(
        &mut self,
        decision: DecisionId,
        start: usize,
        stop: usize,
        exact: bool,
        alts: &config::AltSet,
    ) {
        let _ = (decision, start, stop, exact, alts);
    }

    /// SLL found a conflict; the engine is retrying with full context.
    fn report_attempting_full_context(
        &mut self,
        decision: DecisionId,
        start: usize,
        stop: usize,
        conflicting_alts: &config::AltSet,
    ) {
        let _ = (decision, start, stop, conflicting_alts);
    }

    /// Full-context prediction resolved an SLL conflict to a unique
    /// alternative: the decision is context sensitive.
    fn report_context_sensitivity(
        &mut self,
        decision: DecisionId,
        start: usize,
        stop: usize,
        prediction: u16,
    ) {
        let _ = (decision, start, stop, prediction);
    }
}

/// Listener that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullListener;

impl PredictionListener for NullListener {}
