//! ATN model: states, typed transitions, and symbol interval sets.
//!
//! The augmented transition network is the automaton form of a grammar,
//! produced by an external deserializer or tool. This module only models the
//! graph; the engine consumes it read-only. Programmatic constructors
//! (`add_state`, `add_transition`, the rule/decision tables) exist so that
//! the external producer — and the test fixtures — can assemble a graph;
//! there is no grammar-to-ATN translation here.

use crate::actions::LexerAction;
use crate::{DecisionId, RuleId, StateId, EOF, NO_STATE};

/// A set of symbol values stored as sorted, disjoint, inclusive intervals.
///
/// Used by set/not-set transitions and by lexer character classes. Symbol
/// values are token types for the parser and code points for the lexer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct IntervalSet {
    intervals: Vec<(i32, i32)>,
}

impl IntervalSet {
    pub fn new() -> Self {
        IntervalSet { intervals: Vec::new() }
    }

    /// Singleton set `{symbol}`.
    pub fn of(symbol: i32) -> Self {
        let mut s = IntervalSet::new();
        s.add_range(symbol, symbol);
        s
    }

    /// Insert the inclusive range `lo..=hi`, coalescing with neighbors.
    pub fn add_range(&mut self, lo: i32, hi: i32) {
        debug_assert!(lo <= hi, "empty interval {lo}..={hi}");
        let mut merged = (lo, hi);
        let mut out = Vec::with_capacity(self.intervals.len() + 1);
        let mut placed = false;
        for &(a, b) in &self.intervals {
            if b + 1 < merged.0 {
                out.push((a, b));
            } else if merged.1 + 1 < a {
                if !placed {
                    out.push(merged);
                    placed = true;
                }
                out.push((a, b));
            } else {
                merged = (merged.0.min(a), merged.1.max(b));
            }
        }
        if !placed {
            out.push(merged);
        }
        self.intervals = out;
    }

    pub fn contains(&self, symbol: i32) -> bool {
        self.intervals
            .binary_search_by(|&(a, b)| {
                if symbol < a {
                    std::cmp::Ordering::Greater
                } else if symbol > b {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn intervals(&self) -> &[(i32, i32)] {
        &self.intervals
    }
}

/// Structural role of an ATN state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    /// Plain state with no structural significance.
    Basic,
    /// Entry of a rule. `is_left_recursive` marks precedence-rewritten rules.
    RuleStart { stop_state: StateId, is_left_recursive: bool },
    /// Exit of a rule; closure pops the prediction context here.
    RuleStop,
    /// Start of an alternative block.
    BlockStart { end_state: StateId },
    /// Start of a `+` block.
    PlusBlockStart { end_state: StateId, loopback: StateId },
    /// Start of a `*` block.
    StarBlockStart { end_state: StateId },
    /// End of an alternative block.
    BlockEnd { start_state: StateId },
    /// Entry decision of a `*` loop. For left-recursive rules this is the
    /// precedence decision the precedence filter applies to.
    StarLoopEntry { loopback: StateId, precedence_decision: bool },
    /// Back edge of a `*` loop.
    StarLoopBack,
    /// Back-edge decision of a `+` loop.
    PlusLoopBack,
    /// Exit of a loop.
    LoopEnd { loopback: StateId },
    /// Lexer mode entry: one outgoing epsilon per token rule of the mode.
    TokensStart,
}

/// A typed edge of the ATN.
///
/// Matched exhaustively at every dispatch site (reach computation, epsilon
/// closure, DFA edge construction); adding a variant is a compile error at
/// each of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Non-consuming edge. `outermost_precedence_return` is set on the
    /// return edge of a left-recursive rule to the rule it returns to; the
    /// precedence filter uses it to suppress pruning of such configs.
    Epsilon { target: StateId, outermost_precedence_return: Option<RuleId> },
    /// Consume exactly `label`.
    Atom { target: StateId, label: i32 },
    /// Consume any symbol in `lo..=hi`.
    Range { target: StateId, lo: i32, hi: i32 },
    /// Consume any symbol in `set`.
    Set { target: StateId, set: IntervalSet },
    /// Consume any in-vocabulary symbol not in `set`.
    NotSet { target: StateId, set: IntervalSet },
    /// Consume any in-vocabulary symbol.
    Wildcard { target: StateId },
    /// Invoke rule `rule`: jump to its start state; `follow` is the state
    /// to return to, pushed onto the prediction context.
    Rule { target: StateId, rule: RuleId, precedence: i32, follow: StateId },
    /// Gated by semantic predicate `(rule, pred_index)`. Context-dependent
    /// predicates are only collectible when prediction has real context.
    Predicate { target: StateId, rule: RuleId, pred_index: u32, is_ctx_dependent: bool },
    /// Gated by a precedence predicate of a left-recursive rule.
    Precedence { target: StateId, precedence: i32 },
    /// Carries lexer action `action_index`; non-consuming. Traversal during
    /// prediction must not execute the action.
    Action { target: StateId, rule: RuleId, action_index: u32 },
}

impl Transition {
    pub fn target(&self) -> StateId {
        match *self {
            Transition::Epsilon { target, .. }
            | Transition::Atom { target, .. }
            | Transition::Range { target, .. }
            | Transition::Set { target, .. }
            | Transition::NotSet { target, .. }
            | Transition::Wildcard { target }
            | Transition::Rule { target, .. }
            | Transition::Predicate { target, .. }
            | Transition::Precedence { target, .. }
            | Transition::Action { target, .. } => target,
        }
    }

    /// Whether this edge consumes no input symbol.
    pub fn is_epsilon(&self) -> bool {
        matches!(
            self,
            Transition::Epsilon { .. }
                | Transition::Rule { .. }
                | Transition::Predicate { .. }
                | Transition::Precedence { .. }
                | Transition::Action { .. }
        )
    }

    /// Whether this edge consumes `symbol`, with vocabulary bounds
    /// `min_vocab..=max_vocab` for the complement/wildcard cases.
    pub fn matches(&self, symbol: i32, min_vocab: i32, max_vocab: i32) -> bool {
        match self {
            Transition::Atom { label, .. } => *label == symbol,
            Transition::Range { lo, hi, .. } => symbol >= *lo && symbol <= *hi,
            Transition::Set { set, .. } => set.contains(symbol),
            Transition::NotSet { set, .. } => {
                symbol >= min_vocab && symbol <= max_vocab && !set.contains(symbol)
            }
            Transition::Wildcard { .. } => symbol >= min_vocab && symbol <= max_vocab,
            Transition::Epsilon { .. }
            | Transition::Rule { .. }
            | Transition::Predicate { .. }
            | Transition::Precedence { .. }
            | Transition::Action { .. } => false,
        }
    }
}

/// A single ATN state.
#[derive(Debug, Clone)]
pub struct AtnState {
    pub kind: StateKind,
    /// Rule this state belongs to.
    pub rule: RuleId,
    pub transitions: Vec<Transition>,
    /// Decision index, for states that head a decision.
    pub decision: Option<DecisionId>,
    /// Non-greedy lexer subrules suppress same-alternative pruning once an
    /// accept has been reached through them.
    pub non_greedy: bool,
}

impl AtnState {
    /// Whether every outgoing edge is non-consuming.
    pub fn epsilon_only(&self) -> bool {
        !self.transitions.is_empty() && self.transitions.iter().all(Transition::is_epsilon)
    }

    pub fn is_rule_stop(&self) -> bool {
        matches!(self.kind, StateKind::RuleStop)
    }
}

/// The complete automaton, immutable for the lifetime of the process once
/// handed to a simulator.
#[derive(Debug, Clone, Default)]
pub struct Atn {
    states: Vec<AtnState>,
    /// Decision index → decision state.
    decision_to_state: Vec<StateId>,
    /// Rule index → rule start state.
    rule_to_start_state: Vec<StateId>,
    /// Rule index → rule stop state.
    rule_to_stop_state: Vec<StateId>,
    /// Lexer: rule index → token type emitted when the rule accepts.
    rule_to_token_type: Vec<i32>,
    /// Lexer: mode index → `TokensStart` state.
    mode_to_start_state: Vec<StateId>,
    /// Lexer: action index → action recorded on `Action` transitions.
    pub lexer_actions: Vec<LexerAction>,
    /// Largest token type in the vocabulary (parser edge-window bound).
    pub max_token_type: i32,
}

impl Atn {
    pub fn new(max_token_type: i32) -> Self {
        Atn { max_token_type, ..Default::default() }
    }

    pub fn add_state(&mut self, kind: StateKind, rule: RuleId) -> StateId {
        let id = self.states.len() as StateId;
        self.states.push(AtnState {
            kind,
            rule,
            transitions: Vec::new(),
            decision: None,
            non_greedy: false,
        });
        if matches!(kind, StateKind::RuleStart { .. }) {
            if self.rule_to_start_state.len() <= rule as usize {
                self.rule_to_start_state.resize(rule as usize + 1, NO_STATE);
            }
            self.rule_to_start_state[rule as usize] = id;
        }
        if matches!(kind, StateKind::RuleStop) {
            if self.rule_to_stop_state.len() <= rule as usize {
                self.rule_to_stop_state.resize(rule as usize + 1, NO_STATE);
            }
            self.rule_to_stop_state[rule as usize] = id;
        }
        id
    }

    pub fn add_transition(&mut self, from: StateId, transition: Transition) {
        self.states[from as usize].transitions.push(transition);
    }

    /// Register `state` as a decision point and return its decision index.
    pub fn register_decision(&mut self, state: StateId) -> DecisionId {
        let decision = self.decision_to_state.len();
        self.decision_to_state.push(state);
        self.states[state as usize].decision = Some(decision);
        decision
    }

    pub fn mark_non_greedy(&mut self, state: StateId) {
        self.states[state as usize].non_greedy = true;
    }

    /// Register a lexer mode entry state.
    pub fn add_mode(&mut self, start_state: StateId) -> usize {
        self.mode_to_start_state.push(start_state);
        self.mode_to_start_state.len() - 1
    }

    /// Record the token type emitted when lexer rule `rule` accepts.
    pub fn set_rule_token_type(&mut self, rule: RuleId, token_type: i32) {
        if self.rule_to_token_type.len() <= rule as usize {
            self.rule_to_token_type.resize(rule as usize + 1, 0);
        }
        self.rule_to_token_type[rule as usize] = token_type;
    }

    pub fn state(&self, id: StateId) -> &AtnState {
        &self.states[id as usize]
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    pub fn num_decisions(&self) -> usize {
        self.decision_to_state.len()
    }

    pub fn decision_state(&self, decision: DecisionId) -> StateId {
        self.decision_to_state[decision]
    }

    pub fn rule_start_state(&self, rule: RuleId) -> StateId {
        self.rule_to_start_state[rule as usize]
    }

    pub fn rule_stop_state(&self, rule: RuleId) -> StateId {
        self.rule_to_stop_state[rule as usize]
    }

    pub fn rule_token_type(&self, rule: RuleId) -> i32 {
        self.rule_to_token_type[rule as usize]
    }

    pub fn mode_start_state(&self, mode: usize) -> StateId {
        self.mode_to_start_state[mode]
    }

    pub fn num_modes(&self) -> usize {
        self.mode_to_start_state.len()
    }

    /// Whether `state` can reach its rule's stop state through non-consuming
    /// edges alone. Used when EOF forces prediction to run rules to
    /// completion.
    pub fn epsilon_reaches_rule_stop(&self, state: StateId) -> bool {
        let rule = self.states[state as usize].rule;
        let stop = self.rule_to_stop_state[rule as usize];
        let mut seen = vec![false; self.states.len()];
        let mut work = vec![state];
        while let Some(s) = work.pop() {
            if s == stop {
                return true;
            }
            if std::mem::replace(&mut seen[s as usize], true) {
                continue;
            }
            for t in &self.states[s as usize].transitions {
                if t.is_epsilon() && !matches!(t, Transition::Rule { .. }) {
                    work.push(t.target());
                }
            }
        }
        false
    }

    /// Whether the EOF symbol itself can be consumed from `state` (used for
    /// reach at end of input).
    pub fn symbol_transition_matches_eof(&self, state: StateId) -> bool {
        self.states[state as usize]
            .transitions
            .iter()
            .any(|t| t.matches(EOF, EOF, self.max_token_type))
    }
}
