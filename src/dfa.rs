//! Per-decision DFA: interned states over frozen config sets, sparse
//! bounded edge tables.
//!
//! A DFA state's identity is entirely determined by its (frozen)
//! configuration set; the per-decision intern table guarantees at most one
//! live state per distinct set, discovered by fingerprint lookup before any
//! newly computed state is linked into the graph. Interning is idempotent,
//! which is what lets concurrent computation of an equivalent state converge
//! on one canonical instance.
//!
//! Edges are cached only inside a bounded symbol window (parser:
//! `-1..=max_token_type`; lexer: `0..=127`); symbols outside the window are
//! always re-derived from the ATN, bounding memory under large or Unicode
//! vocabularies.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::actions::LexerActionExecutor;
use crate::config::{ConfigSet, SetFingerprint};
use crate::semantic::SemanticContext;
use crate::{DecisionId, StateId, INVALID_ALT};

/// Handle to a state within one decision's DFA.
pub type DfaStateId = u32;

/// Sentinel: no cached edge for this symbol (recompute from the ATN).
pub const NO_EDGE: DfaStateId = u32::MAX;

/// Sentinel: the edge is known to lead nowhere (cached failure).
pub const ERROR_DFA_STATE: DfaStateId = u32::MAX - 1;

/// Lexer DFA edge window bounds.
pub const MIN_LEXER_EDGE: i32 = 0;
pub const MAX_LEXER_EDGE: i32 = 127;

/// A (predicate, alternative) pair attached to a predicated accept state;
/// evaluated at accept time under SLL prediction.
#[derive(Debug, Clone)]
pub struct PredPrediction {
    pub pred: Arc<SemanticContext>,
    pub alt: u16,
}

/// One cached decision-automaton state.
#[derive(Debug, Clone)]
pub struct DfaState {
    /// The closure this state stands for. Frozen on installation.
    pub configs: ConfigSet,
    /// Sparse edge table over the decision's symbol window; allocated on
    /// first use.
    edges: Vec<DfaStateId>,
    pub is_accept: bool,
    /// Predicted alternative for non-predicated accept states.
    pub prediction: u16,
    /// SLL hit a conflict here; LL must decide.
    pub requires_full_context: bool,
    /// For predicated accept states: predicates to evaluate, in alternative
    /// order.
    pub predicates: Option<Vec<PredPrediction>>,
    /// Lexer accept states: the token type emitted on commit.
    pub token_type: i32,
    /// Lexer accept states: actions to replay on commit.
    pub executor: Option<Arc<LexerActionExecutor>>,
}

impl DfaState {
    pub fn new(configs: ConfigSet) -> Self {
        DfaState {
            configs,
            edges: Vec::new(),
            is_accept: false,
            prediction: INVALID_ALT,
            requires_full_context: false,
            predicates: None,
            token_type: 0,
            executor: None,
        }
    }
}

/// Snapshot of a decision automaton's size, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DfaStats {
    pub num_states: usize,
    pub num_accept_states: usize,
    /// Cached edges actually populated (excludes `NO_EDGE` slots).
    pub num_edges: usize,
}

/// The lazily built automaton of a single decision point.
#[derive(Debug, Clone)]
pub struct Dfa {
    pub decision: DecisionId,
    /// The ATN decision state this DFA caches closures of.
    pub atn_start_state: StateId,
    /// Left-recursive rule decisions key their start states by precedence
    /// level instead of a single `s0`.
    pub is_precedence_dfa: bool,
    states: Vec<DfaState>,
    intern: FxHashMap<SetFingerprint, DfaStateId>,
    pub s0: Option<DfaStateId>,
    precedence_start_states: Vec<DfaStateId>,
    min_symbol: i32,
    max_symbol: i32,
}

impl Dfa {
    /// Parser decision DFA; edge window `-1..=max_token_type` (EOF included).
    pub fn new_parser(
        decision: DecisionId,
        atn_start_state: StateId,
        max_token_type: i32,
        is_precedence_dfa: bool,
    ) -> Self {
        Dfa {
            decision,
            atn_start_state,
            is_precedence_dfa,
            states: Vec::new(),
            intern: FxHashMap::default(),
            s0: None,
            precedence_start_states: Vec::new(),
            min_symbol: -1,
            max_symbol: max_token_type,
        }
    }

    /// Lexer mode DFA; edge window `0..=127`.
    pub fn new_lexer(mode: usize, atn_start_state: StateId) -> Self {
        Dfa {
            decision: mode,
            atn_start_state,
            is_precedence_dfa: false,
            states: Vec::new(),
            intern: FxHashMap::default(),
            s0: None,
            precedence_start_states: Vec::new(),
            min_symbol: MIN_LEXER_EDGE,
            max_symbol: MAX_LEXER_EDGE,
        }
    }

    fn window(&self) -> usize {
        (self.max_symbol - self.min_symbol + 1) as usize
    }

    fn edge_index(&self, symbol: i32) -> Option<usize> {
        if symbol < self.min_symbol || symbol > self.max_symbol {
            return None;
        }
        Some((symbol - self.min_symbol) as usize)
    }

    /// Cached target for `symbol`, or [`NO_EDGE`].
    pub fn edge(&self, state: DfaStateId, symbol: i32) -> DfaStateId {
        let Some(idx) = self.edge_index(symbol) else {
            return NO_EDGE;
        };
        let edges = &self.states[state as usize].edges;
        if edges.is_empty() { NO_EDGE } else { edges[idx] }
    }

    /// Cache an edge. Symbols outside the window are silently not cached.
    pub fn set_edge(&mut self, state: DfaStateId, symbol: i32, target: DfaStateId) {
        let Some(idx) = self.edge_index(symbol) else {
            return;
        };
        let window = self.window();
        let edges = &mut self.states[state as usize].edges;
        if edges.is_empty() {
            edges.resize(window, NO_EDGE);
        }
        edges[idx] = target;
    }

    /// Intern a freshly computed state. Freezes its config set, then either
    /// returns the already-canonical state with the same set or links the
    /// new one in. The state is fully constructed before it becomes
    /// discoverable.
    pub fn add_state(&mut self, mut state: DfaState) -> DfaStateId {
        state.configs.freeze();
        let key = state.configs.fingerprint();
        if let Some(&existing) = self.intern.get(&key) {
            return existing;
        }
        let id = self.states.len() as DfaStateId;
        self.states.push(state);
        self.intern.insert(key, id);
        id
    }

    pub fn state(&self, id: DfaStateId) -> &DfaState {
        &self.states[id as usize]
    }

    pub fn state_mut(&mut self, id: DfaStateId) -> &mut DfaState {
        &mut self.states[id as usize]
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    /// Start state for a precedence level, when one has been computed.
    pub fn precedence_start_state(&self, precedence: i32) -> Option<DfaStateId> {
        assert!(self.is_precedence_dfa, "only precedence DFAs key start states by precedence");
        if precedence < 0 {
            return None;
        }
        match self.precedence_start_states.get(precedence as usize) {
            Some(&id) if id != NO_EDGE => Some(id),
            _ => None,
        }
    }

    pub fn set_precedence_start_state(&mut self, precedence: i32, start: DfaStateId) {
        assert!(self.is_precedence_dfa, "only precedence DFAs key start states by precedence");
        if precedence < 0 {
            return;
        }
        let idx = precedence as usize;
        if self.precedence_start_states.len() <= idx {
            self.precedence_start_states.resize(idx + 1, NO_EDGE);
        }
        self.precedence_start_states[idx] = start;
    }

    /// Whole-decision reset: drop every cached state and start state.
    pub fn clear(&mut self) {
        self.states.clear();
        self.intern.clear();
        self.s0 = None;
        self.precedence_start_states.clear();
    }

    pub fn stats(&self) -> DfaStats {
        DfaStats {
            num_states: self.states.len(),
            num_accept_states: self.states.iter().filter(|s| s.is_accept).count(),
            num_edges: self
                .states
                .iter()
                .flat_map(|s| s.edges.iter())
                .filter(|&&e| e != NO_EDGE)
                .count(),
        }
    }
}
