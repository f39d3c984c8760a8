//! Maximal-munch lexer matching over the ATN.
//!
//! One DFA per lexer mode. The simulator keeps extending the current match
//! past accept states, checkpointing the furthest accept seen (its input
//! index, line/column, token type, and recorded actions); when no transition
//! remains it rewinds to that checkpoint and commits. Ties between rules
//! that accept the same longest input go to the earliest-declared rule,
//! because configuration sets preserve insertion order and the first
//! rule-stop configuration wins.
//!
//! Actions and predicates make paths speculative: actions are recorded into
//! executors and replayed only on commit, and predicate evaluation
//! snapshots/restores the cursor and line/column so a rejected path leaves
//! no trace.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::actions::LexerActionExecutor;
use crate::atn::{Atn, Transition};
use crate::config::{AtnConfig, ConfigSet};
use crate::context::{ContextCache, EMPTY_CONTEXT, EMPTY_RETURN_STATE};
use crate::dfa::{Dfa, DfaState, DfaStateId, ERROR_DFA_STATE, NO_EDGE};
use crate::error::{PredictionResult, RecognitionError};
use crate::stream::CharStream;
use crate::{LexerHost, StateId, EOF};

/// Checkpoint of the furthest accept reached during one match.
#[derive(Debug, Clone, Copy, Default)]
struct SimState {
    index: Option<usize>,
    line: u32,
    column: u32,
    dfa_state: Option<DfaStateId>,
}

/// The maximal-munch matching engine for lexer modes.
pub struct LexerAtnSimulator<'a> {
    atn: &'a Atn,
    dfas: Vec<Dfa>,
    ctx_cache: ContextCache,
    /// First character of the match in progress.
    start_index: usize,
    /// Line/column of the cursor, maintained across tokens. 1-based line,
    /// 0-based column, newline advances the line.
    pub line: u32,
    pub column: u32,
    pub mode: usize,
}

impl<'a> LexerAtnSimulator<'a> {
    pub fn new(atn: &'a Atn) -> Self {
        let dfas = (0..atn.num_modes())
            .map(|m| Dfa::new_lexer(m, atn.mode_start_state(m)))
            .collect();
        LexerAtnSimulator {
            atn,
            dfas,
            ctx_cache: ContextCache::new(),
            start_index: 0,
            line: 1,
            column: 0,
            mode: 0,
        }
    }

    pub fn dfa(&self, mode: usize) -> &Dfa {
        &self.dfas[mode]
    }

    pub fn clear_dfa(&mut self, mode: usize) {
        self.dfas[mode].clear();
    }

    pub fn start_index(&self) -> usize {
        self.start_index
    }

    /// Match one token starting at the current cursor, in `mode`.
    ///
    /// On success the cursor is left after the last committed character and
    /// the matched token type is returned; recorded actions have been
    /// replayed against `host`. At end of input with nothing consumed,
    /// [`EOF`] is returned. On failure the cursor stays at the start of the
    /// failed match.
    pub fn match_token<S, H>(
        &mut self,
        input: &mut S,
        host: &mut H,
        mode: usize,
    ) -> PredictionResult<i32>
    where
        S: CharStream,
        H: LexerHost,
    {
        self.mode = mode;
        let mark = input.mark();
        self.start_index = input.index();
        trace!(mode, start = self.start_index, "match_token");
        let result = match self.dfas[mode].s0 {
            Some(s0) => self.exec_atn(input, host, s0),
            None => self.match_atn(input, host),
        };
        input.release(mark);
        result
    }

    /// First match in this mode (or a predicated start): build the start
    /// closure from the mode's entry state.
    fn match_atn<S, H>(&mut self, input: &mut S, host: &mut H) -> PredictionResult<i32>
    where
        S: CharStream,
        H: LexerHost,
    {
        let start_state = self.atn.mode_start_state(self.mode);
        let mut s0_closure = self.compute_start_state(input, host, start_state);

        // A predicated start closure depends on host state, so it must not
        // be pinned as the mode's permanent start state.
        let suppress_s0 = s0_closure.has_semantic_context;
        s0_closure.has_semantic_context = false;
        let next = self.add_dfa_state(s0_closure);
        if !suppress_s0 {
            self.dfas[self.mode].s0 = Some(next);
        }

        self.exec_atn(input, host, next)
    }

    fn exec_atn<S, H>(
        &mut self,
        input: &mut S,
        host: &mut H,
        ds0: DfaStateId,
    ) -> PredictionResult<i32>
    where
        S: CharStream,
        H: LexerHost,
    {
        let mut prev_accept = SimState::default();
        if self.dfas[self.mode].state(ds0).is_accept {
            // Zero-length tokens checkpoint immediately.
            self.capture(&mut prev_accept, input, ds0);
        }

        let mut t = input.la(1);
        let mut s = ds0;
        loop {
            let target = match self.existing_target(s, t) {
                Some(target) => target,
                None => self.compute_target_state(input, host, s, t),
            };
            if target == ERROR_DFA_STATE {
                break;
            }

            // Consume before checkpointing so the accept records the
            // position after the matched character.
            if t != EOF {
                self.consume(input);
            }
            if self.dfas[self.mode].state(target).is_accept {
                self.capture(&mut prev_accept, input, target);
                if t == EOF {
                    break;
                }
            }

            t = input.la(1);
            s = target;
        }

        self.fail_or_accept(prev_accept, input, host, s, t)
    }

    fn existing_target(&self, s: DfaStateId, t: i32) -> Option<DfaStateId> {
        let edge = self.dfas[self.mode].edge(s, t);
        if edge == NO_EDGE { None } else { Some(edge) }
    }

    fn compute_target_state<S, H>(
        &mut self,
        input: &mut S,
        host: &mut H,
        s: DfaStateId,
        t: i32,
    ) -> DfaStateId
    where
        S: CharStream,
        H: LexerHost,
    {
        let closure_set = self.dfas[self.mode].state(s).configs.clone();
        let mut reach = ConfigSet::new_ordered();
        self.reachable_config_set(input, host, &closure_set, &mut reach, t);

        if reach.is_empty() {
            // Predicated dead ends depend on host state; never cache those.
            if !reach.has_semantic_context {
                self.dfas[self.mode].set_edge(s, t, ERROR_DFA_STATE);
            }
            return ERROR_DFA_STATE;
        }

        self.add_dfa_edge(s, t, reach)
    }

    /// All configurations reachable by consuming `t`, epsilon-closed.
    ///
    /// Greedy configurations keep extending past an accept (maximal munch).
    /// Once an alternative has reached an accept state, its configurations
    /// that passed through a non-greedy decision stop extending instead.
    fn reachable_config_set<S, H>(
        &mut self,
        input: &mut S,
        host: &mut H,
        closure_set: &ConfigSet,
        reach: &mut ConfigSet,
        t: i32,
    ) where
        S: CharStream,
        H: LexerHost,
    {
        let atn = self.atn;
        let mut skip_alt = crate::INVALID_ALT;
        for c in closure_set.iter() {
            let current_alt_reached_accept = c.alt == skip_alt;
            if current_alt_reached_accept && c.passed_through_non_greedy {
                continue;
            }
            for trans in &atn.state(c.state).transitions {
                if !trans.matches(t, 0, char::MAX as i32) {
                    continue;
                }
                let executor = c
                    .executor
                    .as_ref()
                    .map(|e| e.fix_offset_before_match(input.index() - self.start_index));
                let mut cfg = self.lexer_transport(c, trans.target());
                cfg.executor = executor;
                let treat_eof_as_epsilon = t == EOF;
                if self.closure(
                    input,
                    host,
                    cfg,
                    reach,
                    current_alt_reached_accept,
                    true,
                    treat_eof_as_epsilon,
                ) {
                    // An accept for this alt: drop its remaining
                    // lower-priority configurations.
                    skip_alt = c.alt;
                    break;
                }
            }
        }
    }

    fn fail_or_accept<S, H>(
        &mut self,
        prev_accept: SimState,
        input: &mut S,
        host: &mut H,
        dead_end: DfaStateId,
        t: i32,
    ) -> PredictionResult<i32>
    where
        S: CharStream,
        H: LexerHost,
    {
        if let (Some(index), Some(dfa_state)) = (prev_accept.index, prev_accept.dfa_state) {
            let executor = self.dfas[self.mode].state(dfa_state).executor.clone();
            let token_type = self.dfas[self.mode].state(dfa_state).token_type;
            self.accept(input, host, executor, index, prev_accept.line, prev_accept.column);
            debug!(token_type, start = self.start_index, stop = index, "token committed");
            return Ok(token_type);
        }

        if t == EOF && input.index() == self.start_index {
            return Ok(EOF);
        }
        input.seek(self.start_index);
        Err(RecognitionError::LexerNoViableAlt {
            start_index: self.start_index,
            dead_end_configs: self.dfas[self.mode].state(dead_end).configs.clone(),
        })
    }

    /// Commit to a checkpoint: rewind to it, restore line/column, and replay
    /// the recorded actions.
    fn accept<S, H>(
        &mut self,
        input: &mut S,
        host: &mut H,
        executor: Option<Arc<LexerActionExecutor>>,
        index: usize,
        line: u32,
        column: u32,
    ) where
        S: CharStream,
        H: LexerHost,
    {
        input.seek(index);
        self.line = line;
        self.column = column;
        if let Some(executor) = executor {
            executor.execute(host, input, self.start_index);
        }
    }

    fn compute_start_state<S, H>(
        &mut self,
        input: &mut S,
        host: &mut H,
        p: StateId,
    ) -> ConfigSet
    where
        S: CharStream,
        H: LexerHost,
    {
        let atn = self.atn;
        let mut configs = ConfigSet::new_ordered();
        let targets: Vec<StateId> =
            atn.state(p).transitions.iter().map(Transition::target).collect();
        for (i, target) in targets.into_iter().enumerate() {
            let mut c = AtnConfig::new(target, (i + 1) as u16, EMPTY_CONTEXT);
            c.passed_through_non_greedy = atn.state(target).non_greedy;
            self.closure(input, host, c, &mut configs, false, false, false);
        }
        configs
    }

    /// Epsilon closure. Returns true when an accept state was reached for
    /// `config`'s alternative.
    ///
    /// A rule-stop configuration with an empty context path is a token
    /// accept (the whole rule matched from the mode entry); frames popped
    /// from a non-empty context return into the invoking rule instead.
    #[allow(clippy::too_many_arguments)]
    fn closure<S, H>(
        &mut self,
        input: &mut S,
        host: &mut H,
        config: AtnConfig,
        configs: &mut ConfigSet,
        mut current_alt_reached_accept: bool,
        speculative: bool,
        treat_eof_as_epsilon: bool,
    ) -> bool
    where
        S: CharStream,
        H: LexerHost,
    {
        let atn = self.atn;
        if atn.state(config.state).is_rule_stop() {
            if config.context == EMPTY_CONTEXT {
                configs.add(config, &mut self.ctx_cache);
                return true;
            }
            if self.ctx_cache.has_empty_path(config.context) {
                let c = config.transport_with_context(config.state, EMPTY_CONTEXT);
                configs.add(c, &mut self.ctx_cache);
                current_alt_reached_accept = true;
            }
            for i in 0..self.ctx_cache.len(config.context) {
                let return_state = self.ctx_cache.return_state(config.context, i);
                if return_state == EMPTY_RETURN_STATE {
                    continue;
                }
                let parent = self.ctx_cache.parent(config.context, i);
                let c = config.transport_with_context(return_state, parent);
                current_alt_reached_accept = self.closure(
                    input, host, c, configs, current_alt_reached_accept, speculative,
                    treat_eof_as_epsilon,
                );
            }
            return current_alt_reached_accept;
        }

        if !atn.state(config.state).epsilon_only()
            && (!current_alt_reached_accept || !config.passed_through_non_greedy)
        {
            configs.add(config.clone(), &mut self.ctx_cache);
        }

        let num_transitions = atn.state(config.state).transitions.len();
        for i in 0..num_transitions {
            let trans = atn.state(config.state).transitions[i].clone();
            if let Some(c) = self.epsilon_target(
                input, host, &config, &trans, configs, speculative, treat_eof_as_epsilon,
            ) {
                current_alt_reached_accept = self.closure(
                    input, host, c, configs, current_alt_reached_accept, speculative,
                    treat_eof_as_epsilon,
                );
            }
        }
        current_alt_reached_accept
    }

    #[allow(clippy::too_many_arguments)]
    fn epsilon_target<S, H>(
        &mut self,
        input: &mut S,
        host: &mut H,
        config: &AtnConfig,
        trans: &Transition,
        configs: &mut ConfigSet,
        speculative: bool,
        treat_eof_as_epsilon: bool,
    ) -> Option<AtnConfig>
    where
        S: CharStream,
        H: LexerHost,
    {
        match trans {
            Transition::Rule { target, follow, .. } => {
                let new_ctx = self.ctx_cache.singleton(config.context, *follow);
                let mut c = self.lexer_transport(config, *target);
                c.context = new_ctx;
                Some(c)
            }
            Transition::Precedence { .. } => {
                unreachable!("precedence transitions cannot appear in lexer ATNs")
            }
            Transition::Predicate { target, rule, pred_index, .. } => {
                // The predicate outcome shapes this config set, so the set
                // must never be pinned as a reusable DFA start/edge.
                configs.has_semantic_context = true;
                if self.evaluate_predicate(input, host, *rule, *pred_index, speculative) {
                    Some(self.lexer_transport(config, *target))
                } else {
                    None
                }
            }
            Transition::Action { target, action_index, .. } => {
                if self.ctx_cache.has_empty_path(config.context) {
                    // Record, never execute: the match may be abandoned.
                    let action = self.atn.lexer_actions[*action_index as usize].clone();
                    let executor = LexerActionExecutor::append(config.executor.as_ref(), action);
                    let mut c = self.lexer_transport(config, *target);
                    c.executor = Some(executor);
                    Some(c)
                } else {
                    // Actions in referenced rules fire when the rule is
                    // lexed on its own, not as a fragment of this token.
                    Some(self.lexer_transport(config, *target))
                }
            }
            Transition::Epsilon { target, .. } => Some(self.lexer_transport(config, *target)),
            Transition::Atom { .. }
            | Transition::Range { .. }
            | Transition::Set { .. }
            | Transition::NotSet { .. }
            | Transition::Wildcard { .. } => {
                if treat_eof_as_epsilon && trans.matches(EOF, 0, 1) {
                    Some(self.lexer_transport(config, trans.target()))
                } else {
                    None
                }
            }
        }
    }

    /// Evaluate a lexer predicate. During speculative matching the cursor
    /// sits one character shy of where the predicate expects it; consume,
    /// evaluate, then roll cursor and line/column back exactly.
    fn evaluate_predicate<S, H>(
        &mut self,
        input: &mut S,
        host: &mut H,
        rule: crate::RuleId,
        pred_index: u32,
        speculative: bool,
    ) -> bool
    where
        S: CharStream,
        H: LexerHost,
    {
        if !speculative {
            return host.sempred(rule, pred_index);
        }

        let saved_column = self.column;
        let saved_line = self.line;
        let index = input.index();
        let marker = input.mark();
        self.consume(input);
        let result = host.sempred(rule, pred_index);
        self.column = saved_column;
        self.line = saved_line;
        input.seek(index);
        input.release(marker);
        result
    }

    /// Transport a configuration, propagating the non-greedy taint when the
    /// target is a non-greedy decision.
    fn lexer_transport(&self, config: &AtnConfig, target: StateId) -> AtnConfig {
        let mut c = config.transport(target);
        c.passed_through_non_greedy =
            config.passed_through_non_greedy || self.atn.state(target).non_greedy;
        c
    }

    fn add_dfa_edge(&mut self, from: DfaStateId, t: i32, mut configs: ConfigSet) -> DfaStateId {
        // Predicated targets are position-specific; install the state but
        // leave the edge uncached so the predicate re-runs next time.
        let suppress_edge = configs.has_semantic_context;
        configs.has_semantic_context = false;
        let to = self.add_dfa_state(configs);
        if !suppress_edge {
            self.dfas[self.mode].set_edge(from, t, to);
        }
        to
    }

    /// Intern a config set as a DFA state of the current mode. The first
    /// rule-stop configuration (insertion order = rule declaration order)
    /// decides the token type and the actions to replay.
    fn add_dfa_state(&mut self, configs: ConfigSet) -> DfaStateId {
        let atn = self.atn;
        let mut state = DfaState::new(configs);
        if let Some(first_stop) =
            state.configs.iter().find(|c| atn.state(c.state).is_rule_stop())
        {
            state.is_accept = true;
            state.executor = first_stop.executor.clone();
            state.token_type = atn.rule_token_type(atn.state(first_stop.state).rule);
        }
        self.dfas[self.mode].add_state(state)
    }

    fn capture<S: CharStream>(&self, checkpoint: &mut SimState, input: &mut S, s: DfaStateId) {
        checkpoint.index = Some(input.index());
        checkpoint.line = self.line;
        checkpoint.column = self.column;
        checkpoint.dfa_state = Some(s);
    }

    /// Advance the cursor, tracking line and column.
    pub fn consume<S: CharStream>(&mut self, input: &mut S) {
        let c = input.la(1);
        if c == '\n' as i32 {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        input.consume();
    }
}
