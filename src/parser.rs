//! Adaptive LL(*) parser prediction.
//!
//! One DFA per decision. `adaptive_predict` walks the cached DFA for the
//! decision, lazily computing missing states by closing ATN configurations
//! over the current lookahead symbol. Prediction starts in SLL mode with an
//! empty (wildcard) context; if the SLL closure ends in a genuine conflict,
//! the engine retries with the parser's true call stack (full-context LL),
//! which is exact. Predicates encountered under SLL are collected and
//! deferred to accept time; under full context they are evaluated
//! immediately so the configuration sets shrink as early as possible.
//!
//! Ties always break to the lowest-numbered alternative, matching
//! declaration order.

use rustc_hash::FxHashSet;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::atn::{Atn, StateKind, Transition};
use crate::config::{AltSet, AtnConfig, ConfigSet};
use crate::context::{ContextCache, ContextId, EMPTY_CONTEXT};
use crate::dfa::{Dfa, DfaState, DfaStateId, PredPrediction, ERROR_DFA_STATE, NO_EDGE};
use crate::error::{PredictionResult, RecognitionError};
use crate::prediction_mode::{
    all_subsets_conflict, all_subsets_equal, get_alts, get_conflicting_alt_subsets,
    get_single_viable_alt, has_config_in_rule_stop_state,
    has_sll_conflict_terminating_prediction, PredictionMode,
};
use crate::semantic::SemanticContext;
use crate::stream::TokenStream;
use crate::{
    DecisionId, PredictionListener, Recognizer, RuleCallStack, StateId, EOF, INVALID_ALT,
};

/// The adaptive prediction engine for parser decisions.
///
/// Owns the per-decision DFAs and the shared prediction-context cache. Both
/// grow monotonically; [`clear_dfa`](Self::clear_dfa) resets one decision
/// wholesale. Because every cached entry is canonicalized by structure,
/// repeated (or interleaved) predictions over the same cache always converge
/// to the same states and the same answers.
pub struct ParserAtnSimulator<'a> {
    atn: &'a Atn,
    pub mode: PredictionMode,
    dfas: Vec<Dfa>,
    ctx_cache: ContextCache,
    /// Input index where the current prediction began.
    start_index: usize,
}

impl<'a> ParserAtnSimulator<'a> {
    pub fn new(atn: &'a Atn) -> Self {
        let dfas = (0..atn.num_decisions())
            .map(|d| {
                let start = atn.decision_state(d);
                let is_precedence = matches!(
                    atn.state(start).kind,
                    StateKind::StarLoopEntry { precedence_decision: true, .. }
                );
                Dfa::new_parser(d, start, atn.max_token_type, is_precedence)
            })
            .collect();
        ParserAtnSimulator {
            atn,
            mode: PredictionMode::default(),
            dfas,
            ctx_cache: ContextCache::new(),
            start_index: 0,
        }
    }

    pub fn dfa(&self, decision: DecisionId) -> &Dfa {
        &self.dfas[decision]
    }

    pub fn context_cache(&self) -> &ContextCache {
        &self.ctx_cache
    }

    /// Drop every cached state of one decision's automaton.
    pub fn clear_dfa(&mut self, decision: DecisionId) {
        self.dfas[decision].clear();
    }

    /// Predict which alternative of `decision` matches the upcoming input.
    ///
    /// The input cursor is restored to its entry position before returning,
    /// successful or not; every mark taken is released.
    pub fn adaptive_predict<S, R, L>(
        &mut self,
        input: &mut S,
        recog: &mut R,
        listener: &mut L,
        decision: DecisionId,
        outer_context: Option<&Arc<RuleCallStack>>,
    ) -> PredictionResult<u16>
    where
        S: TokenStream,
        R: Recognizer,
        L: PredictionListener,
    {
        let mark = input.mark();
        let index = input.index();
        self.start_index = index;
        trace!(decision, index, "adaptive_predict");
        let result = self.predict_body(input, recog, listener, decision, outer_context);
        input.seek(index);
        input.release(mark);
        result
    }

    fn predict_body<S, R, L>(
        &mut self,
        input: &mut S,
        recog: &mut R,
        listener: &mut L,
        decision: DecisionId,
        outer_context: Option<&Arc<RuleCallStack>>,
    ) -> PredictionResult<u16>
    where
        S: TokenStream,
        R: Recognizer,
        L: PredictionListener,
    {
        let is_precedence = self.dfas[decision].is_precedence_dfa;
        let existing_start = if is_precedence {
            self.dfas[decision].precedence_start_state(recog.current_precedence())
        } else {
            self.dfas[decision].s0
        };

        let s0 = match existing_start {
            Some(s0) => s0,
            None => {
                // SLL start state: close over the decision's alternatives
                // with the wildcard context.
                let atn_start = self.dfas[decision].atn_start_state;
                let s0_closure =
                    self.compute_start_state(input, recog, decision, atn_start, EMPTY_CONTEXT, false);
                if is_precedence {
                    let filtered = self.apply_precedence_filter(recog, &s0_closure);
                    let id = self.dfas[decision].add_state(DfaState::new(filtered));
                    self.dfas[decision]
                        .set_precedence_start_state(recog.current_precedence(), id);
                    debug!(decision, precedence = recog.current_precedence(), "built precedence start state");
                    id
                } else {
                    let id = self.dfas[decision].add_state(DfaState::new(s0_closure));
                    self.dfas[decision].s0 = Some(id);
                    id
                }
            }
        };

        self.exec_atn(input, recog, listener, decision, s0, outer_context)
    }

    /// Step the cached DFA, lazily extending it, until the decision is
    /// resolved or fails.
    fn exec_atn<S, R, L>(
        &mut self,
        input: &mut S,
        recog: &mut R,
        listener: &mut L,
        decision: DecisionId,
        s0: DfaStateId,
        outer_context: Option<&Arc<RuleCallStack>>,
    ) -> PredictionResult<u16>
    where
        S: TokenStream,
        R: Recognizer,
        L: PredictionListener,
    {
        let mut previous = s0;
        let mut t = input.la(1);
        loop {
            let d = match self.existing_target(decision, previous, t) {
                Some(d) => d,
                None => self.compute_target_state(input, recog, decision, previous, t),
            };

            if d == ERROR_DFA_STATE {
                // No configuration explains `t`. Before reporting, see
                // whether some alternative already ran the decision's rule
                // to completion on the preceding input: the error-recovery
                // collaborator is better off with that alternative and a
                // mismatch at `t` than with a failure here.
                let e = self.no_viable_alt(input, decision, previous);
                input.seek(self.start_index);
                let configs = self.dfas[decision].state(previous).configs.clone();
                let alt = self.syn_valid_or_sem_invalid_alt(recog, &configs);
                if alt != INVALID_ALT {
                    return Ok(alt);
                }
                return Err(e);
            }

            let requires_full_context = self.dfas[decision].state(d).requires_full_context;
            if requires_full_context && self.mode != PredictionMode::Sll {
                // SLL conflict: if predicates already disambiguate, take
                // that answer; otherwise rerun with the true call stack.
                let mut conflicting_alts = self.dfas[decision]
                    .state(d)
                    .configs
                    .conflicting_alts
                    .clone()
                    .unwrap_or_default();
                if let Some(preds) = self.dfas[decision].state(d).predicates.clone() {
                    let conflict_index = input.index();
                    if conflict_index != self.start_index {
                        input.seek(self.start_index);
                    }
                    let evaluated = self.eval_predicate_predictions(recog, &preds, true);
                    if evaluated.count() == 1 {
                        return Ok(evaluated.min().expect("count is 1"));
                    }
                    if conflict_index != self.start_index {
                        input.seek(conflict_index);
                    }
                    conflicting_alts = evaluated;
                }

                debug!(decision, start = self.start_index, "SLL conflict; attempting full context");
                listener.report_attempting_full_context(
                    decision,
                    self.start_index,
                    input.index(),
                    &conflicting_alts,
                );
                let atn_start = self.dfas[decision].atn_start_state;
                let init_ctx = self.ctx_cache.from_rule_call_stack(self.atn, outer_context);
                let s0_closure =
                    self.compute_start_state(input, recog, decision, atn_start, init_ctx, true);
                return self.exec_atn_with_full_context(
                    input, recog, listener, decision, s0_closure,
                );
            }

            let is_accept = self.dfas[decision].state(d).is_accept;
            if is_accept {
                let Some(preds) = self.dfas[decision].state(d).predicates.clone() else {
                    return Ok(self.dfas[decision].state(d).prediction);
                };
                // Predicated accept: rewind so predicates see the input as
                // it stood when the decision began, then resolve to the
                // minimum satisfied alternative.
                let stop_index = input.index();
                input.seek(self.start_index);
                let alts = self.eval_predicate_predictions(recog, &preds, true);
                match alts.count() {
                    0 => return Err(self.no_viable_alt(input, decision, d)),
                    1 => return Ok(alts.min().expect("count is 1")),
                    _ => {
                        listener.report_ambiguity(
                            decision,
                            self.start_index,
                            stop_index,
                            false,
                            &alts,
                        );
                        return Ok(alts.min().expect("count > 1"));
                    }
                }
            }

            previous = d;
            if t != EOF {
                input.consume();
                t = input.la(1);
            }
        }
    }

    fn existing_target(&self, decision: DecisionId, state: DfaStateId, t: i32) -> Option<DfaStateId> {
        let edge = self.dfas[decision].edge(state, t);
        if edge == NO_EDGE { None } else { Some(edge) }
    }

    /// Compute (and cache) the DFA transition from `previous` on `t`.
    fn compute_target_state<S, R>(
        &mut self,
        input: &mut S,
        recog: &mut R,
        decision: DecisionId,
        previous: DfaStateId,
        t: i32,
    ) -> DfaStateId
    where
        S: TokenStream,
        R: Recognizer,
    {
        let closure_set = self.dfas[decision].state(previous).configs.clone();
        let Some(reach) = self.compute_reach_set(input, recog, decision, &closure_set, t, false)
        else {
            self.dfas[decision].set_edge(previous, t, ERROR_DFA_STATE);
            return ERROR_DFA_STATE;
        };

        let predicted_alt = reach.compute_unique_alt();
        let mut d = DfaState::new(reach);
        if predicted_alt != INVALID_ALT {
            d.configs.unique_alt = predicted_alt;
            d.is_accept = true;
            d.prediction = predicted_alt;
        } else if has_sll_conflict_terminating_prediction(
            self.mode,
            &d.configs,
            self.atn,
            &mut self.ctx_cache,
        ) {
            let conflicting = get_alts(&get_conflicting_alt_subsets(&d.configs));
            d.prediction = conflicting.min().expect("conflicting set is non-empty");
            d.configs.conflicting_alts = Some(conflicting);
            d.requires_full_context = true;
            d.is_accept = true;
        }

        if d.is_accept && d.configs.has_semantic_context {
            let decision_state = self.dfas[decision].atn_start_state;
            let nalts = self.atn.state(decision_state).transitions.len();
            self.predicate_dfa_state(&mut d, nalts);
            if d.predicates.is_some() {
                d.prediction = INVALID_ALT;
            }
        }

        let id = self.dfas[decision].add_state(d);
        self.dfas[decision].set_edge(previous, t, id);
        id
    }

    /// Attach accept-time predicates to a conflicted or predicated accept
    /// state.
    fn predicate_dfa_state(&mut self, d: &mut DfaState, nalts: usize) {
        let alts_to_collect = if d.configs.unique_alt != INVALID_ALT {
            [d.configs.unique_alt].into_iter().collect()
        } else {
            d.configs.conflicting_alts.clone().unwrap_or_else(|| d.configs.alts())
        };
        if let Some(alt_to_pred) = Self::preds_for_ambig_alts(&alts_to_collect, &d.configs, nalts) {
            d.predicates = Self::predicate_predictions(&alts_to_collect, &alt_to_pred);
            if d.predicates.is_some() {
                d.prediction = INVALID_ALT;
            } else {
                d.prediction = alts_to_collect.min().unwrap_or(INVALID_ALT);
            }
        } else {
            d.prediction = alts_to_collect.min().unwrap_or(INVALID_ALT);
        }
    }

    /// Per-alternative disjunction of collected predicates, or `None` when
    /// no ambiguous alternative carries a real predicate.
    fn preds_for_ambig_alts(
        ambig_alts: &AltSet,
        configs: &ConfigSet,
        nalts: usize,
    ) -> Option<Vec<Arc<SemanticContext>>> {
        let mut alt_to_pred: Vec<Option<Arc<SemanticContext>>> = vec![None; nalts + 1];
        for c in configs.iter() {
            if ambig_alts.contains(c.alt) {
                let slot = &mut alt_to_pred[c.alt as usize];
                *slot = Some(match slot.take() {
                    None => c.semantic_context.clone(),
                    Some(prev) => SemanticContext::or(&prev, &c.semantic_context),
                });
            }
        }
        let mut n_pred_alts = 0;
        let resolved: Vec<Arc<SemanticContext>> = alt_to_pred
            .into_iter()
            .map(|p| match p {
                None => SemanticContext::none(),
                Some(p) => {
                    if !p.is_none() {
                        n_pred_alts += 1;
                    }
                    p
                }
            })
            .collect();
        if n_pred_alts == 0 { None } else { Some(resolved) }
    }

    /// Pair each ambiguous alternative with its predicate, in alternative
    /// order; `None` when every pair would be vacuous.
    fn predicate_predictions(
        ambig_alts: &AltSet,
        alt_to_pred: &[Arc<SemanticContext>],
    ) -> Option<Vec<PredPrediction>> {
        let mut pairs = Vec::new();
        let mut contains_predicate = false;
        for (alt, pred) in alt_to_pred.iter().enumerate().skip(1) {
            if ambig_alts.contains(alt as u16) {
                pairs.push(PredPrediction { pred: pred.clone(), alt: alt as u16 });
            }
            if !pred.is_none() {
                contains_predicate = true;
            }
        }
        if contains_predicate { Some(pairs) } else { None }
    }

    /// Evaluate accept-time predicate pairs; the result is the set of
    /// alternatives whose predicates hold. `complete` keeps evaluating past
    /// the first success so ambiguity can be reported.
    fn eval_predicate_predictions<R: Recognizer>(
        &mut self,
        recog: &mut R,
        preds: &[PredPrediction],
        complete: bool,
    ) -> AltSet {
        let mut predictions = AltSet::new();
        for pair in preds {
            if pair.pred.is_none() {
                predictions.insert(pair.alt);
                if !complete {
                    break;
                }
                continue;
            }
            if pair.pred.eval(recog) {
                trace!(alt = pair.alt, "predicate satisfied");
                predictions.insert(pair.alt);
                if !complete {
                    break;
                }
            }
        }
        predictions
    }

    /// Full-context prediction: step closure-to-closure over exact call
    /// stacks until a unique alternative emerges or a conflict is
    /// confirmed. Exact-ambiguity mode keeps consuming until the competing
    /// subsets are provably identical instead of terminating early.
    fn exec_atn_with_full_context<S, R, L>(
        &mut self,
        input: &mut S,
        recog: &mut R,
        listener: &mut L,
        decision: DecisionId,
        s0: ConfigSet,
    ) -> PredictionResult<u16>
    where
        S: TokenStream,
        R: Recognizer,
        L: PredictionListener,
    {
        let mut previous = s0;
        let mut found_exact_ambig = false;
        input.seek(self.start_index);
        let mut t = input.la(1);
        let (predicted_alt, reach) = loop {
            let Some(mut reach) =
                self.compute_reach_set(input, recog, decision, &previous, t, true)
            else {
                // Even full context cannot explain `t`: report against the
                // last live set, preferring an alternative that already
                // completed the decision rule.
                let e = RecognitionError::NoViableAlt {
                    decision,
                    start_index: self.start_index,
                    offending_index: input.index(),
                    dead_end_configs: previous.clone(),
                };
                input.seek(self.start_index);
                let alt = self.syn_valid_or_sem_invalid_alt(recog, &previous);
                if alt != INVALID_ALT {
                    return Ok(alt);
                }
                return Err(e);
            };

            let alt_sub_sets = get_conflicting_alt_subsets(&reach);
            reach.unique_alt = reach.compute_unique_alt();
            if reach.unique_alt != INVALID_ALT {
                break (reach.unique_alt, reach);
            }
            if self.mode != PredictionMode::LlExactAmbigDetection {
                let alt = get_single_viable_alt(&alt_sub_sets);
                if alt != INVALID_ALT {
                    break (alt, reach);
                }
            } else if all_subsets_conflict(&alt_sub_sets) && all_subsets_equal(&alt_sub_sets) {
                found_exact_ambig = true;
                let alt = get_alts(&alt_sub_sets).min().expect("conflicting subsets are non-empty");
                break (alt, reach);
            }

            previous = reach;
            if t != EOF {
                input.consume();
                t = input.la(1);
            }
        };

        if reach.unique_alt != INVALID_ALT {
            debug!(decision, predicted_alt, "context sensitivity resolved");
            listener.report_context_sensitivity(
                decision,
                self.start_index,
                input.index(),
                predicted_alt,
            );
            return Ok(predicted_alt);
        }

        debug!(decision, predicted_alt, exact = found_exact_ambig, "ambiguity resolved to minimum alt");
        listener.report_ambiguity(
            decision,
            self.start_index,
            input.index(),
            found_exact_ambig,
            &reach.alts(),
        );
        Ok(predicted_alt)
    }

    /// Apply each symbol-consuming transition matching `t`, then epsilon-
    /// close the results. Returns `None` when nothing survives.
    fn compute_reach_set<S, R>(
        &mut self,
        input: &mut S,
        recog: &mut R,
        decision: DecisionId,
        closure_set: &ConfigSet,
        t: i32,
        full_ctx: bool,
    ) -> Option<ConfigSet>
    where
        S: TokenStream,
        R: Recognizer,
    {
        let atn = self.atn;
        let mut intermediate = ConfigSet::new(full_ctx);

        // Rule-stop configs cannot consume; they only matter once the rest
        // of the input must be explained (full context) or at EOF.
        let mut skipped_stop_states: Vec<AtnConfig> = Vec::new();

        for c in closure_set.iter() {
            if atn.state(c.state).is_rule_stop() {
                if full_ctx || t == EOF {
                    skipped_stop_states.push(c.clone());
                }
                continue;
            }
            for trans in &atn.state(c.state).transitions {
                if trans.matches(t, 0, atn.max_token_type) {
                    intermediate.add(c.transport(trans.target()), &mut self.ctx_cache);
                }
            }
        }

        // A singleton intermediate set, or one already unique in its
        // alternative before EOF, resolves the decision by itself; skip the
        // closure. Rule-stop configs set aside above still need closure's
        // context handling, so the shortcut only fires without them.
        let mut reach_is_intermediate = false;
        let mut reach = if skipped_stop_states.is_empty()
            && (intermediate.len() == 1
                || (t != EOF && intermediate.compute_unique_alt() != INVALID_ALT))
        {
            reach_is_intermediate = true;
            intermediate.clone()
        } else {
            let mut closed = ConfigSet::new(full_ctx);
            let mut busy: FxHashSet<AtnConfig> = FxHashSet::default();
            let treat_eof_as_epsilon = t == EOF;
            for c in intermediate.iter() {
                self.closure(
                    input,
                    recog,
                    decision,
                    c.clone(),
                    &mut closed,
                    &mut busy,
                    false,
                    full_ctx,
                    0,
                    treat_eof_as_epsilon,
                );
            }
            closed
        };

        if t == EOF {
            // After EOF only configurations that ran their rule to
            // completion can explain the input.
            reach = self.keep_rule_stop_configs(reach, reach_is_intermediate);
        }

        if !skipped_stop_states.is_empty()
            && (!full_ctx || !has_config_in_rule_stop_state(atn, &reach))
        {
            for c in skipped_stop_states {
                reach.add(c, &mut self.ctx_cache);
            }
        }

        if reach.is_empty() { None } else { Some(reach) }
    }

    /// Project a set down to its rule-stop configurations. With
    /// `look_to_end_of_rule` (set when the closure was skipped), a config
    /// whose state still reaches the rule stop through epsilon edges counts
    /// as finished and is promoted to the stop state.
    fn keep_rule_stop_configs(&mut self, configs: ConfigSet, look_to_end_of_rule: bool) -> ConfigSet {
        let atn = self.atn;
        if crate::prediction_mode::all_configs_in_rule_stop_states(atn, &configs) {
            return configs;
        }
        let mut result = ConfigSet::new(configs.full_ctx);
        for c in configs.iter() {
            if atn.state(c.state).is_rule_stop() {
                result.add(c.clone(), &mut self.ctx_cache);
                continue;
            }
            if look_to_end_of_rule && atn.state(c.state).epsilon_only()
                && atn.epsilon_reaches_rule_stop(c.state)
            {
                let stop = atn.rule_stop_state(atn.state(c.state).rule);
                result.add(c.transport(stop), &mut self.ctx_cache);
            }
        }
        result
    }

    /// Closure over one alternative of the decision state for every
    /// outgoing transition, with `initial_ctx` as the call-stack
    /// approximation (wildcard for SLL, the exact stack for full context).
    fn compute_start_state<S, R>(
        &mut self,
        input: &mut S,
        recog: &mut R,
        decision: DecisionId,
        p: StateId,
        initial_ctx: ContextId,
        full_ctx: bool,
    ) -> ConfigSet
    where
        S: TokenStream,
        R: Recognizer,
    {
        let atn = self.atn;
        let mut configs = ConfigSet::new(full_ctx);
        let mut busy: FxHashSet<AtnConfig> = FxHashSet::default();
        let targets: Vec<StateId> =
            atn.state(p).transitions.iter().map(Transition::target).collect();
        for (i, target) in targets.into_iter().enumerate() {
            let c = AtnConfig::new(target, (i + 1) as u16, initial_ctx);
            self.closure(input, recog, decision, c, &mut configs, &mut busy, true, full_ctx, 0, false);
        }
        configs
    }

    /// Precedence-climbing filter for a left-recursive rule's start set: an
    /// alternative-1 configuration stands for "parse the primary/higher
    /// precedence form"; any other alternative whose (state, context) is
    /// already covered by alternative 1 is unreachable at this precedence
    /// and is discarded. Configurations that returned from the outermost
    /// recursion are explicitly exempt.
    fn apply_precedence_filter<R: Recognizer>(
        &mut self,
        recog: &mut R,
        configs: &ConfigSet,
    ) -> ConfigSet {
        let mut states_from_alt1: rustc_hash::FxHashMap<StateId, ContextId> =
            rustc_hash::FxHashMap::default();
        let mut result = ConfigSet::new(configs.full_ctx);

        for c in configs.iter() {
            if c.alt != 1 {
                continue;
            }
            let Some(updated_sem) = c.semantic_context.eval_precedence(recog) else {
                // Unsatisfiable at the current precedence level.
                continue;
            };
            states_from_alt1.insert(c.state, c.context);
            let mut kept = c.clone();
            if updated_sem != c.semantic_context {
                kept.semantic_context = updated_sem;
            }
            result.add(kept, &mut self.ctx_cache);
        }

        for c in configs.iter() {
            if c.alt == 1 {
                continue;
            }
            if !c.precedence_filter_suppressed()
                && states_from_alt1.get(&c.state) == Some(&c.context)
            {
                continue;
            }
            result.add(c.clone(), &mut self.ctx_cache);
        }

        result
    }

    /// Epsilon closure with rule push/pop across the prediction-context
    /// DAG. `depth` tracks rule nesting relative to the decision entry:
    /// once it goes negative the simulation has fallen off the end of the
    /// decision's rule into the outer context.
    #[allow(clippy::too_many_arguments)]
    fn closure<S, R>(
        &mut self,
        input: &mut S,
        recog: &mut R,
        decision: DecisionId,
        config: AtnConfig,
        configs: &mut ConfigSet,
        busy: &mut FxHashSet<AtnConfig>,
        collect_predicates: bool,
        full_ctx: bool,
        depth: i32,
        treat_eof_as_epsilon: bool,
    ) where
        S: TokenStream,
        R: Recognizer,
    {
        let atn = self.atn;
        if atn.state(config.state).is_rule_stop() {
            if !self.ctx_cache.is_empty_ctx(config.context) {
                // Pop every frame of the context DAG.
                for i in 0..self.ctx_cache.len(config.context) {
                    let return_state = self.ctx_cache.return_state(config.context, i);
                    if return_state == crate::context::EMPTY_RETURN_STATE {
                        if full_ctx {
                            let c = config.transport_with_context(config.state, EMPTY_CONTEXT);
                            configs.add(c, &mut self.ctx_cache);
                        } else {
                            // Approximate: chase the follow links of every
                            // possible caller.
                            self.closure_from_transitions(
                                input, recog, decision, config.clone(), configs, busy,
                                collect_predicates, full_ctx, depth, treat_eof_as_epsilon,
                            );
                        }
                        continue;
                    }
                    let parent = self.ctx_cache.parent(config.context, i);
                    let mut c = config.transport_with_context(return_state, parent);
                    c.set_outer_context_depth(config.outer_context_depth());
                    self.closure(
                        input, recog, decision, c, configs, busy, collect_predicates, full_ctx,
                        depth - 1, treat_eof_as_epsilon,
                    );
                }
                return;
            } else if full_ctx {
                // Reached the end of the start rule under exact context.
                configs.add(config, &mut self.ctx_cache);
                return;
            }
            // SLL with wildcard context: fall through and chase follow
            // links.
        }
        self.closure_from_transitions(
            input, recog, decision, config, configs, busy, collect_predicates, full_ctx, depth,
            treat_eof_as_epsilon,
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn closure_from_transitions<S, R>(
        &mut self,
        input: &mut S,
        recog: &mut R,
        decision: DecisionId,
        config: AtnConfig,
        configs: &mut ConfigSet,
        busy: &mut FxHashSet<AtnConfig>,
        collect_predicates: bool,
        full_ctx: bool,
        depth: i32,
        treat_eof_as_epsilon: bool,
    ) where
        S: TokenStream,
        R: Recognizer,
    {
        let atn = self.atn;
        let p = config.state;
        if !atn.state(p).epsilon_only() {
            configs.add(config.clone(), &mut self.ctx_cache);
        }

        let num_transitions = atn.state(p).transitions.len();
        for i in 0..num_transitions {
            let trans = atn.state(p).transitions[i].clone();
            let continue_collecting =
                collect_predicates && !matches!(trans, Transition::Action { .. });
            let c = self.epsilon_target(
                input,
                recog,
                &config,
                &trans,
                continue_collecting,
                depth == 0,
                full_ctx,
                treat_eof_as_epsilon,
            );
            let Some(mut c) = c else { continue };

            let mut new_depth = depth;
            if atn.state(p).is_rule_stop() {
                // The target fell off the end of the decision rule into the
                // invoking rule.
                debug_assert!(!full_ctx, "full-context closure never chases follow links");
                if self.dfas[decision].is_precedence_dfa {
                    if let Transition::Epsilon {
                        outermost_precedence_return: Some(returned_rule),
                        ..
                    } = trans
                    {
                        let decision_rule =
                            atn.state(self.dfas[decision].atn_start_state).rule;
                        if returned_rule == decision_rule {
                            c.set_precedence_filter_suppressed(true);
                        }
                    }
                }
                c.set_outer_context_depth(c.outer_context_depth() + 1);
                if !busy.insert(c.clone()) {
                    // Right-recursive rules revisit the same config forever.
                    continue;
                }
                configs.dips_into_outer_context = true;
                new_depth -= 1;
            } else {
                if !trans.is_epsilon() && !busy.insert(c.clone()) {
                    // Keeps EOF-as-epsilon loops from spinning.
                    continue;
                }
                if matches!(trans, Transition::Rule { .. }) && new_depth >= 0 {
                    // Latch at negative depth: once outside the entry
                    // context we can never return.
                    new_depth += 1;
                }
            }

            self.closure(
                input, recog, decision, c, configs, busy, continue_collecting, full_ctx,
                new_depth, treat_eof_as_epsilon,
            );
        }
    }

    /// Compute the configuration reached by following one non-consuming
    /// transition, or `None` when the edge is inapplicable (symbol edge,
    /// failed predicate evaluated under full context).
    #[allow(clippy::too_many_arguments)]
    fn epsilon_target<S, R>(
        &mut self,
        input: &mut S,
        recog: &mut R,
        config: &AtnConfig,
        trans: &Transition,
        collect_predicates: bool,
        in_context: bool,
        full_ctx: bool,
        treat_eof_as_epsilon: bool,
    ) -> Option<AtnConfig>
    where
        S: TokenStream,
        R: Recognizer,
    {
        match trans {
            Transition::Rule { target, follow, .. } => {
                let new_ctx = self.ctx_cache.singleton(config.context, *follow);
                Some(config.transport_with_context(*target, new_ctx))
            }
            Transition::Precedence { target, precedence } => {
                if collect_predicates && in_context {
                    if full_ctx {
                        // Evaluate now, with the input rewound so the
                        // predicate sees the decision's starting position.
                        let current = input.index();
                        input.seek(self.start_index);
                        let holds = recog.precpred(*precedence);
                        input.seek(current);
                        holds.then(|| config.transport(*target))
                    } else {
                        let pred = Arc::new(SemanticContext::Precedence {
                            precedence: *precedence,
                        });
                        let sem = SemanticContext::and(&config.semantic_context, &pred);
                        let mut c = config.transport(*target);
                        c.semantic_context = sem;
                        Some(c)
                    }
                } else {
                    Some(config.transport(*target))
                }
            }
            Transition::Predicate { target, rule, pred_index, is_ctx_dependent } => {
                if collect_predicates && (!is_ctx_dependent || in_context) {
                    if full_ctx {
                        let current = input.index();
                        input.seek(self.start_index);
                        let holds = recog.sempred(*rule, *pred_index);
                        input.seek(current);
                        holds.then(|| config.transport(*target))
                    } else {
                        let pred = Arc::new(SemanticContext::Predicate {
                            rule: *rule,
                            pred_index: *pred_index,
                            is_ctx_dependent: *is_ctx_dependent,
                        });
                        let sem = SemanticContext::and(&config.semantic_context, &pred);
                        let mut c = config.transport(*target);
                        c.semantic_context = sem;
                        Some(c)
                    }
                } else {
                    Some(config.transport(*target))
                }
            }
            Transition::Action { target, .. } | Transition::Epsilon { target, .. } => {
                Some(config.transport(*target))
            }
            Transition::Atom { .. }
            | Transition::Range { .. }
            | Transition::Set { .. }
            | Transition::NotSet { .. }
            | Transition::Wildcard { .. } => {
                // EOF edges behave like epsilon once EOF has been reached.
                if treat_eof_as_epsilon && trans.matches(EOF, 0, 1) {
                    Some(config.transport(trans.target()))
                } else {
                    None
                }
            }
        }
    }

    fn no_viable_alt<S: TokenStream>(
        &self,
        input: &mut S,
        decision: DecisionId,
        dead_end: DfaStateId,
    ) -> RecognitionError {
        RecognitionError::NoViableAlt {
            decision,
            start_index: self.start_index,
            offending_index: input.index(),
            dead_end_configs: self.dfas[decision].state(dead_end).configs.clone(),
        }
    }

    /// Salvage pass for dead-end sets: among configurations whose semantic
    /// contexts hold (then, failing that, those whose contexts fail), find
    /// the minimum alternative that ran the decision's rule to completion.
    fn syn_valid_or_sem_invalid_alt<R: Recognizer>(
        &mut self,
        recog: &mut R,
        configs: &ConfigSet,
    ) -> u16 {
        let mut sem_valid = ConfigSet::new(configs.full_ctx);
        let mut sem_invalid = ConfigSet::new(configs.full_ctx);
        for c in configs.iter() {
            if c.semantic_context.is_none() || c.semantic_context.eval(recog) {
                sem_valid.add(c.clone(), &mut self.ctx_cache);
            } else {
                sem_invalid.add(c.clone(), &mut self.ctx_cache);
            }
        }
        let alt = self.alt_that_finished_decision_entry_rule(&sem_valid);
        if alt != INVALID_ALT {
            return alt;
        }
        if !sem_invalid.is_empty() {
            let alt = self.alt_that_finished_decision_entry_rule(&sem_invalid);
            if alt != INVALID_ALT {
                return alt;
            }
        }
        INVALID_ALT
    }

    fn alt_that_finished_decision_entry_rule(&self, configs: &ConfigSet) -> u16 {
        let mut alts = AltSet::new();
        for c in configs.iter() {
            if c.outer_context_depth() > 0
                || (self.atn.state(c.state).is_rule_stop()
                    && self.ctx_cache.has_empty_path(c.context))
            {
                alts.insert(c.alt);
            }
        }
        alts.min().unwrap_or(INVALID_ALT)
    }
}
