//! Prediction strategies and the conflict analysis that drives termination.
//!
//! SLL prediction may continue past a point where alternatives conflict only
//! because their approximate contexts collide; the functions here decide,
//! from a configuration set alone, whether a conflict is real enough to stop
//! (and fall back to full context), whether every subset of alternatives
//! conflicts identically (exact ambiguity), and which alternative a
//! conflicting set resolves to.

use rustc_hash::FxHashMap;

use crate::atn::Atn;
use crate::config::{AltSet, AtnConfig, ConfigSet};
use crate::context::{ContextCache, ContextId};
use crate::semantic::SemanticContext;
use crate::{StateId, INVALID_ALT};

/// How much context prediction uses, and when it terminates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PredictionMode {
    /// Approximate (local) call-stack context only; a surviving conflict
    /// resolves to the minimum alternative with no full-context retry.
    /// Fastest, and correct for any decision that is not context sensitive.
    Sll,
    /// The adaptive strategy: an SLL pass first, retried with the exact
    /// call stack when a genuine conflict survives the approximation.
    /// Terminates as soon as prediction is resolved, even if the decision
    /// is ambiguous further out.
    #[default]
    Ll,
    /// Like [`Ll`] but keeps consuming until the conflicting subsets are
    /// provably identical, so every exact ambiguity is detected and
    /// reported.
    LlExactAmbigDetection,
}

/// Whether an SLL configuration set is a stopping point for DFA expansion:
/// either every configuration has run the decision's rule to completion, or
/// the alternatives conflict with no state still tied to a single
/// alternative.
///
/// When the set carries semantic contexts under pure SLL, the conflict test
/// runs on a predicate-stripped copy: two configurations that differ only in
/// collected predicates are conflicting for this purpose.
pub fn has_sll_conflict_terminating_prediction(
    mode: PredictionMode,
    configs: &ConfigSet,
    atn: &Atn,
    cache: &mut ContextCache,
) -> bool {
    if all_configs_in_rule_stop_states(atn, configs) {
        return true;
    }

    let stripped;
    let configs = if mode == PredictionMode::Sll && configs.has_semantic_context {
        let mut dup = ConfigSet::new(configs.full_ctx);
        for c in configs.iter() {
            let mut c = c.clone();
            c.semantic_context = SemanticContext::none();
            dup.add(c, cache);
        }
        stripped = dup;
        &stripped
    } else {
        configs
    };

    let altsets = get_conflicting_alt_subsets(configs);
    has_conflicting_alt_set(&altsets) && !has_state_associated_with_one_alt(configs)
}

/// Whether any configuration has reached its rule's stop state.
pub fn has_config_in_rule_stop_state(atn: &Atn, configs: &ConfigSet) -> bool {
    configs.iter().any(|c| atn.state(c.state).is_rule_stop())
}

/// Whether every configuration has reached its rule's stop state.
pub fn all_configs_in_rule_stop_states(atn: &Atn, configs: &ConfigSet) -> bool {
    configs.iter().all(|c| atn.state(c.state).is_rule_stop())
}

/// Group configurations by (state, context) and collect the alternatives of
/// each group. Configurations in the same group that track different
/// alternatives are genuinely competing: the same input suffix reaches the
/// same place under the same call history either way.
pub fn get_conflicting_alt_subsets(configs: &ConfigSet) -> Vec<AltSet> {
    let mut by_state_and_ctx: FxHashMap<(StateId, ContextId), AltSet> = FxHashMap::default();
    for c in configs.iter() {
        by_state_and_ctx.entry((c.state, c.context)).or_default().insert(c.alt);
    }
    by_state_and_ctx.into_values().collect()
}

/// Group configurations by state alone.
pub fn get_state_to_alt_map(configs: &ConfigSet) -> FxHashMap<StateId, AltSet> {
    let mut map: FxHashMap<StateId, AltSet> = FxHashMap::default();
    for c in configs.iter() {
        map.entry(c.state).or_default().insert(c.alt);
    }
    map
}

/// Some state is still associated with exactly one alternative, so the
/// decision is not yet hopelessly conflicted.
pub fn has_state_associated_with_one_alt(configs: &ConfigSet) -> bool {
    get_state_to_alt_map(configs).values().any(|alts| alts.count() == 1)
}

/// At least one subset holds more than one alternative.
pub fn has_conflicting_alt_set(altsets: &[AltSet]) -> bool {
    altsets.iter().any(|s| s.count() > 1)
}

/// Every subset holds more than one alternative.
pub fn all_subsets_conflict(altsets: &[AltSet]) -> bool {
    !altsets.iter().any(|s| s.count() == 1)
}

/// Every subset holds the same alternatives.
pub fn all_subsets_equal(altsets: &[AltSet]) -> bool {
    match altsets.split_first() {
        None => true,
        Some((first, rest)) => rest.iter().all(|s| s == first),
    }
}

/// Union of all alternatives across the subsets.
pub fn get_alts(altsets: &[AltSet]) -> AltSet {
    let mut all = AltSet::new();
    for s in altsets {
        all.union_with(s);
    }
    all
}

/// Full-context termination test: if every competing subset resolves to the
/// same minimum alternative, prediction is decided regardless of the
/// remaining conflict. Returns that alternative or [`INVALID_ALT`].
pub fn get_single_viable_alt(altsets: &[AltSet]) -> u16 {
    let mut viable = AltSet::new();
    for s in altsets {
        if let Some(min) = s.min() {
            viable.insert(min);
        }
    }
    if viable.count() == 1 {
        viable.min().unwrap_or(INVALID_ALT)
    } else {
        INVALID_ALT
    }
}
