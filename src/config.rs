//! ATN configurations and the deduplicated configuration set.
//!
//! A configuration is one point of the nondeterministic simulation: an ATN
//! state, the alternative being tracked, the prediction context it was
//! reached under, and any predicates collected on the way. The set folds
//! configurations that agree on (state, alt, semantic context) by merging
//! their contexts — that folding is what bounds the explosion during
//! closure.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHasher};
use smallvec::SmallVec;

use crate::actions::LexerActionExecutor;
use crate::context::{ContextCache, ContextId};
use crate::semantic::SemanticContext;
use crate::{StateId, INVALID_ALT};

/// A set of alternative numbers, packed as a bitset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AltSet {
    bits: SmallVec<[u64; 1]>,
}

impl AltSet {
    pub fn new() -> Self {
        AltSet::default()
    }

    pub fn insert(&mut self, alt: u16) {
        let word = alt as usize / 64;
        if self.bits.len() <= word {
            self.bits.resize(word + 1, 0);
        }
        self.bits[word] |= 1u64 << (alt % 64);
    }

    pub fn contains(&self, alt: u16) -> bool {
        let word = alt as usize / 64;
        self.bits.get(word).is_some_and(|w| w & (1u64 << (alt % 64)) != 0)
    }

    /// Lowest-numbered member; the universal tie-break of the engine.
    pub fn min(&self) -> Option<u16> {
        for (i, word) in self.bits.iter().enumerate() {
            if *word != 0 {
                return Some((i * 64 + word.trailing_zeros() as usize) as u16);
            }
        }
        None
    }

    pub fn count(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&w| w == 0)
    }

    pub fn union_with(&mut self, other: &AltSet) {
        if self.bits.len() < other.bits.len() {
            self.bits.resize(other.bits.len(), 0);
        }
        for (i, w) in other.bits.iter().enumerate() {
            self.bits[i] |= w;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.bits.iter().enumerate().flat_map(|(i, &word)| {
            (0..64).filter_map(move |b| {
                if word & (1u64 << b) != 0 { Some((i * 64 + b) as u16) } else { None }
            })
        })
    }
}

impl FromIterator<u16> for AltSet {
    fn from_iter<I: IntoIterator<Item = u16>>(iter: I) -> Self {
        let mut s = AltSet::new();
        for alt in iter {
            s.insert(alt);
        }
        s
    }
}

const SUPPRESSED_FLAG: u32 = 1 << 31;
const DEPTH_MASK: u32 = SUPPRESSED_FLAG - 1;

/// One point of the simulation.
///
/// The outer-context depth (how many times closure fell off the end of the
/// decision's rule) and the precedence-filter-suppression flag share one
/// word; the flag occupies the high bit.
#[derive(Debug, Clone)]
pub struct AtnConfig {
    pub state: StateId,
    /// Alternative of the decision this configuration tracks, 1-based.
    pub alt: u16,
    pub context: ContextId,
    pub semantic_context: Arc<SemanticContext>,
    depth_and_flags: u32,
    /// Lexer only: actions recorded (not executed) along the path.
    pub executor: Option<Arc<LexerActionExecutor>>,
    /// Lexer only: the path crossed a non-greedy decision, so it stops
    /// extending once its alternative has reached an accept state.
    pub passed_through_non_greedy: bool,
}

impl AtnConfig {
    pub fn new(state: StateId, alt: u16, context: ContextId) -> Self {
        AtnConfig {
            state,
            alt,
            context,
            semantic_context: SemanticContext::none(),
            depth_and_flags: 0,
            executor: None,
            passed_through_non_greedy: false,
        }
    }

    pub fn with_sem(state: StateId, alt: u16, context: ContextId, sem: Arc<SemanticContext>) -> Self {
        AtnConfig { semantic_context: sem, ..AtnConfig::new(state, alt, context) }
    }

    /// Same configuration transported to another state.
    pub fn transport(&self, state: StateId) -> Self {
        AtnConfig { state, ..self.clone() }
    }

    pub fn transport_with_context(&self, state: StateId, context: ContextId) -> Self {
        AtnConfig { state, context, ..self.clone() }
    }

    /// How far closure has dipped into the outer context.
    pub fn outer_context_depth(&self) -> u32 {
        self.depth_and_flags & DEPTH_MASK
    }

    pub fn set_outer_context_depth(&mut self, depth: u32) {
        debug_assert_eq!(depth & SUPPRESSED_FLAG, 0);
        self.depth_and_flags = (self.depth_and_flags & SUPPRESSED_FLAG) | (depth & DEPTH_MASK);
    }

    pub fn precedence_filter_suppressed(&self) -> bool {
        self.depth_and_flags & SUPPRESSED_FLAG != 0
    }

    pub fn set_precedence_filter_suppressed(&mut self, suppressed: bool) {
        if suppressed {
            self.depth_and_flags |= SUPPRESSED_FLAG;
        } else {
            self.depth_and_flags &= !SUPPRESSED_FLAG;
        }
    }
}

impl PartialEq for AtnConfig {
    fn eq(&self, other: &Self) -> bool {
        self.state == other.state
            && self.alt == other.alt
            && self.context == other.context
            && self.semantic_context == other.semantic_context
            && self.precedence_filter_suppressed() == other.precedence_filter_suppressed()
            && self.executor == other.executor
            && self.passed_through_non_greedy == other.passed_through_non_greedy
    }
}

impl Eq for AtnConfig {}

impl Hash for AtnConfig {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.state.hash(state);
        self.alt.hash(state);
        self.context.hash(state);
        self.semantic_context.hash(state);
        self.precedence_filter_suppressed().hash(state);
        self.executor.hash(state);
        self.passed_through_non_greedy.hash(state);
    }
}

/// Key under which the set folds configurations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DedupKey {
    state: StateId,
    alt: u16,
    sem: Arc<SemanticContext>,
    /// Present only for ordered (lexer) sets, which never merge contexts.
    context: Option<ContextId>,
    executor: Option<Arc<LexerActionExecutor>>,
    non_greedy: bool,
    suppressed: bool,
}

/// Stable identity of a frozen set, used to intern DFA states.
pub type SetFingerprint = Vec<(StateId, u16, ContextId, u64, bool)>;

/// An insertion-ordered, deduplicated collection of configurations.
///
/// Parser sets fold on (state, alt, semantic context) and merge contexts on
/// collision; lexer ("ordered") sets fold on full configuration equality so
/// that distinct call paths stay distinct. Once a set is installed into a
/// DFA state it is frozen; mutating a frozen set is a fatal logic error.
#[derive(Debug, Clone, Default)]
pub struct ConfigSet {
    configs: Vec<AtnConfig>,
    lookup: FxHashMap<DedupKey, usize>,
    /// Full-context sets merge with exact root semantics.
    pub full_ctx: bool,
    ordered: bool,
    pub has_semantic_context: bool,
    pub dips_into_outer_context: bool,
    /// The one alternative every configuration agrees on, or [`INVALID_ALT`].
    pub unique_alt: u16,
    pub conflicting_alts: Option<AltSet>,
    read_only: bool,
}

impl ConfigSet {
    pub fn new(full_ctx: bool) -> Self {
        ConfigSet { full_ctx, ..Default::default() }
    }

    /// Lexer variant: no context merging, full-equality dedup.
    pub fn new_ordered() -> Self {
        ConfigSet { ordered: true, ..Default::default() }
    }

    fn key_of(&self, config: &AtnConfig) -> DedupKey {
        DedupKey {
            state: config.state,
            alt: config.alt,
            sem: config.semantic_context.clone(),
            context: if self.ordered { Some(config.context) } else { None },
            executor: if self.ordered { config.executor.clone() } else { None },
            non_greedy: self.ordered && config.passed_through_non_greedy,
            suppressed: self.ordered && config.precedence_filter_suppressed(),
        }
    }

    /// Insert a configuration, folding it into a colliding entry by merging
    /// prediction contexts. Never increases the distinct-key count for
    /// configurations that collide on the dedup key.
    pub fn add(&mut self, config: AtnConfig, cache: &mut ContextCache) {
        assert!(!self.read_only, "attempt to mutate a frozen config set");
        if !config.semantic_context.is_none() {
            self.has_semantic_context = true;
        }
        if config.outer_context_depth() > 0 {
            self.dips_into_outer_context = true;
        }
        let key = self.key_of(&config);
        match self.lookup.get(&key) {
            None => {
                self.lookup.insert(key, self.configs.len());
                self.configs.push(config);
            }
            Some(&idx) => {
                let root_is_wildcard = !self.full_ctx;
                let existing = &self.configs[idx];
                let merged = cache.merge(existing.context, config.context, root_is_wildcard);
                let existing = &mut self.configs[idx];
                existing.set_outer_context_depth(
                    existing.outer_context_depth().max(config.outer_context_depth()),
                );
                // Preserve suppression from either path.
                if config.precedence_filter_suppressed() {
                    existing.set_precedence_filter_suppressed(true);
                }
                existing.context = merged;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AtnConfig> {
        self.configs.iter()
    }

    pub fn configs(&self) -> &[AtnConfig] {
        &self.configs
    }

    /// All alternatives represented in the set.
    pub fn alts(&self) -> AltSet {
        self.configs.iter().map(|c| c.alt).collect()
    }

    /// The single alternative all configurations agree on, if any.
    pub fn compute_unique_alt(&self) -> u16 {
        let mut alt = INVALID_ALT;
        for c in &self.configs {
            if alt == INVALID_ALT {
                alt = c.alt;
            } else if c.alt != alt {
                return INVALID_ALT;
            }
        }
        alt
    }

    /// Seal the set; called when it is installed into a DFA state.
    pub fn freeze(&mut self) {
        self.read_only = true;
        // The lookup table is only needed while inserting.
        self.lookup = FxHashMap::default();
        self.lookup.shrink_to_fit();
    }

    pub fn is_frozen(&self) -> bool {
        self.read_only
    }

    /// Order-independent structural identity; equal fingerprints mean the
    /// same DFA state.
    pub fn fingerprint(&self) -> SetFingerprint {
        let mut sig: SetFingerprint = self
            .configs
            .iter()
            .map(|c| {
                let mut h = FxHasher::default();
                c.semantic_context.hash(&mut h);
                c.executor.hash(&mut h);
                c.passed_through_non_greedy.hash(&mut h);
                (c.state, c.alt, c.context, h.finish(), c.precedence_filter_suppressed())
            })
            .collect();
        sig.sort_unstable();
        sig.dedup();
        sig
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EMPTY_CONTEXT;

    #[test]
    fn altset_basics() {
        let mut s = AltSet::new();
        assert!(s.is_empty());
        s.insert(3);
        s.insert(70);
        s.insert(1);
        assert_eq!(s.min(), Some(1));
        assert_eq!(s.count(), 3);
        assert!(s.contains(70) && !s.contains(2));
        assert_eq!(s.iter().collect::<Vec<_>>(), vec![1, 3, 70]);
    }

    #[test]
    fn add_folds_colliding_configs() {
        let mut cache = ContextCache::new();
        let ctx_a = cache.singleton(EMPTY_CONTEXT, 10);
        let ctx_b = cache.singleton(EMPTY_CONTEXT, 20);
        let mut set = ConfigSet::new(false);
        set.add(AtnConfig::new(5, 1, ctx_a), &mut cache);
        set.add(AtnConfig::new(5, 1, ctx_b), &mut cache);
        assert_eq!(set.len(), 1, "colliding configs fold; only contexts change");
        let merged = set.configs()[0].context;
        assert_eq!(merged, cache.merge(ctx_a, ctx_b, true));

        // A different alt is a distinct key.
        set.add(AtnConfig::new(5, 2, ctx_a), &mut cache);
        assert_eq!(set.len(), 2);
        assert_eq!(set.compute_unique_alt(), INVALID_ALT);
    }

    #[test]
    fn ordered_set_keeps_distinct_contexts() {
        let mut cache = ContextCache::new();
        let ctx_a = cache.singleton(EMPTY_CONTEXT, 10);
        let ctx_b = cache.singleton(EMPTY_CONTEXT, 20);
        let mut set = ConfigSet::new_ordered();
        set.add(AtnConfig::new(5, 1, ctx_a), &mut cache);
        set.add(AtnConfig::new(5, 1, ctx_b), &mut cache);
        assert_eq!(set.len(), 2);
    }

    #[test]
    #[should_panic(expected = "frozen")]
    fn frozen_set_rejects_mutation() {
        let mut cache = ContextCache::new();
        let mut set = ConfigSet::new(false);
        set.add(AtnConfig::new(0, 1, EMPTY_CONTEXT), &mut cache);
        set.freeze();
        set.add(AtnConfig::new(1, 1, EMPTY_CONTEXT), &mut cache);
    }

    #[test]
    fn fingerprint_is_order_independent() {
        let mut cache = ContextCache::new();
        let ctx = cache.singleton(EMPTY_CONTEXT, 10);
        let mut a = ConfigSet::new(false);
        a.add(AtnConfig::new(1, 1, ctx), &mut cache);
        a.add(AtnConfig::new(2, 2, EMPTY_CONTEXT), &mut cache);
        let mut b = ConfigSet::new(false);
        b.add(AtnConfig::new(2, 2, EMPTY_CONTEXT), &mut cache);
        b.add(AtnConfig::new(1, 1, ctx), &mut cache);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn depth_word_packs_suppression_flag() {
        let mut c = AtnConfig::new(0, 1, EMPTY_CONTEXT);
        c.set_outer_context_depth(5);
        c.set_precedence_filter_suppressed(true);
        assert_eq!(c.outer_context_depth(), 5);
        assert!(c.precedence_filter_suppressed());
        c.set_outer_context_depth(6);
        assert!(c.precedence_filter_suppressed(), "depth update preserves the flag");
    }
}
