//! Prediction context: the rule call stack as an interned DAG.
//!
//! A configuration's context records the chain of rule invocations that led
//! to it, so that closure can pop back to the correct follow states.
//! Configurations reachable via different call histories that converge to
//! the same suffix share nodes and compare equal. Nodes live in an arena and
//! are canonicalized through an intern table: structural equality is id
//! equality, which keeps merge memoization and config-set hashing cheap.
//!
//! `merge` is on the hot path of closure; every result is memoized by the
//! unordered operand pair together with the root semantics, since the same
//! pair merges differently under local and full context.

use rustc_hash::FxHashMap;
use smallvec::{smallvec, SmallVec};

use crate::atn::{Atn, Transition};
use crate::{RuleCallStack, StateId};
use std::sync::Arc;

/// Handle to an interned context node.
pub type ContextId = u32;

/// The wildcard bottom context `$`: prediction does not know (or does not
/// care) how the current rule was entered.
pub const EMPTY_CONTEXT: ContextId = 0;

/// Return-state payload marking "popped past the start rule". May only
/// occupy the final slot of an array node's return states.
pub const EMPTY_RETURN_STATE: StateId = u32::MAX;

type Parents = SmallVec<[ContextId; 2]>;
type Returns = SmallVec<[StateId; 2]>;

/// One node of the context DAG.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContextNode {
    /// The wildcard bottom, `$`.
    Empty,
    /// One invocation frame: `return_state` in the caller, with the caller's
    /// own context as `parent`.
    Singleton { parent: ContextId, return_state: StateId },
    /// Several alternative frames, sorted by return state.
    Array { parents: Parents, return_states: Returns },
}

/// Arena and canonicalization table for context nodes, plus the merge memo.
///
/// Interning is idempotent: re-interning a structurally present node returns
/// the existing id, and a node is only published once fully constructed, so
/// every observer sees canonical, complete instances. Entries are never
/// removed; a host that wants to bound retention re-roots DFA-held contexts
/// into a fresh cache with [`import`](ContextCache::import).
#[derive(Debug, Clone)]
pub struct ContextCache {
    nodes: Vec<ContextNode>,
    intern: FxHashMap<ContextNode, ContextId>,
    merge_memo: FxHashMap<(ContextId, ContextId, bool), ContextId>,
}

impl Default for ContextCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextCache {
    pub fn new() -> Self {
        let mut cache = ContextCache {
            nodes: Vec::with_capacity(64),
            intern: FxHashMap::default(),
            merge_memo: FxHashMap::default(),
        };
        cache.nodes.push(ContextNode::Empty);
        cache.intern.insert(ContextNode::Empty, EMPTY_CONTEXT);
        cache
    }

    fn intern_node(&mut self, node: ContextNode) -> ContextId {
        if let Some(&id) = self.intern.get(&node) {
            return id;
        }
        let id = self.nodes.len() as ContextId;
        self.nodes.push(node.clone());
        self.intern.insert(node, id);
        id
    }

    /// Push one invocation frame. Collapses the `(EMPTY, $)` shape back to
    /// the canonical empty context.
    pub fn singleton(&mut self, parent: ContextId, return_state: StateId) -> ContextId {
        if return_state == EMPTY_RETURN_STATE && parent == EMPTY_CONTEXT {
            return EMPTY_CONTEXT;
        }
        self.intern_node(ContextNode::Singleton { parent, return_state })
    }

    /// Intern an array node. `return_states` must be strictly increasing;
    /// a single-element array degenerates to a singleton.
    pub fn array(&mut self, parents: Parents, return_states: Returns) -> ContextId {
        debug_assert!(return_states.windows(2).all(|w| w[0] < w[1]), "return states must be sorted");
        debug_assert_eq!(parents.len(), return_states.len());
        if return_states.len() == 1 {
            return self.singleton(parents[0], return_states[0]);
        }
        self.intern_node(ContextNode::Array { parents, return_states })
    }

    pub fn node(&self, id: ContextId) -> &ContextNode {
        &self.nodes[id as usize]
    }

    /// Number of invocation frames directly visible at this node.
    pub fn len(&self, id: ContextId) -> usize {
        match self.node(id) {
            ContextNode::Empty | ContextNode::Singleton { .. } => 1,
            ContextNode::Array { return_states, .. } => return_states.len(),
        }
    }

    pub fn return_state(&self, id: ContextId, index: usize) -> StateId {
        match self.node(id) {
            ContextNode::Empty => EMPTY_RETURN_STATE,
            ContextNode::Singleton { return_state, .. } => {
                debug_assert_eq!(index, 0);
                *return_state
            }
            ContextNode::Array { return_states, .. } => return_states[index],
        }
    }

    pub fn parent(&self, id: ContextId, index: usize) -> ContextId {
        match self.node(id) {
            ContextNode::Empty => EMPTY_CONTEXT,
            ContextNode::Singleton { parent, .. } => {
                debug_assert_eq!(index, 0);
                *parent
            }
            ContextNode::Array { parents, .. } => parents[index],
        }
    }

    pub fn is_empty_ctx(&self, id: ContextId) -> bool {
        id == EMPTY_CONTEXT
    }

    /// Whether some path through this node pops past the start rule.
    pub fn has_empty_path(&self, id: ContextId) -> bool {
        self.return_state(id, self.len(id) - 1) == EMPTY_RETURN_STATE
    }

    /// Number of interned nodes (diagnostics).
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Merge two contexts.
    ///
    /// `root_is_wildcard` selects local-context semantics (SLL closure),
    /// where the empty context means "don't care" and absorbs the other
    /// operand; under full-context semantics the empty context means
    /// "exactly the start rule" and merges like an ordinary frame.
    ///
    /// Commutative and idempotent up to structural equality; memoized on the
    /// unordered operand pair and `root_is_wildcard`. The cache is shared
    /// between SLL and full-context simulation, so a result computed under
    /// one semantics must never answer for the other.
    pub fn merge(&mut self, a: ContextId, b: ContextId, root_is_wildcard: bool) -> ContextId {
        if a == b {
            return a;
        }
        let key = if a < b { (a, b, root_is_wildcard) } else { (b, a, root_is_wildcard) };
        if let Some(&cached) = self.merge_memo.get(&key) {
            return cached;
        }
        let result = self.merge_uncached(a, b, root_is_wildcard);
        self.merge_memo.insert(key, result);
        result
    }

    fn merge_uncached(&mut self, a: ContextId, b: ContextId, root_is_wildcard: bool) -> ContextId {
        let a_arrayish = matches!(self.node(a), ContextNode::Array { .. });
        let b_arrayish = matches!(self.node(b), ContextNode::Array { .. });
        if !a_arrayish && !b_arrayish {
            return self.merge_singletons(a, b, root_is_wildcard);
        }
        if root_is_wildcard {
            if a == EMPTY_CONTEXT || b == EMPTY_CONTEXT {
                return EMPTY_CONTEXT;
            }
        }
        self.merge_arrays(a, b, root_is_wildcard)
    }

    /// Merge two empty-or-singleton nodes.
    fn merge_singletons(&mut self, a: ContextId, b: ContextId, root_is_wildcard: bool) -> ContextId {
        if let Some(rooted) = self.merge_root(a, b, root_is_wildcard) {
            return rooted;
        }
        let (pa, ra) = match *self.node(a) {
            ContextNode::Singleton { parent, return_state } => (parent, return_state),
            _ => unreachable!("merge_root handles empty operands"),
        };
        let (pb, rb) = match *self.node(b) {
            ContextNode::Singleton { parent, return_state } => (parent, return_state),
            _ => unreachable!("merge_root handles empty operands"),
        };

        if ra == rb {
            // Same frame: merge the histories beneath it.
            let parent = self.merge(pa, pb, root_is_wildcard);
            if parent == pa {
                return a;
            }
            if parent == pb {
                return b;
            }
            return self.singleton(parent, ra);
        }

        // Distinct frames: a two-element array, sharing the parent when the
        // histories agree.
        let (parents, returns): (Parents, Returns) = if ra < rb {
            (smallvec![pa, pb], smallvec![ra, rb])
        } else {
            (smallvec![pb, pa], smallvec![rb, ra])
        };
        self.array(parents, returns)
    }

    /// Shortcuts for merges involving the empty context.
    fn merge_root(&mut self, a: ContextId, b: ContextId, root_is_wildcard: bool) -> Option<ContextId> {
        if a == EMPTY_CONTEXT && b == EMPTY_CONTEXT {
            return Some(EMPTY_CONTEXT);
        }
        if root_is_wildcard {
            // Local context: "don't care" wins.
            if a == EMPTY_CONTEXT || b == EMPTY_CONTEXT {
                return Some(EMPTY_CONTEXT);
            }
            return None;
        }
        // Full context: $ merges as a real frame alongside the other.
        let other = if a == EMPTY_CONTEXT {
            b
        } else if b == EMPTY_CONTEXT {
            a
        } else {
            return None;
        };
        let (p, r) = match *self.node(other) {
            ContextNode::Singleton { parent, return_state } => (parent, return_state),
            _ => unreachable!("caller dispatches array operands elsewhere"),
        };
        Some(self.array(smallvec![p, EMPTY_CONTEXT], smallvec![r, EMPTY_RETURN_STATE]))
    }

    /// Sorted merge-join of two contexts in array form.
    fn merge_arrays(&mut self, a: ContextId, b: ContextId, root_is_wildcard: bool) -> ContextId {
        let (a_parents, a_returns) = self.as_array(a);
        let (b_parents, b_returns) = self.as_array(b);

        let mut parents: Parents = SmallVec::with_capacity(a_returns.len() + b_returns.len());
        let mut returns: Returns = SmallVec::with_capacity(a_returns.len() + b_returns.len());
        let (mut i, mut j) = (0, 0);
        while i < a_returns.len() && j < b_returns.len() {
            if a_returns[i] == b_returns[j] {
                // Equal frames: merge the parents beneath them.
                let parent = if a_parents[i] == b_parents[j] {
                    a_parents[i]
                } else {
                    self.merge(a_parents[i], b_parents[j], root_is_wildcard)
                };
                parents.push(parent);
                returns.push(a_returns[i]);
                i += 1;
                j += 1;
            } else if a_returns[i] < b_returns[j] {
                parents.push(a_parents[i]);
                returns.push(a_returns[i]);
                i += 1;
            } else {
                parents.push(b_parents[j]);
                returns.push(b_returns[j]);
                j += 1;
            }
        }
        parents.extend_from_slice(&a_parents[i..]);
        returns.extend_from_slice(&a_returns[i..]);
        parents.extend_from_slice(&b_parents[j..]);
        returns.extend_from_slice(&b_returns[j..]);

        let merged = self.array(parents, returns);
        // A join that reproduced one operand must return that operand's id;
        // interning already guarantees this.
        merged
    }

    fn as_array(&self, id: ContextId) -> (Parents, Returns) {
        match self.node(id) {
            ContextNode::Empty => (smallvec![EMPTY_CONTEXT], smallvec![EMPTY_RETURN_STATE]),
            ContextNode::Singleton { parent, return_state } => {
                (smallvec![*parent], smallvec![*return_state])
            }
            ContextNode::Array { parents, return_states } => {
                (parents.clone(), return_states.clone())
            }
        }
    }

    /// Build the exact context for full-context prediction from a live call
    /// stack, outermost invocation first.
    pub fn from_rule_call_stack(
        &mut self,
        atn: &Atn,
        stack: Option<&Arc<RuleCallStack>>,
    ) -> ContextId {
        let Some(frame) = stack else {
            return EMPTY_CONTEXT;
        };
        if frame.invoking_state < 0 {
            return EMPTY_CONTEXT;
        }
        let parent = self.from_rule_call_stack(atn, frame.parent.as_ref());
        let state = atn.state(frame.invoking_state as StateId);
        let follow = state
            .transitions
            .iter()
            .find_map(|t| match t {
                Transition::Rule { follow, .. } => Some(*follow),
                _ => None,
            })
            .expect("invoking state must carry a rule transition");
        self.singleton(parent, follow)
    }

    /// Re-intern `id` (from `src`) into this cache, returning the local id.
    ///
    /// This is how a host bounds the memory retained by DFA states: contexts
    /// they reference are rewritten to nodes of one shared cache.
    pub fn import(&mut self, src: &ContextCache, id: ContextId) -> ContextId {
        let mut visited: FxHashMap<ContextId, ContextId> = FxHashMap::default();
        self.import_rec(src, id, &mut visited)
    }

    fn import_rec(
        &mut self,
        src: &ContextCache,
        id: ContextId,
        visited: &mut FxHashMap<ContextId, ContextId>,
    ) -> ContextId {
        if id == EMPTY_CONTEXT {
            return EMPTY_CONTEXT;
        }
        if let Some(&local) = visited.get(&id) {
            return local;
        }
        let local = match src.node(id).clone() {
            ContextNode::Empty => EMPTY_CONTEXT,
            ContextNode::Singleton { parent, return_state } => {
                let parent = self.import_rec(src, parent, visited);
                self.singleton(parent, return_state)
            }
            ContextNode::Array { parents, return_states } => {
                let parents = parents
                    .iter()
                    .map(|&p| self.import_rec(src, p, visited))
                    .collect();
                self.array(parents, return_states)
            }
        };
        visited.insert(id, local);
        local
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let mut cache = ContextCache::new();
        let a = cache.singleton(EMPTY_CONTEXT, 7);
        let b = cache.singleton(EMPTY_CONTEXT, 7);
        assert_eq!(a, b);
        assert_eq!(cache.singleton(EMPTY_CONTEXT, EMPTY_RETURN_STATE), EMPTY_CONTEXT);
    }

    #[test]
    fn merge_same_return_state_merges_parents() {
        let mut cache = ContextCache::new();
        let pa = cache.singleton(EMPTY_CONTEXT, 1);
        let pb = cache.singleton(EMPTY_CONTEXT, 2);
        let a = cache.singleton(pa, 9);
        let b = cache.singleton(pb, 9);
        let m = cache.merge(a, b, true);
        match cache.node(m) {
            ContextNode::Singleton { parent, return_state } => {
                assert_eq!(*return_state, 9);
                match cache.node(*parent) {
                    ContextNode::Array { return_states, .. } => {
                        assert_eq!(return_states.as_slice(), &[1, 2]);
                    }
                    other => panic!("expected array parent, got {other:?}"),
                }
            }
            other => panic!("expected singleton, got {other:?}"),
        }
    }

    #[test]
    fn merge_distinct_return_states_builds_sorted_array() {
        let mut cache = ContextCache::new();
        let a = cache.singleton(EMPTY_CONTEXT, 12);
        let b = cache.singleton(EMPTY_CONTEXT, 3);
        let m = cache.merge(a, b, true);
        match cache.node(m) {
            ContextNode::Array { return_states, .. } => {
                assert_eq!(return_states.as_slice(), &[3, 12]);
            }
            other => panic!("expected array, got {other:?}"),
        }
        assert_eq!(cache.merge(b, a, true), m, "merge is commutative");
    }

    #[test]
    fn wildcard_root_absorbs() {
        let mut cache = ContextCache::new();
        let a = cache.singleton(EMPTY_CONTEXT, 5);
        assert_eq!(cache.merge(a, EMPTY_CONTEXT, true), EMPTY_CONTEXT);
        // Under full context, $ stays as a distinct path in the final slot.
        let m = cache.merge(a, EMPTY_CONTEXT, false);
        assert!(cache.has_empty_path(m));
        assert_eq!(cache.len(m), 2);
        assert_eq!(cache.return_state(m, 1), EMPTY_RETURN_STATE);
    }

    #[test]
    fn merge_memo_keeps_local_and_full_semantics_apart() {
        // One shared cache, same operand pair, both semantics in both
        // orders: a memoized wildcard absorption must not stand in for the
        // full-context merge, and vice versa.
        let mut cache = ContextCache::new();
        let a = cache.singleton(EMPTY_CONTEXT, 7);
        assert_eq!(cache.merge(a, EMPTY_CONTEXT, true), EMPTY_CONTEXT);
        let full = cache.merge(a, EMPTY_CONTEXT, false);
        assert_ne!(full, EMPTY_CONTEXT);
        assert_eq!(cache.len(full), 2);
        assert_eq!(cache.return_state(full, 1), EMPTY_RETURN_STATE);

        let mut cache = ContextCache::new();
        let b = cache.singleton(EMPTY_CONTEXT, 7);
        let full = cache.merge(b, EMPTY_CONTEXT, false);
        assert_eq!(cache.len(full), 2);
        assert_eq!(cache.merge(b, EMPTY_CONTEXT, true), EMPTY_CONTEXT);
    }

    #[test]
    fn merge_is_memoized_and_idempotent() {
        let mut cache = ContextCache::new();
        let a = cache.singleton(EMPTY_CONTEXT, 1);
        let b = cache.singleton(EMPTY_CONTEXT, 2);
        let m1 = cache.merge(a, b, true);
        let nodes_after = cache.num_nodes();
        let m2 = cache.merge(a, b, true);
        assert_eq!(m1, m2);
        assert_eq!(cache.num_nodes(), nodes_after, "memoized merge allocates nothing");
        assert_eq!(cache.merge(a, a, true), a);
    }

    #[test]
    fn import_preserves_structure() {
        let mut src = ContextCache::new();
        let p = src.singleton(EMPTY_CONTEXT, 4);
        let a = src.singleton(p, 8);
        let b = src.singleton(p, 2);
        let m = src.merge(a, b, true);

        let mut dst = ContextCache::new();
        // Warm dst with unrelated nodes so ids diverge.
        dst.singleton(EMPTY_CONTEXT, 99);
        let imported = dst.import(&src, m);
        let (sp, sr) = match src.node(m) {
            ContextNode::Array { parents, return_states } => (parents.clone(), return_states.clone()),
            other => panic!("unexpected {other:?}"),
        };
        match dst.node(imported) {
            ContextNode::Array { parents, return_states } => {
                assert_eq!(return_states, &sr);
                // Shared parent stays shared after import.
                assert_eq!(parents[0], parents[1]);
                assert_eq!(sp[0], sp[1]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
