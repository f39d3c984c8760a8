//! Property tests for prediction-context merging.
//!
//! `merge` must behave like a set union over call-stack paths: commutative,
//! idempotent, associative on the ids it returns, with the wildcard root
//! absorbing under local-context semantics. Contexts are generated as random
//! stacks of return states and merged in random combinations.

use proptest::prelude::*;

use crate::context::{ContextCache, ContextId, ContextNode, EMPTY_CONTEXT, EMPTY_RETURN_STATE};

/// Build a context from a chain of return states, innermost frame last.
fn from_chain(cache: &mut ContextCache, chain: &[u32]) -> ContextId {
    let mut ctx = EMPTY_CONTEXT;
    for &rs in chain {
        ctx = cache.singleton(ctx, rs);
    }
    ctx
}

/// Flatten a context into the set of its root-to-frame paths, for comparing
/// merge results structurally.
fn paths(cache: &ContextCache, id: ContextId) -> Vec<Vec<u32>> {
    fn walk(cache: &ContextCache, id: ContextId, suffix: &[u32], out: &mut Vec<Vec<u32>>) {
        match cache.node(id) {
            ContextNode::Empty => out.push(suffix.to_vec()),
            ContextNode::Singleton { parent, return_state } => {
                let mut s = vec![*return_state];
                s.extend_from_slice(suffix);
                walk(cache, *parent, &s, out);
            }
            ContextNode::Array { parents, return_states } => {
                for (p, rs) in parents.iter().zip(return_states.iter()) {
                    if *rs == EMPTY_RETURN_STATE {
                        out.push(suffix.to_vec());
                        continue;
                    }
                    let mut s = vec![*rs];
                    s.extend_from_slice(suffix);
                    walk(cache, *p, &s, out);
                }
            }
        }
    }
    let mut out = Vec::new();
    walk(cache, id, &[], &mut out);
    out.sort();
    out.dedup();
    out
}

fn chain_strategy() -> impl Strategy<Value = Vec<u32>> {
    // Small state space so chains collide and share suffixes often.
    prop::collection::vec(1u32..12, 0..5)
}

proptest! {
    #[test]
    fn merge_is_commutative(x in chain_strategy(), y in chain_strategy()) {
        let mut cache = ContextCache::new();
        let a = from_chain(&mut cache, &x);
        let b = from_chain(&mut cache, &y);
        let ab = cache.merge(a, b, true);
        let ba = cache.merge(b, a, true);
        prop_assert_eq!(ab, ba);

        let mut full = ContextCache::new();
        let a = from_chain(&mut full, &x);
        let b = from_chain(&mut full, &y);
        let ab = full.merge(a, b, false);
        let ba = full.merge(b, a, false);
        prop_assert_eq!(ab, ba);
    }

    #[test]
    fn merge_is_idempotent(x in chain_strategy(), y in chain_strategy()) {
        let mut cache = ContextCache::new();
        let a = from_chain(&mut cache, &x);
        let b = from_chain(&mut cache, &y);
        let m = cache.merge(a, b, true);
        prop_assert_eq!(cache.merge(m, m, true), m);
        prop_assert_eq!(cache.merge(m, a, true), m, "operands are absorbed by the merge");
        prop_assert_eq!(cache.merge(m, b, true), m);
    }

    #[test]
    fn merge_unions_call_paths(
        x in chain_strategy(),
        y in chain_strategy(),
        z in chain_strategy(),
    ) {
        // Under full-context semantics no path may be dropped or invented,
        // regardless of merge order.
        let mut cache = ContextCache::new();
        let a = from_chain(&mut cache, &x);
        let b = from_chain(&mut cache, &y);
        let c = from_chain(&mut cache, &z);

        let mut expected = paths(&cache, a);
        expected.extend(paths(&cache, b));
        expected.extend(paths(&cache, c));
        expected.sort();
        expected.dedup();

        let ab_c = {
            let ab = cache.merge(a, b, false);
            cache.merge(ab, c, false)
        };
        prop_assert_eq!(paths(&cache, ab_c), expected.clone());

        let a_bc = {
            let bc = cache.merge(b, c, false);
            cache.merge(a, bc, false)
        };
        prop_assert_eq!(paths(&cache, a_bc), expected);
    }

    #[test]
    fn wildcard_absorbs_under_local_context(x in chain_strategy()) {
        let mut cache = ContextCache::new();
        let a = from_chain(&mut cache, &x);
        prop_assert_eq!(cache.merge(a, EMPTY_CONTEXT, true), EMPTY_CONTEXT);
        prop_assert_eq!(cache.merge(EMPTY_CONTEXT, a, true), EMPTY_CONTEXT);
    }

    #[test]
    fn equal_chains_intern_to_one_id(x in chain_strategy()) {
        let mut cache = ContextCache::new();
        let a = from_chain(&mut cache, &x);
        let nodes = cache.num_nodes();
        let b = from_chain(&mut cache, &x);
        prop_assert_eq!(a, b);
        prop_assert_eq!(cache.num_nodes(), nodes, "re-interning allocates nothing");
    }
}
