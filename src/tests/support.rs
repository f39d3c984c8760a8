//! Hand-assembled grammar ATNs shared by the simulator tests.
//!
//! Each fixture builds the automaton the way a grammar tool would emit it:
//! decision states carry one epsilon per alternative, rule invocations add
//! both the `Rule` transition and the follow-link epsilon from the callee's
//! stop state, and left-recursive rules are in precedence-climbing form.

use crate::atn::{Atn, StateKind, Transition};
use crate::{DecisionId, RuleId, StateId, EOF, NO_STATE};

pub const ID: i32 = 1;
pub const SEMI: i32 = 2;
pub const INT: i32 = 3;
pub const MUL: i32 = 4;
pub const ADD: i32 = 5;

const MAX_TOKEN: i32 = ADD;

fn epsilon(atn: &mut Atn, from: StateId, to: StateId) {
    atn.add_transition(from, Transition::Epsilon { target: to, outermost_precedence_return: None });
}

fn atom(atn: &mut Atn, from: StateId, to: StateId, label: i32) {
    atn.add_transition(from, Transition::Atom { target: to, label });
}

/// Invoke `rule` from `from`: the call transition plus the follow-link
/// epsilon out of the callee's stop state. Precedence-0 calls into a
/// left-recursive rule get the marked return edge.
#[allow(clippy::too_many_arguments)]
fn call(
    atn: &mut Atn,
    from: StateId,
    rule: RuleId,
    rule_start: StateId,
    rule_stop: StateId,
    follow: StateId,
    precedence: i32,
    left_recursive: bool,
) {
    atn.add_transition(
        from,
        Transition::Rule { target: rule_start, rule, precedence, follow },
    );
    let marker = if left_recursive && precedence == 0 { Some(rule) } else { None };
    atn.add_transition(
        rule_stop,
        Transition::Epsilon { target: follow, outermost_precedence_return: marker },
    );
}

fn rule_start(atn: &mut Atn, rule: RuleId) -> StateId {
    atn.add_state(StateKind::RuleStart { stop_state: NO_STATE, is_left_recursive: false }, rule)
}

/// `s : ID | ID ID ;` — one decision whose alternatives differ only in
/// length, resolvable by one extra token of lookahead.
pub fn optional_tail_grammar() -> (Atn, DecisionId) {
    let mut atn = Atn::new(MAX_TOKEN);
    let start = rule_start(&mut atn, 0);
    let stop = atn.add_state(StateKind::RuleStop, 0);

    let d = atn.add_state(StateKind::Basic, 0);
    let a1 = atn.add_state(StateKind::Basic, 0);
    let a2 = atn.add_state(StateKind::Basic, 0);
    let b1 = atn.add_state(StateKind::Basic, 0);
    let b2 = atn.add_state(StateKind::Basic, 0);
    let b3 = atn.add_state(StateKind::Basic, 0);
    let end = atn.add_state(StateKind::BlockEnd { start_state: d }, 0);

    epsilon(&mut atn, start, d);
    epsilon(&mut atn, d, a1);
    epsilon(&mut atn, d, b1);
    atom(&mut atn, a1, a2, ID);
    epsilon(&mut atn, a2, end);
    atom(&mut atn, b1, b2, ID);
    atom(&mut atn, b2, b3, ID);
    epsilon(&mut atn, b3, end);
    epsilon(&mut atn, end, stop);

    let decision = atn.register_decision(d);
    (atn, decision)
}

/// `s : ID EOF | ID ID ;` — the first alternative is anchored to the end
/// of input; after one ID the decision turns on whether anything follows.
pub fn eof_anchored_grammar() -> (Atn, DecisionId) {
    let mut atn = Atn::new(MAX_TOKEN);
    let start = rule_start(&mut atn, 0);
    let stop = atn.add_state(StateKind::RuleStop, 0);

    let d = atn.add_state(StateKind::Basic, 0);
    let a1 = atn.add_state(StateKind::Basic, 0);
    let a2 = atn.add_state(StateKind::Basic, 0);
    let a3 = atn.add_state(StateKind::Basic, 0);
    let b1 = atn.add_state(StateKind::Basic, 0);
    let b2 = atn.add_state(StateKind::Basic, 0);
    let b3 = atn.add_state(StateKind::Basic, 0);
    let end = atn.add_state(StateKind::BlockEnd { start_state: d }, 0);

    epsilon(&mut atn, start, d);
    epsilon(&mut atn, d, a1);
    epsilon(&mut atn, d, b1);
    atom(&mut atn, a1, a2, ID);
    atom(&mut atn, a2, a3, EOF);
    epsilon(&mut atn, a3, end);
    atom(&mut atn, b1, b2, ID);
    atom(&mut atn, b2, b3, ID);
    epsilon(&mut atn, b3, end);
    epsilon(&mut atn, end, stop);

    let decision = atn.register_decision(d);
    (atn, decision)
}

/// `s : ID | ID ;` — a genuinely ambiguous decision.
pub fn identical_alts_grammar() -> (Atn, DecisionId) {
    let mut atn = Atn::new(MAX_TOKEN);
    let start = rule_start(&mut atn, 0);
    let stop = atn.add_state(StateKind::RuleStop, 0);

    let d = atn.add_state(StateKind::Basic, 0);
    let a1 = atn.add_state(StateKind::Basic, 0);
    let a2 = atn.add_state(StateKind::Basic, 0);
    let b1 = atn.add_state(StateKind::Basic, 0);
    let b2 = atn.add_state(StateKind::Basic, 0);
    let end = atn.add_state(StateKind::BlockEnd { start_state: d }, 0);

    epsilon(&mut atn, start, d);
    epsilon(&mut atn, d, a1);
    epsilon(&mut atn, d, b1);
    atom(&mut atn, a1, a2, ID);
    epsilon(&mut atn, a2, end);
    atom(&mut atn, b1, b2, ID);
    epsilon(&mut atn, b2, end);
    epsilon(&mut atn, end, stop);

    let decision = atn.register_decision(d);
    (atn, decision)
}

/// `s : {p0}? ID | ID ;` — both alternatives match the same input; the
/// predicate decides.
pub fn predicated_grammar() -> (Atn, DecisionId) {
    let mut atn = Atn::new(MAX_TOKEN);
    let start = rule_start(&mut atn, 0);
    let stop = atn.add_state(StateKind::RuleStop, 0);

    let d = atn.add_state(StateKind::Basic, 0);
    let p1 = atn.add_state(StateKind::Basic, 0);
    let p2 = atn.add_state(StateKind::Basic, 0);
    let p3 = atn.add_state(StateKind::Basic, 0);
    let q1 = atn.add_state(StateKind::Basic, 0);
    let q2 = atn.add_state(StateKind::Basic, 0);
    let end = atn.add_state(StateKind::BlockEnd { start_state: d }, 0);

    epsilon(&mut atn, start, d);
    epsilon(&mut atn, d, p1);
    epsilon(&mut atn, d, q1);
    atn.add_transition(
        p1,
        Transition::Predicate { target: p2, rule: 0, pred_index: 0, is_ctx_dependent: false },
    );
    atom(&mut atn, p2, p3, ID);
    epsilon(&mut atn, p3, end);
    atom(&mut atn, q1, q2, ID);
    epsilon(&mut atn, q2, end);
    epsilon(&mut atn, end, stop);

    let decision = atn.register_decision(d);
    (atn, decision)
}

/// A decision whose outcome depends on the caller:
///
/// ```text
/// e : INT | ;        // the decision under test
/// a : e ID ;
/// b : e INT ID ;
/// ```
///
/// With lookahead `INT ID`, rule `a` needs `e` to match the INT while rule
/// `b` needs `e` to stay empty. SLL merges both call sites and conflicts;
/// full context resolves per caller.
///
/// Returns `(atn, decision, a_invoking_state, b_invoking_state)`.
pub fn caller_sensitive_grammar() -> (Atn, DecisionId, StateId, StateId) {
    let mut atn = Atn::new(MAX_TOKEN);
    // rule e = 0, a = 1, b = 2
    let e_start = rule_start(&mut atn, 0);
    let e_stop = atn.add_state(StateKind::RuleStop, 0);
    let d = atn.add_state(StateKind::Basic, 0);
    let x1 = atn.add_state(StateKind::Basic, 0);
    let x2 = atn.add_state(StateKind::Basic, 0);
    let skip = atn.add_state(StateKind::Basic, 0);
    let e_end = atn.add_state(StateKind::BlockEnd { start_state: d }, 0);

    epsilon(&mut atn, e_start, d);
    epsilon(&mut atn, d, x1);
    epsilon(&mut atn, d, skip);
    atom(&mut atn, x1, x2, INT);
    epsilon(&mut atn, x2, e_end);
    epsilon(&mut atn, skip, e_end);
    epsilon(&mut atn, e_end, e_stop);
    let decision = atn.register_decision(d);

    // a : e ID ;
    let a_start = rule_start(&mut atn, 1);
    let a_stop = atn.add_state(StateKind::RuleStop, 1);
    let qa = atn.add_state(StateKind::Basic, 1);
    let qa2 = atn.add_state(StateKind::Basic, 1);
    call(&mut atn, a_start, 0, e_start, e_stop, qa, 0, false);
    atom(&mut atn, qa, qa2, ID);
    epsilon(&mut atn, qa2, a_stop);

    // b : e INT ID ;
    let b_start = rule_start(&mut atn, 2);
    let b_stop = atn.add_state(StateKind::RuleStop, 2);
    let qb = atn.add_state(StateKind::Basic, 2);
    let qb2 = atn.add_state(StateKind::Basic, 2);
    let qb3 = atn.add_state(StateKind::Basic, 2);
    call(&mut atn, b_start, 0, e_start, e_stop, qb, 0, false);
    atom(&mut atn, qb, qb2, INT);
    atom(&mut atn, qb2, qb3, ID);
    epsilon(&mut atn, qb3, b_stop);

    (atn, decision, a_start, b_start)
}

/// Precedence-climbing form of `e : e '*' e | e '+' e | INT ;` with `'*'`
/// binding tighter, invoked from `s : e ;`:
///
/// ```text
/// e[p] : INT ( {3 >= p}? '*' e[4]
///            | {2 >= p}? '+' e[3] )* ;
/// ```
///
/// Returns `(atn, loop_decision, op_decision)`. The loop decision (enter
/// vs. exit) is the precedence decision; alternative 1 enters the loop.
pub fn left_recursive_expr_grammar() -> (Atn, DecisionId, DecisionId) {
    let mut atn = Atn::new(MAX_TOKEN);
    // rule e = 0, s = 1
    let e_start =
        atn.add_state(StateKind::RuleStart { stop_state: NO_STATE, is_left_recursive: true }, 0);
    let e_stop = atn.add_state(StateKind::RuleStop, 0);

    // primary
    let prim = atn.add_state(StateKind::Basic, 0);
    let after_prim = atn.add_state(StateKind::Basic, 0);
    epsilon(&mut atn, e_start, prim);
    atom(&mut atn, prim, after_prim, INT);

    // ( ... )* scaffolding
    let loop_back = atn.add_state(StateKind::StarLoopBack, 0);
    let loop_entry = atn.add_state(
        StateKind::StarLoopEntry { loopback: loop_back, precedence_decision: true },
        0,
    );
    let loop_end = atn.add_state(StateKind::LoopEnd { loopback: loop_back }, 0);
    let block_start = atn.add_state(StateKind::StarBlockStart { end_state: NO_STATE }, 0);
    let block_end = atn.add_state(StateKind::BlockEnd { start_state: block_start }, 0);

    epsilon(&mut atn, after_prim, loop_entry);
    epsilon(&mut atn, loop_entry, block_start);
    epsilon(&mut atn, loop_entry, loop_end);
    epsilon(&mut atn, block_end, loop_back);
    epsilon(&mut atn, loop_back, loop_entry);
    epsilon(&mut atn, loop_end, e_stop);

    // {3 >= p}? '*' e[4]
    let m1 = atn.add_state(StateKind::Basic, 0);
    let m2 = atn.add_state(StateKind::Basic, 0);
    let m3 = atn.add_state(StateKind::Basic, 0);
    epsilon(&mut atn, block_start, m1);
    atn.add_transition(m1, Transition::Precedence { target: m2, precedence: 3 });
    atom(&mut atn, m2, m3, MUL);
    call(&mut atn, m3, 0, e_start, e_stop, block_end, 4, true);

    // {2 >= p}? '+' e[3]
    let a1 = atn.add_state(StateKind::Basic, 0);
    let a2 = atn.add_state(StateKind::Basic, 0);
    let a3 = atn.add_state(StateKind::Basic, 0);
    epsilon(&mut atn, block_start, a1);
    atn.add_transition(a1, Transition::Precedence { target: a2, precedence: 2 });
    atom(&mut atn, a2, a3, ADD);
    call(&mut atn, a3, 0, e_start, e_stop, block_end, 3, true);

    let loop_decision = atn.register_decision(loop_entry);
    let op_decision = atn.register_decision(block_start);

    // s : e ; — the outermost call carries the marked return edge.
    let s_start = rule_start(&mut atn, 1);
    let s_stop = atn.add_state(StateKind::RuleStop, 1);
    let s_end = atn.add_state(StateKind::Basic, 1);
    call(&mut atn, s_start, 0, e_start, e_stop, s_end, 0, true);
    epsilon(&mut atn, s_end, s_stop);

    (atn, loop_decision, op_decision)
}
