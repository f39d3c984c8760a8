//! Semantic context: the predicate tree attached to a configuration.
//!
//! Under SLL prediction, predicates encountered during closure are not
//! evaluated; they are collected into this tree and deferred to accept time.
//! Under full-context prediction they are evaluated immediately. The tree is
//! immutable and structurally compared, so configurations that collect the
//! same predicates stay deduplicated.

use std::sync::{Arc, OnceLock};

use crate::{Recognizer, RuleId};

/// A predicate tree. `And`/`Or` operands are kept sorted and deduplicated so
/// that structurally equal trees compare equal regardless of collection
/// order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SemanticContext {
    /// The always-true context; the absence of any predicate.
    None,
    /// A grammar semantic predicate, evaluated by the recognizer.
    Predicate { rule: RuleId, pred_index: u32, is_ctx_dependent: bool },
    /// A precedence predicate of a left-recursive rule.
    Precedence { precedence: i32 },
    /// All operands must hold.
    And(Vec<SemanticContext>),
    /// At least one operand must hold.
    Or(Vec<SemanticContext>),
}

impl SemanticContext {
    /// Shared `None` instance; configurations overwhelmingly carry this.
    pub fn none() -> Arc<SemanticContext> {
        static NONE: OnceLock<Arc<SemanticContext>> = OnceLock::new();
        NONE.get_or_init(|| Arc::new(SemanticContext::None)).clone()
    }

    pub fn is_none(&self) -> bool {
        matches!(self, SemanticContext::None)
    }

    /// Conjunction with simplification: `None` is the identity, nested
    /// `And`s are flattened, duplicates removed, and a single survivor is
    /// returned unwrapped.
    pub fn and(a: &Arc<SemanticContext>, b: &Arc<SemanticContext>) -> Arc<SemanticContext> {
        if a.is_none() {
            return b.clone();
        }
        if b.is_none() {
            return a.clone();
        }
        let mut operands = Vec::new();
        Self::collect(a, true, &mut operands);
        Self::collect(b, true, &mut operands);
        operands.sort();
        operands.dedup();
        if operands.len() == 1 {
            return Arc::new(operands.pop().unwrap());
        }
        Arc::new(SemanticContext::And(operands))
    }

    /// Disjunction with the dual simplifications of [`and`](Self::and).
    /// A `None` operand makes the whole disjunction vacuous.
    pub fn or(a: &Arc<SemanticContext>, b: &Arc<SemanticContext>) -> Arc<SemanticContext> {
        if a.is_none() || b.is_none() {
            return Self::none();
        }
        let mut operands = Vec::new();
        Self::collect(a, false, &mut operands);
        Self::collect(b, false, &mut operands);
        operands.sort();
        operands.dedup();
        if operands.len() == 1 {
            return Arc::new(operands.pop().unwrap());
        }
        Arc::new(SemanticContext::Or(operands))
    }

    fn collect(ctx: &SemanticContext, conjunction: bool, out: &mut Vec<SemanticContext>) {
        match (ctx, conjunction) {
            (SemanticContext::And(ops), true) | (SemanticContext::Or(ops), false) => {
                out.extend(ops.iter().cloned())
            }
            _ => out.push(ctx.clone()),
        }
    }

    /// Evaluate the full tree against the recognizer.
    pub fn eval<R: Recognizer>(&self, recog: &mut R) -> bool {
        match self {
            SemanticContext::None => true,
            SemanticContext::Predicate { rule, pred_index, .. } => {
                recog.sempred(*rule, *pred_index)
            }
            SemanticContext::Precedence { precedence } => recog.precpred(*precedence),
            SemanticContext::And(ops) => ops.iter().all(|op| op.eval(recog)),
            SemanticContext::Or(ops) => ops.iter().any(|op| op.eval(recog)),
        }
    }

    /// Partially evaluate: resolve precedence predicates now, keep semantic
    /// predicates symbolic. Returns `None` when the context is unsatisfiable
    /// at the current precedence, otherwise the residual tree.
    pub fn eval_precedence<R: Recognizer>(
        self: &Arc<SemanticContext>,
        recog: &mut R,
    ) -> Option<Arc<SemanticContext>> {
        match self.as_ref() {
            SemanticContext::None | SemanticContext::Predicate { .. } => Some(self.clone()),
            SemanticContext::Precedence { precedence } => {
                if recog.precpred(*precedence) {
                    Some(Self::none())
                } else {
                    None
                }
            }
            SemanticContext::And(ops) => {
                let mut residual = Self::none();
                let mut changed = false;
                for op in ops {
                    let arc = Arc::new(op.clone());
                    let evaluated = arc.eval_precedence(recog)?;
                    changed |= evaluated != arc;
                    residual = Self::and(&residual, &evaluated);
                }
                if changed { Some(residual) } else { Some(self.clone()) }
            }
            SemanticContext::Or(ops) => {
                let mut residual: Option<Arc<SemanticContext>> = None;
                let mut changed = false;
                for op in ops {
                    let arc = Arc::new(op.clone());
                    match arc.eval_precedence(recog) {
                        Some(evaluated) => {
                            if evaluated.is_none() {
                                // One disjunct is vacuously true.
                                return Some(Self::none());
                            }
                            changed |= evaluated != arc;
                            residual = Some(match residual {
                                Some(acc) => Self::or(&acc, &evaluated),
                                None => evaluated,
                            });
                        }
                        None => changed = true,
                    }
                }
                if !changed {
                    return Some(self.clone());
                }
                residual
            }
        }
    }
}
