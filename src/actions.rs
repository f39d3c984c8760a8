//! Lexer actions: recorded during matching, replayed at commit time.
//!
//! While the lexer simulates, actions encountered on the path are collected
//! into an executor instead of being executed — the match may yet be
//! extended or abandoned. When the simulator commits to the furthest accept
//! checkpoint it replays the recorded actions against the host. Position-
//! dependent actions are rebased to an offset from the token start so that
//! structurally identical suffixes of different tokens can still share DFA
//! states.

use std::sync::Arc;

use crate::stream::IntStream;
use crate::{LexerHost, RuleId};

/// One lexer command or embedded action.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LexerAction {
    /// Discard the matched token.
    Skip,
    /// Fold the match into the next token.
    More,
    /// Pop the lexer mode stack.
    PopMode,
    /// Switch to a mode.
    Mode(usize),
    /// Push the current mode and switch.
    PushMode(usize),
    /// Assign the token to a channel.
    Channel(i32),
    /// Override the token type.
    Type(i32),
    /// Grammar-embedded custom action, executed by the host.
    Custom { rule: RuleId, action_index: u32 },
}

impl LexerAction {
    /// Whether the action observes the input cursor when executed. Such
    /// actions must run with the cursor placed where the action appeared,
    /// not at the end of the token.
    pub fn is_position_dependent(&self) -> bool {
        matches!(self, LexerAction::Custom { .. })
    }
}

/// An immutable, shareable sequence of recorded actions.
///
/// Entries carry an optional input offset (from token start); offsets are
/// assigned by [`fix_offset_before_match`](Self::fix_offset_before_match)
/// the first time a path with pending position-dependent actions consumes a
/// character past them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct LexerActionExecutor {
    actions: Vec<(Option<usize>, LexerAction)>,
}

impl LexerActionExecutor {
    /// Extend `prev` (possibly absent) with one more action.
    pub fn append(prev: Option<&Arc<LexerActionExecutor>>, action: LexerAction) -> Arc<Self> {
        let mut actions = prev.map(|e| e.actions.clone()).unwrap_or_default();
        actions.push((None, action));
        Arc::new(LexerActionExecutor { actions })
    }

    /// Pin every not-yet-indexed position-dependent action to `offset`.
    /// Returns `self` unchanged when there is nothing to pin.
    pub fn fix_offset_before_match(self: &Arc<Self>, offset: usize) -> Arc<Self> {
        if !self
            .actions
            .iter()
            .any(|(off, a)| off.is_none() && a.is_position_dependent())
        {
            return self.clone();
        }
        let actions = self
            .actions
            .iter()
            .map(|(off, a)| {
                if off.is_none() && a.is_position_dependent() {
                    (Some(offset), a.clone())
                } else {
                    (*off, a.clone())
                }
            })
            .collect();
        Arc::new(LexerActionExecutor { actions })
    }

    pub fn actions(&self) -> &[(Option<usize>, LexerAction)] {
        &self.actions
    }

    /// Replay the recorded actions. `start_index` is the first character of
    /// the committed token; the cursor is restored to the commit position
    /// afterwards.
    pub fn execute<H: LexerHost, S: IntStream + ?Sized>(
        &self,
        host: &mut H,
        input: &mut S,
        start_index: usize,
    ) {
        let stop_index = input.index();
        let mut requires_seek = false;
        for (offset, action) in &self.actions {
            if let Some(off) = offset {
                input.seek(start_index + off);
                requires_seek = start_index + off != stop_index;
            } else if action.is_position_dependent() {
                input.seek(stop_index);
                requires_seek = false;
            }
            Self::apply(host, action);
        }
        if requires_seek {
            input.seek(stop_index);
        }
    }

    fn apply<H: LexerHost>(host: &mut H, action: &LexerAction) {
        match action {
            LexerAction::Skip => host.skip(),
            LexerAction::More => host.more(),
            LexerAction::PopMode => host.pop_mode(),
            LexerAction::Mode(m) => host.set_mode(*m),
            LexerAction::PushMode(m) => host.push_mode(*m),
            LexerAction::Channel(c) => host.set_channel(*c),
            LexerAction::Type(t) => host.set_type(*t),
            LexerAction::Custom { rule, action_index } => host.action(*rule, *action_index),
        }
    }
}
