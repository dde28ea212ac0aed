//! Append-only log of recorded role actions. The log is the durable
//! source of truth for what happened; everything except the cached
//! liveness flag is recomputed by scanning it.

use std::collections::HashMap;
use std::collections::HashSet;

use serde::Deserialize;
use serde::Serialize;
use werewolf_game_lib::ActionKind;
use werewolf_game_lib::Actor;
use werewolf_game_lib::DeathCause;
use werewolf_game_lib::ParticipantId;
use werewolf_game_lib::Phase;
use werewolf_game_lib::RecordedVote;
use werewolf_game_lib::Visibility;

use crate::error::GameError;

/// A recorded role action. Unique per (round, phase, actor, kind).
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Action {
    pub round: u32,
    pub phase: Phase,
    pub actor: Actor,
    pub kind: ActionKind,
    pub target: Option<ParticipantId>,
    pub visibility: Visibility,
    pub description: String,
    /// Set on `Death` rows only.
    pub cause: Option<DeathCause>,
}

/// Outcome of a [`ActionLog::record`] call.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Recorded {
    Inserted,
    /// An existing row had its target replaced.
    Retargeted,
    /// The identical row already existed; nothing changed.
    Unchanged,
}

#[derive(Default)]
pub struct ActionLog {
    entries: Vec<Action>,
    index: HashMap<(u32, Phase, Actor, ActionKind), usize>,
    /// Indices touched since the last [`ActionLog::take_dirty`] drain.
    dirty: Vec<usize>,
}

impl ActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a log from persisted rows, in insertion order.
    pub fn from_rows(rows: Vec<Action>) -> Self {
        let mut log = Self::new();
        for row in rows {
            let key = (row.round, row.phase, row.actor, row.kind);
            log.index.insert(key, log.entries.len());
            log.entries.push(row);
        }
        log
    }

    /// Appends an action, or replaces the target of an existing row when
    /// the kind permits retargeting. Any other duplicate is a conflict.
    pub fn record(&mut self, action: Action) -> Result<Recorded, GameError> {
        let key = (action.round, action.phase, action.actor, action.kind);

        if let Some(&idx) = self.index.get(&key) {
            let existing = &mut self.entries[idx];

            if *existing == action {
                return Ok(Recorded::Unchanged);
            }

            if action.kind.retargetable() {
                existing.target = action.target;
                existing.description = action.description;
                self.dirty.push(idx);
                return Ok(Recorded::Retargeted);
            }

            return Err(GameError::DuplicateAction(format!(
                "{:?} already recorded a {:?} this phase",
                action.actor, action.kind
            )));
        }

        let idx = self.entries.len();
        self.index.insert(key, idx);
        self.entries.push(action);
        self.dirty.push(idx);
        Ok(Recorded::Inserted)
    }

    pub fn entries(&self) -> &[Action] {
        &self.entries
    }

    pub fn get(
        &self,
        round: u32,
        phase: Phase,
        actor: Actor,
        kind: ActionKind,
    ) -> Option<&Action> {
        self.index
            .get(&(round, phase, actor, kind))
            .map(|&idx| &self.entries[idx])
    }

    pub fn has(&self, round: u32, phase: Phase, actor: ParticipantId, kind: ActionKind) -> bool {
        self.index
            .contains_key(&(round, phase, Actor::Player(actor), kind))
    }

    /// Rows touched since the last drain, for persistence.
    pub fn take_dirty(&mut self) -> Vec<Action> {
        let mut seen = HashSet::new();
        self.dirty
            .drain(..)
            .filter(|idx| seen.insert(*idx))
            .map(|idx| self.entries[idx].clone())
            .collect::<Vec<_>>()
    }

    fn rows(&self, round: u32, phase: Phase, kind: ActionKind) -> impl Iterator<Item = &Action> {
        self.entries
            .iter()
            .filter(move |a| a.round == round && a.phase == phase && a.kind == kind)
    }

    /// Kill votes and passes for one werewolf kill round, for the pack's
    /// shared view.
    pub fn pack_votes(&self, round: u32, second: bool) -> Vec<RecordedVote> {
        let (vote_kind, pass_kind) = if second {
            (ActionKind::WerewolfKill2, ActionKind::WerewolfPass2)
        } else {
            (ActionKind::WerewolfKill, ActionKind::WerewolfPass)
        };

        self.entries
            .iter()
            .filter(|a| a.round == round && a.phase == Phase::Night)
            .filter(|a| a.kind == vote_kind || a.kind == pass_kind)
            .filter_map(|a| match a.actor {
                Actor::Player(voter) => Some(RecordedVote {
                    voter,
                    target: if a.kind == vote_kind { a.target } else { None },
                }),
                Actor::System => None,
            })
            .collect()
    }

    /// The target holding a strict majority of the recorded rows of
    /// `kind`, if any. A tie, or no rows at all, yields `None`.
    pub fn majority_target(&self, round: u32, phase: Phase, kind: ActionKind) -> Option<ParticipantId> {
        let mut total = 0usize;
        let mut counts: HashMap<ParticipantId, usize> = HashMap::new();

        for action in self.rows(round, phase, kind) {
            if let Some(target) = action.target {
                total += 1;
                *counts.entry(target).or_insert(0) += 1;
            }
        }

        counts
            .into_iter()
            .find(|(_, count)| count * 2 > total)
            .map(|(target, _)| target)
    }

    /// The targets tied for the highest count of recorded rows of `kind`.
    /// A strict plurality comes back as a single-element vector.
    pub fn plurality_targets(&self, round: u32, phase: Phase, kind: ActionKind) -> Vec<ParticipantId> {
        let mut counts: HashMap<ParticipantId, usize> = HashMap::new();

        for action in self.rows(round, phase, kind) {
            if let Some(target) = action.target {
                *counts.entry(target).or_insert(0) += 1;
            }
        }

        let Some(&top) = counts.values().max() else {
            return Vec::new();
        };

        let mut leaders = counts
            .into_iter()
            .filter(|(_, count)| *count == top)
            .map(|(target, _)| target)
            .collect::<Vec<_>>();
        leaders.sort();
        leaders
    }

    /// Whether the witch spent the given potion in a round before `round`.
    pub fn potion_spent_before(&self, kind: ActionKind, round: u32) -> bool {
        self.entries
            .iter()
            .any(|a| a.kind == kind && a.round < round)
    }

    /// The guard's recorded protection target for a round, if any.
    pub fn guard_target(&self, round: u32) -> Option<ParticipantId> {
        self.entries
            .iter()
            .find(|a| a.round == round && a.phase == Phase::Night && a.kind == ActionKind::GuardProtect)
            .and_then(|a| a.target)
    }

    /// Everyone shielded by the doctor or the guard this round.
    pub fn protected_players(&self, round: u32) -> HashSet<ParticipantId> {
        self.entries
            .iter()
            .filter(|a| a.round == round && a.phase == Phase::Night)
            .filter(|a| matches!(a.kind, ActionKind::DoctorProtect | ActionKind::GuardProtect))
            .filter_map(|a| a.target)
            .collect()
    }

    /// The witch's poison target recorded this round, if any.
    pub fn witch_kill_target(&self, round: u32) -> Option<ParticipantId> {
        self.entries
            .iter()
            .find(|a| a.round == round && a.phase == Phase::Night && a.kind == ActionKind::WitchKill)
            .and_then(|a| a.target)
    }

    /// Witch heal targets recorded this round.
    pub fn healed_players(&self, round: u32) -> HashSet<ParticipantId> {
        self.entries
            .iter()
            .filter(|a| a.round == round && a.phase == Phase::Night && a.kind == ActionKind::WitchHeal)
            .filter_map(|a| a.target)
            .collect()
    }

    /// Deaths committed in the given half-round, in commit order.
    pub fn deaths_in(&self, round: u32, phase: Phase) -> Vec<(ParticipantId, DeathCause)> {
        self.rows(round, phase, ActionKind::Death)
            .filter_map(|a| match (a.actor, a.cause) {
                (Actor::Player(p), Some(cause)) => Some((p, cause)),
                _ => None,
            })
            .collect()
    }
}
