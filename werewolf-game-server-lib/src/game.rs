//! Core state for a single match: participants, role assignment,
//! liveness, the lover pair, death processing and win evaluation.

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Arc;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::Deserialize;
use serde::Serialize;
use werewolf_game_lib::ActionKind;
use werewolf_game_lib::Actor;
use werewolf_game_lib::DeathCause;
use werewolf_game_lib::MatchStatus;
use werewolf_game_lib::ParticipantId;
use werewolf_game_lib::ParticipantInfo;
use werewolf_game_lib::Phase;
use werewolf_game_lib::Role;
use werewolf_game_lib::Team;
use werewolf_game_lib::Visibility;
use werewolf_game_lib::Winner;

use crate::action::Action;
use crate::action::ActionLog;
use crate::consts::death_phrase;
use crate::error::GameError;

/// What happens when the day vote ties.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum DayTieRule {
    /// Nobody is eliminated; the match moves on to night.
    NoElimination,
    /// One of the tied players is drawn at random.
    RandomVictim,
}

/// Rule knobs the base rule set leaves open. Surfaced as configuration
/// rather than guessed.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct MatchSettings {
    /// Witch poison ignores doctor and guard protection.
    pub witch_kill_pierces_protection: bool,
    pub day_tie_rule: DayTieRule,
    /// The Wolf Cub may be the pack's own kill target.
    pub wolf_cub_may_self_target: bool,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            witch_kill_pierces_protection: true,
            day_tie_rule: DayTieRule::NoElimination,
            wolf_cub_may_self_target: true,
        }
    }
}

/// One participant's slot in the match.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MatchPlayer {
    pub participant: ParticipantId,
    pub name: Arc<str>,
    /// Assigned at start, immutable afterwards. `None` for lobby members
    /// before start and for observers.
    pub role: Option<Role>,
    pub alive: bool,
    /// Joined mid-match; sees the public projection only and never acts.
    pub observer: bool,
}

impl MatchPlayer {
    pub fn info(&self) -> ParticipantInfo {
        ParticipantInfo {
            name: Arc::clone(&self.name),
            id: self.participant,
        }
    }
}

/// Death processing suspended while a hunter picks a revenge target.
/// Only that player's revenge shot is accepted while this is open.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct RevengeGate {
    pub hunter: ParticipantId,
    /// Deaths still to commit once the shot lands.
    pub queued: VecDeque<(ParticipantId, DeathCause)>,
}

/// Outcome of draining a death queue.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum DrainOutcome {
    Drained,
    /// A hunter died; the rest of the queue waits behind the gate.
    Gated,
}

pub struct MatchState {
    pub(crate) id: u64,
    pub(crate) status: MatchStatus,
    pub(crate) round: u32,
    pub(crate) players: BTreeMap<ParticipantId, MatchPlayer>,
    pub(crate) lovers: Option<(ParticipantId, ParticipantId)>,
    pub(crate) settings: MatchSettings,
    pub(crate) winner: Option<Winner>,
    pub(crate) gate: Option<RevengeGate>,
    /// Which phase's deaths are currently being committed.
    pub(crate) resolving: Option<Phase>,
    /// The pack gets a second kill round tonight.
    pub(crate) second_kill_round: bool,
    /// Arms `second_kill_round` at the next night entry.
    pub(crate) cub_died_this_round: bool,
    /// Players mutated since the last persistence drain.
    pub(crate) dirty_players: Vec<ParticipantId>,
}

impl MatchState {
    pub fn new(id: u64, settings: MatchSettings) -> Self {
        Self {
            id,
            status: MatchStatus::Lobby,
            round: 0,
            players: BTreeMap::new(),
            lovers: None,
            settings,
            winner: None,
            gate: None,
            resolving: None,
            second_kill_round: false,
            cub_died_this_round: false,
            dirty_players: Vec::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn status(&self) -> MatchStatus {
        self.status
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn winner(&self) -> Option<Winner> {
        self.winner
    }

    pub fn lovers(&self) -> Option<(ParticipantId, ParticipantId)> {
        self.lovers
    }

    pub fn settings(&self) -> &MatchSettings {
        &self.settings
    }

    pub fn player(&self, participant: ParticipantId) -> Option<&MatchPlayer> {
        self.players.get(&participant)
    }

    pub fn players(&self) -> impl Iterator<Item = &MatchPlayer> {
        self.players.values()
    }

    pub fn role_of(&self, participant: ParticipantId) -> Option<Role> {
        self.players.get(&participant).and_then(|p| p.role)
    }

    /// Alive, playing (non-observer) participant.
    pub fn is_alive(&self, participant: ParticipantId) -> bool {
        self.players
            .get(&participant)
            .is_some_and(|p| p.alive && !p.observer)
    }

    pub fn alive_ids(&self) -> Vec<ParticipantId> {
        self.players
            .values()
            .filter(|p| p.alive && !p.observer)
            .map(|p| p.participant)
            .collect()
    }

    pub fn alive_in_team(&self, team: Team) -> Vec<ParticipantId> {
        self.players
            .values()
            .filter(|p| p.alive && !p.observer && p.role.is_some_and(|r| r.is_team(team)))
            .map(|p| p.participant)
            .collect()
    }

    pub fn alive_with_role(&self, role: Role) -> Vec<ParticipantId> {
        self.players
            .values()
            .filter(|p| p.alive && !p.observer && p.role == Some(role))
            .map(|p| p.participant)
            .collect()
    }

    /// The hunter whose revenge shot everything is waiting on, if any.
    pub fn awaiting_revenge(&self) -> Option<ParticipantId> {
        self.gate.as_ref().map(|g| g.hunter)
    }

    pub fn add_lobby_member(
        &mut self,
        participant: ParticipantId,
        name: Arc<str>,
    ) -> Result<(), GameError> {
        if self.status != MatchStatus::Lobby {
            return Err(GameError::OutOfPhase(
                "the match has already started".to_string(),
            ));
        }

        self.players.entry(participant).or_insert_with(|| MatchPlayer {
            participant,
            name,
            role: None,
            alive: true,
            observer: false,
        });
        self.dirty_players.push(participant);

        Ok(())
    }

    pub fn remove_lobby_member(&mut self, participant: ParticipantId) -> Result<(), GameError> {
        if self.status != MatchStatus::Lobby {
            return Err(GameError::OutOfPhase(
                "the match has already started".to_string(),
            ));
        }

        self.players.remove(&participant);

        Ok(())
    }

    /// Records a mid-match connector as a non-playing observer.
    pub fn add_observer(
        &mut self,
        participant: ParticipantId,
        name: Arc<str>,
    ) -> Result<(), GameError> {
        if self.status == MatchStatus::Lobby {
            return Err(GameError::OutOfPhase(
                "the match is still in the lobby".to_string(),
            ));
        }

        self.players.entry(participant).or_insert_with(|| MatchPlayer {
            participant,
            name,
            role: None,
            alive: false,
            observer: true,
        });
        self.dirty_players.push(participant);

        Ok(())
    }

    /// Assigns roles and opens the first night. The quota total must
    /// match the lobby size and include at least one werewolf-team role.
    #[tracing::instrument(skip_all, fields(players = self.players.len()))]
    pub fn start(
        &mut self,
        quota: &BTreeMap<Role, u32>,
        rng: &mut impl Rng,
    ) -> Result<(), GameError> {
        if self.status != MatchStatus::Lobby {
            return Err(GameError::OutOfPhase(
                "the match has already started".to_string(),
            ));
        }

        let members = self
            .players
            .values()
            .filter(|p| !p.observer)
            .map(|p| p.participant)
            .collect::<Vec<_>>();

        let total = quota.values().sum::<u32>() as usize;
        if total != members.len() {
            return Err(GameError::CannotStart(format!(
                "role quota totals {} but the lobby holds {} players",
                total,
                members.len()
            )));
        }

        let wolves = quota
            .iter()
            .filter(|(role, _)| role.is_team(Team::Werewolves))
            .map(|(_, count)| count)
            .sum::<u32>();
        if wolves == 0 {
            return Err(GameError::CannotStart(
                "need at least one werewolf-team role".to_string(),
            ));
        }

        let mut pool = Vec::with_capacity(total);
        for (&role, &count) in quota {
            pool.extend(std::iter::repeat_n(role, count as usize));
        }
        pool.shuffle(rng);

        for (participant, role) in members.into_iter().zip(pool) {
            let player = self.players.get_mut(&participant).expect("lobby member");
            player.role = Some(role);
            self.dirty_players.push(participant);
        }

        self.status = MatchStatus::Night;
        self.round = 1;

        tracing::info!(round = self.round, "match started");

        Ok(())
    }

    /// Records the hunter's revenge shot and resumes death processing.
    #[tracing::instrument(skip(self, log), fields(round = self.round))]
    pub fn submit_hunter_revenge(
        &mut self,
        actor: ParticipantId,
        target: ParticipantId,
        log: &mut ActionLog,
    ) -> Result<(), GameError> {
        let Some(gate) = self.gate.as_ref() else {
            return Err(GameError::OutOfPhase(
                "no revenge shot is pending".to_string(),
            ));
        };
        if gate.hunter != actor {
            return Err(GameError::RoleForbids(
                "the pending revenge shot is not yours".to_string(),
            ));
        }
        if actor == target {
            return Err(GameError::InvalidTarget(
                "cannot shoot yourself".to_string(),
            ));
        }
        self.require_alive_target(target)?;

        let phase = self.resolving_phase();
        let actor_name = Arc::clone(&self.players[&actor].name);
        let target_name = Arc::clone(&self.players[&target].name);

        log.record(Action {
            round: self.round,
            phase,
            actor: Actor::Player(actor),
            kind: ActionKind::HunterRevenge,
            target: Some(target),
            visibility: Visibility::Public,
            description: format!("{actor_name} takes {target_name} with their final shot"),
            cause: None,
        })?;

        let gate = self.gate.take().expect("gate checked above");
        let mut queue = gate.queued;
        queue.push_front((target, DeathCause::HunterRevenge));

        match self.drain_deaths(queue, log)? {
            DrainOutcome::Gated => Ok(()),
            DrainOutcome::Drained => self.finish_resolution(log),
        }
    }

    /// Commits queued deaths in order, processing lover-heartbreak and
    /// hunter-revenge cascades between commits. A hunter death leaves the
    /// remainder of the queue behind the revenge gate.
    pub(crate) fn drain_deaths(
        &mut self,
        mut queue: VecDeque<(ParticipantId, DeathCause)>,
        log: &mut ActionLog,
    ) -> Result<DrainOutcome, GameError> {
        while let Some((victim, cause)) = queue.pop_front() {
            if !self.is_alive(victim) {
                continue;
            }

            self.commit_death(victim, cause, log)?;

            if let Some((a, b)) = self.lovers {
                let partner = match victim {
                    v if v == a => Some(b),
                    v if v == b => Some(a),
                    _ => None,
                };
                if let Some(partner) = partner
                    && self.is_alive(partner)
                {
                    queue.push_front((partner, DeathCause::LoverHeartbreak));
                }
            }

            if self.role_of(victim) == Some(Role::Hunter) {
                self.gate = Some(RevengeGate {
                    hunter: victim,
                    queued: queue,
                });
                return Ok(DrainOutcome::Gated);
            }
        }

        Ok(DrainOutcome::Drained)
    }

    fn commit_death(
        &mut self,
        victim: ParticipantId,
        cause: DeathCause,
        log: &mut ActionLog,
    ) -> Result<(), GameError> {
        let phase = self.resolving_phase();
        let round = self.round;

        let player = self
            .players
            .get_mut(&victim)
            .ok_or_else(|| GameError::Internal(format!("death of unknown player {victim:?}")))?;
        player.alive = false;
        self.dirty_players.push(victim);

        if self.players[&victim].role == Some(Role::WolfCub) {
            self.cub_died_this_round = true;
        }

        let name = Arc::clone(&self.players[&victim].name);
        log.record(Action {
            round,
            phase,
            actor: Actor::Player(victim),
            kind: ActionKind::Death,
            target: None,
            visibility: Visibility::ResolvedPublic,
            description: format!("{name} {}", death_phrase(cause, round as usize + victim.0)),
            cause: Some(cause),
        })?;

        tracing::info!(?victim, ?cause, round, "death committed");

        Ok(())
    }

    /// Finishes the suspended resolution once the death queue has fully
    /// drained.
    pub(crate) fn finish_resolution(&mut self, log: &mut ActionLog) -> Result<(), GameError> {
        match self.resolving_phase() {
            Phase::Night => self.finish_night(log),
            Phase::Day => self.finish_day(),
        }
    }

    pub(crate) fn resolving_phase(&self) -> Phase {
        self.resolving.unwrap_or(match self.status {
            MatchStatus::Day => Phase::Day,
            _ => Phase::Night,
        })
    }

    /// Lovers alone together beat every other condition; then a cleared
    /// board for the villagers; then pack parity for the wolves. Parity
    /// is only checked when a day resolves: a pack matching the village
    /// overnight still has to survive the morning vote.
    pub(crate) fn evaluate_winner(&self, include_parity: bool) -> Option<Winner> {
        let alive = self
            .players
            .values()
            .filter(|p| p.alive && !p.observer)
            .collect::<Vec<_>>();

        if let Some((a, b)) = self.lovers
            && alive.len() == 2
            && alive.iter().all(|p| p.participant == a || p.participant == b)
        {
            return Some(Winner::Lovers);
        }

        let wolves = alive
            .iter()
            .filter(|p| p.role.is_some_and(|r| r.is_team(Team::Werewolves)))
            .count();

        if wolves == 0 {
            return Some(Winner::Villagers);
        }
        if include_parity && wolves * 2 >= alive.len() {
            return Some(Winner::Werewolves);
        }

        None
    }

    pub(crate) fn conclude(&mut self, winner: Winner) {
        tracing::info!(?winner, round = self.round, "match finished");
        self.winner = Some(winner);
        self.status = MatchStatus::Finished;
        self.resolving = None;
    }

    pub(crate) fn enter_night(&mut self) {
        self.round += 1;
        self.status = MatchStatus::Night;
        self.resolving = None;
        self.second_kill_round = std::mem::take(&mut self.cub_died_this_round);
        tracing::info!(
            round = self.round,
            second_kill = self.second_kill_round,
            "night falls"
        );
    }

    /// Players mutated since the last drain, for persistence.
    pub(crate) fn take_dirty_players(&mut self) -> Vec<ParticipantId> {
        let mut ids = std::mem::take(&mut self.dirty_players);
        ids.sort();
        ids.dedup();
        ids
    }

    pub(crate) fn require_alive_role(
        &self,
        actor: ParticipantId,
        roles: &[Role],
        what: &str,
    ) -> Result<Role, GameError> {
        let player = self
            .players
            .get(&actor)
            .ok_or(GameError::NotInMatch(actor))?;
        if player.observer {
            return Err(GameError::NotInMatch(actor));
        }
        if !player.alive {
            return Err(GameError::NotAlive(actor));
        }
        match player.role {
            Some(role) if roles.contains(&role) => Ok(role),
            _ => Err(GameError::RoleForbids(format!("only {what} may do this"))),
        }
    }

    pub(crate) fn require_alive_player(
        &self,
        actor: ParticipantId,
    ) -> Result<&MatchPlayer, GameError> {
        let player = self
            .players
            .get(&actor)
            .ok_or(GameError::NotInMatch(actor))?;
        if player.observer {
            return Err(GameError::NotInMatch(actor));
        }
        if !player.alive {
            return Err(GameError::NotAlive(actor));
        }
        Ok(player)
    }

    pub(crate) fn require_alive_target(&self, target: ParticipantId) -> Result<(), GameError> {
        if !self.is_alive(target) {
            return Err(GameError::InvalidTarget(format!(
                "{target:?} is not an alive player"
            )));
        }
        Ok(())
    }

    pub(crate) fn require_open(&self, status: MatchStatus, what: &str) -> Result<(), GameError> {
        if self.status != status {
            return Err(GameError::OutOfPhase(format!("{what} is not open now")));
        }
        if self.gate.is_some() {
            return Err(GameError::OutOfPhase(
                "waiting on a revenge shot".to_string(),
            ));
        }
        Ok(())
    }
}
