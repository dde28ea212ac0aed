//! The night state machine: per-role submissions, act-completeness, and
//! the ordered resolution that turns recorded actions into deaths.

use std::collections::VecDeque;
use std::sync::Arc;

use werewolf_game_lib::ActionKind;
use werewolf_game_lib::Actor;
use werewolf_game_lib::DeathCause;
use werewolf_game_lib::MatchStatus;
use werewolf_game_lib::ParticipantId;
use werewolf_game_lib::Phase;
use werewolf_game_lib::Role;
use werewolf_game_lib::Team;
use werewolf_game_lib::Visibility;

use crate::action::Action;
use crate::action::ActionLog;
use crate::error::GameError;
use crate::game::DrainOutcome;
use crate::game::MatchState;

const PACK: &[Role] = &[Role::Werewolf, Role::WolfCub];

fn kill_round_kinds(second: bool) -> (ActionKind, ActionKind, ActionKind) {
    if second {
        (
            ActionKind::WerewolfKill2,
            ActionKind::WerewolfPass2,
            ActionKind::WerewolfEndVote2,
        )
    } else {
        (
            ActionKind::WerewolfKill,
            ActionKind::WerewolfPass,
            ActionKind::WerewolfEndVote,
        )
    }
}

impl MatchState {
    fn night_action(
        &self,
        actor: ParticipantId,
        kind: ActionKind,
        target: Option<ParticipantId>,
        visibility: Visibility,
        description: String,
    ) -> Action {
        Action {
            round: self.round,
            phase: Phase::Night,
            actor: Actor::Player(actor),
            kind,
            target,
            visibility,
            description,
            cause: None,
        }
    }

    fn require_second_round(&self, second: bool) -> Result<(), GameError> {
        if second && !self.second_kill_round {
            return Err(GameError::OutOfPhase(
                "there is no second kill round tonight".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether a werewolf kill round has been locked by an end-vote.
    pub fn wolf_vote_locked(&self, log: &ActionLog, second: bool) -> bool {
        let (_, _, end_kind) = kill_round_kinds(second);
        log.entries()
            .iter()
            .any(|a| a.round == self.round && a.phase == Phase::Night && a.kind == end_kind)
    }

    /// Both kill rounds (where active) are locked and the wolf result for
    /// the night is final.
    pub fn wolves_locked(&self, log: &ActionLog) -> bool {
        self.wolf_vote_locked(log, false)
            && (!self.second_kill_round || self.wolf_vote_locked(log, true))
    }

    #[tracing::instrument(skip(self, log), fields(round = self.round))]
    pub fn submit_werewolf_vote(
        &mut self,
        actor: ParticipantId,
        target: ParticipantId,
        second: bool,
        log: &mut ActionLog,
    ) -> Result<(), GameError> {
        self.require_open(MatchStatus::Night, "the night")?;
        let role = self.require_alive_role(actor, PACK, "the pack")?;
        self.require_second_round(second)?;

        if self.wolf_vote_locked(log, second) {
            return Err(GameError::OutOfPhase(
                "the pack has locked its vote".to_string(),
            ));
        }

        self.require_alive_target(target)?;
        if actor == target && !(role == Role::WolfCub && self.settings().wolf_cub_may_self_target)
        {
            return Err(GameError::InvalidTarget(
                "cannot target yourself".to_string(),
            ));
        }

        let (kill_kind, _, _) = kill_round_kinds(second);
        let actor_name = Arc::clone(&self.players[&actor].name);
        let target_name = Arc::clone(&self.players[&target].name);

        log.record(self.night_action(
            actor,
            kill_kind,
            Some(target),
            Visibility::TeamWerewolf,
            format!("{actor_name} votes for the pack to kill {target_name}"),
        ))?;

        Ok(())
    }

    #[tracing::instrument(skip(self, log), fields(round = self.round))]
    pub fn submit_werewolf_pass(
        &mut self,
        actor: ParticipantId,
        second: bool,
        log: &mut ActionLog,
    ) -> Result<(), GameError> {
        self.require_open(MatchStatus::Night, "the night")?;
        self.require_alive_role(actor, PACK, "the pack")?;
        self.require_second_round(second)?;

        if self.wolf_vote_locked(log, second) {
            return Err(GameError::OutOfPhase(
                "the pack has locked its vote".to_string(),
            ));
        }

        let (_, pass_kind, _) = kill_round_kinds(second);
        let actor_name = Arc::clone(&self.players[&actor].name);

        log.record(self.night_action(
            actor,
            pass_kind,
            None,
            Visibility::TeamWerewolf,
            format!("{actor_name} passes on the pack kill"),
        ))?;

        Ok(())
    }

    /// Locks a kill round on behalf of the whole pack. Accepted from any
    /// alive pack member once every alive pack member has voted or
    /// passed.
    #[tracing::instrument(skip(self, log), fields(round = self.round))]
    pub fn submit_werewolf_end_vote(
        &mut self,
        actor: ParticipantId,
        second: bool,
        log: &mut ActionLog,
    ) -> Result<(), GameError> {
        self.require_open(MatchStatus::Night, "the night")?;
        self.require_alive_role(actor, PACK, "the pack")?;
        self.require_second_round(second)?;

        if self.wolf_vote_locked(log, second) {
            return Err(GameError::OutOfPhase(
                "the pack vote is already locked".to_string(),
            ));
        }

        let (kill_kind, pass_kind, end_kind) = kill_round_kinds(second);
        let undecided = self
            .alive_in_team(Team::Werewolves)
            .into_iter()
            .filter(|&wolf| {
                !log.has(self.round, Phase::Night, wolf, kill_kind)
                    && !log.has(self.round, Phase::Night, wolf, pass_kind)
            })
            .count();
        if undecided > 0 {
            return Err(GameError::OutOfPhase(
                "the pack has not finished voting".to_string(),
            ));
        }

        let actor_name = Arc::clone(&self.players[&actor].name);
        log.record(self.night_action(
            actor,
            end_kind,
            None,
            Visibility::TeamWerewolf,
            format!("{actor_name} ends the pack vote"),
        ))?;

        Ok(())
    }

    #[tracing::instrument(skip(self, log), fields(round = self.round))]
    pub fn submit_seer_investigate(
        &mut self,
        actor: ParticipantId,
        target: ParticipantId,
        log: &mut ActionLog,
    ) -> Result<(), GameError> {
        self.require_open(MatchStatus::Night, "the night")?;
        self.require_alive_role(actor, &[Role::Seer], "the seer")?;
        self.require_alive_target(target)?;
        if actor == target {
            return Err(GameError::InvalidTarget(
                "cannot investigate yourself".to_string(),
            ));
        }

        let team = self
            .role_of(target)
            .map(|r| r.team())
            .ok_or_else(|| GameError::Internal(format!("alive player {target:?} has no role")))?;
        let actor_name = Arc::clone(&self.players[&actor].name);
        let target_name = Arc::clone(&self.players[&target].name);

        log.record(self.night_action(
            actor,
            ActionKind::SeerInvestigate,
            Some(target),
            Visibility::ActorOnly,
            format!("{actor_name} investigates {target_name}: {team:?}"),
        ))?;

        Ok(())
    }

    #[tracing::instrument(skip(self, log), fields(round = self.round))]
    pub fn submit_doctor_protect(
        &mut self,
        actor: ParticipantId,
        target: ParticipantId,
        log: &mut ActionLog,
    ) -> Result<(), GameError> {
        self.require_open(MatchStatus::Night, "the night")?;
        self.require_alive_role(actor, &[Role::Doctor], "the doctor")?;
        self.require_alive_target(target)?;

        let actor_name = Arc::clone(&self.players[&actor].name);
        let target_name = Arc::clone(&self.players[&target].name);

        log.record(self.night_action(
            actor,
            ActionKind::DoctorProtect,
            Some(target),
            Visibility::ActorOnly,
            format!("{actor_name} shields {target_name} for the night"),
        ))?;

        Ok(())
    }

    /// The guard may not protect themselves, nor repeat the previous
    /// round's target.
    #[tracing::instrument(skip(self, log), fields(round = self.round))]
    pub fn submit_guard_protect(
        &mut self,
        actor: ParticipantId,
        target: ParticipantId,
        log: &mut ActionLog,
    ) -> Result<(), GameError> {
        self.require_open(MatchStatus::Night, "the night")?;
        self.require_alive_role(actor, &[Role::Guard], "the guard")?;
        self.require_alive_target(target)?;
        if actor == target {
            return Err(GameError::InvalidTarget(
                "cannot protect yourself".to_string(),
            ));
        }
        if self.round > 1 && log.guard_target(self.round - 1) == Some(target) {
            return Err(GameError::InvalidTarget(
                "cannot protect the same player twice in a row".to_string(),
            ));
        }

        let actor_name = Arc::clone(&self.players[&actor].name);
        let target_name = Arc::clone(&self.players[&target].name);

        log.record(self.night_action(
            actor,
            ActionKind::GuardProtect,
            Some(target),
            Visibility::ActorOnly,
            format!("{actor_name} stands guard over {target_name}"),
        ))?;

        Ok(())
    }

    /// Witch submissions are only accepted once the wolf result for the
    /// night is final, and none after she has retired.
    fn require_witch_turn(&self, actor: ParticipantId, log: &ActionLog) -> Result<(), GameError> {
        self.require_open(MatchStatus::Night, "the night")?;
        self.require_alive_role(actor, &[Role::Witch], "the witch")?;
        if !self.wolves_locked(log) {
            return Err(GameError::OutOfPhase(
                "the pack has not finished voting".to_string(),
            ));
        }
        if log.has(self.round, Phase::Night, actor, ActionKind::WitchPass) {
            return Err(GameError::OutOfPhase(
                "the witch has already retired for the night".to_string(),
            ));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, log), fields(round = self.round))]
    pub fn submit_witch_heal(
        &mut self,
        actor: ParticipantId,
        target: ParticipantId,
        log: &mut ActionLog,
    ) -> Result<(), GameError> {
        self.require_witch_turn(actor, log)?;
        if log.potion_spent_before(ActionKind::WitchHeal, self.round) {
            return Err(GameError::RoleForbids(
                "the heal potion is already spent".to_string(),
            ));
        }
        if !self.pending_wolf_victims(log).contains(&target) {
            return Err(GameError::InvalidTarget(
                "that player is not tonight's victim".to_string(),
            ));
        }

        let actor_name = Arc::clone(&self.players[&actor].name);
        let target_name = Arc::clone(&self.players[&target].name);

        log.record(self.night_action(
            actor,
            ActionKind::WitchHeal,
            Some(target),
            Visibility::ActorOnly,
            format!("{actor_name} slips the healing draught to {target_name}"),
        ))?;

        Ok(())
    }

    #[tracing::instrument(skip(self, log), fields(round = self.round))]
    pub fn submit_witch_kill(
        &mut self,
        actor: ParticipantId,
        target: ParticipantId,
        log: &mut ActionLog,
    ) -> Result<(), GameError> {
        self.require_witch_turn(actor, log)?;
        if log.potion_spent_before(ActionKind::WitchKill, self.round) {
            return Err(GameError::RoleForbids(
                "the poison is already spent".to_string(),
            ));
        }
        self.require_alive_target(target)?;
        if actor == target {
            return Err(GameError::InvalidTarget(
                "cannot poison yourself".to_string(),
            ));
        }

        let actor_name = Arc::clone(&self.players[&actor].name);
        let target_name = Arc::clone(&self.players[&target].name);

        log.record(self.night_action(
            actor,
            ActionKind::WitchKill,
            Some(target),
            Visibility::ActorOnly,
            format!("{actor_name} poisons {target_name}"),
        ))?;

        Ok(())
    }

    #[tracing::instrument(skip(self, log), fields(round = self.round))]
    pub fn submit_witch_pass(
        &mut self,
        actor: ParticipantId,
        log: &mut ActionLog,
    ) -> Result<(), GameError> {
        self.require_witch_turn(actor, log)?;

        let actor_name = Arc::clone(&self.players[&actor].name);
        log.record(self.night_action(
            actor,
            ActionKind::WitchPass,
            None,
            Visibility::ActorOnly,
            format!("{actor_name} puts the potions away"),
        ))?;

        Ok(())
    }

    /// Links two players as lovers. First night only; the pair is
    /// immutable once chosen.
    #[tracing::instrument(skip(self, log), fields(round = self.round))]
    pub fn submit_cupid_choose(
        &mut self,
        actor: ParticipantId,
        first: ParticipantId,
        second: ParticipantId,
        log: &mut ActionLog,
    ) -> Result<(), GameError> {
        self.require_open(MatchStatus::Night, "the night")?;
        self.require_alive_role(actor, &[Role::Cupid], "cupid")?;
        if self.round != 1 {
            return Err(GameError::OutOfPhase("the arrows are spent".to_string()));
        }
        if self.lovers().is_some() {
            return Err(GameError::DuplicateAction(
                "the lovers are already chosen".to_string(),
            ));
        }
        if first == second {
            return Err(GameError::InvalidTarget(
                "the lovers must be two different players".to_string(),
            ));
        }
        self.require_alive_target(first)?;
        self.require_alive_target(second)?;

        let actor_name = Arc::clone(&self.players[&actor].name);
        let first_name = Arc::clone(&self.players[&first].name);
        let second_name = Arc::clone(&self.players[&second].name);

        log.record(self.night_action(
            actor,
            ActionKind::CupidLinkFirst,
            Some(first),
            Visibility::ActorOnly,
            format!("{actor_name} looses an arrow at {first_name}"),
        ))?;
        log.record(self.night_action(
            actor,
            ActionKind::CupidLinkSecond,
            Some(second),
            Visibility::ActorOnly,
            format!("{actor_name} looses an arrow at {second_name}"),
        ))?;

        self.lovers = Some((first.min(second), first.max(second)));

        Ok(())
    }

    /// The wolf victims as they stand, before potions and protection.
    pub fn pending_wolf_victims(&self, log: &ActionLog) -> Vec<ParticipantId> {
        let mut victims = Vec::new();

        if let Some(victim) = log.majority_target(self.round, Phase::Night, ActionKind::WerewolfKill)
        {
            victims.push(victim);
        }
        if self.second_kill_round
            && let Some(victim) =
                log.majority_target(self.round, Phase::Night, ActionKind::WerewolfKill2)
            && !victims.contains(&victim)
        {
            victims.push(victim);
        }

        victims
    }

    /// Whether a player has supplied everything tonight needs from them.
    pub fn night_act_complete(&self, participant: ParticipantId, log: &ActionLog) -> bool {
        let Some(player) = self.player(participant) else {
            return true;
        };
        if !player.alive || player.observer {
            return true;
        }

        let round = self.round;
        match player.role {
            Some(Role::Werewolf | Role::WolfCub) => self.wolves_locked(log),
            Some(Role::Seer) => log.has(round, Phase::Night, participant, ActionKind::SeerInvestigate),
            Some(Role::Doctor) => log.has(round, Phase::Night, participant, ActionKind::DoctorProtect),
            Some(Role::Guard) => log.has(round, Phase::Night, participant, ActionKind::GuardProtect),
            Some(Role::Witch) => log.has(round, Phase::Night, participant, ActionKind::WitchPass),
            Some(Role::Cupid) => round != 1 || self.lovers.is_some(),
            Some(Role::Hunter | Role::Mason | Role::Villager) | None => true,
        }
    }

    /// Every alive role has acted; the night can resolve.
    pub fn night_ready(&self, log: &ActionLog) -> bool {
        self.status == MatchStatus::Night
            && self.gate.is_none()
            && self
                .alive_ids()
                .into_iter()
                .all(|p| self.night_act_complete(p, log))
    }

    /// Resolves the night if every act-complete predicate holds. Returns
    /// whether a resolution ran.
    pub fn maybe_resolve_night(&mut self, log: &mut ActionLog) -> Result<bool, GameError> {
        if !self.night_ready(log) {
            return Ok(false);
        }
        self.resolve_night(log)?;
        Ok(true)
    }

    #[tracing::instrument(skip_all, fields(round = self.round))]
    fn resolve_night(&mut self, log: &mut ActionLog) -> Result<(), GameError> {
        self.resolving = Some(Phase::Night);
        let round = self.round;

        let mut deaths = self
            .pending_wolf_victims(log)
            .into_iter()
            .map(|victim| (victim, DeathCause::WerewolfKill))
            .collect::<Vec<_>>();

        let healed = log.healed_players(round);
        deaths.retain(|(victim, _)| !healed.contains(victim));

        let protected = log.protected_players(round);
        deaths.retain(|(victim, _)| !protected.contains(victim));

        if let Some(poisoned) = log.witch_kill_target(round)
            && (self.settings.witch_kill_pierces_protection || !protected.contains(&poisoned))
        {
            deaths.push((poisoned, DeathCause::WitchPoison));
        }

        tracing::info!(?deaths, "night resolved");

        match self.drain_deaths(VecDeque::from(deaths), log)? {
            DrainOutcome::Gated => Ok(()),
            DrainOutcome::Drained => self.finish_night(log),
        }
    }

    /// Records the morning report and hands the match to the day, or
    /// concludes it.
    pub(crate) fn finish_night(&mut self, log: &mut ActionLog) -> Result<(), GameError> {
        let round = self.round;
        let dead_names = log
            .deaths_in(round, Phase::Night)
            .into_iter()
            .map(|(victim, _)| self.players[&victim].name.to_string())
            .collect::<Vec<_>>();

        let description = if dead_names.is_empty() {
            "The village wakes to a quiet morning; everyone is accounted for".to_string()
        } else {
            format!(
                "The village wakes to grim news: {} did not survive the night",
                dead_names.join(", ")
            )
        };

        log.record(Action {
            round,
            phase: Phase::Night,
            actor: Actor::System,
            kind: ActionKind::MorningReport,
            target: None,
            visibility: Visibility::ResolvedPublic,
            description,
            cause: None,
        })?;

        self.resolving = None;
        self.second_kill_round = false;
        if let Some(winner) = self.evaluate_winner(false) {
            self.conclude(winner);
        } else {
            self.status = MatchStatus::Day;
            tracing::info!(round, "day breaks");
        }

        Ok(())
    }
}
