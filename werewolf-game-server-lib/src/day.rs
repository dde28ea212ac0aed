//! The day state machine: public voting, the end-vote trigger, and the
//! election that may send someone to the gallows.

use std::collections::VecDeque;
use std::sync::Arc;

use rand::Rng;
use rand::seq::IndexedRandom;
use werewolf_game_lib::ActionKind;
use werewolf_game_lib::Actor;
use werewolf_game_lib::DeathCause;
use werewolf_game_lib::MatchStatus;
use werewolf_game_lib::ParticipantId;
use werewolf_game_lib::Phase;
use werewolf_game_lib::Visibility;

use crate::action::Action;
use crate::action::ActionLog;
use crate::error::GameError;
use crate::game::DayTieRule;
use crate::game::DrainOutcome;
use crate::game::MatchState;

impl MatchState {
    fn day_action(
        &self,
        actor: ParticipantId,
        kind: ActionKind,
        target: Option<ParticipantId>,
        description: String,
    ) -> Action {
        Action {
            round: self.round,
            phase: Phase::Day,
            actor: Actor::Player(actor),
            kind,
            target,
            visibility: Visibility::Public,
            description,
            cause: None,
        }
    }

    #[tracing::instrument(skip(self, log), fields(round = self.round))]
    pub fn submit_day_vote(
        &mut self,
        actor: ParticipantId,
        target: ParticipantId,
        log: &mut ActionLog,
    ) -> Result<(), GameError> {
        self.require_open(MatchStatus::Day, "the day vote")?;
        self.require_alive_player(actor)?;
        self.require_alive_target(target)?;
        if actor == target {
            return Err(GameError::InvalidTarget(
                "cannot vote for yourself".to_string(),
            ));
        }

        let actor_name = Arc::clone(&self.players[&actor].name);
        let target_name = Arc::clone(&self.players[&target].name);

        log.record(self.day_action(
            actor,
            ActionKind::DayVote,
            Some(target),
            format!("{actor_name} votes to eliminate {target_name}"),
        ))?;

        Ok(())
    }

    #[tracing::instrument(skip(self, log), fields(round = self.round))]
    pub fn submit_day_pass(
        &mut self,
        actor: ParticipantId,
        log: &mut ActionLog,
    ) -> Result<(), GameError> {
        self.require_open(MatchStatus::Day, "the day vote")?;
        self.require_alive_player(actor)?;

        let actor_name = Arc::clone(&self.players[&actor].name);
        log.record(self.day_action(
            actor,
            ActionKind::DayPass,
            None,
            format!("{actor_name} abstains"),
        ))?;

        Ok(())
    }

    /// Forces resolution once every alive participant has voted or
    /// passed. Any single alive participant may press it.
    #[tracing::instrument(skip(self, log, rng), fields(round = self.round))]
    pub fn submit_day_end_vote(
        &mut self,
        actor: ParticipantId,
        log: &mut ActionLog,
        rng: &mut impl Rng,
    ) -> Result<(), GameError> {
        self.require_open(MatchStatus::Day, "the day vote")?;
        self.require_alive_player(actor)?;

        let undecided = self
            .alive_ids()
            .into_iter()
            .filter(|&p| {
                !log.has(self.round, Phase::Day, p, ActionKind::DayVote)
                    && !log.has(self.round, Phase::Day, p, ActionKind::DayPass)
            })
            .count();
        if undecided > 0 {
            return Err(GameError::OutOfPhase(
                "not everyone has voted yet".to_string(),
            ));
        }

        let actor_name = Arc::clone(&self.players[&actor].name);
        log.record(self.day_action(
            actor,
            ActionKind::DayEndVote,
            None,
            format!("{actor_name} calls the vote"),
        ))?;

        self.resolve_day(log, rng)
    }

    /// Strict plurality elects; a tie falls to the configured rule.
    #[tracing::instrument(skip_all, fields(round = self.round))]
    fn resolve_day(&mut self, log: &mut ActionLog, rng: &mut impl Rng) -> Result<(), GameError> {
        self.resolving = Some(Phase::Day);

        let leaders = log.plurality_targets(self.round, Phase::Day, ActionKind::DayVote);
        let elected = match leaders.as_slice() {
            [] => None,
            [single] => Some(*single),
            tied => match self.settings.day_tie_rule {
                DayTieRule::NoElimination => None,
                DayTieRule::RandomVictim => Some(*tied.choose(rng).expect("tie is non-empty")),
            },
        };

        tracing::info!(?elected, "day vote resolved");

        let Some(victim) = elected else {
            return self.finish_day();
        };

        match self.drain_deaths(
            VecDeque::from([(victim, DeathCause::DayElection)]),
            log,
        )? {
            DrainOutcome::Gated => Ok(()),
            DrainOutcome::Drained => self.finish_day(),
        }
    }

    /// Concludes the match or moves on to the next night.
    pub(crate) fn finish_day(&mut self) -> Result<(), GameError> {
        self.resolving = None;
        if let Some(winner) = self.evaluate_winner(true) {
            self.conclude(winner);
        } else {
            self.enter_night();
        }
        Ok(())
    }
}
