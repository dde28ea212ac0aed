//! Shared fixtures for engine tests. Role assignment is shuffled even
//! under `StepRng`, so tests look holders up by role instead of assuming
//! who drew what.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::rngs::mock::StepRng;
use werewolf_game_lib::ParticipantId;
use werewolf_game_lib::Role;
use werewolf_game_lib::Team;

use crate::action::ActionLog;
use crate::game::MatchSettings;
use crate::game::MatchState;

pub(crate) fn step_rng() -> StepRng {
    StepRng::new(1, 1)
}

/// A started match over `quota` with players named p0..pn.
pub(crate) fn started_match(quota: &[(Role, u32)]) -> (MatchState, ActionLog) {
    started_match_with(quota, MatchSettings::default())
}

pub(crate) fn started_match_with(
    quota: &[(Role, u32)],
    settings: MatchSettings,
) -> (MatchState, ActionLog) {
    let total = quota.iter().map(|(_, count)| count).sum::<u32>();

    let mut game = MatchState::new(1, settings);
    for i in 0..total as usize {
        game.add_lobby_member(ParticipantId(i), Arc::from(format!("p{i}").as_str()))
            .unwrap();
    }

    let quota = quota.iter().copied().collect::<BTreeMap<_, _>>();
    game.start(&quota, &mut step_rng()).unwrap();

    (game, ActionLog::new())
}

pub(crate) fn holder(game: &MatchState, role: Role) -> ParticipantId {
    *game
        .alive_with_role(role)
        .first()
        .expect("role is in the quota")
}

/// Every alive pack member votes `target`, then the first one locks the
/// round.
pub(crate) fn pack_kill(
    game: &mut MatchState,
    log: &mut ActionLog,
    target: ParticipantId,
    second: bool,
) {
    let wolves = game.alive_in_team(Team::Werewolves);
    for &wolf in &wolves {
        game.submit_werewolf_vote(wolf, target, second, log).unwrap();
    }
    game.submit_werewolf_end_vote(wolves[0], second, log)
        .unwrap();
}

/// Every alive pack member passes, then the first one locks the round.
pub(crate) fn pack_pass(game: &mut MatchState, log: &mut ActionLog, second: bool) {
    let wolves = game.alive_in_team(Team::Werewolves);
    for &wolf in &wolves {
        game.submit_werewolf_pass(wolf, second, log).unwrap();
    }
    game.submit_werewolf_end_vote(wolves[0], second, log)
        .unwrap();
}

/// Drives an uneventful day: everyone abstains and the first alive
/// player calls the vote.
pub(crate) fn pass_day(game: &mut MatchState, log: &mut ActionLog) {
    for participant in game.alive_ids() {
        game.submit_day_pass(participant, log).unwrap();
    }
    let caller = game.alive_ids()[0];
    game.submit_day_end_vote(caller, log, &mut step_rng())
        .unwrap();
}
