//! Decides whether a viewer may learn of a recorded action, now or
//! later. Visibility only ever widens as phases pass.

use werewolf_game_lib::Actor;
use werewolf_game_lib::MatchStatus;
use werewolf_game_lib::ParticipantId;
use werewolf_game_lib::Phase;
use werewolf_game_lib::Role;
use werewolf_game_lib::Visibility;

use crate::action::Action;
use crate::game::MatchState;

/// What the filter needs to know about the viewer.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ViewerContext {
    pub participant: ParticipantId,
    pub role: Option<Role>,
    pub alive: bool,
}

impl MatchState {
    pub fn viewer_context(&self, participant: ParticipantId) -> ViewerContext {
        let player = self.player(participant);
        ViewerContext {
            participant,
            role: player.and_then(|p| p.role),
            alive: player.is_some_and(|p| p.alive && !p.observer),
        }
    }
}

/// `ResolvedPublic` rows stay hidden until the phase containing them has
/// ended; `Night` precedes `Day` of the same round.
fn phase_resolved(action: &Action, status: MatchStatus, current_round: u32) -> bool {
    let current_phase = match status {
        MatchStatus::Lobby => return false,
        MatchStatus::Finished => return true,
        MatchStatus::Night => Phase::Night,
        MatchStatus::Day => Phase::Day,
    };

    (action.round, action.phase) < (current_round, current_phase)
}

pub fn action_visible(
    action: &Action,
    viewer: &ViewerContext,
    status: MatchStatus,
    current_round: u32,
) -> bool {
    match action.visibility {
        Visibility::Public => true,
        Visibility::TeamWerewolf | Visibility::TeamVillager => {
            let team = match action.visibility {
                Visibility::TeamWerewolf => werewolf_game_lib::Team::Werewolves,
                _ => werewolf_game_lib::Team::Villagers,
            };
            viewer.role.is_some_and(|r| r.is_team(team))
                && (viewer.alive || action.round <= current_round)
        }
        Visibility::ActorOnly => action.actor == Actor::Player(viewer.participant),
        Visibility::ResolvedPublic => phase_resolved(action, status, current_round),
    }
}
