//! Projects per-participant phase views and the filtered history.

use werewolf_game_lib::ActionKind;
use werewolf_game_lib::Actor;
use werewolf_game_lib::ConfirmedDeath;
use werewolf_game_lib::DayView;
use werewolf_game_lib::FinishedView;
use werewolf_game_lib::LobbyView;
use werewolf_game_lib::MatchStatus;
use werewolf_game_lib::NightView;
use werewolf_game_lib::ParticipantId;
use werewolf_game_lib::PhaseView;
use werewolf_game_lib::Phase;
use werewolf_game_lib::RecordedVote;
use werewolf_game_lib::RevealedRole;
use werewolf_game_lib::Role;
use werewolf_game_lib::Team;
use werewolf_game_lib::ViewUpdate;

use crate::action::ActionLog;
use crate::game::MatchState;
use crate::lobby::Lobby;
use crate::visibility::action_visible;

/// Stateless projector over a consistent snapshot of the match.
pub struct Projector<'a> {
    game: &'a MatchState,
    log: &'a ActionLog,
    lobby: &'a Lobby,
}

impl<'a> Projector<'a> {
    pub fn new(game: &'a MatchState, log: &'a ActionLog, lobby: &'a Lobby) -> Self {
        Self { game, log, lobby }
    }

    pub fn view_for(&self, viewer: ParticipantId) -> ViewUpdate {
        tracing::debug!(?viewer, status = ?self.game.status(), "projecting view");
        let view = match self.game.status() {
            MatchStatus::Lobby => PhaseView::Lobby(self.lobby_view()),
            MatchStatus::Night => PhaseView::Night(self.night_view(viewer)),
            MatchStatus::Day => PhaseView::Day(self.day_view(viewer)),
            MatchStatus::Finished => PhaseView::Finished(self.finished_view()),
        };

        ViewUpdate {
            view,
            history: self.history_for(viewer),
        }
    }

    /// Action descriptions the viewer is entitled to, oldest first.
    pub fn history_for(&self, viewer: ParticipantId) -> Vec<String> {
        let ctx = self.game.viewer_context(viewer);
        let status = self.game.status();
        let round = self.game.round();

        self.log
            .entries()
            .iter()
            .filter(|action| action_visible(action, &ctx, status, round))
            .map(|action| action.description.clone())
            .collect()
    }

    fn lobby_view(&self) -> LobbyView {
        let members = self
            .game
            .players()
            .filter(|p| !p.observer)
            .map(|p| p.info())
            .collect::<Vec<_>>();

        // Every role is listed so clients can edit empty slots.
        let mut quota = Role::ALL
            .iter()
            .map(|&role| (role, 0))
            .collect::<std::collections::BTreeMap<_, _>>();
        quota.extend(self.lobby.quota().iter().map(|(&role, &count)| (role, count)));

        LobbyView {
            quota,
            quota_total: self.lobby.total(),
            ready: self.lobby.ready(members.len()),
            members,
        }
    }

    fn lover_of(&self, viewer: ParticipantId) -> Option<ParticipantId> {
        match self.game.lovers() {
            Some((a, b)) if a == viewer => Some(b),
            Some((a, b)) if b == viewer => Some(a),
            _ => None,
        }
    }

    fn others_alive(&self, viewer: ParticipantId) -> Vec<ParticipantId> {
        self.game
            .alive_ids()
            .into_iter()
            .filter(|&p| p != viewer)
            .collect()
    }

    fn night_view(&self, viewer: ParticipantId) -> NightView {
        let game = self.game;
        let log = self.log;
        let round = game.round();
        let player = game.player(viewer);
        let role = player.and_then(|p| p.role);
        let alive = player.is_some_and(|p| p.alive && !p.observer);

        let mut view = NightView {
            round,
            role,
            alive,
            targets: Vec::new(),
            own_actions: self.own_actions(viewer, round),
            pack: Vec::new(),
            pack_votes: Vec::new(),
            second_kill_round: game.second_kill_round,
            masons: Vec::new(),
            pending_victims: Vec::new(),
            heal_available: false,
            poison_available: false,
            awaiting_revenge: game.awaiting_revenge(),
            lover: self.lover_of(viewer),
            acted: game.night_act_complete(viewer, log),
        };

        // The dying hunter picks a target; everyone else waits.
        if let Some(hunter) = view.awaiting_revenge {
            if hunter == viewer {
                view.targets = self.others_alive(viewer);
            }
            return view;
        }

        if !alive {
            return view;
        }

        match role {
            Some(Role::Werewolf | Role::WolfCub) => {
                view.pack = game
                    .players()
                    .filter(|p| p.alive && !p.observer)
                    .filter(|p| p.role.is_some_and(|r| r.is_team(Team::Werewolves)))
                    .map(|p| p.info())
                    .collect();

                let second_open =
                    game.second_kill_round && game.wolf_vote_locked(log, false);
                view.pack_votes = log.pack_votes(round, second_open);

                if !game.wolf_vote_locked(log, second_open) {
                    let cub_self =
                        role == Some(Role::WolfCub) && game.settings().wolf_cub_may_self_target;
                    view.targets = game
                        .alive_ids()
                        .into_iter()
                        .filter(|&p| p != viewer || cub_self)
                        .collect();
                }
            }
            Some(Role::Seer) => {
                view.targets = self.others_alive(viewer);
            }
            Some(Role::Doctor) => {
                view.targets = game.alive_ids();
            }
            Some(Role::Guard) => {
                let previous = if round > 1 {
                    log.guard_target(round - 1)
                } else {
                    None
                };
                view.targets = self
                    .others_alive(viewer)
                    .into_iter()
                    .filter(|&p| Some(p) != previous)
                    .collect();
            }
            Some(Role::Witch) => {
                if game.wolves_locked(log)
                    && !log.has(round, Phase::Night, viewer, ActionKind::WitchPass)
                {
                    view.heal_available = !log.potion_spent_before(ActionKind::WitchHeal, round);
                    view.poison_available = !log.potion_spent_before(ActionKind::WitchKill, round);
                    if view.heal_available {
                        view.pending_victims = game.pending_wolf_victims(log);
                    }
                    if view.poison_available {
                        view.targets = self.others_alive(viewer);
                    }
                }
            }
            Some(Role::Cupid) => {
                if round == 1 && game.lovers().is_none() {
                    view.targets = game.alive_ids();
                }
            }
            Some(Role::Mason) => {
                view.masons = game
                    .players()
                    .filter(|p| p.alive && !p.observer && p.role == Some(Role::Mason))
                    .map(|p| p.info())
                    .collect();
            }
            _ => {}
        }

        view
    }

    fn day_view(&self, viewer: ParticipantId) -> DayView {
        let game = self.game;
        let round = game.round();
        let alive = game.is_alive(viewer);

        let targets = if alive && game.awaiting_revenge().is_none() {
            self.others_alive(viewer)
        } else if game.awaiting_revenge() == Some(viewer) {
            self.others_alive(viewer)
        } else {
            Vec::new()
        };

        let morning_deaths = self
            .log
            .deaths_in(round, Phase::Night)
            .into_iter()
            .filter_map(|(victim, cause)| {
                game.role_of(victim).map(|role| ConfirmedDeath {
                    player: victim,
                    role,
                    cause,
                })
            })
            .collect();

        DayView {
            round,
            alive,
            targets,
            morning_deaths,
            votes: self.day_votes(round),
            awaiting_revenge: game.awaiting_revenge(),
            lover: self.lover_of(viewer),
        }
    }

    /// Day votes are public; a later pass supersedes an earlier vote for
    /// display purposes.
    fn day_votes(&self, round: u32) -> Vec<RecordedVote> {
        let mut votes: Vec<RecordedVote> = Vec::new();

        for action in self.log.entries() {
            if action.round != round || action.phase != Phase::Day {
                continue;
            }
            let target = match action.kind {
                ActionKind::DayVote => action.target,
                ActionKind::DayPass => None,
                _ => continue,
            };
            let Actor::Player(voter) = action.actor else {
                continue;
            };

            if let Some(existing) = votes.iter_mut().find(|v| v.voter == voter) {
                existing.target = target;
            } else {
                votes.push(RecordedVote { voter, target });
            }
        }

        votes
    }

    fn finished_view(&self) -> FinishedView {
        FinishedView {
            winner: self.game.winner().expect("finished match has a winner"),
            roles: self
                .game
                .players()
                .filter(|p| !p.observer)
                .filter_map(|p| {
                    p.role.map(|role| RevealedRole {
                        player: p.info(),
                        role,
                        alive: p.alive,
                    })
                })
                .collect(),
        }
    }

    fn own_actions(&self, viewer: ParticipantId, round: u32) -> Vec<String> {
        self.log
            .entries()
            .iter()
            .filter(|a| a.round == round && a.actor == Actor::Player(viewer))
            .map(|a| a.description.clone())
            .collect()
    }
}
