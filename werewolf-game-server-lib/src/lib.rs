//! Server implementation of the [Werewolf game](https://en.wikipedia.org/wiki/Mafia_(party_game)),
//! also known as Mafia.
//!
//! The engine is transport-agnostic: callers deliver pre-authenticated
//! [`Intent`]s and drain per-connection outboxes. All state changes for
//! the match happen under one write lock, so every broadcast carries
//! post-change state and all recipients observe the same order.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::RwLock;

use tap::Tap;
use werewolf_game_lib::ActionKind;
use werewolf_game_lib::Actor;
use werewolf_game_lib::ChatChannel;
use werewolf_game_lib::ChatMessage;
use werewolf_game_lib::Intent;
use werewolf_game_lib::MatchStatus;
use werewolf_game_lib::ParticipantId;
use werewolf_game_lib::PresenceEvent;
use werewolf_game_lib::PresenceNotice;
use werewolf_game_lib::Role;
use werewolf_game_lib::ServerMessage;
use werewolf_game_lib::SessionToken;
use werewolf_game_lib::Team;
use werewolf_game_lib::TransitionCue;
use werewolf_game_lib::ViewUpdate;
use werewolf_game_lib::Winner;

pub mod action;
mod consts;
mod day;
pub mod error;
pub mod game;
pub mod lobby;
mod night;
pub mod session;
pub mod store;
pub mod view;
pub mod visibility;

use action::ActionLog;
pub use error::ErrorKind;
pub use error::GameError;
use game::MatchPlayer;
use game::MatchSettings;
use game::MatchState;
use lobby::Lobby;
use session::ConnectionId;
use session::ParticipantSet;
use session::SessionHub;
use store::ActionRow;
use store::LoversRow;
use store::MatchRow;
use store::MatchStore;
use store::PlayerRow;
use view::Projector;

pub struct GameServerConfig {
    /// Rule knobs applied to every match this server hosts.
    pub rules: MatchSettings,
}

impl Default for GameServerConfig {
    fn default() -> Self {
        Self {
            rules: MatchSettings::default(),
        }
    }
}

/// Whether a dispatched intent mutated match state.
enum Dispatched {
    /// Persist, re-project for everyone, emit cues.
    Mutated,
    /// Handled entirely inline (chat, view refresh).
    Quiet,
}

struct GameServerInner {
    config: GameServerConfig,
    hub: SessionHub,
    lobby: Lobby,
    game: MatchState,
    log: ActionLog,
    store: Box<dyn MatchStore>,
}

impl GameServerInner {
    fn match_row(&self) -> MatchRow {
        MatchRow {
            id: self.game.id(),
            status: self.game.status(),
            round: self.game.round(),
            settings: self.game.settings().clone(),
            winner: self.game.winner(),
            gate: self.game.gate.clone(),
            resolving: self.game.resolving,
            second_kill_round: self.game.second_kill_round,
            cub_died_this_round: self.game.cub_died_this_round,
            quota: self.lobby.quota().clone(),
        }
    }

    /// Writes everything the intent touched: new or retargeted action
    /// rows, players whose slot changed, the lover pair, the match row.
    fn persist(&mut self) -> Result<(), GameError> {
        let match_id = self.game.id();

        for action in self.log.take_dirty() {
            self.store.append_action(&ActionRow { match_id, action })?;
        }

        for participant in self.game.take_dirty_players() {
            let Some(player) = self.game.player(participant) else {
                continue;
            };
            let Some(token) = self.hub.token_of(participant) else {
                continue;
            };
            self.store.save_player(&PlayerRow {
                match_id,
                participant,
                name: player.name.to_string(),
                token,
                role: player.role,
                alive: player.alive,
                observer: player.observer,
            })?;
        }

        if let Some((first, second)) = self.game.lovers() {
            self.store.save_lovers(&LoversRow {
                match_id,
                first,
                second,
            })?;
        }

        let row = self.match_row();
        self.store.save_match(&row)?;

        Ok(())
    }

    fn view_for(&self, participant: ParticipantId) -> ViewUpdate {
        Projector::new(&self.game, &self.log, &self.lobby).view_for(participant)
    }

    fn fan_out_views(&self) {
        let projector = Projector::new(&self.game, &self.log, &self.lobby);
        for participant in &self.hub.connected() {
            self.hub.send_to(
                participant,
                ServerMessage::View(projector.view_for(participant)),
            );
        }
    }

    fn notify_error(&self, participant: ParticipantId, error: &GameError) {
        self.hub.send_to(
            participant,
            ServerMessage::Error {
                kind: error.kind().as_str().into(),
                message: error.user_message().into(),
            },
        );
    }

    fn presence(&self, participant: ParticipantId, event: PresenceEvent) {
        let Some(info) = self.hub.info(participant) else {
            return;
        };
        let to = self
            .hub
            .connected()
            .tap_mut(|s| s.remove(participant));
        self.hub.send(
            &to,
            ServerMessage::Presence(PresenceNotice {
                participant: info,
                event,
            }),
        );
    }

    fn death_count(&self) -> usize {
        self.log
            .entries()
            .iter()
            .filter(|a| a.kind == ActionKind::Death)
            .count()
    }

    fn emit_cues(&self, before_status: MatchStatus, before_deaths: usize) {
        if self.death_count() > before_deaths {
            self.hub.broadcast(ServerMessage::Cue {
                cue: TransitionCue::Death,
            });
        }

        let after = self.game.status();
        if after == before_status {
            return;
        }
        let cue = match after {
            MatchStatus::Night => Some(TransitionCue::NightFalls),
            MatchStatus::Day => Some(TransitionCue::Daybreak),
            MatchStatus::Finished => Some(TransitionCue::Finished),
            MatchStatus::Lobby => None,
        };
        if let Some(cue) = cue {
            self.hub.broadcast(ServerMessage::Cue { cue });
        }
    }

    /// Routes a chat line by game state: day and lobby talk is public,
    /// night talk stays within the pack, everyone else whispers to the
    /// dead.
    fn chat(&self, sender: ParticipantId, body: String) {
        let player = self.game.player(sender);
        let channel = match (self.game.status(), player) {
            (MatchStatus::Lobby | MatchStatus::Finished, _) => ChatChannel::Public,
            (_, None) => ChatChannel::Dead,
            (_, Some(p)) if p.observer || !p.alive => ChatChannel::Dead,
            (MatchStatus::Day, _) => ChatChannel::Public,
            (MatchStatus::Night, Some(p)) => {
                if p.role.is_some_and(|r| r.is_team(Team::Werewolves)) {
                    ChatChannel::Pack
                } else {
                    ChatChannel::Dead
                }
            }
        };

        let excluded: ParticipantSet = match channel {
            ChatChannel::Public => ParticipantSet::new(),
            ChatChannel::Pack => self
                .game
                .players()
                .filter(|p| p.alive && !p.observer)
                .filter(|p| !p.role.is_some_and(|r| r.is_team(Team::Werewolves)))
                .map(|p| p.participant)
                .collect(),
            ChatChannel::Dead => self
                .game
                .players()
                .filter(|p| p.alive && !p.observer)
                .map(|p| p.participant)
                .collect(),
        };

        let to = self
            .hub
            .connected()
            .tap_mut(|s| s.difference_with(&excluded))
            // Senders always see their own messages.
            .tap_mut(|s| s.insert(sender));

        self.hub.send(
            &to,
            ServerMessage::Chat(ChatMessage {
                channel,
                from: Actor::Player(sender),
                body: body.into_boxed_str(),
            }),
        );
    }

    fn require_member(&self, actor: ParticipantId) -> Result<(), GameError> {
        if self.game.player(actor).is_none_or(|p| p.observer) {
            return Err(GameError::NotInMatch(actor));
        }
        Ok(())
    }

    fn after_night_action(&mut self) -> Result<(), GameError> {
        self.game.maybe_resolve_night(&mut self.log)?;
        Ok(())
    }

    fn new_game(&mut self) -> Result<Dispatched, GameError> {
        if self.game.status() != MatchStatus::Finished {
            return Err(GameError::OutOfPhase(
                "the match is not finished".to_string(),
            ));
        }

        let id = self.game.id() + 1;
        self.game = MatchState::new(id, self.config.rules.clone());
        self.log = ActionLog::new();
        self.lobby.reset();

        for participant in &self.hub.connected() {
            if let Some(info) = self.hub.info(participant) {
                self.game.add_lobby_member(participant, info.name)?;
            }
        }

        tracing::info!(id, "new lobby opened");

        Ok(Dispatched::Mutated)
    }

    fn dispatch(&mut self, actor: ParticipantId, intent: Intent) -> Result<Dispatched, GameError> {
        match intent {
            Intent::UpdateRole { role, delta } => {
                if self.game.status() != MatchStatus::Lobby {
                    return Err(GameError::OutOfPhase("the lobby is closed".to_string()));
                }
                self.require_member(actor)?;
                self.lobby.update_role(role, delta)?;
                Ok(Dispatched::Mutated)
            }
            Intent::StartGame => {
                self.require_member(actor)?;
                let quota = self.lobby.quota().clone();
                self.game.start(&quota, &mut rand::rng())?;
                Ok(Dispatched::Mutated)
            }
            Intent::WerewolfVote { target } => {
                self.game
                    .submit_werewolf_vote(actor, target, false, &mut self.log)?;
                self.after_night_action()?;
                Ok(Dispatched::Mutated)
            }
            Intent::WerewolfVote2 { target } => {
                self.game
                    .submit_werewolf_vote(actor, target, true, &mut self.log)?;
                self.after_night_action()?;
                Ok(Dispatched::Mutated)
            }
            Intent::WerewolfPass => {
                self.game.submit_werewolf_pass(actor, false, &mut self.log)?;
                self.after_night_action()?;
                Ok(Dispatched::Mutated)
            }
            Intent::WerewolfPass2 => {
                self.game.submit_werewolf_pass(actor, true, &mut self.log)?;
                self.after_night_action()?;
                Ok(Dispatched::Mutated)
            }
            Intent::WerewolfEndVote => {
                self.game
                    .submit_werewolf_end_vote(actor, false, &mut self.log)?;
                self.after_night_action()?;
                Ok(Dispatched::Mutated)
            }
            Intent::WerewolfEndVote2 => {
                self.game
                    .submit_werewolf_end_vote(actor, true, &mut self.log)?;
                self.after_night_action()?;
                Ok(Dispatched::Mutated)
            }
            Intent::SeerInvestigate { target } => {
                self.game
                    .submit_seer_investigate(actor, target, &mut self.log)?;
                self.after_night_action()?;
                Ok(Dispatched::Mutated)
            }
            Intent::DoctorProtect { target } => {
                self.game
                    .submit_doctor_protect(actor, target, &mut self.log)?;
                self.after_night_action()?;
                Ok(Dispatched::Mutated)
            }
            Intent::GuardProtect { target } => {
                self.game
                    .submit_guard_protect(actor, target, &mut self.log)?;
                self.after_night_action()?;
                Ok(Dispatched::Mutated)
            }
            Intent::WitchHeal { target } => {
                self.game.submit_witch_heal(actor, target, &mut self.log)?;
                self.after_night_action()?;
                Ok(Dispatched::Mutated)
            }
            Intent::WitchKill { target } => {
                self.game.submit_witch_kill(actor, target, &mut self.log)?;
                self.after_night_action()?;
                Ok(Dispatched::Mutated)
            }
            Intent::WitchPass => {
                self.game.submit_witch_pass(actor, &mut self.log)?;
                self.after_night_action()?;
                Ok(Dispatched::Mutated)
            }
            Intent::CupidChoose { first, second } => {
                self.game
                    .submit_cupid_choose(actor, first, second, &mut self.log)?;
                self.after_night_action()?;
                Ok(Dispatched::Mutated)
            }
            Intent::DayVote { target } => {
                self.game.submit_day_vote(actor, target, &mut self.log)?;
                Ok(Dispatched::Mutated)
            }
            Intent::DayPass => {
                self.game.submit_day_pass(actor, &mut self.log)?;
                Ok(Dispatched::Mutated)
            }
            Intent::DayEndVote => {
                self.game
                    .submit_day_end_vote(actor, &mut self.log, &mut rand::rng())?;
                Ok(Dispatched::Mutated)
            }
            Intent::HunterRevenge { target } => {
                self.game
                    .submit_hunter_revenge(actor, target, &mut self.log)?;
                Ok(Dispatched::Mutated)
            }
            Intent::NightSurvey => {
                let update = self.view_for(actor);
                self.hub.send_to(actor, ServerMessage::View(update));
                Ok(Dispatched::Quiet)
            }
            Intent::NewGame => self.new_game(),
            Intent::Chat { body } => {
                self.chat(actor, body);
                Ok(Dispatched::Quiet)
            }
        }
    }
}

/// Owns the action log, the engine, the session hub and the projector;
/// every handler goes through it.
#[derive(Clone)]
pub struct GameServer(Arc<RwLock<GameServerInner>>);

impl GameServer {
    pub fn new(config: GameServerConfig, store: Box<dyn MatchStore>) -> Self {
        let game = MatchState::new(1, config.rules.clone());
        GameServer(Arc::new(RwLock::new(GameServerInner {
            config,
            hub: SessionHub::new(),
            lobby: Lobby::new(),
            game,
            log: ActionLog::new(),
            store,
        })))
    }

    /// Rebuilds the latest persisted match, if any. Derived state comes
    /// back from the action log; players, roles and liveness from the
    /// player rows.
    pub fn recover(
        config: GameServerConfig,
        mut store: Box<dyn MatchStore>,
    ) -> Result<Self, GameError> {
        let Some(persisted) = store.load_latest()? else {
            return Ok(Self::new(config, store));
        };

        let mut hub = SessionHub::new();
        let mut players = BTreeMap::new();
        for row in &persisted.players {
            let name: Arc<str> = Arc::from(row.name.as_str());
            hub.restore_participant(row.participant, Arc::clone(&name), row.token);
            players.insert(
                row.participant,
                MatchPlayer {
                    participant: row.participant,
                    name,
                    role: row.role,
                    alive: row.alive,
                    observer: row.observer,
                },
            );
        }

        let row = persisted.match_row;
        let game = MatchState {
            id: row.id,
            status: row.status,
            round: row.round,
            players,
            lovers: persisted.lovers.map(|l| (l.first, l.second)),
            settings: row.settings,
            winner: row.winner,
            gate: row.gate,
            resolving: row.resolving,
            second_kill_round: row.second_kill_round,
            cub_died_this_round: row.cub_died_this_round,
            dirty_players: Vec::new(),
        };

        let mut lobby = Lobby::new();
        lobby.restore(row.quota);

        tracing::info!(id = game.id(), status = ?game.status(), "match recovered");

        Ok(GameServer(Arc::new(RwLock::new(GameServerInner {
            config,
            hub,
            lobby,
            game,
            log: ActionLog::from_rows(persisted.actions),
            store,
        }))))
    }

    /// Registers a participant under a globally-unique display name.
    pub fn register(&self, name: &str) -> Result<(ParticipantId, SessionToken), GameError> {
        let mut inner = self.0.write().unwrap();
        inner.hub.register(name)
    }

    /// Re-binds a session from its recovery token.
    pub fn resume(&self, token: SessionToken) -> Result<(ParticipantId, SessionToken), GameError> {
        let inner = self.0.read().unwrap();
        let participant = inner.hub.authenticate(token)?;
        Ok((participant, token))
    }

    /// Opens a connection for an authenticated participant. The first
    /// connection during the lobby joins them as a player; mid-match
    /// connectors become read-only observers.
    pub fn connect(
        &self,
        token: SessionToken,
    ) -> Result<(ParticipantId, ConnectionId), GameError> {
        let mut guard = self.0.write().unwrap();
        let inner = &mut *guard;

        let participant = inner.hub.authenticate(token)?;
        let (connection, first) = inner.hub.open_connection(participant)?;
        let info = inner.hub.info(participant).expect("registered participant");

        let mut joined = false;
        if inner.game.player(participant).is_none() {
            match inner.game.status() {
                MatchStatus::Lobby => {
                    inner.game.add_lobby_member(participant, info.name)?;
                    joined = true;
                }
                _ => {
                    inner.game.add_observer(participant, info.name)?;
                }
            }
            inner.persist()?;
        }

        if joined {
            inner.presence(participant, PresenceEvent::Joined);
            inner.fan_out_views();
        } else {
            if first {
                inner.presence(participant, PresenceEvent::Connected);
            }
            let update = inner.view_for(participant);
            inner.hub.send_to(participant, ServerMessage::View(update));
        }

        Ok((participant, connection))
    }

    /// Drops a connection. The last drop during the lobby removes the
    /// membership; at any other time it is a presence event only.
    pub fn disconnect(
        &self,
        participant: ParticipantId,
        connection: ConnectionId,
    ) -> Result<(), GameError> {
        let mut guard = self.0.write().unwrap();
        let inner = &mut *guard;

        let last = inner.hub.close_connection(participant, connection)?;
        if !last {
            return Ok(());
        }

        let lobby_member = inner.game.status() == MatchStatus::Lobby
            && inner.game.player(participant).is_some_and(|p| !p.observer);

        if lobby_member {
            inner.game.remove_lobby_member(participant)?;
            inner.store.remove_player(inner.game.id(), participant)?;
            inner.presence(participant, PresenceEvent::Left);
            inner.fan_out_views();
        } else {
            inner.presence(participant, PresenceEvent::Disconnected);
        }

        Ok(())
    }

    /// Validates, records, possibly resolves, persists, then fans out
    /// post-change views. Rejections notify the originator and mutate
    /// nothing.
    pub fn handle_intent(&self, token: SessionToken, intent: Intent) -> Result<(), GameError> {
        let mut guard = self.0.write().unwrap();
        let inner = &mut *guard;

        let actor = inner.hub.authenticate(token)?;
        let before_status = inner.game.status();
        let before_deaths = inner.death_count();

        match inner.dispatch(actor, intent) {
            Ok(Dispatched::Mutated) => {
                tracing::debug!(?actor, "intent accepted");
                if let Err(err) = inner.persist() {
                    tracing::error!(%err, "persistence failed");
                    inner.notify_error(actor, &err);
                    return Err(err);
                }
                inner.fan_out_views();
                inner.emit_cues(before_status, before_deaths);
                Ok(())
            }
            Ok(Dispatched::Quiet) => Ok(()),
            Err(err) => {
                match err.kind() {
                    ErrorKind::Resource | ErrorKind::Internal => {
                        tracing::error!(%err, ?actor, "intent failed");
                    }
                    _ => tracing::debug!(%err, ?actor, "intent rejected"),
                }
                inner.notify_error(actor, &err);
                Err(err)
            }
        }
    }

    /// Drains one connection's outbox.
    pub fn drain_outbox(
        &self,
        participant: ParticipantId,
        connection: ConnectionId,
    ) -> Box<[Arc<ServerMessage>]> {
        self.0.read().unwrap().hub.drain_outbox(participant, connection)
    }

    /// The caller's current projection, outside the fan-out path.
    pub fn view_for(&self, participant: ParticipantId) -> ViewUpdate {
        self.0.read().unwrap().view_for(participant)
    }

    pub fn status(&self) -> MatchStatus {
        self.0.read().unwrap().game.status()
    }

    pub fn round(&self) -> u32 {
        self.0.read().unwrap().game.round()
    }

    pub fn winner(&self) -> Option<Winner> {
        self.0.read().unwrap().game.winner()
    }

    pub fn role_of(&self, participant: ParticipantId) -> Option<Role> {
        self.0.read().unwrap().game.role_of(participant)
    }

    pub fn is_alive(&self, participant: ParticipantId) -> bool {
        self.0.read().unwrap().game.is_alive(participant)
    }

    pub fn lovers(&self) -> Option<(ParticipantId, ParticipantId)> {
        self.0.read().unwrap().game.lovers()
    }

    pub fn awaiting_revenge(&self) -> Option<ParticipantId> {
        self.0.read().unwrap().game.awaiting_revenge()
    }
}

#[cfg(test)]
mod tests {
    mod action;
    mod day;
    mod game;
    mod night;
    mod server;
    mod session;
    mod support;
    mod view;
}
