//! Participant registry and realtime fan-out. A participant registers
//! once under a globally-unique name, may hold several simultaneous
//! connections, and every connection gets its own single-writer outbox.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;

use bit_set::BitSet;
use werewolf_game_lib::ParticipantId;
use werewolf_game_lib::ParticipantInfo;
use werewolf_game_lib::ServerMessage;
use werewolf_game_lib::SessionToken;

use crate::error::GameError;

/// Identifier for one open connection of a participant.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ConnectionId(pub usize);

/// Dense set of participant ids, used for building recipient sets.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct ParticipantSet(BitSet);

impl ParticipantSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, participant: ParticipantId) {
        self.0.insert(participant.0);
    }

    pub fn remove(&mut self, participant: ParticipantId) {
        self.0.remove(participant.0);
    }

    pub fn contains(&self, participant: ParticipantId) -> bool {
        self.0.contains(participant.0)
    }

    pub fn difference_with(&mut self, other: &ParticipantSet) {
        self.0.difference_with(&other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.0.iter().map(ParticipantId)
    }
}

impl FromIterator<ParticipantId> for ParticipantSet {
    fn from_iter<T: IntoIterator<Item = ParticipantId>>(iter: T) -> Self {
        let mut set = Self::new();
        for participant in iter {
            set.insert(participant);
        }
        set
    }
}

impl<'a> IntoIterator for &'a ParticipantSet {
    type Item = ParticipantId;
    type IntoIter = Box<dyn Iterator<Item = ParticipantId> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// One open connection. The outbox mutex is the per-connection write
/// lock; the transport drains it from a single writer.
struct Connection {
    outbox: Mutex<VecDeque<Arc<ServerMessage>>>,
}

/// Presence record for a registered participant.
struct Session {
    info: ParticipantInfo,
    token: SessionToken,
    connections: HashMap<ConnectionId, Connection>,
}

#[derive(Default)]
pub struct SessionHub {
    sessions: HashMap<ParticipantId, Session>,
    name_to_id: HashMap<Arc<str>, ParticipantId>,
    token_to_id: HashMap<SessionToken, ParticipantId>,
    next_participant: usize,
    next_connection: usize,
}

impl SessionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new participant. Names are reserved for as long as the
    /// identity exists, which is forever.
    pub fn register(&mut self, name: &str) -> Result<(ParticipantId, SessionToken), GameError> {
        let name: Arc<str> = Arc::from(name);

        if self.name_to_id.contains_key(&name) {
            return Err(GameError::NameTaken(name.to_string()));
        }

        let id = ParticipantId(self.next_participant);
        self.next_participant += 1;
        let token = SessionToken::new();

        self.sessions.insert(
            id,
            Session {
                info: ParticipantInfo {
                    name: Arc::clone(&name),
                    id,
                },
                token,
                connections: HashMap::new(),
            },
        );
        self.name_to_id.insert(name, id);
        self.token_to_id.insert(token, id);

        tracing::debug!(?id, "participant registered");

        Ok((id, token))
    }

    /// Re-seats a persisted participant on recovery.
    pub(crate) fn restore_participant(
        &mut self,
        id: ParticipantId,
        name: Arc<str>,
        token: SessionToken,
    ) {
        self.next_participant = self.next_participant.max(id.0 + 1);
        self.sessions.insert(
            id,
            Session {
                info: ParticipantInfo {
                    name: Arc::clone(&name),
                    id,
                },
                token,
                connections: HashMap::new(),
            },
        );
        self.name_to_id.insert(name, id);
        self.token_to_id.insert(token, id);
    }

    pub fn authenticate(&self, token: SessionToken) -> Result<ParticipantId, GameError> {
        self.token_to_id
            .get(&token)
            .copied()
            .ok_or(GameError::InvalidSessionToken(token))
    }

    pub fn token_of(&self, participant: ParticipantId) -> Option<SessionToken> {
        self.sessions.get(&participant).map(|s| s.token)
    }

    pub fn info(&self, participant: ParticipantId) -> Option<ParticipantInfo> {
        self.sessions.get(&participant).map(|s| s.info.clone())
    }

    /// Opens a connection. Returns its id and whether it is the
    /// participant's first live connection.
    pub fn open_connection(
        &mut self,
        participant: ParticipantId,
    ) -> Result<(ConnectionId, bool), GameError> {
        let id = ConnectionId(self.next_connection);
        self.next_connection += 1;

        let session = self
            .sessions
            .get_mut(&participant)
            .ok_or(GameError::UnknownParticipant(participant))?;

        let first = session.connections.is_empty();
        session.connections.insert(
            id,
            Connection {
                outbox: Mutex::new(VecDeque::with_capacity(16)),
            },
        );

        Ok((id, first))
    }

    /// Drops a connection. Returns whether it was the participant's last.
    pub fn close_connection(
        &mut self,
        participant: ParticipantId,
        connection: ConnectionId,
    ) -> Result<bool, GameError> {
        let session = self
            .sessions
            .get_mut(&participant)
            .ok_or(GameError::UnknownParticipant(participant))?;

        session.connections.remove(&connection);

        Ok(session.connections.is_empty())
    }

    pub fn is_connected(&self, participant: ParticipantId) -> bool {
        self.sessions
            .get(&participant)
            .is_some_and(|s| !s.connections.is_empty())
    }

    /// Participants with at least one live connection.
    pub fn connected(&self) -> ParticipantSet {
        self.sessions
            .iter()
            .filter(|(_, s)| !s.connections.is_empty())
            .map(|(&id, _)| id)
            .collect()
    }

    /// Queues a message on every connection of every recipient.
    pub fn send(&self, to: &ParticipantSet, message: ServerMessage) {
        let message = Arc::new(message);

        for participant in to {
            if let Some(session) = self.sessions.get(&participant) {
                for connection in session.connections.values() {
                    connection
                        .outbox
                        .lock()
                        .unwrap()
                        .push_back(Arc::clone(&message));
                }
            }
        }
    }

    pub fn send_to(&self, participant: ParticipantId, message: ServerMessage) {
        self.send(&std::iter::once(participant).collect(), message);
    }

    pub fn broadcast(&self, message: ServerMessage) {
        self.send(&self.connected(), message);
    }

    /// Drains one connection's outbox.
    pub fn drain_outbox(
        &self,
        participant: ParticipantId,
        connection: ConnectionId,
    ) -> Box<[Arc<ServerMessage>]> {
        let Some(session) = self.sessions.get(&participant) else {
            return Box::new([]);
        };
        let Some(connection) = session.connections.get(&connection) else {
            return Box::new([]);
        };

        connection.outbox.lock().unwrap().drain(..).collect()
    }
}
