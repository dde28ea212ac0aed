//! Persistence boundary: keyed upserts for match, players and lovers,
//! insert-or-update for actions, ordered iteration on load. Backends are
//! swappable behind [`MatchStore`].

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use werewolf_game_lib::ActionKind;
use werewolf_game_lib::Actor;
use werewolf_game_lib::MatchStatus;
use werewolf_game_lib::ParticipantId;
use werewolf_game_lib::Phase;
use werewolf_game_lib::Role;
use werewolf_game_lib::SessionToken;
use werewolf_game_lib::Winner;

use crate::action::Action;
use crate::game::MatchSettings;
use crate::game::RevengeGate;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("encoding failure: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Uniquely keyed by `id`.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct MatchRow {
    pub id: u64,
    pub status: MatchStatus,
    pub round: u32,
    pub settings: MatchSettings,
    pub winner: Option<Winner>,
    pub gate: Option<RevengeGate>,
    pub resolving: Option<Phase>,
    pub second_kill_round: bool,
    pub cub_died_this_round: bool,
    pub quota: BTreeMap<Role, u32>,
}

/// Uniquely keyed by (match, participant).
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct PlayerRow {
    pub match_id: u64,
    pub participant: ParticipantId,
    pub name: String,
    pub token: SessionToken,
    pub role: Option<Role>,
    pub alive: bool,
    pub observer: bool,
}

/// At most one per match.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct LoversRow {
    pub match_id: u64,
    pub first: ParticipantId,
    pub second: ParticipantId,
}

/// Uniquely keyed by (match, round, phase, actor, kind); the only
/// permitted update is the idempotent retarget.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ActionRow {
    pub match_id: u64,
    pub action: Action,
}

/// Everything needed to rebuild the latest match after a restart.
pub struct PersistedMatch {
    pub match_row: MatchRow,
    pub players: Vec<PlayerRow>,
    pub lovers: Option<LoversRow>,
    /// In insertion order.
    pub actions: Vec<Action>,
}

pub trait MatchStore: Send + Sync {
    fn append_action(&mut self, row: &ActionRow) -> Result<(), StoreError>;
    fn save_match(&mut self, row: &MatchRow) -> Result<(), StoreError>;
    fn save_player(&mut self, row: &PlayerRow) -> Result<(), StoreError>;
    fn remove_player(
        &mut self,
        match_id: u64,
        participant: ParticipantId,
    ) -> Result<(), StoreError>;
    fn save_lovers(&mut self, row: &LoversRow) -> Result<(), StoreError>;
    fn load_latest(&mut self) -> Result<Option<PersistedMatch>, StoreError>;
}

type ActionKey = (u64, u32, Phase, Actor, ActionKind);

/// Process-local store; the default when no database path is configured.
#[derive(Default)]
pub struct MemoryStore {
    matches: BTreeMap<u64, MatchRow>,
    players: BTreeMap<(u64, ParticipantId), PlayerRow>,
    lovers: BTreeMap<u64, LoversRow>,
    actions: Vec<ActionRow>,
    action_index: HashMap<ActionKey, usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MatchStore for MemoryStore {
    fn append_action(&mut self, row: &ActionRow) -> Result<(), StoreError> {
        let key = (
            row.match_id,
            row.action.round,
            row.action.phase,
            row.action.actor,
            row.action.kind,
        );

        match self.action_index.get(&key) {
            Some(&idx) => self.actions[idx] = row.clone(),
            None => {
                self.action_index.insert(key, self.actions.len());
                self.actions.push(row.clone());
            }
        }

        Ok(())
    }

    fn save_match(&mut self, row: &MatchRow) -> Result<(), StoreError> {
        self.matches.insert(row.id, row.clone());
        Ok(())
    }

    fn save_player(&mut self, row: &PlayerRow) -> Result<(), StoreError> {
        self.players
            .insert((row.match_id, row.participant), row.clone());
        Ok(())
    }

    fn remove_player(
        &mut self,
        match_id: u64,
        participant: ParticipantId,
    ) -> Result<(), StoreError> {
        self.players.remove(&(match_id, participant));
        Ok(())
    }

    fn save_lovers(&mut self, row: &LoversRow) -> Result<(), StoreError> {
        self.lovers.insert(row.match_id, row.clone());
        Ok(())
    }

    fn load_latest(&mut self) -> Result<Option<PersistedMatch>, StoreError> {
        let Some((&id, match_row)) = self.matches.last_key_value() else {
            return Ok(None);
        };

        Ok(Some(PersistedMatch {
            match_row: match_row.clone(),
            players: self
                .players
                .range((id, ParticipantId(0))..=(id, ParticipantId(usize::MAX)))
                .map(|(_, row)| row.clone())
                .collect(),
            lovers: self.lovers.get(&id).cloned(),
            actions: self
                .actions
                .iter()
                .filter(|row| row.match_id == id)
                .map(|row| row.action.clone())
                .collect(),
        }))
    }
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum JournalRecord {
    Match(MatchRow),
    Player(PlayerRow),
    PlayerRemoved {
        match_id: u64,
        participant: ParticipantId,
    },
    Lovers(LoversRow),
    Action(ActionRow),
}

/// Append-only newline-delimited-JSON journal. Upserts append
/// superseding records; loading folds the journal in order, so each
/// atomic append leaves a valid recoverable state on disk.
pub struct JournalStore {
    path: PathBuf,
    file: File,
}

impl JournalStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    fn append(&mut self, record: &JournalRecord) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(record)?;
        tracing::debug!(bytes = line.len(), "journal append");
        line.push('\n');
        self.file.write_all(line.as_bytes())?;
        self.file.flush()?;
        Ok(())
    }
}

impl MatchStore for JournalStore {
    fn append_action(&mut self, row: &ActionRow) -> Result<(), StoreError> {
        self.append(&JournalRecord::Action(row.clone()))
    }

    fn save_match(&mut self, row: &MatchRow) -> Result<(), StoreError> {
        self.append(&JournalRecord::Match(row.clone()))
    }

    fn save_player(&mut self, row: &PlayerRow) -> Result<(), StoreError> {
        self.append(&JournalRecord::Player(row.clone()))
    }

    fn remove_player(
        &mut self,
        match_id: u64,
        participant: ParticipantId,
    ) -> Result<(), StoreError> {
        self.append(&JournalRecord::PlayerRemoved {
            match_id,
            participant,
        })
    }

    fn save_lovers(&mut self, row: &LoversRow) -> Result<(), StoreError> {
        self.append(&JournalRecord::Lovers(row.clone()))
    }

    fn load_latest(&mut self) -> Result<Option<PersistedMatch>, StoreError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        // Fold the journal through a memory store so both backends load
        // identically.
        let mut folded = MemoryStore::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<JournalRecord>(&line)? {
                JournalRecord::Match(row) => folded.save_match(&row)?,
                JournalRecord::Player(row) => folded.save_player(&row)?,
                JournalRecord::PlayerRemoved {
                    match_id,
                    participant,
                } => folded.remove_player(match_id, participant)?,
                JournalRecord::Lovers(row) => folded.save_lovers(&row)?,
                JournalRecord::Action(row) => folded.append_action(&row)?,
            }
        }

        folded.load_latest()
    }
}
