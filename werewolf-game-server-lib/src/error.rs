use thiserror::Error;
use werewolf_game_lib::ParticipantId;
use werewolf_game_lib::SessionToken;

use crate::store::StoreError;

/// Coarse classification driving the user-visible policy: validation,
/// authorization, and conflict errors are surfaced verbatim; resource and
/// internal errors are logged and surfaced generically.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ErrorKind {
    Validation,
    Authorization,
    Conflict,
    Resource,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Authorization => "authorization",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Resource => "resource",
            ErrorKind::Internal => "internal",
        }
    }
}

#[derive(Error, Debug)]
pub enum GameError {
    #[error("name '{0}' is already taken")]
    NameTaken(String),
    #[error("invalid session token provided '{0}'")]
    InvalidSessionToken(SessionToken),
    #[error("{0:?} is not registered")]
    UnknownParticipant(ParticipantId),
    #[error("{0:?} is not part of the match")]
    NotInMatch(ParticipantId),
    #[error("{0:?} is not alive")]
    NotAlive(ParticipantId),
    #[error("role does not permit this: {0}")]
    RoleForbids(String),
    #[error("not valid now: {0}")]
    OutOfPhase(String),
    #[error("invalid target: {0}")]
    InvalidTarget(String),
    #[error("invalid lobby edit: {0}")]
    InvalidQuota(String),
    #[error("cannot start: {0}")]
    CannotStart(String),
    #[error("already recorded: {0}")]
    DuplicateAction(String),
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
    #[error("internal engine error: {0}")]
    Internal(String),
}

impl GameError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GameError::NameTaken(_)
            | GameError::OutOfPhase(_)
            | GameError::InvalidTarget(_)
            | GameError::InvalidQuota(_)
            | GameError::CannotStart(_) => ErrorKind::Validation,
            GameError::InvalidSessionToken(_)
            | GameError::UnknownParticipant(_)
            | GameError::NotInMatch(_)
            | GameError::NotAlive(_)
            | GameError::RoleForbids(_) => ErrorKind::Authorization,
            GameError::DuplicateAction(_) => ErrorKind::Conflict,
            GameError::Storage(_) => ErrorKind::Resource,
            GameError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The message shown to the originating client. Resource and internal
    /// failures are never detailed to users.
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::Resource | ErrorKind::Internal => "something went wrong".to_string(),
            _ => self.to_string(),
        }
    }
}
