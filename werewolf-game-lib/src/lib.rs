//! Data structures shared by the Werewolf server and its clients.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/// Identifier for a registered participant. Stable across reconnections.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct ParticipantId(pub usize);

/// Opaque recovery token handed out at registration, used to re-bind a
/// session after a dropped connection.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct SessionToken(pub Uuid);

impl SessionToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionToken {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Which side a role plays for.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum Team {
    Villagers,
    Werewolves,
}

/// The closed set of roles a player can hold.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum Role {
    Villager,
    Werewolf,
    /// Learns one player's team each night.
    Seer,
    /// Shields one player from the wolves each night.
    Doctor,
    /// Holds one heal potion and one poison potion for the whole match.
    Witch,
    /// Takes one player down on death.
    Hunter,
    /// Links two players into lovers on the first night.
    Cupid,
    /// Shields one player each night, never itself and never the same
    /// player twice in a row.
    Guard,
    /// Knows the other masons.
    Mason,
    /// Its death grants the pack a second kill the following night.
    WolfCub,
}

impl Role {
    pub const ALL: &[Role] = &[
        Role::Villager,
        Role::Werewolf,
        Role::Seer,
        Role::Doctor,
        Role::Witch,
        Role::Hunter,
        Role::Cupid,
        Role::Guard,
        Role::Mason,
        Role::WolfCub,
    ];

    pub fn team(&self) -> Team {
        match self {
            Role::Werewolf | Role::WolfCub => Team::Werewolves,
            _ => Team::Villagers,
        }
    }

    pub fn is_team(&self, team: Team) -> bool {
        self.team() == team
    }

    /// Whether the role supplies input before a night can resolve.
    ///
    /// Cupid only acts on the first night; the engine narrows this per
    /// round.
    pub fn has_night_action(&self) -> bool {
        matches!(
            self,
            Role::Werewolf
                | Role::WolfCub
                | Role::Seer
                | Role::Doctor
                | Role::Witch
                | Role::Guard
                | Role::Cupid
        )
    }

    /// Whether holders of this role learn who their teammates are.
    pub fn sees_teammates(&self) -> bool {
        matches!(self, Role::Werewolf | Role::WolfCub | Role::Mason)
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Role::Villager => "Villager",
            Role::Werewolf => "Werewolf",
            Role::Seer => "Seer",
            Role::Doctor => "Doctor",
            Role::Witch => "Witch",
            Role::Hunter => "Hunter",
            Role::Cupid => "Cupid",
            Role::Guard => "Guard",
            Role::Mason => "Mason",
            Role::WolfCub => "Wolf Cub",
        };
        f.write_str(name)
    }
}

/// Half-round marker. `Night` sorts before `Day` of the same round.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum Phase {
    Night,
    Day,
}

/// Lifecycle of the single process-wide match.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum MatchStatus {
    Lobby,
    Night,
    Day,
    Finished,
}

/// Why a player died.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum DeathCause {
    WerewolfKill,
    WitchPoison,
    DayElection,
    LoverHeartbreak,
    HunterRevenge,
}

/// Who may learn of a recorded action, now or later.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum Visibility {
    /// Always visible.
    Public,
    /// Visible to the werewolf team.
    TeamWerewolf,
    /// Visible to the villager team.
    TeamVillager,
    /// Visible only to the actor.
    ActorOnly,
    /// Hidden until the phase containing it has ended, then public.
    ResolvedPublic,
}

/// Originator of a recorded action or a chat line.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum Actor {
    Player(ParticipantId),
    System,
}

/// The closed set of recordable action types.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum ActionKind {
    WerewolfKill,
    WerewolfKill2,
    WerewolfPass,
    WerewolfPass2,
    WerewolfEndVote,
    WerewolfEndVote2,
    SeerInvestigate,
    DoctorProtect,
    GuardProtect,
    WitchHeal,
    WitchKill,
    WitchPass,
    CupidLinkFirst,
    CupidLinkSecond,
    DayVote,
    DayPass,
    DayEndVote,
    HunterRevenge,
    Death,
    MorningReport,
}

impl ActionKind {
    /// Target-carrying kinds where a duplicate submission replaces the
    /// target. Everything else is insertion-only.
    pub fn retargetable(&self) -> bool {
        matches!(
            self,
            ActionKind::WerewolfKill
                | ActionKind::WerewolfKill2
                | ActionKind::SeerInvestigate
                | ActionKind::DoctorProtect
                | ActionKind::GuardProtect
                | ActionKind::WitchHeal
                | ActionKind::WitchKill
                | ActionKind::DayVote
        )
    }
}

/// Winning side of a finished match.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum Winner {
    Villagers,
    Werewolves,
    Lovers,
}

/// Public information about a participant.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct ParticipantInfo {
    pub name: Arc<str>,
    pub id: ParticipantId,
}

/// An inbound client message. The `action` tag set is closed; payload
/// fields are typed per variant.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Intent {
    UpdateRole { role: Role, delta: i32 },
    StartGame,
    WerewolfVote { target: ParticipantId },
    #[serde(rename = "werewolf_vote_2")]
    WerewolfVote2 { target: ParticipantId },
    WerewolfPass,
    #[serde(rename = "werewolf_pass_2")]
    WerewolfPass2,
    WerewolfEndVote,
    #[serde(rename = "werewolf_end_vote_2")]
    WerewolfEndVote2,
    SeerInvestigate { target: ParticipantId },
    DoctorProtect { target: ParticipantId },
    GuardProtect { target: ParticipantId },
    WitchHeal { target: ParticipantId },
    WitchKill { target: ParticipantId },
    WitchPass,
    CupidChoose { first: ParticipantId, second: ParticipantId },
    DayVote { target: ParticipantId },
    DayPass,
    DayEndVote,
    HunterRevenge { target: ParticipantId },
    NightSurvey,
    NewGame,
    Chat { body: String },
}

/// Channel a chat line is routed to.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum ChatChannel {
    /// Everyone.
    Public,
    /// Alive pack members, plus the dead.
    Pack,
    /// Dead players and observers only.
    Dead,
}

/// A chat line delivered to a client.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub channel: ChatChannel,
    pub from: Actor,
    pub body: Box<str>,
}

/// Presence change fanned out to all participants.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct PresenceNotice {
    pub participant: ParticipantInfo,
    pub event: PresenceEvent,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum PresenceEvent {
    /// Became a lobby member.
    Joined,
    /// Removed from the lobby.
    Left,
    Connected,
    Disconnected,
}

/// Sound/vibration hook broadcast on significant transitions.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum TransitionCue {
    NightFalls,
    Daybreak,
    Death,
    Finished,
}

/// A recorded vote as shown to viewers entitled to see it.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct RecordedVote {
    pub voter: ParticipantId,
    /// `None` means the voter passed.
    pub target: Option<ParticipantId>,
}

/// Lobby projection: the pending quota and who is in.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct LobbyView {
    pub members: Vec<ParticipantInfo>,
    pub quota: BTreeMap<Role, u32>,
    pub quota_total: u32,
    /// Quota total matches the member count and the pack is non-empty.
    pub ready: bool,
}

/// Night projection, tailored per viewer role.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct NightView {
    pub round: u32,
    pub role: Option<Role>,
    pub alive: bool,
    /// Legal targets for the viewer's pending night duty.
    pub targets: Vec<ParticipantId>,
    /// The viewer's own recorded actions for this round.
    pub own_actions: Vec<String>,
    /// Fellow pack members, wolf viewers only.
    pub pack: Vec<ParticipantInfo>,
    /// Current pack votes, wolf viewers only.
    pub pack_votes: Vec<RecordedVote>,
    /// A second kill round is open this night.
    pub second_kill_round: bool,
    /// Fellow masons, mason viewers only.
    pub masons: Vec<ParticipantInfo>,
    /// Pending wolf victims, witch viewers only, gated on the heal potion.
    pub pending_victims: Vec<ParticipantId>,
    pub heal_available: bool,
    pub poison_available: bool,
    /// Set while a revenge shot is the only accepted action.
    pub awaiting_revenge: Option<ParticipantId>,
    /// The viewer's lover, revealed to the pair once Cupid has chosen.
    pub lover: Option<ParticipantId>,
    /// The viewer has supplied everything this night needs from them.
    pub acted: bool,
}

/// A death confirmed at daybreak, role revealed.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ConfirmedDeath {
    pub player: ParticipantId,
    pub role: Role,
    pub cause: DeathCause,
}

/// Day projection.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct DayView {
    pub round: u32,
    pub alive: bool,
    /// Alive participants, i.e. legal vote targets.
    pub targets: Vec<ParticipantId>,
    pub morning_deaths: Vec<ConfirmedDeath>,
    pub votes: Vec<RecordedVote>,
    pub awaiting_revenge: Option<ParticipantId>,
    /// The viewer's lover, revealed to the pair once Cupid has chosen.
    pub lover: Option<ParticipantId>,
}

/// Post-match reveal entry.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct RevealedRole {
    pub player: ParticipantInfo,
    pub role: Role,
    pub alive: bool,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct FinishedView {
    pub winner: Winner,
    pub roles: Vec<RevealedRole>,
}

/// The per-participant projection for the current phase.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum PhaseView {
    Lobby(LobbyView),
    Night(NightView),
    Day(DayView),
    Finished(FinishedView),
}

/// A full view refresh: phase projection plus the filtered history.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ViewUpdate {
    pub view: PhaseView,
    /// Action descriptions the viewer is entitled to, oldest first.
    pub history: Vec<String>,
}

/// An outbound message addressed to a connection.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    View(ViewUpdate),
    Chat(ChatMessage),
    Presence(PresenceNotice),
    Cue { cue: TransitionCue },
    Error { kind: Box<str>, message: Box<str> },
}
