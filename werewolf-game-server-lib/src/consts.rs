//! Flavor text for death announcements.

use werewolf_game_lib::DeathCause;

/// Used in the form: <PLAYER> <PHRASE>.
pub const WOLF_KILL_PHRASES: &[&str] = &[
    "was found torn apart at the edge of the woods",
    "did not survive the night",
    "was dragged from their bed by something with claws",
];

pub const POISON_PHRASES: &[&str] = &[
    "was found cold, an empty vial beside them",
    "turned a shade of green no healer could fix",
];

pub const ELECTION_PHRASES: &[&str] = &[
    "was sent to the gallows by the village",
    "could not talk their way out of the noose",
];

pub const HEARTBREAK_PHRASES: &[&str] = &["died of a broken heart moments later"];

pub const REVENGE_PHRASES: &[&str] = &["was taken down by the hunter's last shot"];

/// Deterministic phrase pick so a replayed log reproduces the same text.
pub fn death_phrase(cause: DeathCause, salt: usize) -> &'static str {
    let phrases = match cause {
        DeathCause::WerewolfKill => WOLF_KILL_PHRASES,
        DeathCause::WitchPoison => POISON_PHRASES,
        DeathCause::DayElection => ELECTION_PHRASES,
        DeathCause::LoverHeartbreak => HEARTBREAK_PHRASES,
        DeathCause::HunterRevenge => REVENGE_PHRASES,
    };
    phrases[salt % phrases.len()]
}
