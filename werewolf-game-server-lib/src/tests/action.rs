use werewolf_game_lib::ActionKind;
use werewolf_game_lib::Actor;
use werewolf_game_lib::ParticipantId;
use werewolf_game_lib::Phase;
use werewolf_game_lib::Visibility;

use crate::action::Action;
use crate::action::ActionLog;
use crate::action::Recorded;
use crate::error::GameError;

fn row(actor: usize, kind: ActionKind, target: Option<usize>) -> Action {
    Action {
        round: 1,
        phase: Phase::Night,
        actor: Actor::Player(ParticipantId(actor)),
        kind,
        target: target.map(ParticipantId),
        visibility: Visibility::TeamWerewolf,
        description: format!("p{actor} does {kind:?}"),
        cause: None,
    }
}

#[test]
fn test_retarget_replaces_single_row() {
    let mut log = ActionLog::new();

    assert_eq!(
        log.record(row(0, ActionKind::WerewolfKill, Some(1))).unwrap(),
        Recorded::Inserted
    );
    assert_eq!(
        log.record(row(0, ActionKind::WerewolfKill, Some(2))).unwrap(),
        Recorded::Retargeted
    );

    // Exactly one row, holding the last submitted target.
    assert_eq!(log.entries().len(), 1);
    assert_eq!(log.entries()[0].target, Some(ParticipantId(2)));
}

#[test]
fn test_insertion_only_duplicate_is_conflict() {
    let mut log = ActionLog::new();

    log.record(row(0, ActionKind::CupidLinkFirst, Some(1)))
        .unwrap();

    assert!(matches!(
        log.record(row(0, ActionKind::CupidLinkFirst, Some(2))),
        Err(GameError::DuplicateAction(_))
    ));
    assert_eq!(log.entries().len(), 1);
}

#[test]
fn test_identical_resubmission_is_unchanged() {
    let mut log = ActionLog::new();

    log.record(row(0, ActionKind::WerewolfPass, None)).unwrap();
    assert_eq!(
        log.record(row(0, ActionKind::WerewolfPass, None)).unwrap(),
        Recorded::Unchanged
    );
    assert_eq!(log.entries().len(), 1);
}

#[test]
fn test_same_kind_different_actors_both_recorded() {
    let mut log = ActionLog::new();

    log.record(row(0, ActionKind::WerewolfKill, Some(2))).unwrap();
    log.record(row(1, ActionKind::WerewolfKill, Some(2))).unwrap();

    assert_eq!(log.entries().len(), 2);
}

#[test]
fn test_majority_requires_strict_majority() {
    let mut log = ActionLog::new();

    // 2 of 3 votes on the same head.
    log.record(row(0, ActionKind::WerewolfKill, Some(7))).unwrap();
    log.record(row(1, ActionKind::WerewolfKill, Some(7))).unwrap();
    log.record(row(2, ActionKind::WerewolfKill, Some(8))).unwrap();
    assert_eq!(
        log.majority_target(1, Phase::Night, ActionKind::WerewolfKill),
        Some(ParticipantId(7))
    );

    // An even split is no majority.
    let mut log = ActionLog::new();
    log.record(row(0, ActionKind::WerewolfKill, Some(7))).unwrap();
    log.record(row(1, ActionKind::WerewolfKill, Some(8))).unwrap();
    assert_eq!(
        log.majority_target(1, Phase::Night, ActionKind::WerewolfKill),
        None
    );

    // No votes at all.
    let log = ActionLog::new();
    assert_eq!(
        log.majority_target(1, Phase::Night, ActionKind::WerewolfKill),
        None
    );
}

#[test]
fn test_plurality_leaders() {
    let mut log = ActionLog::new();

    let vote = |actor: usize, target: usize| Action {
        phase: Phase::Day,
        ..row(actor, ActionKind::DayVote, Some(target))
    };

    log.record(vote(0, 5)).unwrap();
    log.record(vote(1, 5)).unwrap();
    log.record(vote(2, 6)).unwrap();
    assert_eq!(
        log.plurality_targets(1, Phase::Day, ActionKind::DayVote),
        vec![ParticipantId(5)]
    );

    log.record(vote(3, 6)).unwrap();
    assert_eq!(
        log.plurality_targets(1, Phase::Day, ActionKind::DayVote),
        vec![ParticipantId(5), ParticipantId(6)]
    );
}

#[test]
fn test_dirty_tracking_for_persistence() {
    let mut log = ActionLog::new();

    log.record(row(0, ActionKind::WerewolfKill, Some(1))).unwrap();
    log.record(row(1, ActionKind::WerewolfPass, None)).unwrap();
    assert_eq!(log.take_dirty().len(), 2);
    assert!(log.take_dirty().is_empty());

    log.record(row(0, ActionKind::WerewolfKill, Some(2))).unwrap();
    let dirty = log.take_dirty();
    assert_eq!(dirty.len(), 1);
    assert_eq!(dirty[0].target, Some(ParticipantId(2)));
}

#[test]
fn test_rebuild_preserves_order_and_keys() {
    let mut log = ActionLog::new();
    log.record(row(0, ActionKind::WerewolfKill, Some(1))).unwrap();
    log.record(row(1, ActionKind::WerewolfPass, None)).unwrap();

    let rebuilt = ActionLog::from_rows(log.entries().to_vec());
    assert_eq!(rebuilt.entries(), log.entries());
    assert!(rebuilt.has(1, Phase::Night, ParticipantId(1), ActionKind::WerewolfPass));
}
