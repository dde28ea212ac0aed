use werewolf_game_lib::DeathCause;
use werewolf_game_lib::MatchStatus;
use werewolf_game_lib::Phase;
use werewolf_game_lib::Role;
use werewolf_game_lib::Winner;

use crate::error::GameError;
use crate::tests::support;

#[test_log::test]
fn test_simple_kill() {
    let (mut game, mut log) = support::started_match(&[(Role::Villager, 2), (Role::Werewolf, 1)]);

    let wolf = support::holder(&game, Role::Werewolf);
    let victim = game.alive_with_role(Role::Villager)[1];

    support::pack_kill(&mut game, &mut log, victim, false);
    assert!(game.maybe_resolve_night(&mut log).unwrap());

    assert!(!game.is_alive(victim));
    assert_eq!(game.alive_ids().len(), 2);
    assert!(game.is_alive(wolf));
    assert_eq!(game.status(), MatchStatus::Day);
    assert_eq!(game.round(), 1);
    assert_eq!(
        log.deaths_in(1, Phase::Night),
        vec![(victim, DeathCause::WerewolfKill)]
    );
}

#[test_log::test]
fn test_doctor_save() {
    let (mut game, mut log) = support::started_match(&[
        (Role::Villager, 2),
        (Role::Doctor, 1),
        (Role::Werewolf, 2),
    ]);

    let doctor = support::holder(&game, Role::Doctor);
    let victim = game.alive_with_role(Role::Villager)[0];

    support::pack_kill(&mut game, &mut log, victim, false);
    game.submit_doctor_protect(doctor, victim, &mut log).unwrap();
    assert!(game.maybe_resolve_night(&mut log).unwrap());

    assert!(log.deaths_in(1, Phase::Night).is_empty());
    assert_eq!(game.alive_ids().len(), 5);
    assert_eq!(game.status(), MatchStatus::Day);
    assert_eq!(game.round(), 1);
}

#[test_log::test]
fn test_guard_restriction_across_rounds() {
    let (mut game, mut log) =
        support::started_match(&[(Role::Guard, 1), (Role::Villager, 2), (Role::Werewolf, 1)]);

    let guard = support::holder(&game, Role::Guard);
    let villagers = game.alive_with_role(Role::Villager);

    // Night 1: protecting p2 is legal, protecting oneself is not.
    assert!(matches!(
        game.submit_guard_protect(guard, guard, &mut log),
        Err(GameError::InvalidTarget(_))
    ));
    game.submit_guard_protect(guard, villagers[0], &mut log)
        .unwrap();
    support::pack_pass(&mut game, &mut log, false);
    assert!(game.maybe_resolve_night(&mut log).unwrap());
    support::pass_day(&mut game, &mut log);
    assert_eq!(game.round(), 2);

    // Night 2: the same target twice in a row is rejected; a retarget is
    // required.
    assert!(matches!(
        game.submit_guard_protect(guard, villagers[0], &mut log),
        Err(GameError::InvalidTarget(_))
    ));
    game.submit_guard_protect(guard, villagers[1], &mut log)
        .unwrap();
}

#[test_log::test]
fn test_wolf_cub_death_grants_second_kill() {
    let (mut game, mut log) = support::started_match(&[
        (Role::Werewolf, 1),
        (Role::WolfCub, 1),
        (Role::Villager, 3),
    ]);

    let cub = support::holder(&game, Role::WolfCub);
    let villagers = game.alive_with_role(Role::Villager);

    // The pack may turn on its own cub.
    support::pack_kill(&mut game, &mut log, cub, false);
    assert!(game.maybe_resolve_night(&mut log).unwrap());
    assert!(!game.is_alive(cub));
    assert_eq!(game.status(), MatchStatus::Day);

    support::pass_day(&mut game, &mut log);
    assert_eq!(game.round(), 2);
    assert!(game.second_kill_round);

    // Two independent kill rounds, two victims.
    support::pack_kill(&mut game, &mut log, villagers[0], false);
    support::pack_kill(&mut game, &mut log, villagers[1], true);
    assert!(game.maybe_resolve_night(&mut log).unwrap());

    assert_eq!(
        log.deaths_in(2, Phase::Night),
        vec![
            (villagers[0], DeathCause::WerewolfKill),
            (villagers[1], DeathCause::WerewolfKill),
        ]
    );
    assert_eq!(game.status(), MatchStatus::Day);

    // The grant is consumed after one night.
    support::pass_day(&mut game, &mut log);
    assert!(!game.second_kill_round);
}

#[test]
fn test_second_kill_round_requires_the_grant() {
    let (mut game, mut log) = support::started_match(&[(Role::Werewolf, 1), (Role::Villager, 2)]);

    let wolf = support::holder(&game, Role::Werewolf);
    let villager = game.alive_with_role(Role::Villager)[0];

    assert!(matches!(
        game.submit_werewolf_vote(wolf, villager, true, &mut log),
        Err(GameError::OutOfPhase(_))
    ));
}

#[test_log::test]
fn test_lovers_win() {
    let (mut game, mut log) =
        support::started_match(&[(Role::Cupid, 1), (Role::Villager, 1), (Role::Werewolf, 1)]);

    let cupid = support::holder(&game, Role::Cupid);
    let villager = support::holder(&game, Role::Villager);
    let wolf = support::holder(&game, Role::Werewolf);

    game.submit_cupid_choose(cupid, villager, wolf, &mut log)
        .unwrap();
    support::pack_kill(&mut game, &mut log, cupid, false);
    assert!(game.maybe_resolve_night(&mut log).unwrap());

    assert_eq!(game.alive_ids(), vec![villager.min(wolf), villager.max(wolf)]);
    assert_eq!(game.status(), MatchStatus::Finished);
    assert_eq!(game.winner(), Some(Winner::Lovers));
}

#[test_log::test]
fn test_witch_heal_and_poison() {
    let (mut game, mut log) =
        support::started_match(&[(Role::Witch, 1), (Role::Villager, 2), (Role::Werewolf, 1)]);

    let witch = support::holder(&game, Role::Witch);
    let villagers = game.alive_with_role(Role::Villager);

    // The witch acts only once the pack result is known.
    assert!(matches!(
        game.submit_witch_pass(witch, &mut log),
        Err(GameError::OutOfPhase(_))
    ));

    support::pack_kill(&mut game, &mut log, villagers[0], false);
    assert_eq!(game.pending_wolf_victims(&log), vec![villagers[0]]);

    // Healing someone who is not the victim is rejected.
    assert!(matches!(
        game.submit_witch_heal(witch, villagers[1], &mut log),
        Err(GameError::InvalidTarget(_))
    ));

    game.submit_witch_heal(witch, villagers[0], &mut log).unwrap();
    game.submit_witch_kill(witch, villagers[1], &mut log).unwrap();
    game.submit_witch_pass(witch, &mut log).unwrap();
    assert!(game.maybe_resolve_night(&mut log).unwrap());

    // The wolf victim survives; the poisoned villager does not.
    assert!(game.is_alive(villagers[0]));
    assert!(!game.is_alive(villagers[1]));
    assert_eq!(
        log.deaths_in(1, Phase::Night),
        vec![(villagers[1], DeathCause::WitchPoison)]
    );
    assert_eq!(game.status(), MatchStatus::Day);
}

#[test_log::test]
fn test_witch_potions_are_single_use() {
    let (mut game, mut log) =
        support::started_match(&[(Role::Witch, 1), (Role::Villager, 3), (Role::Werewolf, 1)]);

    let witch = support::holder(&game, Role::Witch);
    let villagers = game.alive_with_role(Role::Villager);

    support::pack_kill(&mut game, &mut log, villagers[0], false);
    game.submit_witch_heal(witch, villagers[0], &mut log).unwrap();
    game.submit_witch_kill(witch, villagers[1], &mut log).unwrap();
    game.submit_witch_pass(witch, &mut log).unwrap();
    assert!(game.maybe_resolve_night(&mut log).unwrap());
    support::pass_day(&mut game, &mut log);

    // Night 2: both potions are spent.
    support::pack_kill(&mut game, &mut log, villagers[2], false);
    assert!(matches!(
        game.submit_witch_heal(witch, villagers[2], &mut log),
        Err(GameError::RoleForbids(_))
    ));
    assert!(matches!(
        game.submit_witch_kill(witch, villagers[0], &mut log),
        Err(GameError::RoleForbids(_))
    ));
    game.submit_witch_pass(witch, &mut log).unwrap();
}

#[test]
fn test_wolf_majority_is_strict() {
    let (mut game, mut log) = support::started_match(&[(Role::Werewolf, 2), (Role::Villager, 3)]);

    let wolves = game.alive_with_role(Role::Werewolf);
    let villagers = game.alive_with_role(Role::Villager);

    // A split pack kills no one.
    game.submit_werewolf_vote(wolves[0], villagers[0], false, &mut log)
        .unwrap();
    game.submit_werewolf_vote(wolves[1], villagers[1], false, &mut log)
        .unwrap();
    game.submit_werewolf_end_vote(wolves[0], false, &mut log)
        .unwrap();
    assert!(game.maybe_resolve_night(&mut log).unwrap());

    assert!(log.deaths_in(1, Phase::Night).is_empty());
    assert_eq!(game.alive_ids().len(), 5);
}

#[test]
fn test_wolf_all_pass_kills_no_one() {
    let (mut game, mut log) = support::started_match(&[(Role::Werewolf, 2), (Role::Villager, 3)]);

    support::pack_pass(&mut game, &mut log, false);
    assert!(game.maybe_resolve_night(&mut log).unwrap());

    assert!(log.deaths_in(1, Phase::Night).is_empty());
    assert_eq!(game.status(), MatchStatus::Day);
}

#[test]
fn test_end_vote_needs_the_whole_pack() {
    let (mut game, mut log) = support::started_match(&[(Role::Werewolf, 2), (Role::Villager, 3)]);

    let wolves = game.alive_with_role(Role::Werewolf);
    let villager = game.alive_with_role(Role::Villager)[0];

    game.submit_werewolf_vote(wolves[0], villager, false, &mut log)
        .unwrap();
    assert!(matches!(
        game.submit_werewolf_end_vote(wolves[0], false, &mut log),
        Err(GameError::OutOfPhase(_))
    ));

    game.submit_werewolf_vote(wolves[1], villager, false, &mut log)
        .unwrap();
    game.submit_werewolf_end_vote(wolves[1], false, &mut log)
        .unwrap();

    // The lock closes the round.
    assert!(matches!(
        game.submit_werewolf_vote(wolves[0], villager, false, &mut log),
        Err(GameError::OutOfPhase(_))
    ));
}

#[test_log::test]
fn test_cupid_link_blocks_resolution() {
    let (mut game, mut log) =
        support::started_match(&[(Role::Cupid, 1), (Role::Werewolf, 1), (Role::Villager, 2)]);

    let cupid = support::holder(&game, Role::Cupid);
    let villagers = game.alive_with_role(Role::Villager);

    support::pack_pass(&mut game, &mut log, false);

    // A completed pack vote still waits on the pending link.
    assert!(!game.maybe_resolve_night(&mut log).unwrap());

    game.submit_cupid_choose(cupid, villagers[0], villagers[1], &mut log)
        .unwrap();
    assert!(game.maybe_resolve_night(&mut log).unwrap());
    assert_eq!(game.status(), MatchStatus::Day);
}

#[test_log::test]
fn test_night_hunter_death_gates_resolution() {
    let (mut game, mut log) =
        support::started_match(&[(Role::Hunter, 1), (Role::Werewolf, 1), (Role::Villager, 3)]);

    let hunter = support::holder(&game, Role::Hunter);
    let wolf = support::holder(&game, Role::Werewolf);
    let villagers = game.alive_with_role(Role::Villager);

    support::pack_kill(&mut game, &mut log, hunter, false);
    assert!(game.maybe_resolve_night(&mut log).unwrap());

    // Still night: the morning waits on the revenge shot.
    assert_eq!(game.status(), MatchStatus::Night);
    assert_eq!(game.awaiting_revenge(), Some(hunter));

    // Nobody else may act through the gate.
    assert!(matches!(
        game.submit_werewolf_vote(wolf, villagers[0], false, &mut log),
        Err(GameError::OutOfPhase(_))
    ));
    assert!(matches!(
        game.submit_hunter_revenge(villagers[0], villagers[1], &mut log),
        Err(GameError::RoleForbids(_))
    ));

    game.submit_hunter_revenge(hunter, villagers[0], &mut log)
        .unwrap();

    assert_eq!(
        log.deaths_in(1, Phase::Night),
        vec![
            (hunter, DeathCause::WerewolfKill),
            (villagers[0], DeathCause::HunterRevenge),
        ]
    );
    assert_eq!(game.status(), MatchStatus::Day);
    assert_eq!(game.awaiting_revenge(), None);
}

#[test]
fn test_dead_players_cannot_act_and_cannot_be_targeted() {
    let (mut game, mut log) = support::started_match(&[(Role::Werewolf, 1), (Role::Villager, 4)]);

    let wolf = support::holder(&game, Role::Werewolf);
    let villagers = game.alive_with_role(Role::Villager);

    support::pack_kill(&mut game, &mut log, villagers[0], false);
    assert!(game.maybe_resolve_night(&mut log).unwrap());
    support::pass_day(&mut game, &mut log);

    // Night 2: the dead neither act nor appear in target lists.
    assert!(matches!(
        game.submit_werewolf_vote(wolf, villagers[0], false, &mut log),
        Err(GameError::InvalidTarget(_))
    ));
    assert!(matches!(
        game.submit_day_vote(villagers[0], wolf, &mut log),
        Err(GameError::OutOfPhase(_) | GameError::NotAlive(_))
    ));
}
