use werewolf_game_lib::ActionKind;
use werewolf_game_lib::Actor;
use werewolf_game_lib::MatchStatus;
use werewolf_game_lib::ParticipantId;
use werewolf_game_lib::Phase;
use werewolf_game_lib::Role;
use werewolf_game_lib::Visibility;

use crate::action::Action;
use crate::lobby::Lobby;
use crate::tests::support;
use crate::view::Projector;
use crate::visibility::ViewerContext;
use crate::visibility::action_visible;

fn action(visibility: Visibility, round: u32, phase: Phase) -> Action {
    Action {
        round,
        phase,
        actor: Actor::Player(ParticipantId(0)),
        kind: ActionKind::SeerInvestigate,
        target: Some(ParticipantId(1)),
        visibility,
        description: "something happened".to_string(),
        cause: None,
    }
}

fn viewer(id: usize, role: Option<Role>, alive: bool) -> ViewerContext {
    ViewerContext {
        participant: ParticipantId(id),
        role,
        alive,
    }
}

#[test]
fn test_public_is_always_visible() {
    let a = action(Visibility::Public, 1, Phase::Night);
    assert!(action_visible(
        &a,
        &viewer(5, None, false),
        MatchStatus::Night,
        1
    ));
}

#[test]
fn test_team_visibility_follows_the_viewer_team() {
    let a = action(Visibility::TeamWerewolf, 1, Phase::Night);

    assert!(action_visible(
        &a,
        &viewer(5, Some(Role::Werewolf), true),
        MatchStatus::Night,
        1
    ));
    assert!(action_visible(
        &a,
        &viewer(5, Some(Role::WolfCub), true),
        MatchStatus::Night,
        1
    ));
    assert!(!action_visible(
        &a,
        &viewer(5, Some(Role::Seer), true),
        MatchStatus::Night,
        1
    ));
    // Observers hold no role and see no team traffic.
    assert!(!action_visible(
        &a,
        &viewer(5, None, false),
        MatchStatus::Night,
        1
    ));
    // Dead teammates keep their team's history.
    assert!(action_visible(
        &a,
        &viewer(5, Some(Role::Werewolf), false),
        MatchStatus::Day,
        2
    ));
}

#[test]
fn test_actor_only_is_private() {
    let a = action(Visibility::ActorOnly, 1, Phase::Night);

    assert!(action_visible(
        &a,
        &viewer(0, Some(Role::Seer), true),
        MatchStatus::Night,
        1
    ));
    assert!(!action_visible(
        &a,
        &viewer(1, Some(Role::Seer), true),
        MatchStatus::Night,
        1
    ));
}

#[test]
fn test_resolved_public_promotes_when_the_phase_ends() {
    let a = action(Visibility::ResolvedPublic, 1, Phase::Night);
    let v = viewer(5, Some(Role::Villager), true);

    // Hidden during the phase that contains it.
    assert!(!action_visible(&a, &v, MatchStatus::Night, 1));
    // Visible from the following day on, and forever after.
    assert!(action_visible(&a, &v, MatchStatus::Day, 1));
    assert!(action_visible(&a, &v, MatchStatus::Night, 2));
    assert!(action_visible(&a, &v, MatchStatus::Finished, 2));

    let day_action = action(Visibility::ResolvedPublic, 1, Phase::Day);
    assert!(!action_visible(&day_action, &v, MatchStatus::Day, 1));
    assert!(action_visible(&day_action, &v, MatchStatus::Night, 2));
}

#[test_log::test]
fn test_night_view_tailors_targets_per_role() {
    let (mut game, mut log) = support::started_match(&[
        (Role::Guard, 1),
        (Role::Seer, 1),
        (Role::Werewolf, 1),
        (Role::Villager, 2),
    ]);
    let lobby = Lobby::new();

    let guard = support::holder(&game, Role::Guard);
    let seer = support::holder(&game, Role::Seer);
    let wolf = support::holder(&game, Role::Werewolf);
    let villager = game.alive_with_role(Role::Villager)[0];

    {
        let projector = Projector::new(&game, &log, &lobby);

        // The guard never sees themselves as a target.
        let guard_view = match projector.view_for(guard).view {
            werewolf_game_lib::PhaseView::Night(v) => v,
            other => panic!("expected night view, got {other:?}"),
        };
        assert!(!guard_view.targets.contains(&guard));
        assert_eq!(guard_view.targets.len(), 4);

        // The wolf sees the pack and the open vote, plain villagers see
        // nothing actionable.
        let wolf_view = match projector.view_for(wolf).view {
            werewolf_game_lib::PhaseView::Night(v) => v,
            other => panic!("expected night view, got {other:?}"),
        };
        assert_eq!(wolf_view.pack.len(), 1);
        assert!(!wolf_view.targets.contains(&wolf));

        let villager_view = match projector.view_for(villager).view {
            werewolf_game_lib::PhaseView::Night(v) => v,
            other => panic!("expected night view, got {other:?}"),
        };
        assert!(villager_view.targets.is_empty());
        assert!(villager_view.acted);
    }

    // Round 2: the guard's previous target is excluded.
    game.submit_guard_protect(guard, villager, &mut log).unwrap();
    game.submit_seer_investigate(seer, wolf, &mut log).unwrap();
    support::pack_pass(&mut game, &mut log, false);
    assert!(game.maybe_resolve_night(&mut log).unwrap());
    support::pass_day(&mut game, &mut log);
    assert_eq!(game.round(), 2);

    let projector = Projector::new(&game, &log, &lobby);
    let guard_view = match projector.view_for(guard).view {
        werewolf_game_lib::PhaseView::Night(v) => v,
        other => panic!("expected night view, got {other:?}"),
    };
    assert!(!guard_view.targets.contains(&villager));
    assert!(!guard_view.targets.contains(&guard));
}

#[test_log::test]
fn test_witch_view_gates_on_potions_and_lock() {
    let (mut game, mut log) =
        support::started_match(&[(Role::Witch, 1), (Role::Werewolf, 1), (Role::Villager, 2)]);
    let lobby = Lobby::new();

    let witch = support::holder(&game, Role::Witch);
    let victim = game.alive_with_role(Role::Villager)[0];

    // Before the pack locks, the witch sees nothing.
    {
        let projector = Projector::new(&game, &log, &lobby);
        let view = match projector.view_for(witch).view {
            werewolf_game_lib::PhaseView::Night(v) => v,
            other => panic!("expected night view, got {other:?}"),
        };
        assert!(view.pending_victims.is_empty());
        assert!(!view.heal_available);
        assert!(!view.poison_available);
    }

    support::pack_kill(&mut game, &mut log, victim, false);

    let projector = Projector::new(&game, &log, &lobby);
    let view = match projector.view_for(witch).view {
        werewolf_game_lib::PhaseView::Night(v) => v,
        other => panic!("expected night view, got {other:?}"),
    };
    assert_eq!(view.pending_victims, vec![victim]);
    assert!(view.heal_available);
    assert!(view.poison_available);
    assert!(!view.targets.contains(&witch));
}

#[test_log::test]
fn test_history_is_filtered_per_viewer() {
    let (mut game, mut log) =
        support::started_match(&[(Role::Seer, 1), (Role::Werewolf, 1), (Role::Villager, 2)]);
    let lobby = Lobby::new();

    let seer = support::holder(&game, Role::Seer);
    let wolf = support::holder(&game, Role::Werewolf);
    let villagers = game.alive_with_role(Role::Villager);

    game.submit_seer_investigate(seer, wolf, &mut log).unwrap();
    support::pack_kill(&mut game, &mut log, villagers[0], false);
    assert!(game.maybe_resolve_night(&mut log).unwrap());

    let projector = Projector::new(&game, &log, &lobby);

    // The seer keeps their own result; the wolf keeps the pack vote;
    // neither sees the other's.
    let seer_history = projector.history_for(seer);
    assert!(seer_history.iter().any(|line| line.contains("investigates")));
    assert!(!seer_history.iter().any(|line| line.contains("pack")));

    let wolf_history = projector.history_for(wolf);
    assert!(wolf_history.iter().any(|line| line.contains("pack")));
    assert!(!wolf_history.iter().any(|line| line.contains("investigates")));

    // The resolved morning is public to everyone, the surviving villager
    // included.
    let villager_history = projector.history_for(villagers[1]);
    assert!(
        villager_history
            .iter()
            .any(|line| line.contains("village wakes"))
    );
}

#[test_log::test]
fn test_day_view_reveals_morning_deaths() {
    let (mut game, mut log) = support::started_match(&[(Role::Werewolf, 1), (Role::Villager, 3)]);
    let lobby = Lobby::new();

    let victim = game.alive_with_role(Role::Villager)[0];
    support::pack_kill(&mut game, &mut log, victim, false);
    assert!(game.maybe_resolve_night(&mut log).unwrap());

    let projector = Projector::new(&game, &log, &lobby);
    let view = match projector.view_for(victim).view {
        werewolf_game_lib::PhaseView::Day(v) => v,
        other => panic!("expected day view, got {other:?}"),
    };

    assert_eq!(view.morning_deaths.len(), 1);
    assert_eq!(view.morning_deaths[0].player, victim);
    assert_eq!(view.morning_deaths[0].role, Role::Villager);
    // The dead cast no votes.
    assert!(!view.alive);
    assert!(view.targets.is_empty());
}

#[test_log::test]
fn test_finished_view_reveals_everything() {
    let (mut game, mut log) = support::started_match(&[(Role::Werewolf, 1), (Role::Villager, 3)]);
    let lobby = Lobby::new();

    let wolf = support::holder(&game, Role::Werewolf);

    support::pack_pass(&mut game, &mut log, false);
    assert!(game.maybe_resolve_night(&mut log).unwrap());
    for voter in game.alive_ids() {
        if voter == wolf {
            game.submit_day_pass(voter, &mut log).unwrap();
        } else {
            game.submit_day_vote(voter, wolf, &mut log).unwrap();
        }
    }
    game.submit_day_end_vote(wolf, &mut log, &mut support::step_rng())
        .unwrap();
    assert_eq!(game.status(), MatchStatus::Finished);

    let projector = Projector::new(&game, &log, &lobby);
    let view = match projector.view_for(wolf).view {
        werewolf_game_lib::PhaseView::Finished(v) => v,
        other => panic!("expected finished view, got {other:?}"),
    };

    assert_eq!(view.roles.len(), 4);
    assert!(
        view.roles
            .iter()
            .any(|r| r.player.id == wolf && r.role == Role::Werewolf && !r.alive)
    );
}
