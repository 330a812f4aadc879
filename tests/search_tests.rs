//! Search tests driven through the public API.

use std::time::Duration;

use quoridor_mcts::mcts::{MctsAgent, SearchConfig, SearchTree};
use quoridor_mcts::moves::parse_move;
use quoridor_mcts::session::{Seat, Session};
use quoridor_mcts::state::GameState;

#[test]
fn test_each_iteration_adds_one_root_visit() {
    let state = GameState::default();
    let mut agent = MctsAgent::with_seed(SearchConfig::for_testing(), 11);
    let mut rng = fastrand::Rng::with_seed(11);
    let mut tree = SearchTree::new(&state, &mut rng);

    let mut child_visits: Vec<u32> = Vec::new();
    for i in 1..=50u32 {
        agent.run_iteration(&mut tree);
        let root = tree.get(tree.root());
        assert_eq!(root.visits, i);

        // Child visit counts never go down.
        let now: Vec<u32> = root.children.iter().map(|&(_, id)| tree.get(id).visits).collect();
        for (before, after) in child_visits.iter().zip(&now) {
            assert!(after >= before);
        }
        assert_eq!(now.iter().sum::<u32>(), i);
        child_visits = now;
    }
}

#[test]
fn test_zero_time_budget_runs_one_iteration() {
    let config = SearchConfig {
        time_budget: Some(Duration::ZERO),
        ..SearchConfig::for_testing()
    };
    let mut agent = MctsAgent::with_seed(config, 3);
    let state = GameState::default();
    let tree = agent.search(&state);
    assert_eq!(tree.get(tree.root()).visits, 1);
    assert_eq!(tree.len(), 2);
    let mv = tree.best_move().unwrap();
    assert!(state.is_legal(mv));
    assert!(agent.choose_move(&state).is_some());
}

#[test]
fn test_bots_on_zero_budget_never_skip() {
    let config = SearchConfig {
        time_budget: Some(Duration::ZERO),
        ..SearchConfig::for_testing()
    };
    let seats = vec![
        Seat::Bot(MctsAgent::with_seed(config.clone(), 1)),
        Seat::Bot(MctsAgent::with_seed(config, 2)),
    ];
    let mut session = Session::new(GameState::default(), seats).with_max_turns(6).with_board(false);
    let mut out = Vec::new();
    session.run(std::io::empty(), &mut out).unwrap();

    let text = String::from_utf8(out).unwrap();
    assert!(!text.contains("skips"), "{text}");
    assert_eq!(text.matches(" plays ").count(), 6);
}

#[test]
fn test_search_leaves_state_untouched() {
    let mut state = GameState::default();
    state.play_move(parse_move("4,1").unwrap()).unwrap();
    let before = state.clone();

    let mut agent = MctsAgent::with_seed(SearchConfig::for_testing(), 5);
    let mv = agent.choose_move(&state).unwrap();

    assert_eq!(state.board(), before.board());
    assert_eq!(state.open_placements(), before.open_placements());
    assert_eq!(state.player_up(), before.player_up());
    assert!(state.is_legal(mv));
}

#[test]
fn test_bots_play_legal_games() {
    for players in [2, 4] {
        let state = GameState::new(players, 20).unwrap();
        let seats = (0..players)
            .map(|seat| Seat::Bot(MctsAgent::with_seed(SearchConfig::for_testing(), seat as u64)))
            .collect();
        let mut session = Session::new(state, seats).with_max_turns(24).with_board(false);
        let mut out = Vec::new();
        session.run(std::io::empty(), &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("player 0 plays"));
        let state = session.state();
        for p in state.players() {
            assert!(state.board().are_connected_greedy(p.position, p.goals));
        }
    }
}
