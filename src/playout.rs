//! Rollouts: playing a position out to the end with a cheap move policy.
//!
//! A rollout works on its own clone of the game state and its own random
//! generator, so any number of them can run side by side.

use log::error;

use crate::constants::{DEFAULT_PAWN_BIAS, EARLY_EVAL_MARGIN, MAX_PLAYERS, MAX_ROLLOUT_MOVES};
use crate::moves::Move;
use crate::reply_table::ReplyTable;
use crate::state::GameState;

/// How rollout moves are picked.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum RolloutPolicy {
    /// Uniform over every legal move.
    Uniform,
    /// While the mover has walls: a random pawn move with probability
    /// `pawn_bias`, otherwise a random open placement. Without walls the mover
    /// runs along its shortest path.
    Weighted { pawn_bias: f64 },
}

impl Default for RolloutPolicy {
    fn default() -> Self {
        RolloutPolicy::Weighted {
            pawn_bias: DEFAULT_PAWN_BIAS,
        }
    }
}

/// What a won rollout is worth.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum RewardMode {
    /// 1 for the winner, 0 for everyone else.
    #[default]
    Binary,
    /// `2 / (1 + tree depth + rollout length)`, so quicker wins count more.
    DepthDecay,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RolloutSettings {
    pub policy: RolloutPolicy,
    /// Leader margin for declaring a winner once walls run out.
    pub early_eval_margin: usize,
    /// Plies before the rollout is adjudicated by path length.
    pub max_moves: usize,
    /// Chance of playing the best known reply from the reply table.
    pub reply_probability: f64,
}

impl Default for RolloutSettings {
    fn default() -> Self {
        Self {
            policy: RolloutPolicy::default(),
            early_eval_margin: EARLY_EVAL_MARGIN,
            max_moves: MAX_ROLLOUT_MOVES,
            reply_probability: 0.0,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RolloutOutcome {
    pub winner: usize,
    /// Plies played, skipped turns included.
    pub moves: usize,
}

impl RolloutOutcome {
    /// Reward for every seat. `tree_depth` is the depth of the node the
    /// rollout started from.
    pub fn rewards(&self, mode: RewardMode, tree_depth: usize) -> [f64; MAX_PLAYERS] {
        let win = match mode {
            RewardMode::Binary => 1.0,
            RewardMode::DepthDecay => 2.0 / (1 + tree_depth + self.moves) as f64,
        };
        let mut rewards = [0.0; MAX_PLAYERS];
        rewards[self.winner] = win;
        rewards
    }
}

fn random_pawn_move(state: &GameState, rng: &mut fastrand::Rng) -> Option<Move> {
    let moves = state.legal_pawn_moves();
    (!moves.is_empty()).then(|| moves[rng.usize(..moves.len())])
}

fn random_wall(state: &GameState, rng: &mut fastrand::Rng) -> Option<Move> {
    let open = state.open_placements();
    if open.is_empty() {
        return None;
    }
    open.nth(rng.usize(..open.len())).map(Move::Wall)
}

/// Pick a move for the seat to move. `None` means the seat has to skip.
pub fn choose_move(state: &GameState, policy: RolloutPolicy, rng: &mut fastrand::Rng) -> Option<Move> {
    match policy {
        RolloutPolicy::Uniform => {
            let moves = state.legal_moves();
            (!moves.is_empty()).then(|| moves[rng.usize(..moves.len())])
        }
        RolloutPolicy::Weighted { pawn_bias } => {
            if state.player(state.player_up()).walls_remaining == 0 {
                return state
                    .fastest_pawn_move()
                    .or_else(|| random_pawn_move(state, rng));
            }
            if rng.f64() < pawn_bias {
                random_pawn_move(state, rng).or_else(|| random_wall(state, rng))
            } else {
                random_wall(state, rng).or_else(|| random_pawn_move(state, rng))
            }
        }
    }
}

fn remembered_reply(
    state: &mut GameState,
    settings: &RolloutSettings,
    replies: Option<&ReplyTable>,
    rng: &mut fastrand::Rng,
) -> Option<Move> {
    let table = replies?;
    if settings.reply_probability <= 0.0 || rng.f64() >= settings.reply_probability {
        return None;
    }
    let hash = state.hash();
    table.best_reply(hash).filter(|&mv| state.is_legal(mv))
}

/// Play `state` out on a clone and report who won.
pub fn rollout(
    state: &GameState,
    settings: &RolloutSettings,
    replies: Option<&ReplyTable>,
    rng: &mut fastrand::Rng,
) -> RolloutOutcome {
    let mut sim = state.clone();
    let mut moves = 0;
    sim.try_early_eval(settings.early_eval_margin);

    while !sim.over() {
        if moves >= settings.max_moves {
            return RolloutOutcome {
                winner: sim.leader(),
                moves,
            };
        }
        let mv = remembered_reply(&mut sim, settings, replies, rng)
            .or_else(|| choose_move(&sim, settings.policy, rng));
        match mv {
            Some(mv) => {
                if let Err(e) = sim.play_move(mv) {
                    error!("rollout produced an unplayable move: {e}\n{sim}");
                    break;
                }
            }
            None => sim.skip_turn(),
        }
        moves += 1;
        sim.try_early_eval(settings.early_eval_margin);
    }

    RolloutOutcome {
        winner: sim.winner().unwrap_or_else(|| sim.leader()),
        moves,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rollout_finishes() {
        let state = GameState::default();
        let mut rng = fastrand::Rng::with_seed(7);
        for policy in [RolloutPolicy::Uniform, RolloutPolicy::default()] {
            let settings = RolloutSettings {
                policy,
                ..RolloutSettings::default()
            };
            let outcome = rollout(&state, &settings, None, &mut rng);
            assert!(outcome.winner < 2);
            assert!(outcome.moves <= settings.max_moves);
        }
        // The source state is untouched.
        assert_eq!(state.player(0).position, (4, 0));
        assert_eq!(state.walls_remaining(), 20);
    }

    #[test]
    fn test_rollout_is_reproducible() {
        let state = GameState::new(4, 20).unwrap();
        let settings = RolloutSettings::default();
        let a = rollout(&state, &settings, None, &mut fastrand::Rng::with_seed(3));
        let b = rollout(&state, &settings, None, &mut fastrand::Rng::with_seed(3));
        assert_eq!(a, b);
    }

    #[test]
    fn test_move_cap_adjudicates_by_path() {
        let state = GameState::default();
        let settings = RolloutSettings {
            max_moves: 0,
            ..RolloutSettings::default()
        };
        let outcome = rollout(&state, &settings, None, &mut fastrand::Rng::with_seed(1));
        assert_eq!(outcome, RolloutOutcome { winner: 0, moves: 0 });
    }

    #[test]
    fn test_weighted_without_walls_runs_home() {
        let state = GameState::new(2, 0).unwrap();
        let mut rng = fastrand::Rng::with_seed(11);
        let mv = choose_move(&state, RolloutPolicy::default(), &mut rng);
        assert_eq!(mv, Some(Move::Step((4, 1))));
    }

    #[test]
    fn test_weighted_all_walls() {
        let state = GameState::default();
        let mut rng = fastrand::Rng::with_seed(5);
        let policy = RolloutPolicy::Weighted { pawn_bias: 0.0 };
        for _ in 0..20 {
            assert!(choose_move(&state, policy, &mut rng).is_some_and(|m| m.is_wall()));
        }
    }

    #[test]
    fn test_reply_table_is_followed() {
        let mut state = GameState::default();
        let mut table = ReplyTable::new(16, 4);
        table.update(state.hash(), Move::Step((3, 0)), 1.0);
        let settings = RolloutSettings {
            reply_probability: 1.0,
            ..RolloutSettings::default()
        };
        let mut rng = fastrand::Rng::with_seed(2);
        let mv = remembered_reply(&mut state, &settings, Some(&table), &mut rng);
        assert_eq!(mv, Some(Move::Step((3, 0))));
    }

    #[test]
    fn test_rewards() {
        let outcome = RolloutOutcome { winner: 1, moves: 5 };
        assert_eq!(outcome.rewards(RewardMode::Binary, 2), [0.0, 1.0, 0.0, 0.0]);
        let decayed = outcome.rewards(RewardMode::DepthDecay, 2);
        assert!((decayed[1] - 0.25).abs() < 1e-12);
        assert_eq!(decayed[0], 0.0);
    }
}
