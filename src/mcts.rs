//! Monte Carlo Tree Search over [`GameState`]s.
//!
//! Each iteration:
//! 1. descends from the root through fully expanded nodes by UCT
//! 2. expands one untried move into a new child holding its own state clone
//! 3. plays the child out with one or more rollouts
//! 4. walks the parent links back to the root adding the result
//!
//! Nodes live in an arena and refer to each other by [`NodeId`]. A node's
//! value is kept from the point of view of the seat that moved into it, so a
//! parent picks among its children by their own win rates. With more than one
//! rollout per leaf the rollouts run on the rayon pool, each on its own clone
//! with its own seeded generator, and are summed before backpropagation.

use std::time::{Duration, Instant};

use log::{debug, error};
use rayon::prelude::*;

use crate::constants::{DEFAULT_ITERATIONS, MAX_PLAYERS, UCT_C};
use crate::moves::Move;
use crate::playout::{RewardMode, RolloutOutcome, RolloutSettings, rollout};
use crate::reply_table::ReplyTable;
use crate::state::GameState;

#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Iterations per search. The first one always runs.
    pub iterations: usize,
    /// Wall-clock limit, checked after each iteration.
    pub time_budget: Option<Duration>,
    /// UCT exploration constant.
    pub exploration: f64,
    pub rollout: RolloutSettings,
    pub reward: RewardMode,
    /// Independent rollouts per expanded leaf. Above 1 they run in parallel.
    pub rollouts_per_leaf: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            time_budget: None,
            exploration: UCT_C,
            rollout: RolloutSettings::default(),
            reward: RewardMode::default(),
            rollouts_per_leaf: 1,
        }
    }
}

impl SearchConfig {
    /// Small, quick search for tests.
    pub fn for_testing() -> Self {
        Self {
            iterations: 64,
            ..Self::default()
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone)]
pub struct SearchNode {
    pub state: GameState,
    pub parent: Option<NodeId>,
    /// Move that led here from the parent.
    pub reached_by: Option<Move>,
    /// Seat whose result `wins` counts. The root uses the seat to move.
    pub player: usize,
    /// Moves not yet expanded, popped from the back.
    pub untried: Vec<Move>,
    pub children: Vec<(Move, NodeId)>,
    pub visits: u32,
    pub wins: f64,
    pub depth: usize,
    /// Zobrist hash of `state`.
    pub hash: u64,
}

impl SearchNode {
    fn new(
        mut state: GameState,
        parent: Option<NodeId>,
        reached_by: Option<Move>,
        player: usize,
        depth: usize,
        rng: &mut fastrand::Rng,
    ) -> Self {
        let mut untried = state.legal_moves();
        rng.shuffle(&mut untried);
        let hash = state.hash();
        Self {
            state,
            parent,
            reached_by,
            player,
            untried,
            children: Vec::new(),
            visits: 0,
            wins: 0.0,
            depth,
            hash,
        }
    }

    #[inline]
    pub fn is_fully_expanded(&self) -> bool {
        self.untried.is_empty()
    }

    pub fn winrate(&self) -> f64 {
        if self.visits > 0 {
            self.wins / f64::from(self.visits)
        } else {
            0.0
        }
    }

    /// UCT score given `ln` of the parent's visit count.
    fn uct(&self, ln_parent: f64, exploration: f64) -> f64 {
        if self.visits == 0 {
            return f64::INFINITY;
        }
        let n = f64::from(self.visits);
        self.wins / n + exploration * (ln_parent / n).sqrt()
    }
}

/// Search tree with arena-allocated nodes. The root is always `NodeId(0)`.
#[derive(Debug)]
pub struct SearchTree {
    nodes: Vec<SearchNode>,
}

impl SearchTree {
    pub fn new(state: &GameState, rng: &mut fastrand::Rng) -> Self {
        let root = SearchNode::new(state.clone(), None, None, state.player_up(), 0, rng);
        Self { nodes: vec![root] }
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> &SearchNode {
        &self.nodes[id.0 as usize]
    }

    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> &mut SearchNode {
        &mut self.nodes[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Attach a child holding `state`, reached from `parent` by `mv`.
    pub fn add_child(&mut self, parent: NodeId, mv: Move, state: GameState, rng: &mut fastrand::Rng) -> NodeId {
        let (player, depth) = {
            let p = self.get(parent);
            (p.state.player_up(), p.depth + 1)
        };
        let child = SearchNode::new(state, Some(parent), Some(mv), player, depth, rng);
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(child);
        self.get_mut(parent).children.push((mv, id));
        id
    }

    /// Child with the highest UCT score. Unvisited children score infinity,
    /// and children are shuffled first so ties fall at random.
    pub fn select_child(&self, id: NodeId, exploration: f64, rng: &mut fastrand::Rng) -> Option<NodeId> {
        let node = self.get(id);
        let ln_parent = f64::from(node.visits.max(1)).ln();
        let mut ids: Vec<NodeId> = node.children.iter().map(|&(_, child)| child).collect();
        rng.shuffle(&mut ids);
        ids.into_iter().max_by(|&a, &b| {
            let score_a = self.get(a).uct(ln_parent, exploration);
            let score_b = self.get(b).uct(ln_parent, exploration);
            score_a.total_cmp(&score_b)
        })
    }

    /// Add `rollouts` visits and each node's share of `rewards` from `leaf`
    /// up to the root.
    pub fn backpropagate(&mut self, leaf: NodeId, rollouts: u32, rewards: &[f64; MAX_PLAYERS]) {
        let mut current = Some(leaf);
        while let Some(id) = current {
            let node = self.get_mut(id);
            node.visits += rollouts;
            node.wins += rewards[node.player];
            current = node.parent;
        }
    }

    /// Most visited root child.
    pub fn best_move(&self) -> Option<Move> {
        self.get(self.root())
            .children
            .iter()
            .max_by_key(|&&(_, id)| self.get(id).visits)
            .map(|&(mv, _)| mv)
    }

    /// Win rate of the most visited root child.
    pub fn best_winrate(&self) -> f64 {
        self.get(self.root())
            .children
            .iter()
            .map(|&(_, id)| self.get(id))
            .max_by_key(|child| child.visits)
            .map(SearchNode::winrate)
            .unwrap_or(0.0)
    }

    /// Log the root's children at debug level, most visited first.
    pub fn dump_children(&self) {
        let mut children: Vec<(Move, &SearchNode)> = self
            .get(self.root())
            .children
            .iter()
            .map(|&(mv, id)| (mv, self.get(id)))
            .collect();
        children.sort_by(|a, b| b.1.visits.cmp(&a.1.visits));
        for (mv, child) in children {
            debug!("move {mv} v={} w={:.1} wr={:.3}", child.visits, child.wins, child.winrate());
        }
    }
}

/// Move chooser backed by MCTS. Owns its random generator and the reply
/// table, which carries over from one search to the next.
pub struct MctsAgent {
    pub config: SearchConfig,
    rng: fastrand::Rng,
    replies: ReplyTable,
}

impl MctsAgent {
    pub fn new(config: SearchConfig) -> Self {
        Self::with_rng(config, fastrand::Rng::new())
    }

    pub fn with_seed(config: SearchConfig, seed: u64) -> Self {
        Self::with_rng(config, fastrand::Rng::with_seed(seed))
    }

    fn with_rng(config: SearchConfig, rng: fastrand::Rng) -> Self {
        Self {
            config,
            rng,
            replies: ReplyTable::default(),
        }
    }

    pub fn replies(&self) -> &ReplyTable {
        &self.replies
    }

    /// Best move for the seat to move, or `None` when it has to skip.
    pub fn choose_move(&mut self, state: &GameState) -> Option<Move> {
        let moves = state.legal_moves();
        match moves.as_slice() {
            [] => None,
            [only] => Some(*only),
            _ => {
                let tree = self.search(state);
                tree.dump_children();
                tree.best_move()
            }
        }
    }

    /// Run a full search from `state` and hand back the tree. At least one
    /// iteration always runs, so a root with legal moves gets a child.
    pub fn search(&mut self, state: &GameState) -> SearchTree {
        let start = Instant::now();
        let mut tree = SearchTree::new(state, &mut self.rng);
        let mut iterations = 0;
        loop {
            self.run_iteration(&mut tree);
            iterations += 1;
            if iterations >= self.config.iterations
                || self.config.time_budget.is_some_and(|budget| start.elapsed() >= budget)
            {
                break;
            }
        }
        debug!(
            "search: {iterations} iterations, {} nodes, best {} ({:.1}%) in {:.2?}",
            tree.len(),
            tree.best_move().map(|m| m.to_string()).unwrap_or_else(|| "-".into()),
            tree.best_winrate() * 100.0,
            start.elapsed()
        );
        tree
    }

    /// One select, expand, evaluate, backpropagate pass over `tree`.
    pub fn run_iteration(&mut self, tree: &mut SearchTree) {
        let mut id = tree.root();
        loop {
            let node = tree.get(id);
            if node.state.over() || !node.is_fully_expanded() {
                break;
            }
            match tree.select_child(id, self.config.exploration, &mut self.rng) {
                Some(child) => id = child,
                None => break,
            }
        }

        if let Some(mv) = tree.get_mut(id).untried.pop() {
            let mut next = tree.get(id).state.clone();
            if let Err(e) = next.play_move(mv) {
                error!("expansion hit an unplayable move {mv}: {e}");
                return;
            }
            id = tree.add_child(id, mv, next, &mut self.rng);
        }

        let (rollouts, rewards) = self.evaluate(tree.get(id));
        tree.backpropagate(id, rollouts, &rewards);
        if self.config.rollout.reply_probability > 0.0 {
            self.record_replies(tree, id, rollouts, &rewards);
        }
    }

    /// Summed rewards for a leaf and the number of results they cover.
    fn evaluate(&mut self, node: &SearchNode) -> (u32, [f64; MAX_PLAYERS]) {
        if let Some(winner) = node.state.winner() {
            let outcome = RolloutOutcome { winner, moves: 0 };
            return (1, outcome.rewards(self.config.reward, node.depth));
        }

        let settings = &self.config.rollout;
        let replies = (settings.reply_probability > 0.0).then_some(&self.replies);
        let n = self.config.rollouts_per_leaf.max(1);
        let outcomes: Vec<RolloutOutcome> = if n == 1 {
            vec![rollout(&node.state, settings, replies, &mut self.rng)]
        } else {
            let seeds: Vec<u64> = (0..n).map(|_| self.rng.u64(..)).collect();
            seeds
                .into_par_iter()
                .map(|seed| rollout(&node.state, settings, replies, &mut fastrand::Rng::with_seed(seed)))
                .collect()
        };

        let mut total = [0.0; MAX_PLAYERS];
        for outcome in &outcomes {
            for (sum, r) in total.iter_mut().zip(outcome.rewards(self.config.reward, node.depth)) {
                *sum += r;
            }
        }
        (outcomes.len() as u32, total)
    }

    /// Credit every edge on the way back to the root with the mean reward of
    /// the seat that played it.
    fn record_replies(&mut self, tree: &SearchTree, leaf: NodeId, rollouts: u32, rewards: &[f64; MAX_PLAYERS]) {
        let mut current = leaf;
        while let (Some(parent), Some(mv)) = (tree.get(current).parent, tree.get(current).reached_by) {
            let node = tree.get(current);
            let reward = rewards[node.player] / f64::from(rollouts);
            self.replies.update(tree.get(parent).hash, mv, reward);
            current = parent;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moves::Placement;

    fn small_config() -> SearchConfig {
        SearchConfig {
            iterations: 200,
            ..SearchConfig::default()
        }
    }

    #[test]
    fn test_root_visits_match_iterations() {
        let mut agent = MctsAgent::with_seed(small_config(), 1);
        let tree = agent.search(&GameState::default());
        let root = tree.get(tree.root());
        assert_eq!(root.visits, 200);
        let child_visits: u32 = root.children.iter().map(|&(_, id)| tree.get(id).visits).sum();
        assert_eq!(child_visits, 200);
        assert_eq!(tree.len(), 201);
    }

    #[test]
    fn test_unvisited_children_come_first() {
        let state = GameState::default();
        let mut rng = fastrand::Rng::with_seed(9);
        let mut tree = SearchTree::new(&state, &mut rng);
        let root = tree.root();
        let mut ids = Vec::new();
        for mv in [Move::Step((4, 1)), Move::Step((3, 0)), Move::Step((5, 0))] {
            let mut next = state.clone();
            next.play_move(mv).unwrap();
            ids.push(tree.add_child(root, mv, next, &mut rng));
        }
        tree.backpropagate(ids[0], 1, &[1.0, 0.0, 0.0, 0.0]);
        tree.backpropagate(ids[1], 1, &[1.0, 0.0, 0.0, 0.0]);
        for _ in 0..10 {
            assert_eq!(tree.select_child(root, UCT_C, &mut rng), Some(ids[2]));
        }
    }

    #[test]
    fn test_backpropagate_credits_each_perspective() {
        let state = GameState::default();
        let mut rng = fastrand::Rng::with_seed(4);
        let mut tree = SearchTree::new(&state, &mut rng);
        let mut s1 = state.clone();
        s1.play_move(Move::Step((4, 1))).unwrap();
        let a = tree.add_child(tree.root(), Move::Step((4, 1)), s1.clone(), &mut rng);
        s1.play_move(Move::Step((4, 7))).unwrap();
        let b = tree.add_child(a, Move::Step((4, 7)), s1, &mut rng);

        tree.backpropagate(b, 2, &[0.5, 1.5, 0.0, 0.0]);
        assert_eq!(tree.get(b).player, 1);
        assert_eq!(tree.get(b).wins, 1.5);
        assert_eq!(tree.get(a).player, 0);
        assert_eq!(tree.get(a).wins, 0.5);
        assert_eq!(tree.get(tree.root()).visits, 2);
        assert_eq!(tree.get(b).depth, 2);
    }

    #[test]
    fn test_takes_the_winning_step() {
        // Both seats one step from home, seat 0 to move: anything but the
        // winning step loses on the next ply.
        let mut state = GameState::new(2, 0).unwrap();
        for y in 0..8 {
            state.play_move(Move::Step((3, y))).unwrap();
            state.play_move(Move::Step((5, 8 - y))).unwrap();
        }
        assert_eq!(state.player(0).position, (3, 7));
        assert_eq!(state.player(1).position, (5, 1));
        let mut agent = MctsAgent::with_seed(small_config(), 2);
        assert_eq!(agent.choose_move(&state), Some(Move::Step((3, 8))));
    }

    #[test]
    fn test_parallel_rollouts_count_every_result() {
        let config = SearchConfig {
            iterations: 20,
            rollouts_per_leaf: 4,
            ..SearchConfig::default()
        };
        let mut agent = MctsAgent::with_seed(config, 5);
        let tree = agent.search(&GameState::default());
        assert_eq!(tree.get(tree.root()).visits, 80);
    }

    #[test]
    fn test_reply_table_fills_during_search() {
        let mut config = small_config();
        config.iterations = 50;
        config.rollout.reply_probability = 0.5;
        let mut agent = MctsAgent::with_seed(config, 8);
        let mv = agent.choose_move(&GameState::default());
        assert!(mv.is_some());
        assert!(!agent.replies().is_empty());
    }

    #[test]
    fn test_spent_budget_still_answers() {
        let config = SearchConfig {
            time_budget: Some(Duration::ZERO),
            ..SearchConfig::for_testing()
        };
        let mut agent = MctsAgent::with_seed(config, 4);
        let state = GameState::default();
        let mv = agent.choose_move(&state).expect("legal moves exist");
        assert!(state.is_legal(mv));
    }

    #[test]
    fn test_finished_game_has_no_move() {
        let mut agent = MctsAgent::with_seed(SearchConfig::for_testing(), 3);
        let mut state = GameState::new(2, 0).unwrap();
        assert!(state.try_early_eval(0));
        assert_eq!(agent.choose_move(&state), None);

        let mut open = GameState::default();
        open.play_move(Move::Wall(Placement::vertical(0, 0))).unwrap();
        assert!(agent.choose_move(&open).is_some());
    }
}
