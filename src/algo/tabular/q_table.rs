use log::{debug, trace};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{
    check_interval,
    error::Error,
    exploration::{Choice, EpsilonGreedy},
    state::StateLabel,
    storage::Storage,
    table::{Action, ValueTable},
    Result,
};

/// Configuration for the [`QTableAgent`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QTableAgentConfig {
    /// Probability of taking a uniformly random action - must be in `[0,1]`
    ///
    /// **Default**: `0.9`
    pub epsilon: f32,
    /// The learning rate - must be in `(0,1]`
    ///
    /// **Default**: `0.2`
    pub alpha: f32,
    /// The discount factor - must be in `[0,1]`
    ///
    /// **Default**: `0.8`
    pub gamma: f32,
    /// Size of the action set, actions are the indices `0..num_actions`
    ///
    /// **Default**: `3` (forward, left, right)
    pub num_actions: usize,
}

impl Default for QTableAgentConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.9,
            alpha: 0.2,
            gamma: 0.8,
            num_actions: 3,
        }
    }
}

impl QTableAgentConfig {
    fn validate(&self) -> Result<()> {
        check_interval!(self.alpha, > 0.0, 1.0);
        check_interval!(self.gamma, 0.0, 1.0);
        if self.num_actions == 0 {
            return Err(Error::InvalidConfiguration(String::from(
                "the action set must not be empty",
            )));
        }
        Ok(())
    }
}

/// A Q-learning agent that keeps its value estimates in a [`ValueTable`]
///
/// The agent owns its table and its random number generator, so any number of agents can
/// train side by side. It is meant to be driven from a single loop that alternates
/// [`choose_action`](Self::choose_action) and [`learn`](Self::learn).
///
/// ### Generics
/// - `R` - The random number generator used for exploration and tie breaking
pub struct QTableAgent<R: Rng = StdRng> {
    table: ValueTable,
    exploration: EpsilonGreedy,
    alpha: f32,   // learning rate
    gamma: f32,   // discount factor
    num_actions: usize,
    rng: R,
}

impl QTableAgent<StdRng> {
    /// Initialize a new `QTableAgent` with an empty table and an entropy-seeded generator
    ///
    /// Fails with [`Error::InvalidConfiguration`] if `epsilon`, `alpha` or `gamma` is out
    /// of range or the action set is empty
    pub fn new(config: QTableAgentConfig) -> Result<Self> {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Like [`new`](Self::new), with a seeded generator for reproducible runs
    pub fn with_seed(config: QTableAgentConfig, seed: u64) -> Result<Self> {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> QTableAgent<R> {
    pub fn with_rng(config: QTableAgentConfig, rng: R) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            table: ValueTable::new(),
            exploration: EpsilonGreedy::new(config.epsilon)?,
            alpha: config.alpha,
            gamma: config.gamma,
            num_actions: config.num_actions,
            rng,
        })
    }

    /// Start from an existing table, e.g. one restored from a previous run
    ///
    /// Fails with [`Error::ActionOutOfRange`] if the table holds an action outside the action set
    pub fn with_table(mut self, table: ValueTable) -> Result<Self> {
        self.check_actions(&table)?;
        self.table = table;
        Ok(self)
    }

    fn check_actions(&self, table: &ValueTable) -> Result<()> {
        match table.max_action() {
            Some(action) if action >= self.num_actions => Err(Error::ActionOutOfRange {
                action,
                num_actions: self.num_actions,
            }),
            _ => Ok(()),
        }
    }

    pub fn table(&self) -> &ValueTable {
        &self.table
    }

    pub fn epsilon(&self) -> f32 {
        self.exploration.epsilon()
    }

    /// Replace the exploration rate, e.g. when decaying it between episodes
    pub fn set_epsilon(&mut self, epsilon: f32) -> Result<()> {
        self.exploration.set_epsilon(epsilon)
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn gamma(&self) -> f32 {
        self.gamma
    }

    pub fn num_actions(&self) -> usize {
        self.num_actions
    }

    /// Current value estimates of every action for `state`, in index order
    pub fn q_values(&self, state: &StateLabel) -> Vec<f32> {
        self.table.values(state, self.num_actions)
    }

    /// Choose an action based on the current state and exploration policy
    pub fn choose_action(&mut self, state: &StateLabel) -> Action {
        self.choose_action_with_values(state).0
    }

    /// Like [`choose_action`](Self::choose_action), also returning the value vector the
    /// choice was made from
    pub fn choose_action_with_values(&mut self, state: &StateLabel) -> (Action, Vec<f32>) {
        let q = self.q_values(state);
        let choice = self.exploration.choose(&mut self.rng);
        let action = match choice {
            Choice::Explore => self.rng.gen_range(0..self.num_actions),
            Choice::Exploit => Self::argmax(&q, &mut self.rng),
        };
        trace!("State: {state} Q: {q:?} {choice:?} Action: {action}");
        (action, q)
    }

    /// Exploit only: the action with the highest value for `state`, ties broken uniformly at random
    pub fn greedy_action(&mut self, state: &StateLabel) -> Action {
        let q = self.q_values(state);
        Self::argmax(&q, &mut self.rng)
    }

    fn argmax(q: &[f32], rng: &mut R) -> Action {
        let max_q = q.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let best = q
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v == max_q)
            .map(|(i, _)| i)
            .collect::<Vec<_>>();
        match best.as_slice() {
            [only] => *only,
            // all NaN leaves nothing to compare, fall back to the first action
            tied => tied.choose(rng).copied().unwrap_or(0),
        }
    }

    /// Learn from a single transition and update the table
    ///
    /// The first observation of a pair is recorded as the raw reward. After that the
    /// one-step temporal-difference estimate is only committed when the reward is
    /// strictly below it; otherwise the entry is left as it is.
    ///
    /// **Panics** if `action` is outside the action set
    pub fn learn(
        &mut self,
        state: &StateLabel,
        action: Action,
        reward: f32,
        next_state: &StateLabel,
    ) {
        assert!(
            action < self.num_actions,
            "Invalid action: {action} (action set has {} actions)",
            self.num_actions
        );

        let max_next_q = self.table.max_value(next_state, self.num_actions);

        if !self.table.contains(state, action) {
            trace!("First visit of ({state}, {action}), recording reward {reward}");
            self.table.set(state.clone(), action, reward);
            return;
        }

        let q_value = self.table.get(state, action);
        let target = reward + self.gamma * max_next_q;
        let updated = q_value + self.alpha * (target - q_value);

        if reward < updated {
            trace!("Updating ({state}, {action}): {q_value} -> {updated}");
            self.table.set(state.clone(), action, updated);
        } else {
            trace!("Keeping ({state}, {action}) at {q_value}, reward {reward} >= {updated}");
        }
    }

    /// Persist the table under `id`
    ///
    /// A failed write leaves whatever was previously stored under `id` in place
    pub fn save<S: Storage + ?Sized>(&self, storage: &mut S, id: &str) -> Result<()> {
        let bytes = self.table.snapshot()?;
        storage.write(id, &bytes)?;
        debug!("Saved {} table entries to `{id}`", self.table.len());
        Ok(())
    }

    /// Replace the table with the one stored under `id`
    ///
    /// Fails with [`Error::NotFound`] if nothing is stored under `id`. On any failure the
    /// current table is kept unchanged
    pub fn load<S: Storage + ?Sized>(&mut self, storage: &S, id: &str) -> Result<()> {
        let bytes = storage.read(id)?;
        let table = ValueTable::restore(&bytes)?;
        self.check_actions(&table)?;
        debug!("Loaded {} table entries from `{id}`", table.len());
        self.table = table;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use statrs::distribution::{ChiSquared, ContinuousCDF};

    use crate::storage::MemoryStorage;

    use super::*;

    const TRIALS: usize = 3000;

    fn label(s: &str) -> StateLabel {
        StateLabel::from(s)
    }

    fn config(epsilon: f32) -> QTableAgentConfig {
        QTableAgentConfig {
            epsilon,
            ..Default::default()
        }
    }

    fn agent(epsilon: f32) -> QTableAgent {
        QTableAgent::with_seed(config(epsilon), 42).unwrap()
    }

    /// Pearson chi-squared test that `counts` looks uniform at the 0.1% level
    fn looks_uniform(counts: &[usize]) -> bool {
        let total = counts.iter().sum::<usize>() as f64;
        let expected = total / counts.len() as f64;
        let statistic = counts
            .iter()
            .map(|&c| (c as f64 - expected).powi(2) / expected)
            .sum::<f64>();
        let critical = ChiSquared::new((counts.len() - 1) as f64)
            .unwrap()
            .inverse_cdf(0.999);
        statistic < critical
    }

    #[test]
    fn rejects_invalid_configuration() {
        let bad = [
            QTableAgentConfig {
                epsilon: 1.5,
                ..Default::default()
            },
            QTableAgentConfig {
                alpha: 0.0,
                ..Default::default()
            },
            QTableAgentConfig {
                alpha: 1.1,
                ..Default::default()
            },
            QTableAgentConfig {
                gamma: -0.1,
                ..Default::default()
            },
            QTableAgentConfig {
                num_actions: 0,
                ..Default::default()
            },
        ];
        for config in bad {
            assert!(
                matches!(
                    QTableAgent::new(config.clone()),
                    Err(Error::InvalidConfiguration(_))
                ),
                "{config:?} should be rejected"
            );
        }

        let edges = QTableAgentConfig {
            epsilon: 0.0,
            alpha: 1.0,
            gamma: 0.0,
            num_actions: 1,
        };
        assert!(QTableAgent::new(edges).is_ok());
    }

    #[test]
    fn exploitation_picks_unique_maximum() {
        let mut agent = agent(0.0);
        let s = label("0000100000");
        agent.table.set(s.clone(), 0, 1.0);
        agent.table.set(s.clone(), 1, 3.0);
        agent.table.set(s.clone(), 2, -2.0);

        for _ in 0..500 {
            assert_eq!(agent.choose_action(&s), 1);
        }
        assert_eq!(agent.greedy_action(&s), 1);
    }

    #[test]
    fn ties_are_broken_uniformly() {
        let mut agent = agent(0.0);
        let s = label("never seen");

        let mut counts = [0; 3];
        for _ in 0..TRIALS {
            counts[agent.choose_action(&s)] += 1;
        }
        assert!(counts.iter().all(|&c| c > 0), "every tied action chosen");
        assert!(looks_uniform(&counts), "tie break counts {counts:?}");
        assert!(agent.table().is_empty(), "choosing never writes");
    }

    #[test]
    fn ties_only_among_maximizers() {
        let mut agent = agent(0.0);
        let s = label("s");
        agent.table.set(s.clone(), 0, 5.0);
        agent.table.set(s.clone(), 2, 5.0);
        agent.table.set(s.clone(), 1, 4.0);

        let mut counts = [0; 3];
        for _ in 0..TRIALS {
            counts[agent.choose_action(&s)] += 1;
        }
        assert_eq!(counts[1], 0, "non-maximal action never exploited");
        assert!(looks_uniform(&[counts[0], counts[2]]), "counts {counts:?}");
    }

    #[test]
    fn exploration_ignores_values() {
        let mut agent = agent(1.0);
        let s = label("s");
        agent.table.set(s.clone(), 0, 100.0);

        let mut counts = [0; 3];
        for _ in 0..TRIALS {
            counts[agent.choose_action(&s)] += 1;
        }
        assert!(looks_uniform(&counts), "exploration counts {counts:?}");
    }

    #[test]
    fn exploration_uses_configured_action_count() {
        let mut agent = QTableAgent::with_seed(
            QTableAgentConfig {
                epsilon: 1.0,
                num_actions: 5,
                ..Default::default()
            },
            3,
        )
        .unwrap();

        let mut counts = [0; 5];
        for _ in 0..TRIALS {
            counts[agent.choose_action(&label("s"))] += 1;
        }
        assert!(counts.iter().all(|&c| c > 0), "counts {counts:?}");
    }

    #[test]
    fn choose_action_with_values_reports_q() {
        let mut agent = agent(0.0);
        let s = label("s");
        agent.table.set(s.clone(), 2, 1.5);

        let (action, q) = agent.choose_action_with_values(&s);
        assert_eq!(action, 2);
        assert_eq!(q, vec![0.0, 0.0, 1.5]);
    }

    #[test]
    fn first_visit_records_raw_reward() {
        let mut agent = agent(0.0);
        for (i, reward) in [4.0, -200.0, 0.0, 1e9, -1e-9].into_iter().enumerate() {
            let s = label(&format!("s{i}"));
            // a valuable next state must not leak into the first write
            agent.table.set(label("next"), 0, 50.0);
            agent.learn(&s, 1, reward, &label("next"));
            assert_eq!(agent.table().get(&s, 1), reward);
            assert!(agent.table().contains(&s, 1));
        }
    }

    #[test]
    fn learn_scenario() {
        let mut agent = agent(0.0);
        let (s0, s1) = (label("s0"), label("s1"));

        agent.learn(&s0, 0, 4.0, &s1);
        assert_eq!(agent.table().get(&s0, 0), 4.0, "first visit");

        // target = -4, updated = 4 + 0.2 * (-4 - 4) = 2.4, and -4 < 2.4
        agent.learn(&s0, 0, -4.0, &s1);
        let value = agent.table().get(&s0, 0);
        assert!((value - 2.4).abs() < 1e-6, "got {value}");

        // target = 10, updated = 2.4 + 0.2 * (10 - 2.4) = 3.92, and 10 >= 3.92
        agent.learn(&s0, 0, 10.0, &s1);
        assert_eq!(agent.table().get(&s0, 0), value, "update skipped");
        assert!(!agent.table().contains(&s1, 0), "next state never written");
    }

    #[test]
    fn learn_bootstraps_from_next_state() {
        let mut agent = agent(0.0);
        let (s0, s1) = (label("s0"), label("s1"));
        agent.table.set(s1.clone(), 0, 1.0);
        agent.table.set(s1.clone(), 2, 5.0);
        agent.table.set(s0.clone(), 1, 0.0);

        // target = -1 + 0.8 * 5 = 3, updated = 0 + 0.2 * 3 = 0.6
        agent.learn(&s0, 1, -1.0, &s1);
        assert!((agent.table().get(&s0, 1) - 0.6).abs() < 1e-6);
    }

    #[test]
    #[should_panic(expected = "Invalid action")]
    fn learn_rejects_unknown_action() {
        agent(0.0).learn(&label("s"), 3, 1.0, &label("t"));
    }

    #[test]
    fn epsilon_is_only_changed_externally() {
        let mut agent = agent(0.5);
        for _ in 0..100 {
            let a = agent.choose_action(&label("s"));
            agent.learn(&label("s"), a, 1.0, &label("s"));
        }
        assert_eq!(agent.epsilon(), 0.5);

        agent.set_epsilon(0.1).unwrap();
        assert_eq!(agent.epsilon(), 0.1);
        assert!(agent.set_epsilon(1.1).is_err());
        assert_eq!(agent.epsilon(), 0.1);
    }

    #[test]
    fn save_load_round_trip() {
        let mut storage = MemoryStorage::new();
        let mut trained = agent(0.0);
        trained.learn(&label("a"), 0, 4.0, &label("b"));
        trained.learn(&label("b"), 2, -4.0, &label("a"));
        trained.save(&mut storage, "QValues").unwrap();

        let mut fresh = agent(0.0);
        fresh.load(&storage, "QValues").unwrap();
        assert_eq!(fresh.table(), trained.table());
    }

    #[test]
    fn load_missing_is_not_found() {
        let storage = MemoryStorage::new();
        let mut agent = agent(0.0);
        agent.table.set(label("s"), 0, 1.0);

        assert!(matches!(
            agent.load(&storage, "missing"),
            Err(Error::NotFound(id)) if id == "missing"
        ));
        assert_eq!(agent.table().len(), 1, "table untouched");
    }

    #[test]
    fn load_rejects_foreign_actions() {
        let mut storage = MemoryStorage::new();
        let mut wide = QTableAgent::with_seed(
            QTableAgentConfig {
                num_actions: 5,
                ..Default::default()
            },
            0,
        )
        .unwrap();
        wide.learn(&label("s"), 4, 1.0, &label("s"));
        wide.save(&mut storage, "wide").unwrap();

        let mut narrow = agent(0.0);
        assert!(matches!(
            narrow.load(&storage, "wide"),
            Err(Error::ActionOutOfRange {
                action: 4,
                num_actions: 3
            })
        ));
        assert!(narrow.table().is_empty());
        assert!(agent(0.0).with_table(wide.table().clone()).is_err());
    }

    /// Storage whose writes start failing after a number of successes
    struct FlakyStorage {
        inner: MemoryStorage,
        writes_left: usize,
    }

    impl Storage for FlakyStorage {
        fn read(&self, id: &str) -> Result<Vec<u8>> {
            self.inner.read(id)
        }

        fn write(&mut self, id: &str, bytes: &[u8]) -> Result<()> {
            if self.writes_left == 0 {
                return Err(Error::io(id, std::io::Error::other("disk full")));
            }
            self.writes_left -= 1;
            self.inner.write(id, bytes)
        }
    }

    #[test]
    fn failed_save_keeps_last_snapshot() {
        let mut storage = FlakyStorage {
            inner: MemoryStorage::new(),
            writes_left: 1,
        };
        let mut agent = agent(0.0);
        agent.learn(&label("s"), 0, 1.0, &label("s"));
        agent.save(&mut storage, "q").unwrap();
        let saved = agent.table().clone();

        agent.learn(&label("t"), 1, 2.0, &label("s"));
        assert!(matches!(
            agent.save(&mut storage, "q"),
            Err(Error::Io { .. })
        ));

        let mut restored = QTableAgent::with_seed(config(0.0), 1).unwrap();
        restored.load(&storage, "q").unwrap();
        assert_eq!(restored.table(), &saved);
    }
}
