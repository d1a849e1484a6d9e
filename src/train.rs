use std::time::{Duration, Instant};

use log::{debug, info, log_enabled, warn, Level};
use rand::{rngs::StdRng, Rng};
use serde::{Deserialize, Serialize};

use crate::{
    algo::tabular::QTableAgent,
    decay::{Decay, Multiplicative},
    env::{Environment, Step},
    error::Error,
    state::ToStateLabel,
    storage::Storage,
    Result,
};

/// When the trainer persists the agent's table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Checkpoint {
    Never,
    /// Whenever the cumulative reward of the running episode beats the best seen so far
    OnHighScore,
    /// After every `n`th episode
    EveryEpisodes(u32),
}

/// Configuration for the [`Trainer`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Number of episodes [`Trainer::run`] plays
    ///
    /// **Default**: `10000`
    pub episodes: u32,
    /// Optional cap on the length of an episode
    ///
    /// **Default**: `None`
    pub max_steps: Option<u32>,
    /// **Default**: [`Checkpoint::OnHighScore`]
    pub checkpoint: Checkpoint,
    /// Storage identifier the table is saved under
    ///
    /// **Default**: `"q_values"`
    pub snapshot_id: String,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            episodes: 10000,
            max_steps: None,
            checkpoint: Checkpoint::OnHighScore,
            snapshot_id: String::from("q_values"),
        }
    }
}

impl TrainerConfig {
    fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(Error::InvalidConfiguration(String::from(msg)));
        if self.max_steps == Some(0) {
            return invalid("`max_steps` must be positive");
        }
        if self.checkpoint == Checkpoint::EveryEpisodes(0) {
            return invalid("checkpoint interval must be positive");
        }
        if self.checkpoint != Checkpoint::Never && self.snapshot_id.is_empty() {
            return invalid("`snapshot_id` must not be empty");
        }
        Ok(())
    }
}

/// Statistics of one finished episode
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeReport {
    pub episode: u32,
    /// Exploration rate the episode was played with
    pub epsilon: f32,
    /// Cumulative reward
    pub reward: f32,
    pub steps: u32,
    /// Wall time since the trainer was created
    pub elapsed: Duration,
}

/// Statistics over every episode a [`Trainer`] has played
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSummary {
    pub episodes: u32,
    /// Best cumulative reward reached at any point of any episode, at least `0`
    pub highest_reward: f32,
    /// Mean episode length
    pub mean_steps: f32,
    /// Mean length of the 100 longest episodes
    pub best_100_mean_steps: f32,
}

/// Training driver for a [`QTableAgent`]
///
/// Decays the agent's exploration rate before every episode, feeds each transition back into
/// the agent and checkpoints the table according to its [`Checkpoint`] policy.
///
/// ### Generics
/// - `D` - The [`Decay`] schedule of the exploration rate, evaluated at `episode + 1`
/// - `R` - The agent's random number generator
pub struct Trainer<D: Decay = Multiplicative, R: Rng = StdRng> {
    agent: QTableAgent<R>,
    schedule: D,
    config: TrainerConfig,
    episode: u32,
    highest_reward: f32,
    steps: Vec<u32>,
    started: Instant,
}

impl<D: Decay, R: Rng> Trainer<D, R> {
    pub fn new(agent: QTableAgent<R>, schedule: D, config: TrainerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            agent,
            schedule,
            config,
            episode: 0,
            highest_reward: 0.0,
            steps: Vec::new(),
            started: Instant::now(),
        })
    }

    pub fn agent(&self) -> &QTableAgent<R> {
        &self.agent
    }

    pub fn agent_mut(&mut self) -> &mut QTableAgent<R> {
        &mut self.agent
    }

    pub fn into_agent(self) -> QTableAgent<R> {
        self.agent
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Play the configured number of episodes
    pub fn run<E, S>(&mut self, env: &mut E, storage: &mut S) -> Result<TrainingSummary>
    where
        E: Environment,
        S: Storage + ?Sized,
    {
        for _ in 0..self.config.episodes {
            self.run_episode(env, storage)?;
        }
        Ok(self.summary())
    }

    /// Play a single episode
    pub fn run_episode<E, S>(&mut self, env: &mut E, storage: &mut S) -> Result<EpisodeReport>
    where
        E: Environment,
        S: Storage + ?Sized,
    {
        if env.num_actions() != self.agent.num_actions() {
            return Err(Error::InvalidConfiguration(format!(
                "environment has {} actions but the agent was configured for {}",
                env.num_actions(),
                self.agent.num_actions()
            )));
        }

        let epsilon = self.schedule.evaluate((self.episode + 1) as f32);
        self.agent.set_epsilon(epsilon)?;

        let mut state = env.reset().to_state_label();
        let mut reward = 0.0;
        let mut steps = 0;

        loop {
            let action = self.agent.choose_action(&state);
            let Step {
                observation,
                reward: step_reward,
                terminal,
                ..
            } = env.step(action);
            reward += step_reward;
            steps += 1;

            // the snapshot is taken before the step that set the score is learned
            if self.highest_reward < reward {
                self.highest_reward = reward;
                if self.config.checkpoint == Checkpoint::OnHighScore {
                    self.checkpoint(storage)?;
                    info!("New high score: {reward}");
                }
            }

            let next_state = observation.to_state_label();
            self.agent.learn(&state, action, step_reward, &next_state);

            if terminal || self.config.max_steps.is_some_and(|max| steps >= max) {
                break;
            }
            state = next_state;
        }

        let report = EpisodeReport {
            episode: self.episode,
            epsilon,
            reward,
            steps,
            elapsed: self.started.elapsed(),
        };
        self.episode += 1;
        self.steps.push(steps);

        if let Checkpoint::EveryEpisodes(n) = self.config.checkpoint {
            if self.episode % n == 0 {
                self.checkpoint(storage)?;
            }
        }

        let secs = report.elapsed.as_secs();
        info!(
            "Completed episode {} - [alpha: {:.2} - gamma: {:.2} - epsilon: {:.2}] - Reward: {} - Steps: {} - Time: {}:{:02}:{:02}",
            report.episode,
            self.agent.alpha(),
            self.agent.gamma(),
            epsilon,
            reward,
            steps,
            secs / 3600,
            secs / 60 % 60,
            secs % 60,
        );
        self.log_table();

        Ok(report)
    }

    fn checkpoint<S: Storage + ?Sized>(&self, storage: &mut S) -> Result<()> {
        let id = &self.config.snapshot_id;
        self.agent.save(storage, id).inspect_err(|e| {
            warn!("Checkpoint to `{id}` failed: {e}");
        })
    }

    fn log_table(&self) {
        if !log_enabled!(Level::Debug) {
            return;
        }
        let table = self.agent.table();
        for state in table.states() {
            for action in 0..self.agent.num_actions() {
                debug!("(({state}), {action}): {:.2}", table.get(state, action));
            }
        }
    }

    pub fn summary(&self) -> TrainingSummary {
        let mean = |steps: &[u32]| match steps.len() {
            0 => 0.0,
            n => steps.iter().map(|&s| s as f32).sum::<f32>() / n as f32,
        };
        let mut sorted = self.steps.clone();
        sorted.sort_unstable();
        let best = &sorted[sorted.len().saturating_sub(100)..];

        TrainingSummary {
            episodes: self.episode,
            highest_reward: self.highest_reward,
            mean_steps: mean(&self.steps),
            best_100_mean_steps: mean(best),
        }
    }
}
