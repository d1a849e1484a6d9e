use std::{error::Error, fs, path::Path};

use env_logger::{Builder, Env};
use log::info;
use qnav::{
    decay::Multiplicative,
    gym::{LineTrack, LineTrackConfig},
    Checkpoint, FileStorage, QTableAgent, QTableAgentConfig, Trainer, TrainerConfig,
};

const NUM_EPISODES: u32 = 2000;
const SNAPSHOT_ID: &str = "QValues";

fn main() -> Result<(), Box<dyn Error>> {
    Builder::from_env(Env::default().default_filter_or("info")).init();

    let path = Path::new("demos/out");
    fs::create_dir_all(path)?;

    let mut env = LineTrack::new(LineTrackConfig::default())?;
    let mut storage = FileStorage::new(path);

    let config = QTableAgentConfig {
        epsilon: 0.9,
        alpha: 0.2,
        gamma: 0.8,
        num_actions: 3,
    };
    let mut agent = QTableAgent::new(config)?;
    match agent.load(&storage, SNAPSHOT_ID) {
        Ok(()) => info!("Resuming from {} stored entries", agent.table().len()),
        Err(qnav::Error::NotFound(_)) => info!("No stored table, starting fresh"),
        Err(e) => return Err(e.into()),
    }

    let mut trainer = Trainer::new(
        agent,
        Multiplicative::new(0.9986, 0.9, 0.05)?,
        TrainerConfig {
            episodes: NUM_EPISODES,
            max_steps: Some(2000),
            checkpoint: Checkpoint::OnHighScore,
            snapshot_id: String::from(SNAPSHOT_ID),
        },
    )?;

    let mut wtr = csv::Writer::from_path(path.join("data.csv"))?;
    wtr.write_record(["episode", "epsilon", "reward", "steps"])?;

    for _ in 0..NUM_EPISODES {
        let report = trainer.run_episode(&mut env, &mut storage)?;
        wtr.write_record(&[
            report.episode.to_string(),
            report.epsilon.to_string(),
            report.reward.to_string(),
            report.steps.to_string(),
        ])?;
    }
    wtr.flush()?;

    let summary = trainer.summary();
    info!(
        "|{}|{}|{}|{}*{}|{}|",
        summary.episodes,
        trainer.agent().alpha(),
        trainer.agent().gamma(),
        0.9,
        0.9986,
        summary.highest_reward
    );
    info!("Overall score: {:.2}", summary.mean_steps);
    info!("Best 100 score: {:.2}", summary.best_100_mean_steps);

    Ok(())
}
