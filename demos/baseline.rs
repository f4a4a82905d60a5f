// Baseline: learn a hitting time and offset for one fixed ball observation.
//
// Run from the repo root:
//   cargo run --example baseline -- --episodes 1000 --seed 7 --lr 1e-3 \
//       --loss-json /tmp/loss
//
// Set RUST_LOG=hitpolicy=debug to follow each update.

use std::env;
use std::process;

use hitpolicy::{
    NegativeSquaredDistance, PolicyConfig, PolicyGradient, RewardFunction, StochasticPolicy,
};
use tracing_subscriber::EnvFilter;

const BALL_OBSERVATION: [f64; 6] = [
    0.294038474559784,
    -3.09185361862183,
    -0.347362071275711,
    -1.4689177274704,
    4.52377796173096,
    1.27400755882263,
];

const TARGET: [f64; 2] = [0.45, 0.83];

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args: Vec<String> = env::args().collect();
    let episodes: usize = arg_value(&args, "--episodes")
        .and_then(|s| s.parse().ok())
        .unwrap_or(1000);
    let seed: u64 = arg_value(&args, "--seed")
        .and_then(|s| s.parse().ok())
        .unwrap_or(42);
    let lr: f64 = arg_value(&args, "--lr")
        .and_then(|s| s.parse().ok())
        .unwrap_or(1e-3);
    let loss_json = arg_value(&args, "--loss-json");

    if let Err(e) = run(episodes, seed, lr, loss_json) {
        eprintln!("baseline failed: {e}");
        process::exit(1);
    }
}

fn run(episodes: usize, seed: u64, lr: f64, loss_json: Option<&str>) -> hitpolicy::Result<()> {
    let config = PolicyConfig::default().with_learning_rate(lr);
    let mut learner = PolicyGradient::from_seed(config, seed)?;
    let reward = NegativeSquaredDistance::default();

    for _ in 0..episodes {
        let action = learner.generate_action(&BALL_OBSERVATION)?;
        let r = reward.reward(&TARGET, &action);
        learner.store_transition(&BALL_OBSERVATION, &action, r)?;
        learner.learn()?;
    }

    let mean_action = learner.policy().deterministic(&BALL_OBSERVATION)?;
    println!("{}", learner.report_training_curve());
    println!(
        "Mean action after {episodes} episodes: T = {:.4}, delta_t0 = {:.4} (target {:?})",
        mean_action[0], mean_action[1], TARGET
    );
    println!("Reward at the mean: {:.6}", reward.reward(&TARGET, &mean_action));

    if let Some(path) = loss_json {
        let written = learner.export_loss_history(path)?;
        println!("Loss history written to {}", written.display());
    }
    Ok(())
}

fn arg_value<'a>(args: &'a [String], key: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}
