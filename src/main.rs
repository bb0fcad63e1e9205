use clap::{Parser, ValueEnum};
use rand::{rngs::StdRng, Rng, SeedableRng};
use segment_winner::{DeficitStrategy, Participant, Picker, PickerConfig, DEFAULT_SUBGROUP_CAP};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Draws winners from a randomly generated weighted population.
#[derive(Debug, Parser)]
#[command(author, long_about = None, name = "segment-winner", version)]
struct Cli {
    /// Size of the generated population.
    #[arg(short, long, default_value_t = 1_000_000)]
    participants: u64,
    /// Number of winners to draw.
    #[arg(short, long, default_value_t = 100_000)]
    winners: usize,
    /// Parallel partitions, 0 for one per core.
    #[arg(long, default_value_t = 0)]
    workers: usize,
    /// Seed for both the population and the draw.
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value_t = DEFAULT_SUBGROUP_CAP)]
    subgroup_cap: usize,
    #[arg(long, value_enum, default_value_t = Deficit::FromComplement)]
    deficit: Deficit,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Deficit {
    FromWinners,
    FromComplement,
}

impl From<Deficit> for DeficitStrategy {
    fn from(from: Deficit) -> Self {
        match from {
            Deficit::FromWinners => DeficitStrategy::FromWinners,
            Deficit::FromComplement => DeficitStrategy::FromComplement,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    // Weights from 10 to 3000
    let population: Vec<Participant> =
        (1..=cli.participants).map(|id| Participant::new(id, rng.gen_range(10..=3000))).collect();

    let mut config = PickerConfig::default()
        .with_workers(cli.workers)
        .with_subgroup_cap(cli.subgroup_cap)
        .with_deficit(cli.deficit.into());
    config.seed = cli.seed;
    let picker = Picker::with_config(config)?;

    let start = Instant::now();
    let report = picker.draw_with_report(&population, cli.winners)?;
    let elapsed = start.elapsed();

    info!(
        participants = population.len(),
        requested = report.requested,
        drawn = report.winners.len(),
        passes = report.passes,
        leftover_weight = report.leftover_weight,
        workers = picker.workers(),
        ?elapsed,
        "draw complete"
    );
    let total: u64 = report.winners.iter().map(|p| p.weight).sum();
    if let Some(mean) = total.checked_div(report.winners.len() as u64) {
        println!("Drew {} winners in {:?}, mean winning weight {}", report.winners.len(), elapsed, mean);
    } else {
        println!("No winners drawn in {elapsed:?}");
    }
    Ok(())
}
