use clap::Args;
use cubetimer_core::{Config, Puzzle, RandomMoveScrambler, ScrambleSource};

#[derive(Args)]
pub struct ScrambleArgs {
    /// Cube order (2-7). Defaults to the configured puzzle.
    #[arg(long)]
    puzzle_type: Option<u32>,
    /// Puzzle subtype
    #[arg(long, default_value = "0")]
    subtype: u32,
    /// Number of scrambles to print
    #[arg(short = 'n', long, default_value = "1")]
    count: usize,
    /// Seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,
    /// Print as a JSON array
    #[arg(long)]
    json: bool,
}

pub fn run(args: ScrambleArgs) -> Result<(), Box<dyn std::error::Error>> {
    let puzzle = match args.puzzle_type {
        Some(puzzle_type) => Puzzle::new(puzzle_type, args.subtype),
        None => Config::load_or_default().puzzle,
    };
    let scrambler = match args.seed {
        Some(seed) => RandomMoveScrambler::seeded(seed),
        None => RandomMoveScrambler::new(),
    };

    let scrambles = (0..args.count)
        .map(|_| scrambler.generate(&puzzle))
        .collect::<Result<Vec<_>, _>>()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&scrambles)?);
    } else {
        for scramble in scrambles {
            println!("{scramble}");
        }
    }
    Ok(())
}
