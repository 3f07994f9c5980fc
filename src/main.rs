// Copyright (c) 2022 Bastiaan Marinus van de Weerd

mod graph;
mod search;
mod day16;
mod day19;

use std::path::PathBuf;
use anyhow::Context as _;


#[derive(clap::Parser)]
#[command(name = "advent22-search", about = "Branch-and-bound solvers for days 16 and 19")]
struct Cli {
	/// Worker threads for the parallel searches (default: one per core)
	#[arg(short = 'j', long, global = true)]
	threads: Option<usize>,

	#[command(subcommand)]
	day: Day,
}

#[derive(clap::Subcommand)]
enum Day {
	/// Proboscidea Volcanium: release the most pressure
	Day16(Args),
	/// Not Enough Minerals: crack the most geodes
	Day19(Args),
}

#[derive(clap::Args)]
struct Args {
	/// Part to solve; 0 solves both
	#[arg(short, long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=2))]
	part: u8,

	/// Puzzle input file
	input: PathBuf,
}

type Part = fn(&str) -> anyhow::Result<usize>;


fn main() -> anyhow::Result<()> {
	use clap::Parser as _;

	env_logger::init();

	let cli = match Cli::try_parse() {
		Ok(cli) => cli,
		Err(err) if err.use_stderr() => {
			eprint!("{err}");
			std::process::exit(1)
		}
		Err(err) => err.exit(),
	};

	if let Some(threads) = cli.threads {
		rayon::ThreadPoolBuilder::new()
			.num_threads(threads)
			.build_global()
			.context("configuring worker threads")?;
	}

	let (number, args, parts): (u8, &Args, [Part; 2]) = match &cli.day {
		Day::Day16(args) => (16, args, [
			|s: &str| Ok(day16::part1(s)?),
			|s: &str| Ok(day16::part2(s)?),
		]),
		Day::Day19(args) => (19, args, [
			|s: &str| Ok(day19::part1(s)?),
			|s: &str| Ok(day19::part2(s)?),
		]),
	};

	let input = std::fs::read_to_string(&args.input)
		.with_context(|| format!("reading {}", args.input.display()))?;

	for (part, solve) in (1..).zip(parts) {
		if args.part != 0 && args.part != part { continue }
		let started = std::time::Instant::now();
		let answer = solve(&input).with_context(|| format!("solving day {number}, part {part}"))?;
		log::info!("day {number}, part {part} took {:?}", started.elapsed());
		println!("Day {number}; part {part}: {answer}");
	}

	Ok(())
}
