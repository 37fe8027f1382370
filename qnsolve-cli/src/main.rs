use std::{hint::black_box, path::PathBuf, time::Duration};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use qnsolve::{
    Config, InnerSolver, MonitorEvent, Newton, QuasiNewton, Richardson, SelfComm, SolveOutcome,
    Space,
};
use serde::Serialize;
use simplelog::{ColorChoice, LevelFilter, TermLogger, TerminalMode};

use crate::problems::{Builtin, Kind};

mod problems;

const NUM_ITERS_BENCHMARK: u32 = 100;

#[derive(Parser, Clone)]
#[command(name = "qnsolve", version, about, long_about = None)]
struct Cli {
    /// Which built-in problem to solve.
    #[arg(short = 'p', long, value_enum, default_value_t = Kind::BroydenTridiagonal)]
    problem: Kind,

    /// Number of unknowns.
    #[arg(short = 'n', long, default_value_t = 10)]
    size: usize,

    /// Start every unknown from this value instead of the problem's usual guess.
    #[arg(long = "x0", allow_negative_numbers = true)]
    initial_value: Option<f64>,

    /// Solver configuration as JSON. Options given with `--options` override it.
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Solver options, e.g. "-qn_m 5 -line_search basic -max_it 50".
    #[arg(short = 'o', long, allow_hyphen_values = true)]
    options: Option<String>,

    /// Precondition each iteration with this solver.
    #[arg(long, value_enum, default_value_t = InnerKind::None)]
    inner: InnerKind,

    /// Iterations the inner solver takes each time it runs.
    #[arg(long, default_value_t = 1)]
    inner_iterations: usize,

    /// Print the residual norm and restarts as the solve runs.
    #[arg(short = 'm', long)]
    monitor: bool,

    /// Print the final iterate.
    #[arg(long = "show-solution")]
    show_solution: bool,

    /// Print the outcome as JSON instead of text.
    #[arg(long)]
    json: bool,

    /// Also time the solve, averaged over repeated runs.
    #[arg(long)]
    benchmark: bool,

    /// More logging. Repeat for more detail.
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum InnerKind {
    None,
    Richardson,
    Newton,
}

#[derive(Serialize)]
struct Report<'a> {
    problem: String,
    size: usize,
    config: &'a Config,
    outcome: &'a SolveOutcome,
    solution: &'a [f64],
    #[serde(skip_serializing_if = "Option::is_none")]
    mean_solve_micros: Option<u128>,
}

struct Run {
    config: Config,
    outcome: SolveOutcome,
    solution: Vec<f64>,
    duration: Option<Duration>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let run = match main_inner(&cli) {
        Ok(run) => run,
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    };
    if let Err(e) = print_output(&cli, &run) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    if !run.outcome.is_converged() {
        std::process::exit(2);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    // Only fails if a logger is already installed, which is fine.
    let _ = TermLogger::init(
        level,
        simplelog::Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    );
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            let txt = std::fs::read_to_string(path)
                .with_context(|| format!("could not read {}", path.display()))?;
            serde_json::from_str(&txt)
                .with_context(|| format!("could not parse {}", path.display()))?
        }
        None => Config::default(),
    };
    if let Some(options) = &cli.options {
        config = config.with_options(options)?;
    }
    config.validate()?;
    Ok(config)
}

fn build_solver(cli: &Cli, config: Config) -> anyhow::Result<QuasiNewton<Builtin>> {
    let mut solver = QuasiNewton::new(config)?;
    let inner: Option<Box<dyn InnerSolver<Builtin, SelfComm>>> = match cli.inner {
        InnerKind::None => None,
        InnerKind::Richardson => Some(Box::new(Richardson::new(1.0, cli.inner_iterations))),
        InnerKind::Newton => Some(Box::new(Newton::new(cli.inner_iterations))),
    };
    if let Some(inner) = inner {
        solver = solver.with_inner(inner);
    }
    if cli.monitor && !cli.json {
        solver = solver.with_monitor(Box::new(print_event));
    }
    Ok(solver)
}

fn print_event(event: &MonitorEvent) {
    use colored::Colorize;
    match event {
        MonitorEvent::Restart { .. } | MonitorEvent::IllConditioned { .. } => {
            println!("{}", event.to_string().yellow());
        }
        _ => println!("{event}"),
    }
}

fn main_inner(cli: &Cli) -> anyhow::Result<Run> {
    let problem = Builtin::new(cli.problem, cli.size).map_err(anyhow::Error::msg)?;
    let config = load_config(cli)?;
    let initial_guess = match cli.initial_value {
        Some(value) => vec![value; problem.n],
        None => problem.initial_guess(),
    };
    let space = Space::new(SelfComm);

    let mut solver = build_solver(cli, config)?;
    let mut solution = initial_guess.clone();
    let outcome = solver.solve(&problem, &space, None, &mut solution)?;

    let duration = if cli.benchmark {
        // The monitor would dominate the timing.
        let mut solver = build_solver(&Cli { monitor: false, ..cli.clone() }, config)?;
        let now = std::time::Instant::now();
        for _ in 0..NUM_ITERS_BENCHMARK {
            let mut x = initial_guess.clone();
            black_box(solver.solve(&problem, &space, None, &mut x)?);
        }
        Some(now.elapsed() / NUM_ITERS_BENCHMARK)
    } else {
        None
    };

    Ok(Run {
        config,
        outcome,
        solution,
        duration,
    })
}

/// Prints the result to stdout, as text or JSON.
fn print_output(cli: &Cli, run: &Run) -> anyhow::Result<()> {
    if cli.json {
        let report = Report {
            problem: format!("{:?}", cli.problem),
            size: cli.size,
            config: &run.config,
            outcome: &run.outcome,
            solution: &run.solution,
            mean_solve_micros: run.duration.map(|d| d.as_micros()),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    use colored::Colorize;
    let outcome = &run.outcome;
    println!("Problem: {:?}, {} unknowns", cli.problem, cli.size);
    let reason = outcome.reason().to_string();
    if outcome.is_converged() {
        println!("Converged: {}", reason.green());
    } else if outcome.reason().is_diverged() {
        println!("Diverged: {}", reason.red());
    } else {
        println!("Stopped: {}", reason.yellow());
    }
    println!("Iterations needed: {}", outcome.iterations());
    println!("Function evaluations: {}", outcome.function_evaluations());
    println!("Final residual norm: {:e}", outcome.residual_norm());
    if outcome.restarts() > 0 {
        println!("Restarts: {}", outcome.restarts());
    }
    if outcome.line_search_failures() > 0 {
        println!(
            "Line search failures: {}",
            outcome.line_search_failures().to_string().yellow()
        );
    }
    if let Some(duration) = run.duration {
        print_performance(duration);
    }
    if cli.show_solution {
        println!("Solution:");
        for (i, x) in run.solution.iter().enumerate() {
            println!("\tx[{i}] = {x:.10}");
        }
    }
    Ok(())
}

fn print_performance(duration: Duration) {
    use colored::Colorize;
    let time = format!("{}μs", duration.as_micros());
    println!("Solved in {time} (mean over {NUM_ITERS_BENCHMARK} iterations)");
    let solves_per_second = Duration::from_secs(1).as_micros() / duration.as_micros().max(1);
    let solves_per_second = if solves_per_second <= 60 {
        solves_per_second.to_string().red()
    } else {
        solves_per_second.to_string().normal()
    };
    println!("i.e. {solves_per_second} solves per second");
}

#[cfg(test)]
mod tests {
    use std::process::{Command, Stdio};

    use super::*;

    fn parse_args(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("qnsolve").chain(args.iter().copied()))
    }

    #[test]
    fn solves_every_builtin_problem() {
        for (problem, size) in [
            ("linear", "5"),
            ("cubic", "10"),
            ("broyden-tridiagonal", "50"),
        ] {
            let cli = parse_args(&["-p", problem, "-n", size]);
            let run = main_inner(&cli).unwrap();
            assert!(run.outcome.is_converged(), "{problem}: {}", run.outcome.reason());
            print_output(&cli, &run).unwrap();
        }
    }

    #[test]
    fn options_override_the_config() {
        let cli = parse_args(&["-p", "cubic", "-o", "-max_it 2 -rtol 0 -line_search basic"]);
        let run = main_inner(&cli).unwrap();
        assert_eq!(run.config.max_iterations, 2);
        assert_eq!(run.outcome.iterations(), 2);
        assert!(!run.outcome.is_converged());
    }

    #[test]
    fn bad_options_are_reported() {
        let cli = parse_args(&["-o", "-qn_m lots"]);
        assert!(main_inner(&cli).is_err());
        let cli = parse_args(&["-p", "rosenbrock", "-n", "3"]);
        assert!(main_inner(&cli).is_err());
    }

    #[test]
    fn newton_inner_solver() {
        let cli = parse_args(&["-p", "broyden-tridiagonal", "-n", "20", "--inner", "newton"]);
        let run = main_inner(&cli).unwrap();
        assert!(run.outcome.is_converged(), "{}", run.outcome.reason());
    }

    #[test]
    fn json_output() {
        let out = Command::new("cargo")
            .args(["run", "--quiet", "--", "-p", "linear", "-n", "3", "--json"])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap()
            .wait_with_output()
            .unwrap();
        assert!(out.status.success());
        let report: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
        assert_eq!(report["size"], 3);
        assert_eq!(report["solution"].as_array().unwrap().len(), 3);
    }
}
