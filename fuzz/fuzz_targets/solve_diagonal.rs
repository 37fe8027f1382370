#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use qnsolve::{Config, ResidualFn};

fuzz_target!(|setup: Setup| {
    let mut config = setup.config;
    // Keep each run short.
    config.history_size = config.history_size.min(64);
    config.max_iterations = config.max_iterations.min(200);
    config.max_function_evaluations = config.max_function_evaluations.min(1000);
    config.monitor = false;

    let n = setup.equations.len().min(setup.guess.len()).min(32);
    let equations = &setup.equations[..n];
    let problem = ResidualFn::new(n, |x: &[f64], f: &mut [f64]| {
        for ((f, x), (a, b)) in f.iter_mut().zip(x).zip(equations) {
            *f = a * x + 0.1 * x * x * x - b;
        }
        Ok(())
    });
    let mut x = setup.guess[..n].to_vec();
    let _ = qnsolve::solve(&problem, &mut x, config);
});

#[derive(Debug, Arbitrary)]
struct Setup {
    config: Config,
    /// `(a_i, b_i)` for `a_i·x_i + x_i³/10 = b_i`.
    equations: Vec<(f64, f64)>,
    guess: Vec<f64>,
}
