//! A basic example for how to use the quasi-Newton solver.
use qnsolve::{Config, MonitorEvent, QuasiNewton, ResidualFn, SelfComm, Space};

fn main() {
    // Intersect the circle x² + y² = 4 with the curve y = eˣ − 1.
    let problem = ResidualFn::new(2, |x: &[f64], f: &mut [f64]| {
        f[0] = x[0] * x[0] + x[1] * x[1] - 4.0;
        f[1] = x[0].exp() - 1.0 - x[1];
        Ok(())
    });

    // Options use the same names as on the command line.
    let config = Config::from_options("-qn_m 5 -line_search secant -rtol 1e-10").unwrap();
    let mut solver = QuasiNewton::new(config)
        .unwrap()
        .with_monitor(Box::new(|event: &MonitorEvent| println!("{event}")));

    // Start somewhere in the first quadrant.
    let mut x = vec![1.0, 1.0];
    let outcome = solver.solve(&problem, &Space::new(SelfComm), None, &mut x);

    match outcome {
        Ok(outcome) if outcome.is_converged() => {
            println!(
                "Found ({}, {}) after {} iterations ({})",
                x[0],
                x[1],
                outcome.iterations(),
                outcome.reason()
            );
        }
        Ok(outcome) => eprintln!("qnsolve gave up: {}", outcome.reason()),
        Err(e) => eprintln!("qnsolve could not solve this system: {e}"),
    }
}
