//! Built-in test problems.
use clap::ValueEnum;
use qnsolve::{DomainError, Jacobian, Problem, faer::MatMut};

/// Which system of equations to solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Kind {
    /// `(i + 1)·x_i = 1`
    Linear,
    /// `x_i + x_i³/10 = (i mod 5) + 1`
    Cubic,
    /// `(3 − 2x_i)x_i − x_{i−1} − 2x_{i+1} + 1 = 0`
    BroydenTridiagonal,
    /// Pairs of `10(x_{2i+1} − x_{2i}²) = 0`, `1 − x_{2i} = 0`.
    Rosenbrock,
}

/// A built-in problem of a given size.
#[derive(Debug, Clone, Copy)]
pub struct Builtin {
    pub kind: Kind,
    pub n: usize,
}

impl Builtin {
    pub fn new(kind: Kind, n: usize) -> Result<Self, String> {
        if n == 0 {
            return Err("problem size must be positive".to_owned());
        }
        if kind == Kind::Rosenbrock && n % 2 != 0 {
            return Err(format!("rosenbrock needs an even size, got {n}"));
        }
        Ok(Self { kind, n })
    }

    /// The customary starting point.
    pub fn initial_guess(&self) -> Vec<f64> {
        match self.kind {
            Kind::Linear | Kind::Cubic => vec![0.0; self.n],
            Kind::BroydenTridiagonal => vec![-1.0; self.n],
            Kind::Rosenbrock => (0..self.n)
                .map(|i| if i % 2 == 0 { -1.2 } else { 1.0 })
                .collect(),
        }
    }
}

fn cubic_target(i: usize) -> f64 {
    (i % 5) as f64 + 1.0
}

impl Problem for Builtin {
    fn len(&self) -> usize {
        self.n
    }

    fn residual(&self, x: &[f64], f: &mut [f64]) -> Result<(), DomainError> {
        let n = self.n;
        match self.kind {
            Kind::Linear => {
                for (i, (f, x)) in f.iter_mut().zip(x).enumerate() {
                    *f = (i + 1) as f64 * x - 1.0;
                }
            }
            Kind::Cubic => {
                for (i, (f, x)) in f.iter_mut().zip(x).enumerate() {
                    *f = x + 0.1 * x * x * x - cubic_target(i);
                }
            }
            Kind::BroydenTridiagonal => {
                for i in 0..n {
                    let left = if i > 0 { x[i - 1] } else { 0.0 };
                    let right = if i + 1 < n { x[i + 1] } else { 0.0 };
                    f[i] = (3.0 - 2.0 * x[i]) * x[i] - left - 2.0 * right + 1.0;
                }
            }
            Kind::Rosenbrock => {
                for i in (0..n).step_by(2) {
                    f[i] = 10.0 * (x[i + 1] - x[i] * x[i]);
                    f[i + 1] = 1.0 - x[i];
                }
            }
        }
        Ok(())
    }
}

impl Jacobian for Builtin {
    fn jacobian(&self, x: &[f64], mut jac: MatMut<'_, f64>) -> Result<(), DomainError> {
        let n = self.n;
        match self.kind {
            Kind::Linear => {
                for i in 0..n {
                    jac[(i, i)] = (i + 1) as f64;
                }
            }
            Kind::Cubic => {
                for (i, x) in x.iter().enumerate() {
                    jac[(i, i)] = 1.0 + 0.3 * x * x;
                }
            }
            Kind::BroydenTridiagonal => {
                for i in 0..n {
                    jac[(i, i)] = 3.0 - 4.0 * x[i];
                    if i > 0 {
                        jac[(i, i - 1)] = -1.0;
                    }
                    if i + 1 < n {
                        jac[(i, i + 1)] = -2.0;
                    }
                }
            }
            Kind::Rosenbrock => {
                for i in (0..n).step_by(2) {
                    jac[(i, i)] = -20.0 * x[i];
                    jac[(i, i + 1)] = 10.0;
                    jac[(i + 1, i)] = -1.0;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rosenbrock_size_must_be_even() {
        assert!(Builtin::new(Kind::Rosenbrock, 3).is_err());
        assert!(Builtin::new(Kind::Linear, 0).is_err());
        assert!(Builtin::new(Kind::Rosenbrock, 4).is_ok());
    }

    #[test]
    fn residuals_vanish_at_known_solutions() {
        let mut f = [1.0; 4];
        let linear = Builtin::new(Kind::Linear, 4).unwrap();
        linear
            .residual(&[1.0, 0.5, 1.0 / 3.0, 0.25], &mut f)
            .unwrap();
        assert!(f.iter().all(|f| f.abs() < 1e-15));

        let rosenbrock = Builtin::new(Kind::Rosenbrock, 4).unwrap();
        rosenbrock.residual(&[1.0; 4], &mut f).unwrap();
        assert_eq!(f, [0.0; 4]);
    }
}
