use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::QnError;

/// How an inner solver's output becomes the quasi-Newton correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "fuzz", derive(arbitrary::Arbitrary))]
#[serde(rename_all = "lowercase")]
pub enum Composition {
    /// Run the inner solve on the iterate, then use its residual as the correction.
    #[default]
    Sequential,
    /// Use the change the inner solve would apply to the iterate as the correction.
    Composed,
}

impl FromStr for Composition {
    type Err = QnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sequential" => Ok(Self::Sequential),
            "composed" => Ok(Self::Composed),
            other => Err(QnError::InvalidOptions(format!(
                "unknown composition '{other}', expected 'sequential' or 'composed'"
            ))),
        }
    }
}

/// Which built-in line search the solver uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "fuzz", derive(arbitrary::Arbitrary))]
#[serde(rename_all = "lowercase")]
pub enum LineSearchKind {
    /// Take the full (damped) step.
    Basic,
    /// Backtrack with quadratic interpolation until the residual decreases enough.
    Backtracking,
    /// Minimise the residual norm along the direction with secant steps.
    #[default]
    Secant,
}

impl FromStr for LineSearchKind {
    type Err = QnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(Self::Basic),
            "backtracking" => Ok(Self::Backtracking),
            "secant" => Ok(Self::Secant),
            other => Err(QnError::InvalidOptions(format!(
                "unknown line search '{other}', expected 'basic', 'backtracking' or 'secant'"
            ))),
        }
    }
}

/// What to do when an accepted update has a (nearly) zero curvature `dX·dF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "fuzz", derive(arbitrary::Arbitrary))]
#[serde(rename_all = "lowercase")]
pub enum CurvatureGuard {
    /// Drop the history and continue from the raw correction, like a Powell restart.
    #[default]
    Restart,
    /// Stop the solve with [`QnError::IllConditionedUpdate`].
    Fail,
}

impl FromStr for CurvatureGuard {
    type Err = QnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "restart" => Ok(Self::Restart),
            "fail" => Ok(Self::Fail),
            other => Err(QnError::InvalidOptions(format!(
                "unknown curvature guard '{other}', expected 'restart' or 'fail'"
            ))),
        }
    }
}

/// Solver configuration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "fuzz", derive(arbitrary::Arbitrary))]
#[serde(default)]
pub struct Config {
    /// How many past (step, residual change) pairs to keep.
    pub history_size: usize,
    /// Restart when `|Dold·D| > powell_gamma·|Dold·Dold|`.
    pub powell_gamma: f64,
    /// Powell descent threshold. Validated and stored, but the restart test
    /// only uses the angle condition.
    pub powell_downhill: f64,
    /// Initial inverse-Hessian scaling `H0`. Replaced by Shanno scaling after
    /// the first accepted update of each solve.
    pub scaling: f64,
    /// How to combine an inner solver with the quasi-Newton correction.
    pub composition: Composition,
    /// Report two-loop coefficients, restarts and residual norms to the monitor.
    pub monitor: bool,
    /// Maximum outer iterations.
    pub max_iterations: usize,
    /// Maximum residual evaluations, line searches included.
    pub max_function_evaluations: usize,
    /// Stop once this many line searches have failed.
    pub max_line_search_failures: usize,
    /// Absolute residual norm tolerance.
    pub atol: f64,
    /// Residual norm tolerance relative to the initial residual norm.
    pub rtol: f64,
    /// Step norm tolerance relative to the iterate norm.
    pub stol: f64,
    /// Which line search to use unless one is passed in explicitly.
    pub line_search: LineSearchKind,
    /// What to do with an update whose curvature can't be inverted.
    pub curvature_guard: CurvatureGuard,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            history_size: 30,
            powell_gamma: 0.9,
            powell_downhill: 0.2,
            scaling: 1.0,
            composition: Composition::default(),
            monitor: false,
            max_iterations: 10_000,
            max_function_evaluations: 30_000,
            max_line_search_failures: 1,
            atol: 1e-50,
            rtol: 1e-8,
            stol: 1e-8,
            line_search: LineSearchKind::default(),
            curvature_guard: CurvatureGuard::default(),
        }
    }
}

impl Config {
    /// Parse an options string like `-qn_m 5 -qn_composition composed` on top of the defaults.
    pub fn from_options(options: &str) -> Result<Self, QnError> {
        Self::default().with_options(options)
    }

    /// Apply an options string on top of this configuration.
    pub fn with_options(mut self, options: &str) -> Result<Self, QnError> {
        for opt in crate::options::parse_options(options)? {
            opt.apply(&mut self)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Check every value is in range.
    pub fn validate(&self) -> Result<(), QnError> {
        fn check(ok: bool, option: &'static str, value: f64, reason: &'static str) -> Result<(), QnError> {
            if ok {
                Ok(())
            } else {
                Err(QnError::InvalidConfig {
                    option,
                    value: value.to_string(),
                    reason,
                })
            }
        }
        let unit = |v: f64| v.is_finite() && v > 0.0 && v <= 1.0;
        let nonneg = |v: f64| v.is_finite() && v >= 0.0;
        check(unit(self.powell_gamma), "powell_gamma", self.powell_gamma, "must be in (0, 1]")?;
        check(
            unit(self.powell_downhill),
            "powell_downhill",
            self.powell_downhill,
            "must be in (0, 1]",
        )?;
        check(
            self.scaling.is_finite() && self.scaling > 0.0,
            "scaling",
            self.scaling,
            "must be positive and finite",
        )?;
        check(nonneg(self.atol), "atol", self.atol, "must be non-negative and finite")?;
        check(nonneg(self.rtol), "rtol", self.rtol, "must be non-negative and finite")?;
        check(nonneg(self.stol), "stol", self.stol, "must be non-negative and finite")?;
        if self.max_line_search_failures == 0 {
            return Err(QnError::InvalidConfig {
                option: "max_line_search_failures",
                value: "0".to_owned(),
                reason: "must be at least 1",
            });
        }
        Ok(())
    }

    /// Keep this many past updates.
    pub fn with_history_size(mut self, m: usize) -> Self {
        self.history_size = m;
        self
    }
    /// Set the Powell angle restart threshold.
    pub fn with_powell_gamma(mut self, gamma: f64) -> Self {
        self.powell_gamma = gamma;
        self
    }
    /// Set the Powell descent threshold.
    pub fn with_powell_downhill(mut self, downhill: f64) -> Self {
        self.powell_downhill = downhill;
        self
    }
    /// Set the initial inverse-Hessian scaling.
    pub fn with_scaling(mut self, scaling: f64) -> Self {
        self.scaling = scaling;
        self
    }
    /// Choose how an inner solver is composed.
    pub fn with_composition(mut self, composition: Composition) -> Self {
        self.composition = composition;
        self
    }
    /// Turn monitoring on or off.
    pub fn with_monitor(mut self, enabled: bool) -> Self {
        self.monitor = enabled;
        self
    }
    /// Set the iteration limit.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
    /// Set the residual evaluation limit.
    pub fn with_max_function_evaluations(mut self, max: usize) -> Self {
        self.max_function_evaluations = max;
        self
    }
    /// Set how many line-search failures end the solve.
    pub fn with_max_line_search_failures(mut self, max: usize) -> Self {
        self.max_line_search_failures = max;
        self
    }
    /// Set the absolute residual tolerance.
    pub fn with_atol(mut self, atol: f64) -> Self {
        self.atol = atol;
        self
    }
    /// Set the relative residual tolerance.
    pub fn with_rtol(mut self, rtol: f64) -> Self {
        self.rtol = rtol;
        self
    }
    /// Set the relative step tolerance.
    pub fn with_stol(mut self, stol: f64) -> Self {
        self.stol = stol;
        self
    }
    /// Choose the built-in line search.
    pub fn with_line_search(mut self, kind: LineSearchKind) -> Self {
        self.line_search = kind;
        self
    }
    /// Choose how ill-conditioned updates are handled.
    pub fn with_curvature_guard(mut self, guard: CurvatureGuard) -> Self {
        self.curvature_guard = guard;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = Config::default();
        assert_eq!(cfg.history_size, 30);
        assert_eq!(cfg.composition, Composition::Sequential);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_values() {
        let err = Config::default().with_powell_gamma(1.5).validate().unwrap_err();
        assert!(matches!(
            err,
            QnError::InvalidConfig {
                option: "powell_gamma",
                ..
            }
        ));
        assert!(Config::default().with_scaling(0.0).validate().is_err());
        assert!(Config::default().with_rtol(f64::NAN).validate().is_err());
        assert!(
            Config::default()
                .with_max_line_search_failures(0)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn parses_enum_names() {
        assert_eq!("composed".parse::<Composition>().unwrap(), Composition::Composed);
        assert_eq!("basic".parse::<LineSearchKind>().unwrap(), LineSearchKind::Basic);
        assert_eq!("fail".parse::<CurvatureGuard>().unwrap(), CurvatureGuard::Fail);
        assert!("sideways".parse::<Composition>().is_err());
    }

    #[test]
    fn json_roundtrip_fills_missing_fields_with_defaults() {
        let cfg: Config =
            serde_json::from_str(r#"{"history_size": 5, "composition": "composed"}"#).unwrap();
        assert_eq!(cfg.history_size, 5);
        assert_eq!(cfg.composition, Composition::Composed);
        assert_eq!(cfg.powell_gamma, 0.9);
        let back: Config = serde_json::from_str(&serde_json::to_string(&cfg).unwrap()).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn default_config_survives_json_exactly() {
        let cfg = Config::default().with_stol(1.0 / 3.0);
        let txt = serde_json::to_string(&cfg).unwrap();
        let back: Config = serde_json::from_str(&txt).unwrap();
        assert_eq!(back.atol.to_bits(), 1e-50_f64.to_bits());
        assert_eq!(back, cfg);
    }
}
