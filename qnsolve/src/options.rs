//! Parser for PETSc-style options strings, e.g. `-qn_m 5 -qn_composition composed -qn_monitor`.
use std::{fmt::Display, str::FromStr};

use winnow::{
    Result as WResult,
    ascii::{multispace0, multispace1},
    combinator::{alt, eof, not, opt, peek, preceded, repeat, terminated},
    prelude::*,
    token::{one_of, take_while},
};

use crate::{Config, QnError};

/// One `-name [value]` pair from an options string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RawOption<'a> {
    pub name: &'a str,
    pub value: Option<&'a str>,
}

/// Split an options string into its `-name [value]` pairs.
pub(crate) fn parse_options(input: &str) -> Result<Vec<RawOption<'_>>, QnError> {
    options
        .parse(input)
        .map_err(|e| QnError::InvalidOptions(e.to_string()))
}

fn options<'a>(i: &mut &'a str) -> WResult<Vec<RawOption<'a>>> {
    let opts = repeat(0.., preceded(multispace0, RawOption::parse)).parse_next(i)?;
    (multispace0, eof).parse_next(i)?;
    Ok(opts)
}

impl<'a> RawOption<'a> {
    fn parse(i: &mut &'a str) -> WResult<Self> {
        let name = option_name.parse_next(i)?;
        let value = opt(preceded(multispace1, option_value)).parse_next(i)?;
        Ok(Self { name, value })
    }
}

// -qn_m
fn option_name<'a>(i: &mut &'a str) -> WResult<&'a str> {
    preceded(
        '-',
        terminated(
            (
                one_of(|c: char| c.is_ascii_alphabetic()),
                take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '_'),
            )
                .take(),
            peek(alt((multispace1, eof))),
        ),
    )
    .parse_next(i)
}

// Anything that doesn't look like the next option name. `-1e-3` is a value.
fn option_value<'a>(i: &mut &'a str) -> WResult<&'a str> {
    preceded(
        not(('-', one_of(|c: char| c.is_ascii_alphabetic()))),
        take_while(1.., |c: char| !c.is_whitespace()),
    )
    .parse_next(i)
}

impl RawOption<'_> {
    /// Write this option into `cfg`.
    pub(crate) fn apply(&self, cfg: &mut Config) -> Result<(), QnError> {
        match self.name {
            "qn_m" => cfg.history_size = self.parsed()?,
            "qn_powell_gamma" => cfg.powell_gamma = self.parsed()?,
            "qn_powell_downhill" => cfg.powell_downhill = self.parsed()?,
            "qn_scaling" => cfg.scaling = self.parsed()?,
            "qn_composition" => cfg.composition = self.parsed()?,
            "qn_monitor" => cfg.monitor = self.flag()?,
            "qn_curvature_guard" => cfg.curvature_guard = self.parsed()?,
            "max_it" => cfg.max_iterations = self.parsed()?,
            "max_funcs" => cfg.max_function_evaluations = self.parsed()?,
            "max_fail" => cfg.max_line_search_failures = self.parsed()?,
            "atol" => cfg.atol = self.parsed()?,
            "rtol" => cfg.rtol = self.parsed()?,
            "stol" => cfg.stol = self.parsed()?,
            "line_search" => cfg.line_search = self.parsed()?,
            other => {
                return Err(QnError::InvalidOptions(format!("unknown option -{other}")));
            }
        }
        Ok(())
    }

    fn parsed<T>(&self) -> Result<T, QnError>
    where
        T: FromStr,
        T::Err: Display,
    {
        let Some(value) = self.value else {
            return Err(QnError::InvalidOptions(format!(
                "option -{} needs a value",
                self.name
            )));
        };
        value
            .parse()
            .map_err(|e| QnError::InvalidOptions(format!("-{} {value}: {e}", self.name)))
    }

    // Bare flags mean "on".
    fn flag(&self) -> Result<bool, QnError> {
        match self.value {
            None | Some("true" | "1" | "yes") => Ok(true),
            Some("false" | "0" | "no") => Ok(false),
            Some(other) => Err(QnError::InvalidOptions(format!(
                "-{} expects true or false, got {other}",
                self.name
            ))),
        }
    }
}
