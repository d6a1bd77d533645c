//! Cron translation from standard 5-field expressions to the engine's 7-field form.
//!
//! Module descriptors use Unix cron: `min hour day-of-month month day-of-week`,
//! with Sunday as 0. The engine wants `sec min hour day-of-month month day-of-week year`
//! with Sunday as 1 and `?` in exactly one of the two day fields. Expressions that
//! already have 6 or 7 fields are taken as engine form and only validated.

use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CronError {
    #[error("invalid cron expression '{expression}': {reason}")]
    InvalidExpression { expression: String, reason: String },
}

/// Translate `expr` into the engine's cron form.
///
/// The result is guaranteed to parse with [`parse_schedule`].
pub fn translate(expr: &str) -> Result<String, CronError> {
    let trimmed = expr.trim();
    let fields: Vec<&str> = trimmed.split_whitespace().collect();
    let engine_form = match fields.len() {
        5 => from_unix(&fields).map_err(|reason| invalid(expr, reason))?,
        6 | 7 => trimmed.to_string(),
        n => {
            return Err(invalid(
                expr,
                format!("expected 5, 6 or 7 fields, got {n}"),
            ))
        }
    };
    parse_schedule(&engine_form).map_err(|e| match e {
        CronError::InvalidExpression { reason, .. } => invalid(expr, reason),
    })?;
    Ok(engine_form)
}

/// Parse an engine-form expression. `?` (no specific value) evaluates like `*`.
pub fn parse_schedule(expression: &str) -> Result<::cron::Schedule, CronError> {
    if let Some(field) = expression.split_whitespace().find(|f| has_zero_step(f)) {
        return Err(invalid(expression, format!("zero step in '{field}'")));
    }
    let normalized = expression.replace('?', "*");
    ::cron::Schedule::from_str(&normalized).map_err(|e| invalid(expression, e.to_string()))
}

fn has_zero_step(field: &str) -> bool {
    field
        .split(',')
        .filter_map(|atom| atom.split_once('/'))
        .any(|(_, step)| step.parse::<u32>() == Ok(0))
}

fn invalid(expr: &str, reason: impl Into<String>) -> CronError {
    CronError::InvalidExpression {
        expression: expr.to_string(),
        reason: reason.into(),
    }
}

fn from_unix(fields: &[&str]) -> Result<String, String> {
    let (minute, hour, dom, month, dow) = (fields[0], fields[1], fields[2], fields[3], fields[4]);
    let dom_any = dom == "*" || dom == "?";
    let dow_any = dow == "*" || dow == "?";

    let (dom, dow) = if dow_any {
        let dom = if dom == "?" { "*".to_string() } else { dom.to_string() };
        (dom, "?".to_string())
    } else if dom_any {
        ("?".to_string(), shift_day_of_week(dow)?)
    } else {
        (dom.to_string(), shift_day_of_week(dow)?)
    };

    Ok(format!("0 {minute} {hour} {dom} {month} {dow} *"))
}

/// Renumber day-of-week values from Sunday=0 (or 7) to Sunday=1.
fn shift_day_of_week(field: &str) -> Result<String, String> {
    let mut atoms = Vec::new();
    for atom in field.split(',') {
        let (range_part, step) = match atom.split_once('/') {
            Some((r, s)) => (r, Some(s)),
            None => (atom, None),
        };
        let shifted = match range_part.split_once('-') {
            _ if range_part == "*" => range_part.to_string(),
            Some((lo, hi)) => match (lo.parse::<u32>(), hi.parse::<u32>()) {
                (Ok(lo), Ok(hi)) => {
                    let (lo, hi) = (shift_day(lo), shift_day(hi));
                    if hi < lo {
                        if step.is_some() {
                            return Err(format!("unsupported day-of-week range with step: '{atom}'"));
                        }
                        atoms.push(format!("{lo}-7"));
                        atoms.push(if hi == 1 { "1".to_string() } else { format!("1-{hi}") });
                        continue;
                    }
                    format!("{lo}-{hi}")
                }
                _ => range_part.to_string(),
            },
            None => match range_part.parse::<u32>() {
                Ok(n) => shift_day(n).to_string(),
                Err(_) => range_part.to_string(),
            },
        };
        match step {
            Some(s) => atoms.push(format!("{shifted}/{s}")),
            None => atoms.push(shifted),
        }
    }
    Ok(atoms.join(","))
}

fn shift_day(n: u32) -> u32 {
    n % 7 + 1
}
