use crate::calc::{Thresholds, DEFAULT_DEPARTMENT_GOAL};
use anyhow::{bail, Context};

pub const DEFAULT_LOG_FILTER: &str = "obed=info";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub log_filter: String,
    /// Seed for every new session.
    pub thresholds: Thresholds,
    pub department_goal: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            thresholds: Thresholds::default(),
            department_goal: DEFAULT_DEPARTMENT_GOAL,
        }
    }
}

impl Config {
    /// Environment variables:
    /// - `OBED_LOG`: tracing filter (default `obed=info`)
    /// - `OBED_TARGET_PASS_MARKS`, `OBED_KPI_CO`, `OBED_KPI_PO`: thresholds in (0, 100]
    /// - `OBED_DEPARTMENT_GOAL`: goal percentage for summaries (default 80)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let thresholds = Thresholds {
            target_pass_marks: percent(&lookup, "OBED_TARGET_PASS_MARKS")?
                .unwrap_or(defaults.thresholds.target_pass_marks),
            kpi_co: percent(&lookup, "OBED_KPI_CO")?.unwrap_or(defaults.thresholds.kpi_co),
            kpi_po: percent(&lookup, "OBED_KPI_PO")?.unwrap_or(defaults.thresholds.kpi_po),
        };
        Ok(Self {
            log_filter: lookup("OBED_LOG")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.log_filter),
            thresholds,
            department_goal: percent(&lookup, "OBED_DEPARTMENT_GOAL")?
                .unwrap_or(defaults.department_goal),
        })
    }
}

fn percent(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<f64>> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let v: f64 = raw
        .trim()
        .parse()
        .with_context(|| format!("{} is not a number: {:?}", key, raw))?;
    if !v.is_finite() || v <= 0.0 || v > 100.0 {
        bail!("{} must be in (0, 100], got {}", key, v);
    }
    Ok(Some(v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let c = Config::from_lookup(lookup(&[])).expect("config");
        assert_eq!(c, Config::default());
        assert_eq!(c.thresholds.target_pass_marks, 40.0);
        assert_eq!(c.department_goal, 80.0);
    }

    #[test]
    fn reads_overrides() {
        let c = Config::from_lookup(lookup(&[
            ("OBED_LOG", "obed=debug"),
            ("OBED_KPI_CO", " 60 "),
            ("OBED_DEPARTMENT_GOAL", "75.5"),
        ]))
        .expect("config");
        assert_eq!(c.log_filter, "obed=debug");
        assert_eq!(c.thresholds.kpi_co, 60.0);
        assert_eq!(c.thresholds.kpi_po, 50.0);
        assert_eq!(c.department_goal, 75.5);
    }

    #[test]
    fn rejects_bad_values() {
        let e = Config::from_lookup(lookup(&[("OBED_KPI_PO", "lots")])).unwrap_err();
        assert!(e.to_string().contains("OBED_KPI_PO"));
        assert!(Config::from_lookup(lookup(&[("OBED_TARGET_PASS_MARKS", "0")])).is_err());
        assert!(Config::from_lookup(lookup(&[("OBED_TARGET_PASS_MARKS", "101")])).is_err());
    }
}
