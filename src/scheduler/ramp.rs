//! Ramping population schedules
//!
//! Population moves linearly from the previous stage's target (or the start
//! population for the first stage) to the current stage's target over the
//! stage's duration. Fractional populations are truncated.

use std::time::Duration;

use serde::Deserialize;

use crate::errors::{ConfigError, ConfigResult};
use crate::utils::parse_duration;

/// One `(duration, target)` step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RampStage {
    pub duration: Duration,
    pub target: usize,
}

impl RampStage {
    pub fn new(duration: Duration, target: usize) -> Self {
        Self { duration, target }
    }
}

/// Stage as written in YAML: `{ duration: "40m", target: 500 }`
#[derive(Debug, Clone, Deserialize)]
pub struct RampStageYaml {
    pub duration: String,
    pub target: usize,
}

impl TryFrom<&RampStageYaml> for RampStage {
    type Error = ConfigError;

    fn try_from(raw: &RampStageYaml) -> ConfigResult<Self> {
        Ok(Self::new(parse_duration(&raw.duration)?, raw.target))
    }
}

/// Validated, non-empty stage list with a start population
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RampSchedule {
    start: usize,
    stages: Vec<RampStage>,
}

impl RampSchedule {
    /// Fails when `stages` is empty
    pub fn new(start: usize, stages: Vec<RampStage>) -> ConfigResult<Self> {
        if stages.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "stages",
                reason: "at least one ramp stage is required".to_string(),
            });
        }
        Ok(Self { start, stages })
    }

    /// Hold `population` for `duration`
    pub fn constant(population: usize, duration: Duration) -> Self {
        Self {
            start: population,
            stages: vec![RampStage::new(duration, population)],
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn stages(&self) -> &[RampStage] {
        &self.stages
    }

    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|s| s.duration).sum()
    }

    /// Largest population the schedule ever asks for
    pub fn peak(&self) -> usize {
        self.stages
            .iter()
            .map(|s| s.target)
            .fold(self.start, usize::max)
    }

    /// Target population `elapsed` after the scenario started
    ///
    /// Past the last stage the final target is held.
    pub fn population_at(&self, elapsed: Duration) -> usize {
        let mut stage_start = Duration::ZERO;
        let mut previous = self.start;

        for stage in &self.stages {
            let stage_end = stage_start + stage.duration;
            if elapsed < stage_end {
                let progress = (elapsed - stage_start).as_secs_f64() / stage.duration.as_secs_f64();
                let delta = stage.target as f64 - previous as f64;
                return (previous as f64 + delta * progress).max(0.0) as usize;
            }
            stage_start = stage_end;
            previous = stage.target;
        }

        previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_interpolates_within_stage() {
        let schedule = RampSchedule::new(
            0,
            vec![RampStage::new(secs(10), 0), RampStage::new(secs(20), 100)],
        )
        .unwrap();

        assert_eq!(schedule.population_at(secs(0)), 0);
        assert_eq!(schedule.population_at(secs(5)), 0);
        assert_eq!(schedule.population_at(secs(15)), 25);
        assert_eq!(schedule.population_at(secs(20)), 50);
        assert_eq!(schedule.population_at(secs(30)), 100);
        assert_eq!(schedule.total_duration(), secs(30));
    }

    #[test]
    fn test_ramp_down() {
        let schedule = RampSchedule::new(
            10,
            vec![RampStage::new(secs(10), 10), RampStage::new(secs(10), 0)],
        )
        .unwrap();
        assert_eq!(schedule.population_at(secs(5)), 10);
        assert_eq!(schedule.population_at(secs(15)), 5);
        assert_eq!(schedule.population_at(secs(25)), 0);
        assert_eq!(schedule.peak(), 10);
    }

    #[test]
    fn test_start_population_applies_to_first_stage() {
        let schedule = RampSchedule::new(1, vec![RampStage::new(secs(100), 101)]).unwrap();
        assert_eq!(schedule.population_at(secs(0)), 1);
        assert_eq!(schedule.population_at(secs(50)), 51);
    }

    #[test]
    fn test_zero_length_stage_jumps() {
        let schedule = RampSchedule::new(
            0,
            vec![RampStage::new(Duration::ZERO, 40), RampStage::new(secs(10), 40)],
        )
        .unwrap();
        assert_eq!(schedule.population_at(secs(0)), 40);
    }

    #[test]
    fn test_empty_stages_rejected() {
        assert!(RampSchedule::new(0, Vec::new()).is_err());
    }

    #[test]
    fn test_constant() {
        let schedule = RampSchedule::constant(3, secs(60));
        assert_eq!(schedule.population_at(secs(0)), 3);
        assert_eq!(schedule.population_at(secs(59)), 3);
    }

    #[test]
    fn test_stage_from_yaml() {
        let raw = RampStageYaml {
            duration: "40m".to_string(),
            target: 500,
        };
        assert_eq!(RampStage::try_from(&raw).unwrap(), RampStage::new(secs(2400), 500));
    }
}
