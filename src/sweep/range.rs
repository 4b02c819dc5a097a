use serde::{Deserialize, Serialize};

use super::SweepError;

/// Swept values are rounded to 1e-9 so that `0.1 * 3` prints as `0.3`
const GRID_INV: f64 = 1e9;
const GRID: f64 = 1.0 / GRID_INV;

/// Upper bound on the points one range may expand to
pub const MAX_POINTS: usize = 100_000;

/// Values taken by one swept parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepRange {
    /// `start..=stop` in increments of `step`; `stop` is included when it lies
    /// on the step grid
    Stepped { start: f64, stop: f64, step: f64 },
    /// Explicit list, taken in the given order
    Values(Vec<f64>),
}

impl SweepRange {
    pub fn stepped(start: f64, stop: f64, step: f64) -> Self {
        SweepRange::Stepped { start, stop, step }
    }

    pub fn values(values: impl Into<Vec<f64>>) -> Self {
        SweepRange::Values(values.into())
    }

    /// `points` evenly spaced values from `start` to `stop`, both included
    pub fn linspace(start: f64, stop: f64, points: usize) -> Self {
        let values = match points {
            0 => Vec::new(),
            1 => vec![start],
            _ => {
                let step = (stop - start) / (points - 1) as f64;
                (0..points)
                    .map(|i| snap(start + i as f64 * step))
                    .collect()
            }
        };
        SweepRange::Values(values)
    }

    pub fn points(&self) -> Result<Vec<f64>, SweepError> {
        match self {
            SweepRange::Stepped { start, stop, step } => {
                let (start, stop, step) = (*start, *stop, *step);
                if !(start.is_finite() && stop.is_finite() && step.is_finite()) {
                    return Err(SweepError::InvalidRange(format!(
                        "non-finite bounds {start}..={stop} step {step}"
                    )));
                }
                if step <= 0.0 {
                    return Err(SweepError::InvalidRange(format!(
                        "step must be positive, got {step}"
                    )));
                }
                if stop < start {
                    return Err(SweepError::InvalidRange(format!(
                        "stop {stop} is below start {start}"
                    )));
                }
                let intervals = ((stop - start) / step + GRID).floor();
                if intervals >= MAX_POINTS as f64 {
                    return Err(SweepError::InvalidRange(format!(
                        "{start}..={stop} step {step} exceeds {MAX_POINTS} points"
                    )));
                }
                let count = intervals as usize;
                Ok((0..=count).map(|i| snap(start + i as f64 * step)).collect())
            }
            SweepRange::Values(values) => {
                if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
                    return Err(SweepError::InvalidRange(format!("non-finite value {bad}")));
                }
                if values.is_empty() {
                    return Err(SweepError::InvalidRange("empty value list".to_string()));
                }
                Ok(values.clone())
            }
        }
    }
}

fn snap(value: f64) -> f64 {
    (value * GRID_INV).round() / GRID_INV
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[test]
    fn test_stop_included() {
        assert_eq!(
            SweepRange::stepped(0.0, 1.0, 0.5).points().unwrap(),
            vec![0.0, 0.5, 1.0]
        );
    }

    #[test]
    fn test_float_steps_land_on_grid() {
        let points = SweepRange::stepped(0.0, 2.6, 0.05).points().unwrap();
        assert_eq!(points.len(), 53);
        assert_eq!(points[6], 0.3);
        assert_eq!(*points.last().unwrap(), 2.6);
    }

    #[test]
    fn test_stop_off_grid_is_excluded() {
        assert_eq!(
            SweepRange::stepped(0.0, 1.0, 0.4).points().unwrap(),
            vec![0.0, 0.4, 0.8]
        );
    }

    #[test]
    fn test_fine_range_below_cap() {
        let points = SweepRange::stepped(0.0, 1.0, 1e-4).points().unwrap();
        assert!(points.len() >= 10_000 && points.len() < MAX_POINTS);
    }

    #[test]
    fn test_linspace() {
        let points = SweepRange::linspace(0.12, 1.0, 20).points().unwrap();
        assert_eq!(points.len(), 20);
        assert_eq!(points[0], 0.12);
        assert!((points[19] - 1.0).abs() < 1e-9);
    }

    #[rstest]
    #[case(SweepRange::stepped(0.0, 1.0, 0.0))]
    #[case(SweepRange::stepped(0.0, 1.0, -0.1))]
    #[case(SweepRange::stepped(1.0, 0.0, 0.1))]
    #[case(SweepRange::stepped(0.0, f64::INFINITY, 0.1))]
    #[case(SweepRange::stepped(0.0, 1.0, 1e-300))]
    #[case(SweepRange::stepped(0.0, 1.0, 1e-6))]
    #[case(SweepRange::values(Vec::new()))]
    #[case(SweepRange::values(vec![0.1, f64::NAN]))]
    fn test_invalid_ranges(#[case] range: SweepRange) {
        assert!(matches!(range.points(), Err(SweepError::InvalidRange(_))));
    }

    proptest! {
        #[test]
        fn stepped_points_are_ascending_and_bounded(
            start in -10.0f64..10.0,
            span in 0.0f64..10.0,
            step in 0.01f64..2.0,
        ) {
            let stop = start + span;
            let points = SweepRange::stepped(start, stop, step).points().unwrap();
            prop_assert!(!points.is_empty());
            prop_assert!((points[0] - start).abs() < 1e-8);
            prop_assert!(points.windows(2).all(|w| w[0] < w[1]));
            prop_assert!(*points.last().unwrap() <= stop + 1e-8);
            prop_assert!(*points.last().unwrap() + step > stop - 1e-8);
        }
    }
}
