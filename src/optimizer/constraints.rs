use std::collections::BTreeMap;
use std::fmt;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// Constraint families of the dispatch model family, used as dual lookup keys
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConstraintFamily {
    /// `x[h] <= pv[h]`
    PvCap,
    /// `x[h] - z[h] >= 0`
    NoNetExport,
    /// `sum(x + y - z) >= D`
    DailyDemand,
    /// `served[h] = x[h] + y[h] + d[h] - z[h] - c[h]`
    Balance,
    /// `u[h] >= served[h] - ref[h] - tol[h]`
    DeviationUp,
    /// `u[h] >= ref[h] - served[h] - tol[h]`
    DeviationDown,
    ChargeCap,
    DischargeCap,
    SocCap,
    SocInit,
    /// `soc[h] = soc[h-1] + eta_c c[h] - d[h] / eta_d` for `h > 0`
    SocDynamics,
    SocFinal,
    /// `h * active[h] <= T_max`
    LifetimeCutoff,
    /// `c[h] + d[h] <= M * active[h]`
    LifetimeThroughput,
}

impl ConstraintFamily {
    /// Whether the family has one constraint per hour rather than a single one
    pub fn is_hourly(self) -> bool {
        !matches!(
            self,
            ConstraintFamily::DailyDemand | ConstraintFamily::SocInit | ConstraintFamily::SocFinal
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConstraintKey {
    pub family: ConstraintFamily,
    pub hour: Option<usize>,
}

impl ConstraintKey {
    pub fn hourly(family: ConstraintFamily, hour: usize) -> Self {
        Self {
            family,
            hour: Some(hour),
        }
    }

    pub fn single(family: ConstraintFamily) -> Self {
        Self { family, hour: None }
    }
}

impl fmt::Display for ConstraintKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.hour {
            Some(hour) => write!(f, "{}[{}]", self.family, hour),
            None => write!(f, "{}", self.family),
        }
    }
}

/// Duals of one constraint family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FamilyDuals {
    Single(f64),
    Hourly(BTreeMap<usize, f64>),
}

impl FamilyDuals {
    pub fn values(&self) -> Vec<f64> {
        match self {
            FamilyDuals::Single(value) => vec![*value],
            FamilyDuals::Hourly(by_hour) => by_hour.values().copied().collect(),
        }
    }
}

/// Shadow prices keyed by constraint family.
///
/// Convention: rate of change of the optimal objective per unit relaxation of
/// the constraint (raising the rhs of `<=` and `==`, lowering the rhs of `>=`).
/// At degenerate optima the values are solver-dependent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShadowPrices(BTreeMap<ConstraintFamily, FamilyDuals>);

impl ShadowPrices {
    pub fn from_keyed(duals: impl IntoIterator<Item = (ConstraintKey, f64)>) -> Self {
        let mut families = BTreeMap::new();
        for (key, value) in duals {
            match key.hour {
                Some(hour) if key.family.is_hourly() => {
                    let entry = families
                        .entry(key.family)
                        .or_insert_with(|| FamilyDuals::Hourly(BTreeMap::new()));
                    if let FamilyDuals::Hourly(by_hour) = entry {
                        by_hour.insert(hour, value);
                    }
                }
                _ => {
                    families.insert(key.family, FamilyDuals::Single(value));
                }
            }
        }
        Self(families)
    }

    pub fn get(&self, family: ConstraintFamily) -> Option<&FamilyDuals> {
        self.0.get(&family)
    }

    pub fn contains(&self, family: ConstraintFamily) -> bool {
        self.0.contains_key(&family)
    }

    pub fn families(&self) -> impl Iterator<Item = ConstraintFamily> + '_ {
        self.0.keys().copied()
    }

    pub fn single(&self, family: ConstraintFamily) -> Option<f64> {
        match self.get(family)? {
            FamilyDuals::Single(value) => Some(*value),
            FamilyDuals::Hourly(_) => None,
        }
    }

    pub fn hourly(&self, family: ConstraintFamily) -> Option<&BTreeMap<usize, f64>> {
        match self.get(family)? {
            FamilyDuals::Hourly(by_hour) => Some(by_hour),
            FamilyDuals::Single(_) => None,
        }
    }

    pub fn at(&self, family: ConstraintFamily, hour: usize) -> Option<f64> {
        self.hourly(family)?.get(&hour).copied()
    }

    pub fn max(&self, family: ConstraintFamily) -> Option<f64> {
        self.get(family)?
            .values()
            .into_iter()
            .map(OrderedFloat)
            .max()
            .map(OrderedFloat::into_inner)
    }

    pub fn mean(&self, family: ConstraintFamily) -> Option<f64> {
        let values = self.get(family)?.values();
        if values.is_empty() {
            return None;
        }
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }

    /// Sum of the family's duals, the value of relaxing every member at once
    pub fn total(&self, family: ConstraintFamily) -> Option<f64> {
        Some(self.get(family)?.values().iter().sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_single_families() {
        let singles: Vec<_> = ConstraintFamily::iter().filter(|f| !f.is_hourly()).collect();
        assert_eq!(
            singles,
            vec![
                ConstraintFamily::DailyDemand,
                ConstraintFamily::SocInit,
                ConstraintFamily::SocFinal
            ]
        );
    }

    #[test]
    fn test_key_display() {
        assert_eq!(
            ConstraintKey::hourly(ConstraintFamily::PvCap, 3).to_string(),
            "pv_cap[3]"
        );
        assert_eq!(
            ConstraintKey::single(ConstraintFamily::DailyDemand).to_string(),
            "daily_demand"
        );
    }

    #[test]
    fn test_grouping_and_aggregates() {
        let prices = ShadowPrices::from_keyed([
            (ConstraintKey::hourly(ConstraintFamily::Balance, 0), 1.0),
            (ConstraintKey::hourly(ConstraintFamily::Balance, 1), 3.0),
            (ConstraintKey::single(ConstraintFamily::SocFinal), -0.5),
        ]);

        assert_eq!(prices.at(ConstraintFamily::Balance, 1), Some(3.0));
        assert_eq!(prices.max(ConstraintFamily::Balance), Some(3.0));
        assert_eq!(prices.mean(ConstraintFamily::Balance), Some(2.0));
        assert_eq!(prices.single(ConstraintFamily::SocFinal), Some(-0.5));
        assert_eq!(prices.single(ConstraintFamily::Balance), None);
        assert!(!prices.contains(ConstraintFamily::PvCap));
    }

    #[test]
    fn test_serializes_by_family_name() {
        let prices = ShadowPrices::from_keyed([
            (ConstraintKey::single(ConstraintFamily::DailyDemand), 0.9),
            (ConstraintKey::hourly(ConstraintFamily::PvCap, 2), 0.9),
        ]);
        let json = serde_json::to_value(&prices).unwrap();
        assert_eq!(json["daily_demand"], 0.9);
        assert_eq!(json["pv_cap"]["2"], 0.9);
    }
}
