use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::errors::{LmError, LmResult};

/// The chemical property an optimization run minimizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Objective {
    /// Distance between molecular weight and a target weight.
    MolecularWeight,
    /// Deficit from ideal drug-likeness, `1 - QED`.
    DrugLikeness,
    /// Synthetic accessibility score, 1 (easy) to 10 (hard).
    SyntheticAccessibility,
}

impl Objective {
    pub const ALL: [Objective; 3] = [
        Objective::MolecularWeight,
        Objective::DrugLikeness,
        Objective::SyntheticAccessibility,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::MolecularWeight => "MolecularWeight",
            Self::DrugLikeness => "DrugLikeness",
            Self::SyntheticAccessibility => "SyntheticAccessibility",
        }
    }

    pub fn requires_target(&self) -> bool {
        matches!(self, Self::MolecularWeight)
    }
}

impl std::fmt::Display for Objective {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Objective {
    type Err = LmError;

    /// Accepts the full names and the short forms `MW`, `QED` and `SA`,
    /// ignoring case, underscores and hyphens.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "molecularweight" | "mw" => Ok(Self::MolecularWeight),
            "druglikeness" | "qed" => Ok(Self::DrugLikeness),
            "syntheticaccessibility" | "sa" | "sas" => Ok(Self::SyntheticAccessibility),
            _ => Err(LmError::Config(format!("unknown objective: {s:?}"))),
        }
    }
}

/// An objective together with its parameters, validated before a run starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ObjectiveSpec {
    MolecularWeight { target: f64 },
    DrugLikeness,
    SyntheticAccessibility,
}

impl ObjectiveSpec {
    /// Bind `target` to `objective`.
    ///
    /// The target is mandatory and must be finite for molecular weight; it
    /// is ignored for the other objectives.
    pub fn resolve(objective: Objective, target: Option<f64>) -> LmResult<Self> {
        match objective {
            Objective::MolecularWeight => match target {
                Some(t) if t.is_finite() => Ok(Self::MolecularWeight { target: t }),
                Some(t) => Err(LmError::Config(format!(
                    "molecular weight target must be finite, got {t}"
                ))),
                None => Err(LmError::Config(
                    "molecular weight objective requires a target".to_string(),
                )),
            },
            Objective::DrugLikeness => Ok(Self::DrugLikeness),
            Objective::SyntheticAccessibility => Ok(Self::SyntheticAccessibility),
        }
    }

    pub fn objective(&self) -> Objective {
        match self {
            Self::MolecularWeight { .. } => Objective::MolecularWeight,
            Self::DrugLikeness => Objective::DrugLikeness,
            Self::SyntheticAccessibility => Objective::SyntheticAccessibility,
        }
    }

    pub fn target(&self) -> Option<f64> {
        match self {
            Self::MolecularWeight { target } => Some(*target),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_aliases() {
        assert_eq!("MolecularWeight".parse::<Objective>().unwrap(), Objective::MolecularWeight);
        assert_eq!("mw".parse::<Objective>().unwrap(), Objective::MolecularWeight);
        assert_eq!("QED".parse::<Objective>().unwrap(), Objective::DrugLikeness);
        assert_eq!("drug_likeness".parse::<Objective>().unwrap(), Objective::DrugLikeness);
        assert_eq!(
            "synthetic-accessibility".parse::<Objective>().unwrap(),
            Objective::SyntheticAccessibility
        );
        assert_eq!("SA".parse::<Objective>().unwrap(), Objective::SyntheticAccessibility);
    }

    #[test]
    fn display_round_trips_through_parse() {
        for objective in Objective::ALL {
            assert_eq!(objective.to_string().parse::<Objective>().unwrap(), objective);
        }
    }

    #[test]
    fn unknown_name_is_config_error() {
        let err = "LogP".parse::<Objective>().unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("LogP"));
    }

    #[test]
    fn molecular_weight_requires_finite_target() {
        assert!(ObjectiveSpec::resolve(Objective::MolecularWeight, None)
            .unwrap_err()
            .is_config());
        assert!(ObjectiveSpec::resolve(Objective::MolecularWeight, Some(f64::NAN))
            .unwrap_err()
            .is_config());

        let spec = ObjectiveSpec::resolve(Objective::MolecularWeight, Some(300.0)).unwrap();
        assert_eq!(spec.target(), Some(300.0));
        assert_eq!(spec.objective(), Objective::MolecularWeight);
    }

    #[test]
    fn target_is_ignored_for_other_objectives() {
        let spec = ObjectiveSpec::resolve(Objective::DrugLikeness, Some(300.0)).unwrap();
        assert_eq!(spec, ObjectiveSpec::DrugLikeness);
        assert_eq!(spec.target(), None);

        let spec = ObjectiveSpec::resolve(Objective::SyntheticAccessibility, None).unwrap();
        assert_eq!(spec.objective(), Objective::SyntheticAccessibility);
    }
}
