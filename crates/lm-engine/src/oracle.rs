//! Scoring oracles: valid structures to a scalar to minimize.

use lm_chem::MolecularProperties;
use lm_types::{config_error, LmResult, ObjectiveSpec, ValidStructures};

/// Maps a non-empty set of valid structures to a score. Lower is better.
///
/// Every oracle looks only at the first structure of the set.
pub trait ScoringOracle {
    fn score(&self, structures: &ValidStructures) -> LmResult<f64>;

    fn name(&self) -> &str;
}

/// Absolute distance between molecular weight and a target weight.
pub struct MolecularWeightDistance<'a> {
    target: f64,
    properties: &'a dyn MolecularProperties,
}

impl<'a> MolecularWeightDistance<'a> {
    pub fn new(target: f64, properties: &'a dyn MolecularProperties) -> LmResult<Self> {
        if !target.is_finite() {
            return Err(config_error!(
                "molecular weight target must be finite, got {target}"
            ));
        }
        Ok(Self { target, properties })
    }

    pub fn target(&self) -> f64 {
        self.target
    }
}

impl ScoringOracle for MolecularWeightDistance<'_> {
    fn score(&self, structures: &ValidStructures) -> LmResult<f64> {
        let weight = self.properties.molecular_weight(structures.first())?;
        Ok((self.target - weight).abs())
    }

    fn name(&self) -> &str {
        "molecular_weight_distance"
    }
}

/// `1 - QED`, so perfectly drug-like structures score zero.
pub struct DrugLikenessDeficit<'a> {
    properties: &'a dyn MolecularProperties,
}

impl<'a> DrugLikenessDeficit<'a> {
    pub fn new(properties: &'a dyn MolecularProperties) -> Self {
        Self { properties }
    }
}

impl ScoringOracle for DrugLikenessDeficit<'_> {
    fn score(&self, structures: &ValidStructures) -> LmResult<f64> {
        Ok(1.0 - self.properties.drug_likeness(structures.first())?)
    }

    fn name(&self) -> &str {
        "drug_likeness_deficit"
    }
}

/// The synthetic accessibility score itself.
pub struct SyntheticAccessibility<'a> {
    properties: &'a dyn MolecularProperties,
}

impl<'a> SyntheticAccessibility<'a> {
    pub fn new(properties: &'a dyn MolecularProperties) -> Self {
        Self { properties }
    }
}

impl ScoringOracle for SyntheticAccessibility<'_> {
    fn score(&self, structures: &ValidStructures) -> LmResult<f64> {
        self.properties.synthetic_accessibility(structures.first())
    }

    fn name(&self) -> &str {
        "synthetic_accessibility"
    }
}

/// The oracle for a resolved objective.
pub fn for_spec<'a>(
    spec: ObjectiveSpec,
    properties: &'a dyn MolecularProperties,
) -> LmResult<Box<dyn ScoringOracle + 'a>> {
    Ok(match spec {
        ObjectiveSpec::MolecularWeight { target } => {
            Box::new(MolecularWeightDistance::new(target, properties)?)
        }
        ObjectiveSpec::DrugLikeness => Box::new(DrugLikenessDeficit::new(properties)),
        ObjectiveSpec::SyntheticAccessibility => Box::new(SyntheticAccessibility::new(properties)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lm_chem::SmilesProperties;
    use lm_types::{CandidateStructure, LmError, OracleError};

    /// Returns fixed values keyed by SMILES.
    struct FixedProperties;

    impl MolecularProperties for FixedProperties {
        fn molecular_weight(&self, structure: &CandidateStructure) -> LmResult<f64> {
            match structure.smiles() {
                "A" => Ok(180.0),
                "B" => Ok(90.0),
                other => Err(OracleError::InvalidStructure {
                    smiles: other.to_string(),
                    message: "unknown".into(),
                }
                .into()),
            }
        }

        fn drug_likeness(&self, _structure: &CandidateStructure) -> LmResult<f64> {
            Ok(0.73)
        }

        fn synthetic_accessibility(&self, _structure: &CandidateStructure) -> LmResult<f64> {
            Ok(2.5)
        }
    }

    /// Reports the same drug-likeness for every structure.
    struct FixedQed(f64);

    impl MolecularProperties for FixedQed {
        fn molecular_weight(&self, _structure: &CandidateStructure) -> LmResult<f64> {
            Ok(100.0)
        }

        fn drug_likeness(&self, _structure: &CandidateStructure) -> LmResult<f64> {
            Ok(self.0)
        }

        fn synthetic_accessibility(&self, _structure: &CandidateStructure) -> LmResult<f64> {
            Ok(1.0)
        }
    }

    fn structures(smiles: &[&str]) -> ValidStructures {
        ValidStructures::from_vec(smiles.iter().map(|s| CandidateStructure::new(*s)).collect()).unwrap()
    }

    #[test]
    fn weight_distance_is_absolute() {
        let oracle = MolecularWeightDistance::new(150.0, &FixedProperties).unwrap();
        assert_eq!(oracle.score(&structures(&["A"])).unwrap(), 30.0);
        assert_eq!(oracle.score(&structures(&["B"])).unwrap(), 60.0);
    }

    #[test]
    fn only_the_first_structure_is_scored() {
        let oracle = MolecularWeightDistance::new(150.0, &FixedProperties).unwrap();
        assert_eq!(oracle.score(&structures(&["A", "B"])).unwrap(), 30.0);
        assert_eq!(oracle.score(&structures(&["B", "A"])).unwrap(), 60.0);
    }

    #[test]
    fn weight_target_must_be_finite() {
        for bad in [f64::NAN, f64::INFINITY] {
            let err = MolecularWeightDistance::new(bad, &FixedProperties).err().unwrap();
            assert!(err.is_config());
        }
    }

    #[test]
    fn property_errors_propagate() {
        let oracle = MolecularWeightDistance::new(150.0, &FixedProperties).unwrap();
        let err = oracle.score(&structures(&["Z"])).unwrap_err();
        assert!(matches!(err, LmError::Oracle(OracleError::InvalidStructure { .. })));
    }

    #[test]
    fn drug_likeness_deficit() {
        let oracle = DrugLikenessDeficit::new(&FixedProperties);
        assert!((oracle.score(&structures(&["A"])).unwrap() - 0.27).abs() < 1e-12);
    }

    #[test]
    fn drug_likeness_deficit_endpoints() {
        let s = structures(&["A"]);
        let worst = FixedQed(0.0);
        assert_eq!(DrugLikenessDeficit::new(&worst).score(&s).unwrap(), 1.0);
        let best = FixedQed(1.0);
        assert_eq!(DrugLikenessDeficit::new(&best).score(&s).unwrap(), 0.0);
        for qed in [0.0, 0.25, 0.5, 0.999, 1.0] {
            let props = FixedQed(qed);
            let score = DrugLikenessDeficit::new(&props).score(&s).unwrap();
            assert!((0.0..=1.0).contains(&score), "qed {qed}: {score}");
        }
    }

    #[test]
    fn real_deficit_is_in_unit_interval() {
        let props = SmilesProperties;
        let oracle = DrugLikenessDeficit::new(&props);
        for smiles in ["CCO", "CC(=O)Nc1ccc(O)cc1", "C", "CCCCCCCCCCCCCCCCCCCC"] {
            let s = structures(&[smiles]);
            let score = oracle.score(&s).unwrap();
            assert!((0.0..=1.0).contains(&score), "{smiles}: {score}");
        }
        let sa = SyntheticAccessibility::new(&props);
        let score = sa.score(&structures(&["CCO"])).unwrap();
        assert!((1.0..=10.0).contains(&score));
    }

    #[test]
    fn factory_selects_by_objective() {
        let props = FixedProperties;
        let s = structures(&["A"]);
        let mw = for_spec(ObjectiveSpec::MolecularWeight { target: 200.0 }, &props).unwrap();
        assert_eq!(mw.name(), "molecular_weight_distance");
        assert_eq!(mw.score(&s).unwrap(), 20.0);
        let sa = for_spec(ObjectiveSpec::SyntheticAccessibility, &props).unwrap();
        assert_eq!(sa.score(&s).unwrap(), 2.5);
        let qed = for_spec(ObjectiveSpec::DrugLikeness, &props).unwrap();
        assert_eq!(qed.name(), "drug_likeness_deficit");
        assert!(for_spec(ObjectiveSpec::MolecularWeight { target: f64::NAN }, &props).is_err());
    }
}
