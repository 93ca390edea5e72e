//! # lm-chem
//!
//! Cheminformatics boundary for LatMol: the token vocabulary the decoder
//! speaks, SMILES parsing and validation, and the property oracles the
//! scoring strategies consume.
//!
//! The engine only talks to this crate through [`StructureValidator`] and
//! [`MolecularProperties`], so a different toolkit can be plugged in
//! without touching the optimization loop.

pub mod elements;
pub mod properties;
pub mod smiles;
pub mod vocab;

pub use properties::{molecular_weight, qed, synthetic_accessibility, Descriptors};
pub use smiles::{parse, Molecule, SmilesError};
pub use vocab::SmilesVocabulary;

use lm_types::{CandidateStructure, LmResult, OracleError};
use tracing::trace;

/// Structural validity check.
///
/// Implementations return `None` for anything that is not a well-formed
/// structure and never panic on malformed input.
pub trait StructureValidator: Send + Sync {
    fn try_parse(&self, smiles: &str) -> Option<CandidateStructure>;
}

/// The three property functions the scoring oracles are built on.
pub trait MolecularProperties: Send + Sync {
    /// Molecular weight in g/mol.
    fn molecular_weight(&self, structure: &CandidateStructure) -> LmResult<f64>;

    /// Drug-likeness (QED) in [0, 1].
    fn drug_likeness(&self, structure: &CandidateStructure) -> LmResult<f64>;

    /// Synthetic accessibility, 1 (easy) to 10 (hard).
    fn synthetic_accessibility(&self, structure: &CandidateStructure) -> LmResult<f64>;
}

/// Validator backed by the in-tree SMILES parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmilesValidator;

impl StructureValidator for SmilesValidator {
    fn try_parse(&self, smiles: &str) -> Option<CandidateStructure> {
        match smiles::parse(smiles) {
            Ok(mol) => Some(CandidateStructure::new(mol.to_smiles())),
            Err(e) => {
                trace!("rejected {smiles:?}: {e}");
                None
            }
        }
    }
}

/// Property oracles backed by the in-tree SMILES parser and estimators.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmilesProperties;

impl SmilesProperties {
    fn molecule(structure: &CandidateStructure) -> LmResult<Molecule> {
        smiles::parse(structure.smiles()).map_err(|e| {
            OracleError::InvalidStructure {
                smiles: structure.smiles().to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }

    fn finite(property: &str, structure: &CandidateStructure, value: f64) -> LmResult<f64> {
        if value.is_finite() {
            Ok(value)
        } else {
            Err(OracleError::NonFinite {
                property: property.to_string(),
                smiles: structure.smiles().to_string(),
            }
            .into())
        }
    }
}

impl MolecularProperties for SmilesProperties {
    fn molecular_weight(&self, structure: &CandidateStructure) -> LmResult<f64> {
        let mol = Self::molecule(structure)?;
        Self::finite("molecular_weight", structure, properties::molecular_weight(&mol))
    }

    fn drug_likeness(&self, structure: &CandidateStructure) -> LmResult<f64> {
        let mol = Self::molecule(structure)?;
        Self::finite("qed", structure, properties::qed(&mol))
    }

    fn synthetic_accessibility(&self, structure: &CandidateStructure) -> LmResult<f64> {
        let mol = Self::molecule(structure)?;
        Self::finite(
            "synthetic_accessibility",
            structure,
            properties::synthetic_accessibility(&mol),
        )
    }
}
