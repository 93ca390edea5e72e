//! Token sequences to validated candidate structures.

use tracing::trace;

use lm_chem::{SmilesValidator, SmilesVocabulary, StructureValidator};
use lm_types::{CandidateStructure, TokenSequence};

/// Detokenizes decoder output and keeps it only if it passes validation.
pub struct StructureMaterializer {
    vocabulary: SmilesVocabulary,
    validator: Box<dyn StructureValidator>,
}

impl StructureMaterializer {
    pub fn new(vocabulary: SmilesVocabulary, validator: Box<dyn StructureValidator>) -> Self {
        Self {
            vocabulary,
            validator,
        }
    }

    pub fn vocabulary(&self) -> &SmilesVocabulary {
        &self.vocabulary
    }

    /// `None` when the sequence holds an out-of-vocabulary index or the
    /// resulting string is not a valid structure.
    pub fn materialize(&self, sequence: &TokenSequence) -> Option<CandidateStructure> {
        let Some(smiles) = self.vocabulary.detokenize(sequence) else {
            trace!("sequence of {} tokens is not decodable", sequence.len());
            return None;
        };
        self.validator.try_parse(&smiles)
    }
}

impl Default for StructureMaterializer {
    fn default() -> Self {
        Self::new(SmilesVocabulary::default(), Box::new(SmilesValidator))
    }
}

impl std::fmt::Debug for StructureMaterializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructureMaterializer")
            .field("vocabulary_len", &self.vocabulary.len())
            .finish()
    }
}
