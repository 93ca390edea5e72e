use serde::{Deserialize, Serialize};

/// Raw token indices produced by one decoder sample.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenSequence(pub Vec<u32>);

impl TokenSequence {
    pub fn new(tokens: Vec<u32>) -> Self {
        Self(tokens)
    }

    pub fn tokens(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u32>> for TokenSequence {
    fn from(tokens: Vec<u32>) -> Self {
        Self(tokens)
    }
}

/// Canonical SMILES of a candidate that passed structural validation.
///
/// Only a validator constructs these; holding one means the string parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateStructure {
    smiles: String,
}

impl CandidateStructure {
    pub fn new(smiles: impl Into<String>) -> Self {
        Self {
            smiles: smiles.into(),
        }
    }

    pub fn smiles(&self) -> &str {
        &self.smiles
    }
}

impl std::fmt::Display for CandidateStructure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.smiles)
    }
}

/// The valid structures of one decode attempt, in decoder order.
///
/// There is always at least one entry; `first` is the structure the scoring
/// oracles look at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidStructures {
    first: CandidateStructure,
    rest: Vec<CandidateStructure>,
}

impl ValidStructures {
    pub fn single(structure: CandidateStructure) -> Self {
        Self {
            first: structure,
            rest: Vec::new(),
        }
    }

    /// Returns `None` when `structures` is empty.
    pub fn from_vec(structures: Vec<CandidateStructure>) -> Option<Self> {
        let mut iter = structures.into_iter();
        let first = iter.next()?;
        Some(Self {
            first,
            rest: iter.collect(),
        })
    }

    pub fn first(&self) -> &CandidateStructure {
        &self.first
    }

    pub fn len(&self) -> usize {
        1 + self.rest.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> impl Iterator<Item = &CandidateStructure> {
        std::iter::once(&self.first).chain(self.rest.iter())
    }

    pub fn into_vec(self) -> Vec<CandidateStructure> {
        let mut out = Vec::with_capacity(1 + self.rest.len());
        out.push(self.first);
        out.extend(self.rest);
        out
    }
}
