//! Token vocabulary shared by the decoder and the structure materializer.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use lm_types::{DecoderError, LmResult, TokenSequence};

pub const PAD_TOKEN: &str = "<PAD>";
pub const START_TOKEN: &str = "<START>";
pub const STOP_TOKEN: &str = "<STOP>";

const DEFAULT_TOKENS: &[&str] = &[
    "C", "c", "N", "n", "O", "o", "S", "s", "P", "p", "F", "Cl", "Br", "I", "B", "b",
    "[nH]", "[NH+]", "[NH2+]", "[NH3+]", "[N+]", "[N-]", "[n+]", "[O-]", "[O+]", "[S+]",
    "[C@@H]", "[C@H]", "[C@@]", "[C@]", "[Si]", "[Se]", "[se]", "[H]", "[2H]", "[Na+]", "[K+]",
    "[Cl-]", "[Br-]", "=", "#", "-", "/", "\\", ":", "(", ")", ".", "1", "2", "3", "4", "5",
    "6", "7", "8", "9", "%10", "%11", "%12",
];

/// An indexed SMILES token table with reserved padding, start and stop tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmilesVocabulary {
    tokens: Vec<String>,
    #[serde(skip)]
    index: HashMap<String, u32>,
    pad_index: u32,
    start_index: u32,
    stop_index: u32,
}

impl SmilesVocabulary {
    /// Build a vocabulary from SMILES tokens; the special tokens are placed
    /// at indices 0, 1 and 2.
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut all: Vec<String> = vec![
            PAD_TOKEN.to_string(),
            START_TOKEN.to_string(),
            STOP_TOKEN.to_string(),
        ];
        for token in tokens {
            let token = token.into();
            if !all.contains(&token) {
                all.push(token);
            }
        }
        let mut vocab = Self {
            tokens: all,
            index: HashMap::new(),
            pad_index: 0,
            start_index: 1,
            stop_index: 2,
        };
        vocab.rebuild_index();
        vocab
    }

    /// Restore the lookup table after deserialization.
    pub fn rebuild_index(&mut self) {
        self.index = self
            .tokens
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i as u32))
            .collect();
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn pad_index(&self) -> u32 {
        self.pad_index
    }

    pub fn start_index(&self) -> u32 {
        self.start_index
    }

    pub fn stop_index(&self) -> u32 {
        self.stop_index
    }

    pub fn token(&self, index: u32) -> Option<&str> {
        self.tokens.get(index as usize).map(String::as_str)
    }

    pub fn index_of(&self, token: &str) -> Option<u32> {
        self.index.get(token).copied()
    }

    fn is_special(&self, index: u32) -> bool {
        index == self.pad_index || index == self.start_index || index == self.stop_index
    }

    /// Tokenize a SMILES string by longest match, wrapped in start and stop
    /// tokens.
    pub fn tokenize(&self, smiles: &str) -> LmResult<TokenSequence> {
        let max_len = self
            .tokens
            .iter()
            .map(|t| t.chars().count())
            .max()
            .unwrap_or(1);
        let chars: Vec<char> = smiles.chars().collect();
        let mut out = vec![self.start_index];
        let mut pos = 0;
        while pos < chars.len() {
            let matched = (1..=max_len.min(chars.len() - pos)).rev().find_map(|len| {
                let candidate: String = chars[pos..pos + len].iter().collect();
                self.index
                    .get(&candidate)
                    .filter(|i| !self.is_special(**i))
                    .map(|i| (*i, len))
            });
            match matched {
                Some((index, len)) => {
                    out.push(index);
                    pos += len;
                }
                None => {
                    return Err(DecoderError::UnknownToken {
                        token: chars[pos].to_string(),
                    }
                    .into())
                }
            }
        }
        out.push(self.stop_index);
        Ok(TokenSequence::new(out))
    }

    /// Convert decoder output back to a SMILES string.
    ///
    /// Leading start tokens and padding are skipped and decoding ends at the
    /// first stop token. Returns `None` for out-of-vocabulary indices or a
    /// start token in the body.
    pub fn detokenize(&self, sequence: &TokenSequence) -> Option<String> {
        let mut out = String::new();
        let mut body_started = false;
        for &index in sequence.tokens() {
            if index == self.stop_index {
                break;
            }
            if index == self.pad_index {
                continue;
            }
            if index == self.start_index {
                if body_started {
                    return None;
                }
                continue;
            }
            body_started = true;
            out.push_str(self.token(index)?);
        }
        Some(out)
    }
}

impl Default for SmilesVocabulary {
    fn default() -> Self {
        Self::new(DEFAULT_TOKENS.iter().copied())
    }
}
