//! Decoder boundary and a seeded library-backed stand-in model.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use lm_chem::SmilesVocabulary;
use lm_types::{config_error, LatentVector, LmResult, TokenSequence, LATENT_DIM};

/// A generative model that maps a latent vector to token sequences.
///
/// Decoding may be stochastic, so repeated calls at the same vector can
/// return different sequences.
pub trait Decoder: Send {
    fn decode(&mut self, latent: &LatentVector) -> LmResult<Vec<TokenSequence>>;
}

impl<D: Decoder + ?Sized> Decoder for Box<D> {
    fn decode(&mut self, latent: &LatentVector) -> LmResult<Vec<TokenSequence>> {
        (**self).decode(latent)
    }
}

/// Reference structures the library decoder samples from.
pub const REFERENCE_LIBRARY: &[&str] = &[
    "CCO",
    "c1ccccc1",
    "C1CCCCC1",
    "OCC(O)CO",
    "CCN(CC)CC",
    "Clc1ccccc1",
    "CC(=O)OCC",
    "NC(=O)c1cccnc1",
    "CC(N)Cc1ccccc1",
    "NCCc1ccc(O)c(O)c1",
    "CC(=O)Nc1ccc(O)cc1",
    "OC(=O)c1ccccc1O",
    "CC(=O)Oc1ccccc1C(=O)O",
    "CC(C)Cc1ccc(cc1)C(C)C(=O)O",
    "CN(C)C(=N)N=C(N)N",
    "OC(=O)CC(O)(CC(=O)O)C(=O)O",
    "CN1C=NC2=C1C(=O)N(C(=O)N2C)C",
    "CN1CCC[C@H]1c1cccnc1",
    "CC(C)NCC(O)COc1cccc2ccccc12",
    "O=C1NC(=O)C(N1)(c1ccccc1)c1ccccc1",
    "COc1ccc2[nH]cc(CCN(C)C)c2c1",
    "CC12CCC3C(CCC4=CC(=O)CCC34C)C1CCC2O",
];

/// Settings for [`LibraryDecoder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryDecoderConfig {
    pub latent_dim: usize,
    /// Sequences returned per decode call.
    pub batch_size: usize,
    /// Probability that each body token is replaced with a random token.
    pub corruption_rate: f64,
    /// Softmax temperature over per-dimension squared distances to anchors.
    pub temperature: f64,
    pub seed: u64,
}

impl Default for LibraryDecoderConfig {
    fn default() -> Self {
        Self {
            latent_dim: LATENT_DIM,
            batch_size: 4,
            corruption_rate: 0.05,
            temperature: 0.5,
            seed: 42,
        }
    }
}

impl LibraryDecoderConfig {
    pub fn with_latent_dim(mut self, dim: usize) -> Self {
        self.latent_dim = dim;
        self
    }

    pub fn with_batch_size(mut self, n: usize) -> Self {
        self.batch_size = n;
        self
    }

    pub fn with_corruption_rate(mut self, rate: f64) -> Self {
        self.corruption_rate = rate;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> LmResult<()> {
        if self.latent_dim == 0 {
            return Err(config_error!("decoder latent_dim must be positive"));
        }
        if self.batch_size == 0 {
            return Err(config_error!("decoder batch_size must be positive"));
        }
        if !(0.0..=1.0).contains(&self.corruption_rate) {
            return Err(config_error!(
                "decoder corruption_rate must be in [0, 1], got {}",
                self.corruption_rate
            ));
        }
        if !(self.temperature.is_finite() && self.temperature > 0.0) {
            return Err(config_error!(
                "decoder temperature must be positive, got {}",
                self.temperature
            ));
        }
        Ok(())
    }
}

/// Stand-in generative model.
///
/// Every library entry owns a random anchor in latent space. Decoding picks
/// entries with probability decaying in the squared distance between the
/// latent vector and each anchor, then corrupts tokens at
/// `corruption_rate`, so some sequences fail validation.
#[derive(Debug, Clone)]
pub struct LibraryDecoder {
    config: LibraryDecoderConfig,
    vocabulary: SmilesVocabulary,
    entries: Vec<TokenSequence>,
    anchors: Vec<LatentVector>,
    rng: ChaCha8Rng,
}

impl LibraryDecoder {
    pub fn new(config: LibraryDecoderConfig) -> LmResult<Self> {
        Self::with_library(config, SmilesVocabulary::default(), REFERENCE_LIBRARY)
    }

    pub fn with_library(
        config: LibraryDecoderConfig,
        vocabulary: SmilesVocabulary,
        library: &[&str],
    ) -> LmResult<Self> {
        config.validate()?;
        if library.is_empty() {
            return Err(config_error!("decoder library is empty"));
        }
        let entries = library
            .iter()
            .map(|smiles| vocabulary.tokenize(smiles))
            .collect::<LmResult<Vec<_>>>()?;

        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let anchors = (0..entries.len())
            .map(|_| {
                let coords = (0..config.latent_dim)
                    .map(|_| rng.gen_range(-3.0..3.0))
                    .collect();
                LatentVector::new(coords)
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            "library decoder ready: {} entries, {} dimensions",
            entries.len(),
            config.latent_dim
        );
        Ok(Self {
            config,
            vocabulary,
            entries,
            anchors,
            rng,
        })
    }

    pub fn config(&self) -> &LibraryDecoderConfig {
        &self.config
    }

    pub fn vocabulary(&self) -> &SmilesVocabulary {
        &self.vocabulary
    }

    pub fn library_len(&self) -> usize {
        self.entries.len()
    }

    /// Sampling weights for each library entry, summing to one.
    fn weights(&self, latent: &LatentVector) -> Vec<f64> {
        let dim = latent.dim().max(1) as f64;
        let scaled: Vec<f64> = self
            .anchors
            .iter()
            .map(|anchor| latent.distance_squared(anchor) / dim)
            .collect();
        let nearest = scaled.iter().copied().fold(f64::INFINITY, f64::min);
        let raw: Vec<f64> = scaled
            .iter()
            .map(|d| (-(d - nearest) / self.config.temperature).exp())
            .collect();
        let total: f64 = raw.iter().sum();
        raw.into_iter().map(|w| w / total).collect()
    }

    fn pick(&mut self, weights: &[f64]) -> usize {
        let mut u: f64 = self.rng.gen();
        for (i, w) in weights.iter().enumerate() {
            if u < *w {
                return i;
            }
            u -= w;
        }
        weights.len() - 1
    }

    fn corrupt(&mut self, sequence: &TokenSequence) -> TokenSequence {
        let start = self.vocabulary.start_index();
        let stop = self.vocabulary.stop_index();
        let first_plain = stop.max(start).max(self.vocabulary.pad_index()) + 1;
        let vocab_len = self.vocabulary.len() as u32;
        sequence
            .tokens()
            .iter()
            .map(|&token| {
                let special = token == start || token == stop;
                if !special && self.rng.gen_bool(self.config.corruption_rate) {
                    self.rng.gen_range(first_plain..vocab_len)
                } else {
                    token
                }
            })
            .collect::<Vec<_>>()
            .into()
    }
}

impl Decoder for LibraryDecoder {
    fn decode(&mut self, latent: &LatentVector) -> LmResult<Vec<TokenSequence>> {
        latent.ensure_dim(self.config.latent_dim)?;
        let weights = self.weights(latent);
        let batch = (0..self.config.batch_size)
            .map(|_| {
                let entry = self.pick(&weights);
                let sequence = self.entries[entry].clone();
                self.corrupt(&sequence)
            })
            .collect();
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lm_chem::{SmilesValidator, StructureValidator};

    fn small_config() -> LibraryDecoderConfig {
        LibraryDecoderConfig::default().with_latent_dim(8)
    }

    #[test]
    fn reference_library_is_valid_and_tokenizable() {
        let vocab = SmilesVocabulary::default();
        for smiles in REFERENCE_LIBRARY {
            assert!(SmilesValidator.try_parse(smiles).is_some(), "invalid {smiles}");
            let tokens = vocab.tokenize(smiles).unwrap();
            assert_eq!(vocab.detokenize(&tokens).as_deref(), Some(*smiles));
        }
    }

    #[test]
    fn decodes_a_full_batch() {
        let mut decoder = LibraryDecoder::new(small_config().with_batch_size(6)).unwrap();
        let batch = decoder.decode(&LatentVector::zeros(8)).unwrap();
        assert_eq!(batch.len(), 6);
        assert_eq!(decoder.library_len(), REFERENCE_LIBRARY.len());
    }

    #[test]
    fn uncorrupted_output_matches_the_library() {
        let mut decoder = LibraryDecoder::new(small_config().with_corruption_rate(0.0)).unwrap();
        let vocab = decoder.vocabulary().clone();
        for seq in decoder.decode(&LatentVector::zeros(8)).unwrap() {
            let smiles = vocab.detokenize(&seq).unwrap();
            assert!(REFERENCE_LIBRARY.contains(&smiles.as_str()), "{smiles}");
        }
    }

    #[test]
    fn anchors_attract_their_entry() {
        let mut decoder = LibraryDecoder::new(
            small_config()
                .with_corruption_rate(0.0)
                .with_temperature(0.01)
                .with_batch_size(16),
        )
        .unwrap();
        let anchor = decoder.anchors[3].clone();
        let expected = decoder.entries[3].clone();
        for seq in decoder.decode(&anchor).unwrap() {
            assert_eq!(seq, expected);
        }
    }

    #[test]
    fn full_corruption_changes_body_tokens_only() {
        let mut decoder = LibraryDecoder::new(small_config().with_corruption_rate(1.0)).unwrap();
        let start = decoder.vocabulary().start_index();
        let stop = decoder.vocabulary().stop_index();
        for seq in decoder.decode(&LatentVector::zeros(8)).unwrap() {
            let tokens = seq.tokens();
            assert_eq!(tokens.first(), Some(&start));
            assert_eq!(tokens.last(), Some(&stop));
            assert!(tokens[1..tokens.len() - 1].iter().all(|t| *t > stop));
        }
    }

    #[test]
    fn same_seed_same_output() {
        let z = LatentVector::new(vec![0.5; 8]).unwrap();
        let mut a = LibraryDecoder::new(small_config().with_seed(9)).unwrap();
        let mut b = LibraryDecoder::new(small_config().with_seed(9)).unwrap();
        assert_eq!(a.decode(&z).unwrap(), b.decode(&z).unwrap());
    }

    #[test]
    fn rejects_wrong_dimension_and_bad_config() {
        let mut decoder = LibraryDecoder::new(small_config()).unwrap();
        assert!(decoder.decode(&LatentVector::zeros(3)).is_err());
        assert!(LibraryDecoder::new(small_config().with_batch_size(0)).is_err());
        assert!(LibraryDecoder::new(small_config().with_corruption_rate(1.5)).is_err());
        assert!(LibraryDecoder::new(small_config().with_temperature(0.0)).is_err());
        assert!(
            LibraryDecoder::with_library(small_config(), SmilesVocabulary::default(), &[]).is_err()
        );
    }
}
