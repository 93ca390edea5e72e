use serde::{Deserialize, Serialize};

use crate::errors::ShapeError;

/// Dimensionality of the pretrained model's latent space.
pub const LATENT_DIM: usize = 256;

/// A point in the generative model's latent space.
///
/// Coordinates are finite and fixed once constructed; the optimizer creates a
/// fresh vector for every proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct LatentVector {
    coords: Vec<f64>,
}

impl LatentVector {
    /// Build a latent vector, rejecting NaN and infinite coordinates.
    pub fn new(coords: Vec<f64>) -> Result<Self, ShapeError> {
        if let Some(index) = coords.iter().position(|c| !c.is_finite()) {
            return Err(ShapeError::NonFinite { index });
        }
        Ok(Self { coords })
    }

    /// Build a latent vector that must have exactly `expected` coordinates.
    pub fn with_dim(coords: Vec<f64>, expected: usize) -> Result<Self, ShapeError> {
        let vector = Self::new(coords)?;
        vector.ensure_dim(expected)?;
        Ok(vector)
    }

    pub fn zeros(dim: usize) -> Self {
        Self {
            coords: vec![0.0; dim],
        }
    }

    pub fn dim(&self) -> usize {
        self.coords.len()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.coords
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.coords
    }

    pub fn ensure_dim(&self, expected: usize) -> Result<(), ShapeError> {
        if self.coords.len() != expected {
            return Err(ShapeError::DimensionMismatch {
                expected,
                actual: self.coords.len(),
            });
        }
        Ok(())
    }

    /// Euclidean distance squared to another point of the same dimension.
    pub fn distance_squared(&self, other: &LatentVector) -> f64 {
        self.coords
            .iter()
            .zip(&other.coords)
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }
}

impl TryFrom<Vec<f64>> for LatentVector {
    type Error = ShapeError;

    fn try_from(coords: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(coords)
    }
}

impl From<LatentVector> for Vec<f64> {
    fn from(vector: LatentVector) -> Self {
        vector.coords
    }
}

impl AsRef<[f64]> for LatentVector {
    fn as_ref(&self) -> &[f64] {
        &self.coords
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_finite_coordinates() {
        let err = LatentVector::new(vec![0.0, f64::NAN, 1.0]).unwrap_err();
        assert_eq!(err, ShapeError::NonFinite { index: 1 });

        let err = LatentVector::new(vec![f64::INFINITY]).unwrap_err();
        assert_eq!(err, ShapeError::NonFinite { index: 0 });
    }

    #[test]
    fn enforces_expected_dimension() {
        let err = LatentVector::with_dim(vec![0.0; 10], LATENT_DIM).unwrap_err();
        assert_eq!(
            err,
            ShapeError::DimensionMismatch {
                expected: LATENT_DIM,
                actual: 10
            }
        );

        let ok = LatentVector::with_dim(vec![0.5; LATENT_DIM], LATENT_DIM).unwrap();
        assert_eq!(ok.dim(), LATENT_DIM);
    }

    #[test]
    fn deserialization_validates_coordinates() {
        let v: LatentVector = serde_json::from_str("[1.0, -2.5]").unwrap();
        assert_eq!(v.as_slice(), &[1.0, -2.5]);
        assert_eq!(serde_json::to_string(&v).unwrap(), "[1.0,-2.5]");
    }

    #[test]
    fn distance_between_points() {
        let a = LatentVector::new(vec![0.0, 0.0]).unwrap();
        let b = LatentVector::new(vec![3.0, 4.0]).unwrap();
        assert_eq!(a.distance_squared(&b), 25.0);
        assert_eq!(LatentVector::zeros(2), a);
    }
}
