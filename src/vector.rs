use crate::error::{check_len, Result};
use crate::matrix::Mat;

use rand::distributions::Distribution;
use rand::Rng;
use std::iter::FromIterator;
use std::ops::{Index, IndexMut};
use std::slice;

/// A dense vector of fixed dimension.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Vector {
    data: Vec<f64>,
}

impl Vector {
    pub fn zeros(len: usize) -> Self {
        Vector {
            data: vec![0.0; len],
        }
    }

    pub fn random<D, R>(distribution: &D, len: usize, rng: &mut R) -> Self
    where
        D: Distribution<f64>,
        R: Rng + ?Sized,
    {
        (0..len).map(|_| distribution.sample(rng)).collect()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Changes the dimension of the vector. The old contents are discarded
    /// and every element is zero afterwards.
    pub fn resize(&mut self, len: usize) {
        self.data.clear();
        self.data.resize(len, 0.0);
    }

    /// Reads the element at `index mod len`.
    ///
    /// Panics if the vector is empty.
    pub fn at(&self, index: usize) -> f64 {
        assert!(!self.is_empty(), "wrapping index into an empty vector");
        self.data[index % self.data.len()]
    }

    /// Mutable counterpart to [`Vector::at`].
    pub fn at_mut(&mut self, index: usize) -> &mut f64 {
        assert!(!self.is_empty(), "wrapping index into an empty vector");
        let len = self.data.len();
        &mut self.data[index % len]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn iter(&self) -> slice::Iter<'_, f64> {
        self.data.iter()
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    /// Applies `f` to every element, returning the results as a new vector.
    pub fn map<F>(&self, f: F) -> Vector
    where
        F: Fn(f64) -> f64,
    {
        self.data.iter().map(|&x| f(x)).collect()
    }

    /// Elementwise `self + rhs`.
    pub fn try_add(&self, rhs: &Vector) -> Result<Vector> {
        self.zip_with(rhs, |l, r| l + r)
    }

    /// Elementwise `self - rhs`.
    pub fn try_sub(&self, rhs: &Vector) -> Result<Vector> {
        self.zip_with(rhs, |l, r| l - r)
    }

    /// Elementwise (Hadamard) product.
    pub fn hadamard(&self, rhs: &Vector) -> Result<Vector> {
        self.zip_with(rhs, |l, r| l * r)
    }

    pub fn scale(&self, scalar: f64) -> Vector {
        self.map(|x| scalar * x)
    }

    pub fn dot(&self, rhs: &Vector) -> Result<f64> {
        check_len(self.len(), rhs.len())?;
        Ok(self.data.iter().zip(&rhs.data).map(|(l, r)| l * r).sum())
    }

    /// The outer product `self ⊗ rhs`, a `self.len() × rhs.len()` matrix.
    pub fn outer(&self, rhs: &Vector) -> Mat {
        let mut out = Mat::zeros(self.len(), rhs.len());
        for (y, &l) in self.data.iter().enumerate() {
            for (x, &r) in rhs.data.iter().enumerate() {
                out[(y, x)] = l * r;
            }
        }
        out
    }

    /// Computes `self += alpha * rhs` in place.
    pub fn add_scaled(&mut self, alpha: f64, rhs: &Vector) -> Result<()> {
        check_len(self.len(), rhs.len())?;
        for (l, r) in self.data.iter_mut().zip(&rhs.data) {
            *l += alpha * r;
        }
        Ok(())
    }

    fn zip_with<F>(&self, rhs: &Vector, f: F) -> Result<Vector>
    where
        F: Fn(f64, f64) -> f64,
    {
        check_len(self.len(), rhs.len())?;
        Ok(self
            .data
            .iter()
            .zip(&rhs.data)
            .map(|(&l, &r)| f(l, r))
            .collect())
    }
}

impl From<Vec<f64>> for Vector {
    fn from(data: Vec<f64>) -> Self {
        Vector { data }
    }
}

impl<'a> From<&'a [f64]> for Vector {
    fn from(data: &'a [f64]) -> Self {
        Vector { data: data.into() }
    }
}

impl FromIterator<f64> for Vector {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        Vector {
            data: iter.into_iter().collect(),
        }
    }
}

impl AsRef<[f64]> for Vector {
    fn as_ref(&self) -> &[f64] {
        &self.data
    }
}

impl Index<usize> for Vector {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.data[index]
    }
}

impl IndexMut<usize> for Vector {
    fn index_mut(&mut self, index: usize) -> &mut f64 {
        &mut self.data[index]
    }
}
