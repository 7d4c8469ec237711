use crate::error::{check_len, Error, Result};
use crate::vector::Vector;

use rand::distributions::Distribution;
use rand::Rng;
use std::ops::{Index, IndexMut};

#[cfg(feature = "blas")]
use rblas::attribute::{Order, Transpose};
#[cfg(feature = "blas")]
use rblas::matrix_vector::ops::{Gemv, Ger};
#[cfg(feature = "blas")]
use std::os::raw::c_int;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mat {
    rows: usize,
    cols: usize,
    data: Vec<f64>, // row-major array
}

impl Mat {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Mat {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    pub fn random<D, R>(distribution: &D, rows: usize, cols: usize, rng: &mut R) -> Self
    where
        D: Distribution<f64>,
        R: Rng + ?Sized,
    {
        let mut data = Vec::with_capacity(rows * cols);
        for _ in 0..(rows * cols) {
            data.push(distribution.sample(rng));
        }
        Mat { rows, cols, data }
    }

    /// Builds a matrix from a row-major buffer of exactly `rows * cols`
    /// elements.
    pub fn from_row_major(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        check_len(rows * cols, data.len())?;
        Ok(Mat { rows, cols, data })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Changes the shape of the matrix. Every element is zero afterwards.
    pub fn resize(&mut self, rows: usize, cols: usize) {
        self.rows = rows;
        self.cols = cols;
        self.data.clear();
        self.data.resize(rows * cols, 0.0);
    }

    /// Reads the element at `(y mod rows, x mod cols)`.
    ///
    /// Panics if the matrix is empty.
    pub fn at(&self, y: usize, x: usize) -> f64 {
        assert!(!self.is_degenerate(), "wrapping index into an empty matrix");
        self.data[(y % self.rows) * self.cols + (x % self.cols)]
    }

    /// Mutable counterpart to [`Mat::at`].
    pub fn at_mut(&mut self, y: usize, x: usize) -> &mut f64 {
        assert!(!self.is_degenerate(), "wrapping index into an empty matrix");
        let i = (y % self.rows) * self.cols + (x % self.cols);
        &mut self.data[i]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn row(&self, y: usize) -> &[f64] {
        &self.data[y * self.cols..(y + 1) * self.cols]
    }

    pub fn try_add(&self, rhs: &Mat) -> Result<Mat> {
        self.zip_with(rhs, |l, r| l + r)
    }

    pub fn try_sub(&self, rhs: &Mat) -> Result<Mat> {
        self.zip_with(rhs, |l, r| l - r)
    }

    pub fn scale(&self, scalar: f64) -> Mat {
        Mat {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|x| scalar * x).collect(),
        }
    }

    /// Computes `self · v`.
    pub fn mul_vec(&self, v: &Vector) -> Result<Vector> {
        check_len(self.cols, v.len())?;
        let mut out = Vector::zeros(self.rows);
        self.gemv_no_trans(v.as_slice(), out.as_mut_slice());
        Ok(out)
    }

    /// Computes `v · self`, i.e. `selfᵀ · v`.
    pub fn vec_mul(&self, v: &Vector) -> Result<Vector> {
        check_len(self.rows, v.len())?;
        let mut out = Vector::zeros(self.cols);
        self.gemv_trans(v.as_slice(), out.as_mut_slice());
        Ok(out)
    }

    /// Computes `self · rhs`.
    pub fn matmul(&self, rhs: &Mat) -> Result<Mat> {
        check_len(self.cols, rhs.rows)?;
        let mut out = Mat::zeros(self.rows, rhs.cols);
        for y in 0..self.rows {
            for k in 0..self.cols {
                let l = self.data[y * self.cols + k];
                for x in 0..rhs.cols {
                    out.data[y * rhs.cols + x] += l * rhs.data[k * rhs.cols + x];
                }
            }
        }
        Ok(out)
    }

    /// Rank-1 update `self += alpha * (x ⊗ y)`.
    ///
    /// `x` runs along the rows and `y` along the columns.
    pub fn add_outer(&mut self, alpha: f64, x: &Vector, y: &Vector) -> Result<()> {
        check_len(self.rows, x.len())?;
        check_len(self.cols, y.len())?;
        self.ger(alpha, x.as_slice(), y.as_slice());
        Ok(())
    }

    fn zip_with<F>(&self, rhs: &Mat, f: F) -> Result<Mat>
    where
        F: Fn(f64, f64) -> f64,
    {
        if self.rows != rhs.rows {
            return Err(Error::DimensionMismatch {
                expected: self.rows,
                actual: rhs.rows,
            });
        }
        check_len(self.cols, rhs.cols)?;
        Ok(Mat {
            rows: self.rows,
            cols: self.cols,
            data: self
                .data
                .iter()
                .zip(&rhs.data)
                .map(|(&l, &r)| f(l, r))
                .collect(),
        })
    }

    fn is_degenerate(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }
}

// Reference kernels. Shapes are checked by the public callers.
#[cfg(not(feature = "blas"))]
impl Mat {
    fn gemv_no_trans(&self, x: &[f64], out: &mut [f64]) {
        if self.is_degenerate() {
            return;
        }
        for (y, o) in out.iter_mut().enumerate() {
            *o = self.row(y).iter().zip(x).map(|(w, v)| w * v).sum();
        }
    }

    fn gemv_trans(&self, x: &[f64], out: &mut [f64]) {
        if self.is_degenerate() {
            return;
        }
        for (y, &v) in x.iter().enumerate() {
            for (o, w) in out.iter_mut().zip(self.row(y)) {
                *o += v * w;
            }
        }
    }

    fn ger(&mut self, alpha: f64, x: &[f64], y: &[f64]) {
        let cols = self.cols;
        for (i, &l) in x.iter().enumerate() {
            for (w, &r) in self.data[i * cols..(i + 1) * cols].iter_mut().zip(y) {
                *w += alpha * l * r;
            }
        }
    }
}

#[cfg(feature = "blas")]
impl Mat {
    fn gemv_no_trans(&self, x: &[f64], out: &mut [f64]) {
        if self.is_degenerate() {
            return;
        }
        f64::gemv(Transpose::NoTrans, &1.0, self, x, &0.0, out);
    }

    fn gemv_trans(&self, x: &[f64], out: &mut [f64]) {
        if self.is_degenerate() {
            return;
        }
        f64::gemv(Transpose::Trans, &1.0, self, x, &0.0, out);
    }

    fn ger(&mut self, alpha: f64, x: &[f64], y: &[f64]) {
        if self.is_degenerate() {
            return;
        }
        f64::ger(&alpha, x, y, self);
    }
}

#[cfg(feature = "blas")]
impl rblas::Matrix<f64> for Mat {
    fn rows(&self) -> c_int {
        self.rows as c_int
    }

    fn cols(&self) -> c_int {
        self.cols as c_int
    }

    fn as_ptr(&self) -> *const f64 {
        self.data.as_ptr()
    }

    fn as_mut_ptr(&mut self) -> *mut f64 {
        self.data.as_mut_ptr()
    }

    fn order(&self) -> Order {
        Order::RowMajor
    }
}

impl Index<(usize, usize)> for Mat {
    type Output = f64;

    fn index(&self, (y, x): (usize, usize)) -> &f64 {
        assert!(y < self.rows && x < self.cols, "index out of bounds");
        &self.data[y * self.cols + x]
    }
}

impl IndexMut<(usize, usize)> for Mat {
    fn index_mut(&mut self, (y, x): (usize, usize)) -> &mut f64 {
        assert!(y < self.rows && x < self.cols, "index out of bounds");
        &mut self.data[y * self.cols + x]
    }
}
