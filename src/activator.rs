//! Activation function types.

use crate::vector::Vector;

/// [Activation function](https://en.wikipedia.org/wiki/Activation_function)
/// types.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Activator {
    /// Logistic function, with outputs in (0, 1)
    Sigmoid,
    /// Hyperbolic tan function, with outputs in (-1, 1)
    TanH,
}

impl Activator {
    /// Evaluates `f(x)` for the selected the activation function.
    pub fn f(self, x: f64) -> f64 {
        match self {
            Activator::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activator::TanH => x.tanh(),
        }
    }

    /// Evaluates the derivative `f'(x)`, where `x = f^{-1}(y)`.
    ///
    /// Note that this function takes in the *output* of the activation
    /// function, rather than the input. This is an optimization that means we
    /// don't have to store the intermediate results before activation.
    pub fn fprime(self, y: f64) -> f64 {
        match self {
            Activator::Sigmoid => y * (1.0 - y),
            Activator::TanH => 1.0 - y * y,
        }
    }

    /// Applies `f` to every element of `v`.
    pub fn apply(self, v: &Vector) -> Vector {
        v.map(|x| self.f(x))
    }

    /// Applies `fprime` to every element of `v`.
    pub fn derivative(self, v: &Vector) -> Vector {
        v.map(|y| self.fprime(y))
    }
}
