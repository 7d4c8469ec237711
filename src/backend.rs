//! Selection of the kernels behind matrix-vector products.
//!
//! The BLAS kernels are chosen at build time with the `blas` cargo feature.
//! Both backends compute the same results; only speed differs.

use log::{info, warn};
use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Backend {
    /// Plain loops over the row-major buffers.
    Reference,
    /// `gemv`/`ger` from the system BLAS library.
    Blas,
}

impl Backend {
    /// The backend this build was compiled with.
    pub fn active() -> Backend {
        if cfg!(feature = "blas") {
            Backend::Blas
        } else {
            Backend::Reference
        }
    }

    /// Resolves a request for accelerated kernels against what this build
    /// provides. A request that cannot be honoured falls back to the
    /// reference kernels with a warning.
    pub fn select(accelerated: bool) -> Backend {
        let active = Backend::active();
        if accelerated && active != Backend::Blas {
            warn!("BLAS backend requested but not compiled in (enable the `blas` feature); using reference kernels");
        } else {
            info!("using {} kernels", active);
        }
        active
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Reference => write!(f, "reference"),
            Backend::Blas => write!(f, "BLAS"),
        }
    }
}
