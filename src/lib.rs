//! # vinecop-rs
//!
//! $$
//! c(u_1,\dots,u_d)=\prod_{t=1}^{d-1}\prod_{e\in E_t} c_{j_e,k_e;D_e}\left(u_{j_e|D_e},u_{k_e|D_e}\right)
//! $$
//!
//! Vine copula models: R-vine structures, greedy structure selection, and
//! density, simulation and Rosenblatt evaluation.
#![allow(non_snake_case)]

pub mod copulas;
pub mod error;
pub mod parallel;
pub mod traits;

pub use copulas::bivariate::Bicop;
pub use copulas::bivariate::BicopFamily;
pub use copulas::bivariate::controls::FitControlsBicop;
pub use copulas::multivariate::controls::FitControlsVinecop;
pub use copulas::multivariate::structure::RVineStructure;
pub use copulas::multivariate::triangular_array::TriangularArray;
pub use copulas::multivariate::vine::Vinecop;
pub use error::VineError;
pub use parallel::WorkerPool;
