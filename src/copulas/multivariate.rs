//! # Multivariate
//!
//! $$
//! c(u_1,\dots,u_d)=\prod_{t=0}^{d-2}\prod_{e\in E_t}c_{e}\left(u_{j_e|D_e},u_{k_e|D_e}\right)
//! $$
//!
pub use crate::traits::MultivariateExt;

pub mod controls;
pub mod json;
pub mod selector;
pub mod structure;
pub mod tree;
pub mod triangular_array;
pub mod vine;
