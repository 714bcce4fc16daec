pub mod adaptation;
pub mod autodiff;
pub mod config;
pub mod distributions;
pub mod error;
pub mod hamiltonian;
pub mod hmc;
pub mod integrator;
pub mod io;
pub mod model;
pub mod sampler;
pub mod services;
pub mod transitions;
pub mod writer;

pub use error::{Error, Result};
