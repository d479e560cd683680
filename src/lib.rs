//! Target-controlled infusion simulation.
//!
//! Closed-form multi-compartment concentrations ([`engine`]), a scheduler
//! that turns plasma or effect-site targets into pump segments ([`pump`]),
//! and the published drug models they run on ([`models`]).

pub mod config;
pub mod dosing;
pub mod engine;
pub mod error;
pub mod models;
pub mod output;
pub mod pump;
pub mod simulation;
pub mod solver;

pub use error::{PKError, PKResult};
