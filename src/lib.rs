//! AutoML Wizard - session and step progression for a staged AutoML pipeline
//!
//! The backend does the computation. This crate sequences the stages
//! (upload, analysis, preprocessing, training, report), persists the session
//! between runs and checks every response against its stage contract.

pub mod api;
pub mod app;
pub mod config;
pub mod env_vars;
pub mod logging;
pub mod steps;
pub mod store;
pub mod types;

pub use app::{App, WizardError};
