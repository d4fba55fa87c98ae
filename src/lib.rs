//! Ensemble simulator for Wilson-Cowan E/I populations and Kuramoto
//! oscillator networks, averaged into a synthetic LFP.

pub mod cli;
pub mod config;
pub mod core;
pub mod sim;
