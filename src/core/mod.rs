pub mod phase;
pub mod rng;
pub mod timegrid;
