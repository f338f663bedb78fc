//! Global and local partitioned sequences.
//!
//! A [`GlobalSequence`] holds all elements on one root rank; scattering it
//! yields one [`LocalSequence`] per rank, and gathering the local sequences
//! produces a new global one.

mod global;
mod local;

pub use global::GlobalSequence;
pub use local::LocalSequence;
