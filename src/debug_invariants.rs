//! Structural invariant checks shared by partitions and sequences.
//!
//! Checks are always available through [`DebugInvariants::validate_invariants`];
//! the asserting form only fires in debug builds or when one of the
//! `strict-invariants` / `check-invariants` features is enabled.

use crate::dist_error::DistError;

/// Types whose internal consistency can be validated on demand.
pub trait DebugInvariants {
    /// Validate invariants and return the first violation found.
    fn validate_invariants(&self) -> Result<(), DistError>;

    /// Panic on the first violation when invariant checking is enabled.
    #[track_caller]
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "debug_assert_invariants");
    }
}

/// Run a fallible check and panic with `ctx` when invariant checking is on.
/// Compiles to nothing in release builds without the invariant features.
#[macro_export]
macro_rules! debug_invariants {
    ($expr:expr, $ctx:literal) => {
        #[cfg(any(
            debug_assertions,
            feature = "strict-invariants",
            feature = "check-invariants"
        ))]
        if let Err(e) = $expr {
            panic!(concat!("[invariants] ", $ctx, ": {}"), e);
        }
    };
}
