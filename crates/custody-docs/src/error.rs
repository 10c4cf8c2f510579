//! Document generation errors.

use custody_core::EventId;
use thiserror::Error;

/// Errors from rendering.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    /// The attestation target is not part of the supplied chain.
    #[error("{0} is not part of the ownership chain")]
    TargetNotInChain(EventId),
}
