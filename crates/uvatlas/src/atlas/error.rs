//! The uniform failure type of the public pipeline.

use std::fmt;

/// Everything that can go wrong across the pipeline.
///
/// One status type crosses every subsystem boundary; locally recoverable
/// conditions (parameterizer overlap, a failed merge, a non-convergent
/// fix-up pass) are handled where they occur and never surface here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AtlasError {
    /// User-visible misuse: zero dimensions, empty buffers, mismatched counts.
    InvalidArgument { reason: String },
    /// Input mesh is not repairable to an oriented 2-manifold with boundary.
    InvalidTopology { reason: String },
    /// Host false-edge constraints contradict a cut the partition requires.
    NonSplittableBlocked,
    /// Reserved for allocation failure surfaced by the host shim; the
    /// library itself relies on infallible allocation and never produces it.
    OutOfMemory,
    /// Eigen-decomposition or conjugate gradient did not converge in cap.
    NumericFailure { reason: String },
    /// The progress callback asked to stop.
    Canceled,
}

impl AtlasError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    pub(crate) fn topology(reason: impl Into<String>) -> Self {
        Self::InvalidTopology {
            reason: reason.into(),
        }
    }

    pub(crate) fn numeric(reason: impl Into<String>) -> Self {
        Self::NumericFailure {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for AtlasError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument { reason } => write!(f, "invalid argument: {reason}"),
            Self::InvalidTopology { reason } => write!(f, "invalid topology: {reason}"),
            Self::NonSplittableBlocked => {
                write!(f, "false-edge constraints block a required cut")
            }
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::NumericFailure { reason } => write!(f, "numeric failure: {reason}"),
            Self::Canceled => write!(f, "canceled by callback"),
        }
    }
}

impl std::error::Error for AtlasError {}
