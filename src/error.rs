use core::fmt::{Display, Formatter};

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Everything that can go wrong while building an index or drawing winners.
///
/// Input problems are reported before any drawing starts. A result with
/// fewer winners than requested is *not* an error: check the length.
#[derive(Debug)]
pub enum Error {
    /// A participant was given a negative weight.
    NegativeWeight { id: u64, weight: i64 },
    /// A negative number of winners was requested.
    NegativeWinnerCount(i64),
    /// The summed weights do not fit in a `u64` accumulator.
    WeightOverflow,
    /// Draws kept resolving to a removed or zero-weight entry. The index
    /// is corrupt and retrying further would spin forever.
    InvariantViolation { target: u64, retries: u32 },
    /// The worker pool could not be started.
    ThreadPool(rayon::ThreadPoolBuildError),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::NegativeWeight { id, weight } => {
                write!(f, "participant {id} has negative weight {weight}")
            }
            Error::NegativeWinnerCount(count) => {
                write!(f, "winner count must not be negative, got {count}")
            }
            Error::WeightOverflow => f.write_str("total weight overflows a 64-bit accumulator"),
            Error::InvariantViolation { target, retries } => write!(
                f,
                "draw target {target} resolved to a removed entry after {retries} consecutive rejections"
            ),
            Error::ThreadPool(err) => write!(f, "failed to start worker pool: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::ThreadPool(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rayon::ThreadPoolBuildError> for Error {
    #[inline]
    fn from(from: rayon::ThreadPoolBuildError) -> Self {
        Self::ThreadPool(from)
    }
}
