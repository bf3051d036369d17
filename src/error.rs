use thiserror::Error;

use crate::metadata::token::Token;

/// Helper macro for creating [`crate::Error::Malformed`] errors with source location.
///
/// ```rust, ignore
/// return Err(malformed_error!("Invalid table id - {}", id));
/// ```
macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// Helper macro for creating [`crate::Error::OutOfBounds`] errors with source location.
macro_rules! out_of_bounds_error {
    () => {
        crate::Error::OutOfBounds {
            file: file!(),
            line: line!(),
        }
    };
}

/// Helper macro for creating [`crate::Error::LimitExceeded`] errors.
///
/// ```rust, ignore
/// return Err(limit_error!("blob heap size", len, MAX_HEAP_SIZE));
/// ```
macro_rules! limit_error {
    ($what:expr, $value:expr, $max:expr) => {
        crate::Error::LimitExceeded {
            what: $what,
            value: $value as u64,
            max: $max as u64,
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// # Error Categories
///
/// ## Format errors
/// The input is truncated or malformed. These are never guessed around.
/// - [`Error::Malformed`] - Corrupted or invalid metadata structure
/// - [`Error::OutOfBounds`] - A read went past the end of the data
/// - [`Error::NotSupported`] - A structurally valid but unsupported construct
/// - [`Error::Empty`] - Empty input provided
/// - [`Error::RecursionLimit`] - Signature nesting exceeded the supported depth
///
/// ## Capacity errors
/// The payload being emitted does not fit the format.
/// - [`Error::LimitExceeded`] - A heap, table or index is beyond the addressable maximum
///
/// ## Contract violations
/// The calling code misused the builder API. These indicate a bug in the caller, not bad data.
/// - [`Error::UnresolvedPseudoToken`] - A pseudo-token was referenced but never defined
/// - [`Error::DuplicateFixup`] - A pseudo-token was given two final positions
/// - [`Error::InvalidToken`] - A token of the wrong table kind was passed in
///
/// ## Binding
/// - [`Error::AmbiguousMatch`] - More than one overload is equally specific
///
/// # Examples
///
/// ```rust
/// use cilmeta::{Error, metadata::image::MetadataImage};
///
/// match MetadataImage::read(&[0x42, 0x53, 0x4A]) {
///     Ok(_) => println!("parsed"),
///     Err(Error::OutOfBounds { .. }) => eprintln!("truncated metadata"),
///     Err(Error::Malformed { message, .. }) => eprintln!("malformed: {}", message),
///     Err(e) => eprintln!("other error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The data is damaged and could not be parsed.
    ///
    /// The error includes the source location where the malformation was detected.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing.
    #[error("Out of Bound read would have occurred! - {file}:{line}")]
    OutOfBounds {
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// This construct is not supported.
    #[error("This construct is not supported")]
    NotSupported,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Recursion limit reached while decoding a nested signature.
    ///
    /// The associated value shows the recursion limit that was reached.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// An emitted value does not fit into the format's addressable range.
    ///
    /// Raised when building, never when reading: the cause is the payload being
    /// written (a heap beyond its index width, a table with too many rows).
    #[error("Limit exceeded - {what}: {value} > {max}")]
    LimitExceeded {
        /// What overflowed
        what: &'static str,
        /// The value that was requested
        value: u64,
        /// The largest value the format can address
        max: u64,
    },

    /// A pseudo-token reached finalization without a registered final token.
    ///
    /// Something referenced an entity that was never defined.
    #[error("Pseudo-token {0} was never resolved to a final token")]
    UnresolvedPseudoToken(Token),

    /// A pseudo-token received a second final token.
    #[error("Pseudo-token {0} already has a final token")]
    DuplicateFixup(Token),

    /// A token of the wrong kind was handed to an operation.
    #[error("Token {0} is not valid here")]
    InvalidToken(Token),

    /// More than one candidate matched equally well during binding.
    #[error("Ambiguous match - {0}")]
    AmbiguousMatch(String),
}

impl Error {
    /// Returns `true` for errors that signal a bug in the calling code rather than bad data.
    #[must_use]
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Error::UnresolvedPseudoToken(_) | Error::DuplicateFixup(_) | Error::InvalidToken(_)
        )
    }

    /// Returns `true` for capacity errors raised while emitting.
    #[must_use]
    pub fn is_limit_exceeded(&self) -> bool {
        matches!(self, Error::LimitExceeded { .. })
    }

    /// Returns `true` for errors caused by truncated or malformed input.
    #[must_use]
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Error::Malformed { .. }
                | Error::OutOfBounds { .. }
                | Error::NotSupported
                | Error::Empty
                | Error::RecursionLimit(_)
        )
    }
}
