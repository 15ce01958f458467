//! The two error kinds this protocol distinguishes: recoverable
//! [`Violation`]s, scoped to one frame, and fatal [`BananaError`]s that
//! end the connection.

use banana_wire::WireError;
use thiserror::Error;

/// A recoverable schema/constraint/protocol-discipline error, scoped to
/// the frame that raised it. The offending frame is discarded (encode:
/// an ABORT is emitted; decode: tokens up to the matching CLOSE are
/// skipped) and the connection continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// A value didn't match the constraint attached to its unslicer.
    #[error("{path}: schema mismatch: {reason}")]
    SchemaMismatch {
        /// Dotted path from the root unslicer to the offending frame.
        path: String,
        /// Human-readable explanation.
        reason: String,
    },

    /// A constraint (`ListOf`, `ByteStringConstraint`, ...) rejected a
    /// token or an opentype.
    #[error("{path}: constraint breach: {detail}")]
    ConstraintBreach {
        /// Dotted path from the root unslicer.
        path: String,
        /// Human-readable explanation.
        detail: String,
    },

    /// The encoder sent an ABORT for the frame this unslicer owns.
    #[error("ABORT received")]
    AbortReceived {
        /// Dotted path from the root unslicer.
        path: String,
    },

    /// The root slicer has no registered way to serialize this value.
    #[error("{path}: cannot serialize {type_name}")]
    CannotSerialize {
        /// Dotted path from the root slicer.
        path: String,
        /// Name of the offending Rust type, for diagnostics.
        type_name: String,
    },

    /// A child slicer yielded a suspension point while its parent
    /// declared itself non-streamable.
    #[error("{path}: parent not streamable")]
    ParentNotStreamable {
        /// Dotted path from the root slicer.
        path: String,
    },
}

impl Violation {
    /// The dotted path this violation occurred at.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::SchemaMismatch { path, .. }
            | Self::ConstraintBreach { path, .. }
            | Self::AbortReceived { path }
            | Self::CannotSerialize { path, .. }
            | Self::ParentNotStreamable { path } => path,
        }
    }
}

/// A fatal, connection-ending error: the byte stream or the object graph
/// it describes is structurally broken, not merely one frame.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BananaError {
    /// A CLOSE token's count didn't match the innermost open frame.
    #[error("CLOSE count {got} does not match open frame {expected:?}")]
    UnmatchedClose {
        /// The count the currently-open frame expects, if any is open.
        expected: Option<u64>,
        /// The count that was actually received.
        got: u64,
    },

    /// A token arrived whose structural role (e.g. "must be INT") was
    /// violated by protocol discipline rather than application schema.
    #[error("{path}: expected {expected}")]
    StructuralTypeMismatch {
        /// Dotted path from the root unslicer.
        path: String,
        /// What was structurally required.
        expected: &'static str,
    },

    /// A dict-like container received the same key twice.
    #[error("{path}: duplicate key")]
    DuplicateDictKey {
        /// Dotted path from the root unslicer.
        path: String,
    },

    /// A dict-like container received a key of a container type
    /// (list/dict/set), which has no stable identity to key by.
    #[error("{path}: unhashable key")]
    UnhashableDictKey {
        /// Dotted path from the root unslicer.
        path: String,
    },

    /// An `instance` frame named a reduction protocol this
    /// implementation doesn't accept.
    #[error("unknown pickle protocol {protocol}")]
    UnknownPickleProtocol {
        /// The protocol number that was received.
        protocol: u64,
    },

    /// The slicer/unslicer stack grew past the configured depth cap.
    #[error("frame nesting exceeds depth limit {limit}")]
    FrameDepthExceeded {
        /// The configured limit.
        limit: usize,
    },

    /// A reference frame named a reference id that was never opened.
    #[error("reference to unknown id {refid}")]
    UnknownReference {
        /// The reference id that was requested.
        refid: u64,
    },

    /// The root unslicer received a CLOSE with nothing open — this can
    /// never legitimately happen.
    #[error("top-level should never receive CLOSE tokens")]
    TopLevelClose,

    /// An ABORT token arrived with no frame open to cancel.
    #[error("ABORT received with nothing open")]
    UnexpectedAbort,

    /// Error surfaced by the peer over an ERROR token.
    #[error("peer reported error: {0}")]
    PeerError(String),

    /// Fatal error from the token layer (malformed bytes).
    #[error(transparent)]
    Wire(#[from] WireError),
}

/// Convenience alias for fallible operations that can only fail fatally.
pub type BananaResult<T> = std::result::Result<T, BananaError>;

/// Either outcome of an operation that can fail recoverably (the frame
/// is discarded but the connection survives) or fatally.
pub type StepResult<T> = std::result::Result<T, StepError>;

/// The two ways a slicer/unslicer step can fail.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StepError {
    /// Recoverable: scoped to the current frame.
    #[error(transparent)]
    Violation(#[from] Violation),
    /// Fatal: the connection must close.
    #[error(transparent)]
    Fatal(#[from] BananaError),
}
