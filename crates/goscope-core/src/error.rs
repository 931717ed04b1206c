//! # Error Types
//!
//! General error handling for the introspection engine.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.
//!
//! Every variant is `Clone` on purpose: decode failures are attached to the
//! `Variable` node they occurred at (see [`crate::variable::Variable`]), and a
//! partially decoded tree may surface the same error both on the node and from
//! the decoding call that gave up on it.

use thiserror::Error;

use crate::thread::ThreadId;

/// Main error type for introspection operations
///
/// ## Error Categories
///
/// 1. **Recoverable conditions**: `NoGoroutine` (the thread simply has no
///    goroutine scheduled; callers skip it and move on)
/// 2. **Unreadable nodes**: `ReadFailed`, `NilDereference`, `LoadLimit`,
///    recorded on the specific node while siblings stay valid
/// 3. **Version/layout faults**: `TypeNotFound`, `MissingField`,
///    `UnreadableStackBarrier`
/// 4. **Debug-info faults**: `BinaryLoad`, `MalformedDebugInfo`
///
/// Unsupported pointer widths are deliberately *not* represented here: they
/// are a caller/setup bug, not a runtime condition, and panic at construction
/// time (see [`crate::loclist::LoclistReader::new`]).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GoscopeError
{
    /// The goroutine pointer for a thread resolved to a null address
    ///
    /// Not a failure of the engine: threads executing on the system stack or
    /// not yet handed a goroutine legitimately carry a nil `g`. The owning
    /// thread identifier is carried for diagnostics (0 if the handle was not
    /// bound to a thread).
    #[error("no goroutine scheduled on thread {tid}")]
    NoGoroutine
    {
        /// Thread that owned the nil goroutine pointer
        tid: ThreadId,
    },

    /// A pointer chain reached address zero and was then loaded
    #[error("nil pointer dereference reading {0}")]
    NilDereference(String),

    /// The memory-read capability failed for the given address
    ///
    /// The reason string comes from the injected reader; the engine does not
    /// interpret it beyond attaching it to the failing node.
    #[error("memory read failed at {address:#x}: {reason}")]
    ReadFailed
    {
        /// Target address of the failed read
        address: u64,
        /// Description supplied by the memory-read capability
        reason: String,
    },

    /// Bounded value loading hit its configured depth limit
    #[error("load limit reached while decoding {0}")]
    LoadLimit(String),

    /// The type system has no descriptor with the requested name
    #[error("type {0} not found in debug info")]
    TypeNotFound(String),

    /// A field the decoder cannot work without is missing from the layout
    ///
    /// Only raised for the handful of mandatory goroutine fields; everything
    /// version-dependent is probed and skipped instead.
    #[error("field {field} missing from {type_name}")]
    MissingField
    {
        /// Struct type whose layout lacked the field
        type_name: String,
        /// Name of the missing field
        field: String,
    },

    /// The stack-barrier list exists in this runtime layout but did not decode
    ///
    /// Distinguishes "feature present but corrupt" from "feature absent",
    /// which is expected on newer runtimes and reported as an empty list.
    #[error("unreadable stack barrier list: {0}")]
    UnreadableStackBarrier(String),

    /// Failed to open or parse the target binary
    #[error("failed to load binary: {0}")]
    BinaryLoad(String),

    /// The DWARF data was readable but structurally unusable
    #[error("malformed debug info: {0}")]
    MalformedDebugInfo(String),
}

/// Convenience type alias for `Result<T, GoscopeError>`
///
/// ```rust
/// use goscope_core::error::Result;
/// fn foo() -> Result<()>
/// {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, GoscopeError>;
