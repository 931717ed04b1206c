//! Binary-info capability: type lookup and PC resolution.

use crate::error::Result;
use crate::types::{TypeId, TypeRegistry};

/// A function known to the debug info.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function
{
    /// Fully qualified name (`runtime.gopark`, `main.worker`, ...)
    pub name: String,
    /// Entry address of the function
    pub entry: u64,
}

/// A resolved source position
///
/// Produced by the PC-resolution capability, never constructed from scratch
/// by the decoders (they only re-label the `pc`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location
{
    /// Program counter the resolution was made for
    pub pc: u64,
    /// Source file, empty when unknown
    pub file: String,
    /// 1-based line, 0 when unknown
    pub line: u64,
    /// Enclosing function, if resolvable
    pub function: Option<Function>,
}

/// Injected debug-information capability
///
/// One implementation per target binary. The engine treats every call as
/// cheap and synchronous; implementations are expected to cache internally
/// (see [`crate::dwarf::DwarfBinaryInfo`] for the production one).
pub trait BinaryInfo
{
    /// Registry holding this binary's type descriptors.
    fn types(&self) -> &TypeRegistry;

    /// Resolve a type by its fully qualified name.
    ///
    /// ## Errors
    ///
    /// [`crate::GoscopeError::TypeNotFound`] when the debug info has no such
    /// type.
    fn find_type(&self, name: &str) -> Result<TypeId>;

    /// Resolve a program counter to `(file, line, function)`.
    ///
    /// Unknown positions come back as an empty file and line 0 rather than an
    /// error; decoders degrade gracefully on stripped binaries.
    fn pc_to_line(&self, pc: u64) -> (String, u64, Option<Function>);

    /// The function containing `pc`, if any.
    fn pc_to_func(&self, pc: u64) -> Option<Function>;

    /// Offset of the goroutine pointer inside thread-local storage.
    fn g_struct_offset(&self) -> u64;
}
