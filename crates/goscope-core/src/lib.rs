//! # goscope-core
//!
//! Debug-information-driven memory introspection for Go processes.
//!
//! Given a halted process, its binary's DWARF metadata, and a raw
//! memory-read capability, this crate reconstructs typed, semantically
//! meaningful runtime objects from untyped byte ranges, most prominently
//! goroutine scheduling state: parked registers, stack bounds, wait status,
//! and resolved call-site locations.
//!
//! The engine is read-only and synchronous. Process control, stack
//! unwinding, and register access stay in the surrounding debugger and are
//! injected through the traits in [`mem`], [`thread`], and [`binary`];
//! [`dwarf`] ships a production implementation of the binary-info side.
//!
//! ## Decoding pipeline
//!
//! 1. [`goroutine::goroutine_handle`] turns a thread's registers (or TLS
//!    slot) into a [`variable::Variable`] bound to the `runtime.g` type.
//! 2. [`Goroutine::decode`](goroutine::Goroutine::decode) walks the struct
//!    through the typed memory accessor with bounded loading.
//! 3. Derived queries (`user_current_location`, `spawn_location`,
//!    `top_defer`, ...) resolve program counters through the injected
//!    capabilities.
//!
//! Partial results are the norm: version-skewed layouts and corrupt memory
//! degrade individual fields, not whole records.

pub mod binary;
pub mod defer;
pub mod dwarf;
pub mod error;
pub mod goroutine;
pub mod loclist;
pub mod mem;
pub mod thread;
pub mod types;
pub mod variable;

// Re-export commonly used types
pub use binary::{BinaryInfo, Function, Location};
pub use error::{GoscopeError, Result};
pub use goroutine::{goroutine_handle, GStatus, Goroutine};
pub use loclist::{LoclistEntry, LoclistReader};
pub use mem::MemoryReader;
pub use thread::{Arch, StackWalker, Thread, ThreadId, ThreadRegisters};
pub use types::{GoType, TypeId, TypeRegistry};
pub use variable::{LoadConfig, Value, Variable};
