//! Thread and register capabilities.
//!
//! The surrounding debugger owns thread control; the engine only needs a few
//! facts per thread: where its registers point, where thread-local storage
//! lives, and how wide a pointer is. Everything is modeled as injected traits
//! so test doubles can stand in for a live process.

use std::fmt;

use crate::binary::Location;
use crate::error::Result;
use crate::goroutine::Goroutine;
use crate::mem::MemoryReader;

/// Thread identifier
///
/// The exact representation is platform-specific (Mach port, Linux TID, ...);
/// we store it as a `u32` to provide a platform-agnostic interface. The zero
/// value acts as the "unknown thread" sentinel in error reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ThreadId(pub u32);

impl ThreadId
{
    /// Get the raw representation of the thread identifier.
    pub fn raw(&self) -> u32
    {
        self.0
    }
}

impl From<u32> for ThreadId
{
    fn from(value: u32) -> Self
    {
        Self(value)
    }
}

impl fmt::Display for ThreadId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.0)
    }
}

/// Target architecture facts the decoders depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arch
{
    pointer_size: u8,
    tls_indirect: bool,
}

impl Arch
{
    /// Describe a target architecture.
    ///
    /// `tls_indirect` is true when the TLS slot holds a pointer *to* the
    /// goroutine pointer rather than the goroutine address itself, in which
    /// case handles get wrapped in a synthetic pointer type so decoding can
    /// apply a uniform dereference step.
    ///
    /// ## Panics
    ///
    /// Panics if `pointer_size` is not 4 or 8 (setup bug).
    pub fn new(pointer_size: u8, tls_indirect: bool) -> Self
    {
        assert!(
            matches!(pointer_size, 4 | 8),
            "unsupported pointer width: {pointer_size}"
        );
        Arch {
            pointer_size,
            tls_indirect,
        }
    }

    /// Pointer width in bytes.
    pub fn pointer_size(&self) -> u8
    {
        self.pointer_size
    }

    /// Whether goroutine handles need the synthetic dereference step.
    pub fn tls_indirect(&self) -> bool
    {
        self.tls_indirect
    }
}

/// Register snapshot of a halted thread
///
/// Only the registers the decoders consume. `g_register` is populated on
/// architectures that dedicate a register to the current goroutine pointer
/// (e.g. arm64's `x28` in the Go ABI); elsewhere the pointer is recovered
/// from TLS.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRegisters
{
    /// Program counter
    pub pc: u64,
    /// Stack pointer
    pub sp: u64,
    /// Thread-local storage base address
    pub tls: u64,
    /// Dedicated goroutine-pointer register, if the architecture has one
    pub g_register: Option<u64>,
}

/// Injected per-thread capability
///
/// A thread can read its process's memory (supertrait) and report its halted
/// register state. Implementations are expected to be cheap to query; the
/// engine calls `registers()` once per goroutine resolution.
pub trait Thread: MemoryReader
{
    /// Identifier of this thread.
    fn thread_id(&self) -> ThreadId;

    /// Architecture facts for the process this thread belongs to.
    fn arch(&self) -> Arch;

    /// Current (halted) register state.
    fn registers(&self) -> Result<ThreadRegisters>;
}

/// Injected call-stack iteration capability
///
/// Walking a goroutine's frames requires unwind tables and frame-pointer
/// heuristics that live in the surrounding debugger; the engine only consumes
/// the resolved call locations, ordered innermost first.
pub trait StackWalker
{
    /// Resolved call-site locations of the goroutine's frames.
    fn call_frames(&self, goroutine: &Goroutine<'_>) -> Result<Vec<Location>>;
}
