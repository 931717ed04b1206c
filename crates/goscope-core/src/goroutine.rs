//! Goroutine state reconstruction.
//!
//! A goroutine's bookkeeping lives in a runtime-internal struct whose layout
//! shifts between runtime versions: fields appear (`sched.bp`), change
//! representation (`waitreason` went from string to coded integer), and
//! disappear (`stkbar` left with the stack-barrier mechanism). The decoder
//! therefore probes every version-dependent field and treats absence as a
//! first-class outcome; only the handful of fields every runtime has ever
//! carried are allowed to abort a decode.

use tracing::debug;

use crate::binary::{BinaryInfo, Location};
use crate::defer::Defer;
use crate::error::{GoscopeError, Result};
use crate::mem::read_ptr;
use crate::thread::{StackWalker, Thread};
use crate::variable::{LoadConfig, Value, Variable};

/// Scheduler status of a goroutine
///
/// The ordinals mirror the runtime's status word and are a fixed,
/// version-independent contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GStatus
{
    /// Just allocated, not yet initialized
    Idle = 0,
    /// On a run queue, waiting to be scheduled
    Runnable = 1,
    /// Executing user code
    Running = 2,
    /// Blocked in a system call
    Syscall = 3,
    /// Parked by the scheduler (channel, lock, sleep, ...)
    Waiting = 4,
    /// Currently unused by the runtime, kept for tool compatibility
    MoribundUnused = 5,
    /// Exited, awaiting reuse
    Dead = 6,
    /// Enqueue transition state
    Enqueue = 7,
    /// Stack being moved by the runtime
    CopyStack = 8,
}

impl GStatus
{
    /// Map a raw status word to the enum; `None` for ordinals this contract
    /// does not know (they stay available numerically on the record).
    pub fn from_raw(raw: u64) -> Option<GStatus>
    {
        match raw {
            0 => Some(GStatus::Idle),
            1 => Some(GStatus::Runnable),
            2 => Some(GStatus::Running),
            3 => Some(GStatus::Syscall),
            4 => Some(GStatus::Waiting),
            5 => Some(GStatus::MoribundUnused),
            6 => Some(GStatus::Dead),
            7 => Some(GStatus::Enqueue),
            8 => Some(GStatus::CopyStack),
            _ => None,
        }
    }

    /// Human-readable status name.
    pub fn name(self) -> &'static str
    {
        match self {
            GStatus::Idle => "idle",
            GStatus::Runnable => "runnable",
            GStatus::Running => "running",
            GStatus::Syscall => "syscall",
            GStatus::Waiting => "waiting",
            GStatus::MoribundUnused => "moribund unused",
            GStatus::Dead => "dead",
            GStatus::Enqueue => "enqueue",
            GStatus::CopyStack => "copystack",
        }
    }
}

/// One saved return address from the legacy stack-barrier list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SavedLr
{
    /// Stack slot the return address was saved from
    pub ptr: u64,
    /// The saved return address itself
    pub val: u64,
}

/// Decoded goroutine record
///
/// Constructed once per decode by [`Goroutine::decode`], immutable
/// afterwards. Optional fields reflect what the target runtime's layout
/// actually carried; see the module docs.
#[derive(Debug)]
pub struct Goroutine<'a>
{
    /// Goroutine ID
    pub id: i64,
    /// PC of the goroutine when it was parked
    pub pc: u64,
    /// SP of the goroutine when it was parked
    pub sp: u64,
    /// BP of the goroutine when it was parked; stays 0 on layouts without
    /// the field
    pub bp: u64,
    /// PC of the `go` statement that spawned this goroutine
    pub go_pc: u64,
    /// Entry PC of the first function run on this goroutine
    pub start_pc: u64,
    /// Why the goroutine is parked; empty when not waiting or unknown
    pub wait_reason: String,
    /// Raw scheduler status word (see [`Goroutine::status`])
    pub status: u64,
    /// Upper stack bound, when the layout exposes it
    pub stack_hi: Option<u64>,
    /// Lower stack bound, when the layout exposes it
    pub stack_lo: Option<u64>,
    /// Where the goroutine currently is
    pub current_loc: Location,
    /// Set when the record was listed but could not be read
    pub unreadable: Option<GoscopeError>,
    stkbar_var: Option<Variable<'a>>,
    stkbar_pos: i64,
    variable: Variable<'a>,
}

impl<'a> Goroutine<'a>
{
    /// Reconstruct a goroutine record from a bound handle.
    ///
    /// The handle may be pointer-typed (it is dereferenced until a concrete
    /// struct is reached) or already bound to the struct itself. The
    /// top-level struct load and the identity fields are mandatory; every
    /// version-dependent field degrades individually instead of aborting.
    ///
    /// ## Errors
    ///
    /// - [`GoscopeError::NoGoroutine`] when the pointer is nil (the thread
    ///   has nothing scheduled; callers usually skip it)
    /// - the underlying read/layout error when the mandatory portion of the
    ///   struct cannot be decoded
    pub fn decode(v: Variable<'a>) -> Result<Goroutine<'a>>
    {
        let ptr_size = v.bi.types().pointer_size();

        let mut gaddr = v.addr;
        if v.ty().is_pointer() {
            gaddr = read_ptr(v.mem, v.addr, ptr_size)?;
        }
        if gaddr == 0 {
            return Err(GoscopeError::NoGoroutine {
                tid: v.thread_id().unwrap_or_default(),
            });
        }

        let mut v = v;
        while v.ty().is_pointer() {
            v = v.maybe_dereference();
        }

        v.load_value(&LoadConfig::goroutine());
        if let Some(err) = &v.unreadable {
            return Err(err.clone());
        }

        let sched = v.child("sched").ok_or_else(|| missing(&v, "sched"))?;
        let pc = required_u64(sched, "pc")?;
        let sp = required_u64(sched, "sp")?;
        // Absent on some architectures and older runtimes; zero doubles as
        // "unset", matching the runtime's own bookkeeping.
        let bp = optional_u64(sched, "bp").unwrap_or(0);

        let id = v
            .child("goid")
            .and_then(|child| child.value.as_i64())
            .ok_or_else(|| missing(&v, "goid"))?;
        let go_pc = required_u64(&v, "gopc")?;
        let start_pc = required_u64(&v, "startpc")?;

        let mut wait_reason = String::new();
        if let Some(reason) = v.child("waitreason") {
            match &reason.value {
                Value::Str(text) => wait_reason = text.clone(),
                Value::Int(_) | Value::Uint(_) => {
                    let code = reason.value.as_i64().unwrap_or(0);
                    match reason.ty().const_description(code) {
                        Some(descr) => wait_reason = descr.to_string(),
                        None => debug!(code, "wait reason code has no description"),
                    }
                }
                _ => {}
            }
        }

        let mut stack_hi = None;
        let mut stack_lo = None;
        if let Some(stack) = v.child("stack") {
            stack_hi = optional_u64(stack, "hi");
            stack_lo = optional_u64(stack, "lo");
        }

        // Stack barriers were dropped from the runtime; both fields being
        // gone is the common case and not an error.
        let stkbar_var = v.field("stkbar");
        let stkbar_pos = v
            .child("stkbarPos")
            .and_then(|child| child.value.as_i64())
            .unwrap_or(0);

        let status = v
            .child("atomicstatus")
            .and_then(|child| child.value.as_u64())
            .unwrap_or(0);

        let (file, line, function) = v.bi.pc_to_line(pc);
        let current_loc = Location {
            pc,
            file,
            line,
            function,
        };

        Ok(Goroutine {
            id,
            pc,
            sp,
            bp,
            go_pc,
            start_pc,
            wait_reason,
            status,
            stack_hi,
            stack_lo,
            current_loc,
            unreadable: None,
            stkbar_var,
            stkbar_pos,
            variable: v,
        })
    }

    /// Scheduler status, when the raw word maps to a known ordinal.
    pub fn status(&self) -> Option<GStatus>
    {
        GStatus::from_raw(self.status)
    }

    /// Presentation name for the status; unmapped ordinals show as
    /// `"unknown"` while the raw word stays available in the `status` field.
    pub fn status_name(&self) -> &'static str
    {
        match self.status() {
            Some(status) => status.name(),
            None => "unknown",
        }
    }

    /// The decoded value tree backing this record.
    pub fn variable(&self) -> &Variable<'a>
    {
        &self.variable
    }

    /// Saved position within the legacy stack-barrier list (0 on layouts
    /// without the mechanism).
    pub fn stack_barrier_pos(&self) -> i64
    {
        self.stkbar_pos
    }

    /// The top-most pending deferred call, if any.
    pub fn top_defer(&self) -> Option<Defer<'a>>
    {
        if self.variable.unreadable.is_some() {
            return None;
        }
        let head = self.variable.child("_defer")?.maybe_dereference();
        if head.addr == 0 {
            return None;
        }
        let mut defer = Defer::new(head);
        defer.load();
        Some(defer)
    }

    /// Location of the user code this goroutine is running, skipping frames
    /// that belong to the runtime's internal namespace (exported runtime
    /// entry points still count as user-visible). Falls back to
    /// [`Goroutine::current_loc`] when iteration fails or every frame is
    /// internal.
    pub fn user_current_location(&self, walker: &dyn StackWalker) -> Location
    {
        let frames = match walker.call_frames(self) {
            Ok(frames) => frames,
            Err(err) => {
                debug!(goroutine = self.id, %err, "stack iteration failed");
                return self.current_loc.clone();
            }
        };
        for frame in frames {
            if let Some(function) = &frame.function {
                let name = function.name.as_str();
                if name.contains('.') && (!name.starts_with("runtime.") || is_exported_runtime(name)) {
                    return frame;
                }
            }
        }
        self.current_loc.clone()
    }

    /// Location of the `go` statement that spawned this goroutine.
    ///
    /// `go_pc` is a return address, so when it lies past the spawning
    /// function's entry the resolution backs up by one byte to land on the
    /// call instruction; the reported `pc` stays the original value.
    pub fn spawn_location(&self) -> Location
    {
        let mut pc = self.go_pc;
        if let Some(function) = self.variable.bi.pc_to_func(self.go_pc) {
            if self.go_pc > function.entry {
                pc -= 1;
            }
        }
        let (file, line, function) = self.variable.bi.pc_to_line(pc);
        Location {
            pc: self.go_pc,
            file,
            line,
            function,
        }
    }

    /// Starting location of the goroutine (entry of its first function).
    pub fn start_location(&self) -> Location
    {
        let (file, line, function) = self.variable.bi.pc_to_line(self.start_pc);
        Location {
            pc: self.start_pc,
            file,
            line,
            function,
        }
    }

    /// The saved return addresses of the legacy stack-barrier list.
    ///
    /// Returns an empty list when the runtime layout has no stack barriers
    /// (they were removed); a list that exists but fails to decode is a real
    /// error, not a silent empty result.
    pub fn stkbar(&self) -> Result<Vec<SavedLr>>
    {
        let Some(var) = &self.stkbar_var else {
            return Ok(Vec::new());
        };
        let mut var = var.clone();
        let len = var
            .slice_len()
            .map_err(|err| GoscopeError::UnreadableStackBarrier(err.to_string()))?;
        var.load_value(&LoadConfig::stack_barrier(len));
        if let Some(err) = &var.unreadable {
            return Err(GoscopeError::UnreadableStackBarrier(err.to_string()));
        }

        let mut saved = Vec::with_capacity(var.children.len());
        for element in &var.children {
            let mut lr = SavedLr::default();
            for field in &element.children {
                match field.name.as_str() {
                    "savedLRPtr" => lr.ptr = field.value.as_u64().unwrap_or(0),
                    "savedLRVal" => lr.val = field.value.as_u64().unwrap_or(0),
                    _ => {}
                }
            }
            saved.push(lr);
        }
        Ok(saved)
    }

    /// Decode up to `n` ancestor records (the goroutines that transitively
    /// spawned this one). Runtimes built without ancestor tracking simply
    /// yield an empty list.
    pub fn ancestors(&self, n: u64) -> Result<Vec<Ancestor<'a>>>
    {
        let Some(av) = self.variable.field("ancestors") else {
            return Ok(Vec::new());
        };
        let mut av = av.maybe_dereference();
        if av.addr == 0 {
            return Ok(Vec::new());
        }
        if let Some(err) = &av.unreadable {
            return Err(err.clone());
        }
        let len = av.slice_len()?;
        av.load_value(&LoadConfig {
            follow_pointers: false,
            max_recurse: 1,
            max_string_len: 0,
            max_array_values: len.min(n),
            max_struct_fields: None,
        });
        if let Some(err) = &av.unreadable {
            return Err(err.clone());
        }

        let mut ancestors = Vec::with_capacity(av.children.len());
        for record in &av.children {
            ancestors.push(Ancestor {
                id: record.child("goid").and_then(|child| child.value.as_i64()).unwrap_or(0),
                unreadable: record.unreadable.clone(),
                pcs_var: record.field("pcs"),
            });
        }
        Ok(ancestors)
    }
}

/// A goroutine's ancestor: the goroutine that spawned it
///
/// The saved return addresses are walked lazily; the record itself only
/// carries the identity.
pub struct Ancestor<'a>
{
    /// Goroutine ID of the ancestor
    pub id: i64,
    /// Set when the ancestor record could not be read
    pub unreadable: Option<GoscopeError>,
    pcs_var: Option<Variable<'a>>,
}

impl Ancestor<'_>
{
    /// Up to `n` saved return addresses of the ancestor's spawn-time stack.
    pub fn return_addresses(&self, n: u64) -> Result<Vec<u64>>
    {
        if let Some(err) = &self.unreadable {
            return Err(err.clone());
        }
        let Some(pcs) = &self.pcs_var else {
            return Ok(Vec::new());
        };
        let mut pcs = pcs.clone();
        let len = pcs.slice_len()?;
        pcs.load_value(&LoadConfig {
            follow_pointers: false,
            max_recurse: 1,
            max_string_len: 0,
            max_array_values: len.min(n),
            max_struct_fields: None,
        });
        if let Some(err) = &pcs.unreadable {
            return Err(err.clone());
        }
        Ok(pcs
            .children
            .iter()
            .filter_map(|child| child.value.as_u64())
            .collect())
    }
}

/// Resolve the handle for the goroutine currently scheduled on `thread`.
///
/// Architectures with a dedicated goroutine register are read directly;
/// otherwise the address comes from thread-local storage at the configured
/// offset. When the addressing mode leaves one dereference pending, the
/// handle is wrapped in a synthetic pointer type so
/// [`Goroutine::decode`] applies a uniform dereference step either way.
pub fn goroutine_handle<'a, T>(thread: &'a T, bi: &'a dyn BinaryInfo) -> Result<Variable<'a>>
where
    T: Thread,
{
    let regs = thread.registers()?;
    let arch = thread.arch();

    let gaddr = match regs.g_register {
        Some(addr) => addr,
        None => read_ptr(
            thread,
            regs.tls.wrapping_add(bi.g_struct_offset()),
            arch.pointer_size(),
        )?,
    };

    let g_type = bi.find_type("runtime.g")?;
    let (name, type_id) = if arch.tls_indirect() {
        (String::new(), bi.types().pointer_to(g_type))
    } else {
        ("runtime.curg".to_string(), g_type)
    };

    Ok(Variable::new(name, gaddr, type_id, thread, bi).with_thread(thread.thread_id()))
}

fn is_exported_runtime(name: &str) -> bool
{
    const PREFIX: &str = "runtime.";
    name.len() > PREFIX.len()
        && name.starts_with(PREFIX)
        && name.as_bytes()[PREFIX.len()].is_ascii_uppercase()
}

fn missing(v: &Variable<'_>, field: &str) -> GoscopeError
{
    GoscopeError::MissingField {
        type_name: v.ty().name.clone(),
        field: field.to_string(),
    }
}

fn required_u64(v: &Variable<'_>, field: &str) -> Result<u64>
{
    let child = v.child(field).ok_or_else(|| missing(v, field))?;
    if let Some(err) = &child.unreadable {
        return Err(err.clone());
    }
    child
        .value
        .as_u64()
        .ok_or_else(|| GoscopeError::MalformedDebugInfo(format!("field {field} has no scalar value")))
}

fn optional_u64(v: &Variable<'_>, field: &str) -> Option<u64>
{
    v.child(field).and_then(|child| child.value.as_u64())
}
