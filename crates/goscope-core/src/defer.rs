//! Deferred-call chain decoding.
//!
//! The runtime keeps a goroutine's pending cleanup calls as a singly linked
//! list hanging off the goroutine struct. Each record is small: the function
//! value being deferred, the call-site program counter, and the stack pointer
//! at defer time.

use crate::error::GoscopeError;
use crate::mem::read_ptr;
use crate::variable::{LoadConfig, Variable};

/// One record of a goroutine's deferred-call chain.
pub struct Defer<'a>
{
    /// Entry address of the deferred function
    pub deferred_pc: u64,
    /// Program counter of the defer statement's call site
    pub pc: u64,
    /// Stack pointer at the time the defer was registered
    pub sp: u64,
    variable: Variable<'a>,
    /// Set when this record exists but did not decode
    pub unreadable: Option<GoscopeError>,
}

impl<'a> Defer<'a>
{
    pub(crate) fn new(variable: Variable<'a>) -> Self
    {
        Defer {
            deferred_pc: 0,
            pc: 0,
            sp: 0,
            variable,
            unreadable: None,
        }
    }

    pub(crate) fn load(&mut self)
    {
        self.variable.load_value(&LoadConfig {
            follow_pointers: false,
            max_recurse: 1,
            max_string_len: 0,
            max_array_values: 0,
            max_struct_fields: None,
        });
        if let Some(err) = &self.variable.unreadable {
            self.unreadable = Some(err.clone());
            return;
        }

        // `fn` is a pointer to a funcval whose first word is the entry PC.
        if let Some(fn_field) = self.variable.child("fn") {
            if let Some(funcval) = fn_field.value.as_u64() {
                if funcval != 0 {
                    let ptr_size = self.variable.bi.types().pointer_size();
                    match read_ptr(self.variable.mem, funcval, ptr_size) {
                        Ok(entry) => self.deferred_pc = entry,
                        Err(err) => self.unreadable = Some(err),
                    }
                }
            }
        }

        self.pc = self
            .variable
            .child("pc")
            .and_then(|child| child.value.as_u64())
            .unwrap_or(0);
        self.sp = self
            .variable
            .child("sp")
            .and_then(|child| child.value.as_u64())
            .unwrap_or(0);
    }

    /// The next record in the chain, if any.
    pub fn next(&self) -> Option<Defer<'a>>
    {
        let link = self.variable.child("link")?.maybe_dereference();
        if link.addr == 0 {
            return None;
        }
        let mut next = Defer::new(link);
        next.load();
        Some(next)
    }
}
