//! Typed memory access: binding addresses to type descriptors and decoding
//! value trees out of raw process memory.
//!
//! A [`Variable`] is a handle `(address, type)` plus the capabilities needed
//! to chase it: a memory reader and the binary info owning the type
//! descriptors. Handles are cheap to create and nothing is read until
//! [`Variable::load_value`] runs. Loading is *bounded*: remote memory can be
//! corrupt or adversarial, so every recursive walk carries explicit limits
//! and records where it had to give up instead of failing the whole tree.

use std::fmt;

use tracing::debug;

use crate::binary::BinaryInfo;
use crate::error::GoscopeError;
use crate::mem::{read_ptr, read_uint, sign_extend, MemoryReader};
use crate::thread::ThreadId;
use crate::types::{GoType, TypeId, TypeKind};

/// Limits applied by [`Variable::load_value`]
///
/// These bounds are the engine's only cancellation mechanism: a
/// self-referential or oversized structure terminates against them rather
/// than hanging the caller.
#[derive(Debug, Clone)]
pub struct LoadConfig
{
    /// Follow pointer fields below the top level
    pub follow_pointers: bool,
    /// Maximum recursion depth through pointers and aggregates
    pub max_recurse: u32,
    /// Maximum number of string bytes to fetch; longer strings are clamped
    pub max_string_len: u64,
    /// Maximum number of array/slice elements to decode
    pub max_array_values: u64,
    /// Maximum struct fields to decode; `None` means all of them
    pub max_struct_fields: Option<usize>,
}

impl LoadConfig
{
    /// Limits used for the mandatory top-level goroutine struct load.
    pub fn goroutine() -> Self
    {
        LoadConfig {
            follow_pointers: false,
            max_recurse: 2,
            max_string_len: 64,
            max_array_values: 0,
            max_struct_fields: None,
        }
    }

    /// Limits for decoding a stack-barrier list of known length.
    pub fn stack_barrier(len: u64) -> Self
    {
        LoadConfig {
            follow_pointers: false,
            max_recurse: 1,
            max_string_len: 0,
            max_array_values: len,
            max_struct_fields: Some(3),
        }
    }
}

/// A decoded scalar or container value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value
{
    /// Not loaded yet (fresh handle) or unreadable
    None,
    /// Signed integer
    Int(i64),
    /// Unsigned integer
    Uint(u64),
    /// Boolean
    Bool(bool),
    /// Float
    Float(f64),
    /// String contents (possibly clamped to the configured length)
    Str(String),
    /// Pointer target address (also used for function values)
    Ptr(u64),
    /// Struct marker; the members live in `children`
    Struct,
    /// Array marker carrying the declared element count
    Array(u64),
    /// Slice header
    Slice
    {
        /// Element count
        len: u64,
        /// Capacity
        cap: u64,
    },
    /// Map reference carrying the entry count from the runtime header
    Map
    {
        /// Number of live entries
        count: i64,
    },
}

impl Value
{
    /// Coerce to an unsigned machine word, when the value is numeric.
    pub fn as_u64(&self) -> Option<u64>
    {
        match self {
            Value::Int(v) => Some(*v as u64),
            Value::Uint(v) | Value::Ptr(v) => Some(*v),
            _ => None,
        }
    }

    /// Coerce to a signed integer, when the value is numeric.
    pub fn as_i64(&self) -> Option<i64>
    {
        match self {
            Value::Int(v) => Some(*v),
            Value::Uint(v) | Value::Ptr(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Borrow the string contents, when the value is a string.
    pub fn as_str(&self) -> Option<&str>
    {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Typed handle on a region of target memory
///
/// Each decode request builds a fresh tree owned by the caller; children are
/// owned by their parent. A node whose `unreadable` is set must not be used
/// as a valid value; it marks *where* decoding failed without discarding
/// siblings that already decoded.
#[derive(Clone)]
pub struct Variable<'a>
{
    /// Display name (field name, element index, or type name)
    pub name: String,
    /// Address the handle is bound to
    pub addr: u64,
    /// Descriptor of the value at `addr`
    pub type_id: TypeId,
    /// Decoded value, `Value::None` until loaded
    pub value: Value,
    /// Decoded members/elements, in declaration order
    pub children: Vec<Variable<'a>>,
    /// Set when decoding this node failed; siblings stay valid
    pub unreadable: Option<GoscopeError>,
    pub(crate) mem: &'a dyn MemoryReader,
    pub(crate) bi: &'a dyn BinaryInfo,
    pub(crate) thread: Option<ThreadId>,
}

impl fmt::Debug for Variable<'_>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("Variable")
            .field("name", &self.name)
            .field("addr", &format_args!("{:#x}", self.addr))
            .field("value", &self.value)
            .field("children", &self.children.len())
            .field("unreadable", &self.unreadable)
            .finish()
    }
}

impl<'a> Variable<'a>
{
    /// Bind a fresh, unloaded handle.
    pub fn new(
        name: impl Into<String>,
        addr: u64,
        type_id: TypeId,
        mem: &'a dyn MemoryReader,
        bi: &'a dyn BinaryInfo,
    ) -> Self
    {
        Variable {
            name: name.into(),
            addr,
            type_id,
            value: Value::None,
            children: Vec::new(),
            unreadable: None,
            mem,
            bi,
            thread: None,
        }
    }

    /// Record the thread this handle was resolved from (used in
    /// no-goroutine reporting).
    #[must_use]
    pub(crate) fn with_thread(mut self, tid: ThreadId) -> Self
    {
        self.thread = Some(tid);
        self
    }

    /// Thread the handle was resolved from, if any.
    pub fn thread_id(&self) -> Option<ThreadId>
    {
        self.thread
    }

    /// Descriptor of this handle's type.
    pub fn ty(&self) -> std::sync::Arc<GoType>
    {
        self.bi.types().get(self.type_id)
    }

    fn bind(&self, name: impl Into<String>, addr: u64, type_id: TypeId) -> Variable<'a>
    {
        let mut child = Variable::new(name, addr, type_id, self.mem, self.bi);
        child.thread = self.thread;
        child
    }

    /// Bind a fresh handle to a struct member, by name.
    ///
    /// Returns `None` when this handle's type is not a struct or has no such
    /// member. Absence is the normal signal for version-dependent fields;
    /// callers branch on it rather than treating it as an error.
    pub fn field(&self, name: &str) -> Option<Variable<'a>>
    {
        let ty = self.ty();
        let field = ty.field(name)?;
        Some(self.bind(field.name.clone(), self.addr.wrapping_add(field.offset), field.ty))
    }

    /// Look up an already-loaded member/element by name.
    pub fn child(&self, name: &str) -> Option<&Variable<'a>>
    {
        self.children.iter().find(|child| child.name == name)
    }

    /// Dereference a pointer handle once; non-pointers come back unchanged.
    ///
    /// A zero target produces a handle bound to address 0 whose later load
    /// reports a nil dereference instead of crashing. A failed read of the
    /// pointer word produces a handle with `unreadable` already set.
    pub fn maybe_dereference(&self) -> Variable<'a>
    {
        let ty = self.ty();
        let TypeKind::Pointer { elem } = ty.kind else {
            return self.clone();
        };
        let ptr_size = self.bi.types().pointer_size();
        match read_ptr(self.mem, self.addr, ptr_size) {
            Ok(target) => self.bind(self.name.clone(), target, elem),
            Err(err) => {
                let mut failed = self.bind(self.name.clone(), 0, elem);
                failed.unreadable = Some(err);
                failed
            }
        }
    }

    /// Length word of a slice handle, read without loading the elements.
    ///
    /// ## Errors
    ///
    /// Fails when this handle is not slice-typed or the header is unreadable.
    pub fn slice_len(&self) -> crate::error::Result<u64>
    {
        let ty = self.ty();
        if !matches!(ty.kind, TypeKind::Slice { .. }) {
            return Err(GoscopeError::MalformedDebugInfo(format!(
                "{} is not a slice type",
                ty.name
            )));
        }
        let ptr_size = self.bi.types().pointer_size();
        read_uint(self.mem, self.addr.wrapping_add(u64::from(ptr_size)), ptr_size)
    }

    /// Recursively decode the value behind this handle, within `cfg` limits.
    ///
    /// Failures and limit hits set `unreadable` on the node they occurred at
    /// and leave every other node intact.
    pub fn load_value(&mut self, cfg: &LoadConfig)
    {
        self.load_internal(cfg, 0);
    }

    fn load_internal(&mut self, cfg: &LoadConfig, depth: u32)
    {
        if self.unreadable.is_some() {
            return;
        }
        if self.addr == 0 {
            self.unreadable = Some(GoscopeError::NilDereference(self.display_name()));
            return;
        }

        let ty = self.ty();
        let ptr_size = self.bi.types().pointer_size();

        // Aggregates and pointer chases are bounded by depth; scalars always
        // decode once reached.
        let bounded = matches!(
            ty.kind,
            TypeKind::Pointer { .. } | TypeKind::Struct { .. } | TypeKind::Array { .. } | TypeKind::Slice { .. } | TypeKind::Map { .. }
        );
        if bounded && depth > cfg.max_recurse {
            debug!(name = %self.display_name(), depth, "load limit reached");
            self.unreadable = Some(GoscopeError::LoadLimit(self.display_name()));
            return;
        }

        match &ty.kind {
            TypeKind::Int => match read_uint(self.mem, self.addr, scalar_size(ty.byte_size)) {
                Ok(raw) => self.value = Value::Int(sign_extend(raw, scalar_size(ty.byte_size))),
                Err(err) => self.unreadable = Some(err),
            },
            TypeKind::Uint => match read_uint(self.mem, self.addr, scalar_size(ty.byte_size)) {
                Ok(raw) => self.value = Value::Uint(raw),
                Err(err) => self.unreadable = Some(err),
            },
            TypeKind::Bool => match read_uint(self.mem, self.addr, 1) {
                Ok(raw) => self.value = Value::Bool(raw != 0),
                Err(err) => self.unreadable = Some(err),
            },
            TypeKind::Float => match read_uint(self.mem, self.addr, scalar_size(ty.byte_size)) {
                Ok(raw) if ty.byte_size == 4 => self.value = Value::Float(f64::from(f32::from_bits(raw as u32))),
                Ok(raw) if ty.byte_size == 8 => self.value = Value::Float(f64::from_bits(raw)),
                Ok(_) => {
                    self.unreadable = Some(GoscopeError::MalformedDebugInfo(format!(
                        "float {} has size {}",
                        ty.name, ty.byte_size
                    )));
                }
                Err(err) => self.unreadable = Some(err),
            },
            TypeKind::String => self.load_string(cfg, ptr_size),
            TypeKind::Func => match read_ptr(self.mem, self.addr, ptr_size) {
                Ok(target) => self.value = Value::Ptr(target),
                Err(err) => self.unreadable = Some(err),
            },
            TypeKind::Pointer { elem } => {
                let elem = *elem;
                match read_ptr(self.mem, self.addr, ptr_size) {
                    Ok(target) => {
                        self.value = Value::Ptr(target);
                        // The top level always loads through one pointer so a
                        // handle bound to `*T` yields a usable `T`; deeper
                        // pointers are only chased when asked to.
                        if target != 0 && (cfg.follow_pointers || depth == 0) {
                            let mut pointee = self.bind(self.name.clone(), target, elem);
                            pointee.load_internal(cfg, depth + 1);
                            self.children.push(pointee);
                        }
                    }
                    Err(err) => self.unreadable = Some(err),
                }
            }
            TypeKind::Struct { fields, .. } => {
                let limit = cfg.max_struct_fields.unwrap_or(fields.len());
                for field in fields.iter().take(limit) {
                    let mut child = self.bind(field.name.clone(), self.addr.wrapping_add(field.offset), field.ty);
                    child.load_internal(cfg, depth + 1);
                    self.children.push(child);
                }
                if fields.len() > limit {
                    debug!(name = %self.display_name(), loaded = limit, total = fields.len(), "struct fields truncated");
                }
                self.value = Value::Struct;
            }
            TypeKind::Array { elem, len } => {
                let (elem, len) = (*elem, *len);
                let elem_size = self.bi.types().get(elem).byte_size;
                let count = len.min(cfg.max_array_values);
                for index in 0..count {
                    let addr = self.addr.wrapping_add(index.wrapping_mul(elem_size));
                    let mut child = self.bind(format!("[{index}]"), addr, elem);
                    child.load_internal(cfg, depth + 1);
                    self.children.push(child);
                }
                if len > count {
                    debug!(name = %self.display_name(), loaded = count, total = len, "array elements truncated");
                }
                self.value = Value::Array(len);
            }
            TypeKind::Slice { elem } => {
                let elem = *elem;
                self.load_slice(cfg, depth, ptr_size, elem);
            }
            TypeKind::Map { .. } => match read_ptr(self.mem, self.addr, ptr_size) {
                // The entry count is the first word of the runtime map
                // header; entry enumeration is out of scope here.
                Ok(0) => self.value = Value::Map { count: 0 },
                Ok(header) => match read_uint(self.mem, header, ptr_size) {
                    Ok(raw) => self.value = Value::Map { count: sign_extend(raw, ptr_size) },
                    Err(err) => self.unreadable = Some(err),
                },
                Err(err) => self.unreadable = Some(err),
            },
        }
    }

    fn load_string(&mut self, cfg: &LoadConfig, ptr_size: u8)
    {
        let header = read_ptr(self.mem, self.addr, ptr_size).and_then(|base| {
            read_uint(self.mem, self.addr.wrapping_add(u64::from(ptr_size)), ptr_size).map(|len| (base, len))
        });
        let (base, len) = match header {
            Ok(pair) => pair,
            Err(err) => {
                self.unreadable = Some(err);
                return;
            }
        };

        let count = len.min(cfg.max_string_len);
        if count == 0 {
            self.value = Value::Str(String::new());
            return;
        }
        if base == 0 {
            self.unreadable = Some(GoscopeError::NilDereference(self.display_name()));
            return;
        }

        let mut bytes = vec![0u8; count as usize];
        match self.mem.read_memory(&mut bytes, base) {
            Ok(()) => {
                if len > count {
                    debug!(name = %self.display_name(), loaded = count, total = len, "string clamped");
                }
                self.value = Value::Str(String::from_utf8_lossy(&bytes).into_owned());
            }
            Err(err) => self.unreadable = Some(err),
        }
    }

    fn load_slice(&mut self, cfg: &LoadConfig, depth: u32, ptr_size: u8, elem: TypeId)
    {
        let ps = u64::from(ptr_size);
        let header = read_ptr(self.mem, self.addr, ptr_size).and_then(|base| {
            read_uint(self.mem, self.addr.wrapping_add(ps), ptr_size).and_then(|len| {
                read_uint(self.mem, self.addr.wrapping_add(2 * ps), ptr_size).map(|cap| (base, len, cap))
            })
        });
        let (base, len, cap) = match header {
            Ok(triple) => triple,
            Err(err) => {
                self.unreadable = Some(err);
                return;
            }
        };

        let elem_size = self.bi.types().get(elem).byte_size;
        let count = len.min(cfg.max_array_values);
        for index in 0..count {
            let addr = base.wrapping_add(index.wrapping_mul(elem_size));
            let mut child = self.bind(format!("[{index}]"), addr, elem);
            child.load_internal(cfg, depth + 1);
            self.children.push(child);
        }
        if len > count {
            debug!(name = %self.display_name(), loaded = count, total = len, "slice elements truncated");
        }
        self.value = Value::Slice { len, cap };
    }

    fn display_name(&self) -> String
    {
        if self.name.is_empty() {
            self.ty().name.clone()
        } else {
            self.name.clone()
        }
    }
}

fn scalar_size(byte_size: u64) -> u8
{
    u8::try_from(byte_size).unwrap_or(0)
}
