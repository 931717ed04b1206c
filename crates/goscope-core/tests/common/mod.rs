//! Shared fakes for exercising the decoders against synthetic targets.
#![allow(dead_code)]

use std::collections::HashMap;

use goscope_core::binary::{BinaryInfo, Function};
use goscope_core::error::{GoscopeError, Result};
use goscope_core::mem::MemoryReader;
use goscope_core::thread::{Arch, Thread, ThreadId, ThreadRegisters};
use goscope_core::types::{ConstValue, GoType, StructField, TypeId, TypeKind, TypeRegistry};

pub const PTR: u8 = 8;

// Field offsets of the synthetic runtime.g layout (8-byte pointers).
pub const O_STACK_LO: u64 = 0;
pub const O_STACK_HI: u64 = 8;
pub const O_SCHED: u64 = 16;
pub const O_SCHED_PC: u64 = 16;
pub const O_SCHED_SP: u64 = 24;
pub const O_SCHED_BP: u64 = 32;
pub const O_GOID: u64 = 40;
pub const O_GOPC: u64 = 48;
pub const O_STARTPC: u64 = 56;
pub const O_WAITREASON: u64 = 64;
pub const O_STATUS: u64 = 80;
pub const O_DEFER: u64 = 88;
pub const O_STKBAR: u64 = 96;
pub const O_STKBAR_POS: u64 = 120;
pub const O_ANCESTORS: u64 = 128;
pub const G_SIZE: u64 = 136;

// Synthetic runtime._defer layout.
pub const O_DEFER_FN: u64 = 0;
pub const O_DEFER_PC: u64 = 8;
pub const O_DEFER_SP: u64 = 16;
pub const O_DEFER_LINK: u64 = 24;

// Synthetic runtime.ancestorInfo layout.
pub const O_ANC_PCS: u64 = 0;
pub const O_ANC_GOID: u64 = 24;
pub const ANC_SIZE: u64 = 40;

/// Byte-addressable fake target memory.
#[derive(Default, Clone)]
pub struct FakeMemory
{
    bytes: HashMap<u64, u8>,
}

impl FakeMemory
{
    pub fn new() -> Self
    {
        FakeMemory::default()
    }

    pub fn write_bytes(&mut self, addr: u64, data: &[u8])
    {
        for (index, byte) in data.iter().enumerate() {
            self.bytes.insert(addr + index as u64, *byte);
        }
    }

    pub fn write_u8(&mut self, addr: u64, value: u8)
    {
        self.write_bytes(addr, &[value]);
    }

    pub fn write_u32(&mut self, addr: u64, value: u32)
    {
        self.write_bytes(addr, &value.to_le_bytes());
    }

    pub fn write_u64(&mut self, addr: u64, value: u64)
    {
        self.write_bytes(addr, &value.to_le_bytes());
    }

    /// Write a Go string: header (data pointer, length) at `header`, bytes
    /// at `data`.
    pub fn write_string(&mut self, header: u64, data: u64, text: &str)
    {
        self.write_u64(header, data);
        self.write_u64(header + u64::from(PTR), text.len() as u64);
        self.write_bytes(data, text.as_bytes());
    }

    /// Write a Go slice header (data pointer, length, capacity).
    pub fn write_slice_header(&mut self, header: u64, data: u64, len: u64, cap: u64)
    {
        self.write_u64(header, data);
        self.write_u64(header + u64::from(PTR), len);
        self.write_u64(header + 2 * u64::from(PTR), cap);
    }
}

impl MemoryReader for FakeMemory
{
    fn read_memory(&self, buf: &mut [u8], addr: u64) -> Result<()>
    {
        for (index, slot) in buf.iter_mut().enumerate() {
            let at = addr + index as u64;
            match self.bytes.get(&at) {
                Some(byte) => *slot = *byte,
                None => {
                    return Err(GoscopeError::ReadFailed {
                        address: at,
                        reason: "unmapped".to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// In-memory binary-info double: a registry plus PC lookup tables.
pub struct FakeBinaryInfo
{
    registry: TypeRegistry,
    g_offset: u64,
    lines: HashMap<u64, (String, u64)>,
    funcs: Vec<Function>,
}

impl FakeBinaryInfo
{
    pub fn new(registry: TypeRegistry) -> Self
    {
        FakeBinaryInfo {
            registry,
            g_offset: 0,
            lines: HashMap::new(),
            funcs: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_g_offset(mut self, offset: u64) -> Self
    {
        self.g_offset = offset;
        self
    }

    #[must_use]
    pub fn with_line(mut self, pc: u64, file: &str, line: u64) -> Self
    {
        self.lines.insert(pc, (file.to_string(), line));
        self
    }

    #[must_use]
    pub fn with_func(mut self, name: &str, entry: u64) -> Self
    {
        self.funcs.push(Function {
            name: name.to_string(),
            entry,
        });
        self
    }
}

impl BinaryInfo for FakeBinaryInfo
{
    fn types(&self) -> &TypeRegistry
    {
        &self.registry
    }

    fn find_type(&self, name: &str) -> Result<TypeId>
    {
        self.registry
            .lookup(name)
            .ok_or_else(|| GoscopeError::TypeNotFound(name.to_string()))
    }

    fn pc_to_line(&self, pc: u64) -> (String, u64, Option<Function>)
    {
        let (file, line) = self.lines.get(&pc).cloned().unwrap_or_default();
        (file, line, self.pc_to_func(pc))
    }

    fn pc_to_func(&self, pc: u64) -> Option<Function>
    {
        self.funcs
            .iter()
            .filter(|function| function.entry <= pc)
            .max_by_key(|function| function.entry)
            .cloned()
    }

    fn g_struct_offset(&self) -> u64
    {
        self.g_offset
    }
}

/// Thread double: fake memory plus a canned register snapshot.
pub struct FakeThread
{
    pub mem: FakeMemory,
    pub tid: u32,
    pub arch: Arch,
    pub regs: ThreadRegisters,
}

impl MemoryReader for FakeThread
{
    fn read_memory(&self, buf: &mut [u8], addr: u64) -> Result<()>
    {
        self.mem.read_memory(buf, addr)
    }
}

impl Thread for FakeThread
{
    fn thread_id(&self) -> ThreadId
    {
        ThreadId(self.tid)
    }

    fn arch(&self) -> Arch
    {
        self.arch
    }

    fn registers(&self) -> Result<ThreadRegisters>
    {
        Ok(self.regs)
    }
}

/// Options for the synthetic runtime.g type layout.
pub struct GTypeOptions
{
    pub with_bp: bool,
    pub with_stkbar: bool,
    pub numeric_wait_reason: bool,
    pub with_ancestors: bool,
}

impl Default for GTypeOptions
{
    fn default() -> Self
    {
        GTypeOptions {
            with_bp: true,
            with_stkbar: false,
            numeric_wait_reason: false,
            with_ancestors: false,
        }
    }
}

pub fn field(name: &str, ty: TypeId, offset: u64) -> StructField
{
    StructField {
        name: name.to_string(),
        ty,
        offset,
    }
}

/// Build a registry describing the synthetic runtime.g and its satellites.
pub fn g_registry(opts: &GTypeOptions) -> TypeRegistry
{
    let reg = TypeRegistry::new(PTR);
    let ptr_bytes = u64::from(PTR);

    let uintptr = reg.insert(GoType::uint("uintptr", ptr_bytes));
    let int64 = reg.insert(GoType::int("int64", 8));
    let uint32 = reg.insert(GoType::uint("uint32", 4));
    let string = reg.insert(GoType::string(PTR));

    let stack = reg.insert(GoType::struct_type(
        "runtime.stack",
        16,
        vec![field("lo", uintptr, 0), field("hi", uintptr, 8)],
    ));

    let mut gobuf_fields = vec![field("pc", uintptr, 0), field("sp", uintptr, 8)];
    if opts.with_bp {
        gobuf_fields.push(field("bp", uintptr, 16));
    }
    let gobuf = reg.insert(GoType::struct_type("runtime.gobuf", 24, gobuf_fields));

    let funcval = reg.insert(GoType::struct_type(
        "runtime.funcval",
        ptr_bytes,
        vec![field("fn", uintptr, 0)],
    ));
    let funcval_ptr = reg.pointer_to(funcval);

    // runtime._defer links to itself, so its slot is reserved first.
    let defer = reg.reserve("runtime._defer", 32);
    let defer_ptr = reg.pointer_to(defer);
    reg.replace(
        defer,
        GoType::struct_type(
            "runtime._defer",
            32,
            vec![
                field("fn", funcval_ptr, O_DEFER_FN),
                field("pc", uintptr, O_DEFER_PC),
                field("sp", uintptr, O_DEFER_SP),
                field("link", defer_ptr, O_DEFER_LINK),
            ],
        ),
    );

    let wait_reason = if opts.numeric_wait_reason {
        reg.insert(GoType::uint("runtime.waitReason", 1).with_consts(vec![
            ConstValue {
                name: "chan receive".to_string(),
                value: 14,
            },
            ConstValue {
                name: "GC assist wait".to_string(),
                value: 1,
            },
        ]))
    } else {
        string
    };

    let mut g_fields = vec![
        field("stack", stack, 0),
        field("sched", gobuf, O_SCHED),
        field("goid", int64, O_GOID),
        field("gopc", uintptr, O_GOPC),
        field("startpc", uintptr, O_STARTPC),
        field("waitreason", wait_reason, O_WAITREASON),
        field("atomicstatus", uint32, O_STATUS),
        field("_defer", defer_ptr, O_DEFER),
    ];

    if opts.with_stkbar {
        let stkbar_elem = reg.insert(GoType::struct_type(
            "runtime.stkbar",
            16,
            vec![field("savedLRPtr", uintptr, 0), field("savedLRVal", uintptr, 8)],
        ));
        let stkbar_slice = reg.insert(GoType {
            name: "[]runtime.stkbar".to_string(),
            byte_size: 3 * ptr_bytes,
            kind: TypeKind::Slice { elem: stkbar_elem },
            consts: Vec::new(),
        });
        g_fields.push(field("stkbar", stkbar_slice, O_STKBAR));
        g_fields.push(field("stkbarPos", int64, O_STKBAR_POS));
    }

    if opts.with_ancestors {
        let uintptr_slice = reg.insert(GoType {
            name: "[]uintptr".to_string(),
            byte_size: 3 * ptr_bytes,
            kind: TypeKind::Slice { elem: uintptr },
            consts: Vec::new(),
        });
        let ancestor_info = reg.insert(GoType::struct_type(
            "runtime.ancestorInfo",
            ANC_SIZE,
            vec![
                field("pcs", uintptr_slice, O_ANC_PCS),
                field("goid", int64, O_ANC_GOID),
            ],
        ));
        let ancestor_slice = reg.insert(GoType {
            name: "[]runtime.ancestorInfo".to_string(),
            byte_size: 3 * ptr_bytes,
            kind: TypeKind::Slice { elem: ancestor_info },
            consts: Vec::new(),
        });
        g_fields.push(field("ancestors", reg.pointer_to(ancestor_slice), O_ANCESTORS));
    }

    reg.insert(GoType::struct_type("runtime.g", G_SIZE, g_fields));
    reg
}

/// Scalar portion of a synthetic goroutine struct.
pub struct GSpec
{
    pub addr: u64,
    pub goid: i64,
    pub pc: u64,
    pub sp: u64,
    pub bp: u64,
    pub gopc: u64,
    pub startpc: u64,
    pub status: u32,
    pub stack_lo: u64,
    pub stack_hi: u64,
}

impl Default for GSpec
{
    fn default() -> Self
    {
        GSpec {
            addr: 0x1000,
            goid: 1,
            pc: 0,
            sp: 0,
            bp: 0,
            gopc: 0,
            startpc: 0,
            status: 0,
            stack_lo: 0,
            stack_hi: 0,
        }
    }
}

/// Write the scalar fields of a goroutine struct into fake memory.
///
/// Wait reason, defer chain, stack barriers, and ancestors are laid down by
/// the individual tests that need them; this only guarantees the mandatory
/// fields (and the `_defer` head, which defaults to nil) are mapped.
pub fn write_g(mem: &mut FakeMemory, spec: &GSpec)
{
    mem.write_u64(spec.addr + O_STACK_LO, spec.stack_lo);
    mem.write_u64(spec.addr + O_STACK_HI, spec.stack_hi);
    mem.write_u64(spec.addr + O_SCHED_PC, spec.pc);
    mem.write_u64(spec.addr + O_SCHED_SP, spec.sp);
    mem.write_u64(spec.addr + O_SCHED_BP, spec.bp);
    mem.write_u64(spec.addr + O_GOID, spec.goid as u64);
    mem.write_u64(spec.addr + O_GOPC, spec.gopc);
    mem.write_u64(spec.addr + O_STARTPC, spec.startpc);
    // empty wait-reason string header
    mem.write_u64(spec.addr + O_WAITREASON, 0);
    mem.write_u64(spec.addr + O_WAITREASON + u64::from(PTR), 0);
    mem.write_u32(spec.addr + O_STATUS, spec.status);
    mem.write_u64(spec.addr + O_DEFER, 0);
}
