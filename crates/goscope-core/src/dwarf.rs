//! DWARF-backed implementation of the [`BinaryInfo`] capability.
//!
//! Loads the target executable once, keeps its debug sections in memory, and
//! materializes type descriptors on demand: `find_type` walks the DIE tree
//! for a matching name and converts the subgraph reachable from it into
//! [`GoType`] entries in the registry. Go's runtime types are heavily
//! self-referential, so materialization reserves a placeholder slot before
//! recursing and patches it afterwards.
//!
//! PC resolution goes through `addr2line` for file/line and through a sorted
//! subprogram table (built lazily from the same DWARF) for function names
//! and entry addresses.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock};

use addr2line::Context;
use gimli::{constants, AttributeValue, DebuggingInformationEntry, Dwarf, EndianArcSlice, Reader, RunTimeEndian, SectionId, Unit, UnitOffset, UnitSectionOffset};
use object::{Object, ObjectSection};
use once_cell::sync::OnceCell;
use tracing::debug;

use crate::binary::{BinaryInfo, Function};
use crate::error::{GoscopeError, Result};
use crate::types::{GoType, StructField, TypeId, TypeKind, TypeRegistry};

type OwnedReader = EndianArcSlice<RunTimeEndian>;
type OwnedDwarf = Dwarf<OwnedReader>;

// reflect.Kind values carried in the Go compiler's DW_AT_go_kind extension.
const GO_KIND_MAP: u64 = 21;
const GO_KIND_SLICE: u64 = 23;
const GO_KIND_STRING: u64 = 24;

// Go DWARF extension attributes.
const DW_AT_GO_KIND: gimli::DwAt = gimli::DwAt(0x2900);
const DW_AT_GO_KEY: gimli::DwAt = gimli::DwAt(0x2901);
const DW_AT_GO_ELEM: gimli::DwAt = gimli::DwAt(0x2902);

const MAX_TYPE_REF_DEPTH: usize = 64;

/// Debug info for one target binary, backed by its DWARF sections.
pub struct DwarfBinaryInfo
{
    registry: TypeRegistry,
    endian: RunTimeEndian,
    pointer_size: u8,
    load_bias: i64,
    g_struct_offset: u64,
    debug_sections: HashMap<&'static str, Arc<[u8]>>,
    dwarf_cache: OnceCell<OwnedDwarf>,
    unit_cache: OnceCell<Vec<Unit<OwnedReader>>>,
    context_cache: OnceCell<Context<OwnedReader>>,
    function_cache: OnceCell<Vec<FuncEntry>>,
    opaque_cache: OnceCell<TypeId>,
    // (unit index, DIE offset) -> materialized descriptor
    by_offset: RwLock<HashMap<(usize, usize), TypeId>>,
}

#[derive(Debug, Clone)]
struct FuncEntry
{
    entry: u64,
    end: u64,
    name: String,
}

impl DwarfBinaryInfo
{
    /// Parse `path` and prepare lazily evaluated debug info.
    ///
    /// `g_struct_offset` is the offset of the goroutine pointer within
    /// thread-local storage for the target platform.
    ///
    /// ## Errors
    ///
    /// [`GoscopeError::BinaryLoad`] when the file cannot be read or parsed.
    pub fn load(path: &Path, g_struct_offset: u64) -> Result<Self>
    {
        let bytes = fs::read(path).map_err(|err| GoscopeError::BinaryLoad(format!("{}: {err}", path.display())))?;
        let data = Arc::<[u8]>::from(bytes);
        let file = object::File::parse(&*data)
            .map_err(|err| GoscopeError::BinaryLoad(format!("failed to parse {}: {err}", path.display())))?;

        let endian = if file.is_little_endian() {
            RunTimeEndian::Little
        } else {
            RunTimeEndian::Big
        };
        let pointer_size: u8 = if file.is_64() { 8 } else { 4 };

        let mut sections = HashMap::new();
        for (canonical, aliases) in DWARF_SECTIONS {
            sections.insert(*canonical, load_section_bytes(&file, aliases));
        }

        Ok(DwarfBinaryInfo {
            registry: TypeRegistry::new(pointer_size),
            endian,
            pointer_size,
            load_bias: 0,
            g_struct_offset,
            debug_sections: sections,
            dwarf_cache: OnceCell::new(),
            unit_cache: OnceCell::new(),
            context_cache: OnceCell::new(),
            function_cache: OnceCell::new(),
            opaque_cache: OnceCell::new(),
            by_offset: RwLock::new(HashMap::new()),
        })
    }

    /// Difference between runtime and link-time addresses (for PIE/ASLR
    /// targets; Go binaries default to 0).
    pub fn set_load_bias(&mut self, bias: i64)
    {
        self.load_bias = bias;
    }

    fn file_addr(&self, pc: u64) -> u64
    {
        if self.load_bias >= 0 {
            pc.wrapping_sub(self.load_bias as u64)
        } else {
            pc.wrapping_add((-self.load_bias) as u64)
        }
    }

    fn runtime_addr(&self, addr: u64) -> u64
    {
        if self.load_bias >= 0 {
            addr.wrapping_add(self.load_bias as u64)
        } else {
            addr.wrapping_sub((-self.load_bias) as u64)
        }
    }

    fn section_reader(&self, id: SectionId) -> OwnedReader
    {
        let data = self
            .debug_sections
            .get(id.name())
            .cloned()
            .unwrap_or_else(|| Arc::<[u8]>::from(Vec::new()));
        EndianArcSlice::new(data, self.endian)
    }

    fn dwarf(&self) -> Result<&OwnedDwarf>
    {
        self.dwarf_cache.get_or_try_init(|| {
            Dwarf::load(|section| Ok::<_, gimli::Error>(self.section_reader(section)))
                .map_err(|err| map_dwarf_error("loading DWARF sections", err))
        })
    }

    fn units(&self) -> Result<&Vec<Unit<OwnedReader>>>
    {
        self.unit_cache.get_or_try_init(|| {
            let dwarf = self.dwarf()?;
            let mut units = Vec::new();
            let mut headers = dwarf.units();
            while let Some(header) = headers
                .next()
                .map_err(|err| map_dwarf_error("reading .debug_info unit header", err))?
            {
                units.push(
                    dwarf
                        .unit(header)
                        .map_err(|err| map_dwarf_error("parsing compilation unit", err))?,
                );
            }
            Ok(units)
        })
    }

    fn context(&self) -> Result<&Context<OwnedReader>>
    {
        self.context_cache.get_or_try_init(|| {
            let dwarf = Dwarf::load(|section| Ok::<_, gimli::Error>(self.section_reader(section)))
                .map_err(|err| map_dwarf_error("loading DWARF for line lookup", err))?;
            Context::from_dwarf(dwarf).map_err(|err| map_dwarf_error("building line-lookup context", err))
        })
    }

    fn functions(&self) -> Result<&Vec<FuncEntry>>
    {
        self.function_cache.get_or_try_init(|| {
            let dwarf = self.dwarf()?;
            let units = self.units()?;
            let mut functions = Vec::new();
            for unit in units {
                let mut cursor = unit.entries();
                while let Some((_delta, entry)) = cursor
                    .next_dfs()
                    .map_err(|err| map_dwarf_error("traversing DIE tree", err))?
                {
                    if entry.tag() != constants::DW_TAG_subprogram {
                        continue;
                    }
                    let low = match entry
                        .attr_value(constants::DW_AT_low_pc)
                        .map_err(|err| map_dwarf_error("reading DW_AT_low_pc", err))?
                    {
                        Some(AttributeValue::Addr(addr)) => addr,
                        _ => continue,
                    };
                    let end = match entry
                        .attr_value(constants::DW_AT_high_pc)
                        .map_err(|err| map_dwarf_error("reading DW_AT_high_pc", err))?
                    {
                        Some(AttributeValue::Addr(addr)) => addr,
                        Some(AttributeValue::Udata(size)) => low + size,
                        _ => low,
                    };
                    let Some(name) = entry_name(dwarf, unit, entry)? else {
                        continue;
                    };
                    functions.push(FuncEntry { entry: low, end, name });
                }
            }
            functions.sort_by_key(|function| function.entry);
            Ok(functions)
        })
    }

    fn opaque(&self) -> TypeId
    {
        *self.opaque_cache.get_or_init(|| {
            self.registry
                .insert(GoType::uint(String::new(), u64::from(self.pointer_size)))
        })
    }

    fn find_type_impl(&self, target: &str) -> Result<TypeId>
    {
        if let Some(id) = self.registry.lookup(target) {
            return Ok(id);
        }

        let dwarf = self.dwarf()?;
        let units = self.units()?;
        for (unit_idx, unit) in units.iter().enumerate() {
            let mut cursor = unit.entries();
            while let Some((_delta, entry)) = cursor
                .next_dfs()
                .map_err(|err| map_dwarf_error("traversing DIE tree", err))?
            {
                if !is_type_tag(entry.tag()) {
                    continue;
                }
                let Some(name) = entry_name(dwarf, unit, entry)? else {
                    continue;
                };
                if name != target {
                    continue;
                }
                let offset = entry.offset();
                return self.build_type(units, unit_idx, offset, 0);
            }
        }
        Err(GoscopeError::TypeNotFound(target.to_string()))
    }

    fn build_type(
        &self,
        units: &[Unit<OwnedReader>],
        unit_idx: usize,
        offset: UnitOffset<usize>,
        depth: usize,
    ) -> Result<TypeId>
    {
        if depth >= MAX_TYPE_REF_DEPTH {
            return Err(GoscopeError::MalformedDebugInfo(
                "type reference chain too deep".to_string(),
            ));
        }
        let key = (unit_idx, offset.0);
        if let Some(existing) = self.by_offset.read().unwrap().get(&key) {
            return Ok(*existing);
        }

        let dwarf = self.dwarf()?;
        let unit = &units[unit_idx];
        let entry = unit
            .entry(offset)
            .map_err(|err| map_dwarf_error("resolving type reference", err))?;
        let name = entry_name(dwarf, unit, &entry)?.unwrap_or_default();
        let byte_size = attr_udata(&entry, constants::DW_AT_byte_size)?.unwrap_or(0);
        let ptr_bytes = u64::from(self.pointer_size);

        match entry.tag() {
            constants::DW_TAG_base_type => {
                let kind = match attr_encoding(&entry)? {
                    constants::DW_ATE_boolean => TypeKind::Bool,
                    constants::DW_ATE_signed | constants::DW_ATE_signed_char => TypeKind::Int,
                    constants::DW_ATE_float => TypeKind::Float,
                    _ => TypeKind::Uint,
                };
                let id = self.registry.insert(GoType {
                    name,
                    byte_size,
                    kind,
                    consts: Vec::new(),
                });
                self.remember(key, id);
                Ok(id)
            }
            constants::DW_TAG_pointer_type => {
                let id = self.registry.reserve(&name, ptr_bytes);
                self.remember(key, id);
                let elem = match attr_type_ref(&entry)? {
                    Some(reference) => self.build_ref(units, unit_idx, reference, depth + 1)?,
                    None => self.opaque(),
                };
                self.registry.replace(
                    id,
                    GoType {
                        name,
                        byte_size: ptr_bytes,
                        kind: TypeKind::Pointer { elem },
                        consts: Vec::new(),
                    },
                );
                Ok(id)
            }
            constants::DW_TAG_typedef | constants::DW_TAG_const_type | constants::DW_TAG_volatile_type => {
                let Some(reference) = attr_type_ref(&entry)? else {
                    let id = self.opaque();
                    self.remember(key, id);
                    return Ok(id);
                };
                let target = self.build_ref(units, unit_idx, reference, depth + 1)?;
                let id = if name.is_empty() {
                    target
                } else {
                    // Named typedefs get a distinct descriptor so per-name
                    // constant tables (wait reasons) have somewhere to live.
                    let underlying = self.registry.get(target);
                    self.registry.insert(GoType {
                        name,
                        byte_size: underlying.byte_size,
                        kind: underlying.kind.clone(),
                        consts: underlying.consts.clone(),
                    })
                };
                self.remember(key, id);
                Ok(id)
            }
            constants::DW_TAG_structure_type => self.build_struct(units, unit_idx, &entry, name, byte_size, key, depth),
            constants::DW_TAG_array_type => {
                let id = self.registry.reserve(&name, byte_size);
                self.remember(key, id);
                let elem = match attr_type_ref(&entry)? {
                    Some(reference) => self.build_ref(units, unit_idx, reference, depth + 1)?,
                    None => self.opaque(),
                };
                let len = self.array_len(unit, offset)?;
                self.registry.replace(
                    id,
                    GoType {
                        name,
                        byte_size,
                        kind: TypeKind::Array { elem, len },
                        consts: Vec::new(),
                    },
                );
                Ok(id)
            }
            constants::DW_TAG_enumeration_type => {
                let consts = self.collect_enumerators(unit, offset)?;
                let signed = consts.iter().any(|constant| constant.value < 0);
                let id = self.registry.insert(
                    GoType {
                        name,
                        byte_size: if byte_size == 0 { ptr_bytes } else { byte_size },
                        kind: if signed { TypeKind::Int } else { TypeKind::Uint },
                        consts: Vec::new(),
                    }
                    .with_consts(consts),
                );
                self.remember(key, id);
                Ok(id)
            }
            constants::DW_TAG_subroutine_type => {
                let id = self.registry.insert(GoType {
                    name,
                    byte_size: ptr_bytes,
                    kind: TypeKind::Func,
                    consts: Vec::new(),
                });
                self.remember(key, id);
                Ok(id)
            }
            tag => {
                debug!(?tag, %name, "unsupported type tag, using opaque descriptor");
                let id = self.opaque();
                self.remember(key, id);
                Ok(id)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn build_struct(
        &self,
        units: &[Unit<OwnedReader>],
        unit_idx: usize,
        entry: &DebuggingInformationEntry<'_, '_, OwnedReader>,
        name: String,
        byte_size: u64,
        key: (usize, usize),
        depth: usize,
    ) -> Result<TypeId>
    {
        let ptr_bytes = u64::from(self.pointer_size);
        let go_kind = attr_udata(entry, DW_AT_GO_KIND)?;

        // Go's string/slice/map headers are emitted as structs; the go_kind
        // extension (with a name fallback for older compilers) tells them
        // apart from plain structs.
        if go_kind == Some(GO_KIND_STRING) || name == "string" {
            let id = self.registry.insert(GoType {
                name,
                byte_size: if byte_size == 0 { ptr_bytes * 2 } else { byte_size },
                kind: TypeKind::String,
                consts: Vec::new(),
            });
            self.remember(key, id);
            return Ok(id);
        }

        if go_kind == Some(GO_KIND_SLICE) || name.starts_with("[]") {
            let id = self.registry.reserve(&name, byte_size);
            self.remember(key, id);
            let elem = match attr_value_ref(entry, DW_AT_GO_ELEM)? {
                Some(reference) => self.build_ref(units, unit_idx, reference, depth + 1)?,
                None => self.slice_elem_from_members(units, unit_idx, entry.offset(), depth)?,
            };
            self.registry.replace(
                id,
                GoType {
                    name,
                    byte_size: if byte_size == 0 { ptr_bytes * 3 } else { byte_size },
                    kind: TypeKind::Slice { elem },
                    consts: Vec::new(),
                },
            );
            return Ok(id);
        }

        if go_kind == Some(GO_KIND_MAP) || name.starts_with("map[") {
            let id = self.registry.reserve(&name, ptr_bytes);
            self.remember(key, id);
            let map_key = match attr_value_ref(entry, DW_AT_GO_KEY)? {
                Some(reference) => self.build_ref(units, unit_idx, reference, depth + 1)?,
                None => self.opaque(),
            };
            let map_value = match attr_value_ref(entry, DW_AT_GO_ELEM)? {
                Some(reference) => self.build_ref(units, unit_idx, reference, depth + 1)?,
                None => self.opaque(),
            };
            self.registry.replace(
                id,
                GoType {
                    name,
                    byte_size: ptr_bytes,
                    kind: TypeKind::Map {
                        key: map_key,
                        value: map_value,
                    },
                    consts: Vec::new(),
                },
            );
            return Ok(id);
        }

        let id = self.registry.reserve(&name, byte_size);
        self.remember(key, id);
        let fields = self.collect_members(units, unit_idx, entry.offset(), depth)?;
        self.registry.replace(id, GoType::struct_type(name, byte_size, fields));
        Ok(id)
    }

    fn collect_members(
        &self,
        units: &[Unit<OwnedReader>],
        unit_idx: usize,
        offset: UnitOffset<usize>,
        depth: usize,
    ) -> Result<Vec<StructField>>
    {
        let dwarf = self.dwarf()?;
        let unit = &units[unit_idx];
        let mut fields = Vec::new();

        let mut tree = unit
            .entries_tree(Some(offset))
            .map_err(|err| map_dwarf_error("building struct tree", err))?;
        let root = tree.root().map_err(|err| map_dwarf_error("navigating struct root", err))?;
        let mut children = root.children();
        while let Some(child) = children
            .next()
            .map_err(|err| map_dwarf_error("iterating struct members", err))?
        {
            let entry = child.entry().clone();
            if entry.tag() != constants::DW_TAG_member {
                continue;
            }
            let Some(name) = entry_name(dwarf, unit, &entry)? else {
                continue;
            };
            let member_offset = attr_udata(&entry, constants::DW_AT_data_member_location)?.unwrap_or(0);
            let ty = match attr_type_ref(&entry)? {
                Some(reference) => self.build_ref(units, unit_idx, reference, depth + 1)?,
                None => self.opaque(),
            };
            fields.push(StructField {
                name,
                ty,
                offset: member_offset,
            });
        }
        Ok(fields)
    }

    fn slice_elem_from_members(
        &self,
        units: &[Unit<OwnedReader>],
        unit_idx: usize,
        offset: UnitOffset<usize>,
        depth: usize,
    ) -> Result<TypeId>
    {
        // Older Go compilers omit go_elem; the element type is the pointee
        // of the header's `array` member.
        let fields = self.collect_members(units, unit_idx, offset, depth)?;
        for field in fields {
            if field.name != "array" {
                continue;
            }
            if let TypeKind::Pointer { elem } = self.registry.get(field.ty).kind {
                return Ok(elem);
            }
        }
        Ok(self.opaque())
    }

    fn array_len(&self, unit: &Unit<OwnedReader>, offset: UnitOffset<usize>) -> Result<u64>
    {
        let mut tree = unit
            .entries_tree(Some(offset))
            .map_err(|err| map_dwarf_error("building array tree", err))?;
        let root = tree.root().map_err(|err| map_dwarf_error("navigating array root", err))?;
        let mut children = root.children();
        while let Some(child) = children
            .next()
            .map_err(|err| map_dwarf_error("iterating array subranges", err))?
        {
            let entry = child.entry().clone();
            if entry.tag() != constants::DW_TAG_subrange_type {
                continue;
            }
            if let Some(count) = attr_udata(&entry, constants::DW_AT_count)? {
                return Ok(count);
            }
            if let Some(upper) = attr_udata(&entry, constants::DW_AT_upper_bound)? {
                return Ok(upper + 1);
            }
        }
        Ok(0)
    }

    fn collect_enumerators(&self, unit: &Unit<OwnedReader>, offset: UnitOffset<usize>) -> Result<Vec<crate::types::ConstValue>>
    {
        let dwarf = self.dwarf()?;
        let mut consts = Vec::new();
        let mut tree = unit
            .entries_tree(Some(offset))
            .map_err(|err| map_dwarf_error("building enumeration tree", err))?;
        let root = tree
            .root()
            .map_err(|err| map_dwarf_error("navigating enumeration root", err))?;
        let mut children = root.children();
        while let Some(child) = children
            .next()
            .map_err(|err| map_dwarf_error("iterating enumerators", err))?
        {
            let entry = child.entry().clone();
            if entry.tag() != constants::DW_TAG_enumerator {
                continue;
            }
            let Some(name) = entry_name(dwarf, unit, &entry)? else {
                continue;
            };
            let value = entry
                .attr(constants::DW_AT_const_value)
                .map_err(|err| map_dwarf_error("reading DW_AT_const_value", err))?
                .and_then(|attribute| {
                    attribute
                        .sdata_value()
                        .or_else(|| attribute.udata_value().map(|value| value as i64))
                })
                .unwrap_or(0);
            consts.push(crate::types::ConstValue { name, value });
        }
        Ok(consts)
    }

    fn build_ref(
        &self,
        units: &[Unit<OwnedReader>],
        unit_idx: usize,
        value: AttributeValue<OwnedReader>,
        depth: usize,
    ) -> Result<TypeId>
    {
        match value {
            AttributeValue::UnitRef(offset) => self.build_type(units, unit_idx, offset, depth),
            AttributeValue::DebugInfoRef(offset) => {
                let target = UnitSectionOffset::from(offset);
                for (idx, unit) in units.iter().enumerate() {
                    if let Some(unit_offset) = target.to_unit_offset(unit) {
                        return self.build_type(units, idx, unit_offset, depth);
                    }
                }
                Ok(self.opaque())
            }
            _ => Ok(self.opaque()),
        }
    }

    fn remember(&self, key: (usize, usize), id: TypeId)
    {
        self.by_offset.write().unwrap().insert(key, id);
    }
}

impl BinaryInfo for DwarfBinaryInfo
{
    fn types(&self) -> &TypeRegistry
    {
        &self.registry
    }

    fn find_type(&self, name: &str) -> Result<TypeId>
    {
        self.find_type_impl(name)
    }

    fn pc_to_line(&self, pc: u64) -> (String, u64, Option<Function>)
    {
        let function = self.pc_to_func(pc);
        let mut file = String::new();
        let mut line = 0u64;

        if let Ok(context) = self.context() {
            let lookup = context.find_frames(self.file_addr(pc));
            if let Ok(mut frames) = lookup.skip_all_loads() {
                while let Ok(Some(frame)) = frames.next() {
                    if let Some(location) = frame.location {
                        if let Some(name) = location.file {
                            file = name.to_string();
                        }
                        line = u64::from(location.line.unwrap_or(0));
                        break;
                    }
                }
            }
        }

        (file, line, function)
    }

    fn pc_to_func(&self, pc: u64) -> Option<Function>
    {
        let functions = self.functions().ok()?;
        let file_pc = self.file_addr(pc);
        let idx = functions.partition_point(|function| function.entry <= file_pc);
        let candidate = functions.get(idx.checked_sub(1)?)?;
        if file_pc >= candidate.end && file_pc != candidate.entry {
            return None;
        }
        Some(Function {
            name: candidate.name.clone(),
            entry: self.runtime_addr(candidate.entry),
        })
    }

    fn g_struct_offset(&self) -> u64
    {
        self.g_struct_offset
    }
}

const DWARF_SECTIONS: &[(&str, &[&str])] = &[
    (".debug_abbrev", &[".debug_abbrev", "__debug_abbrev"]),
    (".debug_addr", &[".debug_addr", "__debug_addr"]),
    (".debug_info", &[".debug_info", "__debug_info"]),
    (".debug_line", &[".debug_line", "__debug_line"]),
    (".debug_line_str", &[".debug_line_str", "__debug_line_str"]),
    (".debug_ranges", &[".debug_ranges", "__debug_ranges"]),
    (".debug_rnglists", &[".debug_rnglists", "__debug_rnglists"]),
    (".debug_str", &[".debug_str", "__debug_str"]),
    (".debug_str_offsets", &[".debug_str_offsets", "__debug_str_offsets"]),
    (".debug_loc", &[".debug_loc", "__debug_loc"]),
    (".debug_loclists", &[".debug_loclists", "__debug_loclists"]),
];

fn load_section_bytes<'data>(file: &object::File<'data>, names: &[&str]) -> Arc<[u8]>
{
    for name in names {
        if let Some(section) = file.section_by_name(name) {
            if let Ok(data) = section.uncompressed_data() {
                return match data {
                    Cow::Borrowed(bytes) => Arc::<[u8]>::from(bytes.to_vec()),
                    Cow::Owned(vec) => vec.into(),
                };
            }
        }
    }
    Arc::<[u8]>::from(Vec::new())
}

fn is_type_tag(tag: gimli::DwTag) -> bool
{
    matches!(
        tag,
        constants::DW_TAG_base_type
            | constants::DW_TAG_structure_type
            | constants::DW_TAG_pointer_type
            | constants::DW_TAG_typedef
            | constants::DW_TAG_array_type
            | constants::DW_TAG_enumeration_type
            | constants::DW_TAG_subroutine_type
    )
}

fn map_dwarf_error(context: &str, err: gimli::Error) -> GoscopeError
{
    GoscopeError::MalformedDebugInfo(format!("{context}: {err}"))
}

fn entry_name(
    dwarf: &OwnedDwarf,
    unit: &Unit<OwnedReader>,
    entry: &DebuggingInformationEntry<'_, '_, OwnedReader>,
) -> Result<Option<String>>
{
    let Some(attr) = entry
        .attr(constants::DW_AT_name)
        .map_err(|err| map_dwarf_error("reading DW_AT_name", err))?
    else {
        return Ok(None);
    };
    let reader = dwarf
        .attr_string(unit, attr.value())
        .map_err(|err| map_dwarf_error("resolving DWARF string", err))?;
    let owned = reader
        .to_string_lossy()
        .map_err(|err| map_dwarf_error("decoding DWARF string", err))?
        .into_owned();
    Ok(Some(owned))
}

fn attr_udata(entry: &DebuggingInformationEntry<'_, '_, OwnedReader>, name: gimli::DwAt) -> Result<Option<u64>>
{
    Ok(entry
        .attr(name)
        .map_err(|err| map_dwarf_error("reading attribute", err))?
        .and_then(|attribute| attribute.udata_value()))
}

fn attr_encoding(entry: &DebuggingInformationEntry<'_, '_, OwnedReader>) -> Result<gimli::DwAte>
{
    match entry
        .attr_value(constants::DW_AT_encoding)
        .map_err(|err| map_dwarf_error("reading DW_AT_encoding", err))?
    {
        Some(AttributeValue::Encoding(ate)) => Ok(ate),
        _ => Ok(constants::DW_ATE_unsigned),
    }
}

fn attr_type_ref(entry: &DebuggingInformationEntry<'_, '_, OwnedReader>) -> Result<Option<AttributeValue<OwnedReader>>>
{
    attr_value_ref(entry, constants::DW_AT_type)
}

fn attr_value_ref(
    entry: &DebuggingInformationEntry<'_, '_, OwnedReader>,
    name: gimli::DwAt,
) -> Result<Option<AttributeValue<OwnedReader>>>
{
    entry
        .attr_value(name)
        .map_err(|err| map_dwarf_error("reading type reference", err))
}
