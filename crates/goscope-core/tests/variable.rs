//! Tests for the typed memory accessor: dereferencing, field lookup, and
//! bounded value loading over synthetic type descriptors.

mod common;

use common::{field, FakeBinaryInfo, FakeMemory, PTR};
use goscope_core::error::GoscopeError;
use goscope_core::types::{GoType, TypeKind, TypeRegistry};
use goscope_core::variable::{LoadConfig, Value, Variable};

fn plain_config() -> LoadConfig
{
    LoadConfig {
        follow_pointers: false,
        max_recurse: 4,
        max_string_len: 64,
        max_array_values: 16,
        max_struct_fields: None,
    }
}

#[test]
fn test_scalar_loads()
{
    let reg = TypeRegistry::new(PTR);
    let int32 = reg.insert(GoType::int("int32", 4));
    let uint64 = reg.insert(GoType::uint("uint64", 8));
    let boolean = reg.insert(GoType::boolean("bool"));

    let mut mem = FakeMemory::new();
    mem.write_u32(0x100, 0xffff_fffc); // -4 as i32
    mem.write_u64(0x200, 0xdead_beef);
    mem.write_u8(0x300, 1);

    let bi = FakeBinaryInfo::new(reg);

    let mut v = Variable::new("n", 0x100, int32, &mem, &bi);
    v.load_value(&plain_config());
    assert_eq!(v.value, Value::Int(-4));

    let mut v = Variable::new("u", 0x200, uint64, &mem, &bi);
    v.load_value(&plain_config());
    assert_eq!(v.value, Value::Uint(0xdead_beef));

    let mut v = Variable::new("b", 0x300, boolean, &mem, &bi);
    v.load_value(&plain_config());
    assert_eq!(v.value, Value::Bool(true));
}

#[test]
fn test_dereference_pointer()
{
    let reg = TypeRegistry::new(PTR);
    let uint64 = reg.insert(GoType::uint("uint64", 8));
    let ptr = reg.pointer_to(uint64);

    let mut mem = FakeMemory::new();
    mem.write_u64(0x500, 0x900); // pointer cell
    mem.write_u64(0x900, 42); // pointee

    let bi = FakeBinaryInfo::new(reg);
    let handle = Variable::new("p", 0x500, ptr, &mem, &bi);

    let mut target = handle.maybe_dereference();
    assert_eq!(target.addr, 0x900);
    target.load_value(&plain_config());
    assert_eq!(target.value, Value::Uint(42));

    // Dereferencing a non-pointer is the identity.
    let same = target.maybe_dereference();
    assert_eq!(same.addr, target.addr);
}

#[test]
fn test_nil_dereference_reports_condition()
{
    let reg = TypeRegistry::new(PTR);
    let uint64 = reg.insert(GoType::uint("uint64", 8));
    let ptr = reg.pointer_to(uint64);

    let mut mem = FakeMemory::new();
    mem.write_u64(0x500, 0); // nil pointer

    let bi = FakeBinaryInfo::new(reg);
    let handle = Variable::new("p", 0x500, ptr, &mem, &bi);

    let mut target = handle.maybe_dereference();
    assert_eq!(target.addr, 0);
    target.load_value(&plain_config());
    assert!(matches!(target.unreadable, Some(GoscopeError::NilDereference(_))));
}

#[test]
fn test_field_lookup_by_name_and_absence()
{
    let reg = TypeRegistry::new(PTR);
    let uint64 = reg.insert(GoType::uint("uint64", 8));
    let pair = reg.insert(GoType::struct_type(
        "pair",
        16,
        vec![field("first", uint64, 0), field("second", uint64, 8)],
    ));

    let mem = FakeMemory::new();
    let bi = FakeBinaryInfo::new(reg);
    let handle = Variable::new("p", 0x1000, pair, &mem, &bi);

    let second = handle.field("second").expect("field exists");
    assert_eq!(second.addr, 0x1008);
    assert_eq!(second.name, "second");

    // Absence is a plain None, not an error: this is how version-dependent
    // fields are probed.
    assert!(handle.field("third").is_none());
}

#[test]
fn test_unreadable_field_preserves_siblings()
{
    let reg = TypeRegistry::new(PTR);
    let uint64 = reg.insert(GoType::uint("uint64", 8));
    let pair = reg.insert(GoType::struct_type(
        "pair",
        16,
        vec![field("first", uint64, 0), field("second", uint64, 8)],
    ));

    let mut mem = FakeMemory::new();
    mem.write_u64(0x1000, 7);
    // 0x1008 left unmapped

    let bi = FakeBinaryInfo::new(reg);
    let mut handle = Variable::new("p", 0x1000, pair, &mem, &bi);
    handle.load_value(&plain_config());

    assert_eq!(handle.value, Value::Struct);
    assert!(handle.unreadable.is_none());
    assert_eq!(handle.child("first").unwrap().value, Value::Uint(7));

    let second = handle.child("second").unwrap();
    assert!(matches!(second.unreadable, Some(GoscopeError::ReadFailed { .. })));
    assert_eq!(second.value, Value::None);
}

#[test]
fn test_string_load_and_clamp()
{
    let reg = TypeRegistry::new(PTR);
    let string = reg.insert(GoType::string(PTR));

    let mut mem = FakeMemory::new();
    mem.write_string(0x100, 0x2000, "chan receive");

    let bi = FakeBinaryInfo::new(reg);

    let mut full = Variable::new("s", 0x100, string, &mem, &bi);
    full.load_value(&plain_config());
    assert_eq!(full.value.as_str(), Some("chan receive"));

    let mut clamped = Variable::new("s", 0x100, string, &mem, &bi);
    let mut cfg = plain_config();
    cfg.max_string_len = 4;
    clamped.load_value(&cfg);
    assert_eq!(clamped.value.as_str(), Some("chan"));
    assert!(clamped.unreadable.is_none());
}

#[test]
fn test_slice_load_bounds_elements()
{
    let reg = TypeRegistry::new(PTR);
    let uint64 = reg.insert(GoType::uint("uint64", 8));
    let slice = reg.insert(GoType {
        name: "[]uint64".to_string(),
        byte_size: 24,
        kind: TypeKind::Slice { elem: uint64 },
        consts: Vec::new(),
    });

    let mut mem = FakeMemory::new();
    mem.write_slice_header(0x100, 0x2000, 3, 4);
    for index in 0..3u64 {
        mem.write_u64(0x2000 + index * 8, index + 10);
    }

    let bi = FakeBinaryInfo::new(reg);
    let mut handle = Variable::new("xs", 0x100, slice, &mem, &bi);
    let mut cfg = plain_config();
    cfg.max_array_values = 2;
    handle.load_value(&cfg);

    assert_eq!(handle.value, Value::Slice { len: 3, cap: 4 });
    assert_eq!(handle.children.len(), 2);
    assert_eq!(handle.children[0].value, Value::Uint(10));
    assert_eq!(handle.children[1].value, Value::Uint(11));

    assert_eq!(handle.slice_len().unwrap(), 3);
}

#[test]
fn test_struct_field_limit()
{
    let reg = TypeRegistry::new(PTR);
    let uint64 = reg.insert(GoType::uint("uint64", 8));
    let triple = reg.insert(GoType::struct_type(
        "triple",
        24,
        vec![field("a", uint64, 0), field("b", uint64, 8), field("c", uint64, 16)],
    ));

    let mut mem = FakeMemory::new();
    for index in 0..3u64 {
        mem.write_u64(0x100 + index * 8, index);
    }

    let bi = FakeBinaryInfo::new(reg);
    let mut handle = Variable::new("t", 0x100, triple, &mem, &bi);
    let mut cfg = plain_config();
    cfg.max_struct_fields = Some(1);
    handle.load_value(&cfg);

    assert_eq!(handle.children.len(), 1);
    assert_eq!(handle.children[0].name, "a");
}

#[test]
fn test_bounded_traversal_terminates_on_cycle()
{
    // node.next points back at node itself; an unbounded walk would never
    // finish. The depth limit has to stop it and mark where it stopped.
    let reg = TypeRegistry::new(PTR);
    let uint64 = reg.insert(GoType::uint("uint64", 8));
    let node = reg.reserve("node", 16);
    let node_ptr = reg.pointer_to(node);
    reg.replace(
        node,
        GoType::struct_type("node", 16, vec![field("value", uint64, 0), field("next", node_ptr, 8)]),
    );

    let mut mem = FakeMemory::new();
    mem.write_u64(0x1000, 99);
    mem.write_u64(0x1008, 0x1000); // self-referential

    let bi = FakeBinaryInfo::new(reg);
    let mut handle = Variable::new("head", 0x1000, node, &mem, &bi);
    handle.load_value(&LoadConfig {
        follow_pointers: true,
        max_recurse: 3,
        max_string_len: 0,
        max_array_values: 0,
        max_struct_fields: None,
    });

    // Walk to the deepest decoded node and check the cut point is marked.
    let mut cursor = &handle;
    let mut saw_limit = false;
    for _ in 0..16 {
        if matches!(cursor.unreadable, Some(GoscopeError::LoadLimit(_))) {
            saw_limit = true;
            break;
        }
        match cursor.child("next").and_then(|next| next.children.first()) {
            Some(pointee) => cursor = pointee,
            None => break,
        }
    }
    assert!(saw_limit, "cycle was not cut by the load limit");
}

#[test]
fn test_map_count_from_header()
{
    let reg = TypeRegistry::new(PTR);
    let uint64 = reg.insert(GoType::uint("uint64", 8));
    let string = reg.insert(GoType::string(PTR));
    let map = reg.insert(GoType {
        name: "map[string]uint64".to_string(),
        byte_size: 8,
        kind: TypeKind::Map {
            key: string,
            value: uint64,
        },
        consts: Vec::new(),
    });

    let mut mem = FakeMemory::new();
    mem.write_u64(0x100, 0x4000); // map variable holds the header pointer
    mem.write_u64(0x4000, 12); // header starts with the entry count

    let bi = FakeBinaryInfo::new(reg);
    let mut handle = Variable::new("m", 0x100, map, &mem, &bi);
    handle.load_value(&plain_config());
    assert_eq!(handle.value, Value::Map { count: 12 });
}

#[test]
fn test_nil_map_counts_zero()
{
    let reg = TypeRegistry::new(PTR);
    let uint64 = reg.insert(GoType::uint("uint64", 8));
    let map = reg.insert(GoType {
        name: "map[uint64]uint64".to_string(),
        byte_size: 8,
        kind: TypeKind::Map {
            key: uint64,
            value: uint64,
        },
        consts: Vec::new(),
    });

    let mut mem = FakeMemory::new();
    mem.write_u64(0x100, 0);

    let bi = FakeBinaryInfo::new(reg);
    let mut handle = Variable::new("m", 0x100, map, &mem, &bi);
    handle.load_value(&plain_config());
    assert_eq!(handle.value, Value::Map { count: 0 });
}
