//! Type descriptors consumed by the typed memory accessor.
//!
//! Runtime structs are decoded against descriptions that come from outside
//! the engine (normally DWARF, see [`crate::dwarf`]); the engine itself only
//! needs a closed set of shapes it knows how to walk. Descriptors live in a
//! [`TypeRegistry`] and reference each other through [`TypeId`] indices, which
//! is what lets self-referential runtime types (`g._defer` → `_defer.link` →
//! `_defer`) be expressed without reference cycles.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Index of a type descriptor inside its owning [`TypeRegistry`]
///
/// Plain copyable handle; only meaningful together with the registry that
/// issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(usize);

/// A single named member of a struct descriptor.
#[derive(Debug, Clone)]
pub struct StructField
{
    /// Field name as spelled in the debug info
    pub name: String,
    /// Descriptor of the field's type
    pub ty: TypeId,
    /// Byte offset from the start of the struct
    pub offset: u64,
}

/// A named constant associated with a type (e.g. wait-reason codes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstValue
{
    /// Symbolic name, used as the human-readable description
    pub name: String,
    /// Numeric value of the constant
    pub value: i64,
}

/// The closed set of shapes the accessor knows how to decode
///
/// Dynamic name-keyed lookups happen against the precomputed `by_name` map of
/// `Struct`; everything else dispatches by exhaustive match.
#[derive(Debug, Clone)]
pub enum TypeKind
{
    /// Signed integer of the descriptor's byte size
    Int,
    /// Unsigned integer (includes `uintptr` and machine words)
    Uint,
    /// Boolean, one byte
    Bool,
    /// IEEE float, 4 or 8 bytes
    Float,
    /// Go string header: (data pointer, length)
    String,
    /// Typed pointer to `elem`
    Pointer
    {
        /// Pointee descriptor
        elem: TypeId,
    },
    /// Struct with named members
    Struct
    {
        /// Members in declaration order
        fields: Vec<StructField>,
        /// Name → index into `fields`, built once at registration
        by_name: HashMap<String, usize>,
    },
    /// Fixed-size array of `len` elements
    Array
    {
        /// Element descriptor
        elem: TypeId,
        /// Declared element count
        len: u64,
    },
    /// Go slice header: (data pointer, length, capacity)
    Slice
    {
        /// Element descriptor
        elem: TypeId,
    },
    /// Go map reference (pointer to the runtime header)
    Map
    {
        /// Key descriptor
        key: TypeId,
        /// Value descriptor
        value: TypeId,
    },
    /// Function value (pointer-sized, decoded as an opaque code address)
    Func,
}

/// A single type descriptor.
#[derive(Debug, Clone)]
pub struct GoType
{
    /// Fully qualified name (`runtime.g`, `*runtime._defer`, ...); may be
    /// empty for synthesized types
    pub name: String,
    /// Storage size of a value of this type
    pub byte_size: u64,
    /// Shape of the type
    pub kind: TypeKind,
    /// Named constants of this type, when the debug info carries them
    pub consts: Vec<ConstValue>,
}

impl GoType
{
    /// Signed integer descriptor.
    pub fn int(name: impl Into<String>, byte_size: u64) -> Self
    {
        Self::scalar(name, byte_size, TypeKind::Int)
    }

    /// Unsigned integer descriptor.
    pub fn uint(name: impl Into<String>, byte_size: u64) -> Self
    {
        Self::scalar(name, byte_size, TypeKind::Uint)
    }

    /// Boolean descriptor.
    pub fn boolean(name: impl Into<String>) -> Self
    {
        Self::scalar(name, 1, TypeKind::Bool)
    }

    /// Float descriptor.
    pub fn float(name: impl Into<String>, byte_size: u64) -> Self
    {
        Self::scalar(name, byte_size, TypeKind::Float)
    }

    /// Go string header descriptor for the given pointer width.
    pub fn string(ptr_size: u8) -> Self
    {
        Self::scalar("string", u64::from(ptr_size) * 2, TypeKind::String)
    }

    /// Struct descriptor; builds the name → index map from `fields`.
    pub fn struct_type(name: impl Into<String>, byte_size: u64, fields: Vec<StructField>) -> Self
    {
        let by_name = fields
            .iter()
            .enumerate()
            .map(|(idx, field)| (field.name.clone(), idx))
            .collect();
        GoType {
            name: name.into(),
            byte_size,
            kind: TypeKind::Struct { fields, by_name },
            consts: Vec::new(),
        }
    }

    fn scalar(name: impl Into<String>, byte_size: u64, kind: TypeKind) -> Self
    {
        GoType {
            name: name.into(),
            byte_size,
            kind,
            consts: Vec::new(),
        }
    }

    /// Attach a constant table (used for code → description lookups).
    #[must_use]
    pub fn with_consts(mut self, consts: Vec<ConstValue>) -> Self
    {
        self.consts = consts;
        self
    }

    /// Returns `true` for pointer-shaped descriptors.
    pub fn is_pointer(&self) -> bool
    {
        matches!(self.kind, TypeKind::Pointer { .. })
    }

    /// Look up a struct member by name; `None` for non-structs or unknown names.
    pub fn field(&self, name: &str) -> Option<&StructField>
    {
        match &self.kind {
            TypeKind::Struct { fields, by_name } => by_name.get(name).map(|idx| &fields[*idx]),
            _ => None,
        }
    }

    /// Resolve a numeric value through this type's constant table.
    pub fn const_description(&self, value: i64) -> Option<&str>
    {
        self.consts
            .iter()
            .find(|constant| constant.value == value)
            .map(|constant| constant.name.as_str())
    }
}

/// Owner of all type descriptors for one target binary
///
/// The registry is append-only and internally locked, so lookups, inserts,
/// and synthetic-pointer interning all work through `&self`. Descriptors are
/// handed out as `Arc<GoType>` clones; a `Variable` tree never holds a lock.
pub struct TypeRegistry
{
    pointer_size: u8,
    entries: RwLock<Vec<Arc<GoType>>>,
    by_name: RwLock<HashMap<String, TypeId>>,
    pointer_cache: RwLock<HashMap<TypeId, TypeId>>,
}

impl TypeRegistry
{
    /// Create an empty registry for the given pointer width.
    ///
    /// ## Panics
    ///
    /// Panics if `pointer_size` is not 4 or 8. An unsupported width is a
    /// setup bug, not a runtime condition.
    pub fn new(pointer_size: u8) -> Self
    {
        assert!(
            matches!(pointer_size, 4 | 8),
            "unsupported pointer width: {pointer_size}"
        );
        TypeRegistry {
            pointer_size,
            entries: RwLock::new(Vec::new()),
            by_name: RwLock::new(HashMap::new()),
            pointer_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Pointer width of the target, in bytes (4 or 8).
    pub fn pointer_size(&self) -> u8
    {
        self.pointer_size
    }

    /// Register a descriptor and return its handle.
    ///
    /// Named types become findable through [`TypeRegistry::lookup`]; the first
    /// registration of a name wins.
    pub fn insert(&self, ty: GoType) -> TypeId
    {
        let name = ty.name.clone();
        let id = {
            let mut entries = self.entries.write().unwrap();
            let id = TypeId(entries.len());
            entries.push(Arc::new(ty));
            id
        };
        if !name.is_empty() {
            self.by_name.write().unwrap().entry(name).or_insert(id);
        }
        id
    }

    /// Fetch the descriptor behind a handle.
    pub fn get(&self, id: TypeId) -> Arc<GoType>
    {
        self.entries.read().unwrap()[id.0].clone()
    }

    /// Find a registered type by name.
    pub fn lookup(&self, name: &str) -> Option<TypeId>
    {
        self.by_name.read().unwrap().get(name).copied()
    }

    /// Intern a pointer-to-`elem` descriptor.
    ///
    /// Used both for DWARF pointer types and for the synthetic pointer wrap
    /// applied when a goroutine address needs an explicit dereference step.
    pub fn pointer_to(&self, elem: TypeId) -> TypeId
    {
        if let Some(existing) = self.pointer_cache.read().unwrap().get(&elem) {
            return *existing;
        }
        let name = {
            let pointee = self.get(elem);
            if pointee.name.is_empty() {
                String::new()
            } else {
                format!("*{}", pointee.name)
            }
        };
        let id = self.insert(GoType {
            name,
            byte_size: u64::from(self.pointer_size),
            kind: TypeKind::Pointer { elem },
            consts: Vec::new(),
        });
        self.pointer_cache.write().unwrap().insert(elem, id);
        id
    }

    /// Reserve a slot so recursive layouts can reference themselves while
    /// they are still being materialized. The placeholder decodes as an empty
    /// struct until [`TypeRegistry::replace`] fills it in.
    pub fn reserve(&self, name: &str, byte_size: u64) -> TypeId
    {
        self.insert(GoType::struct_type(name, byte_size, Vec::new()))
    }

    /// Swap a reserved placeholder for the finished descriptor.
    pub fn replace(&self, id: TypeId, ty: GoType)
    {
        let name = ty.name.clone();
        self.entries.write().unwrap()[id.0] = Arc::new(ty);
        if !name.is_empty() {
            self.by_name.write().unwrap().entry(name).or_insert(id);
        }
    }
}
