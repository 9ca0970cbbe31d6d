//! Monomorphization-on-demand cache for generic class layouts.
//!
//! Generic classes are not monomorphized per instantiation and their type
//! arguments are not universally boxed. Instead, every instantiation maps to
//! a *shape*: the equivalence class of type-argument lists that collapses
//! all regular (pointer-sized) arguments to one canonical token while
//! keeping inline-class arguments distinct. One `ClassInstanceInfo` is
//! computed lazily per (generic class, shape) and shared by every
//! instantiation with that shape.
//!
//! # Layout Algorithm
//!
//! Fields are laid out in declaration order, non-generic fields first at
//! fixed offsets independent of instantiation, then generic fields:
//!
//! - an inline-class argument embeds its padded payload at the next offset
//!   aligned to its alignment class, encoded as
//!   `(offset >> 3) << 19 | mirror_slot`
//! - a regular-class argument stores one pointer at the next 8-aligned
//!   offset, encoded as `(offset >> 3) << 19` with a zero vtable-index
//!   field ("load the pointer at this offset, then dereference")
//!
//! The two arms share the tagged-reference address-field convention, so
//! `resolve_field_address` routes inline entries straight through the codec.
//!
//! # Concurrency
//!
//! The index insert is the only lock-bearing operation in the subsystem.
//! Publication is idempotent: when two threads race on the same shape's
//! first use, one computed info is published and the loser's work is
//! discarded. Published infos are immutable and read without
//! synchronization. A layout disagreement between racing computations would
//! mean the deterministic algorithm is broken and is a fatal assertion.

use crate::error::{MetadataError, MetadataResult};
use crate::object::descriptor::MethodTable;
use crate::object::vtable::{VTable, VtIndex, VT_INDEX_BITS, VT_INDEX_MASK};
use crate::tagged::TaggedRef;
use dashmap::DashMap;
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHasher};
use smallvec::SmallVec;
use std::hash::BuildHasherDefault;
use std::sync::{Arc, OnceLock};

type FxDashMap<K, V> = DashMap<K, V, BuildHasherDefault<FxHasher>>;

#[inline]
const fn align_up(value: u32, align: u32) -> u32 {
    (value + align - 1) & !(align - 1)
}

// =============================================================================
// Identities and Type Arguments
// =============================================================================

/// Unique identifier for a generic class definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct GenericClassId(pub u32);

impl GenericClassId {
    /// Get raw value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Identifier for a regular (boxed, pointer-sized) class.
///
/// Carried for diagnostics only; shape collapsing erases it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct RegularClassId(pub u32);

/// One fully-resolved type argument, as delivered by the compiler front end
/// per allocation site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeArg {
    /// A regular class; all of these are layout-identical (one pointer).
    Regular(RegularClassId),
    /// An inline class, named by any of its vtable slots.
    Inline(VtIndex),
}

/// One token of a shape key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ShapeTok {
    /// Canonical token for every regular class.
    Regular,
    /// An inline class, normalized to its base vtable slot.
    Inline(VtIndex),
}

/// Shape key: the collapsed form of a type-argument list.
type ShapeKey = SmallVec<[ShapeTok; 4]>;

// =============================================================================
// Fixed (Non-Generic) Fields
// =============================================================================

/// A non-generic field of a generic class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedField {
    /// Field size in bytes.
    pub size: u32,
    /// Field alignment in bytes (power of two).
    pub align: u32,
    /// Whether the field holds a tagged reference.
    pub is_reference: bool,
}

impl FixedField {
    /// A scalar field.
    #[inline]
    pub const fn scalar(size: u32, align: u32) -> Self {
        Self {
            size,
            align,
            is_reference: false,
        }
    }

    /// A pointer-sized reference field.
    #[inline]
    pub const fn reference() -> Self {
        Self {
            size: 8,
            align: 8,
            is_reference: true,
        }
    }
}

// =============================================================================
// Generic Class Definitions
// =============================================================================

/// Definition-side metadata for one generic class.
///
/// The fixed (non-generic) part of the layout is computed here, once, and is
/// identical across all instantiations.
#[derive(Debug)]
pub struct GenericClassDef {
    id: GenericClassId,
    name: String,
    param_count: usize,
    fixed_fields: Box<[FixedField]>,
    /// Byte offsets of the fixed fields, declaration order.
    fixed_layout: Box<[u32]>,
    /// Total size of the fixed part.
    fixed_size: u32,
    /// For each generic field in declaration order, the type parameter it
    /// is instantiated from.
    generic_slots: Box<[u16]>,
    /// Method table shared by all instantiations of this class.
    methods: Arc<MethodTable>,
}

impl GenericClassDef {
    /// Create a definition and compute its fixed layout.
    ///
    /// `generic_slots[i]` names the type parameter of the i-th generic
    /// field, in declaration order.
    pub fn new(
        id: GenericClassId,
        name: &str,
        param_count: usize,
        fixed_fields: Vec<FixedField>,
        generic_slots: Vec<u16>,
        methods: MethodTable,
    ) -> Self {
        assert!(
            generic_slots.iter().all(|&p| (p as usize) < param_count),
            "generic field of '{}' names a type parameter out of range",
            name
        );
        let mut fixed_layout = Vec::with_capacity(fixed_fields.len());
        let mut running = 0u32;
        for field in &fixed_fields {
            debug_assert!(field.align.is_power_of_two());
            running = align_up(running, field.align);
            fixed_layout.push(running);
            running += field.size;
        }
        Self {
            id,
            name: name.to_string(),
            param_count,
            fixed_fields: fixed_fields.into_boxed_slice(),
            fixed_layout: fixed_layout.into_boxed_slice(),
            fixed_size: running,
            generic_slots: generic_slots.into_boxed_slice(),
            methods: Arc::new(methods),
        }
    }

    /// Class identity.
    #[inline]
    pub fn id(&self) -> GenericClassId {
        self.id
    }

    /// Class name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of type parameters.
    #[inline]
    pub fn param_count(&self) -> usize {
        self.param_count
    }

    /// Fixed fields, declaration order.
    #[inline]
    pub fn fixed_fields(&self) -> &[FixedField] {
        &self.fixed_fields
    }

    /// Byte offset of the i-th fixed field.
    #[inline]
    pub fn fixed_offset(&self, i: usize) -> u32 {
        self.fixed_layout[i]
    }

    /// Size of the fixed part of the layout.
    #[inline]
    pub fn fixed_size(&self) -> u32 {
        self.fixed_size
    }

    /// Method table shared by all instantiations.
    #[inline]
    pub fn methods(&self) -> &Arc<MethodTable> {
        &self.methods
    }
}

// =============================================================================
// Generic Field Entries
// =============================================================================

/// Offset encoding for one generic field.
///
/// Same 45/19 split as a tagged reference: bits 63–19 carry the byte offset
/// in 8-byte words, bits 18–0 carry the vtable mirror slot for inline-typed
/// fields and zero for pointer-typed fields. The low four bits are `0000`
/// exactly for pointer-typed fields.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct GenericFieldEntry(u64);

impl GenericFieldEntry {
    /// Encode a field embedding an inline value at `offset`.
    ///
    /// The mirror slot absorbs the offset's low three bits, which is what
    /// lets the composed reference decode to the exact field address.
    #[inline]
    pub fn inline_field(offset: u32, base_slot: VtIndex) -> Self {
        let mirror = base_slot.mirror((offset & 0b111) as u64);
        Self(((offset as u64) >> 3) << VT_INDEX_BITS | mirror.raw() as u64)
    }

    /// Encode a field storing a pointer to a regular object at `offset`.
    #[inline]
    pub fn pointer_field(offset: u32) -> Self {
        debug_assert_eq!(offset % 8, 0, "pointer fields are 8-aligned");
        Self(((offset as u64) >> 3) << VT_INDEX_BITS)
    }

    /// Reinterpret a raw encoding.
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw encoding.
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Whether this entry is a pointer-typed ("dereference once") field.
    #[inline]
    pub const fn is_pointer(self) -> bool {
        self.0 & 0xF == 0
    }

    /// Byte offset in 8-byte words (the address-field part).
    #[inline]
    pub const fn word_offset(self) -> u64 {
        self.0 >> VT_INDEX_BITS
    }

    /// The vtable mirror slot of an inline-typed entry.
    #[inline]
    pub const fn vtable_index(self) -> VtIndex {
        VtIndex((self.0 & VT_INDEX_MASK) as u32)
    }
}

impl std::fmt::Debug for GenericFieldEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_pointer() {
            write!(f, "GenericFieldEntry::Pointer(words={})", self.word_offset())
        } else {
            write!(
                f,
                "GenericFieldEntry::Inline(words={}, vt={})",
                self.word_offset(),
                self.vtable_index()
            )
        }
    }
}

/// Compute the address behind a generic field.
///
/// Pointer-typed entries load the pointer stored at the field's slot and
/// yield the pointed-to address. Inline-typed entries compose the base into
/// the address field and decode through the codec, yielding the embedded
/// value's address.
///
/// # Safety
///
/// `base` must point to a live instance laid out by the info this entry
/// came from; for pointer-typed entries the field slot is read.
#[inline]
pub unsafe fn resolve_field_address(
    base: usize,
    entry: GenericFieldEntry,
    table: &VTable,
) -> usize {
    if entry.is_pointer() {
        let slot = base + (entry.word_offset() << 3) as usize;
        unsafe { *(slot as *const usize) }
    } else {
        inline_field_address(base, entry, table)
    }
}

/// Compute the address of an inline-typed generic field. Pure arithmetic;
/// no memory is read.
#[inline]
pub fn inline_field_address(base: usize, entry: GenericFieldEntry, table: &VTable) -> usize {
    debug_assert!(!entry.is_pointer());
    debug_assert_eq!(base % 8, 0, "instance bases are 8-aligned");
    let composed = ((base as u64) >> 3) << VT_INDEX_BITS;
    TaggedRef::from_raw(composed + entry.raw()).to_address(table)
}

// =============================================================================
// Class Instance Info
// =============================================================================

/// Monomorphized layout for one (generic class, shape) combination.
///
/// Immutable after publication; shared by every instantiation with the same
/// shape and safe for unsynchronized concurrent reads.
#[derive(Debug)]
pub struct ClassInstanceInfo {
    /// The generic class this layout instantiates.
    class: GenericClassId,
    /// Total instance size in bytes, padded to 8.
    total_size: u32,
    /// One entry per generic field, declaration order.
    entries: Box<[GenericFieldEntry]>,
    /// Method table shared across same-shape instantiations.
    shared_vtable: Arc<MethodTable>,
}

impl ClassInstanceInfo {
    /// The generic class this layout belongs to.
    #[inline]
    pub fn class(&self) -> GenericClassId {
        self.class
    }

    /// Total instance size in bytes.
    #[inline]
    pub fn total_size(&self) -> u32 {
        self.total_size
    }

    /// Offset encodings for the generic fields, declaration order.
    #[inline]
    pub fn entries(&self) -> &[GenericFieldEntry] {
        &self.entries
    }

    /// Shared method table.
    #[inline]
    pub fn shared_vtable(&self) -> &Arc<MethodTable> {
        &self.shared_vtable
    }

    /// Whether two infos describe the identical layout.
    fn layout_eq(&self, other: &Self) -> bool {
        self.total_size == other.total_size && self.entries == other.entries
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Process-wide cache of monomorphized layouts.
///
/// Initialized empty at runtime start, populated monotonically, torn down at
/// process exit. Entries are never freed while the program runs; the cache
/// is bounded by the number of distinct shapes actually exercised.
pub struct InstanceInfoRepository {
    /// Registered generic class definitions.
    classes: RwLock<FxHashMap<GenericClassId, Arc<GenericClassDef>>>,
    /// Shape index: (class, shape) → published info.
    index: FxDashMap<(GenericClassId, ShapeKey), Arc<ClassInstanceInfo>>,
}

impl InstanceInfoRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self {
            classes: RwLock::new(FxHashMap::default()),
            index: FxDashMap::default(),
        }
    }

    /// Register a generic class definition.
    pub fn register_class(&self, def: GenericClassDef) -> Arc<GenericClassDef> {
        let def = Arc::new(def);
        self.classes.write().insert(def.id(), Arc::clone(&def));
        def
    }

    /// Look up a registered definition.
    pub fn class(&self, id: GenericClassId) -> Option<Arc<GenericClassDef>> {
        self.classes.read().get(&id).cloned()
    }

    /// Get or lazily create the layout for an instantiation.
    ///
    /// Constant amortized cost on the hit path. On a miss the layout is
    /// computed outside the index lock and published idempotently: the first
    /// publish wins and racing losers adopt it.
    pub fn get_or_create(
        &self,
        class: GenericClassId,
        args: &[TypeArg],
        table: &VTable,
    ) -> MetadataResult<Arc<ClassInstanceInfo>> {
        let def = self
            .class(class)
            .ok_or(MetadataError::UnknownClass { id: class.raw() })?;
        self.get_or_create_for(&def, args, table)
    }

    /// `get_or_create` against an already-resolved definition.
    pub fn get_or_create_for(
        &self,
        def: &GenericClassDef,
        args: &[TypeArg],
        table: &VTable,
    ) -> MetadataResult<Arc<ClassInstanceInfo>> {
        if args.len() != def.param_count() {
            return Err(MetadataError::ArityMismatch {
                class: def.name().to_string(),
                expected: def.param_count(),
                actual: args.len(),
            });
        }

        let key = (def.id(), shape_key(args, table)?);
        if let Some(hit) = self.index.get(&key) {
            return Ok(Arc::clone(hit.value()));
        }

        let fresh = Arc::new(compute_layout(def, args, table)?);
        match self.index.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(published) => {
                // A racing computation published first; ours is discarded.
                // Disagreement would mean the deterministic layout algorithm
                // is broken, which is unsafe to continue past.
                let winner = Arc::clone(published.get());
                assert!(
                    fresh.layout_eq(&winner),
                    "ambiguous instantiation: racing layouts for '{}' disagree",
                    def.name()
                );
                Ok(winner)
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&fresh));
                Ok(fresh)
            }
        }
    }

    /// Number of published instance infos.
    pub fn cached_infos(&self) -> usize {
        self.index.len()
    }

    /// Number of registered class definitions.
    pub fn class_count(&self) -> usize {
        self.classes.read().len()
    }
}

impl Default for InstanceInfoRepository {
    fn default() -> Self {
        Self::new()
    }
}

/// Collapse a type-argument list to its shape key.
///
/// Inline arguments are normalized to their base vtable slot so that mirror
/// and base indices name the same shape.
fn shape_key(args: &[TypeArg], table: &VTable) -> MetadataResult<ShapeKey> {
    let mut key = ShapeKey::with_capacity(args.len());
    for arg in args {
        key.push(match *arg {
            TypeArg::Regular(_) => ShapeTok::Regular,
            TypeArg::Inline(index) => {
                let descriptor = table
                    .descriptor(index)
                    .ok_or(MetadataError::UnknownVtIndex { index })?;
                ShapeTok::Inline(descriptor.base_slot())
            }
        });
    }
    Ok(key)
}

/// Deterministic layout computation for one shape.
fn compute_layout(
    def: &GenericClassDef,
    args: &[TypeArg],
    table: &VTable,
) -> MetadataResult<ClassInstanceInfo> {
    // Generic fields start after the fixed part, 8-aligned.
    let mut running = align_up(def.fixed_size(), 8);
    let mut entries = Vec::with_capacity(def.generic_slots.len());

    for &param in def.generic_slots.iter() {
        match args[param as usize] {
            TypeArg::Regular(_) => {
                running = align_up(running, 8);
                entries.push(GenericFieldEntry::pointer_field(running));
                running += 8;
            }
            TypeArg::Inline(index) => {
                let descriptor = table
                    .descriptor(index)
                    .ok_or(MetadataError::UnknownVtIndex { index })?;
                running = align_up(running, descriptor.align().bytes());
                entries.push(GenericFieldEntry::inline_field(
                    running,
                    descriptor.base_slot(),
                ));
                running += descriptor.size_bytes();
            }
        }
    }

    Ok(ClassInstanceInfo {
        class: def.id(),
        total_size: align_up(running, 8),
        entries: entries.into_boxed_slice(),
        shared_vtable: Arc::clone(def.methods()),
    })
}

// =============================================================================
// Global Repository Access
// =============================================================================

/// Global repository instance.
static REPOSITORY: OnceLock<InstanceInfoRepository> = OnceLock::new();

/// Get the global instance-info repository.
#[inline]
pub fn global_repository() -> &'static InstanceInfoRepository {
    REPOSITORY.get_or_init(InstanceInfoRepository::new)
}

// =============================================================================
// Tests
// =============================================================================
