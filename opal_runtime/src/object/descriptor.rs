//! Static per-class metadata for inline (unboxed) value classes.
//!
//! Every inline class gets one `InlineClassDescriptor`, created at class-load
//! time and immutable after publication. The descriptor carries the layout
//! facts the codec and the collector agree on: the hierarchy's shared padded
//! size, the alignment class, and the field layout used to find embedded
//! references during tracing.
//!
//! # Alignment Classes
//!
//! Payload sizes map onto four alignment classes:
//!
//! - size ≥ 8 → 8-byte aligned, size rounded up to a multiple of 8
//! - size < 8 → aligned to the next power of two (1, 2, or 4), padded to it
//!
//! The alignment class decides how many mirrored vtable slots the class
//! occupies (see `vtable`), which in turn is how sub-word address bits
//! survive the tagged encoding.

use crate::object::vtable::VtIndex;
use std::sync::Arc;

// =============================================================================
// Alignment Classes
// =============================================================================

/// Alignment class of an inline value, derived from its payload size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AlignClass {
    /// 1-byte aligned (payload size 1).
    A1 = 1,
    /// 2-byte aligned (payload size 2).
    A2 = 2,
    /// 4-byte aligned (payload sizes 3–4).
    A4 = 4,
    /// 8-byte aligned (payload sizes ≥ 5, padded to 8).
    A8 = 8,
}

impl AlignClass {
    /// Alignment in bytes.
    #[inline]
    pub const fn bytes(self) -> u32 {
        self as u32
    }

    /// Number of mirrored vtable slots a descriptor of this class occupies.
    #[inline]
    pub const fn mirror_count(self) -> u32 {
        8 / self.bytes()
    }

    /// Mask applied to a vtable index to recover the referenced value's byte
    /// offset within its 8-byte word.
    ///
    /// Mirrors sit at stride `bytes()` within an 8-slot window, so the low
    /// three bits of the slot index are the byte offset itself, rounded down
    /// to the alignment:
    ///
    /// - A8 → `0b000` (no sub-word offsets)
    /// - A4 → `0b100` (offsets 0, 4)
    /// - A2 → `0b110` (offsets 0, 2, 4, 6)
    /// - A1 → `0b111` (offsets 0–7)
    #[inline]
    pub const fn offset_mask(self) -> u64 {
        !(self.bytes() as u64 - 1) & 0b111
    }
}

/// Compute the alignment class for a declared payload size.
///
/// Sizes of 8 bytes or more are 8-byte aligned; smaller sizes align to the
/// next power of two.
#[inline]
pub const fn alignment_class(size: u32) -> AlignClass {
    match size {
        0..=1 => AlignClass::A1,
        2 => AlignClass::A2,
        3..=4 => AlignClass::A4,
        5..=7 => AlignClass::A8,
        _ => AlignClass::A8,
    }
}

/// Compute the padded size for a declared payload size.
///
/// Sizes ≥ 8 round up to a multiple of 8; smaller sizes pad to their
/// alignment class.
#[inline]
pub const fn padded_size(size: u32) -> u32 {
    if size >= 8 {
        (size + 7) & !7
    } else {
        alignment_class(size).bytes()
    }
}

// =============================================================================
// Field Layout
// =============================================================================

/// Kind of a field inside an inline value's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Plain bits; invisible to the collector.
    Scalar,
    /// A tagged reference the collector must trace.
    Reference,
}

/// One field in an inline class's payload layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Byte offset from the start of the payload.
    pub offset: u32,
    /// Field kind.
    pub kind: FieldKind,
}

impl FieldDescriptor {
    /// Create a scalar field at the given offset.
    #[inline]
    pub const fn scalar(offset: u32) -> Self {
        Self {
            offset,
            kind: FieldKind::Scalar,
        }
    }

    /// Create a reference field at the given offset.
    #[inline]
    pub const fn reference(offset: u32) -> Self {
        Self {
            offset,
            kind: FieldKind::Reference,
        }
    }
}

// =============================================================================
// Method Tables
// =============================================================================

/// Opaque per-class method table.
///
/// Entries are raw entry-point addresses installed by the loader; slot
/// indices are assigned by the front end. The subsystem never calls through
/// these, it only hands the table out for dispatch.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MethodTable {
    /// Entry-point addresses, indexed by method slot.
    pub entries: Box<[usize]>,
}

impl MethodTable {
    /// Create an empty method table.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a table from entry-point addresses.
    pub fn from_entries(entries: Vec<usize>) -> Self {
        Self {
            entries: entries.into_boxed_slice(),
        }
    }
}

// =============================================================================
// Descriptor Flags
// =============================================================================

bitflags::bitflags! {
    /// Behavior flags on an inline class descriptor.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DescriptorFlags: u8 {
        /// This class is the root of its hierarchy.
        const HIERARCHY_ROOT = 1 << 0;
        /// The payload contains at least one reference field.
        /// Cleared descriptors are skipped entirely during tracing.
        const HAS_REFERENCES = 1 << 1;
    }
}

// =============================================================================
// Inline Class Identity
// =============================================================================

/// Unique identifier for an inline class, assigned at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct InlineClassId(pub u32);

impl InlineClassId {
    /// Get raw value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

// =============================================================================
// Registration Spec
// =============================================================================

/// Loader-provided description of one inline class, before registration.
#[derive(Debug)]
pub struct InlineClassSpec {
    /// Class name (diagnostics only).
    pub name: String,
    /// Declared payload size in bytes, before padding.
    pub size_bytes: u32,
    /// Payload field layout.
    pub fields: Vec<FieldDescriptor>,
    /// Method table for this class.
    pub methods: MethodTable,
}

impl InlineClassSpec {
    /// Convenience constructor for an all-scalar payload.
    pub fn scalar(name: &str, size_bytes: u32) -> Self {
        Self {
            name: name.to_string(),
            size_bytes,
            fields: Vec::new(),
            methods: MethodTable::empty(),
        }
    }
}

// =============================================================================
// Inline Class Descriptor
// =============================================================================

/// Immutable per-class metadata, published into the vtable at load time.
///
/// All members of one hierarchy share `size_bytes` (the root's padded size)
/// and therefore the same alignment class.
#[derive(Debug)]
pub struct InlineClassDescriptor {
    /// This class's identity.
    id: InlineClassId,
    /// Identity of the hierarchy root (equal to `id` for roots).
    root_id: InlineClassId,
    /// Class name (diagnostics only).
    name: String,
    /// Declared payload size, before padding.
    declared_size: u32,
    /// Padded size shared by the whole hierarchy.
    size_bytes: u32,
    /// Alignment class derived from `size_bytes`.
    align: AlignClass,
    /// Payload field layout.
    fields: Box<[FieldDescriptor]>,
    /// Method table.
    methods: Arc<MethodTable>,
    /// Behavior flags.
    flags: DescriptorFlags,
    /// Base vtable slot (lowest mirror), assigned by the builder.
    base_slot: VtIndex,
}

impl InlineClassDescriptor {
    /// Construct a descriptor. Only the vtable builder creates these; the
    /// invariants (padded size, base-slot phase) are enforced there.
    pub(crate) fn new(
        id: InlineClassId,
        root_id: InlineClassId,
        spec: InlineClassSpec,
        size_bytes: u32,
        base_slot: VtIndex,
    ) -> Self {
        let mut flags = DescriptorFlags::empty();
        if id == root_id {
            flags |= DescriptorFlags::HIERARCHY_ROOT;
        }
        if spec.fields.iter().any(|f| f.kind == FieldKind::Reference) {
            flags |= DescriptorFlags::HAS_REFERENCES;
        }
        Self {
            id,
            root_id,
            name: spec.name,
            declared_size: spec.size_bytes,
            size_bytes,
            align: alignment_class(size_bytes),
            fields: spec.fields.into_boxed_slice(),
            methods: Arc::new(spec.methods),
            flags,
            base_slot,
        }
    }

    /// Class identity.
    #[inline]
    pub fn id(&self) -> InlineClassId {
        self.id
    }

    /// Hierarchy root identity.
    #[inline]
    pub fn root_id(&self) -> InlineClassId {
        self.root_id
    }

    /// Class name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared (unpadded) payload size.
    #[inline]
    pub fn declared_size(&self) -> u32 {
        self.declared_size
    }

    /// Padded size shared by the hierarchy.
    #[inline]
    pub fn size_bytes(&self) -> u32 {
        self.size_bytes
    }

    /// Alignment class.
    #[inline]
    pub fn align(&self) -> AlignClass {
        self.align
    }

    /// Payload field layout.
    #[inline]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Method table.
    #[inline]
    pub fn methods(&self) -> &Arc<MethodTable> {
        &self.methods
    }

    /// Behavior flags.
    #[inline]
    pub fn flags(&self) -> DescriptorFlags {
        self.flags
    }

    /// Whether the payload holds reference fields the collector must trace.
    #[inline]
    pub fn has_references(&self) -> bool {
        self.flags.contains(DescriptorFlags::HAS_REFERENCES)
    }

    /// Base vtable slot (the mirror at sub-word offset 0).
    #[inline]
    pub fn base_slot(&self) -> VtIndex {
        self.base_slot
    }
}
