//! Global inline-class vtable: a dense descriptor arena indexed by the
//! 19-bit vtable index carried in tagged references.
//!
//! # Architecture
//!
//! The vtable is an arena-plus-index where the index is the literal numeric
//! slot and the arena is the descriptor array. It is populated once at
//! class-load time through `VTableBuilder` and frozen into an immutable
//! `VTable`, making every decode a lock-free array read.
//!
//! # Slot Assignment
//!
//! Two rules keep the tagged encoding unambiguous:
//!
//! - Indices ≡ 0 (mod 16) are never assigned. A tagged word whose low four
//!   bits are `0000` is a regular pointer by definition, so no inline
//!   reference may ever produce that pattern.
//! - Descriptors with alignment class `a < 8` occupy `8/a` mirrored slots at
//!   stride `a` inside an 8-slot window whose base is ≡ 8 (mod 16). Every
//!   mirror references the same descriptor; the mirror's low three bits are
//!   the referenced value's byte offset within its 8-byte word, which is how
//!   the address bits dropped by the 45-bit address field are recovered.
//!
//! With 2^19 slots and mirroring overhead this supports roughly 448K
//! distinct inline classes, which is enforced at load time, not at runtime.

use crate::error::{MetadataError, MetadataResult};
use crate::object::descriptor::{
    alignment_class, padded_size, AlignClass, InlineClassDescriptor, InlineClassId,
    InlineClassSpec,
};
use std::sync::{Arc, OnceLock};

// =============================================================================
// Vtable Index
// =============================================================================

/// Number of bits in a vtable index.
pub const VT_INDEX_BITS: u32 = 19;

/// Exclusive upper bound on vtable indices.
pub const VT_INDEX_LIMIT: u32 = 1 << VT_INDEX_BITS;

/// Mask extracting the vtable index from a tagged word.
pub const VT_INDEX_MASK: u64 = (VT_INDEX_LIMIT as u64) - 1;

/// A 19-bit index into the global vtable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct VtIndex(pub u32);

impl VtIndex {
    /// Get raw value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Whether this index carries the reserved low-4-bit `0000` pattern.
    ///
    /// Reserved indices are never assigned to descriptors; the pattern is
    /// what distinguishes regular pointers from inline references.
    #[inline]
    pub const fn is_reserved_pattern(self) -> bool {
        self.0 % 16 == 0
    }

    /// The mirror of this base slot for a value at the given byte offset
    /// within its 8-byte word.
    #[inline]
    pub const fn mirror(self, sub_word_offset: u64) -> VtIndex {
        VtIndex(self.0 + sub_word_offset as u32)
    }
}

impl std::fmt::Display for VtIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Frozen VTable
// =============================================================================

/// Immutable descriptor arena, safe for unsynchronized concurrent reads.
#[derive(Debug)]
pub struct VTable {
    /// Dense slot array; `None` for reserved indices and mirror-window gaps.
    slots: Box<[Option<Arc<InlineClassDescriptor>>]>,
}

impl VTable {
    /// An empty table (no inline classes registered).
    pub fn empty() -> Self {
        Self {
            slots: Box::new([]),
        }
    }

    /// Look up the descriptor at an index.
    ///
    /// Returns `None` for reserved indices, mirror-window gaps, and indices
    /// past the populated range.
    #[inline]
    pub fn descriptor(&self, index: VtIndex) -> Option<&Arc<InlineClassDescriptor>> {
        self.slots.get(index.raw() as usize)?.as_ref()
    }

    /// Number of slots in the populated range.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no descriptors are registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of assigned (non-gap) slots, mirrors included.
    pub fn assigned_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Load-time builder for the global vtable.
///
/// Registration happens hierarchy by hierarchy; `build` freezes the table.
pub struct VTableBuilder {
    slots: Vec<Option<Arc<InlineClassDescriptor>>>,
    /// Next candidate slot index. Index 0 carries the reserved pattern, so
    /// assignment starts past it.
    next: u32,
    /// Next inline class id.
    next_id: u32,
}

impl VTableBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            next: 1,
            next_id: 0,
        }
    }

    /// Register one inline-class hierarchy: a root and its (possibly empty)
    /// set of subclasses.
    ///
    /// Every member receives the root's padded size and alignment class;
    /// a child declaring a wider payload than the root is rejected.
    pub fn register_hierarchy(
        &mut self,
        root: InlineClassSpec,
        children: Vec<InlineClassSpec>,
    ) -> MetadataResult<HierarchyHandle> {
        if root.size_bytes == 0 {
            return Err(MetadataError::EmptyInlineClass { class: root.name });
        }
        let shared_size = padded_size(root.size_bytes);
        for child in &children {
            if child.size_bytes > root.size_bytes {
                return Err(MetadataError::ChildWidensHierarchy {
                    class: child.name.clone(),
                    declared: child.size_bytes,
                    root_size: root.size_bytes,
                });
            }
        }

        let align = alignment_class(shared_size);
        let root_id = InlineClassId(self.next_id);
        self.next_id += 1;

        let root_slot = self.alloc_slots(align)?;
        let root_desc = Arc::new(InlineClassDescriptor::new(
            root_id,
            root_id,
            root,
            shared_size,
            root_slot,
        ));
        self.install(&root_desc, align);

        let mut member_descs = Vec::with_capacity(children.len());
        for child in children {
            let id = InlineClassId(self.next_id);
            self.next_id += 1;
            let slot = self.alloc_slots(align)?;
            let desc = Arc::new(InlineClassDescriptor::new(
                id,
                root_id,
                child,
                shared_size,
                slot,
            ));
            self.install(&desc, align);
            member_descs.push(desc);
        }

        Ok(HierarchyHandle {
            root: root_desc,
            members: member_descs,
        })
    }

    /// Register a standalone inline class (a single-member hierarchy).
    pub fn register(&mut self, spec: InlineClassSpec) -> MetadataResult<Arc<InlineClassDescriptor>> {
        Ok(self.register_hierarchy(spec, Vec::new())?.root)
    }

    /// Freeze the builder into an immutable table.
    pub fn build(self) -> VTable {
        VTable {
            slots: self.slots.into_boxed_slice(),
        }
    }

    /// Allocate the slot group for one descriptor and return the base slot.
    fn alloc_slots(&mut self, align: AlignClass) -> MetadataResult<VtIndex> {
        let base = if align == AlignClass::A8 {
            // Single slot; skip the reserved 0-mod-16 pattern.
            if self.next % 16 == 0 {
                self.next += 1;
            }
            let idx = self.next;
            self.next += 1;
            idx
        } else {
            // 8-slot mirror window based at ≡ 8 (mod 16) so every occupied
            // mirror keeps a nonzero low-4-bit pattern.
            let mut base = (self.next + 7) & !7;
            if base % 16 == 0 {
                base += 8;
            }
            self.next = base + 8;
            base
        };
        let last = if align == AlignClass::A8 { base } else { base + 7 };
        if last >= VT_INDEX_LIMIT {
            return Err(MetadataError::VTableSpaceExhausted {
                requested: last as usize,
            });
        }
        Ok(VtIndex(base))
    }

    /// Write the descriptor into its mirror slots.
    fn install(&mut self, desc: &Arc<InlineClassDescriptor>, align: AlignClass) {
        let base = desc.base_slot().raw();
        let stride = align.bytes();
        let top = base + stride * (align.mirror_count() - 1);
        if self.slots.len() <= top as usize {
            self.slots.resize(top as usize + 1, None);
        }
        for k in 0..align.mirror_count() {
            let idx = (base + k * stride) as usize;
            debug_assert!(self.slots[idx].is_none(), "vtable slot {} assigned twice", idx);
            self.slots[idx] = Some(Arc::clone(desc));
        }
    }
}

impl Default for VTableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Descriptors produced by one hierarchy registration.
#[derive(Debug)]
pub struct HierarchyHandle {
    /// The hierarchy root.
    pub root: Arc<InlineClassDescriptor>,
    /// Subclasses, in registration order.
    pub members: Vec<Arc<InlineClassDescriptor>>,
}

// =============================================================================
// Global Table Access
// =============================================================================

/// Global vtable instance, installed once at load time.
static VTABLE: OnceLock<VTable> = OnceLock::new();

/// Install the frozen global vtable.
///
/// Returns `false` if a table was already installed (the first install wins).
pub fn install_global_vtable(table: VTable) -> bool {
    VTABLE.set(table).is_ok()
}

/// Get the global vtable. Empty until `install_global_vtable` runs.
#[inline]
pub fn global_vtable() -> &'static VTable {
    VTABLE.get_or_init(VTable::empty)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::descriptor::FieldDescriptor;

    #[test]
    fn test_reserved_pattern() {
        assert!(VtIndex(0).is_reserved_pattern());
        assert!(VtIndex(16).is_reserved_pattern());
        assert!(VtIndex(32).is_reserved_pattern());
        assert!(!VtIndex(1).is_reserved_pattern());
        assert!(!VtIndex(8).is_reserved_pattern());
    }

    #[test]
    fn test_register_aligned8_skips_reserved() {
        let mut builder = VTableBuilder::new();
        // 16 single-slot registrations must never land on a 0-mod-16 index.
        let mut slots = Vec::new();
        for i in 0..16 {
            let desc = builder
                .register(InlineClassSpec::scalar(&format!("C{}", i), 8))
                .unwrap();
            slots.push(desc.base_slot());
        }
        for slot in &slots {
            assert!(!slot.is_reserved_pattern(), "slot {} is reserved", slot);
        }
        // All distinct.
        let mut raw: Vec<u32> = slots.iter().map(|s| s.raw()).collect();
        raw.sort_unstable();
        raw.dedup();
        assert_eq!(raw.len(), 16);
    }

    #[test]
    fn test_mirror_slots_for_sub8() {
        let mut builder = VTableBuilder::new();
        let desc = builder.register(InlineClassSpec::scalar("Color", 4)).unwrap();
        let table = builder.build();

        let base = desc.base_slot();
        assert_eq!(base.raw() % 16, 8, "sub-8 window must base at 8 mod 16");
        assert_eq!(desc.align(), AlignClass::A4);

        // Mirrors at offsets 0 and 4 reference the same descriptor.
        let m0 = table.descriptor(base).unwrap();
        let m4 = table.descriptor(base.mirror(4)).unwrap();
        assert!(Arc::ptr_eq(m0, m4));
        // The gap slots in between stay unassigned.
        assert!(table.descriptor(base.mirror(1)).is_none());
        assert!(table.descriptor(base.mirror(2)).is_none());
    }

    #[test]
    fn test_mirror_slots_byte_class() {
        let mut builder = VTableBuilder::new();
        let desc = builder.register(InlineClassSpec::scalar("Byte", 1)).unwrap();
        let table = builder.build();

        let base = desc.base_slot();
        for m in 0..8 {
            let d = table.descriptor(base.mirror(m)).unwrap();
            assert!(Arc::ptr_eq(d, table.descriptor(base).unwrap()));
            assert!(!base.mirror(m).is_reserved_pattern());
        }
    }

    #[test]
    fn test_hierarchy_shares_root_size() {
        let mut builder = VTableBuilder::new();
        let handle = builder
            .register_hierarchy(
                InlineClassSpec::scalar("Shape", 12),
                vec![
                    InlineClassSpec::scalar("Circle", 8),
                    InlineClassSpec::scalar("Point", 4),
                ],
            )
            .unwrap();

        assert_eq!(handle.root.size_bytes(), 16); // padded_size(12)
        for member in &handle.members {
            assert_eq!(member.size_bytes(), 16);
            assert_eq!(member.align(), AlignClass::A8);
            assert_eq!(member.root_id(), handle.root.id());
        }
    }

    #[test]
    fn test_child_wider_than_root_rejected() {
        let mut builder = VTableBuilder::new();
        let err = builder
            .register_hierarchy(
                InlineClassSpec::scalar("Small", 4),
                vec![InlineClassSpec::scalar("Big", 8)],
            )
            .unwrap_err();
        assert!(matches!(err, MetadataError::ChildWidensHierarchy { .. }));
    }

    #[test]
    fn test_empty_class_rejected() {
        let mut builder = VTableBuilder::new();
        let err = builder.register(InlineClassSpec::scalar("Unit", 0)).unwrap_err();
        assert!(matches!(err, MetadataError::EmptyInlineClass { .. }));
    }

    #[test]
    fn test_has_references_flag() {
        let mut builder = VTableBuilder::new();
        let spec = InlineClassSpec {
            name: "Node".to_string(),
            size_bytes: 16,
            fields: vec![FieldDescriptor::scalar(0), FieldDescriptor::reference(8)],
            methods: Default::default(),
        };
        let desc = builder.register(spec).unwrap();
        assert!(desc.has_references());

        let plain = builder.register(InlineClassSpec::scalar("Plain", 8)).unwrap();
        assert!(!plain.has_references());
    }

    #[test]
    fn test_vtable_space_exhausted() {
        let mut builder = VTableBuilder::new();
        // Each sub-8 registration claims one 8-slot mirror window; with the
        // 0-mod-16 windows skipped, the 19-bit space holds 32768 of them.
        for i in 0..32768 {
            builder
                .register(InlineClassSpec::scalar(&format!("S{}", i), 4))
                .unwrap();
        }
        let err = builder
            .register(InlineClassSpec::scalar("Overflow", 4))
            .unwrap_err();
        assert!(matches!(err, MetadataError::VTableSpaceExhausted { .. }));
    }

    #[test]
    fn test_unassigned_lookup() {
        let table = VTable::empty();
        assert!(table.descriptor(VtIndex(1)).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_assigned_slot_count() {
        let mut builder = VTableBuilder::new();
        builder.register(InlineClassSpec::scalar("A", 8)).unwrap(); // 1 slot
        builder.register(InlineClassSpec::scalar("B", 2)).unwrap(); // 4 mirrors
        let table = builder.build();
        assert_eq!(table.assigned_slots(), 5);
    }
}
