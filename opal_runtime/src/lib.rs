//! Opal value representation.
//!
//! This crate is the value-representation subsystem of the Opal runtime:
//! inline (unboxed) value classes interoperating with generic classes
//! without full monomorphization and without universal boxing.
//!
//! It provides:
//! - Tagged reference codec (regular pointer / inline reference in one word)
//! - Inline class descriptors and the global mirrored-slot vtable
//! - The monomorphization-on-demand cache of generic class layouts
//!
//! The three pieces agree bit-for-bit on address encoding; the collector's
//! root-scanning adapter (`opal_gc`) builds on all of them.

#![deny(unsafe_op_in_unsafe_fn)]

pub mod error;
pub mod object;
pub mod tagged;

// Re-export commonly used items
pub use error::{MetadataError, MetadataResult};
pub use object::descriptor::{
    alignment_class, padded_size, AlignClass, InlineClassDescriptor, InlineClassSpec,
};
pub use object::instance_info::{
    resolve_field_address, ClassInstanceInfo, GenericClassDef, GenericClassId, GenericFieldEntry,
    InstanceInfoRepository, TypeArg,
};
pub use object::vtable::{VTable, VTableBuilder, VtIndex};
pub use tagged::{TaggedRef, TaggedValue};
