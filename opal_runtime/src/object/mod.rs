//! Inline-class and generic-class metadata.
//!
//! - `descriptor`: per-inline-class static metadata and the padding laws
//! - `vtable`: the global descriptor arena indexed by tagged references
//! - `instance_info`: the monomorphization-on-demand layout cache

pub mod descriptor;
pub mod instance_info;
pub mod vtable;

pub use descriptor::{
    alignment_class, padded_size, AlignClass, DescriptorFlags, FieldDescriptor, FieldKind,
    InlineClassDescriptor, InlineClassId, InlineClassSpec, MethodTable,
};
pub use instance_info::{
    global_repository, inline_field_address, resolve_field_address, ClassInstanceInfo,
    FixedField, GenericClassDef, GenericClassId, GenericFieldEntry, InstanceInfoRepository,
    RegularClassId, TypeArg,
};
pub use vtable::{
    global_vtable, install_global_vtable, HierarchyHandle, VTable, VTableBuilder, VtIndex,
};
