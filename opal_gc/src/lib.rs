//! Garbage-collector root scanning for tagged references.
//!
//! This crate adapts the runtime's tagged-reference encoding (see
//! `opal_runtime`) to a tracing collector's root-scan phase. Its one hard
//! problem is interior references: inline-class references that point into
//! the middle of a heap object rather than at its start, which arise when
//! inline values are stored in generic-context fields.
//!
//! # Architecture
//!
//! - [`roots::RootScanner`]: classifies stack words and drives marking
//! - [`roots::InteriorRefTable`]: per-cycle buffer backing the precise
//!   strategy's free and relocation queries
//! - [`trace`]: the `Tracer` / `HeapModel` seams the collector implements
//! - [`config`] / [`stats`]: strategy selection and counters
//!
//! The scanner never owns heap memory or mark state; it is a classification
//! and bookkeeping layer between stacks and the collector.

#![deny(unsafe_op_in_unsafe_fn)]

pub mod config;
pub mod roots;
pub mod stats;
pub mod trace;

pub use config::{ScanConfig, ScanStrategy};
pub use roots::{InteriorRef, InteriorRefTable, RootScanner};
pub use stats::ScanStats;
pub use trace::{HeapModel, ObjectSpan, Tracer};
