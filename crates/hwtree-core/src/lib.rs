//! hwtree Core - The hardware inventory tree
//!
//! This crate provides the in-memory model every hardware scanner reports
//! into:
//! - Device nodes with normalized identity and attributes
//! - Child insertion with attraction, id collision renaming and physical id
//!   deduplication
//! - Tree queries, physical id assignment, merge and consistency fixups
//! - XML and JSON report rendering
//! - Typed hint values and replayable scan records

pub mod class;
pub mod env;
pub mod node;
pub mod record;
pub mod report;
pub mod text;
pub mod tree;
pub mod value;

pub use class::{DeviceClass, ParseClassError};
pub use env::{Detached, Heuristics, Host, OutputOption, ReportContext, ReportOptions};
pub use node::{AttributeError, DeviceNode};
pub use record::{DeviceRecord, RecordError, ScanRecord};
pub use report::{ReportError, REMOVED};
pub use value::Value;
