//! Variant value engine for gridvar add-in modules.
//!
//! The heart of the crate is [`Variant`], the 32-byte tagged-union record
//! exchanged with the grid host: eleven kinds, four of them heap-allocating,
//! with deep-copy cloning, owner-dispatched destruction, structural editing,
//! a kind-code-first ordering, and the exact truthiness table the host
//! expects. Around it sit the counted UTF-16 string helpers ([`wide`]), the
//! handle registry that boxes values and native objects behind numeric keys
//! ([`handle`]), user-visible alerts ([`alert`]), and the ownership protocol
//! for records crossing the host boundary ([`boundary`]).
//!
//! Failures that can be expressed as data come back as Error-kind records;
//! broken call contracts panic and are caught only by
//! [`boundary::guarded`] at the dispatch boundary.

#![forbid(unsafe_op_in_unsafe_fn)]

pub mod alert;
pub mod boundary;
pub mod handle;
mod ord;
mod shape;
mod table;
mod value;
pub mod wide;

pub use gridvar_abi::{ErrorCode, Kind, Owner, SheetRect};
pub use value::{ValueError, Variant};
