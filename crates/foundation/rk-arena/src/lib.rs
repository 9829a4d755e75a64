//! Indexed arena allocator for IR bodies
//!
//! Expressions and statements of a function body live in arenas and refer to
//! each other through `Idx` handles, so a body can be cloned and compared as
//! a plain value when macro output is replayed onto a fresh tree.

pub use la_arena::{Arena, ArenaMap, Idx, RawIdx};
