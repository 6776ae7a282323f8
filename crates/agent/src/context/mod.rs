//! Context assembly: schema, aggregation and prompt rendering.

pub mod aggregator;
pub mod render;
pub mod schema;

pub use aggregator::{
    AssemblyRequest, GENERIC_SYSTEM_PROMPT, MemoryTierAggregator, NEW_SESSION_MARKER, compose,
};
pub use render::{NO_DOCUMENTS, NO_LONG_TERM_MEMORIES, render, render_value};
pub use schema::{ContextMeta, ContextSchema, IdentityBlock, MemoryBlock, token_estimate};
