//! The context assembly and compaction engine, the heart of LocalMind.
//!
//! Every conversational turn flows through the [`TurnPipeline`]:
//!
//! 1. **Record** the user message in the transcript
//! 2. **Retrieve** semantic hits for the message
//! 3. **Assemble** profiles, the deep-past narrative, semantic hits and the
//!    active window into a [`ContextSchema`]
//! 4. **Render** the schema into one prompt and send it to the chat model
//! 5. **Record** the reply, extract long-term facts, and trigger compaction
//!
//! Compaction folds the oldest unsummarized turns into summary chapters once
//! the active window overflows, either on the background
//! [`CompactionScheduler`] or inline after the reply.

pub mod compaction;
pub mod context;
pub mod pipeline;
pub mod profile;
pub mod retrieval;
pub mod scheduler;
pub mod sidecar;

#[cfg(test)]
mod test_helpers;

pub use compaction::{
    CompactionEngine, CompactionOutcome, CompactionPolicy, build_compaction_prompt, format_chunk,
    session_narrative,
};
pub use context::{
    AssemblyRequest, ContextSchema, MemoryTierAggregator, NEW_SESSION_MARKER, compose, render,
    render_value,
};
pub use pipeline::{CompactionReport, ContextPreview, TurnPipeline, TurnRequest, TurnResponse};
pub use profile::{ProfileResolver, ResolvedProfiles, synthesize_model_profile};
pub use retrieval::{Retrieval, Retriever, truncate_chars};
pub use scheduler::{BackoffPolicy, CompactionScheduler, CompactionStatus};
pub use sidecar::{FactExtractor, NO_DATA, NewMemory};
