//! Prompt rendering.
//!
//! The layout below is a fixed contract: downstream consumers parse and diff
//! rendered prompts, so section order, delimiter lines and fallback strings
//! must stay byte-for-byte stable.
//!
//! ```text
//! === SYSTEM ===
//! === IDENTITY ===
//! === PREVIOUS SESSION CONTEXT ===
//! === LONG-TERM MEMORY (RAG) ===
//! === RETRIEVED DOCUMENTS ===
//! === RECENT HISTORY ===
//! === CURRENT MESSAGE ===
//! Assistant:
//! ```

use crate::context::schema::ContextSchema;
use localmind_core::error::RenderError;
use localmind_core::message::Role;
use serde_json::Value;
use std::fmt::Write;

pub const NO_LONG_TERM_MEMORIES: &str = "No relevant long-term memories.";
pub const NO_DOCUMENTS: &str = "No relevant documents found.";

/// Keys a schema must carry, parents before children.
const REQUIRED_FIELDS: &[&str] = &[
    "meta",
    "system",
    "identity",
    "identity.user_name",
    "identity.workspace",
    "identity.assistant_name",
    "memory",
    "memory.long_term",
    "memory.short_term",
    "rag_context",
    "history",
    "current_message",
];

/// Render a typed schema. Pure and deterministic.
pub fn render(schema: &ContextSchema) -> String {
    let long_term = if schema.memory.long_term.is_empty() {
        NO_LONG_TERM_MEMORIES.to_string()
    } else {
        schema
            .memory
            .long_term
            .iter()
            .map(|item| format!("- {}", item.content))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let documents = if schema.rag_context.is_empty() {
        NO_DOCUMENTS
    } else {
        schema.rag_context.as_str()
    };

    let mut history = String::new();
    for turn in &schema.history {
        let speaker = match turn.role {
            Role::User => "User",
            Role::Assistant => "Assistant",
        };
        // Writing into a String cannot fail.
        let _ = writeln!(history, "{speaker}: {}", turn.content);
    }

    format!(
        "=== SYSTEM ===\n{system}\n\n\
         === IDENTITY ===\nUser: {user}\nWorkspace: {workspace}\n\n\
         === PREVIOUS SESSION CONTEXT ===\n(Summary of earlier conversation)\n{short_term}\n\n\
         === LONG-TERM MEMORY (RAG) ===\n{long_term}\n\n\
         === RETRIEVED DOCUMENTS ===\n{documents}\n\n\
         === RECENT HISTORY ===\n{history}\n\
         === CURRENT MESSAGE ===\nUser: {current}\n\nAssistant:",
        system = schema.system,
        user = schema.identity.user_name,
        workspace = schema.identity.workspace,
        short_term = schema.memory.short_term,
        current = schema.current_message,
    )
}

/// Render an untyped schema, as received from a client.
///
/// A missing required key fails with [`RenderError::SchemaIncomplete`]
/// naming the first one absent; nothing is defaulted.
pub fn render_value(value: &Value) -> Result<String, RenderError> {
    for field in REQUIRED_FIELDS {
        let pointer = format!("/{}", field.replace('.', "/"));
        if value.pointer(&pointer).is_none() {
            return Err(RenderError::SchemaIncomplete {
                field: (*field).to_string(),
            });
        }
    }

    let schema: ContextSchema =
        serde_json::from_value(value.clone()).map_err(|e| RenderError::InvalidSchema {
            reason: e.to_string(),
        })?;
    Ok(render(&schema))
}
