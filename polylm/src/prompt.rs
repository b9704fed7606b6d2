//! Builds the final system instruction and serializes attachments into turn
//! text for providers without native multimodal input.

use crate::types::{Attachment, ConversationTurn, FocusMode, ModelDescriptor, UserProfile};

/// Persona-neutral base instruction. A model's persona prefix, when present,
/// is prepended before this so the persona sets the tone while the base text
/// still supplies the formatting rules.
pub const BASE_INSTRUCTION: &str = "You are a helpful assistant. Answer in well-structured \
Markdown. When web sources are available, ground your answer in them and cite them. \
Bold the key terms of your answer.";

fn focus_directive(focus: FocusMode) -> Option<&'static str> {
    match focus {
        FocusMode::All => None,
        FocusMode::Academic => Some(
            "Prefer scholarly sources, be precise about terminology, and cite where claims come from.",
        ),
        FocusMode::Writing => Some(
            "Prioritize prose quality: structure, flow, and word choice over exhaustive detail.",
        ),
        FocusMode::Code => Some(
            "Prefer working code examples with brief explanations; state language and version assumptions.",
        ),
        FocusMode::Social => Some(
            "Keep answers short, conversational, and focused on recent or trending context.",
        ),
    }
}

/// Deterministic concatenation of the system instruction sections, in order:
/// persona prefix, base instruction, user bio, response-style preferences,
/// focus directive, connected-integrations note. Empty sections are omitted.
pub fn build_system_instruction(
    model: &ModelDescriptor,
    profile: &UserProfile,
    focus: FocusMode,
) -> String {
    let mut sections: Vec<String> = Vec::new();

    if let Some(persona) = &model.persona_prefix {
        let persona = persona.trim();
        if !persona.is_empty() {
            sections.push(persona.to_string());
        }
    }

    sections.push(BASE_INSTRUCTION.to_string());

    let bio = profile.bio.trim();
    if !bio.is_empty() {
        sections.push(format!("Context about the user:\n{bio}"));
    }

    let style = profile.response_style.trim();
    if !style.is_empty() {
        sections.push(format!("Instructions from the user on how to respond:\n{style}"));
    }

    if let Some(directive) = focus_directive(focus) {
        sections.push(format!("Focus mode is \"{}\". {}", focus.as_str(), directive));
    }

    if !profile.integrations.is_empty() {
        sections.push(format!(
            "The user has connected these external data sources: {}. You do not have real \
access to them; clearly label any data you present from them as mock output.",
            profile.integrations.join(", ")
        ));
    }

    sections.join("\n\n")
}

/// A clearly delimited text block for one attachment. Text attachments carry
/// their full content; binaries degrade to a placeholder naming the file and
/// its type rather than being dropped.
pub fn attachment_block(att: &Attachment) -> String {
    if att.is_text {
        format!("FILE: {}\n---\n{}\n--- END FILE", att.name, att.payload)
    } else {
        binary_placeholder(att)
    }
}

/// Placeholder block for a binary that cannot be inlined.
pub fn binary_placeholder(att: &Attachment) -> String {
    format!(
        "[Attached file: {} (type: {}); binary content not included]",
        att.name, att.mime_type
    )
}

/// Turn content with every attachment serialized into the text, for providers
/// without native multimodal input.
pub fn merge_attachments(turn: &ConversationTurn) -> String {
    if turn.attachments.is_empty() {
        return turn.content.clone();
    }
    let mut out = turn.content.clone();
    for att in &turn.attachments {
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(&attachment_block(att));
    }
    out
}
