//! Static model catalog. Public IDs are the stable selection surface;
//! internal IDs are what goes on the wire and may change between releases.

use crate::types::{ModelDescriptor, ProviderKind};

#[allow(clippy::too_many_arguments)]
fn m(
    public_id: &str,
    display_name: &str,
    provider: ProviderKind,
    internal_model_id: &str,
    supports_thinking: bool,
    supports_image_generation: bool,
    max_output_tokens: u64,
) -> ModelDescriptor {
    ModelDescriptor {
        public_id: public_id.into(),
        display_name: display_name.into(),
        provider,
        internal_model_id: internal_model_id.into(),
        supports_thinking,
        supports_image_generation,
        max_output_tokens,
        persona_prefix: None,
    }
}

/// The built-in model catalog.
pub fn default_models() -> Vec<ModelDescriptor> {
    use ProviderKind::*;

    let mut models = vec![
        m("gemini-flash", "Gemini 2.5 Flash", Google, "gemini-2.5-flash", true, false, 65_536),
        m("gemini-pro", "Gemini 2.5 Pro", Google, "gemini-2.5-pro", true, false, 65_536),
        m(
            "gemini-image",
            "Gemini 2.5 Flash Image",
            Google,
            "gemini-2.5-flash-image-preview",
            false,
            true,
            8_192,
        ),
        m("gpt-4o", "GPT-4o", OpenAi, "gpt-4o", false, false, 16_384),
        m("gpt-4o-mini", "GPT-4o mini", OpenAi, "gpt-4o-mini", false, false, 16_384),
        m("grok", "Grok 4", XAi, "grok-4", false, false, 32_768),
        m("kimi", "Kimi K2", Moonshot, "kimi-k2-0905-preview", false, false, 16_384),
        m("claude-sonnet", "Claude Sonnet 4.5", Anthropic, "claude-sonnet-4-5", false, false, 64_000),
    ];

    let mut tutor = m("gemini-tutor", "Gemini Tutor", Google, "gemini-2.5-flash", true, false, 65_536);
    tutor.persona_prefix = Some(
        "You are a patient tutor. Walk through reasoning step by step and check \
         the user's understanding before moving on."
            .into(),
    );
    models.push(tutor);

    models
}

/// Look a model up by its public ID.
pub fn find_model(public_id: &str) -> Option<ModelDescriptor> {
    default_models()
        .into_iter()
        .find(|model| model.public_id == public_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn public_ids_are_unique() {
        let models = default_models();
        let ids: HashSet<&str> = models.iter().map(|m| m.public_id.as_str()).collect();
        assert_eq!(ids.len(), models.len());
    }

    #[test]
    fn every_provider_is_represented() {
        let providers: HashSet<ProviderKind> =
            default_models().iter().map(|m| m.provider).collect();
        assert_eq!(providers.len(), 5);
    }

    #[test]
    fn lookup_by_public_id() {
        let model = find_model("claude-sonnet").unwrap();
        assert_eq!(model.provider, ProviderKind::Anthropic);
        assert_eq!(model.internal_model_id, "claude-sonnet-4-5");
        assert!(find_model("no-such-model").is_none());
    }

    #[test]
    fn catalog_includes_a_persona_model() {
        assert!(default_models().iter().any(|m| m.persona_prefix.is_some()));
    }
}
