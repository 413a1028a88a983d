//! C6 — reasoning continuity. Two small, pure half-operations that cooperate across turns:
//! C5 stamps a response's `thinking` block with the OpenAI reasoning item's id/encrypted
//! payload; C4 reads those same fields back out of the next request's prior-turn `thinking`
//! blocks to reconstruct a reasoning input item. Active only for the `openai` adapter
//! (spec.md §4.5) — callers gate on adapter kind before reaching for these.

use crate::protocol::{anthropic::AnthropicContentBlock, openai::responses::InputItem};

/// What a prior-turn `thinking` block degrades to when C4 can't reconstruct a reasoning item
/// (neither id nor encrypted content survived, or the rule doesn't apply).
pub fn degrade_to_visible_text(thinking: &str) -> AnthropicContentBlock {
    AnthropicContentBlock::Text {
        text: format!("<think>{thinking}</think>"),
        unknown_fields: Default::default(),
    }
}

/// Reconstructs a reasoning input item from a prior-turn `thinking` block, per the preference
/// order in spec.md §4.3: encrypted content first, then bare id, else `None` (caller degrades
/// to visible text).
pub fn reasoning_input_item(block: &AnthropicContentBlock) -> Option<InputItem> {
    let AnthropicContentBlock::Thinking {
        extracted_openai_rs_id,
        extracted_openai_rs_encrypted_content,
        ..
    } = block
    else {
        return None;
    };

    if let Some(encrypted_content) = extracted_openai_rs_encrypted_content {
        return Some(InputItem::Reasoning {
            id: None,
            encrypted_content: Some(encrypted_content.clone()),
            summary: Vec::new(),
        });
    }

    extracted_openai_rs_id.as_ref().map(|id| InputItem::Reasoning {
        id: Some(id.clone()),
        encrypted_content: None,
        summary: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thinking_block(id: Option<&str>, encrypted: Option<&str>) -> AnthropicContentBlock {
        AnthropicContentBlock::Thinking {
            thinking: "because...".to_string(),
            signature: None,
            extracted_openai_rs_id: id.map(str::to_string),
            extracted_openai_rs_encrypted_content: encrypted.map(str::to_string),
            unknown_fields: Default::default(),
        }
    }

    #[test]
    fn prefers_encrypted_content_over_id() {
        let block = thinking_block(Some("rs_abc"), Some("ENC"));
        let item = reasoning_input_item(&block).unwrap();
        let InputItem::Reasoning {
            id,
            encrypted_content,
            ..
        } = item
        else {
            panic!("expected a reasoning item");
        };
        assert_eq!(id, None);
        assert_eq!(encrypted_content.as_deref(), Some("ENC"));
    }

    #[test]
    fn falls_back_to_bare_id() {
        let block = thinking_block(Some("rs_abc"), None);
        let item = reasoning_input_item(&block).unwrap();
        let InputItem::Reasoning { id, .. } = item else {
            panic!("expected a reasoning item");
        };
        assert_eq!(id.as_deref(), Some("rs_abc"));
    }

    #[test]
    fn degrades_when_neither_field_present() {
        let block = thinking_block(None, None);
        assert!(reasoning_input_item(&block).is_none());
    }

    #[test]
    fn round_trip_id_matches_spec_example() {
        let block = thinking_block(Some("X"), None);
        let item = reasoning_input_item(&block).unwrap();
        let InputItem::Reasoning { id, encrypted_content, .. } = item else {
            panic!("expected a reasoning item");
        };
        assert_eq!(id.as_deref(), Some("X"));
        assert!(encrypted_content.is_none());
    }
}
