//! Webhook wire payloads.
//!
//! The endpoint consumes chat-webhook JSON: a display name, an avatar,
//! one embed carrying the observation as titled fields, and optionally an
//! action row with a button referencing the submitting label. The shape
//! is owned by the receiving side; field and component caps below follow
//! its published limits.

use serde::{Deserialize, Serialize};

use super::observation::{OutboundObservation, Priority};

/// Most fields an embed may carry.
pub const MAX_EMBED_FIELDS: usize = 25;
/// Longest rendered field value; longer values are cut with an ellipsis.
pub const MAX_FIELD_VALUE_LEN: usize = 1024;

const COLOR_ERROR: u32 = 0xE7_4C3C;
const COLOR_SUCCESS: u32 = 0x2E_CC71;
const COLOR_DEFAULT: u32 = 0x35_98DB;

/// How the pipeline introduces itself at the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderIdentity {
    pub username: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WirePayload {
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub embeds: Vec<Embed>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<ActionRow>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embed {
    pub title: String,
    /// Body text above the fields. Filled from the `message` property of
    /// error observations; absent otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub color: u32,
    pub fields: Vec<EmbedField>,
    /// RFC 3339 observation time.
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRow {
    /// Component type 1: action row.
    #[serde(rename = "type")]
    pub component_type: u8,
    pub components: Vec<Button>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    /// Component type 2: button.
    #[serde(rename = "type")]
    pub component_type: u8,
    /// Style 2: secondary.
    pub style: u8,
    pub label: String,
    pub custom_id: String,
}

/// Renders an observation into the webhook shape.
#[must_use]
pub fn payload_for(observation: &OutboundObservation, sender: &SenderIdentity) -> WirePayload {
    let description = if observation.kind == "error" {
        observation
            .properties
            .get("message")
            .and_then(serde_json::Value::as_str)
            .map(|message| clip(message.to_string()))
    } else {
        None
    };

    let fields = observation
        .properties
        .iter()
        .filter(|(name, _)| !(description.is_some() && name.as_str() == "message"))
        .take(MAX_EMBED_FIELDS)
        .map(|(name, value)| {
            let rendered = render_value(value);
            EmbedField {
                name: name.clone(),
                inline: rendered.len() <= 24,
                value: rendered,
            }
        })
        .collect();

    let footer_text = match &observation.source {
        Some(source) => format!("{} ({source})", observation.label),
        None => observation.label.clone(),
    };

    let embed = Embed {
        title: title_for(&observation.kind),
        description,
        color: color_for(observation),
        fields,
        timestamp: observation.timestamp.to_rfc3339(),
        footer: Some(EmbedFooter { text: footer_text }),
    };

    let components = (observation.priority == Priority::High).then(|| {
        vec![ActionRow {
            component_type: 1,
            components: vec![Button {
                component_type: 2,
                style: 2,
                label: format!("Ping {}", observation.label),
                custom_id: format!("cohort:ack:{}", observation.label),
            }],
        }]
    });

    WirePayload {
        username: sender.username.clone(),
        avatar_url: sender.avatar_url.clone(),
        embeds: vec![embed],
        components,
    }
}

fn color_for(observation: &OutboundObservation) -> u32 {
    if observation.kind == "error" || observation.priority == Priority::High {
        COLOR_ERROR
    } else if observation.kind == "funnel_completed" {
        COLOR_SUCCESS
    } else {
        COLOR_DEFAULT
    }
}

/// `page_view` becomes `Page View`.
fn title_for(kind: &str) -> String {
    kind.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strings render bare, everything else as compact JSON.
fn render_value(value: &serde_json::Value) -> String {
    clip(match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

/// Cuts long values at a char boundary and marks the cut.
fn clip(mut rendered: String) -> String {
    if rendered.len() > MAX_FIELD_VALUE_LEN {
        let mut cut = MAX_FIELD_VALUE_LEN - 3;
        while !rendered.is_char_boundary(cut) {
            cut -= 1;
        }
        rendered.truncate(cut);
        rendered.push_str("...");
    }
    rendered
}
