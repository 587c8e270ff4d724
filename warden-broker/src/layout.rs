// SPDX-FileCopyrightText: 2026 The warden developers
// SPDX-License-Identifier: MIT

//! UI layout vocabulary shared between brokers and clients.
//!
//! Clients advertise which layouts they can render as a list of string
//! maps; values use the `<kind>:item1,item2,…` serialization where the
//! kind is `required` or `optional` and boolean capabilities are spelled
//! `true`/`false`. Brokers answer with a concrete [`UiLayout`] per
//! authentication mode.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Layout type names.
pub mod layout_type {
    pub const FORM: &str = "form";
    pub const QR_CODE: &str = "qrcode";
    pub const NEW_PASSWORD: &str = "newpassword";
}

/// Entry widget kinds for form-style layouts.
pub mod entry_kind {
    pub const CHARS: &str = "chars";
    pub const CHARS_PASSWORD: &str = "chars_password";
    pub const DIGITS: &str = "digits";
    pub const DIGITS_PASSWORD: &str = "digits_password";
}

/// A concrete layout a broker asks the client to render for one mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiLayout {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub button: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl UiLayout {
    pub fn form(label: impl Into<String>) -> Self {
        Self {
            kind: layout_type::FORM.to_owned(),
            label: Some(label.into()),
            ..Default::default()
        }
    }

    pub fn with_entry(mut self, entry: &str) -> Self {
        self.entry = Some(entry.to_owned());
        self
    }

    pub fn with_button(mut self, button: impl Into<String>) -> Self {
        self.button = Some(button.into());
        self
    }

    pub fn with_wait(mut self) -> Self {
        self.wait = Some("true".to_owned());
        self
    }
}

/// What one advertised layout allows a broker to use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutCapabilities {
    pub kind: String,
    entry_kinds: Vec<String>,
    wait: bool,
    button: bool,
    content: bool,
}

impl LayoutCapabilities {
    /// Parse one client-advertised layout map.
    ///
    /// Returns `None` when the map carries no `type` key.
    pub fn parse(layout: &HashMap<String, String>) -> Option<Self> {
        let kind = layout.get("type")?.clone();
        let mut caps = Self {
            kind,
            ..Default::default()
        };
        if let Some(entry) = layout.get("entry") {
            caps.entry_kinds = parse_items(entry);
        }
        if let Some(wait) = layout.get("wait") {
            caps.wait = parse_items(wait).iter().any(|v| v == "true");
        }
        caps.button = layout.contains_key("button");
        caps.content = layout.contains_key("content");
        Some(caps)
    }

    pub fn supports_entry(&self, kind: &str) -> bool {
        self.entry_kinds.iter().any(|k| k == kind)
    }

    pub fn supports_wait(&self) -> bool {
        self.wait
    }

    pub fn supports_button(&self) -> bool {
        self.button
    }

    pub fn supports_content(&self) -> bool {
        self.content
    }
}

/// Split the `<kind>:item1,item2` serialization into its items.
///
/// The leading `required`/`optional` kind only matters to clients; a
/// broker treats any listed item as usable.
fn parse_items(value: &str) -> Vec<String> {
    let items = match value.split_once(':') {
        Some((_, items)) => items,
        None => return Vec::new(),
    };
    items
        .split(',')
        .filter(|i| !i.is_empty())
        .map(str::to_owned)
        .collect()
}
