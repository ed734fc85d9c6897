//! Embedded editor helpers
//!
//! The MakeCode editor owns the payload format. The host only needs a
//! starter project for records that have never been saved, and the URL that
//! boots the editor in controller mode.

use anyhow::{Context, Result};
use reqwest::Url;
use serde_json::{json, Value};

use crate::models::ProjectId;

/// Blockly workspace with the "on start" and "forever" blocks
const DEFAULT_BLOCKS: &str = r#"<xml xmlns="https://developers.google.com/blockly/xml">
  <block type="pxt-on-start" id="on-start-block" x="0" y="0"></block>
  <block type="device_forever" id="forever-block" x="0" y="100"></block>
</xml>"#;

const DEFAULT_MAIN_TS: &str = "basic.forever(function () {\n\n})\n";

/// Starter payload for a project with nothing saved yet
///
/// The header id is set to the project id so the editor files the
/// workspace under the same identity the store uses.
pub fn default_payload(id: &ProjectId) -> Value {
    let pxt = json!({
        "name": "Untitled",
        "description": "",
        "dependencies": {
            "core": "*",
            "radio": "*",
            "microphone": "*",
        },
        "files": ["main.blocks", "main.ts"],
        "preferredEditor": "blocksprj",
    });

    json!({
        "header": {
            "id": id.as_str(),
            "name": "Untitled",
            "target": "microbit",
            "targetVersion": "6.0.0",
            "meta": {},
        },
        "text": {
            "main.ts": DEFAULT_MAIN_TS,
            "main.blocks": DEFAULT_BLOCKS,
            // pxt.json is stored as a string inside the payload
            "pxt.json": serde_json::to_string_pretty(&pxt).unwrap_or_default(),
        },
    })
}

/// Payload to open: the stored one, or the starter project
pub fn payload_or_default(id: &ProjectId, stored: Option<Value>) -> Value {
    match stored {
        Some(Value::Null) | None => default_payload(id),
        Some(payload) => payload,
    }
}

/// URL that boots the editor as an embedded, host-controlled frame
pub fn editor_url(base: &str, controller_id: &str) -> Result<String> {
    let mut url = Url::parse(base).with_context(|| format!("Invalid editor URL: {}", base))?;
    url.query_pairs_mut()
        .append_pair("controller", "1")
        .append_pair("controllerId", controller_id)
        .append_pair("embed", "1");
    Ok(url.to_string())
}
