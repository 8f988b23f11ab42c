//! Platform-specific shaping of outbound replies.

use serde_json::Value;
use switchboard_core::{ChatResponse, Platform, Response};

/// Appended to replies cut at a platform's length limit.
pub const TRUNCATION_MARKER: &str = "...";

pub const FEISHU_MAX_CHARS: usize = 5000;
pub const DISCORD_MAX_CHARS: usize = 2000;

/// Reply length limit in characters (code points), if the platform has one.
pub fn max_reply_chars(platform: &Platform) -> Option<usize> {
    match platform {
        Platform::Feishu => Some(FEISHU_MAX_CHARS),
        Platform::Discord => Some(DISCORD_MAX_CHARS),
        Platform::Other(_) => None,
    }
}

/// Cut `text` to exactly `limit` characters, the last three being the
/// marker. Text already within the limit is returned as is.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let marker_len = TRUNCATION_MARKER.chars().count();
    if limit <= marker_len {
        return text.chars().take(limit).collect();
    }
    let mut out: String = text.chars().take(limit - marker_len).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

/// Shape a backend reply for `platform`.
///
/// Feishu also gets the invoked tool's name in `data["tool_name"]` so the
/// adapter can render a card for it.
pub fn format_response(chat: ChatResponse, platform: &Platform) -> Response {
    let mut response = Response {
        text: chat.text,
        data: chat.data,
        error: None,
    };

    if let Some(limit) = max_reply_chars(platform) {
        response.text = truncate_chars(&response.text, limit);
    }

    if *platform == Platform::Feishu {
        if let Some(tool) = chat.tool_name {
            response
                .data
                .insert("tool_name".to_string(), Value::String(tool));
        }
    }
    response
}
