//! Local backend for the terminal: slash commands run tools, everything
//! else is echoed back.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use switchboard_core::tools::{params_from_json, params_to_json};
use switchboard_core::{AppError, CallScope, ChatResponse, ErrorCode, ParamMap, ParamValue};
use switchboard_pipeline::Backend;
use switchboard_registry::Registry;

/// A parsed line of input.
#[derive(Debug, PartialEq)]
pub enum Command<'a> {
    ListTools,
    Call { tool: &'a str, args: &'a str },
    Chat(&'a str),
}

impl<'a> Command<'a> {
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('/') else {
            return Command::Chat(line);
        };
        let (tool, args) = match rest.split_once(char::is_whitespace) {
            Some((tool, args)) => (tool, args.trim()),
            None => (rest, ""),
        };
        if tool == "tools" {
            Command::ListTools
        } else {
            Command::Call { tool, args }
        }
    }
}

pub struct CommandBackend {
    registry: Arc<Registry>,
}

impl CommandBackend {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    fn list_tools(&self) -> ChatResponse {
        let tools = self.registry.describe();
        if tools.is_empty() {
            return ChatResponse::text("No tools registered.");
        }
        let lines: Vec<String> = tools
            .iter()
            .map(|t| {
                let params: Vec<String> = t
                    .schema
                    .iter()
                    .map(|p| {
                        if p.required {
                            format!("{}: {}", p.name, p.kind)
                        } else {
                            format!("{}?: {}", p.name, p.kind)
                        }
                    })
                    .collect();
                format!("/{} ({}) - {}", t.name, params.join(", "), t.description)
            })
            .collect();
        ChatResponse::text(lines.join("\n"))
    }

    async fn call(&self, scope: &CallScope, tool: &str, args: &str) -> Result<ChatResponse> {
        let params = parse_args(args)?;
        tracing::debug!("Calling tool {} with {} param(s)", tool, params.len());

        let out = self.registry.execute(scope, tool, params).await?;
        let text = render(&out);
        Ok(ChatResponse::text(text)
            .with_tool(tool)
            .with_data("result", Value::Object(params_to_json(out))))
    }
}

#[async_trait]
impl Backend for CommandBackend {
    async fn process_message_with_user_id(
        &self,
        scope: &CallScope,
        text: &str,
        user_id: &str,
    ) -> Result<ChatResponse> {
        match Command::parse(text) {
            Command::ListTools => Ok(self.list_tools()),
            Command::Call { tool, args } => self.call(scope, tool, args).await,
            Command::Chat(text) => {
                tracing::debug!("Echoing plain text from {}", user_id);
                Ok(ChatResponse::text(text))
            }
        }
    }
}

/// `{...}` is parsed as a JSON object; anything else becomes `{"text": args}`.
fn parse_args(args: &str) -> Result<ParamMap, AppError> {
    if args.is_empty() {
        return Ok(ParamMap::new());
    }
    if args.starts_with('{') {
        let value: Value = serde_json::from_str(args)
            .map_err(|e| AppError::wrap(ErrorCode::InvalidParams, "arguments are not valid JSON", e))?;
        return params_from_json(value);
    }
    let mut params = ParamMap::new();
    params.insert("text".to_string(), ParamValue::from(args));
    Ok(params)
}

/// Prefer a `text` or `stdout` field; fall back to the whole result as JSON.
fn render(out: &ParamMap) -> String {
    for key in ["text", "stdout"] {
        if let Some(s) = out.get(key).and_then(ParamValue::as_str) {
            return s.trim_end().to_string();
        }
    }
    serde_json::to_string(out).unwrap_or_default()
}
