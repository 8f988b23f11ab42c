use std::sync::Arc;
use switchboard_core::{AppError, CallScope, ParamMap, ParamSpec, ParamValue, Tool, ToolEntry};

const MAX_REPEAT: i64 = 20;

/// Hands its `text` back, optionally repeated and upper-cased. Useful for
/// checking the path from a platform to the registry and back.
pub struct EchoTool {
    name: String,
}

impl EchoTool {
    pub fn new() -> Self {
        Self::named("echo")
    }

    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl Default for EchoTool {
    fn default() -> Self {
        Self::new()
    }
}

pub fn build(entry: &ToolEntry) -> Result<Arc<dyn Tool>, AppError> {
    Ok(Arc::new(EchoTool::named(&entry.name)))
}

#[async_trait::async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Echo the given text back"
    }

    fn schema(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::string("text").required().describe("Text to echo"),
            ParamSpec::int("repeat")
                .with_default(1i64)
                .describe("How many times to repeat the text"),
            ParamSpec::bool("upper")
                .with_default(false)
                .describe("Upper-case the result"),
        ]
    }

    async fn execute(&self, _scope: &CallScope, params: ParamMap) -> Result<ParamMap, AppError> {
        let text = params
            .get("text")
            .and_then(ParamValue::as_str)
            .unwrap_or_default();
        let repeat = params.get("repeat").and_then(ParamValue::as_i64).unwrap_or(1);
        if !(1..=MAX_REPEAT).contains(&repeat) {
            return Err(AppError::invalid_params(format!(
                "repeat must be between 1 and {}, got {}",
                MAX_REPEAT, repeat
            )));
        }
        let upper = params.get("upper").and_then(ParamValue::as_bool).unwrap_or(false);

        let mut out = vec![text; repeat as usize].join(" ");
        if upper {
            out = out.to_uppercase();
        }

        let mut result = ParamMap::new();
        result.insert("text".to_string(), ParamValue::String(out));
        Ok(result)
    }
}
