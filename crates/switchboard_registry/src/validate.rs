//! Parameter validation at the registry boundary. Tool bodies only ever see
//! parameter maps that passed these checks.

use switchboard_core::{AppError, ParamKind, ParamMap, ParamSpec, ParamValue};

/// Check `params` against `schema` and fill in declared defaults.
///
/// Missing required parameters are reported together, before any type check.
/// Parameters the schema does not declare are passed through unchanged.
pub fn validate(schema: &[ParamSpec], mut params: ParamMap) -> Result<ParamMap, AppError> {
    let missing: Vec<&str> = schema
        .iter()
        .filter(|spec| spec.required && !params.contains_key(&spec.name))
        .map(|spec| spec.name.as_str())
        .collect();
    if !missing.is_empty() {
        return Err(AppError::invalid_params(format!(
            "missing required parameter(s): {}",
            missing.join(", ")
        ))
        .with_extra("missing", missing));
    }

    for spec in schema {
        match params.get(&spec.name) {
            Some(value) => check_value(spec, value)?,
            None => {
                if let Some(default) = &spec.default {
                    params.insert(spec.name.clone(), default.clone());
                }
            }
        }
    }
    Ok(params)
}

fn check_value(spec: &ParamSpec, value: &ParamValue) -> Result<(), AppError> {
    if !spec.kind.accepts(value) {
        return Err(AppError::invalid_params(format!(
            "parameter '{}' expects {}, got {}",
            spec.name,
            spec.kind,
            value.type_name()
        ))
        .with_extra("parameter", spec.name.clone()));
    }
    if spec.kind == ParamKind::Enum && !spec.allowed.is_empty() {
        let s = value.as_str().unwrap_or_default();
        if !spec.allowed.iter().any(|a| a == s) {
            return Err(AppError::invalid_params(format!(
                "parameter '{}' must be one of [{}], got '{}'",
                spec.name,
                spec.allowed.join(", "),
                s
            ))
            .with_extra("parameter", spec.name.clone()));
        }
    }
    Ok(())
}
