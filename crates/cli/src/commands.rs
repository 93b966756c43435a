//! Subcommand bodies. Each returns the JSON document `main` prints.

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use flowtool_core::Locale;
use flowtool_tool_runtime::{
    classify_error, convert_tools, extract_variable_refs, resolve_variables,
    validate_tool_definition, validate_variable_refs, ErrorMetadata, ProviderFormat, ToolChoice,
    ToolDefinition,
};
use serde_json::{json, Map, Value};

/// Read a file holding one tool definition or an array of them.
pub fn load_definitions(path: &Path) -> Result<Vec<ToolDefinition>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_definitions(&raw).with_context(|| format!("invalid tool definitions in {}", path.display()))
}

fn parse_definitions(raw: &str) -> Result<Vec<ToolDefinition>> {
    let value: Value = serde_json::from_str(raw)?;
    let defs = match value {
        Value::Array(_) => serde_json::from_value(value)?,
        other => vec![serde_json::from_value(other)?],
    };
    Ok(defs)
}

/// Per-definition reports plus the number of invalid definitions.
pub fn validate(defs: &[ToolDefinition]) -> (Value, usize) {
    let mut invalid = 0;
    let reports: Vec<Value> = defs
        .iter()
        .map(|def| {
            let report = validate_tool_definition(def);
            if !report.valid {
                invalid += 1;
            }
            json!({"name": def.name, "valid": report.valid, "errors": report.errors})
        })
        .collect();
    (Value::Array(reports), invalid)
}

fn parse_tool_choice(raw: &str) -> ToolChoice {
    match raw.trim() {
        "auto" => ToolChoice::Auto,
        "none" => ToolChoice::None,
        "required" | "any" => ToolChoice::Required,
        name => ToolChoice::Function(name.to_string()),
    }
}

pub fn schema(defs: &[ToolDefinition], format: &str, tool_choice: Option<&str>) -> Value {
    let format = ProviderFormat::from(format);
    let tools = Value::Array(convert_tools(defs, format));
    match tool_choice {
        Some(raw) => json!({
            "format": format.as_str(),
            "tools": tools,
            "tool_choice": parse_tool_choice(raw).render(format),
        }),
        None => tools,
    }
}

pub fn resolve(args: &str, vars: &str) -> Result<Value> {
    let template: Value = serde_json::from_str(args).context("--args is not valid JSON")?;
    let variables: Map<String, Value> =
        serde_json::from_str(vars).context("--vars must be a JSON object")?;

    Ok(json!({
        "references": extract_variable_refs(&template),
        "missing": validate_variable_refs(&template, &variables),
        "resolved": resolve_variables(&template, &variables),
    }))
}

/// A failure described on the command line.
struct ReportedFailure<'a> {
    message: &'a str,
    status: Option<u16>,
}

impl fmt::Display for ReportedFailure<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message)
    }
}

impl ErrorMetadata for ReportedFailure<'_> {
    fn http_status(&self) -> Option<u16> {
        self.status
    }
}

pub fn classify(message: &str, status: Option<u16>, locale: Locale) -> Value {
    let classified = classify_error(&ReportedFailure { message, status }).with_locale(locale);
    serde_json::to_value(&classified).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEATHER: &str = r#"{
        "name": "get_weather",
        "description": "Current weather for a city",
        "parameters": [
            {"name": "city", "type": "string", "description": "City name", "required": true}
        ]
    }"#;

    #[test]
    fn test_parse_single_and_array() {
        assert_eq!(parse_definitions(WEATHER).unwrap().len(), 1);
        let array = format!("[{WEATHER}, {WEATHER}]");
        assert_eq!(parse_definitions(&array).unwrap().len(), 2);
        assert!(parse_definitions("{\"name\": 3}").is_err());
    }

    #[test]
    fn test_validate_counts_invalid() {
        let mut defs = parse_definitions(WEATHER).unwrap();
        let mut bad = defs[0].clone();
        bad.name = "1-weather".into();
        defs.push(bad);

        let (output, invalid) = validate(&defs);
        assert_eq!(invalid, 1);
        assert_eq!(output[0]["valid"], true);
        assert_eq!(output[1]["valid"], false);
    }

    #[test]
    fn test_schema_with_tool_choice() {
        let defs = parse_definitions(WEATHER).unwrap();

        let plain = schema(&defs, "anthropic", None);
        assert_eq!(plain[0]["input_schema"]["required"], json!(["city"]));

        let with_choice = schema(&defs, "openai", Some("get_weather"));
        assert_eq!(with_choice["format"], "openai");
        assert_eq!(
            with_choice["tool_choice"],
            json!({"type": "function", "function": {"name": "get_weather"}})
        );
    }

    #[test]
    fn test_resolve_reports_missing() {
        let output = resolve(
            r#"{"greeting": "Hi {{user.name}}", "id": "{{user.id}}"}"#,
            r#"{"user": {"name": "Ana"}}"#,
        )
        .unwrap();

        assert_eq!(output["references"], json!(["user.name", "user.id"]));
        assert_eq!(output["missing"], json!(["user.id"]));
        assert_eq!(output["resolved"]["greeting"], "Hi Ana");
        assert!(resolve("{}", "[1]").is_err());
    }

    #[test]
    fn test_classify_uses_status_and_locale() {
        let output = classify("slow down", Some(429), Locale::En);
        assert_eq!(output["code"], "RATE_LIMITED");
        assert_eq!(output["retryable"], true);

        let zh = classify("connect ECONNREFUSED", None, Locale::Zh);
        assert_eq!(zh["code"], "UNREACHABLE");
        assert_ne!(zh["userMessage"], output["userMessage"]);
    }
}
