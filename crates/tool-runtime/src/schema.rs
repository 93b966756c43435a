//! Conversion between [`ToolDefinition`] and provider tool wire formats.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::provider::ProviderFormat;
use crate::tool::{ParameterItems, ParameterType, ToolDefinition, ToolParameter};

pub const MAX_TOOL_NAME_LEN: usize = 64;
pub const MAX_TOOL_DESCRIPTION_LEN: usize = 1024;

// ── To JSON Schema ──────────────────────────────────────────────────

/// JSON Schema property for one parameter, recursing into items/properties.
pub fn parameter_to_schema(param: &ToolParameter) -> Value {
    let mut schema = Map::new();
    schema.insert("type".into(), json!(param.param_type.as_str()));
    schema.insert("description".into(), json!(param.description));
    if let Some(values) = &param.enum_values {
        schema.insert("enum".into(), Value::Array(values.clone()));
    }
    if let Some(default) = &param.default {
        schema.insert("default".into(), default.clone());
    }

    match param.param_type {
        ParameterType::Array => {
            if let Some(items) = &param.items {
                schema.insert("items".into(), items_to_schema(items));
            }
        }
        ParameterType::Object => {
            if let Some(properties) = &param.properties {
                insert_object_fields(&mut schema, properties);
            }
        }
        _ => {}
    }

    Value::Object(schema)
}

fn items_to_schema(items: &ParameterItems) -> Value {
    let mut schema = Map::new();
    schema.insert("type".into(), json!(items.param_type.as_str()));
    if let Some(description) = &items.description {
        schema.insert("description".into(), json!(description));
    }
    if let Some(values) = &items.enum_values {
        schema.insert("enum".into(), Value::Array(values.clone()));
    }
    if let Some(properties) = &items.properties {
        insert_object_fields(&mut schema, properties);
    }
    Value::Object(schema)
}

/// Adds `properties` and (when non-empty) `required` for a parameter list.
fn insert_object_fields(schema: &mut Map<String, Value>, params: &[ToolParameter]) {
    let properties: Map<String, Value> = params
        .iter()
        .map(|p| (p.name.clone(), parameter_to_schema(p)))
        .collect();
    let required: Vec<Value> = params
        .iter()
        .filter(|p| p.required)
        .map(|p| json!(p.name))
        .collect();

    schema.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".into(), Value::Array(required));
    }
}

/// Top-level object schema for a parameter list.
pub fn to_json_schema(params: &[ToolParameter]) -> Value {
    let mut schema = Map::new();
    schema.insert("type".into(), json!("object"));
    insert_object_fields(&mut schema, params);
    Value::Object(schema)
}

pub fn to_openai_format(def: &ToolDefinition) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": def.name,
            "description": def.description,
            "parameters": to_json_schema(&def.parameters),
        }
    })
}

pub fn to_claude_format(def: &ToolDefinition) -> Value {
    json!({
        "name": def.name,
        "description": def.description,
        "input_schema": to_json_schema(&def.parameters),
    })
}

pub fn to_provider_schema(def: &ToolDefinition, format: ProviderFormat) -> Value {
    match format {
        ProviderFormat::Claude => to_claude_format(def),
        ProviderFormat::OpenAi | ProviderFormat::OpenAiCompatible => to_openai_format(def),
    }
}

/// Batch conversion. Unknown format names fall back to the OpenAI shape.
pub fn convert_tools(defs: &[ToolDefinition], format: impl Into<ProviderFormat>) -> Vec<Value> {
    let format = format.into();
    defs.iter().map(|d| to_provider_schema(d, format)).collect()
}

// ── Tool choice ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    #[default]
    Auto,
    None,
    Required,
    /// Force one specific tool.
    Function(String),
}

impl ToolChoice {
    /// Wire value for `tool_choice`; `None` means omit the field.
    pub fn render(&self, format: ProviderFormat) -> Option<Value> {
        match format {
            ProviderFormat::Claude => match self {
                ToolChoice::Auto => Some(json!({"type": "auto"})),
                ToolChoice::None => None,
                ToolChoice::Required => Some(json!({"type": "any"})),
                ToolChoice::Function(name) => Some(json!({"type": "tool", "name": name})),
            },
            ProviderFormat::OpenAi | ProviderFormat::OpenAiCompatible => match self {
                ToolChoice::Auto => Some(json!("auto")),
                ToolChoice::None => Some(json!("none")),
                ToolChoice::Required => Some(json!("required")),
                ToolChoice::Function(name) => Some(json!({
                    "type": "function",
                    "function": {"name": name}
                })),
            },
        }
    }
}

// ── Validation ──────────────────────────────────────────────────────

/// Advisory result of [`validate_tool_definition`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

fn is_valid_tool_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn validate_tool_definition(def: &ToolDefinition) -> ValidationReport {
    let mut errors = Vec::new();

    if def.name.is_empty() {
        errors.push("Tool name is required".to_string());
    } else {
        if !is_valid_tool_name(&def.name) {
            errors.push(format!(
                "Tool name '{}' must start with a letter or underscore and contain only letters, digits and underscores",
                def.name
            ));
        }
        if def.name.chars().count() > MAX_TOOL_NAME_LEN {
            errors.push(format!(
                "Tool name must be at most {} characters",
                MAX_TOOL_NAME_LEN
            ));
        }
    }

    if def.description.trim().is_empty() {
        errors.push("Tool description is required".to_string());
    } else if def.description.chars().count() > MAX_TOOL_DESCRIPTION_LEN {
        errors.push(format!(
            "Tool description must be at most {} characters",
            MAX_TOOL_DESCRIPTION_LEN
        ));
    }

    validate_parameters(&def.parameters, "", &mut errors);

    ValidationReport {
        valid: errors.is_empty(),
        errors,
    }
}

fn validate_parameters(params: &[ToolParameter], prefix: &str, errors: &mut Vec<String>) {
    let mut seen = HashSet::new();
    for (index, param) in params.iter().enumerate() {
        let label = if param.name.is_empty() {
            format!("{}parameters[{}]", prefix, index)
        } else {
            format!("{}{}", prefix, param.name)
        };

        if param.name.is_empty() {
            errors.push(format!("Parameter {} is missing a name", label));
        } else if !seen.insert(param.name.as_str()) {
            errors.push(format!("Duplicate parameter name '{}'", label));
        }
        if param.description.trim().is_empty() {
            errors.push(format!("Parameter '{}' is missing a description", label));
        }

        let nested_prefix = format!("{}.", label);
        if let Some(properties) = &param.properties {
            validate_parameters(properties, &nested_prefix, errors);
        }
        if let Some(properties) = param.items.as_ref().and_then(|i| i.properties.as_ref()) {
            validate_parameters(properties, &format!("{}[].", label), errors);
        }
    }
}

// ── From JSON Schema ────────────────────────────────────────────────

fn parameter_type_of(schema: &Value) -> ParameterType {
    match schema.get("type").and_then(Value::as_str) {
        Some("number") | Some("integer") => ParameterType::Number,
        Some("boolean") => ParameterType::Boolean,
        Some("array") => ParameterType::Array,
        Some("object") => ParameterType::Object,
        _ => ParameterType::String,
    }
}

/// Inverse of [`to_json_schema`] for schemas advertised by remote servers.
///
/// Unknown or missing types become `string`, `integer` becomes `number`.
pub fn parameters_from_json_schema(schema: &Value) -> Vec<ToolParameter> {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Vec::new();
    };
    let required: HashSet<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    properties
        .iter()
        .map(|(name, prop)| {
            let param_type = parameter_type_of(prop);
            let mut param = ToolParameter::new(
                name.clone(),
                param_type,
                prop.get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default(),
            );
            param.required = required.contains(name.as_str());
            param.enum_values = prop.get("enum").and_then(Value::as_array).cloned();
            param.default = prop.get("default").cloned();

            match param_type {
                ParameterType::Array => {
                    if let Some(items) = prop.get("items") {
                        let nested = parameters_from_json_schema(items);
                        param.items = Some(Box::new(ParameterItems {
                            param_type: parameter_type_of(items),
                            description: items
                                .get("description")
                                .and_then(Value::as_str)
                                .map(str::to_string),
                            enum_values: items.get("enum").and_then(Value::as_array).cloned(),
                            properties: (!nested.is_empty()).then_some(nested),
                        }));
                    }
                }
                ParameterType::Object => {
                    let nested = parameters_from_json_schema(prop);
                    if !nested.is_empty() {
                        param.properties = Some(nested);
                    }
                }
                _ => {}
            }
            param
        })
        .collect()
}
