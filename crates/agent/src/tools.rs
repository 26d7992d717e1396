use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::runner::Runner;

/// What a tool sees of the run that invoked it.
pub struct ToolContext<'a> {
    pub runner: &'a Runner,
    pub agent: &'a str,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON schema of the arguments object.
    fn parameters(&self) -> Value;
    async fn execute(&self, ctx: &ToolContext<'_>, input: Value) -> Result<Value>;
}

/// The literal marker side-effecting tools hand back to the model.
pub fn success_marker() -> Value {
    json!({ "status": "success" })
}

/// OpenAI `tools` entry for a function tool.
pub fn function_definition(name: &str, description: &str, parameters: Value) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": name,
            "description": description,
            "parameters": parameters,
        }
    })
}

/// Schema for an object whose listed properties are all required strings.
pub fn string_arguments(properties: &[(&str, &str)]) -> Value {
    let mut schema_properties = serde_json::Map::new();
    for (name, description) in properties {
        schema_properties
            .insert((*name).to_string(), json!({ "type": "string", "description": description }));
    }
    let required: Vec<&str> = properties.iter().map(|(name, _)| *name).collect();

    json!({
        "type": "object",
        "properties": schema_properties,
        "required": required,
        "additionalProperties": false,
    })
}

/// Reads a required string argument.
pub fn required_str<'a>(input: &'a Value, key: &str) -> Result<&'a str> {
    input
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("missing string argument `{key}`"))
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.register_shared(Arc::new(tool));
    }

    pub fn register_shared(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn definitions(&self) -> Vec<Value> {
        self.tools
            .values()
            .map(|tool| function_definition(tool.name(), tool.description(), tool.parameters()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl FromIterator<Arc<dyn Tool>> for ToolRegistry {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Tool>>>(iter: I) -> Self {
        let mut registry = Self::default();
        for tool in iter {
            registry.register_shared(tool);
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::{required_str, string_arguments, success_marker, Tool, ToolContext, ToolRegistry};

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the text back"
        }

        fn parameters(&self) -> Value {
            string_arguments(&[("text", "Text to echo")])
        }

        async fn execute(&self, _ctx: &ToolContext<'_>, input: Value) -> Result<Value> {
            Ok(Value::String(required_str(&input, "text")?.to_string()))
        }
    }

    #[test]
    fn registry_exposes_function_definitions() {
        let mut registry = ToolRegistry::default();
        registry.register(Echo);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.names(), vec!["echo"]);
        let definitions = registry.definitions();
        assert_eq!(definitions[0]["type"], "function");
        assert_eq!(definitions[0]["function"]["name"], "echo");
        assert_eq!(definitions[0]["function"]["parameters"]["required"], json!(["text"]));
    }

    #[test]
    fn registering_same_name_replaces_tool() {
        let registry: ToolRegistry =
            vec![Arc::new(Echo) as Arc<dyn Tool>, Arc::new(Echo) as Arc<dyn Tool>]
                .into_iter()
                .collect();
        assert_eq!(registry.len(), 1);
        assert!(registry.get("echo").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn required_str_rejects_missing_and_non_string() {
        assert_eq!(required_str(&json!({ "body": "hi" }), "body").expect("present"), "hi");
        assert!(required_str(&json!({}), "body").is_err());
        assert!(required_str(&json!({ "body": 3 }), "body").is_err());
    }

    #[test]
    fn success_marker_is_literal_status() {
        assert_eq!(success_marker(), json!({ "status": "success" }));
    }
}
