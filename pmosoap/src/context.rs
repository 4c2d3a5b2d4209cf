use std::collections::HashMap;

use serde_json::Value;

/// Propriété demandant d'exécuter le provider sur le thread appelant
pub const SERVER_DISABLE_THREAD_SWITCH: &str = "pmosoap.server.disableThreadSwitch";

/// Propriétés associées à une invocation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvocationContext {
    properties: HashMap<String, Value>,
}

impl InvocationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_property(key, value);
        self
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Lit une propriété booléenne (`true` ou la chaîne `"true"`)
    pub fn bool_property(&self, key: &str) -> Option<bool> {
        match self.properties.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => Some(s.eq_ignore_ascii_case("true")),
            _ => None,
        }
    }

    /// Valeur de [`SERVER_DISABLE_THREAD_SWITCH`], si elle est positionnée
    pub fn disable_thread_switch(&self) -> Option<bool> {
        self.bool_property(SERVER_DISABLE_THREAD_SWITCH)
    }
}
