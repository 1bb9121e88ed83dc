use serde::{Deserialize, Serialize};

/// Renderer settings.
///
/// Deserializable so hosts can keep them next to their own configuration;
/// missing fields fall back to [`RenderConfig::default`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Static attribute that marks an element as keyed for node recycling.
    /// The attribute itself is never written to the live node.
    pub key_attribute: String,
    /// Entries kept by the detached node pool; `0` disables recycling.
    pub recycle_capacity: usize,
    /// Remove a target's existing children when a template is first mounted on it.
    pub clear_target: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            key_attribute: "key".to_owned(),
            recycle_capacity: 256,
            clear_target: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_uses_defaults() {
        let config: RenderConfig = serde_json::from_str(r#"{ "recycle_capacity": 8 }"#).unwrap();
        assert_eq!(config.recycle_capacity, 8);
        assert_eq!(config.key_attribute, "key");
        assert!(config.clear_target);
    }
}
