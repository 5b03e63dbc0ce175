//! Process configuration
//!
//! Parsed once at startup by the binary and shared read-only with every
//! lifecycle manager.

use crate::error::{Error, Result};

/// Environment variable holding the OpenEBS namespace (set via downward API)
pub const NAMESPACE_ENV: &str = "OPENEBS_NAMESPACE";

/// Environment variable holding the node identity of this process
pub const NODE_ID_ENV: &str = "OPENEBS_NODE_ID";

/// Set when the process runs as the node-level driver
pub const NODE_DRIVER_ENV: &str = "OPENEBS_NODE_DRIVER";

/// Opaque analytics flag, passed through untouched
pub const ANALYTICS_ENV: &str = "OPENEBS_IO_ENABLE_ANALYTICS";

/// Immutable lifecycle configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// Store namespace for all four resource kinds
    pub namespace: String,
    /// Node identity used for claim labels and node-scoped listing
    pub node_id: String,
    /// Whether this process declared itself a node driver
    pub node_driver: bool,
    /// Raw value of the analytics flag, if set
    pub analytics_enabled: Option<String>,
}

impl LifecycleConfig {
    /// Create a config for an explicit namespace and node
    pub fn new(namespace: impl Into<String>, node_id: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            node_id: node_id.into(),
            node_driver: false,
            analytics_enabled: None,
        }
    }

    /// Build from the values the binary parsed from its flags and environment.
    ///
    /// Empty values count as unset. In node-driver mode a missing namespace or
    /// node id is a [`Error::Configuration`] the binary treats as fatal.
    pub fn validated(
        namespace: Option<String>,
        node_id: Option<String>,
        node_driver: bool,
        analytics_enabled: Option<String>,
    ) -> Result<Self> {
        let namespace = namespace.filter(|v| !v.is_empty());
        let node_id = node_id.filter(|v| !v.is_empty());

        if node_driver && namespace.is_none() {
            return Err(Error::Configuration(format!(
                "{} environment variable not set",
                NAMESPACE_ENV
            )));
        }
        if node_driver && node_id.is_none() {
            return Err(Error::Configuration(format!(
                "{} environment variable not set",
                NODE_ID_ENV
            )));
        }

        Ok(Self {
            namespace: namespace.unwrap_or_default(),
            node_id: node_id.unwrap_or_default(),
            node_driver,
            analytics_enabled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_controller_mode_tolerates_missing_identity() {
        let config = LifecycleConfig::validated(None, None, false, None).unwrap();
        assert!(!config.node_driver);
        assert_eq!(config.namespace, "");
        assert_eq!(config.node_id, "");
    }

    #[test]
    fn test_node_driver_requires_namespace() {
        let result = LifecycleConfig::validated(None, Some("node-a".into()), true, None);
        assert_matches!(result, Err(Error::Configuration(msg)) if msg.contains(NAMESPACE_ENV));
    }

    #[test]
    fn test_node_driver_requires_node_id() {
        let result =
            LifecycleConfig::validated(Some("openebs".into()), Some(String::new()), true, None);
        assert_matches!(result, Err(Error::Configuration(msg)) if msg.contains(NODE_ID_ENV));
    }

    #[test]
    fn test_full_node_driver_config() {
        let config = LifecycleConfig::validated(
            Some("openebs".into()),
            Some("node-a".into()),
            true,
            Some("false".into()),
        )
        .unwrap();

        assert!(config.node_driver);
        assert_eq!(config.namespace, "openebs");
        assert_eq!(config.node_id, "node-a");
        assert_eq!(config.analytics_enabled.as_deref(), Some("false"));
    }
}
