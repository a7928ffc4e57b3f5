//! Bridge Configuration
//!
//! Optional TOML settings for the resolver and size bound:
//!
//! ```toml
//! object_base = "winrt.system.Object"
//! max_elements = 4294967295
//!
//! [types]
//! "sample.Vector2" = "Point"
//! ```
//!
//! Every key may be omitted. Entries under `[types]` are added on top of the
//! foundation structs.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::array_bridge::SizeLimit;
use crate::error::{ArrayError, ArrayResult};
use crate::kind::ElementKind;
use crate::resolver::{Resolver, TypeRegistry, OBJECT_BASE};

/// Environment variable naming a configuration file.
pub const CONFIG_ENV: &str = "WINRT_ARRAY_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Qualified name of the type that resolves to `ObjectRef`
    pub object_base: String,
    pub max_elements: u32,
    /// Extra registration-table entries
    pub types: BTreeMap<String, ElementKind>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            object_base: OBJECT_BASE.to_string(),
            max_elements: u32::MAX,
            types: BTreeMap::new(),
        }
    }
}

impl BridgeConfig {
    pub fn from_toml_str(content: &str) -> ArrayResult<Self> {
        toml::from_str(content).map_err(|e| ArrayError::config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> ArrayResult<String> {
        toml::to_string_pretty(self).map_err(|e| ArrayError::config(e.to_string()))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> ArrayResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ArrayError::config(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_toml_str(&content)?;
        debug!(path = %path.display(), types = config.types.len(), "loaded array bridge config");
        Ok(config)
    }

    /// Load the file named by `WINRT_ARRAY_CONFIG`, or the defaults when unset.
    pub fn from_env() -> ArrayResult<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    /// Build a resolver from these settings
    pub fn resolver<H>(&self) -> Resolver<H> {
        let mut types = TypeRegistry::with_foundation_types();
        for (name, kind) in &self.types {
            types.register(name.as_str(), *kind);
        }
        Resolver::with_registry(types, self.object_base.as_str())
    }

    pub fn size_limit(&self) -> SizeLimit {
        SizeLimit::new(self.max_elements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::Descriptor;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults_from_empty_file() {
        assert_eq!(BridgeConfig::from_toml_str("").unwrap(), BridgeConfig::default());
    }

    #[test]
    fn test_parse_full() {
        let toml_str = r#"
            object_base = "sample.Base"
            max_elements = 1024

            [types]
            "sample.Vector2" = "Point"
            "sample.Extent" = "Size"
        "#;
        let config = BridgeConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.max_elements, 1024);
        assert_eq!(config.size_limit(), SizeLimit::new(1024));

        let resolver: Resolver<()> = config.resolver();
        assert_eq!(
            resolver.resolve_kind(Descriptor::Type("sample.Vector2")).unwrap(),
            ElementKind::Point
        );
        assert_eq!(
            resolver.resolve_kind(Descriptor::Type("sample.Base")).unwrap(),
            ElementKind::ObjectRef
        );
        // foundation structs stay registered
        assert_eq!(
            resolver
                .resolve_kind(Descriptor::Type("winrt.windows.foundation.Rect"))
                .unwrap(),
            ElementKind::Rect
        );
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let err = BridgeConfig::from_toml_str("[types]\n\"a.B\" = \"Matrix\"\n").unwrap_err();
        assert!(matches!(err, ArrayError::Config { .. }));
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(BridgeConfig::from_toml_str("max_element = 3").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_elements = 16").unwrap();
        let config = BridgeConfig::load(file.path()).unwrap();
        assert_eq!(config.max_elements, 16);
        assert_eq!(config.object_base, OBJECT_BASE);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = BridgeConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("absent.toml"));
    }

    #[test]
    fn test_round_trip_through_toml() {
        let mut config = BridgeConfig::default();
        config.types.insert("sample.Vector2".into(), ElementKind::Point);
        let text = config.to_toml_string().unwrap();
        assert_eq!(BridgeConfig::from_toml_str(&text).unwrap(), config);
    }
}
