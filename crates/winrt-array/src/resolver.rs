//! Descriptor Resolution
//!
//! Maps the descriptor passed to an array constructor onto an
//! [`ElementKind`]. A descriptor is either a single-character format code or
//! the qualified name of a host type.
//!
//! ## Type priority
//!
//! 1. A registered construction hook claims the type outright
//! 2. Built-in identities (`str`, `uuid.UUID`, `datetime.*`)
//! 3. The registration table (foundation structs plus generated entries)
//! 4. The universal object base maps to `ObjectRef`
//!
//! Anything else fails with `NotSupportedType`.

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::error::{ArrayError, ArrayResult};
use crate::kind::ElementKind;

/// Qualified name of the universal object base type.
pub const OBJECT_BASE: &str = "winrt.system.Object";

/// Host types with a fixed element kind.
pub const BUILTIN_TYPES: [(&str, ElementKind); 4] = [
    ("builtins.str", ElementKind::String),
    ("uuid.UUID", ElementKind::Guid),
    ("datetime.datetime", ElementKind::DateTime),
    ("datetime.timedelta", ElementKind::TimeSpan),
];

/// Projected foundation structs, registered by default.
pub const FOUNDATION_TYPES: [(&str, ElementKind); 3] = [
    ("winrt.windows.foundation.Point", ElementKind::Point),
    ("winrt.windows.foundation.Size", ElementKind::Size),
    ("winrt.windows.foundation.Rect", ElementKind::Rect),
];

/// Construction-time element type token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Descriptor<'a> {
    /// Single-character format code, e.g. `"i"`
    Format(&'a str),
    /// Qualified host type name, e.g. `"uuid.UUID"`
    Type(&'a str),
}

/// Outcome of resolving a descriptor.
#[derive(Debug, PartialEq)]
pub enum Resolved<'r, H> {
    Kind(ElementKind),
    /// The type owns construction
    Hook(&'r H),
}

// ============================================================================
// Registries
// ============================================================================

/// Registration table from type identifiers to element kinds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeRegistry {
    entries: IndexMap<SmolStr, ElementKind>,
}

impl TypeRegistry {
    /// An empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// A table holding the foundation structs
    pub fn with_foundation_types() -> Self {
        let mut registry = Self::new();
        for (name, kind) in FOUNDATION_TYPES {
            registry.register(name, kind);
        }
        registry
    }

    /// Add or replace an entry, returning the previous kind
    pub fn register(&mut self, type_name: impl Into<SmolStr>, kind: ElementKind) -> Option<ElementKind> {
        self.entries.insert(type_name.into(), kind)
    }

    pub fn get(&self, type_name: &str) -> Option<ElementKind> {
        self.entries.get(type_name).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in registration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, ElementKind)> {
        self.entries.iter().map(|(name, kind)| (name.as_str(), *kind))
    }
}

/// Explicit registry of per-type construction hooks.
#[derive(Debug, Clone, PartialEq)]
pub struct HookRegistry<H> {
    hooks: IndexMap<SmolStr, H>,
}

impl<H> Default for HookRegistry<H> {
    fn default() -> Self {
        Self {
            hooks: IndexMap::new(),
        }
    }
}

impl<H> HookRegistry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a hook, returning the previous one
    pub fn register(&mut self, type_name: impl Into<SmolStr>, hook: H) -> Option<H> {
        self.hooks.insert(type_name.into(), hook)
    }

    pub fn remove(&mut self, type_name: &str) -> Option<H> {
        self.hooks.shift_remove(type_name)
    }

    pub fn get(&self, type_name: &str) -> Option<&H> {
        self.hooks.get(type_name)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.hooks.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// Descriptor resolver over a hook registry and a registration table.
#[derive(Debug, Clone)]
pub struct Resolver<H> {
    hooks: HookRegistry<H>,
    types: TypeRegistry,
    object_base: SmolStr,
}

impl<H> Default for Resolver<H> {
    fn default() -> Self {
        Self::with_registry(TypeRegistry::with_foundation_types(), OBJECT_BASE)
    }
}

impl<H> Resolver<H> {
    /// Resolver with the default registration table and no hooks
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(types: TypeRegistry, object_base: impl Into<SmolStr>) -> Self {
        Self {
            hooks: HookRegistry::new(),
            types,
            object_base: object_base.into(),
        }
    }

    pub fn hooks(&self) -> &HookRegistry<H> {
        &self.hooks
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn object_base(&self) -> &str {
        &self.object_base
    }

    /// Register a construction hook for a type
    pub fn register_hook(&mut self, type_name: impl Into<SmolStr>, hook: H) -> Option<H> {
        self.hooks.register(type_name, hook)
    }

    /// Register an element kind for a type
    pub fn register_type(&mut self, type_name: impl Into<SmolStr>, kind: ElementKind) -> Option<ElementKind> {
        self.types.register(type_name, kind)
    }

    /// Resolve a descriptor.
    pub fn resolve(&self, descriptor: Descriptor<'_>) -> ArrayResult<Resolved<'_, H>> {
        match descriptor {
            Descriptor::Format(code) => ElementKind::from_format_code(code).map(Resolved::Kind),
            Descriptor::Type(name) => {
                if let Some(hook) = self.hooks.get(name) {
                    return Ok(Resolved::Hook(hook));
                }
                self.resolve_type_kind(name).map(Resolved::Kind)
            }
        }
    }

    /// Resolve a descriptor that must not be claimed by a hook.
    ///
    /// Used from inside a running hook, where deferring to another hook
    /// would recurse.
    pub fn resolve_kind(&self, descriptor: Descriptor<'_>) -> ArrayResult<ElementKind> {
        match self.resolve(descriptor)? {
            Resolved::Kind(kind) => Ok(kind),
            Resolved::Hook(_) => Err(ArrayError::type_error(format!(
                "{} has its own construction hook and cannot be used from inside another",
                match descriptor {
                    Descriptor::Format(s) | Descriptor::Type(s) => s,
                }
            ))),
        }
    }

    fn resolve_type_kind(&self, name: &str) -> ArrayResult<ElementKind> {
        BUILTIN_TYPES
            .iter()
            .find(|(builtin, _)| *builtin == name)
            .map(|(_, kind)| *kind)
            .or_else(|| self.types.get(name))
            .or_else(|| (name == self.object_base).then_some(ElementKind::ObjectRef))
            .ok_or_else(|| ArrayError::not_supported_type(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    type TestResolver = Resolver<&'static str>;

    #[test]
    fn test_format_codes() {
        let resolver = TestResolver::new();
        assert_eq!(
            resolver.resolve(Descriptor::Format("d")).unwrap(),
            Resolved::Kind(ElementKind::Float64)
        );
        let err = resolver.resolve(Descriptor::Format("z")).unwrap_err();
        assert_eq!(err.to_string(), "unsupported format string: 'z'");
    }

    #[test]
    fn test_builtin_and_foundation_types() {
        let resolver = TestResolver::new();
        let cases = [
            ("builtins.str", ElementKind::String),
            ("uuid.UUID", ElementKind::Guid),
            ("datetime.datetime", ElementKind::DateTime),
            ("datetime.timedelta", ElementKind::TimeSpan),
            ("winrt.windows.foundation.Point", ElementKind::Point),
            ("winrt.windows.foundation.Rect", ElementKind::Rect),
            ("winrt.system.Object", ElementKind::ObjectRef),
        ];
        for (name, kind) in cases {
            assert_eq!(resolver.resolve_kind(Descriptor::Type(name)).unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_type_is_named() {
        let err = TestResolver::new()
            .resolve(Descriptor::Type("builtins.dict"))
            .unwrap_err();
        assert!(err.is_type_error());
        assert!(err.to_string().contains("builtins.dict"));
    }

    #[test]
    fn test_hook_takes_priority() {
        let mut resolver = TestResolver::new();
        resolver.register_hook("builtins.str", "custom");
        assert_eq!(
            resolver.resolve(Descriptor::Type("builtins.str")).unwrap(),
            Resolved::Hook(&"custom")
        );
        assert!(resolver
            .resolve_kind(Descriptor::Type("builtins.str"))
            .unwrap_err()
            .is_type_error());
    }

    #[test]
    fn test_registered_type() {
        let mut resolver = TestResolver::new();
        assert_eq!(resolver.register_type("sample.Vector2", ElementKind::Point), None);
        assert_eq!(
            resolver.resolve_kind(Descriptor::Type("sample.Vector2")).unwrap(),
            ElementKind::Point
        );
        assert_eq!(resolver.types().len(), 4);
    }

    #[test]
    fn test_custom_object_base() {
        let resolver: TestResolver = Resolver::with_registry(TypeRegistry::new(), "sample.Base");
        assert_eq!(
            resolver.resolve_kind(Descriptor::Type("sample.Base")).unwrap(),
            ElementKind::ObjectRef
        );
        assert!(resolver
            .resolve_kind(Descriptor::Type("winrt.system.Object"))
            .is_err());
        assert!(resolver
            .resolve_kind(Descriptor::Type("winrt.windows.foundation.Point"))
            .is_err());
    }

    #[test]
    fn test_hook_registry_remove() {
        let mut hooks = HookRegistry::new();
        hooks.register("a.B", 1);
        assert!(hooks.contains("a.B"));
        assert_eq!(hooks.remove("a.B"), Some(1));
        assert!(hooks.is_empty());
    }
}
