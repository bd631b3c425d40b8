//! Compound keys identifying loadable entities.

use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Name authority for names managed by the runtime itself.
pub const RUNTIME_NAME_AUTHORITY: &str = "http://puppet.com/2016.1/runtime";

const SEPARATOR: &str = "::";

/// Kind of entity a [`TypedName`] refers to.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Callable function.
    Function,
    /// Data type, object type, or type set.
    Type,
    /// Alias of another type expression.
    TypeAlias,
    /// Executable task with optional metadata.
    Task,
    /// Orchestration plan.
    Plan,
    /// Legacy resource type.
    ResourceType,
    /// Resource type implementation described in Pcore.
    ResourceTypeImpl,
}

impl EntityKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Function,
        Self::Type,
        Self::TypeAlias,
        Self::Task,
        Self::Plan,
        Self::ResourceType,
        Self::ResourceTypeImpl,
    ];

    /// Returns the canonical snake-case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Type => "type",
            Self::TypeAlias => "type_alias",
            Self::Task => "task",
            Self::Plan => "plan",
            Self::ResourceType => "resource_type",
            Self::ResourceTypeImpl => "resource_type_impl",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::InvalidConfig {
                reason: format!("unknown entity kind `{s}`"),
            })
    }
}

/// Namespace separating runtime-local names from externally authored ones.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq, Ord, PartialOrd)]
pub enum NameAuthority {
    /// Names managed by the runtime ([`RUNTIME_NAME_AUTHORITY`]).
    #[default]
    Runtime,
    /// Names authored under some other authority URI.
    External(String),
}

impl NameAuthority {
    /// Creates an authority from its URI, mapping the runtime URI to [`Self::Runtime`].
    #[must_use]
    pub fn from_uri(uri: impl Into<String>) -> Self {
        let uri = uri.into();
        if uri == RUNTIME_NAME_AUTHORITY {
            Self::Runtime
        } else {
            Self::External(uri)
        }
    }

    /// Returns the authority URI.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Runtime => RUNTIME_NAME_AUTHORITY,
            Self::External(uri) => uri,
        }
    }

    /// Returns `true` for the runtime authority.
    #[must_use]
    pub const fn is_runtime(&self) -> bool {
        matches!(self, Self::Runtime)
    }
}

impl Display for NameAuthority {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable `(kind, authority, name)` key used for every loader lookup.
///
/// Names are lower-cased and relativized (a leading `::` is dropped) on
/// construction, so `TypedName::new(EntityKind::Type, "::Foo::Bar")` and
/// `TypedName::new(EntityKind::Type, "foo::bar")` are the same key. Malformed
/// names are accepted as-is; lookups simply find nothing for them.
#[derive(Clone, Debug)]
pub struct TypedName {
    kind: EntityKind,
    authority: NameAuthority,
    name: String,
    parts: Vec<String>,
}

impl TypedName {
    /// Creates a name under the runtime authority.
    #[must_use]
    pub fn new(kind: EntityKind, name: &str) -> Self {
        Self::with_authority(kind, name, NameAuthority::Runtime)
    }

    /// Creates a name under the given authority.
    #[must_use]
    pub fn with_authority(kind: EntityKind, name: &str, authority: NameAuthority) -> Self {
        let name = name.strip_prefix(SEPARATOR).unwrap_or(name).to_lowercase();
        let parts = name.split(SEPARATOR).map(str::to_owned).collect();
        Self {
            kind,
            authority,
            name,
            parts,
        }
    }

    /// Returns the entity kind.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Returns the name authority.
    #[must_use]
    pub const fn authority(&self) -> &NameAuthority {
        &self.authority
    }

    /// Returns the normalized name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the name split on `::`.
    #[must_use]
    pub fn name_parts(&self) -> &[String] {
        &self.parts
    }

    /// Returns `true` when the name has more than one segment.
    #[must_use]
    pub fn is_qualified(&self) -> bool {
        self.parts.len() > 1
    }

    /// Returns the name of the enclosing namespace, if the name is qualified.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let (_, init) = self.parts.split_last()?;
        if init.is_empty() {
            return None;
        }
        Some(Self::with_authority(
            self.kind,
            &init.join(SEPARATOR),
            self.authority.clone(),
        ))
    }

    /// Returns the same name with a different kind.
    #[must_use]
    pub fn with_kind(&self, kind: EntityKind) -> Self {
        Self {
            kind,
            ..self.clone()
        }
    }
}

impl PartialEq for TypedName {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.name == other.name && self.authority == other.authority
    }
}

impl Eq for TypedName {}

impl Hash for TypedName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.kind.hash(state);
        self.authority.hash(state);
    }
}

impl PartialOrd for TypedName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypedName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then(self.kind.cmp(&other.kind))
            .then_with(|| self.authority.cmp(&other.authority))
    }
}

impl Display for TypedName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.authority, self.kind, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_leading_separator() {
        let name = TypedName::new(EntityKind::Type, "::Widgets::Gear");
        assert_eq!(name.name(), "widgets::gear");
        assert_eq!(name.name_parts(), ["widgets", "gear"]);
        assert_eq!(name, TypedName::new(EntityKind::Type, "widgets::gear"));
    }

    #[test]
    fn parent_drops_last_segment() {
        let name = TypedName::new(EntityKind::Function, "a::b::c");
        let parent = name.parent().expect("qualified name has a parent");
        assert_eq!(parent.name_parts(), &name.name_parts()[..2]);
        assert_eq!(parent.kind(), EntityKind::Function);
        assert!(parent.parent().expect("two segments").parent().is_none());
    }

    #[test]
    fn unqualified_name_has_no_parent() {
        let name = TypedName::new(EntityKind::Function, "lookup");
        assert!(!name.is_qualified());
        assert!(name.parent().is_none());
    }

    #[test]
    fn equality_covers_kind_and_authority() {
        let function = TypedName::new(EntityKind::Function, "foo");
        assert_ne!(function, function.with_kind(EntityKind::Type));

        let external = TypedName::with_authority(
            EntityKind::Function,
            "foo",
            NameAuthority::from_uri("http://example.com/ns"),
        );
        assert_ne!(function, external);
        assert_eq!(
            NameAuthority::from_uri(RUNTIME_NAME_AUTHORITY),
            NameAuthority::Runtime
        );
    }

    #[test]
    fn display_includes_all_components() {
        let name = TypedName::new(EntityKind::Plan, "deploy::init");
        assert_eq!(
            name.to_string(),
            format!("{RUNTIME_NAME_AUTHORITY}/plan/deploy::init")
        );
    }

    #[test]
    fn kind_round_trips_through_label() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.as_str().parse::<EntityKind>().unwrap(), kind);
        }
        assert!("widget".parse::<EntityKind>().is_err());
    }
}
