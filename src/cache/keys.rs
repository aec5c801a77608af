//! Cache key definitions.
//!
//! `QueryKey` identifies one cached query, `KeyPrefix` selects a family of
//! queries for invalidation and `MutationKey` names a single-flight write.

use std::fmt;

use uuid::Uuid;

/// Resource family a query reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resource {
    /// Post feed of a group.
    Posts,
    /// Comment thread of a post.
    Comments,
    /// Group categories offered when creating a group.
    Categories,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Posts => "posts",
            Resource::Comments => "comments",
            Resource::Categories => "categories",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One positional parameter of a query key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyParam {
    Int(i64),
    Id(Uuid),
    Text(String),
}

impl fmt::Display for KeyParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyParam::Int(value) => write!(f, "{value}"),
            KeyParam::Id(value) => write!(f, "{value}"),
            KeyParam::Text(value) => f.write_str(value),
        }
    }
}

impl From<i64> for KeyParam {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<Uuid> for KeyParam {
    fn from(value: Uuid) -> Self {
        Self::Id(value)
    }
}

impl From<&str> for KeyParam {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for KeyParam {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Structural identity of a cached query: a resource plus ordered parameters.
///
/// Two keys are equal only when the resource and every parameter match by
/// value, in order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    resource: Resource,
    params: Vec<KeyParam>,
}

impl QueryKey {
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            params: Vec::new(),
        }
    }

    /// Append a positional parameter.
    pub fn with(mut self, param: impl Into<KeyParam>) -> Self {
        self.params.push(param.into());
        self
    }

    pub fn resource(&self) -> Resource {
        self.resource
    }

    pub fn params(&self) -> &[KeyParam] {
        &self.params
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resource.as_str())?;
        for param in &self.params {
            write!(f, "/{param}")?;
        }
        Ok(())
    }
}

/// Selects every query key whose resource matches and whose parameters
/// start with the prefix parameters.
///
/// Matching compares whole parameters, so `posts/1` selects `posts/1` and
/// `posts/1/pinned` but never `posts/10`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPrefix {
    resource: Resource,
    params: Vec<KeyParam>,
    exact: bool,
}

impl KeyPrefix {
    /// Prefix selecting every key of a resource.
    pub fn resource(resource: Resource) -> Self {
        Self {
            resource,
            params: Vec::new(),
            exact: false,
        }
    }

    /// Prefix selecting a single key and nothing below it.
    pub fn exact(key: &QueryKey) -> Self {
        Self {
            resource: key.resource,
            params: key.params.clone(),
            exact: true,
        }
    }

    pub fn with(mut self, param: impl Into<KeyParam>) -> Self {
        self.params.push(param.into());
        self
    }

    pub fn matches(&self, key: &QueryKey) -> bool {
        if self.resource != key.resource {
            return false;
        }
        if self.exact {
            return self.params == key.params;
        }
        key.params.starts_with(&self.params)
    }
}

impl From<&QueryKey> for KeyPrefix {
    fn from(key: &QueryKey) -> Self {
        Self {
            resource: key.resource,
            params: key.params.clone(),
            exact: false,
        }
    }
}

impl From<QueryKey> for KeyPrefix {
    fn from(key: QueryKey) -> Self {
        Self {
            resource: key.resource,
            params: key.params,
            exact: false,
        }
    }
}

impl fmt::Display for KeyPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resource.as_str())?;
        for param in &self.params {
            write!(f, "/{param}")?;
        }
        if !self.exact {
            f.write_str("/*")?;
        }
        Ok(())
    }
}

/// Name of a write operation; at most one execution per key runs at a time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MutationKey(String);

impl MutationKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Key scoped to one target, rendered as `name:target`.
    pub fn scoped(name: &str, target: impl fmt::Display) -> Self {
        Self(format!("{name}:{target}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MutationKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for MutationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
