use std::fmt;
use std::sync::Arc;

use crate::error::{CatalogError, CatalogResult};

/// A non-empty, multi-level name addressing a database in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Namespace {
    pub head: Arc<str>,
    pub tail: Vec<Arc<str>>,
}

impl Namespace {
    pub fn levels(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.head.as_ref()).chain(self.tail.iter().map(|s| s.as_ref()))
    }
}

impl<T: Into<Arc<str>>> TryFrom<Vec<T>> for Namespace {
    type Error = CatalogError;

    fn try_from(value: Vec<T>) -> CatalogResult<Self> {
        let mut iter = value.into_iter().map(Into::into);
        let head = iter
            .next()
            .ok_or_else(|| CatalogError::InvalidArgument("empty namespace".to_string()))?;
        let tail = iter.collect();
        Ok(Self { head, tail })
    }
}

impl From<&str> for Namespace {
    fn from(value: &str) -> Self {
        Self {
            head: value.into(),
            tail: vec![],
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.levels().collect::<Vec<_>>().join("."))
    }
}

/// A (namespace, name) pair uniquely addressing a table in the catalog.
///
/// Carried by every schema-change event and every write result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableIdent {
    pub namespace: Namespace,
    pub name: Arc<str>,
}

impl TableIdent {
    pub fn new(namespace: impl Into<Namespace>, name: impl Into<Arc<str>>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TableIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}
