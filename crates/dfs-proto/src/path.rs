// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Absolute paths in the distributed filesystem namespace.

use std::fmt;
use std::str::FromStr;

use dfs_rmi::wire::Value;
use dfs_rmi::{RemoteValue, ValueError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("path must start with '/': {0:?}")]
    NotAbsolute(String),

    #[error("invalid path component {0:?}")]
    InvalidComponent(String),
}

/// Immutable sequence of components. `/` is the root.
///
/// Ordering is component-wise, so a directory sorts before everything
/// beneath it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    components: Vec<String>,
}

fn validate_component(component: &str) -> Result<(), PathError> {
    if component.is_empty()
        || component == "."
        || component == ".."
        || component.contains(['/', ':'])
    {
        return Err(PathError::InvalidComponent(component.to_string()));
    }
    Ok(())
}

impl Path {
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse `/a/b/c`. Repeated and trailing separators are ignored.
    pub fn parse(text: &str) -> Result<Self, PathError> {
        let rest = text
            .strip_prefix('/')
            .ok_or_else(|| PathError::NotAbsolute(text.to_string()))?;

        let components = rest
            .split('/')
            .filter(|c| !c.is_empty())
            .map(|c| validate_component(c).map(|()| c.to_string()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { components })
    }

    pub fn child(&self, component: &str) -> Result<Self, PathError> {
        validate_component(component)?;
        let mut components = self.components.clone();
        components.push(component.to_string());
        Ok(Self { components })
    }

    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// `None` for the root
    pub fn parent(&self) -> Option<Self> {
        let (_, init) = self.components.split_last()?;
        Some(Self {
            components: init.to_vec(),
        })
    }

    /// `None` for the root
    pub fn last(&self) -> Option<&str> {
        self.components.last().map(String::as_str)
    }

    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.components.iter().map(String::as_str)
    }

    /// True if `self` equals `other` or lies beneath it.
    pub fn is_subpath_of(&self, other: &Path) -> bool {
        self.components.starts_with(&other.components)
    }

    /// Proper ancestors, root first.
    pub fn ancestors(&self) -> Vec<Path> {
        (0..self.components.len())
            .map(|depth| Path {
                components: self.components[..depth].to_vec(),
            })
            .collect()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return write!(f, "/");
        }
        for component in &self.components {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}

impl RemoteValue for Path {
    fn descriptor() -> String {
        "dfs.Path".to_string()
    }

    fn into_value(self) -> Option<Value> {
        Some(Value::Text(self.to_string().into_bytes()))
    }

    fn from_value(value: Option<Value>) -> Result<Self, ValueError> {
        match value {
            Some(Value::Text(bytes)) => {
                let text = String::from_utf8(bytes).map_err(ValueError::invalid::<Self>)?;
                Path::parse(&text).map_err(ValueError::invalid::<Self>)
            }
            None => Err(ValueError::Null),
            other => Err(ValueError::mismatch::<Self>(other.as_ref())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(text: &str) -> Path {
        Path::parse(text).unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!(p("/").to_string(), "/");
        assert_eq!(p("/a/b/c").to_string(), "/a/b/c");
        assert_eq!(p("//a///b/"), p("/a/b"));
        assert!(p("/").is_root());
    }

    #[test]
    fn test_invalid_paths_are_rejected() {
        assert_eq!(Path::parse("a/b"), Err(PathError::NotAbsolute("a/b".into())));
        assert_eq!(Path::parse("/a:b"), Err(PathError::InvalidComponent("a:b".into())));
        assert!(Path::parse("/a/../b").is_err());
        assert!(Path::parse("/./a").is_err());
        assert!(p("/a").child("b/c").is_err());
        assert!(p("/a").child("").is_err());
    }

    #[test]
    fn test_parent_and_last() {
        let path = p("/dir/file.txt");
        assert_eq!(path.parent(), Some(p("/dir")));
        assert_eq!(path.last(), Some("file.txt"));
        assert_eq!(p("/dir").parent(), Some(Path::root()));
        assert_eq!(Path::root().parent(), None);
        assert_eq!(Path::root().last(), None);
        assert_eq!(p("/dir").child("file.txt").unwrap(), path);
    }

    #[test]
    fn test_ancestors_root_first() {
        assert_eq!(p("/a/b/c").ancestors(), vec![p("/"), p("/a"), p("/a/b")]);
        assert!(Path::root().ancestors().is_empty());
    }

    #[test]
    fn test_subpath_is_component_wise() {
        assert!(p("/a/b").is_subpath_of(&p("/a")));
        assert!(p("/a").is_subpath_of(&p("/a")));
        assert!(p("/a").is_subpath_of(&Path::root()));
        assert!(!p("/ab").is_subpath_of(&p("/a")));
        assert!(!p("/a").is_subpath_of(&p("/a/b")));
    }

    #[test]
    fn test_directories_sort_before_their_contents() {
        let mut paths = vec![p("/b"), p("/a/z"), p("/a"), p("/")];
        paths.sort();
        assert_eq!(paths, vec![p("/"), p("/a"), p("/a/z"), p("/b")]);
    }

    #[test]
    fn test_wire_value() {
        let path = p("/x/y");
        assert_eq!(Path::from_value(path.clone().into_value()), Ok(path));
        assert_eq!(Path::from_value(None), Err(ValueError::Null));
        assert!(matches!(
            Path::from_value(Some(Value::Text(b"relative".to_vec()))),
            Err(ValueError::Invalid { .. })
        ));
    }
}
