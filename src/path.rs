//! Instance paths for locating nodes in a data tree.
//!
//! This module provides [`DataPath`] and [`PathSegment`] types for building,
//! printing and parsing paths such as `/ex:interfaces/iface[name='eth0']/mtu`.
//! Every validation error carries the path of the offending instance.

use std::fmt::{self, Display};
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

/// A segment of an instance path.
///
/// Node steps are followed by zero or more predicate segments that narrow the
/// step down to a single instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// A node step, optionally qualified with its module name (e.g. `ex:iface`).
    Node {
        module: Option<String>,
        name: String,
    },
    /// A list key predicate (e.g. `[name='eth0']`).
    Key { name: String, value: String },
    /// A leaf-list value predicate (e.g. `[.='blue']`).
    Value(String),
    /// A 1-based position predicate for keyless lists (e.g. `[2]`).
    Position(usize),
}

impl PathSegment {
    /// Creates a new unqualified node segment.
    pub fn node(name: impl Into<String>) -> Self {
        PathSegment::Node {
            module: None,
            name: name.into(),
        }
    }

    /// Returns true if this segment is a node step rather than a predicate.
    pub fn is_node(&self) -> bool {
        matches!(self, PathSegment::Node { .. })
    }
}

/// A path to an instance in a data tree.
///
/// # Example
///
/// ```rust
/// use yangcheck::DataPath;
///
/// let path = DataPath::root()
///     .push_node(Some("ex"), "interfaces")
///     .push_node(None, "iface")
///     .push_key("name", "eth0")
///     .push_node(None, "mtu");
///
/// assert_eq!(path.to_string(), "/ex:interfaces/iface[name='eth0']/mtu");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DataPath {
    segments: Vec<PathSegment>,
}

impl DataPath {
    /// Creates an empty path representing the tree root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Returns a new path with a node step appended.
    pub fn push_node(&self, module: Option<&str>, name: impl Into<String>) -> Self {
        self.with(PathSegment::Node {
            module: module.map(str::to_string),
            name: name.into(),
        })
    }

    /// Returns a new path with a key predicate appended.
    pub fn push_key(&self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(PathSegment::Key {
            name: name.into(),
            value: value.into(),
        })
    }

    /// Returns a new path with a leaf-list value predicate appended.
    pub fn push_value(&self, value: impl Into<String>) -> Self {
        self.with(PathSegment::Value(value.into()))
    }

    /// Returns a new path with a position predicate appended.
    pub fn push_position(&self, position: usize) -> Self {
        self.with(PathSegment::Position(position))
    }

    fn with(&self, segment: PathSegment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }

    /// Returns true if this is the root path (no segments).
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns the number of segments in this path, predicates included.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Returns true if this path has no segments.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns an iterator over the path segments.
    pub fn segments(&self) -> impl Iterator<Item = &PathSegment> {
        self.segments.iter()
    }

    /// Returns the number of node steps, ignoring predicates.
    pub fn depth(&self) -> usize {
        self.segments.iter().filter(|s| s.is_node()).count()
    }

    /// Returns the path up to (excluding) the last node step and its predicates,
    /// or None if this is root.
    pub fn parent(&self) -> Option<Self> {
        let last_node = self.segments.iter().rposition(PathSegment::is_node)?;
        Some(Self {
            segments: self.segments[..last_node].to_vec(),
        })
    }

    /// Returns the name of the last node step, or None if this is root.
    pub fn last_name(&self) -> Option<&str> {
        self.segments.iter().rev().find_map(|s| match s {
            PathSegment::Node { name, .. } => Some(name.as_str()),
            _ => None,
        })
    }
}

impl Display for DataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "/");
        }
        for segment in &self.segments {
            match segment {
                PathSegment::Node { module, name } => match module {
                    Some(module) => write!(f, "/{}:{}", module, name)?,
                    None => write!(f, "/{}", name)?,
                },
                PathSegment::Key { name, value } => write!(f, "[{}={}]", name, quote(value))?,
                PathSegment::Value(value) => write!(f, "[.={}]", quote(value))?,
                PathSegment::Position(pos) => write!(f, "[{}]", pos)?,
            }
        }
        Ok(())
    }
}

/// Quotes a predicate value, preferring single quotes.
fn quote(value: &str) -> String {
    if value.contains('\'') {
        format!("\"{}\"", value)
    } else {
        format!("'{}'", value)
    }
}

/// Errors raised while parsing a textual instance path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathParseError {
    #[error("instance path must be absolute: '{0}'")]
    NotAbsolute(String),

    #[error("invalid step '{step}' in path '{path}'")]
    InvalidStep { path: String, step: String },

    #[error("unterminated quote in path '{0}'")]
    UnterminatedQuote(String),
}

fn step_regex() -> &'static Regex {
    static STEP: OnceLock<Regex> = OnceLock::new();
    STEP.get_or_init(|| {
        Regex::new(r"^(?:([A-Za-z_][\w.\-]*):)?([A-Za-z_][\w.\-]*)(.*)$").expect("valid step regex")
    })
}

fn predicate_regex() -> &'static Regex {
    static PREDICATE: OnceLock<Regex> = OnceLock::new();
    PREDICATE.get_or_init(|| {
        Regex::new(
            r#"\[\s*(?:([A-Za-z_.][\w.\-:]*)\s*=\s*(?:'([^']*)'|"([^"]*)")|(\d+))\s*\]"#,
        )
        .expect("valid predicate regex")
    })
}

/// Splits a path on `/` separators that are outside quoted predicate values.
fn split_steps(path: &str) -> Result<Vec<&str>, PathParseError> {
    let mut steps = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 1;
    for (i, c) in path.char_indices().skip(1) {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'') | (None, '"') => quote = Some(c),
            (None, '/') => {
                steps.push(&path[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if quote.is_some() {
        return Err(PathParseError::UnterminatedQuote(path.to_string()));
    }
    steps.push(&path[start..]);
    Ok(steps)
}

impl FromStr for DataPath {
    type Err = PathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if !s.starts_with('/') {
            return Err(PathParseError::NotAbsolute(s.to_string()));
        }
        if s == "/" {
            return Ok(DataPath::root());
        }

        let invalid = |step: &str| PathParseError::InvalidStep {
            path: s.to_string(),
            step: step.to_string(),
        };

        let mut segments = Vec::new();
        for step in split_steps(s)? {
            let caps = step_regex().captures(step).ok_or_else(|| invalid(step))?;
            segments.push(PathSegment::Node {
                module: caps.get(1).map(|m| m.as_str().to_string()),
                name: caps[2].to_string(),
            });

            let rest = caps.get(3).map_or("", |m| m.as_str());
            let mut consumed = 0;
            for pred in predicate_regex().captures_iter(rest) {
                let whole = pred.get(0).ok_or_else(|| invalid(step))?;
                if whole.start() != consumed {
                    return Err(invalid(step));
                }
                consumed = whole.end();

                if let Some(pos) = pred.get(4) {
                    let pos = pos.as_str().parse().map_err(|_| invalid(step))?;
                    segments.push(PathSegment::Position(pos));
                    continue;
                }
                let value = pred
                    .get(2)
                    .or_else(|| pred.get(3))
                    .map_or(String::new(), |m| m.as_str().to_string());
                match &pred[1] {
                    "." => segments.push(PathSegment::Value(value)),
                    key => {
                        let key = key.rsplit(':').next().unwrap_or(key);
                        segments.push(PathSegment::Key {
                            name: key.to_string(),
                            value,
                        });
                    }
                }
            }
            if consumed != rest.len() {
                return Err(invalid(step));
            }
        }

        Ok(Self { segments })
    }
}
