//! Per-method prefix tree used to resolve request paths to registered patterns.
//!
//! Every node holds one path segment. Pattern segments come in three kinds:
//!
//! * literal (`doc`) matches the identical request segment,
//! * parameter (`:lang`) matches any single request segment,
//! * wildcard (`*filepath`) matches all remaining request segments and must be last.
//!
//! Only the node that terminates an inserted pattern carries that pattern. Reaching
//! an intermediate node, even at the right depth, is not a match.
//!
//! Search tries literal children first, then parameters, then wildcards, and
//! backtracks into the next candidate when a subtree has no terminal node. The
//! outcome therefore does not depend on the order routes were registered in.

use fnv::FnvHashMap;

/// Splits a path into its non-empty segments.
///
/// Leading, trailing and repeated slashes are ignored.
pub(crate) fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Splits a pattern into segments, stopping after the first wildcard segment.
pub(crate) fn parse_pattern(pattern: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    for part in split_path(pattern) {
        parts.push(part);
        if part.starts_with('*') {
            break;
        }
    }
    parts
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentKind {
    Literal,
    Param,
    Wildcard,
}

impl SegmentKind {
    fn of(part: &str) -> Self {
        if part.starts_with(':') {
            SegmentKind::Param
        } else if part.starts_with('*') {
            SegmentKind::Wildcard
        } else {
            SegmentKind::Literal
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Node {
    /// Full pattern, only set on the node that terminates an inserted pattern.
    pattern: Option<String>,
    part: String,
    children: Vec<Node>,
    is_wild: bool,
}

impl Node {
    fn new(part: &str) -> Self {
        Self {
            pattern: None,
            part: part.to_string(),
            children: Vec::new(),
            is_wild: part.starts_with(':') || part.starts_with('*'),
        }
    }

    pub(crate) fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }

    fn kind(&self) -> SegmentKind {
        SegmentKind::of(&self.part)
    }

    /// Finds the child an inserted segment belongs to, creating it when needed.
    ///
    /// An identical child is always reused. Otherwise a parameter segment reuses the
    /// first parameter child and a wildcard segment the first wildcard child. A literal
    /// segment never merges into a parameter or wildcard child, so it gets its own
    /// sibling.
    fn child_for(&mut self, part: &str) -> &mut Node {
        let kind = SegmentKind::of(part);
        let existing = self
            .children
            .iter()
            .position(|child| child.part == part)
            .or_else(|| match kind {
                SegmentKind::Literal => None,
                _ => self.children.iter().position(|child| child.kind() == kind),
            });
        let index = match existing {
            Some(index) => index,
            None => {
                self.children.push(Node::new(part));
                self.children.len() - 1
            }
        };
        &mut self.children[index]
    }

    /// Inserts the segments of `pattern` below this node and marks the last one as
    /// terminal.
    ///
    /// Returns the different pattern that previously ended at the same node, which
    /// is no longer reachable.
    pub(crate) fn insert(&mut self, pattern: &str, parts: &[&str]) -> Option<String> {
        let mut node = self;
        for (depth, part) in parts.iter().enumerate() {
            log::trace!("Segment '{part}' at depth {depth} for '{pattern}'");
            node = node.child_for(part);
        }
        let previous = node.pattern.replace(pattern.to_string())?;
        if previous == pattern {
            return None;
        }
        log::warn!("Pattern '{pattern}' replaces '{previous}' at the same tree position");
        Some(previous)
    }

    /// Searches for the terminal node matching `parts`, starting at `depth`.
    pub(crate) fn search(&self, parts: &[&str], depth: usize) -> Option<&Node> {
        if parts.len() == depth || self.kind() == SegmentKind::Wildcard {
            return self.pattern.is_some().then_some(self);
        }

        let part = parts[depth];
        let literals = self
            .children
            .iter()
            .filter(|child| !child.is_wild && child.part == part);
        let params = self
            .children
            .iter()
            .filter(|child| child.kind() == SegmentKind::Param);
        let wildcards = self
            .children
            .iter()
            .filter(|child| child.kind() == SegmentKind::Wildcard);

        literals
            .chain(params)
            .chain(wildcards)
            .find_map(|child| child.search(parts, depth + 1))
    }
}

/// Path parameters extracted from a matched pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    values: FnvHashMap<String, String>,
}

impl Params {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub(crate) fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }
}

/// Binds the parameters of `pattern` against the request's path segments.
///
/// A `:name` segment binds the request segment at the same position. A `*name`
/// segment binds every remaining request segment joined with `/` and ends the
/// walk. A bare `*` binds nothing.
pub(crate) fn extract_params(pattern: &str, path_parts: &[&str]) -> Params {
    let mut params = Params::default();
    for (index, part) in parse_pattern(pattern).into_iter().enumerate() {
        if let Some(name) = part.strip_prefix(':') {
            if let Some(value) = path_parts.get(index) {
                params.insert(name, *value);
            }
        } else if let Some(name) = part.strip_prefix('*') {
            if !name.is_empty() {
                let rest = path_parts.get(index..).unwrap_or_default();
                params.insert(name, rest.join("/"));
            }
            break;
        }
    }
    params
}
