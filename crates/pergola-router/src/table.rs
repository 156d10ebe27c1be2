use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use http::Method;

use crate::pattern::{PatternMatch, RoutePattern};

/// The method slot a target is registered under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodKey {
    /// Matches any request method not claimed by a named slot.
    Any,
    /// Matches one named request method.
    Only(Method),
}

/// Per-pattern dispatch targets, keyed by request method.
///
/// Invariant: at most one target per named method, plus at most one
/// any-method target consulted when no named slot matches.
pub struct MethodMap<T> {
    named: HashMap<Method, T>,
    any: Option<T>,
}

impl<T> Default for MethodMap<T> {
    fn default() -> Self {
        Self {
            named: HashMap::new(),
            any: None,
        }
    }
}

impl<T> MethodMap<T> {
    /// Register a target under the given method slot, replacing any
    /// previous occupant.
    pub fn insert(&mut self, key: MethodKey, target: T) {
        match key {
            MethodKey::Any => self.any = Some(target),
            MethodKey::Only(method) => {
                self.named.insert(method, target);
            }
        }
    }

    /// Resolve a request method: the named slot wins, the any-method
    /// slot is the fallback.
    pub fn resolve(&self, method: &Method) -> Option<&T> {
        self.named.get(method).or(self.any.as_ref())
    }

    /// Names of the registered named methods, sorted.
    pub fn allowed(&self) -> Vec<String> {
        let mut allowed: Vec<String> = self.named.keys().map(|m| m.to_string()).collect();
        allowed.sort();
        allowed
    }

    /// All slots in display order: named methods sorted, then the
    /// any-method slot rendered as `*`.
    pub fn entries(&self) -> Vec<(String, &T)> {
        let mut named: Vec<(String, &T)> = self
            .named
            .iter()
            .map(|(m, t)| (m.to_string(), t))
            .collect();
        named.sort_by(|a, b| a.0.cmp(&b.0));
        if let Some(any) = &self.any {
            named.push(("*".to_string(), any));
        }
        named
    }

    /// Mutable access to every registered target.
    pub fn targets_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.named.values_mut().chain(self.any.as_mut())
    }

    pub fn is_empty(&self) -> bool {
        self.named.is_empty() && self.any.is_none()
    }
}

/// The result of a route lookup.
pub enum TableMatch<'a, T> {
    /// A pattern matched and the method resolved to a target.
    Found {
        target: &'a T,
        pattern: &'a RoutePattern,
        captures: PatternMatch,
    },
    /// A pattern matched but the method has no registered target.
    MethodNotAllowed { allowed: Vec<String> },
    /// No pattern matched.
    NotFound,
}

/// The ordered, deduplicated route index: compiled patterns mapped to
/// per-method dispatch targets.
///
/// Insertion order is irrelevant; traversal order is re-derived by
/// sorting patterns by descending source length, so longer (typically
/// nested) mounts are tried before shorter parent mounts. The sorted
/// order is memoized and invalidated by every mutation. Patterns of
/// equal source length have unspecified relative order.
pub struct RouteTable<T> {
    routes: HashMap<RoutePattern, MethodMap<T>>,
    sorted: OnceLock<Vec<RoutePattern>>,
}

impl<T> Default for RouteTable<T> {
    fn default() -> Self {
        Self {
            routes: HashMap::new(),
            sorted: OnceLock::new(),
        }
    }
}

impl<T> RouteTable<T> {
    /// Create a new empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a target for a (pattern, method) pair.
    pub fn route(&mut self, pattern: RoutePattern, key: MethodKey, target: T) {
        self.sorted = OnceLock::new();
        self.routes.entry(pattern).or_default().insert(key, target);
    }

    /// Merge another table into this one.
    ///
    /// This is a destructive union keyed by pattern identity: on a
    /// colliding pattern the incoming method map replaces the resident
    /// one wholesale (last-writer-wins, no conflict raised).
    pub fn merge(&mut self, other: RouteTable<T>) {
        self.sorted = OnceLock::new();
        for (pattern, methods) in other.routes {
            self.routes.insert(pattern, methods);
        }
    }

    /// Number of registered patterns.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// The method map registered for a pattern.
    pub fn get(&self, pattern: &RoutePattern) -> Option<&MethodMap<T>> {
        self.routes.get(pattern)
    }

    /// Mutable access to every registered target.
    pub fn targets_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.routes.values_mut().flat_map(MethodMap::targets_mut)
    }

    /// Patterns in traversal order (longest source first), derived on
    /// first use and memoized until the next mutation.
    pub fn sorted_patterns(&self) -> &[RoutePattern] {
        self.sorted.get_or_init(|| {
            let mut patterns: Vec<RoutePattern> = self.routes.keys().cloned().collect();
            patterns.sort_by(|a, b| b.source().len().cmp(&a.source().len()));
            patterns
        })
    }

    /// Look up a request path and method.
    ///
    /// Walks patterns longest-source-first; the first matching pattern
    /// decides the outcome. A match whose method map cannot resolve the
    /// request method yields `MethodNotAllowed` without falling through
    /// to shorter patterns that might also match.
    pub fn lookup(&self, path: &str, method: &Method) -> TableMatch<'_, T> {
        for pattern in self.sorted_patterns() {
            let Some(captures) = pattern.matches(path) else {
                continue;
            };
            let Some((stored, methods)) = self.routes.get_key_value(pattern) else {
                continue;
            };
            return match methods.resolve(method) {
                Some(target) => TableMatch::Found {
                    target,
                    pattern: stored,
                    captures,
                },
                None => TableMatch::MethodNotAllowed {
                    allowed: methods.allowed(),
                },
            };
        }
        TableMatch::NotFound
    }
}

impl<T> fmt::Debug for RouteTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (pattern, methods) in &self.routes {
            let slots: Vec<String> = methods.entries().into_iter().map(|(m, _)| m).collect();
            map.entry(&pattern.source(), &slots);
        }
        map.finish()
    }
}
