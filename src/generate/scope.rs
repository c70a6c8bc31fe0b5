//! Identifier allocation
//!
//! Scopes live in an arena. A frame sees the names of its ancestors, never
//! the names of its children, and a name once reserved stays reserved.

use crate::naming::camel_join;
use std::collections::HashSet;

const KEYWORDS: &[&str] = &[
    "break", "case", "chan", "const", "continue", "default", "defer", "else", "fallthrough", "for",
    "func", "go", "goto", "if", "import", "interface", "map", "package", "range", "return",
    "select", "struct", "switch", "type", "var",
];

const PREDECLARED: &[&str] = &[
    "any", "append", "bool", "byte", "cap", "clear", "close", "comparable", "complex",
    "complex64", "complex128", "copy", "delete", "error", "false", "float32", "float64", "imag",
    "int", "int8", "int16", "int32", "int64", "iota", "len", "make", "max", "min", "new", "nil",
    "panic", "print", "println", "real", "recover", "rune", "string", "true", "uint", "uint8",
    "uint16", "uint32", "uint64", "uintptr",
];

/// Names the generated test functions use verbatim
const GENERATED: &[&str] = &["t", "tt", "tests", "test"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

#[derive(Debug, Clone)]
struct Frame {
    parent: Option<ScopeId>,
    names: HashSet<String>,
}

#[derive(Debug, Clone)]
pub struct Scopes {
    frames: Vec<Frame>,
}

impl Scopes {
    /// Frame 0 holds keywords and predeclared names, frame 1 is the file scope
    pub fn new() -> Self {
        let builtin = Frame {
            parent: None,
            names: KEYWORDS
                .iter()
                .chain(PREDECLARED)
                .map(|s| s.to_string())
                .collect(),
        };
        let file = Frame {
            parent: Some(ScopeId(0)),
            names: GENERATED.iter().map(|s| s.to_string()).collect(),
        };
        Self {
            frames: vec![builtin, file],
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(1)
    }

    pub fn child(&mut self, parent: ScopeId) -> ScopeId {
        self.frames.push(Frame {
            parent: Some(parent),
            names: HashSet::new(),
        });
        ScopeId(self.frames.len() - 1)
    }

    /// Frame for struct fields and parameter lists of function types.
    /// It only avoids keywords, file-level names don't clash with it.
    pub fn detached(&mut self) -> ScopeId {
        self.child(ScopeId(0))
    }

    pub fn is_visible(&self, scope: ScopeId, name: &str) -> bool {
        let mut current = Some(scope);
        while let Some(id) = current {
            let frame = &self.frames[id.0];
            if frame.names.contains(name) {
                return true;
            }
            current = frame.parent;
        }
        false
    }

    /// Declared in `scope` itself, not in an ancestor
    pub fn is_local(&self, scope: ScopeId, name: &str) -> bool {
        self.frames[scope.0].names.contains(name)
    }

    pub fn is_taken_anywhere(&self, name: &str) -> bool {
        self.frames.iter().any(|f| f.names.contains(name))
    }

    /// Reserve `base` joined with `parts`, adding a numeric suffix when it is visible already
    pub fn reserve(&mut self, scope: ScopeId, base: &str, parts: &[&str]) -> String {
        let candidate = camel_join(base, parts);
        let mut name = candidate.clone();
        let mut n = 2;
        while self.is_visible(scope, &name) {
            name = format!("{candidate}{n}");
            n += 1;
        }
        self.frames[scope.0].names.insert(name.clone());
        name
    }

    /// Record a name used verbatim. Returns false if it was visible already.
    pub fn claim(&mut self, scope: ScopeId, name: &str) -> bool {
        let visible = self.is_visible(scope, name);
        self.frames[scope.0].names.insert(name.to_string());
        !visible
    }
}

impl Default for Scopes {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_disambiguates() {
        let mut scopes = Scopes::new();
        let root = scopes.root();
        assert_eq!(scopes.reserve(root, "want", &["1"]), "want1");
        assert_eq!(scopes.reserve(root, "a", &["arg"]), "aArg");
        assert_eq!(scopes.reserve(root, "a", &["arg"]), "aArg2");
        assert_eq!(scopes.reserve(root, "a", &["arg"]), "aArg3");
    }

    #[test]
    fn test_child_never_reissues_ancestor_names() {
        let mut scopes = Scopes::new();
        let root = scopes.root();
        scopes.reserve(root, "ctrl", &[]);
        let child = scopes.child(root);
        assert_eq!(scopes.reserve(child, "ctrl", &[]), "ctrl2");

        // Child names don't leak upward
        scopes.reserve(child, "row", &[]);
        assert!(!scopes.is_visible(root, "row"));
        assert_eq!(scopes.reserve(root, "row", &[]), "row");
        assert!(scopes.is_taken_anywhere("ctrl2"));
    }

    #[test]
    fn test_keywords_and_generated_names_are_reserved() {
        let mut scopes = Scopes::new();
        let root = scopes.root();
        assert_eq!(scopes.reserve(root, "type", &[]), "type2");
        assert_eq!(scopes.reserve(root, "tt", &[]), "tt2");

        let fields = scopes.detached();
        assert_eq!(scopes.reserve(fields, "tt", &[]), "tt");
        assert_eq!(scopes.reserve(fields, "range", &[]), "range2");
    }

    #[test]
    fn test_claim() {
        let mut scopes = Scopes::new();
        let root = scopes.root();
        assert!(scopes.claim(root, "ctx"));
        assert!(!scopes.claim(root, "ctx"));
        assert_eq!(scopes.reserve(root, "ctx", &[]), "ctx2");

        let body = scopes.child(root);
        assert!(!scopes.is_local(body, "ctx"));
        assert!(!scopes.claim(body, "ctx"));
        assert!(scopes.is_local(body, "ctx"));
    }
}
