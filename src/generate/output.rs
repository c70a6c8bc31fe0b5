use super::imports::ImportRegistry;
use super::scope::{ScopeId, Scopes};
use crate::types::{ChanDir, NamedRef, Signature, TypeShape};

/// Output buffer that accumulates generated lines
#[derive(Debug, Clone, Default)]
pub struct Output {
    lines: Vec<String>,
    current_line: String,
    indent: usize,
}

impl Output {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add text, indenting it if it starts a line
    pub fn push(&mut self, text: &str) {
        if self.current_line.is_empty() && !text.is_empty() {
            self.current_line.push_str(&"\t".repeat(self.indent));
        }
        self.current_line.push_str(text);
    }

    /// Add a newline
    pub fn newline(&mut self) {
        self.current_line.push('\n');
        self.lines.push(std::mem::take(&mut self.current_line));
    }

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn dedent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.current_line.is_empty()
    }

    /// Generated code so far
    pub fn text(&self) -> String {
        let mut code = self.lines.concat();
        code.push_str(&self.current_line);
        code
    }
}

/// Go source writer for one output file: lines, imports and identifier scopes
#[derive(Debug, Clone)]
pub struct GoRenderer {
    /// Import path of the package the file belongs to, its types render unqualified
    package: String,
    out: Output,
    imports: ImportRegistry,
    scopes: Scopes,
    scope: ScopeId,
}

impl GoRenderer {
    pub fn new(package: impl Into<String>) -> Self {
        let scopes = Scopes::new();
        let scope = scopes.root();
        Self {
            package: package.into(),
            out: Output::new(),
            imports: ImportRegistry::new(),
            scopes,
            scope,
        }
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn line(&mut self, text: impl AsRef<str>) {
        self.out.push(text.as_ref());
        self.out.newline();
    }

    /// Write a line and indent what follows
    pub fn open(&mut self, text: impl AsRef<str>) {
        self.line(text);
        self.out.indent();
    }

    /// Dedent and write a line
    pub fn close(&mut self, text: impl AsRef<str>) {
        self.out.dedent();
        self.line(text);
    }

    pub fn blank(&mut self) {
        self.out.newline();
    }

    pub fn indent(&mut self) {
        self.out.indent();
    }

    pub fn dedent(&mut self) {
        self.out.dedent();
    }

    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    pub fn body(&self) -> String {
        self.out.text()
    }

    pub fn imports(&self) -> &ImportRegistry {
        &self.imports
    }

    /// Record an import the file already has, claiming its alias
    pub fn seed_import(&mut self, path: &str, alias: &str) {
        self.imports.seed(path, alias);
        let root = self.scopes.root();
        self.scopes.claim(root, alias);
    }

    /// Alias to use for `path`
    pub fn import(&mut self, path: &str) -> String {
        let scopes = &self.scopes;
        let alias = self.imports.reference_with(path, |name| scopes.is_taken_anywhere(name));
        let root = self.scopes.root();
        self.scopes.claim(root, &alias);
        alias
    }

    pub fn scopes(&mut self) -> &mut Scopes {
        &mut self.scopes
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    /// Switch to `scope`, returning the previous one
    pub fn set_scope(&mut self, scope: ScopeId) -> ScopeId {
        std::mem::replace(&mut self.scope, scope)
    }

    /// Open a child of the current scope and switch to it. Returns the previous scope.
    pub fn enter(&mut self) -> ScopeId {
        let child = self.scopes.child(self.scope);
        self.set_scope(child)
    }

    /// Reserve a name in the current scope
    pub fn reserve(&mut self, base: &str, parts: &[&str]) -> String {
        self.scopes.reserve(self.scope, base, parts)
    }

    pub fn reserve_in(&mut self, scope: ScopeId, base: &str, parts: &[&str]) -> String {
        self.scopes.reserve(scope, base, parts)
    }

    /// Use a name verbatim in the current scope
    pub fn claim(&mut self, name: &str) -> bool {
        self.scopes.claim(self.scope, name)
    }

    /// Reference to a named type or function, qualified unless it is local
    pub fn qualify(&mut self, named: &NamedRef) -> String {
        let mut out = if named.is_universe() || named.package == self.package {
            named.name.clone()
        } else {
            format!("{}.{}", self.import(&named.package), named.name)
        };

        if !named.args.is_empty() {
            let args: Vec<String> = named.args.iter().map(|a| self.type_name(a)).collect();
            out.push('[');
            out.push_str(&args.join(", "));
            out.push(']');
        }
        out
    }

    pub fn type_name(&mut self, ty: &TypeShape) -> String {
        match ty {
            TypeShape::Basic(name) | TypeShape::TypeParam(name) => name.clone(),
            TypeShape::Named(named) => self.qualify(named),
            TypeShape::Pointer(inner) => format!("*{}", self.type_name(inner)),
            TypeShape::Slice(inner) => format!("[]{}", self.type_name(inner)),
            TypeShape::Array(len, inner) => format!("[{len}]{}", self.type_name(inner)),
            TypeShape::Map(key, value) => {
                format!("map[{}]{}", self.type_name(key), self.type_name(value))
            }
            TypeShape::Chan(dir, inner) => {
                let inner = self.type_name(inner);
                match dir {
                    ChanDir::Both => format!("chan {inner}"),
                    ChanDir::Send => format!("chan<- {inner}"),
                    ChanDir::Recv => format!("<-chan {inner}"),
                }
            }
            TypeShape::Func(sig) => format!("func{}", self.signature(sig)),
            TypeShape::Interface(iface) => {
                if iface.methods.is_empty() && iface.embedded.is_empty() {
                    return "any".to_string();
                }
                let mut elems: Vec<String> = iface.embedded.iter().map(|e| self.type_name(e)).collect();
                for m in &iface.methods {
                    let sig = self.signature(&m.signature);
                    elems.push(format!("{}{sig}", m.name));
                }
                format!("interface{{ {} }}", elems.join("; "))
            }
            TypeShape::Struct(shape) => {
                if shape.fields.is_empty() {
                    return "struct{}".to_string();
                }
                let fields: Vec<String> = shape
                    .fields
                    .iter()
                    .map(|f| {
                        let ty = self.type_name(&f.ty);
                        if f.embedded { ty } else { format!("{} {ty}", f.name) }
                    })
                    .collect();
                format!("struct{{ {} }}", fields.join("; "))
            }
        }
    }

    /// `(params) results` part of a function type
    fn signature(&mut self, sig: &Signature) -> String {
        let last = sig.params.len().saturating_sub(1);
        let params: Vec<String> = sig
            .params
            .iter()
            .enumerate()
            .map(|(i, p)| match &p.ty {
                TypeShape::Slice(inner) if sig.variadic && i == last => format!("...{}", self.type_name(inner)),
                ty => self.type_name(ty),
            })
            .collect();

        let results: Vec<String> = sig.results.iter().map(|r| self.type_name(&r.ty)).collect();
        match results.len() {
            0 => format!("({})", params.join(", ")),
            1 => format!("({}) {}", params.join(", "), results[0]),
            _ => format!("({}) ({})", params.join(", "), results.join(", ")),
        }
    }
}

/// Go interpreted string literal
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if (c as u32) < 0x20 || c == '\u{7f}' => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
