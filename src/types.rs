//! Type shape model
//!
//! The frontend turns Go declarations into these tagged variants once, so the
//! rest of the engine can match on them instead of probing a type checker.
//! Qualified names are normalized to full package paths at load time.

use indexmap::IndexMap;
use std::fmt;
use std::path::PathBuf;

/// Package path of the universe scope (`error`, `comparable`).
pub const UNIVERSE: &str = "";

/// Source position (1-based line and column)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Position {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}

/// Reference to a declared type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamedRef {
    pub package: String,
    pub name: String,
    /// Type arguments of an instantiated generic type
    pub args: Vec<TypeShape>,
}

impl NamedRef {
    pub fn new(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn is_universe(&self) -> bool {
        self.package == UNIVERSE
    }

    pub fn is(&self, package: &str, name: &str) -> bool {
        self.package == package && self.name == name
    }

    /// `path/to/pkg.Name`, or just `Name` for universe types
    pub fn qualified(&self) -> String {
        if self.is_universe() {
            self.name.clone()
        } else {
            format!("{}.{}", self.package, self.name)
        }
    }
}

impl fmt::Display for NamedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified())
    }
}

/// Channel direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChanDir {
    Both,
    Send,
    Recv,
}

/// Go type expression
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeShape {
    /// Predeclared non-interface type (`int`, `string`, ...)
    Basic(String),
    Named(NamedRef),
    TypeParam(String),
    Pointer(Box<TypeShape>),
    Slice(Box<TypeShape>),
    Array(String, Box<TypeShape>),
    Map(Box<TypeShape>, Box<TypeShape>),
    Chan(ChanDir, Box<TypeShape>),
    Func(Box<Signature>),
    Interface(InterfaceShape),
    Struct(StructShape),
}

impl TypeShape {
    pub fn named(package: impl Into<String>, name: impl Into<String>) -> Self {
        TypeShape::Named(NamedRef::new(package, name))
    }

    pub fn pointer(inner: TypeShape) -> Self {
        TypeShape::Pointer(Box::new(inner))
    }

    pub fn as_named(&self) -> Option<&NamedRef> {
        match self {
            TypeShape::Named(n) => Some(n),
            _ => None,
        }
    }

    /// Named type behind at most one pointer
    pub fn pointee_named(&self) -> Option<(&NamedRef, bool)> {
        match self {
            TypeShape::Named(n) => Some((n, false)),
            TypeShape::Pointer(inner) => inner.as_named().map(|n| (n, true)),
            _ => None,
        }
    }

    /// Structural identity, ignoring parameter and result names
    pub fn identical(&self, other: &TypeShape) -> bool {
        match (self, other) {
            (TypeShape::Basic(a), TypeShape::Basic(b)) => a == b,
            (TypeShape::TypeParam(a), TypeShape::TypeParam(b)) => a == b,
            (TypeShape::Named(a), TypeShape::Named(b)) => {
                a.package == b.package
                    && a.name == b.name
                    && a.args.len() == b.args.len()
                    && a.args.iter().zip(&b.args).all(|(x, y)| x.identical(y))
            }
            (TypeShape::Pointer(a), TypeShape::Pointer(b)) => a.identical(b),
            (TypeShape::Slice(a), TypeShape::Slice(b)) => a.identical(b),
            (TypeShape::Array(la, a), TypeShape::Array(lb, b)) => la == lb && a.identical(b),
            (TypeShape::Map(ka, va), TypeShape::Map(kb, vb)) => ka.identical(kb) && va.identical(vb),
            (TypeShape::Chan(da, a), TypeShape::Chan(db, b)) => da == db && a.identical(b),
            (TypeShape::Func(a), TypeShape::Func(b)) => a.identical(b),
            (TypeShape::Interface(a), TypeShape::Interface(b)) => {
                a.embedded.len() == b.embedded.len()
                    && a.embedded.iter().zip(&b.embedded).all(|(x, y)| x.identical(y))
                    && a.methods.len() == b.methods.len()
                    && a.methods.iter().zip(&b.methods).all(|(x, y)| {
                        x.name == y.name && x.signature.identical(&y.signature)
                    })
            }
            (TypeShape::Struct(a), TypeShape::Struct(b)) => {
                a.fields.len() == b.fields.len()
                    && a.fields.iter().zip(&b.fields).all(|(x, y)| {
                        x.name == y.name && x.embedded == y.embedded && x.ty.identical(&y.ty)
                    })
            }
            _ => false,
        }
    }
}

/// Parameter, result or field-like variable
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Var {
    pub name: String,
    pub ty: TypeShape,
    pub position: Position,
}

impl Var {
    pub fn new(name: impl Into<String>, ty: TypeShape) -> Self {
        Self {
            name: name.into(),
            ty,
            position: Position::default(),
        }
    }

    /// Blank (`_`) and missing names can't be referenced
    pub fn is_anonymous(&self) -> bool {
        self.name.is_empty() || self.name == "_"
    }
}

/// Function signature. A variadic signature has a slice as its last parameter type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Signature {
    pub params: Vec<Var>,
    pub results: Vec<Var>,
    pub variadic: bool,
}

impl Signature {
    pub fn identical(&self, other: &Signature) -> bool {
        self.variadic == other.variadic
            && self.params.len() == other.params.len()
            && self.results.len() == other.results.len()
            && self.params.iter().zip(&other.params).all(|(a, b)| a.ty.identical(&b.ty))
            && self.results.iter().zip(&other.results).all(|(a, b)| a.ty.identical(&b.ty))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InterfaceMethod {
    pub name: String,
    pub signature: Signature,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct InterfaceShape {
    pub methods: Vec<InterfaceMethod>,
    /// Embedded interfaces and constraint terms
    pub embedded: Vec<TypeShape>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: String,
    pub ty: TypeShape,
    pub embedded: bool,
    pub position: Position,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StructShape {
    pub fields: Vec<Field>,
}

/// Method declared on a named type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDecl {
    pub name: String,
    pub position: Position,
    pub receiver_name: String,
    pub pointer_receiver: bool,
    pub signature: Signature,
}

/// Package-level type declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDecl {
    pub name: String,
    pub position: Position,
    /// `type A = B`
    pub alias: bool,
    pub type_params: Vec<String>,
    /// Declared type expression. May itself be `Named` for `type A B`.
    pub underlying: TypeShape,
    pub methods: Vec<MethodDecl>,
}

impl TypeDecl {
    pub fn method(&self, name: &str) -> Option<&MethodDecl> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// Package-level function declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncDecl {
    pub name: String,
    pub position: Position,
    pub signature: Signature,
}

/// Top-level symbol
#[derive(Debug, Clone, Copy)]
pub enum Symbol<'a> {
    Type(&'a TypeDecl),
    Func(&'a FuncDecl),
}

/// Loaded package: the symbol table of one import path
#[derive(Debug, Clone, Default)]
pub struct Package {
    pub path: String,
    pub name: String,
    pub dir: PathBuf,
    pub files: Vec<PathBuf>,
    pub types: IndexMap<String, TypeDecl>,
    pub funcs: IndexMap<String, FuncDecl>,
    /// Package-level `var` and `const` names
    pub values: Vec<String>,
}

impl Package {
    /// Predeclared types that behave like named declarations
    pub fn universe() -> Self {
        let error_iface = InterfaceShape {
            methods: vec![InterfaceMethod {
                name: "Error".to_string(),
                signature: Signature {
                    params: Vec::new(),
                    results: vec![Var::new("", TypeShape::Basic("string".to_string()))],
                    variadic: false,
                },
            }],
            embedded: Vec::new(),
        };

        let mut types = IndexMap::new();
        for (name, underlying) in [
            ("error", TypeShape::Interface(error_iface)),
            ("comparable", TypeShape::Interface(InterfaceShape::default())),
        ] {
            types.insert(
                name.to_string(),
                TypeDecl {
                    name: name.to_string(),
                    position: Position::default(),
                    alias: false,
                    type_params: Vec::new(),
                    underlying,
                    methods: Vec::new(),
                },
            );
        }

        Self {
            path: UNIVERSE.to_string(),
            name: String::new(),
            types,
            ..Self::default()
        }
    }

    pub fn lookup(&self, name: &str) -> Option<Symbol<'_>> {
        if let Some(t) = self.types.get(name) {
            return Some(Symbol::Type(t));
        }
        self.funcs.get(name).map(Symbol::Func)
    }

    /// Every package-level identifier the package declares
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.types
            .keys()
            .chain(self.funcs.keys())
            .chain(&self.values)
            .map(String::as_str)
    }
}

/// Receiver of a method under test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receiver {
    pub name: String,
    pub named: NamedRef,
    pub pointer: bool,
}

/// Snapshot of the callable a test table is generated for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallableSignature {
    pub name: String,
    pub position: Position,
    pub receiver: Option<Receiver>,
    pub params: Vec<Var>,
    pub results: Vec<Var>,
    pub variadic: bool,
}

impl CallableSignature {
    pub fn from_func(decl: &FuncDecl) -> Self {
        Self {
            name: decl.name.clone(),
            position: decl.position.clone(),
            receiver: None,
            params: decl.signature.params.clone(),
            results: decl.signature.results.clone(),
            variadic: decl.signature.variadic,
        }
    }

    pub fn from_method(package: &str, owner: &TypeDecl, method: &MethodDecl) -> Self {
        Self {
            name: method.name.clone(),
            position: method.position.clone(),
            receiver: Some(Receiver {
                name: method.receiver_name.clone(),
                named: NamedRef::new(package, owner.name.clone()),
                pointer: method.pointer_receiver,
            }),
            params: method.signature.params.clone(),
            results: method.signature.results.clone(),
            variadic: method.signature.variadic,
        }
    }

    /// Stable, referenceable name of the i-th parameter
    pub fn param_key(&self, index: usize) -> String {
        match self.params.get(index) {
            Some(p) if !p.is_anonymous() => p.name.clone(),
            _ => format!("p{}", index + 1),
        }
    }

    /// Last result is the universe `error`
    pub fn is_errored(&self) -> bool {
        self.results.last().is_some_and(|r| is_error(&r.ty))
    }

    pub fn has_context(&self) -> bool {
        self.params.iter().any(|p| is_context(&p.ty))
    }
}

pub fn is_error(ty: &TypeShape) -> bool {
    matches!(ty, TypeShape::Named(n) if n.is(UNIVERSE, "error"))
}

pub fn is_context(ty: &TypeShape) -> bool {
    matches!(ty, TypeShape::Named(n) if n.is("context", "Context"))
}
