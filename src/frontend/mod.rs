//! Symbol table: package loading, caching and type resolution

pub mod go;
mod gomod;
mod loader;

pub use go::{FileOutline, GoParser, outline, parse_package};
pub use gomod::GoEnv;
pub use loader::{GoLoader, MemoryLoader};

use crate::error::LoadError;
use crate::types::{InterfaceMethod, NamedRef, Package, TypeDecl, TypeShape, UNIVERSE};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Nesting limit when chasing `type A B` chains and embedded interfaces
const MAX_DEPTH: usize = 32;

/// Source of parsed packages
pub trait PackageLoader {
    /// Turn a user-supplied package argument (`.`, `./sub`, an import path) into an import path
    fn resolve(&self, spec: &str) -> Result<String, LoadError>;

    /// Parse the package at the given import path
    fn load(&mut self, path: &str) -> Result<Package, LoadError>;

    /// Import path of the current module, used to resolve module-relative paths
    fn module_path(&self) -> Option<&str>;
}

/// Package access handed to mock lookups
pub trait PackageProvider {
    /// Package by full import path
    fn package(&mut self, path: &str) -> Result<Arc<Package>, LoadError>;

    /// Package by a path relative to the current module root
    fn local_package(&mut self, path: &str) -> Result<Arc<Package>, LoadError>;

    /// Declaration of a named type
    fn type_decl(&mut self, named: &NamedRef) -> Result<Option<TypeDecl>, LoadError> {
        let pkg = self.package(&named.package)?;
        Ok(pkg.types.get(&named.name).cloned())
    }
}

/// Caching symbol table on top of a loader
pub struct SymbolTable {
    loader: Box<dyn PackageLoader>,
    packages: HashMap<String, Arc<Package>>,
}

impl SymbolTable {
    pub fn new(loader: impl PackageLoader + 'static) -> Self {
        Self::from_boxed(Box::new(loader))
    }

    pub fn from_boxed(loader: Box<dyn PackageLoader>) -> Self {
        let mut packages = HashMap::new();
        packages.insert(UNIVERSE.to_string(), Arc::new(Package::universe()));
        Self { loader, packages }
    }

    pub fn resolve(&self, spec: &str) -> Result<String, LoadError> {
        self.loader.resolve(spec)
    }

    pub fn module_path(&self) -> Option<&str> {
        self.loader.module_path()
    }
}

impl PackageProvider for SymbolTable {
    fn package(&mut self, path: &str) -> Result<Arc<Package>, LoadError> {
        if let Some(pkg) = self.packages.get(path) {
            return Ok(pkg.clone());
        }

        debug!("loading package {path}");
        let pkg = Arc::new(self.loader.load(path)?);
        self.packages.insert(path.to_string(), pkg.clone());
        Ok(pkg)
    }

    fn local_package(&mut self, path: &str) -> Result<Arc<Package>, LoadError> {
        let module = self
            .loader
            .module_path()
            .ok_or_else(|| LoadError::PackageNotFound(path.to_string()))?
            .to_string();
        let full = format!("{}/{}", module.trim_end_matches('/'), path.trim_start_matches("./"));
        self.package(&full)
    }
}

/// Underlying type of a named type, following `type A B` chains
pub fn underlying(provider: &mut dyn PackageProvider, named: &NamedRef) -> Result<TypeShape, LoadError> {
    let mut current = named.clone();
    for _ in 0..MAX_DEPTH {
        let decl = provider
            .type_decl(&current)?
            .ok_or_else(|| LoadError::Unresolved(current.qualified()))?;
        match decl.underlying {
            TypeShape::Named(next) => current = next,
            other => return Ok(other),
        }
    }
    Err(LoadError::Unresolved(named.qualified()))
}

/// Full method set of a named interface, embedded interfaces included
pub fn interface_methods(
    provider: &mut dyn PackageProvider,
    named: &NamedRef,
) -> Result<Vec<InterfaceMethod>, LoadError> {
    let mut methods = Vec::new();
    collect_methods(provider, named, &mut methods, 0)?;
    Ok(methods)
}

fn collect_methods(
    provider: &mut dyn PackageProvider,
    named: &NamedRef,
    out: &mut Vec<InterfaceMethod>,
    depth: usize,
) -> Result<(), LoadError> {
    if depth > MAX_DEPTH {
        return Err(LoadError::Unresolved(named.qualified()));
    }

    let TypeShape::Interface(iface) = underlying(provider, named)? else {
        return Err(LoadError::Unresolved(format!("{} is not an interface", named.qualified())));
    };

    for embedded in &iface.embedded {
        match embedded {
            TypeShape::Named(inner) => collect_methods(provider, inner, out, depth + 1)?,
            TypeShape::Interface(inline) => push_unique(out, inline.methods.iter().cloned()),
            // Constraint terms don't contribute methods
            _ => {}
        }
    }
    push_unique(out, iface.methods.iter().cloned());
    Ok(())
}

fn push_unique(out: &mut Vec<InterfaceMethod>, methods: impl Iterator<Item = InterfaceMethod>) {
    for m in methods {
        if !out.iter().any(|existing| existing.name == m.name) {
            out.push(m);
        }
    }
}
