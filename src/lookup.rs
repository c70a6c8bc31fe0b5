//! Mock lookup protocol
//!
//! A lookup maps an interface type to a mock type that can stand in for it.
//! [`StandardMockLookup`] works for mockgen and pamgen style mocks: it looks
//! in the interface's own package first, then in the fallback packages, and
//! only accepts a candidate once it is structurally verified.

use crate::error::LookupError;
use crate::frontend::{PackageProvider, interface_methods, underlying};
use crate::naming::NameTemplate;
use crate::types::{InterfaceMethod, NamedRef, Package, TypeShape};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Verified mock for an interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockDescriptor {
    /// Interface the mock satisfies
    pub interface: NamedRef,
    /// Mock type
    pub mock: NamedRef,
    /// `New<Mock>(*Controller) *<Mock>`
    pub constructor: NamedRef,
}

/// Maps an interface type to its mock
pub trait MockLookup {
    fn lookup(&self, provider: &mut dyn PackageProvider, iface: &NamedRef) -> Result<MockDescriptor, LookupError>;
}

impl<F> MockLookup for F
where
    F: Fn(&mut dyn PackageProvider, &NamedRef) -> Result<MockDescriptor, LookupError>,
{
    fn lookup(&self, provider: &mut dyn PackageProvider, iface: &NamedRef) -> Result<MockDescriptor, LookupError> {
        self(provider, iface)
    }
}

/// Mocking library the generated code and mock constructors use
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MockFramework {
    /// Import path of the controller package
    pub package: String,
    /// Controller type name
    pub controller: String,
}

impl MockFramework {
    pub fn controller_ref(&self) -> NamedRef {
        NamedRef::new(self.package.clone(), self.controller.clone())
    }
}

impl Default for MockFramework {
    fn default() -> Self {
        Self {
            package: "github.com/golang/mock/gomock".to_string(),
            controller: "Controller".to_string(),
        }
    }
}

/// Why a candidate was rejected
#[derive(Debug, Error)]
enum Rejection {
    #[error("type {0} not found")]
    NoType(String),
    #[error("type {mock} was found but it does not implement {iface}: {reason}")]
    NotImplemented {
        mock: String,
        iface: String,
        reason: String,
    },
    #[error("{0} is an alias")]
    Alias(String),
    #[error("{0} is not a structure")]
    NotStruct(String),
    #[error("type does not have an expected constructor {0}")]
    NoConstructor(String),
    #[error("{0} is not a function")]
    ConstructorNotFunction(String),
    #[error("mock constructor must have exactly one argument, has {0}")]
    ConstructorArity(usize),
    #[error("{expected} type expected for the mock constructor parameter, got {got}")]
    ConstructorParam { expected: String, got: String },
    #[error("mock constructor must have exactly one return value, has {0}")]
    ConstructorResults(usize),
    #[error("*{expected} type expected for the only result, got {got}")]
    ConstructorResult { expected: String, got: String },
}

/// Lookup for mockgen/pamgen style mocks
#[derive(Debug, Clone, Default)]
pub struct StandardMockLookup {
    fallback: Vec<String>,
    template: NameTemplate,
    overrides: HashMap<String, String>,
    framework: MockFramework,
}

impl StandardMockLookup {
    /// `fallback` holds package paths searched after the interface's own package.
    /// Each is tried as an import path first, then relative to the module root.
    pub fn new(fallback: Vec<String>, template: NameTemplate) -> Self {
        Self {
            fallback,
            template,
            overrides: HashMap::new(),
            framework: MockFramework::default(),
        }
    }

    /// Explicit mock name for an interface given as `path/to/pkg.Name`
    pub fn with_override(mut self, iface: impl Into<String>, mock: impl Into<String>) -> Self {
        self.overrides.insert(iface.into(), mock.into());
        self
    }

    pub fn with_framework(mut self, framework: MockFramework) -> Self {
        self.framework = framework;
        self
    }

    pub fn framework(&self) -> &MockFramework {
        &self.framework
    }

    fn mock_name(&self, iface: &NamedRef) -> String {
        match self.overrides.get(&iface.qualified()) {
            Some(name) => name.clone(),
            None => self.template.apply(&iface.name),
        }
    }

    fn packages(&self, provider: &mut dyn PackageProvider, iface: &NamedRef) -> Vec<Arc<Package>> {
        let mut packages = Vec::new();
        for path in std::iter::once(&iface.package).chain(&self.fallback) {
            let pkg = match provider.package(path) {
                Ok(pkg) => pkg,
                Err(_) => match provider.local_package(path) {
                    Ok(pkg) => pkg,
                    Err(err) => {
                        warn!("package {path} was not found: {err}");
                        continue;
                    }
                },
            };
            packages.push(pkg);
        }
        packages
    }

    fn validate(
        &self,
        provider: &mut dyn PackageProvider,
        pkg: &Package,
        iface: &NamedRef,
        required: &[InterfaceMethod],
        name: &str,
    ) -> Result<MockDescriptor, Rejection> {
        let decl = pkg.types.get(name).ok_or_else(|| Rejection::NoType(name.to_string()))?;

        // A pointer's method set holds methods of both receiver kinds
        for method in required {
            let reason = match decl.method(&method.name) {
                None => format!("missing method {}", method.name),
                Some(m) if !m.signature.identical(&method.signature) => {
                    format!("method {} has a different signature", method.name)
                }
                Some(_) => continue,
            };
            return Err(Rejection::NotImplemented {
                mock: name.to_string(),
                iface: iface.to_string(),
                reason,
            });
        }

        if decl.alias {
            return Err(Rejection::Alias(name.to_string()));
        }
        let mock = NamedRef::new(pkg.path.clone(), name);
        let is_struct = match &decl.underlying {
            TypeShape::Struct(_) => true,
            TypeShape::Named(_) => matches!(underlying(provider, &mock), Ok(TypeShape::Struct(_))),
            _ => false,
        };
        if !is_struct {
            return Err(Rejection::NotStruct(name.to_string()));
        }

        let constructor = format!("New{name}");
        let Some(func) = pkg.funcs.get(&constructor) else {
            return Err(if pkg.types.contains_key(&constructor) {
                Rejection::ConstructorNotFunction(constructor)
            } else {
                Rejection::NoConstructor(constructor)
            });
        };

        let sig = &func.signature;
        if sig.params.len() != 1 {
            return Err(Rejection::ConstructorArity(sig.params.len()));
        }
        let controller = TypeShape::pointer(TypeShape::Named(self.framework.controller_ref()));
        if !sig.params[0].ty.identical(&controller) {
            return Err(Rejection::ConstructorParam {
                expected: format!("*{}", self.framework.controller_ref()),
                got: describe(&sig.params[0].ty),
            });
        }

        if sig.results.len() != 1 {
            return Err(Rejection::ConstructorResults(sig.results.len()));
        }
        if !sig.results[0].ty.identical(&TypeShape::pointer(TypeShape::Named(mock.clone()))) {
            return Err(Rejection::ConstructorResult {
                expected: name.to_string(),
                got: describe(&sig.results[0].ty),
            });
        }

        Ok(MockDescriptor {
            interface: iface.clone(),
            mock,
            constructor: NamedRef::new(pkg.path.clone(), constructor),
        })
    }
}

fn describe(ty: &TypeShape) -> String {
    match ty.pointee_named() {
        Some((named, true)) => format!("*{named}"),
        Some((named, false)) => named.to_string(),
        None => format!("{ty:?}"),
    }
}

impl MockLookup for StandardMockLookup {
    fn lookup(&self, provider: &mut dyn PackageProvider, iface: &NamedRef) -> Result<MockDescriptor, LookupError> {
        let packages = self.packages(provider, iface);
        if packages.is_empty() {
            return Err(LookupError::NoPackages);
        }

        let required = interface_methods(provider, iface)?;
        let name = self.mock_name(iface);

        for pkg in &packages {
            match self.validate(provider, pkg, iface, &required, &name) {
                Ok(found) => {
                    debug!("found a mock {} for {iface}", found.mock);
                    return Ok(found);
                }
                Err(reason) => {
                    warn!(
                        "look for mock {name} with constructor New{name} in package {}: {reason}",
                        pkg.path
                    );
                }
            }
        }

        Err(LookupError::MockNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::{MemoryLoader, SymbolTable};

    const STORE: &str = r#"package store

type Store interface {
	Get(id string) (string, error)
}

type MockStore struct{}

func NewMockStore(ctrl *gomock.Controller) *MockStore { return &MockStore{} }

func (m *MockStore) Get(id string) (string, error) { return "", nil }
"#;

    const GOMOCK: &str = "package gomock\n\ntype Controller struct{}\n";

    fn table(store: &str) -> SymbolTable {
        let store = store.replace(
            "package store\n",
            "package store\n\nimport \"github.com/golang/mock/gomock\"\n",
        );
        let loader = MemoryLoader::new("example.com/app")
            .with_package("example.com/app/store", &[("store.go", store.as_str())])
            .with_package("github.com/golang/mock/gomock", &[("gomock.go", GOMOCK)]);
        SymbolTable::new(loader)
    }

    #[test]
    fn test_finds_mock_in_own_package() {
        let mut table = table(STORE);
        let lookup = StandardMockLookup::default();
        let iface = NamedRef::new("example.com/app/store", "Store");

        let found = lookup.lookup(&mut table, &iface).unwrap();
        assert_eq!(found.mock, NamedRef::new("example.com/app/store", "MockStore"));
        assert_eq!(found.constructor.name, "NewMockStore");
        assert_eq!(found.interface, iface);
    }

    #[test]
    fn test_override_wins_over_template() {
        let src = STORE.replace("MockStore", "StoreDouble");
        let mut table = table(&src);
        let lookup = StandardMockLookup::default().with_override("example.com/app/store.Store", "StoreDouble");

        let found = lookup
            .lookup(&mut table, &NamedRef::new("example.com/app/store", "Store"))
            .unwrap();
        assert_eq!(found.mock.name, "StoreDouble");
    }

    #[test]
    fn test_rejects_wrong_signature() {
        let src = STORE.replace(
            "func (m *MockStore) Get(id string) (string, error)",
            "func (m *MockStore) Get(id int) (string, error)",
        );
        let mut table = table(&src);
        let err = StandardMockLookup::default()
            .lookup(&mut table, &NamedRef::new("example.com/app/store", "Store"))
            .unwrap_err();
        assert!(matches!(err, LookupError::MockNotFound));
    }

    #[test]
    fn test_rejects_wrong_controller() {
        let src = STORE.replace("ctrl *gomock.Controller", "ctrl *Controller");
        let mut table = table(&src);
        let err = StandardMockLookup::default()
            .lookup(&mut table, &NamedRef::new("example.com/app/store", "Store"))
            .unwrap_err();
        assert!(matches!(err, LookupError::MockNotFound));
    }

    #[test]
    fn test_framework_is_configurable() {
        let mut table = table(STORE);
        let lookup = StandardMockLookup::default().with_framework(MockFramework {
            package: "go.uber.org/mock/gomock".to_string(),
            controller: "Controller".to_string(),
        });
        let err = lookup
            .lookup(&mut table, &NamedRef::new("example.com/app/store", "Store"))
            .unwrap_err();
        assert!(matches!(err, LookupError::MockNotFound));
    }

    #[test]
    fn test_closure_lookup() {
        let lookup = |_: &mut dyn PackageProvider, iface: &NamedRef| -> Result<MockDescriptor, LookupError> {
            Ok(MockDescriptor {
                interface: iface.clone(),
                mock: NamedRef::new("example.com/mocks", "Fake"),
                constructor: NamedRef::new("example.com/mocks", "NewFake"),
            })
        };
        let mut table = table(STORE);
        let found = lookup
            .lookup(&mut table, &NamedRef::new("example.com/app/store", "Store"))
            .unwrap();
        assert_eq!(found.mock.name, "Fake");
    }
}
