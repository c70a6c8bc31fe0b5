//! Mock requirement classification
//!
//! Decides which receiver fields and parameters of a callable get mocks.
//! Exempt types are filtered out before anything is resolved or looked up.

use crate::error::{GenerateError, Stage};
use crate::frontend::{PackageProvider, underlying};
use crate::lookup::{MockDescriptor, MockLookup};
use crate::types::{CallableSignature, NamedRef, Position, TypeShape};
use serde::Deserialize;
use tracing::{debug, warn};

/// Interface type that never gets a mock
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Exemption {
    pub package: String,
    pub name: String,
}

impl Exemption {
    pub fn new(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            name: name.into(),
        }
    }

    fn context() -> Self {
        Self::new("context", "Context")
    }

    fn matches(&self, named: &NamedRef) -> bool {
        named.is(&self.package, &self.name)
    }
}

/// Types excluded from mocking. `context.Context` is exempt by default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoMockPolicy {
    exemptions: Vec<Exemption>,
}

impl Default for NoMockPolicy {
    fn default() -> Self {
        Self {
            exemptions: vec![Exemption::context()],
        }
    }
}

impl NoMockPolicy {
    pub fn exempt(&mut self, exemption: Exemption) {
        if !self.exemptions.contains(&exemption) {
            self.exemptions.push(exemption);
        }
    }

    /// Drop the default `context.Context` exemption
    pub fn allow_context(&mut self) {
        let context = Exemption::context();
        self.exemptions.retain(|e| *e != context);
    }

    /// Universe types like `error` are always exempt
    pub fn is_exempt(&self, named: &NamedRef) -> bool {
        named.is_universe() || self.exemptions.iter().any(|e| e.matches(named))
    }
}

/// A field or parameter that gets a mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockRequirement {
    /// Field name or parameter key
    pub name: String,
    pub interface: NamedRef,
    pub mock: MockDescriptor,
}

/// Classification result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirements {
    /// Receiver fields, in declaration order
    pub type_level: Vec<MockRequirement>,
    /// Parameters, in declaration order
    pub params: Vec<MockRequirement>,
}

impl Requirements {
    pub fn is_empty(&self) -> bool {
        self.type_level.is_empty() && self.params.is_empty()
    }

    pub fn param(&self, name: &str) -> Option<&MockRequirement> {
        self.params.iter().find(|r| r.name == name)
    }
}

pub struct Classifier<'a> {
    policy: &'a NoMockPolicy,
    lookup: &'a dyn MockLookup,
}

impl<'a> Classifier<'a> {
    pub fn new(policy: &'a NoMockPolicy, lookup: &'a dyn MockLookup) -> Self {
        Self { policy, lookup }
    }

    pub fn classify(
        &self,
        provider: &mut dyn PackageProvider,
        sig: &CallableSignature,
    ) -> Result<Requirements, GenerateError> {
        let type_level = self.type_mocks(provider, sig).stage("get mocks of type")?;
        let params = self.param_mocks(provider, sig).stage("get mocks for arguments")?;
        Ok(Requirements { type_level, params })
    }

    fn type_mocks(
        &self,
        provider: &mut dyn PackageProvider,
        sig: &CallableSignature,
    ) -> Result<Vec<MockRequirement>, GenerateError> {
        let Some(receiver) = &sig.receiver else {
            return Ok(Vec::new());
        };

        let shape = underlying(provider, &receiver.named)?;
        let TypeShape::Struct(shape) = shape else {
            debug!("receiver {} is not a structure, no mocks of type", receiver.named);
            return Ok(Vec::new());
        };

        let mut res = Vec::new();
        for field in &shape.fields {
            if field.embedded {
                warn!("{} embedded fields are not supported", field.position);
                continue;
            }
            if let Some(req) = self.requirement(provider, &field.name, &field.ty, &field.position, "field")? {
                res.push(req);
            }
        }
        Ok(res)
    }

    fn param_mocks(
        &self,
        provider: &mut dyn PackageProvider,
        sig: &CallableSignature,
    ) -> Result<Vec<MockRequirement>, GenerateError> {
        let mut res = Vec::new();
        for (i, param) in sig.params.iter().enumerate() {
            let key = sig.param_key(i);
            if let Some(req) = self.requirement(provider, &key, &param.ty, &param.position, "parameter")? {
                res.push(req);
            }
        }
        Ok(res)
    }

    fn requirement(
        &self,
        provider: &mut dyn PackageProvider,
        owner: &str,
        ty: &TypeShape,
        position: &Position,
        kind: &str,
    ) -> Result<Option<MockRequirement>, GenerateError> {
        let Some(named) = ty.as_named() else {
            debug!("{position} type of {kind} {owner} is not an interface, omitting");
            return Ok(None);
        };
        if self.policy.is_exempt(named) {
            debug!("{position} {kind} {owner} has an exempt type {named}, omitting");
            return Ok(None);
        }

        match underlying(provider, named) {
            Ok(TypeShape::Interface(_)) => {}
            Ok(_) => {
                debug!("{position} type of {kind} {owner} is not an interface, omitting");
                return Ok(None);
            }
            Err(err) => {
                debug!("{position} cannot resolve the type of {kind} {owner}, omitting: {err}");
                return Ok(None);
            }
        }

        let mock = self
            .lookup
            .lookup(provider, named)
            .stage(format!("look for a mock for type {named}"))?;

        Ok(Some(MockRequirement {
            name: owner.to_string(),
            interface: named.clone(),
            mock,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LookupError;
    use crate::frontend::{MemoryLoader, SymbolTable};
    use crate::types::Symbol;
    use std::cell::RefCell;

    const APP: &str = r#"package app

import "context"

type Store interface {
	Get(id string) (string, error)
}

type Clock interface {
	Now() int64
}

type Service struct {
	Clock
	store Store
	name  string
	err   error
}

func (s *Service) Do(ctx context.Context, st Store, n int) error { return nil }

func Divide(a, b int) (int, error) { return a / b, nil }
"#;

    const CONTEXT: &str = "package context\n\ntype Context interface {\n\tDone() <-chan struct{}\n}\n";

    fn table() -> SymbolTable {
        SymbolTable::new(
            MemoryLoader::new("example.com/app")
                .with_package("example.com/app", &[("app.go", APP)])
                .with_package("context", &[("context.go", CONTEXT)]),
        )
    }

    fn signature(table: &mut SymbolTable, name: &str) -> CallableSignature {
        let pkg = table.package("example.com/app").unwrap();
        match pkg.lookup(name) {
            Some(Symbol::Func(f)) => CallableSignature::from_func(f),
            Some(Symbol::Type(t)) => CallableSignature::from_method("example.com/app", t, &t.methods[0]),
            None => panic!("{name} not found"),
        }
    }

    fn recording(seen: &RefCell<Vec<String>>) -> impl Fn(&mut dyn PackageProvider, &NamedRef) -> Result<MockDescriptor, LookupError> + '_ {
        move |_: &mut dyn PackageProvider, iface: &NamedRef| {
            seen.borrow_mut().push(iface.to_string());
            Ok(MockDescriptor {
                interface: iface.clone(),
                mock: NamedRef::new("example.com/app/mocks", format!("Mock{}", iface.name)),
                constructor: NamedRef::new("example.com/app/mocks", format!("NewMock{}", iface.name)),
            })
        }
    }

    #[test]
    fn test_plain_function_has_no_requirements() {
        let mut table = table();
        let sig = signature(&mut table, "Divide");
        let seen = RefCell::new(Vec::new());
        let lookup = recording(&seen);
        let policy = NoMockPolicy::default();

        let reqs = Classifier::new(&policy, &lookup).classify(&mut table, &sig).unwrap();
        assert!(reqs.is_empty());
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_method_requirements() {
        let mut table = table();
        let sig = signature(&mut table, "Service");
        let seen = RefCell::new(Vec::new());
        let lookup = recording(&seen);
        let policy = NoMockPolicy::default();

        let reqs = Classifier::new(&policy, &lookup).classify(&mut table, &sig).unwrap();
        let fields: Vec<_> = reqs.type_level.iter().map(|r| r.name.as_str()).collect();
        let params: Vec<_> = reqs.params.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(fields, vec!["store"]);
        assert_eq!(params, vec!["st"]);
        // context.Context is exempt and never looked up
        assert_eq!(*seen.borrow(), vec!["example.com/app.Store", "example.com/app.Store"]);
    }

    #[test]
    fn test_context_can_be_mocked() {
        let mut table = table();
        let sig = signature(&mut table, "Service");
        let seen = RefCell::new(Vec::new());
        let lookup = recording(&seen);
        let mut policy = NoMockPolicy::default();
        policy.allow_context();

        let reqs = Classifier::new(&policy, &lookup).classify(&mut table, &sig).unwrap();
        assert_eq!(reqs.params[0].name, "ctx");
        assert!(reqs.param("ctx").is_some());
    }

    #[test]
    fn test_extra_exemption() {
        let mut table = table();
        let sig = signature(&mut table, "Service");
        let seen = RefCell::new(Vec::new());
        let lookup = recording(&seen);
        let mut policy = NoMockPolicy::default();
        policy.exempt(Exemption::new("example.com/app", "Store"));

        let reqs = Classifier::new(&policy, &lookup).classify(&mut table, &sig).unwrap();
        assert!(reqs.is_empty());
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_lookup_failure_is_wrapped() {
        let mut table = table();
        let sig = signature(&mut table, "Service");
        let lookup = |_: &mut dyn PackageProvider, _: &NamedRef| -> Result<MockDescriptor, LookupError> {
            Err(LookupError::MockNotFound)
        };
        let policy = NoMockPolicy::default();

        let err = Classifier::new(&policy, &lookup).classify(&mut table, &sig).unwrap_err();
        assert_eq!(
            err.to_string(),
            "get mocks of type: look for a mock for type example.com/app.Store: mock was not found"
        );
        assert!(err.is_mock_not_found());
    }
}
