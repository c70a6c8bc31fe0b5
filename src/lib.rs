//! Table test and mocker generation for Go packages.
//!
//! A [`Generator`] loads the package declaring a function or method, decides
//! which of its dependencies get gomock mocks, and emits a table-driven test
//! skeleton plus, for methods, a mocker aggregate that builds the receiver.

pub mod classify;
pub mod config;
pub mod error;
pub mod frontend;
pub mod generate;
pub mod generator;
pub mod lookup;
pub mod naming;
pub mod types;

pub use classify::{Classifier, Exemption, MockRequirement, NoMockPolicy, Requirements};
pub use config::Config;
pub use error::{ConfigError, GenerateError, LoadError, LookupError};
pub use frontend::{GoEnv, GoLoader, MemoryLoader, PackageLoader, PackageProvider, SymbolTable};
pub use generate::{Artifact, ArtifactKind, GoRenderer, Hooks, LoggingRenderer, TestingLogger};
pub use generator::{Generator, GeneratorBuilder};
pub use lookup::{MockDescriptor, MockFramework, MockLookup, StandardMockLookup};
pub use naming::NameTemplate;
