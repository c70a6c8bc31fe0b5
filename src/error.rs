use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Error while loading a package into the symbol table
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("package '{0}' not found in the current project")]
    PackageNotFound(String),
    #[error("no go.mod found in {0} or any parent directory")]
    NoModule(PathBuf),
    #[error("invalid go.mod at {0}: missing module directive")]
    InvalidModule(PathBuf),
    #[error("read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("load Go grammar: {0}")]
    Language(String),
    #[error("cannot resolve type {0}")]
    Unresolved(String),
}

impl LoadError {
    pub fn is_package_not_found(&self) -> bool {
        matches!(self, LoadError::PackageNotFound(_))
    }
}

/// Error returned by a mock lookup
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("mock was not found")]
    MockNotFound,
    #[error("no package was found")]
    NoPackages,
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Error in a configuration file or builder setting
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid mock name template '{template}': {message}")]
    Template { template: String, message: String },
}

/// Error during generation
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("function {0} not found")]
    FunctionNotFound(String),
    #[error("{0} is not a function")]
    NotAFunction(String),
    #[error("type {0} not found")]
    TypeNotFound(String),
    #[error("{0} is not a type")]
    NotAType(String),
    #[error("no method {method} found for the type {type_name}")]
    MethodNotFound { type_name: String, method: String },
    #[error("mocker file {path} is the test file")]
    MockerFileClash { path: PathBuf },
    #[error("format {path}: {message}")]
    Format { path: PathBuf, message: String },
    #[error("write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Stage breadcrumb: `<context>: <source>`
    #[error("{context}: {source}")]
    Context {
        context: String,
        source: Box<GenerateError>,
    },
}

impl GenerateError {
    /// Innermost error below all stage breadcrumbs
    pub fn root(&self) -> &GenerateError {
        match self {
            GenerateError::Context { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_mock_not_found(&self) -> bool {
        matches!(self.root(), GenerateError::Lookup(LookupError::MockNotFound))
    }
}

/// Wraps an error with the stage it happened in
pub trait Stage<T> {
    fn stage(self, context: impl Into<String>) -> Result<T, GenerateError>;
}

impl<T, E: Into<GenerateError>> Stage<T> for Result<T, E> {
    fn stage(self, context: impl Into<String>) -> Result<T, GenerateError> {
        self.map_err(|err| GenerateError::Context {
            context: context.into(),
            source: Box::new(err.into()),
        })
    }
}
