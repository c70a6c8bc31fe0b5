//! `ttgen.toml` configuration

use crate::classify::Exemption;
use crate::error::ConfigError;
use crate::frontend::PackageLoader;
use crate::generator::{Generator, GeneratorBuilder};
use crate::lookup::{MockFramework, StandardMockLookup};
use crate::naming::NameTemplate;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const FILE_NAME: &str = "ttgen.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub mocks: MocksConfig,
    pub framework: MockFramework,
    pub no_mock: NoMockConfig,
    pub output: OutputConfig,
}

/// Where mocks are searched and how they are named
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MocksConfig {
    /// Packages searched after the interface's own package
    pub fallback: Vec<String>,
    /// Mock name template, `${type}Mock` style. Defaults to mockgen naming.
    pub template: Option<String>,
    /// `path/to/pkg.Interface` -> mock type name
    pub overrides: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NoMockConfig {
    /// Mock `context.Context` instead of binding a `ctx` variable
    pub mock_context: bool,
    pub exempt: Vec<Exemption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Run gofmt over generated files
    pub format: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { format: true }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `ttgen.toml` in `dir` if there is one, defaults otherwise
    pub fn discover(dir: &Path) -> Result<(Self, Option<PathBuf>), ConfigError> {
        let path = dir.join(FILE_NAME);
        if !path.is_file() {
            debug!("no {} in {}, using defaults", FILE_NAME, dir.display());
            return Ok((Self::default(), None));
        }
        let config = Self::load(&path)?;
        debug!("loaded {}", path.display());
        Ok((config, Some(path)))
    }

    pub fn mock_lookup(&self) -> Result<StandardMockLookup, ConfigError> {
        let template = match &self.mocks.template {
            Some(template) => NameTemplate::parse(template)?,
            None => NameTemplate::mockgen(),
        };

        let mut lookup =
            StandardMockLookup::new(self.mocks.fallback.clone(), template).with_framework(self.framework.clone());
        for (iface, mock) in &self.mocks.overrides {
            lookup = lookup.with_override(iface, mock);
        }
        Ok(lookup)
    }

    /// Generator builder with everything this config sets
    pub fn into_builder(self, loader: impl PackageLoader + 'static) -> Result<GeneratorBuilder, ConfigError> {
        let lookup = self.mock_lookup()?;
        let mut builder = Generator::builder(loader, lookup)
            .framework(self.framework)
            .format(self.output.format);
        if self.no_mock.mock_context {
            builder = builder.mock_context();
        }
        for exemption in self.no_mock.exempt {
            builder = builder.no_mock(exemption.package, exemption.name);
        }
        Ok(builder)
    }
}
