use super::gomod::{GoEnv, GoMod, ModuleSource, escape_path};
use super::{PackageLoader, parse_package};
use crate::error::LoadError;
use crate::types::Package;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Loads packages of a Go module from disk
#[derive(Debug, Clone)]
pub struct GoLoader {
    root: PathBuf,
    module: String,
    cwd: PathBuf,
    gomod: GoMod,
    env: GoEnv,
}

impl GoLoader {
    /// Find the module containing `start_dir` by walking up to its go.mod
    pub fn discover(start_dir: &Path) -> Result<Self, LoadError> {
        let start = start_dir.canonicalize().map_err(|source| LoadError::Io {
            path: start_dir.to_path_buf(),
            source,
        })?;

        let mut dir = Some(start.as_path());
        while let Some(current) = dir {
            let path = current.join("go.mod");
            if path.is_file() {
                let content = fs::read_to_string(&path).map_err(|source| LoadError::Io {
                    path: path.clone(),
                    source,
                })?;
                let gomod = GoMod::parse(&content);
                let module = gomod.module.clone().ok_or(LoadError::InvalidModule(path))?;
                debug!("module {module} at {}, {} requirements", current.display(), gomod.requires.len());
                return Ok(Self {
                    root: current.to_path_buf(),
                    module,
                    cwd: start.clone(),
                    gomod,
                    env: GoEnv::detect(),
                });
            }
            dir = current.parent();
        }

        Err(LoadError::NoModule(start))
    }

    /// Use these toolchain locations instead of the detected ones
    pub fn with_go_env(mut self, env: GoEnv) -> Self {
        self.env = env;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir_for(&self, path: &str) -> Option<PathBuf> {
        if path == self.module {
            return Some(self.root.clone());
        }
        if let Some(rel) = path.strip_prefix(&self.module).and_then(|r| r.strip_prefix('/')) {
            return Some(self.root.join(rel));
        }

        let vendored = self.root.join("vendor").join(path);
        if vendored.is_dir() {
            return Some(vendored);
        }

        if let Some((source, rel)) = self.gomod.locate(path) {
            let module_dir = match source {
                ModuleSource::Dir(dir) => Some(self.root.join(dir)),
                ModuleSource::Cache { path, version } => self
                    .env
                    .gomodcache
                    .as_ref()
                    .map(|cache| cache.join(format!("{}@{}", escape_path(path), escape_path(version)))),
            };
            match module_dir {
                Some(dir) => return Some(dir.join(rel)),
                None => debug!("no module cache to look for {path} in"),
            }
        }

        self.env
            .goroot
            .as_ref()
            .map(|goroot| goroot.join("src").join(path))
            .filter(|dir| dir.is_dir())
    }
}

fn is_ignored(source: &str) -> bool {
    source
        .lines()
        .take_while(|l| !l.trim_start().starts_with("package"))
        .any(|l| l.trim() == "//go:build ignore")
}

impl PackageLoader for GoLoader {
    fn resolve(&self, spec: &str) -> Result<String, LoadError> {
        if spec != "." && !spec.starts_with("./") && !spec.starts_with("../") {
            return Ok(spec.to_string());
        }

        let dir = self.cwd.join(spec);
        let dir = dir.canonicalize().map_err(|source| LoadError::Io { path: dir, source })?;
        let rel = dir
            .strip_prefix(&self.root)
            .map_err(|_| LoadError::PackageNotFound(spec.to_string()))?;

        let rel = rel.to_string_lossy().replace('\\', "/");
        Ok(if rel.is_empty() {
            self.module.clone()
        } else {
            format!("{}/{}", self.module, rel)
        })
    }

    fn load(&mut self, path: &str) -> Result<Package, LoadError> {
        let dir = self
            .dir_for(path)
            .filter(|d| d.is_dir())
            .ok_or_else(|| LoadError::PackageNotFound(path.to_string()))?;

        let mut files = Vec::new();
        for entry in WalkDir::new(&dir)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let file = entry.path();
            let name = entry.file_name().to_string_lossy();
            if !entry.file_type().is_file() || !name.ends_with(".go") || name.ends_with("_test.go") {
                continue;
            }
            let source = fs::read_to_string(file).map_err(|source| LoadError::Io {
                path: file.to_path_buf(),
                source,
            })?;
            if is_ignored(&source) {
                trace!("skip ignored file {}", file.display());
                continue;
            }
            files.push((file.to_path_buf(), source));
        }

        if files.is_empty() {
            return Err(LoadError::PackageNotFound(path.to_string()));
        }
        parse_package(path, &dir, &files)
    }

    fn module_path(&self) -> Option<&str> {
        Some(&self.module)
    }
}

/// In-memory package sources, keyed by import path
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    module: Option<String>,
    packages: HashMap<String, Vec<(PathBuf, String)>>,
}

impl MemoryLoader {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: Some(module.into()),
            packages: HashMap::new(),
        }
    }

    /// Register a package. File names are placed under a directory named after the import path.
    pub fn with_package(mut self, path: &str, files: &[(&str, &str)]) -> Self {
        let files = files
            .iter()
            .map(|(name, src)| (Path::new(path).join(name), src.to_string()))
            .collect();
        self.packages.insert(path.to_string(), files);
        self
    }
}

impl PackageLoader for MemoryLoader {
    fn resolve(&self, spec: &str) -> Result<String, LoadError> {
        let module = self.module.as_deref().unwrap_or_default();
        Ok(match spec {
            "." => module.to_string(),
            _ => match spec.strip_prefix("./") {
                Some(rel) => format!("{module}/{rel}"),
                None => spec.to_string(),
            },
        })
    }

    fn load(&mut self, path: &str) -> Result<Package, LoadError> {
        let files = self
            .packages
            .get(path)
            .ok_or_else(|| LoadError::PackageNotFound(path.to_string()))?;
        parse_package(path, Path::new(path), files)
    }

    fn module_path(&self) -> Option<&str> {
        self.module.as_deref()
    }
}
