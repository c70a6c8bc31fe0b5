//! Generator facade
//!
//! Resolves the target callable, classifies its mock requirements and emits
//! the mocker aggregate and the test table. Output is kept pending until
//! [`Generator::write`], and a failed request leaves it untouched.

use crate::classify::{Classifier, Exemption, NoMockPolicy};
use crate::error::{GenerateError, LoadError, Stage};
use crate::frontend::{PackageLoader, PackageProvider, SymbolTable};
use crate::generate::{
    Artifact, ArtifactKind, GoRenderer, Hooks, LoggingRenderer, MockerSpec, SourceFile, TableSpec,
    render_mocker, render_table,
};
use crate::lookup::{MockFramework, MockLookup};
use crate::types::{CallableSignature, Package, Symbol};
use indexmap::IndexMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info, info_span};

/// Builds a [`Generator`]
pub struct GeneratorBuilder {
    loader: Box<dyn PackageLoader>,
    lookup: Box<dyn MockLookup>,
    policy: NoMockPolicy,
    hooks: Hooks,
    framework: MockFramework,
    format: bool,
    app_name: String,
}

impl GeneratorBuilder {
    pub fn logging(mut self, logging: impl LoggingRenderer + 'static) -> Self {
        self.hooks.logging = Box::new(logging);
        self
    }

    /// Code put right after the controller is created
    pub fn pre_test(mut self, hook: impl Fn(&mut GoRenderer) + 'static) -> Self {
        self.hooks.pre_test = Box::new(hook);
        self
    }

    /// Replaces `ctx := context.Background()`. The hook must define `ctx`.
    pub fn ctx_init(mut self, hook: impl Fn(&mut GoRenderer) + 'static) -> Self {
        self.hooks.ctx_init = Box::new(hook);
        self
    }

    /// Never mock `package.name`
    pub fn no_mock(mut self, package: impl Into<String>, name: impl Into<String>) -> Self {
        self.policy.exempt(Exemption::new(package, name));
        self
    }

    /// Mock `context.Context` like any other interface
    pub fn mock_context(mut self) -> Self {
        self.policy.allow_context();
        self
    }

    /// Map a type name to the mocker file name and mocker type name
    pub fn mocker_names(mut self, names: impl Fn(&str) -> (String, String) + 'static) -> Self {
        self.hooks.mocker_names = Box::new(names);
        self
    }

    pub fn framework(mut self, framework: MockFramework) -> Self {
        self.framework = framework;
        self
    }

    /// Run gofmt over the output when it is available
    pub fn format(mut self, format: bool) -> Self {
        self.format = format;
        self
    }

    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    pub fn build(self) -> Generator {
        Generator {
            symbols: SymbolTable::from_boxed(self.loader),
            lookup: self.lookup,
            policy: self.policy,
            hooks: self.hooks,
            framework: self.framework,
            format: self.format,
            app_name: self.app_name,
            pending: IndexMap::new(),
        }
    }
}

pub struct Generator {
    symbols: SymbolTable,
    lookup: Box<dyn MockLookup>,
    policy: NoMockPolicy,
    hooks: Hooks,
    framework: MockFramework,
    format: bool,
    app_name: String,
    pending: IndexMap<PathBuf, SourceFile>,
}

impl Generator {
    pub fn builder(loader: impl PackageLoader + 'static, lookup: impl MockLookup + 'static) -> GeneratorBuilder {
        GeneratorBuilder {
            loader: Box::new(loader),
            lookup: Box::new(lookup),
            policy: NoMockPolicy::default(),
            hooks: Hooks::default(),
            framework: MockFramework::default(),
            format: true,
            app_name: env!("CARGO_PKG_NAME").to_string(),
        }
    }

    /// Table test for a package level function
    pub fn generate_for_function(&mut self, pkg: &str, name: &str) -> Result<Vec<Artifact>, GenerateError> {
        let span = info_span!("generate", app = %self.app_name, target = %name);
        let _enter = span.enter();

        let package = self.load(pkg)?;
        let sig = match package.lookup(name) {
            None => return Err(GenerateError::FunctionNotFound(name.to_string())),
            Some(Symbol::Type(_)) => return Err(GenerateError::NotAFunction(name.to_string())),
            Some(Symbol::Func(decl)) => CallableSignature::from_func(decl),
        };

        self.generate(&package, sig)
    }

    /// Table test, and a mocker if needed, for a method of a type
    pub fn generate_for_method(
        &mut self,
        pkg: &str,
        type_name: &str,
        method: &str,
    ) -> Result<Vec<Artifact>, GenerateError> {
        let target = format!("{type_name}.{method}");
        let span = info_span!("generate", app = %self.app_name, target = %target);
        let _enter = span.enter();

        let package = self.load(pkg)?;
        let decl = match package.lookup(type_name) {
            None => return Err(GenerateError::TypeNotFound(type_name.to_string())),
            Some(Symbol::Func(_)) => return Err(GenerateError::NotAType(type_name.to_string())),
            Some(Symbol::Type(decl)) => decl,
        };
        let method_decl = decl.method(method).ok_or_else(|| GenerateError::MethodNotFound {
            type_name: type_name.to_string(),
            method: method.to_string(),
        })?;
        let sig = CallableSignature::from_method(&package.path, decl, method_decl);

        self.generate(&package, sig)
    }

    /// Pending files with their full content
    pub fn render(&self) -> Vec<(PathBuf, String)> {
        self.pending
            .iter()
            .map(|(path, file)| (path.clone(), file.render()))
            .collect()
    }

    /// Format and write the pending files
    ///
    /// Every file is staged next to its target first, so a failure before the
    /// renames leaves all targets untouched and the files pending.
    pub fn write(&mut self) -> Result<Vec<PathBuf>, GenerateError> {
        let gofmt = if self.format {
            match which::which("gofmt") {
                Ok(path) => Some(path),
                Err(_) => {
                    debug!("gofmt not found, output is left unformatted");
                    None
                }
            }
        } else {
            None
        };

        let mut staged = Vec::with_capacity(self.pending.len());
        for (path, content) in self.render() {
            let content = match &gofmt {
                Some(gofmt) => format_source(gofmt, &path, content)?,
                None => content,
            };
            let temp = stage_file(&path, &content).map_err(|source| GenerateError::Write {
                path: path.clone(),
                source,
            })?;
            staged.push((path, temp));
        }

        let mut written = Vec::with_capacity(staged.len());
        for (path, temp) in staged {
            temp.persist(&path).map_err(|e| GenerateError::Write {
                path: path.clone(),
                source: e.error,
            })?;
            info!("written {}", path.display());
            written.push(path);
        }
        self.pending.clear();
        Ok(written)
    }

    fn load(&mut self, pkg: &str) -> Result<Arc<Package>, GenerateError> {
        let path = self.symbols.resolve(pkg).stage("init generator")?;
        self.symbols.package(&path).stage(format!("load package {path}"))
    }

    fn generate(&mut self, package: &Package, sig: CallableSignature) -> Result<Vec<Artifact>, GenerateError> {
        let reqs = Classifier::new(&self.policy, self.lookup.as_ref())
            .classify(&mut self.symbols, &sig)
            .stage("generate source code")?;

        let mut staged = IndexMap::new();
        let mut artifacts = Vec::new();

        let test_path = test_file_path(package, &sig.position.file);

        let mut mocker_type = None;
        if let (Some(recv), false) = (&sig.receiver, reqs.type_level.is_empty()) {
            let (file_name, type_name) = (self.hooks.mocker_names)(&recv.named.name);
            let file_name = format!("{}.go", file_name.trim_end_matches(".go"));
            let path = package_dir(package, &sig.position.file).join(file_name);

            if path == test_path {
                return Err(GenerateError::MockerFileClash { path });
            }
            if path.exists() || self.pending.contains_key(&path) {
                debug!("mocker file {} exists, leaving it untouched", path.display());
            } else {
                let mut file = SourceFile::create(path.clone(), package);
                render_mocker(
                    file.renderer(),
                    &MockerSpec {
                        type_name: &recv.named.name,
                        mocker_type: &type_name,
                        requirements: &reqs.type_level,
                        framework: &self.framework,
                    },
                );
                staged.insert(path.clone(), file);
                artifacts.push(Artifact {
                    kind: ArtifactKind::MockerAggregate,
                    path,
                    name: type_name.clone(),
                });
            }
            mocker_type = Some(type_name);
        }

        let path = test_path;
        let mut file = match self.pending.get(&path) {
            Some(file) => file.clone(),
            None if path.exists() => {
                let content = fs::read_to_string(&path)
                    .map_err(|source| LoadError::Io {
                        path: path.clone(),
                        source,
                    })
                    .stage("prepare test file")?;
                SourceFile::open(path.clone(), package, content).stage("prepare test file")?
            }
            None => SourceFile::create(path.clone(), package),
        };

        let name = render_table(
            file.renderer(),
            &TableSpec {
                sig: &sig,
                requirements: &reqs,
                mocker: mocker_type.as_deref(),
                hooks: &self.hooks,
                framework: &self.framework,
            },
        );
        staged.insert(path.clone(), file);
        artifacts.push(Artifact {
            kind: ArtifactKind::TestTable,
            path,
            name,
        });

        self.pending.extend(staged);
        Ok(artifacts)
    }
}

fn package_dir(package: &Package, declaring_file: &Path) -> PathBuf {
    match declaring_file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => package.dir.clone(),
    }
}

/// `service.go` -> `service_test.go` next to it
fn test_file_path(package: &Package, declaring_file: &Path) -> PathBuf {
    let stem = declaring_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| package.name.clone());
    package_dir(package, declaring_file).join(format!("{stem}_test.go"))
}

/// Temp file in the target's directory holding `content`, with the target's permissions
fn stage_file(path: &Path, content: &str) -> io::Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(content.as_bytes())?;
    temp.as_file().sync_all()?;

    let permissions = match fs::metadata(path) {
        Ok(meta) => meta.permissions(),
        Err(_) => new_file_permissions(temp.as_file())?,
    };
    temp.as_file().set_permissions(permissions)?;
    Ok(temp)
}

#[cfg(unix)]
fn new_file_permissions(_: &fs::File) -> io::Result<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Ok(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn new_file_permissions(file: &fs::File) -> io::Result<fs::Permissions> {
    Ok(file.metadata()?.permissions())
}

fn format_source(gofmt: &Path, path: &Path, content: String) -> Result<String, GenerateError> {
    let format_error = |message: String| GenerateError::Format {
        path: path.to_path_buf(),
        message,
    };

    let mut child = Command::new(gofmt)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format_error(e.to_string()))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(content.as_bytes())
            .map_err(|e| format_error(e.to_string()))?;
    }

    let output = child.wait_with_output().map_err(|e| format_error(e.to_string()))?;
    if !output.status.success() {
        return Err(format_error(String::from_utf8_lossy(&output.stderr).trim().to_string()));
    }
    String::from_utf8(output.stdout).map_err(|e| format_error(e.to_string()))
}
