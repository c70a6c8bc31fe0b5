//! go.mod directives and the Go toolchain environment

use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Where the sources of a required module live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleSource {
    /// Module cache entry
    Cache { path: String, version: String },
    /// Local replacement, relative to the main module root unless absolute
    Dir(PathBuf),
}

/// The parts of go.mod that matter for locating packages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoMod {
    pub module: Option<String>,
    /// Required modules with replacements applied
    pub requires: Vec<(String, ModuleSource)>,
}

impl GoMod {
    pub fn parse(content: &str) -> Self {
        let mut module = None;
        let mut requires = Vec::new();
        let mut replaces = Vec::new();
        let mut block: Option<&str> = None;

        for line in content.lines() {
            let line = strip_comment(line).trim();
            if line.is_empty() {
                continue;
            }

            let (verb, rest) = match block {
                Some(_) if line == ")" => {
                    block = None;
                    continue;
                }
                Some(verb) => (verb, line),
                None => {
                    let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
                    let rest = rest.trim();
                    if rest == "(" {
                        block = Some(verb);
                        continue;
                    }
                    (verb, rest)
                }
            };

            match verb {
                "module" => module = Some(unquote(rest).to_string()).filter(|m| !m.is_empty()),
                "require" => {
                    let mut fields = rest.split_whitespace();
                    if let (Some(path), Some(version)) = (fields.next(), fields.next()) {
                        requires.push((unquote(path).to_string(), version.to_string()));
                    }
                }
                "replace" => {
                    if let Some(replace) = parse_replace(rest) {
                        replaces.push(replace);
                    }
                }
                _ => {}
            }
        }

        let requires = requires
            .into_iter()
            .map(|(path, version)| {
                let source = replaces
                    .iter()
                    .find(|(old, _)| *old == path)
                    .map(|(_, source)| source.clone())
                    .unwrap_or_else(|| ModuleSource::Cache {
                        path: path.clone(),
                        version,
                    });
                (path, source)
            })
            .collect();

        Self { module, requires }
    }

    /// Required module providing `import_path`, with the package path inside it
    pub fn locate<'a>(&'a self, import_path: &'a str) -> Option<(&'a ModuleSource, &'a str)> {
        self.requires
            .iter()
            .filter_map(|(module, source)| {
                let rest = import_path.strip_prefix(module.as_str())?;
                match rest.strip_prefix('/') {
                    Some(rel) => Some((module.len(), source, rel)),
                    None if rest.is_empty() => Some((module.len(), source, "")),
                    None => None,
                }
            })
            .max_by_key(|(len, _, _)| *len)
            .map(|(_, source, rel)| (source, rel))
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(i) => &line[..i],
        None => line,
    }
}

fn unquote(s: &str) -> &str {
    s.trim().trim_matches('"')
}

/// `old [v] => new [v]`
fn parse_replace(rest: &str) -> Option<(String, ModuleSource)> {
    let (old, new) = rest.split_once("=>")?;
    let old = unquote(old.split_whitespace().next()?).to_string();
    let mut new = new.split_whitespace();
    let target = unquote(new.next()?);

    let source = match new.next() {
        None if target.starts_with("./") || target.starts_with("../") || Path::new(target).is_absolute() => {
            ModuleSource::Dir(PathBuf::from(target))
        }
        None => return None,
        Some(version) => ModuleSource::Cache {
            path: target.to_string(),
            version: version.to_string(),
        },
    };
    Some((old, source))
}

/// Module cache case encoding: `BurntSushi` -> `!burnt!sushi`
pub fn escape_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        if c.is_ascii_uppercase() {
            out.push('!');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Locations the Go toolchain reports
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct GoEnv {
    pub goroot: Option<PathBuf>,
    pub gomodcache: Option<PathBuf>,
}

impl GoEnv {
    /// Ask `go env`, falling back to environment variables when there is no toolchain
    pub fn detect() -> Self {
        let reported = which::which("go").ok().and_then(|go| {
            let output = Command::new(go)
                .args(["env", "-json", "GOROOT", "GOMODCACHE"])
                .output()
                .ok()?;
            if !output.status.success() {
                return None;
            }
            serde_json::from_slice::<GoEnv>(&output.stdout).ok()
        });

        let env = match reported {
            Some(env) => env,
            None => {
                debug!("go env is not available, using environment variables");
                Self::from_vars()
            }
        };
        env.without_empty()
    }

    fn from_vars() -> Self {
        let var = |name: &str| env::var_os(name).filter(|v| !v.is_empty()).map(PathBuf::from);
        let gopath = || {
            env::var_os("GOPATH")
                .and_then(|p| env::split_paths(&p).next())
                .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join("go")))
        };

        Self {
            goroot: var("GOROOT"),
            gomodcache: var("GOMODCACHE").or_else(|| gopath().map(|p| p.join("pkg").join("mod"))),
        }
    }

    fn without_empty(self) -> Self {
        let keep = |p: Option<PathBuf>| p.filter(|p| !p.as_os_str().is_empty());
        Self {
            goroot: keep(self.goroot),
            gomodcache: keep(self.gomodcache),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_module_directive() {
        assert_eq!(GoMod::parse("module example.com/x\n").module.as_deref(), Some("example.com/x"));
        assert_eq!(GoMod::parse("// c\nmodule \"q.io/y\"\n").module.as_deref(), Some("q.io/y"));
        assert_eq!(GoMod::parse("modules x\n").module, None);
    }

    #[test]
    fn test_requires_and_replaces() {
        let gomod = GoMod::parse(
            r#"module example.com/app

go 1.21

require example.org/dep v1.2.0

require (
	github.com/BurntSushi/toml v1.3.2 // indirect
	example.org/local v0.0.0
	example.org/fork v1.0.0
)

replace example.org/local => ../local

replace (
	example.org/fork v1.0.0 => github.com/me/fork v1.0.1
)
"#,
        );

        assert_eq!(gomod.module.as_deref(), Some("example.com/app"));
        assert_eq!(
            gomod.requires,
            vec![
                (
                    "example.org/dep".to_string(),
                    ModuleSource::Cache {
                        path: "example.org/dep".to_string(),
                        version: "v1.2.0".to_string()
                    }
                ),
                (
                    "github.com/BurntSushi/toml".to_string(),
                    ModuleSource::Cache {
                        path: "github.com/BurntSushi/toml".to_string(),
                        version: "v1.3.2".to_string()
                    }
                ),
                ("example.org/local".to_string(), ModuleSource::Dir(PathBuf::from("../local"))),
                (
                    "example.org/fork".to_string(),
                    ModuleSource::Cache {
                        path: "github.com/me/fork".to_string(),
                        version: "v1.0.1".to_string()
                    }
                ),
            ]
        );
    }

    #[test]
    fn test_locate_prefers_longest_module() {
        let gomod = GoMod::parse(
            "module example.com/app\n\nrequire (\n\texample.org/dep v1.0.0\n\texample.org/dep/sub v1.1.0\n)\n",
        );

        let (source, rel) = gomod.locate("example.org/dep/sub/pkg").unwrap();
        assert!(matches!(source, ModuleSource::Cache { version, .. } if version == "v1.1.0"));
        assert_eq!(rel, "pkg");

        let (_, rel) = gomod.locate("example.org/dep").unwrap();
        assert_eq!(rel, "");
        assert!(gomod.locate("example.org/depot").is_none());
    }

    #[test]
    fn test_escape_path() {
        assert_eq!(escape_path("github.com/BurntSushi/toml"), "github.com/!burnt!sushi/toml");
        assert_eq!(escape_path("v1.2.0"), "v1.2.0");
    }

    #[test]
    fn test_go_env_json() {
        let env: GoEnv = serde_json::from_str(r#"{"GOMODCACHE": "/go/pkg/mod", "GOROOT": ""}"#).unwrap();
        let env = env.without_empty();
        assert_eq!(env.gomodcache, Some(PathBuf::from("/go/pkg/mod")));
        assert_eq!(env.goroot, None);
    }
}
