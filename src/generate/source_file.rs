use super::output::GoRenderer;
use crate::error::LoadError;
use crate::frontend::{GoParser, outline};
use crate::types::Package;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone)]
struct Existing {
    content: String,
    /// Byte offset where a new import declaration goes
    import_end: usize,
}

/// Output file of the tested package, created from scratch or extending a file on disk
#[derive(Debug, Clone)]
pub struct SourceFile {
    path: PathBuf,
    package_name: String,
    existing: Option<Existing>,
    renderer: GoRenderer,
}

impl SourceFile {
    pub fn create(path: PathBuf, package: &Package) -> Self {
        let mut renderer = GoRenderer::new(package.path.clone());
        let root = renderer.scopes().root();
        for name in package.identifiers() {
            renderer.scopes().claim(root, name);
        }

        Self {
            path,
            package_name: package.name.clone(),
            existing: None,
            renderer,
        }
    }

    /// Extend an existing file: its imports and top-level names are taken into account
    pub fn open(path: PathBuf, package: &Package, content: String) -> Result<Self, LoadError> {
        let mut parser = GoParser::new()?;
        let outline = outline(&mut parser, &path, &content)?;
        if outline.package != package.name {
            warn!(
                "{} belongs to package {}, generated code refers to {} unqualified",
                path.display(),
                outline.package,
                package.name
            );
        }

        let mut file = Self::create(path, package);
        for (import_path, alias) in &outline.imports {
            file.renderer.seed_import(import_path, alias);
        }
        let root = file.renderer.scopes().root();
        for name in &outline.names {
            file.renderer.scopes().claim(root, name);
        }

        file.existing = Some(Existing {
            content,
            import_end: outline.import_end,
        });
        Ok(file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn renderer(&mut self) -> &mut GoRenderer {
        &mut self.renderer
    }

    /// Full file content
    pub fn render(&self) -> String {
        let body = self.renderer.body();
        let imports = self.renderer.imports().render_block();

        let Some(existing) = &self.existing else {
            let mut out = format!("package {}\n\n", self.package_name);
            if let Some(block) = imports {
                out.push_str(&block);
                out.push('\n');
            }
            out.push_str(&body);
            return out;
        };

        let (head, tail) = existing.content.split_at(existing.import_end);
        let mut out = head.to_string();
        if let Some(block) = imports {
            out.push_str("\n\n");
            out.push_str(block.trim_end());
        }
        out.push_str(tail);
        if !body.is_empty() {
            if !out.ends_with('\n') {
                out.push('\n');
            }
            out.push('\n');
            out.push_str(&body);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn package() -> Package {
        let mut pkg = Package {
            path: "example.com/calc".to_string(),
            name: "calc".to_string(),
            ..Package::default()
        };
        pkg.funcs.insert(
            "ctrl".to_string(),
            crate::types::FuncDecl {
                name: "ctrl".to_string(),
                position: Default::default(),
                signature: Default::default(),
            },
        );
        pkg
    }

    #[test]
    fn test_new_file() {
        let mut file = SourceFile::create(PathBuf::from("calc_test.go"), &package());
        let r = file.renderer();
        let testing = r.import("testing");
        r.line(format!("func TestX(t *{testing}.T) {{}}"));
        assert_eq!(r.reserve("ctrl", &[]), "ctrl2");

        assert_eq!(
            file.render(),
            "package calc\n\nimport (\n\t\"testing\"\n)\n\nfunc TestX(t *testing.T) {}\n"
        );
    }

    #[test]
    fn test_existing_file_is_extended() {
        let existing = "package calc\n\nimport \"testing\"\n\nfunc TestOld(t *testing.T) {}\n";
        let mut file =
            SourceFile::open(PathBuf::from("calc_test.go"), &package(), existing.to_string()).unwrap();
        let r = file.renderer();
        assert_eq!(r.import("testing"), "testing");
        let reflect = r.import("reflect");
        assert_eq!(r.reserve("TestOld", &[]), "TestOld2");
        r.line(format!("var _ = {reflect}.DeepEqual"));

        assert_eq!(
            file.render(),
            "package calc\n\nimport \"testing\"\n\nimport (\n\t\"reflect\"\n)\n\nfunc TestOld(t *testing.T) {}\n\nvar _ = reflect.DeepEqual\n"
        );
    }
}
