use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tracing_test::traced_test;
use ttgen::{Config, GoEnv, GoLoader};

const DIVIDE: &str = r#"package calc

import "errors"

// Divide divides a by b.
func Divide(a, b int) (int, error) {
	if b == 0 {
		return 0, errors.New("division by zero")
	}
	return a / b, nil
}
"#;

const SHAPES: &str = r#"package calc

type Shape struct {
	Base
	Width int
}

type Base struct{}

func (s *Shape) Area() int { return s.Width * s.Width }
"#;

fn module() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("go.mod"), "module example.com/calc\n\ngo 1.21\n").unwrap();
    fs::write(dir.path().join("calc.go"), DIVIDE).unwrap();
    fs::write(dir.path().join("shapes.go"), SHAPES).unwrap();
    dir
}

fn generator(root: &Path) -> ttgen::Generator {
    let config: Config = toml::from_str("[output]\nformat = false\n").unwrap();
    config.into_builder(GoLoader::discover(root).unwrap()).unwrap().build()
}

#[test]
fn test_writes_new_test_file() {
    let dir = module();
    let mut g = generator(dir.path());

    g.generate_for_function(".", "Divide").unwrap();
    let written = g.write().unwrap();
    assert_eq!(written, vec![dir.path().canonicalize().unwrap().join("calc_test.go")]);
    assert!(g.render().is_empty());

    let content = fs::read_to_string(&written[0]).unwrap();
    println!("Output:\n{}", content);
    assert!(content.starts_with("package calc\n\nimport (\n\t\"testing\"\n\t\"reflect\"\n)\n\nfunc TestDivide(t *testing.T) {\n"));
    assert!(content.contains("got1, err := Divide(tt.aArg, tt.bArg)"));
}

#[test]
fn test_extends_existing_test_file() {
    let dir = module();
    let existing = "package calc\n\nimport \"testing\"\n\nfunc TestDivide(t *testing.T) {}\n";
    fs::write(dir.path().join("calc_test.go"), existing).unwrap();

    let mut g = generator(dir.path());
    let artifacts = g.generate_for_function(".", "Divide").unwrap();
    assert_eq!(artifacts[0].name, "TestDivide2");
    g.write().unwrap();

    let content = fs::read_to_string(dir.path().join("calc_test.go")).unwrap();
    println!("Output:\n{}", content);
    assert!(content.starts_with("package calc\n\nimport \"testing\"\n\nimport (\n\t\"reflect\"\n)\n\nfunc TestDivide(t *testing.T) {}\n"));
    assert!(content.contains("\nfunc TestDivide2(t *testing.T) {\n"));
    assert_eq!(content.matches("\"testing\"").count(), 1);
}

#[test]
#[traced_test]
fn test_embedded_fields_are_skipped() {
    let dir = module();
    let mut g = generator(dir.path());

    let artifacts = g.generate_for_method(".", "Shape", "Area").unwrap();
    assert_eq!(artifacts.len(), 1);
    assert!(logs_contain("embedded fields are not supported"));

    let files = g.render();
    assert!(files[0].0.ends_with("shapes_test.go"));
    assert!(files[0].1.contains("var x *Shape // Must be initialized by hand."));
}

#[test]
fn test_failed_write_leaves_every_file_untouched() {
    let dir = module();
    fs::create_dir_all(dir.path().join("sub")).unwrap();
    fs::write(
        dir.path().join("sub/twice.go"),
        "package sub\n\nfunc Twice(n int) int { return n * 2 }\n",
    )
    .unwrap();

    let mut g = generator(dir.path());
    g.generate_for_function(".", "Divide").unwrap();
    g.generate_for_function("./sub", "Twice").unwrap();
    fs::remove_dir_all(dir.path().join("sub")).unwrap();

    let err = g.write().unwrap_err();
    println!("Error: {}", err);
    assert!(matches!(err, ttgen::GenerateError::Write { ref path, .. } if path.ends_with("sub/twice_test.go")));
    assert!(!dir.path().join("calc_test.go").exists());
    assert_eq!(g.render().len(), 2);

    let leftovers: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[cfg(unix)]
#[test]
fn test_written_file_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let dir = module();
    let mut g = generator(dir.path());
    g.generate_for_function(".", "Divide").unwrap();
    let written = g.write().unwrap();
    let mode = fs::metadata(&written[0]).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o644);

    fs::set_permissions(&written[0], fs::Permissions::from_mode(0o600)).unwrap();
    g.generate_for_function(".", "Divide").unwrap();
    g.write().unwrap();
    let mode = fs::metadata(&written[0]).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

const CLIENT: &str = r#"package client

type Client interface {
	Do(req string) error
}
"#;

const MOCK_CLIENT: &str = r#"package mocks

import "github.com/golang/mock/gomock"

type MockClient struct{}

func NewMockClient(ctrl *gomock.Controller) *MockClient { return &MockClient{} }

func (m *MockClient) Do(req string) error { return nil }
"#;

const USE: &str = r#"package app

import "github.com/Acme/dep/client"

func Use(c client.Client) error { return c.Do("ping") }
"#;

#[test]
fn test_mocks_for_interfaces_of_required_modules() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("go.mod"),
        "module example.com/app\n\ngo 1.21\n\nrequire github.com/Acme/dep v1.4.0\n",
    )
    .unwrap();
    fs::write(dir.path().join("use.go"), USE).unwrap();
    fs::write(
        dir.path().join(ttgen::config::FILE_NAME),
        "[mocks]\nfallback = [\"internal/mocks\"]\n\n[output]\nformat = false\n",
    )
    .unwrap();
    fs::create_dir_all(dir.path().join("internal/mocks")).unwrap();
    fs::write(dir.path().join("internal/mocks/client.go"), MOCK_CLIENT).unwrap();

    let cache = tempfile::tempdir().unwrap();
    let client = cache.path().join("github.com/!acme/dep@v1.4.0/client");
    fs::create_dir_all(&client).unwrap();
    fs::write(client.join("client.go"), CLIENT).unwrap();

    let loader = GoLoader::discover(dir.path()).unwrap().with_go_env(GoEnv {
        goroot: None,
        gomodcache: Some(cache.path().to_path_buf()),
    });
    let (config, _) = Config::discover(dir.path()).unwrap();
    let mut g = config.into_builder(loader).unwrap().build();

    g.generate_for_function(".", "Use").unwrap();
    let files = g.render();
    println!("Output:\n{}", files[0].1);
    assert!(files[0].1.contains("type argMocks struct {\n\t\tc *mocks.MockClient\n\t}"));
    assert!(files[0].1.contains("c: mocks.NewMockClient(ctrl),"));
    assert!(files[0].1.contains("err := Use(amocks.c)"));
}

