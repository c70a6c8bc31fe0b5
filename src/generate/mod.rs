//! Code emission: mocker aggregates and test tables

mod imports;
mod mocker;
mod output;
mod scope;
mod source_file;
mod table;

pub use imports::ImportRegistry;
pub use mocker::{MockerSpec, mocker_constructor, render_mocker};
pub use output::{GoRenderer, Output, quote};
pub use scope::{ScopeId, Scopes};
pub use source_file::SourceFile;
pub use table::{TableSpec, render_table};

use crate::naming::{private, underscored};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Renders the messages of the error branch of a test.
///
/// `t *testing.T` and `err error` are in scope when these run.
pub trait LoggingRenderer {
    /// An error happened and was expected
    fn expected_error(&self, r: &mut GoRenderer);
    /// An error happened and was not expected
    fn unexpected_error(&self, r: &mut GoRenderer);
    /// No error happened but one was expected
    fn error_was_expected(&self, r: &mut GoRenderer);
    /// The custom error check rejected the error, `errvar` holds its result
    fn invalid_error(&self, r: &mut GoRenderer, errvar: &str);
}

/// Plain `testing.T` logging
#[derive(Debug, Clone, Copy, Default)]
pub struct TestingLogger;

impl LoggingRenderer for TestingLogger {
    fn expected_error(&self, r: &mut GoRenderer) {
        r.line(r#"t.Log("expected error:", err)"#);
    }

    fn unexpected_error(&self, r: &mut GoRenderer) {
        r.line(r#"t.Error("unexpected error:", err)"#);
    }

    fn error_was_expected(&self, r: &mut GoRenderer) {
        r.line(r#"t.Error("error was expected")"#);
    }

    fn invalid_error(&self, r: &mut GoRenderer, errvar: &str) {
        r.line(format!(r#"t.Error("check error:", {errvar})"#));
    }
}

/// Code inserted at a fixed point of the test loop
pub type RenderHook = Box<dyn Fn(&mut GoRenderer)>;

/// Maps a type name to the mocker file name and mocker type name
pub type MockerNames = Box<dyn Fn(&str) -> (String, String)>;

/// Caller supplied parts of the emitted code
pub struct Hooks {
    pub logging: Box<dyn LoggingRenderer>,
    /// Runs right after the controller is created
    pub pre_test: RenderHook,
    /// Must define `ctx`. Runs only for callables that take a context.
    pub ctx_init: RenderHook,
    pub mocker_names: MockerNames,
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            logging: Box::new(TestingLogger),
            pre_test: Box::new(|_| {}),
            ctx_init: Box::new(background_context),
            mocker_names: Box::new(default_mocker_names),
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks").finish_non_exhaustive()
    }
}

/// `ctx := context.Background()`
pub fn background_context(r: &mut GoRenderer) {
    let context = r.import("context");
    r.line(format!("ctx := {context}.Background()"));
}

/// `service_mocker_test.go` and `serviceMocker` for `Service`
pub fn default_mocker_names(type_name: &str) -> (String, String) {
    (
        format!("{}.go", underscored(&[type_name, "mocker", "test"])),
        private(&[type_name, "mocker"]),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    MockerAggregate,
    TestTable,
}

/// File produced by a generation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
    /// Test function or mocker type name
    pub name: String,
}
