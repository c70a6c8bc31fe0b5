use super::Hooks;
use super::mocker::mocker_constructor;
use super::output::{GoRenderer, quote};
use crate::classify::Requirements;
use crate::lookup::MockFramework;
use crate::naming::private;
use crate::types::{CallableSignature, is_context};
use tracing::{debug, warn};

/// Test table for one callable
pub struct TableSpec<'a> {
    pub sig: &'a CallableSignature,
    pub requirements: &'a Requirements,
    /// Mocker type of the receiver, if its fields have mocks
    pub mocker: Option<&'a str>,
    pub hooks: &'a Hooks,
    pub framework: &'a MockFramework,
}

/// What a parameter is bound to in the call
enum Binding {
    Context,
    /// Field of the parameter mocks aggregate
    Mock(String),
    /// Field of the row
    Row(String),
}

/// Expected result field
struct Want {
    index: usize,
    field: String,
}

/// Render the test function and return its name
pub fn render_table(r: &mut GoRenderer, spec: &TableSpec) -> String {
    let sig = spec.sig;
    let reqs = spec.requirements;
    let has_mocks = !reqs.is_empty();

    let testing = r.import("testing");
    let name = match &sig.receiver {
        Some(recv) => r.reserve("Test", &[&recv.named.name, &sig.name]),
        None => r.reserve("Test", &[&sig.name]),
    };

    if !r.is_empty() {
        r.blank();
    }
    r.open(format!("func {name}(t *{testing}.T) {{"));
    let outer = r.enter();

    let gomock = has_mocks.then(|| r.import(&spec.framework.package));

    // Parameter mocks aggregate
    let arg_mocks = if reqs.params.is_empty() {
        None
    } else {
        let type_name = r.reserve("argMocks", &[]);
        let fields = r.scopes().detached();
        let mut lines = Vec::new();
        let mut names = Vec::new();
        for req in &reqs.params {
            // Import first so the alias is not pushed aside by the field name
            let mock = r.qualify(&req.mock.mock);
            let field = r.reserve_in(fields, &req.name, &[]);
            lines.push(format!("{field} *{mock}"));
            names.push(field);
        }

        r.open(format!("type {type_name} struct {{"));
        for line in lines {
            r.line(line);
        }
        r.close("}");
        r.blank();
        Some((type_name, names))
    };

    // Row type
    let fields = r.scopes().detached();
    r.reserve_in(fields, "name", &[]);
    r.reserve_in(fields, "setup", &[]);

    let mut row = vec!["name string".to_string()];
    if let Some(gomock) = &gomock {
        let setup = r.scopes().detached();
        let ctrl = r.reserve_in(setup, "ctrl", &[]);
        let row_param = r.reserve_in(setup, "row", &[]);
        let mut params = vec![
            format!("{ctrl} *{gomock}.{}", spec.framework.controller),
            format!("{row_param} *test"),
        ];
        if let Some(mocker) = spec.mocker {
            let m = r.reserve_in(setup, "m", &[]);
            params.push(format!("{m} *{mocker}"));
        }
        if let Some((type_name, _)) = &arg_mocks {
            let amocks = r.reserve_in(setup, "amocks", &[]);
            params.push(format!("{amocks} *{type_name}"));
        }
        if let Some(recv) = &sig.receiver {
            let ty = r.qualify(&recv.named);
            let param = r.reserve_in(setup, &private(&[&recv.named.name]), &[]);
            params.push(format!("{param} *{ty}"));
        }
        row.push(format!("setup func({})", params.join(", ")));
    }

    let mut bindings = Vec::with_capacity(sig.params.len());
    let mut arg_lines = Vec::new();
    for (i, param) in sig.params.iter().enumerate() {
        let key = sig.param_key(i);
        let mocked = reqs.params.iter().position(|req| req.name == key);
        if let (Some(pos), Some((_, names))) = (mocked, &arg_mocks) {
            bindings.push(Binding::Mock(names[pos].clone()));
            continue;
        }
        if is_context(&param.ty) {
            bindings.push(Binding::Context);
            continue;
        }

        let ty = r.type_name(&param.ty);
        let field = r.reserve_in(fields, &key, &["arg"]);
        arg_lines.push(format!("{field} {ty}"));
        bindings.push(Binding::Row(field));
    }

    let errored = sig.is_errored();
    let last_result = sig.results.len().saturating_sub(1);
    let error_fields = errored.then(|| {
        (
            r.reserve_in(fields, "wantErr", &[]),
            r.reserve_in(fields, "errCheck", &[]),
        )
    });

    let mut wants = Vec::new();
    let mut result_lines = Vec::new();
    for (i, result) in sig.results.iter().enumerate() {
        if let (Some((want_err, err_check)), true) = (&error_fields, i == last_result) {
            result_lines.push(format!("{want_err} bool"));
            result_lines.push(format!("{err_check} func(err error) error"));
            continue;
        }

        let ty = r.type_name(&result.ty);
        let field = if result.is_anonymous() {
            r.reserve_in(fields, "want", &[&(i + 1).to_string()])
        } else {
            r.reserve_in(fields, "want", &[&result.name])
        };
        result_lines.push(format!("{field} {ty}"));
        wants.push(Want { index: i, field });
    }

    r.open("type test struct {");
    for line in row {
        r.line(line);
    }
    for group in [arg_lines, result_lines] {
        if group.is_empty() {
            continue;
        }
        r.blank();
        for line in group {
            r.line(line);
        }
    }
    r.close("}");
    r.blank();

    // Driving loop
    r.line("tests := []test{}");
    r.open("for _, tt := range tests {");
    r.line("tt := tt");
    r.open(format!("t.Run(tt.name, func(t *{testing}.T) {{"));
    r.enter();

    let ctrl = gomock.as_ref().map(|gomock| {
        let ctrl = r.reserve("ctrl", &[]);
        r.line(format!("{ctrl} := {gomock}.NewController(t)"));
        ctrl
    });
    (spec.hooks.pre_test)(&mut *r);
    if bindings.iter().any(|b| matches!(b, Binding::Context)) {
        claim_fixed(r, "ctx");
        (spec.hooks.ctx_init)(&mut *r);
    }

    let mut mocker_var = None;
    let receiver_var = match &sig.receiver {
        None => None,
        Some(recv) => match (spec.mocker, &ctrl) {
            (Some(mocker), Some(ctrl)) => {
                let m = r.reserve("m", &[]);
                let x = r.reserve("x", &[]);
                r.line(format!("{m} := {}({ctrl})", mocker_constructor(mocker)));
                r.line(format!("{x} := {m}.{}()", recv.named.name));
                mocker_var = Some(m);
                Some(x)
            }
            _ => {
                let ty = r.qualify(&recv.named);
                let x = r.reserve("x", &[]);
                r.line(format!("var {x} *{ty} // Must be initialized by hand."));
                Some(x)
            }
        },
    };

    let amocks_var = match (&arg_mocks, &ctrl) {
        (Some((type_name, names)), Some(ctrl)) => {
            let amocks = r.reserve("amocks", &[]);
            r.open(format!("{amocks} := {type_name}{{"));
            for (field, req) in names.iter().zip(&reqs.params) {
                let constructor = r.qualify(&req.mock.constructor);
                r.line(format!("{field}: {constructor}({ctrl}),"));
            }
            r.close("}");
            Some(amocks)
        }
        _ => None,
    };

    if let Some(ctrl) = &ctrl {
        let mut args = vec![ctrl.clone(), "&tt".to_string()];
        args.extend(mocker_var.iter().cloned());
        args.extend(amocks_var.iter().map(|a| format!("&{a}")));
        args.extend(receiver_var.iter().cloned());
        r.line(format!("tt.setup({})", args.join(", ")));
    }

    // Call
    let last_param = sig.params.len().saturating_sub(1);
    let args: Vec<String> = bindings
        .iter()
        .enumerate()
        .map(|(i, binding)| {
            // Every context parameter shares the one ctx
            let mut arg = match binding {
                Binding::Context => "ctx".to_string(),
                Binding::Mock(field) => format!("{}.{field}", amocks_var.as_deref().unwrap_or("amocks")),
                Binding::Row(field) => format!("tt.{field}"),
            };
            if sig.variadic && i == last_param {
                arg.push_str("...");
            }
            arg
        })
        .collect();
    let callee = match &receiver_var {
        Some(x) => format!("{x}.{}", sig.name),
        None => sig.name.clone(),
    };
    let call = format!("{callee}({})", args.join(", "));

    if sig.results.is_empty() {
        r.line(call);
    } else {
        let mut lhs = Vec::new();
        let mut gots = Vec::new();
        for want in &wants {
            let suffix = want.field.strip_prefix("want").unwrap_or(&want.field);
            let got = r.reserve("got", &[suffix]);
            lhs.push(got.clone());
            gots.push(got);
        }
        if errored {
            claim_fixed(r, "err");
            lhs.push("err".to_string());
        }
        r.line(format!("{} := {call}", lhs.join(", ")));

        if let Some((want_err, err_check)) = &error_fields {
            render_error_branch(r, spec.hooks, want_err, err_check);
        }

        for (want, got) in wants.iter().zip(&gots) {
            let result = &sig.results[want.index];
            let label = if result.is_anonymous() {
                let ty = r.type_name(&result.ty);
                format!("the return value index {} ({ty})", want.index)
            } else {
                format!("the return value for {}", result.name)
            };
            let reflect = r.import("reflect");
            let field = &want.field;

            if errored {
                r.blank();
            }
            r.open(format!("if !{reflect}.DeepEqual(tt.{field}, {got}) {{"));
            let message = quote(&format!("{label} mismatch:\nwant: %#v\ngot:  %#v"));
            r.line(format!("t.Errorf({message}, tt.{field}, {got})"));
            r.close("}");
        }
    }

    r.close("})");
    r.close("}");
    r.close("}");
    r.set_scope(outer);
    name
}

/// Exactly one logging hook runs per error outcome
fn render_error_branch(r: &mut GoRenderer, hooks: &Hooks, want_err: &str, err_check: &str) {
    r.line("switch {");
    r.open(format!("case err != nil && (tt.{want_err} || tt.{err_check} != nil):"));
    r.open(format!("if tt.{err_check} != nil {{"));
    let cerr = r.reserve("cerr", &[]);
    r.open(format!("if {cerr} := tt.{err_check}(err); {cerr} != nil {{"));
    hooks.logging.invalid_error(r, &cerr);
    r.line("return");
    r.close("}");
    r.close("}");
    hooks.logging.expected_error(r);
    r.line("return");
    r.dedent();

    r.open(format!("case err != nil && !tt.{want_err}:"));
    hooks.logging.unexpected_error(r);
    r.line("return");
    r.dedent();

    r.open(format!("case err == nil && tt.{want_err}:"));
    hooks.logging.error_was_expected(r);
    r.line("return");
    r.dedent();

    r.line(format!("case err == nil && !tt.{want_err}:"));
    r.line("}");
}

/// Claim a name the generated test body declares verbatim
fn claim_fixed(r: &mut GoRenderer, name: &str) {
    let scope = r.scope();
    if r.scopes().is_local(scope, name) {
        warn!("{name} is already declared in the test body");
    } else if !r.claim(name) {
        debug!("{name} shadows an outer declaration");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::MockRequirement;
    use crate::lookup::MockDescriptor;
    use crate::types::{NamedRef, TypeShape, UNIVERSE, Var};
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    fn int() -> TypeShape {
        TypeShape::Basic("int".to_string())
    }

    fn divide() -> CallableSignature {
        CallableSignature {
            name: "Divide".to_string(),
            position: Default::default(),
            receiver: None,
            params: vec![Var::new("a", int()), Var::new("b", int())],
            results: vec![Var::new("", int()), Var::new("", TypeShape::named(UNIVERSE, "error"))],
            variadic: false,
        }
    }

    fn render(sig: &CallableSignature, reqs: &Requirements, mocker: Option<&str>) -> String {
        let hooks = Hooks::default();
        let framework = MockFramework::default();
        let mut r = GoRenderer::new("example.com/calc");
        render_table(
            &mut r,
            &TableSpec {
                sig,
                requirements: reqs,
                mocker,
                hooks: &hooks,
                framework: &framework,
            },
        );
        r.body()
    }

    #[test]
    fn test_divide_table() {
        let output = render(&divide(), &Requirements::default(), None);
        println!("Output:\n{}", output);

        let expected = r#"func TestDivide(t *testing.T) {
	type test struct {
		name string

		aArg int
		bArg int

		want1 int
		wantErr bool
		errCheck func(err error) error
	}

	tests := []test{}
	for _, tt := range tests {
		tt := tt
		t.Run(tt.name, func(t *testing.T) {
			got1, err := Divide(tt.aArg, tt.bArg)
			switch {
			case err != nil && (tt.wantErr || tt.errCheck != nil):
				if tt.errCheck != nil {
					if cerr := tt.errCheck(err); cerr != nil {
						t.Error("check error:", cerr)
						return
					}
				}
				t.Log("expected error:", err)
				return
			case err != nil && !tt.wantErr:
				t.Error("unexpected error:", err)
				return
			case err == nil && tt.wantErr:
				t.Error("error was expected")
				return
			case err == nil && !tt.wantErr:
			}

			if !reflect.DeepEqual(tt.want1, got1) {
				t.Errorf("the return value index 0 (int) mismatch:\nwant: %#v\ngot:  %#v", tt.want1, got1)
			}
		})
	}
}
"#;
        assert_eq!(output, expected);
        assert!(!output.contains("setup"));
    }

    #[test]
    fn test_named_results_without_error() {
        let sig = CallableSignature {
            name: "Split".to_string(),
            position: Default::default(),
            receiver: None,
            params: vec![Var::new("s", TypeShape::Basic("string".to_string()))],
            results: vec![
                Var::new("head", TypeShape::Basic("string".to_string())),
                Var::new("tail", TypeShape::Slice(Box::new(TypeShape::Basic("string".to_string())))),
            ],
            variadic: false,
        };
        let output = render(&sig, &Requirements::default(), None);
        println!("Output:\n{}", output);

        assert!(output.contains("\t\twantHead string\n\t\twantTail []string\n"));
        assert!(output.contains("gotHead, gotTail := Split(tt.sArg)"));
        assert!(output.contains("if !reflect.DeepEqual(tt.wantHead, gotHead) {"));
        assert!(output.contains("\"the return value for tail mismatch:\\nwant: %#v\\ngot:  %#v\""));
        assert!(!output.contains("wantErr"));
        assert!(!output.contains("switch"));
    }

    #[test]
    fn test_no_results_and_variadic() {
        let sig = CallableSignature {
            name: "Log".to_string(),
            position: Default::default(),
            receiver: None,
            params: vec![
                Var::new("format", TypeShape::Basic("string".to_string())),
                Var::new("args", TypeShape::Slice(Box::new(TypeShape::named("", "any")))),
            ],
            results: Vec::new(),
            variadic: true,
        };
        let output = render(&sig, &Requirements::default(), None);
        println!("Output:\n{}", output);

        assert!(output.contains("\t\t\tLog(tt.formatArg, tt.argsArg...)\n"));
        assert!(!output.contains("reflect"));
    }

    #[test]
    fn test_repeated_context_shares_ctx() {
        let ctx = TypeShape::named("context", "Context");
        let sig = CallableSignature {
            name: "Merge".to_string(),
            position: Default::default(),
            receiver: None,
            params: vec![Var::new("a", ctx.clone()), Var::new("b", ctx)],
            results: Vec::new(),
            variadic: false,
        };
        let output = render(&sig, &Requirements::default(), None);
        println!("Output:\n{}", output);

        assert!(output.contains("ctx := context.Background()"));
        assert!(output.contains("Merge(ctx, ctx)"));
        assert!(!output.contains("aArg"));
    }

    #[test]
    fn test_mock_field_named_like_its_package() {
        let sig = CallableSignature {
            name: "Save".to_string(),
            position: Default::default(),
            receiver: None,
            params: vec![Var::new("store", TypeShape::named("example.com/app/store", "Store"))],
            results: Vec::new(),
            variadic: false,
        };
        let reqs = Requirements {
            type_level: Vec::new(),
            params: vec![MockRequirement {
                name: "store".to_string(),
                interface: NamedRef::new("example.com/app/store", "Store"),
                mock: MockDescriptor {
                    interface: NamedRef::new("example.com/app/store", "Store"),
                    mock: NamedRef::new("example.com/app/store", "MockStore"),
                    constructor: NamedRef::new("example.com/app/store", "NewMockStore"),
                },
            }],
        };
        let hooks = Hooks::default();
        let framework = MockFramework::default();
        let mut r = GoRenderer::new("example.com/app");
        render_table(
            &mut r,
            &TableSpec {
                sig: &sig,
                requirements: &reqs,
                mocker: None,
                hooks: &hooks,
                framework: &framework,
            },
        );
        let output = r.body();
        println!("Output:\n{}", output);

        assert_eq!(r.imports().alias("example.com/app/store"), Some("store"));
        assert!(output.contains("type argMocks struct {\n\t\tstore *store.MockStore\n\t}"));
        assert!(output.contains("store: store.NewMockStore(ctrl),"));
        assert!(output.contains("Save(amocks.store)"));
    }

    #[test]
    #[traced_test]
    fn test_fixed_names_shadow_package_names() {
        let sig = CallableSignature {
            name: "Ping".to_string(),
            position: Default::default(),
            receiver: None,
            params: vec![Var::new("ctx", TypeShape::named("context", "Context"))],
            results: vec![Var::new("", TypeShape::named(UNIVERSE, "error"))],
            variadic: false,
        };
        let hooks = Hooks::default();
        let framework = MockFramework::default();
        let mut r = GoRenderer::new("example.com/app");
        let root = r.scopes().root();
        r.scopes().claim(root, "ctx");
        r.scopes().claim(root, "err");
        render_table(
            &mut r,
            &TableSpec {
                sig: &sig,
                requirements: &Requirements::default(),
                mocker: None,
                hooks: &hooks,
                framework: &framework,
            },
        );
        let output = r.body();
        println!("Output:\n{}", output);

        assert!(output.contains("\t\t\tctx := context.Background()\n\t\t\terr := Ping(ctx)\n"));
        assert!(logs_contain("ctx shadows an outer declaration"));
        assert!(logs_contain("err shadows an outer declaration"));
        assert!(!logs_contain("already declared"));
    }

    #[test]
    #[traced_test]
    fn test_hook_declaring_ctx_is_reported() {
        let sig = CallableSignature {
            name: "Ping".to_string(),
            position: Default::default(),
            receiver: None,
            params: vec![Var::new("ctx", TypeShape::named("context", "Context"))],
            results: Vec::new(),
            variadic: false,
        };
        let mut hooks = Hooks::default();
        hooks.pre_test = Box::new(|r: &mut GoRenderer| {
            r.claim("ctx");
        });
        let framework = MockFramework::default();
        let mut r = GoRenderer::new("example.com/app");
        render_table(
            &mut r,
            &TableSpec {
                sig: &sig,
                requirements: &Requirements::default(),
                mocker: None,
                hooks: &hooks,
                framework: &framework,
            },
        );

        assert!(logs_contain("ctx is already declared in the test body"));
    }
}
