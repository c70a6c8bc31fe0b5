use super::output::{GoRenderer, quote};
use crate::classify::MockRequirement;
use crate::lookup::MockFramework;
use crate::naming::public;

/// Mocker aggregate for the receiver type of a method
pub struct MockerSpec<'a> {
    /// Receiver type name
    pub type_name: &'a str,
    pub mocker_type: &'a str,
    /// Receiver fields that get mocks
    pub requirements: &'a [MockRequirement],
    pub framework: &'a MockFramework,
}

/// `newServiceMocker` for `serviceMocker`
pub fn mocker_constructor(mocker_type: &str) -> String {
    format!("new{}", public(&[mocker_type]))
}

pub fn render_mocker(r: &mut GoRenderer, spec: &MockerSpec) {
    let mocker = spec.mocker_type;
    let constructor = mocker_constructor(mocker);
    r.claim(spec.type_name);
    r.claim(mocker);
    r.claim(&constructor);

    let gomock = r.import(&spec.framework.package);
    let sync = r.import("sync");

    let mocks: Vec<(String, String)> = spec
        .requirements
        .iter()
        .map(|req| (r.qualify(&req.mock.mock), r.qualify(&req.mock.constructor)))
        .collect();

    let fields = r.scopes().detached();
    let field_names: Vec<String> = spec
        .requirements
        .iter()
        .map(|req| r.reserve_in(fields, &req.name, &["mock"]))
        .collect();
    let waiter = r.reserve_in(fields, "waiter", &[]);

    if !r.is_empty() {
        r.blank();
    }
    r.line(format!("// {constructor} creates a mocker for {}.", spec.type_name));
    r.open(format!(
        "func {constructor}(ctrl *{gomock}.{}) *{mocker} {{",
        spec.framework.controller
    ));
    r.open(format!("return &{mocker}{{"));
    for (field, (_, ctor)) in field_names.iter().zip(&mocks) {
        r.line(format!("{field}: {ctor}(ctrl),"));
    }
    r.close("}");
    r.close("}");
    r.blank();

    r.line(format!("// {mocker} holds the mocks {} depends on.", spec.type_name));
    r.open(format!("type {mocker} struct {{"));
    for (field, (mock, _)) in field_names.iter().zip(&mocks) {
        r.line(format!("{field} *{mock}"));
    }
    r.line(format!("{waiter} {sync}.WaitGroup"));
    r.close("}");
    r.blank();

    r.line("// waiters sets the number of background processes to wait for before the test ends.");
    r.open(format!("func (m *{mocker}) waiters(i int) {{"));
    r.line(format!("m.{waiter}.Add(i)"));
    r.close("}");
    r.blank();

    r.line("// end marks a background process as finished. Bind it to the last expected call");
    r.line("// of every process to wait for:");
    r.line("//");
    let example = field_names.first().map(String::as_str).unwrap_or("mock");
    r.line(format!("//\tm.{example}.EXPECT().Method(gomock.Any()).Do(m.end)"));
    r.open(format!("func (m *{mocker}) end(...any) {{"));
    r.line(format!("m.{waiter}.Done()"));
    r.close("}");
    r.blank();

    r.line("// wait blocks until every background process has called end.");
    r.open(format!("func (m *{mocker}) wait() {{"));
    r.line(format!("m.{waiter}.Wait()"));
    r.close("}");
    r.blank();

    // The subject can't be wired from its mocks automatically
    let ty = spec.type_name;
    r.line(format!("// {ty} creates an instance of {ty} wired with the mocks."));
    r.open(format!("func (m *{mocker}) {ty}() *{ty} {{"));
    r.line(format!("// Must be completed by hand: build {ty} from the mocks above."));
    r.line(format!("panic({})", quote(&format!("{mocker}.{ty} is not implemented"))));
    r.close("}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::MockDescriptor;
    use crate::types::NamedRef;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_mocker() {
        let req = MockRequirement {
            name: "store".to_string(),
            interface: NamedRef::new("example.com/app", "Store"),
            mock: MockDescriptor {
                interface: NamedRef::new("example.com/app", "Store"),
                mock: NamedRef::new("example.com/app/mocks", "MockStore"),
                constructor: NamedRef::new("example.com/app/mocks", "NewMockStore"),
            },
        };
        let framework = MockFramework::default();
        let mut r = GoRenderer::new("example.com/app");
        render_mocker(
            &mut r,
            &MockerSpec {
                type_name: "Service",
                mocker_type: "serviceMocker",
                requirements: std::slice::from_ref(&req),
                framework: &framework,
            },
        );

        let output = r.body();
        println!("Output:\n{}", output);

        assert!(output.contains("func newServiceMocker(ctrl *gomock.Controller) *serviceMocker {"));
        assert!(output.contains("\t\tstoreMock: mocks.NewMockStore(ctrl),"));
        assert!(output.contains("\tstoreMock *mocks.MockStore\n\twaiter sync.WaitGroup\n"));
        assert!(output.contains("func (m *serviceMocker) waiters(i int) {\n\tm.waiter.Add(i)\n}"));
        assert!(output.contains("func (m *serviceMocker) end(...any) {\n\tm.waiter.Done()\n}"));
        assert!(output.contains("func (m *serviceMocker) wait() {\n\tm.waiter.Wait()\n}"));
        assert!(output.contains("func (m *serviceMocker) Service() *Service {"));
        assert!(output.contains("panic(\"serviceMocker.Service is not implemented\")"));

        let imports: Vec<_> = r.imports().fresh().map(|(path, _)| path).collect();
        assert_eq!(imports, vec!["github.com/golang/mock/gomock", "sync", "example.com/app/mocks"]);
    }
}
