//! Identifier casing and mock name templates

use crate::error::ConfigError;

/// Split an identifier into words on separators and camel-case boundaries.
/// Acronyms stay together: `HTTPServer` -> `HTTP`, `Server`.
pub fn split_words(s: &str) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if matches!(c, '_' | '-' | ' ' | '.' | '/') {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower) {
                words.push(std::mem::take(&mut current));
            }
        }

        current.push(c);
    }

    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn upper_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn lower_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn words_of(parts: &[&str]) -> Vec<String> {
    parts.iter().flat_map(|p| split_words(p)).collect()
}

/// Exported Go name: `repo`, `mock` -> `RepoMock`
pub fn public(parts: &[&str]) -> String {
    words_of(parts).iter().map(|w| upper_first(w)).collect()
}

/// Unexported Go name: `Service`, `mocker` -> `serviceMocker`, `HTTPClient` -> `httpClient`
pub fn private(parts: &[&str]) -> String {
    let words = words_of(parts);
    let mut out = String::new();
    for (i, word) in words.iter().enumerate() {
        if i == 0 {
            if word.chars().all(|c| !c.is_lowercase()) {
                out.push_str(&word.to_lowercase());
            } else {
                out.push_str(&lower_first(word));
            }
        } else {
            out.push_str(&upper_first(word));
        }
    }
    out
}

/// `Service`, `mocker`, `test` -> `service_mocker_test`
pub fn underscored(parts: &[&str]) -> String {
    words_of(parts)
        .iter()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

/// `HTTPServer` -> `http-server`
pub fn striked(parts: &[&str]) -> String {
    words_of(parts)
        .iter()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}

/// Protobuf-generated Go style, acronyms lose their capitals: `HTTPServer` -> `HttpServer`
pub fn proto(parts: &[&str]) -> String {
    words_of(parts)
        .iter()
        .map(|w| upper_first(&w.to_lowercase()))
        .collect()
}

/// Camel-join without recasing the first part: `want`, `result` -> `wantResult`
pub fn camel_join(base: &str, parts: &[&str]) -> String {
    let mut out = base.to_string();
    for part in parts {
        out.push_str(&upper_first(part));
    }
    out
}

/// Default package name for an import path.
/// `gopkg.in/yaml.v3` -> `yaml`, `github.com/jackc/pgx/v5` -> `pgx`, `github.com/sirkon/go-format` -> `format`
pub fn package_name_from_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let mut last = segments.last().copied().unwrap_or("");
    if is_major_version(last) && segments.len() > 1 {
        last = segments[segments.len() - 2];
    }

    let mut name = last.to_string();
    if let Some(pos) = name.rfind(".v") {
        if is_major_version(&name[pos + 1..]) {
            name.truncate(pos);
        }
    }
    if let Some(stripped) = name.strip_prefix("go-") {
        name = stripped.to_string();
    }
    if let Some(stripped) = name.strip_suffix("-go") {
        name = stripped.to_string();
    }

    let mut ident: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect::<String>()
        .to_lowercase();
    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert_str(0, "pkg");
    }
    ident
}

fn is_major_version(s: &str) -> bool {
    s.len() > 1 && s.starts_with('v') && s[1..].chars().all(|c| c.is_ascii_digit())
}

/// Casing applied to the type name inside a template placeholder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Case {
    Verbatim,
    Public,
    Private,
    Underscored,
    Striked,
    Proto,
}

impl Case {
    fn from_flag(flag: &str) -> Option<Self> {
        match flag {
            "P" => Some(Case::Public),
            "p" => Some(Case::Private),
            "_" => Some(Case::Underscored),
            "-" => Some(Case::Striked),
            "R" => Some(Case::Proto),
            _ => None,
        }
    }

    pub fn apply(self, name: &str) -> String {
        match self {
            Case::Verbatim => name.to_string(),
            Case::Public => public(&[name]),
            Case::Private => private(&[name]),
            Case::Underscored => underscored(&[name]),
            Case::Striked => striked(&[name]),
            Case::Proto => proto(&[name]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Type(Case),
}

/// Mock type name template: `Mock${type}` for mockgen, `${type|P}Mock` for pamgen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl NameTemplate {
    pub fn parse(template: &str) -> Result<Self, ConfigError> {
        let invalid = |message: String| ConfigError::Template {
            template: template.to_string(),
            message,
        };

        let mut segments = Vec::new();
        let mut rest = template;
        while let Some(start) = rest.find("${") {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }
            let after = &rest[start + 2..];
            let end = after
                .find('}')
                .ok_or_else(|| invalid("unclosed placeholder".to_string()))?;
            let inner = &after[..end];
            let (var, flag) = match inner.split_once('|') {
                Some((var, flag)) => (var.trim(), Some(flag.trim())),
                None => (inner.trim(), None),
            };
            if var != "type" {
                return Err(invalid(format!("unknown variable '{var}'")));
            }
            let case = match flag {
                None => Case::Verbatim,
                Some(flag) => Case::from_flag(flag)
                    .ok_or_else(|| invalid(format!("format '{flag}' is not supported")))?,
            };
            segments.push(Segment::Type(case));
            rest = &after[end + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        if !segments.iter().any(|s| matches!(s, Segment::Type(_))) {
            return Err(invalid("template must reference ${type}".to_string()));
        }

        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    /// mockgen naming: `Mock<Type>`
    pub fn mockgen() -> Self {
        Self {
            source: "Mock${type}".to_string(),
            segments: vec![
                Segment::Literal("Mock".to_string()),
                Segment::Type(Case::Verbatim),
            ],
        }
    }

    pub fn apply(&self, type_name: &str) -> String {
        self.segments
            .iter()
            .map(|s| match s {
                Segment::Literal(text) => text.clone(),
                Segment::Type(case) => case.apply(type_name),
            })
            .collect()
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl Default for NameTemplate {
    fn default() -> Self {
        Self::mockgen()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_words() {
        assert_eq!(split_words("HTTPServer"), vec!["HTTP", "Server"]);
        assert_eq!(split_words("fooBar_baz"), vec!["foo", "Bar", "baz"]);
        assert_eq!(split_words("userID"), vec!["user", "ID"]);
        assert_eq!(split_words("v2Client"), vec!["v2", "Client"]);
    }

    #[test]
    fn test_casings() {
        assert_eq!(public(&["repo", "mock"]), "RepoMock");
        assert_eq!(private(&["Service", "mocker"]), "serviceMocker");
        assert_eq!(private(&["HTTPClient"]), "httpClient");
        assert_eq!(private(&["ID"]), "id");
        assert_eq!(underscored(&["Service", "mocker", "test"]), "service_mocker_test");
        assert_eq!(striked(&["HTTPServer"]), "http-server");
        assert_eq!(proto(&["HTTPServer"]), "HttpServer");
    }

    #[test]
    fn test_camel_join() {
        assert_eq!(camel_join("want", &["1"]), "want1");
        assert_eq!(camel_join("userID", &["arg"]), "userIDArg");
        assert_eq!(camel_join("Test", &["Service", "Do"]), "TestServiceDo");
    }

    #[test]
    fn test_package_names() {
        assert_eq!(package_name_from_path("github.com/golang/mock/gomock"), "gomock");
        assert_eq!(package_name_from_path("gopkg.in/yaml.v3"), "yaml");
        assert_eq!(package_name_from_path("github.com/jackc/pgx/v5"), "pgx");
        assert_eq!(package_name_from_path("github.com/sirkon/go-format"), "format");
        assert_eq!(package_name_from_path("example.com/3d"), "pkg3d");
    }

    #[test]
    fn test_template_formats() {
        let t = NameTemplate::parse("${type|P}Mock").unwrap();
        assert_eq!(t.apply("store"), "StoreMock");

        let t = NameTemplate::parse("Mock${type}").unwrap();
        assert_eq!(t.apply("Store"), "MockStore");

        let t = NameTemplate::parse("${ type | R }Double").unwrap();
        assert_eq!(t.apply("HTTPClient"), "HttpClientDouble");

        let t = NameTemplate::parse("fake_${type|_}").unwrap();
        assert_eq!(t.apply("UserStore"), "fake_user_store");
    }

    #[test]
    fn test_template_rejects_unknown_format() {
        let err = NameTemplate::parse("${type|X}Mock").unwrap_err();
        assert!(err.to_string().contains("format 'X' is not supported"));

        assert!(NameTemplate::parse("${name}Mock").is_err());
        assert!(NameTemplate::parse("${typeMock").is_err());
        assert!(NameTemplate::parse("Mock").is_err());
    }
}
