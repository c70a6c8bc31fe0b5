//! Go front-end adapter built on tree-sitter-go
//!
//! Parses the files of one package and produces the [`Package`] symbol table.
//! Parsing runs in two passes: the first collects the package-level type
//! names of every file, the second converts declarations, so an unqualified
//! identifier can be told apart from a predeclared type.

use crate::error::LoadError;
use crate::naming::package_name_from_path;
use crate::types::*;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tree_sitter::{Node, Parser, Tree};

const BASIC_TYPES: &[&str] = &[
    "bool", "string", "int", "int8", "int16", "int32", "int64", "uint", "uint8", "uint16",
    "uint32", "uint64", "uintptr", "byte", "rune", "float32", "float64", "complex64",
    "complex128",
];

/// Reusable tree-sitter parser configured for Go
pub struct GoParser {
    parser: Parser,
}

impl GoParser {
    pub fn new() -> Result<Self, LoadError> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_go::LANGUAGE.into())
            .map_err(|e| LoadError::Language(e.to_string()))?;
        Ok(Self { parser })
    }

    pub fn parse(&mut self, path: &Path, source: &str) -> Result<Tree, LoadError> {
        let tree = self.parser.parse(source, None).ok_or_else(|| LoadError::Parse {
            path: path.to_path_buf(),
            message: "parser returned no tree".to_string(),
        })?;

        if let Some(node) = first_error(tree.root_node()) {
            let pos = node.start_position();
            return Err(LoadError::Parse {
                path: path.to_path_buf(),
                message: format!("syntax error at {}:{}", pos.row + 1, pos.column + 1),
            });
        }
        Ok(tree)
    }
}

fn first_error(node: Node) -> Option<Node> {
    if !node.has_error() {
        return None;
    }
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = first_error(child) {
            return Some(found);
        }
    }
    Some(node)
}

fn text<'s>(node: Node, source: &'s str) -> &'s str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

fn unquote(lit: &str) -> String {
    lit.trim_matches(|c| c == '"' || c == '`').to_string()
}

fn position(file: &Path, node: Node) -> Position {
    let p = node.start_position();
    Position {
        file: file.to_path_buf(),
        line: p.row + 1,
        column: p.column + 1,
    }
}

fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|n| n.kind() != "comment")
        .collect()
}

fn field_children<'t>(node: Node<'t>, field: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children_by_field_name(field, &mut cursor).collect()
}

/// Imports and top-level names of an existing file, used when appending to it
#[derive(Debug, Clone, Default)]
pub struct FileOutline {
    pub package: String,
    /// (import path, alias used in the file)
    pub imports: Vec<(String, String)>,
    pub names: Vec<String>,
    /// Byte offset right after the last import declaration (or the package clause)
    pub import_end: usize,
}

/// Outline an existing Go file
pub fn outline(parser: &mut GoParser, path: &Path, source: &str) -> Result<FileOutline, LoadError> {
    let tree = parser.parse(path, source)?;
    let root = tree.root_node();
    let mut out = FileOutline::default();

    for node in named_children(root) {
        match node.kind() {
            "package_clause" => {
                out.package = package_clause_name(node, source);
                out.import_end = node.end_byte();
            }
            "import_declaration" => {
                for (alias, path) in import_specs(node, source) {
                    let alias = alias.unwrap_or_else(|| package_name_from_path(&path));
                    out.imports.push((path, alias));
                }
                out.import_end = node.end_byte();
            }
            "function_declaration" => {
                if let Some(name) = node.child_by_field_name("name") {
                    out.names.push(text(name, source).to_string());
                }
            }
            "type_declaration" => {
                for spec in named_children(node) {
                    if let Some(name) = spec.child_by_field_name("name") {
                        out.names.push(text(name, source).to_string());
                    }
                }
            }
            "var_declaration" | "const_declaration" => {
                collect_value_names(node, source, &mut out.names);
            }
            _ => {}
        }
    }

    Ok(out)
}

fn collect_value_names(node: Node, source: &str, names: &mut Vec<String>) {
    for child in named_children(node) {
        match child.kind() {
            "var_spec" | "const_spec" => {
                for name in field_children(child, "name") {
                    names.push(text(name, source).to_string());
                }
            }
            "var_spec_list" => collect_value_names(child, source, names),
            _ => {}
        }
    }
}

fn package_clause_name(node: Node, source: &str) -> String {
    named_children(node)
        .into_iter()
        .find(|n| n.kind() == "package_identifier")
        .map(|n| text(n, source).to_string())
        .unwrap_or_default()
}

/// (explicit alias, path) pairs of an import declaration. Dot and blank imports are skipped.
fn import_specs(node: Node, source: &str) -> Vec<(Option<String>, String)> {
    let mut specs = Vec::new();
    for child in named_children(node) {
        match child.kind() {
            "import_spec" => {
                let Some(path) = child.child_by_field_name("path") else {
                    continue;
                };
                let path = unquote(text(path, source));
                match child.child_by_field_name("name") {
                    Some(name) if name.kind() == "package_identifier" => {
                        specs.push((Some(text(name, source).to_string()), path));
                    }
                    Some(_) => {}
                    None => specs.push((None, path)),
                }
            }
            "import_spec_list" => specs.extend(import_specs(child, source)),
            _ => {}
        }
    }
    specs
}

/// Per-file resolution context
struct FileCtx<'a> {
    file: &'a Path,
    source: &'a str,
    package: &'a str,
    local_types: &'a HashSet<String>,
    imports: HashMap<String, String>,
    type_params: Vec<String>,
}

impl<'a> FileCtx<'a> {
    fn text(&self, node: Node) -> &'a str {
        text(node, self.source)
    }

    fn ident_type(&self, name: &str) -> TypeShape {
        if self.type_params.iter().any(|p| p == name) {
            return TypeShape::TypeParam(name.to_string());
        }
        if self.local_types.contains(name) {
            return TypeShape::named(self.package, name);
        }
        match name {
            "error" | "comparable" => TypeShape::named(UNIVERSE, name),
            "any" => TypeShape::Interface(InterfaceShape::default()),
            _ if BASIC_TYPES.contains(&name) => TypeShape::Basic(name.to_string()),
            _ => TypeShape::named(self.package, name),
        }
    }

    fn convert(&self, node: Node) -> TypeShape {
        match node.kind() {
            "type_identifier" => self.ident_type(self.text(node)),
            "qualified_type" => {
                let alias = node
                    .child_by_field_name("package")
                    .map(|n| self.text(n))
                    .unwrap_or_default();
                let name = node
                    .child_by_field_name("name")
                    .map(|n| self.text(n))
                    .unwrap_or_default();
                let path = self
                    .imports
                    .get(alias)
                    .cloned()
                    .unwrap_or_else(|| alias.to_string());
                TypeShape::named(path, name)
            }
            "generic_type" => {
                let base = node
                    .child_by_field_name("type")
                    .map(|n| self.convert(n))
                    .unwrap_or_else(|| TypeShape::Basic(self.text(node).to_string()));
                match base {
                    TypeShape::Named(mut named) => {
                        if let Some(args) = node.child_by_field_name("type_arguments") {
                            named.args = named_children(args)
                                .into_iter()
                                .map(|arg| self.convert(arg))
                                .collect();
                        }
                        TypeShape::Named(named)
                    }
                    other => other,
                }
            }
            "pointer_type" => TypeShape::Pointer(Box::new(self.first_child_type(node))),
            "slice_type" => TypeShape::Slice(Box::new(self.field_type(node, "element"))),
            "array_type" => {
                let len = node
                    .child_by_field_name("length")
                    .map(|n| self.text(n).to_string())
                    .unwrap_or_default();
                TypeShape::Array(len, Box::new(self.field_type(node, "element")))
            }
            "implicit_length_array_type" => {
                TypeShape::Array("...".to_string(), Box::new(self.field_type(node, "element")))
            }
            "map_type" => TypeShape::Map(
                Box::new(self.field_type(node, "key")),
                Box::new(self.field_type(node, "value")),
            ),
            "channel_type" => {
                let raw: String = self.text(node).chars().filter(|c| !c.is_whitespace()).collect();
                let dir = if raw.starts_with("<-") {
                    ChanDir::Recv
                } else if raw.starts_with("chan<-") {
                    ChanDir::Send
                } else {
                    ChanDir::Both
                };
                TypeShape::Chan(dir, Box::new(self.field_type(node, "value")))
            }
            "function_type" => TypeShape::Func(Box::new(self.signature(node))),
            "struct_type" => TypeShape::Struct(self.struct_shape(node)),
            "interface_type" => TypeShape::Interface(self.interface_shape(node)),
            "parenthesized_type" | "type_elem" | "constraint_elem" | "negated_type" => {
                self.first_child_type(node)
            }
            _ => TypeShape::Basic(self.text(node).to_string()),
        }
    }

    fn first_child_type(&self, node: Node) -> TypeShape {
        match named_children(node).into_iter().next() {
            Some(child) => self.convert(child),
            None => TypeShape::Basic(self.text(node).to_string()),
        }
    }

    fn field_type(&self, node: Node, field: &str) -> TypeShape {
        match node.child_by_field_name(field) {
            Some(child) => self.convert(child),
            None => TypeShape::Basic(String::new()),
        }
    }

    fn signature(&self, node: Node) -> Signature {
        let mut sig = Signature::default();
        if let Some(params) = node.child_by_field_name("parameters") {
            let (vars, variadic) = self.parameter_list(params);
            sig.params = vars;
            sig.variadic = variadic;
        }
        if let Some(result) = node.child_by_field_name("result") {
            sig.results = if result.kind() == "parameter_list" {
                self.parameter_list(result).0
            } else {
                vec![Var {
                    name: String::new(),
                    ty: self.convert(result),
                    position: position(self.file, result),
                }]
            };
        }
        sig
    }

    fn parameter_list(&self, node: Node) -> (Vec<Var>, bool) {
        let mut vars = Vec::new();
        let mut variadic = false;
        for decl in named_children(node) {
            let is_variadic = decl.kind() == "variadic_parameter_declaration";
            if decl.kind() != "parameter_declaration" && !is_variadic {
                continue;
            }
            let mut ty = self.field_type(decl, "type");
            if is_variadic {
                ty = TypeShape::Slice(Box::new(ty));
                variadic = true;
            }
            let names = field_children(decl, "name");
            if names.is_empty() {
                vars.push(Var {
                    name: String::new(),
                    ty,
                    position: position(self.file, decl),
                });
            } else {
                for name in names {
                    vars.push(Var {
                        name: self.text(name).to_string(),
                        ty: ty.clone(),
                        position: position(self.file, name),
                    });
                }
            }
        }
        (vars, variadic)
    }

    fn struct_shape(&self, node: Node) -> StructShape {
        let mut shape = StructShape::default();
        let Some(list) = named_children(node)
            .into_iter()
            .find(|n| n.kind() == "field_declaration_list")
        else {
            return shape;
        };

        for decl in named_children(list) {
            if decl.kind() != "field_declaration" {
                continue;
            }
            let mut ty = self.field_type(decl, "type");
            let names = field_children(decl, "name");
            if names.is_empty() {
                if self.text(decl).trim_start().starts_with('*') {
                    ty = TypeShape::Pointer(Box::new(ty));
                }
                let name = match ty.pointee_named() {
                    Some((named, _)) => named.name.clone(),
                    None => self.text(decl).trim_start_matches('*').to_string(),
                };
                shape.fields.push(Field {
                    name,
                    ty,
                    embedded: true,
                    position: position(self.file, decl),
                });
            } else {
                for name in names {
                    shape.fields.push(Field {
                        name: self.text(name).to_string(),
                        ty: ty.clone(),
                        embedded: false,
                        position: position(self.file, name),
                    });
                }
            }
        }
        shape
    }

    fn interface_shape(&self, node: Node) -> InterfaceShape {
        let mut shape = InterfaceShape::default();
        for elem in named_children(node) {
            match elem.kind() {
                "method_elem" | "method_spec" => {
                    let name = elem
                        .child_by_field_name("name")
                        .map(|n| self.text(n).to_string())
                        .unwrap_or_default();
                    shape.methods.push(InterfaceMethod {
                        name,
                        signature: self.signature(elem),
                    });
                }
                "type_elem" | "constraint_elem" | "interface_type_name" => {
                    let terms = named_children(elem);
                    // A single term is an embedded interface, more are a union constraint
                    if terms.len() == 1 {
                        shape.embedded.push(self.convert(terms[0]));
                    } else if terms.is_empty() {
                        shape.embedded.push(self.convert(elem));
                    }
                }
                "type_identifier" | "qualified_type" | "generic_type" => {
                    shape.embedded.push(self.convert(elem));
                }
                _ => {}
            }
        }
        shape
    }
}

fn type_param_names(node: Option<Node>, source: &str) -> Vec<String> {
    let Some(list) = node else {
        return Vec::new();
    };
    named_children(list)
        .into_iter()
        .flat_map(|decl| field_children(decl, "name"))
        .map(|n| text(n, source).to_string())
        .collect()
}

/// Receiver base type name, pointer flag and type parameter names
fn receiver_info(node: Node, source: &str) -> Option<(String, String, bool, Vec<String>)> {
    let decl = named_children(node)
        .into_iter()
        .find(|n| n.kind() == "parameter_declaration")?;
    let recv_name = decl
        .child_by_field_name("name")
        .map(|n| text(n, source).to_string())
        .unwrap_or_default();

    let mut ty = decl.child_by_field_name("type")?;
    let mut pointer = false;
    while matches!(ty.kind(), "pointer_type" | "parenthesized_type") {
        if ty.kind() == "pointer_type" {
            pointer = true;
        }
        ty = named_children(ty).into_iter().next()?;
    }

    let mut params = Vec::new();
    if ty.kind() == "generic_type" {
        if let Some(args) = ty.child_by_field_name("type_arguments") {
            params = named_children(args)
                .into_iter()
                .map(|n| text(n, source).trim().to_string())
                .collect();
        }
        ty = ty.child_by_field_name("type")?;
    }

    Some((text(ty, source).to_string(), recv_name, pointer, params))
}

struct PendingMethod {
    owner: String,
    decl: MethodDecl,
}

/// Build the symbol table of one package from its sources
pub fn parse_package(import_path: &str, dir: &Path, files: &[(PathBuf, String)]) -> Result<Package, LoadError> {
    let mut parser = GoParser::new()?;
    let mut trees = Vec::with_capacity(files.len());
    for (path, source) in files {
        trees.push(parser.parse(path, source)?);
    }

    // Pass 1: package name and type names
    let mut package_name = String::new();
    let mut local_types = HashSet::new();
    for ((_, source), tree) in files.iter().zip(&trees) {
        for node in named_children(tree.root_node()) {
            match node.kind() {
                "package_clause" if package_name.is_empty() => {
                    package_name = package_clause_name(node, source);
                }
                "type_declaration" => {
                    for spec in named_children(node) {
                        if let Some(name) = spec.child_by_field_name("name") {
                            local_types.insert(text(name, source).to_string());
                        }
                    }
                }
                _ => {}
            }
        }
    }

    // Pass 2: declarations
    let mut types: IndexMap<String, TypeDecl> = IndexMap::new();
    let mut funcs: IndexMap<String, FuncDecl> = IndexMap::new();
    let mut values = Vec::new();
    let mut methods = Vec::new();

    for ((path, source), tree) in files.iter().zip(&trees) {
        let root = tree.root_node();
        let mut imports = HashMap::new();
        for node in named_children(root).into_iter().filter(|n| n.kind() == "import_declaration") {
            for (alias, import_path) in import_specs(node, source) {
                let alias = alias.unwrap_or_else(|| package_name_from_path(&import_path));
                imports.insert(alias, import_path);
            }
        }

        let mut ctx = FileCtx {
            file: path,
            source,
            package: import_path,
            local_types: &local_types,
            imports,
            type_params: Vec::new(),
        };

        for node in named_children(root) {
            match node.kind() {
                "type_declaration" => {
                    for spec in named_children(node) {
                        let alias = match spec.kind() {
                            "type_spec" => false,
                            "type_alias" => true,
                            _ => continue,
                        };
                        let Some(name) = spec.child_by_field_name("name") else {
                            continue;
                        };
                        ctx.type_params = type_param_names(spec.child_by_field_name("type_parameters"), source);
                        let decl = TypeDecl {
                            name: ctx.text(name).to_string(),
                            position: position(path, name),
                            alias,
                            type_params: ctx.type_params.clone(),
                            underlying: ctx.field_type(spec, "type"),
                            methods: Vec::new(),
                        };
                        types.insert(decl.name.clone(), decl);
                    }
                }
                "function_declaration" => {
                    let Some(name) = node.child_by_field_name("name") else {
                        continue;
                    };
                    ctx.type_params = type_param_names(node.child_by_field_name("type_parameters"), source);
                    let decl = FuncDecl {
                        name: ctx.text(name).to_string(),
                        position: position(path, name),
                        signature: ctx.signature(node),
                    };
                    funcs.insert(decl.name.clone(), decl);
                }
                "method_declaration" => {
                    let (Some(name), Some(receiver)) =
                        (node.child_by_field_name("name"), node.child_by_field_name("receiver"))
                    else {
                        continue;
                    };
                    let Some((owner, receiver_name, pointer, params)) = receiver_info(receiver, source) else {
                        continue;
                    };
                    ctx.type_params = params;
                    methods.push(PendingMethod {
                        owner,
                        decl: MethodDecl {
                            name: ctx.text(name).to_string(),
                            position: position(path, name),
                            receiver_name,
                            pointer_receiver: pointer,
                            signature: ctx.signature(node),
                        },
                    });
                }
                "var_declaration" | "const_declaration" => {
                    collect_value_names(node, source, &mut values);
                }
                _ => {}
            }
            ctx.type_params.clear();
        }
    }

    for pending in methods {
        if let Some(owner) = types.get_mut(&pending.owner) {
            owner.methods.push(pending.decl);
        }
    }

    Ok(Package {
        path: import_path.to_string(),
        name: package_name,
        dir: dir.to_path_buf(),
        files: files.iter().map(|(p, _)| p.clone()).collect(),
        types,
        funcs,
        values: values.into_iter().filter(|v| v != "_").collect(),
    })
}
