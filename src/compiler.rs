//! Schema compilation - drives extraction and resolution over a scan target.
//!
//! A run has two phases. Every module is extracted first, filling the type
//! catalog and import graph. Then each surviving function is resolved into
//! an input/output schema pair. Failures are isolated per function and
//! reported as diagnostics; they never abort the run.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::catalog::{ImportGraph, TypeCatalog, TypeEnvironment};
use crate::error::ResolveError;
use crate::extractor::extract_module;
use crate::filter::{NameFilter, NameKind};
use crate::resolver::Resolver;
use crate::syntax::{Module, Position};
use crate::types::{
    AdditionalProperties, Fields, FunctionSignature, ModulePath, ObjectSchema, ParamKind, SchemaNode,
};

/// Default bound on relative-import hops during name lookup.
pub const DEFAULT_IMPORT_DEPTH: usize = 16;

/// One parsed module of a scan target.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleUnit {
    pub path: ModulePath,
    /// A package `__init__` module.
    pub is_package: bool,
    pub tree: Module,
    /// Only contributes types; its functions are not compiled.
    pub context_only: bool,
}

impl ModuleUnit {
    pub fn new(path: ModulePath, tree: Module) -> Self {
        Self {
            path,
            is_package: false,
            tree,
            context_only: false,
        }
    }

    pub fn package_init(path: ModulePath, tree: Module) -> Self {
        Self {
            is_package: true,
            ..Self::new(path, tree)
        }
    }

    pub fn context(mut self) -> Self {
        self.context_only = true;
        self
    }
}

/// Whether function names are qualified by module path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    /// Single file: bare function names.
    Module,
    /// Package tree: `package.module.function` names.
    Package,
}

/// Ordered set of modules to compile.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanTarget {
    pub kind: ScanKind,
    /// Package path for package scans; module filtering applies below it.
    pub root: ModulePath,
    pub modules: Vec<ModuleUnit>,
}

impl ScanTarget {
    /// Single-file scan of `unit`, with optional context-only siblings.
    pub fn module(unit: ModuleUnit, siblings: Vec<ModuleUnit>) -> Self {
        let mut modules = vec![unit];
        modules.extend(siblings.into_iter().map(ModuleUnit::context));
        Self {
            kind: ScanKind::Module,
            root: ModulePath::root(),
            modules,
        }
    }

    pub fn package(root: ModulePath, modules: Vec<ModuleUnit>) -> Self {
        Self {
            kind: ScanKind::Package,
            root,
            modules,
        }
    }
}

/// Options for a compilation run.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Maximum relative-import hops a name lookup may follow. `1` only
    /// looks at directly imported modules.
    pub import_depth: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            import_depth: DEFAULT_IMPORT_DEPTH,
        }
    }
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn import_depth(mut self, depth: usize) -> Self {
        self.import_depth = depth;
        self
    }
}

/// Compiled schemas of one function.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionSchema {
    pub input: Value,
    pub output: Value,
}

/// A function left out of the result, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    /// Key the function would have had in the result.
    pub function: String,
    pub module: ModulePath,
    /// Position of the definition, when the syntax tree records one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    pub code: &'static str,
    pub message: String,
}

/// Result of a compilation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Compilation {
    /// Function key to schemas, in module then definition order.
    pub schemas: IndexMap<String, FunctionSchema>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Compilation {
    /// JSON mapping of function key to `{"input": ..., "output": ...}`.
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.schemas
                .iter()
                .map(|(name, schema)| {
                    (
                        name.clone(),
                        serde_json::json!({ "input": schema.input, "output": schema.output }),
                    )
                })
                .collect(),
        )
    }
}

struct Candidate {
    key: String,
    module: ModulePath,
    position: Option<Position>,
    signature: Result<FunctionSignature, ResolveError>,
}

/// Compile every allowed function of `target`.
pub fn compile(target: &ScanTarget, filter: &dyn NameFilter, options: &CompileOptions) -> Compilation {
    let mut catalog = TypeCatalog::new();
    let mut imports = ImportGraph::new();
    let mut candidates: Vec<Candidate> = Vec::new();

    for unit in &target.modules {
        let extract = extract_module(&unit.path, unit.is_package, &unit.tree);
        for (name, definition) in extract.definitions {
            catalog.insert(&unit.path, name, definition);
        }
        imports.insert(unit.path.clone(), extract.scope);

        if unit.context_only || !module_allowed(target, unit, filter) {
            continue;
        }

        for function in extract.functions {
            if !filter.allows(NameKind::Function, &function.name) {
                info!(module = %unit.path, function = %function.name, "function skipped");
                continue;
            }
            candidates.push(Candidate {
                key: function_key(target, &unit.path, &function.name),
                module: unit.path.clone(),
                position: function.position,
                signature: function.signature,
            });
        }
    }

    let env = TypeEnvironment::new(catalog, imports);
    let mut resolver = Resolver::new(&env, options.import_depth);
    let mut compilation = Compilation::default();

    for candidate in candidates {
        let result = candidate
            .signature
            .and_then(|sig| compile_function(&sig, &mut resolver));
        match result {
            Ok(schema) => {
                debug!(function = %candidate.key, "compiled function");
                compilation.schemas.insert(candidate.key, schema);
            }
            Err(err) => {
                info!(function = %candidate.key, error = %err, "function excluded");
                compilation.diagnostics.push(Diagnostic {
                    function: candidate.key,
                    module: candidate.module,
                    line: candidate.position.map(|p| p.line),
                    column: candidate.position.map(|p| p.column),
                    code: err.code(),
                    message: err.to_string(),
                });
            }
        }
    }

    compilation
}

/// Resolve one signature into its input and output schema documents.
///
/// # Errors
///
/// Returns the first resolution error of any parameter or the return type.
pub fn compile_function(
    signature: &FunctionSignature,
    resolver: &mut Resolver<'_>,
) -> Result<FunctionSchema, ResolveError> {
    let mut fields = Fields::default();
    let mut additional_properties = AdditionalProperties::Closed;

    for param in &signature.parameters {
        let node = resolver.resolve(&param.annotation, &signature.module)?;
        if param.kind == ParamKind::VarKeyword {
            additional_properties = AdditionalProperties::Schema(Box::new(node));
            continue;
        }
        if param.is_required() {
            fields.required.push(param.name.clone());
        }
        fields.properties.insert(param.name.clone(), node);
    }

    let input = SchemaNode::Object(ObjectSchema {
        fields: Some(fields),
        additional_properties,
    });
    let output = resolver.resolve(&signature.returns, &signature.module)?;

    Ok(FunctionSchema {
        input: input.to_document(),
        output: output.to_document(),
    })
}

/// Modules below the scan root pass only if every path segment is allowed;
/// a package's `__init__` is judged by its directory name alone.
fn module_allowed(target: &ScanTarget, unit: &ModuleUnit, filter: &dyn NameFilter) -> bool {
    if target.kind == ScanKind::Module {
        return true;
    }
    let depth = target.root.segments().count();
    let allowed = unit
        .path
        .segments()
        .skip(depth)
        .all(|segment| filter.allows(NameKind::Module, segment));
    if !allowed {
        info!(module = %unit.path, "module skipped");
    }
    allowed
}

fn function_key(target: &ScanTarget, module: &ModulePath, function: &str) -> String {
    match target.kind {
        ScanKind::Module => function.to_string(),
        ScanKind::Package => module.join(function).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{AllowAll, PatternFilter};
    use crate::syntax::{Arg, Arguments, Expr, ImportName, Stmt};
    use serde_json::json;

    fn typing() -> Stmt {
        Stmt::import("typing")
    }

    fn typed(base: &str, args: Vec<Expr>) -> Expr {
        Expr::subscript(Expr::dotted(base), args)
    }

    fn package(modules: Vec<ModuleUnit>) -> ScanTarget {
        ScanTarget::package(ModulePath::new("pkg"), modules)
    }

    fn service_package() -> ScanTarget {
        let types = Module::new(vec![
            typing(),
            Stmt::assign("Tags", typed("typing.List", vec![Expr::name("str")])),
        ]);
        let service = Module::new(vec![
            typing(),
            Stmt::import_from(Some("types"), 1, vec![ImportName::new("Tags")]),
            Stmt::function(
                "start",
                Arguments::positional(vec![
                    Arg::new("port", Expr::name("int")),
                    Arg::new("tags", Expr::name("Tags")).with_default(),
                ]),
                Some(Expr::name("bool")),
            ),
            Stmt::function("stop", Arguments::default(), None),
        ]);
        package(vec![
            ModuleUnit::package_init(ModulePath::new("pkg"), Module::default()),
            ModuleUnit::new(ModulePath::new("pkg.service"), service),
            ModuleUnit::new(ModulePath::new("pkg.types"), types),
        ])
    }

    #[test]
    fn compiles_package_functions_with_qualified_keys() {
        let result = compile(&service_package(), &AllowAll, &CompileOptions::default());
        assert!(result.diagnostics.is_empty());

        let keys: Vec<&str> = result.schemas.keys().map(String::as_str).collect();
        assert_eq!(keys, ["pkg.service.start", "pkg.service.stop"]);

        let start = &result.schemas["pkg.service.start"];
        assert_eq!(
            start.input,
            json!({
                "$schema": "http://json-schema.org/draft-07/schema#",
                "type": "object",
                "properties": {
                    "port": { "type": "integer" },
                    "tags": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["port"],
                "additionalProperties": false
            })
        );
        assert_eq!(start.output["type"], "boolean");
        assert_eq!(result.schemas["pkg.service.stop"].output["type"], "null");
    }

    #[test]
    fn kwargs_become_additional_properties() {
        let module = Module::new(vec![Stmt::function(
            "configure",
            Arguments {
                args: vec![Arg::new("name", Expr::name("str"))],
                kwarg: Some(Arg::new("options", Expr::name("int"))),
                ..Arguments::default()
            },
            Some(Expr::none()),
        )]);
        let target = ScanTarget::module(ModuleUnit::new(ModulePath::new("svc"), module), vec![]);
        let result = compile(&target, &AllowAll, &CompileOptions::default());

        let input = &result.schemas["configure"].input;
        assert_eq!(input["additionalProperties"], json!({ "type": "integer" }));
        assert_eq!(input["required"], json!(["name"]));
        assert!(input["properties"].get("options").is_none());
    }

    #[test]
    fn failures_are_isolated_per_function() {
        let module = Module::new(vec![
            Stmt::function(
                "broken",
                Arguments::positional(vec![Arg::new("x", Expr::name("Missing"))]),
                None,
            ),
            Stmt::function(
                "untyped",
                Arguments::positional(vec![Arg::unannotated("x")]),
                None,
            ),
            Stmt::function("fine", Arguments::default(), Some(Expr::name("str"))),
        ]);
        let target = ScanTarget::module(ModuleUnit::new(ModulePath::new("svc"), module), vec![]);
        let result = compile(&target, &AllowAll, &CompileOptions::default());

        assert_eq!(result.schemas.keys().collect::<Vec<_>>(), ["fine"]);
        let codes: Vec<(&str, &str)> = result
            .diagnostics
            .iter()
            .map(|d| (d.function.as_str(), d.code))
            .collect();
        assert!(codes.contains(&("broken", "unresolved_type")));
        assert!(codes.contains(&("untyped", "invalid_signature")));
        assert!(result.diagnostics.iter().all(|d| d.module.as_str() == "svc"));
    }

    #[test]
    fn context_modules_supply_types_only() {
        let types = Module::new(vec![
            Stmt::assign("Port", Expr::name("int")),
            Stmt::function("helper", Arguments::default(), None),
        ]);
        let service = Module::new(vec![
            Stmt::import_from(Some("types"), 1, vec![ImportName::new("Port")]),
            Stmt::function(
                "listen",
                Arguments::positional(vec![Arg::new("port", Expr::name("Port"))]),
                None,
            ),
        ]);
        let target = ScanTarget::module(
            ModuleUnit::new(ModulePath::new("service"), service),
            vec![ModuleUnit::new(ModulePath::new("types"), types)],
        );
        let result = compile(&target, &AllowAll, &CompileOptions::default());

        assert_eq!(result.schemas.keys().collect::<Vec<_>>(), ["listen"]);
        assert_eq!(
            result.schemas["listen"].input["properties"]["port"],
            json!({ "type": "integer" })
        );
    }

    #[test]
    fn filters_apply_to_module_segments_and_function_names() {
        let filter = PatternFilter::new(Vec::<&str>::new(), ["types", "st?p"]).unwrap();
        let result = compile(&service_package(), &filter, &CompileOptions::default());

        // `pkg.types` is filtered out but its aliases still resolve.
        assert_eq!(result.schemas.keys().collect::<Vec<_>>(), ["pkg.service.start"]);

        let only_types = PatternFilter::new(["types"], Vec::<&str>::new()).unwrap();
        let result = compile(&service_package(), &only_types, &CompileOptions::default());
        assert!(result.schemas.is_empty());
    }

    #[test]
    fn package_init_is_exempt_from_module_filter() {
        let init = Module::new(vec![Stmt::function(
            "version",
            Arguments::default(),
            Some(Expr::name("str")),
        )]);
        let target = package(vec![ModuleUnit::package_init(ModulePath::new("pkg"), init)]);
        let filter = PatternFilter::new(["service", "version"], ["pkg"]).unwrap();

        let result = compile(&target, &filter, &CompileOptions::default());
        assert_eq!(result.schemas.keys().collect::<Vec<_>>(), ["pkg.version"]);
    }

    #[test]
    fn import_depth_limits_re_exports() {
        let base = Module::new(vec![Stmt::assign("Port", Expr::name("int"))]);
        let types = Module::new(vec![Stmt::import_from(Some("base"), 1, vec![ImportName::new("Port")])]);
        let service = Module::new(vec![
            Stmt::import_from(Some("types"), 1, vec![ImportName::new("Port")]),
            Stmt::function(
                "listen",
                Arguments::positional(vec![Arg::new("port", Expr::name("Port"))]),
                None,
            ),
        ]);
        let target = package(vec![
            ModuleUnit::package_init(ModulePath::new("pkg"), Module::default()),
            ModuleUnit::new(ModulePath::new("pkg.base"), base),
            ModuleUnit::new(ModulePath::new("pkg.service"), service),
            ModuleUnit::new(ModulePath::new("pkg.types"), types),
        ]);

        let shallow = compile(&target, &AllowAll, &CompileOptions::new().import_depth(1));
        assert!(shallow.schemas.is_empty());
        assert_eq!(shallow.diagnostics[0].code, "unresolved_type");

        let deep = compile(&target, &AllowAll, &CompileOptions::default());
        assert!(deep.schemas.contains_key("pkg.service.listen"));
    }

    #[test]
    fn compilation_renders_input_and_output() {
        let result = compile(&service_package(), &AllowAll, &CompileOptions::default());
        let value = result.to_value();
        assert_eq!(value["pkg.service.stop"]["output"]["type"], "null");
        assert_eq!(value["pkg.service.stop"]["input"]["required"], json!([]));
    }

    #[test]
    fn diagnostics_follow_definition_order() {
        let module = Module::new(vec![
            Stmt::function(
                "unresolved",
                Arguments::positional(vec![Arg::new("x", Expr::name("Missing"))]),
                None,
            )
            .at(1, 0),
            Stmt::function(
                "untyped",
                Arguments::positional(vec![Arg::unannotated("x")]),
                None,
            )
            .at(4, 0),
            Stmt::function(
                "also_unresolved",
                Arguments::positional(vec![Arg::new("y", Expr::name("Nope"))]),
                None,
            ),
        ]);
        let target = ScanTarget::module(ModuleUnit::new(ModulePath::new("svc"), module), vec![]);
        let result = compile(&target, &AllowAll, &CompileOptions::default());

        let order: Vec<&str> = result.diagnostics.iter().map(|d| d.function.as_str()).collect();
        assert_eq!(order, ["unresolved", "untyped", "also_unresolved"]);
        assert_eq!(result.diagnostics[1].line, Some(4));
        assert_eq!(result.diagnostics[1].column, Some(0));
        assert_eq!(result.diagnostics[2].line, None);

        let rendered = serde_json::to_value(&result.diagnostics[2]).unwrap();
        assert!(rendered.get("line").is_none());
    }
}
