//! Signature extraction - syntax tree to catalog entries and signatures.
//!
//! Purely syntactic: user code is never evaluated. Each top-level statement
//! is matched against the declaration shapes below; anything else is skipped.
//!
//! | Statement | Effect |
//! |-----------|--------|
//! | `import typing as t` | `t.List`, `t.Union`, ... become typing constructs |
//! | `import x` / `from x import y` | `x` / `y` become external names |
//! | `from .m import y as z` | edge to `m`, binding `z -> (m, y)` |
//! | `Name = <typing construct>` | type alias |
//! | `class Name(TypedDict, total=...)` | structured record |
//! | `def f(...) -> ...` | candidate signature |

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::catalog::{ModuleScope, TypeDefinition};
use crate::error::ResolveError;
use crate::syntax::{Constant, Expr, FunctionDef, ImportName, Keyword, Module, Position, Stmt};
use crate::types::{
    FunctionSignature, LiteralArg, LiteralValue, ModulePath, ParamKind, Parameter, Primitive,
    StructuredType, TypeExpr,
};

/// Modules whose exports are typing constructs.
pub const TYPING_MODULES: &[&str] = &["typing", "typing_extensions"];

/// Builtin names that have no JSON representation.
pub const NON_JSON_BUILTINS: &[&str] = &[
    "bytearray",
    "bytes",
    "complex",
    "frozenset",
    "memoryview",
    "object",
    "range",
    "set",
    "tuple",
    "type",
];

/// Typing constructs the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypingConstruct {
    Any,
    Dict,
    List,
    Literal,
    Optional,
    Union,
    TypedDict,
}

impl TypingConstruct {
    pub const ALL: [TypingConstruct; 7] = [
        TypingConstruct::Any,
        TypingConstruct::Dict,
        TypingConstruct::List,
        TypingConstruct::Literal,
        TypingConstruct::Optional,
        TypingConstruct::Union,
        TypingConstruct::TypedDict,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TypingConstruct::Any => "Any",
            TypingConstruct::Dict => "Dict",
            TypingConstruct::List => "List",
            TypingConstruct::Literal => "Literal",
            TypingConstruct::Optional => "Optional",
            TypingConstruct::Union => "Union",
            TypingConstruct::TypedDict => "TypedDict",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Constructs that take type arguments.
    pub fn is_generic(self) -> bool {
        !matches!(self, TypingConstruct::Any | TypingConstruct::TypedDict)
    }
}

/// Local names that refer to typing constructs in one module.
#[derive(Debug, Clone, Default)]
pub struct TypingNamespace {
    constructs: HashMap<String, TypingConstruct>,
    /// Aliases of the typing module itself (`t` for `import typing as t`).
    modules: HashSet<String>,
    /// Typing names imported that have no JSON mapping (`Callable`, ...).
    unsupported: HashSet<String>,
}

impl TypingNamespace {
    /// `import typing as <bound>`
    pub fn import_module(&mut self, bound: &str) {
        for construct in TypingConstruct::ALL {
            self.constructs
                .insert(format!("{}.{}", bound, construct.name()), construct);
        }
        self.modules.insert(bound.to_string());
    }

    /// `from typing import <name> as <bound>`
    pub fn import_name(&mut self, name: &str, bound: &str) {
        match TypingConstruct::from_name(name) {
            Some(construct) => {
                self.constructs.insert(bound.to_string(), construct);
            }
            None => {
                self.unsupported.insert(bound.to_string());
            }
        }
    }

    pub fn get(&self, dotted: &str) -> Option<TypingConstruct> {
        self.constructs.get(dotted).copied()
    }

    /// Typing name with no JSON mapping, bare or qualified.
    pub fn is_unsupported(&self, dotted: &str) -> bool {
        if self.unsupported.contains(dotted) {
            return true;
        }
        match dotted.rsplit_once('.') {
            Some((module, _)) => self.modules.contains(module),
            None => false,
        }
    }
}

/// Everything extracted from one module.
#[derive(Debug, Clone, Default)]
pub struct ModuleExtract {
    pub scope: ModuleScope,
    /// Aliases and records, in declaration order.
    pub definitions: IndexMap<String, TypeDefinition>,
    /// Every function definition, accepted or not, in source order.
    pub functions: Vec<ExtractedFunction>,
}

impl ModuleExtract {
    /// Functions that produced a signature.
    pub fn signatures(&self) -> impl Iterator<Item = &FunctionSignature> {
        self.functions.iter().filter_map(|f| f.signature.as_ref().ok())
    }

    /// Functions that could not be turned into a signature.
    pub fn rejected(&self) -> impl Iterator<Item = (&str, &ResolveError)> {
        self.functions
            .iter()
            .filter_map(|f| f.signature.as_ref().err().map(|err| (f.name.as_str(), err)))
    }
}

/// One function definition of a module.
#[derive(Debug, Clone)]
pub struct ExtractedFunction {
    pub name: String,
    pub position: Option<Position>,
    pub signature: Result<FunctionSignature, ResolveError>,
}

/// Extract catalog entries, import facts and signatures from one module.
///
/// `is_package` marks a package's `__init__` module, which changes how
/// relative imports are anchored.
pub fn extract_module(module: &ModulePath, is_package: bool, tree: &Module) -> ModuleExtract {
    let mut extractor = Extractor {
        module,
        is_package,
        typing: TypingNamespace::default(),
        out: ModuleExtract::default(),
    };
    for stmt in &tree.body {
        extractor.visit(stmt);
    }
    debug!(
        module = %module,
        definitions = extractor.out.definitions.len(),
        functions = extractor.out.signatures().count(),
        rejected = extractor.out.rejected().count(),
        "extracted module"
    );
    extractor.out
}

struct Extractor<'a> {
    module: &'a ModulePath,
    is_package: bool,
    typing: TypingNamespace,
    out: ModuleExtract,
}

impl Extractor<'_> {
    fn visit(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Import { names } => self.visit_import(names),
            Stmt::ImportFrom {
                module,
                level,
                names,
            } => self.visit_import_from(module.as_deref(), *level, names),
            Stmt::Assign { targets, value } => self.visit_assign(targets, value),
            Stmt::ClassDef {
                name,
                bases,
                keywords,
                body,
            } => self.visit_class(name, bases, keywords, body),
            Stmt::FunctionDef(def) => self.visit_function(def),
            Stmt::AnnAssign { .. } | Stmt::Other => {}
        }
    }

    fn visit_import(&mut self, names: &[ImportName]) {
        for import in names {
            if TYPING_MODULES.contains(&import.name.as_str()) {
                self.typing.import_module(import.bound_name());
                continue;
            }
            // `import a.b` binds `a`
            let bound = match &import.asname {
                Some(asname) => asname.as_str(),
                None => import.name.split('.').next().unwrap_or(&import.name),
            };
            self.out.scope.external.insert(bound.to_string());
        }
    }

    fn visit_import_from(&mut self, module: Option<&str>, level: u32, names: &[ImportName]) {
        if level == 0 {
            let Some(module) = module else {
                return;
            };
            if module == "__future__" {
                return;
            }
            let is_typing = TYPING_MODULES.contains(&module);
            for import in names.iter().filter(|n| n.name != "*") {
                if is_typing {
                    self.typing.import_name(&import.name, import.bound_name());
                } else {
                    self.out
                        .scope
                        .external
                        .insert(import.bound_name().to_string());
                }
            }
            return;
        }

        let Some(target) = self.module.relative(self.is_package, level, module) else {
            warn!(
                module = %self.module,
                level,
                "relative import climbs above the scan root; ignored"
            );
            return;
        };
        for import in names {
            if import.name == "*" {
                self.out.scope.add_relative(target.clone());
            } else {
                self.out
                    .scope
                    .bind(import.bound_name(), target.clone(), import.name.clone());
            }
        }
    }

    fn visit_assign(&mut self, targets: &[Expr], value: &Expr) {
        let [Expr::Name { id }] = targets else {
            return;
        };
        if !self.is_type_construct(value) {
            return;
        }
        let definition = match self.lower(value) {
            Ok(expr) => TypeDefinition::Alias(expr),
            Err(err) => {
                warn!(module = %self.module, alias = %id, error = %err, "invalid type alias");
                TypeDefinition::Invalid(err)
            }
        };
        self.out.definitions.insert(id.clone(), definition);
    }

    /// Whether an assignment value denotes a type rather than a runtime value.
    fn is_type_construct(&self, value: &Expr) -> bool {
        match value {
            Expr::Subscript { value: base, .. } => base
                .dotted_name()
                .and_then(|name| self.typing.get(&name))
                .is_some_and(TypingConstruct::is_generic),
            Expr::Name { id } => {
                self.typing.get(id) == Some(TypingConstruct::Any)
                    || Primitive::from_name(id).is_some()
                    || self.out.definitions.contains_key(id)
                    || self.out.scope.bindings.contains_key(id)
            }
            Expr::Attribute { .. } => value
                .dotted_name()
                .is_some_and(|name| self.typing.get(&name) == Some(TypingConstruct::Any)),
            _ => false,
        }
    }

    fn visit_class(&mut self, name: &str, bases: &[Expr], keywords: &[Keyword], body: &[Stmt]) {
        let is_record = bases.iter().any(|base| {
            base.dotted_name()
                .and_then(|n| self.typing.get(&n))
                .is_some_and(|c| c == TypingConstruct::TypedDict)
        });
        if !is_record {
            return;
        }

        let definition = match self.record(keywords, body) {
            Ok(record) => TypeDefinition::Record(record),
            Err(err) => {
                warn!(module = %self.module, record = %name, error = %err, "invalid record type");
                TypeDefinition::Invalid(err)
            }
        };
        self.out.definitions.insert(name.to_string(), definition);
    }

    fn record(&self, keywords: &[Keyword], body: &[Stmt]) -> Result<StructuredType, ResolveError> {
        let mut total = true;
        if let Some(keyword) = keywords.iter().find(|k| k.arg == "total") {
            match &keyword.value {
                Expr::Constant {
                    value: Constant::Bool(b),
                } => total = *b,
                other => {
                    return Err(ResolveError::unsupported(
                        format!("total={}", other.describe()),
                        "total must be True or False",
                    ))
                }
            }
        }

        let mut fields = IndexMap::new();
        for stmt in body {
            if let Stmt::AnnAssign {
                target: Expr::Name { id },
                annotation,
                ..
            } = stmt
            {
                fields.insert(id.clone(), self.lower(annotation)?);
            }
        }
        Ok(StructuredType { total, fields })
    }

    fn visit_function(&mut self, def: &FunctionDef) {
        let signature = self.signature(def);
        if let Err(err) = &signature {
            debug!(module = %self.module, function = %def.name, error = %err, "function rejected");
        }
        self.out.functions.push(ExtractedFunction {
            name: def.name.clone(),
            position: def.position(),
            signature,
        });
    }

    fn signature(&self, def: &FunctionDef) -> Result<FunctionSignature, ResolveError> {
        let name = def.name.as_str();
        let args = &def.args;

        if !args.posonlyargs.is_empty() {
            return Err(ResolveError::invalid_signature(
                name,
                "contains positional-only arguments",
            ));
        }
        if let Some(vararg) = &args.vararg {
            return Err(ResolveError::invalid_signature(
                name,
                format!(
                    "contains a variable number of positional arguments (*{})",
                    vararg.name
                ),
            ));
        }

        let mut parameters = Vec::new();
        let declared = args
            .args
            .iter()
            .map(|arg| (arg, ParamKind::Positional))
            .chain(args.kwonlyargs.iter().map(|arg| (arg, ParamKind::KeywordOnly)));
        for (arg, kind) in declared {
            let Some(annotation) = &arg.annotation else {
                return Err(ResolveError::invalid_signature(
                    name,
                    format!("missing type annotation for the parameter '{}'", arg.name),
                ));
            };
            parameters.push(Parameter {
                name: arg.name.clone(),
                annotation: self.lower(annotation)?,
                has_default: arg.has_default,
                kind,
            });
        }

        if let Some(kwarg) = &args.kwarg {
            let Some(annotation) = &kwarg.annotation else {
                return Err(ResolveError::invalid_signature(
                    name,
                    format!("missing type annotation for **{}", kwarg.name),
                ));
            };
            parameters.push(Parameter {
                name: kwarg.name.clone(),
                annotation: self.lower(annotation)?,
                has_default: false,
                kind: ParamKind::VarKeyword,
            });
        }

        // No return annotation means the function returns None.
        let returns = match &def.returns {
            Some(expr) => self.lower(expr)?,
            None => TypeExpr::None,
        };

        Ok(FunctionSignature {
            name: name.to_string(),
            module: self.module.clone(),
            parameters,
            returns,
        })
    }

    /// Classify an annotation expression into a `TypeExpr`.
    fn lower(&self, expr: &Expr) -> Result<TypeExpr, ResolveError> {
        match expr {
            Expr::Constant {
                value: Constant::None,
            } => Ok(TypeExpr::None),
            Expr::Constant { value } => Err(ResolveError::unsupported(
                value.describe(),
                "the only valid constant annotation is None",
            )),
            Expr::Name { .. } | Expr::Attribute { .. } => self.lower_name(expr),
            Expr::Subscript { value, slice } => self.lower_subscript(expr, value, slice),
            Expr::Tuple { .. } | Expr::Other => Err(ResolveError::unsupported(
                expr.describe(),
                "not a type annotation",
            )),
        }
    }

    fn lower_name(&self, expr: &Expr) -> Result<TypeExpr, ResolveError> {
        let Some(dotted) = expr.dotted_name() else {
            return Err(ResolveError::unsupported(
                expr.describe(),
                "not a type annotation",
            ));
        };

        match self.typing.get(&dotted) {
            Some(TypingConstruct::Any) => return Ok(TypeExpr::Any),
            Some(TypingConstruct::TypedDict) => {
                return Err(ResolveError::unsupported(
                    dotted,
                    "TypedDict is only valid as a base class",
                ))
            }
            Some(construct) => {
                return Err(ResolveError::unsupported(
                    dotted,
                    format!("{} requires type arguments", construct.name()),
                ))
            }
            None => {}
        }
        if self.typing.is_unsupported(&dotted) {
            return Ok(TypeExpr::Unsupported(dotted));
        }

        if let Expr::Name { id } = expr {
            if let Some(primitive) = Primitive::from_name(id) {
                return Ok(TypeExpr::Primitive(primitive));
            }
            if NON_JSON_BUILTINS.contains(&id.as_str()) {
                return Ok(TypeExpr::Unsupported(id.clone()));
            }
            return Ok(TypeExpr::Reference(id.clone()));
        }

        let root = dotted.split('.').next().unwrap_or_default();
        if self.out.scope.is_external(root) {
            return Ok(TypeExpr::External(dotted));
        }
        Err(ResolveError::unsupported(
            dotted,
            "qualified names are only supported for typing constructs",
        ))
    }

    fn lower_subscript(&self, expr: &Expr, base: &Expr, slice: &Expr) -> Result<TypeExpr, ResolveError> {
        let construct = base
            .dotted_name()
            .and_then(|name| self.typing.get(&name))
            .filter(|c| c.is_generic());
        let Some(construct) = construct else {
            return Err(ResolveError::unsupported(
                expr.describe(),
                "only Dict, List, Literal, Optional and Union can be subscripted",
            ));
        };

        let args: Vec<&Expr> = match slice {
            Expr::Tuple { elts } => elts.iter().collect(),
            single => vec![single],
        };
        let arity = |expected: usize| {
            ResolveError::unsupported(
                expr.describe(),
                format!(
                    "{} expects {} type argument(s), got {}",
                    construct.name(),
                    expected,
                    args.len()
                ),
            )
        };

        match construct {
            TypingConstruct::List => match args.as_slice() {
                [item] => Ok(TypeExpr::List(Box::new(self.lower(item)?))),
                _ => Err(arity(1)),
            },
            TypingConstruct::Optional => match args.as_slice() {
                [inner] => Ok(TypeExpr::Optional(Box::new(self.lower(inner)?))),
                _ => Err(arity(1)),
            },
            TypingConstruct::Dict => match args.as_slice() {
                [key, value] => Ok(TypeExpr::Dict(
                    Box::new(self.lower(key)?),
                    Box::new(self.lower(value)?),
                )),
                _ => Err(arity(2)),
            },
            TypingConstruct::Union if !args.is_empty() => {
                let members = args
                    .iter()
                    .map(|arg| self.lower(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(TypeExpr::Union(members))
            }
            TypingConstruct::Literal if !args.is_empty() => {
                Ok(TypeExpr::Literal(args.iter().map(|arg| literal_arg(arg)).collect()))
            }
            _ => Err(ResolveError::unsupported(
                expr.describe(),
                format!("{} requires at least one argument", construct.name()),
            )),
        }
    }
}

fn literal_arg(expr: &Expr) -> LiteralArg {
    let Expr::Constant { value } = expr else {
        return LiteralArg::Invalid(expr.describe());
    };
    match value {
        Constant::None => LiteralArg::Value(LiteralValue::Null),
        Constant::Bool(b) => LiteralArg::Value(LiteralValue::Bool(*b)),
        Constant::Int(i) => LiteralArg::Value(LiteralValue::Int(*i)),
        Constant::Float(f) => LiteralArg::Value(LiteralValue::Float(*f)),
        Constant::Str(s) => LiteralArg::Value(LiteralValue::Str(s.clone())),
        Constant::Bytes(_) | Constant::Complex(_) | Constant::Ellipsis => {
            LiteralArg::Invalid(value.describe())
        }
    }
}
