//! Function Signature Schema Compiler
//!
//! Compiles type-annotated function signatures into JSON Schema (draft-07)
//! documents: one schema for the input keyword arguments and one for the
//! return value.
//!
//! Source files are consumed as parsed syntax trees (see [`syntax`]). The
//! compiler never executes or imports anything; aliases, `TypedDict`-style
//! records and relative imports are all resolved statically.
//!
//! # Example
//!
//! ```
//! use sigschema::syntax::{Arg, Arguments, Expr, Module, Stmt};
//! use sigschema::{compile, AllowAll, CompileOptions, ModulePath, ModuleUnit, ScanTarget};
//!
//! let tree = Module::new(vec![
//!     Stmt::import("typing"),
//!     Stmt::function(
//!         "greet",
//!         Arguments::positional(vec![
//!             Arg::new("name", Expr::name("str")),
//!             Arg::new("times", Expr::name("int")).with_default(),
//!         ]),
//!         Some(Expr::subscript(Expr::dotted("typing.List"), vec![Expr::name("str")])),
//!     ),
//! ]);
//!
//! let target = ScanTarget::module(ModuleUnit::new(ModulePath::new("hello"), tree), vec![]);
//! let result = compile(&target, &AllowAll, &CompileOptions::default());
//!
//! let greet = &result.schemas["greet"];
//! assert_eq!(greet.input["required"], serde_json::json!(["name"]));
//! assert_eq!(greet.output["items"]["type"], "string");
//! ```
//!
//! # Type Mapping
//!
//! | Annotation | Schema |
//! |------------|--------|
//! | `bool` / `int` / `float` / `str` | `boolean` / `integer` / `number` / `string` |
//! | `None` | `null` |
//! | `List[T]` | `array` with `items` |
//! | `Dict[str, T]` | `object` with `additionalProperties` |
//! | `Optional[T]`, `Union[...]` | `anyOf` (flattened, de-duplicated) |
//! | `Literal[...]` | `enum` |
//! | `Any` | `anyOf` over every JSON type |
//! | `TypedDict` record | closed `object`; `total=False` empties `required` |

pub mod syntax;

mod catalog;
mod compiler;
mod error;
mod extractor;
mod filter;
mod loader;
mod resolver;
mod types;

pub use catalog::{ImportGraph, Lookup, ModuleScope, TypeCatalog, TypeDefinition, TypeEnvironment};
pub use compiler::{
    compile, compile_function, CompileOptions, Compilation, Diagnostic, FunctionSchema, ModuleUnit,
    ScanKind, ScanTarget, DEFAULT_IMPORT_DEPTH,
};
pub use error::{FilterError, LoadError, ResolveError};
pub use extractor::{extract_module, ExtractedFunction, ModuleExtract};
pub use filter::{AllowAll, NameFilter, NameKind, PatternFilter};
pub use loader::{discover, load_module, load_module_str, load_package};
pub use resolver::Resolver;
pub use types::{
    AdditionalProperties, Fields, FunctionSignature, LiteralArg, LiteralValue, ModulePath,
    ObjectSchema, ParamKind, Parameter, Primitive, SchemaNode, StructuredType, TypeExpr,
    JSON_SCHEMA_DRAFT,
};
