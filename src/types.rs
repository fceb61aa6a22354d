//! Core types: type expressions, schema nodes and extracted signatures.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

/// `$schema` header emitted at the root of every compiled schema.
pub const JSON_SCHEMA_DRAFT: &str = "http://json-schema.org/draft-07/schema#";

/// Dotted module path relative to the scan root (e.g. `example.config.prod`).
///
/// The empty path is the anonymous root package of a single-file scan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ModulePath(String);

impl ModulePath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn root() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.').filter(|s| !s.is_empty())
    }

    /// Containing package, or `None` for the root.
    pub fn parent(&self) -> Option<ModulePath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('.') {
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => Some(Self::root()),
        }
    }

    /// Appends a dotted suffix.
    pub fn join(&self, child: &str) -> ModulePath {
        if self.is_root() {
            Self(child.to_string())
        } else if child.is_empty() {
            self.clone()
        } else {
            Self(format!("{}.{}", self.0, child))
        }
    }

    /// Module targeted by a relative import of the given `level` (1 = `.`).
    ///
    /// `is_package` is true when `self` is a package's `__init__` module,
    /// whose own package is itself rather than its parent.
    /// Returns `None` when the import climbs above the scan root.
    pub fn relative(&self, is_package: bool, level: u32, module: Option<&str>) -> Option<ModulePath> {
        let mut base = if is_package {
            self.clone()
        } else {
            self.parent()?
        };
        for _ in 1..level {
            base = base.parent()?;
        }
        Some(match module {
            Some(m) => base.join(m),
            None => base,
        })
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// JSON-representable builtin types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Bool,
    Int,
    Float,
    Str,
}

impl Primitive {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "bool" => Some(Primitive::Bool),
            "int" => Some(Primitive::Int),
            "float" => Some(Primitive::Float),
            "str" => Some(Primitive::Str),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Primitive::Bool => "bool",
            Primitive::Int => "int",
            Primitive::Float => "float",
            Primitive::Str => "str",
        }
    }
}

/// A JSON primitive usable as an enum member.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl LiteralValue {
    pub fn to_value(&self) -> Value {
        match self {
            LiteralValue::Null => Value::Null,
            LiteralValue::Bool(b) => Value::Bool(*b),
            LiteralValue::Int(i) => Value::from(*i),
            LiteralValue::Float(f) => Value::from(*f),
            LiteralValue::Str(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::Null => f.write_str("None"),
            LiteralValue::Bool(true) => f.write_str("True"),
            LiteralValue::Bool(false) => f.write_str("False"),
            LiteralValue::Int(i) => write!(f, "{}", i),
            LiteralValue::Float(x) => write!(f, "{:?}", x),
            LiteralValue::Str(s) => write!(f, "'{}'", s),
        }
    }
}

/// Member of a `Literal[...]` as written. Non-primitive members are kept so
/// that resolution can reject them.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralArg {
    Value(LiteralValue),
    Invalid(String),
}

/// Syntactic type annotation, classified into the shapes the resolver knows.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Primitive(Primitive),
    None,
    Any,
    List(Box<TypeExpr>),
    Dict(Box<TypeExpr>, Box<TypeExpr>),
    Optional(Box<TypeExpr>),
    Union(Vec<TypeExpr>),
    Literal(Vec<LiteralArg>),
    /// User-defined alias or record, looked up through the catalog.
    Reference(String),
    /// Dotted name rooted in an absolute (non-relative) import.
    External(String),
    /// Builtin with no JSON representation (`complex`, `bytes`, ...).
    Unsupported(String),
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(items: &[TypeExpr]) -> String {
            items
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        }

        match self {
            TypeExpr::Primitive(p) => f.write_str(p.name()),
            TypeExpr::None => f.write_str("None"),
            TypeExpr::Any => f.write_str("Any"),
            TypeExpr::List(item) => write!(f, "List[{}]", item),
            TypeExpr::Dict(key, value) => write!(f, "Dict[{}, {}]", key, value),
            TypeExpr::Optional(inner) => write!(f, "Optional[{}]", inner),
            TypeExpr::Union(members) => write!(f, "Union[{}]", join(members)),
            TypeExpr::Literal(args) => {
                let rendered: Vec<String> = args
                    .iter()
                    .map(|arg| match arg {
                        LiteralArg::Value(v) => v.to_string(),
                        LiteralArg::Invalid(raw) => raw.clone(),
                    })
                    .collect();
                write!(f, "Literal[{}]", rendered.join(", "))
            }
            TypeExpr::Reference(name) | TypeExpr::External(name) | TypeExpr::Unsupported(name) => {
                f.write_str(name)
            }
        }
    }
}

/// `TypedDict`-style record declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredType {
    /// False when declared with `total=False`.
    pub total: bool,
    pub fields: IndexMap<String, TypeExpr>,
}

/// How a parameter is passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    Positional,
    KeywordOnly,
    /// `**kwargs` catch-all.
    VarKeyword,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub annotation: TypeExpr,
    pub has_default: bool,
    pub kind: ParamKind,
}

impl Parameter {
    /// Required in the compiled input object.
    pub fn is_required(&self) -> bool {
        !self.has_default && self.kind != ParamKind::VarKeyword
    }
}

/// Fully annotated function accepted by the extractor, not yet resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    pub name: String,
    pub module: ModulePath,
    pub parameters: Vec<Parameter>,
    pub returns: TypeExpr,
}

/// `additionalProperties` of an object schema.
#[derive(Debug, Clone, PartialEq)]
pub enum AdditionalProperties {
    /// Keyword omitted.
    Unconstrained,
    /// `false`
    Closed,
    Schema(Box<SchemaNode>),
}

/// Declared properties of an object schema.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fields {
    pub properties: IndexMap<String, SchemaNode>,
    pub required: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSchema {
    /// `None` emits neither `properties` nor `required`.
    pub fields: Option<Fields>,
    pub additional_properties: AdditionalProperties,
}

/// Normalized JSON-Schema-shaped tree.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Enum(Vec<LiteralValue>),
    /// `None` items means any array.
    Array(Option<Box<SchemaNode>>),
    Object(ObjectSchema),
    AnyOf(Vec<SchemaNode>),
}

impl SchemaNode {
    /// Unconstrained JSON value: every JSON type, in fixed order.
    pub fn any() -> Self {
        SchemaNode::AnyOf(vec![
            SchemaNode::any_object(),
            SchemaNode::Array(None),
            SchemaNode::Null,
            SchemaNode::String,
            SchemaNode::Boolean,
            SchemaNode::Integer,
            SchemaNode::Number,
        ])
    }

    pub fn any_object() -> Self {
        SchemaNode::Object(ObjectSchema {
            fields: None,
            additional_properties: AdditionalProperties::Unconstrained,
        })
    }

    pub fn array(items: SchemaNode) -> Self {
        SchemaNode::Array(Some(Box::new(items)))
    }

    /// String-keyed mapping with uniform values.
    pub fn map(values: SchemaNode) -> Self {
        SchemaNode::Object(ObjectSchema {
            fields: None,
            additional_properties: AdditionalProperties::Schema(Box::new(values)),
        })
    }

    /// Closed object with declared properties.
    pub fn record(properties: IndexMap<String, SchemaNode>, required: Vec<String>) -> Self {
        SchemaNode::Object(ObjectSchema {
            fields: Some(Fields {
                properties,
                required,
            }),
            additional_properties: AdditionalProperties::Closed,
        })
    }

    pub fn from_primitive(primitive: Primitive) -> Self {
        match primitive {
            Primitive::Bool => SchemaNode::Boolean,
            Primitive::Int => SchemaNode::Integer,
            Primitive::Float => SchemaNode::Number,
            Primitive::Str => SchemaNode::String,
        }
    }

    /// JSON rendering of this node.
    pub fn to_value(&self) -> Value {
        Value::Object(self.to_map())
    }

    /// JSON rendering with the draft-07 `$schema` header as the first key.
    pub fn to_document(&self) -> Value {
        let mut doc = Map::new();
        doc.insert(
            "$schema".to_string(),
            Value::String(JSON_SCHEMA_DRAFT.to_string()),
        );
        doc.extend(self.to_map());
        Value::Object(doc)
    }

    fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        match self {
            SchemaNode::Null => type_keyword(&mut map, "null"),
            SchemaNode::Boolean => type_keyword(&mut map, "boolean"),
            SchemaNode::Integer => type_keyword(&mut map, "integer"),
            SchemaNode::Number => type_keyword(&mut map, "number"),
            SchemaNode::String => type_keyword(&mut map, "string"),
            SchemaNode::Enum(values) => {
                map.insert(
                    "enum".to_string(),
                    Value::Array(values.iter().map(LiteralValue::to_value).collect()),
                );
            }
            SchemaNode::Array(items) => {
                type_keyword(&mut map, "array");
                if let Some(items) = items {
                    map.insert("items".to_string(), items.to_value());
                }
            }
            SchemaNode::Object(object) => {
                type_keyword(&mut map, "object");
                if let Some(fields) = &object.fields {
                    let properties = fields
                        .properties
                        .iter()
                        .map(|(name, node)| (name.clone(), node.to_value()))
                        .collect();
                    map.insert("properties".to_string(), Value::Object(properties));
                    map.insert(
                        "required".to_string(),
                        Value::Array(
                            fields
                                .required
                                .iter()
                                .cloned()
                                .map(Value::String)
                                .collect(),
                        ),
                    );
                }
                match &object.additional_properties {
                    AdditionalProperties::Unconstrained => {}
                    AdditionalProperties::Closed => {
                        map.insert("additionalProperties".to_string(), Value::Bool(false));
                    }
                    AdditionalProperties::Schema(node) => {
                        map.insert("additionalProperties".to_string(), node.to_value());
                    }
                }
            }
            SchemaNode::AnyOf(variants) => {
                map.insert(
                    "anyOf".to_string(),
                    Value::Array(variants.iter().map(SchemaNode::to_value).collect()),
                );
            }
        }
        map
    }
}

fn type_keyword(map: &mut Map<String, Value>, name: &str) {
    map.insert("type".to_string(), Value::String(name.to_string()));
}

impl Serialize for SchemaNode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}
