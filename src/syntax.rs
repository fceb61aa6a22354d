//! Parsed module representation.
//!
//! Source text is parsed upstream; this crate consumes the resulting tree as a
//! serde document. Only the statement and expression shapes that matter for
//! signature extraction are modelled. Everything else deserializes to `Other`
//! and is ignored.
//!
//! # Document Format
//!
//! ```json
//! {
//!   "body": [
//!     { "kind": "import", "names": [{ "name": "typing" }] },
//!     {
//!       "kind": "function_def",
//!       "name": "start",
//!       "args": { "args": [{ "name": "port", "annotation": { "kind": "name", "id": "int" } }] },
//!       "returns": { "kind": "constant", "value": "none" }
//!     }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};

/// One parsed source file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Module {
    #[serde(default)]
    pub body: Vec<Stmt>,
}

impl Module {
    pub fn new(body: Vec<Stmt>) -> Self {
        Self { body }
    }
}

/// Top-level statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Stmt {
    /// `import a.b as c`
    Import { names: Vec<ImportName> },
    /// `from ..module import name as alias`; `level` 0 is an absolute import.
    ImportFrom {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        module: Option<String>,
        #[serde(default)]
        level: u32,
        names: Vec<ImportName>,
    },
    /// `target = value`
    Assign { targets: Vec<Expr>, value: Expr },
    /// `target: annotation [= value]`
    AnnAssign {
        target: Expr,
        annotation: Expr,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Expr>,
    },
    ClassDef {
        name: String,
        #[serde(default)]
        bases: Vec<Expr>,
        #[serde(default)]
        keywords: Vec<Keyword>,
        #[serde(default)]
        body: Vec<Stmt>,
    },
    FunctionDef(FunctionDef),
    #[serde(other)]
    Other,
}

/// A name imported by `import` or `from ... import`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportName {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asname: Option<String>,
}

impl ImportName {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            asname: None,
        }
    }

    pub fn aliased(name: impl Into<String>, asname: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            asname: Some(asname.into()),
        }
    }

    /// The name this import binds in the importing module.
    pub fn bound_name(&self) -> &str {
        self.asname.as_deref().unwrap_or(&self.name)
    }
}

/// `name=value` in a class base list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub arg: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    #[serde(default)]
    pub args: Arguments,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<Expr>,
    /// 1-based line of the `def`, when the parser records it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineno: Option<u32>,
    /// 0-based column of the `def`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub col_offset: Option<u32>,
}

impl FunctionDef {
    pub fn position(&self) -> Option<Position> {
        self.lineno.map(|line| Position {
            line,
            column: self.col_offset.unwrap_or(0),
        })
    }
}

/// Source position of a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

/// Parameter list of a function definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Arguments {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub posonlyargs: Vec<Arg>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Arg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vararg: Option<Arg>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kwonlyargs: Vec<Arg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kwarg: Option<Arg>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arg {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<Expr>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub has_default: bool,
}

impl Arg {
    pub fn new(name: impl Into<String>, annotation: Expr) -> Self {
        Self {
            name: name.into(),
            annotation: Some(annotation),
            has_default: false,
        }
    }

    pub fn unannotated(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            annotation: None,
            has_default: false,
        }
    }

    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }
}

/// Expression node. Annotations are expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    Name {
        id: String,
    },
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    Subscript {
        value: Box<Expr>,
        slice: Box<Expr>,
    },
    Tuple {
        elts: Vec<Expr>,
    },
    Constant {
        value: Constant,
    },
    #[serde(other)]
    Other,
}

/// Literal constant as written in source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constant {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(String),
    Complex(String),
    Ellipsis,
}

impl Expr {
    pub fn name(id: impl Into<String>) -> Self {
        Expr::Name { id: id.into() }
    }

    /// Builds `a.b.c` from a dotted path.
    pub fn dotted(path: &str) -> Self {
        let mut parts = path.split('.');
        let first = Expr::name(parts.next().unwrap_or_default());
        parts.fold(first, |value, attr| Expr::Attribute {
            value: Box::new(value),
            attr: attr.to_string(),
        })
    }

    /// Builds `base[arg]`, or `base[a, b, ...]` when more than one argument is given.
    pub fn subscript(base: Expr, mut args: Vec<Expr>) -> Self {
        let slice = if args.len() == 1 {
            args.remove(0)
        } else {
            Expr::Tuple { elts: args }
        };
        Expr::Subscript {
            value: Box::new(base),
            slice: Box::new(slice),
        }
    }

    pub fn constant(value: Constant) -> Self {
        Expr::Constant { value }
    }

    pub fn none() -> Self {
        Expr::constant(Constant::None)
    }

    pub fn str(value: impl Into<String>) -> Self {
        Expr::constant(Constant::Str(value.into()))
    }

    /// Dotted form of a `Name`/`Attribute` chain, e.g. `typing.List`.
    pub fn dotted_name(&self) -> Option<String> {
        match self {
            Expr::Name { id } => Some(id.clone()),
            Expr::Attribute { value, attr } => {
                value.dotted_name().map(|base| format!("{}.{}", base, attr))
            }
            _ => None,
        }
    }

    /// Short human-readable rendering for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Expr::Name { .. } | Expr::Attribute { .. } => {
                self.dotted_name().unwrap_or_else(|| "<attribute>".to_string())
            }
            Expr::Subscript { value, slice } => {
                format!("{}[{}]", value.describe(), slice.describe())
            }
            Expr::Tuple { elts } => elts
                .iter()
                .map(Expr::describe)
                .collect::<Vec<_>>()
                .join(", "),
            Expr::Constant { value } => value.describe(),
            Expr::Other => "<expression>".to_string(),
        }
    }
}

impl Constant {
    pub fn describe(&self) -> String {
        match self {
            Constant::None => "None".to_string(),
            Constant::Bool(true) => "True".to_string(),
            Constant::Bool(false) => "False".to_string(),
            Constant::Int(i) => i.to_string(),
            Constant::Float(f) => format!("{:?}", f),
            Constant::Str(s) => format!("'{}'", s),
            Constant::Bytes(b) => format!("b'{}'", b),
            Constant::Complex(c) => c.clone(),
            Constant::Ellipsis => "...".to_string(),
        }
    }
}

impl Stmt {
    pub fn import(module: impl Into<String>) -> Self {
        Stmt::Import {
            names: vec![ImportName::new(module)],
        }
    }

    pub fn import_from(module: Option<&str>, level: u32, names: Vec<ImportName>) -> Self {
        Stmt::ImportFrom {
            module: module.map(str::to_string),
            level,
            names,
        }
    }

    pub fn assign(target: impl Into<String>, value: Expr) -> Self {
        Stmt::Assign {
            targets: vec![Expr::name(target)],
            value,
        }
    }

    pub fn field(name: impl Into<String>, annotation: Expr) -> Self {
        Stmt::AnnAssign {
            target: Expr::name(name),
            annotation,
            value: None,
        }
    }

    pub fn class(name: impl Into<String>, bases: Vec<Expr>, body: Vec<Stmt>) -> Self {
        Stmt::ClassDef {
            name: name.into(),
            bases,
            keywords: Vec::new(),
            body,
        }
    }

    pub fn function(name: impl Into<String>, args: Arguments, returns: Option<Expr>) -> Self {
        Stmt::FunctionDef(FunctionDef {
            name: name.into(),
            args,
            returns,
            lineno: None,
            col_offset: None,
        })
    }

    /// Records a source position on a function definition; other statements
    /// are returned unchanged.
    pub fn at(mut self, line: u32, column: u32) -> Self {
        if let Stmt::FunctionDef(def) = &mut self {
            def.lineno = Some(line);
            def.col_offset = Some(column);
        }
        self
    }
}

impl Arguments {
    pub fn positional(args: Vec<Arg>) -> Self {
        Self {
            args,
            ..Self::default()
        }
    }
}
