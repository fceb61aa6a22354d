//! Type resolution - turns type expressions into schema nodes.

use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::catalog::{Lookup, TypeDefinition, TypeEnvironment};
use crate::error::ResolveError;
use crate::types::{LiteralArg, ModulePath, SchemaNode, StructuredType, TypeExpr};

type TypeKey = (ModulePath, String);

/// Resolves type expressions against one run's catalog and import graph.
///
/// Successful alias/record resolutions are memoized for the lifetime of the
/// resolver; drop it at the end of the run.
pub struct Resolver<'a> {
    env: &'a TypeEnvironment,
    max_hops: usize,
    memo: HashMap<TypeKey, SchemaNode>,
    visiting: IndexSet<TypeKey>,
}

impl<'a> Resolver<'a> {
    /// `max_hops` bounds how many relative imports a name lookup may follow.
    pub fn new(env: &'a TypeEnvironment, max_hops: usize) -> Self {
        Self {
            env,
            max_hops,
            memo: HashMap::new(),
            visiting: IndexSet::new(),
        }
    }

    /// Resolve `expr` as written in `module`.
    ///
    /// # Errors
    ///
    /// Returns the first `ResolveError` hit anywhere in the expression; no
    /// partial schema is produced.
    pub fn resolve(&mut self, expr: &TypeExpr, module: &ModulePath) -> Result<SchemaNode, ResolveError> {
        match expr {
            TypeExpr::Primitive(p) => Ok(SchemaNode::from_primitive(*p)),
            TypeExpr::None => Ok(SchemaNode::Null),
            TypeExpr::Any => Ok(SchemaNode::any()),
            TypeExpr::List(item) => Ok(SchemaNode::array(self.resolve(item, module)?)),
            TypeExpr::Dict(key, value) => {
                if self.resolve(key, module)? != SchemaNode::String {
                    return Err(ResolveError::UnsupportedKeyType {
                        annotation: expr.to_string(),
                    });
                }
                Ok(SchemaNode::map(self.resolve(value, module)?))
            }
            TypeExpr::Optional(inner) => self.resolve_union([inner.as_ref(), &TypeExpr::None], module),
            TypeExpr::Union(members) => self.resolve_union(members, module),
            TypeExpr::Literal(args) => resolve_literal(args),
            TypeExpr::Reference(name) => self.resolve_reference(name, module),
            TypeExpr::External(name) => Err(ResolveError::UnsupportedExternalType {
                name: name.clone(),
                module: module.to_string(),
            }),
            TypeExpr::Unsupported(name) => Err(ResolveError::unsupported(
                name.clone(),
                "type has no JSON representation",
            )),
        }
    }

    fn resolve_union<'e>(
        &mut self,
        members: impl IntoIterator<Item = &'e TypeExpr>,
        module: &ModulePath,
    ) -> Result<SchemaNode, ResolveError> {
        let mut variants = Vec::new();
        for member in members {
            match self.resolve(member, module)? {
                SchemaNode::AnyOf(nested) => {
                    for variant in nested {
                        push_unique(&mut variants, variant);
                    }
                }
                node => push_unique(&mut variants, node),
            }
        }
        Ok(SchemaNode::AnyOf(variants))
    }

    fn resolve_reference(&mut self, name: &str, module: &ModulePath) -> Result<SchemaNode, ResolveError> {
        let env = self.env;
        let (def_module, def_name, definition) = match env.lookup(module, name, self.max_hops) {
            Lookup::Found {
                module,
                name,
                definition,
            } => (module, name, definition),
            Lookup::External => {
                return Err(ResolveError::UnsupportedExternalType {
                    name: name.to_string(),
                    module: module.to_string(),
                })
            }
            Lookup::Missing => {
                return Err(ResolveError::UnresolvedType {
                    name: name.to_string(),
                    module: module.to_string(),
                })
            }
        };

        let key = (def_module.clone(), def_name.to_string());
        if let Some(node) = self.memo.get(&key) {
            return Ok(node.clone());
        }
        if let Some(start) = self.visiting.get_index_of(&key) {
            let chain = self
                .visiting
                .iter()
                .skip(start)
                .chain(std::iter::once(&key))
                .map(qualified)
                .collect();
            return Err(ResolveError::CyclicTypeDefinition { chain });
        }

        self.visiting.insert(key.clone());
        let result = match definition {
            TypeDefinition::Alias(expr) => self.resolve(expr, def_module),
            TypeDefinition::Record(record) => self.resolve_record(record, def_module),
            TypeDefinition::Invalid(err) => Err(err.clone()),
        };
        self.visiting.pop();

        if let Ok(node) = &result {
            debug!(module = %def_module, name = def_name, "resolved type");
            self.memo.insert(key, node.clone());
        }
        result
    }

    fn resolve_record(&mut self, record: &StructuredType, module: &ModulePath) -> Result<SchemaNode, ResolveError> {
        let mut properties = IndexMap::with_capacity(record.fields.len());
        for (field, expr) in &record.fields {
            properties.insert(field.clone(), self.resolve(expr, module)?);
        }
        let required = if record.total {
            record.fields.keys().cloned().collect()
        } else {
            Vec::new()
        };
        Ok(SchemaNode::record(properties, required))
    }
}

fn resolve_literal(args: &[LiteralArg]) -> Result<SchemaNode, ResolveError> {
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        match arg {
            LiteralArg::Value(value) => values.push(value.clone()),
            LiteralArg::Invalid(raw) => {
                return Err(ResolveError::UnsupportedLiteralValue { value: raw.clone() })
            }
        }
    }
    Ok(SchemaNode::Enum(values))
}

fn push_unique(variants: &mut Vec<SchemaNode>, node: SchemaNode) {
    if !variants.contains(&node) {
        variants.push(node);
    }
}

fn qualified((module, name): &TypeKey) -> String {
    if module.is_root() {
        name.clone()
    } else {
        format!("{}.{}", module, name)
    }
}
