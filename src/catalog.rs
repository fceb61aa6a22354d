//! Type catalog and import graph.
//!
//! Both are written once while modules are extracted and are read-only while
//! types resolve. `TypeEnvironment::lookup` performs cross-module name
//! resolution lazily, hop by hop along relative imports.

use std::collections::{HashMap, HashSet};

use indexmap::{IndexMap, IndexSet};

use crate::error::ResolveError;
use crate::types::{ModulePath, StructuredType, TypeExpr};

/// A user-defined type registered by a module.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDefinition {
    Alias(TypeExpr),
    Record(StructuredType),
    /// Declaration that failed to extract; referencing it reports this error.
    Invalid(ResolveError),
}

/// Every alias and record of a run, keyed by `(module, name)`.
#[derive(Debug, Clone, Default)]
pub struct TypeCatalog {
    modules: HashMap<ModulePath, IndexMap<String, TypeDefinition>>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, module: &ModulePath, name: impl Into<String>, def: TypeDefinition) {
        self.modules
            .entry(module.clone())
            .or_default()
            .insert(name.into(), def);
    }

    pub fn get(&self, module: &ModulePath, name: &str) -> Option<&TypeDefinition> {
        self.modules.get(module)?.get(name)
    }
}

/// Import facts of one module.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleScope {
    /// Sibling modules reached by relative imports, in import order.
    pub relative_imports: IndexSet<ModulePath>,
    /// `local name -> (module, original name)` from `from .m import x as y`.
    pub bindings: IndexMap<String, (ModulePath, String)>,
    /// Names bound by absolute imports of anything other than `typing`.
    pub external: HashSet<String>,
}

impl ModuleScope {
    pub fn add_relative(&mut self, target: ModulePath) {
        self.relative_imports.insert(target);
    }

    pub fn bind(&mut self, local: impl Into<String>, target: ModulePath, original: impl Into<String>) {
        self.relative_imports.insert(target.clone());
        self.bindings.insert(local.into(), (target, original.into()));
    }

    pub fn is_external(&self, name: &str) -> bool {
        self.external.contains(name)
    }
}

/// Relative-import edges of every scanned module.
#[derive(Debug, Clone, Default)]
pub struct ImportGraph {
    scopes: HashMap<ModulePath, ModuleScope>,
}

impl ImportGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, module: ModulePath, scope: ModuleScope) {
        self.scopes.insert(module, scope);
    }

    pub fn scope(&self, module: &ModulePath) -> Option<&ModuleScope> {
        self.scopes.get(module)
    }

    /// Modules directly reachable from `module` by relative import.
    pub fn neighbours(&self, module: &ModulePath) -> impl Iterator<Item = &ModulePath> {
        self.scopes
            .get(module)
            .into_iter()
            .flat_map(|scope| scope.relative_imports.iter())
    }
}

/// Outcome of a name lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup<'a> {
    Found {
        module: &'a ModulePath,
        name: &'a str,
        definition: &'a TypeDefinition,
    },
    /// The name is bound by an absolute import.
    External,
    Missing,
}

/// Catalog plus import graph: everything name resolution reads.
#[derive(Debug, Clone, Default)]
pub struct TypeEnvironment {
    pub catalog: TypeCatalog,
    pub imports: ImportGraph,
}

impl TypeEnvironment {
    pub fn new(catalog: TypeCatalog, imports: ImportGraph) -> Self {
        Self { catalog, imports }
    }

    /// Find the definition `name` refers to from inside `module`.
    ///
    /// Order: the module's own definitions, absolute imports, explicit
    /// relative bindings, then every relative-import target. Each step into
    /// another module repeats the lookup there, at most `max_hops` times.
    pub fn lookup<'a>(&'a self, module: &'a ModulePath, name: &'a str, max_hops: usize) -> Lookup<'a> {
        let mut seen = HashMap::new();
        self.lookup_in(module, name, max_hops, &mut seen)
    }

    fn lookup_in<'a>(
        &'a self,
        module: &'a ModulePath,
        name: &'a str,
        hops_left: usize,
        seen: &mut HashMap<(&'a ModulePath, &'a str), usize>,
    ) -> Lookup<'a> {
        // Revisit a module only when more hops remain than last time.
        match seen.get(&(module, name)) {
            Some(&budget) if budget >= hops_left => return Lookup::Missing,
            _ => {
                seen.insert((module, name), hops_left);
            }
        }

        if let Some((module, name, definition)) = self.own_definition(module, name) {
            return Lookup::Found {
                module,
                name,
                definition,
            };
        }

        let Some(scope) = self.imports.scope(module) else {
            return Lookup::Missing;
        };
        if scope.is_external(name) {
            return Lookup::External;
        }
        if hops_left == 0 {
            return Lookup::Missing;
        }

        if let Some((target, original)) = scope.bindings.get(name) {
            let found = self.lookup_in(target, original, hops_left - 1, seen);
            if found != Lookup::Missing {
                return found;
            }
        }

        for target in self.imports.neighbours(module) {
            let found = self.lookup_in(target, name, hops_left - 1, seen);
            if found != Lookup::Missing {
                return found;
            }
        }

        Lookup::Missing
    }

    fn own_definition<'a>(
        &'a self,
        module: &'a ModulePath,
        name: &str,
    ) -> Option<(&'a ModulePath, &'a str, &'a TypeDefinition)> {
        let defs = self.catalog.modules.get(module)?;
        let (key, def) = defs.get_key_value(name)?;
        Some((module, key.as_str(), def))
    }
}
