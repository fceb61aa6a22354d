//! Syntax tree loading and package discovery.
//!
//! Each source module is stored as a JSON syntax tree document with a
//! `.json` extension. A directory is a package when it holds an
//! `__init__.json`; nested directories without one are not part of it.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::compiler::{ModuleUnit, ScanTarget};
use crate::error::LoadError;
use crate::syntax::Module;
use crate::types::ModulePath;

/// File extension of syntax tree documents.
pub const TREE_EXTENSION: &str = "json";

/// Stem of a package's own module document.
pub const PACKAGE_INIT: &str = "__init__";

/// Load a syntax tree document from a file path.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or `LoadError::InvalidSyntaxTree` if it isn't a valid document.
pub fn load_module(path: &Path) -> Result<Module, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| LoadError::InvalidSyntaxTree {
        origin: path.display().to_string(),
        source,
    })
}

/// Load a syntax tree document from a JSON string.
///
/// # Errors
///
/// Returns `LoadError::InvalidSyntaxTree` if the string isn't a valid document.
pub fn load_module_str(content: &str) -> Result<Module, LoadError> {
    serde_json::from_str(content).map_err(|source| LoadError::InvalidSyntaxTree {
        origin: "<string>".to_string(),
        source,
    })
}

/// Build a scan target from a file or package directory.
///
/// A file becomes a single-module scan with bare function names. When the
/// file sits inside a package, the module gets its real dotted path and the
/// whole enclosing package (up to its top-most `__init__.json`) is loaded
/// as context, so relative imports of any level resolve. Otherwise the
/// other documents next to it are the context. Context modules that cannot
/// be read are skipped with a warning. A directory must be a package.
///
/// # Errors
///
/// Returns `LoadError` if the target itself cannot be read.
pub fn discover(path: &Path) -> Result<ScanTarget, LoadError> {
    if path.is_dir() {
        return load_package(path);
    }

    let tree = load_module(path)?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let (unit, context) = match enclosing_package(dir)? {
        Some(top) => {
            let package = package_path(&top, dir)?;
            let unit = module_unit(path, &package, tree);
            let mut context = Vec::new();
            walk_context(&top, &ModulePath::new(dir_name(&top)?), &mut context)?;
            context.retain(|m| m.path != unit.path);
            (unit, context)
        }
        None => {
            let unit = module_unit(path, &ModulePath::root(), tree);
            let mut context = Vec::new();
            for sibling in tree_files(dir)? {
                if same_file(&sibling, path) {
                    continue;
                }
                if let Some(tree) = load_context(&sibling) {
                    context.push(module_unit(&sibling, &ModulePath::root(), tree));
                }
            }
            (unit, context)
        }
    };

    debug!(module = %unit.path, context = context.len(), "single-module scan");
    Ok(ScanTarget::module(unit, context))
}

/// Walk a package directory in sorted order.
///
/// The package is named after its directory: `example/config/prod.json`
/// becomes module `example.config.prod`.
///
/// # Errors
///
/// Returns `LoadError::NotAPackage` if `dir` has no `__init__.json`, or any
/// error from reading a module below it.
pub fn load_package(dir: &Path) -> Result<ScanTarget, LoadError> {
    if !dir.exists() {
        return Err(LoadError::FileNotFound {
            path: dir.to_path_buf(),
        });
    }
    if !is_package(dir) {
        return Err(LoadError::NotAPackage {
            path: dir.to_path_buf(),
        });
    }

    let root = ModulePath::new(dir_name(dir)?);
    let mut modules = Vec::new();
    walk_package(dir, &root, &mut modules)?;
    Ok(ScanTarget::package(root, modules))
}

fn walk_package(dir: &Path, package: &ModulePath, modules: &mut Vec<ModuleUnit>) -> Result<(), LoadError> {
    debug!(package = %package, path = %dir.display(), "walking package");

    let init = dir.join(format!("{}.{}", PACKAGE_INIT, TREE_EXTENSION));
    modules.push(ModuleUnit::package_init(package.clone(), load_module(&init)?));

    for file in tree_files(dir)? {
        if is_init(&file) {
            continue;
        }
        let tree = load_module(&file)?;
        modules.push(module_unit(&file, package, tree));
    }

    for sub in sorted_entries(dir)?.into_iter().filter(|p| p.is_dir()) {
        if !is_package(&sub) {
            debug!(path = %sub.display(), "skipping directory without __init__");
            continue;
        }
        let name = dir_name(&sub)?;
        walk_package(&sub, &package.join(&name), modules)?;
    }
    Ok(())
}

/// Like `walk_package`, but unreadable modules are skipped.
fn walk_context(dir: &Path, package: &ModulePath, modules: &mut Vec<ModuleUnit>) -> Result<(), LoadError> {
    for file in tree_files(dir)? {
        if let Some(tree) = load_context(&file) {
            modules.push(module_unit(&file, package, tree));
        }
    }
    for sub in sorted_entries(dir)?.into_iter().filter(|p| is_package(p)) {
        let name = dir_name(&sub)?;
        walk_context(&sub, &package.join(&name), modules)?;
    }
    Ok(())
}

fn load_context(path: &Path) -> Option<Module> {
    match load_module(path) {
        Ok(tree) => Some(tree),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "skipping context module");
            None
        }
    }
}

/// Top-most package directory containing `dir`, if `dir` is a package.
fn enclosing_package(dir: &Path) -> Result<Option<PathBuf>, LoadError> {
    if !is_package(dir) {
        return Ok(None);
    }
    let mut top = dir.canonicalize().map_err(|source| LoadError::ReadError {
        path: dir.to_path_buf(),
        source,
    })?;
    while let Some(parent) = top.parent() {
        if !is_package(parent) {
            break;
        }
        top = parent.to_path_buf();
    }
    Ok(Some(top))
}

/// Dotted package path of `dir` inside the package rooted at `top`.
fn package_path(top: &Path, dir: &Path) -> Result<ModulePath, LoadError> {
    let dir = dir.canonicalize().map_err(|source| LoadError::ReadError {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut package = ModulePath::new(dir_name(top)?);
    if let Ok(rest) = dir.strip_prefix(top) {
        for component in rest.components() {
            package = package.join(&component.as_os_str().to_string_lossy());
        }
    }
    Ok(package)
}

fn module_unit(path: &Path, package: &ModulePath, tree: Module) -> ModuleUnit {
    if is_init(path) {
        return ModuleUnit::package_init(package.clone(), tree);
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    ModuleUnit::new(package.join(&stem), tree)
}

fn is_package(dir: &Path) -> bool {
    dir.join(format!("{}.{}", PACKAGE_INIT, TREE_EXTENSION)).is_file()
}

fn is_init(path: &Path) -> bool {
    path.file_stem().is_some_and(|stem| stem == PACKAGE_INIT)
}

/// Syntax tree documents directly inside `dir`, sorted by name.
fn tree_files(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    Ok(sorted_entries(dir)?
        .into_iter()
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == TREE_EXTENSION))
        .collect())
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let read_error = |source| LoadError::ReadError {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries = fs::read_dir(dir)
        .map_err(read_error)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(read_error)?;
    entries.sort();
    Ok(entries)
}

fn dir_name(dir: &Path) -> Result<String, LoadError> {
    let canonical = dir.canonicalize().map_err(|source| LoadError::ReadError {
        path: dir.to_path_buf(),
        source,
    })?;
    Ok(canonical
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default())
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
