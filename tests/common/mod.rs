//! Shared fixtures: the example package written out as syntax tree documents.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use sigschema::syntax::{Arg, Arguments, Expr, ImportName, Keyword, Module, Stmt};
use tempfile::TempDir;

pub fn typing(name: &str) -> Expr {
    Expr::dotted(&format!("typing.{}", name))
}

pub fn generic(name: &str, args: Vec<Expr>) -> Expr {
    Expr::subscript(typing(name), args)
}

pub fn write_module(dir: &Path, rel: &str, module: &Module) -> PathBuf {
    let path = dir.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, serde_json::to_string_pretty(module).unwrap()).unwrap();
    path
}

/// `types`: aliases plus a `total=False` record.
pub fn types_module() -> Module {
    let record = Stmt::ClassDef {
        name: "Service".into(),
        bases: vec![typing("TypedDict")],
        keywords: vec![Keyword {
            arg: "total".into(),
            value: Expr::constant(sigschema::syntax::Constant::Bool(false)),
        }],
        body: vec![
            Stmt::field("address", Expr::name("str")),
            Stmt::field("port", Expr::name("ServicePort")),
            Stmt::field("config", Expr::name("ServiceConfig")),
            Stmt::field("state", Expr::name("ServiceState")),
            Stmt::field("tags", generic("List", vec![Expr::name("str")])),
            Stmt::field("debug", Expr::name("bool")),
        ],
    };
    Module::new(vec![
        Stmt::import("typing"),
        Stmt::assign(
            "ServicePort",
            generic("Union", vec![Expr::name("int"), Expr::name("float")]),
        ),
        Stmt::assign(
            "ServiceConfig",
            generic("Dict", vec![Expr::name("str"), typing("Any")]),
        ),
        Stmt::assign(
            "ServiceState",
            generic(
                "Literal",
                vec![Expr::str("RUNNING"), Expr::str("STOPPED"), Expr::str("UNKNOWN")],
            ),
        ),
        record,
    ])
}

/// `service`: one public function using an imported record, one private.
pub fn service_module() -> Module {
    Module::new(vec![
        Stmt::import("typing"),
        Stmt::import_from(Some("types"), 1, vec![ImportName::new("Service")]),
        Stmt::function(
            "start",
            Arguments::positional(vec![Arg::new("service", Expr::name("Service"))]),
            None,
        ),
        Stmt::function(
            "_secret",
            Arguments::positional(vec![Arg::new(
                "secret",
                generic("Optional", vec![Expr::name("str")]),
            )
            .with_default()]),
            None,
        ),
    ])
}

/// `config.prod.common`: an absolute `json` import next to a typed function.
pub fn common_module() -> Module {
    Module::new(vec![
        Stmt::import("json"),
        Stmt::import("typing"),
        Stmt::function(
            "get_config",
            Arguments::default(),
            Some(generic("Dict", vec![Expr::name("str"), Expr::name("str")])),
        ),
    ])
}

/// Writes the `example` package into a fresh temp dir; returns the dir and
/// the package path.
pub fn example_package() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let pkg = tmp.path().join("example");
    let empty = Module::default();
    write_module(&pkg, "__init__.json", &empty);
    write_module(&pkg, "types.json", &types_module());
    write_module(&pkg, "service.json", &service_module());
    write_module(&pkg, "config/__init__.json", &empty);
    write_module(&pkg, "config/prod/__init__.json", &empty);
    write_module(&pkg, "config/prod/common.json", &common_module());
    (tmp, pkg)
}
