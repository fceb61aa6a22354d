//! CLI integration tests for the sigschema binary.

mod common;

use assert_cmd::Command;
use common::*;
use predicates::prelude::*;
use sigschema::syntax::{Arg, Arguments, Expr, Module, Stmt};
use std::fs;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("sigschema"))
}

fn broken_module() -> Module {
    Module::new(vec![
        Stmt::function(
            "ok",
            Arguments::positional(vec![Arg::new("x", Expr::name("int"))]),
            None,
        ),
        Stmt::function(
            "broken",
            Arguments::positional(vec![Arg::unannotated("x")]),
            None,
        )
        .at(6, 0),
    ])
}

mod compile_command {
    use super::*;

    #[test]
    fn compile_package() {
        let (_tmp, pkg) = example_package();

        cmd()
            .args(["compile", pkg.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""example.service.start""#))
            .stdout(predicate::str::contains(
                r#""example.config.prod.common.get_config""#,
            ))
            .stdout(predicate::str::contains(
                r#""$schema":"http://json-schema.org/draft-07/schema#""#,
            ));
    }

    #[test]
    fn compile_single_file_uses_bare_names() {
        let (_tmp, pkg) = example_package();

        let output = cmd()
            .args(["compile", pkg.join("service.json").to_str().unwrap()])
            .output()
            .unwrap();
        assert!(output.status.success());

        let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, ["start", "_secret"]);
    }

    #[test]
    fn compile_with_pretty() {
        let (_tmp, pkg) = example_package();

        cmd()
            .args(["compile", pkg.to_str().unwrap(), "--pretty"])
            .assert()
            .success()
            .stdout(predicate::str::contains("{\n"));
    }

    #[test]
    fn compile_with_output_file() {
        let (tmp, pkg) = example_package();
        let out = tmp.path().join("schemas.json");

        cmd()
            .args([
                "compile",
                pkg.to_str().unwrap(),
                "--output",
                out.to_str().unwrap(),
            ])
            .assert()
            .success()
            .stdout(predicate::str::is_empty());

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(
            written["example.service.start"]["output"]["type"],
            "null"
        );
    }

    #[test]
    fn compile_with_filters() {
        let (_tmp, pkg) = example_package();

        cmd()
            .args([
                "compile",
                pkg.to_str().unwrap(),
                "--exclude",
                "_*",
                "--exclude",
                "config",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("example.service.start"))
            .stdout(predicate::str::contains("_secret").not())
            .stdout(predicate::str::contains("get_config").not());
    }

    #[test]
    fn compile_warns_about_rejected_functions() {
        let dir = TempDir::new().unwrap();
        let file = write_module(dir.path(), "svc.json", &broken_module());

        cmd()
            .args(["compile", file.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""ok""#))
            .stdout(predicate::str::contains("broken").not())
            .stderr(predicate::str::contains("skipped broken"));
    }
}

mod check_command {
    use super::*;

    #[test]
    fn check_clean_package() {
        let (_tmp, pkg) = example_package();

        cmd()
            .args(["check", pkg.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("3 functions checked, all compiled"));
    }

    #[test]
    fn check_reports_rejections() {
        let dir = TempDir::new().unwrap();
        let file = write_module(dir.path(), "svc.json", &broken_module());

        cmd()
            .args(["check", file.to_str().unwrap()])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("invalid_signature"))
            .stdout(predicate::str::contains("broken (svc:6:0)"))
            .stdout(predicate::str::contains("1 compiled, 1 rejected"));
    }

    #[test]
    fn check_json_output() {
        let dir = TempDir::new().unwrap();
        let file = write_module(dir.path(), "svc.json", &broken_module());

        let output = cmd()
            .args(["check", file.to_str().unwrap(), "--format", "json"])
            .output()
            .unwrap();
        assert_eq!(output.status.code(), Some(1));

        let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(report["compiled"], 1);
        assert_eq!(report["rejected"], 1);
        assert_eq!(report["diagnostics"][0]["function"], "broken");
        assert_eq!(report["diagnostics"][0]["module"], "svc");
        assert_eq!(report["diagnostics"][0]["line"], 6);
        assert_eq!(report["diagnostics"][0]["column"], 0);
        assert_eq!(report["diagnostics"][0]["code"], "invalid_signature");
    }

    #[test]
    fn check_import_depth_flag() {
        let dir = TempDir::new().unwrap();
        let pkg = dir.path().join("pkg");
        write_module(&pkg, "__init__.json", &Module::default());
        write_module(
            &pkg,
            "base.json",
            &Module::new(vec![Stmt::assign("Port", Expr::name("int"))]),
        );
        write_module(
            &pkg,
            "types.json",
            &Module::new(vec![Stmt::import_from(
                Some("base"),
                1,
                vec![sigschema::syntax::ImportName::new("Port")],
            )]),
        );
        write_module(
            &pkg,
            "service.json",
            &Module::new(vec![
                Stmt::import_from(
                    Some("types"),
                    1,
                    vec![sigschema::syntax::ImportName::new("Port")],
                ),
                Stmt::function(
                    "listen",
                    Arguments::positional(vec![Arg::new("port", Expr::name("Port"))]),
                    None,
                ),
            ]),
        );

        cmd()
            .args(["check", pkg.to_str().unwrap()])
            .assert()
            .success();
        cmd()
            .args(["check", pkg.to_str().unwrap(), "--import-depth", "1"])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("unresolved_type"));
    }
}

mod error_handling {
    use super::*;

    #[test]
    fn file_not_found() {
        cmd()
            .args(["compile", "/nonexistent/service.json"])
            .assert()
            .code(3)
            .stderr(predicate::str::contains("file not found"));
    }

    #[test]
    fn invalid_syntax_tree() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("svc.json");
        fs::write(&file, "not json").unwrap();

        cmd()
            .args(["compile", file.to_str().unwrap()])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("invalid syntax tree"));
    }

    #[test]
    fn directory_without_init() {
        let dir = TempDir::new().unwrap();

        cmd()
            .args(["compile", dir.path().to_str().unwrap()])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("not a package"));
    }

    #[test]
    fn invalid_pattern() {
        let (_tmp, pkg) = example_package();

        cmd()
            .args(["compile", pkg.to_str().unwrap(), "--include", "[oops"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("invalid pattern"));
    }
}

mod help_and_version {
    use super::*;

    #[test]
    fn help_flag() {
        cmd()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("compile"))
            .stdout(predicate::str::contains("check"));
    }

    #[test]
    fn version_flag() {
        cmd()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("sigschema"));
    }

    #[test]
    fn missing_path() {
        cmd().arg("compile").assert().failure();
    }
}
