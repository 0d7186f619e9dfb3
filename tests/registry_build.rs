//! Registry integration tests
//!
//! Load build files from disk, resolve units and run `build_all` against
//! the mock, dry-run and process invokers.

mod fixtures;

use std::time::Duration;

use fixtures::{sample_config_path, sample_project_path, Project};
use serde_json::json;
use unitbuild::config::{parse_overrides, ConfigError, ParseError};
use unitbuild::mock::{FailureConfig, MockInvoker, Stage};
use unitbuild::summary::{BuildStatus, FailureKind};
use unitbuild::{
    BuildOptions, DryRunInvoker, InvalidToolchain, LoadOptions, ProcessInvoker, Registry, RegistryError, UnitStatus,
};

#[test]
fn test_flags_and_sources_from_build_file() {
    let project = Project::with_config(json!({
        "app": {"flags": {"c": ["-O2"]}, "sources": ["*.c"]}
    }));
    project.touch(&["a.c", "b.c", "notes.txt"]);

    let registry = Registry::load(&project.config_path()).unwrap();
    let app = registry.unit("app").unwrap();

    assert_eq!(app.flags_for("c").unwrap(), vec!["-O2"]);
    assert!(app.flags_for("cpp").unwrap().is_empty());
    assert_eq!(
        app.flags_for("rust"),
        Err(InvalidToolchain("rust".to_string()))
    );
    assert_eq!(
        app.sources(&registry.glob()).unwrap(),
        vec![project.path().join("a.c"), project.path().join("b.c")]
    );
    assert!(!app.is_completed());
}

#[test]
fn test_one_failing_unit_does_not_stop_the_other() {
    let project = Project::with_config(json!({
        "broken": {"sources": ["broken/*.c"]},
        "fine": {"sources": ["fine/*.c"]}
    }));
    project.touch(&["broken/x.c", "fine/y.c"]);
    let mut registry = Registry::load(&project.config_path()).unwrap();

    let invoker = MockInvoker::new();
    invoker.fail("broken", Stage::Compile, FailureConfig::exit(1, "x.c:1:1: error: expected ';'"));

    let report = registry.build_all(&invoker, &BuildOptions::default());

    assert_eq!(report.status, BuildStatus::Failed);
    assert_eq!(report.exit_code, 1);
    assert_eq!(report.failed_units(), vec!["broken"]);
    assert_eq!(report.units_completed, 1);
    assert!(report.unit("broken").unwrap().reason.as_ref().unwrap().contains("expected ';'"));

    assert!(!registry.unit("broken").unwrap().is_completed());
    assert!(registry.unit("fine").unwrap().is_completed());
    assert_eq!(invoker.calls_for("fine").len(), 2);
}

#[test]
fn test_duplicate_unit_names_rejected() {
    let project = Project::new();
    project.write(
        "build.json",
        r#"{"app": {"sources": ["a.c"]}, "lib": {}, "app": {"sources": ["b.c"]}}"#,
    );

    let err = Registry::load(&project.config_path()).unwrap_err();
    assert!(matches!(err, RegistryError::DuplicateUnitName(ref name) if name == "app"));
}

#[test]
fn test_units_keep_file_order() {
    let project = Project::new();
    project.write("build.json", r#"{"zlib": {}, "app": {}, "mid": {}}"#);

    let registry = Registry::load(&project.config_path()).unwrap();
    assert_eq!(registry.names(), vec!["zlib", "app", "mid"]);
}

#[test]
fn test_null_value_is_a_parse_error() {
    let project = Project::with_config(json!({"app": {"flags": {"c": null}}}));

    let err = Registry::load(&project.config_path()).unwrap_err();
    match err {
        RegistryError::Config(ConfigError::Parse {
            source: ParseError::InvalidValue(invalid),
            ..
        }) => assert_eq!(invalid.path, "app.flags.c"),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_inheritance_cycle_from_file() {
    let project = Project::with_config(json!({
        "a": {"extends": "b"},
        "b": {"extends": "c"},
        "c": {"extends": "a"}
    }));

    let err = Registry::load(&project.config_path()).unwrap_err();
    assert!(matches!(err, RegistryError::InheritanceCycle { .. }));
    assert_eq!(err.to_string(), "inheritance cycle: a -> b -> c -> a");
}

#[test]
fn test_sample_project_resolution() {
    let registry = Registry::load(&sample_config_path()).unwrap();
    assert_eq!(registry.names(), vec!["core", "util", "app"]);

    let util = registry.unit("util").unwrap();
    assert_eq!(util.flags_for("c").unwrap(), vec!["-Wall", "-O2", "-fPIC"]);
    assert_eq!(util.flags_for("cpp").unwrap(), vec!["-Wall", "-O2", "-std=c++17"]);
    assert_eq!(util.build_dir(), "out");
    assert_eq!(util.output(), "libutil.a");

    let app = registry.unit("app").unwrap();
    let root = sample_project_path();
    assert_eq!(app.flags_for("ld").unwrap(), vec!["-lm"]);
    assert_eq!(
        app.sources(&registry.glob()).unwrap(),
        vec![
            root.join("app/ui/draw.cpp"),
            root.join("app/ui/layout.cpp"),
            root.join("app/main.c")
        ]
    );
}

#[test]
fn test_sample_project_dry_run() {
    let mut registry = Registry::load(&sample_config_path()).unwrap();
    let invoker = DryRunInvoker::new();

    let report = registry.build_all(&invoker, &BuildOptions::default());

    assert!(report.is_success(), "{}", report.to_human());
    assert!(registry.units().iter().all(|u| u.is_completed()));

    let root = sample_project_path();
    let obj = root.join("out/app/obj");
    let app = report.unit("app").unwrap();
    assert_eq!(
        app.objects,
        vec![
            obj.join("app/ui/draw.cpp.o"),
            obj.join("app/ui/layout.cpp.o"),
            obj.join("app/main.c.o")
        ]
    );
    assert_eq!(app.artifact, Some(root.join("out/app/app")));

    let commands: Vec<String> = invoker.commands().iter().map(|c| c.to_string()).collect();
    let link = format!(
        "c++ {} {} {} -lm -o {}",
        obj.join("app/ui/draw.cpp.o").display(),
        obj.join("app/ui/layout.cpp.o").display(),
        obj.join("app/main.c.o").display(),
        root.join("out/app/app").display()
    );
    assert!(commands.contains(&link), "{:#?}", commands);
    assert!(!root.join("out").exists());
}

#[test]
fn test_overrides_reach_every_unit() {
    let project = Project::with_config(json!({
        "a": {"flags": {"c": ["-O2"]}},
        "b": {"tools": {"c": "clang"}}
    }));
    let options = LoadOptions {
        overrides: parse_overrides(&[r#"flags.c=["-O0","-g"]"#, "tools.c=gcc-13"]).unwrap(),
        ..Default::default()
    };

    let registry = Registry::load_with(&project.config_path(), &options).unwrap();

    for unit in registry.units() {
        assert_eq!(unit.flags_for("c").unwrap(), vec!["-O0", "-g"]);
        assert_eq!(unit.tool(unitbuild::Toolchain::C), "gcc-13");
    }
}

#[test]
fn test_report_file() {
    let project = Project::with_config(json!({"app": {"sources": ["src/*.c"]}}));
    let mut registry = Registry::load(&project.config_path()).unwrap();

    let report = registry.build_all(&MockInvoker::new(), &BuildOptions::default());
    assert_eq!(report.units[0].failure_kind, Some(FailureKind::NoSources));

    let path = project.path().join("report.json");
    report.write_to_file(&path).unwrap();

    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["status"], "failed");
    assert_eq!(json["units"][0]["name"], "app");
    assert_eq!(json["units"][0]["failure_kind"], "NO_SOURCES");
    assert_eq!(json["config_sources"][1]["origin"], "file");
    assert_eq!(json["config_sources"][1]["digest"].as_str().unwrap().len(), 64);
}

#[test]
fn test_parallel_fail_fast_never_loses_a_unit() {
    let project = Project::new();
    let mut config = serde_json::Map::new();
    for i in 0..8 {
        config.insert(format!("u{}", i), json!({"sources": ["x.c"]}));
    }
    project.write("build.json", &serde_json::Value::Object(config).to_string());
    project.touch(&["x.c"]);
    let mut registry = Registry::load(&project.config_path()).unwrap();

    let invoker = MockInvoker::new();
    invoker.fail("u0", Stage::Compile, FailureConfig::exit(1, "boom"));
    let options = BuildOptions {
        jobs: 4,
        fail_fast: true,
        ..Default::default()
    };

    let report = registry.build_all(&invoker, &options);

    assert_eq!(report.units.len(), 8);
    assert_eq!(report.units[0].status, UnitStatus::Failed);
    assert_eq!(
        report.units_completed + report.units_failed + report.units_skipped,
        8
    );
    for (unit, outcome) in registry.units().iter().zip(&report.units) {
        assert_eq!(unit.name(), outcome.name);
        assert_eq!(unit.is_completed(), outcome.status == UnitStatus::Completed);
    }
}

#[test]
fn test_nested_and_flat_sources_get_distinct_objects() {
    let project = Project::with_config(json!({"app": {"sources": ["src/**/*.c"]}}));
    project.touch(&["src/net/io.c", "src/net_io.c"]);
    let mut registry = Registry::load(&project.config_path()).unwrap();

    let report = registry.build_all(&DryRunInvoker::new(), &BuildOptions::default());

    assert!(report.is_success(), "{}", report.to_human());
    let obj = project.path().join("build/app/obj");
    let app = report.unit("app").unwrap();
    assert_eq!(app.objects.len(), 2);
    assert!(app.objects.contains(&obj.join("src/net/io.c.o")), "{:?}", app.objects);
    assert!(app.objects.contains(&obj.join("src/net_io.c.o")), "{:?}", app.objects);
}

#[test]
fn test_source_matched_twice_is_linked_once() {
    let project = Project::with_config(json!({"app": {"sources": ["*.c", "main.c"]}}));
    project.touch(&["main.c", "util.c"]);
    let mut registry = Registry::load(&project.config_path()).unwrap();
    let invoker = DryRunInvoker::new();

    let report = registry.build_all(&invoker, &BuildOptions::default());

    assert!(report.is_success(), "{}", report.to_human());
    let obj = project.path().join("build/app/obj");
    let app = report.unit("app").unwrap();
    assert_eq!(app.source_count, 2);
    assert_eq!(app.objects, vec![obj.join("main.c.o"), obj.join("util.c.o")]);

    let commands: Vec<String> = invoker.commands().iter().map(|c| c.to_string()).collect();
    assert_eq!(commands.len(), 3, "{:#?}", commands);
    let link = format!(
        "c++ {} {} -o {}",
        obj.join("main.c.o").display(),
        obj.join("util.c.o").display(),
        project.path().join("build/app/app").display()
    );
    assert_eq!(commands[2], link);
}

#[test]
fn test_fail_fast_lets_running_units_finish() {
    let project = Project::with_config(json!({
        "slow": {"sources": ["slow.c"]},
        "fast": {"sources": ["fast.c"]}
    }));
    project.touch(&["slow.c", "fast.c"]);
    let mut registry = Registry::load(&project.config_path()).unwrap();

    let invoker = MockInvoker::new();
    invoker.fail(
        "slow",
        Stage::Compile,
        FailureConfig::exit(1, "boom").with_delay(Duration::from_millis(300)),
    );
    let options = BuildOptions {
        jobs: 2,
        fail_fast: true,
        ..Default::default()
    };

    let report = registry.build_all(&invoker, &options);

    assert_eq!(report.unit("slow").unwrap().status, UnitStatus::Failed);
    assert_eq!(report.unit("fast").unwrap().status, UnitStatus::Completed);
    assert_eq!(report.units_skipped, 0);
    assert!(registry.unit("fast").unwrap().is_completed());
    assert_eq!(report.exit_code, 1);
}

#[cfg(unix)]
#[test]
fn test_unreadable_source_tree_is_a_walk_failure() {
    let project = Project::with_config(json!({
        "looped": {"sources": ["src/**/*.c"]},
        "fine": {"sources": ["fine.c"]}
    }));
    project.touch(&["src/a.c", "fine.c"]);
    std::os::unix::fs::symlink(project.path().join("src"), project.path().join("src/again")).unwrap();
    let mut registry = Registry::load(&project.config_path()).unwrap();

    let report = registry.build_all(&MockInvoker::new(), &BuildOptions::default());

    let looped = report.unit("looped").unwrap();
    assert_eq!(looped.failure_kind, Some(FailureKind::SourceWalk));
    assert!(looped.reason.as_ref().unwrap().contains("cannot read sources"));
    assert_eq!(report.unit("fine").unwrap().status, UnitStatus::Completed);
}

#[cfg(unix)]
#[test]
fn test_process_invoker_runs_tools() {
    let project = Project::with_config(json!({
        "ok": {"sources": ["ok/*.c"], "tools": {"c": "true", "ld": "true"}},
        "bad": {"sources": ["bad/*.c"], "tools": {"c": "false", "ld": "true"}}
    }));
    project.touch(&["ok/a.c", "bad/b.c"]);
    let mut registry = Registry::load(&project.config_path()).unwrap();

    let report = registry.build_all(&ProcessInvoker::new(), &BuildOptions::default());

    assert_eq!(report.failed_units(), vec!["bad"]);
    let ok = report.unit("ok").unwrap();
    assert_eq!(ok.artifact, Some(project.path().join("build/ok/ok")));
    assert!(project.path().join("build/ok/obj").is_dir());
    assert_eq!(
        report.unit("bad").unwrap().failure_kind,
        Some(FailureKind::Compile)
    );
}
