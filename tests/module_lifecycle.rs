//! Lifecycle contract tests: init/hook ordering, rollback, teardown.

mod common;

use common::{event_log, events, harness, TestModule};
use modular_server::config::ModuleConfig;
use modular_server::host::ModuleCatalog;
use modular_server::module::{LifecycleState, Module, ModuleKind};
use modular_server::net::{ConnectionId, ListenerHandle};
use modular_server::pipeline::WorkUnit;
use modular_server::server::ConnectionContext;

#[test]
fn test_hook_order_follows_priority_on_both_surfaces() {
    let h = harness();
    let log = event_log();

    // Equal priorities keep install order: a and c tie at 5, b wins at 3.
    let a = TestModule::new("a", 5, ModuleKind::Hybrid, &log);
    let b = TestModule::new("b", 3, ModuleKind::Hybrid, &log);
    let c = TestModule::new("c", 5, ModuleKind::Hybrid, &log);
    h.host.install(a).unwrap();
    h.host.install(b).unwrap();
    h.host.install(c).unwrap();

    assert_eq!(h.line.snapshot(), vec!["b", "a", "c"]);
    assert_eq!(h.server.registry().snapshot(), vec!["b", "a", "c"]);
    assert_eq!(h.host.installed(), vec!["a", "b", "c"]);
    assert_eq!(
        h.line.manifest(),
        vec![("b".to_owned(), 3), ("a".to_owned(), 5), ("c".to_owned(), 5)]
    );
}

#[test]
fn test_failed_init_is_never_hooked() {
    let h = harness();
    let log = event_log();

    let broken = TestModule::failing_init("broken", 1, ModuleKind::Hybrid, &log);
    let err = h.host.install(broken.clone()).unwrap_err();

    assert!(err.to_string().contains("init failed"));
    assert_eq!(events(&log), vec!["init:broken"]);
    assert_eq!(broken.core().state(), LifecycleState::Failed);
    assert!(!h.line.contains("broken"));
    assert!(!h.server.registry().contains("broken"));
    assert!(h.host.is_empty());

    // Drive both surfaces once: the failed module must not run.
    let handle = ListenerHandle::new("127.0.0.1:8080".parse().unwrap());
    let mut ctx = ConnectionContext::new(ConnectionId::new(), "10.0.0.1:999".parse().unwrap());
    h.server.registry().dispatch(&handle, &mut ctx).unwrap();
    let mut work = WorkUnit::new(b"probe".to_vec());
    h.line.execute(&mut work).unwrap();
    assert_eq!(events(&log), vec!["init:broken"]);
}

#[test]
fn test_partial_hook_failure_rolls_back_earlier_surface() {
    let h = harness();
    let log = event_log();

    // Line hook succeeds, server hook fails: the line attachment must be
    // undone and the module destroyed, leaving no trace anywhere.
    let half = TestModule::failing_server_hook("half", 1, ModuleKind::Hybrid, &log);
    let err = h.host.install(half.clone()).unwrap_err();

    assert!(err.to_string().contains("hook(server)"));
    assert_eq!(
        events(&log),
        vec![
            "init:half",
            "hook_line:half",
            "hook_server:half",
            "unhook_line:half",
            "destroy:half"
        ]
    );
    assert_eq!(half.core().state(), LifecycleState::Failed);
    assert!(!h.line.contains("half"));
    assert!(!h.server.registry().contains("half"));
    assert!(h.host.is_empty());
}

#[test]
fn test_uninstall_mirrors_hooks_in_reverse() {
    let h = harness();
    let log = event_log();

    let m = TestModule::new("m", 1, ModuleKind::Hybrid, &log);
    h.host.install(m.clone()).unwrap();
    h.host.uninstall("m").unwrap();

    assert_eq!(
        events(&log),
        vec![
            "init:m",
            "hook_line:m",
            "hook_server:m",
            "unhook_server:m",
            "unhook_line:m",
            "destroy:m"
        ]
    );
    let destroys = events(&log).iter().filter(|e| *e == "destroy:m").count();
    assert_eq!(destroys, 1);
    assert_eq!(m.core().state(), LifecycleState::Destroyed);
    assert!(!h.line.contains("m"));
    assert!(!h.server.registry().contains("m"));
}

#[test]
fn test_uninstall_unknown_is_error_without_side_effects() {
    let h = harness();
    let log = event_log();

    let a = TestModule::new("a", 1, ModuleKind::Hybrid, &log);
    h.host.install(a).unwrap();
    let before_line = h.line.snapshot();
    let before_server = h.server.registry().snapshot();

    let err = h.host.uninstall("ghost").unwrap_err();

    assert!(err.to_string().contains("no module named"));
    assert_eq!(h.line.snapshot(), before_line);
    assert_eq!(h.server.registry().snapshot(), before_server);
    assert_eq!(h.host.len(), 1);
}

#[test]
fn test_duplicate_name_is_rejected_before_init() {
    let h = harness();
    let log = event_log();

    let first = TestModule::new("dup", 1, ModuleKind::Pipeline, &log);
    let second = TestModule::new("dup", 2, ModuleKind::Pipeline, &log);
    h.host.install(first).unwrap();
    let err = h.host.install(second).unwrap_err();

    assert!(err.to_string().contains("already installed"));
    let inits = events(&log).iter().filter(|e| *e == "init:dup").count();
    assert_eq!(inits, 1);
    assert!(h.line.contains("dup"));
    assert_eq!(h.host.len(), 1);
}

#[test]
fn test_reconcile_installs_removes_and_reseats() {
    let h = harness();
    let log = event_log();

    let mut catalog = ModuleCatalog::new();
    let build_log = log.clone();
    catalog.register("alpha", move |config| {
        Ok(TestModule::new(&config.name, config.priority, ModuleKind::Pipeline, &build_log))
    });
    let build_log = log.clone();
    catalog.register("beta", move |config| {
        Ok(TestModule::new(&config.name, config.priority, ModuleKind::Pipeline, &build_log))
    });
    let build_log = log.clone();
    catalog.register("gamma", move |config| {
        Ok(TestModule::new(&config.name, config.priority, ModuleKind::Pipeline, &build_log))
    });

    let entry = |name: &str, priority: i32| ModuleConfig {
        name: name.into(),
        priority,
        ..ModuleConfig::default()
    };

    let summary = h.host.reconcile(&catalog, &[entry("alpha", 10), entry("beta", 20)]);
    assert_eq!(summary.installed, 2);
    assert_eq!(h.line.snapshot(), vec!["alpha", "beta"]);

    // Reload: beta gone, alpha re-prioritized, gamma new.
    let summary = h.host.reconcile(&catalog, &[entry("alpha", 5), entry("gamma", 1)]);
    assert_eq!(summary.removed, 1);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.installed, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(h.line.snapshot(), vec!["gamma", "alpha"]);
    assert!(!h.host.contains("beta"));

    // Same roster, new conf file: re-pointed in place, no reinstall.
    let mut with_conf = entry("alpha", 5);
    with_conf.conf_file = Some("/etc/alpha.toml".into());
    let summary = h.host.reconcile(&catalog, &[with_conf, entry("gamma", 1)]);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.installed, 0);
    let alpha = h
        .host
        .describe()
        .into_iter()
        .find(|info| info.name == "alpha")
        .unwrap();
    assert_eq!(alpha.conf_file, Some("/etc/alpha.toml".into()));
}

#[test]
fn test_disabled_modules_are_not_installed() {
    let h = harness();
    let log = event_log();

    let build_log = log.clone();
    let mut catalog = ModuleCatalog::new();
    catalog.register("alpha", move |config| {
        Ok(TestModule::new(&config.name, config.priority, ModuleKind::Pipeline, &build_log))
    });

    let config = ModuleConfig {
        name: "alpha".into(),
        enabled: false,
        ..ModuleConfig::default()
    };
    let summary = h.host.reconcile(&catalog, &[config]);

    assert_eq!(summary.installed, 0);
    assert!(h.host.is_empty());
    assert!(events(&log).is_empty());
}

#[test]
fn test_shutdown_unloads_newest_first() {
    let h = harness();
    let log = event_log();

    for name in ["x", "y", "z"] {
        let m = TestModule::new(name, 1, ModuleKind::Hybrid, &log);
        h.host.install(m).unwrap();
    }

    h.host.shutdown();

    let destroys: Vec<String> = events(&log)
        .into_iter()
        .filter(|e| e.starts_with("destroy:"))
        .collect();
    assert_eq!(destroys, vec!["destroy:z", "destroy:y", "destroy:x"]);
    assert!(h.host.is_empty());
    assert!(h.line.is_empty());
    assert!(h.server.registry().is_empty());
}

#[test]
fn test_reinstall_after_uninstall_is_allowed() {
    let h = harness();
    let log = event_log();

    let first = TestModule::new("again", 1, ModuleKind::Pipeline, &log);
    h.host.install(first).unwrap();
    h.host.uninstall("again").unwrap();

    let second = TestModule::new("again", 1, ModuleKind::Pipeline, &log);
    h.host.install(second).unwrap();

    assert!(h.host.contains("again"));
    assert!(h.line.contains("again"));
    let destroys = events(&log).iter().filter(|e| *e == "destroy:again").count();
    assert_eq!(destroys, 1);
}

#[test]
fn test_hybrid_kind_hooks_both_connection_only_hooks_one() {
    let h = harness();
    let log = event_log();

    let conn = TestModule::new("conn", 1, ModuleKind::Connection, &log);
    let pipe = TestModule::new("pipe", 2, ModuleKind::Pipeline, &log);
    let both = TestModule::new("both", 3, ModuleKind::Hybrid, &log);
    h.host.install(conn).unwrap();
    h.host.install(pipe).unwrap();
    h.host.install(both).unwrap();

    assert_eq!(h.line.snapshot(), vec!["pipe", "both"]);
    assert_eq!(h.server.registry().snapshot(), vec!["conn", "both"]);
}
