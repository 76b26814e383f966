//! 启动流程端到端测试

mod common;

use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use beepy_config::LoaderConfig;
use beepy_loader::{
    BootError, DryRunInterpreter, InterpreterCall, LoadError, LoadState, Method, MemoryHttpClient,
    ROOT_PACKAGE,
};
use common::{dev_config, Harness};
use futures::FutureExt;

fn position(calls: &[InterpreterCall], wanted: &InterpreterCall) -> usize {
    calls
        .iter()
        .position(|c| c == wanted)
        .unwrap_or_else(|| panic!("{:?} not called in {:?}", wanted, calls))
}

#[tokio::test]
async fn test_full_sequence_order() {
    let server = MemoryHttpClient::new()
        .with_file("__init__.py", "import app")
        .with_file(".env", "DEBUG=1");
    let config = LoaderConfig {
        requirements: beepy_config::Requirements::List(vec!["numpy".into(), "attrs".into()]),
        ..dev_config()
    };
    let mut h = Harness::new(server, config);
    h.boot.load().await.unwrap();

    let calls = h.interp.calls();
    let micropip = position(&calls, &InterpreterCall::LoadSystemPackage("micropip".into()));
    let numpy = position(&calls, &InterpreterCall::Install("numpy".into()));
    let attrs = position(&calls, &InterpreterCall::Install("attrs".into()));
    let bundle = position(
        &calls,
        &InterpreterCall::Install("/dev/dist/beepy_web-0.0a0-py3-none-any.whl".into()),
    );
    let import = position(&calls, &InterpreterCall::Import(ROOT_PACKAGE.into()));

    assert!(micropip < numpy && micropip < attrs);
    assert!(numpy < bundle && attrs < bundle);
    assert!(bundle < import);
    assert!(matches!(calls[import - 1], InterpreterCall::Run(_)));

    assert_eq!(h.boot.state(), LoadState::Ready);
    assert_eq!(h.read("__init__.py").as_deref(), Some("import app"));
    assert_eq!(h.read(".env").as_deref(), Some("DEBUG=1"));
    assert!(h.boot.registry().contains(ROOT_PACKAGE));
}

#[tokio::test]
async fn test_engine_script_url() {
    let mut h = Harness::new(MemoryHttpClient::new(), LoaderConfig::default());
    h.boot.load().await.unwrap();
    assert_eq!(
        h.host.scripts(),
        vec!["https://cdn.jsdelivr.net/pyodide/v0.25.1/full/pyodide.js"]
    );
    assert_eq!(h.boot.runtime().unwrap().version(), "dry-run");
}

#[tokio::test]
async fn test_missing_env_falls_back_to_dev_path() {
    let server = MemoryHttpClient::new().with_file("dev/.env", "FROM_DEV=1");
    let mut h = Harness::new(server, dev_config());
    h.boot.load().await.unwrap();

    assert_eq!(h.read(".env").as_deref(), Some("FROM_DEV=1"));
    assert_eq!(h.server.count(Method::Get, ".env"), 1);
    assert_eq!(h.server.count(Method::Get, "dev/.env"), 1);
}

#[tokio::test]
async fn test_missing_includes_do_not_abort() {
    let server = MemoryHttpClient::new()
        .with_file("config/settings.py", "X = 1")
        .with_file("__init__.py", "");
    let config = LoaderConfig {
        include_files: vec![
            ".env".into(),
            "missing.py".into(),
            "config/settings.py".into(),
        ],
        ..dev_config()
    };
    let mut h = Harness::new(server, config);
    h.boot.load().await.unwrap();

    assert_eq!(h.read("config/settings.py").as_deref(), Some("X = 1"));
    assert_eq!(h.read("config/__init__.py").as_deref(), Some(""));
    assert!(h.read("missing.py").is_none());
    assert!(h.read(".env").is_none());
    assert_eq!(h.boot.state(), LoadState::Ready);
}

#[tokio::test]
async fn test_failed_requirement_is_tolerated() {
    let config = LoaderConfig {
        requirements: beepy_config::Requirements::List(vec!["broken".into(), "fine".into()]),
        ..Default::default()
    };
    let mut h = Harness::with_interpreter(
        MemoryHttpClient::new(),
        config,
        DryRunInterpreter::new().failing("broken"),
    );
    h.boot.load().await.unwrap();
    assert!(h
        .interp
        .calls()
        .contains(&InterpreterCall::Install("fine".into())));
}

#[tokio::test]
async fn test_system_package_failure_is_fatal() {
    let mut h = Harness::with_interpreter(
        MemoryHttpClient::new(),
        LoaderConfig::default(),
        DryRunInterpreter::new().failing("micropip"),
    );
    let err = h.boot.load().await.unwrap_err();
    assert!(matches!(err, BootError::Install { ref package, .. } if package == "micropip"));
    assert_eq!(h.boot.state(), LoadState::RuntimeReady);
}

#[tokio::test]
async fn test_bundle_failure_is_fatal() {
    let config = LoaderConfig {
        framework_version: "1.0".into(),
        ..Default::default()
    };
    let mut h = Harness::with_interpreter(
        MemoryHttpClient::new(),
        config,
        DryRunInterpreter::new().failing("beepy_web==1.0"),
    );
    assert!(matches!(
        h.boot.load().await,
        Err(BootError::Install { .. })
    ));
    assert!(!h
        .interp
        .calls()
        .iter()
        .any(|c| matches!(c, InterpreterCall::Import(_))));
}

#[tokio::test]
async fn test_requirements_producer_runs_at_install_time() {
    let produced = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&produced);
    let config = LoaderConfig::default().with_requirements_producer(move || {
        flag.store(true, Ordering::SeqCst);
        vec!["lazy".into()]
    });
    let mut h = Harness::new(MemoryHttpClient::new(), config);
    assert!(!produced.load(Ordering::SeqCst));
    h.boot.load().await.unwrap();
    assert!(produced.load(Ordering::SeqCst));
    assert!(h
        .interp
        .calls()
        .contains(&InterpreterCall::Install("lazy".into())));
}

#[tokio::test]
async fn test_custom_entry_hook_bypasses_discovery() {
    let server = MemoryHttpClient::new().with_file("__init__.py", "ROOT = 1");
    let ran = Rc::new(Cell::new(0));
    let counter = Rc::clone(&ran);
    let mut h = Harness::new(server, LoaderConfig::default()).configure(|boot| {
        boot.with_entry_hook(move || {
            counter.set(counter.get() + 1);
            async { Ok(()) }.boxed_local()
        })
    });

    h.boot.load().await.unwrap();
    assert_eq!(ran.get(), 1);
    assert_eq!(h.server.count(Method::Head, "__init__.py"), 0);
    assert!(h.read("__init__.py").is_none());
}

#[tokio::test]
async fn test_entry_module_is_written_as_root_package() {
    let server = MemoryHttpClient::new().with_file("app/main.py", "MAIN = 1");
    let config = LoaderConfig {
        entry_module: Some("app.main".into()),
        ..Default::default()
    };
    let mut h = Harness::new(server, config);
    h.boot.load().await.unwrap();

    assert_eq!(h.read("__init__.py").as_deref(), Some("MAIN = 1"));
    assert!(h
        .interp
        .calls()
        .contains(&InterpreterCall::Import(ROOT_PACKAGE.into())));
}

#[tokio::test]
async fn test_missing_entry_module_is_fatal() {
    let config = LoaderConfig {
        entry_module: Some("app.main".into()),
        ..Default::default()
    };
    let mut h = Harness::new(MemoryHttpClient::new(), config);
    let err = h.boot.load().await.unwrap_err();
    match err {
        BootError::EntryPoint { module, source } => {
            assert_eq!(module, "app.main");
            assert!(matches!(source, LoadError::ModuleNotFound { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(h.boot.state(), LoadState::LoadingModules);
}

#[tokio::test]
async fn test_auto_discovery_without_root_package() {
    let mut h = Harness::new(MemoryHttpClient::new(), LoaderConfig::default());
    h.boot.load().await.unwrap();
    assert_eq!(h.server.count(Method::Head, "__init__.py"), 1);
    assert_eq!(h.server.count(Method::Get, "__init__.py"), 0);
    assert!(h.boot.registry().is_empty());
}

#[tokio::test]
async fn test_root_import_failure_propagates() {
    let server = MemoryHttpClient::new().with_file("__init__.py", "raise Exception()");
    let mut h = Harness::with_interpreter(
        server,
        LoaderConfig::default(),
        DryRunInterpreter::new().failing(ROOT_PACKAGE),
    );
    assert!(matches!(h.boot.load().await, Err(BootError::Runtime(_))));
}

#[tokio::test]
async fn test_enter_module_page() {
    let server = MemoryHttpClient::new().with_file("docs/page/__init__.py", "PAGE = 1");
    let mut h = Harness::new(server, LoaderConfig::default());
    h.boot.load().await.unwrap();

    let name = h.boot.enter_module("docs.page").unwrap();
    assert_eq!(name, "docs.page");
    assert_eq!(h.read("docs/page/__init__.py").as_deref(), Some("PAGE = 1"));
    assert_eq!(h.read("docs/__init__.py").as_deref(), Some(""));
    assert_eq!(
        h.boot.registry().get("docs.page").and_then(|u| u.virtual_path),
        Some("docs/page/__init__.py".to_string())
    );
}

#[tokio::test]
async fn test_framework_sources_replace_bundle() {
    let server = MemoryHttpClient::new()
        .with_file("static/beepy/__init__.py", "from beepy import tags\n")
        .with_file("static/beepy/tags.py", "TAGS = 1");
    let config = LoaderConfig {
        framework_path: Some("static".into()),
        ..Default::default()
    };
    let mut h = Harness::new(server, config);
    h.boot.load().await.unwrap();

    assert_eq!(h.read("beepy/tags.py").as_deref(), Some("TAGS = 1"));
    assert!(!h
        .interp
        .calls()
        .iter()
        .any(|c| matches!(c, InterpreterCall::Install(p) if p.contains("beepy_web"))));
}
