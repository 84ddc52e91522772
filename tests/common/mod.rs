//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use modular_server::config::ServerConfig;
use modular_server::host::ModuleHost;
use modular_server::lifecycle::Shutdown;
use modular_server::module::{
    ConnectionHandler, DispatchError, DispatchResult, LifecycleError, LifecycleResult, Module,
    ModuleCore, ModuleKind, ModuleVersion, PipelineStep, Surface,
};
use modular_server::net::{Listener, ListenerHandle};
use modular_server::pipeline::{ExecutionLine, WorkUnit};
use modular_server::server::{ConnectionContext, Server};

/// Chronological record of lifecycle and dispatch calls, shared across
/// every module in a test. Entries look like `"init:gate"`.
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

#[allow(dead_code)]
pub fn events(log: &EventLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Drop-counting value a test module stows in the connection context.
/// Counts how many times the server tore the context down.
#[allow(dead_code)]
pub struct TeardownProbe {
    drops: Arc<AtomicUsize>,
}

impl Drop for TeardownProbe {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Instrumented module. Records every lifecycle and dispatch call in the
/// shared log, can be told to fail at any point, and optionally appends a
/// tag to whatever it dispatches on.
pub struct TestModule {
    core: ModuleCore,
    log: EventLog,
    fail_init: bool,
    fail_hook_line: bool,
    fail_hook_server: bool,
    fail_dispatch: bool,
    tag: Option<String>,
    probe: Option<Arc<AtomicUsize>>,
}

impl TestModule {
    pub fn new(name: &str, priority: i32, kind: ModuleKind, log: &EventLog) -> Arc<Self> {
        Arc::new(Self {
            core: ModuleCore::new(name, priority, kind, ModuleVersion(0, 1)),
            log: log.clone(),
            fail_init: false,
            fail_hook_line: false,
            fail_hook_server: false,
            fail_dispatch: false,
            tag: None,
            probe: None,
        })
    }

    /// A module whose `init` reports failure.
    #[allow(dead_code)]
    pub fn failing_init(name: &str, priority: i32, kind: ModuleKind, log: &EventLog) -> Arc<Self> {
        let mut module = Self::unwrapped(name, priority, kind, log);
        module.fail_init = true;
        Arc::new(module)
    }

    /// A module whose server hook reports failure (line hook still works).
    #[allow(dead_code)]
    pub fn failing_server_hook(
        name: &str,
        priority: i32,
        kind: ModuleKind,
        log: &EventLog,
    ) -> Arc<Self> {
        let mut module = Self::unwrapped(name, priority, kind, log);
        module.fail_hook_server = true;
        Arc::new(module)
    }

    /// A module whose line hook reports failure.
    #[allow(dead_code)]
    pub fn failing_line_hook(
        name: &str,
        priority: i32,
        kind: ModuleKind,
        log: &EventLog,
    ) -> Arc<Self> {
        let mut module = Self::unwrapped(name, priority, kind, log);
        module.fail_hook_line = true;
        Arc::new(module)
    }

    /// A module that aborts every chain it runs in.
    #[allow(dead_code)]
    pub fn aborting(name: &str, priority: i32, kind: ModuleKind, log: &EventLog) -> Arc<Self> {
        let mut module = Self::unwrapped(name, priority, kind, log);
        module.fail_dispatch = true;
        Arc::new(module)
    }

    /// A module that appends `tag` to the buffer or payload it dispatches
    /// on, so tests can see who ran and in what order.
    #[allow(dead_code)]
    pub fn tagging(
        name: &str,
        priority: i32,
        kind: ModuleKind,
        log: &EventLog,
        tag: &str,
    ) -> Arc<Self> {
        let mut module = Self::unwrapped(name, priority, kind, log);
        module.tag = Some(tag.to_owned());
        Arc::new(module)
    }

    /// A connection module that stows a [`TeardownProbe`] in the context.
    #[allow(dead_code)]
    pub fn probing(
        name: &str,
        priority: i32,
        log: &EventLog,
        drops: &Arc<AtomicUsize>,
    ) -> Arc<Self> {
        let mut module = Self::unwrapped(name, priority, ModuleKind::Connection, log);
        module.probe = Some(drops.clone());
        Arc::new(module)
    }

    fn unwrapped(name: &str, priority: i32, kind: ModuleKind, log: &EventLog) -> Self {
        Self {
            core: ModuleCore::new(name, priority, kind, ModuleVersion(0, 1)),
            log: log.clone(),
            fail_init: false,
            fail_hook_line: false,
            fail_hook_server: false,
            fail_dispatch: false,
            tag: None,
            probe: None,
        }
    }

    fn record(&self, op: &str) {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:{}", op, self.name()));
    }
}

impl Module for TestModule {
    fn core(&self) -> &ModuleCore {
        &self.core
    }

    fn init(&self) -> LifecycleResult {
        self.record("init");
        if self.fail_init {
            return Err(LifecycleError::init(self.name(), "forced init failure"));
        }
        Ok(())
    }

    fn hook_line(self: Arc<Self>, line: &ExecutionLine) -> LifecycleResult {
        self.record("hook_line");
        if self.fail_hook_line {
            return Err(LifecycleError::hook(
                self.name(),
                Surface::Line,
                "forced hook failure",
            ));
        }
        line.attach(self.clone(), self)?;
        Ok(())
    }

    fn hook_server(self: Arc<Self>, server: &Server) -> LifecycleResult {
        self.record("hook_server");
        if self.fail_hook_server {
            return Err(LifecycleError::hook(
                self.name(),
                Surface::Server,
                "forced hook failure",
            ));
        }
        server.attach(self.clone(), self)?;
        Ok(())
    }

    fn unhook_line(&self, line: &ExecutionLine) -> LifecycleResult {
        self.record("unhook_line");
        line.detach(self.name())?;
        Ok(())
    }

    fn unhook_server(&self, server: &Server) -> LifecycleResult {
        self.record("unhook_server");
        server.detach(self.name())?;
        Ok(())
    }

    fn destroy(&self) -> LifecycleResult {
        self.record("destroy");
        Ok(())
    }
}

impl ConnectionHandler for TestModule {
    fn update(&self, _socket: &ListenerHandle, ctx: &mut ConnectionContext) -> DispatchResult {
        self.record("update");
        if let Some(drops) = &self.probe {
            ctx.extensions_mut().insert(TeardownProbe {
                drops: drops.clone(),
            });
        }
        if self.fail_dispatch {
            return Err(DispatchError::handler(self.name(), "forced abort"));
        }
        if let Some(tag) = &self.tag {
            ctx.buffer_mut().extend_from_slice(tag.as_bytes());
        }
        Ok(())
    }
}

impl PipelineStep for TestModule {
    fn process(&self, work: &mut WorkUnit) -> DispatchResult {
        self.record("process");
        if self.fail_dispatch {
            return Err(DispatchError::step(self.name(), "forced abort"));
        }
        if let Some(tag) = &self.tag {
            work.payload_mut().extend_from_slice(tag.as_bytes());
        }
        Ok(())
    }
}

/// Line, server and host wired together the way `main` does it, with no
/// modules installed.
#[allow(dead_code)]
pub struct Harness {
    pub line: Arc<ExecutionLine>,
    pub server: Arc<Server>,
    pub host: ModuleHost,
}

#[allow(dead_code)]
pub fn harness() -> Harness {
    let config = Arc::new(test_config());
    let line = Arc::new(ExecutionLine::new());
    let server = Arc::new(Server::new(Arc::clone(&line), config));
    let host = ModuleHost::new(Arc::clone(&line), Arc::clone(&server));
    Harness { line, server, host }
}

/// Config bound to an ephemeral local port, with no modules.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.modules.clear();
    config.observability.metrics_enabled = false;
    config
}

/// A running stack: accept loop spawned, ready for real connections.
#[allow(dead_code)]
pub struct RunningStack {
    pub addr: SocketAddr,
    pub server: Arc<Server>,
    pub host: ModuleHost,
    pub shutdown: Shutdown,
}

#[allow(dead_code)]
pub async fn start_stack() -> RunningStack {
    let config = Arc::new(test_config());
    let line = Arc::new(ExecutionLine::new());
    let server = Arc::new(Server::new(Arc::clone(&line), Arc::clone(&config)));
    let host = ModuleHost::new(line, Arc::clone(&server));

    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr();

    let shutdown = Shutdown::new();
    let accept_rx = shutdown.subscribe();
    tokio::spawn(Arc::clone(&server).run(listener, accept_rx));

    RunningStack {
        addr,
        server,
        host,
        shutdown,
    }
}

/// Connect, send `payload`, half-close, read the reply until the server
/// closes. The half-close lets the server's read return without waiting
/// out its timeout.
#[allow(dead_code)]
pub async fn exchange(addr: SocketAddr, payload: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(payload).await.unwrap();
    stream.shutdown().await.unwrap();
    let mut reply = Vec::new();
    stream.read_to_end(&mut reply).await.unwrap();
    reply
}
