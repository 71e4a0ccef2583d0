//! Proxy configuration supervisor.
//!
//! Long-lived loop that regenerates the proxy configuration from the
//! container inventory, validates it with the proxy binary's test
//! command, and reloads the proxy when the configuration changed.
//!
//! State machine: BOOTING → TESTING → RUNNING, then on every detected
//! change RUNNING → REGENERATING → TESTING → RELOADING → RUNNING, and
//! RUNNING → SHUTDOWN on exit. A test failure at boot is fatal; a test
//! failure at reload time rolls the candidate back and keeps the old
//! configuration in effect. The stop command runs exactly once on exit.
//!
//! Change detection compares the aggregated trees structurally: mapping
//! insertion order is ignored, list order preserved.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::executor::ProcessExecutor;
use crate::inventory::ContainerEngine;
use crate::traefik::{traefik_dump, traefik_to_apache, traefik_to_nginx, EmitOptions, TraefikConfig};

/// Target proxy dialect of the supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyDialect {
    /// nginx-family directive configuration
    Nginx,
    /// Apache-family virtual-host configuration
    Apache,
}

/// Supervisor loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Initial configuration being generated
    Booting,
    /// Candidate configuration under proxy-binary test
    Testing,
    /// Polling for inventory changes
    Running,
    /// Change detected, new configuration being written
    Regenerating,
    /// Tested configuration being activated
    Reloading,
    /// Loop finished, stop command executed
    Shutdown,
}

/// Supervisor configuration
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    /// Proxy dialect to emit
    pub dialect: ProxyDialect,
    /// Path the generated configuration is written to
    pub conffile: PathBuf,
    /// Emitter options (base config, listener URL, backend authority)
    pub emit: EmitOptions,
    /// Poll interval
    pub interval: Duration,
    /// Generate and test once, then exit
    pub oneshot: bool,
    /// Command validating the configuration
    pub test_command: Vec<String>,
    /// Command activating a tested configuration
    pub reload_command: Vec<String>,
    /// Command run exactly once on exit
    pub stop_command: Option<Vec<String>>,
}

impl MonitorOptions {
    /// Defaults for supervising an nginx binary
    #[must_use]
    pub fn nginx(conffile: impl Into<PathBuf>) -> Self {
        let conffile = conffile.into();
        let conf = conffile.display().to_string();
        Self {
            dialect: ProxyDialect::Nginx,
            conffile,
            emit: EmitOptions::default(),
            interval: Duration::from_secs(60),
            oneshot: false,
            test_command: vec!["nginx".into(), "-t".into(), "-c".into(), conf.clone()],
            reload_command: vec!["nginx".into(), "-s".into(), "reload".into()],
            stop_command: Some(vec!["nginx".into(), "-s".into(), "quit".into()]),
        }
    }

    /// Defaults for supervising an Apache httpd binary
    #[must_use]
    pub fn apache(conffile: impl Into<PathBuf>) -> Self {
        Self {
            dialect: ProxyDialect::Apache,
            conffile: conffile.into(),
            emit: EmitOptions::default(),
            interval: Duration::from_secs(60),
            oneshot: false,
            test_command: vec!["apachectl".into(), "configtest".into()],
            reload_command: vec!["apachectl".into(), "graceful".into()],
            stop_command: Some(vec!["apachectl".into(), "stop".into()]),
        }
    }
}

/// Handle requesting a running supervisor to exit after its current cycle
#[derive(Debug, Clone)]
pub struct MonitorStopHandle(Arc<AtomicBool>);

impl MonitorStopHandle {
    /// Request the supervisor loop to stop
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Proxy configuration supervisor
pub struct ProxyMonitor<E> {
    engine: E,
    options: MonitorOptions,
    state: MonitorState,
    current: Option<TraefikConfig>,
    current_text: String,
    stopped: Arc<AtomicBool>,
}

impl<E: ContainerEngine> ProxyMonitor<E> {
    /// Create a supervisor over an engine
    pub fn new(engine: E, options: MonitorOptions) -> Self {
        Self {
            engine,
            options,
            state: MonitorState::Booting,
            current: None,
            current_text: String::new(),
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A handle that stops the run loop from another task
    #[must_use]
    pub fn stop_handle(&self) -> MonitorStopHandle {
        MonitorStopHandle(self.stopped.clone())
    }

    /// The current loop state
    #[must_use]
    pub fn state(&self) -> MonitorState {
        self.state
    }

    async fn generate(&self) -> Result<(TraefikConfig, String)> {
        let config = traefik_dump(&self.engine).await?;
        let text = match self.options.dialect {
            ProxyDialect::Nginx => traefik_to_nginx(&config, &self.options.emit)?,
            ProxyDialect::Apache => traefik_to_apache(&config, &self.options.emit)?,
        };
        Ok((config, text))
    }

    fn write_conffile(&self, text: &str) -> Result<()> {
        std::fs::write(&self.options.conffile, text).map_err(|e| {
            Error::io(format!("writing {}", self.options.conffile.display()), e)
        })
    }

    async fn run_command(&self, command: &[String]) -> Result<String> {
        let Some((program, args)) = command.split_first() else {
            return Ok(String::new());
        };
        let output = ProcessExecutor::new(program).execute(&args.to_vec()).await?;
        Ok(output.stderr)
    }

    async fn test_config(&mut self) -> Result<()> {
        self.state = MonitorState::Testing;
        match self.run_command(&self.options.test_command.clone()).await {
            Ok(_) => Ok(()),
            Err(Error::CommandFailed { stderr, .. }) => Err(Error::test_failure(stderr)),
            Err(other) => Err(other),
        }
    }

    /// One poll cycle: regenerate, and on change test + reload.
    ///
    /// A generation failure is logged and skipped; a test failure rolls
    /// the configuration file back to the running text.
    pub async fn poll_once(&mut self) -> Result<()> {
        let (config, text) = match self.generate().await {
            Ok(generated) => generated,
            Err(e) => {
                warn!("generation failed, keeping current config: {e}");
                return Ok(());
            }
        };
        if self.current.as_ref() == Some(&config) {
            debug!("configuration unchanged");
            return Ok(());
        }
        info!("configuration changed, reloading");
        self.state = MonitorState::Regenerating;
        self.write_conffile(&text)?;
        match self.test_config().await {
            Ok(()) => {
                self.state = MonitorState::Reloading;
                self.run_command(&self.options.reload_command.clone()).await?;
                self.current = Some(config);
                self.current_text = text;
            }
            Err(e) => {
                warn!("new config rejected, keeping old: {e}");
                self.write_conffile(&self.current_text.clone())?;
            }
        }
        self.state = MonitorState::Running;
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.state = MonitorState::Shutdown;
        if let Some(stop) = self.options.stop_command.clone() {
            self.run_command(&stop).await?;
        }
        Ok(())
    }

    /// Run the supervisor.
    ///
    /// Boot generates, writes, and tests the initial configuration; a
    /// test failure here is fatal. In oneshot mode the loop exits after
    /// boot; otherwise it polls until a [`MonitorStopHandle`] fires.
    pub async fn run(&mut self) -> Result<()> {
        self.state = MonitorState::Booting;
        let (config, text) = self.generate().await?;
        self.write_conffile(&text)?;
        self.test_config().await?;
        self.current = Some(config);
        self.current_text = text;
        self.state = MonitorState::Running;

        if self.options.oneshot {
            return self.shutdown().await;
        }
        while !self.stopped.load(Ordering::Relaxed) {
            tokio::time::sleep(self.options.interval).await;
            if self.stopped.load(Ordering::Relaxed) {
                break;
            }
            self.poll_once().await?;
        }
        self.shutdown().await
    }
}
