/// Common test utilities for terralocacon integration tests
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use terralocacon::container::{ContainerPort, ContainerRuntime, ContainerSpec, Launcher};
use terralocacon::context::Context;
use terralocacon::errors::{Result, TlcError};

/// One call the mock runtime received
#[derive(Debug, Clone, PartialEq)]
#[allow(dead_code)]
pub enum Call {
    Run(String),
    MappedPort(String, String),
    Logs(String),
    IsRunning(String),
    Remove(String),
}

/// In-memory container runtime that records every call
#[derive(Default)]
#[allow(dead_code)]
pub struct MockRuntime {
    calls: Mutex<Vec<Call>>,
    next_id: AtomicUsize,
    live: Mutex<HashMap<String, ContainerSpec>>,
    /// Port handed out for every published container port
    pub external_port: Option<u16>,
    /// Logs returned for every container
    pub logs: String,
    pub fail_run: Option<String>,
}

#[allow(dead_code)]
impl MockRuntime {
    /// Runtime whose containers log `logs` and publish every port on `external_port`
    pub fn new(logs: &str, external_port: u16) -> Self {
        Self {
            logs: logs.to_string(),
            external_port: Some(external_port),
            ..Self::default()
        }
    }

    pub fn without_ports(logs: &str) -> Self {
        Self {
            logs: logs.to_string(),
            ..Self::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_run: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn removed(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Remove(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().unwrap().len()
    }

    /// Spec the container was started from
    pub fn spec_of(&self, id: &str) -> Option<ContainerSpec> {
        self.live.lock().unwrap().get(id).cloned()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ContainerRuntime for MockRuntime {
    fn run(&self, _ctx: &Context, spec: &ContainerSpec) -> Result<String> {
        self.record(Call::Run(spec.image.clone()));
        if let Some(message) = &self.fail_run {
            return Err(TlcError::Docker(message.clone()));
        }
        let id = format!("mock{:012}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.live.lock().unwrap().insert(id.clone(), spec.clone());
        Ok(id)
    }

    fn mapped_port(&self, _ctx: &Context, id: &str, port: &ContainerPort) -> Result<Option<u16>> {
        self.record(Call::MappedPort(id.to_string(), port.to_string()));
        let live = self.live.lock().unwrap();
        let spec = live
            .get(id)
            .ok_or_else(|| TlcError::Docker(format!("No such container: {}", id)))?;
        if spec.exposed_ports.contains(port) {
            Ok(self.external_port)
        } else {
            Ok(None)
        }
    }

    fn logs(&self, _ctx: &Context, id: &str) -> Result<String> {
        self.record(Call::Logs(id.to_string()));
        Ok(self.logs.clone())
    }

    fn is_running(&self, _ctx: &Context, id: &str) -> Result<bool> {
        self.record(Call::IsRunning(id.to_string()));
        Ok(self.live.lock().unwrap().contains_key(id))
    }

    fn remove(&self, _ctx: &Context, id: &str) -> Result<()> {
        self.record(Call::Remove(id.to_string()));
        match self.live.lock().unwrap().remove(id) {
            Some(_) => Ok(()),
            None => Err(TlcError::Docker(format!(
                "`docker rm` failed: Error response from daemon: No such container: {}",
                id
            ))),
        }
    }
}

/// Launcher on `runtime` with a fast poll and short readiness timeout
#[allow(dead_code)]
pub fn launcher(runtime: &Arc<MockRuntime>) -> Launcher {
    let runtime: Arc<dyn ContainerRuntime> = runtime.clone();
    Launcher::new(runtime)
        .with_poll_interval(Duration::from_millis(5))
        .with_ready_timeout(Duration::from_millis(200))
}

/// A project directory with a local/localstack.tf in it
#[allow(dead_code)]
pub struct TestProject {
    pub temp_dir: TempDir,
    pub source: PathBuf,
}

#[allow(dead_code)]
impl TestProject {
    pub fn new(content: &str) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let local = temp_dir.path().join("local");
        std::fs::create_dir_all(&local).expect("Failed to create local directory");
        let source = local.join("localstack.tf");
        std::fs::write(&source, content).expect("Failed to write localstack.tf");

        TestProject { temp_dir, source }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn out_dir(&self) -> PathBuf {
        self.temp_dir.path().join("out")
    }
}

#[allow(dead_code)]
pub const LOCALSTACK_TF: &str = r#"provider "aws" {
  access_key                  = "test"
  secret_key                  = "test"
  region                      = "eu-west-1"
  skip_credentials_validation = true

  endpoints {
    dynamodb = "http://localhost:4566"
  }
}

resource "aws_dynamodb_table" "users" {
  name         = "users"
  billing_mode = "PAY_PER_REQUEST"
  hash_key     = "id"

  attribute {
    name = "id"
    type = "S"
  }
}
"#;
