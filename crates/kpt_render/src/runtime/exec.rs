use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use kpt_errors::{Error, ErrorKind};
use kpt_krm::ResourceList;
use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use tokio::process::Command;

use super::FunctionRuntime;

/// Runs a function as a local executable. Same wire protocol as the
/// container runtime, no sandboxing.
pub struct ExecRuntime {
    path: String,
}

impl ExecRuntime {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl FunctionRuntime for ExecRuntime {
    async fn run(&self, input: ResourceList, timeout: Duration) -> Result<ResourceList, Error> {
        tokio::time::timeout(timeout, self.run_once(input))
            .await
            .map_err(|_| Error::new(ErrorKind::FunctionFailed, format!("{} timed out after {timeout:?}", self.path)))?
    }
}

impl ExecRuntime {
    async fn run_once(&self, input: ResourceList) -> Result<ResourceList, Error> {
        let mut child = Command::new(&self.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::with_source(ErrorKind::FunctionFailed, format!("failed to spawn {}", self.path), e))?;

        let wire = input.to_wire()?;
        let mut stdin = child.stdin.take().expect("piped stdin");
        stdin
            .write_all(wire.as_bytes())
            .await
            .map_err(|e| Error::with_source(ErrorKind::FunctionFailed, "failed to write ResourceList to stdin", e))?;
        drop(stdin);

        let mut stdout = String::new();
        child
            .stdout
            .take()
            .expect("piped stdout")
            .read_to_string(&mut stdout)
            .await
            .map_err(|e| Error::with_source(ErrorKind::FunctionFailed, "failed to read stdout", e))?;

        let mut stderr = String::new();
        child
            .stderr
            .take()
            .expect("piped stderr")
            .read_to_string(&mut stderr)
            .await
            .map_err(|e| Error::with_source(ErrorKind::FunctionFailed, "failed to read stderr", e))?;

        let status = child
            .wait()
            .await
            .map_err(|e| Error::with_source(ErrorKind::FunctionFailed, format!("failed waiting for {}", self.path), e))?;

        if !status.success() {
            return Err(Error::new(
                ErrorKind::FunctionFailed,
                format!("{} exited {status}: {stderr}", self.path),
            ));
        }

        ResourceList::from_wire(&stdout)
    }
}
