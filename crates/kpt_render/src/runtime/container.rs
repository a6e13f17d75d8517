use std::time::Duration;

use async_trait::async_trait;
use bollard::container::{
    AttachContainerOptions, Config, RemoveContainerOptions, WaitContainerOptions,
};
use bollard::secret::HostConfig;
use bollard::Docker;
use futures::StreamExt as _;
use kpt_errors::{Error, ErrorKind};
use kpt_krm::ResourceList;
use tokio::io::AsyncWriteExt as _;

use super::{FunctionRuntime, NetworkPolicy};

/// Runs a function as a container image: no network by default, no bind
/// mounts, wall-clock timeout, memory ceiling.
pub struct ContainerRuntime {
    docker: Docker,
    image: String,
    network_policy: NetworkPolicy,
    memory_limit_bytes: Option<i64>,
}

impl ContainerRuntime {
    pub fn new(docker: Docker, image: impl Into<String>) -> Self {
        Self {
            docker,
            image: image.into(),
            network_policy: NetworkPolicy::None,
            memory_limit_bytes: None,
        }
    }

    pub fn with_network_policy(mut self, policy: NetworkPolicy) -> Self {
        self.network_policy = policy;
        self
    }

    pub fn with_memory_limit_bytes(mut self, limit: i64) -> Self {
        self.memory_limit_bytes = Some(limit);
        self
    }
}

#[async_trait]
impl FunctionRuntime for ContainerRuntime {
    async fn run(&self, input: ResourceList, timeout: Duration) -> Result<ResourceList, Error> {
        tokio::time::timeout(timeout, self.run_once(input))
            .await
            .map_err(|_| Error::new(ErrorKind::FunctionFailed, format!("{} timed out after {timeout:?}", self.image)))?
    }
}

impl ContainerRuntime {
    async fn run_once(&self, input: ResourceList) -> Result<ResourceList, Error> {
        let network_mode = match self.network_policy {
            NetworkPolicy::None => "none",
            NetworkPolicy::Host => "host",
        };

        let config = Config {
            image: Some(self.image.clone()),
            attach_stdin: Some(true),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            open_stdin: Some(true),
            tty: Some(false),
            host_config: Some(HostConfig {
                network_mode: Some(network_mode.to_owned()),
                memory: self.memory_limit_bytes,
                binds: None,
                ..Default::default()
            }),
            ..Default::default()
        };

        let container = self
            .docker
            .create_container::<String, String>(None, config)
            .await
            .map_err(|e| Error::with_source(ErrorKind::FunctionFailed, format!("failed to create container for {}", self.image), e))?;

        let result = self.run_in_container(&container.id, input).await;

        let _ = self
            .docker
            .remove_container(
                &container.id,
                Some(RemoveContainerOptions { force: true, ..Default::default() }),
            )
            .await;

        result
    }

    async fn run_in_container(&self, container_id: &str, input: ResourceList) -> Result<ResourceList, Error> {
        let attach_options = AttachContainerOptions::<String> {
            stdin: Some(true),
            stdout: Some(true),
            stderr: Some(true),
            stream: Some(true),
            ..Default::default()
        };
        let attach = self
            .docker
            .attach_container(container_id, Some(attach_options))
            .await
            .map_err(|e| Error::with_source(ErrorKind::FunctionFailed, "failed to attach to container", e))?;
        let mut output = attach.output;
        let mut input_sink = attach.input;

        self.docker
            .start_container::<String>(container_id, None)
            .await
            .map_err(|e| Error::with_source(ErrorKind::FunctionFailed, "failed to start container", e))?;

        let wire = input.to_wire()?;
        input_sink
            .write_all(wire.as_bytes())
            .await
            .map_err(|e| Error::with_source(ErrorKind::FunctionFailed, "failed to write ResourceList to stdin", e))?;
        input_sink
            .shutdown()
            .await
            .map_err(|e| Error::with_source(ErrorKind::FunctionFailed, "failed to close container stdin", e))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        while let Some(chunk) = output.next().await {
            let chunk = chunk.map_err(|e| Error::with_source(ErrorKind::FunctionFailed, "error reading container output", e))?;
            match chunk {
                bollard::container::LogOutput::StdOut { message } => stdout.extend_from_slice(&message),
                bollard::container::LogOutput::StdErr { message } => stderr.extend_from_slice(&message),
                _ => {}
            }
        }

        let mut waiter = self.docker.wait_container(container_id, None::<WaitContainerOptions<String>>);
        let exit = waiter
            .next()
            .await
            .transpose()
            .map_err(|e| Error::with_source(ErrorKind::FunctionFailed, "failed waiting for container exit", e))?;
        let exit_code = exit.map(|r| r.status_code).unwrap_or_default();
        if exit_code != 0 {
            return Err(Error::new(
                ErrorKind::FunctionFailed,
                format!("{} exited {exit_code}: {}", self.image, String::from_utf8_lossy(&stderr)),
            ));
        }

        ResourceList::from_wire(&String::from_utf8_lossy(&stdout))
    }
}
