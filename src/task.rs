use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::command::{build_command, ProcessCommand, ProcessSettings};
use crate::error::{BoxError, LauncherError, Result};
use crate::uri::{Identifier, ResourceUri};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkPlacement {
    pub subnets: Vec<String>,
    pub security_groups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchTemplate {
    pub cluster: String,
    pub task_definition: String,
    pub container: String,
    pub settings: ProcessSettings,
    pub placement: NetworkPlacement,
    pub wait: bool,
}

#[derive(Debug, Clone)]
pub struct TaskRequest {
    cluster: String,
    task_definition: String,
    container: String,
    placement: NetworkPlacement,
    wait: bool,
    uris: Vec<ResourceUri>,
    command: ProcessCommand,
}

impl TaskRequest {
    // Fails before anything is sent unless every URI is an image
    pub fn build(template: &LaunchTemplate, uris: Vec<ResourceUri>) -> Result<Self> {
        let command = build_command(&uris, &template.settings)?;

        Ok(Self {
            cluster: template.cluster.clone(),
            task_definition: template.task_definition.clone(),
            container: template.container.clone(),
            placement: template.placement.clone(),
            wait: template.wait,
            uris,
            command,
        })
    }

    fn run_spec(&self) -> RunTaskSpec {
        RunTaskSpec {
            cluster: self.cluster.clone(),
            task_definition: self.task_definition.clone(),
            container: self.container.clone(),
            command: self.command.args().to_vec(),
            subnets: self.placement.subnets.clone(),
            security_groups: self.placement.security_groups.clone(),
        }
    }
}

// Always launched on Fargate with a public IP
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTaskSpec {
    pub cluster: String,
    pub task_definition: String,
    pub container: String,
    pub command: Vec<String>,
    pub subnets: Vec<String>,
    pub security_groups: Vec<String>,
}

#[async_trait]
pub trait Orchestrator: Send + Sync {
    // ARNs of the tasks the backend started
    async fn run_task(&self, spec: &RunTaskSpec) -> std::result::Result<Vec<String>, BoxError>;

    async fn wait_until_stopped(&self, cluster: &str, task_ids: &[String]) -> std::result::Result<(), BoxError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskResponse {
    #[serde(rename = "TaskId")]
    pub task_id: String,
    #[serde(rename = "URIs")]
    pub uris: Vec<String>,
}

impl fmt::Display for TaskResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.task_id)
    }
}

pub struct TaskLauncher<O> {
    orchestrator: O,
    template: LaunchTemplate,
}

impl<O: Orchestrator> TaskLauncher<O> {
    pub fn new(orchestrator: O, template: LaunchTemplate) -> Self {
        Self { orchestrator, template }
    }

    #[cfg(test)]
    pub(crate) fn orchestrator(&self) -> &O {
        &self.orchestrator
    }

    pub fn request_for(&self, uris: Vec<ResourceUri>) -> Result<TaskRequest> {
        TaskRequest::build(&self.template, uris)
    }

    // The task stays submitted even when the wait fails or is cancelled
    pub async fn submit(&self, request: &TaskRequest, cancel: &CancellationToken) -> Result<TaskResponse> {
        let task_ids = self
            .orchestrator
            .run_task(&request.run_spec())
            .await
            .map_err(|e| LauncherError::backend("run task", e))?;

        let task_id = task_ids.into_iter().next().ok_or(LauncherError::NoTaskProduced)?;

        info!(
            task_id = %task_id,
            cluster = %request.cluster,
            images = request.uris.len(),
            "launched process task"
        );

        if request.wait {
            let waiting = [task_id.clone()];
            tokio::select! {
                _ = cancel.cancelled() => {
                    warn!(task_id = %task_id, "stopped waiting for task");
                    return Err(LauncherError::WaitCancelled { task_id });
                }
                result = self.orchestrator.wait_until_stopped(&request.cluster, &waiting) => {
                    result.map_err(|source| LauncherError::Wait { task_id: task_id.clone(), source })?;
                }
            }
            info!(task_id = %task_id, "process task stopped");
        }

        Ok(TaskResponse {
            task_id,
            uris: request.uris.iter().map(Identifier::as_uri_string).collect(),
        })
    }

    pub async fn launch(&self, uris: Vec<ResourceUri>, cancel: &CancellationToken) -> Result<TaskResponse> {
        let request = self.request_for(uris)?;
        self.submit(&request, cancel).await
    }
}
