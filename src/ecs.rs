use std::time::Duration;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_ecs::client::Waiters;
use aws_sdk_ecs::types::{
    AssignPublicIp, AwsVpcConfiguration, ContainerOverride, LaunchType, NetworkConfiguration, TaskOverride,
};
use aws_sdk_ecs::Client;
use tracing::warn;

use crate::error::BoxError;
use crate::task::{Orchestrator, RunTaskSpec};

// Same ceiling as the classic SDK's TasksStopped waiter (100 polls, 6s apart)
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(600);

pub struct EcsOrchestrator {
    client: Client,
    max_wait: Duration,
}

impl EcsOrchestrator {
    pub fn new(config: &SdkConfig, max_wait: Duration) -> Self {
        Self {
            client: Client::new(config),
            max_wait,
        }
    }
}

// Everything about a run request except where it goes
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchConfig {
    pub launch_type: LaunchType,
    pub network: NetworkConfiguration,
    pub overrides: TaskOverride,
}

// Fargate, public IP, awsvpc placement, command override on the named container
pub fn launch_config(spec: &RunTaskSpec) -> Result<LaunchConfig, BoxError> {
    let vpc = AwsVpcConfiguration::builder()
        .set_subnets(Some(spec.subnets.clone()))
        .set_security_groups(Some(spec.security_groups.clone()))
        .assign_public_ip(AssignPublicIp::Enabled)
        .build()?;

    let container = ContainerOverride::builder()
        .name(&spec.container)
        .set_command(Some(spec.command.clone()))
        .build();

    Ok(LaunchConfig {
        launch_type: LaunchType::Fargate,
        network: NetworkConfiguration::builder().awsvpc_configuration(vpc).build(),
        overrides: TaskOverride::builder().container_overrides(container).build(),
    })
}

#[async_trait]
impl Orchestrator for EcsOrchestrator {
    async fn run_task(&self, spec: &RunTaskSpec) -> Result<Vec<String>, BoxError> {
        let config = launch_config(spec)?;

        let output = self
            .client
            .run_task()
            .cluster(&spec.cluster)
            .task_definition(&spec.task_definition)
            .launch_type(config.launch_type)
            .network_configuration(config.network)
            .overrides(config.overrides)
            .send()
            .await
            .map_err(aws_sdk_ecs::Error::from)?;

        let task_ids: Vec<String> = output
            .tasks()
            .iter()
            .filter_map(|task| task.task_arn().map(str::to_string))
            .collect();

        if task_ids.is_empty() {
            for failure in output.failures() {
                warn!(
                    arn = failure.arn().unwrap_or_default(),
                    reason = failure.reason().unwrap_or_default(),
                    detail = failure.detail().unwrap_or_default(),
                    "run task reported a failure"
                );
            }
        }

        Ok(task_ids)
    }

    async fn wait_until_stopped(&self, cluster: &str, task_ids: &[String]) -> Result<(), BoxError> {
        self.client
            .wait_until_tasks_stopped()
            .cluster(cluster)
            .set_tasks(Some(task_ids.to_vec()))
            .wait(self.max_wait)
            .await?;
        Ok(())
    }
}
