use std::time::{Duration, SystemTime, UNIX_EPOCH};

use lambda_runtime::{Error, LambdaEvent};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::command::select_images;
use crate::error::Result;
use crate::event::UploadNotification;
use crate::task::{Orchestrator, TaskLauncher, TaskResponse};

// Time left for the error to reach the runtime before the sandbox is frozen
const DEADLINE_MARGIN: Duration = Duration::from_millis(500);

// Launch one task for the image keys in an upload notification; `None` when
// there is nothing to process
pub async fn handle_notification<O: Orchestrator>(
    launcher: &TaskLauncher<O>,
    notification: UploadNotification,
    cancel: &CancellationToken,
) -> Result<Option<TaskResponse>> {
    let images = select_images(notification.keys())?;

    if images.is_empty() {
        info!(records = notification.records.len(), "no images in notification");
        return Ok(None);
    }

    let response = launcher.launch(images, cancel).await?;
    info!("{}", serde_json::to_string(&response)?);

    Ok(Some(response))
}

// Main Lambda handler - any wait is abandoned just before the invocation deadline
pub async fn function_handler<O: Orchestrator>(
    launcher: &TaskLauncher<O>,
    event: LambdaEvent<UploadNotification>,
) -> std::result::Result<Option<TaskResponse>, Error> {
    let cancel = CancellationToken::new();
    let watchdog = {
        let cancel = cancel.clone();
        let remaining = wait_budget(event.context.deadline);
        tokio::spawn(async move {
            tokio::time::sleep(remaining).await;
            cancel.cancel();
        })
    };

    let result = handle_notification(launcher, event.payload, &cancel).await;
    watchdog.abort();

    Ok(result?)
}

// Deadline is milliseconds since the epoch
fn wait_budget(deadline_ms: u64) -> Duration {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    Duration::from_millis(deadline_ms)
        .saturating_sub(now)
        .saturating_sub(DEADLINE_MARGIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LauncherError;
    use crate::task::tests::{template, FakeOrchestrator};

    fn notification(keys: &[&str]) -> UploadNotification {
        let payload = serde_json::json!({
            "Records": keys
                .iter()
                .map(|k| serde_json::json!({ "s3": { "object": { "key": k } } }))
                .collect::<Vec<_>>()
        });
        serde_json::from_value(payload).unwrap()
    }

    #[tokio::test]
    async fn launches_only_the_image_keys() {
        let mut template = template(false);
        template.settings.strip_paths = false;
        let launcher = TaskLauncher::new(FakeOrchestrator::returning(&["arn:task/9"]), template);

        let response = handle_notification(&launcher, notification(&["a.jpg", "b.txt", "c.png"]), &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(response.task_id, "arn:task/9");
        assert_eq!(response.uris, ["a.jpg", "c.png"]);

        let runs = launcher_runs(&launcher);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0][runs[0].len() - 4..], ["-uri", "a.jpg", "-uri", "c.png"]);
    }

    #[tokio::test]
    async fn nothing_to_do_without_images() {
        let launcher = TaskLauncher::new(FakeOrchestrator::returning(&["arn:task/9"]), template(false));

        let response = handle_notification(&launcher, notification(&["notes.txt"]), &CancellationToken::new())
            .await
            .unwrap();
        assert!(response.is_none());

        let response = handle_notification(&launcher, UploadNotification::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(response.is_none());

        assert!(launcher_runs(&launcher).is_empty());
    }

    #[tokio::test]
    async fn backend_errors_reach_the_runtime() {
        let launcher = TaskLauncher::new(FakeOrchestrator::returning(&[]), template(false));

        let err = handle_notification(&launcher, notification(&["a.jpg"]), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LauncherError::NoTaskProduced));
    }

    #[test]
    fn past_deadlines_leave_no_time() {
        assert_eq!(wait_budget(0), Duration::ZERO);
    }

    #[test]
    fn waits_end_before_the_deadline() {
        let now_ms = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as u64;

        let budget = wait_budget(now_ms + 10_000);
        assert!(budget <= Duration::from_millis(10_000) - DEADLINE_MARGIN);
        assert!(budget > Duration::from_millis(9_000));

        assert_eq!(wait_budget(now_ms + 200), Duration::ZERO);
    }

    fn launcher_runs(launcher: &TaskLauncher<FakeOrchestrator>) -> Vec<Vec<String>> {
        launcher.orchestrator().runs().into_iter().map(|spec| spec.command).collect()
    }
}
