use clap::Parser;
use lambda_runtime::{run, service_fn, Error};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod command;
mod config;
mod ecs;
mod error;
mod event;
mod handler;
mod invoke;
mod task;
mod uri;

use config::{Cli, Mode, ModeArg};
use ecs::EcsOrchestrator;
use invoke::{invoke_remote, LambdaInvoker};
use task::TaskLauncher;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.mode == ModeArg::Lambda);

    let result = match cli.into_mode() {
        Ok(mode) => dispatch(mode).await,
        Err(err) => Err(err.into()),
    };

    if let Err(err) = result {
        error!(error = %err, "iiif-process-ecs failed");
        std::process::exit(1);
    }
}

// JSON lines for CloudWatch when running as a function, compact text otherwise
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if json {
        builder.json().without_time().with_target(false).init();
    } else {
        builder.compact().init();
    }
}

async fn dispatch(mode: Mode) -> Result<(), Error> {
    match mode {
        Mode::RunTask {
            session,
            template,
            uris,
            max_wait,
        } => {
            let request = task::TaskRequest::build(&template, uris)?;
            let launcher = TaskLauncher::new(EcsOrchestrator::new(&session.load().await, max_wait), template);

            let cancel = CancellationToken::new();
            let interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    interrupt.cancel();
                }
            });

            let response = launcher.submit(&request, &cancel).await?;
            info!(task_id = %response, "{}", serde_json::to_string(&response)?);
            Ok(())
        }
        Mode::RunAsEventHandler {
            session,
            template,
            max_wait,
        } => {
            if template.wait {
                warn!("waiting for tasks inside a Lambda function is bounded by the function timeout");
            }

            let launcher = TaskLauncher::new(EcsOrchestrator::new(&session.load().await, max_wait), template);
            run(service_fn(|event| handler::function_handler(&launcher, event))).await
        }
        Mode::InvokeRemote {
            session,
            function,
            invocation_type,
            uris,
        } => {
            let invoker = LambdaInvoker::new(&session.load().await);
            invoke_remote(&invoker, &function, &invocation_type, &uris).await?;
            Ok(())
        }
    }
}
