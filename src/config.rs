use std::time::Duration;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use clap::{Parser, ValueEnum};

use crate::command::ProcessSettings;
use crate::ecs::DEFAULT_MAX_WAIT;
use crate::error::{LauncherError, Result};
use crate::task::{LaunchTemplate, NetworkPlacement};
use crate::uri::ResourceUri;

/// Launch go-iiif `iiif-process` tasks on ECS, from the command line or as a
/// Lambda function triggered by S3 uploads.
///
/// Every flag can also be set with an `IIIF_PROCESS_` prefixed environment
/// variable, e.g. `IIIF_PROCESS_CLUSTER`.
#[derive(Parser, Debug, Clone)]
#[command(name = "iiif-process-ecs", version)]
pub struct Cli {
    /// A session DSN for ECS, e.g. "region=us-east-1 credentials=default".
    #[arg(long, env = "IIIF_PROCESS_ECS_DSN", default_value = "")]
    pub ecs_dsn: String,

    /// The name of your ECS container.
    #[arg(long, env = "IIIF_PROCESS_CONTAINER", default_value = "")]
    pub container: String,

    /// The name of your ECS cluster.
    #[arg(long, env = "IIIF_PROCESS_CLUSTER", default_value = "")]
    pub cluster: String,

    /// The name of your ECS task definition, inclusive of its revision.
    #[arg(long, env = "IIIF_PROCESS_TASK", default_value = "")]
    pub task: String,

    /// Path to the IIIF config inside the container.
    #[arg(long, env = "IIIF_PROCESS_CONFIG", default_value = "/etc/go-iiif/config.json")]
    pub config: String,

    /// Path to the IIIF processing instructions inside the container.
    #[arg(long, env = "IIIF_PROCESS_INSTRUCTIONS", default_value = "/etc/go-iiif/instructions.json")]
    pub instructions: String,

    /// Have the processor write a report.
    #[arg(long, env = "IIIF_PROCESS_REPORT")]
    pub report: bool,

    /// Name of the report file.
    #[arg(long, env = "IIIF_PROCESS_REPORT_NAME", default_value = "process.json")]
    pub report_name: String,

    /// Strip directory trees from URIs.
    #[arg(
        long,
        env = "IIIF_PROCESS_STRIP_PATHS",
        default_value_t = true,
        action = clap::ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub strip_paths: bool,

    /// Wait for the task to stop.
    #[arg(long, env = "IIIF_PROCESS_WAIT")]
    pub wait: bool,

    /// Longest time, in seconds, to wait for the task to stop.
    #[arg(long, env = "IIIF_PROCESS_WAIT_TIMEOUT", default_value_t = DEFAULT_MAX_WAIT.as_secs())]
    pub wait_timeout: u64,

    /// What to do.
    #[arg(long, env = "IIIF_PROCESS_MODE", value_enum, default_value_t = ModeArg::Task)]
    pub mode: ModeArg,

    /// A session DSN for Lambda. Used when --mode is "invoke".
    #[arg(long, env = "IIIF_PROCESS_LAMBDA_DSN", default_value = "")]
    pub lambda_dsn: String,

    /// Lambda function to invoke. Required when --mode is "invoke".
    #[arg(long, env = "IIIF_PROCESS_LAMBDA_FUNC", default_value = "")]
    pub lambda_func: String,

    /// Lambda invocation type (RequestResponse, Event or DryRun).
    #[arg(long, env = "IIIF_PROCESS_LAMBDA_TYPE", default_value = "")]
    pub lambda_type: String,

    /// One or more subnets the task will run in.
    #[arg(long = "subnet", env = "IIIF_PROCESS_SUBNET")]
    pub subnets: Vec<String>,

    /// One or more security groups the task will assume.
    #[arg(long = "security-group", env = "IIIF_PROCESS_SECURITY_GROUP")]
    pub security_groups: Vec<String>,

    /// One or more IIIF URIs.
    #[arg(long = "uri", env = "IIIF_PROCESS_URI")]
    pub uris: Vec<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    /// Run the ECS task for --uri values and exit.
    Task,
    /// Run as a Lambda function handling S3 upload notifications.
    Lambda,
    /// Invoke a deployed Lambda function with --uri values.
    Invoke,
}

#[derive(Debug, Clone)]
pub enum Mode {
    RunTask {
        session: SessionDsn,
        template: LaunchTemplate,
        uris: Vec<ResourceUri>,
        max_wait: Duration,
    },
    RunAsEventHandler {
        session: SessionDsn,
        template: LaunchTemplate,
        max_wait: Duration,
    },
    InvokeRemote {
        session: SessionDsn,
        function: String,
        invocation_type: String,
        uris: Vec<ResourceUri>,
    },
}

impl Cli {
    pub fn into_mode(self) -> Result<Mode> {
        let mode = self.mode;
        let cli = if mode == ModeArg::Lambda { self.expanded() } else { self };
        let max_wait = Duration::from_secs(cli.wait_timeout);

        match mode {
            ModeArg::Task => Ok(Mode::RunTask {
                session: SessionDsn::parse(&cli.ecs_dsn)?,
                uris: parse_uris(&cli.uris)?,
                template: cli.template()?,
                max_wait,
            }),
            ModeArg::Lambda => Ok(Mode::RunAsEventHandler {
                session: SessionDsn::parse(&cli.ecs_dsn)?,
                template: cli.template()?,
                max_wait,
            }),
            ModeArg::Invoke => {
                if cli.lambda_func.is_empty() {
                    return Err(LauncherError::Config("--lambda-func is required in invoke mode".to_string()));
                }
                Ok(Mode::InvokeRemote {
                    session: SessionDsn::parse(&cli.lambda_dsn)?,
                    uris: parse_uris(&cli.uris)?,
                    function: cli.lambda_func,
                    invocation_type: cli.lambda_type,
                })
            }
        }
    }

    // Lambda environment variables carry lists as comma-separated strings
    fn expanded(mut self) -> Self {
        self.uris = expand(self.uris);
        self.subnets = expand(self.subnets);
        self.security_groups = expand(self.security_groups);
        self
    }

    fn template(&self) -> Result<LaunchTemplate> {
        for (flag, value) in [
            ("--cluster", &self.cluster),
            ("--task", &self.task),
            ("--container", &self.container),
        ] {
            if value.is_empty() {
                return Err(LauncherError::Config(format!("{flag} is required")));
            }
        }

        Ok(LaunchTemplate {
            cluster: self.cluster.clone(),
            task_definition: self.task.clone(),
            container: self.container.clone(),
            settings: ProcessSettings {
                config: self.config.clone(),
                instructions: self.instructions.clone(),
                report_name: self.report.then(|| self.report_name.clone()),
                strip_paths: self.strip_paths,
            },
            placement: NetworkPlacement {
                subnets: self.subnets.clone(),
                security_groups: self.security_groups.clone(),
            },
            wait: self.wait,
        })
    }
}

fn expand(values: Vec<String>) -> Vec<String> {
    values
        .iter()
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_uris(values: &[String]) -> Result<Vec<ResourceUri>> {
    values.iter().map(|v| ResourceUri::parse(v)).collect()
}

/// Where and as whom to talk to AWS, from a DSN such as
/// `region=us-east-1 credentials=default`.
///
/// `credentials` may be `env:`, `iam:` or `session` for the default provider
/// chain, or a profile name from the shared credentials file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionDsn {
    pub region: Option<String>,
    pub profile: Option<String>,
}

impl SessionDsn {
    pub fn parse(dsn: &str) -> Result<Self> {
        let mut session = Self::default();

        for pair in dsn.split_whitespace() {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| LauncherError::Config(format!("invalid DSN component '{pair}'")))?;

            match key {
                "region" => session.region = Some(value.to_string()),
                "credentials" => session.profile = credentials_profile(value)?,
                other => return Err(LauncherError::Config(format!("unknown DSN key '{other}'"))),
            }
        }

        Ok(session)
    }

    pub async fn load(&self) -> SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &self.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(profile) = &self.profile {
            loader = loader.profile_name(profile);
        }
        loader.load().await
    }
}

fn credentials_profile(value: &str) -> Result<Option<String>> {
    match value {
        "" | "env:" | "iam:" | "session" => Ok(None),
        v if v.contains(':') => Err(LauncherError::Config(format!(
            "unsupported credentials '{v}': use a profile name or env:/iam:"
        ))),
        profile => Ok(Some(profile.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uri::Identifier;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("iiif-process-ecs").chain(args.iter().copied())).unwrap()
    }

    const TASK_ARGS: [&str; 6] = ["--cluster", "iiif", "--task", "iiif-process:1", "--container", "iiif-process"];

    #[test]
    fn task_mode_is_the_default() {
        let mut args = TASK_ARGS.to_vec();
        args.extend(["--uri", "photos/img1.jpg", "--subnet", "subnet-1", "--subnet", "subnet-2"]);

        match cli(&args).into_mode().unwrap() {
            Mode::RunTask {
                template,
                uris,
                max_wait,
                ..
            } => {
                assert_eq!(template.cluster, "iiif");
                assert_eq!(template.task_definition, "iiif-process:1");
                assert!(template.settings.strip_paths);
                assert!(!template.wait);
                assert_eq!(template.settings.report_name, None);
                assert_eq!(template.settings.config, "/etc/go-iiif/config.json");
                assert_eq!(template.placement.subnets, ["subnet-1", "subnet-2"]);
                assert_eq!(uris.len(), 1);
                assert_eq!(uris[0].as_uri_string(), "photos/img1.jpg");
                assert_eq!(max_wait, Duration::from_secs(600));
            }
            other => panic!("unexpected mode: {other:?}"),
        }
    }

    #[test]
    fn strip_paths_can_be_disabled() {
        let mut args = TASK_ARGS.to_vec();
        args.extend(["--strip-paths", "false", "--report"]);

        match cli(&args).into_mode().unwrap() {
            Mode::RunTask { template, .. } => {
                assert!(!template.settings.strip_paths);
                assert_eq!(template.settings.report_name.as_deref(), Some("process.json"));
            }
            other => panic!("unexpected mode: {other:?}"),
        }
    }

    #[test]
    fn lambda_mode_expands_comma_lists() {
        let mut args = TASK_ARGS.to_vec();
        args.extend(["--mode", "lambda", "--subnet", "subnet-1,subnet-2", "--security-group", "sg-1, sg-2"]);

        match cli(&args).into_mode().unwrap() {
            Mode::RunAsEventHandler { template, .. } => {
                assert_eq!(template.placement.subnets, ["subnet-1", "subnet-2"]);
                assert_eq!(template.placement.security_groups, ["sg-1", "sg-2"]);
            }
            other => panic!("unexpected mode: {other:?}"),
        }
    }

    #[test]
    fn task_mode_needs_a_cluster() {
        let err = cli(&["--task", "t", "--container", "c"]).into_mode().unwrap_err();
        assert!(err.to_string().contains("--cluster"));
    }

    #[test]
    fn invoke_mode_needs_only_a_function() {
        match cli(&["--mode", "invoke", "--lambda-func", "iiif", "--lambda-type", "Event", "--uri", "a.jpg"])
            .into_mode()
            .unwrap()
        {
            Mode::InvokeRemote {
                function,
                invocation_type,
                uris,
                ..
            } => {
                assert_eq!(function, "iiif");
                assert_eq!(invocation_type, "Event");
                assert_eq!(uris.len(), 1);
            }
            other => panic!("unexpected mode: {other:?}"),
        }

        assert!(cli(&["--mode", "invoke"]).into_mode().is_err());
    }

    #[test]
    fn bad_uris_fail_at_the_boundary() {
        let mut args = TASK_ARGS.to_vec();
        args.extend(["--uri", "gopher://nope/a.jpg"]);
        assert!(matches!(
            cli(&args).into_mode().unwrap_err(),
            LauncherError::InvalidUri { .. }
        ));
    }

    #[test]
    fn dsn_parsing() {
        assert_eq!(SessionDsn::parse("").unwrap(), SessionDsn::default());
        assert_eq!(
            SessionDsn::parse("region=us-west-2 credentials=iiif").unwrap(),
            SessionDsn {
                region: Some("us-west-2".to_string()),
                profile: Some("iiif".to_string()),
            }
        );
        assert_eq!(SessionDsn::parse("region=us-east-1 credentials=env:").unwrap().profile, None);
        assert!(SessionDsn::parse("credentials=~/.aws/credentials:iiif").is_err());
        assert!(SessionDsn::parse("bucket=nope").is_err());
        assert!(SessionDsn::parse("region").is_err());
    }
}
