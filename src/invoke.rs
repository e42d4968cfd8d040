use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::InvocationType;
use aws_sdk_lambda::Client;
use tracing::info;

use crate::error::{BoxError, LauncherError, Result};
use crate::event::UploadNotification;
use crate::uri::ResourceUri;

// Payload is passed through undecoded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvokeOutcome {
    pub status_code: i32,
    pub function_error: Option<String>,
    pub payload: Option<Vec<u8>>,
}

#[async_trait]
pub trait FunctionInvoker: Send + Sync {
    async fn invoke(
        &self,
        function: &str,
        invocation_type: &str,
        payload: Vec<u8>,
    ) -> std::result::Result<InvokeOutcome, BoxError>;
}

pub struct LambdaInvoker {
    client: Client,
}

impl LambdaInvoker {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

#[async_trait]
impl FunctionInvoker for LambdaInvoker {
    async fn invoke(
        &self,
        function: &str,
        invocation_type: &str,
        payload: Vec<u8>,
    ) -> std::result::Result<InvokeOutcome, BoxError> {
        // An empty type leaves the service default (RequestResponse)
        let invocation_type = (!invocation_type.is_empty()).then(|| InvocationType::from(invocation_type));

        let output = self
            .client
            .invoke()
            .function_name(function)
            .set_invocation_type(invocation_type)
            .payload(Blob::new(payload))
            .send()
            .await
            .map_err(aws_sdk_lambda::Error::from)?;

        Ok(InvokeOutcome {
            status_code: output.status_code(),
            function_error: output.function_error().map(str::to_string),
            payload: output.payload().map(|blob| blob.as_ref().to_vec()),
        })
    }
}

// Forward the URIs to a deployed event handler as a synthetic upload notification
pub async fn invoke_remote<I: FunctionInvoker + ?Sized>(
    invoker: &I,
    function: &str,
    invocation_type: &str,
    uris: &[ResourceUri],
) -> Result<InvokeOutcome> {
    let payload = serde_json::to_vec(&UploadNotification::from_uris(uris))?;

    let outcome = invoker
        .invoke(function, invocation_type, payload)
        .await
        .map_err(|e| LauncherError::backend("invoke function", e))?;

    info!(
        function,
        status = outcome.status_code,
        function_error = outcome.function_error.as_deref().unwrap_or_default(),
        records = uris.len(),
        "invoked function"
    );

    Ok(outcome)
}
