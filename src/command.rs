use tracing::debug;

use crate::error::{LauncherError, Result};
use crate::uri::{is_image, mime_type_of, Identifier, ResourceUri};

// Location inside the task's container image
pub const PROCESS_BINARY: &str = "/bin/iiif-process";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSettings {
    pub config: String,
    pub instructions: String,
    pub report_name: Option<String>,
    pub strip_paths: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCommand {
    args: Vec<String>,
}

impl ProcessCommand {
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

// Strict: the first non-image identifier fails the whole build
pub fn build_command(uris: &[ResourceUri], settings: &ProcessSettings) -> Result<ProcessCommand> {
    let mut images = Vec::with_capacity(uris.len());

    for uri in uris {
        let uri = if settings.strip_paths { uri.stripped() } else { uri.clone() };
        let target = uri.target()?;
        let mime = mime_type_of(&target);

        if !mime.starts_with("image/") {
            return Err(LauncherError::NotAnImage { uri: target, mime });
        }

        images.push(uri.as_uri_string());
    }

    if images.is_empty() {
        return Err(LauncherError::NoImages);
    }

    let mut args = vec![
        PROCESS_BINARY.to_string(),
        "-config".to_string(),
        settings.config.clone(),
        "-instructions".to_string(),
        settings.instructions.clone(),
    ];

    if let Some(name) = &settings.report_name {
        args.extend(["-report".to_string(), "-report-name".to_string(), name.clone()]);
    }

    for image in images {
        args.push("-uri".to_string());
        args.push(image);
    }

    debug!(command = %args.join(" "), "built process command");
    Ok(ProcessCommand { args })
}

// Permissive: non-image keys are dropped, order is preserved
pub fn select_images<I, S>(keys: I) -> Result<Vec<ResourceUri>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut selected = Vec::new();

    for key in keys {
        let uri = ResourceUri::parse(key.as_ref())?;
        let target = uri.target()?;

        if !is_image(&target) {
            debug!(key = key.as_ref(), "skipping non-image key");
            continue;
        }

        selected.push(uri);
    }

    Ok(selected)
}
