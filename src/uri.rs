use std::fmt;
use std::path::Path;

use url::{form_urlencoded, Url};

use crate::error::{LauncherError, Result};

pub trait Identifier {
    // Storage path or key the identifier resolves to
    fn target(&self) -> Result<String>;

    fn as_uri_string(&self) -> String;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceUri {
    Path(PathUri),
    Rewrite(RewriteUri),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathUri {
    raw: String,
    path: String,
}

// rewrite:///<origin>?target=<path>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteUri {
    raw: String,
    origin: String,
    target: String,
}

impl ResourceUri {
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(LauncherError::invalid_uri(input, "empty identifier"));
        }

        if !input.contains("://") {
            return Ok(Self::Path(PathUri {
                raw: input.to_string(),
                path: input.to_string(),
            }));
        }

        let url = Url::parse(input).map_err(|e| LauncherError::invalid_uri(input, e.to_string()))?;
        let path = format!("{}{}", url.host_str().unwrap_or_default(), url.path());

        match url.scheme() {
            "file" => {
                if path.is_empty() || path == "/" {
                    return Err(LauncherError::invalid_uri(input, "missing path"));
                }
                Ok(Self::Path(PathUri {
                    raw: input.to_string(),
                    path,
                }))
            }
            "rewrite" => {
                let target = url
                    .query_pairs()
                    .find(|(k, _)| k == "target")
                    .map(|(_, v)| v.into_owned())
                    .unwrap_or_default();
                if target.is_empty() {
                    return Err(LauncherError::invalid_uri(input, "missing target parameter"));
                }
                Ok(Self::Rewrite(RewriteUri {
                    raw: input.to_string(),
                    origin: path,
                    target,
                }))
            }
            other => Err(LauncherError::invalid_uri(
                input,
                format!("unsupported scheme '{other}'"),
            )),
        }
    }

    pub fn stripped(&self) -> Self {
        match self {
            Self::Path(p) => {
                let base = basename(&p.path).to_string();
                Self::Path(PathUri {
                    raw: base.clone(),
                    path: base,
                })
            }
            Self::Rewrite(r) => {
                let origin = basename(&r.origin).to_string();
                let target = basename(&r.target).to_string();
                let query = form_urlencoded::Serializer::new(String::new())
                    .append_pair("target", &target)
                    .finish();
                Self::Rewrite(RewriteUri {
                    raw: format!("rewrite:///{origin}?{query}"),
                    origin,
                    target,
                })
            }
        }
    }
}

impl Identifier for ResourceUri {
    fn target(&self) -> Result<String> {
        match self {
            Self::Path(p) => Ok(p.path.clone()),
            Self::Rewrite(r) => Ok(r.target.clone()),
        }
    }

    fn as_uri_string(&self) -> String {
        match self {
            Self::Path(p) => p.raw.clone(),
            Self::Rewrite(r) => r.raw.clone(),
        }
    }
}

impl fmt::Display for ResourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_uri_string())
    }
}

fn basename(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path)
}

// Extension-derived MIME type of the target's basename, empty when unknown.
// Dotfiles count: `.png` has the extension `png`.
pub fn mime_type_of(target: &str) -> String {
    basename(target)
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
        .and_then(|ext| mime_guess::from_ext(ext).first())
        .map(|mime| mime.essence_str().to_string())
        .unwrap_or_default()
}

pub fn is_image(target: &str) -> bool {
    mime_type_of(target).starts_with("image/")
}
