use miette::{IntoDiagnostic, Result, miette};
use std::path::{Path, PathBuf};

/// Config file read from the current directory when `--config` is not given
pub const DEFAULT_CONFIG: &str = "stowage.kdl";

/// Environment variable consulted for the commit author
pub const AUTHOR_ENV: &str = "STOWAGE_AUTHOR";

/// Environment variable holding the tracing filter
pub const LOG_ENV: &str = "STOWAGE_LOG";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub repository: Option<PathBuf>,
    pub author: Option<String>,
    pub log_level: Option<String>,
}

impl Config {
    pub fn from_kdl(text: &str) -> Result<Self> {
        let doc = text
            .parse::<kdl::KdlDocument>()
            .map_err(|e| miette!("Failed to parse KDL: {}", e))?;

        let mut config = Config::default();

        for node in doc.nodes() {
            match node.name().value() {
                "repository" => {
                    if config.repository.is_some() {
                        return Err(miette!("Multiple repository nodes found"));
                    }
                    config.repository = Some(PathBuf::from(string_value(node)?));
                }
                "author" => {
                    if config.author.is_some() {
                        return Err(miette!("Multiple author nodes found"));
                    }
                    config.author = Some(string_value(node)?.to_string());
                }
                "log-level" => {
                    config.log_level = Some(string_value(node)?.to_string());
                }
                other => {
                    return Err(miette!("Unknown config node: {}", other));
                }
            }
        }

        Ok(config)
    }

    /// Read `path`, or the default file if it exists
    ///
    /// An explicitly named file must exist; a missing default file yields an
    /// empty config.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (path, true),
            None => (Path::new(DEFAULT_CONFIG), false),
        };
        if !required && !path.exists() {
            return Ok(Config::default());
        }

        let text = std::fs::read_to_string(path)
            .into_diagnostic()
            .map_err(|e| e.wrap_err(format!("reading config {}", path.display())))?;
        Self::from_kdl(&text)
    }

    /// Repository location: flag, then config, then the current directory
    pub fn location(&self, flag: Option<&Path>) -> PathBuf {
        flag.map(Path::to_path_buf)
            .or_else(|| self.repository.clone())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Commit author: flag, then config, then the environment
    pub fn author(&self, flag: Option<&str>, env: Option<String>) -> Option<String> {
        flag.map(str::to_string)
            .or_else(|| self.author.clone())
            .or(env)
    }

    /// Default tracing filter when `STOWAGE_LOG` is unset
    pub fn log_filter(&self, verbose: bool) -> &str {
        if verbose {
            "debug"
        } else {
            self.log_level.as_deref().unwrap_or("warn")
        }
    }
}

fn string_value(node: &kdl::KdlNode) -> Result<&str> {
    node.entries()
        .get(0)
        .and_then(|e| e.value().as_string())
        .ok_or_else(|| miette!("{} expects a string value", node.name().value()))
}
