use std::{fmt, path::PathBuf, str::FromStr, time::Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Headless,
    Vulkan,
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "headless" => Ok(Backend::Headless),
            "vulkan" => Ok(Backend::Vulkan),
            other => anyhow::bail!("unknown backend `{other}` (expected headless or vulkan)"),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Backend::Headless => "headless",
            Backend::Vulkan => "vulkan",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub thread_name: String,
    pub idle_wait: Duration,
    pub log_config: PathBuf,
    pub backend: Backend,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thread_name: "render".to_string(),
            idle_wait: Duration::from_millis(16),
            log_config: PathBuf::from("log4rs.yml"),
            backend: Backend::Headless,
        }
    }
}

impl EngineConfig {
    pub const LOG_CONFIG_VAR: &'static str = "ARBOR_LOG_CONFIG";
    pub const BACKEND_VAR: &'static str = "ARBOR_BACKEND";

    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();
        if let Some(path) = lookup(Self::LOG_CONFIG_VAR) {
            config.log_config = PathBuf::from(path);
        }
        if let Some(backend) = lookup(Self::BACKEND_VAR) {
            config.backend = backend.parse()?;
        }
        Ok(config)
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn idle_wait(mut self, wait: Duration) -> Self {
        self.idle_wait = wait;
        self
    }

    pub fn log_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_config = path.into();
        self
    }

    pub fn backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }
}
