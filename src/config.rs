use serde::Deserialize;

/// Top-level configuration, loaded from a YAML file and/or environment.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
}

/// Server section of the configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the listener binds to (host:port).
    pub listen_addr: String,

    /// Number of reactor worker threads.
    pub worker_threads: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            worker_threads: 4,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration.
    ///
    /// If `HEARTH_CONFIG` points at a YAML file, that file is parsed first;
    /// the `LISTEN` and `WORKER_THREADS` environment variables override
    /// individual fields afterwards. With nothing set, defaults apply.
    pub fn load() -> Self {
        let mut cfg = std::env::var("HEARTH_CONFIG")
            .ok()
            .and_then(|path| Self::from_file(&path).ok())
            .unwrap_or_default();

        if let Ok(addr) = std::env::var("LISTEN") {
            cfg.server.listen_addr = addr;
        }
        if let Some(n) = std::env::var("WORKER_THREADS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            cfg.server.worker_threads = n;
        }

        cfg
    }

    /// Parses a YAML configuration file.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&text)?)
    }

    /// Parses configuration from a YAML string.
    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }
}
