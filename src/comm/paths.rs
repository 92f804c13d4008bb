use anyhow::Result;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct CommPaths {
    pub comm_home: PathBuf,
    /// Stand-in for the host's addon config store.
    pub config_store_dir: PathBuf,
    /// Stand-in for browser local storage.
    pub local_store_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub exports_dir: PathBuf,
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

pub fn resolve_paths() -> Result<CommPaths> {
    let comm_home = match env::var("COMM_HOME") {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => required_home_dir()?.join(".commlog"),
    };

    let state_dir = env_or_default_path("COMM_STATE_DIR", comm_home.join("state"));
    let logs_dir = env_or_default_path("COMM_LOGS_DIR", comm_home.join("logs"));
    let exports_dir = env_or_default_path("COMM_EXPORTS_DIR", comm_home.join("exports"));

    Ok(CommPaths {
        config_store_dir: state_dir.join("config"),
        local_store_dir: state_dir.join("local"),
        comm_home,
        logs_dir,
        exports_dir,
    })
}

impl CommPaths {
    /// Layout under one root.
    #[cfg(test)]
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let comm_home = root.into();
        Self {
            config_store_dir: comm_home.join("state/config"),
            local_store_dir: comm_home.join("state/local"),
            logs_dir: comm_home.join("logs"),
            exports_dir: comm_home.join("exports"),
            comm_home,
        }
    }

    pub fn daemon_lock_file(&self) -> PathBuf {
        self.logs_dir.join("commlog.lock")
    }

    pub fn audit_log(&self) -> PathBuf {
        self.logs_dir.join("audit.log")
    }
}
