use std::path::{Path, PathBuf};

/// Configuration for a storage engine instance
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory holding table files and the log file
    pub data_dir: PathBuf,

    /// Number of frames in the buffer pool
    pub buffer_pool_size: usize,

    /// Name of the log file inside `data_dir`
    pub log_file_name: String,

    /// Whether transaction lifecycle records are written to the log
    pub enable_logging: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            buffer_pool_size: 64,
            log_file_name: "db.log".to_string(),
            enable_logging: true,
        }
    }
}

impl EngineConfig {
    /// Default configuration rooted at `data_dir`
    pub fn with_data_dir(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(&self.log_file_name)
    }

    /// Path of the file backing table `name`
    pub fn table_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(format!("{}.tbl", name))
    }
}
