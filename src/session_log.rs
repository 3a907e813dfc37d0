use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

/// Append-only file capturing the kernel log lines of one engine session.
pub struct SessionLog {
    file: fs::File,
    path: PathBuf,
}

impl SessionLog {
    pub fn default_directory() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tunbox")
            .join("logs")
    }

    pub fn create(directory: &Path) -> Option<Self> {
        if let Err(error) = fs::create_dir_all(directory) {
            log::warn!(
                "[logs] failed to create log directory {}: {error}",
                directory.display()
            );
            return None;
        }

        let timestamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
        let path = directory.join(format!("{timestamp}.log"));

        match fs::File::create(&path) {
            Ok(file) => {
                log::info!("[logs] session log: {}", path.display());
                Some(Self { file, path })
            }
            Err(error) => {
                log::warn!("[logs] failed to create log file: {error}");
                None
            }
        }
    }

    pub fn append(&mut self, line: &str) {
        if let Err(error) = writeln!(self.file, "{line}") {
            log::warn!(
                "[logs] failed to write to {}: {error}",
                self.path.display()
            );
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
