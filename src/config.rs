use std::path::{Path, PathBuf};

use chrono::Local;

use drone_tsp::errors::SolverError;

/// Where and how result files land. Assembled once from the command line;
/// nothing here is global state.
#[derive(Clone, Debug)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub date: bool,
    pub overwrite: bool,
    pub subfolder: bool,
}

impl OutputConfig {
    pub fn new(directory: &str, date: bool, overwrite: bool, subfolder: bool) -> OutputConfig {
        OutputConfig {
            directory: PathBuf::from(directory),
            date,
            overwrite,
            subfolder,
        }
    }

    /// Resolve the path for a result file, creating directories as needed
    /// and refusing to clobber existing files unless overwriting is on.
    pub fn resolve(&self, group: &str, stem: &str, extension: &str) -> Result<PathBuf, SolverError> {
        let mut directory = self.directory.clone();
        if self.subfolder {
            directory.push(group);
        }
        if !directory.is_dir() {
            std::fs::create_dir_all(&directory)?;
        }

        let name = if self.date {
            format!("{}-{}.{}", stem, Local::now().format("%Y%m%d"), extension)
        } else {
            format!("{stem}.{extension}")
        };

        let path = directory.join(name);
        if path.exists() && !self.overwrite {
            return Err(SolverError::invalid(format!(
                "{} already exists (pass --overwrite to replace it)",
                path.display()
            )));
        }

        Ok(path)
    }
}

/// File stem of an input path, for deriving result file names.
pub fn stem(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("result")
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::{OutputConfig, stem};

    #[test]
    fn stems_strip_directories_and_extensions() {
        assert_eq!(stem("problems/line3.txt"), "line3");
        assert_eq!(stem("line3"), "line3");
    }

    #[test]
    fn resolve_respects_overwrite() {
        let root = std::env::temp_dir().join("drone-tsp-config-test");
        let _ = std::fs::remove_dir_all(&root);

        let config = OutputConfig::new(root.to_str().unwrap(), false, false, true);
        let path = config.resolve("group", "stem", "txt").unwrap();
        std::fs::write(&path, "x").unwrap();
        assert!(config.resolve("group", "stem", "txt").is_err());

        let overwriting = OutputConfig::new(root.to_str().unwrap(), false, true, true);
        assert!(overwriting.resolve("group", "stem", "txt").is_ok());

        let _ = std::fs::remove_dir_all(&root);
    }
}
