pub struct Dirs {
    project_dirs: directories::ProjectDirs,
}

impl Dirs {
    /// `None` when there is no home directory to put anything in.
    pub fn new() -> Option<Self> {
        directories::ProjectDirs::from("", "", "termbridge")
            .map(|project_dirs| Self { project_dirs })
    }

    fn config_dir(&self) -> &std::path::Path {
        self.project_dirs.config_dir()
    }

    /// Only returns files that actually exist.
    pub fn config_file(&self, name: &str) -> Option<std::path::PathBuf> {
        let file = self.config_dir().join(name);
        if file.exists() {
            Some(file)
        } else {
            None
        }
    }
}
