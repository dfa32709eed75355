use super::configuration::ProjectConfiguration;
use crate::constants::CONFIG_FILE;
use crate::livelog;
use crate::livelog::Level;
use crate::registry::{script, Category, Entries, SharedRegistry, REGISTRY};
use alfrd_common::workdir::ALFRD_WORK_DIR;
use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use typed_builder::TypedBuilder;
use walkdir::WalkDir;

/// A named directory of pipeline scripts under the projects directory.
#[derive(Debug, Clone, TypedBuilder)]
pub struct Project {
    #[builder(setter(into))]
    pub name: String,

    /// Link added files instead of copying them.
    #[builder(default = true)]
    pub use_symlink: bool,

    #[builder(default = true)]
    pub verbose: bool,

    #[builder(default = ALFRD_WORK_DIR.projects_dir.clone(), setter(into))]
    pub projects_dir: PathBuf,

    #[builder(default = REGISTRY.clone())]
    pub registry: SharedRegistry,
}

impl Project {
    /// A project backed by the default projects directory and the global registry.
    pub fn new(name: impl Into<String>) -> Self {
        Project::builder().name(name).build()
    }

    pub fn get_projdir(&self, create: bool) -> Result<PathBuf> {
        let proj_dir = self.projects_dir.join(&self.name);
        if create {
            if self.name.trim().is_empty() {
                bail!("Project name must not be empty");
            }
            fs::create_dir_all(&proj_dir)
                .with_context(|| format!("failed to create {}", proj_dir.display()))?;
            livelog!("project {} created!", self.name);
        } else if self.name.is_empty() || !proj_dir.is_dir() {
            livelog!(level: Level::Severe, "project {} not found!", self.name);
            bail!("Project '{}' not found!", self.name);
        }
        Ok(proj_dir)
    }

    pub fn create(&self) -> Result<PathBuf> {
        self.get_projdir(true)
    }

    /// Links or copies files and directories into the project. Missing paths are
    /// logged and skipped.
    pub fn add<P: AsRef<Path>>(&self, paths: &[P]) -> Result<()> {
        let proj_dir = self.get_projdir(false)?;
        for path in paths {
            let path = path.as_ref();
            if fs::symlink_metadata(path).is_err() {
                livelog!(level: Level::Severe, "{} not found!", path.display());
                continue;
            }
            let file_name = path
                .file_name()
                .with_context(|| format!("{} has no file name", path.display()))?;
            let dest = proj_dir.join(file_name);

            if path.is_dir() {
                copy_tree(path, &dest, self.use_symlink)?;
            } else if self.use_symlink {
                let target = std::path::absolute(path)
                    .with_context(|| format!("failed to resolve {}", path.display()))?;
                symlink(&target, &dest)?;
            } else {
                copy_file_no_follow(path, &dest)?;
            }
            livelog!(
                "{} is added to {} with symlinks={}",
                path.display(),
                self.name,
                self.use_symlink
            );
        }
        Ok(())
    }

    pub fn rm(&self) -> Result<()> {
        livelog!("removing project {}", self.name);
        let proj_dir = self.get_projdir(false)?;
        if let Err(e) = fs::remove_dir_all(&proj_dir) {
            livelog!(level: Level::Warn, "could not fully remove {}: {e}", proj_dir.display());
        }
        Ok(())
    }

    pub fn list_projects(&self) -> Result<Vec<String>> {
        let mut projects = Vec::new();
        if self.projects_dir.is_dir() {
            for entry in fs::read_dir(&self.projects_dir)? {
                let entry = entry?;
                if entry.path().is_dir() {
                    projects.push(entry.file_name().to_string_lossy().to_string());
                }
            }
        }
        projects.sort();
        livelog!("found projects : {:?}", projects);
        Ok(projects)
    }

    /// Registers the directives of every script at the top level of the project
    /// directory into the project's registry.
    pub fn load_project(&self) -> Result<()> {
        let proj_dir = self.get_projdir(false)?;
        if !self.registry.read().is_empty() {
            livelog!(level: Level::Warn, "Warning! previous project was not cleared.");
        }
        livelog!("loading project: {}", self.name);

        let mut registry = self.registry.write();
        for script_path in project_scripts(&proj_dir)? {
            match script::register_script(&mut registry, &script_path) {
                Ok(0) => {}
                Ok(n) => {
                    if self.verbose {
                        livelog!(level: Level::Debug, "{n} directive(s) in {}", script_path.display());
                    }
                }
                Err(e) => {
                    livelog!(fail: &e, "FAILED!");
                    return Err(e);
                }
            }
        }

        if !registry.category(Category::Registered).is_empty() {
            livelog!("Registered functions: {:?}", registry.step_names());
            livelog!("Validator functions: {:?}", registry.validator_names());
        }
        Ok(())
    }

    pub fn clear_project(&self) {
        self.registry.write().clear();
    }

    /// Snapshot of the four registry categories keyed by their YAML names.
    pub fn get_functions(&self) -> BTreeMap<&'static str, Entries> {
        self.registry
            .read()
            .categories()
            .map(|(category, entries)| (category.key(), entries.clone()))
            .collect()
    }

    pub fn configure(&self) -> Result<ProjectConfiguration<'_>> {
        if self.registry.read().is_empty() {
            livelog!(level: Level::Severe, "attempting to work without loading a project");
        }
        ProjectConfiguration::new(self)
    }
}

/// Regular files (symlinks followed) at the top level, in name order, excluding
/// hidden files and the registry configuration.
fn project_scripts(proj_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut scripts: Vec<PathBuf> = fs::read_dir(proj_dir)
        .with_context(|| format!("failed to read {}", proj_dir.display()))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .map(|name| {
                    let name = name.to_string_lossy();
                    !name.starts_with('.') && name != CONFIG_FILE
                })
                .unwrap_or(false)
        })
        .collect();
    scripts.sort();
    Ok(scripts)
}

/// Recursively copies `src` to `dest`. With `keep_symlinks`, symlinks inside the
/// tree are recreated as symlinks; otherwise their targets are copied.
fn copy_tree(src: &Path, dest: &Path, keep_symlinks: bool) -> Result<()> {
    if dest.exists() {
        bail!("{} already exists", dest.display());
    }
    for entry in WalkDir::new(src).follow_links(!keep_symlinks) {
        let entry = entry.with_context(|| format!("failed to walk {}", src.display()))?;
        let relative = entry.path().strip_prefix(src)?;
        let target = dest.join(relative);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            let link = fs::read_link(entry.path())?;
            symlink(&link, &target)?;
        } else {
            fs::copy(entry.path(), &target).with_context(|| {
                format!("failed to copy {} to {}", entry.path().display(), target.display())
            })?;
        }
    }
    Ok(())
}

fn copy_file_no_follow(src: &Path, dest: &Path) -> Result<()> {
    if fs::symlink_metadata(src)?.file_type().is_symlink() {
        return symlink(&fs::read_link(src)?, dest);
    }
    fs::copy(src, dest)
        .with_context(|| format!("failed to copy {} to {}", src.display(), dest.display()))?;
    Ok(())
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link)
        .with_context(|| format!("failed to link {} -> {}", link.display(), target.display()))
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> Result<()> {
    let result = if target.is_dir() {
        std::os::windows::fs::symlink_dir(target, link)
    } else {
        std::os::windows::fs::symlink_file(target, link)
    };
    result.with_context(|| format!("failed to link {} -> {}", link.display(), target.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use tempfile::TempDir;

    fn project_in(root: &TempDir, name: &str) -> Project {
        Project::builder()
            .name(name)
            .projects_dir(root.path().join("projects"))
            .registry(SharedRegistry::new(Registry::new()))
            .build()
    }

    #[test]
    fn test_missing_project_is_an_error() {
        let root = TempDir::new().unwrap();
        let project = project_in(&root, "ghost");
        let err = project.get_projdir(false).unwrap_err();
        assert_eq!(err.to_string(), "Project 'ghost' not found!");
        assert!(project.rm().is_err());

        let unnamed = project_in(&root, "");
        assert!(unnamed.get_projdir(false).is_err());
        assert!(unnamed.create().is_err());
    }

    #[test]
    fn test_create_and_list() {
        let root = TempDir::new().unwrap();
        let project = project_in(&root, "rnaseq");
        assert!(project.list_projects().unwrap().is_empty());

        let dir = project.create().unwrap();
        assert_eq!(dir, root.path().join("projects").join("rnaseq"));
        project_in(&root, "atac").create().unwrap();
        fs::write(root.path().join("projects").join("stray.txt"), "").unwrap();

        assert_eq!(project.list_projects().unwrap(), vec!["atac", "rnaseq"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_add_copies_when_symlinks_disabled() {
        let root = TempDir::new().unwrap();
        let mut project = project_in(&root, "copy");
        project.use_symlink = false;
        let dir = project.create().unwrap();

        let src = root.path().join("step.sh");
        fs::write(&src, "echo hi\n").unwrap();
        project.add(&[&src, &root.path().join("missing.sh")]).unwrap();

        let added = dir.join("step.sh");
        assert!(!fs::symlink_metadata(&added).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(added).unwrap(), "echo hi\n");
        assert!(!dir.join("missing.sh").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_add_directory_keeps_inner_symlinks() {
        let root = TempDir::new().unwrap();
        let project = project_in(&root, "tree");
        let dir = project.create().unwrap();

        let helpers = root.path().join("helpers");
        fs::create_dir_all(helpers.join("nested")).unwrap();
        fs::write(helpers.join("nested").join("util.sh"), "true\n").unwrap();
        std::os::unix::fs::symlink("nested/util.sh", helpers.join("alias.sh")).unwrap();

        project.add(&[&helpers]).unwrap();
        let copied = dir.join("helpers");
        assert!(copied.join("nested").join("util.sh").is_file());
        assert!(fs::symlink_metadata(copied.join("alias.sh"))
            .unwrap()
            .file_type()
            .is_symlink());
        // the directory itself is a copy
        assert!(!fs::symlink_metadata(&copied).unwrap().file_type().is_symlink());
    }

    #[test]
    fn test_project_scripts_skips_config_and_hidden() {
        let root = TempDir::new().unwrap();
        let dir = project_in(&root, "scan").create().unwrap();
        for name in ["b.sh", "a.py", ".hidden", CONFIG_FILE] {
            fs::write(dir.join(name), "").unwrap();
        }
        fs::create_dir(dir.join("lib")).unwrap();

        let names: Vec<_> = project_scripts(&dir)
            .unwrap()
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.py", "b.sh"]);
    }

    #[test]
    fn test_load_project_skips_binary_files() {
        let root = TempDir::new().unwrap();
        let project = project_in(&root, "mixed");
        let dir = project.create().unwrap();
        fs::write(dir.join("a_step.sh"), "# @register(name=a_step)\necho ok\n").unwrap();
        fs::write(dir.join("data.bin"), [0xff, 0xfe, 0x00, 0x81]).unwrap();

        project.load_project().unwrap();
        assert_eq!(project.registry.read().step_names(), vec!["a_step"]);
    }

    #[test]
    fn test_load_project_reports_bad_directive() {
        let root = TempDir::new().unwrap();
        let project = project_in(&root, "broken");
        let dir = project.create().unwrap();
        fs::write(dir.join("bad.sh"), "# @register(desc='unterminated)\n").unwrap();

        let err = project.load_project().unwrap_err();
        assert!(format!("{err:#}").contains("unterminated quote"));
    }

    #[test]
    fn test_get_functions_has_all_categories() {
        let root = TempDir::new().unwrap();
        let project = project_in(&root, "empty");
        let functions = project.get_functions();
        assert_eq!(
            functions.keys().copied().collect::<Vec<_>>(),
            vec!["REGISTERED", "VALIDATE_AFTER", "VALIDATE_BEFORE", "VALIDATORS"]
        );
        assert!(functions.values().all(|entries| entries.is_empty()));
    }
}
