#![cfg(unix)]

use alfrd::project::Project;
use alfrd::registry::{Category, Registry, SharedRegistry, Value};
use pretty_assertions_sorted::assert_eq;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const REGISTERED_SCRIPT: &str = "#!/bin/sh
# @register(name=\"registered_pyt\", desc='testing register func')
echo \"hello ${ALFRD_PARAM_NAME:-pyt}\"
";

const VALIDATOR_SCRIPT: &str = "#!/bin/sh
# @validator(name=has_input)
test -n \"$ALFRD_STEP\"
";

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn project(root: &TempDir, registry: SharedRegistry) -> Project {
    Project::builder()
        .name("pyt")
        .projects_dir(root.path().join("projects"))
        .registry(registry)
        .build()
}

fn keys(project: &Project, category: &str) -> Vec<String> {
    project.get_functions()[category].keys().cloned().collect()
}

#[test]
fn test_project_basic() {
    let root = TempDir::new().unwrap();
    let work = root.path().join("work");
    fs::create_dir_all(&work).unwrap();
    let proj = project(&root, SharedRegistry::new(Registry::new()));
    let proj_dir = root.path().join("projects").join("pyt");

    let script = write_script(&work, "tmp_pyt.sh", REGISTERED_SCRIPT);

    assert_eq!(proj.create().unwrap(), proj_dir);
    proj.rm().unwrap();
    assert!(!proj_dir.exists());

    proj.create().unwrap();
    proj.add(&[&script]).unwrap();
    assert!(proj_dir.join("tmp_pyt.sh").exists());
    assert!(fs::symlink_metadata(proj_dir.join("tmp_pyt.sh"))
        .unwrap()
        .file_type()
        .is_symlink());

    proj.rm().unwrap();
    assert!(!proj_dir.exists());
    proj.create().unwrap();

    let helpers = work.join("tmp_helpers");
    fs::create_dir_all(&helpers).unwrap();
    fs::write(helpers.join("__init__.sh"), "").unwrap();

    proj.add(&[&script, &helpers]).unwrap();
    assert!(proj_dir.join("tmp_pyt.sh").exists());
    assert!(proj_dir.join("tmp_helpers").join("__init__.sh").exists());

    proj.clear_project();
    proj.load_project().unwrap();
    assert_eq!(keys(&proj, "REGISTERED"), vec!["registered_pyt"]);
    assert_eq!(keys(&proj, "VALIDATORS"), Vec::<String>::new());
    assert_eq!(keys(&proj, "VALIDATE_AFTER"), Vec::<String>::new());
    assert_eq!(keys(&proj, "VALIDATE_BEFORE"), Vec::<String>::new());

    assert_eq!(
        proj.registry.read().run_step("registered_pyt").unwrap(),
        Value::from("hello pyt")
    );

    proj.rm().unwrap();
    assert!(!proj_dir.exists());
    assert!(script.exists(), "removing a project keeps the linked sources");
}

#[test]
fn test_configuration_survives_a_new_registry() {
    let root = TempDir::new().unwrap();
    let work = root.path().join("work");
    fs::create_dir_all(&work).unwrap();
    let script = write_script(&work, "tmp_pyt.sh", REGISTERED_SCRIPT);
    let validator = write_script(&work, "checks.sh", VALIDATOR_SCRIPT);

    let first = project(&root, SharedRegistry::new(Registry::new()));
    first.create().unwrap();
    first.add(&[&script, &validator]).unwrap();
    first.load_project().unwrap();
    {
        let mut configuration = first.configure().unwrap();
        configuration.func("registered_pyt");
        assert_eq!(
            configuration.validate_before(&["has_input", "missing"]).unwrap(),
            vec!["has_input"]
        );
        configuration
            .add_param([("name".to_string(), Value::from("fits"))].into())
            .unwrap();
        configuration.save().unwrap();
    }
    assert!(root.path().join("projects/pyt/config.yaml").is_file());

    // a second process: scripts are registered again, then the file is applied
    let second = project(&root, SharedRegistry::new(Registry::new()));
    second.load_project().unwrap();
    second.configure().unwrap().load().unwrap();

    assert_eq!(*first.registry.read(), *second.registry.read());
    let registry = second.registry.read();
    let hooks = registry.hooks(Category::ValidateBefore, "registered_pyt");
    assert_eq!(hooks.len(), 1);
    assert_eq!(hooks[0].name(), "has_input");
    assert_eq!(
        registry.run_step("registered_pyt").unwrap(),
        Value::from("hello fits")
    );
}
