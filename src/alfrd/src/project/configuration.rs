//! Persists the registry of a project to `config.yaml` and restores it.
//!
//! Live function references cannot be written to a file, so every value stored under
//! a key containing `function` is written as the function's name and rebound to the
//! live reference of the same name when the file is loaded.
use super::manager::Project;
use super::yaml::{
    dump_yaml, load_yaml_file, params_to_yaml, string_scalar, yaml_key, yaml_to_params, Yaml, YamlExt,
};
use crate::constants::CONFIG_FILE;
use crate::livelog;
use crate::livelog::Level;
use crate::registry::{
    is_function_key, Category, Entries, FunctionRef, Params, Registry, Value, FUNCTIONS_KEY,
    FUNCTION_KEY,
};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use yaml_rust2::yaml::Hash;

/// Registry categories as stored in the configuration file.
pub type CategoryMap = BTreeMap<Category, Entries>;

pub struct ProjectConfiguration<'a> {
    project: &'a Project,
    fnname: Option<String>,
    pub configfile: PathBuf,
    pub debug: bool,
}

impl<'a> ProjectConfiguration<'a> {
    pub fn new(project: &'a Project) -> Result<Self> {
        let configfile = project.get_projdir(false)?.join(CONFIG_FILE);
        Ok(ProjectConfiguration {
            project,
            fnname: None,
            configfile,
            debug: false,
        })
    }

    /// Selects the step the following calls act on.
    pub fn func(&mut self, name: impl Into<String>) -> &mut Self {
        self.fnname = Some(name.into());
        self
    }

    fn fnname(&self) -> Result<&str> {
        self.fnname
            .as_deref()
            .context("no step selected, call func(name) first")
    }

    pub fn validate_before(&mut self, validator_names: &[&str]) -> Result<Vec<String>> {
        self.update_validation_functions(Category::ValidateBefore, validator_names)
    }

    pub fn validate_after(&mut self, validator_names: &[&str]) -> Result<Vec<String>> {
        self.update_validation_functions(Category::ValidateAfter, validator_names)
    }

    /// Binds the named validators to the selected step in a hook category. Unknown
    /// names are dropped with a warning. Returns the names bound after the update.
    pub fn update_validation_functions(
        &mut self,
        category: Category,
        validator_names: &[&str],
    ) -> Result<Vec<String>> {
        let fnname = self.fnname()?.to_string();
        let mut registry = self.project.registry.write();

        let mut found: Vec<FunctionRef> = Vec::new();
        let mut failed: Vec<&str> = Vec::new();
        for name in validator_names {
            let function = registry
                .category(Category::Validators)
                .get(*name)
                .and_then(|entry| entry.get(FUNCTION_KEY))
                .and_then(Value::as_func)
                .cloned();
            match function {
                Some(function) => found.push(function),
                None => failed.push(*name),
            }
        }
        if !failed.is_empty() {
            livelog!(level: Level::Warn, "These validators don't exist : {:?}", failed);
        }

        let entry = registry.category_mut(category).entry(fnname.clone()).or_default();
        // anything but a list is replaced
        let mut existing = match entry.remove(FUNCTIONS_KEY) {
            Some(Value::List(items)) => items,
            _ => Vec::new(),
        };

        let mut added = false;
        for function in found {
            if !existing.iter().any(|item| function_name(item) == Some(function.name())) {
                existing.push(Value::Func(function));
                added = true;
            }
        }
        let names: Vec<String> = existing
            .iter()
            .filter_map(function_name)
            .map(str::to_string)
            .collect();
        entry.insert(FUNCTIONS_KEY.to_string(), Value::List(existing));

        if added {
            livelog!("Updated! {category}[{fnname}] : {names:?}");
        }
        Ok(names)
    }

    /// Adds parameters the selected step does not have yet.
    pub fn add_param(&mut self, params: Params) -> Result<()> {
        let fnname = self.fnname()?;
        let mut registry = self.project.registry.write();
        let entry = step_entry(&mut registry, fnname)?;
        for (key, value) in params {
            if !entry.contains_key(&key) {
                livelog!("param for {fnname} added {key}={value}");
                entry.insert(key, value);
            }
        }
        Ok(())
    }

    /// Updates parameters the selected step already has.
    pub fn edit(&mut self, params: Params) -> Result<()> {
        let fnname = self.fnname()?;
        let mut registry = self.project.registry.write();
        let entry = step_entry(&mut registry, fnname)?;
        for (key, value) in params {
            if let Some(current) = entry.get_mut(&key) {
                livelog!("param for {fnname} updated to {key}={value}");
                *current = value;
            }
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let data = cleandata_foryaml(&self.project.registry.read());
        let text = dump_yaml(&categories_to_yaml(&data))?;

        let dir = self
            .configfile
            .parent()
            .context("config file has no parent directory")?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("failed to create a temporary file in {}", dir.display()))?;
        tmp.write_all(text.as_bytes())?;
        tmp.persist(&self.configfile)
            .with_context(|| format!("failed to write {}", self.configfile.display()))?;

        livelog!("saved {}", self.configfile.display());
        Ok(())
    }

    pub fn load(&self) -> Result<()> {
        if self.debug {
            livelog!(level: Level::Debug, "reading {}", self.configfile.display());
        }
        let doc = load_yaml_file(&self.configfile)?;
        if self.debug {
            livelog!(level: Level::Debug, "loaded {} : {:?}", self.configfile.display(), doc);
        }
        let Some(doc) = doc else {
            livelog!(level: Level::Warn, "{} is empty", self.configfile.display());
            return Ok(());
        };

        let loaded = categories_from_yaml(&doc)
            .with_context(|| format!("invalid configuration in {}", self.configfile.display()))?;
        let present: Vec<Category> = loaded.keys().copied().collect();

        let mut registry = self.project.registry.write();
        let loaded = parse_cleaneddata_fromyaml(&registry, loaded);
        livelog!("loading.. {}", self.configfile.display());

        for category in present {
            if let Some(entries) = loaded.get(&category) {
                let live = registry.category_mut(category);
                live.extend(entries.clone());
                livelog!("loaded {category} : {:?}", live.keys().collect::<Vec<_>>());
            }
        }
        Ok(())
    }
}

fn function_name(value: &Value) -> Option<&str> {
    match value {
        Value::Func(function) => Some(function.name()),
        Value::Str(name) => Some(name),
        _ => None,
    }
}

fn step_entry<'r>(registry: &'r mut Registry, fnname: &str) -> Result<&'r mut Params> {
    registry
        .category_mut(Category::Registered)
        .get_mut(fnname)
        .with_context(|| format!("step '{fnname}' is not registered"))
}

/// Deep copy of the registry with every function reference replaced by its name.
pub fn cleandata_foryaml(registry: &Registry) -> CategoryMap {
    registry
        .categories()
        .map(|(category, entries)| {
            let cleaned = entries
                .iter()
                .map(|(name, params)| (name.clone(), clean_params(params)))
                .collect();
            (category, cleaned)
        })
        .collect()
}

fn clean_params(params: &Params) -> Params {
    params
        .iter()
        .map(|(key, value)| {
            let value = if is_function_key(key) {
                names_for(value)
            } else {
                value.clone()
            };
            (key.clone(), value)
        })
        .collect()
}

fn names_for(value: &Value) -> Value {
    match value {
        Value::Func(function) => Value::Str(function.name().to_string()),
        Value::List(items) => Value::List(items.iter().map(names_for).collect()),
        other => other.clone(),
    }
}

/// Rebinds function names to the live references of `registry` and fills in the
/// categories the file does not mention from the live registry.
pub fn parse_cleaneddata_fromyaml(registry: &Registry, mut loaded: CategoryMap) -> CategoryMap {
    let refs = registry.function_refs();
    if refs.is_empty() {
        livelog!(level: Level::Severe, "could not map function objects to the function name");
    } else {
        for entries in loaded.values_mut() {
            for (entry_name, params) in entries.iter_mut() {
                for (key, value) in params.iter_mut() {
                    if is_function_key(key) {
                        rebind(value, &refs, entry_name);
                    }
                }
            }
        }
    }

    for (category, entries) in registry.categories() {
        loaded.entry(category).or_insert_with(|| entries.clone());
    }
    loaded
}

fn rebind(value: &mut Value, refs: &BTreeMap<String, FunctionRef>, entry_name: &str) {
    match value {
        Value::Str(name) => match refs.get(name.as_str()) {
            Some(function) => *value = Value::Func(function.clone()),
            None => {
                livelog!(level: Level::Warn, "no live function named {name} for {entry_name}, kept as text");
            }
        },
        Value::List(items) => {
            for item in items.iter_mut() {
                rebind(item, refs, entry_name);
            }
        }
        _ => {}
    }
}

pub fn categories_to_yaml(data: &CategoryMap) -> Yaml {
    // sorted by key, like the file has always been written
    let sorted: BTreeMap<&str, &Entries> = data
        .iter()
        .map(|(category, entries)| (category.key(), entries))
        .collect();
    let mut root = Hash::new();
    for (key, entries) in sorted {
        let mut hash = Hash::new();
        for (name, params) in entries {
            hash.insert(string_scalar(name), params_to_yaml(params));
        }
        root.insert(Yaml::String(key.to_string()), Yaml::Hash(hash));
    }
    Yaml::Hash(root)
}

pub fn categories_from_yaml(doc: &Yaml) -> Result<CategoryMap> {
    let mut data = CategoryMap::new();
    for category in Category::ALL {
        let Some(hash) = doc.optional_hash(category.key())? else {
            if !doc[category.key()].is_badvalue() {
                // present but null: an empty category
                data.insert(category, Entries::new());
            }
            continue;
        };
        let mut entries = Entries::new();
        for (name, params) in hash {
            let name = yaml_key(name)?;
            let params = match params {
                Yaml::Hash(params) => yaml_to_params(params)
                    .with_context(|| format!("invalid entry {name} in {category}"))?,
                Yaml::Null => Params::new(),
                _ => anyhow::bail!("Expected {category}.{name} to be a mapping"),
            };
            entries.insert(name, params);
        }
        data.insert(category, entries);
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::yaml::load_yaml_str;
    use crate::registry::{params, SharedRegistry};
    use tempfile::TempDir;

    fn ok(verdict: bool) -> FunctionRef {
        FunctionRef::new(if verdict { "non_empty" } else { "deny" }, move |_| {
            Ok(Value::Bool(verdict))
        })
    }

    fn loaded_project(root: &TempDir) -> Project {
        let mut registry = Registry::new();
        registry.register_step(
            "align",
            params([("desc", Value::from("align reads")), ("threads", Value::Int(4))]),
            FunctionRef::new("align", |_| Ok(Value::from("aligned"))),
        );
        registry.register_validator("non_empty", Params::new(), ok(true));
        registry.register_validator("deny", Params::new(), ok(false));
        let project = Project::builder()
            .name("cfg")
            .projects_dir(root.path())
            .registry(SharedRegistry::new(registry))
            .build();
        project.create().unwrap();
        project
    }

    #[test]
    fn test_func_is_required() {
        let root = TempDir::new().unwrap();
        let project = loaded_project(&root);
        let mut config = project.configure().unwrap();
        assert!(config.validate_before(&["non_empty"]).is_err());
        assert!(config.add_param(params([("x", 1)])).is_err());
        assert_eq!(config.configfile, root.path().join("cfg").join(CONFIG_FILE));
    }

    #[test]
    fn test_validate_before_drops_unknown_and_deduplicates() {
        let root = TempDir::new().unwrap();
        let project = loaded_project(&root);
        let mut config = project.configure().unwrap();

        let bound = config
            .func("align")
            .validate_before(&["non_empty", "missing"])
            .unwrap();
        assert_eq!(bound, vec!["non_empty"]);

        let bound = config.validate_before(&["deny", "non_empty"]).unwrap();
        assert_eq!(bound, vec!["non_empty", "deny"]);

        let hooks = project.registry.read().hooks(Category::ValidateBefore, "align");
        assert_eq!(hooks.len(), 2);
        assert!(project
            .registry
            .read()
            .category(Category::ValidateAfter)
            .is_empty());
    }

    #[test]
    fn test_validate_after_replaces_malformed_binding() {
        let root = TempDir::new().unwrap();
        let project = loaded_project(&root);
        project.registry.write().category_mut(Category::ValidateAfter).insert(
            "align".into(),
            params([("functions", Value::from("non_empty")), ("note", Value::from("kept"))]),
        );
        let mut config = project.configure().unwrap();

        let bound = config.func("align").validate_after(&["deny"]).unwrap();
        assert_eq!(bound, vec!["deny"]);
        let registry = project.registry.read();
        let entry = &registry.category(Category::ValidateAfter)["align"];
        assert_eq!(entry["note"], Value::from("kept"));
        assert_eq!(registry.hooks(Category::ValidateAfter, "align")[0].name(), "deny");
    }

    #[test]
    fn test_add_param_and_edit() {
        let root = TempDir::new().unwrap();
        let project = loaded_project(&root);
        let mut config = project.configure().unwrap();
        config.func("align");

        config
            .add_param(params([("threads", Value::Int(16)), ("genome", Value::from("hg38"))]))
            .unwrap();
        config
            .edit(params([("desc", Value::from("bwa mem")), ("unknown", Value::Int(1))]))
            .unwrap();

        let registry = project.registry.read();
        let entry = &registry.category(Category::Registered)["align"];
        assert_eq!(entry["threads"], Value::Int(4));
        assert_eq!(entry["genome"], Value::from("hg38"));
        assert_eq!(entry["desc"], Value::from("bwa mem"));
        assert!(!entry.contains_key("unknown"));
        drop(registry);

        config.func("nope");
        assert!(config.edit(params([("desc", "x")])).is_err());
    }

    #[test]
    fn test_cleandata_replaces_functions_with_names() {
        let root = TempDir::new().unwrap();
        let project = loaded_project(&root);
        project
            .configure()
            .unwrap()
            .func("align")
            .validate_after(&["non_empty", "deny"])
            .unwrap();

        let data = cleandata_foryaml(&project.registry.read());
        assert_eq!(
            data[&Category::Registered]["align"]["function"],
            Value::from("align")
        );
        assert_eq!(
            data[&Category::ValidateAfter]["align"]["functions"],
            Value::from(vec!["non_empty", "deny"])
        );
        // the live registry keeps its references
        let registry = project.registry.read();
        assert!(registry.category(Category::Registered)["align"]["function"]
            .as_func()
            .is_some());
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let root = TempDir::new().unwrap();
        let project = loaded_project(&root);
        {
            let mut config = project.configure().unwrap();
            config.func("align").validate_before(&["non_empty"]).unwrap();
            config.add_param(params([("reference", Value::from("hg38.fa"))])).unwrap();
            config.save().unwrap();
        }
        let before = project.registry.read().clone();

        let text = std::fs::read_to_string(root.path().join("cfg").join(CONFIG_FILE)).unwrap();
        assert!(text.contains("REGISTERED:"));
        assert!(text.contains("function: align"));

        // change the live registry, then restore it from the file
        project
            .configure()
            .unwrap()
            .func("align")
            .edit(params([("threads", Value::Int(32))]))
            .unwrap();
        project.configure().unwrap().load().unwrap();

        let after = project.registry.read().clone();
        assert_eq!(after, before);
        assert_eq!(after.run_step("align").unwrap(), Value::from("aligned"));
    }

    #[test]
    fn test_parse_keeps_unknown_names_and_fills_categories() {
        let mut registry = Registry::new();
        registry.register_step("align", Params::new(), FunctionRef::new("align", |_| Ok(Value::Null)));

        let doc = load_yaml_str(
            "REGISTERED:\n  align:\n    function: align\n  ghost:\n    function: ghost\n",
        )
        .unwrap()
        .unwrap();
        let loaded = parse_cleaneddata_fromyaml(&registry, categories_from_yaml(&doc).unwrap());

        let registered = &loaded[&Category::Registered];
        assert!(registered["align"]["function"].as_func().is_some());
        assert_eq!(registered["ghost"]["function"], Value::from("ghost"));
        assert_eq!(loaded.len(), 4);
    }

    #[test]
    fn test_parse_without_live_functions_keeps_names() {
        let registry = Registry::new();
        let doc = load_yaml_str("VALIDATE_AFTER:\n  align:\n    functions: [a, b]\n")
            .unwrap()
            .unwrap();
        let loaded = parse_cleaneddata_fromyaml(&registry, categories_from_yaml(&doc).unwrap());
        assert_eq!(
            loaded[&Category::ValidateAfter]["align"]["functions"],
            Value::from(vec!["a", "b"])
        );
    }

    #[test]
    fn test_load_empty_file_is_noop() {
        let root = TempDir::new().unwrap();
        let project = loaded_project(&root);
        std::fs::write(root.path().join("cfg").join(CONFIG_FILE), "").unwrap();
        let before = project.registry.read().clone();
        project.configure().unwrap().load().unwrap();
        assert_eq!(*project.registry.read(), before);
    }
}
