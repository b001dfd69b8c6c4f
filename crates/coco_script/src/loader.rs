//! Memoized script loader
//!
//! Each file identifier is evaluated at most once per session. The identifier
//! is recorded before evaluation starts, so a script that (transitively)
//! requires itself sees a no-op instead of recursing.
//!
//! The loader is confined to the thread that owns the script runtime. The
//! registry borrow is never held across an evaluation, which is what lets
//! scripts call back into [`ModuleLoader::load`] while they are being loaded.

use std::cell::RefCell;
use std::collections::HashSet;

/// Performs the actual evaluation of a named script.
pub trait Evaluate {
    type Error;

    /// Evaluate the script named by `id`. Called once per fresh load.
    fn evaluate(&self, id: &str) -> Result<(), Self::Error>;
}

/// Ordered set of file identifiers that have been loaded.
#[derive(Debug, Default, Clone)]
pub struct LoadRegistry {
    order: Vec<String>,
    members: HashSet<String>,
}

impl LoadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    /// Append `id`. Returns `false` if it was already present.
    pub fn insert(&mut self, id: &str) -> bool {
        if !self.members.insert(id.to_string()) {
            return false;
        }
        self.order.push(id.to_string());
        true
    }

    /// Empty the registry, returning its contents in load order.
    pub fn take(&mut self) -> Vec<String> {
        self.members.clear();
        std::mem::take(&mut self.order)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Loads scripts exactly once and can re-run everything in original order.
#[derive(Debug, Default)]
pub struct ModuleLoader {
    registry: RefCell<LoadRegistry>,
}

impl ModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `id` unless it is already loaded.
    ///
    /// Returns `Ok(true)` when the evaluator ran. Evaluation errors are passed
    /// back unchanged; the identifier stays registered.
    pub fn load<E>(&self, id: &str, evaluator: &E) -> Result<bool, E::Error>
    where
        E: Evaluate + ?Sized,
    {
        if !self.registry.borrow_mut().insert(id) {
            tracing::trace!(file = id, "already loaded");
            return Ok(false);
        }

        tracing::debug!(file = id, "loading script");
        evaluator.evaluate(id)?;
        Ok(true)
    }

    /// Clear the registry and load every previously loaded file again, in
    /// the order they were first loaded.
    ///
    /// Files pulled in for the first time during the reload are appended to
    /// the registry but not revisited by this pass. Stops at the first error.
    /// Returns how many evaluations the captured list triggered directly.
    pub fn reload_all<E>(&self, evaluator: &E) -> Result<usize, E::Error>
    where
        E: Evaluate + ?Sized,
    {
        let files = self.registry.borrow_mut().take();
        tracing::info!(count = files.len(), "reloading scripts");

        let mut evaluated = 0;
        for file in &files {
            if self.load(file, evaluator)? {
                evaluated += 1;
            }
        }
        Ok(evaluated)
    }

    /// Snapshot of the loaded identifiers in load order.
    pub fn loaded(&self) -> Vec<String> {
        self.registry.borrow().as_slice().to_vec()
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        self.registry.borrow().contains(id)
    }

    pub fn len(&self) -> usize {
        self.registry.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Scripts whose evaluation may require other scripts or fail.
    struct Scripts<'a> {
        loader: &'a ModuleLoader,
        requires: HashMap<&'static str, Vec<&'static str>>,
        failing: HashSet<&'static str>,
        evaluated: RefCell<Vec<String>>,
        registry_at_eval: RefCell<Vec<Vec<String>>>,
    }

    impl<'a> Scripts<'a> {
        fn new(loader: &'a ModuleLoader) -> Self {
            Self {
                loader,
                requires: HashMap::new(),
                failing: HashSet::new(),
                evaluated: RefCell::new(Vec::new()),
                registry_at_eval: RefCell::new(Vec::new()),
            }
        }

        fn requires(mut self, id: &'static str, deps: &[&'static str]) -> Self {
            self.requires.insert(id, deps.to_vec());
            self
        }

        fn evaluated(&self) -> Vec<String> {
            self.evaluated.borrow().clone()
        }
    }

    impl Evaluate for Scripts<'_> {
        type Error = String;

        fn evaluate(&self, id: &str) -> Result<(), String> {
            self.evaluated.borrow_mut().push(id.to_string());
            self.registry_at_eval.borrow_mut().push(self.loader.loaded());

            if self.failing.contains(id) {
                return Err(format!("{id}: syntax error"));
            }
            for dep in self.requires.get(id).into_iter().flatten() {
                self.loader.load(dep, self)?;
            }
            Ok(())
        }
    }

    #[test]
    fn registry_rejects_duplicates() {
        let mut registry = LoadRegistry::new();
        assert!(registry.insert("a"));
        assert!(registry.insert("b"));
        assert!(!registry.insert("a"));
        assert_eq!(registry.as_slice(), ["a", "b"]);

        assert_eq!(registry.take(), vec!["a", "b"]);
        assert!(registry.is_empty());
        assert!(!registry.contains("a"));
    }

    #[test]
    fn load_is_idempotent() {
        let loader = ModuleLoader::new();
        let scripts = Scripts::new(&loader);

        assert_eq!(loader.load("a", &scripts), Ok(true));
        assert_eq!(loader.load("a", &scripts), Ok(false));

        assert_eq!(scripts.evaluated(), vec!["a"]);
        assert_eq!(loader.loaded(), vec!["a"]);
    }

    #[test]
    fn reload_preserves_original_order() {
        let loader = ModuleLoader::new();
        let scripts = Scripts::new(&loader);
        for id in ["a", "b", "c"] {
            loader.load(id, &scripts).unwrap();
        }
        scripts.evaluated.borrow_mut().clear();

        assert_eq!(loader.reload_all(&scripts), Ok(3));
        assert_eq!(scripts.evaluated(), vec!["a", "b", "c"]);
        assert_eq!(loader.loaded(), vec!["a", "b", "c"]);
    }

    #[test]
    fn reload_starts_from_an_empty_registry() {
        let loader = ModuleLoader::new();
        let scripts = Scripts::new(&loader);
        loader.load("a", &scripts).unwrap();
        loader.load("b", &scripts).unwrap();
        scripts.registry_at_eval.borrow_mut().clear();

        loader.reload_all(&scripts).unwrap();

        let seen = scripts.registry_at_eval.borrow();
        assert_eq!(seen[0], vec!["a"]);
        assert_eq!(seen[1], vec!["a", "b"]);
    }

    #[test]
    fn self_require_does_not_recurse() {
        let loader = ModuleLoader::new();
        let scripts = Scripts::new(&loader).requires("x", &["x"]);

        assert_eq!(loader.load("x", &scripts), Ok(true));
        assert_eq!(scripts.evaluated(), vec!["x"]);
    }

    #[test]
    fn circular_requires_evaluate_each_once() {
        let loader = ModuleLoader::new();
        let scripts = Scripts::new(&loader)
            .requires("a", &["b"])
            .requires("b", &["a"]);

        loader.load("a", &scripts).unwrap();
        assert_eq!(scripts.evaluated(), vec!["a", "b"]);
        assert_eq!(loader.loaded(), vec!["a", "b"]);
    }

    #[test]
    fn dependencies_reloaded_early_are_not_evaluated_twice() {
        let loader = ModuleLoader::new();
        let scripts = Scripts::new(&loader).requires("a", &["b"]);
        loader.load("a", &scripts).unwrap();
        scripts.evaluated.borrow_mut().clear();

        // "b" is re-evaluated through "a", so the captured "b" is a no-op.
        assert_eq!(loader.reload_all(&scripts), Ok(1));
        assert_eq!(scripts.evaluated(), vec!["a", "b"]);
    }

    #[test]
    fn files_first_loaded_during_reload_are_appended_once() {
        let loader = ModuleLoader::new();
        let mut scripts = Scripts::new(&loader);
        loader.load("a", &scripts).unwrap();
        loader.load("b", &scripts).unwrap();

        scripts.requires.insert("a", vec!["new"]);
        scripts.evaluated.borrow_mut().clear();

        loader.reload_all(&scripts).unwrap();
        assert_eq!(scripts.evaluated(), vec!["a", "new", "b"]);
        assert_eq!(loader.loaded(), vec!["a", "new", "b"]);
    }

    #[test]
    fn failure_aborts_and_keeps_recorded_entries() {
        let loader = ModuleLoader::new();
        let mut scripts = Scripts::new(&loader);
        for id in ["a", "b", "c"] {
            loader.load(id, &scripts).unwrap();
        }

        scripts.failing.insert("b");
        scripts.evaluated.borrow_mut().clear();

        assert_eq!(loader.reload_all(&scripts), Err("b: syntax error".to_string()));
        assert_eq!(scripts.evaluated(), vec!["a", "b"]);
        assert_eq!(loader.loaded(), vec!["a", "b"]);
        assert!(!loader.is_loaded("c"));
    }

    #[test]
    fn nested_failure_propagates_through_load() {
        let loader = ModuleLoader::new();
        let mut scripts = Scripts::new(&loader).requires("main", &["broken", "after"]);
        scripts.failing.insert("broken");

        assert!(loader.load("main", &scripts).is_err());
        assert_eq!(scripts.evaluated(), vec!["main", "broken"]);
        assert_eq!(loader.loaded(), vec!["main", "broken"]);
        assert_eq!(loader.len(), 2);
    }
}
