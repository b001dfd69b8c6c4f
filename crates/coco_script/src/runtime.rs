//! Script runtime management
//!
//! Owns the QuickJS runtime and context, the module loader and the log
//! buffer. Everything here runs on the thread that created the runtime.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use rquickjs::convert::Coerced;
use rquickjs::{Context, Ctx, Runtime};

use crate::bindings::{eval_script, HostBindings, JsEvaluator, MessageLog};
use crate::loader::{Evaluate, ModuleLoader};
use crate::resolver::ScriptResolver;
use crate::{ScriptConfig, ScriptError};

/// Script execution context
pub struct ScriptRuntime {
    runtime: Runtime,
    pub context: Context,
    bindings: HostBindings,
    bootstrap: Vec<String>,
}

impl ScriptRuntime {
    pub fn new(config: ScriptConfig) -> Result<Self, ScriptError> {
        let runtime = Runtime::new().map_err(ScriptError::Init)?;
        if let Some(limit) = config.memory_limit {
            runtime.set_memory_limit(limit);
        }
        if let Some(threshold) = config.gc_threshold {
            runtime.set_gc_threshold(threshold);
        }
        let context = Context::full(&runtime).map_err(ScriptError::Init)?;

        let resolver = ScriptResolver::new(config.search_paths.clone()).with_extension(config.extension);
        let bindings = HostBindings {
            loader: Rc::new(ModuleLoader::new()),
            resolver: Rc::new(resolver),
            messages: MessageLog::new(config.message_capacity),
        };
        context
            .with(|ctx| bindings.install(&ctx))
            .map_err(ScriptError::Init)?;

        tracing::info!(search_paths = ?config.search_paths, "script runtime ready");

        Ok(Self {
            runtime,
            context,
            bindings,
            bootstrap: config.bootstrap,
        })
    }

    /// Load the configured bootstrap scripts in order.
    pub fn bootstrap(&self) -> Result<(), ScriptError> {
        for id in &self.bootstrap {
            self.require(id)?;
        }
        Ok(())
    }

    pub fn execute_file(&self, path: &Path) -> Result<(), ScriptError> {
        let source = std::fs::read_to_string(path)?;
        self.execute(&source)?;
        Ok(())
    }

    pub fn execute(&self, source: &str) -> Result<(), ScriptError> {
        self.context
            .with(|ctx| eval_script::<()>(&ctx, source).map_err(|e| exception(&ctx, e)))
    }

    /// Evaluate `source` and render its completion value.
    ///
    /// Returns `None` for `undefined`. Objects and arrays are rendered as JSON,
    /// everything else with script string coercion.
    pub fn evaluate(&self, source: &str) -> Result<Option<String>, ScriptError> {
        self.context.with(|ctx| {
            let value: rquickjs::Value = eval_script(&ctx, source).map_err(|e| exception(&ctx, e))?;
            if value.is_undefined() {
                return Ok(None);
            }

            if value.is_object() || value.is_array() {
                let json = ctx
                    .json_stringify(value.clone())
                    .map_err(|e| exception(&ctx, e))?;
                if let Some(json) = json {
                    return Ok(Some(json.to_string()?));
                }
            }

            let text = value
                .get::<Coerced<String>>()
                .map_err(|e| exception(&ctx, e))?;
            Ok(Some(text.0))
        })
    }

    /// Call a JavaScript function by name with no arguments.
    pub fn call_function(&self, name: &str) -> Result<(), ScriptError> {
        self.context.with(|ctx| {
            let func: rquickjs::Function = ctx.globals().get(name)?;
            func.call::<_, ()>(()).map_err(|e| exception(&ctx, e))
        })
    }

    /// Load a script through the module loader. Returns `false` if it was
    /// already loaded.
    pub fn require(&self, id: &str) -> Result<bool, ScriptError> {
        self.context.with(|ctx| {
            let evaluator = JsEvaluator::new(ctx.clone(), &self.bindings.resolver);
            self.bindings
                .loader
                .load(id, &evaluator)
                .map_err(|e| load_failure(&ctx, id, e))
        })
    }

    /// Re-evaluate every loaded script in original order.
    pub fn reload_all(&self) -> Result<usize, ScriptError> {
        self.context.with(|ctx| {
            let evaluator = FailureTracker::new(JsEvaluator::new(ctx.clone(), &self.bindings.resolver));
            self.bindings.loader.reload_all(&evaluator).map_err(|e| {
                let file = evaluator.failed().unwrap_or_default();
                load_failure(&ctx, &file, e)
            })
        })
    }

    /// Loaded script identifiers in load order.
    pub fn loaded(&self) -> Vec<String> {
        self.bindings.loader.loaded()
    }

    pub fn resolver(&self) -> &ScriptResolver {
        &self.bindings.resolver
    }

    /// Drain lines written by scripts through `log()`.
    pub fn take_messages(&self) -> Vec<String> {
        self.bindings.messages.drain()
    }

    pub fn gc(&self) {
        tracing::debug!("running garbage collector");
        self.runtime.run_gc();
    }
}

/// Remembers which top-level identifier failed to evaluate.
struct FailureTracker<E> {
    inner: E,
    failed: RefCell<Option<String>>,
}

impl<E> FailureTracker<E> {
    fn new(inner: E) -> Self {
        Self {
            inner,
            failed: RefCell::new(None),
        }
    }

    fn failed(&self) -> Option<String> {
        self.failed.borrow().clone()
    }
}

impl<E: Evaluate> Evaluate for FailureTracker<E> {
    type Error = E::Error;

    fn evaluate(&self, id: &str) -> Result<(), Self::Error> {
        self.inner.evaluate(id).inspect_err(|_| {
            self.failed.borrow_mut().get_or_insert_with(|| id.to_string());
        })
    }
}

/// Turn a pending script exception into a [`ScriptError`].
fn exception(ctx: &Ctx<'_>, error: rquickjs::Error) -> ScriptError {
    if !matches!(error, rquickjs::Error::Exception) {
        return ScriptError::Js(error);
    }

    let caught = ctx.catch();
    if let Some(exception) = caught.as_exception() {
        ScriptError::Exception {
            message: exception.message().unwrap_or_default(),
            stack: exception.stack(),
        }
    } else {
        let message = caught
            .get::<Coerced<String>>()
            .map(|text| text.0)
            .unwrap_or_else(|_| "unknown exception".to_string());
        ScriptError::Exception {
            message,
            stack: None,
        }
    }
}

fn load_failure(ctx: &Ctx<'_>, file: &str, error: rquickjs::Error) -> ScriptError {
    let message = match exception(ctx, error) {
        ScriptError::Exception { message, .. } => message,
        other => other.to_string(),
    };
    tracing::warn!(file, %message, "script load failed");
    ScriptError::LoadFailure {
        file: file.to_string(),
        message,
    }
}
