//! Host functions exposed to scripts
//!
//! - `require(id)` / `require.reload()` / `require.loaded()` - module loading
//! - `log(...values)` - write a line to the host log
//! - `Point`, `Size`, `Rect`, `Range`, `AffineTransform`, `EdgeInsets` - value constructors

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use rquickjs::convert::Coerced;
use rquickjs::function::Rest;
use rquickjs::context::EvalOptions;
use rquickjs::{Ctx, Exception, FromJs, Function, IntoJs};

use crate::loader::{Evaluate, ModuleLoader};
use crate::resolver::ScriptResolver;
use crate::value::{AffineTransform, EdgeInsets, Point, Range, Record, Rect, Size};

/// Tracing target for lines written by scripts through `log()`.
pub const SCRIPT_LOG_TARGET: &str = "coco::script";

/// Evaluates resolved script files inside a QuickJS context.
pub struct JsEvaluator<'js, 'r> {
    ctx: Ctx<'js>,
    resolver: &'r ScriptResolver,
}

impl<'js, 'r> JsEvaluator<'js, 'r> {
    pub fn new(ctx: Ctx<'js>, resolver: &'r ScriptResolver) -> Self {
        Self { ctx, resolver }
    }
}

impl Evaluate for JsEvaluator<'_, '_> {
    type Error = rquickjs::Error;

    fn evaluate(&self, id: &str) -> rquickjs::Result<()> {
        // Resolution problems become script-visible errors so `try { require(..) }` works.
        let path = self
            .resolver
            .resolve(id)
            .map_err(|e| Exception::throw_message(&self.ctx, &e.to_string()))?;
        let source = std::fs::read_to_string(&path).map_err(|e| {
            Exception::throw_message(&self.ctx, &format!("cannot read {}: {e}", path.display()))
        })?;
        eval_script(&self.ctx, source)
    }
}

/// Evaluate `source` as a sloppy-mode global script, so scripts may assign
/// undeclared globals (`Parent = ...`).
pub fn eval_script<'js, V: FromJs<'js>>(
    ctx: &Ctx<'js>,
    source: impl Into<Vec<u8>>,
) -> rquickjs::Result<V> {
    let mut options = EvalOptions::default();
    options.strict = false;
    ctx.eval_with_options(source, options)
}

/// Bounded buffer of lines written through `log()`. Oldest lines drop first.
#[derive(Debug, Clone)]
pub struct MessageLog {
    lines: Rc<RefCell<VecDeque<String>>>,
    capacity: usize,
}

impl MessageLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Rc::new(RefCell::new(VecDeque::new())),
            capacity,
        }
    }

    pub fn push(&self, line: String) {
        if self.capacity == 0 {
            return;
        }
        let mut lines = self.lines.borrow_mut();
        while lines.len() >= self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    /// Remove and return all buffered lines.
    pub fn drain(&self) -> Vec<String> {
        self.lines.borrow_mut().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lines.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.borrow().is_empty()
    }
}

/// Shared host state the script-facing functions close over.
#[derive(Debug, Clone)]
pub struct HostBindings {
    pub loader: Rc<ModuleLoader>,
    pub resolver: Rc<ScriptResolver>,
    pub messages: MessageLog,
}

impl HostBindings {
    /// Install every host function into the context's global object.
    pub fn install<'js>(&self, ctx: &Ctx<'js>) -> rquickjs::Result<()> {
        let globals = ctx.globals();

        globals.set("require", self.require(ctx)?)?;
        globals.set("log", self.log(ctx)?)?;

        globals.set(Point::NAME, constructor::<Point>(ctx)?)?;
        globals.set(Size::NAME, constructor::<Size>(ctx)?)?;
        globals.set(Rect::NAME, constructor::<Rect>(ctx)?)?;
        globals.set(Range::NAME, constructor::<Range>(ctx)?)?;
        globals.set(AffineTransform::NAME, constructor::<AffineTransform>(ctx)?)?;
        globals.set(EdgeInsets::NAME, constructor::<EdgeInsets>(ctx)?)?;

        tracing::debug!("host bindings installed");
        Ok(())
    }

    fn require<'js>(&self, ctx: &Ctx<'js>) -> rquickjs::Result<Function<'js>> {
        let loader = self.loader.clone();
        let resolver = self.resolver.clone();
        let require = Function::new(ctx.clone(), move |ctx: Ctx<'js>, id: String| {
            loader.load(&id, &JsEvaluator::new(ctx, &resolver))
        })?;

        let loader = self.loader.clone();
        let resolver = self.resolver.clone();
        let reload = Function::new(ctx.clone(), move |ctx: Ctx<'js>| {
            loader
                .reload_all(&JsEvaluator::new(ctx, &resolver))
                .map(|evaluated| evaluated as u32)
        })?;
        require.set("reload", reload)?;

        let loader = self.loader.clone();
        let loaded = Function::new(ctx.clone(), move || loader.loaded())?;
        require.set("loaded", loaded)?;

        Ok(require)
    }

    fn log<'js>(&self, ctx: &Ctx<'js>) -> rquickjs::Result<Function<'js>> {
        let messages = self.messages.clone();
        Function::new(ctx.clone(), move |args: Rest<Coerced<String>>| {
            let line = args
                .0
                .into_iter()
                .map(|arg| arg.0)
                .collect::<Vec<_>>()
                .join(" ");
            tracing::info!(target: SCRIPT_LOG_TARGET, "{line}");
            messages.push(line);
        })
    }
}

/// A script-callable factory that validates its arguments as `R`.
///
/// Factories are called without `new` (`Point(1, 2)`); `new Point(1, 2)` is
/// a `TypeError`.
fn constructor<'js, R>(ctx: &Ctx<'js>) -> rquickjs::Result<Function<'js>>
where
    R: Record + IntoJs<'js> + 'js,
{
    Function::new(
        ctx.clone(),
        |ctx: Ctx<'js>, args: Rest<rquickjs::Value<'js>>| -> rquickjs::Result<R> {
            R::from_args(&args.0).map_err(|e| Exception::throw_type(&ctx, &e.to_string()))
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rquickjs::{Context, Runtime};

    fn with_bindings<F>(f: F)
    where
        F: for<'js> FnOnce(Ctx<'js>, &HostBindings),
    {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();
        let bindings = HostBindings {
            loader: Rc::new(ModuleLoader::new()),
            resolver: Rc::new(ScriptResolver::new(Vec::new())),
            messages: MessageLog::new(8),
        };
        context.with(|ctx| {
            bindings.install(&ctx).unwrap();
            f(ctx, &bindings);
        });
    }

    #[test]
    fn message_log_is_bounded() {
        let log = MessageLog::new(2);
        log.push("a".into());
        log.push("b".into());
        log.push("c".into());
        assert_eq!(log.drain(), vec!["b", "c"]);
        assert!(log.is_empty());

        let silent = MessageLog::new(0);
        silent.push("dropped".into());
        assert_eq!(silent.len(), 0);
    }

    #[test]
    fn constructors_build_plain_objects() {
        with_bindings(|ctx, _| {
            let p: Point = ctx.eval("Point(3, 4)").unwrap();
            assert_eq!(p, Point::new(3.0, 4.0));

            let r: Rect = ctx.eval("Rect(0, 0, 10, 20)").unwrap();
            assert_eq!(r, Rect::new(0.0, 0.0, 10.0, 20.0));

            let range: Range = ctx.eval("Range(5, 0)").unwrap();
            assert_eq!(range, Range::new(5.0, 0.0));

            let keys: String = ctx
                .eval("Object.keys(Rect(0, 0, 10, 20)).join(',')")
                .unwrap();
            assert_eq!(keys, "x,y,width,height");
        });
    }

    #[test]
    fn constructors_are_plain_factories() {
        with_bindings(|ctx, _| {
            let outcome: String = ctx
                .eval(
                    r#"
                    let outcome = "constructed";
                    try { new Point(1, 2); } catch (e) {
                        outcome = (e instanceof TypeError) ? "type error" : String(e);
                    }
                    outcome
                    "#,
                )
                .unwrap();
            assert_eq!(outcome, "type error");

            let p: Point = ctx.eval("Point(1, 2)").unwrap();
            assert_eq!(p, Point::new(1.0, 2.0));
        });
    }

    #[test]
    fn constructor_type_errors_name_the_field() {
        with_bindings(|ctx, _| {
            let message: String = ctx
                .eval(
                    r#"
                    let message = "no error";
                    try { Point("3", 4); } catch (e) {
                        message = (e instanceof TypeError) + ":" + e.message;
                    }
                    message
                    "#,
                )
                .unwrap();
            assert!(message.starts_with("true:"), "{message}");
            assert!(message.contains("Point"), "{message}");
            assert!(message.contains("x=\"3\""), "{message}");
        });
    }

    #[test]
    fn records_convert_from_script_objects() {
        with_bindings(|ctx, _| {
            let size: Size = ctx.eval("({ width: 2, height: 3, extra: true })").unwrap();
            assert_eq!(size, Size::new(2.0, 3.0));

            let bad: rquickjs::Result<Size> = ctx.eval("({ width: 'wide', height: 3 })");
            assert!(bad.is_err());
        });
    }

    #[test]
    fn log_joins_arguments() {
        with_bindings(|ctx, bindings| {
            ctx.eval::<(), _>("log('hello', 42, true)").unwrap();
            assert_eq!(bindings.messages.drain(), vec!["hello 42 true"]);
        });
    }

    #[test]
    fn missing_module_is_a_catchable_error() {
        with_bindings(|ctx, bindings| {
            let caught: bool = ctx
                .eval("try { require('missing'); false } catch (e) { true }")
                .unwrap();
            assert!(caught);
            // Recorded before evaluation, so the failed attempt stays registered.
            assert_eq!(bindings.loader.loaded(), vec!["missing"]);
        });
    }
}
