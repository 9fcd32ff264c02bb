//! The script machine.
//!
//! A [`Machine`] owns everything one Starlark evaluation needs: host globals,
//! collective memories, host builtins, the preload list and lazyload map
//! handed over by module resolution, a print function, a script file system
//! and the script itself. Globals bound by one evaluation are carried into
//! the next.
//!
//! Host globals and preloaded modules are materialized once and reused by
//! every evaluation until one of them is replaced.

pub mod build;
pub mod context;
pub mod fs;
pub mod memory;
pub mod repl;
pub mod stdlib;
pub mod value;

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::mem;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context as _};
use serde_json::Value as HostValue;
use starlark::environment::{FrozenModule, Globals, Module};
use starlark::eval::{Evaluator, FileLoader};
use starlark::syntax::AstModule;
use starlark::values::{OwnedFrozenValue, Value};
use starlark::PrintHandler;

use self::build::{into_anyhow, Builtins};
use self::context::Context;
use self::fs::ScriptFs;
use self::memory::Memory;
use self::repl::LineReader;
use crate::error::{Error, Result};
use crate::module::{LazyloadMap, PreloadList};
use crate::StringAnyMap;

/// Receives every line a script prints.
pub type PrintFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Default file name of scripts given as text.
pub const DEFAULT_SCRIPT_NAME: &str = "box.star";

/// Values bound before a script runs, by name. A global still holding its
/// predeclared value is not script output.
type Predeclared = HashMap<String, OwnedFrozenValue>;

/// Names bound from a frozen module, in binding order.
type Bound = Vec<(String, OwnedFrozenValue)>;

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Prints `[⭐|name](HH:MM:SS.mmm) msg` to stderr.
pub fn default_print_func(name: &str) -> PrintFn {
    let name = name.to_owned();
    Arc::new(move |msg: &str| {
        eprintln!(
            "[⭐|{}]({}) {}",
            name,
            chrono::Utc::now().format("%H:%M:%S%.3f"),
            msg
        )
    })
}

#[derive(Debug, Clone)]
struct Script {
    name: String,
    source: String,
}

pub struct Machine {
    name: String,
    globals: StringAnyMap,
    memories: BTreeMap<String, Memory>,
    builtins: Vec<Builtins>,
    preload: PreloadList,
    lazyload: LazyloadMap,
    print: Option<PrintFn>,
    fs: Option<Arc<dyn ScriptFs>>,
    script: Option<Script>,
    state: Option<FrozenModule>,
    predeclared: Option<Vec<FrozenModule>>,
    carried: Predeclared,
}

impl Machine {
    pub fn new(name: &str) -> Self {
        Machine {
            name: name.to_owned(),
            globals: StringAnyMap::new(),
            memories: BTreeMap::new(),
            builtins: Vec::new(),
            preload: PreloadList::new(),
            lazyload: LazyloadMap::new(),
            print: None,
            fs: None,
            script: None,
            state: None,
            predeclared: None,
            carried: Predeclared::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replaces the host globals.
    pub fn set_globals(&mut self, globals: StringAnyMap) {
        self.globals = globals;
        self.predeclared = None;
    }

    /// Adds host globals, overwriting existing keys.
    pub fn add_globals(&mut self, globals: StringAnyMap) {
        self.globals.extend(globals);
        self.predeclared = None;
    }

    /// Replaces the collective memories bound as globals.
    pub fn set_memories(&mut self, memories: BTreeMap<String, Memory>) {
        self.memories = memories;
        self.predeclared = None;
    }

    pub fn set_builtins(&mut self, builtins: Vec<Builtins>) {
        self.builtins = builtins;
    }

    pub fn set_preload_modules(&mut self, preload: PreloadList) {
        self.preload = preload;
        self.predeclared = None;
    }

    pub fn set_lazyload_modules(&mut self, lazyload: LazyloadMap) {
        self.lazyload = lazyload;
    }

    /// Sets the print function; `None` restores the default.
    pub fn set_print_func(&mut self, print: Option<PrintFn>) {
        self.print = print;
    }

    pub fn set_fs(&mut self, fs: Option<Arc<dyn ScriptFs>>) {
        self.fs = fs;
    }

    pub fn set_script(&mut self, name: &str, source: &str) {
        self.script = Some(Script {
            name: name.to_owned(),
            source: source.to_owned(),
        });
    }

    /// Sets the script to the file `name` of the script file system.
    ///
    /// Fails with [`Error::NoScript`] when no file system is set.
    pub fn load_script(&mut self, name: &str) -> Result<()> {
        let fs = self.fs.as_ref().ok_or(Error::NoScript)?;
        let source = fs::read_module_script(fs.as_ref(), name)?;
        self.set_script(name, &source);
        Ok(())
    }

    /// Evaluates the script on the calling thread.
    pub fn run(&mut self) -> Result<StringAnyMap> {
        let outcome = self.job(StringAnyMap::new())?.execute();
        self.finish(outcome)
    }

    /// Evaluates the script on a worker thread until it finishes or `ctx`
    /// is done. `extras` are bound as globals for this evaluation only.
    ///
    /// When the context ends first the worker is abandoned: its result is
    /// dropped and built-in sleeps in the script return early.
    pub fn run_with_context(&mut self, ctx: &Context, extras: StringAnyMap) -> Result<StringAnyMap> {
        if let Some(err) = ctx.err() {
            return Err(err);
        }
        let job = self.job(extras)?;
        let worker_ctx = ctx.with_cancel();
        let token = worker_ctx.clone();
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name(format!("starbox-{}", self.name))
            .spawn(move || {
                context::enter(token);
                let _ = tx.send(job.execute());
            })?;

        loop {
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(outcome) => return self.finish(outcome),
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(err) = worker_ctx.err() {
                        worker_ctx.cancel();
                        log::debug!("abandoning evaluation in {}: {}", self.name, err);
                        return Err(err);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(Error::eval(anyhow!(
                        "evaluation thread of {} terminated",
                        self.name
                    )))
                }
            }
        }
    }

    /// Runs an interactive loop over `reader` until it runs out of lines.
    pub fn repl(&mut self, reader: &mut dyn LineReader) -> Result<()> {
        let state = self.job(StringAnyMap::new())?.interact(reader)?;
        self.state = Some(state);
        Ok(())
    }

    /// Calls a function defined by the last evaluation.
    pub fn call(&self, name: &str, args: &[HostValue]) -> Result<HostValue> {
        let state = self.state.as_ref().ok_or(Error::NotExecuted)?;
        let function = state
            .get_option(name)
            .ok()
            .flatten()
            .ok_or_else(|| Error::FunctionNotFound(name.to_owned()))?;

        let module = Module::new();
        let printer = HostPrinter(self.print_func());
        let mut eval = Evaluator::new(&module);
        eval.set_print_handler(&printer);
        let heap = module.heap();
        let args: Vec<Value> = args.iter().map(|a| value::to_starlark(heap, a)).collect();
        let result = eval
            .eval_function(function.value(), &args, &[])
            .map_err(|e| Error::eval(into_anyhow(e)))?;
        Ok(value::to_host(result))
    }

    fn print_func(&self) -> PrintFn {
        match &self.print {
            Some(print) => print.clone(),
            None => default_print_func(&self.name),
        }
    }

    /// Host globals first, then every preloaded module in order.
    ///
    /// Each preload loader runs once per list handed to the machine.
    fn predeclared(&mut self) -> Result<Vec<FrozenModule>> {
        if let Some(modules) = &self.predeclared {
            return Ok(modules.clone());
        }
        let mut modules = Vec::with_capacity(self.preload.len() + 1);
        let host = build::freeze_host_globals(&self.globals, &self.memories);
        modules.push(host.map_err(Error::eval)?);
        for loader in &self.preload {
            let loaded = loader
                .load()
                .context("failed to preload module")
                .map_err(Error::eval)?;
            modules.push(loaded);
        }
        log::debug!(
            "{} materialized {} preloaded modules",
            self.name,
            self.preload.len()
        );
        self.predeclared = Some(modules.clone());
        Ok(modules)
    }

    fn job(&mut self, extras: StringAnyMap) -> Result<Job> {
        Ok(Job {
            predeclared: self.predeclared()?,
            carried: self.carried.clone(),
            extras,
            builtins: self.builtins.clone(),
            lazyload: self.lazyload.clone(),
            print: self.print_func(),
            fs: self.fs.clone(),
            script: self.script.clone().unwrap_or_else(|| Script {
                name: DEFAULT_SCRIPT_NAME.to_owned(),
                source: String::new(),
            }),
            state: self.state.clone(),
        })
    }

    fn finish(&mut self, outcome: Outcome) -> Result<StringAnyMap> {
        if let Some(state) = outcome.state {
            self.state = Some(state);
            self.carried.extend(outcome.extras);
        }
        outcome.result
    }
}

/// A self-contained evaluation request, movable to a worker thread.
struct Job {
    predeclared: Vec<FrozenModule>,
    carried: Predeclared,
    extras: StringAnyMap,
    builtins: Vec<Builtins>,
    lazyload: LazyloadMap,
    print: PrintFn,
    fs: Option<Arc<dyn ScriptFs>>,
    script: Script,
    state: Option<FrozenModule>,
}

struct Outcome {
    state: Option<FrozenModule>,
    extras: Bound,
    result: Result<StringAnyMap>,
}

impl Job {
    fn execute(self) -> Outcome {
        let globals = build::standard_globals(&self.builtins);
        let printer = HostPrinter(self.print.clone());
        let loader = ScriptLoader::new(&self.lazyload, self.fs.as_deref(), &globals, &printer);
        let module = Module::new();

        let (predeclared, extras) = match self.prepare(&module) {
            Ok(bound) => bound,
            Err(error) => {
                return Outcome {
                    state: None,
                    extras: Vec::new(),
                    result: Err(Error::eval(error)),
                }
            }
        };
        let evaluated = self.evaluate(&module, &globals, &loader, &printer);

        let frozen = match build::freeze(module) {
            Ok(frozen) => frozen,
            Err(error) => {
                return Outcome {
                    state: None,
                    extras: Vec::new(),
                    result: Err(Error::eval(error)),
                }
            }
        };
        let output = collect_output(&frozen, &predeclared);
        Outcome {
            state: Some(frozen),
            extras,
            result: match evaluated {
                Ok(()) => Ok(output),
                Err(error) => Err(Error::Eval { error, output }),
            },
        }
    }

    /// Binds host globals and preloaded modules, then the globals of earlier
    /// evaluations, then this evaluation's extras. Later bindings win.
    ///
    /// Returns the predeclared values and the extras as bound.
    fn prepare(&self, module: &Module) -> anyhow::Result<(Predeclared, Bound)> {
        let mut predeclared = Predeclared::new();
        for source in &self.predeclared {
            predeclared.extend(build::bind_public(module, source)?);
        }
        predeclared.extend(self.carried.clone());
        if let Some(state) = &self.state {
            build::bind_public(module, state)?;
        }
        let extras = if self.extras.is_empty() {
            Vec::new()
        } else {
            build::bind_public(module, &build::freeze_values(&self.extras)?)?
        };
        predeclared.extend(extras.iter().cloned());
        log::debug!(
            "prepared {} with {} predeclared names",
            self.script.name,
            predeclared.len()
        );
        Ok((predeclared, extras))
    }

    fn evaluate(
        &self,
        module: &Module,
        globals: &Globals,
        loader: &ScriptLoader,
        printer: &HostPrinter,
    ) -> anyhow::Result<()> {
        let ast = AstModule::parse(&self.script.name, self.script.source.clone(), &build::dialect())
            .map_err(into_anyhow)?;
        let mut eval = Evaluator::new(module);
        eval.set_loader(loader);
        eval.set_print_handler(printer);
        eval.eval_module(ast, globals).map_err(into_anyhow)?;
        Ok(())
    }

    fn interact(self, reader: &mut dyn LineReader) -> Result<FrozenModule> {
        let globals = build::standard_globals(&self.builtins);
        let printer = HostPrinter(self.print.clone());
        let loader = ScriptLoader::new(&self.lazyload, self.fs.as_deref(), &globals, &printer);
        let module = Module::new();
        self.prepare(&module).map_err(Error::eval)?;

        let mut chunk = String::new();
        loop {
            let prompt = if chunk.is_empty() { ">>> " } else { "... " };
            let line = match reader.read_line(prompt) {
                Some(line) => line,
                None => break,
            };
            if chunk.is_empty() && line.trim().is_empty() {
                continue;
            }
            chunk.push_str(&line);
            chunk.push('\n');
            if repl::needs_more(&chunk, &line) {
                continue;
            }
            self.eval_chunk(&module, &globals, &loader, &printer, mem::take(&mut chunk));
        }
        if !chunk.trim().is_empty() {
            self.eval_chunk(&module, &globals, &loader, &printer, chunk);
        }
        build::freeze(module).map_err(Error::eval)
    }

    fn eval_chunk(
        &self,
        module: &Module,
        globals: &Globals,
        loader: &ScriptLoader,
        printer: &HostPrinter,
        source: String,
    ) {
        let result = AstModule::parse("<repl>", source, &build::dialect())
            .map_err(into_anyhow)
            .and_then(|ast| {
                let mut eval = Evaluator::new(module);
                eval.set_loader(loader);
                eval.set_print_handler(printer);
                let value = eval.eval_module(ast, globals).map_err(into_anyhow)?;
                Ok(if value.is_none() {
                    None
                } else {
                    Some(value.to_repr())
                })
            });
        match result {
            Ok(Some(repr)) => (self.print)(&repr),
            Ok(None) => {}
            Err(err) => (self.print)(&format!("error: {}", err)),
        }
    }
}

/// Public globals of `module`, sorted by name, leaving out those that still
/// hold their predeclared value.
fn collect_output(module: &FrozenModule, predeclared: &Predeclared) -> StringAnyMap {
    let mut names: Vec<String> = module
        .names()
        .map(|n| n.as_str().to_owned())
        .filter(|n| !n.starts_with('_'))
        .collect();
    names.sort();

    let mut output = StringAnyMap::new();
    for name in names {
        let owned = match module.get_option(&name) {
            Ok(Some(owned)) => owned,
            _ => continue,
        };
        let unchanged = predeclared
            .get(&name)
            .map_or(false, |bound| owned.value().ptr_eq(bound.value()));
        if !unchanged {
            output.insert(name, value::to_host(owned.value()));
        }
    }
    output
}

struct HostPrinter(PrintFn);

impl PrintHandler for HostPrinter {
    fn println(&self, text: &str) -> starlark::Result<()> {
        (self.0)(text);
        Ok(())
    }
}

/// Serves `load()` from the lazyload map, then from the script file system.
///
/// Each module is materialized at most once per evaluation.
struct ScriptLoader<'a> {
    lazyload: &'a LazyloadMap,
    fs: Option<&'a dyn ScriptFs>,
    globals: &'a Globals,
    printer: &'a HostPrinter,
    cache: RefCell<HashMap<String, FrozenModule>>,
    loading: RefCell<HashSet<String>>,
}

impl<'a> ScriptLoader<'a> {
    fn new(
        lazyload: &'a LazyloadMap,
        fs: Option<&'a dyn ScriptFs>,
        globals: &'a Globals,
        printer: &'a HostPrinter,
    ) -> Self {
        ScriptLoader {
            lazyload,
            fs,
            globals,
            printer,
            cache: RefCell::new(HashMap::new()),
            loading: RefCell::new(HashSet::new()),
        }
    }

    fn materialize(&self, name: &str) -> anyhow::Result<FrozenModule> {
        if let Some(loader) = self.lazyload.get(name) {
            log::debug!("lazy loading module {}", name);
            return build::expand_members(name, loader.load()?);
        }
        let fs = self.fs.ok_or_else(|| anyhow!("module not found: {}", name))?;
        if !self.loading.borrow_mut().insert(name.to_owned()) {
            return Err(anyhow!("cyclic load of {}", name));
        }
        let result = fs::read_module_script(fs, name)
            .map_err(|e| anyhow!("cannot load {}: {}", name, e))
            .and_then(|source| {
                build::eval_script_module(
                    name,
                    &source,
                    self.globals,
                    Some(self as &dyn FileLoader),
                    Some(self.printer as &dyn PrintHandler),
                )
            });
        self.loading.borrow_mut().remove(name);
        result
    }
}

impl FileLoader for ScriptLoader<'_> {
    fn load(&self, path: &str) -> starlark::Result<FrozenModule> {
        if let Some(module) = self.cache.borrow().get(path) {
            return Ok(module.clone());
        }
        let module = self.materialize(path).map_err(starlark::Error::new_other)?;
        self.cache
            .borrow_mut()
            .insert(path.to_owned(), module.clone());
        Ok(module)
    }
}
