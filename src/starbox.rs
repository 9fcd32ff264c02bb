//! The scripting session.
//!
//! A [`Starbox`] collects configuration (host values, builtins, module
//! sources, a print function and module scripts) and hands it to its
//! [`Machine`] on the first execution. From then on the configuration is
//! frozen: later runs only swap the script, and globals bound by earlier runs
//! stay visible. [`Starbox::reset`] discards the machine and unfreezes the
//! configuration.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value as HostValue;
use starlark::environment::GlobalsBuilder;

use crate::engine::build::Builtins;
use crate::engine::context::Context;
use crate::engine::fs::{MemoryFs, ScriptFs};
use crate::engine::memory::Memory;
use crate::engine::repl::{LineReader, ScriptedLines, Terminal};
use crate::engine::{Machine, PrintFn, DEFAULT_SCRIPT_NAME};
use crate::error::{Error, Result};
use crate::module::{
    resolve, DynamicModuleLoader, ModuleLoader, ModuleRegistry, ModuleSetName, ModuleSources,
};
use crate::runner::RunConfig;
use crate::strings;
use crate::StringAnyMap;

/// Decides from the outcome of a run whether to open the inspection REPL.
pub type InspectCondFunc = dyn Fn(&Result<StringAnyMap>) -> bool + Send + Sync;

const MODULES_GLOBAL: &str = "__modules__";

#[derive(Clone, Default)]
struct Config {
    print: Option<PrintFn>,
    globals: StringAnyMap,
    memories: BTreeMap<String, Memory>,
    builtins: Vec<Builtins>,
    module_set: ModuleSetName,
    named: Vec<String>,
    custom: ModuleRegistry,
    scripts: BTreeMap<String, String>,
    fs: Option<Arc<dyn ScriptFs>>,
    dynamic: Option<DynamicModuleLoader>,
}

impl Config {
    fn sources(&self) -> ModuleSources<'_> {
        ModuleSources {
            set: &self.module_set,
            named: &self.named,
            custom: &self.custom,
            dynamic: self.dynamic.as_ref(),
        }
    }

    /// The configured file system, or one holding the module scripts.
    fn script_fs(&self) -> Option<Arc<dyn ScriptFs>> {
        if let Some(fs) = &self.fs {
            return Some(fs.clone());
        }
        if self.scripts.is_empty() {
            return None;
        }
        let mut memory = MemoryFs::new();
        for (name, source) in &self.scripts {
            memory.insert(name.clone(), source.clone());
        }
        Some(Arc::new(memory))
    }
}

struct Inner {
    machine: Machine,
    has_exec: bool,
    exec_times: u32,
    config: Config,
    module_names: Vec<String>,
}

impl Inner {
    fn mark_executed(&mut self) {
        self.has_exec = true;
        self.exec_times += 1;
    }

    /// Resolves the module sources and hands everything to the machine.
    ///
    /// Nothing is committed when resolution fails.
    fn prepare(&mut self) -> Result<()> {
        let Inner {
            machine,
            config,
            module_names,
            ..
        } = self;

        let resolution = resolve(&config.sources())?;
        let mut names = resolution.names;
        let fs = config.script_fs();
        if config.fs.is_none() {
            names.extend(config.scripts.keys().cloned());
        }
        let names = strings::unique_sorted(names.as_slice());

        machine.set_print_func(config.print.clone());
        machine.set_globals(config.globals.clone());
        machine.set_memories(config.memories.clone());
        machine.set_builtins(config.builtins.clone());
        machine.set_preload_modules(resolution.preload);
        machine.set_lazyload_modules(resolution.lazyload);
        machine.set_fs(fs);

        let mut modules = StringAnyMap::new();
        modules.insert(MODULES_GLOBAL.to_owned(), HostValue::from(names.clone()));
        machine.add_globals(modules);

        log::debug!("prepared {} with modules {:?}", machine.name(), names);
        *module_names = names;
        Ok(())
    }

    fn prepare_script(&mut self, script: &str) -> Result<()> {
        if !self.has_exec {
            self.prepare()?;
        }
        self.machine.set_script(DEFAULT_SCRIPT_NAME, script);
        Ok(())
    }
}

/// An embeddable Starlark session.
pub struct Starbox {
    name: String,
    inner: Mutex<Inner>,
}

impl Starbox {
    pub fn new(name: &str) -> Self {
        Starbox {
            name: name.to_owned(),
            inner: Mutex::new(Inner {
                machine: Machine::new(name),
                has_exec: false,
                exec_times: 0,
                config: Config::default(),
                module_names: Vec::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn configure<F>(&self, action: &str, f: F)
    where
        F: FnOnce(&mut Config),
    {
        let mut inner = self.inner.lock();
        if inner.has_exec {
            log::error!("{}: cannot {} after execution", self.name, action);
            panic!("cannot {} after execution", action);
        }
        f(&mut inner.config);
    }

    /// Sets the function receiving everything the script prints.
    ///
    /// # Panics
    ///
    /// Panics if called after execution. The same holds for every other
    /// configuration method.
    pub fn set_print_func<F>(&self, print: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.configure("set print function", |c| c.print = Some(Arc::new(print)));
    }

    /// Sets the file system module scripts and `run_file` sources are read
    /// from. It replaces every script added by [`Starbox::add_module_script`].
    pub fn set_fs<F>(&self, fs: F)
    where
        F: ScriptFs + 'static,
    {
        self.configure("set filesystem", |c| c.fs = Some(Arc::new(fs)));
    }

    pub fn set_module_set(&self, set: impl Into<ModuleSetName>) {
        let set = set.into();
        self.configure("set module set", |c| c.module_set = set);
    }

    /// Sets the callback consulted for named modules that neither the
    /// built-in library nor the custom loaders provide.
    pub fn set_dynamic_module_loader<F>(&self, loader: F)
    where
        F: Fn(&str) -> anyhow::Result<Option<ModuleLoader>> + Send + Sync + 'static,
    {
        self.configure("set dynamic module loader", |c| {
            c.dynamic = Some(Arc::new(loader))
        });
    }

    /// Binds a global, overwriting an existing one.
    pub fn add_key_value(&self, key: &str, value: impl Into<HostValue>) {
        let value = value.into();
        self.configure("add key-value pair", |c| {
            c.memories.remove(key);
            c.globals.insert(key.to_owned(), value);
        });
    }

    pub fn add_key_values(&self, values: StringAnyMap) {
        self.configure("add key-value pairs", |c| {
            for key in values.keys() {
                c.memories.remove(key);
            }
            c.globals.extend(values)
        });
    }

    /// Binds `memory` as the global `name`. Every session the same memory is
    /// attached to reads and writes the same entries.
    pub fn attach_memory(&self, name: &str, memory: &Memory) {
        let memory = memory.clone();
        self.configure("attach memory", |c| {
            c.globals.remove(name);
            c.memories.insert(name.to_owned(), memory);
        });
    }

    /// Creates a memory, binds it as the global `name` and returns it.
    pub fn create_memory(&self, name: &str) -> Memory {
        let memory = Memory::new();
        self.attach_memory(name, &memory);
        memory
    }

    /// Registers native globals, built with `#[starlark_module]`.
    pub fn add_builtins(&self, builtins: fn(&mut GlobalsBuilder)) {
        self.configure("add builtins", |c| c.builtins.push(builtins));
    }

    /// Asks for modules by name: built-ins outside the module set, custom
    /// modules, or modules of the dynamic loader.
    pub fn add_named_modules<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        self.configure("add named modules", |c| c.named.extend(names));
    }

    /// Same as [`Starbox::add_named_modules`].
    pub fn add_modules_by_name<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_named_modules(names);
    }

    /// Adds a custom module. A later registration under the same name
    /// replaces this one; a built-in of the same name shadows it.
    ///
    /// Its members are reachable as globals and through `load(name, ...)`.
    pub fn add_module_loader(&self, name: &str, loader: ModuleLoader) {
        self.configure("add module loader", |c| {
            c.custom.register(name, loader);
        });
    }

    /// Adds a custom module binding `data` as a struct named `name`.
    pub fn add_module_data(&self, name: &str, data: StringAnyMap) {
        self.configure("add module data", |c| {
            c.custom.register(name, ModuleLoader::from_struct(name, data));
        });
    }

    pub fn add_struct_data(&self, name: &str, data: StringAnyMap) {
        self.configure("add struct data", |c| {
            c.custom.register(name, ModuleLoader::from_struct(name, data));
        });
    }

    /// Adds a custom module with the native functions of `members` under the
    /// namespace `name`.
    pub fn add_module_functions(&self, name: &str, members: fn(&mut GlobalsBuilder)) {
        self.configure("add module functions", |c| {
            c.custom
                .register(name, ModuleLoader::from_functions(name, members));
        });
    }

    /// Adds a module script, loadable as `name` or `name.star`.
    pub fn add_module_script(&self, name: &str, source: &str) {
        let mut file = name.trim().to_owned();
        if !file.ends_with(".star") {
            file.push_str(".star");
        }
        self.configure("add module script", |c| {
            c.scripts.insert(file, source.to_owned());
        });
    }

    /// Runs `script` and returns the globals it bound.
    pub fn run(&self, script: &str) -> Result<StringAnyMap> {
        let mut inner = self.inner.lock();
        inner.prepare_script(script)?;
        inner.mark_executed();
        inner.machine.run()
    }

    /// Runs the script file `name` of the script file system.
    pub fn run_file(&self, name: &str) -> Result<StringAnyMap> {
        let mut inner = self.inner.lock();
        if !inner.has_exec {
            inner.prepare()?;
        }
        inner.mark_executed();
        inner.machine.load_script(name)?;
        inner.machine.run()
    }

    /// Runs `script`, giving up with [`Error::Timeout`] after `timeout`.
    pub fn run_timeout(&self, script: &str, timeout: Duration) -> Result<StringAnyMap> {
        self.run_with_context(&Context::background().with_timeout(timeout), script)
    }

    /// Runs `script` until it finishes or `ctx` is done.
    pub fn run_with_context(&self, ctx: &Context, script: &str) -> Result<StringAnyMap> {
        let mut inner = self.inner.lock();
        inner.prepare_script(script)?;
        inner.mark_executed();
        inner.machine.run_with_context(ctx, StringAnyMap::new())
    }

    /// Starts an interactive session on the terminal.
    pub fn repl(&self) -> Result<()> {
        let mut terminal = Terminal::new()?;
        self.repl_with(&mut terminal)
    }

    /// Starts an interactive session reading from `reader`.
    pub fn repl_with(&self, reader: &mut dyn LineReader) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.prepare_script("")?;
        inner.mark_executed();
        inner.machine.repl(reader)
    }

    /// Runs `script`, then opens the REPL on its globals.
    pub fn run_inspect(&self, script: &str) -> Result<StringAnyMap> {
        self.run_inspect_if(script, |_| true)
    }

    /// Runs `script`, then opens the REPL if `cond` accepts the outcome.
    pub fn run_inspect_if<F>(&self, script: &str, cond: F) -> Result<StringAnyMap>
    where
        F: Fn(&Result<StringAnyMap>) -> bool,
    {
        let mut inner = self.inner.lock();
        inner.prepare_script(script)?;
        inner.mark_executed();
        let result = inner.machine.run();
        if cond(&result) {
            inspect(&mut inner.machine, None);
        }
        result
    }

    /// Like [`Starbox::run_inspect_if`], reading REPL input from `reader`.
    pub fn run_inspect_with<F>(
        &self,
        script: &str,
        reader: &mut dyn LineReader,
        cond: F,
    ) -> Result<StringAnyMap>
    where
        F: Fn(&Result<StringAnyMap>) -> bool,
    {
        let mut inner = self.inner.lock();
        inner.prepare_script(script)?;
        inner.mark_executed();
        let result = inner.machine.run();
        if cond(&result) {
            inspect(&mut inner.machine, Some(reader));
        }
        result
    }

    /// Calls a function defined by an earlier run.
    pub fn call_function(&self, name: &str, args: &[HostValue]) -> Result<HostValue> {
        self.inner.lock().machine.call(name, args)
    }

    /// Module names resolved by the first execution, sorted.
    pub fn module_names(&self) -> Vec<String> {
        self.inner.lock().module_names.clone()
    }

    pub fn exec_times(&self) -> u32 {
        self.inner.lock().exec_times
    }

    pub fn has_executed(&self) -> bool {
        self.inner.lock().has_exec
    }

    /// Replaces the machine with a fresh one and unfreezes the configuration.
    /// The configuration itself and the run count are kept.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.machine = Machine::new(&self.name);
        inner.has_exec = false;
    }

    /// A run configuration bound to this session.
    pub fn create_run_config(&self) -> RunConfig<'_> {
        RunConfig::new().starbox(self)
    }

    pub(crate) fn execute(&self, request: RunRequest<'_>) -> Result<StringAnyMap> {
        let mut inner = self.inner.lock();
        if !inner.has_exec {
            inner.prepare()?;
        }
        inner.mark_executed();
        let result = match request.script {
            Some(source) => {
                inner.machine.set_script(request.file_name, source);
                inner.machine.run_with_context(&request.context, request.extras)
            }
            None => inner
                .machine
                .load_script(request.file_name)
                .and_then(|()| inner.machine.run_with_context(&request.context, request.extras)),
        };
        if let Some(cond) = request.inspect {
            if cond(&result) {
                match request.repl_input {
                    Some(lines) => {
                        let mut reader = ScriptedLines::new(lines.iter().cloned());
                        inspect(&mut inner.machine, Some(&mut reader));
                    }
                    None => inspect(&mut inner.machine, None),
                }
            }
        }
        result
    }
}

/// One execution requested by a [`RunConfig`].
pub(crate) struct RunRequest<'r> {
    pub file_name: &'r str,
    pub script: Option<&'r str>,
    pub context: Context,
    pub extras: StringAnyMap,
    pub inspect: Option<&'r InspectCondFunc>,
    pub repl_input: Option<&'r [String]>,
}

fn inspect(machine: &mut Machine, reader: Option<&mut dyn LineReader>) {
    let outcome = match reader {
        Some(reader) => machine.repl(reader),
        None => Terminal::new()
            .map_err(Error::from)
            .and_then(|mut terminal| machine.repl(&mut terminal)),
    };
    if let Err(err) = outcome {
        log::warn!("inspection of {} failed: {}", machine.name(), err);
    }
}

impl fmt::Display for Starbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "🥡Box{{name:{},run:{}}}",
            self.name,
            self.inner.lock().exec_times
        )
    }
}

impl fmt::Debug for Starbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Starbox")
            .field("name", &self.name)
            .field("has_exec", &inner.has_exec)
            .field("exec_times", &inner.exec_times)
            .field("module_names", &inner.module_names)
            .finish()
    }
}
