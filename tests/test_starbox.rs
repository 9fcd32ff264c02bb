//! Tests for the session lifecycle: configuration, repeated runs, reset,
//! module scripts, timeouts and calls into script functions.

extern crate starbox;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::{json, Value};
use starbox::{
    Context, Error, Memory, MemoryFs, ModuleLoader, ModuleSetName, ScriptedLines, Starbox,
    StringAnyMap,
};
use starlark::environment::GlobalsBuilder;
use starlark::starlark_module;

fn values(v: Value) -> StringAnyMap {
    v.as_object().cloned().expect("object literal")
}

/// A session whose printed lines are collected.
fn capturing_box(name: &str) -> (Starbox, Arc<Mutex<Vec<String>>>) {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = lines.clone();
    let b = Starbox::new(name);
    b.set_print_func(move |msg| sink.lock().push(msg.to_owned()));
    (b, lines)
}

#[starlark_module]
fn calc_members(builder: &mut GlobalsBuilder) {
    fn triple(n: i32) -> anyhow::Result<i32> {
        Ok(n * 3)
    }
}

// ============================================================================
// Runs
// ============================================================================

#[test]
fn test_run_returns_script_globals() {
    let (b, _) = capturing_box("test");
    let out = b.run("a = 1\nb = 'two'\nc = [1, 2.5, None]\nd = {'k': True}\n_hidden = 1").unwrap();
    assert_eq!(out["a"], json!(1));
    assert_eq!(out["b"], json!("two"));
    assert_eq!(out["c"], json!([1, 2.5, null]));
    assert_eq!(out["d"], json!({"k": true}));
    assert!(!out.contains_key("_hidden"));
}

#[test]
fn test_output_sorted_by_name() {
    let (b, _) = capturing_box("test");
    let out = b.run("zeta = 1\nalpha = 2\nmid = 3").unwrap();
    let keys: Vec<&str> = out.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["alpha", "mid", "zeta"]);
}

#[test]
fn test_run_twice_keeps_globals() {
    let (b, _) = capturing_box("test");
    let first = b.run("a = 10").unwrap();
    assert_eq!(first["a"], json!(10));

    let second = b.run("b = a << 2").unwrap();
    assert_eq!(second["b"], json!(40));
    assert_eq!(second["a"], json!(10));
    assert_eq!(b.exec_times(), 2);
}

#[test]
fn test_host_values_are_not_output() {
    let (b, _) = capturing_box("test");
    b.add_key_value("word", "star");
    b.add_key_values(values(json!({"n": 2, "word": "box"})));
    let out = b.run("r = word * n").unwrap();
    assert_eq!(out["r"], json!("boxbox"));
    assert!(!out.contains_key("word"));
    assert!(!out.contains_key("n"));
}

#[test]
fn test_print_func_receives_output() {
    let (b, lines) = capturing_box("test");
    b.run("print('Aloha', 1 + 2)").unwrap();
    assert_eq!(*lines.lock(), vec!["Aloha 3".to_owned()]);
}

#[test]
fn test_eval_error_keeps_partial_output() {
    let (b, _) = capturing_box("test");
    let err = b.run("a = 1\nfail('boom')\nb = 2").unwrap_err();
    assert!(err.to_string().contains("boom"));
    let output = err.output().expect("partial output");
    assert_eq!(output["a"], json!(1));
    assert!(!output.contains_key("b"));
}

#[test]
fn test_syntax_error() {
    let (b, _) = capturing_box("test");
    let err = b.run("print('Aloha!'").unwrap_err();
    assert!(matches!(err, Error::Eval { .. }));
    assert!(b.has_executed());
}

#[test]
fn test_f_strings() {
    let (b, _) = capturing_box("test");
    b.add_key_value("name", "box");
    let out = b.run("s = f'hello {name}'").unwrap();
    assert_eq!(out["s"], json!("hello box"));
}

// ============================================================================
// Freezing and reset
// ============================================================================

#[test]
fn test_configure_before_run() {
    let (b, _) = capturing_box("test");
    b.set_module_set(ModuleSetName::SAFE);
    b.add_key_value("a", 1);
    b.add_named_modules(["runtime"]);
    assert!(!b.has_executed());
    b.run("x = a").unwrap();
    assert!(b.has_executed());
}

#[test]
#[should_panic(expected = "cannot add key-value pair after execution")]
fn test_add_key_value_after_run_panics() {
    let (b, _) = capturing_box("test");
    b.run("a = 1").unwrap();
    b.add_key_value("b", 2);
}

#[test]
#[should_panic(expected = "cannot set module set after execution")]
fn test_set_module_set_after_run_panics() {
    let (b, _) = capturing_box("test");
    b.run("a = 1").unwrap();
    b.set_module_set(ModuleSetName::FULL);
}

#[test]
#[should_panic(expected = "cannot add module script after execution")]
fn test_add_module_script_after_repl_panics() {
    let (b, _) = capturing_box("test");
    b.repl_with(&mut ScriptedLines::new(["a = 1"])).unwrap();
    b.add_module_script("lib", "x = 1");
}

#[test]
#[should_panic(expected = "cannot add module loader after execution")]
fn test_add_module_loader_after_run_panics() {
    let (b, _) = capturing_box("test");
    b.run("a = 1").unwrap();
    b.add_module_loader("late", ModuleLoader::from_values(StringAnyMap::new()));
}

#[test]
#[should_panic(expected = "cannot add named modules after execution")]
fn test_add_named_modules_after_run_panics() {
    let (b, _) = capturing_box("test");
    b.run("a = 1").unwrap();
    b.add_named_modules(["base64"]);
}

#[test]
#[should_panic(expected = "cannot set dynamic module loader after execution")]
fn test_set_dynamic_module_loader_after_run_panics() {
    let (b, _) = capturing_box("test");
    b.run("a = 1").unwrap();
    b.set_dynamic_module_loader(|_| Ok(None));
}

#[test]
#[should_panic(expected = "cannot attach memory after execution")]
fn test_attach_memory_after_run_panics() {
    let (b, _) = capturing_box("test");
    b.run("a = 1").unwrap();
    b.attach_memory("share", &Memory::new());
}

#[test]
#[should_panic(expected = "cannot attach memory after execution")]
fn test_create_memory_after_run_panics() {
    let (b, _) = capturing_box("test");
    b.run("a = 1").unwrap();
    b.create_memory("share");
}

#[test]
fn test_script_rebinding_of_host_value_sticks() {
    let (b, _) = capturing_box("test");
    b.add_key_value("word", "star");
    let out = b.run("word = word.upper()").unwrap();
    assert_eq!(out["word"], json!("STAR"));

    let out = b.run("w = word").unwrap();
    assert_eq!(out["w"], json!("STAR"));
}

#[test]
fn test_reset_discards_globals_and_unfreezes() {
    let (b, _) = capturing_box("test");
    b.run("a = 10").unwrap();
    b.reset();
    assert!(!b.has_executed());

    let err = b.run("b = a").unwrap_err();
    assert!(matches!(err, Error::Eval { .. }));

    b.reset();
    b.add_key_value("a", 5);
    let out = b.run("b = a").unwrap();
    assert_eq!(out["b"], json!(5));
    assert_eq!(b.exec_times(), 3);
}

#[test]
fn test_display() {
    let (b, _) = capturing_box("aloha");
    b.run("a = 1").unwrap();
    b.run("b = 2").unwrap();
    assert_eq!(b.to_string(), "🥡Box{name:aloha,run:2}");
}

// ============================================================================
// Builtins and module functions
// ============================================================================

#[test]
fn test_host_builtins() {
    let (b, _) = capturing_box("test");
    b.add_builtins(calc_members);
    let out = b.run("r = triple(14)").unwrap();
    assert_eq!(out["r"], json!(42));
}

#[test]
fn test_module_functions() {
    let (b, _) = capturing_box("test");
    b.set_module_set(ModuleSetName::EMPTY);
    b.add_module_functions("calc", calc_members);
    let out = b.run("load('calc', 'triple')\nr = calc.triple(2) + triple(1)").unwrap();
    assert_eq!(out["r"], json!(9));
    assert_eq!(b.module_names(), vec!["calc"]);
}

#[test]
fn test_module_data() {
    let (b, _) = capturing_box("test");
    b.add_module_data("conf", values(json!({"shift": 2, "tags": ["a", "b"]})));
    let out = b.run("r = 1 << conf.shift\nt = conf.tags").unwrap();
    assert_eq!(out["r"], json!(4));
    assert_eq!(out["t"], json!(["a", "b"]));
}

// ============================================================================
// Module scripts and file systems
// ============================================================================

#[test]
fn test_module_script() {
    let (b, _) = capturing_box("test");
    b.set_module_set(ModuleSetName::EMPTY);
    b.add_module_script("lib", "def double(x):\n    return x * 2\n");
    let out = b
        .run("load('lib', 'double')\nload('lib.star', d2 = 'double')\nr = double(21) + d2(1)")
        .unwrap();
    assert_eq!(out["r"], json!(44));
    assert_eq!(b.module_names(), vec!["lib.star"]);
}

#[test]
fn test_module_script_sees_builtin_modules() {
    let (b, _) = capturing_box("test");
    b.set_module_set(ModuleSetName::EMPTY);
    b.add_module_script("util", "load('base64', 'encode')\ndef wrap(s):\n    return encode(s)\n");
    b.add_named_modules(["base64"]);
    let out = b.run("load('util', 'wrap')\nr = wrap('hi')").unwrap();
    assert_eq!(out["r"], json!("aGk="));
}

#[test]
fn test_fs_overrides_module_scripts() {
    let (b, _) = capturing_box("test");
    b.set_module_set(ModuleSetName::EMPTY);
    b.add_module_script("lib", "v = 'script'");
    let mut fs = MemoryFs::new();
    fs.insert("lib.star", "v = 'fs'");
    b.set_fs(fs);

    let out = b.run("load('lib', 'v')\nr = v").unwrap();
    assert_eq!(out["r"], json!("fs"));
    assert!(b.module_names().is_empty());
}

#[test]
fn test_cyclic_load_fails() {
    let (b, _) = capturing_box("test");
    b.add_module_script("a", "load('b', 'y')\nx = 1");
    b.add_module_script("b", "load('a', 'x')\ny = 1");
    let err = b.run("load('a', 'x')").unwrap_err();
    assert!(err.to_string().contains("cyclic"), "{}", err);
}

#[test]
fn test_run_file() {
    let (b, lines) = capturing_box("test");
    let mut fs = MemoryFs::new();
    fs.insert("main.star", "a = 10\nb = 20\nprint('Aloha', a + b)");
    b.set_fs(fs);

    let out = b.run_file("main.star").unwrap();
    assert_eq!(out["a"], json!(10));
    assert_eq!(out["b"], json!(20));
    assert_eq!(*lines.lock(), vec!["Aloha 30".to_owned()]);

    let out = b.run_file("main").unwrap();
    assert_eq!(out["b"], json!(20));
}

#[test]
fn test_run_missing_file() {
    let (b, _) = capturing_box("test");
    b.set_fs(MemoryFs::new());
    assert!(matches!(b.run_file("missing.star"), Err(Error::Io(_))));

    let (bare, _) = capturing_box("bare");
    assert!(matches!(bare.run_file("main.star"), Err(Error::NoScript)));
}

// ============================================================================
// Timeouts and cancellation
// ============================================================================

#[test]
fn test_run_timeout() {
    let (b, _) = capturing_box("test");
    b.set_module_set(ModuleSetName::SAFE);
    let started = Instant::now();
    let err = b.run_timeout("sleep(2)", Duration::from_millis(50)).unwrap_err();
    assert!(matches!(err, Error::Timeout), "{}", err);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_run_timeout_finishes_in_time() {
    let (b, _) = capturing_box("test");
    let out = b.run_timeout("a = 1 + 1", Duration::from_secs(5)).unwrap();
    assert_eq!(out["a"], json!(2));

    let out = b.run("b = a * 2").unwrap();
    assert_eq!(out["b"], json!(4));
}

#[test]
fn test_run_with_cancelled_context() {
    let (b, _) = capturing_box("test");
    b.set_module_set(ModuleSetName::SAFE);
    let ctx = Context::background().with_cancel();
    let cancel = ctx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        cancel.cancel();
    });
    let err = b.run_with_context(&ctx, "time.sleep(2)").unwrap_err();
    assert!(matches!(err, Error::Cancelled), "{}", err);
}

// ============================================================================
// REPL, inspection and calls
// ============================================================================

#[test]
fn test_repl_with_lines() {
    let (b, lines) = capturing_box("test");
    let mut reader = ScriptedLines::new(["x = 5", "def f(n):", "    return n * x", "", "f(2)"]);
    b.repl_with(&mut reader).unwrap();
    assert_eq!(*lines.lock(), vec!["10".to_owned()]);

    let out = b.run("y = x + 1").unwrap();
    assert_eq!(out["y"], json!(6));
}

#[test]
fn test_repl_reports_errors_and_continues() {
    let (b, lines) = capturing_box("test");
    let mut reader = ScriptedLines::new(["undefined_name", "print('still here')"]);
    b.repl_with(&mut reader).unwrap();
    let lines = lines.lock();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("error:"));
    assert_eq!(lines[1], "still here");
}

#[test]
fn test_run_inspect_with_condition() {
    let (b, lines) = capturing_box("test");
    let mut reader = ScriptedLines::new(["print(a * 2)"]);
    let out = b
        .run_inspect_with("a = 100", &mut reader, |result| result.is_ok())
        .unwrap();
    assert_eq!(out["a"], json!(100));
    assert_eq!(*lines.lock(), vec!["200".to_owned()]);

    let mut unused = ScriptedLines::new(["print('never')"]);
    b.run_inspect_with("b = 1", &mut unused, |result| result.is_err())
        .unwrap();
    assert_eq!(lines.lock().len(), 1);
}

#[test]
fn test_call_function() {
    let (b, _) = capturing_box("test");
    b.run("def add(a, b):\n    return a + b\ndef greet(name):\n    return 'hi ' + name").unwrap();
    assert_eq!(b.call_function("add", &[json!(1), json!(2)]).unwrap(), json!(3));
    assert_eq!(
        b.call_function("greet", &[json!("box")]).unwrap(),
        json!("hi box")
    );
    assert!(matches!(
        b.call_function("missing", &[]),
        Err(Error::FunctionNotFound(ref name)) if name == "missing"
    ));
}

#[test]
fn test_call_function_before_run() {
    let (b, _) = capturing_box("test");
    assert!(matches!(b.call_function("add", &[]), Err(Error::NotExecuted)));
}

#[test]
fn test_session_shared_across_threads() {
    let (b, _) = capturing_box("shared");
    let b = Arc::new(b);
    b.run("n = 1").unwrap();
    let workers: Vec<_> = (0..4)
        .map(|i| {
            let b = b.clone();
            thread::spawn(move || b.run(&format!("w{} = n + {}", i, i)).unwrap())
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(b.exec_times(), 5);
    let out = b.run("").unwrap();
    for i in 0..4 {
        assert_eq!(out[&format!("w{}", i)], json!(1 + i));
    }
}

// ============================================================================
// Collective memory
// ============================================================================

#[test]
fn test_memory_shared_between_sessions() {
    let (b1, _) = capturing_box("test1");
    let memory = b1.create_memory("share");
    let out = b1.run("a = 10\nb = 20\nc = a * b\nshare['v'] = c").unwrap();
    assert_eq!(out["c"], json!(200));
    assert!(!out.contains_key("share"));
    assert_eq!(memory.get("v"), Some(json!(200)));

    let (b2, _) = capturing_box("test2");
    b2.attach_memory("history", &memory);
    let out = b2
        .run("d = history['v']\ne = d << 2\nhistory['v'] = e + 1\nhistory['w'] = 'Aloha!'")
        .unwrap();
    assert_eq!(out["d"], json!(200));
    assert_eq!(out["e"], json!(800));
    assert_eq!(memory.get("v"), Some(json!(801)));
    assert_eq!(memory.get("w"), Some(json!("Aloha!")));

    let out = b1.run("seen = share['w']\nsize = len(share)").unwrap();
    assert_eq!(out["seen"], json!("Aloha!"));
    assert_eq!(out["size"], json!(2));
}

#[test]
fn test_memory_written_by_host_between_runs() {
    let (b, _) = capturing_box("test");
    let memory = b.create_memory("mem");
    memory.set("count", 1);
    b.run("mem['count'] = mem['count'] + 1").unwrap();
    memory.set("count", 10);
    let out = b.run("now = mem['count']\nhas = 'count' in mem").unwrap();
    assert_eq!(out["now"], json!(10));
    assert_eq!(out["has"], json!(true));
}

#[test]
fn test_key_value_replaces_attached_memory() {
    let (b, _) = capturing_box("test");
    b.create_memory("slot");
    b.add_key_value("slot", 3);
    let out = b.run("x = slot + 1").unwrap();
    assert_eq!(out["x"], json!(4));
}
