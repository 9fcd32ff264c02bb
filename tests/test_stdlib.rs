//! Tests for the built-in module library.
//!
//! Each test runs a short script in a session with the full module set and
//! checks the globals it leaves behind.

extern crate starbox;

use serde_json::{json, Value};
use starbox::engine::stdlib;
use starbox::{ModuleSetName, Starbox, StringAnyMap};

fn run_full(script: &str) -> StringAnyMap {
    let b = Starbox::new("stdlib");
    b.set_module_set(ModuleSetName::FULL);
    b.set_print_func(|_| {});
    b.run(script)
        .unwrap_or_else(|e| panic!("script failed: {}\n{}", e, script))
}

fn run_fails(script: &str) -> bool {
    let b = Starbox::new("stdlib");
    b.set_module_set(ModuleSetName::FULL);
    b.set_print_func(|_| {});
    b.run(script).is_err()
}

fn quoted(path: &std::path::Path) -> String {
    serde_json::to_string(&path.to_string_lossy()).expect("path as string literal")
}

// ============================================================================
// Library enumeration
// ============================================================================

#[test]
fn test_builtin_module_names() {
    let names = stdlib::builtin_module_names();
    assert_eq!(
        names,
        vec![
            "base64", "file", "hashlib", "http", "idiomatic", "json", "log", "math", "path",
            "random", "re", "runtime", "string", "time",
        ]
    );
}

#[test]
fn test_every_builtin_materializes() {
    for name in stdlib::builtin_module_names() {
        let loader = stdlib::builtin_loader(&name).expect("known builtin");
        assert!(loader.load().is_ok(), "{} failed to load", name);
    }
    assert!(stdlib::builtin_loader("nope").is_none());
}

// ============================================================================
// Modules
// ============================================================================

#[test]
fn test_base64() {
    let out = run_full(
        "a = base64.encode('hello?')\nb = base64.decode(a)\nc = base64.encode('hello?', 'url_raw')",
    );
    assert_eq!(out["a"], json!("aGVsbG8/"));
    assert_eq!(out["b"], json!("hello?"));
    assert_eq!(out["c"], json!("aGVsbG8_"));
    assert!(run_fails("x = base64.encode('a', 'morse')"));
}

#[test]
fn test_hashlib() {
    let out = run_full("h = hashlib.sha256('abc')\nl = len(hashlib.sha512(''))");
    assert_eq!(
        out["h"],
        json!("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
    );
    assert_eq!(out["l"], json!(128));
}

#[test]
fn test_idiomatic() {
    let out = run_full(
        "b = bin(5)\no = oct(8)\nh = hex(-255)\nl = length('héllo')\nk = length([1, 2])\nn = is_nil(None)",
    );
    assert_eq!(out["b"], json!("0b101"));
    assert_eq!(out["o"], json!("0o10"));
    assert_eq!(out["h"], json!("-0xff"));
    assert_eq!(out["l"], json!(5));
    assert_eq!(out["k"], json!(2));
    assert_eq!(out["n"], json!(true));
}

#[test]
fn test_json() {
    let out = run_full("s = json.encode({'a': [1, 2]})\nd = json.decode('{\"k\": true}')");
    assert_eq!(out["s"], json!("{\"a\":[1,2]}"));
    assert_eq!(out["d"], json!({"k": true}));
}

#[test]
fn test_log_returns_none() {
    let out = run_full("r = [log.debug('d'), log.info(1), log.warn('w'), log.error('e')]");
    assert_eq!(out["r"], json!([null, null, null, null]));
}

#[test]
fn test_math() {
    let out = run_full(
        "f = math.floor(2.7)\nc = math.ceil(2.1)\nr = math.round(2.5)\ns = math.sqrt(9)\n\
         p = math.pow(2, 10)\nl = math.log(8, 2)\nbig = math.pi > 3.14",
    );
    assert_eq!(out["f"], json!(2));
    assert_eq!(out["c"], json!(3));
    assert_eq!(out["r"], json!(3));
    assert_eq!(out["s"], json!(3.0));
    assert_eq!(out["p"], json!(1024.0));
    assert!((out["l"].as_f64().unwrap() - 3.0).abs() < 1e-9);
    assert_eq!(out["big"], json!(true));
    assert!(run_fails("x = math.sqrt(-1)"));
}

#[test]
fn test_re() {
    let out = run_full(
        "m = re.matches('^a+$', 'aaa')\nf = re.findall('[0-9]+', 'a1b22c333')\n\
         s = re.sub('(\\\\w+)@', '$1 at ', 'me@x')\nn = re.search('z', 'abc')\np = re.split(',\\\\s*', 'a, b,c')",
    );
    assert_eq!(out["m"], json!(true));
    assert_eq!(out["f"], json!(["1", "22", "333"]));
    assert_eq!(out["s"], json!("me at x"));
    assert_eq!(out["n"], Value::Null);
    assert_eq!(out["p"], json!(["a", "b", "c"]));
}

#[test]
fn test_string() {
    let out = run_full(
        "r = string.reverse('abc')\ne = string.escape('<b>')\nl = string.length('日本')\n\
         q = string.quote('a\"b')\nu = string.unquote(q)",
    );
    assert_eq!(out["r"], json!("cba"));
    assert_eq!(out["e"], json!("&lt;b&gt;"));
    assert_eq!(out["l"], json!(2));
    assert_eq!(out["q"], json!("\"a\\\"b\""));
    assert_eq!(out["u"], json!("a\"b"));
}

#[test]
fn test_time() {
    let out = run_full(
        "f = time.format(0)\np = time.parse('1970-01-02T00:00:00Z')\n\
         g = time.format(90061, '%d %H:%M:%S')\nok = time.unix() > 1600000000",
    );
    assert_eq!(out["f"], json!("1970-01-01T00:00:00.000Z"));
    assert_eq!(out["p"], json!(86400.0));
    assert_eq!(out["g"], json!("02 01:01:01"));
    assert_eq!(out["ok"], json!(true));
}

#[test]
fn test_random() {
    let out = run_full(
        "i = random.randint(1, 3)\nf = random.random()\nc = random.choice(['x', 'y'])\n\
         s = random.randstr('ab', 8)\nu = random.uuid()",
    );
    let i = out["i"].as_i64().unwrap();
    assert!((1..=3).contains(&i));
    let f = out["f"].as_f64().unwrap();
    assert!((0.0..1.0).contains(&f));
    assert!(["x", "y"].contains(&out["c"].as_str().unwrap()));
    let s = out["s"].as_str().unwrap();
    assert_eq!(s.len(), 8);
    assert!(s.chars().all(|c| c == 'a' || c == 'b'));
    assert_eq!(out["u"].as_str().unwrap().len(), 36);
    assert!(run_fails("x = random.choice([])"));
    assert!(run_fails("x = random.randint(3, 1)"));
}

#[test]
fn test_runtime() {
    let out = run_full("o = runtime.os()\np = runtime.pid\nd = runtime.getenv('STARBOX_SURELY_UNSET', 'dflt')");
    assert_eq!(out["o"], json!(std::env::consts::OS));
    assert_eq!(out["p"], json!(std::process::id()));
    assert_eq!(out["d"], json!("dflt"));
}

#[test]
fn test_file_and_path() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("notes.txt");
    let copy = dir.path().join("copy.txt");
    let script = format!(
        "file.write_string({t}, 'one\\ntwo\\n')\nfile.append_string({t}, 'three\\n')\n\
         n = file.count_lines({t})\nh = file.head_lines({t}, 1)\nz = file.tail_lines({t}, 2)\n\
         file.copyfile({t}, {c})\nr = file.read_string({c})\n\
         b = path.basename({t})\nx = path.ext({t})\ne = path.exists({t})\nd = path.is_dir({d})\n\
         l = path.listdir({d})\nj = path.join('a', 'b.txt')",
        t = quoted(&target),
        c = quoted(&copy),
        d = quoted(dir.path()),
    );
    let out = run_full(&script);
    assert_eq!(out["n"], json!(3));
    assert_eq!(out["h"], json!(["one"]));
    assert_eq!(out["z"], json!(["two", "three"]));
    assert_eq!(out["r"], json!("one\ntwo\nthree\n"));
    assert_eq!(out["b"], json!("notes.txt"));
    assert_eq!(out["x"], json!("txt"));
    assert_eq!(out["e"], json!(true));
    assert_eq!(out["d"], json!(true));
    assert_eq!(out["l"], json!(["copy.txt", "notes.txt"]));
    assert_eq!(out["j"], json!("a/b.txt"));
}

#[test]
fn test_file_missing() {
    assert!(run_fails("x = file.read_string('/definitely/not/here.txt')"));
}
