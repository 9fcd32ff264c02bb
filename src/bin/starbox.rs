//! CLI wrapper for the starbox scripting host.
//!
//! Usage:
//!   starbox [options] <file.star>    # Execute a script file
//!   starbox [options] -e "code"      # Evaluate Starlark code
//!   starbox [options]                # Start REPL (interactive mode)
//!
//! Options:
//!   -m, --modules <set>     Module set: none, safe, network or full (default: full)
//!   -n, --name <module>     Add a built-in module by name; repeatable

use std::env;
use std::path::Path;
use std::process;

use starbox::{DirFs, ModuleSetName, Starbox, StringAnyMap};

#[derive(Default)]
struct Options {
    module_set: Option<String>,
    named: Vec<String>,
    code: Option<String>,
    file: Option<String>,
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            print_usage();
            process::exit(1);
        }
    };

    let b = Starbox::new("cli");
    b.set_module_set(
        options
            .module_set
            .as_deref()
            .map_or(ModuleSetName::FULL, ModuleSetName::from),
    );
    if !options.named.is_empty() {
        b.add_named_modules(options.named.iter().cloned());
    }

    match (&options.code, &options.file) {
        (Some(code), _) => report(b.run(code)),
        (None, Some(file)) => run_file(&b, file),
        (None, None) => run_repl(&b),
    }
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut options = Options::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_usage();
                process::exit(0);
            }
            "-m" | "--modules" => {
                let set = iter.next().ok_or("missing module set after -m")?;
                options.module_set = Some(set.clone());
            }
            "-n" | "--name" => {
                let name = iter.next().ok_or("missing module name after -n")?;
                options.named.push(name.clone());
            }
            "-e" | "--eval" => {
                let code = iter.next().ok_or("missing code after -e")?;
                options.code = Some(code.clone());
            }
            flag if flag.starts_with('-') => return Err(format!("unknown option '{}'", flag)),
            file => {
                if options.file.is_some() {
                    return Err(format!("unexpected argument '{}'", file));
                }
                options.file = Some(file.to_owned());
            }
        }
    }
    Ok(options)
}

fn print_usage() {
    eprintln!("starbox - Starlark scripting host");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  starbox [options] <file.star>    Execute a script file");
    eprintln!("  starbox [options] -e \"code\"      Evaluate Starlark code");
    eprintln!("  starbox [options]                Start REPL (interactive mode)");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -m, --modules <set>    Module set: none, safe, network, full");
    eprintln!("  -n, --name <module>    Add a built-in module by name (repeatable)");
}

fn run_file(b: &Starbox, file: &str) {
    let path = Path::new(file);
    let (dir, name) = match (path.parent(), path.file_name()) {
        (Some(dir), Some(name)) => (dir, name.to_string_lossy().into_owned()),
        _ => {
            eprintln!("Error: invalid script path '{}'", file);
            process::exit(1);
        }
    };
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };
    b.set_fs(DirFs::new(dir));
    report(b.run_file(&name));
}

fn report(result: starbox::Result<StringAnyMap>) {
    match result {
        Ok(output) => {
            if !output.is_empty() {
                match serde_json::to_string_pretty(&output) {
                    Ok(text) => println!("{}", text),
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn run_repl(b: &Starbox) {
    println!("starbox v{} - Starlark scripting host", env!("CARGO_PKG_VERSION"));
    println!("Type Starlark code and press Enter. Press Ctrl-D to quit.");
    println!();

    if let Err(e) = b.repl() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    println!("Goodbye!");
}
