use std::io::{self, Write};
use std::path::{Path, PathBuf};

use libtest_mimic::Arguments;
use walkdir::WalkDir;

struct Failure {
    name: String,
    message: String,
}

/// Runs `check` over every JSON fixture under `tests/fixtures/<dir>`,
/// honoring libtest's filter, skip, list and ignored flags.
pub fn run_fixtures(suite: &str, dir: &str, check: fn(&Path) -> Result<(), String>) {
    let args = Arguments::from_args();

    let fixtures_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(dir);
    if !fixtures_dir.exists() {
        println!("No tests/fixtures/{dir} directory found.");
        return;
    }

    let mut cases: Vec<(String, PathBuf)> = WalkDir::new(&fixtures_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|e| e.eq_ignore_ascii_case("json")))
        .map(|p| {
            let name = p.strip_prefix(&fixtures_dir).unwrap_or(&p).to_string_lossy().into_owned();
            (name, p)
        })
        .filter(|(name, _)| match &args.filter {
            None => true,
            Some(filter) if args.exact => name == filter,
            Some(filter) => name.contains(filter.as_str()),
        })
        .filter(|(name, _)| args.skip.iter().all(|skip| !name.contains(skip.as_str())))
        .collect();
    cases.sort();

    if args.ignored {
        cases.clear();
    }
    if args.list {
        for (name, _) in &cases {
            println!("{name}");
        }
        return;
    }

    println!("running {} tests", cases.len());
    let mut passed = 0u64;
    let mut failures = Vec::new();
    for (name, path) in cases {
        match check(&path) {
            Ok(()) => {
                println!("test {name} ... ok");
                passed += 1;
            }
            Err(message) => {
                println!("test {name} ... FAILED");
                failures.push(Failure {
                    name,
                    message: message.trim().to_owned(),
                });
            }
        }
        let _ = io::stdout().flush();
    }

    println!();
    if !failures.is_empty() {
        println!("failures:");
        for failure in &failures {
            println!("    {}", failure.name);
        }
        for failure in &failures {
            println!("\n---- {} ----", failure.name);
            if !failure.message.is_empty() {
                println!("{}", failure.message);
            }
            println!("\nrerun: cargo test --test {suite} -- --exact {:?}", failure.name);
        }
        println!();
    }

    if failures.is_empty() {
        println!("test result: ok. {passed} passed; 0 failed");
        return;
    }
    println!("test result: FAILED. {passed} passed; {} failed", failures.len());
    std::process::exit(101);
}
