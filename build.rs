use std::{env::var, path::PathBuf, process::Command, vec::Vec};

use jwalk::WalkDir;
use which::which;


const TARGETS_ENV: &str = "SFXARC_TARGETS";
const FILES_ENV: &str = "SFXARC_FILES";
const NO_CROSS_ENV: &str = "SFXARC_NO_CROSS";
const STUB_NAME: &str = "sfxstub";
const SHARED_NAME: &str = "sfxformat";


fn get_stub_targets() -> Vec<String> {
    let rustc = var("RUSTC").unwrap();
    let native_target = var("TARGET").unwrap();
    let mut active_targets = Vec::from([native_target]);
    let requested_targets = var(TARGETS_ENV);
    if let Ok(requested_targets) = requested_targets {
        let requested_targets = requested_targets
            .split(';')
            .filter(|target| !target.is_empty())
            .collect::<Vec<&str>>();
        let available_targets = Command::new(rustc)
            .arg("--print")
            .arg("target-list")
            .output()
            .expect("couldn't get available build target triples");
        let available_targets = String::from_utf8(available_targets.stdout)
            .expect("couldn't get available build target triples, output invalid");
        let available_targets = available_targets.lines().collect::<Vec<&str>>();
        for target in requested_targets {
            if active_targets.contains(&target.to_string()) {
                continue;
            }
            if !available_targets.contains(&target) {
                let matches = available_targets
                    .iter()
                    .filter(|t| t.contains(target))
                    .collect::<Vec<_>>();
                if matches.len() == 1 {
                    active_targets.push(matches[0].to_string());
                } else {
                    eprintln!("couldn't build stub for target {}, target does not exist", target);
                    std::process::exit(1);
                }
            } else {
                active_targets.push(target.to_string());
            }
        }
    }
    // the native target stays first, it is the default stub
    active_targets[1..].sort();
    active_targets.dedup();
    active_targets
}

fn compile_stub(target: &str, out_dir: &str) -> bool {
    let profile = var("PROFILE").unwrap();
    let native_target = var("TARGET").unwrap();
    let cargo = PathBuf::from(var("CARGO").unwrap()).canonicalize().unwrap();
    let no_cross = var(NO_CROSS_ENV) == Ok("true".into()) || var(NO_CROSS_ENV) == Ok("1".into());
    let mut command = if target == native_target || no_cross {
        Command::new(cargo)
    } else {
        Command::new(which("cross").unwrap_or(cargo))
    };
    command
        .current_dir(STUB_NAME)
        .arg("build")
        .arg("--target")
        .arg(target)
        .arg("--target-dir")
        .arg(out_dir);
    if profile == "release" {
        command.arg("--release");
    }
    let status = command
        .status()
        .unwrap_or_else(|e| panic!("couldn't compile stub for target {}: {}", target, e));
    status.success()
}

fn get_git_hash() -> Option<String> {
    which("git").ok().and_then(|git| {
        Command::new(git)
            .args(["rev-parse", "--short", "HEAD"])
            .output()
            .ok()
            .filter(|output| output.status.success())
            .and_then(|output| {
                String::from_utf8(output.stdout)
                    .map(|output| output.trim().into())
                    .ok()
            })
    })
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_EMBEDDED_STUB");
    if let Some(hash) = get_git_hash() {
        println!("cargo:rustc-env=GIT_HASH={}", hash);
    }
    println!("cargo:rerun-if-changed=.git/HEAD");

    // stubs are only built and embedded on request
    if var("CARGO_FEATURE_EMBEDDED_STUB").is_err() {
        return;
    }

    println!("cargo:rerun-if-env-changed=OUT_DIR");
    println!("cargo:rerun-if-env-changed=PROFILE");
    println!("cargo:rerun-if-env-changed=TARGET");
    println!("cargo:rerun-if-env-changed={}", TARGETS_ENV);
    println!("cargo:rerun-if-env-changed={}", NO_CROSS_ENV);
    for entry in WalkDir::new(STUB_NAME)
        .into_iter()
        .chain(WalkDir::new(SHARED_NAME))
        .filter_map(|e| e.ok())
    {
        println!("cargo:rerun-if-changed={}", entry.path().display());
    }
    let out_dir = var("OUT_DIR").unwrap();
    let active_targets = get_stub_targets();
    for target in &active_targets {
        let status = compile_stub(target, &out_dir);
        if !status {
            eprintln!("couldn't build stub for target {}, build failed", target);
            std::process::exit(1);
        }
    }
    let profile = var("PROFILE").unwrap();
    let files = active_targets
        .iter()
        .map(|target| {
            format!(
                "{}/{}/{}/{}{}",
                out_dir,
                target,
                profile,
                STUB_NAME,
                if target.contains("windows") {
                    ".exe"
                } else {
                    ""
                }
            )
        })
        .collect::<Vec<_>>()
        .join(";");
    let targets = active_targets.join(";");
    println!("cargo:rustc-env={}={}", TARGETS_ENV, targets);
    println!("cargo:rustc-env={}={}", FILES_ENV, files);
}
