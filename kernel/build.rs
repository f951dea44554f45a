use std::{env, process::Command};

fn main() {
    let git_hash = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .unwrap_or_else(|| "0000000000000000000000000000000000000000".to_string());
    println!("cargo:rustc-env=GIT_HASH={}", git_hash.trim());

    let target = env::var("TARGET").expect("TARGET not set");
    if !target.contains("x86_64") {
        panic!("bxkernel only supports x86_64 targets");
    }
}
