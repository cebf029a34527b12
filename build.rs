//! Build script for wm-resource-monitor
//!
//! Records the compiler version so the status endpoint can report it.

use std::env;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-env-changed=RUSTC");

    let rustc = env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());

    let version = Command::new(&rustc)
        .arg("--version")
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    let version = match version {
        Some(v) => v,
        None => {
            println!("cargo:warning=Could not determine rustc version");
            "unknown".to_string()
        }
    };

    println!("cargo:rustc-env=WM_MONITOR_RUSTC_VERSION={}", version);
}
