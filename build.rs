// SPDX-License-Identifier: MPL-2.0

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");

    // Packaged builds inject the version; everything else derives it from git
    let version = std::env::var("WATERMARK_CAMERA_VERSION").unwrap_or_else(|_| git_version());
    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

fn git_version() -> String {
    let described = Command::new("git")
        .args(["describe", "--tags", "--always", "--match", "v*"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string());

    match described {
        Some(described) => {
            let version = described.strip_prefix('v').unwrap_or(&described);
            if version.contains('-') {
                // "0.2.0-5-gabcdef1": commits past the tag mark a dev build
                format!("{}-dev", version)
            } else {
                version.to_string()
            }
        }
        None => "unknown".to_string(),
    }
}
