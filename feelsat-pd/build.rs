//! Build identification for feelsat-pd: `GIT_HASH`, `BUILD_TIMESTAMP` and
//! `BUILD_PROFILE` are exported to the crate as compile-time env vars.

use std::process::Command;

/// Short commit hash, suffixed with `-dirty` for uncommitted changes.
/// `FEELSAT_GIT_HASH` overrides it for builds outside a checkout.
fn git_hash() -> String {
    if let Ok(hash) = std::env::var("FEELSAT_GIT_HASH") {
        return hash;
    }

    let git = |args: &[&str]| {
        Command::new("git")
            .args(args)
            .output()
            .ok()
            .filter(|out| out.status.success())
            .and_then(|out| String::from_utf8(out.stdout).ok())
    };

    match git(&["rev-parse", "--short=8", "HEAD"]) {
        Some(hash) => {
            let dirty = git(&["status", "--porcelain", "--untracked-files=no"])
                .is_some_and(|status| !status.trim().is_empty());
            format!("{}{}", hash.trim(), if dirty { "-dirty" } else { "" })
        }
        None => "unknown".to_string(),
    }
}

fn main() {
    println!("cargo:rerun-if-env-changed=FEELSAT_GIT_HASH");
    println!("cargo:rerun-if-changed=../.git/HEAD");
    println!("cargo:rerun-if-changed=build.rs");

    let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".into());

    println!("cargo:rustc-env=GIT_HASH={}", git_hash());
    println!("cargo:rustc-env=BUILD_TIMESTAMP={timestamp}");
    println!("cargo:rustc-env=BUILD_PROFILE={profile}");
}
