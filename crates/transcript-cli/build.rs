use std::process::Command;

/// Embed the short commit hash for `--version`. Release builds outside a
/// checkout can pass it in through `TRANSCRIPT_GIT_HASH`.
fn main() {
    println!("cargo:rerun-if-env-changed=TRANSCRIPT_GIT_HASH");
    println!("cargo:rerun-if-changed=../../.git/HEAD");

    let hash = std::env::var("TRANSCRIPT_GIT_HASH")
        .ok()
        .filter(|h| !h.trim().is_empty())
        .or_else(git_short_hash)
        .unwrap_or_default();

    println!("cargo:rustc-env=GIT_HASH={}", hash.trim());
}

fn git_short_hash() -> Option<String> {
    Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
}
