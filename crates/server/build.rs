fn main() {
    // Version suffix: explicit override (container builds have no .git), else short HEAD hash
    let build_hash = std::env::var("GAPWATCH_BUILD_HASH")
        .ok()
        .filter(|h| !h.trim().is_empty())
        .or_else(git_short_hash)
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=GIT_HASH={}", build_hash.trim());

    println!("cargo:rerun-if-env-changed=GAPWATCH_BUILD_HASH");
    println!("cargo:rerun-if-changed=../../.git/HEAD");
    println!("cargo:rerun-if-changed=../../.git/refs/heads/");
}

fn git_short_hash() -> Option<String> {
    let output = std::process::Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())?;

    String::from_utf8(output.stdout)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
