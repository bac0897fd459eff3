fn main() {
    built::write_built_file().expect("Failed to acquire build-time information");

    // Pass through CASTGATE_GIT_HASH from hermetic build environments without .git
    println!("cargo:rerun-if-env-changed=CASTGATE_GIT_HASH");
    if let Ok(hash) = std::env::var("CASTGATE_GIT_HASH") {
        println!("cargo:rustc-env=CASTGATE_GIT_HASH={}", hash);
    }
}
