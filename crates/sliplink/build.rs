//! Records the compilation target triple for `sliplink version --extended`.

fn main() {
    println!("cargo:rerun-if-env-changed=TARGET");
    let triple = std::env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=SLIPLINK_TARGET_TRIPLE={triple}");
}
