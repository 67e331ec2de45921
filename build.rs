//! Build script for fwaudit
//!
//! Embeds build-time information (git commit, dirty status, build timestamp)
//! shown by `fwaudit --version`.

fn main() {
    shadow_rs::ShadowBuilder::builder()
        .build()
        .expect("Failed to generate build info");
}
