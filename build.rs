//! Build script: places the default config.ini next to the built binary so a
//! freshly built player runs in portable mode with the shipped defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// `target/<profile>` from `target/<profile>/build/<pkg>/out`
fn profile_dir(out_dir: &Path) -> Option<PathBuf> {
    out_dir.ancestors().nth(3).map(Path::to_path_buf)
}

fn main() {
    println!("cargo:rerun-if-changed=config.ini");

    let Some(out_dir) = env::var_os("OUT_DIR").map(PathBuf::from) else {
        return;
    };
    let Some(target_dir) = profile_dir(&out_dir) else {
        return;
    };

    let source = Path::new("config.ini");
    if !source.exists() {
        return;
    }
    let dest = target_dir.join("config.ini");
    // Never clobber a config the user already edited in place
    if dest.exists() {
        return;
    }
    if let Err(e) = fs::copy(source, &dest) {
        println!("cargo:warning=could not copy config.ini to {}: {e}", dest.display());
    }
}
