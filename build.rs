// Compiles the GLSL sources in `shaders/` to SPIR-V with glslc.
//
// A missing compiler only produces a warning: the renderer reports a
// shader loading error at startup instead of failing the build.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

fn find_glslc() -> Option<String> {
    if let Ok(sdk) = env::var("VULKAN_SDK") {
        let glslc = if cfg!(target_os = "windows") {
            format!("{}\\Bin\\glslc.exe", sdk)
        } else {
            format!("{}/bin/glslc", sdk)
        };

        if Path::new(&glslc).exists() {
            return Some(glslc);
        }
    }

    // Fall back on whatever glslc is on the PATH.
    match Command::new("glslc").arg("--version").output() {
        Ok(output) if output.status.success() => Some("glslc".to_string()),
        _ => None,
    }
}

fn compile_shaders(shader_dir: &Path, target_dir: &Path, glslc: &str) {
    let entries = match std::fs::read_dir(shader_dir) {
        Ok(entries) => entries,
        Err(e) => {
            println!("cargo:warning=Cannot read shader directory {:?}: {}", shader_dir, e);
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let is_stage = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("vert") | Some("frag")
        );
        if !is_stage {
            continue;
        }

        // triangle.vert -> triangle.vert.spv
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let out_file = target_dir.join(format!("{}.spv", name));

        match Command::new(glslc).arg(&path).arg("-o").arg(&out_file).status() {
            Ok(status) if status.success() => {}
            Ok(status) => println!(
                "cargo:warning=glslc failed for {:?} with exit code {}",
                path,
                status.code().unwrap_or(-1)
            ),
            Err(e) => println!("cargo:warning=Failed to run glslc for {:?}: {}", path, e),
        }
    }
}

fn main() {
    println!("cargo:rerun-if-changed=shaders");
    println!("cargo:rerun-if-env-changed=VULKAN_SDK");
    println!("cargo:rerun-if-env-changed=SKIP_SHADERS");

    if env::var_os("SKIP_SHADERS").is_some() {
        return;
    }

    let Some(glslc) = find_glslc() else {
        println!("cargo:warning=glslc not found (set VULKAN_SDK), shaders were not compiled");
        return;
    };

    let root = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".into()));
    let target_dir = root.join("target").join("shaders");
    if let Err(e) = std::fs::create_dir_all(&target_dir) {
        println!("cargo:warning=Failed to create {:?}: {}", target_dir, e);
        return;
    }

    compile_shaders(&root.join("shaders"), &target_dir, &glslc);
}
