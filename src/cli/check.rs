use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::Command;

use anyhow::{bail, Result};

use super::TargetArgs;

fn check_tool(name: &Path) -> bool {
    // EXPLICIT PATHS ARE CHECKED DIRECTLY, BARE NAMES GO THROUGH PATH
    if name.components().count() > 1 {
        return is_executable(name);
    }
    Command::new("which")
        .arg(name)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

fn check_output_dir(output: &Path) -> bool {
    let dir = match output.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    std::fs::metadata(dir)
        .map(|m| m.is_dir() && !m.permissions().readonly())
        .unwrap_or(false)
}

pub fn run_check(args: &TargetArgs) -> Result<()> {
    println!("LOADSWEEP DEPENDENCY CHECK");
    println!();

    let mut ok = true;

    let tool = args.tool.display().to_string();
    if check_tool(&args.tool) {
        println!("  {:<24}OK", tool);
    } else {
        println!("  {:<24}MISSING", tool);
        ok = false;
    }

    let server = args.server.display().to_string();
    if is_executable(&args.server) {
        println!("  {:<24}OK", server);
    } else {
        println!("  {:<24}MISSING OR NOT EXECUTABLE", server);
        ok = false;
    }

    let output = args.output.display().to_string();
    if check_output_dir(&args.output) {
        println!("  {:<24}WRITABLE", output);
    } else {
        println!("  {:<24}DIRECTORY NOT WRITABLE", output);
        ok = false;
    }
    println!();

    if !ok {
        println!("SOME CHECKS FAILED");
        if !check_tool(&args.tool) {
            println!("  Install ApacheBench: apt install apache2-utils / pacman -S apache");
        }
        bail!("dependency check failed");
    }

    println!("ALL CHECKS PASSED");
    Ok(())
}
