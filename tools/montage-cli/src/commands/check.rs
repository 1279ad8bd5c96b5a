//! Check for the external media tools.

use montage_common::config::AppConfig;
use montage_common::media::command_exists;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Montage System Check");
    println!("{}", "=".repeat(50));

    let tools = [
        ("ffmpeg", config.render.ffmpeg_path.as_str()),
        ("ffprobe", config.render.ffprobe_path.as_str()),
    ];
    let mut all_ok = true;
    for (name, binary) in tools {
        if command_exists(binary) {
            println!("[OK] {name}: {binary}");
        } else {
            println!("[MISSING] {name}: {binary}");
            all_ok = false;
        }
    }

    println!("[OK] Workspace dir: {}", config.workspace_dir.display());
    println!("[OK] Store root: {}", config.store.root.display());

    println!();
    if all_ok {
        println!("All required tools are available. Montage is ready.");
    } else {
        println!("Some required tools are missing. Install ffmpeg or set render.ffmpeg_path/ffprobe_path.");
    }

    Ok(())
}
