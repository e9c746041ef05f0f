//! `vitalbot onboard`: First-time setup.

use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = super::config_file(config_path);

    println!("🩺 vitalbot: First-Time Setup");
    println!("==============================\n");

    if let Some(dir) = config_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
            println!("✅ Created config directory: {}", dir.display());
        }
    }

    if config_path.exists() {
        println!("⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
        return Ok(());
    }

    std::fs::write(&config_path, vitalbot_config::AppConfig::default_toml())?;
    println!("✅ Created config.toml at: {}", config_path.display());
    println!("\n📝 Next steps:");
    println!("   1. Set DINGTALK_APP_KEY, DINGTALK_APP_SECRET and DASHSCOPE_API_KEY");
    println!("      (or fill in [dingtalk] and [vision] in the file)");
    println!("   2. Run: vitalbot doctor");
    println!("   3. Run: vitalbot serve\n");

    Ok(())
}
