//! `slotflow onboard`: first-time setup.

use std::path::Path;

use slotflow_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();

    println!("Slotflow: First-Time Setup");
    println!("==========================\n");

    let created = write_default_config(&config_dir)?;
    let config_path = config_dir.join("config.toml");

    if created {
        println!("✅ Created config.toml at: {}", config_path.display());
        println!("\n📝 Next steps:");
        println!("   1. Edit {} and add your API key", config_path.display());
        println!("   2. Put your PDFs in ./pdfs (or set [documents] base_dir)");
        println!("   3. Run: slotflow chat\n");
    } else {
        println!("⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
    }

    Ok(())
}

/// Write the default config into `dir`. Returns `false` if one already exists.
fn write_default_config(dir: &Path) -> std::io::Result<bool> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
    }

    let path = dir.join("config.toml");
    if path.exists() {
        return Ok(false);
    }
    std::fs::write(&path, AppConfig::default_toml())?;
    Ok(true)
}
