//! `unison onboard`: first-time setup.

use unison_config::AppConfig;

const SAMPLE_CLAN: &str = r#"name = "research"
goal = "Write a short report on the current time in three formats"
shared_instruction = "Be concise. Report numbers exactly as the tools return them."
manager = "Lead"

[[members]]
identity = "Lead"
description = "Coordinates the team and writes the report"
task = "Deliver the final report"

[[members]]
identity = "Clock"
description = "Reads the clock"
task = "Answer questions about the current time"
tools = ["time_tool"]
"#;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");
    let clan_path = config_dir.join("clan.example.toml");

    println!("Unison: first-time setup");
    println!("========================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("  Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if !clan_path.exists() {
        std::fs::write(&clan_path, SAMPLE_CLAN)?;
        println!("  Created sample clan: {}", clan_path.display());
    }

    if config_path.exists() {
        println!("\n  Config already exists at: {}", config_path.display());
        println!("  Edit it manually or delete and re-run onboard.\n");
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("  Created config.toml at: {}", config_path.display());
        println!("\n  Next steps:");
        println!("   1. Edit {} and add your API key", config_path.display());
        println!("   2. Run: unison agent --task \"What time is it?\"");
        println!("   3. Run: unison clan {}\n", clan_path.display());
    }

    Ok(())
}
