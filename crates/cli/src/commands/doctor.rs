//! `vitalbot doctor`: Diagnose configuration problems.

use std::path::Path;

use vitalbot_config::Requirement;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 vitalbot Doctor: Configuration Check");
    println!("========================================\n");

    let mut issues = 0;

    let path = super::config_file(config_path);
    if path.exists() {
        println!("  ✅ Config file found: {}", path.display());
    } else {
        println!("  ⚠️  No config file at {}: using defaults and environment", path.display());
    }

    let config = match super::load_config(config_path) {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            println!("\n  ⚠️  1 issue(s) found. See above for details.");
            return Ok(());
        }
    };

    let checks = [
        ("DingTalk credentials", Requirement::Platform),
        ("Vision API key", Requirement::Vision),
        ("Storage settings", Requirement::Storage),
    ];
    for (label, need) in checks {
        let missing = config.missing_settings(&[need]);
        if missing.is_empty() {
            println!("  ✅ {label}");
        } else {
            println!("  ❌ {label}: missing {}", missing.join(", "));
            issues += 1;
        }
    }

    if config.dingtalk.verify_signature && config.dingtalk.app_secret.is_none() {
        println!("  ⚠️  Callback signatures cannot be checked without an app secret");
        issues += 1;
    }

    // Only probe storage once its settings are complete
    if config.missing_settings(&[Requirement::Storage]).is_empty() {
        match vitalbot_store::open_store(&config.storage).await {
            Ok(store) => println!("  ✅ {} store reachable", store.name()),
            Err(e) => {
                println!("  ❌ Store unreachable: {e}");
                issues += 1;
            }
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
