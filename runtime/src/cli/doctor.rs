//! Environment readiness check.

use std::path::{Path, PathBuf};

use anyhow::Result;
use cardharvest::FileSink;

use crate::cli::output::{self, Styled};
use crate::renderer::chromium::{default_profile_dir, find_chromium};
use crate::settings::{self, ConfigSource};

/// Check Chromium, the browser profile, the export directory and config.
pub async fn run(config_flag: Option<&Path>) -> Result<()> {
    let chromium = find_chromium();
    let profile = default_profile_dir();
    let source = settings::resolve_config_source(
        config_flag,
        std::env::var(settings::CONFIG_ENV).ok(),
        &settings::home_dir(),
    );
    let config = settings::load_from(&source);
    let export_dir = match &config {
        Ok(c) => FileSink::from_config(&c.export).dir().to_path_buf(),
        Err(_) => PathBuf::from("."),
    };
    let export_writable = is_writable(&export_dir);
    let ready = chromium.is_some() && config.is_ok();

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
            "chromium": chromium.as_ref().map(|p| p.display().to_string()),
            "profile_dir": profile.display().to_string(),
            "profile_exists": profile.exists(),
            "config": source.path().map(|p| p.display().to_string()),
            "config_error": config.as_ref().err().map(|e| format!("{e:#}")),
            "export_dir": export_dir.display().to_string(),
            "export_dir_writable": export_writable,
            "ready": ready,
        }));
        return Ok(());
    }

    let s = Styled::new();
    println!("{}", s.bold("Cardharvest Doctor"));
    println!("==================");
    println!();
    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!();

    match &chromium {
        Some(path) => println!("{} Chromium found: {}", s.ok_sym(), path.display()),
        None => println!(
            "{} Chromium NOT found. Install Chrome/Chromium or set CARDHARVEST_CHROMIUM_PATH.",
            s.warn_sym()
        ),
    }

    if profile.exists() {
        println!("{} Browser profile: {}", s.ok_sym(), profile.display());
    } else {
        println!(
            "{} Browser profile {} will be created on first run; log in to the chat app once.",
            s.info_sym(),
            profile.display()
        );
    }

    match (&source, &config) {
        (ConfigSource::Defaults, _) => println!("{} Config: built-in defaults", s.ok_sym()),
        (src, Ok(_)) => println!(
            "{} Config: {}",
            s.ok_sym(),
            src.path().map(|p| p.display().to_string()).unwrap_or_default()
        ),
        (_, Err(e)) => println!("{} Config: {e:#}", s.warn_sym()),
    }

    if export_writable {
        println!("{} Export directory writable: {}", s.ok_sym(), export_dir.display());
    } else {
        println!(
            "{} Export directory not writable: {} (only affects --sink file)",
            s.warn_sym(),
            export_dir.display()
        );
    }

    println!();
    if ready {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }

    Ok(())
}

/// Whether a file can be created in `dir` (created if missing).
fn is_writable(dir: &Path) -> bool {
    if std::fs::create_dir_all(dir).is_err() {
        return false;
    }
    let probe = dir.join(".cardharvest-doctor");
    let ok = std::fs::write(&probe, b"").is_ok();
    let _ = std::fs::remove_file(&probe);
    ok
}
