//! Build script for spacedeck-daemon
//!
//! Validates the embedded console.toml at compile time so a broken default
//! catalog never ships.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    validate_config();
}

fn validate_config() {
    println!("cargo:rerun-if-changed=console.toml");

    let config_path = Path::new("console.toml");
    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: console.toml not found!                                  ║\n\
            ║                                                                  ║\n\
            ║  The daemon embeds a default console.toml. Create one in the     ║\n\
            ║  spacedeck-daemon directory.                                     ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read console.toml                              ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    let config: toml::Value = match toml::from_str(&config_content) {
        Ok(value) => value,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid TOML syntax in console.toml                      ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                {}\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&e.to_string())
            );
        }
    };

    validate_controls(&config);
    println!("cargo:warning=console.toml validated successfully");
}

/// Format error message lines with box drawing
fn format_error_lines(msg: &str) -> String {
    msg.lines()
        .map(|line| {
            let truncated = if line.len() > 64 {
                format!("{}...", &line[..61])
            } else {
                line.to_string()
            };
            format!("║  {:<64} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn fail(title: &str, errors: &[String]) -> ! {
    panic!(
        "\n\
        ╔══════════════════════════════════════════════════════════════════╗\n\
        ║  ERROR: {:<56} ║\n\
        ╠══════════════════════════════════════════════════════════════════╣\n\
        {}\n\
        ╚══════════════════════════════════════════════════════════════════╝\n",
        title,
        errors
            .iter()
            .map(|e| format!("║  • {:<62} ║", e))
            .collect::<Vec<_>>()
            .join("\n")
    );
}

/// Every `[[controls]]` entry needs a unique id and a usable input
fn validate_controls(config: &toml::Value) {
    let controls = match config.get("controls") {
        Some(toml::Value::Array(controls)) if !controls.is_empty() => controls,
        Some(toml::Value::Array(_)) | None => {
            fail(
                "No controls in console.toml",
                &["Add at least one [[controls]] entry".to_string()],
            );
        }
        Some(_) => fail(
            "Invalid controls in console.toml",
            &["'controls' must be an array of tables".to_string()],
        ),
    };

    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for (i, control) in controls.iter().enumerate() {
        let Some(control) = control.as_table() else {
            errors.push(format!("control {} must be a table", i));
            continue;
        };

        let id = match control.get("id") {
            Some(toml::Value::String(id)) if !id.is_empty() => id.as_str(),
            _ => {
                errors.push(format!("control {} missing 'id'", i));
                continue;
            }
        };
        if !seen.insert(id.to_string()) {
            errors.push(format!("duplicate control id '{}'", id));
        }

        match control.get("input").and_then(|v| v.as_table()) {
            Some(input) => {
                if !matches!(input.get("device"), Some(toml::Value::String(_))) {
                    errors.push(format!("[{}] input missing 'device'", id));
                }
                let has_pin = input.get("pin").is_some();
                let has_channel = input.get("channel").is_some();
                if has_pin == has_channel {
                    errors.push(format!("[{}] input needs exactly one of 'pin' or 'channel'", id));
                }
                if control.get("analog").is_some() && !has_channel {
                    errors.push(format!("[{}] 'analog' requires an input channel", id));
                }
            }
            None => errors.push(format!("[{}] missing 'input' table", id)),
        }

        if control.get("light").is_some() && control.get("lights").is_some() {
            errors.push(format!("[{}] has both 'light' and 'lights'", id));
        }
    }

    if !errors.is_empty() {
        fail("Invalid controls in console.toml", &errors);
    }
}
