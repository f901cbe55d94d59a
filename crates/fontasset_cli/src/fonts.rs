//! `fontasset fonts`: upload and inspect fonts.

use fontasset_cache::{CacheError, FontId};

use crate::service::{self, print_json, report};
use crate::{FontsCommand, GlobalArgs, EXIT_OK};

/// Runs a `fontasset fonts` action.
pub fn run(action: &FontsCommand, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = service::load_config(global)?;
    let store = service::font_store(&config)?;

    match action {
        FontsCommand::List => {
            let fonts = store.list()?;
            print_json(&serde_json::to_value(&fonts)?)?;
        }
        FontsCommand::Upload {
            file,
            identifier,
            format,
        } => {
            let entry = store.upload_file(file, identifier.as_deref(), format.as_deref())?;
            if !global.quiet {
                eprintln!("  Uploaded {}", entry.identifier);
            }
            print_json(&serde_json::to_value(&entry)?)?;
        }
        FontsCommand::Show { font } => {
            let cache = service::open_cache(&config)?;
            let shown = match show(&cache, font) {
                Ok(shown) => shown,
                Err(e) => return report(e),
            };
            print_json(&shown)?;
        }
    }
    Ok(EXIT_OK)
}

/// Describes a font together with the fingerprints of its asset sets.
fn show(cache: &service::Cache, font: &FontId) -> Result<serde_json::Value, CacheError> {
    let entry = cache.fonts().get(font)?;
    let assets = cache.list(font)?;
    let mut shown = serde_json::to_value(&entry).map_err(|e| CacheError::Serialization {
        reason: e.to_string(),
    })?;
    shown["assets"] = serde_json::json!(assets);
    Ok(shown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EXIT_NOT_FOUND;
    use std::path::Path;

    fn global_for(dir: &Path) -> GlobalArgs {
        let config = dir.join("fontasset.toml");
        std::fs::write(
            &config,
            format!("[storage]\nresults_dir = {:?}\n", dir.join("results")),
        )
        .unwrap();
        GlobalArgs {
            quiet: true,
            verbose: false,
            config: Some(config),
        }
    }

    #[test]
    fn upload_then_show() {
        let dir = tempfile::tempdir().unwrap();
        let global = global_for(dir.path());
        let source = dir.path().join("Roboto.ttf");
        std::fs::write(&source, b"ttf").unwrap();

        let upload = FontsCommand::Upload {
            file: source,
            identifier: None,
            format: None,
        };
        assert_eq!(run(&upload, &global).unwrap(), EXIT_OK);
        assert!(dir.path().join("results/fonts/Roboto.ttf").is_file());

        let show = FontsCommand::Show {
            font: "Roboto.ttf".parse().unwrap(),
        };
        assert_eq!(run(&show, &global).unwrap(), EXIT_OK);
        assert_eq!(run(&FontsCommand::List, &global).unwrap(), EXIT_OK);
    }

    #[cfg(unix)]
    #[test]
    fn show_lists_asset_sets() {
        let dir = tempfile::tempdir().unwrap();
        let results = dir.path().join("results");
        std::fs::create_dir_all(results.join("fonts")).unwrap();
        std::fs::write(results.join("fonts/roboto.ttf"), b"ttf").unwrap();
        let generator = dir.path().join("generator.sh");
        std::fs::write(&generator, "printf png > atlas.png\nprintf fnt > atlas.fnt\n").unwrap();
        std::fs::write(
            dir.path().join("fontasset.toml"),
            format!(
                "[storage]\nresults_dir = {:?}\n\n[generator]\nbinary = \"/bin/sh\"\nmode = {:?}\n",
                results, generator
            ),
        )
        .unwrap();
        let global = GlobalArgs {
            quiet: true,
            verbose: false,
            config: Some(dir.path().join("fontasset.toml")),
        };

        let config = service::load_config(&global).unwrap();
        let cache = service::open_cache(&config).unwrap();
        let font: FontId = "roboto.ttf".parse().unwrap();
        assert_eq!(show(&cache, &font).unwrap()["assets"], serde_json::json!([]));

        let record = fontasset_cache::ParameterRecord::from_json(r#"{"fontsize": 64}"#).unwrap();
        let fingerprint = cache
            .get_or_create(&font, &record, false)
            .unwrap()
            .into_asset_set()
            .fingerprint;

        let shown = show(&cache, &font).unwrap();
        assert_eq!(shown["identifier"], "roboto.ttf");
        assert_eq!(shown["assets"], serde_json::json!([fingerprint.to_string()]));
        assert_eq!(run(&FontsCommand::Show { font }, &global).unwrap(), EXIT_OK);
    }

    #[test]
    fn duplicate_upload_fails() {
        let dir = tempfile::tempdir().unwrap();
        let global = global_for(dir.path());
        let source = dir.path().join("a.otf");
        std::fs::write(&source, b"otf").unwrap();
        let upload = FontsCommand::Upload {
            file: source,
            identifier: None,
            format: None,
        };
        run(&upload, &global).unwrap();
        let err = run(&upload, &global).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn show_unknown_font_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let global = global_for(dir.path());
        let show = FontsCommand::Show {
            font: "missing.ttf".parse().unwrap(),
        };
        assert_eq!(run(&show, &global).unwrap(), EXIT_NOT_FOUND);
    }
}
