//! `fontasset assets`: create and read generated asset sets.

use std::path::Path;

use fontasset_cache::ParameterRecord;
use serde_json::json;

use crate::service::{self, print_json, report};
use crate::{AssetsCommand, CreateArgs, GlobalArgs, EXIT_NOT_FOUND, EXIT_OK};

/// Runs a `fontasset assets` action.
pub fn run(action: &AssetsCommand, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = service::load_config(global)?;
    let cache = service::open_cache(&config)?;

    match action {
        AssetsCommand::Create(args) => create(&cache, args, global),
        AssetsCommand::Get { font, fingerprint } => {
            let set = match cache.get(font, fingerprint) {
                Ok(set) => set,
                Err(e) => return report(e),
            };
            print_json(&serde_json::to_value(&set)?)?;
            Ok(EXIT_OK)
        }
        AssetsCommand::List { font } => {
            let fingerprints = match cache.list(font) {
                Ok(list) => list,
                Err(e) => return report(e),
            };
            print_json(&serde_json::to_value(&fingerprints)?)?;
            Ok(EXIT_OK)
        }
        AssetsCommand::Exists { font, fingerprint } => {
            if cache.exists(font, fingerprint) {
                Ok(EXIT_OK)
            } else {
                Ok(EXIT_NOT_FOUND)
            }
        }
        AssetsCommand::Path {
            font,
            fingerprint,
            asset_type,
        } => {
            let set = match cache.get(font, fingerprint) {
                Ok(set) => set,
                Err(e) => return report(e),
            };
            match set.file(*asset_type) {
                Some(file) => {
                    println!("{}", file.path.display());
                    Ok(EXIT_OK)
                }
                None => {
                    eprintln!("error: asset set {fingerprint} has no {asset_type}");
                    Ok(EXIT_NOT_FOUND)
                }
            }
        }
    }
}

fn create(
    cache: &service::Cache,
    args: &CreateArgs,
    global: &GlobalArgs,
) -> Result<i32, Box<dyn std::error::Error>> {
    let record = parse_params(&args.params)?;
    let outcome = match cache.get_or_create(&args.font, &record, args.force) {
        Ok(outcome) => outcome,
        Err(e) => return report(e),
    };

    let set = outcome.asset_set();
    if !global.quiet {
        eprintln!(
            "  {} asset set {} for {}",
            if outcome.is_created() { "Created" } else { "Found" },
            set.fingerprint.short(),
            args.font
        );
    }
    print_json(&json!({
        "status": outcome.status(),
        "fingerprint": set.fingerprint,
        "asset_set": set,
    }))?;
    Ok(EXIT_OK)
}

/// Reads a parameter record given inline or as `@path`.
fn parse_params(arg: &str) -> Result<ParameterRecord, Box<dyn std::error::Error>> {
    let json = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(Path::new(path))
            .map_err(|e| format!("failed to read parameters from {path}: {e}"))?,
        None => arg.to_string(),
    };
    Ok(ParameterRecord::from_json(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EXIT_BUSY;
    use fontasset_cache::{AssetType, Fingerprint, FontId, Reservation};

    struct Env {
        dir: tempfile::TempDir,
        global: GlobalArgs,
    }

    /// Sets up a results directory with one uploaded font and a shell-script
    /// generator.
    fn env(script: &str) -> Env {
        let dir = tempfile::tempdir().unwrap();
        let results = dir.path().join("results");
        std::fs::create_dir_all(results.join("fonts")).unwrap();
        std::fs::write(results.join("fonts/roboto.ttf"), b"ttf").unwrap();

        let generator = dir.path().join("generator.sh");
        std::fs::write(&generator, script).unwrap();

        let config = dir.path().join("fontasset.toml");
        std::fs::write(
            &config,
            format!(
                "[storage]\nresults_dir = {:?}\n\n[generator]\nbinary = \"/bin/sh\"\nmode = {:?}\n\n[cache]\nreservation_wait_secs = 0\npoll_interval_ms = 10\n",
                results, generator
            ),
        )
        .unwrap();

        Env {
            dir,
            global: GlobalArgs {
                quiet: true,
                verbose: false,
                config: Some(config),
            },
        }
    }

    const WRITES_BOTH: &str = "printf png > atlas.png\nprintf fnt > atlas.fnt\n";

    fn font() -> FontId {
        "roboto.ttf".parse().unwrap()
    }

    fn create_action(params: &str, force: bool) -> AssetsCommand {
        AssetsCommand::Create(CreateArgs {
            font: font(),
            params: params.to_string(),
            force,
        })
    }

    #[cfg(unix)]
    #[test]
    fn create_get_and_path() {
        let env = env(WRITES_BOTH);
        let params = r#"{"distfield": "parabola", "fontsize": 128}"#;
        assert_eq!(run(&create_action(params, false), &env.global).unwrap(), EXIT_OK);
        // the second identical request reports a conflict, still exit 0
        assert_eq!(run(&create_action(params, false), &env.global).unwrap(), EXIT_OK);

        let fingerprint = ParameterRecord::from_json(params).unwrap().fingerprint();
        let exists = AssetsCommand::Exists {
            font: font(),
            fingerprint,
        };
        assert_eq!(run(&exists, &env.global).unwrap(), EXIT_OK);

        let path = AssetsCommand::Path {
            font: font(),
            fingerprint,
            asset_type: AssetType::DistanceField,
        };
        assert_eq!(run(&path, &env.global).unwrap(), EXIT_OK);
        assert!(env
            .dir
            .path()
            .join("results/fonts/roboto.ttf_assets")
            .join(fingerprint.to_string())
            .join("atlas.png")
            .is_file());
    }

    #[cfg(unix)]
    #[test]
    fn params_from_file() {
        let env = env(WRITES_BOTH);
        let params = env.dir.path().join("params.json");
        std::fs::write(&params, r#"{"fontsize": 48, "ascii": true}"#).unwrap();
        let action = create_action(&format!("@{}", params.display()), false);
        assert_eq!(run(&action, &env.global).unwrap(), EXIT_OK);
    }

    #[cfg(unix)]
    #[test]
    fn generator_failure_is_a_hard_error() {
        let env = env("echo 'bad font' >&2\nexit 1\n");
        let err = run(&create_action(r#"{"fontsize": 12}"#, false), &env.global).unwrap_err();
        assert!(err.to_string().contains("bad font"));

        let list = AssetsCommand::List { font: font() };
        assert_eq!(run(&list, &env.global).unwrap(), EXIT_OK);
    }

    #[test]
    fn invalid_params_rejected() {
        let env = env(WRITES_BOTH);
        let err = run(&create_action(r#"{"fontsize": 0}"#, false), &env.global).unwrap_err();
        assert!(err.to_string().contains("fontsize"));
        let err = run(&create_action("@/no/such/params.json", false), &env.global).unwrap_err();
        assert!(err.to_string().contains("failed to read parameters"));
    }

    #[test]
    fn unknown_font_and_set_are_not_found() {
        let env = env(WRITES_BOTH);
        let fingerprint = Fingerprint::from_bytes(b"nothing");
        let missing: FontId = "missing.ttf".parse().unwrap();

        let action = AssetsCommand::Create(CreateArgs {
            font: missing.clone(),
            params: r#"{"fontsize": 12}"#.to_string(),
            force: false,
        });
        assert_eq!(run(&action, &env.global).unwrap(), EXIT_NOT_FOUND);

        let get = AssetsCommand::Get {
            font: font(),
            fingerprint,
        };
        assert_eq!(run(&get, &env.global).unwrap(), EXIT_NOT_FOUND);

        let exists = AssetsCommand::Exists {
            font: missing,
            fingerprint,
        };
        assert_eq!(run(&exists, &env.global).unwrap(), EXIT_NOT_FOUND);
    }

    #[test]
    fn held_reservation_is_busy() {
        let env = env(WRITES_BOTH);
        let params = r#"{"fontsize": 12}"#;
        let config = service::load_config(&env.global).unwrap();
        let cache = service::open_cache(&config).unwrap();
        let fp = ParameterRecord::from_json(params).unwrap().fingerprint();
        let _held = match cache.store().begin_publish(&font(), &fp, false).unwrap() {
            Reservation::Acquired(slot) => slot,
            other => panic!("expected reservation, got {other:?}"),
        };

        assert_eq!(run(&create_action(params, false), &env.global).unwrap(), EXIT_BUSY);
    }
}
