use std::path::PathBuf;

use reverse_ai_core::api::server::{serve, session_from_config};
use reverse_ai_core::config::{default_app_root, resolve_app_config};
use reverse_ai_core::media::export::{build_export, now_unix_ms, write_export};
use reverse_ai_core::media::intake::read_image_file;
use reverse_ai_core::session::{settle_all, SlotStatus};
use reverse_ai_core::transform::prompt::{Mode, ModeParameter, AGE_RANGE};
use serde_json::json;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let cli_args = std::env::args().skip(1).collect::<Vec<_>>();
    if matches!(cli_args.first().map(String::as_str), Some("transform")) {
        run_transform_cli(cli_args.into_iter().skip(1).collect::<Vec<_>>()).await?;
        return Ok(());
    }
    if cli_args
        .iter()
        .any(|arg| matches!(arg.as_str(), "-h" | "--help"))
    {
        print_usage();
        return Ok(());
    }

    let config = resolve_app_config(default_app_root().as_path())?;
    serve(config).await?;
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TransformCliArgs {
    mode: Mode,
    input: PathBuf,
    input2: Option<PathBuf>,
    age: Option<u32>,
    style: Option<String>,
    country: Option<String>,
    country2: Option<String>,
    out_dir: Option<PathBuf>,
}

fn parse_transform_cli_args(
    args: &[String],
) -> Result<TransformCliArgs, Box<dyn std::error::Error>> {
    let mut mode = None::<String>;
    let mut input = None::<PathBuf>;
    let mut input2 = None::<PathBuf>;
    let mut age = None::<String>;
    let mut style = None::<String>;
    let mut country = None::<String>;
    let mut country2 = None::<String>;
    let mut out_dir = None::<PathBuf>;

    let mut i = 0usize;
    while i < args.len() {
        let flag = args[i].as_str();
        let needs_value = |idx: usize| -> Result<String, Box<dyn std::error::Error>> {
            let Some(value) = args.get(idx + 1) else {
                return Err(std::io::Error::other(format!("Missing value for {flag}")).into());
            };
            Ok(value.clone())
        };

        match flag {
            "--mode" => mode = Some(needs_value(i)?),
            "--input" => input = Some(PathBuf::from(needs_value(i)?)),
            "--input2" => input2 = Some(PathBuf::from(needs_value(i)?)),
            "--age" => age = Some(needs_value(i)?),
            "--style" => style = Some(needs_value(i)?),
            "--country" => country = Some(needs_value(i)?),
            "--country2" => country2 = Some(needs_value(i)?),
            "--out-dir" => out_dir = Some(PathBuf::from(needs_value(i)?)),
            unknown => {
                return Err(std::io::Error::other(format!(
                    "Unknown argument: {unknown}\n\nUse --help for usage."
                ))
                .into());
            }
        }
        i += 2;
    }

    let raw_mode = mode.ok_or_else(|| std::io::Error::other("Missing required --mode"))?;
    let mode = Mode::parse(raw_mode.as_str()).ok_or_else(|| {
        std::io::Error::other(format!(
            "Unknown --mode '{raw_mode}'; expected reverse, age, style or country"
        ))
    })?;
    let input = input.ok_or_else(|| std::io::Error::other("Missing required --input"))?;

    let age = age
        .map(|raw| {
            raw.trim()
                .parse::<u32>()
                .ok()
                .filter(|value| AGE_RANGE.contains(value))
                .ok_or_else(|| {
                    std::io::Error::other(format!(
                        "--age must be between {} and {}, got '{raw}'",
                        AGE_RANGE.start(),
                        AGE_RANGE.end()
                    ))
                })
        })
        .transpose()?;
    let country = country
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    let country2 = country2
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    let misplaced = [
        ("--age", age.is_some(), Mode::Age),
        ("--style", style.is_some(), Mode::Style),
        ("--input2", input2.is_some(), Mode::Country),
        ("--country", country.is_some(), Mode::Country),
        ("--country2", country2.is_some(), Mode::Country),
    ]
    .into_iter()
    .find(|(_, present, owner)| *present && *owner != mode);
    if let Some((flag, _, owner)) = misplaced {
        return Err(std::io::Error::other(format!(
            "{flag} only applies to --mode {}",
            owner.as_str()
        ))
        .into());
    }

    Ok(TransformCliArgs {
        mode,
        input,
        input2,
        age,
        style,
        country,
        country2,
        out_dir,
    })
}

async fn run_transform_cli(args: Vec<String>) -> Result<(), Box<dyn std::error::Error>> {
    if args
        .iter()
        .any(|arg| matches!(arg.as_str(), "-h" | "--help"))
    {
        print_transform_usage();
        return Ok(());
    }
    let parsed = parse_transform_cli_args(args.as_slice())?;
    let config = resolve_app_config(default_app_root().as_path())?;
    let out_dir = parsed
        .out_dir
        .clone()
        .unwrap_or_else(|| config.exports_dir.clone());
    let session = session_from_config(&config);
    session.change_mode(parsed.mode);

    let handles = if parsed.mode == Mode::Country {
        for (index, country) in [&parsed.country, &parsed.country2].into_iter().enumerate() {
            if let Some(country) = country {
                session.set_country(index, country.as_str())?;
            }
        }
        session.attach_country_image(0, read_image_file(parsed.input.as_path())?)?;
        if let Some(path) = &parsed.input2 {
            session.attach_country_image(1, read_image_file(path.as_path())?)?;
        }
        session.generate_all()?
    } else {
        if let Some(age) = parsed.age {
            session.set_single_parameter(ModeParameter::Age(age))?;
        }
        if let Some(style) = &parsed.style {
            session.set_single_parameter(ModeParameter::Style(style.clone()))?;
        }
        vec![session.submit(read_image_file(parsed.input.as_path())?)?]
    };
    settle_all(handles).await;

    let snapshot = session.snapshot();
    let mut slots = Vec::with_capacity(snapshot.slots.len());
    let mut all_succeeded = true;
    for slot in &snapshot.slots {
        if slot.source_image.is_none() {
            continue;
        }
        let export_path = if slot.status == SlotStatus::Success {
            let (target, result) = session.export_source(slot.index)?;
            let artifact = build_export(target, &result, now_unix_ms())?;
            Some(write_export(out_dir.as_path(), &artifact)?)
        } else {
            all_succeeded = false;
            None
        };
        slots.push(json!({
            "index": slot.index,
            "status": slot.status,
            "parameter": slot.parameter,
            "error": slot.error,
            "export_path": export_path.map(|path| path.display().to_string()),
        }));
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "ok": all_succeeded,
            "mode": parsed.mode,
            "slots": slots,
        }))?
    );
    Ok(())
}

fn print_usage() {
    eprintln!(concat!(
        "Usage:\n",
        "  cargo run                 start the HTTP surface (REVERSE_AI_BIND, default 127.0.0.1:8790)\n",
        "  cargo run -- transform    run one headless transform (see transform --help)\n"
    ));
}

fn print_transform_usage() {
    eprintln!(
        concat!(
            "Usage:\n",
            "  cargo run -- transform --mode <reverse|age|style|country> --input PATH ",
            "[--input2 PATH] [--age N] [--style TEXT] [--country NAME] [--country2 NAME] [--out-dir DIR]\n\n",
            "Defaults:\n",
            "  --age 60, --style cyberpunk jacket, --country United States, --country2 Japan\n",
            "  --out-dir defaults to REVERSE_AI_EXPORTS_DIR (var/exports under the app root)\n",
            "  --input2 / --country / --country2 apply to country mode only\n"
        )
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn parse_transform_requires_mode_and_input() {
        let err = parse_transform_cli_args(&args(&["--input", "a.png"]))
            .expect_err("mode should be required");
        assert!(err.to_string().contains("--mode"));

        let err = parse_transform_cli_args(&args(&["--mode", "reverse"]))
            .expect_err("input should be required");
        assert!(err.to_string().contains("--input"));
    }

    #[test]
    fn parse_transform_accepts_country_flags() {
        let parsed = parse_transform_cli_args(&args(&[
            "--mode",
            "Country",
            "--input",
            "a.png",
            "--input2",
            "b.jpg",
            "--country2",
            " Brazil ",
            "--out-dir",
            "out",
        ]))
        .expect("parse should succeed");
        assert_eq!(parsed.mode, Mode::Country);
        assert_eq!(parsed.input2, Some(PathBuf::from("b.jpg")));
        assert_eq!(parsed.country, None);
        assert_eq!(parsed.country2.as_deref(), Some("Brazil"));
        assert_eq!(parsed.out_dir, Some(PathBuf::from("out")));
    }

    #[test]
    fn parse_transform_validates_age_range() {
        let parsed = parse_transform_cli_args(&args(&[
            "--mode", "age", "--input", "a.png", "--age", "25",
        ]))
        .expect("parse should succeed");
        assert_eq!(parsed.age, Some(25));

        let err = parse_transform_cli_args(&args(&[
            "--mode", "age", "--input", "a.png", "--age", "101",
        ]))
        .expect_err("age above range");
        assert!(err.to_string().contains("between 5 and 100"));
    }

    #[test]
    fn parse_transform_rejects_flags_for_other_modes() {
        let err = parse_transform_cli_args(&args(&[
            "--mode", "reverse", "--input", "a.png", "--style", "punk",
        ]))
        .expect_err("style does not apply to reverse");
        assert!(err.to_string().contains("--style only applies to --mode style"));
    }

    #[test]
    fn parse_transform_rejects_unknown_and_dangling_flags() {
        let err = parse_transform_cli_args(&args(&["--bogus"])).expect_err("unknown flag");
        assert!(err.to_string().contains("Unknown argument: --bogus"));

        let err = parse_transform_cli_args(&args(&["--mode"])).expect_err("missing value");
        assert!(err.to_string().contains("Missing value for --mode"));
    }
}
