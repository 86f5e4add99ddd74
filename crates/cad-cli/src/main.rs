use std::collections::HashMap;
use std::error::Error;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use cad_ai::{
    GeminiClient, GeneratorConfig, LanguageModel, ScriptGenerator, ScriptStrategy, matched_category,
};
use cad_pipeline::{GenerationOutcome, Orchestrator, PipelineConfig};
use cad_script::ValidationIssue;
use tracing_subscriber::EnvFilter;

type DynError = Box<dyn Error>;
type Flags = HashMap<String, String>;

#[tokio::main]
async fn main() -> Result<(), DynError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() {
        print_usage();
        return Ok(());
    }

    let report = match args[0].as_str() {
        "generate" => {
            let flags = parse_flags(&args[1..])?;
            run_generate(&flags, Arc::new(GeminiClient::from_env())).await?
        }
        "script" => {
            let flags = parse_flags(&args[1..])?;
            run_script(&flags, Arc::new(GeminiClient::from_env())).await?
        }
        "execute" => run_execute(&parse_flags(&args[1..])?).await?,
        "validate" => run_validate(&parse_flags(&args[1..])?)?,
        "fallback" => run_fallback(&parse_flags(&args[1..])?)?,
        _ => {
            print_usage();
            return Ok(());
        }
    };
    println!("{report}");
    Ok(())
}

async fn run_generate(flags: &Flags, model: Arc<dyn LanguageModel>) -> Result<String, DynError> {
    let prompt = required_str(flags, "--prompt")?;
    let orchestrator = Orchestrator::new(&pipeline_config(flags), model);
    let outcome = orchestrator
        .generate(prompt, flags.get("--user").map(String::as_str))
        .await?;
    finish(flags, outcome, true)
}

/// Prints the script a prompt would produce without executing it.
async fn run_script(flags: &Flags, model: Arc<dyn LanguageModel>) -> Result<String, DynError> {
    let prompt = required_str(flags, "--prompt")?;
    let generator = ScriptGenerator::new(
        model,
        GeneratorConfig {
            timeout: PipelineConfig::from_env().ai_timeout,
            ..GeneratorConfig::default()
        },
    );
    let generated = generator.generate(prompt).await;
    let source = match generated.source {
        ScriptStrategy::Ai => "ai",
        ScriptStrategy::Fallback => "fallback",
    };
    eprintln!("source: {source}");
    Ok(generated.script)
}

async fn run_execute(flags: &Flags) -> Result<String, DynError> {
    let script = read_script(flags)?;
    let orchestrator = Orchestrator::new(
        &pipeline_config(flags),
        Arc::new(GeminiClient::new(None)),
    );
    let outcome = orchestrator
        .execute(&script, flags.get("--user").map(String::as_str))
        .await?;
    finish(flags, outcome, false)
}

fn run_validate(flags: &Flags) -> Result<String, DynError> {
    let script = read_script(flags)?;
    match ValidationIssue::verdict(&script) {
        (true, _) => Ok("valid".to_string()),
        (false, reason) => Err(format!("invalid: {}", reason.unwrap_or_default()).into()),
    }
}

fn run_fallback(flags: &Flags) -> Result<String, DynError> {
    let category = matched_category(required_str(flags, "--prompt")?);
    eprintln!("category: {}", category.name);
    Ok(category.script())
}

fn finish(flags: &Flags, outcome: GenerationOutcome, show_script: bool) -> Result<String, DynError> {
    let mut report = format!("{}\nstatus: {}", outcome.message, status_label(&outcome));
    if let Some(output) = flags.get("--output") {
        fs::copy(&outcome.path, output)?;
        report.push_str(&format!("\nwrote {output}"));
    } else {
        report.push_str(&format!("\nartifact: {}", outcome.path.display()));
    }
    if show_script {
        report.push_str("\n\n");
        report.push_str(&outcome.script);
    }
    Ok(report)
}

fn status_label(outcome: &GenerationOutcome) -> String {
    serde_json::to_value(outcome.status)
        .ok()
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_default()
}

fn pipeline_config(flags: &Flags) -> PipelineConfig {
    let config = PipelineConfig::from_env();
    match flags.get("--temp-dir") {
        Some(dir) => config.with_temp_dir(dir),
        None => config,
    }
}

fn read_script(flags: &Flags) -> Result<String, DynError> {
    match (flags.get("--code"), flags.get("--script-file")) {
        (Some(code), None) => Ok(code.clone()),
        (None, Some(path)) => Ok(fs::read_to_string(Path::new(path))?),
        (Some(_), Some(_)) => Err("pass either --code or --script-file, not both".into()),
        (None, None) => Err("missing required --code or --script-file".into()),
    }
}

fn parse_flags(args: &[String]) -> Result<Flags, DynError> {
    if !args.len().is_multiple_of(2) {
        return Err("expected flag-value pairs".into());
    }

    let mut flags = HashMap::new();
    for pair in args.chunks(2) {
        let flag = pair[0].as_str();
        if !flag.starts_with("--") {
            return Err(format!("expected flag, found '{flag}'").into());
        }
        if flags.insert(flag.to_string(), pair[1].clone()).is_some() {
            return Err(format!("duplicate flag: {flag}").into());
        }
    }
    Ok(flags)
}

fn required_str<'a>(flags: &'a Flags, key: &str) -> Result<&'a str, DynError> {
    flags
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| format!("missing required {key}").into())
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!(
        "  cad-cli generate --prompt <text> [--user <id>] [--output <path>] [--temp-dir <path>]"
    );
    eprintln!(
        "  cad-cli execute (--code <script> | --script-file <path>) [--user <id>] [--output <path>] [--temp-dir <path>]"
    );
    eprintln!("  cad-cli script --prompt <text>");
    eprintln!("  cad-cli validate (--code <script> | --script-file <path>)");
    eprintln!("  cad-cli fallback --prompt <text>");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cad_ai::GeminiClient;

    use super::{
        Flags, parse_flags, read_script, run_execute, run_fallback, run_generate, run_script,
        run_validate,
    };

    fn flags(pairs: &[(&str, &str)]) -> Flags {
        let args = pairs
            .iter()
            .flat_map(|(flag, value)| [flag.to_string(), value.to_string()])
            .collect::<Vec<_>>();
        parse_flags(&args).expect("flag parsing should succeed")
    }

    #[test]
    fn rejects_malformed_flags() {
        let odd = vec!["--prompt".to_string()];
        assert!(parse_flags(&odd).is_err());

        let positional = vec!["prompt".to_string(), "gear".to_string()];
        assert!(parse_flags(&positional).is_err());

        let duplicate = ["--code", "a", "--code", "b"].map(str::to_string).to_vec();
        assert!(parse_flags(&duplicate).is_err());
    }

    #[test]
    fn reads_script_from_file_or_flag() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("part.cad");
        std::fs::write(&path, "use cad\nmodel = cube(2)\n").expect("write script");

        let from_file = read_script(&flags(&[("--script-file", path.to_str().expect("utf8"))]))
            .expect("script file readable");
        assert!(from_file.contains("cube(2)"));

        let inline = read_script(&flags(&[("--code", "use cad")])).expect("inline code");
        assert_eq!(inline, "use cad");

        assert!(read_script(&flags(&[])).is_err());
    }

    #[test]
    fn validate_reports_first_failure() {
        assert_eq!(
            run_validate(&flags(&[("--code", "use cad\nmodel = cube(1)")])).expect("valid"),
            "valid"
        );
        let err = run_validate(&flags(&[("--code", "model = cube(1)")])).expect_err("invalid");
        assert_eq!(err.to_string(), "invalid: missing import");
    }

    #[test]
    fn fallback_prints_category_script() {
        let script = run_fallback(&flags(&[("--prompt", "a small gear")])).expect("fallback");
        assert!(script.starts_with("use cad\n// Gear fallback"));
    }

    #[tokio::test]
    async fn generate_without_credentials_uses_fallback() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = dir.path().join("out.stl");
        let flags = flags(&[
            ("--prompt", "a sphere"),
            ("--temp-dir", dir.path().to_str().expect("utf8")),
            ("--output", output.to_str().expect("utf8")),
        ]);

        let report = run_generate(&flags, Arc::new(GeminiClient::new(None)))
            .await
            .expect("generate");
        assert!(report.contains("status: fallback_generated"));
        assert!(report.contains("model = sphere(r=8)"));
        assert!(std::fs::metadata(&output).expect("copied artifact").len() > 84);
    }

    #[tokio::test]
    async fn script_without_credentials_prints_fallback() {
        let model = Arc::new(GeminiClient::new(None));
        let script = run_script(&flags(&[("--prompt", "a tall cylinder")]), model.clone())
            .await
            .expect("script");
        assert!(script.contains("model = cylinder(h=20, r=6)"));
        assert!(run_script(&Flags::new(), model).await.is_err());
    }

    #[tokio::test]
    async fn execute_writes_caller_script() {
        let dir = tempfile::tempdir().expect("tempdir");
        let flags = flags(&[
            ("--code", "use cad\nmodel = cylinder(h=4, r=2)"),
            ("--temp-dir", dir.path().to_str().expect("utf8")),
        ]);
        let report = run_execute(&flags).await.expect("execute");
        assert!(report.starts_with("Script executed successfully\nstatus: user_provided"));
        assert!(!report.contains("model = cylinder"));
    }
}
