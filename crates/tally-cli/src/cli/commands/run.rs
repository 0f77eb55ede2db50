use super::exit_codes;
use crate::cli::args::RunArgs;
use std::sync::Arc;
use tally_core::case::discover_tests;
use tally_core::client::auth::{CredentialPrompt, Credentials, InteractivePrompt, StaticPrompt};
use tally_core::client::HttpAgentClient;
use tally_core::config::{outputs_dir, tests_dir, RunnerConfig, DEFAULT_MODELS};
use tally_core::engine::Runner;
use tally_core::model::ModelConfig;
use tally_core::report::console;

pub async fn cmd_run(args: RunArgs, cfg: RunnerConfig) -> anyhow::Result<i32> {
    console::info("\n🧪 Running tally tests...\n");

    let model_strs: Vec<String> = if args.models.is_empty() {
        DEFAULT_MODELS.iter().map(|m| m.to_string()).collect()
    } else {
        args.models.clone()
    };
    let models = match model_strs
        .iter()
        .map(|m| ModelConfig::parse(m))
        .collect::<anyhow::Result<Vec<_>>>()
    {
        Ok(m) => m,
        Err(e) => {
            console::error(&e.to_string());
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };

    console::dim(&format!("Tests folder: {}", tests_dir(&args.project).display()));
    console::dim(&format!("Backend: {}", cfg.backend_url));
    console::dim(&format!(
        "Models: {}\n",
        models
            .iter()
            .map(|m| m.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    ));

    let cases = discover_tests(&args.project);
    if cases.is_empty() {
        console::warn("No tests to run.");
        return Ok(exit_codes::OK);
    }

    eprintln!(
        "Found {} test(s) × {} model(s) = {} run(s)",
        cases.len(),
        models.len(),
        cases.len() * models.len()
    );
    if args.threads > 1 {
        console::dim(&format!(
            "Running with {} workers (output may be interleaved)",
            args.threads
        ));
    }
    eprintln!();

    let client = HttpAgentClient::new(&cfg, credential_prompt())?;
    let runner = Runner::new(Arc::new(client));
    let (summary, path) = runner
        .run_and_persist(&cases, &models, args.threads, &outputs_dir(&args.project))
        .await?;

    console::dim(&format!("Results saved to: {}\n", path.display()));
    console::print_summary(&summary);

    if summary.all_passed() {
        Ok(exit_codes::OK)
    } else {
        Ok(exit_codes::TEST_FAILED)
    }
}

/// `TALLY_EMAIL` and `TALLY_PASSWORD` together skip the terminal prompt.
fn credential_prompt() -> Arc<dyn CredentialPrompt> {
    match (std::env::var("TALLY_EMAIL"), std::env::var("TALLY_PASSWORD")) {
        (Ok(email), Ok(password)) if !email.is_empty() && !password.is_empty() => {
            Arc::new(StaticPrompt(Some(Credentials { email, password })))
        }
        _ => Arc::new(InteractivePrompt),
    }
}
