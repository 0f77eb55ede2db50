use super::exit_codes;
use crate::cli::args::ServerArgs;
use tally_core::config::outputs_dir;
use tally_core::report::console;
use tally_viewer::server::result_files;
use tally_viewer::{ViewerConfig, ViewerError};

pub async fn cmd_server(args: ServerArgs) -> anyhow::Result<i32> {
    let outputs = outputs_dir(&args.project);
    if !outputs.is_dir() {
        console::warn(&format!("No test outputs found at {}", outputs.display()));
        console::info("Run 'tally run' first to generate test results.");
        return Ok(exit_codes::OK);
    }

    let files = result_files(&outputs).await;
    if files.is_empty() {
        console::warn("No result files found.");
        console::info("Run 'tally run' first to generate test results.");
        return Ok(exit_codes::OK);
    }

    let cfg = ViewerConfig {
        port: args.port,
        ..ViewerConfig::new(outputs)
    };

    console::info("\n📊 Starting tally results viewer...\n");
    console::dim(&format!("Results folder: {}", cfg.outputs_dir.display()));
    console::dim(&format!("Found {} result file(s)\n", files.len()));

    let viewer = match tally_viewer::bind(&cfg).await {
        Ok(v) => v,
        Err(e @ ViewerError::AddrInUse(_)) => {
            console::error(&e.to_string());
            return Ok(exit_codes::CONFIG_ERROR);
        }
        Err(e) => return Err(e.into()),
    };

    let url = cfg.url();
    console::success(&format!("Server running at {}", url));
    console::dim("Press Ctrl+C to stop\n");

    if !args.no_open {
        if let Err(e) = open_browser(&url) {
            tracing::warn!(event = "browser_open_failed", error = %e);
            console::dim(&format!("Open {} in your browser", url));
        }
    }

    viewer
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    console::dim("\nServer stopped");
    Ok(exit_codes::OK)
}

fn open_browser(url: &str) -> std::io::Result<()> {
    #[cfg(target_os = "macos")]
    std::process::Command::new("open").arg(url).spawn()?;

    #[cfg(target_os = "windows")]
    std::process::Command::new("cmd")
        .args(["/C", "start", url])
        .spawn()?;

    #[cfg(all(unix, not(target_os = "macos")))]
    std::process::Command::new("xdg-open").arg(url).spawn()?;

    Ok(())
}
