use crate::model::{RunSummary, TestRunResult};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Table};

pub fn success(msg: &str) {
    eprintln!("{} {}", "✓".green().bold(), msg);
}

pub fn warn(msg: &str) {
    eprintln!("{}", msg.yellow());
}

pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red().bold(), msg);
}

pub fn info(msg: &str) {
    eprintln!("{}", msg.cyan().bold());
}

pub fn dim(msg: &str) {
    eprintln!("{}", msg.dimmed());
}

pub fn status_icon(passed: bool) -> String {
    if passed {
        "✓".green().to_string()
    } else {
        "✗".red().to_string()
    }
}

/// Results table with a bold totals row for tokens, cost, time and tools.
pub fn results_table(results: &[TestRunResult]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "Test", "Model", "Status", "Message", "Tokens", "Cost", "Time (s)", "Tools",
    ]);

    let mut tokens = 0u64;
    let mut cost = 0f64;
    let mut secs = 0f64;
    let mut tools = 0usize;

    for r in results {
        let t = r.tokens.unwrap_or(0);
        let c = r.cost.unwrap_or(0.0);
        let s = round1(r.duration_ms.unwrap_or(0) as f64 / 1000.0);
        let n = r.tool_call_count.unwrap_or(0);
        tokens += t;
        cost += c;
        secs += s;
        tools += n;

        table.add_row(vec![
            r.name.clone(),
            r.model.clone(),
            status_icon(r.passed),
            r.message.clone(),
            t.to_string(),
            c.to_string(),
            s.to_string(),
            n.to_string(),
        ]);
    }

    table.add_row(vec![
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        Cell::new(tokens).add_attribute(Attribute::Bold),
        Cell::new(format!("${:.4}", cost)).add_attribute(Attribute::Bold),
        Cell::new(format!("{}", secs as i64)).add_attribute(Attribute::Bold),
        Cell::new(tools).add_attribute(Attribute::Bold),
    ]);
    table
}

/// Results table followed by the pass/fail line, as one block of text.
pub fn render_summary(summary: &RunSummary) -> String {
    let s = &summary.summary;
    let line = if s.failed == 0 {
        format!("{} All {} test(s) passed", "✓".green().bold(), s.total)
    } else {
        format!(
            "{}, {}, {} total",
            format!("{} passed", s.passed).green(),
            format!("{} failed", s.failed).red(),
            s.total
        )
    };
    format!("{}\n\n{}", results_table(&summary.results), line)
}

/// Written to stderr with the rest of the progress output.
pub fn print_summary(summary: &RunSummary) {
    eprintln!("{}", render_summary(summary));
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round_ties_even() / 10.0
}
