//! Resolve duplicate students in an enrollment CSV.
//!
//! ```text
//! unistudent --input inscriptions.csv --output resolved.csv \
//!     [--config unistudent.toml] [--duplicates doublons.csv] \
//!     [--dot merges.dot] [--report report.json] [--style plain|year] \
//!     [--max-rounds N]
//! ```

use anyhow::{bail, Context};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::info;
use unistudent::config::{ConfigOverrides, EngineOverrides, IdentifierOverrides};
use unistudent::utils::{export_to_dot, export_to_text_summary, save_dot_to_file, write_duplicates_csv};
use unistudent::{Frame, IdentifierStyle, Resolver, ResolverConfig};

fn parse_arg(flag: &str) -> Option<String> {
    let mut args = std::env::args();
    while let Some(arg) = args.next() {
        if arg == flag {
            return args.next();
        }
    }
    None
}

fn has_flag(flag: &str) -> bool {
    std::env::args().any(|arg| arg == flag)
}

fn parse_style(raw: &str) -> anyhow::Result<IdentifierStyle> {
    match raw {
        "plain" => Ok(IdentifierStyle::Plain),
        "year" | "year-prefixed" => Ok(IdentifierStyle::YearPrefixed),
        other => bail!("unknown identifier style '{other}' (expected plain or year)"),
    }
}

fn usage() -> &'static str {
    "usage: unistudent --input <csv> --output <csv> [--config <toml>] \
     [--duplicates <csv>] [--dot <file>] [--report <json>] [--style plain|year] [--max-rounds <n>]"
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    if has_flag("--help") || has_flag("-h") {
        println!("{}", usage());
        return Ok(());
    }

    let input = parse_arg("--input").with_context(usage)?;
    let output = parse_arg("--output").with_context(usage)?;
    let config_path = parse_arg("--config").map(PathBuf::from);

    let style = parse_arg("--style").as_deref().map(parse_style).transpose()?;
    let max_rounds = parse_arg("--max-rounds")
        .as_deref()
        .map(str::parse::<usize>)
        .transpose()
        .context("--max-rounds must be a positive integer")?;

    let overrides = ConfigOverrides {
        engine: max_rounds.map(|max_rounds| EngineOverrides {
            max_rounds: Some(max_rounds),
        }),
        identifier: style.map(|style| IdentifierOverrides {
            style: Some(style),
            ..Default::default()
        }),
    };
    let config = ResolverConfig::load(config_path.as_deref(), overrides)?;
    let consolidated_columns = config.consolidation.columns.clone();

    let mut table = Frame::from_csv_path(&input)
        .with_context(|| format!("failed to read {input}"))?;
    info!(path = %input, "enrollments loaded");

    let resolver = Resolver::new(config)?;
    let report = resolver.resolve(&mut table)?;

    table
        .to_csv_path(&output)
        .with_context(|| format!("failed to write {output}"))?;
    info!(path = %output, students = report.student_count(), "resolved table written");

    if let Some(path) = parse_arg("--duplicates") {
        let file = File::create(&path).with_context(|| format!("failed to create {path}"))?;
        let lines =
            write_duplicates_csv(&report, &table, &consolidated_columns, BufWriter::new(file))?;
        info!(path = %path, lines, "duplicate report written");
    }

    if let Some(path) = parse_arg("--dot") {
        save_dot_to_file(&export_to_dot(&report), &path)?;
        info!(path = %path, "merge graph written");
    }

    if let Some(path) = parse_arg("--report") {
        let file = File::create(&path).with_context(|| format!("failed to create {path}"))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &report)?;
        info!(path = %path, "resolution report written");
    }

    print!("{}", export_to_text_summary(&report));

    Ok(())
}
