//! Process command - extract data from a single document.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use idp_core::ProcessingResult;

use super::{build_processor, load_config};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input file (PDF, image, text or docx)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Model directory
    #[arg(short, long)]
    model_dir: Option<PathBuf>,

    /// Show extraction confidence and timing
    #[arg(long)]
    show_confidence: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output, one row per field
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

pub async fn run(args: ProcessArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config = load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Processing file: {}", args.input.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message("Loading models...");

    let processor = build_processor(config, args.model_dir.clone());

    pb.set_message(format!("Processing {}...", args.input.display()));
    let result = processor.process_document(&args.input);
    pb.finish_and_clear();
    let result = result?;

    let output = format_result(&result, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if args.show_confidence {
        eprintln!();
        eprintln!(
            "{} Extraction confidence: {:.1}%",
            style("ℹ").blue(),
            result.confidence * 100.0
        );
        eprintln!(
            "{} Processing time: {}ms",
            style("ℹ").blue(),
            result.processing_time_ms
        );
    }

    debug!("Total time: {:?}", start.elapsed());

    Ok(())
}

pub fn format_result(result: &ProcessingResult, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        OutputFormat::Csv => format_csv(result),
        OutputFormat::Text => Ok(format_text(result)),
    }
}

fn format_csv(result: &ProcessingResult) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record(["field", "value", "normalized", "confidence", "source"])?;

    for field in result.fields.iter() {
        wtr.write_record([
            field.name.as_str(),
            field.value.as_str(),
            field.normalized.as_deref().unwrap_or(""),
            &format!("{:.2}", field.confidence),
            field.source.as_str(),
        ])?;
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(result: &ProcessingResult) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "Document type: {} ({:.1}% confidence)\n",
        result.document_type,
        result.confidence * 100.0
    ));
    output.push_str(&format!("Pages: {}\n", result.page_count));
    output.push('\n');

    if result.fields.is_empty() {
        output.push_str("No fields extracted\n");
    } else {
        output.push_str("Fields:\n");
        let width = result.fields.names().map(str::len).max().unwrap_or(0);
        for field in result.fields.iter() {
            output.push_str(&format!("  {:width$}  {}", field.name, field.value, width = width));
            if let Some(normalized) = field.normalized.as_deref().filter(|n| *n != field.value) {
                output.push_str(&format!(" [{}]", normalized));
            }
            output.push_str(&format!(" ({}, {:.2})\n", field.source.as_str(), field.confidence));
        }
    }

    for (i, table) in result.tables.iter().enumerate() {
        output.push_str(&format!(
            "\nTable {} ({}): {} rows x {} columns\n",
            i + 1,
            table.table_type,
            table.row_count,
            table.column_count
        ));
        if let Some(header) = &table.header {
            output.push_str(&format!("  {}\n", header.join(" | ")));
        }
        for row in &table.rows {
            output.push_str(&format!("  {}\n", row.join(" | ")));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use idp_core::{DocumentProcessor, IdpConfig};

    fn sample() -> ProcessingResult {
        DocumentProcessor::text_only(IdpConfig::default())
            .process_text("Invoice Number: INV-1001\nDate: 2024-02-01\nTotal: $40.00")
    }

    #[test]
    fn test_csv_has_one_row_per_field() {
        let result = sample();
        let csv = format_result(&result, OutputFormat::Csv).unwrap();
        assert_eq!(csv.lines().count(), result.fields.len() + 1);
        assert!(csv.starts_with("field,value,normalized,confidence,source"));
        assert!(csv.contains("invoice_number,INV-1001,,0.90,scoped_pattern"));
    }

    #[test]
    fn test_text_summary() {
        let text = format_result(&sample(), OutputFormat::Text).unwrap();
        assert!(text.starts_with("Document type: invoice"));
        assert!(text.contains("INV-1001"));
    }
}
