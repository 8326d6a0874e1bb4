//! `saturation cards`: peek into a split dataset-card export

use std::io::Write;
use std::path::PathBuf;

use analyzer::benchmark::source::{read_documents, SPLIT_FILE_PREFIX};
use anyhow::{Context, Result};
use serde_json::Value;

#[derive(clap::Args, Debug)]
pub struct CardsArgs {
    /// Split number (e.g. `3`) or path to a YAML file
    pub source: String,

    /// Directory holding the numbered split files
    #[arg(long, default_value = "data/split_yaml")]
    pub dir: PathBuf,

    /// Number of documents to print
    #[arg(short = 'n', long, default_value_t = 1)]
    pub count: usize,

    /// Print only the parsed card of each document
    #[arg(long, default_value_t = false)]
    pub parsed_only: bool,
}

impl CardsArgs {
    fn path(&self) -> PathBuf {
        match self.source.parse::<u32>() {
            Ok(part) => self.dir.join(format!("{SPLIT_FILE_PREFIX}{part}.yaml")),
            Err(_) => PathBuf::from(&self.source),
        }
    }
}

pub fn run<W: Write>(args: &CardsArgs, out: &mut W) -> Result<()> {
    let path = args.path();
    let documents = read_documents(&path)
        .with_context(|| format!("Failed to read cards from {}", path.display()))?;
    print_documents(&documents, args.count, args.parsed_only, out)
}

fn print_documents<W: Write>(
    documents: &[Value],
    count: usize,
    parsed_only: bool,
    out: &mut W,
) -> Result<()> {
    let label = if parsed_only { "CARD_PARSED ONLY" } else { "ALL DATA" };
    for (i, document) in documents.iter().take(count).enumerate() {
        writeln!(out, "\n--- Document {} ({label}) ---", i + 1)?;
        let shown = if parsed_only {
            match document.get("card_parsed") {
                Some(parsed) => parsed,
                None => {
                    writeln!(out, "No card_parsed data found.")?;
                    continue;
                }
            }
        } else {
            document
        };
        write!(out, "{}", serde_yaml::to_string(shown)?)?;
    }
    Ok(())
}
