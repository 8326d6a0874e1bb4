//! `saturation example`: one benchmark, a few metrics, a simulated month

use std::io::Write;
use std::sync::Arc;

use analyzer::benchmark::{ExampleBenchmark, ExampleFactory};
use analyzer::metrics::{
    AvgTextLengthMetric, CitationCountMetric, NumClassesMetric, NumSamplesMetric,
};
use analyzer::{Benchmark, BenchmarkMeta, ManualClock, Metric};
use anyhow::Result;
use chrono::Duration;
use serde_json::json;

pub fn run<W: Write>(out: &mut W) -> Result<()> {
    let clock = Arc::new(ManualClock::starting_now());
    let mut benchmark = ExampleBenchmark::new(
        BenchmarkMeta::new("GLUE-MNLI")
            .with_paper_url("https://arxiv.org/abs/1804.07461")
            .with_dataset_url("https://huggingface.co/datasets/glue"),
    )
    .with_data(ExampleFactory::sample_table("GLUE-MNLI")?)
    .with_citations(1200);

    writeln!(out, "Benchmark: {}", benchmark.name())?;

    writeln!(out, "\n== Static metrics ==")?;
    let statics = [
        NumSamplesMetric::build(),
        AvgTextLengthMetric::build(),
        NumClassesMetric::build(),
    ];
    for metric in &statics {
        let score = metric.run(&benchmark)?;
        writeln!(out, "{:<18} {score}", metric.name())?;
    }

    // New data does not move a memoized static score
    benchmark.stage(json!([
        {"text": "premise one", "label": 0, "length": 11},
        {"text": "premise two", "label": 1, "length": 11},
        {"text": "premise three", "label": 2, "length": 13},
    ]));
    benchmark.refresh()?;
    let num_samples = &statics[0];
    writeln!(
        out,
        "after refresh: cached {} = {}, fresh compute = {}",
        num_samples.name(),
        num_samples.run(&benchmark)?,
        num_samples.compute(&benchmark)?
    )?;

    writeln!(out, "\n== Updatable metric over time ==")?;
    let citations = CitationCountMetric::build().with_clock(clock.clone());
    writeln!(
        out,
        "needs update before first run: {}",
        citations.needs_update(&benchmark)?
    )?;

    let mut elapsed = 0;
    for (day, count) in [(0, 1200), (10, 1260), (21, 1345)] {
        clock.advance(Duration::days(day - elapsed));
        elapsed = day;
        benchmark.set_citations(count);
        let score = citations.run(&benchmark)?;
        writeln!(
            out,
            "day {day:>2}: {} = {score} (needs update: {})",
            citations.name(),
            citations.needs_update(&benchmark)?
        )?;
    }

    clock.advance(Duration::days(
        i64::from(citations.update_frequency_days()) + 1,
    ));
    writeln!(
        out,
        "{} days after the last run, needs update: {}",
        citations.update_frequency_days() + 1,
        citations.needs_update(&benchmark)?
    )?;

    writeln!(out, "\nHistory for {}:", benchmark.name())?;
    for entry in &citations.get_historical_values(&benchmark)? {
        writeln!(out, "  {}  {}", entry.timestamp, entry.score)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_shows_cache_and_history() {
        let mut out = Vec::new();
        run(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("Benchmark: GLUE-MNLI"));
        assert!(text.contains("after refresh: cached num_samples = 1, fresh compute = 3"));
        assert!(text.contains("needs update before first run: true"));
        assert!(text.contains("day  0: citation_count = 1200 (needs update: false)"));
        assert!(text.contains("31 days after the last run, needs update: true"));

        let history = text.split("History for GLUE-MNLI:").nth(1).unwrap();
        assert_eq!(history.lines().filter(|l| !l.trim().is_empty()).count(), 3);
    }
}
