use crate::model::{ClassificationStatus, ScanReport, ThreatOutcome};
use anyhow::Result;
use std::fmt::Write;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct ThreatRow {
    #[tabled(rename = "Threat")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Vulnerable")]
    vulnerable: usize,
    #[tabled(rename = "Indicators")]
    indicators: usize,
}

#[derive(Tabled)]
struct SubjectRow {
    #[tabled(rename = "Threat")]
    threat: String,
    #[tabled(rename = "Package/Tool")]
    subject: String,
    #[tabled(rename = "Root")]
    root: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Status")]
    status: String,
}

#[derive(Tabled)]
struct IndicatorRow {
    #[tabled(rename = "Threat")]
    threat: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Indicator")]
    indicator: String,
    #[tabled(rename = "Location")]
    location: String,
}

pub fn print_cli_table(report: &ScanReport) -> Result<()> {
    print!("{}", render_cli_table(report)?);
    Ok(())
}

pub fn render_cli_table(report: &ScanReport) -> Result<String> {
    let mut out = String::new();

    writeln!(out)?;
    writeln!(
        out,
        "Scan completed at: {}",
        report.scan_time.format("%Y-%m-%d %H:%M:%S UTC")
    )?;
    for root in &report.roots {
        writeln!(out, "  root: {}", root.display())?;
    }
    writeln!(out)?;

    if report.outcomes.is_empty() {
        writeln!(out, "No threat definitions were checked.")?;
    } else {
        let rows: Vec<ThreatRow> = report
            .outcomes
            .iter()
            .map(|o| ThreatRow {
                id: o.threat.clone(),
                name: truncate(&o.name, 40),
                status: format_triggered(o.triggered),
                vulnerable: o.vulnerable().count(),
                indicators: o.indicators.len(),
            })
            .collect();
        writeln!(out, "{}", Table::new(rows).with(Style::rounded()))?;
    }

    // Only subjects that resolved to a version
    let subjects: Vec<SubjectRow> = report
        .outcomes
        .iter()
        .flat_map(|o| {
            o.results
                .iter()
                .filter(|r| r.status != ClassificationStatus::NotFound)
                .map(move |r| SubjectRow {
                    threat: o.threat.clone(),
                    subject: r.subject.clone(),
                    root: r
                        .root
                        .as_ref()
                        .map(|p| truncate(&p.display().to_string(), 40))
                        .unwrap_or_else(|| "-".to_string()),
                    version: r.resolved.version.clone().unwrap_or_else(|| "-".to_string()),
                    source: r.resolved.source.display_name().to_string(),
                    status: format_status(r.status),
                })
        })
        .collect();
    if !subjects.is_empty() {
        writeln!(out)?;
        writeln!(out, "Resolved packages and tools ({}):", subjects.len())?;
        writeln!(out)?;
        writeln!(out, "{}", Table::new(subjects).with(Style::rounded()))?;
    }

    let indicators: Vec<IndicatorRow> = report
        .outcomes
        .iter()
        .flat_map(|o| {
            o.indicators.iter().map(move |f| IndicatorRow {
                threat: o.threat.clone(),
                kind: f.kind.as_str().to_string(),
                indicator: truncate(&f.indicator, 30),
                location: truncate(&f.location, 60),
            })
        })
        .collect();
    if !indicators.is_empty() {
        writeln!(out)?;
        writeln!(out, "Indicators found ({}):", indicators.len())?;
        writeln!(out)?;
        writeln!(out, "{}", Table::new(indicators).with(Style::rounded()))?;
    }

    write_remediation(&mut out, report)?;

    if !report.errors.is_empty() {
        writeln!(out)?;
        writeln!(out, "Threat definitions skipped ({}):", report.errors.len())?;
        for error in &report.errors {
            writeln!(out, "  - {}", error)?;
        }
    }

    writeln!(out)?;
    write_summary(&mut out, report)?;

    Ok(out)
}

fn write_remediation(out: &mut String, report: &ScanReport) -> std::fmt::Result {
    let triggered: Vec<&ThreatOutcome> = report
        .triggered()
        .filter(|o| !o.remediation.is_empty())
        .collect();
    if triggered.is_empty() {
        return Ok(());
    }

    writeln!(out)?;
    writeln!(out, "Remediation:")?;
    for outcome in triggered {
        writeln!(out, "  {} ({}):", outcome.name, outcome.threat)?;
        for (i, step) in outcome.remediation.iter().enumerate() {
            writeln!(out, "    {}. {}", i + 1, step)?;
        }
    }
    Ok(())
}

fn write_summary(out: &mut String, report: &ScanReport) -> std::fmt::Result {
    let resolved = report
        .outcomes
        .iter()
        .flat_map(|o| o.results.iter())
        .filter(|r| r.resolved.is_found())
        .count();
    let vulnerable: usize = report.outcomes.iter().map(|o| o.vulnerable().count()).sum();
    let indicators: usize = report.outcomes.iter().map(|o| o.indicators.len()).sum();

    writeln!(out, "Summary:")?;
    writeln!(out, "  Threats checked: {}", report.outcomes.len())?;
    writeln!(out, "  Versions resolved: {}", resolved)?;
    if vulnerable > 0 || indicators > 0 {
        writeln!(
            out,
            "  Findings: {} vulnerable, {} indicators",
            vulnerable, indicators
        )?;
    }

    let triggered = report.triggered().count();
    if triggered > 0 {
        writeln!(out, "  \x1b[31m{} threat(s) detected\x1b[0m", triggered)?;
    } else {
        writeln!(out, "  \x1b[32mNo threats detected\x1b[0m")?;
    }
    Ok(())
}

fn format_triggered(triggered: bool) -> String {
    if triggered {
        "\x1b[31mDETECTED\x1b[0m".to_string()
    } else {
        "clean".to_string()
    }
}

fn format_status(status: ClassificationStatus) -> String {
    match status {
        ClassificationStatus::Vulnerable => "\x1b[31mVULNERABLE\x1b[0m".to_string(),
        ClassificationStatus::Patched => "\x1b[32mpatched\x1b[0m".to_string(),
        ClassificationStatus::Safe => "safe".to_string(),
        ClassificationStatus::NotFound => "-".to_string(),
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}
