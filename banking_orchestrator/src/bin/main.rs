use banking_analysis_orchestrator::{
    agent::Orchestrator, config::AppConfig, telemetry, AnalysisReport,
};
use clap::Parser;
use tracing::{error, info};

const SCENARIOS: [(&str, &str); 3] = [
    (
        "12345",
        "I need comprehensive financial planning including investments and retirement options",
    ),
    (
        "67890",
        "I want to apply for a home loan and need to understand my eligibility",
    ),
    (
        "11111",
        "I noticed some suspicious activity on my account and need help resolving it",
    ),
];

#[derive(Parser, Debug)]
#[command(
    name = "orchestrator",
    about = "Multi-stage banking customer analysis",
    version
)]
struct Cli {
    /// Run the single demo scenario (customer 12345)
    #[arg(long)]
    demo: bool,

    /// Run the three test scenarios with a validation summary
    #[arg(long)]
    test: bool,

    /// Run the demo and the test scenarios (default)
    #[arg(long)]
    all: bool,

    /// Use the deterministic mock generator instead of Gemini
    #[arg(long)]
    mock: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    telemetry::init(&config.telemetry)?;

    let run_all = cli.all || !(cli.demo || cli.test);

    info!(mock = cli.mock, "Banking analysis orchestrator starting");

    let orchestrator = Orchestrator::from_config(&config, cli.mock).await?;

    if cli.demo || run_all {
        println!("\n{}", "=".repeat(80));
        println!("DEMO: Customer 12345 - Financial Planning");
        println!("{}", "=".repeat(80));
        let (customer_id, query) = SCENARIOS[0];
        match orchestrator.run_analysis(customer_id, query).await {
            Ok(report) => display_report(&report),
            Err(e) => error!(error = %e, "Demo analysis failed"),
        }
    }

    if cli.test || run_all {
        let mut reports = Vec::new();
        for (i, (customer_id, query)) in SCENARIOS.iter().enumerate() {
            println!("\n{}", "=".repeat(80));
            println!("SCENARIO {}: Customer {}", i + 1, customer_id);
            println!("Query: {}", query);
            println!("{}", "=".repeat(80));

            match orchestrator.run_analysis(customer_id, query).await {
                Ok(report) => {
                    display_report(&report);
                    reports.push(report);
                }
                Err(e) => {
                    println!("Error in scenario {}: {}", i + 1, e);
                    error!(scenario = i + 1, error = %e, "Scenario failed");
                }
            }
        }
        validation_summary(&reports, orchestrator.stage_plan().len());
    }

    let metrics = orchestrator.get_metrics().await;
    println!("\n=== METRICS ===");
    println!("{}", serde_json::to_string_pretty(&metrics)?);

    Ok(())
}

fn display_report(report: &AnalysisReport) {
    println!("\n{}", "=".repeat(80));
    println!("FINAL REPORT: {}", report.report_id);
    println!("{}", "=".repeat(80));
    println!("Customer: {}", report.customer_id);
    println!(
        "Risk Assessment: {} (score: {:.3})",
        report.risk_assessment, report.risk_score
    );

    println!("\nKey Findings:");
    for finding in &report.key_findings {
        println!("  - {}", finding);
    }
    println!("\nRecommendations:");
    for rec in &report.recommendations {
        println!("  - {}", rec);
    }
    println!("\nActions Taken:");
    for action in &report.actions_taken {
        println!("  - {}", action);
    }

    let references: Vec<&str> = report.policy_references.iter().map(String::as_str).collect();
    println!("\nPolicy References: {}", references.join(", "));
    println!(
        "Stage Contributions: {}",
        report.stage_contributions.names().collect::<Vec<_>>().join(", ")
    );
    println!(
        "Processing Time: {:.2}s  Context Hash: {}",
        report.processing_metrics.total_processing_time_seconds, report.context_hash
    );

    let summary = banking_analysis_orchestrator::text::truncate_chars(&report.summary, 500);
    println!("\nSummary (first 500 chars):\n{}...", summary);
}

fn validation_summary(reports: &[AnalysisReport], expected_stages: usize) {
    println!("\n{}", "=".repeat(80));
    println!("VALIDATION SUMMARY");
    println!("{}", "=".repeat(80));

    let mut all_pass = reports.len() == SCENARIOS.len();
    for report in reports {
        let time = report.processing_metrics.total_processing_time_seconds;
        let ok = report.stage_contributions.len() == expected_stages
            && report.key_findings.len() >= 3
            && report.recommendations.len() >= 2
            && (0.0..=1.0).contains(&report.risk_score)
            && time < 300.0;
        all_pass &= ok;

        println!(
            "  [{}] Customer {}: stages={}/{}, findings={}, recs={}, risk={:.3} ({}), time={:.1}s",
            if ok { "PASS" } else { "FAIL" },
            report.customer_id,
            report.stage_contributions.len(),
            expected_stages,
            report.key_findings.len(),
            report.recommendations.len(),
            report.risk_score,
            report.risk_assessment,
            time
        );
    }

    println!(
        "\nOverall: {}",
        if all_pass { "ALL PASSED" } else { "SOME FAILED" }
    );
}
