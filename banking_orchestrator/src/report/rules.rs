//! Rule-based findings and recommendations
//!
//! Bands come from the same threshold table the risk engine scores with.

use crate::models::{CustomerProfile, PolicyExcerpt, RiskTier};
use crate::risk::thresholds::{CreditBand, IncomeBand, ProductEngagement};
use crate::text::format_usd;

/// Excerpts considered when listing policy areas
const POLICY_AREA_WINDOW: usize = 5;

pub const FALLBACK_RECOMMENDATION: &str =
    "Schedule periodic financial health review to identify emerging opportunities";

/// Always returns at least the completion line.
pub fn findings(
    profile: &CustomerProfile,
    excerpts: &[PolicyExcerpt],
    stages_completed: usize,
) -> Vec<String> {
    let mut findings = vec![format!(
        "Customer {} analysis completed with {} stage contributions",
        profile.customer_id, stages_completed
    )];

    let income = format_usd(profile.income);
    findings.push(match IncomeBand::of(profile.income) {
        IncomeBand::APlus | IncomeBand::A => format!(
            "Customer qualifies for Tier A+ or A lending products (income: {})",
            income
        ),
        IncomeBand::B => format!("Customer qualifies for Tier B lending products (income: {})", income),
        IncomeBand::C => format!("Customer qualifies for Tier C lending products (income: {})", income),
        IncomeBand::Limited => format!("Customer income ({}) may limit product eligibility", income),
    });

    let credit = CreditBand::of(profile.credit_score);
    let score = profile.credit_score;
    match (credit, credit.apr()) {
        (CreditBand::Excellent, Some(apr)) => findings.push(format!(
            "Excellent credit score ({}) - eligible for best rates ({:.1}% APR)",
            score, apr
        )),
        (CreditBand::Good, Some(apr)) => findings.push(format!(
            "Good credit score ({}) - eligible for competitive rates ({:.1}% APR)",
            score, apr
        )),
        (CreditBand::Fair, Some(apr)) => findings.push(format!(
            "Fair credit score ({}) - standard rates apply ({:.1}% APR)",
            score, apr
        )),
        (CreditBand::Review, _) => findings.push(format!(
            "Credit score ({}) requires case-by-case assessment",
            score
        )),
        _ => {}
    }

    let count = profile.product_count();
    match ProductEngagement::of(count) {
        ProductEngagement::High => findings.push(format!(
            "High product engagement ({} products) indicates strong customer relationship",
            count
        )),
        ProductEngagement::Low => findings.push(format!(
            "Low product engagement ({} product) - cross-sell opportunity identified",
            count
        )),
        ProductEngagement::Moderate => {}
    }

    if let (Some(min), Some(max)) = (profile.min_transaction(), profile.max_transaction()) {
        findings.push(format!(
            "Recent transaction activity: {} transactions, range {}-{}",
            profile.recent_transactions.len(),
            format_usd(min),
            format_usd(max)
        ));
    }

    let mut areas: Vec<&str> = Vec::new();
    for excerpt in excerpts.iter().take(POLICY_AREA_WINDOW) {
        if !excerpt.collection.is_empty() && !areas.contains(&excerpt.collection.as_str()) {
            areas.push(&excerpt.collection);
        }
    }
    if !areas.is_empty() {
        findings.push(format!("Relevant policy areas identified: {}", areas.join(", ")));
    }

    findings
}

/// Always returns at least two entries.
pub fn recommendations(profile: &CustomerProfile, tier: RiskTier) -> Vec<String> {
    let mut recs: Vec<String> = Vec::new();
    let income = IncomeBand::of(profile.income);
    let credit = CreditBand::of(profile.credit_score);

    match tier {
        RiskTier::High | RiskTier::Critical => {
            recs.push("Implement enhanced monitoring with quarterly risk reviews".into());
            recs.push("Consider requiring additional documentation for high-value transactions".into());
        }
        RiskTier::Medium => {
            recs.push("Maintain standard monitoring with semi-annual reviews".into());
        }
        RiskTier::Low | RiskTier::MediumLow => {
            recs.push("Continue standard monitoring with annual reviews".into());
        }
    }

    if !profile.has_product("investment") && income.at_least(IncomeBand::B) {
        recs.push("Recommend investment portfolio services based on income level".into());
    }
    if !profile.has_product("savings") {
        recs.push("Recommend high-yield savings account to improve financial health".into());
    }
    if !profile.has_product("credit_card")
        && matches!(credit, CreditBand::Excellent | CreditBand::Good | CreditBand::Fair)
    {
        recs.push("Eligible for rewards credit card based on credit profile".into());
    }
    if !profile.has_product("mortgage")
        && income.at_least(IncomeBand::A)
        && matches!(credit, CreditBand::Excellent | CreditBand::Good)
    {
        recs.push("Pre-qualify for mortgage products at competitive rates".into());
    }

    if profile.account_type == "basic" && income.at_least(IncomeBand::B) {
        recs.push("Upgrade to premium account tier based on income qualification".into());
    }

    if ProductEngagement::of(profile.product_count()) == ProductEngagement::Low {
        recs.push("Initiate cross-sell engagement program to deepen customer relationship".into());
    }

    if matches!(credit, CreditBand::Fair | CreditBand::Review) {
        recs.push("Offer credit-building program to improve eligibility for premium products".into());
    }

    if recs.len() < 2 {
        recs.push(FALLBACK_RECOMMENDATION.into());
    }

    recs
}
