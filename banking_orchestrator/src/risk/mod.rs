//! Deterministic risk scoring
//!
//! Additive adjustments to a neutral base score. Pure: the reference time
//! is an argument, never read from the clock here.

pub mod thresholds;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::models::{CustomerProfile, PolicyExcerpt, RiskTier};
use thresholds::{
    tenure_adjustment, transaction_adjustment, CreditBand, IncomeBand, ProductEngagement,
};

const BASE_SCORE: f64 = 0.5;
const DAYS_PER_YEAR: f64 = 365.25;

/// One factor's contribution to the final score.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RiskFactor {
    pub name: &'static str,
    pub observed: String,
    pub adjustment: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RiskAssessment {
    pub score: f64,
    pub tier: RiskTier,
    pub factors: Vec<RiskFactor>,
}

/// Score a profile and keep the per-factor breakdown.
pub fn assess(profile: &CustomerProfile, reference_time: DateTime<Utc>) -> RiskAssessment {
    let mut factors = Vec::with_capacity(5);

    factors.push(RiskFactor {
        name: "income",
        observed: format!("{:.2}", profile.income),
        adjustment: IncomeBand::of(profile.income).risk_adjustment(),
    });

    factors.push(RiskFactor {
        name: "credit_score",
        observed: profile.credit_score.to_string(),
        adjustment: CreditBand::of(profile.credit_score).risk_adjustment(),
    });

    match tenure_years(profile, reference_time) {
        Some(years) => factors.push(RiskFactor {
            name: "tenure",
            observed: format!("{:.1} years", years),
            adjustment: tenure_adjustment(years),
        }),
        None => factors.push(RiskFactor {
            name: "tenure",
            observed: "unknown".to_string(),
            adjustment: 0.0,
        }),
    }

    factors.push(RiskFactor {
        name: "products",
        observed: profile.product_count().to_string(),
        adjustment: ProductEngagement::of(profile.product_count()).risk_adjustment(),
    });

    let max_amount = profile.max_transaction();
    factors.push(RiskFactor {
        name: "transaction_magnitude",
        observed: max_amount
            .map(|amount| format!("{:.2}", amount))
            .unwrap_or_else(|| "none".to_string()),
        adjustment: max_amount.map(transaction_adjustment).unwrap_or(0.0),
    });

    let raw = BASE_SCORE + factors.iter().map(|f| f.adjustment).sum::<f64>();
    let score = round3(raw.clamp(0.0, 1.0));

    RiskAssessment {
        score,
        tier: tier(score),
        factors,
    }
}

/// Risk score in [0.0, 1.0], rounded to three decimals.
///
/// Excerpts are accepted so policy-driven factors can be added without an
/// interface change; the current factor set reads only the profile.
pub fn score(
    profile: &CustomerProfile,
    _excerpts: &[PolicyExcerpt],
    reference_time: DateTime<Utc>,
) -> f64 {
    assess(profile, reference_time).score
}

/// Half-open intervals, lower bound inclusive.
pub fn tier(score: f64) -> RiskTier {
    if score < 0.25 {
        RiskTier::Low
    } else if score < 0.50 {
        RiskTier::MediumLow
    } else if score < 0.65 {
        RiskTier::Medium
    } else if score < 0.80 {
        RiskTier::High
    } else {
        RiskTier::Critical
    }
}

/// `None` when the start date is missing or not `YYYY-MM-DD`.
pub fn tenure_years(profile: &CustomerProfile, reference_time: DateTime<Utc>) -> Option<f64> {
    let raw = profile.customer_since.as_deref()?.trim();
    let since = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    let days = (reference_time.date_naive() - since).num_days();
    Some(days as f64 / DAYS_PER_YEAR)
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Transaction;
    use chrono::TimeZone;

    fn reference() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn profile(income: f64, credit_score: u16, products: usize, max_tx: f64) -> CustomerProfile {
        let mut p = CustomerProfile::unknown("test");
        p.income = income;
        p.credit_score = credit_score;
        p.banking_products = (0..products).map(|i| format!("product_{}", i)).collect();
        p.recent_transactions = vec![
            Transaction {
                amount: max_tx,
                description: "Salary Deposit".to_string(),
                timestamp: reference(),
            },
            Transaction {
                amount: 100.0,
                description: "Utility Bills".to_string(),
                timestamp: reference(),
            },
        ];
        p
    }

    fn adjustment(p: &CustomerProfile, factor: &str) -> f64 {
        assess(p, reference())
            .factors
            .iter()
            .find(|f| f.name == factor)
            .map(|f| f.adjustment)
            .unwrap()
    }

    #[test]
    fn test_factor_adjustments_per_band() {
        // Neutral elsewhere: income 40k, no credit score, no tenure, small transactions
        let incomes = [
            (250_000.0, -0.15),
            (100_000.0, -0.15),
            (99_999.0, -0.10),
            (75_000.0, -0.10),
            (74_999.0, -0.05),
            (50_000.0, -0.05),
            (49_999.0, 0.0),
            (30_000.0, 0.0),
            (29_999.0, 0.10),
            (0.0, 0.10),
        ];
        for (income, expected) in incomes {
            let p = profile(income, 0, 2, 100.0);
            assert_eq!(adjustment(&p, "income"), expected, "income {}", income);
        }

        let credits = [
            (850u16, -0.15),
            (750, -0.15),
            (749, -0.08),
            (700, -0.08),
            (699, 0.05),
            (650, 0.05),
            (649, 0.15),
            (1, 0.15),
            (0, 0.0),
        ];
        for (credit, expected) in credits {
            let p = profile(40_000.0, credit, 2, 100.0);
            assert_eq!(adjustment(&p, "credit_score"), expected, "credit {}", credit);
        }

        let products = [(0usize, 0.05), (1, 0.05), (2, -0.03), (3, -0.03), (4, -0.08), (7, -0.08)];
        for (count, expected) in products {
            let p = profile(40_000.0, 0, count, 100.0);
            assert_eq!(adjustment(&p, "products"), expected, "{} products", count);
        }

        // Against 2024-06-01
        let tenures = [
            (None, 0.0),
            (Some("2024-01-01"), 0.08),
            (Some("2023-05-01"), 0.0),
            (Some("2021-06-15"), 0.0),
            (Some("2021-05-01"), -0.05),
            (Some("2019-07-01"), -0.05),
            (Some("2019-05-01"), -0.10),
        ];
        for (since, expected) in tenures {
            let mut p = profile(40_000.0, 0, 2, 100.0);
            p.customer_since = since.map(str::to_string);
            assert_eq!(adjustment(&p, "tenure"), expected, "customer since {:?}", since);
        }
    }

    #[test]
    fn test_adjustments_sum_onto_base() {
        // Only the 2-3 product band moves off neutral
        let neutral = profile(40_000.0, 0, 2, 100.0);
        assert_eq!(score(&neutral, &[], reference()), 0.47);

        // 0.5 - 0.15 - 0.08 - 0.03 - 0.05
        let mut strong = profile(100_000.0, 700, 3, 100.0);
        strong.customer_since = Some("2020-06-01".to_string());
        assert_eq!(score(&strong, &[], reference()), 0.19);

        // 0.5 - 0.05 + 0.05 - 0.03
        let fair = profile(50_000.0, 650, 2, 100.0);
        assert_eq!(score(&fair, &[], reference()), 0.47);
    }

    #[test]
    fn test_scenario_low_risk_customer() {
        let p = profile(75_000.0, 780, 5, 4_500.0);
        let s = score(&p, &[], reference());
        assert_eq!(s, 0.17);
        assert_eq!(tier(s), RiskTier::Low);
    }

    #[test]
    fn test_scenario_critical_customer() {
        let p = profile(28_000.0, 620, 1, 2_300.0);
        let s = score(&p, &[], reference());
        assert_eq!(s, 0.8);
        assert_eq!(tier(s), RiskTier::Critical);
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(tier(0.24999), RiskTier::Low);
        assert_eq!(tier(0.25), RiskTier::MediumLow);
        assert_eq!(tier(0.4999), RiskTier::MediumLow);
        assert_eq!(tier(0.5), RiskTier::Medium);
        assert_eq!(tier(0.649), RiskTier::Medium);
        assert_eq!(tier(0.65), RiskTier::High);
        assert_eq!(tier(0.799), RiskTier::High);
        assert_eq!(tier(0.80), RiskTier::Critical);
    }

    #[test]
    fn test_score_is_bounded_and_idempotent() {
        let incomes = [0.0, 29_000.0, 45_000.0, 60_000.0, 80_000.0, 250_000.0];
        let credits = [0u16, 300, 649, 690, 720, 850];
        let amounts = [0.0, 5_500.0, 12_000.0];

        for &income in &incomes {
            for &credit in &credits {
                for products in 0..6 {
                    for &amount in &amounts {
                        let p = profile(income, credit, products, amount);
                        let first = score(&p, &[], reference());
                        let second = score(&p, &[], reference());
                        assert!((0.0..=1.0).contains(&first));
                        assert_eq!(first, second);
                    }
                }
            }
        }
    }

    #[test]
    fn test_monotonic_across_income_and_credit_boundaries() {
        let below = score(&profile(49_000.0, 700, 2, 100.0), &[], reference());
        let above = score(&profile(50_000.0, 700, 2, 100.0), &[], reference());
        assert!(above <= below);

        for (lower, upper) in [(649u16, 650u16), (699, 700), (749, 750)] {
            let l = score(&profile(60_000.0, lower, 2, 100.0), &[], reference());
            let u = score(&profile(60_000.0, upper, 2, 100.0), &[], reference());
            assert!(u <= l, "credit {} -> {} increased score", lower, upper);
        }
    }

    #[test]
    fn test_tenure_uses_reference_time() {
        let mut p = profile(60_000.0, 720, 2, 100.0);
        p.customer_since = Some("2019-05-15".to_string());
        let long_tenure = assess(&p, reference());
        let tenure = long_tenure.factors.iter().find(|f| f.name == "tenure").unwrap();
        assert_eq!(tenure.adjustment, -0.10);

        let early = Utc.with_ymd_and_hms(2019, 12, 1, 0, 0, 0).unwrap();
        let new_customer = assess(&p, early);
        let tenure = new_customer.factors.iter().find(|f| f.name == "tenure").unwrap();
        assert_eq!(tenure.adjustment, 0.08);
    }

    #[test]
    fn test_malformed_tenure_is_ignored() {
        let mut p = profile(60_000.0, 720, 2, 100.0);
        let baseline = score(&p, &[], reference());

        p.customer_since = Some("15/05/2019".to_string());
        assert_eq!(score(&p, &[], reference()), baseline);

        p.customer_since = Some(String::new());
        assert_eq!(score(&p, &[], reference()), baseline);
    }

    #[test]
    fn test_large_transactions_raise_score() {
        let calm = score(&profile(60_000.0, 720, 2, 4_000.0), &[], reference());
        let elevated = score(&profile(60_000.0, 720, 2, 6_000.0), &[], reference());
        let large = score(&profile(60_000.0, 720, 2, 15_000.0), &[], reference());
        assert_eq!(round3(elevated - calm), 0.03);
        assert_eq!(round3(large - calm), 0.10);
    }
}
