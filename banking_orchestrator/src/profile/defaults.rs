//! Sample customer profiles used when no data source answers

use chrono::{DateTime, NaiveDate, Utc};

use crate::models::{CustomerProfile, Transaction};

/// Ids with a known sample profile.
pub const KNOWN_CUSTOMERS: [&str; 3] = ["12345", "67890", "11111"];

/// Known sample profile, or a zero-valued one for anything else.
pub fn default_profile(customer_id: &str) -> CustomerProfile {
    match customer_id {
        "12345" => CustomerProfile {
            customer_id: customer_id.to_string(),
            income: 75_000.0,
            credit_score: 780,
            account_type: "premium_plus".to_string(),
            customer_since: Some("2019-05-15".to_string()),
            risk_tier: "low".to_string(),
            recent_transactions: vec![
                tx(4500.00, "Salary Deposit", "2024-03-20"),
                tx(1500.00, "Mortgage Payment", "2024-03-15"),
                tx(300.00, "Investment Contribution", "2024-03-10"),
                tx(200.00, "Utility Bills", "2024-03-05"),
            ],
            banking_products: products(&["checking", "savings", "mortgage", "investment", "credit_card"]),
            last_review_date: Some("2024-01-10".to_string()),
        },
        "67890" => CustomerProfile {
            customer_id: customer_id.to_string(),
            income: 45_000.0,
            credit_score: 680,
            account_type: "standard".to_string(),
            customer_since: Some("2021-08-20".to_string()),
            risk_tier: "medium".to_string(),
            recent_transactions: vec![
                tx(3200.00, "Salary Deposit", "2024-03-20"),
                tx(1200.00, "Rent Payment", "2024-03-14"),
                tx(400.00, "Car Payment", "2024-03-08"),
                tx(150.00, "Student Loan", "2024-03-02"),
            ],
            banking_products: products(&["checking", "savings", "credit_card"]),
            last_review_date: Some("2024-02-15".to_string()),
        },
        "11111" => CustomerProfile {
            customer_id: customer_id.to_string(),
            income: 28_000.0,
            credit_score: 620,
            account_type: "basic".to_string(),
            customer_since: Some("2023-01-10".to_string()),
            risk_tier: "high".to_string(),
            recent_transactions: vec![
                tx(2300.00, "Salary Deposit", "2024-03-20"),
                tx(800.00, "Rent Payment", "2024-03-12"),
                tx(300.00, "Credit Card Payment", "2024-03-07"),
                tx(150.00, "Overdraft Fee", "2024-03-01"),
            ],
            banking_products: products(&["checking"]),
            last_review_date: Some("2024-03-01".to_string()),
        },
        _ => CustomerProfile::unknown(customer_id),
    }
}

fn products(names: &[&str]) -> std::collections::BTreeSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn tx(amount: f64, description: &str, date: &str) -> Transaction {
    Transaction {
        amount,
        description: description.to_string(),
        timestamp: date_at_midnight(date),
    }
}

fn date_at_midnight(date: &str) -> DateTime<Utc> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
