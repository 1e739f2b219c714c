//! Stage definitions and the banking stage catalogue

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::AnalysisError;
use crate::Result;

/// One ordered step of the pipeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stage {
    pub name: String,
    pub instructions: String,
}

impl Stage {
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
        }
    }
}

/// Validated, ordered list of stages.
///
/// Construction is the only validation point: a plan that exists is
/// non-empty and has unique, non-blank names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePlan {
    stages: Vec<Stage>,
}

impl StagePlan {
    pub fn new(stages: Vec<Stage>) -> Result<Self> {
        if stages.is_empty() {
            return Err(AnalysisError::Configuration(
                "Stage list is empty".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(stages.len());
        for stage in &stages {
            if stage.name.trim().is_empty() {
                return Err(AnalysisError::Configuration(
                    "Stage name must not be blank".to_string(),
                ));
            }
            if stage.instructions.trim().is_empty() {
                return Err(AnalysisError::Configuration(format!(
                    "Stage '{}' has no instructions",
                    stage.name
                )));
            }
            if !seen.insert(stage.name.as_str()) {
                return Err(AnalysisError::Configuration(format!(
                    "Duplicate stage name '{}'",
                    stage.name
                )));
            }
        }

        Ok(Self { stages })
    }

    /// The six banking stages in execution order.
    pub fn banking() -> Self {
        Self {
            stages: default_stages(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Stage> {
        self.stages.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(|s| s.name.as_str())
    }

    /// The final stage; its output is the run's narrative.
    pub fn last(&self) -> &Stage {
        // Non-empty by construction
        &self.stages[self.stages.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

pub const DATA_GATHERER: &str = "data_gatherer";
pub const FRAUD_ANALYST: &str = "fraud_analyst";
pub const LOAN_ANALYST: &str = "loan_analyst";
pub const SUPPORT_SPECIALIST: &str = "support_specialist";
pub const RISK_ANALYST: &str = "risk_analyst";
pub const SYNTHESIS_COORDINATOR: &str = "synthesis_coordinator";

pub fn default_stages() -> Vec<Stage> {
    vec![
        Stage::new(
            DATA_GATHERER,
            "You are a senior banking data analyst who builds customer financial profiles.

Tasks:
1. Review income, transactions, credit history and account activity.
2. Map the profile to the banking policies and eligibility criteria that apply.
3. Judge data quality and completeness and flag gaps or inconsistencies.
4. Compute key metrics: debt-to-income ratio, savings rate, spending pattern.
5. Place the customer in a financial segment (premium, standard or basic).

Respond with:
- Customer financial summary with key metrics
- Data quality assessment with a completeness score
- Policy relevance mapping
- Observations on the customer's financial behaviour",
        ),
        Stage::new(
            FRAUD_ANALYST,
            "You are a senior fraud detection specialist for retail banking transactions.

Tasks:
1. Look for suspicious patterns: amounts above $2,000 or out of character, more than 10 transactions per hour, new payees or unusual locations, behaviour outside the customer's norm.
2. Rate fraud risk as Low, Medium, High or Critical and justify the rating.
3. Name likely typologies: account takeover, identity theft, card fraud, money laundering.
4. Recommend mitigation matched to the risk level.
5. Cite the fraud detection policies that apply.

Respond with:
- Transaction pattern analysis
- Fraud risk score (0-100) and level
- Suspicious indicators, if any
- Recommended actions and monitoring changes",
        ),
        Stage::new(
            LOAN_ANALYST,
            "You are a senior credit risk analyst who assesses loan eligibility.

Tasks:
1. Evaluate eligibility using income tier (A+: $100K+, A: $75K+, B: $50K+, C: $30K+), credit tier (Excellent 750+, Good 700-749, Fair 650-699, Review below 650), debt-to-income against tier limits of 30% to 45%, and employment stability.
2. Determine the maximum qualifying amount and recommended terms.
3. State applicable interest rates and LTV ratios.
4. Recommend suitable loan products.
5. Flag disqualifying factors or conditions that need special review.

Respond with:
- Eligibility decision (Approved, Conditional, Review Required or Declined)
- Qualifying tier and rates
- Maximum recommended loan amount
- Documentation level (Basic, Standard, Comprehensive or Premium)
- Product recommendations",
        ),
        Stage::new(
            SUPPORT_SPECIALIST,
            "You are a senior customer experience specialist for banking services.

Tasks:
1. Assess the customer's service needs from the profile and the query.
2. Identify service gaps and improvement opportunities.
3. Assign a priority from P0 (critical) to P3 (low).
4. Recommend proactive engagement for retention.
5. Suggest relevant self-service and digital banking features.
6. Estimate lifetime value and the appropriate service tier.

Respond with:
- Customer experience assessment
- Priority classification with response-time SLA
- Service gaps and opportunities
- Retention risk
- Recommended engagement actions",
        ),
        Stage::new(
            RISK_ANALYST,
            "You are a senior enterprise risk analyst covering banking compliance and risk management.

Tasks:
1. Assess credit, market, operational, compliance and reputational risk.
2. Score each and assign a level (Low below 10%, Medium 10-30%, High 30-60%, Critical above 60%).
3. Check compliance with banking regulation and internal policy.
4. Rank mitigation strategies by priority.
5. Set a review frequency for this risk profile.

Respond with:
- Risk assessment matrix
- Overall risk score and level
- Compliance status with policy references
- Prioritised mitigation recommendations
- Monitoring and review schedule",
        ),
        Stage::new(
            SYNTHESIS_COORDINATOR,
            "You are a senior banking strategy coordinator who turns the prior stage analyses into an executive report.

Tasks:
1. Integrate every earlier stage's findings into one narrative.
2. Call out shared themes, conflicts and synergies between the assessments.
3. Write an executive summary for senior banking leadership.
4. Produce a prioritised action plan with owners and timelines.
5. Give strategic recommendations for the customer relationship.

Respond with:
- Executive summary (2-3 paragraphs)
- Top 5 consolidated findings
- Integrated risk profile
- Prioritised strategic recommendations
- Immediate action items
- Long-term relationship strategy",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banking_plan_order() {
        let plan = StagePlan::new(default_stages()).unwrap();
        let names: Vec<_> = plan.names().collect();
        assert_eq!(
            names,
            vec![
                DATA_GATHERER,
                FRAUD_ANALYST,
                LOAN_ANALYST,
                SUPPORT_SPECIALIST,
                RISK_ANALYST,
                SYNTHESIS_COORDINATOR
            ]
        );
        assert_eq!(plan.last().name, SYNTHESIS_COORDINATOR);
        assert_eq!(plan, StagePlan::banking());
        assert!(plan.iter().all(|s| s.instructions.len() > 50));
    }

    #[test]
    fn test_empty_plan_rejected() {
        let err = StagePlan::new(vec![]).unwrap_err();
        assert!(matches!(err, AnalysisError::Configuration(_)));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = StagePlan::new(vec![
            Stage::new("a", "first"),
            Stage::new("b", "second"),
            Stage::new("a", "again"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("Duplicate stage name 'a'"));
    }

    #[test]
    fn test_blank_fields_rejected() {
        assert!(StagePlan::new(vec![Stage::new(" ", "x")]).is_err());
        assert!(StagePlan::new(vec![Stage::new("a", "")]).is_err());
    }
}
