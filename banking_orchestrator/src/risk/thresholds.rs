//! Threshold bands shared by risk scoring and report rules

/// Income band, highest first. Lower bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncomeBand {
    /// >= 100,000
    APlus,
    /// >= 75,000
    A,
    /// >= 50,000
    B,
    /// >= 30,000
    C,
    /// < 30,000
    Limited,
}

impl IncomeBand {
    pub fn of(income: f64) -> Self {
        if income >= 100_000.0 {
            IncomeBand::APlus
        } else if income >= 75_000.0 {
            IncomeBand::A
        } else if income >= 50_000.0 {
            IncomeBand::B
        } else if income >= 30_000.0 {
            IncomeBand::C
        } else {
            IncomeBand::Limited
        }
    }

    fn rank(&self) -> u8 {
        match self {
            IncomeBand::APlus => 4,
            IncomeBand::A => 3,
            IncomeBand::B => 2,
            IncomeBand::C => 1,
            IncomeBand::Limited => 0,
        }
    }

    /// True when this band is `floor` or higher.
    pub fn at_least(&self, floor: IncomeBand) -> bool {
        self.rank() >= floor.rank()
    }

    pub fn risk_adjustment(&self) -> f64 {
        match self {
            IncomeBand::APlus => -0.15,
            IncomeBand::A => -0.10,
            IncomeBand::B => -0.05,
            IncomeBand::C => 0.0,
            IncomeBand::Limited => 0.10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditBand {
    /// >= 750
    Excellent,
    /// 700..750
    Good,
    /// 650..700
    Fair,
    /// 1..650
    Review,
    /// 0
    Unknown,
}

impl CreditBand {
    pub fn of(credit_score: u16) -> Self {
        match credit_score {
            0 => CreditBand::Unknown,
            s if s >= 750 => CreditBand::Excellent,
            s if s >= 700 => CreditBand::Good,
            s if s >= 650 => CreditBand::Fair,
            _ => CreditBand::Review,
        }
    }

    pub fn risk_adjustment(&self) -> f64 {
        match self {
            CreditBand::Excellent => -0.15,
            CreditBand::Good => -0.08,
            CreditBand::Fair => 0.05,
            CreditBand::Review => 0.15,
            CreditBand::Unknown => 0.0,
        }
    }

    /// Headline APR offered to the band, if a rate is published for it.
    pub fn apr(&self) -> Option<f64> {
        match self {
            CreditBand::Excellent => Some(3.5),
            CreditBand::Good => Some(4.5),
            CreditBand::Fair => Some(6.0),
            CreditBand::Review | CreditBand::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductEngagement {
    /// >= 4 products
    High,
    /// 2..4 products
    Moderate,
    /// <= 1 product
    Low,
}

impl ProductEngagement {
    pub fn of(product_count: usize) -> Self {
        match product_count {
            n if n >= 4 => ProductEngagement::High,
            n if n >= 2 => ProductEngagement::Moderate,
            _ => ProductEngagement::Low,
        }
    }

    pub fn risk_adjustment(&self) -> f64 {
        match self {
            ProductEngagement::High => -0.08,
            ProductEngagement::Moderate => -0.03,
            ProductEngagement::Low => 0.05,
        }
    }
}

/// Years since the customer relationship started.
pub fn tenure_adjustment(years: f64) -> f64 {
    if years >= 5.0 {
        -0.10
    } else if years >= 3.0 {
        -0.05
    } else if years < 1.0 {
        0.08
    } else {
        0.0
    }
}

/// Largest recent transaction amount.
pub fn transaction_adjustment(max_amount: f64) -> f64 {
    if max_amount > 10_000.0 {
        0.10
    } else if max_amount > 5_000.0 {
        0.03
    } else {
        0.0
    }
}
