use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::vote::Signal;

pub const DEFAULT_TREND: &str = "neutral";
pub const DEFAULT_VOLATILITY: f64 = 0.1;

/// Market direction as understood by the signal rules.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Bullish,
    Bearish,
    Neutral,
}

impl Trend {
    /// Parse a trend label. Returns None for labels no rule understands.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "bullish" | "bull" | "up" | "uptrend" => Some(Self::Bullish),
            "bearish" | "bear" | "down" | "downtrend" => Some(Self::Bearish),
            "neutral" | "sideways" | "flat" | "" => Some(Self::Neutral),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bullish => "bullish",
            Self::Bearish => "bearish",
            Self::Neutral => "neutral",
        }
    }
}

/// Fundamentals subset consulted by the value, growth and fundamental rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Fundamentals {
    #[serde(default)]
    pub pe_ratio: Option<f64>,
    /// Year-over-year, as a fraction (0.25 = 25%).
    #[serde(default)]
    pub revenue_growth: Option<f64>,
    #[serde(default)]
    pub debt_to_equity: Option<f64>,
    /// Net margin, as a fraction.
    #[serde(default)]
    pub profit_margin: Option<f64>,
}

/// The inbound proposal context for one arbitration cycle.
///
/// Missing fields default to neutral: trend `"neutral"`, volatility `0.1`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketContext {
    /// Ticker the debate is about. Also the debate cache key.
    pub subject: String,
    #[serde(default = "default_trend")]
    pub market_trend: String,
    #[serde(default = "default_volatility")]
    pub volatility: f64,
    #[serde(default)]
    pub fundamentals: Fundamentals,
    /// Forced signals keyed by agent name.
    #[serde(default)]
    pub overrides: BTreeMap<String, Signal>,
}

fn default_trend() -> String {
    DEFAULT_TREND.to_string()
}

fn default_volatility() -> f64 {
    DEFAULT_VOLATILITY
}

impl MarketContext {
    pub fn new(subject: &str) -> Self {
        Self {
            subject: subject.to_string(),
            market_trend: default_trend(),
            volatility: default_volatility(),
            fundamentals: Fundamentals::default(),
            overrides: BTreeMap::new(),
        }
    }

    pub fn with_trend(mut self, trend: &str) -> Self {
        self.market_trend = trend.to_string();
        self
    }

    pub fn with_volatility(mut self, volatility: f64) -> Self {
        self.volatility = volatility;
        self
    }

    pub fn with_fundamentals(mut self, fundamentals: Fundamentals) -> Self {
        self.fundamentals = fundamentals;
        self
    }

    pub fn with_override(mut self, agent: &str, signal: Signal) -> Self {
        self.overrides.insert(agent.to_string(), signal);
        self
    }

    pub fn trend(&self) -> Option<Trend> {
        Trend::parse(&self.market_trend)
    }
}
