use conclave_models::{Agent, Fundamentals, KnowledgeConfig, MarketContext, Signal, SignalRule, Trend, Vote};

use crate::error::AgentError;
use crate::knowledge::Insight;

/// Turns one agent's rule and a market context into a vote.
///
/// Implementations must be pure apart from the supplied insight: the same
/// agent, context and insight always give the same signal and confidence.
pub trait SignalGenerator: Send + Sync {
    fn signal(
        &self,
        agent: &Agent,
        context: &MarketContext,
        insight: Option<&Insight>,
    ) -> Result<Vote, AgentError>;
}

/// What a rule concluded before overrides and enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    pub signal: Signal,
    pub confidence: f64,
    pub rationale: String,
}

impl RuleOutcome {
    fn new(signal: Signal, confidence: f64, rationale: impl Into<String>) -> Self {
        Self {
            signal,
            confidence,
            rationale: rationale.into(),
        }
    }
}

/// The built-in generator: one fixed rule per agent.
pub struct RuleBasedGenerator {
    confidence_ceiling: f64,
    nudge_scale: f64,
}

impl RuleBasedGenerator {
    pub fn new(knowledge: &KnowledgeConfig) -> Self {
        Self {
            confidence_ceiling: knowledge.confidence_ceiling,
            nudge_scale: knowledge.nudge_scale,
        }
    }

    /// Raise `confidence` by the insight's relevance, never past the ceiling
    /// and never downwards.
    pub fn nudge(&self, confidence: f64, insight: &Insight) -> f64 {
        let nudged = (confidence + insight.relevance * self.nudge_scale).min(self.confidence_ceiling);
        nudged.max(confidence)
    }
}

impl Default for RuleBasedGenerator {
    fn default() -> Self {
        Self::new(&KnowledgeConfig::default())
    }
}

impl SignalGenerator for RuleBasedGenerator {
    fn signal(
        &self,
        agent: &Agent,
        context: &MarketContext,
        insight: Option<&Insight>,
    ) -> Result<Vote, AgentError> {
        let trend = validated_trend(agent, context)?;
        let outcome = evaluate_rule(agent.rule, trend, context.volatility, &context.fundamentals);

        let (signal, mut reasoning, original) = match context.overrides.get(&agent.name) {
            Some(&forced) if forced != outcome.signal => (
                forced,
                format!("{} (overridden to {forced})", outcome.rationale),
                Some(outcome.signal),
            ),
            _ => (outcome.signal, outcome.rationale, None),
        };

        let mut confidence = outcome.confidence;
        if let Some(insight) = insight {
            confidence = self.nudge(confidence, insight);
            reasoning.push_str(&format!(" [{}]", insight.text));
        }

        let vote = Vote::new(agent, signal, confidence, reasoning);
        Ok(match original {
            Some(original) => vote.overriding(original),
            None => vote,
        })
    }
}

fn validated_trend(agent: &Agent, context: &MarketContext) -> Result<Trend, AgentError> {
    let invalid = |reason: String| AgentError::Signal {
        agent: agent.name.clone(),
        reason,
    };
    if !context.volatility.is_finite() || context.volatility < 0.0 {
        return Err(invalid(format!("invalid volatility {}", context.volatility)));
    }
    context
        .trend()
        .ok_or_else(|| invalid(format!("unrecognized market trend '{}'", context.market_trend)))
}

/// Apply one rule. Reads only trend, volatility and the fundamentals subset.
pub fn evaluate_rule(
    rule: SignalRule,
    trend: Trend,
    volatility: f64,
    fundamentals: &Fundamentals,
) -> RuleOutcome {
    use Signal::*;

    match rule {
        SignalRule::Value => match (fundamentals.pe_ratio, fundamentals.debt_to_equity) {
            (Some(pe), Some(de)) if pe > 0.0 && pe < 15.0 && de < 1.0 => RuleOutcome::new(
                Buy,
                0.8,
                format!("P/E {pe:.1} with D/E {de:.2} is cheap and lightly levered"),
            ),
            (Some(pe), _) if pe > 30.0 => {
                RuleOutcome::new(Sell, 0.7, format!("P/E {pe:.1} prices in perfection"))
            }
            (None, _) => RuleOutcome::new(Hold, 0.4, "No valuation data"),
            _ => RuleOutcome::new(Hold, 0.5, "Valuation unremarkable"),
        },

        SignalRule::Momentum => match trend {
            Trend::Bullish if volatility < 0.5 => {
                RuleOutcome::new(Buy, 0.85, "Orderly uptrend worth riding")
            }
            Trend::Bullish => RuleOutcome::new(Hold, 0.5, "Uptrend too choppy to chase"),
            Trend::Bearish => RuleOutcome::new(Sell, 0.8, "Downtrend has momentum"),
            Trend::Neutral => RuleOutcome::new(Hold, 0.5, "No trend to follow"),
        },

        SignalRule::Contrarian => match trend {
            Trend::Bullish if volatility > 0.4 => {
                RuleOutcome::new(Sell, 0.65, "Froth in a hot tape, fading the crowd")
            }
            Trend::Bearish => RuleOutcome::new(Buy, 0.6, "Pessimism is priced in"),
            _ => RuleOutcome::new(Hold, 0.45, "Crowd not extreme enough to fade"),
        },

        SignalRule::Growth => match fundamentals.revenue_growth {
            Some(growth) if growth > 0.2 => RuleOutcome::new(
                Buy,
                0.8,
                format!("Revenue growing {:.0}%", growth * 100.0),
            ),
            Some(growth) if growth < 0.0 => RuleOutcome::new(
                Sell,
                0.6,
                format!("Revenue shrinking {:.0}%", growth.abs() * 100.0),
            ),
            Some(_) => RuleOutcome::new(Hold, 0.5, "Growth is pedestrian"),
            None => RuleOutcome::new(Hold, 0.4, "No growth data"),
        },

        SignalRule::RiskGuard => {
            if volatility > 0.6 {
                RuleOutcome::new(
                    Reject,
                    0.85,
                    format!("Volatility {volatility:.2} is beyond risk limits"),
                )
            } else if volatility > 0.35 {
                RuleOutcome::new(Hold, 0.6, format!("Volatility {volatility:.2} is elevated"))
            } else if volatility < 0.2 && trend == Trend::Bullish {
                RuleOutcome::new(Buy, 0.55, "Calm tape, risk budget available")
            } else {
                RuleOutcome::new(Hold, 0.5, "Risk within limits")
            }
        }

        SignalRule::Fundamental => {
            match (fundamentals.profit_margin, fundamentals.debt_to_equity) {
                (Some(margin), de) if margin < 0.0 || de.is_some_and(|de| de > 2.5) => {
                    RuleOutcome::new(Sell, 0.65, "Unprofitable or overlevered")
                }
                (Some(margin), Some(de)) if margin > 0.15 && de < 1.5 => RuleOutcome::new(
                    Buy,
                    0.7,
                    format!("{:.0}% margins on a sound balance sheet", margin * 100.0),
                ),
                (None, None) => RuleOutcome::new(Hold, 0.4, "No fundamentals to judge"),
                _ => RuleOutcome::new(Hold, 0.5, "Fundamentals adequate"),
            }
        }

        SignalRule::TrendFollowing => match trend {
            Trend::Bullish => RuleOutcome::new(Buy, 0.7, "Trend is up"),
            Trend::Bearish => RuleOutcome::new(Sell, 0.7, "Trend is down"),
            Trend::Neutral => RuleOutcome::new(Hold, 0.5, "Trend is flat"),
        },

        SignalRule::Balanced => {
            let mut score: i32 = match trend {
                Trend::Bullish => 1,
                Trend::Bearish => -1,
                Trend::Neutral => 0,
            };
            match fundamentals.revenue_growth {
                Some(g) if g > 0.1 => score += 1,
                Some(g) if g < 0.0 => score -= 1,
                _ => {}
            }
            match fundamentals.profit_margin {
                Some(m) if m > 0.1 => score += 1,
                Some(m) if m < 0.0 => score -= 1,
                _ => {}
            }
            let confidence =
                (0.55 + 0.1 * f64::from(score.abs()) - 0.2 * volatility).clamp(0.3, 0.8);
            if score >= 1 {
                RuleOutcome::new(Buy, confidence, format!("Weighted evidence favors buying ({score:+})"))
            } else if score <= -1 {
                RuleOutcome::new(Sell, confidence, format!("Weighted evidence favors selling ({score:+})"))
            } else {
                RuleOutcome::new(Hold, 0.5, "Evidence balanced")
            }
        }
    }
}
