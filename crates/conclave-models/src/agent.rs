use serde::{Deserialize, Serialize};

/// Seniority of an agent. Determines the default voting weight.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Director,
    Senior,
    Specialist,
    Analyst,
}

impl Role {
    pub fn base_weight(self) -> f64 {
        match self {
            Self::Director => 2.0,
            Self::Senior => 1.5,
            Self::Specialist => 1.2,
            Self::Analyst => 1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Director => "director",
            Self::Senior => "senior",
            Self::Specialist => "specialist",
            Self::Analyst => "analyst",
        }
    }
}

/// The fixed decision rule an agent applies to a market context.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SignalRule {
    /// Cheap, low-leverage balance sheets.
    Value,
    /// Rides established trends while volatility is tame.
    Momentum,
    /// Fades euphoria and buys capitulation.
    Contrarian,
    /// Revenue growth above everything else.
    Growth,
    /// Blocks exposure when volatility runs hot.
    RiskGuard,
    /// Margin and leverage quality check.
    Fundamental,
    /// Plain trend direction.
    TrendFollowing,
    /// Trend confirmed by fundamentals, discounted by volatility.
    Balanced,
}

impl SignalRule {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Value => "value",
            Self::Momentum => "momentum",
            Self::Contrarian => "contrarian",
            Self::Growth => "growth",
            Self::RiskGuard => "risk_guard",
            Self::Fundamental => "fundamental",
            Self::TrendFollowing => "trend_following",
            Self::Balanced => "balanced",
        }
    }
}

/// A registered voting agent.
///
/// `name` is the unique key within an agent directory. `confidence` is the
/// point-in-time score from the agent's most recent vote.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Agent {
    pub name: String,
    pub department: String,
    pub role: Role,
    /// Positive voting weight, role-derived unless configured explicitly.
    pub base_weight: f64,
    /// 0.0 to 1.0.
    pub confidence: f64,
    /// Named reasoning persona, as opposed to a generic specialist.
    pub is_persona: bool,
    pub rule: SignalRule,
}

impl Agent {
    pub fn new(name: &str, department: &str, role: Role, rule: SignalRule) -> Self {
        Self {
            name: name.to_string(),
            department: department.to_string(),
            role,
            base_weight: role.base_weight(),
            confidence: 0.5,
            is_persona: false,
            rule,
        }
    }

    pub fn persona(name: &str, department: &str, role: Role, rule: SignalRule) -> Self {
        Self {
            is_persona: true,
            ..Self::new(name, department, role, rule)
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.base_weight = weight;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_weights_are_ordered_by_seniority() {
        assert!(Role::Director.base_weight() > Role::Senior.base_weight());
        assert!(Role::Senior.base_weight() > Role::Specialist.base_weight());
        assert!(Role::Specialist.base_weight() > Role::Analyst.base_weight());
        assert_eq!(Role::Analyst.base_weight(), 1.0);
    }

    #[test]
    fn new_agent_takes_role_weight() {
        let agent = Agent::new("desk_head", "trading", Role::Senior, SignalRule::Balanced);
        assert_eq!(agent.base_weight, 1.5);
        assert!(!agent.is_persona);

        let persona = Agent::persona("value_sage", "research", Role::Senior, SignalRule::Value)
            .with_weight(3.0);
        assert!(persona.is_persona);
        assert_eq!(persona.base_weight, 3.0);
    }

    #[test]
    fn rule_serialization() {
        assert_eq!(
            serde_json::to_string(&SignalRule::RiskGuard).unwrap(),
            "\"risk_guard\""
        );
        let parsed: SignalRule = serde_json::from_str("\"trend_following\"").unwrap();
        assert_eq!(parsed, SignalRule::TrendFollowing);
        assert_eq!(parsed.as_str(), "trend_following");
    }
}
