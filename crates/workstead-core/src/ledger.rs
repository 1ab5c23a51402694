//! The global capital ledger.
//!
//! One signed counter shared by the whole session, plus per-agent balances
//! for labor credit. Stations and goal retirement are the only writers; the
//! world routes every mutation through here so change events all come from
//! one place.
//!
//! Capital may go negative. Consumption costs are charged even when the
//! balance cannot cover them; a negative balance is a valid score.

use std::collections::BTreeMap;

use crate::id::AgentId;

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Ledger {
    capital: i64,
    agents: BTreeMap<AgentId, i64>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capital(initial: i64) -> Self {
        Self {
            capital: initial,
            agents: BTreeMap::new(),
        }
    }

    pub fn capital(&self) -> i64 {
        self.capital
    }

    /// Apply a signed delta to the global capital. Returns the new total.
    pub fn adjust(&mut self, delta: i64) -> i64 {
        self.capital = self.capital.saturating_add(delta);
        self.capital
    }

    /// Balance for an agent; agents start at zero.
    pub fn agent_balance(&self, agent: AgentId) -> i64 {
        self.agents.get(&agent).copied().unwrap_or(0)
    }

    /// Apply a signed delta to an agent's balance. Returns the new balance.
    pub fn adjust_agent(&mut self, agent: AgentId, delta: i64) -> i64 {
        let balance = self.agents.entry(agent).or_insert(0);
        *balance = balance.saturating_add(delta);
        *balance
    }

    /// Agent balances in agent-id order.
    pub fn agents(&self) -> impl Iterator<Item = (AgentId, i64)> + '_ {
        self.agents.iter().map(|(agent, balance)| (*agent, *balance))
    }
}
