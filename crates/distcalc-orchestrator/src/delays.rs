//! Per-owner artificial operator delays.
//!
//! Each owner has a delay for every operator. Owners that never configured
//! anything get the orchestrator's default delay for all four operators.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use distcalc_common::{Operator, OperatorError, OwnerId};
use tokio::sync::RwLock;

/// Delay per operator for one owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorDelays(BTreeMap<Operator, Duration>);

impl OperatorDelays {
    /// The same delay for every operator.
    pub fn uniform(delay: Duration) -> Self {
        Self(Operator::ALL.iter().map(|op| (*op, delay)).collect())
    }

    /// An empty table. Evaluation fails on the first operator it meets.
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, op: Operator) -> Option<Duration> {
        self.0.get(&op).copied()
    }

    pub fn set(&mut self, op: Operator, delay: Duration) {
        self.0.insert(op, delay);
    }

    /// Symbol to milliseconds, as sent over the wire.
    pub fn to_millis_map(&self) -> BTreeMap<String, u64> {
        self.0
            .iter()
            .map(|(op, delay)| (op.symbol().to_string(), delay.as_millis() as u64))
            .collect()
    }
}

pub struct DelayTable {
    default_delay: Duration,
    owners: RwLock<HashMap<OwnerId, OperatorDelays>>,
}

impl DelayTable {
    pub fn new(default_delay: Duration) -> Self {
        Self {
            default_delay,
            owners: RwLock::new(HashMap::new()),
        }
    }

    /// The owner's table, or the default one.
    pub async fn delays_for(&self, owner: OwnerId) -> OperatorDelays {
        self.owners
            .read()
            .await
            .get(&owner)
            .cloned()
            .unwrap_or_else(|| OperatorDelays::uniform(self.default_delay))
    }

    pub async fn delay_for(&self, owner: OwnerId, op: Operator) -> Option<Duration> {
        match self.owners.read().await.get(&owner) {
            Some(delays) => delays.get(op),
            None => Some(self.default_delay),
        }
    }

    /// Merges `updates` (operator symbol to milliseconds) into the owner's
    /// table and returns the result.
    ///
    /// All keys are checked before anything is written, so one unknown
    /// operator rejects the whole update.
    pub async fn set_delays(
        &self,
        owner: OwnerId,
        updates: &BTreeMap<String, u64>,
    ) -> Result<OperatorDelays, OperatorError> {
        let parsed = updates
            .iter()
            .map(|(symbol, ms)| Ok((symbol.parse::<Operator>()?, Duration::from_millis(*ms))))
            .collect::<Result<Vec<_>, OperatorError>>()?;

        let mut owners = self.owners.write().await;
        let delays = owners
            .entry(owner)
            .or_insert_with(|| OperatorDelays::uniform(self.default_delay));
        for (op, delay) in parsed {
            delays.set(op, delay);
        }
        Ok(delays.clone())
    }

    /// Replaces the owner's table wholesale.
    pub async fn replace(&self, owner: OwnerId, delays: OperatorDelays) {
        self.owners.write().await.insert(owner, delays);
    }
}
