use std::fmt;

use bevy::prelude::Resource;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::MetaError;

/// Research points and community points attached to a response option.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceCost {
    pub rp: u32,
    pub cp: u32,
}

impl ResourceCost {
    pub const FREE: ResourceCost = ResourceCost { rp: 0, cp: 0 };

    pub fn new(rp: u32, cp: u32) -> Self {
        Self { rp, cp }
    }

    pub fn is_free(&self) -> bool {
        self.rp == 0 && self.cp == 0
    }

    /// True when every component of `cost` fits inside `self`.
    pub fn covers(&self, cost: &ResourceCost) -> bool {
        self.rp >= cost.rp && self.cp >= cost.cp
    }
}

impl fmt::Display for ResourceCost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} RP / {} CP", self.rp, self.cp)
    }
}

/// Resource affordability and spending supplied by the host game.
pub trait ResourceWallet: Send + Sync + fmt::Debug {
    fn can_spend(&self, cost: &ResourceCost) -> bool {
        self.available().covers(cost)
    }

    /// Deducts `cost` or fails with [`MetaError::InsufficientResources`]
    /// leaving the balance untouched.
    fn spend(&mut self, cost: &ResourceCost) -> Result<(), MetaError>;

    fn available(&self) -> ResourceCost;
}

/// In-memory wallet used by the driver binary and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourcePool {
    pub rp: u32,
    pub cp: u32,
}

impl ResourcePool {
    pub fn new(rp: u32, cp: u32) -> Self {
        Self { rp, cp }
    }

    pub fn grant(&mut self, amount: ResourceCost) {
        self.rp = self.rp.saturating_add(amount.rp);
        self.cp = self.cp.saturating_add(amount.cp);
    }
}

impl ResourceWallet for ResourcePool {
    fn spend(&mut self, cost: &ResourceCost) -> Result<(), MetaError> {
        if cost.is_free() {
            return Ok(());
        }
        if !self.can_spend(cost) {
            return Err(MetaError::InsufficientResources {
                required: *cost,
                available: self.available(),
            });
        }
        self.rp -= cost.rp;
        self.cp -= cost.cp;
        debug!(
            target: "meta_sim::wallet",
            rp = cost.rp,
            cp = cost.cp,
            remaining_rp = self.rp,
            remaining_cp = self.cp,
            "wallet.spent"
        );
        Ok(())
    }

    fn available(&self) -> ResourceCost {
        ResourceCost::new(self.rp, self.cp)
    }
}

/// Wallet the event resolver charges response costs against.
#[derive(Resource, Debug)]
pub struct PlayerResources(pub Box<dyn ResourceWallet>);

impl PlayerResources {
    pub fn new(wallet: impl ResourceWallet + 'static) -> Self {
        Self(Box::new(wallet))
    }

    pub fn wallet(&self) -> &dyn ResourceWallet {
        self.0.as_ref()
    }

    pub fn wallet_mut(&mut self) -> &mut dyn ResourceWallet {
        self.0.as_mut()
    }

    pub fn replace(&mut self, wallet: Box<dyn ResourceWallet>) {
        self.0 = wallet;
    }
}

impl Default for PlayerResources {
    fn default() -> Self {
        Self::new(ResourcePool::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spend_deducts_both_pools() {
        let mut pool = ResourcePool::new(5, 2);
        pool.spend(&ResourceCost::new(3, 2)).unwrap();
        assert_eq!(pool.available(), ResourceCost::new(2, 0));
    }

    #[test]
    fn failed_spend_leaves_balance() {
        let mut pool = ResourcePool::new(2, 9);
        let err = pool.spend(&ResourceCost::new(3, 0)).unwrap_err();
        assert_eq!(
            err,
            MetaError::InsufficientResources {
                required: ResourceCost::new(3, 0),
                available: ResourceCost::new(2, 9),
            }
        );
        assert_eq!(pool.available(), ResourceCost::new(2, 9));
    }

    #[test]
    fn free_cost_succeeds_on_empty_pool() {
        let mut pool = ResourcePool::default();
        assert!(ResourceCost::default().is_free());
        pool.spend(&ResourceCost::default()).unwrap();
        assert_eq!(pool.available(), ResourceCost::new(0, 0));
    }

    #[test]
    fn grant_saturates() {
        let mut pool = ResourcePool::new(u32::MAX - 1, 0);
        pool.grant(ResourceCost::new(5, 1));
        assert_eq!(pool.rp, u32::MAX);
        assert_eq!(pool.cp, 1);
    }
}
