use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use st_domain::{ControllerId, ShipLock, ShipRequest, ShipSymbol};
use st_store::FrmBmcTrait;

use crate::clock::Clock;
use crate::ship_ops::ShipOps;

/// Ownership model: a ship has at most one owning controller with an integer
/// priority (higher wins), plus an orthogonal `blocked` flag marking an
/// uninterruptible span. Generic over `B: FrmBmcTrait` so production wiring
/// and tests share this one implementation, only swapping the backing store.
#[derive(Debug, Clone)]
pub struct FleetResourceManager<B: FrmBmcTrait> {
    bmc: Arc<B>,
    ship_ops: Arc<dyn ShipOps>,
    clock: Arc<dyn Clock>,
}

impl<B: FrmBmcTrait> FleetResourceManager<B> {
    pub fn new(bmc: Arc<B>, ship_ops: Arc<dyn ShipOps>, clock: Arc<dyn Clock>) -> Self {
        Self { bmc, ship_ops, clock }
    }

    /// `request(ship, controller, priority) -> bool`, per the five-step
    /// contract: blocked ships enqueue and refuse; an `IN_TRANSIT` ship with
    /// no owner self-heals before continuing; an idempotent re-request by the
    /// current owner succeeds; a strictly higher priority preempts; otherwise
    /// the per-ship request queue decides.
    pub async fn request(&self, ship_symbol: &ShipSymbol, controller: &ControllerId, priority: i32) -> Result<bool> {
        let mut lock = self.bmc.get_lock(ship_symbol).await?;

        if lock.blocked {
            self.enqueue(ship_symbol, controller, priority).await?;
            return Ok(false);
        }

        if lock.controller.is_none() {
            if let Ok(nav) = self.ship_ops.nav_of(ship_symbol).await {
                if nav.is_in_transit() {
                    // self-heal: a ship mid-flight with no recorded owner means
                    // the prior owner crashed without releasing; a fresh nav
                    // read clears any stale assumption before we hand it out.
                    let _ = self.ship_ops.refresh_ship(ship_symbol).await;
                }
            }
        }

        if lock.controller.as_ref() == Some(controller) {
            return Ok(true);
        }

        if lock.priority < priority {
            self.force_lock(&mut lock, controller, priority).await?;
            self.pop(ship_symbol, controller).await?;
            return Ok(true);
        }

        match self.bmc.peek_request_queue(ship_symbol).await? {
            None => {
                self.force_lock(&mut lock, controller, priority).await?;
                Ok(true)
            }
            Some(head) if &head.controller == controller => {
                self.force_lock(&mut lock, controller, priority).await?;
                self.pop(ship_symbol, controller).await?;
                Ok(true)
            }
            Some(_) => {
                self.enqueue(ship_symbol, controller, priority).await?;
                Ok(false)
            }
        }
    }

    async fn force_lock(&self, lock: &mut ShipLock, controller: &ControllerId, priority: i32) -> Result<()> {
        lock.controller = Some(controller.clone());
        lock.priority = priority;
        self.bmc.upsert_lock(lock.clone()).await
    }

    async fn enqueue(&self, ship_symbol: &ShipSymbol, controller: &ControllerId, priority: i32) -> Result<()> {
        self.bmc
            .enqueue_request(ShipRequest {
                ship_symbol: ship_symbol.clone(),
                controller: controller.clone(),
                priority,
                created_at: self.clock.now(),
            })
            .await
    }

    async fn pop(&self, ship_symbol: &ShipSymbol, controller: &ControllerId) -> Result<()> {
        self.bmc.pop_request(ship_symbol, controller).await
    }

    /// `release(ship, force)`: refuses on a blocked ship unless `force`;
    /// otherwise clears ownership atomically.
    pub async fn release(&self, ship_symbol: &ShipSymbol, force: bool) -> Result<bool> {
        let lock = self.bmc.get_lock(ship_symbol).await?;
        if lock.blocked && !force {
            return Ok(false);
        }
        self.bmc.upsert_lock(ShipLock::unowned(ship_symbol.clone())).await?;
        Ok(true)
    }

    /// `lock(ship, controller, priority)`: direct grant, refused if blocked.
    pub async fn lock(&self, ship_symbol: &ShipSymbol, controller: &ControllerId, priority: i32) -> Result<bool> {
        let lock = self.bmc.get_lock(ship_symbol).await?;
        if lock.blocked {
            return Ok(false);
        }
        self.bmc
            .upsert_lock(ShipLock {
                ship_symbol: ship_symbol.clone(),
                controller: Some(controller.clone()),
                priority,
                blocked: false,
            })
            .await?;
        Ok(true)
    }

    pub async fn set_blocked(&self, ship_symbol: &ShipSymbol, blocked: bool) -> Result<()> {
        let mut lock = self.bmc.get_lock(ship_symbol).await?;
        lock.blocked = blocked;
        self.bmc.upsert_lock(lock).await
    }

    /// Releases every ship currently owned by `controller`. Used by a
    /// controller's outer scope on normal exit, error, or cancellation, and
    /// by the entry point's SIGINT handler across all controllers.
    pub async fn release_fleet(&self, controller: &ControllerId, force: bool) -> Result<Vec<ShipSymbol>> {
        let locks = self.bmc.get_locks().await?;
        let mut released = Vec::new();
        for lock in locks {
            if lock.controller.as_ref() == Some(controller) && (force || !lock.blocked) {
                self.bmc.upsert_lock(ShipLock::unowned(lock.ship_symbol.clone())).await?;
                released.push(lock.ship_symbol);
            }
        }
        Ok(released)
    }

    /// Ships whose current owner is `null`, equal to `controller`, or holds
    /// strictly lower priority, and that are not `blocked`.
    pub async fn available_ships(&self, priority: i32, controller: Option<&ControllerId>) -> Result<Vec<ShipSymbol>> {
        let locks = self.bmc.get_locks().await?;
        Ok(locks
            .into_iter()
            .filter(|lock| !lock.blocked)
            .filter(|lock| match (&lock.controller, controller) {
                (None, _) => true,
                (Some(c), Some(requesting)) if c == requesting => true,
                _ => lock.priority < priority,
            })
            .map(|lock| lock.ship_symbol)
            .collect())
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::ship_ops::MockShipOps;
    use st_store::InMemoryFrmBmc;

    fn controller(name: &str) -> ControllerId {
        ControllerId(name.to_string())
    }

    fn ship(name: &str) -> ShipSymbol {
        ShipSymbol(name.to_string())
    }

    fn frm() -> FleetResourceManager<InMemoryFrmBmc> {
        let mut ops = MockShipOps::new();
        ops.expect_nav_of().returning(|_| Err(anyhow::anyhow!("no nav cached")));
        ops.expect_refresh_ship().returning(|_| Err(anyhow::anyhow!("no refresh")));
        FleetResourceManager::new(
            Arc::new(InMemoryFrmBmc::default()),
            Arc::new(ops),
            Arc::new(FakeClock::at(Utc::now())),
        )
    }

    #[tokio::test]
    async fn first_requester_is_granted_immediately() {
        let frm = frm();
        assert!(frm.request(&ship("S1"), &controller("A"), 100).await.unwrap());
    }

    #[tokio::test]
    async fn equal_priority_does_not_preempt() {
        let frm = frm();
        assert!(frm.request(&ship("S1"), &controller("A"), 100).await.unwrap());
        assert!(!frm.request(&ship("S1"), &controller("B"), 100).await.unwrap());
    }

    #[tokio::test]
    async fn strictly_higher_priority_preempts() {
        let frm = frm();
        assert!(frm.request(&ship("S1"), &controller("A"), 100).await.unwrap());
        assert!(frm.request(&ship("S1"), &controller("B"), 350).await.unwrap());
    }

    #[tokio::test]
    async fn requesting_controller_re_requesting_its_own_ship_is_idempotent() {
        let frm = frm();
        assert!(frm.request(&ship("S1"), &controller("A"), 100).await.unwrap());
        assert!(frm.request(&ship("S1"), &controller("A"), 100).await.unwrap());
    }

    #[tokio::test]
    async fn blocked_ship_refuses_and_enqueues() {
        let frm = frm();
        frm.set_blocked(&ship("S1"), true).await.unwrap();
        assert!(!frm.request(&ship("S1"), &controller("A"), 100).await.unwrap());
    }

    #[tokio::test]
    async fn release_clears_ownership_and_priority() {
        let frm = frm();
        frm.request(&ship("S1"), &controller("A"), 100).await.unwrap();
        assert!(frm.release(&ship("S1"), false).await.unwrap());
        let lock = frm.bmc.get_lock(&ship("S1")).await.unwrap();
        assert!(lock.controller.is_none());
        assert_eq!(lock.priority, -1);
    }

    #[tokio::test]
    async fn release_of_a_blocked_ship_requires_force() {
        let frm = frm();
        frm.request(&ship("S1"), &controller("A"), 100).await.unwrap();
        frm.set_blocked(&ship("S1"), true).await.unwrap();
        assert!(!frm.release(&ship("S1"), false).await.unwrap());
        assert!(frm.release(&ship("S1"), true).await.unwrap());
    }

    #[tokio::test]
    async fn release_fleet_only_releases_ships_owned_by_that_controller() {
        let frm = frm();
        frm.request(&ship("S1"), &controller("A"), 100).await.unwrap();
        frm.request(&ship("S2"), &controller("B"), 100).await.unwrap();
        let released = frm.release_fleet(&controller("A"), false).await.unwrap();
        assert_eq!(released, vec![ship("S1")]);
        assert_eq!(frm.bmc.get_lock(&ship("S2")).await.unwrap().controller, Some(controller("B")));
    }

    #[tokio::test]
    async fn queued_requester_is_granted_once_the_owner_releases() {
        let frm = frm();
        frm.request(&ship("S1"), &controller("A"), 100).await.unwrap();
        // B cannot preempt at equal priority, so it queues.
        assert!(!frm.request(&ship("S1"), &controller("B"), 100).await.unwrap());
        frm.release(&ship("S1"), false).await.unwrap();
        assert!(frm.request(&ship("S1"), &controller("B"), 100).await.unwrap());
    }

    #[tokio::test]
    async fn available_ships_excludes_blocked_and_higher_priority_owned_ships() {
        let frm = frm();
        frm.request(&ship("S1"), &controller("A"), 500).await.unwrap();
        frm.request(&ship("S2"), &controller("B"), 50).await.unwrap();
        frm.set_blocked(&ship("S2"), true).await.unwrap();

        let available = frm.available_ships(100, Some(&controller("C"))).await.unwrap();
        assert!(available.is_empty());
    }
}
