//! ---
//! jl_section: "04-orchestration"
//! jl_subsection: "module"
//! jl_type: "source"
//! jl_scope: "code"
//! jl_description: "Actor behaviours: event sending and catalog mutation."
//! jl_version: "v0.1.0"
//! jl_owner: "tbd"
//! ---
use std::time::Duration;

use async_trait::async_trait;
use jobload_transport::{EventEnvelope, EventRecord, Expectation};
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::debug;

use crate::context::HarnessContext;
use crate::outcome::checks;
use crate::scheduler::{ActorSlot, Behavior};
use crate::template::CatalogIdentifiers;
use crate::HarnessError;

pub const FIRST_NAME_LEN: usize = 8;
pub const LAST_NAME_LEN: usize = 10;
pub const MAX_AGE: u8 = 99;

fn random_string<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Posts one randomised event to the tenant's ingestion address per invocation.
#[derive(Debug, Clone, Default)]
pub struct EventSender {
    pacing: Duration,
}

impl EventSender {
    pub fn new(pacing: Duration) -> Self {
        Self { pacing }
    }

    pub fn payload<R: Rng + ?Sized>(rng: &mut R) -> EventEnvelope {
        EventEnvelope::single(EventRecord {
            first_name: random_string(rng, FIRST_NAME_LEN),
            last_name: random_string(rng, LAST_NAME_LEN),
            age: rng.gen_range(0..=MAX_AGE),
            extra: Default::default(),
        })
    }
}

#[async_trait]
impl Behavior for EventSender {
    fn pacing(&self) -> Duration {
        self.pacing
    }

    async fn perform(
        &self,
        _slot: &mut ActorSlot,
        context: &HarnessContext,
    ) -> Result<(), HarnessError> {
        let envelope = Self::payload(&mut rand::thread_rng());
        let reply = context
            .events()
            .send(context.tenant().id(), context.event_type(), &envelope)
            .await;
        context
            .recorder()
            .record(checks::EVENT_ACCEPTED, &reply.status, Expectation::HTTP_OK);
        Ok(())
    }
}

/// Submits a fresh copy of the package template under new identifiers per invocation.
#[derive(Debug, Clone)]
pub struct CatalogMutator {
    seed_bound: u32,
    pacing: Duration,
}

impl CatalogMutator {
    pub fn new(seed_bound: u32, pacing: Duration) -> Self {
        Self {
            seed_bound: seed_bound.max(1),
            pacing,
        }
    }

    pub fn identifiers<R: Rng + ?Sized>(&self, rng: &mut R, sequence: u64) -> CatalogIdentifiers {
        CatalogIdentifiers::derive(rng.gen_range(0..self.seed_bound), sequence)
    }
}

#[async_trait]
impl Behavior for CatalogMutator {
    fn pacing(&self) -> Duration {
        self.pacing
    }

    async fn perform(
        &self,
        slot: &mut ActorSlot,
        context: &HarnessContext,
    ) -> Result<(), HarnessError> {
        let ids = self.identifiers(&mut rand::thread_rng(), context.next_catalog_sequence());
        let document = context.fixture().template().mutated(&ids);
        let actor = slot.actor();
        let control = slot.control(context).await?;
        let reply = control.add_package(&document).await;
        debug!(actor, package = %ids.package_id, status = %reply.status, "catalog package submitted");
        context
            .recorder()
            .record(checks::CATALOG_PACKAGE, &reply.status, Expectation::RpcOk);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn event_payload_fields_stay_in_bounds() {
        let mut rng = StdRng::seed_from_u64(0x5EED);
        for _ in 0..1000 {
            let envelope = EventSender::payload(&mut rng);
            assert_eq!(envelope.data.len(), 1);
            let record = &envelope.data[0];
            assert_eq!(record.first_name.len(), FIRST_NAME_LEN);
            assert_eq!(record.last_name.len(), LAST_NAME_LEN);
            assert!(record.first_name.chars().all(|c| c.is_ascii_alphanumeric()));
            assert!(record.age <= MAX_AGE);
        }
    }

    #[test]
    fn catalog_identifiers_are_distinct_even_when_seeds_collide() {
        let mutator = CatalogMutator::new(2, Duration::ZERO);
        let mut rng = StdRng::seed_from_u64(1);
        let ids: HashSet<_> = (0..500)
            .map(|sequence| mutator.identifiers(&mut rng, sequence).package_id)
            .collect();
        assert_eq!(ids.len(), 500);
    }
}
