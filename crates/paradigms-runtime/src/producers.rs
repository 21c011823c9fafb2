//! Paced producers
//!
//! Each producer returns an unbuffered channel immediately and starts a task
//! that waits out its pacing, emits its values in order, and closes the
//! channel. Delays are drawn when the producer is created, from a generator
//! seeded by the runtime config, so a seeded run always paces the same way.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use paradigms_csp::{go, sleep, Channel};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::catalog::Catalog;
use crate::config::{PacingConfig, ProducerPacing, RuntimeConfig};

/// Factory for the channels the examples consume
#[derive(Clone)]
pub struct Producers {
    catalog: Arc<Catalog>,
    pacing: Arc<PacingConfig>,
    rng: Arc<Mutex<fastrand::Rng>>,
}

impl Debug for Producers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producers")
            .field("catalog", &self.catalog)
            .field("pacing", &self.pacing)
            .finish()
    }
}

impl Producers {
    pub fn new(config: &RuntimeConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        Self {
            catalog: Arc::new(config.catalog.clone()),
            pacing: Arc::new(config.pacing.clone()),
            rng: Arc::new(Mutex::new(rng)),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// `start..=end`, one value per `numbers` pacing step
    pub fn numbers(&self, start: u32, end: u32) -> Channel<u32> {
        self.emit("numbers", (start..=end).collect(), self.pacing.numbers)
    }

    /// Every catalog category name, in table order
    pub fn categories(&self) -> Channel<String> {
        self.emit(
            "categories",
            self.catalog.category_names(),
            self.pacing.categories,
        )
    }

    /// Every item listed under `category`; an unknown category closes empty
    pub fn items_in_category(&self, category: &str) -> Channel<String> {
        self.emit(
            "items",
            self.catalog.items_in(category).to_vec(),
            *self.pacing.items_for(category),
        )
    }

    fn emit<T>(&self, producer: &'static str, values: Vec<T>, pacing: ProducerPacing) -> Channel<T>
    where
        T: Debug + Send + 'static,
    {
        let (initial, steps) = {
            let mut rng = self.rng.lock();
            let initial = pacing.initial.sample(&mut rng);
            let steps: Vec<Duration> = values
                .iter()
                .map(|_| pacing.per_item.sample(&mut rng))
                .collect();
            (initial, steps)
        };

        let out = Channel::unbuffered();
        let tx = out.clone();
        debug!(producer, channel = %out.id(), values = values.len(), initial_ms = u64::try_from(initial.as_millis()).unwrap_or(u64::MAX), "producer started");
        go(async move {
            pause(initial).await;
            for (value, step) in values.into_iter().zip(steps) {
                pause(step).await;
                trace!(producer, channel = %tx.id(), ?value, "producing");
                tx.send(value).await;
            }
            tx.close();
        });
        out
    }
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        sleep(duration).await;
    }
}
