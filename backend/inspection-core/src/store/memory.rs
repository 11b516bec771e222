use crate::collaborators::Store;
use crate::error::store::StoreError;

use models::{Car, FeedbackEntry, QueuedCar};

use std::collections::HashMap;

use async_trait::async_trait;
use log::debug;
use tokio::sync::Mutex;

/// Process-local [`Store`]. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    cars: HashMap<String, Car>,
    queue: HashMap<String, QueuedCar>,
    queue_order: Vec<String>,
    feedback: Vec<FeedbackEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn car_count(&self) -> usize {
        self.inner.lock().await.cars.len()
    }

    pub async fn queue_len(&self) -> usize {
        self.inner.lock().await.queue.len()
    }

    pub async fn feedback(&self) -> Vec<FeedbackEntry> {
        self.inner.lock().await.feedback.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create(&self, car: Car) -> Result<(), StoreError> {
        let mut tables = self.inner.lock().await;
        if tables.cars.contains_key(&car.car_id) {
            return Err(StoreError::conflict(&car.car_id, "car already exists"));
        }
        debug!("Created car {}", car.car_id);
        tables.cars.insert(car.car_id.clone(), car);
        Ok(())
    }

    async fn upsert(&self, car: Car) -> Result<(), StoreError> {
        let mut tables = self.inner.lock().await;
        if let Some(existing) = tables.cars.get(&car.car_id) {
            if existing.is_terminal() && !existing.same_verdict(&car) {
                return Err(StoreError::conflict(
                    &car.car_id,
                    format!("verdict already final as {:?}", existing.outcome),
                ));
            }
        }
        tables.cars.insert(car.car_id.clone(), car);
        Ok(())
    }

    async fn find(&self, car_id: &str) -> Result<Option<Car>, StoreError> {
        Ok(self.inner.lock().await.cars.get(car_id).cloned())
    }

    async fn upsert_queued(&self, queued: QueuedCar) -> Result<(), StoreError> {
        let mut tables = self.inner.lock().await;
        if tables.queue.contains_key(&queued.car_id) {
            return Err(StoreError::conflict(&queued.car_id, "car already queued"));
        }
        tables.queue_order.push(queued.car_id.clone());
        tables.queue.insert(queued.car_id.clone(), queued);
        Ok(())
    }

    async fn find_queued(&self, car_id: &str) -> Result<Option<QueuedCar>, StoreError> {
        Ok(self.inner.lock().await.queue.get(car_id).cloned())
    }

    async fn pending_queue(&self) -> Result<Vec<QueuedCar>, StoreError> {
        let tables = self.inner.lock().await;
        Ok(tables
            .queue_order
            .iter()
            .filter_map(|id| tables.queue.get(id))
            .filter(|queued| !queued.is_processed)
            .cloned()
            .collect())
    }

    async fn mark_processed(&self, car_id: &str) -> Result<(), StoreError> {
        let mut tables = self.inner.lock().await;
        let queued = tables
            .queue
            .get_mut(car_id)
            .ok_or_else(|| StoreError::not_found(car_id))?;
        queued.is_processed = true;
        Ok(())
    }

    async fn append_feedback(&self, entry: FeedbackEntry) -> Result<(), StoreError> {
        self.inner.lock().await.feedback.push(entry);
        Ok(())
    }
}
