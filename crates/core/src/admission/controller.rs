//! Bounded-concurrency gate with a FIFO wait queue.

use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::debug;

use super::error::AdmissionError;
use super::types::{Admission, KeyStatus, PoolSnapshot};
use crate::metrics::{ADMISSION_REJECTIONS, POOL_QUEUED, POOL_RUNNING};

/// One bounded resource pool.
///
/// At most `capacity` tasks run at once. Further submissions wait in a FIFO
/// queue of at most `max_queue_depth` entries (`None` = unbounded); beyond
/// that they are rejected immediately with a snapshot of the pool.
///
/// All bookkeeping happens under a single mutex that is never held across an
/// `.await`, so a finishing task hands its slot to the queue head in the same
/// critical section that frees it.
pub struct AdmissionController {
    capacity: usize,
    max_queue_depth: Option<usize>,
    state: Arc<Mutex<PoolState>>,
}

struct PoolState {
    name: String,
    running: usize,
    running_keys: HashSet<String>,
    queue: VecDeque<Waiter>,
    next_waiter_id: u64,
    total_completed: u64,
    total_rejected: u64,
}

struct Waiter {
    id: u64,
    key: Option<String>,
    wake: oneshot::Sender<()>,
}

fn lock_state(state: &Mutex<PoolState>) -> MutexGuard<'_, PoolState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PoolState {
    fn contains_key(&self, key: &str) -> bool {
        self.running_keys.contains(key)
            || self.queue.iter().any(|w| w.key.as_deref() == Some(key))
    }

    fn occupy(&mut self, key: Option<&str>) {
        self.running += 1;
        if let Some(key) = key {
            self.running_keys.insert(key.to_string());
        }
    }

    /// Frees one slot and hands it straight to the queue head, if any.
    ///
    /// The slot is transferred even if the waiter has already gone away;
    /// its pending guard then releases it again.
    fn release(&mut self, key: Option<&str>, completed: bool) {
        self.running -= 1;
        if let Some(key) = key {
            self.running_keys.remove(key);
        }
        if completed {
            self.total_completed += 1;
        }

        if let Some(next) = self.queue.pop_front() {
            self.occupy(next.key.as_deref());
            debug!(
                "Pool {}: handing slot to {} (running={}, queued={})",
                self.name,
                next.key.as_deref().unwrap_or("anonymous"),
                self.running,
                self.queue.len()
            );
            let _ = next.wake.send(());
        }

        self.publish();
    }

    fn publish(&self) {
        POOL_RUNNING
            .with_label_values(&[&self.name])
            .set(self.running as i64);
        POOL_QUEUED
            .with_label_values(&[&self.name])
            .set(self.queue.len() as i64);
    }
}

/// Releases a running slot when dropped, whatever way the task ended.
struct SlotGuard {
    state: Arc<Mutex<PoolState>>,
    key: Option<String>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        lock_state(&self.state).release(self.key.as_deref(), true);
    }
}

/// Cleans up a queue entry whose caller stopped waiting.
struct PendingAdmission {
    state: Arc<Mutex<PoolState>>,
    id: u64,
    key: Option<String>,
    armed: bool,
}

impl Drop for PendingAdmission {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = lock_state(&self.state);
        match state.queue.iter().position(|w| w.id == self.id) {
            Some(index) => {
                state.queue.remove(index);
                state.publish();
            }
            // Already handed a slot that nobody will use.
            None => state.release(self.key.as_deref(), false),
        }
    }
}

impl AdmissionController {
    /// Creates a pool. A capacity of 0 is treated as 1.
    pub fn new(name: impl Into<String>, capacity: usize, max_queue_depth: Option<usize>) -> Self {
        let state = PoolState {
            name: name.into(),
            running: 0,
            running_keys: HashSet::new(),
            queue: VecDeque::new(),
            next_waiter_id: 0,
            total_completed: 0,
            total_rejected: 0,
        };
        state.publish();

        Self {
            capacity: capacity.max(1),
            max_queue_depth,
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Creates a pool with a bounded wait queue (0 = no queueing).
    pub fn bounded(name: impl Into<String>, capacity: usize, max_queue_depth: usize) -> Self {
        Self::new(name, capacity, Some(max_queue_depth))
    }

    /// Creates a pool whose submissions always wait and are never rejected.
    pub fn unbounded(name: impl Into<String>, capacity: usize) -> Self {
        Self::new(name, capacity, None)
    }

    /// Returns the maximum number of concurrently running tasks.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the queue limit (`None` = unbounded).
    pub fn max_queue_depth(&self) -> Option<usize> {
        self.max_queue_depth
    }

    /// Runs `task` under the pool's concurrency limit.
    ///
    /// The task starts immediately when a slot is free, otherwise after every
    /// earlier waiter. It receives the number of tasks that were running or
    /// queued at submission time. The slot is released when the task's future
    /// completes, panics or is dropped.
    pub async fn submit<F, Fut, T>(&self, key: Option<&str>, task: F) -> Result<T, AdmissionError>
    where
        F: FnOnce(Admission) -> Fut,
        Fut: Future<Output = T>,
    {
        let (slot, queue_ahead) = self.acquire(key).await?;
        let admission = Admission {
            queue_ahead,
            pool: self.snapshot(),
        };
        let output = task(admission).await;
        drop(slot);
        Ok(output)
    }

    async fn acquire(&self, key: Option<&str>) -> Result<(SlotGuard, usize), AdmissionError> {
        let key = key.map(str::to_string);

        let (id, wake_rx, queue_ahead) = {
            let mut state = lock_state(&self.state);

            if let Some(key) = key.as_deref() {
                if state.contains_key(key) {
                    return Err(AdmissionError::DuplicateKey(key.to_string()));
                }
            }

            let queue_ahead = state.running + state.queue.len();

            if state.running < self.capacity {
                state.occupy(key.as_deref());
                state.publish();
                debug!(
                    "Pool {}: starting {} (running={}, queued={})",
                    state.name,
                    key.as_deref().unwrap_or("anonymous"),
                    state.running,
                    state.queue.len()
                );
                let slot = SlotGuard {
                    state: Arc::clone(&self.state),
                    key,
                };
                return Ok((slot, queue_ahead));
            }

            let has_room = self
                .max_queue_depth
                .map_or(true, |max| state.queue.len() < max);
            if !has_room {
                state.total_rejected += 1;
                ADMISSION_REJECTIONS.with_label_values(&[&state.name]).inc();
                return Err(AdmissionError::Rejected(self.snapshot_of(&state)));
            }

            let id = state.next_waiter_id;
            state.next_waiter_id += 1;
            let (wake_tx, wake_rx) = oneshot::channel();
            state.queue.push_back(Waiter {
                id,
                key: key.clone(),
                wake: wake_tx,
            });
            state.publish();
            debug!(
                "Pool {}: queued {} (running={}, queued={})",
                state.name,
                key.as_deref().unwrap_or("anonymous"),
                state.running,
                state.queue.len()
            );
            (id, wake_rx, queue_ahead)
        };

        let mut pending = PendingAdmission {
            state: Arc::clone(&self.state),
            id,
            key,
            armed: true,
        };

        let woken = wake_rx.await;
        pending.armed = false;
        match woken {
            Ok(()) => {
                let slot = SlotGuard {
                    state: Arc::clone(&self.state),
                    key: pending.key.take(),
                };
                Ok((slot, queue_ahead))
            }
            Err(_) => Err(AdmissionError::Closed),
        }
    }

    /// Reports whether `key` is running, queued (with its position) or absent.
    pub fn status_of(&self, key: &str) -> KeyStatus {
        let state = lock_state(&self.state);

        if state.running_keys.contains(key) {
            return KeyStatus::Active {
                queued: state.queue.len(),
            };
        }

        match state
            .queue
            .iter()
            .position(|w| w.key.as_deref() == Some(key))
        {
            Some(index) => KeyStatus::Queued {
                ahead: state.running + index,
                position: index + 1,
                queued: state.queue.len(),
            },
            None => KeyStatus::NotFound,
        }
    }

    /// Returns the current pool statistics.
    pub fn snapshot(&self) -> PoolSnapshot {
        let state = lock_state(&self.state);
        self.snapshot_of(&state)
    }

    fn snapshot_of(&self, state: &PoolState) -> PoolSnapshot {
        PoolSnapshot {
            name: state.name.clone(),
            running: state.running,
            queued: state.queue.len(),
            capacity: self.capacity,
            max_queue_depth: self.max_queue_depth,
            total_completed: state.total_completed,
            total_rejected: state.total_rejected,
        }
    }
}

impl std::fmt::Debug for AdmissionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionController")
            .field("pool", &self.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::task::JoinHandle;

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..400 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    /// Occupies a slot under `key` until the returned sender fires.
    async fn hold_slot(
        controller: &Arc<AdmissionController>,
        key: &str,
    ) -> (oneshot::Sender<()>, JoinHandle<Result<(), AdmissionError>>) {
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let pool = Arc::clone(controller);
        let owned_key = key.to_string();
        let handle = tokio::spawn(async move {
            pool.submit(Some(&owned_key), move |_| async move {
                let _ = release_rx.await;
            })
            .await
        });
        wait_until(|| controller.status_of(key).is_present()).await;
        (release_tx, handle)
    }

    #[tokio::test]
    async fn test_runs_immediately_when_idle() {
        let controller = AdmissionController::bounded("test", 2, 0);

        let ahead = controller
            .submit(Some("job1"), |admission| async move { admission.queue_ahead })
            .await
            .unwrap();

        assert_eq!(ahead, 0);
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.running, 0);
        assert_eq!(snapshot.total_completed, 1);
        assert_eq!(controller.status_of("job1"), KeyStatus::NotFound);
    }

    #[tokio::test]
    async fn test_rejects_without_taking_a_slot() {
        let controller = Arc::new(AdmissionController::bounded("test", 1, 0));
        let (release, holder) = hold_slot(&controller, "holder").await;

        let ran = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ran);
        let result = controller
            .submit(Some("job2"), move |_| async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        assert_eq!(ran.load(Ordering::SeqCst), 0);
        match result {
            Err(AdmissionError::Rejected(snapshot)) => {
                assert_eq!(snapshot.running, 1);
                assert_eq!(snapshot.queued, 0);
                assert_eq!(snapshot.capacity, 1);
                assert_eq!(snapshot.max_queue_depth, Some(0));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
        assert_eq!(controller.snapshot().running, 1);
        assert_eq!(controller.snapshot().total_rejected, 1);

        release.send(()).unwrap();
        holder.await.unwrap().unwrap();
        assert_eq!(controller.snapshot().running, 0);
    }

    #[tokio::test]
    async fn test_waiters_start_in_fifo_order() {
        let controller = Arc::new(AdmissionController::bounded("test", 1, 10));
        let started = Arc::new(Mutex::new(Vec::new()));
        let (release, holder) = hold_slot(&controller, "holder").await;

        let mut handles = Vec::new();
        for name in ["a", "b", "c", "d"] {
            let pool = Arc::clone(&controller);
            let log = Arc::clone(&started);
            handles.push(tokio::spawn(async move {
                pool.submit(Some(name), move |admission| async move {
                    log.lock().unwrap().push(name);
                    admission.queue_ahead
                })
                .await
            }));
            wait_until(|| controller.status_of(name).is_present()).await;
        }

        assert_eq!(
            controller.status_of("c"),
            KeyStatus::Queued {
                ahead: 3,
                position: 3,
                queued: 4
            }
        );

        release.send(()).unwrap();
        holder.await.unwrap().unwrap();

        let mut aheads = Vec::new();
        for handle in handles {
            aheads.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(*started.lock().unwrap(), vec!["a", "b", "c", "d"]);
        assert_eq!(aheads, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_status_of_reports_active_and_queued() {
        let controller = Arc::new(AdmissionController::bounded("test", 1, 5));
        let (release, holder) = hold_slot(&controller, "first").await;

        let pool = Arc::clone(&controller);
        let waiter = tokio::spawn(async move { pool.submit(Some("second"), |_| async {}).await });
        wait_until(|| controller.status_of("second").is_present()).await;

        assert_eq!(controller.status_of("first"), KeyStatus::Active { queued: 1 });
        assert_eq!(
            controller.status_of("second"),
            KeyStatus::Queued {
                ahead: 1,
                position: 1,
                queued: 1
            }
        );
        assert_eq!(controller.status_of("unknown"), KeyStatus::NotFound);

        release.send(()).unwrap();
        holder.await.unwrap().unwrap();
        waiter.await.unwrap().unwrap();
        assert_eq!(controller.status_of("second"), KeyStatus::NotFound);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_running_never_exceeds_capacity() {
        let controller = Arc::new(AdmissionController::unbounded("test", 3));
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for i in 0..40 {
            let pool = Arc::clone(&controller);
            let current = Arc::clone(&current);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                let key = format!("job{}", i);
                pool.submit(Some(&key), move |_| async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                })
                .await
            }));
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.running, 0);
        assert_eq!(snapshot.queued, 0);
        assert_eq!(snapshot.total_completed, 40);
    }

    #[tokio::test]
    async fn test_queue_never_exceeds_max_depth() {
        let controller = Arc::new(AdmissionController::bounded("test", 1, 2));
        let (release, holder) = hold_slot(&controller, "holder").await;

        let mut waiters = Vec::new();
        let mut rejected = 0;
        for i in 0..5 {
            let key = format!("job{}", i);
            let pool = Arc::clone(&controller);
            let spawned_key = key.clone();
            let handle =
                tokio::spawn(async move { pool.submit(Some(&spawned_key), |_| async {}).await });
            // Give the submission a chance to either queue or fail.
            tokio::time::sleep(Duration::from_millis(20)).await;
            if handle.is_finished() {
                assert!(matches!(
                    handle.await.unwrap(),
                    Err(AdmissionError::Rejected(_))
                ));
                rejected += 1;
            } else {
                waiters.push(handle);
            }
            assert!(controller.snapshot().queued <= 2);
        }

        assert_eq!(waiters.len(), 2);
        assert_eq!(rejected, 3);

        release.send(()).unwrap();
        holder.await.unwrap().unwrap();
        for waiter in waiters {
            waiter.await.unwrap().unwrap();
        }
        assert_eq!(controller.snapshot().running, 0);
    }

    #[tokio::test]
    async fn test_duplicate_key_is_rejected() {
        let controller = Arc::new(AdmissionController::bounded("test", 2, 2));
        let (release, holder) = hold_slot(&controller, "job1").await;

        let result = controller.submit(Some("job1"), |_| async {}).await;
        assert!(matches!(result, Err(AdmissionError::DuplicateKey(k)) if k == "job1"));
        assert_eq!(controller.snapshot().running, 1);

        release.send(()).unwrap();
        holder.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_panicking_task_releases_slot() {
        let controller = Arc::new(AdmissionController::bounded("test", 1, 0));

        let pool = Arc::clone(&controller);
        let result = tokio::spawn(async move {
            pool.submit(Some("boom"), |_| async { panic!("task failed") })
                .await
        })
        .await;

        assert!(result.is_err());
        assert_eq!(controller.snapshot().running, 0);
        assert_eq!(controller.status_of("boom"), KeyStatus::NotFound);
        assert!(controller.submit(Some("next"), |_| async {}).await.is_ok());
    }

    #[tokio::test]
    async fn test_abandoned_waiter_leaves_queue() {
        let controller = Arc::new(AdmissionController::bounded("test", 1, 3));
        let (release, holder) = hold_slot(&controller, "holder").await;

        let pool = Arc::clone(&controller);
        let waiter = tokio::spawn(async move { pool.submit(Some("gone"), |_| async {}).await });
        wait_until(|| controller.status_of("gone").is_present()).await;

        waiter.abort();
        let _ = waiter.await;
        assert_eq!(controller.snapshot().queued, 0);
        assert_eq!(controller.status_of("gone"), KeyStatus::NotFound);

        release.send(()).unwrap();
        holder.await.unwrap().unwrap();
        assert_eq!(controller.snapshot().running, 0);
    }

    #[tokio::test]
    async fn test_unbounded_pool_never_rejects() {
        let controller = Arc::new(AdmissionController::unbounded("test", 1));
        let (release, holder) = hold_slot(&controller, "holder").await;

        let mut waiters = Vec::new();
        for i in 0..20 {
            let pool = Arc::clone(&controller);
            let key = format!("job{}", i);
            waiters.push(tokio::spawn(async move { pool.submit(Some(&key), |_| async {}).await }));
        }
        wait_until(|| controller.snapshot().queued == 20).await;
        assert_eq!(controller.snapshot().max_queue_depth, None);

        release.send(()).unwrap();
        holder.await.unwrap().unwrap();
        for waiter in waiters {
            waiter.await.unwrap().unwrap();
        }
        assert_eq!(controller.snapshot().total_rejected, 0);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let controller = AdmissionController::bounded("test", 0, 0);
        assert_eq!(controller.capacity(), 1);
    }
}
