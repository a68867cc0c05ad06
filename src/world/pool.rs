use crate::world::chunk_coord::ChunkCoord;
use crate::world::generator::carve_mask;
use crossbeam_channel::{unbounded, Receiver, Sender, TrySendError};
use std::collections::VecDeque;
use std::thread;

#[derive(Debug, Clone, Copy)]
pub struct CaveJob {
    pub seed: u32,
    pub coord: ChunkCoord,
}

#[derive(Debug)]
pub struct CaveResult {
    pub coord: ChunkCoord,
    pub mask: Vec<u64>,
}

struct Worker {
    job_tx: Sender<CaveJob>,
}

/// Fixed pool of stateless cave workers: a job is `(seed, coord)` in and a
/// carve bitmask out, with no shared state beyond the immutable seed. Idle
/// workers sit on a LIFO free list; overflow jobs wait in a FIFO queue. A
/// job whose worker dies is retried once on another worker, then carved
/// synchronously so the pipeline never stalls.
pub struct WorkerPool {
    workers: Vec<Worker>,
    idle: Vec<usize>,
    pending: VecDeque<CaveJob>,
    result_rx: Receiver<(usize, CaveResult)>,
    retried: Vec<ChunkCoord>,
    fallback_results: Vec<CaveResult>,
}

impl WorkerPool {
    /// `threads == 0` sizes the pool to the hardware: available
    /// parallelism minus one for the logic thread, at least one.
    pub fn new(threads: usize) -> Self {
        let count = if threads > 0 {
            threads
        } else {
            thread::available_parallelism()
                .map(|n| n.get().saturating_sub(1).max(1))
                .unwrap_or(1)
        };
        let (result_tx, result_rx) = unbounded();
        let mut workers = Vec::with_capacity(count);
        for index in 0..count {
            let (job_tx, job_rx) = unbounded::<CaveJob>();
            let result_tx = result_tx.clone();
            thread::Builder::new()
                .name(format!("cave-worker-{}", index + 1))
                .spawn(move || {
                    while let Ok(job) = job_rx.recv() {
                        let mask = carve_mask(job.seed, job.coord);
                        let result = CaveResult {
                            coord: job.coord,
                            mask,
                        };
                        if result_tx.send((index, result)).is_err() {
                            return;
                        }
                    }
                })
                .expect("failed to spawn cave worker");
            workers.push(Worker { job_tx });
        }
        log::info!("cave worker pool started with {} workers", count);
        Self {
            workers,
            idle: (0..count).rev().collect(),
            pending: VecDeque::new(),
            result_rx,
            retried: Vec::new(),
            fallback_results: Vec::new(),
        }
    }

    /// Dispatches to an idle worker or queues for the next free one.
    pub fn submit(&mut self, job: CaveJob) {
        if let Some(index) = self.idle.pop() {
            self.dispatch(index, job);
        } else {
            self.pending.push_back(job);
        }
    }

    fn dispatch(&mut self, index: usize, job: CaveJob) {
        match self.workers[index].job_tx.try_send(job) {
            Ok(()) => {}
            Err(TrySendError::Disconnected(job)) | Err(TrySendError::Full(job)) => {
                self.recover(job);
            }
        }
    }

    /// Worker failure path: retry the job once elsewhere, then fall back to
    /// carving on the calling thread.
    fn recover(&mut self, job: CaveJob) {
        if !self.retried.contains(&job.coord) {
            log::warn!("cave worker failed for {:?}, retrying", job.coord);
            self.retried.push(job.coord);
            if let Some(index) = self.idle.pop() {
                self.dispatch(index, job);
            } else {
                self.pending.push_back(job);
            }
        } else {
            log::error!("cave workers unavailable, carving {:?} in-thread", job.coord);
            let mask = carve_mask(job.seed, job.coord);
            self.pending.retain(|j| j.coord != job.coord);
            self.fallback_results.push(CaveResult {
                coord: job.coord,
                mask,
            });
        }
    }

    /// Drains finished carve results and feeds queued jobs to the workers
    /// they free up.
    pub fn poll(&mut self) -> Vec<CaveResult> {
        let mut results = std::mem::take(&mut self.fallback_results);
        while let Ok((index, result)) = self.result_rx.try_recv() {
            if let Some(job) = self.pending.pop_front() {
                self.dispatch(index, job);
            } else {
                self.idle.push(index);
            }
            results.push(result);
        }
        results
    }

    pub fn busy_count(&self) -> usize {
        self.workers.len() - self.idle.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::generator::CARVE_WORDS;
    use std::time::{Duration, Instant};

    fn collect_results(pool: &mut WorkerPool, want: usize) -> Vec<CaveResult> {
        let deadline = Instant::now() + Duration::from_secs(30);
        let mut results = Vec::new();
        while results.len() < want && Instant::now() < deadline {
            results.extend(pool.poll());
            thread::sleep(Duration::from_millis(5));
        }
        results
    }

    #[test]
    fn test_submit_and_poll_round_trip() {
        let mut pool = WorkerPool::new(2);
        let coord = ChunkCoord::new(1, 2);
        pool.submit(CaveJob { seed: 7, coord });
        let results = collect_results(&mut pool, 1);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].coord, coord);
        assert_eq!(results[0].mask.len(), CARVE_WORDS);
        assert_eq!(results[0].mask, carve_mask(7, coord));
    }

    #[test]
    fn test_overflow_jobs_queue_and_drain() {
        let mut pool = WorkerPool::new(1);
        for i in 0..4 {
            pool.submit(CaveJob {
                seed: 1,
                coord: ChunkCoord::new(i, 0),
            });
        }
        assert!(pool.pending_count() >= 2);
        let results = collect_results(&mut pool, 4);
        assert_eq!(results.len(), 4);
        assert_eq!(pool.pending_count(), 0);
    }
}
