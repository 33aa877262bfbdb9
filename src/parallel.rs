//! # Parallel
//!
//! An explicitly owned worker pool. Every batch blocks until all of its items
//! are done, so callers see a join barrier between dependent stages.
use rayon::prelude::*;
use rayon::ThreadPool;
use rayon::ThreadPoolBuilder;

use crate::error::VineError;

#[derive(Debug)]
enum PoolState {
  /// `num_threads <= 1`: work runs on the caller's thread.
  Inline,
  Running(ThreadPool),
  Stopped,
}

#[derive(Debug)]
pub struct WorkerPool {
  num_threads: usize,
  state: PoolState,
}

impl WorkerPool {
  pub fn new(num_threads: usize) -> Result<Self, VineError> {
    let state = if num_threads <= 1 {
      PoolState::Inline
    } else {
      let pool = ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()
        .map_err(|e| VineError::PoolStopped(format!("could not start {num_threads} workers: {e}")))?;
      PoolState::Running(pool)
    };

    Ok(Self {
      num_threads: num_threads.max(1),
      state,
    })
  }

  /// A pool that runs every batch on the caller's thread.
  pub fn inline() -> Self {
    Self {
      num_threads: 1,
      state: PoolState::Inline,
    }
  }

  /// Starts a pool, hands it to `f` and joins it once `f` returns.
  pub fn scoped<R, F>(num_threads: usize, f: F) -> Result<R, VineError>
  where
    F: FnOnce(&WorkerPool) -> Result<R, VineError>,
  {
    let mut pool = Self::new(num_threads)?;
    let result = f(&pool);
    pool.join();
    result
  }

  pub fn num_threads(&self) -> usize {
    self.num_threads
  }

  pub fn is_stopped(&self) -> bool {
    matches!(self.state, PoolState::Stopped)
  }

  /// Applies `f` to every item and returns the results in input order.
  pub fn map<T, R, F>(&self, items: Vec<T>, f: F) -> Result<Vec<R>, VineError>
  where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Send + Sync,
  {
    match &self.state {
      PoolState::Inline => Ok(items.into_iter().map(f).collect()),
      PoolState::Running(pool) => Ok(pool.install(|| items.into_par_iter().map(f).collect())),
      PoolState::Stopped => Err(VineError::PoolStopped(format!(
        "cannot map {} jobs on a joined pool",
        items.len()
      ))),
    }
  }

  /// Like [`WorkerPool::map`] for fallible jobs; the first error in input order wins.
  pub fn try_map<T, R, F>(&self, items: Vec<T>, f: F) -> Result<Vec<R>, VineError>
  where
    T: Send,
    R: Send,
    F: Fn(T) -> Result<R, VineError> + Send + Sync,
  {
    self.map(items, f)?.into_iter().collect()
  }

  /// Shuts the workers down. Any later batch fails with [`VineError::PoolStopped`].
  pub fn join(&mut self) {
    // Dropping the rayon pool lets its workers drain and exit.
    self.state = PoolState::Stopped;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn inline_and_threaded_agree() {
    let items: Vec<usize> = (0..1000).collect();
    let inline = WorkerPool::new(1).unwrap();
    let threaded = WorkerPool::new(4).unwrap();

    let a = inline.map(items.clone(), |i| (i as f64).sqrt()).unwrap();
    let b = threaded.map(items, |i| (i as f64).sqrt()).unwrap();

    assert_eq!(a, b);
    assert_eq!(threaded.num_threads(), 4);
    assert_eq!(WorkerPool::new(0).unwrap().num_threads(), 1);
  }

  #[test]
  fn try_map_propagates_first_error() {
    let pool = WorkerPool::new(3).unwrap();
    let res = pool.try_map((0..10).collect(), |i: i32| {
      if i >= 4 {
        Err(VineError::Estimation(format!("job {i}")))
      } else {
        Ok(i)
      }
    });
    assert_eq!(res, Err(VineError::Estimation("job 4".into())));
  }

  #[test]
  fn scoped_pool_runs_once() {
    let sum = WorkerPool::scoped(3, |pool| {
      let squares = pool.map((1..=4).collect(), |i: u64| i * i)?;
      Ok(squares.iter().sum::<u64>())
    })
    .unwrap();
    assert_eq!(sum, 30);

    let failed: Result<(), VineError> = WorkerPool::scoped(2, |_| Err(VineError::Estimation("stage".into())));
    assert_eq!(failed, Err(VineError::Estimation("stage".into())));
    assert_eq!(WorkerPool::inline().num_threads(), 1);
  }

  #[test]
  fn joined_pool_fails_fast() {
    let mut pool = WorkerPool::new(2).unwrap();
    pool.join();
    assert!(pool.is_stopped());
    let res = pool.map(vec![1, 2, 3], |i| i * 2);
    assert!(matches!(res, Err(VineError::PoolStopped(_))));
  }
}
