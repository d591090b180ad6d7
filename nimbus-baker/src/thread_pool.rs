//! Execution of job graphs across worker threads.

use crate::job_graph::{Job, JobError, JobGraph, JobGraphError, JobId, JobNode};
use slotmap::SlotMap;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;

/// A pool of worker threads that executes [`JobGraph`]s.
///
/// Workers are scoped to a single call to [`Self::process`], so jobs may borrow data owned by the caller.
#[derive(Debug, Clone, Copy)]
pub struct ThreadPool {
    num_threads: usize,
}

impl ThreadPool {
    /// Creates a thread pool running up to `num_threads` jobs at once. Zero is treated as one.
    pub fn new(num_threads: usize) -> Self {
        Self {
            num_threads: num_threads.max(1),
        }
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Runs every job of `job_graph`, respecting dependencies, and blocks until all of them have completed.
    ///
    /// The graph is empty when this returns.
    ///
    /// # Errors
    ///
    /// - [`JobGraphError::JobFailed`] with the first failure if any job fails (or panics).
    ///   No new jobs are started after a failure; jobs already running are waited for.
    /// - [`JobGraphError::Cycle`] if some jobs could never become ready.
    pub fn process(&self, job_graph: &mut JobGraph<'_>) -> Result<(), JobGraphError> {
        let mut nodes = std::mem::take(&mut job_graph.nodes);
        if nodes.is_empty() {
            return Ok(());
        }

        let ready = nodes
            .iter()
            .filter(|(_, node)| node.num_dependencies == 0)
            .map(|(id, _)| id)
            .collect::<VecDeque<_>>();

        let num_workers = self.num_threads.min(nodes.len());
        log::trace!(
            "processing {} jobs on {} worker(s)",
            nodes.len(),
            num_workers
        );

        if num_workers == 1 {
            run_inline(&mut nodes, ready)
        } else {
            run_parallel(&mut nodes, ready, num_workers)
        }
    }
}

fn run_inline(
    nodes: &mut SlotMap<JobId, JobNode<'_>>,
    mut ready: VecDeque<JobId>,
) -> Result<(), JobGraphError> {
    let mut num_completed = 0;

    while let Some(id) = ready.pop_front() {
        if let Some(job) = nodes[id].job.take() {
            run_job(job)?;
        }

        num_completed += 1;
        release_dependents(nodes, id, &mut ready);
    }

    check_all_completed(nodes.len(), num_completed)
}

fn run_parallel<'a>(
    nodes: &mut SlotMap<JobId, JobNode<'a>>,
    mut ready: VecDeque<JobId>,
    num_workers: usize,
) -> Result<(), JobGraphError> {
    let (job_sender, job_receiver) = crossbeam_channel::unbounded::<(JobId, Job<'a>)>();
    let (done_sender, done_receiver) =
        crossbeam_channel::unbounded::<(JobId, Result<(), JobError>)>();

    std::thread::scope(|scope| {
        for _ in 0..num_workers {
            let job_receiver = job_receiver.clone();
            let done_sender = done_sender.clone();

            scope.spawn(move || {
                for (id, job) in job_receiver {
                    if done_sender.send((id, run_job(job))).is_err() {
                        break;
                    }
                }
            });
        }

        let mut num_in_flight = 0;
        let mut num_completed = 0;
        let mut first_error = None;

        loop {
            if first_error.is_none() {
                while let Some(id) = ready.pop_front() {
                    let Some(job) = nodes[id].job.take() else {
                        continue;
                    };

                    if job_sender.send((id, job)).is_err() {
                        first_error = Some(JobError::new("worker threads exited early"));
                        break;
                    }
                    num_in_flight += 1;
                }
            }

            if num_in_flight == 0 {
                break;
            }

            let Ok((id, result)) = done_receiver.recv() else {
                break;
            };
            num_in_flight -= 1;

            match result {
                Ok(()) => {
                    num_completed += 1;
                    release_dependents(nodes, id, &mut ready);
                }
                Err(error) => {
                    log::debug!("job failed, draining {num_in_flight} in-flight job(s): {error}");
                    first_error.get_or_insert(error);
                }
            }
        }

        // Disconnecting the job channel lets the workers exit.
        drop(job_sender);

        match first_error {
            Some(error) => Err(JobGraphError::JobFailed(error)),
            None => check_all_completed(nodes.len(), num_completed),
        }
    })
}

fn run_job(job: Job<'_>) -> Result<(), JobError> {
    std::panic::catch_unwind(AssertUnwindSafe(job))
        .unwrap_or_else(|_| Err(JobError::new("job panicked")))
}

fn release_dependents(
    nodes: &mut SlotMap<JobId, JobNode<'_>>,
    id: JobId,
    ready: &mut VecDeque<JobId>,
) {
    for dependent in std::mem::take(&mut nodes[id].dependents) {
        let node = &mut nodes[dependent];
        node.num_dependencies -= 1;
        if node.num_dependencies == 0 {
            ready.push_back(dependent);
        }
    }
}

fn check_all_completed(num_jobs: usize, num_completed: usize) -> Result<(), JobGraphError> {
    if num_completed < num_jobs {
        return Err(JobGraphError::Cycle {
            num_blocked: num_jobs - num_completed,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_empty_graph() {
        let mut graph = JobGraph::new();
        assert!(ThreadPool::new(4).process(&mut graph).is_ok());
    }

    #[test]
    fn test_runs_every_job() {
        for num_threads in [1, 4] {
            let counter = AtomicUsize::new(0);
            let mut graph = JobGraph::new();
            for _ in 0..32 {
                graph.add_job(|| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                });
            }

            ThreadPool::new(num_threads).process(&mut graph).unwrap();

            assert_eq!(counter.load(Ordering::SeqCst), 32);
            assert!(graph.is_empty());
        }
    }

    #[test]
    fn test_dependency_order() {
        for num_threads in [1, 3] {
            let order = Mutex::new(Vec::new());
            let mut graph = JobGraph::new();

            let traces = (0..4)
                .map(|i| {
                    let order = &order;
                    graph.add_job(move || {
                        order.lock().unwrap().push(format!("trace {i}"));
                        Ok(())
                    })
                })
                .collect::<Vec<_>>();
            graph
                .add_job_with_dependencies(&traces, || {
                    order.lock().unwrap().push("accumulate".to_string());
                    Ok(())
                })
                .unwrap();

            ThreadPool::new(num_threads).process(&mut graph).unwrap();
            drop(graph);

            let order = order.into_inner().unwrap();
            assert_eq!(order.len(), 5);
            assert_eq!(order.last().map(String::as_str), Some("accumulate"));
        }
    }

    #[test]
    fn test_jobs_borrow_mutably() {
        let mut buffers = vec![vec![0.0f32; 8]; 4];
        let mut graph = JobGraph::new();

        for (i, buffer) in buffers.iter_mut().enumerate() {
            graph.add_job(move || {
                buffer.fill(i as f32);
                Ok(())
            });
        }
        ThreadPool::new(2).process(&mut graph).unwrap();
        drop(graph);

        for (i, buffer) in buffers.iter().enumerate() {
            assert!(buffer.iter().all(|&value| value == i as f32));
        }
    }

    #[test]
    fn test_failure_skips_dependents() {
        for num_threads in [1, 2] {
            let ran_dependent = AtomicUsize::new(0);
            let mut graph = JobGraph::new();

            let failing = graph.add_job(|| Err(JobError::new("trace failed")));
            graph
                .add_job_with_dependencies(&[failing], || {
                    ran_dependent.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .unwrap();

            let result = ThreadPool::new(num_threads).process(&mut graph);

            assert_eq!(
                result,
                Err(JobGraphError::JobFailed(JobError::new("trace failed")))
            );
            assert_eq!(ran_dependent.load(Ordering::SeqCst), 0);
        }
    }

    #[test]
    fn test_panic_is_reported() {
        let mut graph = JobGraph::new();
        graph.add_job(|| Ok(()));
        graph.add_job(|| panic!("boom"));

        let result = ThreadPool::new(2).process(&mut graph);

        assert_eq!(
            result,
            Err(JobGraphError::JobFailed(JobError::new("job panicked")))
        );
    }

    #[test]
    fn test_cycle() {
        for num_threads in [1, 2] {
            let mut graph = JobGraph::new();
            let root = graph.add_job(|| Ok(()));
            let a = graph.add_job(|| Ok(()));
            let b = graph.add_job(|| Ok(()));
            graph.add_dependency(a, b).unwrap();
            graph.add_dependency(b, a).unwrap();
            graph.add_dependency(a, root).unwrap();

            let result = ThreadPool::new(num_threads).process(&mut graph);

            assert_eq!(result, Err(JobGraphError::Cycle { num_blocked: 2 }));
        }
    }
}
