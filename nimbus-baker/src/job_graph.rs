//! Dependency graphs of jobs.
//!
//! A [`JobGraph`] describes the work of one simulation dispatch: a set of jobs and the order
//! constraints between them. It is filled in by a [`ReflectionSimulator`] and executed by a
//! [`ThreadPool`].

use slotmap::SlotMap;

#[cfg(doc)]
use crate::simulator::ReflectionSimulator;
#[cfg(doc)]
use crate::thread_pool::ThreadPool;

slotmap::new_key_type! {
    /// Identifies a job in a [`JobGraph`].
    pub struct JobId;
}

/// A unit of work. Jobs may borrow data (typically energy fields) for the lifetime `'a` of the graph.
pub type Job<'a> = Box<dyn FnOnce() -> Result<(), JobError> + Send + 'a>;

pub(crate) struct JobNode<'a> {
    pub(crate) job: Option<Job<'a>>,
    pub(crate) dependents: Vec<JobId>,
    pub(crate) num_dependencies: usize,
}

/// A set of jobs with dependency edges.
///
/// A job only runs once every job it depends on has completed successfully.
#[derive(Default)]
pub struct JobGraph<'a> {
    pub(crate) nodes: SlotMap<JobId, JobNode<'a>>,
}

impl<'a> JobGraph<'a> {
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
        }
    }

    /// Adds a job with no dependencies.
    pub fn add_job<F>(&mut self, job: F) -> JobId
    where
        F: FnOnce() -> Result<(), JobError> + Send + 'a,
    {
        self.nodes.insert(JobNode {
            job: Some(Box::new(job)),
            dependents: Vec::new(),
            num_dependencies: 0,
        })
    }

    /// Adds a job that runs after all of `dependencies` have completed.
    ///
    /// # Errors
    ///
    /// Returns [`JobGraphError::UnknownJob`] if a dependency is not in the graph. The job is not added in that case.
    pub fn add_job_with_dependencies<F>(
        &mut self,
        dependencies: &[JobId],
        job: F,
    ) -> Result<JobId, JobGraphError>
    where
        F: FnOnce() -> Result<(), JobError> + Send + 'a,
    {
        if dependencies.iter().any(|id| !self.nodes.contains_key(*id)) {
            return Err(JobGraphError::UnknownJob);
        }

        let id = self.add_job(job);
        for &dependency in dependencies {
            self.add_dependency(id, dependency)?;
        }

        Ok(id)
    }

    /// Makes `job` wait for `dependency` to complete.
    ///
    /// # Errors
    ///
    /// Returns [`JobGraphError::UnknownJob`] if either job is not in the graph.
    pub fn add_dependency(&mut self, job: JobId, dependency: JobId) -> Result<(), JobGraphError> {
        if !self.nodes.contains_key(job) {
            return Err(JobGraphError::UnknownJob);
        }

        self.nodes
            .get_mut(dependency)
            .ok_or(JobGraphError::UnknownJob)?
            .dependents
            .push(job);
        self.nodes[job].num_dependencies += 1;

        Ok(())
    }

    /// Removes every job from the graph.
    pub fn reset(&mut self) {
        self.nodes.clear();
    }

    /// Returns the number of jobs in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl std::fmt::Debug for JobGraph<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobGraph")
            .field("num_jobs", &self.nodes.len())
            .finish()
    }
}

/// Error reported by a failing job.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("job failed: {message}")]
pub struct JobError {
    message: String,
}

impl JobError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// [`JobGraph`] errors.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum JobGraphError {
    /// A job id does not belong to the graph.
    #[error("unknown job")]
    UnknownJob,

    /// Some jobs can never run because their dependencies form a cycle.
    #[error("job graph contains a dependency cycle ({num_blocked} jobs blocked)")]
    Cycle { num_blocked: usize },

    /// A job failed; jobs depending on it were not run.
    #[error(transparent)]
    JobFailed(#[from] JobError),
}
