use crate::console::Console;
use crate::raster::{RasterJob, Rasterize};
use anyhow::{Result, anyhow};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    Started { source: PathBuf },
    Done { source: PathBuf, output: PathBuf },
    Failed { source: PathBuf, error: String },
    Finished(Summary),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub succeeded: usize,
    pub failures: Vec<Failure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub source: PathBuf,
    pub error: String,
}

impl Summary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct Worker {
    jobs: Option<mpsc::Sender<RasterJob>>,
    handle: Option<JoinHandle<Summary>>,
}

impl Worker {
    pub fn spawn<R>(rasterizer: R, console: Console, events: mpsc::Sender<JobEvent>) -> Self
    where
        R: Rasterize + 'static,
    {
        let (jobs_tx, jobs_rx) = mpsc::channel::<RasterJob>();
        let handle = thread::spawn(move || {
            let mut summary = Summary::default();
            for job in jobs_rx {
                run_job(&rasterizer, &job, &console, &events, &mut summary);
            }
            console.push("Job(s) completed.");
            let _ = events.send(JobEvent::Finished(summary.clone()));
            summary
        });
        Self {
            jobs: Some(jobs_tx),
            handle: Some(handle),
        }
    }

    pub fn submit(&self, job: RasterJob) -> Result<()> {
        let jobs = self
            .jobs
            .as_ref()
            .ok_or_else(|| anyhow!("job queue is closed"))?;
        jobs.send(job).map_err(|_| anyhow!("worker has stopped"))
    }

    /// No further jobs; the worker exits once the queue drains.
    pub fn close(&mut self) {
        self.jobs.take();
    }

    pub fn finish(mut self) -> Result<Summary> {
        self.close();
        let handle = self
            .handle
            .take()
            .ok_or_else(|| anyhow!("worker already joined"))?;
        handle.join().map_err(|_| anyhow!("worker thread panicked"))
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_job<R: Rasterize>(
    rasterizer: &R,
    job: &RasterJob,
    console: &Console,
    events: &mpsc::Sender<JobEvent>,
    summary: &mut Summary,
) {
    summary.total += 1;
    console.push(format!("Rasterizing: {}", display_name(&job.source)));
    let _ = events.send(JobEvent::Started {
        source: job.source.clone(),
    });
    match rasterizer.rasterize(job) {
        Ok(output) => {
            summary.succeeded += 1;
            console.push(format!("  -> Done: {}", output.display()));
            let _ = events.send(JobEvent::Done {
                source: job.source.clone(),
                output,
            });
        }
        Err(err) => {
            tracing::warn!(source = %job.source.display(), error = %err, "rasterization failed");
            let error = err.to_string();
            console.push(format!("  -> ERROR: {error}"));
            summary.failures.push(Failure {
                source: job.source.clone(),
                error: error.clone(),
            });
            let _ = events.send(JobEvent::Failed {
                source: job.source.clone(),
                error,
            });
        }
    }
}

pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
