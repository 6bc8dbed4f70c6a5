//! Background task execution
//!
//! Backend calls run off the UI thread and report back over an mpsc channel.
//! The spawner is injectable so tests can decide when (and in which order)
//! queued work runs.

use std::thread;

pub type Job = Box<dyn FnOnce() + Send + 'static>;

pub trait Spawner {
    fn spawn(&self, job: Job);
}

/// One OS thread per task
pub struct ThreadSpawner;

impl Spawner for ThreadSpawner {
    fn spawn(&self, job: Job) {
        thread::spawn(job);
    }
}
