//! Durable job queue on Postgres with at-least-once delivery.
//!
//! Jobs are plain rows; pollers claim them with a skip-locked update, run
//! the registered handler and either delete the row or push it back with an
//! exponential retry delay.

mod client;
mod worker;

pub use client::{Enqueuer, Job, QueueClient, QueueError};
pub use worker::{JobHandler, WorkMap, WorkerPool};
