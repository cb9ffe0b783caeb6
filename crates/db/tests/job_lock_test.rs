//! Integration tests for the database job lock.

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use pillar_core::jobs::{JobLock, LockLease};
use pillar_db::SeaJobLock;
use pillar_shared::FixedClock;
use uuid::Uuid;

use common::setup;

fn lease() -> LockLease {
    LockLease::new(Duration::minutes(10), Duration::minutes(1))
}

fn job_name() -> String {
    format!("test-job-{}", Uuid::new_v4().simple())
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_only_one_instance_holds_the_lock() {
    let Some(db) = setup().await else { return };
    let clock = Arc::new(FixedClock::new(Utc::now()));
    let node_a = SeaJobLock::new(db.clone(), "node-a", clock.clone());
    let node_b = SeaJobLock::new(db, "node-b", clock.clone());
    let name = job_name();

    let held = node_a.try_acquire(&name, lease()).await.unwrap();
    assert!(held.is_some());
    assert!(node_b.try_acquire(&name, lease()).await.unwrap().is_none());

    clock.advance(Duration::minutes(11));
    let taken_over = node_b.try_acquire(&name, lease()).await.unwrap();
    assert_eq!(taken_over.unwrap().locked_by, "node-b");
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_release_honours_minimum_lease() {
    let Some(db) = setup().await else { return };
    let clock = Arc::new(FixedClock::new(Utc::now()));
    let node_a = SeaJobLock::new(db.clone(), "node-a", clock.clone());
    let node_b = SeaJobLock::new(db, "node-b", clock.clone());
    let name = job_name();

    let held = node_a.try_acquire(&name, lease()).await.unwrap().unwrap();
    clock.advance(Duration::seconds(10));
    node_a.release(&held, lease()).await.unwrap();
    assert!(node_b.try_acquire(&name, lease()).await.unwrap().is_none());

    clock.advance(Duration::seconds(50));
    assert!(node_b.try_acquire(&name, lease()).await.unwrap().is_some());
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_stale_release_does_not_free_new_holder() {
    let Some(db) = setup().await else { return };
    let clock = Arc::new(FixedClock::new(Utc::now()));
    let node_a = SeaJobLock::new(db.clone(), "node-a", clock.clone());
    let node_b = SeaJobLock::new(db, "node-b", clock.clone());
    let name = job_name();

    let stale = node_a.try_acquire(&name, lease()).await.unwrap().unwrap();
    clock.advance(Duration::minutes(11));
    node_b.try_acquire(&name, lease()).await.unwrap().unwrap();

    node_a.release(&stale, lease()).await.unwrap();
    assert!(node_a.try_acquire(&name, lease()).await.unwrap().is_none());
}
