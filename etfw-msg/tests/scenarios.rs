// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! End-to-end scenarios for the broker/pipe/pool trio (spec.md §8, S1–S4),
//! driven entirely through the public `etfw_msg` API.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use etfw_core::Describable;
use etfw_msg::{Broker, Message, MessageHandler, Pipe, QueuedPipe, SyncPipe};

#[derive(Clone, Copy)]
struct A;
impl Describable for A {
    const ID: u32 = 0x01_01_00;
}
impl Message for A {}

#[derive(Clone, Copy)]
struct B;
impl Describable for B {
    const ID: u32 = 0x01_01_01;
}
impl Message for B {}

#[derive(Clone, Copy)]
struct C;
impl Describable for C {
    const ID: u32 = 0x01_01_02;
}
impl Message for C {}

struct Counter(Arc<AtomicU32>);
impl MessageHandler for Counter {
    fn handle(&self, _msg: &dyn etfw_msg::AnyMessage) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn counter() -> (Counter, Arc<AtomicU32>) {
    let hits = Arc::new(AtomicU32::new(0));
    (Counter(hits.clone()), hits)
}

#[test]
fn s1_single_sync_delivery() {
    let broker: Broker<4> = Broker::new();
    let (handler, hits) = counter();
    let p1 = Arc::new(SyncPipe::with_subscription(0, handler, [A::ID]));
    broker.register_pipe(p1);

    broker.send(A).ok();

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    let stats = broker.pool_stats();
    assert_eq!(stats.in_use, 0);
    assert_eq!(stats.alloc_count, 1);
    assert_eq!(stats.release_count, 1);
}

#[test]
fn s2_multicast_to_matching_subscribers_only() {
    let broker: Broker<8> = Broker::new();
    let (h1, hits1) = counter();
    let (h2, hits2) = counter();
    let (h3, hits3) = counter();

    let p1 = Arc::new(SyncPipe::with_subscription(0, h1, [A::ID, B::ID]));
    let p2 = Arc::new(SyncPipe::with_subscription(0, h2, [B::ID]));
    let p3 = Arc::new(SyncPipe::with_subscription(0, h3, [C::ID]));
    broker.register_pipe(p1);
    broker.register_pipe(p2);
    broker.register_pipe(p3);

    broker.send(A).ok();
    assert_eq!(hits1.load(Ordering::SeqCst), 1);
    assert_eq!(hits2.load(Ordering::SeqCst), 0);
    assert_eq!(hits3.load(Ordering::SeqCst), 0);

    broker.send(B).ok();
    assert_eq!(hits1.load(Ordering::SeqCst), 2);
    assert_eq!(hits2.load(Ordering::SeqCst), 1);
    assert_eq!(hits3.load(Ordering::SeqCst), 0);

    broker.send(C).ok();
    assert_eq!(hits1.load(Ordering::SeqCst), 2);
    assert_eq!(hits2.load(Ordering::SeqCst), 1);
    assert_eq!(hits3.load(Ordering::SeqCst), 1);

    assert_eq!(broker.pool_stats().in_use, 0);
}

#[test]
fn s3_queued_pipe_overflow_drops_and_pool_tracks_in_use() {
    let broker: Broker<8> = Broker::new();
    let (handler, hits) = counter();
    let q = Arc::new(QueuedPipe::<_, 5>::with_subscription(0, handler, [A::ID]));
    broker.register_pipe(q.clone());

    for _ in 0..6 {
        broker.send(A).ok();
    }

    assert_eq!(q.queue_len(), 5);
    assert_eq!(q.drops(), 1);
    assert_eq!(broker.pool_stats().in_use, 5);

    q.process_queue(Duration::from_millis(10));

    assert_eq!(q.queue_len(), 0);
    assert_eq!(hits.load(Ordering::SeqCst), 5);
    assert_eq!(broker.pool_stats().in_use, 0);
}

#[test]
fn s4_subscription_mutation_takes_effect_on_next_send() {
    let broker: Broker<8> = Broker::new();
    let (handler, hits) = counter();
    let q = Arc::new(QueuedPipe::<_, 4>::with_subscription(0, handler, [A::ID]));
    broker.register_pipe(q.clone());

    broker.send(A).ok();
    q.process_queue(Duration::from_millis(10));
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    q.unsubscribe(A::ID);
    broker.send(A).ok();
    q.process_queue(Duration::from_millis(10));
    assert_eq!(hits.load(Ordering::SeqCst), 1, "unsubscribed id must not be delivered");

    q.subscribe(B::ID);
    broker.send(B).ok();
    q.process_queue(Duration::from_millis(10));
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    assert_eq!(broker.pool_stats().in_use, 0);
}

#[test]
fn concurrent_senders_serialize_through_the_broker_lock() {
    let broker: Arc<Broker<64>> = Arc::new(Broker::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    struct Recorder(Arc<Mutex<Vec<u32>>>);
    impl MessageHandler for Recorder {
        fn handle(&self, msg: &dyn etfw_msg::AnyMessage) {
            self.0.lock().unwrap().push(msg.id());
        }
    }
    let pipe = Arc::new(SyncPipe::with_subscription(0, Recorder(seen.clone()), [A::ID]));
    broker.register_pipe(pipe as Arc<dyn Pipe>);

    let threads: Vec<_> = (0..8)
        .map(|_| {
            let broker = broker.clone();
            std::thread::spawn(move || {
                for _ in 0..10 {
                    broker.send(A).ok();
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    assert_eq!(seen.lock().unwrap().len(), 80);
    assert_eq!(broker.stats().num_send_calls, 80);
    assert_eq!(broker.pool_stats().in_use, 0);
}
