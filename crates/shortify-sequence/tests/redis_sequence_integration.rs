use std::collections::HashSet;
use std::sync::Arc;

use redis::AsyncCommands;
use shortify_sequence::{RedisSequence, SequenceAllocator};
use shortify_test_infra::redis::RedisServer;

struct Fixture {
    _redis: RedisServer,
    conn: redis::aio::MultiplexedConnection,
}

impl Fixture {
    async fn start() -> Self {
        let redis = RedisServer::new().await.expect("start redis");
        let conn = redis.connection().await.expect("redis connection");
        Self {
            _redis: redis,
            conn,
        }
    }
}

#[tokio::test]
#[ignore = "requires a docker daemon"]
async fn first_value_is_one() {
    let fixture = Fixture::start().await;
    let seq = RedisSequence::new(fixture.conn.clone());

    assert_eq!(seq.key(), "shortify:seq");
    assert_eq!(seq.next().await.unwrap(), 1);
    assert_eq!(seq.next().await.unwrap(), 2);
}

#[tokio::test]
#[ignore = "requires a docker daemon"]
async fn resumes_from_existing_counter() {
    let fixture = Fixture::start().await;
    let mut conn = fixture.conn.clone();
    let _: () = conn.set("resume:seq", 2300_i64).await.unwrap();

    let seq = RedisSequence::with_key(fixture.conn.clone(), "resume:seq");
    assert_eq!(seq.next().await.unwrap(), 2301);
}

#[tokio::test]
#[ignore = "requires a docker daemon"]
async fn separate_instances_share_the_counter() {
    let fixture = Fixture::start().await;
    let a = RedisSequence::with_key(fixture.conn.clone(), "shared:seq");
    let b = RedisSequence::with_key(fixture.conn.clone(), "shared:seq");

    let first = a.next().await.unwrap();
    let second = b.next().await.unwrap();
    assert_eq!(second, first + 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires a docker daemon"]
async fn concurrent_increments_are_unique() {
    let fixture = Fixture::start().await;
    let seq = Arc::new(RedisSequence::new(fixture.conn.clone()));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let seq = Arc::clone(&seq);
        handles.push(tokio::spawn(async move {
            let mut values = Vec::new();
            for _ in 0..100 {
                values.push(seq.next().await.unwrap());
            }
            values
        }));
    }

    let mut seen = HashSet::new();
    for handle in handles {
        for value in handle.await.unwrap() {
            assert!(seen.insert(value), "duplicate value {value}");
        }
    }
    assert_eq!(seen.len(), 800);
}
