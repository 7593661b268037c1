mod support;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;

use sider_client::{ClientConfig, ClientError, ClientOptions, RedisPool, WireValue};
use support::{bulk, init_tracing, spawn_responder, spawn_server};

async fn pool(url: &str, size: usize) -> Result<RedisPool> {
    let config = ClientConfig::new(url).with_timeout(Duration::from_secs(2));
    Ok(RedisPool::new(config, size).await?)
}

#[tokio::test]
async fn pool_executes_commands_concurrently() -> Result<()> {
    init_tracing();
    let url = spawn_responder().await?;
    let pool = Arc::new(pool(&url, 2).await?);

    let mut tasks = Vec::new();
    for idx in 0..8 {
        let pool = Arc::clone(&pool);
        tasks.push(tokio::spawn(async move {
            pool.execute_cmd("get", [format!("key-{idx}")]).await
        }));
    }
    for (idx, task) in tasks.into_iter().enumerate() {
        let reply = task.await??;
        assert_eq!(reply, WireValue::BulkString(Bytes::from(format!("key-{idx}"))));
    }
    assert_eq!(pool.pool().idle(), 2);
    assert_eq!(pool.pool().in_use(), 0);
    pool.close().await;
    Ok(())
}

#[tokio::test]
async fn lease_gives_exclusive_manager() -> Result<()> {
    init_tracing();
    let url = spawn_responder().await?;
    let pool = pool(&url, 1).await?;

    let lease = pool.get_redis(None).await?;
    assert_eq!(pool.pool().idle(), 0);
    let err = pool
        .get_redis(Some(Duration::from_millis(20)))
        .await
        .err()
        .expect("pool exhausted");
    assert!(err.is_timeout());

    {
        let mut redis = lease.lock().await;
        redis.pipeline_on();
        redis.execute_cmd("set", ["a", "1"]).await?;
        redis.execute_cmd("get", ["a"]).await?;
        let replies = redis.pipeline_execute().await?;
        assert_eq!(replies.len(), 2);
        redis.pipeline_off();
    }
    lease.release().await?;
    assert_eq!(pool.pool().idle(), 1);

    let reply = pool.execute_cmd("ping", Vec::<&str>::new()).await?;
    assert_eq!(reply, WireValue::SimpleString(Bytes::from_static(b"PONG")));
    Ok(())
}

#[tokio::test]
async fn release_with_active_subscription_closes_connection() -> Result<()> {
    init_tracing();
    let url = spawn_responder().await?;
    let pool = pool(&url, 1).await?;

    let lease = pool.get_redis(Some(Duration::from_millis(50))).await?;
    lease.lock().await.execute_cmd("subscribe", ["events"]).await?;
    assert!(lease.lock().await.listener_active());
    let redis = Arc::clone(&lease);

    let err = lease.release().await.unwrap_err();
    assert!(matches!(err, ClientError::PubSubActive));
    assert_eq!(pool.pool().idle(), 1);
    assert!(!redis.lock().await.is_connected());

    // The manager reconnects on its next use.
    let reply = pool.execute_cmd("ping", Vec::<&str>::new()).await?;
    assert_eq!(reply, WireValue::SimpleString(Bytes::from_static(b"PONG")));
    Ok(())
}

#[tokio::test]
async fn release_without_timeout_waits_for_subscription_to_end() -> Result<()> {
    init_tracing();
    let (url, server) = spawn_server(|server| async move {
        let mut peer = server.accept().await?;
        peer.expect(&["subscribe", "events"]).await?;
        let mut out = b"*3\r\n".to_vec();
        out.extend(bulk("subscribe"));
        out.extend(bulk("events"));
        out.extend(b":1\r\n");
        peer.send(&out).await?;

        tokio::time::sleep(Duration::from_millis(150)).await;
        let mut out = b"*3\r\n".to_vec();
        out.extend(bulk("unsubscribe"));
        out.extend(bulk("events"));
        out.extend(b":0\r\n");
        peer.send(&out).await?;

        peer.expect(&["ping"]).await?;
        peer.send(b"+PONG\r\n").await?;
        Ok::<(), anyhow::Error>(())
    })
    .await?;
    let pool = pool(&url, 1).await?;

    let lease = pool.get_redis(None).await?;
    lease.lock().await.execute_cmd("subscribe", ["events"]).await?;
    let redis = Arc::clone(&lease);
    lease.release().await?;
    assert_eq!(pool.pool().idle(), 1);
    {
        let redis = redis.lock().await;
        assert!(!redis.listener_active());
        assert!(redis.is_connected());
    }

    // Same socket, now back in direct mode.
    let reply = pool.execute_cmd("ping", Vec::<&str>::new()).await?;
    assert_eq!(reply, WireValue::SimpleString(Bytes::from_static(b"PONG")));
    server.await??;
    Ok(())
}

#[tokio::test]
async fn closed_pool_rejects_checkout() -> Result<()> {
    init_tracing();
    let url = spawn_responder().await?;
    let pool = pool(&url, 2).await?;
    pool.execute_cmd("ping", Vec::<&str>::new()).await?;

    let lease = pool.get_redis(None).await?;
    let redis = Arc::clone(&lease);
    pool.close().await;

    assert!(!redis.lock().await.is_connected());
    assert!(matches!(
        pool.execute_cmd("ping", Vec::<&str>::new()).await,
        Err(ClientError::PoolClosed)
    ));
    assert!(matches!(pool.get_redis(None).await, Err(ClientError::PoolClosed)));
    drop(lease);
    Ok(())
}

#[tokio::test]
async fn pool_from_options() -> Result<()> {
    init_tracing();
    let url = spawn_responder().await?;
    let options: ClientOptions = serde_json::from_value(serde_json::json!({
        "url": format!("{url}/0"),
        "read_timeout_ms": 500,
        "pool_size": 3,
    }))?;
    let pool = RedisPool::from_options(options).await?;
    assert_eq!(pool.pool().size(), 3);
    assert!(pool.to_string().ends_with("[Pool[3/3]]"));
    pool.execute_cmd("set", ["k", "v"]).await?;
    Ok(())
}
