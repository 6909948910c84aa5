//! Load testing for the forwarding engine.

use axum::Router;
use futures_util::FutureExt;
use relay_proxy::{ProxyConfiguration, ProxyRouterExt};
use std::time::Instant;

mod common;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_do_not_cross_talk() {
    let target = common::start_target().await;
    // each response must carry the path of its own call
    let config = ProxyConfiguration::builder(format!("http://{target}/echo"))
        .with_transform_response(|ctx, response| {
            let path = ctx.path().to_string();
            async move {
                Ok(response.with_header(
                    "x-call-path".parse().unwrap(),
                    path.parse().unwrap(),
                ))
            }
            .boxed()
        })
        .build()
        .unwrap();
    let proxy = common::spawn_router(Router::new().proxy("/calls/{n}", config)).await;

    let concurrency = 100;
    let client = common::client();
    let start = Instant::now();

    let mut tasks = Vec::new();
    for n in 0..concurrency {
        let client = client.clone();
        tasks.push(tokio::spawn(async move {
            let body = format!("payload {n} {}", "x".repeat(n * 37));
            let res = client
                .post(format!("http://{proxy}/calls/{n}"))
                .header("content-type", "text/plain")
                .body(body.clone())
                .send()
                .await
                .unwrap();
            assert_eq!(res.status(), 200);
            assert_eq!(res.headers()["x-call-path"], format!("/calls/{n}").as_str());
            assert_eq!(
                res.headers()["x-received-content-length"],
                body.len().to_string().as_str()
            );
            assert_eq!(res.text().await.unwrap(), body);
            start.elapsed()
        }));
    }

    let mut latencies = Vec::new();
    for task in tasks {
        latencies.push(task.await.unwrap());
    }

    latencies.sort();
    println!("\n--- Load Test Results ---");
    println!("Calls:          {}", concurrency);
    println!("Total Duration: {:?}", start.elapsed());
    println!("P50 Completion: {:?}", latencies[latencies.len() / 2]);
    println!("P99 Completion: {:?}", latencies[latencies.len() * 99 / 100]);
    println!("-------------------------\n");
}
