use futures_util::stream::StreamExt;
use rand::{thread_rng, Rng};
use std::time::Duration;
use stream_util::*;
use tokio::time::sleep;

#[tokio::test]
async fn test_concat_merges_every_value() {
    let mut result = concat([from_values(vec![1, 2, 3]), from_values(vec![4, 5, 6])])
        .connect(to_array())
        .await
        .unwrap();

    result.sort();
    assert_eq!(result, vec![1, 2, 3, 4, 5, 6]);
}

#[tokio::test]
async fn test_concat_keeps_per_source_order() {
    let result = concat(vec![
        from_values(vec!["a1", "a2", "a3"]),
        from_values(vec!["b1", "b2"]),
    ])
    .connect(to_array())
    .await
    .unwrap();

    let a: Vec<_> = result.iter().filter(|v| v.starts_with('a')).cloned().collect();
    let b: Vec<_> = result.iter().filter(|v| v.starts_with('b')).cloned().collect();
    assert_eq!(a, vec!["a1", "a2", "a3"]);
    assert_eq!(b, vec!["b1", "b2"]);
}

#[tokio::test]
async fn test_concat_no_sources_completes_immediately() {
    let result = concat(Vec::<Readable<i32>>::new()).collect::<Vec<_>>().await;
    assert!(result.is_empty());
}

#[tokio::test]
async fn test_concat_single_source() {
    let result = concat([from_values(vec![7, 8])]).connect(to_array()).await.unwrap();
    assert_eq!(result, vec![7, 8]);
}

#[tokio::test]
async fn test_concat_failure_fails_merged_output() {
    let failing = read_async(|outlet: Outlet<i32>| async move {
        outlet.push(100);
        sleep(Duration::from_millis(5)).await;
        Err(StreamError::custom("source down"))
    });
    let slow = read_async(|outlet: Outlet<i32>| async move {
        for i in 0..100 {
            sleep(Duration::from_millis(2)).await;
            outlet.push(i);
        }
        Ok(())
    });

    let result = concat([failing, slow]).collect::<Vec<_>>().await;

    let failures: Vec<_> = result.iter().filter(|r| r.is_err()).collect();
    assert_eq!(failures, vec![&Err(StreamError::custom("source down"))]);
    // The failure is the final signal; the slow source is not waited for.
    assert!(result.last().unwrap().is_err());
    assert!(result.len() < 100);
}

#[tokio::test]
async fn test_concat_failure_rejects_sink() {
    let merged = concat([
        from_values(vec![1, 2]),
        read_sync(|_: &Outlet<i32>| Err("nope".into())),
    ])
    .connect(to_array());

    assert_eq!(merged.await, Err(StreamError::custom("nope")));
}

#[tokio::test]
async fn test_concat_sources_run_concurrently() {
    let mut rng = thread_rng();
    let sources: Vec<Readable<u64>> = (0..5u64)
        .map(|id| {
            let delays: Vec<u64> = (0..4).map(|_| rng.gen_range(1..5)).collect();
            read_async(move |outlet: Outlet<u64>| async move {
                for (n, delay) in delays.into_iter().enumerate() {
                    sleep(Duration::from_millis(delay)).await;
                    outlet.push(id * 10 + n as u64);
                }
                Ok(())
            })
        })
        .collect();

    let mut result = concat(sources).connect(to_array()).await.unwrap();

    result.sort();
    let expected: Vec<u64> = (0..5u64).flat_map(|id| (0..4).map(move |n| id * 10 + n)).collect();
    assert_eq!(result, expected);
}

#[tokio::test]
async fn test_concat_completes_exactly_once() {
    let mut merged = concat([from_values(vec![1]), from_values(Vec::<i32>::new())]);

    assert_eq!(merged.next().await, Some(Ok(1)));
    assert_eq!(merged.next().await, None);
    assert_eq!(merged.next().await, None);
}
