use futures_util::stream::StreamExt;
use std::time::Duration;
use stream_util::*;
use tokio::runtime::Runtime;
use tokio::time::sleep;

#[test]
fn test_from_values_emits_in_order_then_completes() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let src = vec!["foo", "bar"];
        let mut buffer = Vec::new();
        let mut stream = from_values(src.clone());

        while let Some(item) = stream.next().await {
            buffer.push(item.unwrap());
        }

        assert_eq!(buffer, src);
    });
}

#[tokio::test]
async fn test_from_values_empty() {
    let result = from_values(Vec::<u32>::new()).collect::<Vec<_>>().await;
    assert!(result.is_empty());
}

#[tokio::test]
async fn test_pull_after_completion_emits_nothing() {
    let mut stream = from_values(vec![1]);
    assert_eq!(stream.next().await, Some(Ok(1)));
    assert_eq!(stream.next().await, None);
    // Further pulls are no-ops.
    assert_eq!(stream.next().await, None);
    assert_eq!(stream.next().await, None);
}

#[tokio::test]
async fn test_read_sync_pushes_many() {
    let result = read_sync(|outlet: &Outlet<i32>| {
        outlet.push(1);
        outlet.push(2);
        Ok(())
    })
    .connect(to_array())
    .await
    .unwrap();

    assert_eq!(result, vec![1, 2]);
}

#[tokio::test]
async fn test_read_sync_error_and_no_completion() {
    let mut stream = read_sync(|_: &Outlet<i32>| Err(StreamError::custom("foo")));

    let first = stream.next().await;
    assert_eq!(first, Some(Err(StreamError::Custom("foo".to_string()))));
    assert_eq!(first.unwrap().unwrap_err().to_string(), "foo");

    // A failed source stays silent.
    assert_eq!(stream.next().await, None);
    assert_eq!(stream.next().await, None);
}

#[tokio::test]
async fn test_read_sync_values_before_error_are_delivered() {
    let result = read_sync(|outlet: &Outlet<i32>| {
        outlet.push(1);
        Err("broken".into())
    })
    .collect::<Vec<_>>()
    .await;

    assert_eq!(result, vec![Ok(1), Err(StreamError::custom("broken"))]);
}

#[tokio::test]
async fn test_read_async_survives_suspension_between_pushes() {
    let result = read_async(|outlet: Outlet<i32>| async move {
        sleep(Duration::from_millis(1)).await;
        outlet.push(1);
        sleep(Duration::from_millis(1)).await;
        outlet.push(2);
        Ok(())
    })
    .connect(to_array())
    .await
    .unwrap();

    assert_eq!(result, vec![1, 2]);
}

#[tokio::test]
async fn test_read_async_forwards_values_while_running() {
    let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
    let mut stream = read_async(|outlet: Outlet<i32>| async move {
        outlet.push(1);
        let _ = release_rx.await;
        outlet.push(2);
        Ok(())
    });

    // The first value arrives while the producer is still suspended.
    assert_eq!(stream.next().await, Some(Ok(1)));
    release_tx.send(()).unwrap();
    assert_eq!(stream.next().await, Some(Ok(2)));
    assert_eq!(stream.next().await, None);
}

#[tokio::test]
async fn test_read_async_failure() {
    let result = read_async(|outlet: Outlet<i32>| async move {
        outlet.push(1);
        sleep(Duration::from_millis(1)).await;
        Err(StreamError::custom("async boom"))
    })
    .collect::<Vec<_>>()
    .await;

    assert_eq!(result, vec![Ok(1), Err(StreamError::custom("async boom"))]);
}

#[tokio::test]
async fn test_read_async_pushes_after_complete_are_dropped() {
    let result = read_async(|outlet: Outlet<i32>| async move {
        outlet.push(1);
        outlet.complete();
        assert!(!outlet.push(2));
        Ok(())
    })
    .collect::<Vec<_>>()
    .await;

    assert_eq!(result, vec![Ok(1)]);
}

#[tokio::test]
async fn test_acceptance_signal_is_advisory() {
    let signals = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let recorded = signals.clone();
    let config = StageConfig::default().with_high_water_mark(2);

    struct Burst {
        recorded: std::sync::Arc<std::sync::Mutex<Vec<bool>>>,
    }

    #[async_trait::async_trait]
    impl Stage for Burst {
        type In = std::convert::Infallible;
        type Out = u32;

        async fn on_pull(&mut self, outlet: &Outlet<u32>) -> StreamResult<()> {
            for value in 0..4 {
                let accepted = outlet.push(value);
                self.recorded.lock().unwrap().push(accepted);
            }
            outlet.complete();
            Ok(())
        }
    }

    let result = Readable::from_stage_with(Burst { recorded }, config)
        .connect(to_array())
        .await
        .unwrap();

    // Every value is delivered even after the signal turned false.
    assert_eq!(result, vec![0, 1, 2, 3]);
    assert_eq!(*signals.lock().unwrap(), vec![true, false, false, false]);
}

#[tokio::test]
async fn test_custom_source_is_pulled_until_complete() {
    struct Countdown {
        remaining: u32,
    }

    #[async_trait::async_trait]
    impl Stage for Countdown {
        type In = std::convert::Infallible;
        type Out = u32;

        async fn on_pull(&mut self, outlet: &Outlet<u32>) -> StreamResult<()> {
            // One value per pull.
            assert_eq!(outlet.state(), StageState::Pulling);
            if self.remaining == 0 {
                outlet.complete();
            } else {
                outlet.push(self.remaining);
                self.remaining -= 1;
            }
            Ok(())
        }
    }

    let result = Readable::from_stage(Countdown { remaining: 3 })
        .connect(to_array())
        .await
        .unwrap();

    assert_eq!(result, vec![3, 2, 1]);
}
