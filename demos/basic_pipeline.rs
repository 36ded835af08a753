use std::collections::HashMap;
use std::time::Duration;
use stream_util::*;
use tokio::runtime::Runtime;
use tokio::time::sleep;

fn main() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        // Word lengths, computed through a sync map and an async filter
        let lengths = from_values(vec!["alpha", "be", "gamma", "pi", "epsilon"])
            .connect(map_sync(|word: &'static str| Ok((word, word.len()))))
            .connect(filter_async(|entry: &(&'static str, usize)| {
                let len = entry.1;
                async move {
                    sleep(Duration::from_millis(5)).await;
                    Ok(len > 2)
                }
            }))
            .connect(to_array())
            .await
            .unwrap();

        println!("Words longer than two letters:");
        for (word, len) in &lengths {
            println!("  - {}: {}", word, len);
        }

        // A paced producer feeding a transform that fans out
        let ticks = read_async(|outlet: Outlet<u32>| async move {
            for tick in 1..=3 {
                sleep(Duration::from_millis(10)).await;
                outlet.push(tick);
            }
            Ok(())
        })
        .connect(through_sync(|tick: u32, outlet: &Outlet<String>| {
            outlet.push(format!("tick {}", tick));
            outlet.push(format!("tock {}", tick));
            Ok(())
        }))
        .connect(to_array())
        .await
        .unwrap();
        println!("Clock: {:?}", ticks);

        // Two sources merged, then folded into a single mapping
        let settings = concat([
            from_values(vec![vec![("host", "localhost"), ("port", "8080")]]),
            from_values(vec![vec![("port", "9090")]]),
        ])
        .connect(to_object())
        .await
        .unwrap();
        let mut keys: Vec<_> = settings.keys().collect();
        keys.sort();
        println!("Settings keys: {:?}", keys);

        // Failures inside an isolation boundary end up in one place
        let outcome = to_promise(consume(|reporter| {
            tokio::spawn(async move {
                sleep(Duration::from_millis(5)).await;
                reporter.report("background job failed");
            });
            read_async(|outlet: Outlet<u8>| async move {
                outlet.push(1);
                sleep(Duration::from_millis(50)).await;
                Ok(())
            })
        }))
        .await;

        match outcome {
            Ok(()) => println!("Isolated chain completed"),
            Err(e) => println!("Isolated chain failed: {}", e),
        }

        let scores: HashMap<&str, u32> = from_values(vec![("ann", 3), ("bob", 5)])
            .connect(parallel_map_async(2, |(name, score): (&'static str, u32)| async move {
                Ok((name, score * 10))
            }))
            .connect(to_array())
            .await
            .unwrap()
            .into_iter()
            .collect();
        println!("Scaled scores: {:?}", scores);
    });
}
