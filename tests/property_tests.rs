use quickcheck::{quickcheck, TestResult};
use stream_util::*;
use tokio::runtime::Runtime;

fn collect<T>(readable: Readable<T>) -> StreamResult<Vec<T>>
where
    T: Clone + Send + Sync + 'static,
{
    let rt = Runtime::new().unwrap();
    rt.block_on(async move { readable.connect(to_array()).await })
}

#[test]
fn prop_from_values_into_to_array_is_identity() {
    fn round_trip(values: Vec<i64>) -> bool {
        collect(from_values(values.clone())) == Ok(values)
    }

    quickcheck(round_trip as fn(Vec<i64>) -> bool);
}

#[test]
fn prop_filter_adapters_agree_with_iterator_filter() {
    fn agrees(values: Vec<u16>, modulus: u16) -> TestResult {
        if modulus == 0 {
            return TestResult::discard();
        }

        let expected: Vec<u16> = values.iter().copied().filter(|v| v % modulus == 0).collect();
        let sync = collect(
            from_values(values.clone()).connect(filter_sync(move |v: &u16| Ok(v % modulus == 0))),
        );
        let asynchronous = collect(from_values(values).connect(filter_async(move |v: &u16| {
            let keep = v % modulus == 0;
            async move { Ok(keep) }
        })));

        TestResult::from_bool(sync == Ok(expected.clone()) && asynchronous == Ok(expected))
    }

    quickcheck(agrees as fn(Vec<u16>, u16) -> TestResult);
}

#[test]
fn prop_parallel_map_matches_sequential_map() {
    fn matches(values: Vec<u32>, concurrency: u8) -> TestResult {
        if values.len() > 500 {
            return TestResult::discard();
        }
        let concurrency = (concurrency as usize % 8) + 1;

        let sequential = collect(
            from_values(values.clone()).connect(map_sync(|v: u32| Ok(v.wrapping_mul(3)))),
        );
        let parallel = collect(from_values(values).connect(parallel_map_async(
            concurrency,
            |v: u32| async move { Ok(v.wrapping_mul(3)) },
        )));

        TestResult::from_bool(sequential.is_ok() && sequential == parallel)
    }

    quickcheck(matches as fn(Vec<u32>, u8) -> TestResult);
}

#[test]
fn prop_concat_preserves_multiset() {
    fn preserves(left: Vec<i32>, right: Vec<i32>) -> bool {
        let mut expected: Vec<i32> = left.iter().chain(right.iter()).copied().collect();
        expected.sort();

        let rt = Runtime::new().unwrap();
        let merged = rt.block_on(async move {
            concat([from_values(left), from_values(right)])
                .connect(to_array())
                .await
        });

        match merged {
            Ok(mut merged) => {
                merged.sort();
                merged == expected
            }
            Err(_) => false,
        }
    }

    quickcheck(preserves as fn(Vec<i32>, Vec<i32>) -> bool);
}
