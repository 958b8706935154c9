use std::sync::Arc;

use failure_log::{
    ArgValue, EachRequest, ExceptionInfo, FailureLog, FailureLogError, InMemoryListStore,
    ListStore, Order, Payload, RecordEncoder,
};

async fn log_with_five_failures() -> FailureLog {
    let log = FailureLog::new(Arc::new(InMemoryListStore::new()));
    let exception = ExceptionInfo::new("StandardError", "error");

    for n in 0..5 {
        let payload = Payload::new("Object", vec![ArgValue::from(format!("failure {}", n))]);
        log.record(&exception, "test-worker", "queue", payload)
            .await
            .unwrap();
    }
    log
}

async fn ids(log: &FailureLog, offset: usize, limit: usize, order: Order) -> Vec<usize> {
    log.each(&EachRequest::new(offset, limit).order(order))
        .await
        .unwrap()
        .map(|(id, _)| id)
        .collect()
}

async fn args(log: &FailureLog, offset: usize, limit: usize, order: Order) -> Vec<String> {
    log.each(&EachRequest::new(offset, limit).order(order))
        .await
        .unwrap()
        .map(|(_, entry)| {
            let record = entry.unwrap();
            record.payload.args[0].as_str().unwrap().to_string()
        })
        .collect()
}

#[tokio::test]
async fn test_bad_strings_are_cleaned_before_saving() {
    let log = FailureLog::new(Arc::new(InMemoryListStore::new()));

    let mut bad_string = vec![39u8, 52, 127, 86, 93, 95, 39];
    bad_string.extend_from_slice(b"\x80\xBF\xC3");
    let exception = ExceptionInfo::new("StandardError", bad_string)
        .with_backtrace(vec![b"job.rs:12 \xFF".to_vec()]);

    log.record(&exception, "test-worker", "queue", Payload::new("Object", vec![3i64.into()]))
        .await
        .unwrap();

    let all = log.all().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].error, "'4\u{7f}V]_'\u{FFFD}\u{FFFD}\u{FFFD}");
    assert_eq!(all[0].backtrace, vec!["job.rs:12 \u{FFFD}"]);
    assert_eq!(all[0].payload.args, vec![ArgValue::Int(3)]);
}

#[tokio::test]
async fn test_ascending_iterates_in_order() {
    let log = log_with_five_failures().await;
    assert_eq!(ids(&log, 0, 20, Order::Asc).await, vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn test_ascending_below_size_limit() {
    let log = log_with_five_failures().await;
    assert_eq!(ids(&log, 0, 3, Order::Asc).await, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_ascending_below_size_limit_and_offset() {
    let log = log_with_five_failures().await;
    assert_eq!(ids(&log, 1, 3, Order::Asc).await, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_ascending_above_size_limit_and_offset() {
    let log = log_with_five_failures().await;
    assert_eq!(ids(&log, 2, 20, Order::Asc).await, vec![2, 3, 4]);
}

#[tokio::test]
async fn test_ascending_single_failure() {
    let log = log_with_five_failures().await;
    assert_eq!(ids(&log, 0, 1, Order::Asc).await, vec![0]);
    assert_eq!(args(&log, 0, 1, Order::Asc).await, vec!["failure 0"]);
}

#[tokio::test]
async fn test_ascending_single_failure_from_the_middle() {
    let log = log_with_five_failures().await;
    assert_eq!(ids(&log, 2, 1, Order::Asc).await, vec![2]);
    assert_eq!(args(&log, 2, 1, Order::Asc).await, vec!["failure 2"]);
}

#[tokio::test]
async fn test_descending_iterates_in_reverse_order() {
    let log = log_with_five_failures().await;
    assert_eq!(ids(&log, 0, 20, Order::Desc).await, vec![4, 3, 2, 1, 0]);
}

#[tokio::test]
async fn test_descending_below_size_limit() {
    let log = log_with_five_failures().await;
    assert_eq!(ids(&log, 0, 3, Order::Desc).await, vec![2, 1, 0]);
}

#[tokio::test]
async fn test_descending_below_size_limit_and_offset() {
    let log = log_with_five_failures().await;
    assert_eq!(ids(&log, 2, 3, Order::Desc).await, vec![4, 3, 2]);
}

#[tokio::test]
async fn test_descending_above_size_limit_and_offset() {
    let log = log_with_five_failures().await;
    assert_eq!(ids(&log, 2, 20, Order::Desc).await, vec![4, 3, 2]);
}

#[tokio::test]
async fn test_descending_single_failure() {
    let log = log_with_five_failures().await;
    assert_eq!(ids(&log, 4, 1, Order::Desc).await, vec![4]);
    assert_eq!(args(&log, 4, 1, Order::Desc).await, vec!["failure 4"]);
}

#[tokio::test]
async fn test_descending_single_failure_from_the_middle() {
    let log = log_with_five_failures().await;
    assert_eq!(ids(&log, 2, 1, Order::Desc).await, vec![2]);
    assert_eq!(args(&log, 2, 1, Order::Desc).await, vec!["failure 2"]);
}

#[tokio::test]
async fn test_descending_oversized_limit() {
    let log = log_with_five_failures().await;
    assert_eq!(ids(&log, 3, 20, Order::Desc).await, vec![4, 3]);

    let args = args(&log, 3, 20, Order::Desc).await;
    assert_eq!(args.first().map(String::as_str), Some("failure 4"));
    assert_eq!(args.last().map(String::as_str), Some("failure 3"));
}

#[tokio::test]
async fn test_offset_boundaries_in_both_orders() {
    let log = log_with_five_failures().await;

    for order in [Order::Asc, Order::Desc] {
        assert!(ids(&log, 5, 20, order).await.is_empty(), "offset == len, {}", order);
        assert!(ids(&log, 50, 1, order).await.is_empty(), "offset > len, {}", order);
        assert_eq!(ids(&log, 4, 20, order).await, vec![4], "offset == len - 1, {}", order);
        assert!(ids(&log, 0, 0, order).await.is_empty(), "zero limit, {}", order);
    }
}

#[tokio::test]
async fn test_defaults_cover_whole_list_ascending() {
    let log = log_with_five_failures().await;
    let ids: Vec<usize> = log
        .each(&EachRequest::default())
        .await
        .unwrap()
        .map(|(id, _)| id)
        .collect();
    assert_eq!(ids, vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn test_each_is_repeatable() {
    let log = log_with_five_failures().await;
    let request = EachRequest::new(1, 3).order(Order::Desc);

    let first: Vec<_> = log
        .each(&request)
        .await
        .unwrap()
        .map(|(id, entry)| (id, entry.unwrap()))
        .collect();
    let second: Vec<_> = log
        .each(&request)
        .await
        .unwrap()
        .map(|(id, entry)| (id, entry.unwrap()))
        .collect();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_round_trip_preserves_record() {
    let log = FailureLog::new(Arc::new(InMemoryListStore::new()));
    let record = RecordEncoder::new().encode(
        &ExceptionInfo::new("Net::ReadTimeout", "read timed out")
            .with_backtrace(vec!["http.rs:10", "client.rs:44"]),
        "host:991:mailers,default",
        "mailers",
        Payload::new(
            "DeliverMail",
            vec![
                ArgValue::Int(42),
                ArgValue::from("welcome"),
                ArgValue::from(vec![1.5f64, 2.0]),
                ArgValue::Null,
            ],
        ),
    );

    let ordinal = log.save(&record).await.unwrap();
    let (id, entry) = log
        .each(&EachRequest::new(ordinal, 1))
        .await
        .unwrap()
        .next()
        .unwrap();

    assert_eq!(id, ordinal);
    assert_eq!(entry.unwrap(), record);
}

#[tokio::test]
async fn test_non_finite_float_arguments_are_rejected() {
    let log = FailureLog::new(Arc::new(InMemoryListStore::new()));
    let exception = ExceptionInfo::new("E", "e");

    for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let payload = Payload::new("J", vec![ArgValue::Float(value)]);
        let result = log.record(&exception, "w", "q", payload).await;
        assert!(matches!(result, Err(FailureLogError::Serialize(_))));
    }
    assert_eq!(log.count().await.unwrap(), 0);

    let ordinal = log
        .record(&exception, "w", "q", Payload::new("J", vec![ArgValue::Float(0.25)]))
        .await
        .unwrap();
    let (_, entry) = log
        .each(&EachRequest::new(ordinal, 1))
        .await
        .unwrap()
        .next()
        .unwrap();
    assert_eq!(entry.unwrap().payload.args, vec![ArgValue::Float(0.25)]);
}

#[tokio::test]
async fn test_large_unsigned_argument_round_trips() {
    let log = FailureLog::new(Arc::new(InMemoryListStore::new()));
    let args = vec![ArgValue::UInt(u64::MAX), ArgValue::from(i64::MAX as u64 + 1)];

    let ordinal = log
        .record(&ExceptionInfo::new("E", "e"), "w", "q", Payload::new("J", args.clone()))
        .await
        .unwrap();
    let (_, entry) = log
        .each(&EachRequest::new(ordinal, 1))
        .await
        .unwrap()
        .next()
        .unwrap();
    assert_eq!(entry.unwrap().payload.args, args);
}

#[tokio::test]
async fn test_malformed_records_do_not_break_enumeration() {
    let store = Arc::new(InMemoryListStore::new());
    let log = FailureLog::new(store.clone());
    let exception = ExceptionInfo::new("E", "e");

    log.record(&exception, "w", "q", Payload::new("First", vec![]))
        .await
        .unwrap();
    store.push(log.key(), b"\xFF{not json".to_vec()).await.unwrap();
    store
        .push(log.key(), br#"{"payload":"missing fields"}"#.to_vec())
        .await
        .unwrap();
    log.record(&exception, "w", "q", Payload::new("Last", vec![]))
        .await
        .unwrap();

    let entries: Vec<_> = log.each(&EachRequest::default()).await.unwrap().collect();
    assert_eq!(entries.len(), 4);
    assert!(entries[0].1.is_ok());
    let malformed = entries[1].1.as_ref().unwrap_err();
    assert_eq!(malformed.ordinal, 1);
    assert_eq!(malformed.raw, b"\xFF{not json".to_vec());
    assert!(entries[2].1.is_err());
    assert!(entries[3].1.is_ok());

    let all = log.all().await.unwrap();
    let classes: Vec<&str> = all.iter().map(|r| r.payload.class.as_str()).collect();
    assert_eq!(classes, vec!["First", "Last"]);
    assert_eq!(log.count().await.unwrap(), 4);
}

#[tokio::test]
async fn test_class_filter_limits_matches() {
    let log = FailureLog::new(Arc::new(InMemoryListStore::new()));
    let exception = ExceptionInfo::new("E", "e");
    for class in ["A", "B", "A", "B", "B", "A"] {
        log.record(&exception, "w", "q", Payload::new(class, vec![]))
            .await
            .unwrap();
    }

    let newest_b: Vec<usize> = log
        .each(&EachRequest::new(0, 2).order(Order::Desc).class_name("B"))
        .await
        .unwrap()
        .map(|(id, _)| id)
        .collect();
    assert_eq!(newest_b, vec![4, 3]);

    let oldest_a_after_1: Vec<usize> = log
        .each(&EachRequest::new(1, 20).class_name("A"))
        .await
        .unwrap()
        .map(|(id, _)| id)
        .collect();
    assert_eq!(oldest_a_after_1, vec![2, 5]);

    assert_eq!(log.count_by_class("A").await.unwrap(), 3);
    assert_eq!(log.count_by_class("C").await.unwrap(), 0);
}

#[tokio::test]
async fn test_each_is_a_snapshot() {
    let log = log_with_five_failures().await;
    let failures = log.each(&EachRequest::new(0, 20)).await.unwrap();

    log.record(
        &ExceptionInfo::new("E", "late"),
        "w",
        "q",
        Payload::new("Object", vec![]),
    )
    .await
    .unwrap();

    let ids: Vec<usize> = failures.map(|(id, _)| id).collect();
    assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    assert_eq!(log.count().await.unwrap(), 6);
}

#[tokio::test]
async fn test_concurrent_saves_get_distinct_ordinals() {
    let log = FailureLog::new(Arc::new(InMemoryListStore::new()));

    let handles: Vec<_> = (0..25i64)
        .map(|n| {
            let log = log.clone();
            tokio::spawn(async move {
                log.record(
                    &ExceptionInfo::new("E", "concurrent"),
                    "w",
                    "q",
                    Payload::new("Job", vec![n.into()]),
                )
                .await
                .unwrap()
            })
        })
        .collect();

    let mut ordinals = Vec::new();
    for handle in handles {
        ordinals.push(handle.await.unwrap());
    }
    ordinals.sort_unstable();

    assert_eq!(ordinals, (0..25).collect::<Vec<usize>>());
    assert_eq!(log.all().await.unwrap().len(), 25);
}

#[tokio::test]
async fn test_clear_all_empties_the_log() {
    let log = log_with_five_failures().await;
    log.clear_all().await.unwrap();
    assert_eq!(log.count().await.unwrap(), 0);
    assert!(ids(&log, 0, 20, Order::Desc).await.is_empty());
}
