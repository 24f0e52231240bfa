use std::path::PathBuf;

use ferrite_digits::data::{BatchPreparationStatus, BatchPreparer, PreparationOptions, TargetMode, IMAGE_PIXELS};
use ferrite_digits::Error;

fn csv_row(label: i64, seed: usize) -> String {
    let mut row = label.to_string();
    for i in 0..IMAGE_PIXELS {
        row.push(',');
        row.push_str(&((i * 7 + seed) % 256).to_string());
    }
    row
}

fn write_csv(name: &str, rows: &[String]) -> PathBuf {
    let path = std::env::temp_dir().join(format!("ferrite-digits-{}-{}.csv", name, std::process::id()));
    std::fs::write(&path, rows.join("\n")).unwrap();
    path
}

fn digits(n: usize) -> Vec<String> {
    (0..n).map(|i| csv_row((i % 10) as i64, i)).collect()
}

fn options(mode: TargetMode, interval: usize) -> PreparationOptions {
    PreparationOptions { target_mode: mode, progress_interval: interval }
}

#[test]
fn progress_is_monotonic_and_ends_at_the_row_count() {
    let path = write_csv("monotonic", &digits(250));
    let mut prep = BatchPreparer::new("training", &path, options(TargetMode::OneHot, 10));
    prep.start();

    let mut seen = Vec::new();
    loop {
        match prep.poll().unwrap() {
            BatchPreparationStatus::Preparing { count } => seen.push(count),
            BatchPreparationStatus::Ready => break,
            BatchPreparationStatus::NotPrepared => panic!("status went back to NotPrepared"),
        }
        std::thread::yield_now();
    }

    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    let batch = prep.batch().unwrap();
    assert_eq!(batch.count(), 250);
    assert_eq!(batch.labels()[..3], [0, 1, 2]);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn restarting_supersedes_the_previous_run() {
    let big = write_csv("superseded-big", &digits(3000));
    let small = write_csv("superseded-small", &digits(3));

    let mut prep = BatchPreparer::new("training", &big, options(TargetMode::OneHot, 100));
    prep.start();
    prep.start_from(&small);
    assert_eq!(prep.status(), BatchPreparationStatus::Preparing { count: 0 });

    let batch = prep.wait().unwrap();
    assert_eq!(batch.count(), 3);
    assert_eq!(prep.status(), BatchPreparationStatus::Ready);

    // Nothing from the first run can show up afterwards.
    std::thread::sleep(std::time::Duration::from_millis(50));
    assert_eq!(prep.poll().unwrap(), BatchPreparationStatus::Ready);
    assert_eq!(prep.batch().unwrap().count(), 3);

    let _ = std::fs::remove_file(&big);
    let _ = std::fs::remove_file(&small);
}

#[test]
fn malformed_row_never_reaches_ready() {
    let mut rows = digits(2);
    rows.push("4,1,2,3".to_string());
    rows.extend(digits(2));
    let path = write_csv("malformed", &rows);

    let mut prep = BatchPreparer::new("prediction", &path, options(TargetMode::OneHot, 1));
    prep.start();
    let err = prep.wait().unwrap_err();
    assert!(matches!(err, Error::MalformedRow { row: 3, .. }), "{}", err);
    assert!(!prep.status().is_ready());
    assert!(prep.batch().is_none());
    assert!(!prep.is_running());
    let _ = std::fs::remove_file(&path);
}

#[test]
fn out_of_range_label_fails_encoding() {
    let mut rows = digits(1);
    rows.push(csv_row(12, 0));
    let path = write_csv("range", &rows);

    let mut prep = BatchPreparer::new("training", &path, options(TargetMode::OneHot, 100));
    prep.start();
    assert!(matches!(prep.wait(), Err(Error::EncodingRange { label: 12 })));
    let _ = std::fs::remove_file(&path);
}

#[test]
fn scalar_mode_keeps_plain_labels() {
    let path = write_csv("scalar", &digits(12));
    let mut prep = BatchPreparer::new("training", &path, options(TargetMode::Scalar, 5));
    prep.start();
    let batch = prep.wait().unwrap();
    assert_eq!(batch.target_mode(), TargetMode::Scalar);
    assert_eq!(batch.labels(), vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 0, 1]);
    let _ = std::fs::remove_file(&path);
}
