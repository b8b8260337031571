use tempfile::tempdir;
use txfeat::{
    load_matrix, ExtractionConfig, FeatureError, TargetRow, TimeSeriesExtractor, TimeSeriesPaths,
    Transaction, NULL_GROUP_ID, SEQ_LENGTH,
};

fn extractor() -> TimeSeriesExtractor {
    TimeSeriesExtractor::new(ExtractionConfig::default()).expect("default config is valid")
}

#[test]
fn single_transaction_fills_one_slot() {
    let ts = extractor().extract(&[Transaction::new("1", 17, Some(33), 450.0)]);

    assert_eq!(ts.small_group_seq.len(), SEQ_LENGTH);
    assert_eq!(ts.money_seq.len(), SEQ_LENGTH);
    assert_eq!(ts.small_group_seq[17], 33);
    assert_eq!(ts.money_seq[17], 450.0);
    for d in (0..SEQ_LENGTH).filter(|d| *d != 17) {
        assert_eq!(ts.small_group_seq[d], NULL_GROUP_ID);
        assert_eq!(ts.money_seq[d], 0.0);
    }
}

#[test]
fn same_date_duplicates_keep_larger_amount() {
    let txns = [
        Transaction::new("1", 3, Some(1), 10.0),
        Transaction::new("1", 3, Some(2), 20.0),
    ];
    let ts = extractor().extract(&txns);
    assert_eq!(ts.money_seq[3], 20.0);
    assert_eq!(ts.small_group_seq[3], 2);
}

#[test]
fn end_to_end_two_rows_same_day() {
    let txns = vec![
        Transaction::new("1", 0, Some(5), 100.0),
        Transaction::new("1", 0, Some(7), 50.0),
    ];
    let targets = vec![TargetRow::new("1")];

    let batch = extractor().extract_from_dataset(&txns, &targets).unwrap();

    assert_eq!(batch.client_ids, vec!["1"]);
    assert_eq!(batch.money_seq.len(), 1);
    let money = &batch.money_seq[0];
    let groups = &batch.small_group_seq[0];
    assert_eq!(money[0], 100.0);
    assert_eq!(groups[0], 5);
    assert!(money[1..].iter().all(|v| *v == 0.0));
    assert!(groups[1..].iter().all(|g| *g == NULL_GROUP_ID));
    assert_eq!(money.len() - 1, 729);
}

#[test]
fn batch_follows_target_order_and_pads_unknown_clients() {
    let txns = vec![
        Transaction::new("a", 1, Some(1), 1.0),
        Transaction::new("b", 2, Some(2), 2.0),
    ];
    let targets = vec![TargetRow::new("b"), TargetRow::new("ghost"), TargetRow::new("a")];

    let batch = extractor().extract_from_dataset(&txns, &targets).unwrap();

    assert_eq!(batch.client_ids, vec!["b", "ghost", "a"]);
    assert_eq!(batch.money_seq[0][2], 2.0);
    assert!(batch.money_seq[1].iter().all(|v| *v == 0.0));
    assert!(batch.small_group_seq[1].iter().all(|g| *g == NULL_GROUP_ID));
    assert_eq!(batch.small_group_seq[2][1], 1);
}

#[test]
fn empty_inputs_fail_fast() {
    let err = extractor()
        .extract_from_dataset(&[], &[TargetRow::new("1")])
        .expect_err("no transactions");
    assert!(matches!(err, FeatureError::EmptyTransactions));

    let err = extractor()
        .extract_from_dataset(&[Transaction::new("1", 0, None, 1.0)], &[])
        .expect_err("no targets");
    assert!(matches!(err, FeatureError::EmptyTargets));
}

#[test]
fn shorter_sequence_and_custom_null_group() {
    let cfg = ExtractionConfig {
        seq_length: 5,
        null_group_id: -1,
        ..ExtractionConfig::default()
    };
    let ts = TimeSeriesExtractor::new(cfg)
        .unwrap()
        .extract(&[Transaction::new("1", 4, None, 9.0)]);
    assert_eq!(ts.small_group_seq, vec![-1, -1, -1, -1, -1]);
    assert_eq!(ts.money_seq, vec![0.0, 0.0, 0.0, 0.0, 9.0]);
}

#[test]
fn each_sequence_kind_is_written_to_its_own_path() {
    let dir = tempdir().unwrap();
    let paths = TimeSeriesPaths::in_dir(dir.path(), "train");
    let ex = extractor();
    let txns = vec![
        Transaction::new("1", 0, Some(5), 100.5),
        Transaction::new("2", 729, Some(8), 3.0),
    ];
    let targets = vec![TargetRow::new("1"), TargetRow::new("2")];
    let batch = ex.extract_from_dataset(&txns, &targets).unwrap();

    ex.write(&batch, &paths).unwrap();

    let groups = load_matrix(&paths.small_group_seq).unwrap();
    let money = load_matrix(&paths.money_seq).unwrap();
    assert_eq!(groups.shape(), (2, SEQ_LENGTH));
    assert_eq!(money.shape(), (2, SEQ_LENGTH));
    assert_eq!(groups.columns[0], "d0");
    assert_eq!(groups.rows[0][0], 5.0);
    assert_eq!(groups.rows[0][1], NULL_GROUP_ID as f64);
    assert_eq!(money.rows[0][0], 100.5);
    assert_eq!(money.rows[1][729], 3.0);
    assert_eq!(money.client_ids, vec!["1", "2"]);
}
