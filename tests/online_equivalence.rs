use tricast::{
    assemble_training_frame, feature_columns, frame_from_ticks, FeatureError, OnlineFeatureEngine,
    Tick, MA_LONG, MIN_BUFFER_CAPACITY,
};

fn wavy_tick(i: usize) -> Tick {
    let t = i as f64;
    Tick {
        bitcoin_price: 100.0 + t + (t * 0.7).sin() * 3.0,
        bitcoin_volume: 1_000.0 + (t * 0.3).cos() * 40.0,
        ethereum_price: 50.0 + 0.5 * t + (t * 0.9).cos() * 2.0,
        ethereum_volume: 500.0 + t,
        litecoin_price: 10.0 + 0.1 * t + (t * 0.4).sin(),
        litecoin_volume: 50.0 + (t * 0.2).sin() * 5.0,
    }
}

#[test]
fn online_rows_equal_offline_training_rows_bit_for_bit() {
    let ticks: Vec<Tick> = (0..80).map(wavy_tick).collect();
    let raw = frame_from_ticks(&ticks);
    let training = assemble_training_frame(&raw, 3).expect("assemble");

    let mut engine = OnlineFeatureEngine::with_default_capacity();
    let mut online_rows: Vec<(usize, Vec<f64>)> = Vec::new();
    for (i, tick) in ticks.iter().enumerate() {
        if let Some(row) = engine.update(*tick).expect("update") {
            online_rows.push((i, row));
        }
    }

    let warm = MA_LONG + 2;
    let mut compared = 0;
    for (tick_index, online_row) in &online_rows {
        if *tick_index < warm {
            continue;
        }
        let pos = training
            .row_indices
            .iter()
            .position(|r| r == tick_index)
            .expect("warm tick rows survive alignment");
        let offline_row = training.x.row(pos).expect("row exists");

        assert_eq!(online_row.len(), offline_row.len());
        for (a, b) in online_row.iter().zip(offline_row.iter()) {
            assert_eq!(a.to_bits(), b.to_bits(), "tick {tick_index}");
        }
        compared += 1;
    }
    assert!(compared >= 40, "only {compared} rows compared");
}

#[test]
fn bounded_buffer_still_reproduces_offline_rows() {
    let ticks: Vec<Tick> = (0..120).map(wavy_tick).collect();
    let raw = frame_from_ticks(&ticks);
    let training = assemble_training_frame(&raw, 3).expect("assemble");

    // the smallest legal buffer: eviction happens constantly, yet the
    // selected row's windows always fit inside the retained suffix
    let mut engine = OnlineFeatureEngine::new(MIN_BUFFER_CAPACITY).expect("engine");
    for (i, tick) in ticks.iter().enumerate() {
        let row = engine.update(*tick).expect("update");
        if i < MA_LONG + 2 {
            continue;
        }
        let row = row.expect("warm engine emits rows");
        let pos = training
            .row_indices
            .iter()
            .position(|r| *r == i)
            .expect("warm tick rows survive alignment");
        let offline_row = training.x.row(pos).expect("row exists");
        for (a, b) in row.iter().zip(offline_row.iter()) {
            assert_eq!(a.to_bits(), b.to_bits(), "tick {i}");
        }
    }
}

#[test]
fn repeated_updates_on_identical_streams_are_byte_identical() {
    let ticks: Vec<Tick> = (0..50).map(wavy_tick).collect();

    let mut engine_a = OnlineFeatureEngine::with_default_capacity();
    let mut engine_b = OnlineFeatureEngine::with_default_capacity();

    for tick in &ticks {
        let row_a = engine_a.update(*tick).expect("update a");
        let row_b = engine_b.update(*tick).expect("update b");
        match (row_a, row_b) {
            (None, None) => {}
            (Some(a), Some(b)) => {
                let bits_a: Vec<u64> = a.iter().map(|v| v.to_bits()).collect();
                let bits_b: Vec<u64> = b.iter().map(|v| v.to_bits()).collect();
                assert_eq!(bits_a, bits_b);
            }
            other => panic!("engines disagreed on readiness: {other:?}"),
        }
    }
}

#[test]
fn rows_are_aligned_to_the_installed_column_list() {
    let ticks: Vec<Tick> = (0..40).map(wavy_tick).collect();

    let mut columns = feature_columns();
    columns.retain(|c| c != "bitcoin_ma30");
    columns.insert(0, "made_up_feature".to_string());

    let mut engine = OnlineFeatureEngine::with_default_capacity();
    engine.set_feature_columns(columns.clone());

    let mut last = None;
    for tick in &ticks {
        last = engine.update(*tick).expect("update");
    }
    let row = last.expect("engine is warm");

    assert_eq!(row.len(), columns.len());
    // a column training knew about but the transform does not produce is
    // repaired to 0 rather than failing the request
    assert_eq!(row[0], 0.0);
    // real feature values still flow through at their forced positions
    let return_pos = columns
        .iter()
        .position(|c| c == "bitcoin_return")
        .expect("column present");
    assert!(row[return_pos] != 0.0);
}

#[test]
fn early_ticks_report_not_ready_instead_of_failing() {
    let mut engine = OnlineFeatureEngine::with_default_capacity();
    assert!(engine.update(wavy_tick(0)).expect("update").is_none());
    assert!(engine.update(wavy_tick(1)).expect("update").is_some());
}

#[test]
fn undersized_buffers_are_rejected_at_construction() {
    let err = OnlineFeatureEngine::new(MA_LONG).expect_err("too small");
    assert!(matches!(err, FeatureError::InvalidConfig(_)));
}
