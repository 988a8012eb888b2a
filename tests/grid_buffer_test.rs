mod common;

use gridmg::solver::gpu::GridBuffer;
use gridmg::SolverError;
use nalgebra::DMatrix;

#[test]
fn test_host_round_trip() {
    let Some(context) = common::context() else {
        return;
    };
    let host = DMatrix::from_fn(5, 7, |row, col| (row * 10 + col) as f32 * 0.5 - 3.0);
    let buffer = GridBuffer::from_host(&context, &host).expect("upload");
    assert_eq!(buffer.dims(), (7, 5));
    assert_eq!(buffer.len(), 35);

    let back = buffer.to_host(&context).expect("download");
    assert_eq!(back, host);
}

#[test]
fn test_row_major_layout() {
    let Some(context) = common::context() else {
        return;
    };
    let data: Vec<f32> = (0..12).map(|v| v as f32).collect();
    let buffer = GridBuffer::from_row_major(&context, 4, 3, &data).expect("upload");
    let host = buffer.to_host(&context).expect("download");
    assert_eq!(host.shape(), (3, 4));
    assert_eq!(host[(1, 2)], 6.0);
    assert_eq!(host[(2, 3)], 11.0);
}

#[test]
fn test_empty_is_zeroed() {
    let Some(context) = common::context() else {
        return;
    };
    let buffer = GridBuffer::empty(&context, 6, 4).expect("allocate");
    let values = buffer.to_row_major(&context).expect("download");
    assert!(values.iter().all(|&v| v == 0.0));
}

#[test]
fn test_duplicate_is_independent_copy() {
    let Some(context) = common::context() else {
        return;
    };
    let host = DMatrix::from_element(3, 3, 2.5f32);
    let original = GridBuffer::from_host(&context, &host).expect("upload");
    let copy = original.duplicate(&context).expect("duplicate");
    drop(original);
    assert_eq!(copy.to_host(&context).expect("download"), host);
}

#[test]
fn test_rejects_bad_shapes() {
    let Some(context) = common::context() else {
        return;
    };
    match GridBuffer::from_row_major(&context, 3, 3, &[0.0; 8]) {
        Err(SolverError::Configuration { parameter, .. }) => assert_eq!(parameter, "data"),
        other => panic!("expected configuration error, got {other:?}"),
    }
    assert!(matches!(
        GridBuffer::empty(&context, 1, 5),
        Err(SolverError::Configuration { .. })
    ));

    let a = GridBuffer::empty(&context, 4, 4).expect("allocate");
    let b = GridBuffer::empty(&context, 4, 5).expect("allocate");
    match a.ensure_same_shape(&b, "test") {
        Err(SolverError::DimensionMismatch {
            expected, found, ..
        }) => {
            assert_eq!(expected, (4, 4));
            assert_eq!(found, (4, 5));
        }
        other => panic!("expected dimension mismatch, got {other:?}"),
    }
}
