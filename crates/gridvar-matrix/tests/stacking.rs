//! Structural editing across operations: stacking, transposing, and
//! appending have to compose without corrupting the single-block storage.

use gridvar_matrix::NumericMatrix;

#[test]
fn test_vstack_concatenates_rows_in_order() {
    let mut a = NumericMatrix::from_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    let b = NumericMatrix::from_slice(1, 3, &[7.0, 8.0, 9.0]);
    a.vstack(&b);
    assert_eq!((a.rows(), a.columns()), (3, 3));
    assert_eq!(
        a.data(),
        &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]
    );
}

#[test]
fn test_empty_operands_are_neutral() {
    let mut empty = NumericMatrix::new(0, 0);
    let b = NumericMatrix::from_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
    empty.vstack(&b);
    assert_eq!(empty.data(), b.data());

    let mut a = NumericMatrix::from_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
    a.vstack(&NumericMatrix::new(0, 0));
    a.hstack(&NumericMatrix::new(0, 0));
    assert_eq!((a.rows(), a.columns()), (2, 2));
    assert_eq!(a.data(), &[1.0, 2.0, 3.0, 4.0]);
}

#[test]
#[should_panic(expected = "vstack column mismatch")]
fn test_vstack_column_mismatch_panics() {
    let mut a = NumericMatrix::from_slice(1, 3, &[1.0, 2.0, 3.0]);
    let b = NumericMatrix::from_slice(1, 2, &[4.0, 5.0]);
    a.vstack(&b);
}

#[test]
fn test_hstack_concatenates_columns_in_order() {
    let mut a = NumericMatrix::from_slice(2, 2, &[1.0, 2.0, 5.0, 6.0]);
    let b = NumericMatrix::from_slice(2, 1, &[3.0, 7.0]);
    a.hstack(&b);
    assert_eq!((a.rows(), a.columns()), (2, 3));
    assert_eq!(a.data(), &[1.0, 2.0, 3.0, 5.0, 6.0, 7.0]);
}

#[test]
#[should_panic(expected = "hstack row mismatch")]
fn test_hstack_row_mismatch_panics() {
    let mut a = NumericMatrix::from_slice(2, 1, &[1.0, 2.0]);
    let b = NumericMatrix::from_slice(3, 1, &[3.0, 4.0, 5.0]);
    a.hstack(&b);
}

#[test]
fn test_transpose_is_an_involution() {
    for (r, c) in [(1usize, 1usize), (1, 5), (5, 1), (2, 3), (4, 4), (3, 7)] {
        let data: Vec<f64> = (0..r * c).map(|k| k as f64).collect();
        let mut m = NumericMatrix::from_slice(r, c, &data);
        m.transpose();
        assert_eq!((m.rows(), m.columns()), (c, r));
        m.transpose();
        assert_eq!((m.rows(), m.columns()), (r, c));
        assert_eq!(m.data(), &data[..]);
    }
}

#[test]
fn test_transpose_permutes_elements() {
    let mut m = NumericMatrix::from_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    m.transpose();
    assert_eq!(m.data(), &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    assert_eq!(m.get(2, 1), Some(6.0));
}

#[test]
fn test_append_preserves_orientation() {
    let mut row = NumericMatrix::from_slice(1, 2, &[1.0, 2.0]);
    row.append(3.0);
    assert_eq!((row.rows(), row.columns()), (1, 3));
    assert_eq!(row.data(), &[1.0, 2.0, 3.0]);

    let mut col = NumericMatrix::from_slice(3, 1, &[1.0, 2.0, 3.0]);
    col.append(4.0);
    assert_eq!((col.rows(), col.columns()), (4, 1));

    let mut empty = NumericMatrix::new(0, 0);
    empty.append(9.0);
    assert_eq!((empty.rows(), empty.columns()), (1, 1));
    assert_eq!(empty.get(0, 0), Some(9.0));
}

#[test]
#[should_panic(expected = "append to a non-vector")]
fn test_append_to_two_dimensional_shape_panics() {
    let mut m = NumericMatrix::from_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
    m.append(5.0);
}

#[test]
fn test_resize_then_stack_round_trip() {
    // Grow a vector into a matrix, stack a copy below, then shrink back:
    // the leading elements must survive each reallocation by linear index.
    let mut m = NumericMatrix::from_slice(1, 2, &[1.0, 2.0]);
    m.resize(2, 2);
    assert_eq!(m.data(), &[1.0, 2.0, 0.0, 0.0]);

    let copy = m.clone();
    m.vstack(&copy);
    assert_eq!((m.rows(), m.columns()), (4, 2));

    m.resize(1, 3);
    assert_eq!(m.data(), &[1.0, 2.0, 0.0]);
}
