use super::*;

#[test]
fn sparse_mul_and_transpose() {
    // A = [1 2 0; 0 0 3]
    let mut a = SparseMatrix::new(2, 3);
    a.set(0, 0, 1.0);
    a.set(0, 1, 2.0);
    a.set(1, 2, 3.0);
    let v = [1.0, 1.0, 1.0];
    let mut out = Vec::new();
    a.mul_vec(&v, &mut out);
    assert_eq!(out, vec![3.0, 3.0]);
    let w = [1.0, 2.0];
    a.mul_trans_vec(&w, &mut out);
    assert_eq!(out, vec![1.0, 2.0, 6.0]);
    a.add(0, 1, -2.0);
    assert_eq!(a.get(0, 1), 0.0);
}

#[test]
fn cg_solves_small_least_squares() {
    // Overdetermined system with exact solution x = (1, -2):
    // rows: x0 = 1; x1 = -2; x0 + x1 = -1
    let mut a = SparseMatrix::new(3, 2);
    a.set(0, 0, 1.0);
    a.set(1, 1, 1.0);
    a.set(2, 0, 1.0);
    a.set(2, 1, 1.0);
    let b = [1.0, -2.0, -1.0];
    let mut x = Vec::new();
    let outcome = solve_normal_cg(&a, &b, &mut x, 1000, 1e-10);
    assert!(matches!(outcome, CgOutcome::Converged { .. }));
    assert!((x[0] - 1.0).abs() < 1e-8);
    assert!((x[1] + 2.0).abs() < 1e-8);
}

#[test]
fn cg_reports_exhaustion() {
    let mut a = SparseMatrix::new(2, 2);
    a.set(0, 0, 1.0);
    a.set(1, 1, 1e6);
    let b = [1.0, 1.0];
    let mut x = Vec::new();
    // One iteration cannot reduce the badly scaled residual to 1e-12.
    let outcome = solve_normal_cg(&a, &b, &mut x, 1, 1e-12);
    assert_eq!(outcome, CgOutcome::Exhausted);
}

#[test]
fn heap_orders_and_rekeys() {
    let mut h = MaxHeap::new();
    let a = h.push(1.0, "a");
    let b = h.push(5.0, "b");
    let c = h.push(3.0, "c");
    assert_eq!(h.peek_weight(), Some(5.0));
    h.update(a, 10.0);
    assert_eq!(h.pop(), Some((10.0, "a")));
    h.update(c, 0.5);
    assert_eq!(h.pop(), Some((5.0, "b")));
    assert!(h.contains(c));
    assert!(!h.contains(b));
    assert_eq!(h.pop(), Some((0.5, "c")));
    assert!(h.pop().is_none());
}

#[test]
fn heap_remove_and_reinsert() {
    let mut h = MaxHeap::new();
    let handles: Vec<_> = (0..10).map(|i| h.push(i as f64, i)).collect();
    h.remove(handles[9]);
    h.remove(handles[0]);
    assert_eq!(h.len(), 8);
    assert_eq!(h.pop(), Some((8.0, 8)));
    // A popped element can be re-keyed back into the heap.
    h.update(handles[9], 100.0);
    assert_eq!(h.pop(), Some((100.0, 9)));
    // Remaining elements drain in descending order.
    let mut prev = f64::INFINITY;
    while let Some((w, _)) = h.pop() {
        assert!(w <= prev);
        prev = w;
    }
}
