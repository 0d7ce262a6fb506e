//! SIMD kernels for the column statistics behind the correlation estimate.
use wide::f64x4;

const LANES: usize = 4;

/// Sum of a slice. Four-lane main loop, scalar tail.
pub fn sum(values: &[f64]) -> f64 {
    let chunks = values.len() / LANES;
    let mut acc = f64x4::splat(0.0);
    for c in 0..chunks {
        let i = c * LANES;
        acc += f64x4::from([values[i], values[i + 1], values[i + 2], values[i + 3]]);
    }
    let mut total = acc.reduce_add();
    for &v in &values[chunks * LANES..] {
        total += v;
    }
    total
}

/// Dot product of two equal-length slices.
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    let chunks = a.len() / LANES;
    let mut acc = f64x4::splat(0.0);
    for c in 0..chunks {
        let i = c * LANES;
        let va = f64x4::from([a[i], a[i + 1], a[i + 2], a[i + 3]]);
        let vb = f64x4::from([b[i], b[i + 1], b[i + 2], b[i + 3]]);
        acc = va.mul_add(vb, acc);
    }
    let mut total = acc.reduce_add();
    for i in chunks * LANES..a.len() {
        total += a[i] * b[i];
    }
    total
}
