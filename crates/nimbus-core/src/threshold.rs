use ndarray::{Array2, ArrayView2};

/// Binarise a continuous field: 1 strictly above `threshold`, else 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BasicThreshold {
    pub threshold: f64,
}

impl BasicThreshold {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn process(&self, values: ArrayView2<f64>) -> Array2<f64> {
        values.mapv(|v| if v > self.threshold { 1.0 } else { 0.0 })
    }
}
