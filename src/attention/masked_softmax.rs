use ndarray::{Array3, ArrayView3, Axis};

use super::ValidLens;
use crate::backend::Backend;
use crate::error::Result;

/// Softmax over the last axis of (batch, queries, seq_len) scores, masking
/// positions at or beyond each row's valid length.
///
/// Without `valid_lens` every position takes part. A row whose valid length
/// is zero comes back as all zeros.
pub fn masked_softmax(
    backend: &dyn Backend,
    scores: ArrayView3<f32>,
    valid_lens: Option<&ValidLens>,
) -> Result<Array3<f32>> {
    let (batch, queries, seq_len) = scores.dim();
    if let Some(lens) = valid_lens {
        lens.validate(batch, queries, seq_len)?;
    }

    let mut weights = Array3::zeros(scores.raw_dim());
    for (b, (score_rows, mut weight_rows)) in scores
        .outer_iter()
        .zip(weights.outer_iter_mut())
        .enumerate()
    {
        for (q, (row, mut out)) in score_rows
            .axis_iter(Axis(0))
            .zip(weight_rows.axis_iter_mut(Axis(0)))
            .enumerate()
        {
            let valid_len = valid_lens.map_or(seq_len, |lens| lens.get(b, q));
            out.assign(&backend.masked_softmax(row, valid_len)?);
        }
    }

    Ok(weights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuBackend;
    use ndarray::{array, Array3, ArrayView1};

    #[test]
    fn test_per_batch_masks_each_element() {
        let backend = CpuBackend::new();
        let scores = Array3::from_elem((2, 2, 4), 0.5);

        let weights = masked_softmax(&backend, scores.view(), Some(&ValidLens::per_batch(vec![2, 3]))).unwrap();

        for q in 0..2usize {
            assert_eq!(weights.slice(ndarray::s![0, q, ..]), array![0.5, 0.5, 0.0, 0.0]);
            let row: ArrayView1<f32> = weights.slice(ndarray::s![1, q, ..]);
            assert_eq!(row[3], 0.0);
            assert!((row.sum() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_per_query_lengths() {
        let backend = CpuBackend::new();
        let scores = Array3::zeros((1, 2, 3));
        let lens = ValidLens::PerQuery(array![[1, 0]]);

        let weights = masked_softmax(&backend, scores.view(), Some(&lens)).unwrap();

        assert_eq!(weights.slice(ndarray::s![0, 0, ..]), array![1.0, 0.0, 0.0]);
        assert_eq!(weights.slice(ndarray::s![0, 1, ..]), array![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_unmasked_rows_sum_to_one() {
        let backend = CpuBackend::new();
        let scores = array![[[1.0, -2.0, 0.25]]];

        let weights = masked_softmax(&backend, scores.view(), None).unwrap();
        assert!((weights.sum() - 1.0).abs() < 1e-6);
        assert!(weights.iter().all(|&w| w > 0.0));
    }
}
