use ndarray::{Array2, ArrayView2};

use crate::error::{Error, Result};

/// Number of leading non-padding key/value positions.
///
/// `PerBatch` gives one length per batch element, shared by all of its
/// queries. `PerQuery` gives one length per (batch element, query) pair and
/// has shape (batch, queries).
#[derive(Debug, Clone, PartialEq)]
pub enum ValidLens {
    PerBatch(Vec<usize>),
    PerQuery(Array2<usize>),
}

impl ValidLens {
    /// One valid length per batch element
    pub fn per_batch(lens: impl Into<Vec<usize>>) -> Self {
        ValidLens::PerBatch(lens.into())
    }

    /// Converts signed lengths, rejecting negative entries
    pub fn from_signed(lens: &[i64]) -> Result<Self> {
        let lens = lens
            .iter()
            .enumerate()
            .map(|(index, &value)| to_len(index, value))
            .collect::<Result<Vec<_>>>()?;
        Ok(ValidLens::PerBatch(lens))
    }

    /// The same signed length for each of `batch` elements
    pub fn uniform_signed(len: i64, batch: usize) -> Result<Self> {
        let len = to_len(0, len)?;
        Ok(ValidLens::PerBatch(vec![len; batch]))
    }

    /// Converts a signed (batch, queries) matrix, rejecting negative entries
    pub fn from_signed_per_query(lens: ArrayView2<i64>) -> Result<Self> {
        let mut out = Array2::zeros(lens.dim());
        for (index, (dst, &value)) in out.iter_mut().zip(lens.iter()).enumerate() {
            *dst = to_len(index, value)?;
        }
        Ok(ValidLens::PerQuery(out))
    }

    /// Valid length for query `query` of batch element `batch`
    pub fn get(&self, batch: usize, query: usize) -> usize {
        match self {
            ValidLens::PerBatch(lens) => lens[batch],
            ValidLens::PerQuery(lens) => lens[[batch, query]],
        }
    }

    /// Checks the lengths against a (batch, queries, seq_len) score layout
    pub fn validate(&self, batch: usize, queries: usize, seq_len: usize) -> Result<()> {
        match self {
            ValidLens::PerBatch(lens) => {
                if lens.len() != batch {
                    return Err(Error::ShapeMismatch {
                        what: "valid lengths per batch",
                        expected: batch,
                        got: lens.len(),
                    });
                }
                check_range(lens.iter().copied(), seq_len)
            }
            ValidLens::PerQuery(lens) => {
                let (rows, cols) = lens.dim();
                if rows != batch {
                    return Err(Error::ShapeMismatch {
                        what: "valid lengths batch rows",
                        expected: batch,
                        got: rows,
                    });
                }
                if cols != queries {
                    return Err(Error::ShapeMismatch {
                        what: "valid lengths query columns",
                        expected: queries,
                        got: cols,
                    });
                }
                check_range(lens.iter().copied(), seq_len)
            }
        }
    }
}

fn to_len(index: usize, value: i64) -> Result<usize> {
    usize::try_from(value).map_err(|_| Error::NegativeValidLength { index, value })
}

fn check_range(lens: impl Iterator<Item = usize>, seq_len: usize) -> Result<()> {
    for (index, valid_len) in lens.enumerate() {
        if valid_len > seq_len {
            return Err(Error::ValidLengthOutOfRange { index, valid_len, seq_len });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_from_signed_rejects_negative() {
        let result = ValidLens::from_signed(&[3, -1, 2]);
        assert!(matches!(result, Err(Error::NegativeValidLength { index: 1, value: -1 })));
    }

    #[test]
    fn test_uniform_signed() {
        assert_eq!(ValidLens::uniform_signed(3, 4).unwrap(), ValidLens::per_batch(vec![3, 3, 3, 3]));
        assert_eq!(ValidLens::uniform_signed(2, 0).unwrap(), ValidLens::per_batch(Vec::new()));
        assert!(matches!(
            ValidLens::uniform_signed(-2, 3),
            Err(Error::NegativeValidLength { index: 0, value: -2 })
        ));
    }

    #[test]
    fn test_from_signed_per_query() {
        let lens = ValidLens::from_signed_per_query(array![[1, 2], [3, 0]].view()).unwrap();
        assert_eq!(lens.get(0, 1), 2);
        assert_eq!(lens.get(1, 1), 0);

        let bad = ValidLens::from_signed_per_query(array![[1, 2], [-4, 0]].view());
        assert!(matches!(bad, Err(Error::NegativeValidLength { index: 2, value: -4 })));
    }

    #[test]
    fn test_validate_out_of_range() {
        let lens = ValidLens::per_batch(vec![5, 6]);
        let result = lens.validate(2, 1, 5);
        assert!(matches!(
            result,
            Err(Error::ValidLengthOutOfRange { index: 1, valid_len: 6, seq_len: 5 })
        ));
    }

    #[test]
    fn test_validate_wrong_batch() {
        let lens = ValidLens::per_batch(vec![1, 2, 3]);
        assert!(matches!(lens.validate(2, 1, 5), Err(Error::ShapeMismatch { expected: 2, got: 3, .. })));

        let per_query = ValidLens::PerQuery(array![[1, 1, 1]]);
        assert!(matches!(
            per_query.validate(1, 2, 5),
            Err(Error::ShapeMismatch { expected: 2, got: 3, .. })
        ));
    }

    #[test]
    fn test_per_batch_shared_across_queries() {
        let lens = ValidLens::per_batch(vec![4]);
        assert!(lens.validate(1, 3, 4).is_ok());
        assert_eq!(lens.get(0, 0), 4);
        assert_eq!(lens.get(0, 2), 4);
    }
}
