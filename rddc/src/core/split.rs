use crate::error::{require_positive, Result};

/// Cuts `items` into `num_slices` contiguous slices whose sizes differ by at
/// most one. The first `len % num_slices` slices get the extra element.
pub fn split_balanced<T: Clone>(items: &[T], num_slices: usize) -> Result<Vec<Vec<T>>> {
    let num_slices = require_positive("num_slices", num_slices)?;
    let rest = items.len() % num_slices;
    let each = (items.len() - rest) / num_slices;

    let mut remaining = items.iter();
    Ok((0..num_slices)
        .map(|slice| {
            let size = if slice < rest { each + 1 } else { each };
            remaining.by_ref().take(size).cloned().collect()
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::Error;

    #[test]
    fn sizes_are_balanced_and_order_is_kept() {
        for len in 0..40 {
            let items: Vec<usize> = (0..len).collect();
            for n in 1..9 {
                let slices = split_balanced(&items, n).unwrap();
                assert_eq!(slices.len(), n);

                let sizes: Vec<usize> = slices.iter().map(Vec::len).collect();
                assert_eq!(sizes.iter().sum::<usize>(), len);
                let (lo, hi) = (sizes.iter().min().unwrap(), sizes.iter().max().unwrap());
                assert!(hi - lo <= 1, "len={len} n={n} sizes={sizes:?}");
                // bigger slices come first
                assert!(sizes.windows(2).all(|w| w[0] >= w[1]));

                assert_eq!(slices.concat(), items);
            }
        }
    }

    #[test]
    fn uneven_split() {
        let slices = split_balanced(&[1, 2, 3, 4, 5, 6, 7], 3).unwrap();
        assert_eq!(slices, vec![vec![1, 2, 3], vec![4, 5], vec![6, 7]]);
    }

    #[test]
    fn more_slices_than_items() {
        let slices = split_balanced(&["a", "b"], 4).unwrap();
        assert_eq!(slices, vec![vec!["a"], vec!["b"], vec![], vec![]]);
    }

    #[test]
    fn zero_slices_is_a_config_error() {
        let err = split_balanced(&[1, 2, 3], 0).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
