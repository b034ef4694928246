//! Delta columns of the transfer message.
//!
//! A column stores its first value followed by successive differences, so
//! consecutive samples that are numerically close encode as small varints.
//! Arithmetic wraps, which keeps every `i64` sequence reversible.

/// First value followed by differences to the previous value
pub fn delta_encode(values: impl IntoIterator<Item = i64>) -> Vec<i64> {
    let mut previous = 0i64;
    values
        .into_iter()
        .map(|value| {
            let delta = value.wrapping_sub(previous);
            previous = value;
            delta
        })
        .collect()
}

pub fn delta_decode(deltas: &[i64]) -> Vec<i64> {
    let mut previous = 0i64;
    deltas
        .iter()
        .map(|&delta| {
            previous = previous.wrapping_add(delta);
            previous
        })
        .collect()
}

/// Like [`delta_encode`], with differences taken between present values only
pub fn delta_encode_optional(values: impl IntoIterator<Item = Option<i64>>) -> Vec<Option<i64>> {
    let mut previous = 0i64;
    values
        .into_iter()
        .map(|value| {
            value.map(|value| {
                let delta = value.wrapping_sub(previous);
                previous = value;
                delta
            })
        })
        .collect()
}

pub fn delta_decode_optional(deltas: &[Option<i64>]) -> Vec<Option<i64>> {
    let mut previous = 0i64;
    deltas
        .iter()
        .map(|delta| {
            delta.map(|delta| {
                previous = previous.wrapping_add(delta);
                previous
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_values_become_small() {
        // consecutive timestamps 10 ms apart
        let timestamps: Vec<i64> = (0..100).map(|i| 1_700_000_000_000 + i * 10).collect();
        let deltas = delta_encode(timestamps.iter().copied());
        assert_eq!(deltas[0], 1_700_000_000_000);
        assert!(deltas[1..].iter().all(|d| *d == 10));
        assert_eq!(delta_decode(&deltas), timestamps);
    }

    #[test]
    fn test_extreme_deltas_wrap() {
        let values = vec![i64::MAX, i64::MIN, 0, -1];
        assert_eq!(delta_decode(&delta_encode(values.clone())), values);
    }

    #[test]
    fn test_optional_deltas_skip_gaps() {
        let values = vec![Some(11_200), None, Some(11_300), None, None, Some(11_250)];
        let deltas = delta_encode_optional(values.clone());
        assert_eq!(
            deltas,
            vec![Some(11_200), None, Some(100), None, None, Some(-50)]
        );
        assert_eq!(delta_decode_optional(&deltas), values);
        assert!(delta_encode_optional(Vec::new()).is_empty());
    }
}
