//! Greedy CTC decoding for sequence OCR models.

/// Collapse a per-timestep argmax sequence into text.
///
/// Consecutive repeats collapse to one symbol and index `0` is the CTC blank.
/// Indices outside the charset are skipped.
pub fn ctc_greedy_decode(indices: &[i64], charset: &[String]) -> String {
    let mut text = String::new();
    let mut previous = 0i64;

    for &index in indices {
        if index == previous {
            continue;
        }
        previous = index;
        if index == 0 {
            continue;
        }
        if let Some(symbol) = usize::try_from(index).ok().and_then(|i| charset.get(i)) {
            text.push_str(symbol);
        }
    }

    text
}
