//! Timer statistics finalization.

use std::time::Duration;

use whippet_metric::Timer;

/// Rounds to the nearest integer, half away from zero for positive inputs.
pub(crate) fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Finalizes the derived statistics of a timer with at least one sample in the window.
///
/// The sample buffer is sorted in place, then the aggregate fields (min/max/count/mean/median/
/// stddev/sum/sum_squares/per_second) and the per-threshold percentile fields are computed over
/// it. Callers handle the empty-window case themselves.
pub(crate) fn finalize_timer(timer: &mut Timer, percent_thresholds: &[f64], flush_interval: Duration) {
    timer.values.sort_unstable_by(f64::total_cmp);

    let count = timer.values.len();
    timer.count = count as u64;
    timer.min = timer.values[0];
    timer.max = timer.values[count - 1];

    // Running sums over the sorted samples, so any contiguous tail or head of the distribution
    // can be summarized with a single subtraction.
    let mut cumulative = Vec::with_capacity(count);
    let mut cumulative_squares = Vec::with_capacity(count);
    cumulative.push(timer.values[0]);
    cumulative_squares.push(timer.values[0] * timer.values[0]);
    for i in 1..count {
        cumulative.push(timer.values[i] + cumulative[i - 1]);
        cumulative_squares.push(timer.values[i] * timer.values[i] + cumulative_squares[i - 1]);
    }

    for &threshold in percent_thresholds {
        let mut num_in_threshold = count;
        let mut boundary = timer.max;
        let mut sum = timer.min;
        let mut sum_squares = timer.min * timer.min;
        let mut mean = timer.min;

        if count > 1 {
            num_in_threshold = (round_half_up(threshold.abs() / 100.0 * count as f64) as usize).min(count);
            if num_in_threshold == 0 {
                continue;
            }

            if threshold > 0.0 {
                // Positive thresholds summarize the lowest `num_in_threshold` samples; the
                // boundary is the largest of them.
                boundary = timer.values[num_in_threshold - 1];
                sum = cumulative[num_in_threshold - 1];
                sum_squares = cumulative_squares[num_in_threshold - 1];
            } else {
                // Negative thresholds summarize the highest `num_in_threshold` samples; the
                // boundary is the smallest of them. At the full tail the subtracted prefix is
                // empty.
                let excluded = count - num_in_threshold;
                boundary = timer.values[excluded];
                sum = cumulative[count - 1] - if excluded > 0 { cumulative[excluded - 1] } else { 0.0 };
                sum_squares =
                    cumulative_squares[count - 1] - if excluded > 0 { cumulative_squares[excluded - 1] } else { 0.0 };
            }

            mean = sum / num_in_threshold as f64;
        }

        // Field suffixes use the integer truncation of the threshold; thresholds that truncate to
        // the same suffix replace each other's fields.
        let suffix = (threshold as i64).to_string();
        timer.percentiles.set(format!("count_{}", suffix), num_in_threshold as f64);
        timer.percentiles.set(format!("mean_{}", suffix), mean);
        timer.percentiles.set(format!("sum_{}", suffix), sum);
        timer.percentiles.set(format!("sum_squares_{}", suffix), sum_squares);
        if threshold > 0.0 {
            timer.percentiles.set(format!("upper_{}", suffix), boundary);
        } else {
            timer.percentiles.set(format!("lower_{}", suffix), boundary);
        }
    }

    let sum = cumulative[count - 1];
    let sum_squares = cumulative_squares[count - 1];
    let mean = sum / count as f64;

    let mut sum_of_diffs = 0.0;
    for value in &timer.values {
        sum_of_diffs += (value - mean) * (value - mean);
    }

    let mid = count / 2;
    timer.median = if count % 2 == 0 {
        (timer.values[mid - 1] + timer.values[mid]) / 2.0
    } else {
        timer.values[mid]
    };

    timer.mean = mean;
    timer.std_dev = (sum_of_diffs / count as f64).sqrt();
    timer.sum = sum;
    timer.sum_squares = sum_squares;
    timer.per_second = count as f64 / flush_interval.as_secs_f64();
}
