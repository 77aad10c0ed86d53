//! Response-time running average (C9, spec.md §4.9).

/// `newAvg = round((oldAvg·n + sample) / (n+1))`. A missing prior average
/// is treated as `n=0, avg=sample`.
pub fn running_average(prior_avg_ms: Option<u64>, sample_ms: u64, prior_success_count: u64) -> u64 {
    let Some(prior_avg) = prior_avg_ms else {
        return sample_ms;
    };
    let total = prior_avg * prior_success_count + sample_ms;
    let n_plus_one = prior_success_count + 1;
    (total + n_plus_one / 2) / n_plus_one
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_prior_average_becomes_the_sample() {
        assert_eq!(running_average(None, 120, 0), 120);
    }

    #[test]
    fn averages_in_subsequent_samples() {
        // n=1, oldAvg=100, sample=200 -> (100*1+200)/2 = 150
        assert_eq!(running_average(Some(100), 200, 1), 150);
    }

    #[test]
    fn rounds_to_nearest_integer() {
        // n=2, oldAvg=100, sample=101 -> (200+101)/3 = 100.33 -> rounds to 100
        assert_eq!(running_average(Some(100), 101, 2), 100);
    }
}
