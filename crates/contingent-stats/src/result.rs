use serde::Serialize;

/// Fields every significance test reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestSummary {
    pub test_name: String,
    pub p_value: f64,
    pub alpha: f64,
    /// `p_value < alpha`
    pub is_significant: bool,
    pub interpretation: String,
    /// Observed counts as `[[a, b], [c, d]]`.
    pub observed: [[u64; 2]; 2],
}

impl TestSummary {
    pub(crate) fn new(
        test_name: String,
        p_value: f64,
        alpha: f64,
        observed: [[u64; 2]; 2],
        interpretation: String,
    ) -> Self {
        Self {
            test_name,
            p_value,
            alpha,
            is_significant: p_value < alpha,
            interpretation,
            observed,
        }
    }
}

/// "p < 0.001" for very small values, otherwise three decimals.
pub fn format_p_value(p_value: f64) -> String {
    if p_value < 0.001 {
        "p < 0.001".to_string()
    } else {
        format!("p = {p_value:.3}")
    }
}

/// "95" for 0.95, "97.5" for 0.975.
pub(crate) fn format_percent(level: f64) -> String {
    let pct = level * 100.0;
    if (pct - pct.round()).abs() < 1e-9 {
        format!("{pct:.0}")
    } else {
        format!("{pct:.1}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_p_value() {
        assert_eq!(format_p_value(0.0004), "p < 0.001");
        assert_eq!(format_p_value(0.001), "p = 0.001");
        assert_eq!(format_p_value(0.04321), "p = 0.043");
        assert_eq!(format_p_value(1.0), "p = 1.000");
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(0.95), "95");
        assert_eq!(format_percent(0.99), "99");
        assert_eq!(format_percent(0.975), "97.5");
    }

    #[test]
    fn test_significance_is_strict() {
        let s = TestSummary::new("t".into(), 0.05, 0.05, [[1, 1], [1, 1]], String::new());
        assert!(!s.is_significant);
    }
}
