//! Source log level -> OTLP severity mapping.

/// OTLP severity pair: numeric rank plus text label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Severity {
    pub number: i32,
    pub text: &'static str,
}

impl Severity {
    pub const DEBUG: Severity = Severity {
        number: 5,
        text: "DEBUG",
    };
    pub const INFO: Severity = Severity {
        number: 9,
        text: "INFO",
    };
    pub const WARN: Severity = Severity {
        number: 13,
        text: "WARN",
    };
    pub const ERROR: Severity = Severity {
        number: 17,
        text: "ERROR",
    };
}

/// Map a source level token to its OTLP severity.
///
/// Matching is case-sensitive. Unknown and absent tokens map to
/// [`Severity::INFO`].
pub fn map_severity(level: Option<&str>) -> Severity {
    match level {
        Some("debug") => Severity::DEBUG,
        Some("info") => Severity::INFO,
        Some("warn") => Severity::WARN,
        Some("error") => Severity::ERROR,
        _ => Severity::INFO,
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Some("debug"), 5, "DEBUG")]
    #[case(Some("info"), 9, "INFO")]
    #[case(Some("warn"), 13, "WARN")]
    #[case(Some("error"), 17, "ERROR")]
    fn test_known_levels(#[case] level: Option<&str>, #[case] number: i32, #[case] text: &str) {
        let severity = map_severity(level);
        assert_eq!(severity.number, number);
        assert_eq!(severity.text, text);
    }

    #[rstest]
    #[case(None)]
    #[case(Some(""))]
    #[case(Some("ERROR"))]
    #[case(Some("warning"))]
    #[case(Some("critical"))]
    fn test_unknown_levels_default_to_info(#[case] level: Option<&str>) {
        assert_eq!(map_severity(level), Severity::INFO);
    }
}
