use super::model::{DiscardReason, MIN_FIELDS, SELECTED_COLUMNS};

/// The five projected columns of one admitted line, in feature order.
pub type Observation = [f64; 5];

/// Why a line was refused. Stays inside the extractors; a rejected line only
/// ever turns into a [`DiscardReason`] for its window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineFormatError {
    TooFewFields { found: usize },
    NonNumericField { column: usize },
}

impl LineFormatError {
    /// Attach the run-relative line index.
    pub fn at_line(self, line: usize) -> DiscardReason {
        match self {
            LineFormatError::TooFewFields { found } => DiscardReason::TooFewFields { line, found },
            LineFormatError::NonNumericField { column } => {
                DiscardReason::NonNumericField { line, column }
            }
        }
    }
}

/// Split on whitespace and admit the line only if it has at least
/// [`MIN_FIELDS`] fields.
pub fn validate(line: &str) -> Result<Vec<&str>, LineFormatError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < MIN_FIELDS {
        return Err(LineFormatError::TooFewFields { found: fields.len() });
    }
    Ok(fields)
}

/// Validate and read the projected columns as floats.
pub fn observe(line: &str) -> Result<Observation, LineFormatError> {
    let fields = validate(line)?;
    let mut obs = [0.0; 5];
    for (slot, &column) in obs.iter_mut().zip(SELECTED_COLUMNS.iter()) {
        *slot = fields[column]
            .parse::<f64>()
            .map_err(|_| LineFormatError::NonNumericField { column })?;
    }
    Ok(obs)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A line of `fields` numeric fields; field `i` (0-indexed) holds `base + i`.
    pub(crate) fn trace_line(fields: usize, base: f64) -> String {
        (0..fields)
            .map(|i| format!("{}", base + i as f64))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_short_line_is_invalid() {
        let err = validate(&trace_line(76, 0.0)).unwrap_err();
        assert_eq!(err, LineFormatError::TooFewFields { found: 76 });
    }

    #[test]
    fn test_exactly_min_fields_is_valid() {
        assert_eq!(validate(&trace_line(77, 0.0)).unwrap().len(), 77);
    }

    #[test]
    fn test_mixed_whitespace() {
        let line = trace_line(80, 0.0).replace(' ', " \t ");
        assert_eq!(validate(&format!("  {line}\n")).unwrap().len(), 80);
    }

    #[test]
    fn test_observe_projects_selected_columns() {
        let obs = observe(&trace_line(80, 100.0)).unwrap();
        assert_eq!(obs, [102.0, 103.0, 107.0, 167.0, 176.0]);
    }

    #[test]
    fn test_observe_rejects_non_numeric_column() {
        let mut fields: Vec<String> = (0..77).map(|i| i.to_string()).collect();
        fields[67] = "n/a".into();
        let err = observe(&fields.join(" ")).unwrap_err();
        assert_eq!(err, LineFormatError::NonNumericField { column: 67 });
    }

    #[test]
    fn test_unused_columns_may_be_text() {
        let mut fields: Vec<String> = (0..77).map(|i| i.to_string()).collect();
        fields[0] = "ts".into();
        assert!(observe(&fields.join(" ")).is_ok());
    }
}
