use crate::error::DaoError;
use crate::typed::Column;
use crate::types::RowValues;

const PLACEHOLDER: &str = "?";
const SEPARATOR: &str = ",";

/// Build the placeholder list and positional arguments for a `value IN (...)` predicate.
///
/// ```rust
/// use typed_dao::prelude::*;
///
/// let (placeholders, args) = in_args(&[1_i64, 2, 3]).unwrap();
/// assert_eq!(placeholders, "?,?,?");
/// assert_eq!(args, vec![RowValues::Int(1), RowValues::Int(2), RowValues::Int(3)]);
/// let query = format!("SELECT id FROM users WHERE id IN ({placeholders})");
/// # let _ = query;
/// ```
///
/// # Errors
/// Returns [`DaoError::InvalidArgument`] for an empty slice, which has no valid `IN` list.
pub fn in_args<C: Column>(values: &[C]) -> Result<(String, Vec<RowValues>), DaoError> {
    if values.is_empty() {
        return Err(DaoError::InvalidArgument(
            "in_args requires at least one value".into(),
        ));
    }
    let placeholders = vec![PLACEHOLDER; values.len()].join(SEPARATOR);
    let args = values.iter().map(|value| value.to_value()).collect();
    Ok((placeholders, args))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_placeholder_per_value_in_order() {
        let (placeholders, args) = in_args(&["b".to_string(), "a".to_string()]).unwrap();
        assert_eq!(placeholders, "?,?");
        assert_eq!(
            args,
            vec![RowValues::Text("b".into()), RowValues::Text("a".into())]
        );

        let (placeholders, args) = in_args(&[9_u8]).unwrap();
        assert_eq!(placeholders, "?");
        assert_eq!(args, vec![RowValues::Int(9)]);
    }

    #[test]
    fn empty_input_is_rejected() {
        let err = in_args::<i64>(&[]).unwrap_err();
        assert!(matches!(err, DaoError::InvalidArgument(_)));
    }
}
