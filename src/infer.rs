//! Legacy call-site type inference, kept as a compatibility mode.
//!
//! The primary translation API takes declared parameter types; this module
//! reproduces the original behavior of inspecting positional call-site
//! arguments in their host textual form.

use crate::types::{ScalarKind, WgslType};

/// A positional call-site argument.
#[derive(Clone, Debug)]
pub enum CallArg {
    Number(f64),
    /// A collection argument, carried as the text the caller wrote: an
    /// inline literal ("4, 5") or a bare variable name ("data").
    Collection(String),
}

/// The comma-count heuristic: numbers become `f32`, collections become f32
/// arrays whose length is the comma count of the textual form plus one.
/// The length is textual, not a real element count — a collection passed
/// by variable name always counts as length 1.
pub fn infer_param_types(args: &[CallArg]) -> Vec<WgslType> {
    args.iter()
        .map(|arg| match arg {
            CallArg::Number(_) => WgslType::Scalar(ScalarKind::F32),
            CallArg::Collection(text) => WgslType::Array {
                elem: ScalarKind::F32,
                len: text.matches(',').count() as u32 + 1,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_are_f32() {
        let types = infer_param_types(&[CallArg::Number(3.0), CallArg::Number(-1.5)]);
        assert_eq!(types, vec![WgslType::F32, WgslType::F32]);
    }

    #[test]
    fn test_literal_length_is_comma_count_plus_one() {
        let types = infer_param_types(&[CallArg::Collection("4, 5".to_string())]);
        assert_eq!(
            types,
            vec![WgslType::Array {
                elem: ScalarKind::F32,
                len: 2
            }]
        );
    }

    #[test]
    fn test_variable_name_counts_as_length_one() {
        // The same two-element collection passed by a comma-free name.
        let types = infer_param_types(&[CallArg::Collection("data".to_string())]);
        assert_eq!(
            types,
            vec![WgslType::Array {
                elem: ScalarKind::F32,
                len: 1
            }]
        );
    }
}
