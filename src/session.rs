//! The translation session: owns transcripts and drives generation and
//! regeneration. One session per manager; `&mut self` on every mutating
//! operation means only one translation can be in flight at a time, by
//! construction rather than convention.

use tracing::debug;

use crate::emit::{generate_body, parse_signature, workgroup_product, TableMode};
use crate::error::{Error, Result};
use crate::infer::{infer_param_types, CallArg};
use crate::token::tokenize;
use crate::transcript::{FunctionKind, Transcript, TranscriptStore};
use crate::types::{TypeTable, WgslType};

#[derive(Default, Debug)]
pub struct Session {
    transcripts: TranscriptStore,
    entry: Option<String>,
    /// Set by submit_edit, cleared by confirm.
    dirty: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Translate one helper function with caller-declared parameter types,
    /// matched positionally against the declaration. Returns the generated
    /// body. Translating a name again replaces the stored transcript.
    pub fn translate_function(
        &mut self,
        source: &str,
        return_type: WgslType,
        param_types: &[WgslType],
    ) -> Result<String> {
        self.translate(source, FunctionKind::Helper { return_type }, param_types)
    }

    /// Compatibility mode: infer parameter types from positional call-site
    /// arguments with the comma-count heuristic.
    pub fn translate_function_with_args(
        &mut self,
        source: &str,
        return_type: WgslType,
        args: &[CallArg],
    ) -> Result<String> {
        let param_types = infer_param_types(args);
        self.translate(source, FunctionKind::Helper { return_type }, &param_types)
    }

    /// Translate the designated compute entry point. `workgroup` holds up
    /// to three positive size components; their product becomes the
    /// declared workgroup size.
    pub fn translate_entry(&mut self, source: &str, workgroup: &[u32]) -> Result<String> {
        self.translate_entry_typed(source, &[], workgroup)
    }

    /// Entry-point translation for kernels that also declare parameters.
    pub fn translate_entry_typed(
        &mut self,
        source: &str,
        param_types: &[WgslType],
        workgroup: &[u32],
    ) -> Result<String> {
        let workgroup = workgroup_product(workgroup)?;
        self.translate(source, FunctionKind::Entry { workgroup }, param_types)
    }

    fn translate(
        &mut self,
        source: &str,
        kind: FunctionKind,
        param_types: &[WgslType],
    ) -> Result<String> {
        let lines = tokenize(source)?;
        let sig = parse_signature(&lines[0])?;
        if sig.params.len() != param_types.len() {
            return Err(Error::MalformedSource {
                message: format!(
                    "`{}` declares {} parameters but {} types were supplied",
                    sig.name,
                    sig.params.len(),
                    param_types.len()
                ),
                line: 1,
                span: lines[0].span,
            });
        }
        let mut vars: TypeTable = sig
            .params
            .iter()
            .cloned()
            .zip(param_types.iter().copied())
            .collect();
        let body = generate_body(&lines, &mut vars, kind, TableMode::Record)?;
        debug!(function = %sig.name, "translated function");
        if matches!(kind, FunctionKind::Entry { .. }) {
            self.entry = Some(sig.name.clone());
        }
        self.transcripts.insert(Transcript {
            name: sig.name,
            kind,
            lines,
            vars,
            body: body.clone(),
        });
        Ok(body)
    }

    /// The variable table of a translated function, in declaration order.
    pub fn list_variables(&self, function: &str) -> Result<&TypeTable> {
        self.transcripts
            .get(function)
            .map(|t| &t.vars)
            .ok_or_else(|| Error::UnknownFunction(function.to_string()))
    }

    /// Translated function names, in translation order.
    pub fn functions(&self) -> impl Iterator<Item = &str> {
        self.transcripts.iter().map(|t| t.name.as_str())
    }

    /// The designated entry-point name, if one has been translated.
    pub fn entry_point(&self) -> Option<&str> {
        self.entry.as_deref()
    }

    /// Change one existing variable's type, or the return type via the
    /// pseudo-variable `return`. Edits may only change entries that
    /// already exist; they take effect at the next confirm.
    pub fn submit_edit(&mut self, function: &str, variable: &str, new_type: &str) -> Result<()> {
        let ty = WgslType::parse(new_type)?;
        let transcript = self
            .transcripts
            .get_mut(function)
            .ok_or_else(|| Error::UnknownFunction(function.to_string()))?;
        if variable == "return" {
            match &mut transcript.kind {
                FunctionKind::Helper { return_type } => *return_type = ty,
                FunctionKind::Entry { .. } => {
                    return Err(Error::UnknownVariable {
                        function: function.to_string(),
                        variable: variable.to_string(),
                    })
                }
            }
        } else {
            let slot = transcript
                .vars
                .get_mut(variable)
                .ok_or_else(|| Error::UnknownVariable {
                    function: function.to_string(),
                    variable: variable.to_string(),
                })?;
            *slot = ty;
        }
        self.dirty = true;
        Ok(())
    }

    /// Regenerate every stored body against the (possibly edited) tables.
    /// No-op unless an edit occurred since the last confirm; returns
    /// whether a regeneration happened. Nothing is re-tokenized and no
    /// types are re-inferred.
    pub fn confirm(&mut self) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }
        for transcript in self.transcripts.iter_mut() {
            transcript.body = generate_body(
                &transcript.lines,
                &mut transcript.vars,
                transcript.kind,
                TableMode::Frozen,
            )?;
        }
        self.dirty = false;
        debug!("regenerated shader source after type corrections");
        Ok(true)
    }

    /// Assemble the full shader source: the binding header, helper bodies
    /// in translation order, and the entry point last.
    pub fn assemble(&self, header: &str) -> String {
        let mut out = String::from(header);
        for transcript in self
            .transcripts
            .iter()
            .filter(|t| !matches!(t.kind, FunctionKind::Entry { .. }))
        {
            out.push_str(&transcript.body);
            out.push('\n');
        }
        if let Some(entry) = self.entry.as_deref().and_then(|n| self.transcripts.get(n)) {
            out.push_str(&entry.body);
            out.push('\n');
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.transcripts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScalarKind;

    const ADD: &str = "function add(a, b) {\n    let c = 5;\n    return c;\n}";

    #[test]
    fn test_helper_translation() {
        let mut session = Session::new();
        let body = session
            .translate_function(ADD, WgslType::F32, &[WgslType::F32, WgslType::F32])
            .unwrap();
        assert!(body.contains("fn add(a: f32, b: f32) -> f32 {"));
        assert!(body.contains("var c : f32 = 5;"));
        assert!(body.contains("return c;"));
        assert!(body.trim_end().ends_with('}'));
    }

    #[test]
    fn test_heuristic_translation() {
        let mut session = Session::new();
        let body = session
            .translate_function_with_args(
                "function sub(x, y) {\n    return x;\n}",
                WgslType::F32,
                &[
                    CallArg::Number(3.0),
                    CallArg::Collection("4,4,5".to_string()),
                ],
            )
            .unwrap();
        assert!(body.contains("fn sub(x: f32, y: array<f32,3>) -> f32 {"));
    }

    #[test]
    fn test_param_count_mismatch() {
        let mut session = Session::new();
        let err = session
            .translate_function(ADD, WgslType::F32, &[WgslType::F32])
            .unwrap_err();
        assert!(matches!(err, Error::MalformedSource { .. }));
        assert!(session.is_empty());
    }

    #[test]
    fn test_entry_translation() {
        let mut session = Session::new();
        let body = session
            .translate_entry(
                "function main_kernel() {\n    let i = id.x;\n}",
                &[2, 2],
            )
            .unwrap();
        assert!(body.contains(
            "@compute @workgroup_size(4) fn main_kernel(@builtin(global_invocation_id) id: vec3<u32>) {"
        ));
        assert_eq!(session.entry_point(), Some("main_kernel"));
    }

    #[test]
    fn test_assemble_puts_entry_last() {
        let mut session = Session::new();
        session
            .translate_entry("function main_kernel() {\n    let i = id.x;\n}", &[1])
            .unwrap();
        session
            .translate_function(ADD, WgslType::F32, &[WgslType::F32, WgslType::F32])
            .unwrap();
        let source = session.assemble("// header\n");
        let header_pos = source.find("// header").unwrap();
        let add_pos = source.find("fn add").unwrap();
        let entry_pos = source.find("@compute").unwrap();
        assert!(header_pos < add_pos && add_pos < entry_pos);
    }

    #[test]
    fn test_edit_changes_only_its_declaration() {
        let mut session = Session::new();
        let before = session
            .translate_function(ADD, WgslType::F32, &[WgslType::F32, WgslType::F32])
            .unwrap();
        session.submit_edit("add", "c", "i32").unwrap();
        assert!(session.confirm().unwrap());
        let after = session.list_variables("add").unwrap();
        assert_eq!(after.get("c"), Some(&WgslType::I32));

        let regenerated = session.assemble("");
        for (old, new) in before.lines().zip(regenerated.lines()) {
            if old.contains("var c") {
                assert_eq!(new, "var c : i32 = 5;");
            } else {
                assert_eq!(old, new);
            }
        }
    }

    #[test]
    fn test_return_type_edit() {
        let mut session = Session::new();
        session
            .translate_function(ADD, WgslType::F32, &[WgslType::F32, WgslType::F32])
            .unwrap();
        session.submit_edit("add", "return", "i32").unwrap();
        session.confirm().unwrap();
        assert!(session.assemble("").contains("-> i32 {"));
    }

    #[test]
    fn test_regeneration_is_idempotent() {
        let mut session = Session::new();
        session
            .translate_function(ADD, WgslType::F32, &[WgslType::F32, WgslType::F32])
            .unwrap();
        session.submit_edit("add", "c", "u32").unwrap();
        session.confirm().unwrap();
        let first = session.assemble("");
        session.submit_edit("add", "c", "u32").unwrap();
        session.confirm().unwrap();
        assert_eq!(session.assemble(""), first);
    }

    #[test]
    fn test_confirm_without_edits_is_noop() {
        let mut session = Session::new();
        session
            .translate_function(ADD, WgslType::F32, &[WgslType::F32, WgslType::F32])
            .unwrap();
        assert!(!session.confirm().unwrap());
    }

    #[test]
    fn test_edit_validation() {
        let mut session = Session::new();
        session
            .translate_function(ADD, WgslType::F32, &[WgslType::F32, WgslType::F32])
            .unwrap();
        assert!(matches!(
            session.submit_edit("missing", "c", "i32"),
            Err(Error::UnknownFunction(_))
        ));
        assert!(matches!(
            session.submit_edit("add", "nope", "i32"),
            Err(Error::UnknownVariable { .. })
        ));
        assert!(matches!(
            session.submit_edit("add", "c", "f64"),
            Err(Error::UnsupportedType(_))
        ));
        // None of the rejected edits marked the session dirty.
        assert!(!session.confirm().unwrap());
    }

    #[test]
    fn test_retranslation_replaces_transcript() {
        let mut session = Session::new();
        session
            .translate_function(ADD, WgslType::F32, &[WgslType::F32, WgslType::F32])
            .unwrap();
        session
            .translate_function(
                "function add(a) {\n    return a;\n}",
                WgslType::I32,
                &[WgslType::I32],
            )
            .unwrap();
        let source = session.assemble("");
        assert_eq!(source.matches("fn add").count(), 1);
        assert!(source.contains("fn add(a: i32) -> i32 {"));
        assert_eq!(
            session.list_variables("add").unwrap().get("a"),
            Some(&WgslType::I32)
        );
    }

    #[test]
    fn test_variables_listed_in_declaration_order() {
        let mut session = Session::new();
        session
            .translate_function(ADD, WgslType::F32, &[WgslType::F32, WgslType::F32])
            .unwrap();
        let names: Vec<&str> = session
            .list_variables("add")
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(
            session.list_variables("add").unwrap().get("a"),
            Some(&WgslType::Scalar(ScalarKind::F32))
        );
    }
}
