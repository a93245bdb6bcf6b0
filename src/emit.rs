//! Per-line WGSL generation.
//!
//! A token line runs through an ordered list of independent rewriting
//! passes (directive suppression, namespace-qualifier drop, switch
//! unwrapping, array-literal folding) and is then rendered with keyword
//! mapping, declaration type annotation, and member-access spacing. Type
//! recording is a separate explicit step, so regeneration can rerun the
//! same lines against an edited table without inferring anything new.

use crate::error::{Error, Result};
use crate::span::Span;
use crate::token::TokenLine;
use crate::transcript::FunctionKind;
use crate::types::{ScalarKind, TypeTable, WgslType};

/// Whether generation may record newly sighted declarations in the type
/// table (first translation) or must leave it untouched (regeneration).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableMode {
    Record,
    Frozen,
}

/// Declaration-line pieces shared by helper and entry signatures.
#[derive(Clone, Debug)]
pub struct Signature {
    pub name: String,
    pub params: Vec<String>,
}

/// Pull the function name and parameter names out of a declaration line.
pub fn parse_signature(line: &TokenLine) -> Result<Signature> {
    let malformed = |message: &str| Error::MalformedSource {
        message: message.to_string(),
        line: 1,
        span: line.span,
    };
    let tokens = &line.tokens;
    if tokens.len() < 2 {
        return Err(malformed("declaration line has no function name"));
    }
    let open = tokens
        .iter()
        .position(|t| t == "(")
        .ok_or_else(|| malformed("declaration line has no parameter list"))?;
    let close = tokens
        .iter()
        .position(|t| t == ")")
        .ok_or_else(|| malformed("declaration line has no closing parenthesis"))?;
    if open < 2 || close < open {
        return Err(malformed("declaration line has no function name"));
    }
    let params = tokens[open + 1..close]
        .iter()
        .filter(|t| *t != ",")
        .cloned()
        .collect();
    Ok(Signature {
        name: tokens[open - 1].clone(),
        params,
    })
}

/// Collapse up to three workgroup-size components into the linear size the
/// generated entry point declares. Missing components default to 1.
pub fn workgroup_product(components: &[u32]) -> Result<u32> {
    if components.len() > 3 {
        return Err(Error::InvalidWorkgroup(format!(
            "{} components given, at most 3 allowed",
            components.len()
        )));
    }
    if components.contains(&0) {
        return Err(Error::InvalidWorkgroup(
            "components must be positive".to_string(),
        ));
    }
    Ok(components.iter().product())
}

/// `fn name(a: f32, b: f32) -> f32 {`
fn emit_declaration(
    sig: &Signature,
    vars: &TypeTable,
    return_type: WgslType,
    span: Span,
) -> Result<String> {
    let params = typed_params(sig, vars, span)?;
    Ok(format!(
        "fn {}({}) -> {} {{",
        sig.name,
        params.join(", "),
        return_type
    ))
}

/// `@compute @workgroup_size(W) fn name(@builtin(global_invocation_id) id: vec3<u32>) {`
fn emit_entry_declaration(
    sig: &Signature,
    vars: &TypeTable,
    workgroup: u32,
    span: Span,
) -> Result<String> {
    let mut params = typed_params(sig, vars, span)?;
    params.push("@builtin(global_invocation_id) id: vec3<u32>".to_string());
    Ok(format!(
        "@compute @workgroup_size({workgroup}) fn {}({}) {{",
        sig.name,
        params.join(", ")
    ))
}

fn typed_params(sig: &Signature, vars: &TypeTable, span: Span) -> Result<Vec<String>> {
    sig.params
        .iter()
        .map(|p| {
            let ty = vars.get(p).ok_or_else(|| Error::MalformedSource {
                message: format!("parameter `{p}` has no declared type"),
                line: 1,
                span,
            })?;
            Ok(format!("{p}: {ty}"))
        })
        .collect()
}

/// A directive line ("use strict" and kin) suppresses the whole line.
fn is_directive(tokens: &[String]) -> bool {
    matches!(
        tokens.first().map(String::as_str),
        Some("'use") | Some("\"use")
    )
}

/// Drop namespace qualifiers so namespaced math calls become free-function
/// calls: `Math . sqrt ( x )` → `sqrt ( x )`.
fn drop_namespace_qualifier(tokens: Vec<String>) -> Vec<String> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut iter = tokens.into_iter().peekable();
    while let Some(tok) = iter.next() {
        if tok == "Math" && iter.peek().map(String::as_str) == Some(".") {
            iter.next();
            continue;
        }
        out.push(tok);
    }
    out
}

/// Unwrap the parenthesis pair delimiting a switch expression:
/// `switch ( x ) {` → `switch x {`.
fn unwrap_switch_parens(tokens: Vec<String>) -> Vec<String> {
    let Some(switch_pos) = tokens.iter().position(|t| t == "switch") else {
        return tokens;
    };
    let Some(open) = tokens[switch_pos..]
        .iter()
        .position(|t| t == "(")
        .map(|p| p + switch_pos)
    else {
        return tokens;
    };
    let mut depth = 0usize;
    let mut close = None;
    for (i, tok) in tokens.iter().enumerate().skip(open) {
        match tok.as_str() {
            "(" => depth += 1,
            ")" => {
                depth -= 1;
                if depth == 0 {
                    close = Some(i);
                    break;
                }
            }
            _ => {}
        }
    }
    let Some(close) = close else { return tokens };
    tokens
        .into_iter()
        .enumerate()
        .filter(|(i, _)| *i != open && *i != close)
        .map(|(_, tok)| tok)
        .collect()
}

/// Fold a `= [ a , b , ... ]` literal into a single `array(a,b,...)`
/// token, keeping everything after the closing bracket.
fn fold_array_literal(tokens: Vec<String>) -> Vec<String> {
    let Some(open) = tokens
        .windows(2)
        .position(|w| w[0] == "=" && w[1] == "[")
        .map(|p| p + 1)
    else {
        return tokens;
    };
    let Some(close) = tokens[open..].iter().position(|t| t == "]").map(|p| p + open) else {
        return tokens;
    };
    let elements: Vec<&str> = tokens[open + 1..close]
        .iter()
        .filter(|t| *t != ",")
        .map(String::as_str)
        .collect();
    let mut out = tokens[..open].to_vec();
    out.push(format!("array({})", elements.join(",")));
    out.extend_from_slice(&tokens[close + 1..]);
    out
}

/// First-translation side of the table contract: `let`/`var`/`const`
/// register the declared name as f32, and an array-literal assignment
/// fixes the left-hand name to an f32 array whose length is the literal's
/// comma count plus one.
fn record_declarations(tokens: &[String], vars: &mut TypeTable) {
    for (j, tok) in tokens.iter().enumerate() {
        match tok.as_str() {
            "let" | "var" | "const" => {
                if let Some(name) = tokens.get(j + 1) {
                    vars.entry(name.clone())
                        .or_insert(WgslType::Scalar(ScalarKind::F32));
                }
            }
            "[" if j >= 2 && tokens[j - 1] == "=" => {
                let commas = tokens[j + 1..]
                    .iter()
                    .take_while(|t| *t != "]")
                    .filter(|t| *t == ",")
                    .count() as u32;
                vars.insert(
                    tokens[j - 2].clone(),
                    WgslType::Array {
                        elem: ScalarKind::F32,
                        len: commas + 1,
                    },
                );
            }
            _ => {}
        }
    }
}

/// Translate one body line. Declaration lines go through
/// [`generate_body`] instead.
pub fn emit_body_line(line: &TokenLine, vars: &mut TypeTable, mode: TableMode) -> String {
    let tokens = &line.tokens;
    if tokens.is_empty() {
        return String::new();
    }
    if tokens.len() == 1 {
        return tokens[0].clone();
    }
    if is_directive(tokens) {
        return String::new();
    }

    if mode == TableMode::Record {
        record_declarations(tokens, vars);
    }

    let rewritten =
        fold_array_literal(unwrap_switch_parens(drop_namespace_qualifier(tokens.clone())));
    render(&rewritten, vars)
}

/// Keyword mapping plus spacing. Declarations are annotated with the table
/// type, so regenerating with an edited table changes exactly the
/// declaration lines of the edited names.
fn render(tokens: &[String], vars: &TypeTable) -> String {
    let mut out = String::new();
    let mut j = 0;
    while j < tokens.len() {
        let tok = tokens[j].as_str();
        let (text, consumed) = match tok {
            "let" | "var" | "const" => {
                let keyword = if tok == "const" { "let" } else { "var" };
                match tokens.get(j + 1).and_then(|n| vars.get(n).map(|t| (n, t))) {
                    Some((name, ty)) => (format!("{keyword} {name} : {ty}"), 2),
                    None => (keyword.to_string(), 1),
                }
            }
            _ => (tokens[j].clone(), 1),
        };
        // `.` binds tight on both sides: member and namespace access.
        let next = tokens.get(j + consumed).map(String::as_str);
        out.push_str(&text);
        if text != "." && next != Some(".") {
            out.push(' ');
        }
        j += consumed;
    }
    out.trim_end().to_string()
}

/// Generate a whole function body from its token lines: the declaration
/// (helper or entry form), then each body line in order.
pub fn generate_body(
    lines: &[TokenLine],
    vars: &mut TypeTable,
    kind: FunctionKind,
    mode: TableMode,
) -> Result<String> {
    let sig = parse_signature(&lines[0])?;
    let mut out = Vec::with_capacity(lines.len());
    match kind {
        FunctionKind::Helper { return_type } => {
            out.push(emit_declaration(&sig, vars, return_type, lines[0].span)?);
        }
        FunctionKind::Entry { workgroup } => {
            out.push(emit_entry_declaration(&sig, vars, workgroup, lines[0].span)?);
        }
    }
    for line in &lines[1..] {
        out.push(emit_body_line(line, vars, mode));
    }
    Ok(out.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::tokenize;

    fn line(text: &str) -> TokenLine {
        // Tokenize under a dummy declaration so the validator is satisfied.
        let mut lines = tokenize(&format!("function f() {{\n{text}")).unwrap();
        lines.remove(1)
    }

    #[test]
    fn test_parse_signature() {
        let lines = tokenize("function add(a, b) {").unwrap();
        let sig = parse_signature(&lines[0]).unwrap();
        assert_eq!(sig.name, "add");
        assert_eq!(sig.params, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_workgroup_product() {
        assert_eq!(workgroup_product(&[]).unwrap(), 1);
        assert_eq!(workgroup_product(&[4]).unwrap(), 4);
        assert_eq!(workgroup_product(&[2, 2, 3]).unwrap(), 12);
        assert!(matches!(
            workgroup_product(&[1, 1, 1, 1]),
            Err(Error::InvalidWorkgroup(_))
        ));
        assert!(matches!(
            workgroup_product(&[2, 0]),
            Err(Error::InvalidWorkgroup(_))
        ));
    }

    #[test]
    fn test_declaration_registers_f32_and_annotates() {
        let mut vars = TypeTable::new();
        let out = emit_body_line(&line("    let c = 5;"), &mut vars, TableMode::Record);
        assert_eq!(out, "var c : f32 = 5;");
        assert_eq!(vars.get("c"), Some(&WgslType::F32));
    }

    #[test]
    fn test_const_maps_to_let() {
        let mut vars = TypeTable::new();
        let out = emit_body_line(&line("    const k = 2;"), &mut vars, TableMode::Record);
        assert_eq!(out, "let k : f32 = 2;");
    }

    #[test]
    fn test_frozen_mode_leaves_table_untouched() {
        let mut vars = TypeTable::new();
        let out = emit_body_line(&line("    let c = 5;"), &mut vars, TableMode::Frozen);
        assert_eq!(out, "var c = 5;");
        assert!(vars.is_empty());
    }

    #[test]
    fn test_member_access_is_tight() {
        let mut vars = TypeTable::new();
        let out = emit_body_line(&line("    let i = id.x;"), &mut vars, TableMode::Record);
        assert_eq!(out, "var i : f32 = id.x;");
    }

    #[test]
    fn test_namespace_qualifier_dropped() {
        let mut vars = TypeTable::new();
        let out = emit_body_line(&line("    let y = Math.sqrt(x);"), &mut vars, TableMode::Record);
        assert_eq!(out, "var y : f32 = sqrt ( x ) ;");
    }

    #[test]
    fn test_switch_loses_only_its_own_parens() {
        let mut vars = TypeTable::new();
        let out = emit_body_line(&line("    switch (f(x)) {"), &mut vars, TableMode::Record);
        assert_eq!(out, "switch f ( x ) {");
    }

    #[test]
    fn test_array_literal_folds_and_keeps_trailing_tokens() {
        let mut vars = TypeTable::new();
        let out = emit_body_line(&line("    let arr = [4, 5];"), &mut vars, TableMode::Record);
        assert_eq!(out, "var arr : array<f32,2> = array(4,5) ;");
        assert_eq!(
            vars.get("arr"),
            Some(&WgslType::Array {
                elem: ScalarKind::F32,
                len: 2
            })
        );
    }

    #[test]
    fn test_directive_line_is_suppressed() {
        let mut vars = TypeTable::new();
        let out = emit_body_line(&line("    'use strict';"), &mut vars, TableMode::Record);
        assert_eq!(out, "");
    }

    #[test]
    fn test_bare_braces_pass_through() {
        let mut vars = TypeTable::new();
        assert_eq!(emit_body_line(&line("}"), &mut vars, TableMode::Record), "}");
        assert_eq!(emit_body_line(&line("{"), &mut vars, TableMode::Record), "{");
    }
}
