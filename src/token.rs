use crate::error::{Error, Result};
use crate::span::Span;

/// Punctuation split into standalone tokens.
const DELIMITERS: [char; 6] = ['(', ')', '[', ']', ',', '.'];

/// One source line as an ordered token sequence.
#[derive(Clone, Debug, PartialEq)]
pub struct TokenLine {
    pub tokens: Vec<String>,
    pub span: Span,
}

impl TokenLine {
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Split one function's text into token lines: line breaks, then
/// whitespace, then standalone `( ) [ ] , .` tokens, dropping empties.
///
/// There is no bracket matching, comment, or string awareness; the
/// accepted input is a restricted numeric-kernel grammar. Line 0 must be
/// the declaration line and carry a closing parenthesis, and body lines
/// must have balanced `( )` and `[ ]` counts, or the whole call fails
/// before any state is touched.
pub fn tokenize(source: &str) -> Result<Vec<TokenLine>> {
    let mut lines = Vec::new();
    let mut offset = 0u32;
    for (index, raw) in source.split('\n').enumerate() {
        let span = Span::new(offset, offset + raw.len() as u32);
        offset += raw.len() as u32 + 1;
        let tokens = split_tokens(raw);
        validate_line(index, &tokens, span)?;
        lines.push(TokenLine { tokens, span });
    }
    Ok(lines)
}

fn split_tokens(raw: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for word in raw.split_whitespace() {
        let mut rest = word;
        while let Some(pos) = rest.find(&DELIMITERS[..]) {
            if pos > 0 {
                tokens.push(rest[..pos].to_string());
            }
            tokens.push(rest[pos..pos + 1].to_string());
            rest = &rest[pos + 1..];
        }
        if !rest.is_empty() {
            tokens.push(rest.to_string());
        }
    }
    tokens
}

fn validate_line(index: usize, tokens: &[String], span: Span) -> Result<()> {
    let count = |t: &str| tokens.iter().filter(|x| x.as_str() == t).count();
    if index == 0 {
        if count(")") == 0 {
            return Err(Error::MalformedSource {
                message: "declaration line has no closing parenthesis".to_string(),
                line: 1,
                span,
            });
        }
    } else if count("(") != count(")") || count("[") != count("]") {
        return Err(Error::MalformedSource {
            message: "unbalanced brackets".to_string(),
            line: index + 1,
            span,
        });
    }
    Ok(())
}

/// Split a source file into top-level function texts by brace counting at
/// line granularity. Text outside any function is ignored.
pub fn split_functions(source: &str) -> Vec<String> {
    let mut functions = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut in_function = false;
    for line in source.lines() {
        if !in_function && line.trim_start().starts_with("function") {
            in_function = true;
            depth = 0;
        }
        if in_function {
            current.push_str(line);
            current.push('\n');
            depth += line.matches('{').count() as i32;
            depth -= line.matches('}').count() as i32;
            if depth <= 0 && line.contains('}') {
                functions.push(std::mem::take(&mut current));
                in_function = false;
            }
        }
    }
    functions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declaration_tokens() {
        let lines = tokenize("function add(a, b) { return a; }").unwrap();
        let toks = &lines[0].tokens;
        assert_eq!(toks[0], "function");
        assert_eq!(toks[1], "add");
        assert_eq!(
            &toks[2..8],
            &["(", "a", ",", "b", ")", "{"].map(str::to_string)
        );
    }

    #[test]
    fn test_punctuation_split_and_empties_discarded() {
        let lines = tokenize("function f(x) {\n    y[0] = Math.abs(x);\n}").unwrap();
        assert_eq!(
            lines[1].tokens,
            ["y", "[", "0", "]", "=", "Math", ".", "abs", "(", "x", ")", ";"].map(str::to_string)
        );
        assert!(lines[1].tokens.iter().all(|t| !t.is_empty()));
    }

    #[test]
    fn test_missing_close_paren_is_malformed() {
        let err = tokenize("function f(a {\n}").unwrap_err();
        assert!(matches!(err, Error::MalformedSource { line: 1, .. }));
    }

    #[test]
    fn test_unbalanced_body_brackets_are_malformed() {
        let err = tokenize("function f(a) {\n    a[0 = 1;\n}").unwrap_err();
        assert!(matches!(err, Error::MalformedSource { line: 2, .. }));
    }

    #[test]
    fn test_line_spans_cover_source() {
        let source = "function f() {\nreturn 1;\n}";
        let lines = tokenize(source).unwrap();
        assert_eq!(lines[1].span.start, 15);
        assert_eq!(lines[1].span.end, 24);
        assert_eq!(&source[15..24], "return 1;");
    }

    #[test]
    fn test_split_functions() {
        let source = "\
// preamble
function one(a) {
    return a;
}

function two() {
    let x = [1, 2];
}
";
        let functions = split_functions(source);
        assert_eq!(functions.len(), 2);
        assert!(functions[0].starts_with("function one"));
        assert!(functions[1].starts_with("function two"));
        assert!(functions[1].trim_end().ends_with('}'));
    }
}
