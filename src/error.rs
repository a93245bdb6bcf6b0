use crate::span::Span;

/// Crate-wide error taxonomy.
///
/// `DeviceUnavailable` is terminal for the session and never retried.
/// `Compile` and `LayoutMismatch` abort the current build but leave
/// transcripts intact, so a corrected regeneration can retry the build.
/// The remaining variants are caller errors reported synchronously at the
/// introducing call, before any type table or buffer registry is mutated.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no usable GPU device: {reason}")]
    DeviceUnavailable { reason: String },

    #[error("unsupported host type `{0}`")]
    UnsupportedType(String),

    #[error("malformed source on line {line}: {message}")]
    MalformedSource {
        message: String,
        line: usize,
        span: Span,
    },

    #[error("output links to unknown input `{0}`")]
    UnknownLink(String),

    #[error("shader compilation failed: {0}")]
    Compile(String),

    #[error("bind group layout does not match the current buffer set: {0}")]
    LayoutMismatch(String),

    #[error("unknown function `{0}`")]
    UnknownFunction(String),

    #[error("function `{function}` has no variable `{variable}`")]
    UnknownVariable { function: String, variable: String },

    #[error("invalid workgroup size: {0}")]
    InvalidWorkgroup(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Render span-carrying errors against their source text with ariadne;
    /// everything else falls back to the Display form on stderr.
    pub fn render(&self, filename: &str, source: &str) {
        use ariadne::{Color, Label, Report, ReportKind, Source};

        match self {
            Error::MalformedSource { message, span, .. } => {
                Report::build(ReportKind::Error, filename, span.start as usize)
                    .with_message(message)
                    .with_label(
                        Label::new((filename, span.start as usize..span.end as usize))
                            .with_message(message)
                            .with_color(Color::Red),
                    )
                    .finish()
                    .eprint((filename, Source::from(source)))
                    .ok();
            }
            other => eprintln!("error: {other}"),
        }
    }
}
