use std::borrow::Cow;

/// Error produced by an external lowering step.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The template body is not valid script text.
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
    /// The secondary transform failed; its error is passed through as is.
    #[error(transparent)]
    Lowering(BoxError),
    /// A template delimiter is not a valid regular expression.
    #[error("invalid `{name}` delimiter: {source}")]
    Settings {
        name: String,
        #[source]
        source: regex::Error,
    },
    /// Loader options could not be decoded.
    #[error("invalid loader options: {0}")]
    Options(#[from] serde_json::Error),
}

impl Error {
    /// Builds a parse error for byte `offset` of `src`, reporting a 1-based line.
    pub(crate) fn parse_at(src: &str, offset: usize, message: Cow<'_, str>) -> Self {
        let offset = offset.min(src.len());
        let line = src.as_bytes()[..offset]
            .iter()
            .filter(|&&b| b == b'\n')
            .count()
            + 1;
        Error::Parse {
            line,
            message: message.into_owned(),
        }
    }

    /// Moves the reported line of a parse error by `delta` lines.
    pub(crate) fn shift_line(self, delta: isize) -> Self {
        match self {
            Error::Parse { line, message } => Error::Parse {
                line: line.saturating_add_signed(delta).max(1),
                message,
            },
            other => other,
        }
    }
}
