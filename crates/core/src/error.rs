/// Errors raised while turning step lines into signatures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StepFormatError {
    /// The line does not start with a recognized step keyword. The feature
    /// parser and the extractor share one keyword grammar, so this only
    /// occurs when a caller hands the extractor arbitrary text.
    #[error("unrecognized step keyword in line: {line}")]
    UnrecognizedKeyword { line: String },

    /// The step has nothing after its keyword.
    #[error("step has no text after keyword: {line}")]
    EmptyStep { line: String },
}
