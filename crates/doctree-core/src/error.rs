use thiserror::Error;

/// Validation and application failures for tree operations.
///
/// Every variant is raised before any mutation happens: `Document::apply`
/// validates first, so a returned error always leaves the tree untouched.
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("operation base version {operation} does not match document version {document}")]
    BaseVersionMismatch { operation: u64, document: u64 },
    #[error("position does not address a valid place in the tree")]
    PositionInvalid,
    #[error("range is not flat")]
    RangeNotFlat,
    #[error("attribute value mismatch for key {0}")]
    AttributeValueMismatch(String),
    #[error("cannot move a range of nodes into itself")]
    MoveIntoSelf,
    #[error("rename position or old name is wrong")]
    RenameWrongNameOrPosition,
    #[error("split extent does not cover the rest of the split element")]
    SplitHowManyInvalid,
    #[error("split insertion position does not directly follow the split element")]
    SplitInsertionPositionInvalid,
    #[error("merge extent does not cover the whole source element")]
    MergeHowManyInvalid,
    #[error("merge target must precede the merged element")]
    MergeTargetInvalid,
    #[error("marker name collision: {0}")]
    MarkerNameCollision(String),
    #[error("marker old range does not match the current marker: {0}")]
    MarkerRangeMismatch(String),
    #[error("root operation left the root in an invalid state: {0}")]
    RootStateInvalid(String),
    #[error("unknown root: {0}")]
    RootMissing(String),
    #[error("cannot detach nodes from an attached root")]
    DetachOnAttachedNode,
    #[error("detach operation is not reversible")]
    DetachNotReversible,
}

/// Decode failures for the JSON representation of operations, positions and
/// ranges.
#[derive(Debug, Error, PartialEq)]
pub enum JsonError {
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("wrong type for field: {0}")]
    WrongType(&'static str),
    #[error("unknown operation type: {0}")]
    UnknownOperationType(String),
    #[error("unknown stickiness: {0}")]
    UnknownStickiness(String),
}
