use colored::Colorize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FileError {
    #[error("failed to open {}", .filename.bright_yellow().bold())]
    CannotOpen { source: std::io::Error, filename: String },

    #[error("while creating {}", .filename.bright_yellow().bold())]
    WhileCreating { source: std::io::Error, filename: String },
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("syntax error: expected {} at character {}, found {}",
            .expected.yellow().bold(), .offset, .found.yellow().bold())]
    Syntax { offset: usize, expected: String, found: String },

    #[error("syntax error: expected {} at character {}, input ends there",
            .expected.yellow().bold(), .offset)]
    UnexpectedEnd { offset: usize, expected: String },

    #[error("invalid segment specification {}", .0.yellow().bold())]
    Segment(String),
}

#[derive(Error, Debug)]
pub enum TreeError {
    #[error("unexpected unary internal node")]
    UnaryNode,

    #[error("internal node with {0} children, expected a binary tree")]
    Polytomy(usize),

    #[error("invalid event {} on an internal node", .0.yellow().bold())]
    InvalidInternalEvent(String),

    #[error("event {} is not allowed on a leaf", .0.yellow().bold())]
    InvalidLeafEvent(String),
}

#[derive(Error, Debug)]
pub enum SyntenyError {
    #[error("{} is not a subsequence of {}",
            .target.yellow().bold(), .from_seq.yellow().bold())]
    NotASubsequence { from_seq: String, target: String },
}

/// Undefined operations on extended numbers. These are only reachable
/// through programming errors, never from user input.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CostError {
    #[error("cannot add infinities of opposite signs")]
    OppositeInfinities,

    #[error("cannot subtract infinities of the same sign")]
    SameSignInfinities,

    #[error("cannot multiply zero with infinity")]
    ZeroTimesInfinity,

    #[error("cannot divide by zero")]
    DivisionByZero,

    #[error("cannot divide infinity by infinity")]
    InfinityRatio,

    #[error("cannot convert infinity to a finite value")]
    InfiniteValue,
}

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error(
        "no assignment of internal syntenies is consistent with both the \
         leaves and the ancestral synteny {}",
        .ancestral.yellow().bold()
    )]
    InconsistentInput { ancestral: String },

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Synteny(#[from] SyntenyError),

    #[error(transparent)]
    Cost(#[from] CostError),
}

#[derive(Error, Debug)]
pub enum EvalError {
    #[error(
        "the reconciled tree is less parsimonious than the reference tree \
         ({} vs. {});\n\nreference tree:\n{}\n\nreconciled tree:\n{}",
        .reconciled_score, .reference_score, .reference, .reconciled
    )]
    Divergence {
        reference_score: usize,
        reconciled_score: usize,
        reference: String,
        reconciled: String,
    },
}
