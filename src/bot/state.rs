use serde::{Deserialize, Serialize};

/// Represents the current state of the user dialogue
///
/// A selection moves the dialogue through a transient "done" step straight back
/// to [`State::AwaitingQuery`], so it has no variant of its own.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum State {
    /// Waiting for a movie title
    #[default]
    AwaitingQuery,
    /// Search results were offered as inline buttons
    ShowingResults,
}
