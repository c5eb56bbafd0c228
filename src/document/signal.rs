//! Side effects a reducer asks its host to perform

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "input", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    CreateChildDocument {
        id: String,
        #[serde(rename = "documentType")]
        document_type: String,
    },
    DeleteChildDocument {
        id: String,
    },
    CopyChildDocument {
        id: String,
        #[serde(rename = "newId")]
        new_id: String,
    },
}

/// Receiver for reducer signals.
///
/// Signals are fire-and-forget: the handler cannot fail the dispatch.
pub trait SignalHandler {
    fn dispatch(&self, signal: Signal);
}

impl<F> SignalHandler for F
where
    F: Fn(Signal),
{
    fn dispatch(&self, signal: Signal) {
        self(signal)
    }
}
