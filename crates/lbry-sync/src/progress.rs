use serde::{Deserialize, Serialize};

/// The fixed progress-event taxonomy from §4.6. Serialised as the dotted
/// event name (`"block.init"`, `"claims.takeovers"`, …) so the payload shape
/// matches `{event, data: {...}}` exactly as external consumers expect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressEventKind {
    #[serde(rename = "block.init")]
    BlockInit,
    #[serde(rename = "block.file")]
    BlockFile,
    #[serde(rename = "block.main")]
    BlockMain,
    #[serde(rename = "txoi.main")]
    TxoiMain,
    #[serde(rename = "claims.init")]
    ClaimsInit,
    #[serde(rename = "claims.insert")]
    ClaimsInsert,
    #[serde(rename = "claims.takeovers")]
    ClaimsTakeovers,
    #[serde(rename = "claims.stakes")]
    ClaimsStakes,
    #[serde(rename = "claims.main")]
    ClaimsMain,
    #[serde(rename = "supports.init")]
    SupportsInit,
    #[serde(rename = "supports.insert")]
    SupportsInsert,
    #[serde(rename = "supports.main")]
    SupportsMain,
}

/// `{id, done, total, units, label}` — one progress update for a given event
/// stream. `done`/`total`/`units` are tuples because some streams track two
/// dimensions at once (e.g. blocks and transactions within a file).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgressData {
    pub id: String,
    pub done: (i64, i64),
    pub total: Option<(i64, i64)>,
    pub units: Option<(String, String)>,
    pub label: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub event: ProgressEventKind,
    pub data: ProgressData,
}

impl ProgressEvent {
    pub fn new(event: ProgressEventKind, id: impl Into<String>, done: (i64, i64)) -> Self {
        Self {
            event,
            data: ProgressData {
                id: id.into(),
                done,
                total: None,
                units: None,
                label: None,
            },
        }
    }

    pub fn with_total(mut self, total: (i64, i64)) -> Self {
        self.data.total = Some(total);
        self
    }

    pub fn with_units(mut self, units: (&str, &str)) -> Self {
        self.data.units = Some((units.0.to_string(), units.1.to_string()));
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.data.label = Some(label.into());
        self
    }

    /// The terminal event of a stream: `done = (-1, ...)` per §4.6/§5 — sent
    /// last, and the only way a consumer learns the stream has ended.
    pub fn terminal(event: ProgressEventKind, id: impl Into<String>) -> Self {
        Self::new(event, id, (-1, -1))
    }

    pub fn is_terminal(&self) -> bool {
        self.data.done.0 == -1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_event_has_negative_one_done() {
        let event = ProgressEvent::terminal(ProgressEventKind::ClaimsMain, "claims");
        assert!(event.is_terminal());
    }

    #[test]
    fn builder_methods_set_optional_fields() {
        let event = ProgressEvent::new(ProgressEventKind::BlockFile, "blocks", (1, 2))
            .with_total((10, 20))
            .with_units(("blocks", "txs"))
            .with_label("blk00001.dat");
        assert_eq!(event.data.total, Some((10, 20)));
        assert_eq!(event.data.label.as_deref(), Some("blk00001.dat"));
    }
}
