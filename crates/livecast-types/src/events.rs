use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::NormalizedComment;

/// Events sent over the viewer WebSocket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ViewerEvent {
    /// Viewer is registered and will receive every later push
    Ready { viewer_id: Uuid },

    /// Comments to display, in display order.
    /// An empty list means "clear the display".
    Comments { comments: Vec<NormalizedComment> },
}

impl ViewerEvent {
    /// True for a `Comments` event carrying no comments.
    pub fn is_clear(&self) -> bool {
        matches!(self, Self::Comments { comments } if comments.is_empty())
    }
}
