//! Lifecycle status of the encoder and decoder axes.

use serde::{Deserialize, Serialize};

/// `Idle → Loading → Ready | Error`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Idle,
    Loading,
    Ready,
    Error,
}

impl Status {
    pub fn is_ready(self) -> bool {
        self == Self::Ready
    }

    pub fn is_loading(self) -> bool {
        self == Self::Loading
    }
}
