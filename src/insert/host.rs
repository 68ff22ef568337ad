//! Host document boundary.
//!
//! Implemented by whatever embeds the library (an add-in bridge, a test
//! double). Callback-style host APIs are adapted to these result-returning
//! calls on the host side.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Position and size in host units (points)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// How inserted data is interpreted by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Coercion {
    XmlSvg,
}

#[async_trait]
pub trait HostDocument: Send + Sync {
    /// Whether the host can insert SVG at all
    fn supports_svg(&self) -> bool {
        true
    }

    /// Insert (or replace the selection with) `data` at `bounds`.
    ///
    /// Fails with `HostSelection` when the current selection cannot receive
    /// content and `HostFatal` for anything else.
    async fn set_selected_data(&self, data: &str, coercion: Coercion, bounds: Bounds) -> Result<()>;

    /// Bounding boxes of the currently selected shapes
    async fn selected_shapes(&self) -> Result<Vec<Bounds>>;

    /// Identity of the active location (e.g. the current slide)
    async fn active_context(&self) -> Result<String>;

    /// Navigate to / select the location with this identity
    async fn select_context(&self, id: &str) -> Result<()>;
}
