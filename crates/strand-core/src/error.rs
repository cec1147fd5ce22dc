use crate::id::{LayerId, StrandId};
use thiserror::Error;

/// Broken canvas invariants. These should be unreachable through the
/// editor; callers log them and drop the offending operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("strand {0} does not exist")]
    MissingStrand(StrandId),

    #[error("layer {0} does not exist")]
    MissingLayer(LayerId),

    #[error("malformed strand: {0}")]
    BrokenShape(String),

    #[error("strand {child} is attached to missing strand {parent}")]
    DanglingAttachment { child: StrandId, parent: StrandId },

    #[error("strand {child} is not registered on parent {parent}")]
    UnregisteredChild { child: StrandId, parent: StrandId },

    #[error("mask {index} on strand {strand} has interval [{t_start}, {t_end}]")]
    InvalidMask {
        strand: StrandId,
        index: usize,
        t_start: f64,
        t_end: f64,
    },

    #[error("selected strand {strand} is not in layer {layer}")]
    SelectionMismatch { strand: StrandId, layer: LayerId },
}
