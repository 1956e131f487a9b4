//! Point-in-time visibility snapshots.
//!
//! A snapshot captures which global transactions were in progress at the
//! moment the GTM computed it. Nodes use it to decide tuple visibility
//! locally without further round trips.
//!
//! # Transaction Visibility Ranges
//!
//! - `gxid < xmin`: **Past** (completed before the snapshot, always visible)
//! - `xmin <= gxid < xmax`: **Present** (check `xip` to determine if in progress)
//! - `xmax <= gxid`: **Future** (started after the snapshot, always invisible)

use super::types::GlobalXid;

/// A point-in-time visibility boundary computed by the GTM.
///
/// Snapshots are created fresh per request and never mutated after
/// construction; a caller that needs newer visibility information
/// requests a replacement rather than updating one in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GtmSnapshot {
    /// Lower watermark: oldest transaction still in progress.
    pub xmin: GlobalXid,
    /// Upper watermark: one past the newest issued GXID.
    pub xmax: GlobalXid,
    /// Transactions in progress at snapshot time (invisible to this snapshot).
    pub xip: Vec<GlobalXid>,
}

impl GtmSnapshot {
    /// An empty snapshot with both watermarks at INVALID.
    ///
    /// Used as the always-present side record of a result envelope when
    /// the response kind carries no snapshot.
    pub fn empty() -> Self {
        Self {
            xmin: GlobalXid::INVALID,
            xmax: GlobalXid::INVALID,
            xip: Vec::new(),
        }
    }

    /// Whether this snapshot carries any visibility information.
    pub fn is_empty(&self) -> bool {
        self.xmax.is_invalid()
    }

    /// Check if a transaction was still in progress when this snapshot
    /// was taken.
    pub fn is_in_progress(&self, gxid: GlobalXid) -> bool {
        if gxid >= self.xmax {
            // Started after the snapshot; indistinguishable from in progress.
            return true;
        }
        if gxid < self.xmin {
            return false;
        }
        // NOTE: Linear search O(n) on xip. Coordinators with many concurrent
        // transactions could binary-search; xip is delivered sorted.
        self.xip.contains(&gxid)
    }

    /// Check if a transaction's effects are visible under this snapshot.
    pub fn is_visible(&self, gxid: GlobalXid) -> bool {
        gxid.is_valid() && !self.is_in_progress(gxid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(xmin: u64, xmax: u64, xip: &[u64]) -> GtmSnapshot {
        GtmSnapshot {
            xmin: GlobalXid::new(xmin),
            xmax: GlobalXid::new(xmax),
            xip: xip.iter().copied().map(GlobalXid::new).collect(),
        }
    }

    #[test]
    fn test_empty_snapshot() {
        let snap = GtmSnapshot::empty();
        assert!(snap.is_empty());
        assert!(snap.xip.is_empty());
    }

    #[test]
    fn test_past_transactions_visible() {
        let snap = snapshot(5, 10, &[5, 7]);
        assert!(snap.is_visible(GlobalXid::new(3)));
        assert!(snap.is_visible(GlobalXid::new(4)));
    }

    #[test]
    fn test_future_transactions_invisible() {
        let snap = snapshot(5, 10, &[5, 7]);
        assert!(!snap.is_visible(GlobalXid::new(10)));
        assert!(!snap.is_visible(GlobalXid::new(11)));
    }

    #[test]
    fn test_in_progress_invisible() {
        let snap = snapshot(5, 10, &[5, 7]);
        assert!(snap.is_in_progress(GlobalXid::new(5)));
        assert!(snap.is_in_progress(GlobalXid::new(7)));
        assert!(!snap.is_visible(GlobalXid::new(7)));
        // Present but completed before the snapshot
        assert!(snap.is_visible(GlobalXid::new(6)));
    }

    #[test]
    fn test_invalid_gxid_never_visible() {
        let snap = snapshot(5, 10, &[]);
        assert!(!snap.is_visible(GlobalXid::INVALID));
    }
}
