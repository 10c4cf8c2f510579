//! Public notice that a pending transfer was cancelled and the published
//! secret no longer works.

use custody_core::Timestamp;

use crate::svg::Sheet;

/// Title printed on every cancellation notice.
pub const NOTICE_TITLE: &str = "Transfer Cancellation Notice";

/// Inputs for [`render_cancellation_notice`].
#[derive(Debug, Clone)]
pub struct CancellationInput<'a> {
    pub sku: &'a str,
    pub serial: &'a str,
    pub cancelled_at: Timestamp,
}

/// Render a cancellation notice as SVG.
pub fn render_cancellation_notice(input: &CancellationInput<'_>) -> String {
    let mut sheet = Sheet::new();
    sheet
        .field("SKU", input.sku)
        .field("Serial", input.serial)
        .field("Cancelled At", &input.cancelled_at.to_iso8601())
        .note("The pending transfer for this item has been cancelled. The registration secret published in its hand-off document has been revoked and can no longer be used to claim the item.");
    sheet.finish(input.sku, input.serial, NOTICE_TITLE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notice_records_item_and_time() {
        let svg = render_cancellation_notice(&CancellationInput {
            sku: "SKU1",
            serial: "S1",
            cancelled_at: Timestamp::parse("2026-05-01T09:30:00Z").unwrap(),
        });
        assert!(svg.contains(NOTICE_TITLE));
        assert!(svg.contains("2026-05-01T09:30:00Z"));
        assert_eq!(crate::extract_meta(&svg).unwrap().serial, "S1");
    }
}
