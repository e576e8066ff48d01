//! Seam for the bootstrap page served on the browser's first GET.

/// Supplies the bytes of the page served on GET.
///
/// The page must, on load, read its own full address (fragment included) and
/// POST it to `http://localhost:<port>`.  The listener treats the returned
/// bytes as opaque and sends them unmodified.
#[cfg_attr(test, mockall::automock)]
pub trait PagePayloadProvider: Send + Sync {
    /// Returns the page for a listener bound to `port`.
    fn page(&self, port: u16) -> Vec<u8>;
}
