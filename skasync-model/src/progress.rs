/// A progress sample published by the archive builder and summed across
/// targets by the progress multiplexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProgressSample {
    /// Total files this round is expected to touch.
    pub all_files: u64,
    /// Files sent (archived or deleted) so far this round.
    pub sent_files: u64,
    /// Bytes streamed into archives so far this round.
    pub bytes_sent: u64,
}

impl ProgressSample {
    /// Pointwise-sum two samples, used by the multiplexer to recombine
    /// per-target samples into one aggregate stream.
    pub fn add(self, other: Self) -> Self {
        Self {
            all_files: self.all_files + other.all_files,
            sent_files: self.sent_files + other.sent_files,
            bytes_sent: self.bytes_sent + other.bytes_sent,
        }
    }
}
