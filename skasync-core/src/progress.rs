//! Component L: the progress multiplexer.
//!
//! Grounded on `original_source/pkg/util/math.go`'s `AverageStream`: every
//! target reports its own running sample under its tag; the multiplexer
//! keeps the latest sample per tag and republishes the pointwise sum on one
//! output channel. The original averages; this pipeline sums, since the
//! expanded `ProgressSample` tracks totals (`all_files`/`sent_files`/
//! `bytes_sent`) rather than a single scalar percentage.

use std::collections::BTreeMap;

use skasync_model::{ProgressSample, Tag};
use tokio::sync::{mpsc, Mutex};

pub struct ProgressMultiplexer {
    samples: Mutex<BTreeMap<Tag, ProgressSample>>,
    out: mpsc::Sender<ProgressSample>,
}

impl ProgressMultiplexer {
    pub fn new(out: mpsc::Sender<ProgressSample>) -> Self {
        Self {
            samples: Mutex::new(BTreeMap::new()),
            out,
        }
    }

    /// Record `sample` under `tag` and republish the summed total across
    /// every tag seen so far.
    pub async fn set(&self, tag: Tag, sample: ProgressSample) {
        let summed = {
            let mut samples = self.samples.lock().await;
            samples.insert(tag, sample);
            samples
                .values()
                .fold(ProgressSample::default(), |acc, s| acc.add(*s))
        };
        let _ = self.out.send(summed).await;
    }

    /// Drop a tag's contribution (a target's sync round finished), so a
    /// later round doesn't keep summing a stale sample.
    pub async fn clear(&self, tag: &Tag) {
        self.samples.lock().await.remove(tag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sums_across_tags() {
        let (tx, mut rx) = mpsc::channel(8);
        let mux = ProgressMultiplexer::new(tx);

        mux.set(
            Tag::from("a"),
            ProgressSample { all_files: 2, sent_files: 1, bytes_sent: 10 },
        )
        .await;
        let first = rx.recv().await.unwrap();
        assert_eq!(first.all_files, 2);

        mux.set(
            Tag::from("b"),
            ProgressSample { all_files: 3, sent_files: 3, bytes_sent: 20 },
        )
        .await;
        let second = rx.recv().await.unwrap();
        assert_eq!(second.all_files, 5);
        assert_eq!(second.bytes_sent, 30);
    }
}
