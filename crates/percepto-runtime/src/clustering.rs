//! Greedy first-fit clustering of memory records by embedding similarity.

use percepto_memory::{MemoryRecord, cosine_similarity};

/// Records grouped together for one summary.
#[derive(Debug, Clone)]
pub struct Cluster<'a> {
    pub members: Vec<&'a MemoryRecord>,
}

impl Cluster<'_> {
    /// Member contents joined by blank lines, in member order.
    pub fn text(&self) -> String {
        self.members
            .iter()
            .map(|r| r.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn accepts(&self, record: &MemoryRecord, threshold: f32) -> bool {
        self.members
            .iter()
            .any(|m| cosine_similarity(&m.embedding, &record.embedding) >= threshold)
    }
}

/// Partition `records` into clusters.
///
/// Each record joins the first existing cluster holding any member at least
/// `threshold` similar to it, otherwise it starts a new cluster. Input order
/// decides the result, so callers pass records oldest first.
pub fn cluster_records(records: &[MemoryRecord], threshold: f32) -> Vec<Cluster<'_>> {
    let mut clusters: Vec<Cluster<'_>> = Vec::new();
    for record in records {
        match clusters.iter_mut().find(|c| c.accepts(record, threshold)) {
            Some(cluster) => cluster.members.push(record),
            None => clusters.push(Cluster {
                members: vec![record],
            }),
        }
    }
    clusters
}
