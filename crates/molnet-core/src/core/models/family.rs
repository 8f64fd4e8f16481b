use super::ids::{ClusterId, FamilyId};
use serde::Serialize;

/// One undirected similarity edge between two member clusters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreTriple {
    pub cluster_a: ClusterId,
    pub cluster_b: ClusterId,
    pub score: f64,
}

/// A connected, size-bounded component of the cluster similarity graph.
///
/// Members are referenced by id and resolved through the cluster list the network was
/// built from. Every undirected edge of the component appears exactly once in
/// [`MolecularFamily::scores`], and both of its endpoints are members. A family with a
/// single member has no scores.
#[derive(Debug, Clone, PartialEq)]
pub struct MolecularFamily {
    id: FamilyId,
    members: Vec<ClusterId>,
    scores: Vec<ScoreTriple>,
}

impl MolecularFamily {
    pub fn new(id: FamilyId, members: Vec<ClusterId>, scores: Vec<ScoreTriple>) -> Self {
        Self {
            id,
            members,
            scores,
        }
    }

    pub fn id(&self) -> FamilyId {
        self.id
    }

    pub fn members(&self) -> &[ClusterId] {
        &self.members
    }

    pub fn n_clusters(&self) -> usize {
        self.members.len()
    }

    pub fn scores(&self) -> &[ScoreTriple] {
        &self.scores
    }

    pub fn contains(&self, cluster_id: ClusterId) -> bool {
        self.members.contains(&cluster_id)
    }

    /// True for a lone cluster without any edge; exported as a self-loop marker.
    pub fn is_singleton(&self) -> bool {
        self.members.len() == 1 && self.scores.is_empty()
    }
}
