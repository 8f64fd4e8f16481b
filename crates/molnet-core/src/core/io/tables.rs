use crate::core::models::cluster::Cluster;
use crate::core::models::family::MolecularFamily;
use crate::core::models::ids::{ClusterId, FamilyId};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::io::{self, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Cluster {0} is referenced by a family but missing from the cluster list")]
    UnknownCluster(ClusterId),
    #[error("Family {0} has no edges but {1} members")]
    EdgelessFamily(FamilyId, usize),
    #[error("Node table column '{0}' appears more than once; rename the grouping level or title")]
    DuplicateColumn(String),
}

/// A metadata dimension that assigns each source file to one level (e.g. treatment).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SampleGrouping {
    /// Header of the column counting non-empty levels.
    pub title: String,
    /// Level names in column order.
    pub levels: Vec<String>,
    pub source_to_level: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeTableOptions {
    pub groupings: Vec<SampleGrouping>,
    /// Appends a column with each cluster's best annotation.
    pub include_annotations: bool,
}

/// Writes one row per family member.
///
/// Columns are `cid,familyid,precursor_mz,parent_mz,short_precursor_mz,short_parent_mz,
/// charge,members,n_unique_files`, then one member count per source file (sorted by
/// name), then for each grouping its level counts and the number of non-empty levels,
/// and finally an optional `annotation` column. A grouping whose level or title
/// repeats another column name is rejected before anything is written.
pub fn write_node_table<W: Write>(
    writer: W,
    clusters: &[Cluster],
    families: &[MolecularFamily],
    options: &NodeTableOptions,
) -> Result<(), ExportError> {
    let lookup = cluster_lookup(clusters);
    let mut members = Vec::new();
    for family in families {
        for cluster_id in family.members() {
            let cluster = lookup
                .get(cluster_id)
                .ok_or(ExportError::UnknownCluster(*cluster_id))?;
            members.push((family.id(), *cluster));
        }
    }

    let sources: Vec<&str> = members
        .iter()
        .flat_map(|(_, cluster)| cluster.spectra().iter().map(|s| s.source.as_str()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut header: Vec<String> = [
        "cid",
        "familyid",
        "precursor_mz",
        "parent_mz",
        "short_precursor_mz",
        "short_parent_mz",
        "charge",
        "members",
        "n_unique_files",
    ]
    .iter()
    .map(|h| h.to_string())
    .collect();
    header.extend(sources.iter().map(|s| s.to_string()));
    for grouping in &options.groupings {
        header.extend(grouping.levels.iter().cloned());
        header.push(grouping.title.clone());
    }
    if options.include_annotations {
        header.push("annotation".to_string());
    }
    let mut seen = HashSet::with_capacity(header.len());
    if let Some(duplicate) = header.iter().find(|name| !seen.insert(name.as_str())) {
        return Err(ExportError::DuplicateColumn(duplicate.clone()));
    }

    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(&header)?;

    for (family_id, cluster) in members {
        let prototype = cluster.prototype();
        let mut row = vec![
            cluster.id().to_string(),
            family_id.to_string(),
            cluster.precursor_mz().to_string(),
            cluster.parent_mz().to_string(),
            format!("{:.2}", cluster.precursor_mz()),
            format!("{:.2}", cluster.parent_mz()),
            prototype.charge.map(|c| c.to_string()).unwrap_or_default(),
            cluster.member_string(),
            cluster.n_unique_sources().to_string(),
        ];
        row.extend(
            cluster
                .n_members_in_sources(&sources)
                .into_iter()
                .map(|count| count.to_string()),
        );
        for grouping in &options.groupings {
            let (counts, n_non_zero) =
                cluster.group_counts(&grouping.levels, &grouping.source_to_level);
            row.extend(counts.into_iter().map(|count| count.to_string()));
            row.push(n_non_zero.to_string());
        }
        if options.include_annotations {
            row.push(
                cluster
                    .best_annotation()
                    .map(|a| a.to_string())
                    .unwrap_or_default(),
            );
        }
        csv_writer.write_record(&row)?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Writes `source,target,weight` rows, one per score triple.
///
/// A family without edges is written as a single `id,id,self` row so that isolated
/// clusters still appear in the network.
pub fn write_edge_table<W: Write>(
    writer: W,
    families: &[MolecularFamily],
) -> Result<(), ExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(["source", "target", "weight"])?;

    for family in families {
        if family.scores().is_empty() {
            let [only] = family.members() else {
                return Err(ExportError::EdgelessFamily(
                    family.id(),
                    family.n_clusters(),
                ));
            };
            let id = only.to_string();
            csv_writer.write_record([id.as_str(), id.as_str(), "self"])?;
            continue;
        }
        for triple in family.scores() {
            csv_writer.write_record([
                triple.cluster_a.to_string(),
                triple.cluster_b.to_string(),
                triple.score.to_string(),
            ])?;
        }
    }

    csv_writer.flush()?;
    Ok(())
}

/// Writes headerless `key,value` rows describing the run.
pub fn write_parameter_table<W, K, V>(writer: W, parameters: &[(K, V)]) -> Result<(), ExportError>
where
    W: Write,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut csv_writer = csv::Writer::from_writer(writer);
    for (key, value) in parameters {
        csv_writer.write_record([key.as_ref(), value.as_ref()])?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// One row of the library search report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HitRecord {
    pub query_source: String,
    pub query_scan: usize,
    pub query_precursor_mz: f64,
    pub rank: usize,
    pub compound_name: String,
    pub spectrum_id: String,
    pub library_precursor_mz: f64,
    pub score: f64,
    pub n_matches: usize,
}

pub fn write_hit_table<W: Write>(writer: W, hits: &[HitRecord]) -> Result<(), ExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for hit in hits {
        csv_writer.serialize(hit)?;
    }
    if hits.is_empty() {
        csv_writer.write_record([
            "query_source",
            "query_scan",
            "query_precursor_mz",
            "rank",
            "compound_name",
            "spectrum_id",
            "library_precursor_mz",
            "score",
            "n_matches",
        ])?;
    }
    csv_writer.flush()?;
    Ok(())
}

fn cluster_lookup(clusters: &[Cluster]) -> HashMap<ClusterId, &Cluster> {
    clusters.iter().map(|c| (c.id(), c)).collect()
}
