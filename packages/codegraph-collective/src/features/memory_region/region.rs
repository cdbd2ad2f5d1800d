//! Memory regions
//!
//! A region is a set of abstract objects. Regions partition every object
//! node that carries an allocation site.

use super::union_find::UnionFind;
use crate::config::{RegionConfig, RegionGranularity};
use crate::features::points_to::{NodeId, PointsToAnalysis};
use crate::ir::{Module, ValueId};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(pub u32);

impl RegionId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Region {
    pub id: RegionId,
    pub objects: Vec<NodeId>,
    /// Allocation sites of the objects, same order
    pub sites: Vec<ValueId>,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct MemoryRegions {
    regions: Vec<Region>,
    region_of: FxHashMap<NodeId, RegionId>,
}

impl MemoryRegions {
    pub fn build(module: &Module, pta: &PointsToAnalysis, config: &RegionConfig) -> Self {
        let objects: Vec<(NodeId, ValueId)> = pta.objects().collect();
        let index_of: FxHashMap<NodeId, u32> = objects
            .iter()
            .enumerate()
            .map(|(i, &(node, _))| (node, i as u32))
            .collect();

        let classes: Vec<Vec<u32>> = match config.granularity {
            RegionGranularity::AllocationSite => (0..objects.len() as u32).map(|i| vec![i]).collect(),
            RegionGranularity::EquivalenceClass => {
                let mut uf = UnionFind::new(objects.len());
                for node in 0..pta.factory().len() as u32 {
                    let members: Vec<u32> = pta
                        .node_points_to(NodeId(node))
                        .iter()
                        .filter_map(|obj| index_of.get(obj).copied())
                        .collect();
                    if let Some((&first, rest)) = members.split_first() {
                        for &other in rest {
                            uf.union(first, other);
                        }
                    }
                }
                uf.classes()
            }
        };

        let mut regions = Vec::with_capacity(classes.len());
        let mut region_of = FxHashMap::default();
        for class in classes {
            let id = RegionId(regions.len() as u32);
            let objs: Vec<NodeId> = class.iter().map(|&i| objects[i as usize].0).collect();
            let sites: Vec<ValueId> = class.iter().map(|&i| objects[i as usize].1).collect();
            for &obj in &objs {
                region_of.insert(obj, id);
            }
            let name = sites
                .iter()
                .map(|&site| module.display_name(site))
                .collect::<Vec<_>>()
                .join("|");
            regions.push(Region {
                id,
                objects: objs,
                sites,
                name,
            });
        }

        tracing::debug!(
            regions = regions.len(),
            objects = objects.len(),
            granularity = ?config.granularity,
            "memory regions built"
        );

        Self { regions, region_of }
    }

    #[inline]
    pub fn region_of(&self, object: NodeId) -> Option<RegionId> {
        self.region_of.get(&object).copied()
    }

    pub fn objects_of(&self, region: RegionId) -> &[NodeId] {
        &self.regions[region.index()].objects
    }

    pub fn region(&self, region: RegionId) -> &Region {
        &self.regions[region.index()]
    }

    /// Regions a pointer may address; empty when the pointer is unknown
    pub fn regions_of_pointer(&self, pta: &PointsToAnalysis, value: ValueId) -> BTreeSet<RegionId> {
        pta.points_to(value)
            .map(|objs| objs.iter().filter_map(|&o| self.region_of(o)).collect())
            .unwrap_or_default()
    }

    /// Region holding the object allocated at `site`
    pub fn region_of_site(&self, pta: &PointsToAnalysis, site: ValueId) -> Option<RegionId> {
        pta.factory()
            .object_node(site)
            .and_then(|node| self.region_of(node))
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }
}
