//! Category popularity across clients
//!
//! A category's popularity is the number of distinct clients whose
//! recommendation list contains it, at any position.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::model::{CategoryId, ClientId};
use crate::snapshot::Snapshot;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopularCategory {
    pub id: CategoryId,
    pub name: String,
    pub appearances: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PopularityRanking {
    pub categories: Vec<PopularCategory>,
    /// Listed category ids absent from the snapshot, with their appearances
    pub unresolved: BTreeMap<CategoryId, u64>,
}

/// Rank categories by how many clients list them.
///
/// Order: appearances descending, then category name, then id. The result
/// does not depend on the order the lists are supplied in.
pub fn rank_categories<'a, I>(snapshot: &Snapshot, lists: I) -> PopularityRanking
where
    I: IntoIterator<Item = (&'a ClientId, &'a [CategoryId])>,
{
    let mut seen: HashSet<(&ClientId, &CategoryId)> = HashSet::new();
    let mut appearances: BTreeMap<&CategoryId, u64> = BTreeMap::new();

    for (client_id, categories) in lists {
        for category_id in categories {
            if seen.insert((client_id, category_id)) {
                *appearances.entry(category_id).or_insert(0) += 1;
            }
        }
    }

    let mut ranking = PopularityRanking::default();
    for (id, count) in appearances {
        match snapshot.category(id) {
            Some(category) => ranking.categories.push(PopularCategory {
                id: id.clone(),
                name: category.name.clone(),
                appearances: count,
            }),
            None => {
                ranking.unresolved.insert(id.clone(), count);
            }
        }
    }

    ranking.categories.sort_by(|a, b| {
        b.appearances
            .cmp(&a.appearances)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.id.cmp(&b.id))
    });
    ranking
}
