//! Group target validation: the projection following GROUP must carry every
//! group key and nothing else that does not aggregate.

use crate::error::{Result, SelectError};
use crate::ident::squeeze_blank;
use crate::query::{ColumnItem, ScalarExpr};

/// Where a projection item's value comes from in a grouped projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Index into the group keys.
    Key(usize),
    Aggregate,
}

/// True when projection item `item` denotes group key `key`.
pub fn matches_key(item: &ColumnItem, key: &ColumnItem) -> bool {
    if item.expr == key.expr {
        return true;
    }
    if let (ScalarExpr::Column(a), ScalarExpr::Column(b)) = (&item.expr, &key.expr) {
        let quals_agree = match (a.qualifier(), b.qualifier()) {
            (Some(x), Some(y)) => x == y,
            _ => true,
        };
        if quals_agree && a.column() == b.column() {
            return true;
        }
    }
    squeeze_blank(&item.text).eq_ignore_ascii_case(&squeeze_blank(&key.text))
}

/// Classify each projection item against the group keys. Fails listing every
/// key the projection omits and every non-aggregate item that is not a key.
pub fn split_group_projection(keys: &[ColumnItem], projection: &[ColumnItem]) -> Result<Vec<Slot>> {
    let mut used = vec![false; keys.len()];
    let mut slots = Vec::with_capacity(projection.len());
    let mut extra = Vec::new();
    for item in projection {
        match keys.iter().position(|k| matches_key(item, k)) {
            Some(k) => {
                used[k] = true;
                slots.push(Slot::Key(k));
            }
            None if item.expr.contains_aggregate() => slots.push(Slot::Aggregate),
            None => {
                extra.push(item.text.clone());
                slots.push(Slot::Aggregate);
            }
        }
    }
    let missing: Vec<String> = keys.iter().zip(&used).filter(|(_, u)| !**u).map(|(k, _)| k.text.clone()).collect();
    if !missing.is_empty() || !extra.is_empty() {
        return Err(SelectError::GroupBy { missing, extra });
    }
    Ok(slots)
}
