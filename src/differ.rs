//! Membership diffing between an incoming collection and its previously
//! recorded membership.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

/// Symmetric difference of two member lists, keyed by uuid. The value is the
/// removed flag: `true` means the uuid was in the previous membership but not
/// the incoming one, `false` means the reverse. Uuids present in both lists
/// never appear.
pub type MembershipDelta = HashMap<Uuid, bool>;

/// Compute the membership delta between the incoming member list and the
/// previously recorded one. Duplicates within one list are tolerated and
/// treated as a set. Pure and O(n + m).
pub fn diff(incoming: &[Uuid], previous: &[Uuid]) -> MembershipDelta {
    let incoming_set: HashSet<&Uuid> = incoming.iter().collect();
    let previous_set: HashSet<&Uuid> = previous.iter().collect();

    let mut delta = MembershipDelta::new();
    for uuid in incoming {
        if !previous_set.contains(uuid) {
            delta.insert(*uuid, false);
        }
    }
    for uuid in previous {
        if !incoming_set.contains(uuid) {
            delta.insert(*uuid, true);
        }
    }
    delta
}
