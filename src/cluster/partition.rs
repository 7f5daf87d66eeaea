//! Partition ownership table

use crate::query::MemberId;

/// One partition changing owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub partition: u32,
    /// Previous owner; `None` when the partition had none
    pub from: Option<MemberId>,
    pub to: MemberId,
}

/// Maps keys to partitions and partitions to owners
#[derive(Debug, Clone)]
pub struct PartitionTable {
    owners: Vec<Option<MemberId>>,
}

impl PartitionTable {
    /// Table with `partition_count` unowned partitions
    pub fn new(partition_count: u32) -> Self {
        Self {
            owners: vec![None; partition_count.max(1) as usize],
        }
    }

    pub fn partition_count(&self) -> u32 {
        self.owners.len() as u32
    }

    /// Partition holding `key`
    pub fn partition_of(&self, key: &str) -> u32 {
        crc32fast::hash(key.as_bytes()) % self.partition_count()
    }

    pub fn owner(&self, partition: u32) -> Option<&MemberId> {
        self.owners.get(partition as usize).and_then(Option::as_ref)
    }

    pub fn owner_of(&self, key: &str) -> Option<&MemberId> {
        self.owner(self.partition_of(key))
    }

    /// Every partition with its owner
    pub fn owners(&self) -> Vec<(u32, Option<MemberId>)> {
        self.owners
            .iter()
            .enumerate()
            .map(|(p, owner)| (p as u32, owner.clone()))
            .collect()
    }

    /// Partitions owned by `member`
    pub fn partitions_of(&self, member: &MemberId) -> Vec<u32> {
        self.owners
            .iter()
            .enumerate()
            .filter(|(_, owner)| owner.as_ref() == Some(member))
            .map(|(p, _)| p as u32)
            .collect()
    }

    /// Give partition `p` to the `p mod n`-th member in id order
    ///
    /// Returns the partitions whose owner changed. With no members every
    /// partition becomes unowned.
    pub fn assign(&mut self, members: &[MemberId]) -> Vec<Migration> {
        let mut sorted = members.to_vec();
        sorted.sort();
        sorted.dedup();

        let mut migrations = Vec::new();
        for (p, owner) in self.owners.iter_mut().enumerate() {
            let next = if sorted.is_empty() {
                None
            } else {
                Some(sorted[p % sorted.len()].clone())
            };
            if *owner != next {
                if let Some(to) = next.clone() {
                    migrations.push(Migration {
                        partition: p as u32,
                        from: owner.clone(),
                        to,
                    });
                }
                *owner = next;
            }
        }
        migrations
    }
}
