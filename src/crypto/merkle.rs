//! Merkle tree implementation for transaction commitment
//!
//! Leaves are transaction ids used as-is. An internal node is the double
//! BLAKE3 of `left ++ right`. When a level has an odd number of nodes the
//! last one is carried up unchanged rather than paired with itself.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::hash::double_blake3_hash;
use crate::codec::{BufError, BufReader, BufWriter, Buf32};

/// Merkle construction errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MerkleError {
    #[error("Cannot build a merkle tree from zero leaves")]
    EmptyLeaves,
}

/// Hash two child nodes into their parent
pub fn merkle_parent(left: &Buf32, right: &Buf32) -> Buf32 {
    let mut data = [0u8; 64];
    data[..32].copy_from_slice(left.as_slice());
    data[32..].copy_from_slice(right.as_slice());
    double_blake3_hash(&data)
}

/// One level of an inclusion proof, from the leaf upwards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MerkleStep {
    /// Sibling sits on the left
    Left(Buf32),
    /// Sibling sits on the right
    Right(Buf32),
    /// Node was the unpaired last one on its level
    Promoted,
}

/// Inclusion proof for one leaf
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Position of the leaf in the original list
    pub leaf_index: u32,
    /// One step per tree level
    pub steps: Vec<MerkleStep>,
}

impl MerkleProof {
    /// Recompute the root from `leaf` and compare
    ///
    /// The index must agree with the step sides: at level `k`, bit `k` of
    /// `leaf_index` is set exactly when the sibling is on the left.
    pub fn verify(&self, leaf: &Buf32, root: &Buf32) -> bool {
        self.index_matches_steps() && &self.compute_root(leaf) == root
    }

    fn index_matches_steps(&self) -> bool {
        let mut index = self.leaf_index as u64;
        for step in &self.steps {
            let on_right = index & 1 == 1;
            match step {
                MerkleStep::Left(_) if on_right => {}
                MerkleStep::Right(_) | MerkleStep::Promoted if !on_right => {}
                _ => return false,
            }
            index >>= 1;
        }
        index == 0
    }

    pub fn compute_root(&self, leaf: &Buf32) -> Buf32 {
        self.steps.iter().fold(*leaf, |current, step| match step {
            MerkleStep::Left(sibling) => merkle_parent(sibling, &current),
            MerkleStep::Right(sibling) => merkle_parent(&current, sibling),
            MerkleStep::Promoted => current,
        })
    }

    pub fn to_buf(&self) -> Vec<u8> {
        let mut w = BufWriter::new();
        w.write_u32_be(self.leaf_index)
            .write_var_int(self.steps.len() as u64);
        for step in &self.steps {
            match step {
                MerkleStep::Right(sibling) => {
                    w.write_u8(0).write_fixed(sibling);
                }
                MerkleStep::Left(sibling) => {
                    w.write_u8(1).write_fixed(sibling);
                }
                MerkleStep::Promoted => {
                    w.write_u8(2);
                }
            }
        }
        w.to_buf()
    }

    pub fn from_buf(buf: &[u8]) -> Result<Self, BufError> {
        let mut r = BufReader::new(buf);
        let leaf_index = r.read_u32_be()?;
        let count = r.read_count(1)?;
        let mut steps = Vec::with_capacity(count);
        for _ in 0..count {
            let step = match r.read_u8()? {
                0 => MerkleStep::Right(r.read_fixed::<32>()?),
                1 => MerkleStep::Left(r.read_fixed::<32>()?),
                2 => MerkleStep::Promoted,
                other => {
                    return Err(BufError::InvalidEncoding(format!(
                        "merkle step side {}",
                        other
                    )))
                }
            };
            steps.push(step);
        }
        r.finish()?;
        Ok(Self { leaf_index, steps })
    }
}

/// Build the root and one proof per leaf in a single bottom-up pass
pub fn generate_proofs_and_root(leaves: &[Buf32]) -> Result<(Buf32, Vec<MerkleProof>), MerkleError> {
    if leaves.is_empty() {
        return Err(MerkleError::EmptyLeaves);
    }

    let mut proofs: Vec<MerkleProof> = (0..leaves.len())
        .map(|i| MerkleProof {
            leaf_index: i as u32,
            steps: Vec::new(),
        })
        .collect();
    // For every node on the current level, the leaves that sit beneath it
    let mut members: Vec<Vec<usize>> = (0..leaves.len()).map(|i| vec![i]).collect();
    let mut level: Vec<Buf32> = leaves.to_vec();

    while level.len() > 1 {
        let mut next_level = Vec::with_capacity(level.len().div_ceil(2));
        let mut next_members = Vec::with_capacity(next_level.capacity());

        for (pair, groups) in level.chunks(2).zip(members.chunks(2)) {
            if let [left, right] = pair {
                for &leaf in &groups[0] {
                    proofs[leaf].steps.push(MerkleStep::Right(*right));
                }
                for &leaf in &groups[1] {
                    proofs[leaf].steps.push(MerkleStep::Left(*left));
                }
                next_level.push(merkle_parent(left, right));
                next_members.push([groups[0].as_slice(), groups[1].as_slice()].concat());
            } else {
                // Unpaired node is promoted unchanged
                for &leaf in &groups[0] {
                    proofs[leaf].steps.push(MerkleStep::Promoted);
                }
                next_level.push(pair[0]);
                next_members.push(groups[0].clone());
            }
        }

        level = next_level;
        members = next_members;
    }

    Ok((level[0], proofs))
}

/// Compute only the root
pub fn calculate_merkle_root(leaves: &[Buf32]) -> Result<Buf32, MerkleError> {
    if leaves.is_empty() {
        return Err(MerkleError::EmptyLeaves);
    }
    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => merkle_parent(left, right),
                _ => pair[0],
            })
            .collect();
    }
    Ok(level[0])
}

/// Verify that `leaf` is included under `root`
pub fn verify_proof(leaf: &Buf32, proof: &MerkleProof, root: &Buf32) -> bool {
    proof.verify(leaf, root)
}
