//! Deterministic reasoning-chain assembly
//!
//! Works on a flat arena of [`RoleClaim`]s indexed by id. Each non-thesis
//! claim is attached to the nearest ancestor whose role may hold it:
//! - sub_argument / counter_argument → a thesis
//! - evidence → a sub_argument, counter_argument or thesis
//!
//! Intermediate claims with the wrong role are skipped over. A claim whose
//! walk hits a missing parent, a dangling id, itself, or a loop is promoted
//! to a standalone thesis and flagged with a [`Reclassification`].
//! Claims are processed in id order, and promotions only ever turn claims
//! into theses, so earlier attachments stay valid.
//!
//! Every input claim appears exactly once in the output and chains are at
//! most three levels deep.

use crate::types::{
    ArgumentStructure, BranchNode, ChainNode, ClaimId, OrphanReason, ReasoningChain, Reclassification, Role,
    RoleClaim,
};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

fn accepts(child: Role, parent: Role) -> bool {
    match child {
        Role::Thesis => false,
        Role::SubArgument | Role::CounterArgument => parent == Role::Thesis,
        Role::Evidence => parent != Role::Evidence,
    }
}

/// Walk up from `start` until an acceptable parent is found
fn resolve_parent(claims: &[RoleClaim], index: &HashMap<ClaimId, usize>, start: usize) -> Result<usize, OrphanReason> {
    let role = claims[start].role;
    let mut visited = HashSet::from([start]);
    let mut current = start;

    loop {
        let parent_id = match claims[current].parent {
            Some(id) => id,
            None if current == start => return Err(OrphanReason::MissingParent),
            None => return Err(OrphanReason::UnresolvedParent),
        };
        let parent = match index.get(&parent_id) {
            Some(&p) => p,
            None => return Err(OrphanReason::UnresolvedParent),
        };
        if parent == start && current == start {
            return Err(OrphanReason::SelfReference);
        }
        if !visited.insert(parent) {
            return Err(OrphanReason::Cycle);
        }
        if accepts(role, claims[parent].role) {
            return Ok(parent);
        }
        current = parent;
    }
}

/// Assemble reasoning chains from role-classified claims
pub fn assemble(mut claims: Vec<RoleClaim>, source_language: &str, pivot_language: &str) -> ArgumentStructure {
    claims.sort_by_key(|c| c.id);
    let index: HashMap<ClaimId, usize> = claims.iter().enumerate().map(|(i, c)| (c.id, i)).collect();
    let n = claims.len();

    // Pass 1: resolve attachments, promoting orphans
    let mut attach: Vec<Option<usize>> = vec![None; n];
    for i in 0..n {
        if claims[i].role == Role::Thesis {
            claims[i].parent = None;
            continue;
        }
        match resolve_parent(&claims, &index, i) {
            Ok(p) => {
                if claims[i].parent != Some(claims[p].id) {
                    debug!(claim_id = claims[i].id, parent = claims[p].id, "Reattached to nearest valid ancestor");
                }
                claims[i].parent = Some(claims[p].id);
                attach[i] = Some(p);
            }
            Err(reason) => {
                warn!(
                    claim_id = claims[i].id,
                    role = %claims[i].role,
                    ?reason,
                    "Promoting claim to standalone thesis"
                );
                claims[i].reclassified = Some(Reclassification {
                    original_role: claims[i].role,
                    reason,
                });
                claims[i].role = Role::Thesis;
                claims[i].parent = None;
            }
        }
    }

    // Pass 2: one chain per thesis, in id order
    let mut chains: Vec<ReasoningChain> = Vec::new();
    let mut chain_of: HashMap<usize, usize> = HashMap::new();
    for (i, claim) in claims.iter().enumerate() {
        if claim.role == Role::Thesis {
            chain_of.insert(i, chains.len());
            chains.push(ReasoningChain {
                chain_id: chains.len(),
                thesis: ChainNode::from(claim),
                sub_arguments: Vec::new(),
                counter_arguments: Vec::new(),
                evidence: Vec::new(),
            });
        }
    }

    // Pass 3: branches under theses
    let mut branch_of: HashMap<usize, (usize, Role, usize)> = HashMap::new();
    for (i, claim) in claims.iter().enumerate() {
        let (Some(p), Some(&chain)) = (attach[i], attach[i].and_then(|p| chain_of.get(&p))) else {
            continue;
        };
        debug_assert!(claims[p].role == Role::Thesis || claim.role == Role::Evidence);
        let branch = BranchNode {
            node: ChainNode::from(claim),
            evidence: Vec::new(),
        };
        match claim.role {
            Role::SubArgument => {
                branch_of.insert(i, (chain, Role::SubArgument, chains[chain].sub_arguments.len()));
                chains[chain].sub_arguments.push(branch);
            }
            Role::CounterArgument => {
                branch_of.insert(i, (chain, Role::CounterArgument, chains[chain].counter_arguments.len()));
                chains[chain].counter_arguments.push(branch);
            }
            Role::Evidence => chains[chain].evidence.push(branch.node),
            Role::Thesis => {}
        }
    }

    // Pass 4: evidence under branches
    for (i, claim) in claims.iter().enumerate() {
        if claim.role != Role::Evidence {
            continue;
        }
        let Some(&(chain, kind, slot)) = attach[i].and_then(|p| branch_of.get(&p)) else {
            continue;
        };
        let node = ChainNode::from(claim);
        match kind {
            Role::CounterArgument => chains[chain].counter_arguments[slot].evidence.push(node),
            _ => chains[chain].sub_arguments[slot].evidence.push(node),
        }
    }

    let total_claims: usize = chains.iter().map(|c| c.total_claims()).sum();
    let reclassified_count = chains.iter().filter(|c| c.is_reclassified()).count();
    if total_claims != n {
        warn!(input = n, placed = total_claims, "Claim count mismatch after tree assembly");
    }

    info!(
        chains = chains.len(),
        total_claims,
        reclassified = reclassified_count,
        "Reasoning chains assembled"
    );

    ArgumentStructure {
        chains,
        source_language: source_language.to_string(),
        pivot_language: pivot_language.to_string(),
        total_claims,
        reclassified_count,
    }
}
