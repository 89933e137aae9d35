//! Stratified k-fold partitioning.

use std::collections::BTreeMap;

use vortex_core::{ClassLabel, Error, Result};

/// Partition trial indices into `n_folds` stratified folds.
///
/// Indices are grouped per class in input order and dealt round-robin, so
/// every fold carries a near-equal share of each class and the split is
/// fully deterministic (no RNG). Fold sizes differ by at most the number of
/// classes. Callers wanting non-empty class representation in every fold
/// must ensure each class has at least `n_folds` trials.
pub fn stratified_folds(labels: &[ClassLabel], n_folds: usize) -> Result<Vec<Vec<usize>>> {
    if n_folds < 2 {
        return Err(Error::Config(format!(
            "n_folds must be at least 2, got {n_folds}"
        )));
    }
    if labels.len() < n_folds {
        return Err(Error::InvalidInput(format!(
            "cannot split {} trials into {n_folds} folds",
            labels.len()
        )));
    }

    let mut per_class: BTreeMap<ClassLabel, Vec<usize>> = BTreeMap::new();
    for (i, label) in labels.iter().enumerate() {
        per_class.entry(*label).or_default().push(i);
    }

    let mut folds = vec![Vec::new(); n_folds];
    for indices in per_class.values() {
        for (j, &index) in indices.iter().enumerate() {
            folds[j % n_folds].push(index);
        }
    }
    for fold in &mut folds {
        fold.sort_unstable();
    }

    Ok(folds)
}

/// All indices outside fold `held_out`, in ascending order.
pub fn training_indices(folds: &[Vec<usize>], held_out: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = folds
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != held_out)
        .flat_map(|(_, fold)| fold.iter().copied())
        .collect();
    indices.sort_unstable();
    indices
}
