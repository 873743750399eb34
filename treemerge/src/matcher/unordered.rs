//! Unordered child matching.
//!
//! Children of unordered nodes (class member sets, import sections) are
//! matched with a maximum-weight bipartite assignment computed by the
//! Hungarian algorithm (Kuhn-Munkres). Position carries no meaning; only the
//! subtree match sizes decide the pairing.

/// Computes a maximum-weight assignment between two child lists.
///
/// `weight(i, j)` is the subtree match size of left child `i` against right
/// child `j`; zero-weight pairs are never reported. Returns the chosen
/// `(i, j)` index pairs ordered by the left index.
pub fn assignment_pairs<F>(
    left_len: usize,
    right_len: usize,
    mut weight: F,
) -> Vec<(usize, usize)>
where
    F: FnMut(usize, usize) -> usize,
{
    if left_len == 0 || right_len == 0 {
        return Vec::new();
    }

    let size = left_len.max(right_len);
    let mut weights = vec![vec![0i64; size]; size];
    for (i, row) in weights.iter_mut().enumerate().take(left_len) {
        for (j, cell) in row.iter_mut().enumerate().take(right_len) {
            *cell = weight(i, j) as i64;
        }
    }

    let assignment = hungarian_max(&weights, size);

    let mut pairs = Vec::new();
    for (i, &j) in assignment.iter().enumerate() {
        if i < left_len && j < right_len && weights[i][j] > 0 {
            pairs.push((i, j));
        }
    }
    pairs
}

/// Maximum-weight assignment via Kuhn-Munkres on the negated cost matrix.
///
/// Returns `result[i] = column assigned to row i`.
fn hungarian_max(weights: &[Vec<i64>], n: usize) -> Vec<usize> {
    if n == 0 {
        return Vec::new();
    }

    let max_w = weights
        .iter()
        .flat_map(|row| row.iter())
        .copied()
        .max()
        .unwrap_or(0);

    // Convert to cost minimization.
    let mut cost = vec![vec![0i64; n]; n];
    for i in 0..n {
        for j in 0..n {
            cost[i][j] = max_w - weights[i][j];
        }
    }

    let mut u = vec![0i64; n + 1];
    let mut v = vec![0i64; n + 1];
    let mut p = vec![0usize; n + 1]; // p[j] = row assigned to column j
    let mut way = vec![0usize; n + 1];

    for i in 1..=n {
        p[0] = i;
        let mut j0 = 0usize;
        let mut minv = vec![i64::MAX; n + 1];
        let mut used = vec![false; n + 1];

        loop {
            used[j0] = true;
            let i0 = p[j0];
            let mut delta = i64::MAX;
            let mut j1 = 0usize;

            for j in 1..=n {
                if !used[j] {
                    let cur = cost[i0 - 1][j - 1] - u[i0] - v[j];
                    if cur < minv[j] {
                        minv[j] = cur;
                        way[j] = j0;
                    }
                    if minv[j] < delta {
                        delta = minv[j];
                        j1 = j;
                    }
                }
            }

            for j in 0..=n {
                if used[j] {
                    u[p[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }

            j0 = j1;
            if p[j0] == 0 {
                break;
            }
        }

        loop {
            let j1 = way[j0];
            p[j0] = p[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut result = vec![0usize; n];
    for j in 1..=n {
        if p[j] > 0 {
            result[p[j] - 1] = j - 1;
        }
    }
    result
}
