// Agglomerative single-linkage clustering over unit-normalized embedding
// vectors, distance = 1 - cosine similarity (spec §4.6).

/// `cluster(vectors, threshold) -> partition`. Deterministic: ties between
/// equally-close cluster pairs always resolve to the lexicographically
/// smallest `(i, j)` with `i < j` (spec §4.6).
pub fn cluster(vectors: &[Vec<f32>], threshold: f32) -> Vec<Vec<usize>> {
    let n = vectors.len();
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![vec![0]];
    }

    let dist = |a: usize, b: usize| 1.0 - cosine_similarity(&vectors[a], &vectors[b]);

    let mut clusters: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();

    loop {
        if clusters.len() == 1 {
            break;
        }

        let mut best: Option<(usize, usize, f32)> = None;
        for i in 0..clusters.len() {
            for j in (i + 1)..clusters.len() {
                let d = single_linkage_distance(&clusters[i], &clusters[j], dist);
                // Nested loops enumerate (i, j) in lexicographic order, so
                // keeping the first-seen minimum (strict `<`) already
                // implements the tie-break to the smallest pair.
                if best.map(|(_, _, bd)| d < bd).unwrap_or(true) {
                    best = Some((i, j, d));
                }
            }
        }

        let (i, j, d) = best.expect("clusters.len() >= 2 guarantees at least one pair");
        if d > threshold {
            break;
        }

        let merged_j = clusters.remove(j);
        clusters[i].extend(merged_j);
        clusters[i].sort_unstable();
    }

    clusters
}

fn single_linkage_distance(a: &[usize], b: &[usize], dist: impl Fn(usize, usize) -> f32) -> f32 {
    let mut min = f32::INFINITY;
    for &x in a {
        for &y in b {
            let d = dist(x, y);
            if d < min {
                min = d;
            }
        }
    }
    min
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit2(deg: f32) -> Vec<f32> {
        let rad = deg.to_radians();
        vec![rad.cos(), rad.sin()]
    }

    #[test]
    fn empty_input_yields_empty_partition() {
        assert!(cluster(&[], 0.5).is_empty());
    }

    #[test]
    fn single_vector_yields_one_cluster() {
        let out = cluster(&[vec![1.0, 0.0]], 0.5);
        assert_eq!(out, vec![vec![0]]);
    }

    #[test]
    fn four_angles_merge_into_two_clusters() {
        let vectors = vec![unit2(0.0), unit2(5.0), unit2(90.0), unit2(95.0)];
        let out = cluster(&vectors, 0.2);
        assert_eq!(out, vec![vec![0, 1], vec![2, 3]]);
    }

    #[test]
    fn clustering_is_deterministic_across_runs() {
        let vectors = vec![unit2(0.0), unit2(5.0), unit2(90.0), unit2(95.0), unit2(180.0)];
        let a = cluster(&vectors, 0.2);
        let b = cluster(&vectors, 0.2);
        assert_eq!(a, b);
    }

    #[test]
    fn zero_threshold_keeps_distinct_points_apart() {
        let vectors = vec![unit2(0.0), unit2(5.0)];
        let out = cluster(&vectors, 0.0);
        assert_eq!(out, vec![vec![0], vec![1]]);
    }

    #[test]
    fn zero_threshold_merges_identical_vectors() {
        let vectors = vec![vec![1.0, 0.0], vec![1.0, 0.0]];
        let out = cluster(&vectors, 0.0);
        assert_eq!(out, vec![vec![0, 1]]);
    }

    #[test]
    fn partition_covers_every_index_exactly_once() {
        let vectors: Vec<Vec<f32>> = (0..9).map(|i| unit2(i as f32 * 37.0)).collect();
        let out = cluster(&vectors, 0.5);
        let mut seen: Vec<usize> = out.into_iter().flatten().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..9).collect::<Vec<_>>());
    }
}
