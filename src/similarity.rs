//! Fuzzy grouping of near-duplicate fatal error texts.

use serde::Serialize;

/// Bigram overlap between two strings, compared case-insensitively.
///
/// Each bigram of the shorter string counts once if it occurs anywhere in the
/// longer one; the score is `2 * matches / (bigrams(a) + bigrams(b))`.
pub fn bigram_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    if a.len() < 2 || b.len() < 2 {
        return if a == b && !a.is_empty() { 1.0 } else { 0.0 };
    }
    let total = (a.len() - 1 + b.len() - 1) as f64;
    let (short, long) = if b.len() < a.len() { (&b, &a) } else { (&a, &b) };
    let matches = short
        .windows(2)
        .filter(|pair| long.windows(2).any(|other| other == *pair))
        .count();
    2.0 * matches as f64 / total
}

/// A group of similar errors represented by the first one seen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FatalErrorCluster {
    pub text: String,
    pub count: usize,
    /// Lowest similarity between the representative and any member.
    pub min_similarity: f64,
}

/// Greedy clustering: each text joins the first cluster whose representative
/// is more similar than `threshold`, else it starts a new cluster.
pub fn group_similar(texts: &[String], threshold: f64) -> Vec<FatalErrorCluster> {
    let mut clusters: Vec<FatalErrorCluster> = Vec::with_capacity(texts.len());
    for text in texts {
        let joined = clusters.iter_mut().find_map(|cluster| {
            let similarity = bigram_similarity(&cluster.text, text);
            (similarity > threshold).then_some((cluster, similarity))
        });
        match joined {
            Some((cluster, similarity)) => {
                cluster.count += 1;
                cluster.min_similarity = cluster.min_similarity.min(similarity);
            }
            None => clusters.push(FatalErrorCluster {
                text: text.clone(),
                count: 1,
                min_similarity: 1.0,
            }),
        }
    }
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn spu_workers_cluster_together() {
        let errors = strings(&[
            "SPU Worker 1 crashed",
            "SPU Worker 2 crashed",
            "totally unrelated error",
        ]);
        let clusters = group_similar(&errors, 0.75);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].count, 2);
        assert_eq!(clusters[0].text, "SPU Worker 1 crashed");
        assert!(clusters[0].min_similarity < 1.0);
        assert_eq!(clusters[1].count, 1);
    }

    #[test]
    fn similarity_bounds() {
        assert!((bigram_similarity("abc", "ABC") - 1.0).abs() < f64::EPSILON);
        assert_eq!(bigram_similarity("abc", "xyz"), 0.0);
        assert_eq!(bigram_similarity("", "abc"), 0.0);
        let s = bigram_similarity("ppu thread 0x0100", "ppu thread 0x0101");
        assert!(s > 0.75 && s < 1.0);
    }

    #[test]
    fn empty_input_has_no_clusters() {
        assert!(group_similar(&[], 0.75).is_empty());
    }
}
