use rayon::prelude::*;

/// Scores must be strictly above this to count as a match.
pub const MATCH_THRESHOLD: f64 = 0.70;

/// Pluggable string similarity in `[0, 1]`.
pub trait Similarity: Sync {
    fn score(&self, a: &str, b: &str) -> f64;
}

/// Sørensen–Dice coefficient over character bigrams.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiceSimilarity;

impl Similarity for DiceSimilarity {
    fn score(&self, a: &str, b: &str) -> f64 {
        strsim::sorensen_dice(a, b)
    }
}

pub fn passes(score: f64) -> bool {
    score > MATCH_THRESHOLD
}

/// Index and score of the best passing item. Ties go to the lowest index.
pub fn best_match<S, T, F>(similarity: &S, query: &str, items: &[T], key: F) -> Option<(usize, f64)>
where
    S: Similarity + ?Sized,
    T: Sync,
    F: Fn(&T) -> &str + Sync,
{
    items
        .par_iter()
        .enumerate()
        .map(|(i, item)| (i, similarity.score(query, key(item))))
        .filter(|&(_, score)| passes(score))
        .reduce_with(|a, b| {
            if b.1 > a.1 || (b.1 == a.1 && b.0 < a.0) {
                b
            } else {
                a
            }
        })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Returns a preset score per candidate string, 0 otherwise.
    pub struct FixedSimilarity(pub HashMap<&'static str, f64>);

    impl Similarity for FixedSimilarity {
        fn score(&self, _a: &str, b: &str) -> f64 {
            self.0.get(b).copied().unwrap_or(0.0)
        }
    }

    #[test]
    fn threshold_is_strict() {
        assert!(!passes(0.70));
        assert!(passes(0.71));
        assert!(!passes(0.0));
    }

    #[test]
    fn boundary_scores() {
        let items = ["at", "above"];
        let sim = FixedSimilarity(HashMap::from([("at", 0.70), ("above", 0.71)]));
        assert_eq!(best_match(&sim, "q", &items, |s| *s), Some((1, 0.71)));

        let sim = FixedSimilarity(HashMap::from([("at", 0.70)]));
        assert_eq!(best_match(&sim, "q", &items, |s| *s), None);
    }

    #[test]
    fn ties_keep_first_index() {
        let items = ["a", "b", "c", "d"];
        let sim = FixedSimilarity(HashMap::from([("b", 0.9), ("c", 0.95), ("d", 0.95)]));
        assert_eq!(best_match(&sim, "q", &items, |s| *s), Some((2, 0.95)));
    }

    #[test]
    fn dice_scores() {
        let dice = DiceSimilarity;
        assert_eq!(dice.score("John Smith", "John Smith"), 1.0);
        assert!(passes(dice.score("Jonathan Smith", "Jonathon Smith")));
        assert!(!passes(dice.score("John Smith", "Maria Garcia")));
    }
}
