use rand::Rng;

/// Returns a uniformly random permutation of `items`. The input is left in place.
pub fn shuffle<T: Clone, R: Rng + ?Sized>(items: &[T], rng: &mut R) -> Vec<T> {
    let mut shuffled = items.to_vec();

    // Fisher-Yates shuffle
    for i in (1..shuffled.len()).rev() {
        let j = rng.gen_range(0..=i);
        shuffled.swap(i, j);
    }

    shuffled
}
