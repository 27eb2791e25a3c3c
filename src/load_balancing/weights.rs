//! Weight arithmetic used by the weighted round robin selector.

/// Greatest common divisor; `gcd(a, 0) == a`
pub fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// GCD of a set of weights; 0 for an empty set
pub fn gcd_of<I>(weights: I) -> u32
where
    I: IntoIterator<Item = u32>,
{
    weights.into_iter().fold(0, gcd)
}

/// Largest weight in the set; 0 for an empty set
pub fn max_of<I>(weights: I) -> u32
where
    I: IntoIterator<Item = u32>,
{
    weights.into_iter().max().unwrap_or(0)
}

/// Divide every weight by the set's GCD
///
/// `[10, 6, 4]` normalizes to `[5, 3, 2]`. A set whose GCD is 0 (empty or all
/// zero) is returned unchanged.
pub fn normalize(weights: &[u32]) -> Vec<u32> {
    let divisor = gcd_of(weights.iter().copied());
    if divisor == 0 {
        return weights.to_vec();
    }
    weights.iter().map(|w| w / divisor).collect()
}
