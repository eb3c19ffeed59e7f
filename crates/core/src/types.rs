/// Generation depth counted from the subject (subject = 0, parents = 1).
pub type Depth = u32;

/// 1-based slot position within a generation.
pub type Position = u32;

/// Birth year as reported by the source.
pub type Year = i32;

/// Score accumulator type.
pub type Score = f64;

/// Deepest generation a flattened pedigree may declare. Keeps every slot
/// position and its parents' positions within `Position`.
pub const MAX_DEPTH: Depth = 30;

/// Number of slots in generation `generation` of a complete pedigree,
/// saturating at `usize::MAX`.
pub fn slots_in_generation(generation: Depth) -> usize {
    1usize.checked_shl(generation).unwrap_or(usize::MAX)
}

/// Number of ancestor slots (generations 1..=depth) in a complete pedigree,
/// saturating at `usize::MAX`.
pub fn slots_up_to(depth: Depth) -> usize {
    // 2 + 4 + ... + 2^depth = 2^(depth + 1) - 2
    if depth >= usize::BITS - 1 {
        return usize::MAX;
    }
    (2usize << depth) - 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_counts() {
        assert_eq!(slots_up_to(0), 0);
        assert_eq!(slots_up_to(3), 14);
        assert_eq!(slots_up_to(6), (1..=6).map(slots_in_generation).sum::<usize>());
        assert_eq!(slots_in_generation(usize::BITS), usize::MAX);
        assert_eq!(slots_up_to(usize::BITS - 1), usize::MAX);
        assert_eq!(slots_up_to(Depth::MAX), usize::MAX);
    }
}
