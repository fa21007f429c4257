//! DNA sequence utilities.

/// Complements a single DNA base, preserving case.
///
/// A<->T and C<->G; any other byte (N, IUPAC codes, '=') is returned unchanged, so
/// complementing twice always yields the input.
#[inline]
#[must_use]
pub const fn complement_base(base: u8) -> u8 {
    match base {
        b'A' => b'T',
        b'T' => b'A',
        b'C' => b'G',
        b'G' => b'C',
        b'a' => b't',
        b't' => b'a',
        b'c' => b'g',
        b'g' => b'c',
        _ => base,
    }
}

/// Reverse complements a DNA sequence.
///
/// # Examples
///
/// ```
/// use fgrevert_lib::dna::reverse_complement;
///
/// assert_eq!(reverse_complement(b"AACGTN"), b"NACGTT".to_vec());
/// assert_eq!(reverse_complement(b"acgT"), b"Acgt".to_vec());
/// ```
#[must_use]
pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|&base| complement_base(base)).collect()
}

/// Reverse complements a DNA sequence in place.
pub fn reverse_complement_in_place(seq: &mut [u8]) {
    seq.reverse();
    for base in seq.iter_mut() {
        *base = complement_base(*base);
    }
}
