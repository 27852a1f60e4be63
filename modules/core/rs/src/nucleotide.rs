/// Marker used in place of a read base when the read skips a reference base (deletion).
pub const GAP: u8 = b'_';

/// Watson-Crick complement of an uppercase or lowercase nucleotide. The result is uppercase,
/// ambiguous symbols are mapped to `N` and the gap marker is returned unchanged.
pub fn complement(base: u8) -> u8 {
    match base.to_ascii_uppercase() {
        b'A' => b'T',
        b'T' => b'A',
        b'C' => b'G',
        b'G' => b'C',
        GAP => GAP,
        _ => b'N',
    }
}

/// Uppercase the base and complement it if it has to be reported for the reverse strand.
#[inline]
pub fn oriented(base: u8, reverse: bool) -> u8 {
    if reverse {
        complement(base)
    } else {
        base.to_ascii_uppercase()
    }
}

/// Case-insensitive base comparison. From the SAM specification: no assumptions can be made on
/// the letter cases.
#[inline(always)]
pub fn same_base(a: u8, b: u8) -> bool {
    a.eq_ignore_ascii_case(&b)
}
