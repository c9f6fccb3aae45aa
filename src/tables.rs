//! Constant tables from RFC 1951.

/// Longest code length DEFLATE allows.
pub const MAX_CODE_LENGTH: u8 = 15;

pub const END_OF_BLOCK: u16 = 256;

/// Literal/length symbols a dynamic block may declare (`HLIT` upper bound).
pub const MAX_LITERAL_CODES: usize = 286;

/// Distance symbols a dynamic block may declare (`HDIST` upper bound).
pub const MAX_DISTANCE_CODES: usize = 30;

/// Code lengths of the fixed literal/length alphabet (section 3.2.6).
pub const FIXED_LITERAL_LENGTHS: [u8; 288] = {
    let mut lengths = [0u8; 288];
    let mut symbol = 0;
    while symbol < 288 {
        lengths[symbol] = match symbol {
            0..=143 => 8,
            144..=255 => 9,
            256..=279 => 7,
            _ => 8,
        };
        symbol += 1;
    }
    lengths
};

/// Width of a fixed-block distance code.
pub const FIXED_DISTANCE_BITS: u8 = 5;

/// `(extra bits, base length)` for length symbols 257..=285.
pub static LENGTH_CODES: [(u8, u16); 29] = [
    (0, 3),
    (0, 4),
    (0, 5),
    (0, 6),
    (0, 7),
    (0, 8),
    (0, 9),
    (0, 10),
    (1, 11),
    (1, 13),
    (1, 15),
    (1, 17),
    (2, 19),
    (2, 23),
    (2, 27),
    (2, 31),
    (3, 35),
    (3, 43),
    (3, 51),
    (3, 59),
    (4, 67),
    (4, 83),
    (4, 99),
    (4, 115),
    (5, 131),
    (5, 163),
    (5, 195),
    (5, 227),
    (0, 258),
];

/// `(extra bits, base distance)` for distance symbols 0..=29.
pub static DISTANCE_CODES: [(u8, u16); 30] = [
    (0, 1),
    (0, 2),
    (0, 3),
    (0, 4),
    (1, 5),
    (1, 7),
    (2, 9),
    (2, 13),
    (3, 17),
    (3, 25),
    (4, 33),
    (4, 49),
    (5, 65),
    (5, 97),
    (6, 129),
    (6, 193),
    (7, 257),
    (7, 385),
    (8, 513),
    (8, 769),
    (9, 1025),
    (9, 1537),
    (10, 2049),
    (10, 3073),
    (11, 4097),
    (11, 6145),
    (12, 8193),
    (12, 12289),
    (13, 16385),
    (13, 24577),
];

/// Order in which a dynamic header lists the code length alphabet's lengths.
pub const CODE_LENGTH_ORDER: [usize; 19] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

#[cfg(test)]
mod tests {
    use crate::tables::{
        CODE_LENGTH_ORDER, DISTANCE_CODES, FIXED_LITERAL_LENGTHS, LENGTH_CODES,
    };

    #[test]
    fn length_ranges_are_contiguous() {
        for pair in LENGTH_CODES[..28].windows(2) {
            let (extra, base) = pair[0];
            assert_eq!(base + (1 << extra), pair[1].1, "{pair:?}");
        }
        // 284 can also spell 258, which has its own zero-extra symbol.
        let (extra, base) = LENGTH_CODES[27];
        assert_eq!(base + (1 << extra) - 1, 258);
        assert_eq!(LENGTH_CODES[28], (0, 258));
    }

    #[test]
    fn distance_ranges_cover_the_window() {
        for pair in DISTANCE_CODES.windows(2) {
            let (extra, base) = pair[0];
            assert_eq!(u32::from(base) + (1 << extra), u32::from(pair[1].1));
        }
        let (extra, base) = DISTANCE_CODES[29];
        assert_eq!(u32::from(base) + (1 << extra) - 1, 32768);
    }

    #[test]
    fn fixed_distribution() {
        assert_eq!(FIXED_LITERAL_LENGTHS[0], 8);
        assert_eq!(FIXED_LITERAL_LENGTHS[143], 8);
        assert_eq!(FIXED_LITERAL_LENGTHS[144], 9);
        assert_eq!(FIXED_LITERAL_LENGTHS[255], 9);
        assert_eq!(FIXED_LITERAL_LENGTHS[256], 7);
        assert_eq!(FIXED_LITERAL_LENGTHS[279], 7);
        assert_eq!(FIXED_LITERAL_LENGTHS[280], 8);
        assert_eq!(FIXED_LITERAL_LENGTHS[287], 8);
    }

    #[test]
    fn code_length_order_is_a_permutation() {
        let mut seen = [false; 19];
        for &symbol in &CODE_LENGTH_ORDER {
            assert!(!seen[symbol]);
            seen[symbol] = true;
        }
    }
}
