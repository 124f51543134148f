//! Small byte-slice helpers shared by the modes.

/// `dst ^= src` over the shorter of the two slices.
#[inline]
pub fn xor_in_place(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= *s;
    }
}

/// Increment `counter` as one big-endian integer, wrapping on overflow.
#[inline]
pub fn increment_be(counter: &mut [u8]) {
    for byte in counter.iter_mut().rev() {
        *byte = byte.wrapping_add(1);
        if *byte != 0 {
            break;
        }
    }
}

/// Left-shift a big-endian block by one bit, returning the bit shifted out.
#[inline]
pub fn shift_left_one(block: &mut [u8]) -> u8 {
    let mut carry = 0u8;
    for byte in block.iter_mut().rev() {
        let next = *byte >> 7;
        *byte = (*byte << 1) | carry;
        carry = next;
    }
    carry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xor_in_place() {
        let mut a = [0xF0u8, 0x0F, 0xAA];
        xor_in_place(&mut a, &[0xFF, 0xFF, 0xAA]);
        assert_eq!(a, [0x0F, 0xF0, 0x00]);
    }

    #[test]
    fn test_increment_be_carries() {
        let mut c = [0x00u8, 0xFF, 0xFF];
        increment_be(&mut c);
        assert_eq!(c, [0x01, 0x00, 0x00]);
    }

    #[test]
    fn test_increment_be_wraps() {
        let mut c = [0xFFu8; 4];
        increment_be(&mut c);
        assert_eq!(c, [0u8; 4]);
    }

    #[test]
    fn test_shift_left_one() {
        let mut b = [0x80u8, 0x01];
        let carry = shift_left_one(&mut b);
        assert_eq!(carry, 1);
        assert_eq!(b, [0x00, 0x02]);
    }
}
