//! C2: converts raw interleaved unsigned-8 I/Q bytes into normalized
//! complex samples.

use num_complex::Complex64;

/// `(I_byte - 127.5)/127.5 + j*(Q_byte - 127.5)/127.5` for each pair.
/// A trailing odd byte is discarded rather than buffered across chunks
/// (§4.2: "boundary errors must not cross frames").
pub fn decode(chunk: &[u8]) -> Vec<Complex64> {
    let pairs = chunk.len() / 2;
    let mut out = Vec::with_capacity(pairs);
    for i in 0..pairs {
        let i_byte = chunk[2 * i];
        let q_byte = chunk[2 * i + 1];
        let re = (i_byte as f64 - 127.5) / 127.5;
        let im = (q_byte as f64 - 127.5) / 127.5;
        out.push(Complex64::new(re, im));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_length_produces_n_over_2_samples() {
        let chunk = vec![0u8; 256];
        assert_eq!(decode(&chunk).len(), 128);
    }

    #[test]
    fn odd_trailing_byte_is_discarded() {
        let chunk = vec![0u8; 257];
        assert_eq!(decode(&chunk).len(), 128);
    }

    #[test]
    fn midpoint_byte_maps_near_zero() {
        let chunk = vec![127u8, 128u8];
        let samples = decode(&chunk);
        assert_eq!(samples.len(), 1);
        assert!(samples[0].re.abs() < 0.01);
        assert!(samples[0].im.abs() < 0.01);
    }

    #[test]
    fn extremes_map_to_unit_range() {
        let chunk = vec![255u8, 0u8];
        let samples = decode(&chunk);
        assert!((samples[0].re - 1.0).abs() < 1e-9);
        assert!((samples[0].im - (-1.0)).abs() < 1e-9);
    }

    #[test]
    fn empty_chunk_produces_empty_frame() {
        assert!(decode(&[]).is_empty());
    }
}
