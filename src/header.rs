//! Canonical 44-byte WAVE header synthesis and in-place size patching.

use byteorder::{ByteOrder, LittleEndian};

use crate::wave::{WaveDescriptor, CANONICAL_HEADER_SIZE};

/// Serialize `desc` as a canonical header using its `chunk_size` and `data_size`.
pub fn make_canonical_header(desc: &WaveDescriptor) -> [u8; CANONICAL_HEADER_SIZE as usize] {
    let mut h = [0u8; CANONICAL_HEADER_SIZE as usize];

    h[0..4].copy_from_slice(b"RIFF");
    LittleEndian::write_u32(&mut h[4..8], desc.chunk_size as u32);
    h[8..12].copy_from_slice(b"WAVE");

    h[12..16].copy_from_slice(b"fmt ");
    LittleEndian::write_u32(&mut h[16..20], 16);
    LittleEndian::write_u16(&mut h[20..22], desc.format_code);
    LittleEndian::write_u16(&mut h[22..24], desc.channels);
    LittleEndian::write_u32(&mut h[24..28], desc.samples_per_sec);
    LittleEndian::write_u32(&mut h[28..32], desc.avg_bytes_per_sec);
    LittleEndian::write_u16(&mut h[32..34], desc.block_align);
    LittleEndian::write_u16(&mut h[34..36], desc.bits_per_sample);

    h[36..40].copy_from_slice(b"data");
    LittleEndian::write_u32(&mut h[40..44], desc.data_size as u32);

    h
}

/// Patch the RIFF chunk size (offset 4).
pub fn put_chunk_size(header: &mut [u8], chunk_size: u64) {
    LittleEndian::write_u32(&mut header[4..8], chunk_size as u32);
}

/// Patch the data chunk length, which sits in the last 4 bytes of a header
/// of `header_size` bytes, and set the chunk size to match.
pub fn put_data_size(header: &mut [u8], header_size: usize, data_size: u64) {
    LittleEndian::write_u32(&mut header[header_size - 4..header_size], data_size as u32);
    put_chunk_size(header, data_size + header_size as u64 - 8);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_layout() {
        let desc = WaveDescriptor::cd_quality("x.wav", 2352 * 10);
        let h = make_canonical_header(&desc);

        assert_eq!(&h[0..4], b"RIFF");
        assert_eq!(LittleEndian::read_u32(&h[4..8]), 2352 * 10 + 36);
        assert_eq!(&h[8..16], b"WAVEfmt ");
        assert_eq!(LittleEndian::read_u32(&h[16..20]), 16);
        assert_eq!(LittleEndian::read_u16(&h[20..22]), 1);
        assert_eq!(LittleEndian::read_u16(&h[22..24]), 2);
        assert_eq!(LittleEndian::read_u32(&h[24..28]), 44100);
        assert_eq!(LittleEndian::read_u32(&h[28..32]), 176400);
        assert_eq!(LittleEndian::read_u16(&h[32..34]), 4);
        assert_eq!(LittleEndian::read_u16(&h[34..36]), 16);
        assert_eq!(&h[36..40], b"data");
        assert_eq!(LittleEndian::read_u32(&h[40..44]), 2352 * 10);
    }

    #[test]
    fn test_put_data_size_sets_chunk() {
        let desc = WaveDescriptor::cd_quality("x.wav", 100);
        let mut h = make_canonical_header(&desc);

        put_data_size(&mut h, 44, 5000);
        assert_eq!(LittleEndian::read_u32(&h[40..44]), 5000);
        assert_eq!(LittleEndian::read_u32(&h[4..8]), 5036);

        put_chunk_size(&mut h, 5037);
        assert_eq!(LittleEndian::read_u32(&h[4..8]), 5037);
        assert_eq!(LittleEndian::read_u32(&h[40..44]), 5000);
    }

    #[test]
    fn test_put_data_size_long_header() {
        let mut h = vec![0u8; 58];
        put_data_size(&mut h, 58, 10);
        assert_eq!(LittleEndian::read_u32(&h[54..58]), 10);
        assert_eq!(LittleEndian::read_u32(&h[4..8]), 60);
    }
}
