//! Matrix packet encoding
//!
//! The TCP sink speaks the raw matrix format expected by a matrix-processing
//! receiver. Every field is a little-endian `i32`; there is no framing
//! beyond the header itself, so the receiver parses the header to learn how
//! many pixel bytes follow.
//!
//! ```text
//! +-------------+------------------+-----------+-------+--------+-----------+-------------+
//! | name_len(4) | name(name_len)   | dims(4)=2 | w(4)  | h(4)   | type(4)=1 | planes(4)=3 |
//! +-------------+------------------+-----------+-------+--------+-----------+-------------+
//! | pixel data: w * h * planes bytes, row-major RGB, no padding                           |
//! +---------------------------------------------------------------------------------------+
//! ```
//!
//! With an empty name the header is 24 bytes.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

/// Header length when the matrix name is empty
pub const HEADER_LEN: usize = 24;

/// Two-dimensional matrices only
pub const DIM_COUNT: i32 = 2;

/// Element type code for unsigned 8-bit (char) planes
pub const TYPE_CODE_U8: i32 = 1;

/// RGB
pub const RGB_PLANES: i32 = 3;

/// Decoded matrix header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixHeader {
    /// Matrix name (always empty on the send side)
    pub name: Bytes,
    /// Number of dimensions
    pub dim_count: i32,
    /// Width in pixels
    pub width: i32,
    /// Height in pixels
    pub height: i32,
    /// Element type code
    pub type_code: i32,
    /// Planes per pixel
    pub plane_count: i32,
}

impl MatrixHeader {
    /// Header for an unnamed RGB u8 matrix
    pub fn rgb(width: u32, height: u32) -> Result<Self> {
        let width = i32::try_from(width)
            .map_err(|_| Error::Encode(format!("width {} exceeds i32", width)))?;
        let height = i32::try_from(height)
            .map_err(|_| Error::Encode(format!("height {} exceeds i32", height)))?;

        Ok(Self {
            name: Bytes::new(),
            dim_count: DIM_COUNT,
            width,
            height,
            type_code: TYPE_CODE_U8,
            plane_count: RGB_PLANES,
        })
    }

    /// Number of header bytes on the wire
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.name.len()
    }

    /// Number of pixel bytes that follow the header
    pub fn payload_len(&self) -> usize {
        self.width as usize * self.height as usize * self.plane_count as usize
    }

    /// Append the header to `buf`
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.put_i32_le(self.name.len() as i32);
        buf.put_slice(&self.name);
        buf.put_i32_le(self.dim_count);
        buf.put_i32_le(self.width);
        buf.put_i32_le(self.height);
        buf.put_i32_le(self.type_code);
        buf.put_i32_le(self.plane_count);
    }

    /// Parse a header from the start of `data`
    ///
    /// Returns `Ok(None)` when more bytes are needed.
    pub fn parse(data: &[u8]) -> Result<Option<Self>> {
        if data.len() < 4 {
            return Ok(None);
        }

        let mut cursor = data;
        let name_len = cursor.get_i32_le();
        if name_len < 0 {
            return Err(Error::MalformedPacket(format!(
                "negative name length {}",
                name_len
            )));
        }

        let name_len = name_len as usize;
        if cursor.remaining() < name_len + HEADER_LEN - 4 {
            return Ok(None);
        }

        let name = Bytes::copy_from_slice(&cursor[..name_len]);
        cursor.advance(name_len);

        let dim_count = cursor.get_i32_le();
        if dim_count != DIM_COUNT {
            return Err(Error::MalformedPacket(format!(
                "unsupported dimension count {}",
                dim_count
            )));
        }

        let width = cursor.get_i32_le();
        let height = cursor.get_i32_le();
        let type_code = cursor.get_i32_le();
        let plane_count = cursor.get_i32_le();

        if width < 0 || height < 0 || plane_count <= 0 {
            return Err(Error::MalformedPacket(format!(
                "bad geometry {}x{}x{}",
                width, height, plane_count
            )));
        }

        Ok(Some(Self {
            name,
            dim_count,
            width,
            height,
            type_code,
            plane_count,
        }))
    }
}

/// A complete header plus pixel payload
#[derive(Debug, Clone)]
pub struct MatrixPacket {
    pub header: MatrixHeader,
    pub pixels: Bytes,
}

impl MatrixPacket {
    /// Decode one packet from the front of `data`
    ///
    /// Returns `Ok(None)` when the buffer does not yet hold a whole packet.
    /// On success the consumed bytes are removed from `data`.
    pub fn decode(data: &mut BytesMut) -> Result<Option<Self>> {
        let header = match MatrixHeader::parse(&data[..])? {
            Some(header) => header,
            None => return Ok(None),
        };

        let total = header.encoded_len() + header.payload_len();
        if data.len() < total {
            return Ok(None);
        }

        data.advance(header.encoded_len());
        let pixels = data.split_to(header.payload_len()).freeze();

        Ok(Some(Self { header, pixels }))
    }
}

/// Serialize an RGB u8 raster into a matrix packet
pub fn encode_packet(width: u32, height: u32, rgb: &[u8]) -> Result<Bytes> {
    let header = MatrixHeader::rgb(width, height)?;

    if rgb.len() != header.payload_len() {
        return Err(Error::Encode(format!(
            "{}x{} RGB needs {} bytes, got {}",
            width,
            height,
            header.payload_len(),
            rgb.len()
        )));
    }

    let mut buf = BytesMut::with_capacity(header.encoded_len() + rgb.len());
    header.write_to(&mut buf);
    buf.put_slice(rgb);

    Ok(buf.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let packet = encode_packet(2, 1, &[1, 2, 3, 4, 5, 6]).unwrap();

        assert_eq!(packet.len(), HEADER_LEN + 6);
        assert_eq!(&packet[0..4], &0i32.to_le_bytes());
        assert_eq!(&packet[4..8], &2i32.to_le_bytes());
        assert_eq!(&packet[8..12], &2i32.to_le_bytes());
        assert_eq!(&packet[12..16], &1i32.to_le_bytes());
        assert_eq!(&packet[16..20], &1i32.to_le_bytes());
        assert_eq!(&packet[20..24], &3i32.to_le_bytes());
        assert_eq!(&packet[24..], &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_encode_rejects_short_payload() {
        let result = encode_packet(4, 4, &[0u8; 10]);
        assert!(matches!(result, Err(Error::Encode(_))));
    }

    #[test]
    fn test_parse_incomplete() {
        let packet = encode_packet(2, 2, &[0u8; 12]).unwrap();

        assert!(MatrixHeader::parse(&packet[..3]).unwrap().is_none());
        assert!(MatrixHeader::parse(&packet[..20]).unwrap().is_none());
        assert!(MatrixHeader::parse(&packet[..24]).unwrap().is_some());
    }

    #[test]
    fn test_parse_named_header() {
        let mut buf = BytesMut::new();
        let header = MatrixHeader {
            name: Bytes::from_static(b"cam"),
            ..MatrixHeader::rgb(1, 1).unwrap()
        };
        header.write_to(&mut buf);
        buf.put_slice(&[9, 8, 7]);

        let parsed = MatrixHeader::parse(&buf).unwrap().unwrap();
        assert_eq!(parsed.name, Bytes::from_static(b"cam"));
        assert_eq!(parsed.encoded_len(), HEADER_LEN + 3);

        let packet = MatrixPacket::decode(&mut buf).unwrap().unwrap();
        assert_eq!(&packet.pixels[..], &[9, 8, 7]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_parse_rejects_bad_dim_count() {
        let mut buf = BytesMut::new();
        buf.put_i32_le(0);
        buf.put_i32_le(3);
        buf.put_slice(&[0u8; 16]);

        assert!(matches!(
            MatrixHeader::parse(&buf),
            Err(Error::MalformedPacket(_))
        ));
    }

    #[test]
    fn test_decode_stream_of_packets() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&encode_packet(1, 1, &[1, 1, 1]).unwrap());
        buf.extend_from_slice(&encode_packet(2, 1, &[2; 6]).unwrap());

        let first = MatrixPacket::decode(&mut buf).unwrap().unwrap();
        assert_eq!(first.header.width, 1);

        // Partial second packet is left in place
        let mut partial = buf.split_to(buf.len() - 1);
        assert!(MatrixPacket::decode(&mut partial).unwrap().is_none());
        partial.unsplit(buf);

        let second = MatrixPacket::decode(&mut partial).unwrap().unwrap();
        assert_eq!(second.header.width, 2);
        assert_eq!(second.pixels.len(), 6);
    }
}
